use crate::vector::Vec3;
use std::fmt::Display;

/// Material id of a particle that is currently outside every solid region.
pub const VACUUM: i32 = -1;

/// A single electron in flight.
///
/// Positions are in nanometres, the direction is a unit vector and the
/// kinetic energy is in electronvolts. `material` is the id of the region
/// the electron is currently inside, or [`VACUUM`]. A particle carries no
/// identity of its own; the injection tag is tracked next to it by the
/// simulation driver.
#[derive(Debug, Clone, Copy, serde::Serialize, serde::Deserialize)]
pub struct Particle {
    pub position: Vec3,
    pub direction: Vec3,
    pub energy: f32,
    pub material: i32,
}

impl Particle {
    /// Creates a particle in vacuum with the given position, direction and
    /// kinetic energy. The direction is normalised.
    pub fn new(position: Vec3, direction: Vec3, energy: f32) -> Self {
        Particle {
            position,
            direction: direction.normalize(),
            energy,
            material: VACUUM,
        }
    }

    /// Whether the particle is currently outside every material region.
    #[inline]
    pub fn in_vacuum(&self) -> bool {
        self.material == VACUUM
    }
}

impl Display for Particle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Particle {{ pos: ({:.3}, {:.3}, {:.3}), dir: ({:.3}, {:.3}, {:.3}), E: {:.2} eV, mat: {} }}",
            self.position.x,
            self.position.y,
            self.position.z,
            self.direction.x,
            self.direction.y,
            self.direction.z,
            self.energy,
            self.material,
        )
    }
}

impl Default for Particle {
    /// A default particle at the origin travelling along +z with no energy.
    /// Useful for pre-allocating slot slabs before any injection happens.
    fn default() -> Self {
        Particle {
            position: Vec3::zero(),
            direction: Vec3::z_hat(),
            energy: 0.0,
            material: VACUUM,
        }
    }
}

/// Image-plane coordinates of a primary electron.
///
/// Detected records are correlated back to these through the injection tag;
/// the simulation itself never reads them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Pixel {
    pub x: i32,
    pub y: i32,
}

impl Pixel {
    pub fn new(x: i32, y: i32) -> Self {
        Pixel { x, y }
    }
}
