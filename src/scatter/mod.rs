//! # Scatter Module - Physics Event Selection and Application
//!
//! The driver is generic over a [`PhysicsModel`]: the bundle that samples
//! free-flight distances and applies scatter events. The production bundle
//! is [`MaterialPhysics`], backed by the loaded material tables; tests
//! substitute deterministic models to pin driver behavior without real
//! coefficient data.
//!
//! Keeping the dispatch compile-time lets the event code inline into the
//! per-slot step function, which dominates the run time.


use crate::material::Material;
use crate::particle::Particle;
use crate::vector::Vec3;
use rand::prelude::*;
use rand_distr::{Distribution, Exp, Uniform};
use std::f32::consts::TAU;

/// The bulk event kinds a particle can undergo between boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Elastic,
    Inelastic,
}

/// A sampled free flight: how far the particle travels before its next bulk
/// event, and which event that is.
#[derive(Debug, Clone, Copy)]
pub struct FreeFlight {
    pub distance: f32,
    pub kind: EventKind,
}

/// Per-material physics consumed by the simulation driver.
///
/// `free_flight` returns `None` for vacuum (and for regions transparent at
/// the given energy), in which case the particle travels undisturbed to the
/// next boundary. `scatter` mutates the particle in place and may hand back
/// a secondary electron; the driver decides whether a slot is free for it.
pub trait PhysicsModel: Sync {
    fn free_flight<R: Rng>(&self, material: i32, energy: f32, rng: &mut R) -> Option<FreeFlight>;

    fn scatter<R: Rng>(
        &self,
        kind: EventKind,
        particle: &mut Particle,
        rng: &mut R,
    ) -> Option<Particle>;

    /// Vacuum barrier of a material in eV; 0 for unknown ids and vacuum.
    fn barrier(&self, material: i32) -> f32;
}

/// The production physics bundle: one [`Material`] per region id.
#[derive(Debug)]
pub struct MaterialPhysics {
    materials: Vec<Material>,
}

impl MaterialPhysics {
    pub fn new(materials: Vec<Material>) -> Self {
        MaterialPhysics { materials }
    }

    pub fn materials(&self) -> &[Material] {
        &self.materials
    }

    fn material(&self, id: i32) -> Option<&Material> {
        usize::try_from(id).ok().and_then(|i| self.materials.get(i))
    }
}

impl PhysicsModel for MaterialPhysics {
    fn free_flight<R: Rng>(&self, material: i32, energy: f32, rng: &mut R) -> Option<FreeFlight> {
        let material = self.material(material)?;
        let elastic = material.elastic.inverse_mfp(energy).max(0.0);
        let inelastic = material.inelastic.inverse_mfp(energy).max(0.0);
        let total = elastic + inelastic;
        if total <= 0.0 {
            return None;
        }

        let distance = Exp::new(total).ok()?.sample(rng);
        let kind = if rng.random::<f32>() * total < elastic {
            EventKind::Elastic
        } else {
            EventKind::Inelastic
        };
        Some(FreeFlight { distance, kind })
    }

    fn scatter<R: Rng>(
        &self,
        kind: EventKind,
        particle: &mut Particle,
        rng: &mut R,
    ) -> Option<Particle> {
        let material = self.material(particle.material)?;
        let azimuth = Uniform::new(0.0f32, TAU).unwrap();
        match kind {
            EventKind::Elastic => {
                let cos_theta = material
                    .elastic
                    .sample(particle.energy, rng.random::<f32>())
                    .clamp(-1.0, 1.0);
                particle.direction = particle.direction.deflect(cos_theta, azimuth.sample(rng));
                None
            }
            EventKind::Inelastic => {
                let fraction = material
                    .inelastic
                    .sample(particle.energy, rng.random::<f32>())
                    .clamp(0.0, 1.0);
                let loss = fraction * particle.energy;
                particle.energy -= loss;
                if loss <= 0.0 {
                    return None;
                }
                // The lost energy walks away as a secondary electron
                let direction = Vec3::unit_from_angles(
                    rng.random_range(-1.0f32..1.0),
                    azimuth.sample(rng),
                );
                Some(Particle {
                    position: particle.position,
                    direction,
                    energy: loss,
                    material: particle.material,
                })
            }
        }
    }

    fn barrier(&self, material: i32) -> f32 {
        self.material(material).map_or(0.0, |m| m.barrier)
    }
}
