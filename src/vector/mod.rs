//! # 3D Vector Mathematics Module
//!
//! This module provides the 3D vector implementation used throughout the
//! transport simulation. The `Vec3` struct offers vector operations with
//! both value and reference semantics to minimize allocations in the hot
//! scattering loop. Components are `f32`: positions are in nanometres and
//! directions are unit vectors, so single precision matches the resolution
//! of the detected-electron record format.
//!
//! ## Example Usage
//! ```
//! use transport_lib::vector::Vec3;
//!
//! let position = Vec3::new(1.0, 2.0, 3.0);
//! let direction = Vec3::new(0.0, 0.0, 1.0);
//!
//! let moved = position + direction * 0.5;
//! let distance = (moved - position).norm();
//! assert!((distance - 0.5).abs() < 1e-6);
//! ```
// Numerical Operations Definition
pub mod ops;
// Helper Functions for Vec3 struct
pub mod math;

/// A 3D vector in Cartesian coordinates.
///
/// `Vec3` represents a point or direction in 3D space using single-precision
/// floating-point components. It implements `Copy` for efficient passing and
/// provides the mathematical operations the intersection and scattering code
/// relies on.
///
/// # Examples
/// ```
/// # use transport_lib::vector::Vec3;
/// let position = Vec3::new(10.0, 5.0, -2.0);
///
/// assert_eq!(position.x, 10.0);
/// assert_eq!(position.y, 5.0);
/// assert_eq!(position.z, -2.0);
/// ```
#[derive(Default, Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Vec3 {
    /// X-component of the vector
    pub x: f32,
    /// Y-component of the vector
    pub y: f32,
    /// Z-component of the vector
    pub z: f32,
}

impl Vec3 {
    /// Creates a new 3D vector with the given components.
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Vec3 { x, y, z }
    }

    /// Creates a zero vector (0, 0, 0).
    pub fn zero() -> Self {
        Vec3 {
            x: 0.0,
            y: 0.0,
            z: 0.0,
        }
    }

    /// Returns the unit vector along the positive X-axis (1, 0, 0).
    pub fn x_hat() -> Self {
        Vec3::new(1.0, 0.0, 0.0)
    }

    /// Returns the unit vector along the positive Y-axis (0, 1, 0).
    pub fn y_hat() -> Self {
        Vec3::new(0.0, 1.0, 0.0)
    }

    /// Returns the unit vector along the positive Z-axis (0, 0, 1).
    pub fn z_hat() -> Self {
        Vec3::new(0.0, 0.0, 1.0)
    }

    /// Component-wise minimum of two vectors.
    ///
    /// Used when accumulating axis-aligned bounding boxes over triangles.
    pub fn min(&self, other: &Self) -> Self {
        Vec3 {
            x: self.x.min(other.x),
            y: self.y.min(other.y),
            z: self.z.min(other.z),
        }
    }

    /// Component-wise maximum of two vectors.
    pub fn max(&self, other: &Self) -> Self {
        Vec3 {
            x: self.x.max(other.x),
            y: self.y.max(other.y),
            z: self.z.max(other.z),
        }
    }
}
