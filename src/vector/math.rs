//! Vector math operations for Vec3
//! Provides methods for vector normalization, dot and cross products, and
//! the direction-deflection helpers the scattering step relies on.

use super::Vec3;

impl Vec3 {
    /// Calculates the squared magnitude (length) of the vector.
    ///
    /// This is more efficient than `norm()` as it avoids the square root
    /// operation. Use this when you only need to compare magnitudes.
    #[inline]
    pub fn norm_squared(&self) -> f32 {
        self.x * self.x + self.y * self.y + self.z * self.z
    }

    /// Calculates the magnitude (length) of the vector.
    ///
    /// Returns the Euclidean norm: √(x² + y² + z²)
    #[inline]
    pub fn norm(&self) -> f32 {
        self.norm_squared().sqrt()
    }

    /// Returns a unit vector in the same direction as this vector.
    ///
    /// If the vector has zero or near-zero magnitude (within floating-point
    /// epsilon), returns the zero vector to avoid division by zero.
    pub fn normalize(&self) -> Self {
        let norm_sq = self.norm_squared();
        if norm_sq > f32::EPSILON * f32::EPSILON {
            let inv_norm = norm_sq.sqrt().recip();
            Vec3 {
                x: self.x * inv_norm,
                y: self.y * inv_norm,
                z: self.z * inv_norm,
            }
        } else {
            Vec3::zero()
        }
    }

    /// Calculates the dot product (scalar product) with another vector.
    ///
    /// Equals |a||b|cos(θ) where θ is the angle between the vectors.
    #[inline]
    pub fn dot(&self, other: &Self) -> f32 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    /// Calculates the cross product with another vector.
    ///
    /// The result is perpendicular to both inputs and follows the
    /// right-hand rule; its magnitude is |a||b|sin(θ).
    #[inline]
    pub fn cross(&self, other: &Self) -> Self {
        Vec3 {
            x: self.y * other.z - self.z * other.y,
            y: self.z * other.x - self.x * other.z,
            z: self.x * other.y - self.y * other.x,
        }
    }

    /// Compares two vectors component-wise within an absolute tolerance.
    pub fn approx_eq(&self, other: &Self, tolerance: f32) -> bool {
        (self.x - other.x).abs() <= tolerance
            && (self.y - other.y).abs() <= tolerance
            && (self.z - other.z).abs() <= tolerance
    }

    /// Builds a unit vector from polar/azimuthal angles about the z-axis.
    ///
    /// `cos_theta` is the cosine of the polar angle and `phi` the azimuth in
    /// radians. Used for isotropic direction sampling of secondaries.
    pub fn unit_from_angles(cos_theta: f32, phi: f32) -> Self {
        let sin_theta = (1.0 - cos_theta * cos_theta).max(0.0).sqrt();
        Vec3 {
            x: sin_theta * phi.cos(),
            y: sin_theta * phi.sin(),
            z: cos_theta,
        }
    }

    /// Returns two unit vectors that complete this (unit) vector to an
    /// orthonormal right-handed basis.
    ///
    /// The pivot axis is chosen as the coordinate axis least aligned with
    /// `self` so the cross products stay well conditioned.
    pub fn orthonormal_basis(&self) -> (Vec3, Vec3) {
        let pivot = if self.x.abs() < 0.5 {
            Vec3::x_hat()
        } else {
            Vec3::y_hat()
        };
        let u = pivot.cross(self).normalize();
        let v = self.cross(&u);
        (u, v)
    }

    /// Deflects this unit direction by a polar angle (given as its cosine)
    /// and an azimuth around itself.
    ///
    /// This is the elementary scattering rotation: the new direction keeps
    /// the angle θ with the old one, with the azimuth φ measured in the
    /// plane perpendicular to the old direction. The result is re-normalised
    /// to counter single-precision drift over long cascades.
    pub fn deflect(&self, cos_theta: f32, phi: f32) -> Self {
        let cos_theta = cos_theta.clamp(-1.0, 1.0);
        let sin_theta = (1.0 - cos_theta * cos_theta).max(0.0).sqrt();
        let (u, v) = self.orthonormal_basis();
        (*self * cos_theta + (u * phi.cos() + v * phi.sin()) * sin_theta).normalize()
    }

    /// Reflects this direction about a surface normal.
    ///
    /// The normal does not need a particular orientation; the component
    /// along it is inverted either way.
    pub fn reflect(&self, normal: &Vec3) -> Self {
        *self - *normal * (2.0 * self.dot(normal))
    }
}
