//! Ray traversal over the triangulated scene.
//!
//! This is the intersector of the simulation: given a particle position and
//! direction it reports the nearest boundary triangle within a step length,
//! or nothing. The octree is walked with an explicit stack; leaves run a
//! Möller–Trumbore test per triangle.

use super::{NO_CHILD, Scene, Triangle};
use crate::vector::Vec3;

/// Intersections closer than this are discarded as numerical echoes of the
/// surface the ray starts on.
const SURFACE_EPSILON: f32 = 1e-5;

/// Determinant threshold below which a ray counts as parallel to a triangle.
const PARALLEL_EPSILON: f32 = 1e-9;

/// The nearest boundary crossing found within a step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hit {
    pub triangle: u32,
    pub distance: f32,
}

impl Scene {
    /// Finds the nearest triangle crossed by the ray within `max_distance`.
    ///
    /// `skip` names a triangle excluded from the test; the driver passes the
    /// triangle it just crossed so the particle does not immediately re-hit
    /// the surface it is sitting on. `max_distance` may be infinite for
    /// particles in vacuum.
    pub fn trace(
        &self,
        origin: Vec3,
        direction: Vec3,
        max_distance: f32,
        skip: Option<u32>,
    ) -> Option<Hit> {
        if self.nodes.is_empty() {
            return None;
        }

        let mut best: Option<Hit> = None;
        let mut limit = max_distance;
        let mut stack = vec![0u32];

        while let Some(id) = stack.pop() {
            let node = &self.nodes[id as usize];
            if !ray_hits_aabb(origin, direction, &node.bounds, limit) {
                continue;
            }
            if node.leaf {
                for &t in &node.triangles {
                    if skip == Some(t) {
                        continue;
                    }
                    if let Some(distance) =
                        ray_triangle(origin, direction, &self.triangles[t as usize])
                    {
                        if distance <= limit {
                            limit = distance;
                            best = Some(Hit {
                                triangle: t,
                                distance,
                            });
                        }
                    }
                }
            } else {
                for &child in &node.children {
                    if child != NO_CHILD {
                        stack.push(child);
                    }
                }
            }
        }
        best
    }
}

/// Möller–Trumbore ray/triangle intersection.
///
/// Returns the ray parameter of the crossing, or `None` when the ray misses,
/// runs parallel to the plane, or starts on the surface itself.
fn ray_triangle(origin: Vec3, direction: Vec3, triangle: &Triangle) -> Option<f32> {
    let edge1 = triangle.vertices[1] - triangle.vertices[0];
    let edge2 = triangle.vertices[2] - triangle.vertices[0];

    let pvec = direction.cross(&edge2);
    let det = edge1.dot(&pvec);
    if det.abs() < PARALLEL_EPSILON {
        return None;
    }
    let inv_det = det.recip();

    let tvec = origin - triangle.vertices[0];
    let u = tvec.dot(&pvec) * inv_det;
    if !(0.0..=1.0).contains(&u) {
        return None;
    }

    let qvec = tvec.cross(&edge1);
    let v = direction.dot(&qvec) * inv_det;
    if v < 0.0 || u + v > 1.0 {
        return None;
    }

    let t = edge2.dot(&qvec) * inv_det;
    if t > SURFACE_EPSILON { Some(t) } else { None }
}

/// Slab test for a ray segment `[0, limit]` against a box.
///
/// Axes the ray runs parallel to degrade to an interval containment check,
/// which avoids the 0·∞ NaN of the naive reciprocal form.
fn ray_hits_aabb(origin: Vec3, direction: Vec3, bounds: &super::Aabb, limit: f32) -> bool {
    let mut t_enter = 0.0f32;
    let mut t_exit = limit;

    for axis in 0..3 {
        let (o, d, lo, hi) = match axis {
            0 => (origin.x, direction.x, bounds.min.x, bounds.max.x),
            1 => (origin.y, direction.y, bounds.min.y, bounds.max.y),
            _ => (origin.z, direction.z, bounds.min.z, bounds.max.z),
        };
        if d.abs() < PARALLEL_EPSILON {
            if o < lo || o > hi {
                return false;
            }
            continue;
        }
        let inv = d.recip();
        let (t0, t1) = if inv >= 0.0 {
            ((lo - o) * inv, (hi - o) * inv)
        } else {
            ((hi - o) * inv, (lo - o) * inv)
        };
        t_enter = t_enter.max(t0);
        t_exit = t_exit.min(t1);
        if t_enter > t_exit {
            return false;
        }
    }
    true
}
