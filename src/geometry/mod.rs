//! # Geometry Module - Triangulated Scene and Acceleration Structure
//!
//! The simulated sample is a soup of triangles, each carrying the material
//! ids of the regions on its two sides and a detector flag. This module owns
//! the triangle data, the scene bounding box, and an octree over triangle
//! indices that accelerates the boundary queries of the inner loop.
//!
//! The octree build is deliberately plain: leaves hold up to a fixed number
//! of triangle indices and the depth is capped. Triangles spanning several
//! octants are referenced from each; traversal keeps the nearest hit, so
//! duplicates cost time but never correctness.
//!
//! ## Submodules
//!
//! - [`trace`]: ray/triangle and ray/box tests plus the octree traversal
//! - [`tests`]: unit tests for build and traversal

// Ray traversal entry points
pub mod trace;

use crate::vector::Vec3;
use serde::{Deserialize, Serialize};

/// Maximum triangle indices held by an octree leaf before it splits.
const LEAF_TRIANGLES: usize = 16;
/// Hard cap on octree depth; spanning triangles stop subdivision paying off.
const MAX_DEPTH: usize = 8;

/// One boundary triangle of the sample.
///
/// `material_in` is the region id on the side the normal points away from,
/// `material_out` the id on the side it points towards; either may be
/// [`crate::particle::VACUUM`]. A crossing of a `detector` triangle ends the
/// electron's walk and emits a detected record.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Triangle {
    pub vertices: [Vec3; 3],
    pub material_in: i32,
    pub material_out: i32,
    pub detector: bool,
}

impl Triangle {
    pub fn new(a: Vec3, b: Vec3, c: Vec3, material_in: i32, material_out: i32) -> Self {
        Triangle {
            vertices: [a, b, c],
            material_in,
            material_out,
            detector: false,
        }
    }

    /// Marks this triangle as a detector surface.
    pub fn with_detector(mut self) -> Self {
        self.detector = true;
        self
    }

    /// Unit normal by the right-hand rule over the vertex winding.
    pub fn normal(&self) -> Vec3 {
        let edge1 = self.vertices[1] - self.vertices[0];
        let edge2 = self.vertices[2] - self.vertices[0];
        edge1.cross(&edge2).normalize()
    }

    /// Axis-aligned bounding box of the three vertices.
    pub fn aabb(&self) -> Aabb {
        let mut bounds = Aabb::point(self.vertices[0]);
        bounds.grow(self.vertices[1]);
        bounds.grow(self.vertices[2]);
        bounds
    }
}

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    /// A degenerate box containing exactly one point.
    pub fn point(p: Vec3) -> Self {
        Aabb { min: p, max: p }
    }

    /// Expands the box to contain `p`.
    pub fn grow(&mut self, p: Vec3) {
        self.min = self.min.min(&p);
        self.max = self.max.max(&p);
    }

    /// Expands the box equally on all sides.
    pub fn pad(&self, margin: f32) -> Self {
        let m = Vec3::new(margin, margin, margin);
        Aabb {
            min: self.min - m,
            max: self.max + m,
        }
    }

    /// Whether `p` lies inside or on the boundary of the box.
    pub fn contains(&self, p: &Vec3) -> bool {
        p.x >= self.min.x
            && p.x <= self.max.x
            && p.y >= self.min.y
            && p.y <= self.max.y
            && p.z >= self.min.z
            && p.z <= self.max.z
    }

    /// Whether two boxes overlap (boundaries touching counts).
    pub fn intersects(&self, other: &Aabb) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
            && self.min.z <= other.max.z
            && self.max.z >= other.min.z
    }

    /// Geometric centre of the box.
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// The octant sub-box selected by the three bits of `index`.
    fn octant(&self, index: usize) -> Aabb {
        let c = self.center();
        let mut min = self.min;
        let mut max = c;
        if index & 1 != 0 {
            min.x = c.x;
            max.x = self.max.x;
        }
        if index & 2 != 0 {
            min.y = c.y;
            max.y = self.max.y;
        }
        if index & 4 != 0 {
            min.z = c.z;
            max.z = self.max.z;
        }
        Aabb { min, max }
    }
}

/// Child marker for octree leaves.
const NO_CHILD: u32 = u32::MAX;

/// One octree node; leaves carry triangle indices, internal nodes carry
/// eight child slots.
#[derive(Debug, Clone)]
pub(crate) struct Node {
    pub(crate) bounds: Aabb,
    pub(crate) children: [u32; 8],
    pub(crate) triangles: Vec<u32>,
    pub(crate) leaf: bool,
}

/// The immutable geometry handle handed to every simulation driver.
///
/// Built once by the orchestrator after loading and shared read-only by all
/// workers for the lifetime of the run.
#[derive(Debug)]
pub struct Scene {
    triangles: Vec<Triangle>,
    bounds: Aabb,
    pub(crate) nodes: Vec<Node>,
}

impl Scene {
    /// Builds the acceleration structure over a triangle soup.
    ///
    /// The scene bounds are padded by a small fraction of the extent so that
    /// rays grazing the outermost faces still traverse the tree.
    pub fn new(triangles: Vec<Triangle>) -> Self {
        let mut bounds = if triangles.is_empty() {
            Aabb::point(Vec3::zero())
        } else {
            triangles
                .iter()
                .skip(1)
                .fold(triangles[0].aabb(), |mut acc, t| {
                    acc.grow(t.vertices[0]);
                    acc.grow(t.vertices[1]);
                    acc.grow(t.vertices[2]);
                    acc
                })
        };
        let extent = (bounds.max - bounds.min).norm().max(1.0);
        bounds = bounds.pad(extent * 1e-4);

        let mut nodes = Vec::new();
        let all: Vec<u32> = (0..triangles.len() as u32).collect();
        build_node(&mut nodes, &triangles, all, bounds, 0);
        Scene {
            triangles,
            bounds,
            nodes,
        }
    }

    /// Bounding box of the whole sample, padded.
    pub fn bounds(&self) -> &Aabb {
        &self.bounds
    }

    pub fn triangles(&self) -> &[Triangle] {
        &self.triangles
    }

    pub fn triangle(&self, id: u32) -> &Triangle {
        &self.triangles[id as usize]
    }

    /// Largest non-vacuum material id referenced by any triangle, if any.
    ///
    /// The orchestrator cross-checks this against the number of loaded
    /// materials before publishing the geometry.
    pub fn max_material_id(&self) -> Option<i32> {
        self.triangles
            .iter()
            .flat_map(|t| [t.material_in, t.material_out])
            .filter(|&m| m >= 0)
            .max()
    }
}

/// Recursively builds one octree node and returns its index.
fn build_node(
    nodes: &mut Vec<Node>,
    triangles: &[Triangle],
    indices: Vec<u32>,
    bounds: Aabb,
    depth: usize,
) -> u32 {
    let id = nodes.len() as u32;
    nodes.push(Node {
        bounds,
        children: [NO_CHILD; 8],
        triangles: Vec::new(),
        leaf: true,
    });

    if indices.len() <= LEAF_TRIANGLES || depth >= MAX_DEPTH {
        nodes[id as usize].triangles = indices;
        return id;
    }

    let mut children = [NO_CHILD; 8];
    for (octant, child) in children.iter_mut().enumerate() {
        let child_bounds = bounds.octant(octant);
        let subset: Vec<u32> = indices
            .iter()
            .copied()
            .filter(|&t| triangles[t as usize].aabb().intersects(&child_bounds))
            .collect();
        if !subset.is_empty() {
            *child = build_node(nodes, triangles, subset, child_bounds, depth + 1);
        }
    }
    nodes[id as usize].children = children;
    nodes[id as usize].leaf = false;
    id
}
