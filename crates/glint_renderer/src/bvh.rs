//! Bounding Volume Hierarchy over an indexed triangle buffer.
//!
//! The default intersection backend. Median split on the longest centroid
//! axis; large subtrees are built in parallel with rayon.

use std::time::Instant;

use glint_core::BuildTriangle;
use glint_math::{Aabb, Interval, Ray, Vec3};

use crate::intersect::{intersect_triangle, validate_triangles, BuildError, Hit, Intersector, IntersectorBackend};

/// Maximum triangles per leaf node before splitting.
const LEAF_MAX_SIZE: usize = 4;

/// Subtrees at least this large are split across threads.
const PARALLEL_BUILD_THRESHOLD: usize = 4096;

/// BVH node - either a branch with two children or a leaf with a range of
/// triangles.
enum BvhNode {
    /// Internal node with two children.
    Branch {
        left: Box<BvhNode>,
        right: Box<BvhNode>,
        bbox: Aabb,
    },
    /// `count` triangles starting at `start` in `TriangleBvh::triangles`.
    Leaf { start: usize, count: usize, bbox: Aabb },
    /// Empty node (for edge cases).
    Empty,
}

impl BvhNode {
    fn bbox(&self) -> Aabb {
        match self {
            BvhNode::Empty => Aabb::EMPTY,
            BvhNode::Leaf { bbox, .. } | BvhNode::Branch { bbox, .. } => *bbox,
        }
    }

    fn count_nodes(&self) -> usize {
        match self {
            BvhNode::Empty => 0,
            BvhNode::Leaf { .. } => 1,
            BvhNode::Branch { left, right, .. } => 1 + left.count_nodes() + right.count_nodes(),
        }
    }
}

/// Triangle with its precomputed bounds, used during construction.
#[derive(Clone, Copy)]
struct PrimRef {
    triangle: BuildTriangle,
    bbox: Aabb,
    centroid: Vec3,
}

/// Pure-Rust acceleration structure for triangle meshes.
pub struct TriangleBvh {
    vertices: Vec<Vec3>,
    /// Reordered so every leaf covers a contiguous range.
    triangles: Vec<BuildTriangle>,
    root: BvhNode,
}

impl TriangleBvh {
    /// Build a BVH. Fails if any triangle references a missing vertex.
    pub fn new(vertices: Vec<Vec3>, triangles: Vec<BuildTriangle>) -> Result<Self, BuildError> {
        validate_triangles(&vertices, &triangles)?;

        let start = Instant::now();
        let mut prims: Vec<PrimRef> = triangles
            .iter()
            .map(|&triangle| {
                let [a, b, c] = triangle.indices.map(|i| vertices[i as usize]);
                let bbox = Aabb::from_point_cloud([a, b, c].iter());
                PrimRef {
                    triangle,
                    bbox,
                    centroid: bbox.centroid(),
                }
            })
            .collect();

        let root = if prims.is_empty() {
            BvhNode::Empty
        } else {
            Self::build(&mut prims, 0)
        };
        let triangles = prims.into_iter().map(|p| p.triangle).collect::<Vec<_>>();

        log::info!(
            "Built BVH over {} triangles in {:.1}ms ({} nodes)",
            triangles.len(),
            start.elapsed().as_secs_f64() * 1000.0,
            root.count_nodes()
        );

        Ok(Self {
            vertices,
            triangles,
            root,
        })
    }

    /// Recursive construction over `prims`, which sits at `offset` in the
    /// final triangle order.
    fn build(prims: &mut [PrimRef], offset: usize) -> BvhNode {
        let n = prims.len();

        let bounds = prims
            .iter()
            .fold(Aabb::EMPTY, |acc, p| Aabb::surrounding(&acc, &p.bbox));

        if n <= LEAF_MAX_SIZE {
            return BvhNode::Leaf {
                start: offset,
                count: n,
                bbox: bounds,
            };
        }

        // Choose split axis based on centroid spread
        let centroid_bounds = Aabb::from_point_cloud(prims.iter().map(|p| &p.centroid));
        let axis = centroid_bounds.longest_axis();

        prims.sort_unstable_by(|a, b| {
            a.centroid[axis]
                .partial_cmp(&b.centroid[axis])
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let mid = n / 2;
        let (left_prims, right_prims) = prims.split_at_mut(mid);

        let (left, right) = if n >= PARALLEL_BUILD_THRESHOLD {
            rayon::join(
                || Self::build(left_prims, offset),
                || Self::build(right_prims, offset + mid),
            )
        } else {
            (
                Self::build(left_prims, offset),
                Self::build(right_prims, offset + mid),
            )
        };

        BvhNode::Branch {
            left: Box::new(left),
            right: Box::new(right),
            bbox: bounds,
        }
    }

    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    fn hit_triangle(&self, triangle: &BuildTriangle, ray: &Ray, ray_t: Interval) -> Option<Hit> {
        let [a, b, c] = triangle.indices.map(|i| self.vertices[i as usize]);
        intersect_triangle(ray, ray_t, a, b, c).map(|(t, u, v)| Hit {
            object_id: triangle.object_id,
            face_id: triangle.face_id,
            u,
            v,
            t,
        })
    }

    fn intersect_node(&self, node: &BvhNode, ray: &Ray, ray_t: Interval) -> Option<Hit> {
        match node {
            BvhNode::Empty => None,

            BvhNode::Leaf { start, count, bbox } => {
                if !bbox.hit(ray, ray_t) {
                    return None;
                }

                let mut closest: Option<Hit> = None;
                for triangle in &self.triangles[*start..start + count] {
                    let max = closest.map_or(ray_t.max, |h| h.t);
                    if let Some(hit) = self.hit_triangle(triangle, ray, Interval::new(ray_t.min, max)) {
                        closest = Some(hit);
                    }
                }
                closest
            }

            BvhNode::Branch { left, right, bbox } => {
                if !bbox.hit(ray, ray_t) {
                    return None;
                }

                let hit_left = self.intersect_node(left, ray, ray_t);

                // Only check right up to closest hit
                let right_t = hit_left.map_or(ray_t, |h| Interval::new(ray_t.min, h.t));
                self.intersect_node(right, ray, right_t).or(hit_left)
            }
        }
    }

    fn occluded_node(&self, node: &BvhNode, ray: &Ray, ray_t: Interval) -> bool {
        match node {
            BvhNode::Empty => false,
            BvhNode::Leaf { start, count, bbox } => {
                bbox.hit(ray, ray_t)
                    && self.triangles[*start..start + count]
                        .iter()
                        .any(|t| self.hit_triangle(t, ray, ray_t).is_some())
            }
            BvhNode::Branch { left, right, bbox } => {
                bbox.hit(ray, ray_t)
                    && (self.occluded_node(left, ray, ray_t) || self.occluded_node(right, ray, ray_t))
            }
        }
    }
}

impl Intersector for TriangleBvh {
    fn intersect(&self, ray: &Ray, ray_t: Interval) -> Option<Hit> {
        self.intersect_node(&self.root, ray, ray_t)
    }

    fn occluded(&self, ray: &Ray, ray_t: Interval) -> bool {
        self.occluded_node(&self.root, ray, ray_t)
    }

    fn bounds(&self) -> Aabb {
        self.root.bbox()
    }
}

/// Builds a [`TriangleBvh`].
#[derive(Clone, Copy, Debug, Default)]
pub struct BvhBackend;

impl IntersectorBackend for BvhBackend {
    fn name(&self) -> &'static str {
        "bvh"
    }

    fn build(
        &self,
        vertices: Vec<Vec3>,
        triangles: Vec<BuildTriangle>,
    ) -> Result<Box<dyn Intersector>, BuildError> {
        Ok(Box::new(TriangleBvh::new(vertices, triangles)?))
    }
}
