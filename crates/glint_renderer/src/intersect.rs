//! Interface to the ray/triangle intersection engine.

use glint_core::BuildTriangle;
use glint_math::{Aabb, Interval, Ray, Vec3};
use thiserror::Error;

/// Nearest hit returned by an [`Intersector`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Hit {
    pub object_id: u32,
    pub face_id: u32,
    /// Barycentric weight of the triangle's second vertex.
    pub u: f32,
    /// Barycentric weight of the triangle's third vertex.
    pub v: f32,
    /// Ray parameter of the hit.
    pub t: f32,
}

/// Errors that can occur while building an acceleration structure.
#[derive(Error, Debug)]
pub enum BuildError {
    #[error("triangle {face_id} of object {object_id} references vertex {index}, but only {vertex_count} vertices exist")]
    IndexOutOfRange {
        object_id: u32,
        face_id: u32,
        index: u32,
        vertex_count: usize,
    },

    #[error("intersection device error: {0}")]
    Device(String),
}

/// Built acceleration structure.
///
/// Queries take `&self` and may be issued from any number of threads at
/// once.
pub trait Intersector: Send + Sync {
    /// Nearest hit with `t` inside `ray_t`.
    fn intersect(&self, ray: &Ray, ray_t: Interval) -> Option<Hit>;

    /// True if anything is hit inside `ray_t`.
    fn occluded(&self, ray: &Ray, ray_t: Interval) -> bool;

    /// World-space bounds of all geometry.
    fn bounds(&self) -> Aabb;
}

/// Factory that turns flat vertex/triangle buffers into an [`Intersector`].
pub trait IntersectorBackend {
    fn name(&self) -> &'static str;

    fn build(
        &self,
        vertices: Vec<Vec3>,
        triangles: Vec<BuildTriangle>,
    ) -> Result<Box<dyn Intersector>, BuildError>;
}

/// Check every triangle index against the vertex buffer.
pub(crate) fn validate_triangles(vertices: &[Vec3], triangles: &[BuildTriangle]) -> Result<(), BuildError> {
    for tri in triangles {
        if let Some(&index) = tri.indices.iter().find(|&&i| i as usize >= vertices.len()) {
            return Err(BuildError::IndexOutOfRange {
                object_id: tri.object_id,
                face_id: tri.face_id,
                index,
                vertex_count: vertices.len(),
            });
        }
    }
    Ok(())
}

/// Möller-Trumbore ray-triangle intersection.
///
/// Returns `(t, u, v)` where `u` and `v` weight `v1` and `v2`.
#[inline]
pub(crate) fn intersect_triangle(ray: &Ray, ray_t: Interval, v0: Vec3, v1: Vec3, v2: Vec3) -> Option<(f32, f32, f32)> {
    let edge1 = v1 - v0;
    let edge2 = v2 - v0;

    let h = ray.direction.cross(edge2);
    let a = edge1.dot(h);

    // Ray is parallel to the triangle (or the triangle is degenerate)
    if a.abs() < 1e-12 {
        return None;
    }

    let f = 1.0 / a;
    let s = ray.origin - v0;
    let u = f * s.dot(h);
    if !(0.0..=1.0).contains(&u) {
        return None;
    }

    let q = s.cross(edge1);
    let v = f * ray.direction.dot(q);
    if v < 0.0 || u + v > 1.0 {
        return None;
    }

    let t = f * edge2.dot(q);
    if !ray_t.contains(t) {
        return None;
    }

    Some((t, u, v))
}
