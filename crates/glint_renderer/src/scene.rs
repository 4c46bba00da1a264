//! Renderable world: meshes, lights and the acceleration structure built
//! over them.

use std::sync::Arc;

use glint_core::{BuildTriangle, Object};
use glint_math::{Aabb, Interval, Ray, Vec3};

use crate::bvh::BvhBackend;
use crate::intersect::{BuildError, Hit, Intersector, IntersectorBackend};
use crate::light::Light;

/// Objects and lights plus the intersector built over the objects.
///
/// Read-only once built; share it between render threads behind an `Arc`.
pub struct Scene {
    objects: Vec<Object>,
    lights: Vec<Arc<dyn Light>>,
    intersector: Box<dyn Intersector>,
    vertex_count: usize,
    triangle_count: usize,
}

impl Scene {
    /// Build a scene using the built-in BVH.
    pub fn build(objects: Vec<Object>, lights: Vec<Arc<dyn Light>>) -> Result<Self, BuildError> {
        Self::build_with(objects, lights, &BvhBackend)
    }

    /// Build a scene with a specific intersection backend.
    ///
    /// All objects are packed into one vertex buffer and one triangle buffer
    /// (one triangle per face) before being handed to `backend`.
    pub fn build_with(
        objects: Vec<Object>,
        lights: Vec<Arc<dyn Light>>,
        backend: &dyn IntersectorBackend,
    ) -> Result<Self, BuildError> {
        let vertex_count: usize = objects.iter().map(Object::vertex_count).sum();
        let triangle_count: usize = objects.iter().map(Object::triangle_count).sum();

        let mut vertices = vec![Vec3::ZERO; vertex_count];
        let mut triangles = vec![
            BuildTriangle {
                indices: [0; 3],
                object_id: 0,
                face_id: 0,
            };
            triangle_count
        ];

        let mut vertex_offset = 0;
        let mut triangle_offset = 0;
        for (object_id, object) in objects.iter().enumerate() {
            let nv = object.vertex_count();
            let nt = object.triangle_count();
            object.export_into(
                object_id as u32,
                vertex_offset as u32,
                &mut vertices[vertex_offset..vertex_offset + nv],
                &mut triangles[triangle_offset..triangle_offset + nt],
            );
            vertex_offset += nv;
            triangle_offset += nt;
        }

        log::info!(
            "Building scene with {} triangles and {} vertices ({} backend)...",
            triangle_count,
            vertex_count,
            backend.name()
        );
        let intersector = backend.build(vertices, triangles)?;

        let scene = Self {
            objects,
            lights,
            intersector,
            vertex_count,
            triangle_count,
        };
        scene.log_summary();
        Ok(scene)
    }

    fn log_summary(&self) {
        let bounds = self.bounds();
        if bounds.is_empty() {
            log::warn!("Scene: no geometry, {} light(s)", self.lights.len());
        } else {
            log::info!(
                "Scene: {} object(s), {} light(s), bounds {:?} .. {:?}",
                self.objects.len(),
                self.lights.len(),
                bounds.min(),
                bounds.max()
            );
        }
        for (i, light) in self.lights.iter().enumerate() {
            log::info!("  light {}: power {:?}, {:?}", i, light.power(self), light);
        }
    }

    /// Nearest hit along `ray` within `ray_t`.
    pub fn intersect(&self, ray: &Ray, ray_t: Interval) -> Option<Hit> {
        self.intersector.intersect(ray, ray_t)
    }

    /// True if anything blocks `ray` within `ray_t`.
    pub fn occluded(&self, ray: &Ray, ray_t: Interval) -> bool {
        self.intersector.occluded(ray, ray_t)
    }

    pub fn objects(&self) -> &[Object] {
        &self.objects
    }

    pub fn object(&self, id: u32) -> Option<&Object> {
        self.objects.get(id as usize)
    }

    pub fn lights(&self) -> &[Arc<dyn Light>] {
        &self.lights
    }

    pub fn bounds(&self) -> Aabb {
        self.intersector.bounds()
    }

    pub fn vertex_count(&self) -> usize {
        self.vertex_count
    }

    pub fn triangle_count(&self) -> usize {
        self.triangle_count
    }
}
