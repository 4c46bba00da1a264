//! Direct-lighting integrator.
//!
//! No indirect bounces: a pixel's color is the light arriving straight from
//! each light source at the first surface hit, with shadow rays.

use glint_math::{bary_lerp, Color, Interval, Ray, Vec3};
use rand::RngCore;

use crate::config::RenderConfig;
use crate::intersect::Hit;
use crate::scene::Scene;

/// Shading frame at a ray hit.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SurfacePoint {
    /// World-space position.
    pub p: Vec3,
    /// Geometric normal, facing the incoming ray.
    pub ng: Vec3,
    /// Shading normal, in the same hemisphere as `ng`.
    pub ns: Vec3,
}

impl SurfacePoint {
    /// Reconstruct the hit point and normals from the hit triangle.
    ///
    /// The shading normal interpolates the face's vertex normals when all
    /// three are present and falls back to the geometric normal otherwise.
    pub fn from_hit(scene: &Scene, ray: &Ray, hit: &Hit) -> Option<Self> {
        let object = scene.object(hit.object_id)?;
        let face_id = hit.face_id as usize;
        if face_id >= object.faces.len() {
            return None;
        }

        let [v0, v1, v2] = object.triangle_positions(face_id);
        let p = bary_lerp(v0, v1, v2, hit.u, hit.v);

        let mut ng = (v1 - v0).cross(v2 - v0).normalize();
        if ng.dot(ray.direction) > 0.0 {
            ng = -ng;
        }

        let mut ns = object
            .triangle_vertex_normals(face_id)
            .map(|[n0, n1, n2]| bary_lerp(n0, n1, n2, hit.u, hit.v).normalize())
            .filter(|n| n.is_finite())
            .unwrap_or(ng);
        if ns.dot(ng) < 0.0 {
            ns = -ns;
        }

        Some(Self { p, ng, ns })
    }
}

/// Lambertian response, broadcast to all three channels.
#[inline]
fn lambert(ns: Vec3, wi: Vec3) -> Color {
    Color::splat(ns.dot(wi).max(0.0))
}

/// Sum the direct light from every light in `scene` at `surface`.
///
/// Each light contributes `n_samples()` samples weighted `1 / n_samples()`.
/// Samples from behind the geometric normal or blocked by geometry are
/// dropped. The result is not clamped.
pub fn estimate_direct(scene: &Scene, surface: &SurfacePoint, eps: f32, rng: &mut dyn RngCore) -> Color {
    let mut radiance = Color::ZERO;

    for light in scene.lights() {
        let n = light.n_samples();
        let weight = 1.0 / n as f32;

        for _ in 0..n {
            let sample = light.sample(surface.p, eps, rng);
            if surface.ng.dot(sample.wi) <= 0.0 {
                continue;
            }
            if !sample.visibility.unoccluded(scene) {
                continue;
            }
            radiance += lambert(surface.ns, sample.wi) * sample.radiance * weight;
        }
    }

    radiance
}

/// Direct lighting at the surface struck by `ray`.
pub fn shade_hit(scene: &Scene, ray: &Ray, hit: &Hit, eps: f32, rng: &mut dyn RngCore) -> Color {
    match SurfacePoint::from_hit(scene, ray, hit) {
        Some(surface) => estimate_direct(scene, &surface, eps, rng),
        None => Color::ZERO,
    }
}

/// Color seen along a camera ray.
pub fn trace(scene: &Scene, ray: &Ray, config: &RenderConfig, rng: &mut dyn RngCore) -> Color {
    match scene.intersect(ray, Interval::from_min(0.0)) {
        Some(hit) => shade_hit(scene, ray, &hit, config.shadow_epsilon, rng),
        None => config.background,
    }
}
