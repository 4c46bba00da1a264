//! Light sources.
//!
//! Each light can be sampled for an incident direction and radiance toward
//! a surface point. The returned [`VisibilityTester`] holds the shadow ray
//! that must be unoccluded for the sample to count.

use std::f32::consts::PI;
use std::fmt;

use glint_math::{Color, Interval, Mat4, Mat4Ext, Ray, Vec3};
use rand::{Rng, RngCore};

use crate::sampling::uniform_sample_disk;
use crate::scene::Scene;

/// Bounded shadow ray between a surface point and a light sample.
#[derive(Clone, Copy, Debug)]
pub struct VisibilityTester {
    pub ray: Ray,
    pub ray_t: Interval,
}

impl VisibilityTester {
    /// Segment from `p1` to `p2`.
    ///
    /// The ray starts `eps1` along the segment and stops short of `p2` by
    /// the fraction `eps2` of its length.
    pub fn segment(p1: Vec3, eps1: f32, p2: Vec3, eps2: f32) -> Self {
        let dist = p1.distance(p2);
        Self {
            ray: Ray::new(p1, (p2 - p1).normalize_or_zero()),
            ray_t: Interval::new(eps1, dist * (1.0 - eps2)),
        }
    }

    pub fn unoccluded(&self, scene: &Scene) -> bool {
        !scene.occluded(&self.ray, self.ray_t)
    }
}

/// One sample drawn from a light.
#[derive(Clone, Copy, Debug)]
pub struct LightSample {
    /// Unit direction from the shaded point toward the light sample.
    pub wi: Vec3,
    /// Incident radiance estimate, before visibility.
    pub radiance: Color,
    pub visibility: VisibilityTester,
}

/// Trait for anything that emits light toward a surface point.
pub trait Light: Send + Sync + fmt::Debug {
    /// Draw one sample as seen from world-space point `p`.
    ///
    /// `eps` offsets the shadow ray origin off the surface.
    fn sample(&self, p: Vec3, eps: f32, rng: &mut dyn RngCore) -> LightSample;

    /// Rough total emitted power. Used for diagnostics only.
    fn power(&self, scene: &Scene) -> Color;

    /// True for lights with no extent, which need only one sample.
    fn is_delta(&self) -> bool;

    /// Samples to draw per shaded point. Always at least 1.
    fn n_samples(&self) -> usize;
}

/// Isotropic point light.
#[derive(Clone, Debug)]
pub struct PointLight {
    position: Vec3,
    intensity: Color,
}

impl PointLight {
    pub fn new(position: Vec3, intensity: Color) -> Self {
        Self {
            position,
            intensity,
        }
    }

    /// Point light at the origin of `light_to_world`.
    pub fn from_transform(light_to_world: Mat4, intensity: Color) -> Self {
        Self::new(light_to_world.transform_point3(Vec3::ZERO), intensity)
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }
}

impl Light for PointLight {
    fn sample(&self, p: Vec3, eps: f32, _rng: &mut dyn RngCore) -> LightSample {
        let dist_sq = self.position.distance_squared(p);
        // A light sitting on the shaded point contributes nothing
        let radiance = if dist_sq > 0.0 {
            self.intensity / dist_sq
        } else {
            Color::ZERO
        };

        LightSample {
            wi: (self.position - p).normalize_or_zero(),
            radiance,
            visibility: VisibilityTester::segment(p, eps, self.position, 0.0),
        }
    }

    fn power(&self, _scene: &Scene) -> Color {
        4.0 * PI * self.intensity
    }

    fn is_delta(&self) -> bool {
        true
    }

    fn n_samples(&self) -> usize {
        1
    }
}

/// One-sided disk emitter.
///
/// The disk lies in the local XY plane at z = `height` and emits toward
/// local +Z.
#[derive(Clone)]
pub struct AreaDiskLight {
    light_to_world: Mat4,
    n_samples: usize,
    le: Color,
    radius: f32,
    height: f32,
    /// World-space emission normal.
    normal: Vec3,
}

/// Fraction of the shadow segment left unchecked at the light end, so the
/// ray does not hit geometry the disk is embedded in.
const DISK_SHADOW_EPSILON: f32 = 1e-3;

impl AreaDiskLight {
    pub fn new(light_to_world: Mat4, n_samples: usize, le: Color, radius: f32, height: f32) -> Self {
        Self {
            light_to_world,
            n_samples: n_samples.max(1),
            le,
            radius,
            height,
            normal: light_to_world.transform_vector3(Vec3::Z),
        }
    }

    /// Disk centered at `from` facing `to`.
    pub fn looking_at(from: Vec3, to: Vec3, up: Vec3, n_samples: usize, le: Color, radius: f32) -> Self {
        Self::new(Mat4::camera_look_at(from, to, up), n_samples, le, radius, 0.0)
    }

    /// World-space point on the disk for uniform numbers `u1`, `u2`.
    pub fn sample_point(&self, u1: f32, u2: f32) -> Vec3 {
        let d = uniform_sample_disk(u1, u2) * self.radius;
        self.light_to_world
            .transform_point3(Vec3::new(d.x, d.y, self.height))
    }

    pub fn normal(&self) -> Vec3 {
        self.normal
    }

    pub fn radius(&self) -> f32 {
        self.radius
    }
}

impl Light for AreaDiskLight {
    fn sample(&self, p: Vec3, eps: f32, rng: &mut dyn RngCore) -> LightSample {
        let u1 = rng.gen::<f32>();
        let u2 = rng.gen::<f32>();
        let ps = self.sample_point(u1, u2);

        let wi = (ps - p).normalize();
        let outgoing = (-self.normal.dot(wi)).max(0.0);

        LightSample {
            wi,
            radiance: self.le * (outgoing / ps.distance_squared(p)),
            visibility: VisibilityTester::segment(p, eps, ps, DISK_SHADOW_EPSILON),
        }
    }

    fn power(&self, _scene: &Scene) -> Color {
        4.0 * PI * self.le
    }

    fn is_delta(&self) -> bool {
        false
    }

    fn n_samples(&self) -> usize {
        self.n_samples
    }
}

impl fmt::Debug for AreaDiskLight {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AreaDiskLight")
            .field("center", &self.light_to_world.transform_point3(Vec3::new(0.0, 0.0, self.height)))
            .field("normal", &self.normal)
            .field("radius", &self.radius)
            .field("le", &self.le)
            .field("n_samples", &self.n_samples)
            .finish()
    }
}
