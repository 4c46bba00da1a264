//! Glint Renderer - interactive direct-lighting ray tracer.
//!
//! A fixed pool of worker threads claims image rows, traces one camera ray
//! per pixel against a [`Scene`], and shades hits with the direct light from
//! point and area lights (with shadow rays).

mod bvh;
mod camera;
mod config;
#[cfg(feature = "embree")]
mod embree;
mod framebuffer;
mod integrator;
mod intersect;
mod light;
mod renderer;
mod sampling;
mod scene;

pub use bvh::{BvhBackend, TriangleBvh};
pub use camera::{Camera, InputListener, InteractiveCamera, Key, Mouse};
pub use config::{LightConfig, OrbitConfig, RenderConfig, SceneConfig};
#[cfg(feature = "embree")]
pub use embree::{EmbreeBackend, EmbreeIntersector};
pub use framebuffer::{color_to_rgba, FrameBuffer};
pub use integrator::{estimate_direct, shade_hit, trace, SurfacePoint};
pub use intersect::{BuildError, Hit, Intersector, IntersectorBackend};
pub use light::{AreaDiskLight, Light, LightSample, PointLight, VisibilityTester};
pub use renderer::{RenderError, Renderer};
pub use sampling::uniform_sample_disk;
pub use scene::Scene;

/// Re-export common math types from glint_math
pub use glint_math::{Color, Interval, Ray, Vec3};

/// Offset applied to the origin end of shadow rays.
pub const SHADOW_EPSILON: f32 = 1e-4;
