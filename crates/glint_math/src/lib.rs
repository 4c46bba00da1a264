// Re-export glam for convenience
pub use glam::*;

// Glint math types
mod aabb;
mod interval;
mod ray;
mod transform;

pub use aabb::Aabb;
pub use interval::Interval;
pub use ray::Ray;
pub use transform::Mat4Ext;

/// Linear RGB color. Channels are unbounded radiance values until display.
pub type Color = Vec3;

/// Barycentric interpolation with `(u, v)` weighting `v1` and `v2`;
/// `v0` receives the remaining `1 - u - v`.
#[inline]
pub fn bary_lerp<T>(v0: T, v1: T, v2: T, u: f32, v: f32) -> T
where
    T: std::ops::Mul<f32, Output = T> + std::ops::Add<Output = T>,
{
    v1 * u + v2 * v + v0 * (1.0 - u - v)
}
