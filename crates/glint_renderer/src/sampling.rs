//! Random sampling helpers.

use glint_math::Vec2;

/// Map two uniform numbers to a point uniformly distributed over the unit
/// disk (polar mapping: radius `sqrt(u1)`, angle `2π·u2`).
#[inline]
pub fn uniform_sample_disk(u1: f32, u2: f32) -> Vec2 {
    let r = u1.sqrt();
    let theta = std::f32::consts::TAU * u2;
    Vec2::new(r * theta.cos(), r * theta.sin())
}
