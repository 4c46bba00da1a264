//! Renderer and scene configuration.
//!
//! Everything here deserializes from JSON with `serde_json`; missing fields
//! fall back to their defaults.

use std::path::Path;
use std::sync::Arc;

use glint_math::{Color, Mat4, Mat4Ext, Vec3};
use serde::{Deserialize, Serialize};

use crate::camera::InteractiveCamera;
use crate::light::{AreaDiskLight, Light, PointLight};
use crate::renderer::RenderError;
use crate::SHADOW_EPSILON;

/// Render configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Worker threads (0 = one per available core)
    pub threads: usize,
    /// Shadow ray origin offset
    pub shadow_epsilon: f32,
    /// Base seed; worker `i` uses `seed + i`
    pub seed: u64,
    /// Color for rays that hit nothing
    pub background: Color,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            threads: 0,
            shadow_epsilon: SHADOW_EPSILON,
            seed: 42,
            background: Color::ZERO,
        }
    }
}

impl RenderConfig {
    /// Number of worker threads to spawn.
    pub fn thread_count(&self) -> usize {
        if self.threads > 0 {
            self.threads
        } else {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        }
    }
}

/// A light in a scene description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LightConfig {
    Point {
        position: Vec3,
        intensity: Color,
    },
    AreaDisk {
        from: Vec3,
        to: Vec3,
        #[serde(default = "default_up")]
        up: Vec3,
        samples: usize,
        le: Color,
        radius: f32,
        #[serde(default)]
        height: f32,
    },
}

fn default_up() -> Vec3 {
    Vec3::Y
}

impl LightConfig {
    /// Reject placements that leave the light without an orientation.
    pub fn validate(&self) -> Result<(), &'static str> {
        match *self {
            LightConfig::Point { .. } => Ok(()),
            LightConfig::AreaDisk { from, to, up, .. } => {
                let forward = to - from;
                if forward.length_squared() == 0.0 {
                    Err("`from` and `to` are the same point")
                } else if forward.cross(up).length_squared() == 0.0 {
                    Err("`up` is parallel to the viewing direction")
                } else {
                    Ok(())
                }
            }
        }
    }

    pub fn build(&self) -> Arc<dyn Light> {
        match *self {
            LightConfig::Point {
                position,
                intensity,
            } => Arc::new(PointLight::new(position, intensity)),
            LightConfig::AreaDisk {
                from,
                to,
                up,
                samples,
                le,
                radius,
                height,
            } => {
                let light_to_world = Mat4::camera_look_at(from, to, up);
                Arc::new(AreaDiskLight::new(light_to_world, samples, le, radius, height))
            }
        }
    }
}

/// Initial orbit camera placement, in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrbitConfig {
    pub theta_degrees: f32,
    pub phi_degrees: f32,
    pub r: f32,
}

impl Default for OrbitConfig {
    fn default() -> Self {
        Self {
            theta_degrees: 10.0,
            phi_degrees: 90.0,
            r: 5.5,
        }
    }
}

/// Everything the viewer needs besides the meshes themselves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    pub width: u32,
    pub height: u32,
    pub fov_degrees: f32,
    /// `[x_min, x_max, y_min, y_max]` in screen space
    pub screen_window: [f32; 4],
    pub orbit: OrbitConfig,
    pub lights: Vec<LightConfig>,
    /// Display refresh rate while rendering
    pub refresh_hz: f32,
    pub render: RenderConfig,
}

impl Default for SceneConfig {
    fn default() -> Self {
        let disk = |from: Vec3| LightConfig::AreaDisk {
            from,
            to: Vec3::ZERO,
            up: Vec3::Y,
            samples: 128,
            le: Color::splat(12.0),
            radius: 1.0,
            height: 0.0,
        };

        Self {
            width: 1024,
            height: 1024,
            fov_degrees: 30.0,
            screen_window: [-0.5, 0.5, -0.5, 0.5],
            orbit: OrbitConfig::default(),
            lights: vec![disk(Vec3::new(1.0, 2.0, 3.0)), disk(Vec3::new(1.0, 2.0, -3.0))],
            refresh_hz: 20.0,
            render: RenderConfig::default(),
        }
    }
}

impl SceneConfig {
    pub fn from_json(text: &str) -> Result<Self, RenderError> {
        let config: Self = serde_json::from_str(text)?;
        for (index, light) in config.lights.iter().enumerate() {
            light
                .validate()
                .map_err(|reason| RenderError::InvalidLight { index, reason })?;
        }
        Ok(config)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, RenderError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn build_lights(&self) -> Vec<Arc<dyn Light>> {
        self.lights.iter().map(LightConfig::build).collect()
    }

    pub fn interactive_camera(&self) -> InteractiveCamera {
        InteractiveCamera::new(
            self.width,
            self.height,
            self.screen_window,
            self.fov_degrees.to_radians(),
        )
        .with_orbit(
            self.orbit.theta_degrees.to_radians(),
            self.orbit.phi_degrees.to_radians(),
            self.orbit.r,
        )
    }
}
