//! Perspective camera and an orbit-style interactive wrapper.
//!
//! Camera space is +X right, +Y up, +Z forward. Raster space has its origin
//! at the top-left pixel corner with +Y pointing down the image.

use std::f32::consts::{FRAC_PI_2, PI, TAU};

use glint_math::{Mat4, Mat4Ext, Quat, Ray, Vec3};

/// Near clip distance for the perspective transform.
const NEAR: f32 = 1e-2;
/// Far clip distance for the perspective transform.
const FAR: f32 = 1000.0;

/// Pinhole camera mapping raster pixels to world-space rays.
#[derive(Clone, Debug)]
pub struct Camera {
    camera_to_world: Mat4,
    width: u32,
    height: u32,

    // Derived once from resolution, screen window and fov
    camera_to_screen: Mat4,
    screen_to_raster: Mat4,
    raster_to_camera: Mat4,
}

impl Camera {
    /// Create a camera.
    ///
    /// `screen_window` is `[x_min, x_max, y_min, y_max]` in screen space and
    /// `fov` is the full field of view in radians.
    pub fn new(camera_to_world: Mat4, width: u32, height: u32, screen_window: [f32; 4], fov: f32) -> Self {
        let [x_min, x_max, y_min, y_max] = screen_window;

        let screen_to_raster = Mat4::from_scale(Vec3::new(width as f32, height as f32, 1.0))
            * Mat4::from_scale(Vec3::new(1.0 / (x_max - x_min), 1.0 / (y_min - y_max), 1.0))
            * Mat4::from_translation(Vec3::new(-x_min, -y_max, 0.0));
        let raster_to_screen = screen_to_raster.inverse();

        let camera_to_screen = Mat4::perspective_screen(fov, NEAR, FAR);
        let raster_to_camera = camera_to_screen.inverse() * raster_to_screen;

        Self {
            camera_to_world,
            width,
            height,
            camera_to_screen,
            screen_to_raster,
            raster_to_camera,
        }
    }

    /// Primary ray through the center of pixel `(x, y)`.
    pub fn generate_ray(&self, x: u32, y: u32) -> Ray {
        let raster = Vec3::new(x as f32 + 0.5, y as f32 + 0.5, 0.0);
        let p_camera = self.raster_to_camera.project_point3(raster).normalize();

        let origin = self.camera_to_world.transform_point3(Vec3::ZERO);
        let direction = self.camera_to_world.transform_vector3(p_camera).normalize();
        Ray::new(origin, direction)
    }

    pub fn camera_to_world(&self) -> Mat4 {
        self.camera_to_world
    }

    pub fn set_camera_to_world(&mut self, camera_to_world: Mat4) {
        self.camera_to_world = camera_to_world;
    }

    /// World-space eye position.
    pub fn position(&self) -> Vec3 {
        self.camera_to_world.transform_point3(Vec3::ZERO)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn camera_to_screen(&self) -> Mat4 {
        self.camera_to_screen
    }

    pub fn screen_to_raster(&self) -> Mat4 {
        self.screen_to_raster
    }
}

/// Keys the viewer forwards to listeners.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Key {
    W,
    S,
    Other,
}

/// Mouse state in device pixels.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Mouse {
    pub x: f32,
    pub y: f32,
    pub left: bool,
}

/// Receiver for input events delivered by the display.
///
/// Events arrive on the display thread, never on render workers.
pub trait InputListener {
    fn on_key_pressed(&mut self, _key: Key) {}
    fn on_mouse_button_down(&mut self, _mouse: Mouse) {}
    fn on_mouse_move(&mut self, _mouse: Mouse) {}
}

/// Camera orbiting the world origin.
///
/// `W`/`S` zoom in and out; dragging with the left button rotates.
#[derive(Clone, Debug)]
pub struct InteractiveCamera {
    camera: Camera,
    /// Elevation above the XZ plane, radians.
    theta: f32,
    /// Rotation about +Y, radians.
    phi: f32,
    /// Distance from the origin.
    r: f32,
    last_mouse: Mouse,
}

impl InteractiveCamera {
    pub const ROTATE_SPEED: f32 = 1e-2;
    pub const MAX_THETA: f32 = FRAC_PI_2 * 0.9;
    pub const MIN_DIST: f32 = 0.1;
    pub const MAX_DIST: f32 = 1e3;
    pub const ZOOM_RATIO: f32 = 1.1;

    pub fn new(width: u32, height: u32, screen_window: [f32; 4], fov: f32) -> Self {
        let mut camera = Self {
            camera: Camera::new(Mat4::IDENTITY, width, height, screen_window, fov),
            theta: 0.0,
            phi: 0.0,
            r: 1.0,
            last_mouse: Mouse::default(),
        };
        camera.recompute();
        camera
    }

    /// Set the orbit position. Values are clamped/wrapped into range.
    pub fn with_orbit(mut self, theta: f32, phi: f32, r: f32) -> Self {
        self.theta = theta.clamp(-Self::MAX_THETA, Self::MAX_THETA);
        self.phi = wrap_angle(phi);
        self.r = r.clamp(Self::MIN_DIST, Self::MAX_DIST);
        self.recompute();
        self
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn theta(&self) -> f32 {
        self.theta
    }

    pub fn phi(&self) -> f32 {
        self.phi
    }

    pub fn r(&self) -> f32 {
        self.r
    }

    /// Rebuild camera-to-world from the orbit parameters.
    fn recompute(&mut self) {
        let orbit = Quat::from_axis_angle(Vec3::Y, self.phi) * Quat::from_axis_angle(Vec3::NEG_X, self.theta);
        let origin = orbit * Vec3::new(0.0, 0.0, self.r);
        self.camera
            .set_camera_to_world(Mat4::camera_look_at(origin, Vec3::ZERO, Vec3::Y));
    }
}

impl InputListener for InteractiveCamera {
    fn on_key_pressed(&mut self, key: Key) {
        match key {
            Key::W => self.r /= Self::ZOOM_RATIO,
            Key::S => self.r *= Self::ZOOM_RATIO,
            Key::Other => {}
        }
        self.r = self.r.clamp(Self::MIN_DIST, Self::MAX_DIST);
        self.recompute();
    }

    fn on_mouse_button_down(&mut self, mouse: Mouse) {
        if mouse.left {
            self.last_mouse = mouse;
        }
    }

    fn on_mouse_move(&mut self, mouse: Mouse) {
        if !mouse.left {
            return;
        }
        let dx = mouse.x - self.last_mouse.x;
        let dy = mouse.y - self.last_mouse.y;

        self.phi = wrap_angle(self.phi - Self::ROTATE_SPEED * dx);
        self.theta = (self.theta + Self::ROTATE_SPEED * dy).clamp(-Self::MAX_THETA, Self::MAX_THETA);
        self.recompute();

        self.last_mouse = mouse;
    }
}

/// Wrap an angle into `(-π, π]`.
fn wrap_angle(angle: f32) -> f32 {
    let a = angle % TAU;
    if a > PI {
        a - TAU
    } else if a <= -PI {
        a + TAU
    } else {
        a
    }
}
