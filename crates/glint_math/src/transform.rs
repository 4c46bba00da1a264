// Transform utilities for Mat4
//
// Camera-space conventions used by the renderer: +X right, +Y up, +Z forward.
// Note: glam::Mat4 already provides transform_point3(), transform_vector3()
// and inverse().

use glam::{Mat4, Vec3, Vec4};

/// Extension trait for Mat4 with the transforms the ray tracer needs.
pub trait Mat4Ext {
    /// Camera-to-world transform for a camera at `from` looking at `to`.
    ///
    /// Columns are (right, up, forward, position) so that camera-space +Z
    /// maps to the viewing direction.
    fn camera_look_at(from: Vec3, to: Vec3, up: Vec3) -> Mat4;

    /// Camera-to-screen perspective projection with a field of view of
    /// `fov` radians and near/far clip distances `n` and `f`.
    fn perspective_screen(fov: f32, n: f32, f: f32) -> Mat4;

    /// Matrix used to carry normals through this transform
    /// (the inverse transpose).
    fn normal_matrix(&self) -> Mat4;
}

impl Mat4Ext for Mat4 {
    fn camera_look_at(from: Vec3, to: Vec3, up: Vec3) -> Mat4 {
        let forward = (to - from).normalize();
        let right = forward.cross(up).normalize();
        let up_ortho = right.cross(forward);

        Mat4::from_cols(
            right.extend(0.0),
            up_ortho.extend(0.0),
            forward.extend(0.0),
            from.extend(1.0),
        )
    }

    fn perspective_screen(fov: f32, n: f32, f: f32) -> Mat4 {
        // Maps camera z in [n, f] to [0, 1] after the divide by w = z.
        let persp = Mat4::from_cols(
            Vec4::new(1.0, 0.0, 0.0, 0.0),
            Vec4::new(0.0, 1.0, 0.0, 0.0),
            Vec4::new(0.0, 0.0, f / (f - n), 1.0),
            Vec4::new(0.0, 0.0, -f * n / (f - n), 0.0),
        );
        let inv_tan = 1.0 / (fov / 2.0).tan();
        Mat4::from_scale(Vec3::new(inv_tan, inv_tan, 1.0)) * persp
    }

    fn normal_matrix(&self) -> Mat4 {
        self.inverse().transpose()
    }
}
