//! End-to-end: OBJ text -> scene -> one rendered frame.

use std::sync::Arc;

use glint_core::{parse_obj, MaterialLib, Object};
use glint_math::{Mat4, Mat4Ext, Vec3};
use glint_renderer::{
    Camera, Color, FrameBuffer, InputListener, Key, Light, PointLight, RenderConfig, Renderer, Scene, SceneConfig,
};

/// A 2x2 quad in the XZ plane (y = 0) facing up, written with negative
/// indices, plus a small blocker hovering above one half.
const FLOOR_AND_BLOCKER: &str = "\
# floor
v -1 0 -1
v 1 0 -1
v 1 0 1
v -1 0 1
vn 0 1 0
f -4//1 -2//1 -3//1
f -4//1 -1//1 -2//1
# blocker over +X
v 0.2 0.5 -0.3
v 0.8 0.5 -0.3
v 0.8 0.5 0.3
v 0.2 0.5 0.3
f 5 7 6
f 5 8 7
";

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn load_scene(lights: Vec<Arc<dyn Light>>) -> Arc<Scene> {
    init_logging();
    let mut materials = MaterialLib::new();
    let (object, stats) = parse_obj("floor", FLOOR_AND_BLOCKER, None, &mut materials);
    assert_eq!(stats.skipped_lines, 0);
    assert_eq!(object.face_count(), 4);
    Arc::new(Scene::build(vec![object], lights).unwrap())
}

fn top_down_camera(size: u32) -> Camera {
    let to_world = Mat4::camera_look_at(Vec3::new(0.0, 4.0, 0.0), Vec3::ZERO, Vec3::Z);
    Camera::new(to_world, size, size, [-0.5, 0.5, -0.5, 0.5], 60f32.to_radians())
}

fn render(scene: Arc<Scene>, camera: &Camera, threads: usize) -> Arc<FrameBuffer> {
    let pixels = Arc::new(FrameBuffer::new(camera.width(), camera.height()));
    let config = RenderConfig {
        threads,
        background: Color::new(0.0, 0.0, 1.0),
        ..Default::default()
    };
    let mut renderer = Renderer::new(config).unwrap();
    renderer.start(scene, camera, Arc::clone(&pixels)).unwrap();
    renderer.wait();
    assert!(renderer.done());
    pixels
}

/// World point seen through the center of pixel (x, y).
fn floor_point(camera: &Camera, x: u32, y: u32) -> Vec3 {
    let ray = camera.generate_ray(x, y);
    ray.at(-ray.origin.y / ray.direction.y)
}

#[test]
fn test_point_light_frame() {
    let light: Arc<dyn Light> = Arc::new(PointLight::new(Vec3::new(-0.5, 2.0, 0.0), Color::splat(4.0)));
    let scene = load_scene(vec![light]);
    let camera = top_down_camera(64);
    let pixels = render(scene, &camera, 4);

    // Corners see past the floor
    assert_eq!(pixels.get(0, 0), 0x0000_00FF);

    // Find a pixel on the open -X half and one looking at the blocker
    let mut lit = None;
    let mut on_blocker = None;
    for y in 0..64 {
        for x in 0..64 {
            let p = floor_point(&camera, x, y);
            if p.x < -0.3 && p.z.abs() < 0.2 {
                lit = Some((x, y));
            }
            if p.x > 0.4 && p.x < 0.6 && p.z.abs() < 0.1 {
                on_blocker = Some((x, y));
            }
        }
    }
    let (lx, ly) = lit.expect("no pixel on the lit half");
    assert_ne!(pixels.get(lx, ly) & 0x00FF_FF00, 0);

    // The blocker's top faces the light and does not shadow itself
    let (bx, by) = on_blocker.expect("no pixel on the blocker");
    assert_ne!(pixels.get(bx, by) & 0x00FF_FF00, 0);
}

#[test]
fn test_pixels_hold_unclamped_radiance() {
    let light_pos = Vec3::new(0.0, 2.0, 0.0);
    let camera = top_down_camera(64);
    let p = floor_point(&camera, 44, 32);
    assert!(p.x < -0.3, "pixel should see the open half of the floor");
    let to_light = light_pos - p;
    let cos = to_light.normalize().y;

    // Intensity 1: about 0.25 right under the light, well below white
    let dim: Arc<dyn Light> = Arc::new(PointLight::new(light_pos, Color::ONE));
    let pixels = render(load_scene(vec![dim]), &camera, 2);
    let expected = cos / to_light.length_squared();
    assert!((expected - 0.25).abs() < 0.05);
    assert!(pixels.color(44, 32).abs_diff_eq(Color::splat(expected), 1e-4));
    let byte = (pixels.get(44, 32) & 0xFF) as f32;
    assert!((byte - 255.0 * expected).abs() <= 1.0);

    // Intensity 16: the stored value exceeds 1, only the display copy clamps
    let bright: Arc<dyn Light> = Arc::new(PointLight::new(light_pos, Color::splat(16.0)));
    let pixels = render(load_scene(vec![bright]), &camera, 2);
    assert!(pixels.color(44, 32).abs_diff_eq(Color::splat(16.0 * expected), 1e-3));
    assert_eq!(pixels.get(44, 32), 0x00FF_FFFF);
}

#[test]
fn test_shadow_on_floor() {
    // Light straight above the blocker; the camera looks from below the
    // blocker's height at a grazing angle so it sees the floor underneath
    let light: Arc<dyn Light> = Arc::new(PointLight::new(Vec3::new(0.5, 3.0, 0.0), Color::splat(9.0)));
    let scene = load_scene(vec![light]);

    let to_world = Mat4::camera_look_at(Vec3::new(-3.0, 0.25, 0.0), Vec3::new(0.5, 0.0, 0.0), Vec3::Y);
    let camera = Camera::new(to_world, 33, 33, [-0.5, 0.5, -0.5, 0.5], 20f32.to_radians());

    // Center pixel looks at (0.5, 0, 0), right under the blocker
    let pixels = render(Arc::clone(&scene), &camera, 2);
    assert_eq!(pixels.get(16, 16), 0);

    // Without the blocker in the light path, the same spot is lit
    let open: Arc<dyn Light> = Arc::new(PointLight::new(Vec3::new(-2.0, 3.0, 0.0), Color::splat(9.0)));
    let pixels = render(load_scene(vec![open]), &camera, 2);
    assert_ne!(pixels.get(16, 16), 0);
}

#[test]
fn test_default_config_renders() {
    init_logging();
    let mut config = SceneConfig::default();
    config.width = 24;
    config.height = 24;
    config.render.threads = 3;
    for light in &mut config.lights {
        if let glint_renderer::LightConfig::AreaDisk { samples, .. } = light {
            *samples = 8;
        }
    }

    let mut materials = MaterialLib::new();
    let (mut object, _) = parse_obj("floor", FLOOR_AND_BLOCKER, None, &mut materials);
    object.transform_by(Mat4::from_scale(Vec3::splat(2.0)));
    let scene = Arc::new(Scene::build(vec![object], config.build_lights()).unwrap());

    let mut camera = config.interactive_camera();
    camera.on_key_pressed(Key::W);

    let pixels = Arc::new(FrameBuffer::new(config.width, config.height));
    let mut renderer = Renderer::new(config.render.clone()).unwrap();
    for _ in 0..3 {
        renderer.start(Arc::clone(&scene), camera.camera(), Arc::clone(&pixels)).unwrap();
        renderer.wait();
    }
    assert_eq!(renderer.frames_rendered(), 3);
    assert!(pixels.snapshot().iter().any(|&p| p != 0));
}

#[test]
fn test_load_from_disk() {
    let dir = std::env::temp_dir().join(format!("glint_frame_{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("floor.obj");
    std::fs::write(&path, FLOOR_AND_BLOCKER).unwrap();

    let mut materials = MaterialLib::new();
    let object = Object::load(&path, &mut materials).unwrap();
    assert_eq!(object.name, "floor");
    assert_eq!(object.vertex_count(), 8);

    let _ = std::fs::remove_dir_all(&dir);
}
