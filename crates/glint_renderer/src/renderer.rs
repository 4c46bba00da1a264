//! Worker-pool renderer.
//!
//! A fixed set of threads is spawned once. Each frame moves through
//! `Idle -> Dispatched -> Rendering -> Draining -> Idle`: [`Renderer::start`]
//! publishes the frame and wakes the pool, workers claim whole rows from an
//! atomic cursor until it runs past the image height, and the last worker to
//! check in marks the pool idle and logs the frame time.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::SeedableRng;
use thiserror::Error;

use crate::camera::Camera;
use crate::config::RenderConfig;
use crate::framebuffer::FrameBuffer;
use crate::integrator::trace;
use crate::intersect::BuildError;
use crate::scene::Scene;

/// Errors reported by the renderer and its configuration.
#[derive(Error, Debug)]
pub enum RenderError {
    #[error("previous frame is still rendering")]
    FrameInFlight,

    #[error("renderer needs at least one worker thread")]
    NoThreads,

    #[error("frame buffer is {buffer:?} but the camera renders {camera:?}")]
    SizeMismatch { buffer: (u32, u32), camera: (u32, u32) },

    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("scene build failed: {0}")]
    Build(#[from] BuildError),

    #[error("invalid scene configuration: {0}")]
    Config(#[from] serde_json::Error),

    #[error("light {index} is invalid: {reason}")]
    InvalidLight { index: usize, reason: &'static str },

    #[error("failed to read scene configuration: {0}")]
    ConfigIo(#[from] std::io::Error),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum PoolState {
    /// Workers asleep, waiting for a new generation.
    Idle,
    /// Frame published, no worker has picked it up yet.
    Dispatched,
    /// Rows are being claimed.
    Rendering,
    /// All rows claimed; waiting for every worker to check in.
    Draining,
}

/// Everything a worker needs for one frame.
struct Frame {
    scene: Arc<Scene>,
    /// Snapshot taken at dispatch; input events never reach it.
    camera: Camera,
    pixels: Arc<FrameBuffer>,
    started: Instant,
}

struct Control {
    state: PoolState,
    /// Bumped on every dispatch. Workers sleep until it changes.
    generation: u64,
    frame: Option<Arc<Frame>>,
    shutdown: bool,
    last_frame_time: Option<Duration>,
    frames_rendered: u64,
}

struct Shared {
    control: Mutex<Control>,
    /// Signalled on dispatch and shutdown.
    wake: Condvar,
    /// Signalled when a frame drains.
    idle: Condvar,
    next_row: AtomicUsize,
    completed: AtomicUsize,
    thread_count: usize,
    config: RenderConfig,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Control> {
        self.control.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Fixed pool of render threads.
///
/// # Example
///
/// ```ignore
/// let mut renderer = Renderer::new(RenderConfig::default())?;
/// renderer.start(scene.clone(), camera.camera(), pixels.clone())?;
/// renderer.wait();
/// ```
pub struct Renderer {
    shared: Arc<Shared>,
    workers: Vec<JoinHandle<()>>,
}

impl Renderer {
    /// Spawn `config.thread_count()` workers.
    pub fn new(config: RenderConfig) -> Result<Self, RenderError> {
        let threads = config.thread_count();
        Self::with_threads(threads, config)
    }

    /// Spawn exactly `threads` workers.
    pub fn with_threads(threads: usize, config: RenderConfig) -> Result<Self, RenderError> {
        if threads == 0 {
            return Err(RenderError::NoThreads);
        }

        let shared = Arc::new(Shared {
            control: Mutex::new(Control {
                state: PoolState::Idle,
                generation: 0,
                frame: None,
                shutdown: false,
                last_frame_time: None,
                frames_rendered: 0,
            }),
            wake: Condvar::new(),
            idle: Condvar::new(),
            next_row: AtomicUsize::new(0),
            completed: AtomicUsize::new(threads),
            thread_count: threads,
            config,
        });

        // Built up in place so a failed spawn still joins earlier workers
        let mut renderer = Self {
            shared,
            workers: Vec::with_capacity(threads),
        };
        for id in 0..threads {
            let shared = Arc::clone(&renderer.shared);
            let handle = std::thread::Builder::new()
                .name(format!("glint-worker-{}", id))
                .spawn(move || worker_loop(id, shared))
                .map_err(RenderError::Spawn)?;
            renderer.workers.push(handle);
        }

        log::info!("Renderer started with {} worker thread(s)", threads);
        Ok(renderer)
    }

    /// Dispatch a frame.
    ///
    /// `camera` is cloned, so it may be changed as soon as this returns.
    /// Fails with [`RenderError::FrameInFlight`] unless [`done`](Self::done).
    pub fn start(&mut self, scene: Arc<Scene>, camera: &Camera, pixels: Arc<FrameBuffer>) -> Result<(), RenderError> {
        if (pixels.width(), pixels.height()) != (camera.width(), camera.height()) {
            return Err(RenderError::SizeMismatch {
                buffer: (pixels.width(), pixels.height()),
                camera: (camera.width(), camera.height()),
            });
        }

        let mut control = self.shared.lock();
        if control.state != PoolState::Idle {
            return Err(RenderError::FrameInFlight);
        }

        // Every worker is parked, so nobody is touching the counters
        self.shared.next_row.store(0, Ordering::Relaxed);
        self.shared.completed.store(0, Ordering::Relaxed);

        control.frame = Some(Arc::new(Frame {
            scene,
            camera: camera.clone(),
            pixels,
            started: Instant::now(),
        }));
        control.generation += 1;
        control.state = PoolState::Dispatched;
        log::debug!("Dispatched frame {}", control.generation);
        drop(control);

        self.shared.wake.notify_all();
        Ok(())
    }

    /// True when no frame is in flight.
    pub fn done(&self) -> bool {
        self.shared.lock().state == PoolState::Idle
    }

    /// Block until the current frame (if any) has drained.
    pub fn wait(&self) {
        let mut control = self.shared.lock();
        while control.state != PoolState::Idle {
            control = self
                .shared
                .idle
                .wait(control)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Wall time of the most recently completed frame.
    pub fn last_frame_time(&self) -> Option<Duration> {
        self.shared.lock().last_frame_time
    }

    pub fn frames_rendered(&self) -> u64 {
        self.shared.lock().frames_rendered
    }

    pub fn thread_count(&self) -> usize {
        self.shared.thread_count
    }

    pub fn config(&self) -> &RenderConfig {
        &self.shared.config
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        self.shared.lock().shutdown = true;
        self.shared.wake.notify_all();

        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                log::error!("Render worker panicked");
            }
        }
    }
}

fn worker_loop(id: usize, shared: Arc<Shared>) {
    let mut rng = StdRng::seed_from_u64(shared.config.seed.wrapping_add(id as u64));
    let mut seen_generation = 0;

    loop {
        let frame = {
            let mut control = shared.lock();
            while control.generation == seen_generation && !control.shutdown {
                control = shared.wake.wait(control).unwrap_or_else(PoisonError::into_inner);
            }
            // A dispatched frame is always finished, even during shutdown
            if control.generation == seen_generation {
                return;
            }
            seen_generation = control.generation;
            if control.state == PoolState::Dispatched {
                control.state = PoolState::Rendering;
            }
            control.frame.clone()
        };

        if let Some(frame) = &frame {
            claim_rows(&shared.next_row, frame.camera.height() as usize, |y| {
                render_row(frame, y as u32, &shared.config, &mut rng);
            });
        }
        finish_frame(&shared, frame.as_deref());
    }
}

/// Claim rows from `cursor` until it passes `height`, calling `render` for
/// each. Every row below `height` is handed out exactly once across all
/// callers sharing `cursor`.
fn claim_rows(cursor: &AtomicUsize, height: usize, mut render: impl FnMut(usize)) {
    loop {
        let row = cursor.fetch_add(1, Ordering::Relaxed);
        if row >= height {
            return;
        }
        render(row);
    }
}

fn render_row(frame: &Frame, y: u32, config: &RenderConfig, rng: &mut StdRng) {
    for x in 0..frame.camera.width() {
        let ray = frame.camera.generate_ray(x, y);
        let color = trace(&frame.scene, &ray, config, rng);
        frame.pixels.set(x, y, color);
    }
}

/// Check a worker out of the current frame. The last one returns the pool
/// to `Idle`.
fn finish_frame(shared: &Shared, frame: Option<&Frame>) {
    // AcqRel so the last worker sees every other worker's pixel writes
    let finished = shared.completed.fetch_add(1, Ordering::AcqRel) + 1;

    let mut control = shared.lock();
    if finished < shared.thread_count {
        if control.state == PoolState::Rendering {
            control.state = PoolState::Draining;
        }
        return;
    }

    let elapsed = frame.map(|f| f.started.elapsed()).unwrap_or_default();
    control.state = PoolState::Idle;
    control.frame = None;
    control.last_frame_time = Some(elapsed);
    control.frames_rendered += 1;
    log::info!(
        "Frame {} rendered in {:.1}ms",
        control.generation,
        elapsed.as_secs_f64() * 1000.0
    );
    drop(control);

    shared.idle.notify_all();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::light::{AreaDiskLight, Light, PointLight};
    use glint_core::{Face, Object};
    use glint_math::{Color, Mat4, Mat4Ext, Vec3};

    const WINDOW: [f32; 4] = [-0.5, 0.5, -0.5, 0.5];

    fn camera(width: u32, height: u32) -> Camera {
        let to_world = Mat4::camera_look_at(Vec3::new(0.0, 3.0, 0.01), Vec3::ZERO, Vec3::Y);
        Camera::new(to_world, width, height, WINDOW, 60f32.to_radians())
    }

    fn floor_scene(lights: Vec<Arc<dyn Light>>) -> Arc<Scene> {
        let mut floor = Object::new("floor");
        floor.vertices = vec![
            Vec3::new(-10.0, 0.0, -10.0),
            Vec3::new(10.0, 0.0, -10.0),
            Vec3::new(10.0, 0.0, 10.0),
            Vec3::new(-10.0, 0.0, 10.0),
        ];
        floor.faces = vec![Face::triangle([0, 2, 1]), Face::triangle([0, 3, 2])];
        Arc::new(Scene::build(vec![floor], lights).unwrap())
    }

    fn background_config(threads: usize) -> RenderConfig {
        RenderConfig {
            threads,
            background: Color::new(1.0, 0.0, 0.0),
            ..Default::default()
        }
    }

    #[test]
    fn test_claim_rows_exactly_once() {
        let cursor = Arc::new(AtomicUsize::new(0));
        let height = 1000;
        let counts: Arc<Vec<AtomicUsize>> = Arc::new((0..height).map(|_| AtomicUsize::new(0)).collect());

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cursor = Arc::clone(&cursor);
                let counts = Arc::clone(&counts);
                std::thread::spawn(move || {
                    claim_rows(&cursor, height, |row| {
                        counts[row].fetch_add(1, Ordering::Relaxed);
                    });
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        assert!(counts.iter().all(|c| c.load(Ordering::Relaxed) == 1));
    }

    #[test]
    fn test_zero_threads_rejected() {
        assert!(matches!(
            Renderer::with_threads(0, RenderConfig::default()),
            Err(RenderError::NoThreads)
        ));
    }

    #[test]
    fn test_new_renderer_is_done() {
        let renderer = Renderer::with_threads(2, RenderConfig::default()).unwrap();
        assert!(renderer.done());
        assert_eq!(renderer.last_frame_time(), None);
        assert_eq!(renderer.thread_count(), 2);
    }

    #[test]
    fn test_every_pixel_written() {
        for threads in [1, 2, 3, 8] {
            let scene = Arc::new(Scene::build(Vec::new(), Vec::new()).unwrap());
            let pixels = Arc::new(FrameBuffer::new(37, 23));
            let mut renderer = Renderer::with_threads(threads, background_config(threads)).unwrap();

            renderer.start(scene, &camera(37, 23), Arc::clone(&pixels)).unwrap();
            renderer.wait();

            assert!(renderer.done());
            assert!(
                pixels.snapshot().iter().all(|&p| p == 0x00FF0000),
                "{threads} thread(s) left pixels unwritten"
            );
        }
    }

    #[test]
    fn test_consecutive_frames() {
        let scene = floor_scene(vec![Arc::new(PointLight::new(Vec3::new(0.0, 2.0, 0.0), Color::splat(4.0)))]);
        let pixels = Arc::new(FrameBuffer::new(16, 16));
        let mut renderer = Renderer::with_threads(4, RenderConfig::default()).unwrap();

        for _ in 0..20 {
            renderer.start(Arc::clone(&scene), &camera(16, 16), Arc::clone(&pixels)).unwrap();
            renderer.wait();
        }

        assert_eq!(renderer.frames_rendered(), 20);
        assert!(renderer.last_frame_time().is_some());
        // The floor is lit under the light
        assert_ne!(pixels.get(8, 8), 0);
    }

    #[test]
    fn test_polling_done_reaches_completion() {
        let scene = Arc::new(Scene::build(Vec::new(), Vec::new()).unwrap());
        let pixels = Arc::new(FrameBuffer::new(64, 64));
        let mut renderer = Renderer::with_threads(3, background_config(3)).unwrap();

        renderer.start(scene, &camera(64, 64), Arc::clone(&pixels)).unwrap();
        let deadline = Instant::now() + Duration::from_secs(30);
        while !renderer.done() {
            assert!(Instant::now() < deadline, "frame never finished");
            std::thread::sleep(Duration::from_millis(1));
        }
        assert_eq!(pixels.get(63, 63), 0x00FF0000);
    }

    #[test]
    fn test_start_while_rendering_fails() {
        let light: Arc<dyn Light> = Arc::new(AreaDiskLight::looking_at(
            Vec3::new(0.0, 2.0, 0.0),
            Vec3::ZERO,
            Vec3::Z,
            256,
            Color::splat(4.0),
            0.5,
        ));
        let scene = floor_scene(vec![light]);
        let pixels = Arc::new(FrameBuffer::new(256, 256));
        let mut renderer = Renderer::with_threads(1, RenderConfig::default()).unwrap();

        renderer.start(Arc::clone(&scene), &camera(256, 256), Arc::clone(&pixels)).unwrap();
        let second = renderer.start(scene, &camera(256, 256), pixels);
        assert!(matches!(second, Err(RenderError::FrameInFlight)));

        renderer.wait();
        assert!(renderer.done());
        assert_eq!(renderer.frames_rendered(), 1);
    }

    #[test]
    fn test_size_mismatch_rejected() {
        let scene = Arc::new(Scene::build(Vec::new(), Vec::new()).unwrap());
        let mut renderer = Renderer::with_threads(1, RenderConfig::default()).unwrap();
        let result = renderer.start(scene, &camera(8, 8), Arc::new(FrameBuffer::new(4, 4)));
        assert!(matches!(result, Err(RenderError::SizeMismatch { .. })));
        assert!(renderer.done());
    }

    #[test]
    fn test_drop_mid_frame_joins_workers() {
        let scene = floor_scene(vec![Arc::new(PointLight::new(Vec3::new(0.0, 2.0, 0.0), Color::ONE))]);
        let pixels = Arc::new(FrameBuffer::new(128, 128));
        let mut renderer = Renderer::with_threads(4, RenderConfig::default()).unwrap();
        renderer.start(scene, &camera(128, 128), Arc::clone(&pixels)).unwrap();
        drop(renderer);

        // Workers finished the frame before exiting
        assert_ne!(pixels.get(64, 64), 0);
    }

    #[test]
    fn test_camera_snapshot_at_start() {
        let scene = floor_scene(vec![Arc::new(PointLight::new(Vec3::new(0.0, 2.0, 0.0), Color::splat(4.0)))]);
        let pixels = Arc::new(FrameBuffer::new(16, 16));
        let mut renderer = Renderer::with_threads(2, RenderConfig::default()).unwrap();

        let mut cam = camera(16, 16);
        renderer.start(Arc::clone(&scene), &cam, Arc::clone(&pixels)).unwrap();
        // Point the live camera at the sky; the dispatched frame is unaffected
        cam.set_camera_to_world(Mat4::camera_look_at(Vec3::new(0.0, 3.0, 0.0), Vec3::new(0.0, 10.0, 0.01), Vec3::Z));
        renderer.wait();

        let first = pixels.snapshot();
        renderer.start(scene, &camera(16, 16), Arc::clone(&pixels)).unwrap();
        renderer.wait();
        assert_eq!(first, pixels.snapshot());
    }
}
