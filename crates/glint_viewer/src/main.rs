mod display;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use glint_core::{MaterialLib, Object};
use glint_renderer::{FrameBuffer, Renderer, Scene, SceneConfig};

use display::Display;

const USAGE: &str = "Usage: glint_viewer [--config scene.json] [--snapshot out.png] <mesh.obj>...";

#[derive(Debug, Default, PartialEq)]
struct Args {
    config: Option<PathBuf>,
    snapshot: Option<PathBuf>,
    meshes: Vec<PathBuf>,
}

fn parse_args<I: IntoIterator<Item = String>>(args: I) -> Result<Args> {
    let mut parsed = Args::default();
    let mut args = args.into_iter();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => {
                let path = args.next().context("--config expects a path")?;
                parsed.config = Some(path.into());
            }
            "--snapshot" => {
                let path = args.next().context("--snapshot expects a path")?;
                parsed.snapshot = Some(path.into());
            }
            flag if flag.starts_with("--") => bail!("unknown option {}", flag),
            _ => parsed.meshes.push(arg.into()),
        }
    }

    Ok(parsed)
}

fn load_objects(paths: &[PathBuf]) -> Vec<Object> {
    let mut materials = MaterialLib::new();
    let mut objects = Vec::with_capacity(paths.len());

    for path in paths {
        match Object::load(path, &mut materials) {
            Ok(object) => objects.push(object),
            Err(e) => log::warn!("Skipping {}: {}", path.display(), e),
        }
    }

    log::info!("Loaded {} of {} meshes, {} materials", objects.len(), paths.len(), materials.len());
    objects
}

fn snapshot(
    renderer: &mut Renderer,
    scene: Arc<Scene>,
    config: &SceneConfig,
    out: &Path,
) -> Result<()> {
    let camera = config.interactive_camera();
    let pixels = Arc::new(FrameBuffer::new(config.width, config.height));

    renderer.start(scene, camera.camera(), Arc::clone(&pixels))?;
    renderer.wait();

    image::save_buffer(
        out,
        &pixels.to_rgba(),
        config.width,
        config.height,
        image::ColorType::Rgba8,
    )
    .with_context(|| format!("failed to write {}", out.display()))?;

    log::info!("Saved snapshot to {}", out.display());
    Ok(())
}

fn run_window(renderer: &mut Renderer, scene: Arc<Scene>, config: &SceneConfig) -> Result<()> {
    let mut camera = config.interactive_camera();
    let pixels = Arc::new(FrameBuffer::new(config.width, config.height));
    let mut display = Display::open("glint", config.width, config.height)?;
    let refresh = Duration::from_secs_f32(1.0 / config.refresh_hz.max(1.0));

    log::info!("Viewer started ({} render threads)", renderer.thread_count());

    while display.is_open() {
        // In-flight frames keep the camera they were started with
        display.poll(&mut camera);
        if renderer.done() {
            renderer.start(Arc::clone(&scene), camera.camera(), Arc::clone(&pixels))?;
        }

        std::thread::sleep(refresh);
        display.update(&pixels.snapshot())?;

        if let Some(frame_time) = renderer.last_frame_time() {
            display.set_title(&format!(
                "glint | {:.1} ms | frame {}",
                frame_time.as_secs_f64() * 1000.0,
                renderer.frames_rendered()
            ));
        }
    }

    log::info!("Window closed, shutting down");
    Ok(())
}

fn main() -> Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    let args = match parse_args(std::env::args().skip(1)) {
        Ok(args) if !args.meshes.is_empty() => args,
        Ok(_) => {
            eprintln!("{}", USAGE);
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("{}\n{}", e, USAGE);
            std::process::exit(1);
        }
    };

    let config = match &args.config {
        Some(path) => SceneConfig::load(path)
            .with_context(|| format!("failed to read scene config {}", path.display()))?,
        None => SceneConfig::default(),
    };

    let objects = load_objects(&args.meshes);
    if objects.is_empty() {
        bail!("no mesh could be loaded");
    }

    let scene = Arc::new(Scene::build(objects, config.build_lights())?);
    let mut renderer = Renderer::new(config.render.clone())?;

    match &args.snapshot {
        Some(out) => snapshot(&mut renderer, scene, &config, out),
        None => run_window(&mut renderer, scene, &config),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Result<Args> {
        parse_args(list.iter().map(|s| s.to_string()))
    }

    #[test]
    fn test_parse_meshes() {
        let parsed = args(&["a.obj", "b.obj"]).unwrap();
        assert_eq!(parsed.meshes, vec![PathBuf::from("a.obj"), PathBuf::from("b.obj")]);
        assert!(parsed.config.is_none());
        assert!(parsed.snapshot.is_none());
    }

    #[test]
    fn test_parse_options() {
        let parsed = args(&["--config", "scene.json", "bunny.obj", "--snapshot", "out.png"]).unwrap();
        assert_eq!(parsed.config, Some(PathBuf::from("scene.json")));
        assert_eq!(parsed.snapshot, Some(PathBuf::from("out.png")));
        assert_eq!(parsed.meshes, vec![PathBuf::from("bunny.obj")]);
    }

    #[test]
    fn test_parse_errors() {
        assert!(args(&["--config"]).is_err());
        assert!(args(&["--fast", "a.obj"]).is_err());
        assert!(args(&[]).unwrap().meshes.is_empty());
    }
}
