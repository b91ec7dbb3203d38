//! meshview: load a model headlessly, apply inspection toggles and report
//!
//! Usage:
//!   meshview assets/robot.glb --wireframe true --frames 120 --json
//!   meshview scene.obj --mtl scene.mtl --bbox true --bgcolor "#202020"

use anyhow::{bail, Context, Result};
use clap::Parser;
use env_logger::Env;
use meshview_io::{LoaderRegistry, SourceFormat};
use meshview_viewer::{
    FileStore, HeadlessMount, InteractionSettings, LoadCallbacks, LoadState, ManualScheduler,
    MemoryStore, ModelSession, SessionConfig, SessionError, SettingsStore,
};
use serde::Serialize;
use std::cell::RefCell;
use std::path::PathBuf;
use std::process::ExitCode;
use std::rc::Rc;
use std::time::Duration;

/// Fixed frame step used when driving the scheduler
const FRAME_STEP: Duration = Duration::from_millis(16);

#[derive(Parser, Debug)]
#[command(name = "meshview", version, about = "Inspect a 3D model headlessly")]
struct Cli {
    /// Model URL or file path (glTF/GLB, OBJ, STL or FBX)
    url: String,

    /// Material library for OBJ models
    #[arg(long)]
    mtl: Option<String>,

    /// Source format; detected from the URL extension when omitted
    #[arg(long, value_parser = parse_format)]
    format: Option<SourceFormat>,

    /// Viewport size as WIDTHxHEIGHT
    #[arg(long, value_parser = parse_size, default_value = "800x600")]
    size: (u32, u32),

    /// Frames to render after the load completes
    #[arg(long, default_value_t = 1)]
    frames: usize,

    #[arg(long)]
    wireframe: Option<bool>,

    #[arg(long)]
    normal: Option<bool>,

    #[arg(long)]
    animation: Option<bool>,

    #[arg(long)]
    axes: Option<bool>,

    #[arg(long)]
    grid: Option<bool>,

    #[arg(long)]
    bbox: Option<bool>,

    /// Background color as #RRGGBB
    #[arg(long)]
    bgcolor: Option<String>,

    /// Re-fit the camera after applying toggles
    #[arg(long)]
    reset_camera: bool,

    /// Settings file; defaults to the user config directory
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Key the settings record is stored under
    #[arg(long)]
    settings_key: Option<String>,

    /// Session config (JSON)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Print the summary as JSON
    #[arg(long)]
    json: bool,
}

fn parse_format(s: &str) -> Result<SourceFormat, String> {
    s.parse::<SourceFormat>().map_err(|e| e.to_string())
}

fn parse_size(s: &str) -> Result<(u32, u32), String> {
    let (w, h) = s
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got {s:?}"))?;
    let w: u32 = w.trim().parse().map_err(|e| format!("width: {e}"))?;
    let h: u32 = h.trim().parse().map_err(|e| format!("height: {e}"))?;
    if w == 0 || h == 0 {
        return Err("size must be non-zero".to_string());
    }
    Ok((w, h))
}

#[derive(Serialize, Debug)]
struct ModelSummary {
    meshes: usize,
    triangles: usize,
    clips: Vec<String>,
    scale_factor: f32,
    center: [f32; 3],
}

#[derive(Serialize, Debug)]
struct FrameSummary {
    frame: u64,
    visible_meshes: usize,
    wireframe_meshes: usize,
    normal_meshes: usize,
    overlays: usize,
    background: String,
}

#[derive(Serialize, Debug)]
struct Summary {
    url: String,
    format: String,
    state: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<ModelSummary>,
    camera: [f32; 3],
    settings: InteractionSettings,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_frame: Option<FrameSummary>,
    replay_failures: Vec<String>,
    toggle_failures: Vec<String>,
}

impl Summary {
    fn print_text(&self) {
        println!("{} ({}): {}", self.url, self.format, self.state);
        if let Some(err) = &self.error {
            println!("  error: {}", err);
        }
        if let Some(model) = &self.model {
            println!("  meshes: {}, triangles: {}", model.meshes, model.triangles);
            if !model.clips.is_empty() {
                println!("  clips: {}", model.clips.join(", "));
            }
            println!(
                "  scale: {:.4}, center: ({:.3}, {:.3}, {:.3})",
                model.scale_factor, model.center[0], model.center[1], model.center[2]
            );
        }
        println!(
            "  camera: ({:.3}, {:.3}, {:.3})",
            self.camera[0], self.camera[1], self.camera[2]
        );
        let s = &self.settings;
        println!(
            "  wireframe={} normal={} animation={} axes={} grid={} bbox={} bgcolor={}",
            s.wireframe,
            s.normal,
            s.animation,
            s.axes_helper,
            s.grid_helper,
            s.bounding_box_helper,
            s.bgcolor
        );
        if let Some(frame) = &self.last_frame {
            println!(
                "  frame {}: {} visible meshes, {} overlays, background {}",
                frame.frame, frame.visible_meshes, frame.overlays, frame.background
            );
        }
        for failure in self.replay_failures.iter().chain(&self.toggle_failures) {
            println!("  warning: {}", failure);
        }
    }
}

fn open_store(cli: &Cli) -> Rc<dyn SettingsStore> {
    match cli.settings.clone().or_else(FileStore::default_path) {
        Some(path) => {
            log::debug!("settings file: {}", path.display());
            Rc::new(FileStore::new(path))
        }
        None => {
            log::warn!("no config directory; settings will not persist");
            Rc::new(MemoryStore::new())
        }
    }
}

/// Apply the toggles given on the command line, collecting failures
fn apply_toggles(session: &ModelSession, cli: &Cli) -> Vec<String> {
    let mut failures = Vec::new();
    let mut record = |name: &str, result: meshview_viewer::Result<()>| {
        if let Err(e) = result {
            log::warn!("{}: {}", name, e);
            failures.push(format!("{name}: {e}"));
        }
    };

    if let Some(v) = cli.wireframe {
        record("wireframe", session.change_wireframe(v));
    }
    if let Some(v) = cli.normal {
        record("normal", session.change_normal(v));
    }
    if let Some(v) = cli.animation {
        record("animation", session.change_animation(v));
    }
    if let Some(v) = cli.axes {
        record("axes", session.change_axes_helper(v));
    }
    if let Some(v) = cli.grid {
        record("grid", session.change_grid_helper(v));
    }
    if let Some(v) = cli.bbox {
        record("bbox", session.change_bounding_box_helper(v));
    }
    if let Some(hex) = &cli.bgcolor {
        record("bgcolor", session.change_bgcolor(hex));
    }
    if cli.reset_camera {
        record("reset-camera", session.reset_camera());
    }
    failures
}

fn run(cli: Cli) -> Result<ExitCode> {
    let mut config = match &cli.config {
        Some(path) => SessionConfig::from_json_file(path)
            .with_context(|| format!("reading config {}", path.display()))?,
        None => SessionConfig::default(),
    };
    if let Some(key) = &cli.settings_key {
        config.settings_key = key.clone();
    }

    let format = match cli.format.or_else(|| LoaderRegistry::detect(&cli.url)) {
        Some(f) => f,
        None => bail!("cannot determine the format of {}; pass --format", cli.url),
    };

    let (width, height) = cli.size;
    let mount = HeadlessMount::shared(width, height);
    let scheduler = ManualScheduler::new();
    let session = ModelSession::builder(mount, format)
        .config(config)
        .store(open_store(&cli))
        .scheduler(Rc::new(scheduler.clone()))
        .build();

    let failure: Rc<RefCell<Option<String>>> = Rc::new(RefCell::new(None));
    let callbacks = LoadCallbacks::new()
        .on_progress(|p| log::debug!("progress: {} / {:?} bytes", p.loaded, p.total))
        .on_error({
            let failure = failure.clone();
            move |e: &SessionError| {
                *failure.borrow_mut() = Some(e.to_string());
            }
        });

    log::info!("loading {} as {}", cli.url, format);
    if !session.load(&cli.url, cli.mtl.as_deref(), callbacks) {
        bail!("session refused the load request");
    }
    let state = session.block_until_loaded();

    let mut toggle_failures = Vec::new();
    if state == LoadState::Loaded {
        toggle_failures = apply_toggles(&session, &cli);
        scheduler.run_frames(cli.frames, FRAME_STEP);
    }

    let model = session.loaded_model().map(|m| ModelSummary {
        meshes: m.mesh_count,
        triangles: m.triangle_count,
        clips: m.clip_names,
        scale_factor: m.fit.scale_factor,
        center: [
            m.fit.scaled_center.x,
            m.fit.scaled_center.y,
            m.fit.scaled_center.z,
        ],
    });
    let camera = session.camera().position;
    let summary = Summary {
        url: cli.url.clone(),
        format: format.to_string(),
        state: format!("{:?}", state),
        error: failure.borrow().clone(),
        model,
        camera: [camera.x, camera.y, camera.z],
        settings: session.settings(),
        last_frame: session.last_frame().map(|f| FrameSummary {
            frame: f.frame,
            visible_meshes: f.visible_meshes,
            wireframe_meshes: f.wireframe_meshes,
            normal_meshes: f.normal_meshes,
            overlays: f.overlays,
            background: f.background.to_hex(),
        }),
        replay_failures: session.replay_failures(),
        toggle_failures,
    };
    session.dispose();

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        summary.print_text();
    }

    Ok(if state == LoadState::Loaded {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    })
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {:#}", e);
            ExitCode::from(2)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_size() {
        assert_eq!(parse_size("1024x768"), Ok((1024, 768)));
        assert_eq!(parse_size("640X480"), Ok((640, 480)));
        assert!(parse_size("0x10").is_err());
        assert!(parse_size("800").is_err());
    }

    #[test]
    fn test_cli_flags() {
        let cli = Cli::try_parse_from([
            "meshview",
            "model.glb",
            "--wireframe",
            "true",
            "--bbox",
            "false",
            "--size",
            "320x200",
            "--json",
        ])
        .unwrap();
        assert_eq!(cli.url, "model.glb");
        assert_eq!(cli.wireframe, Some(true));
        assert_eq!(cli.bbox, Some(false));
        assert_eq!(cli.normal, None);
        assert_eq!(cli.size, (320, 200));
        assert!(cli.json);
        assert_eq!(cli.frames, 1);
    }

    #[test]
    fn test_format_flag() {
        let cli = Cli::try_parse_from(["meshview", "blob", "--format", "stl"]).unwrap();
        assert_eq!(cli.format, Some(SourceFormat::Stl));
        assert!(Cli::try_parse_from(["meshview", "blob", "--format", "xyz"]).is_err());
    }
}
