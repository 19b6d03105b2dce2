// SPDX-License-Identifier: MIT OR Apache-2.0
//! Stagehand headless player.
//!
//! Loads a project, plays its timeline once at the configured frame rate and
//! logs the sampled camera and entity state.
//!
//! ```text
//! stagehand <project.json> [settings.ron]
//! ```

use stagehand_app::{EditorSettings, ProjectError, Studio, SETTINGS_FILE_NAME};
use std::path::{Path, PathBuf};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

fn main() {
    let mut args = std::env::args().skip(1);
    let Some(project_path) = args.next().map(PathBuf::from) else {
        eprintln!("usage: stagehand <project.json> [settings.ron]");
        std::process::exit(2);
    };
    let settings_path = args.next().map_or_else(|| PathBuf::from(SETTINGS_FILE_NAME), PathBuf::from);

    let settings = EditorSettings::load(&settings_path);
    let filter_directive = settings
        .as_ref()
        .map_or(stagehand_app::DEFAULT_LOG_FILTER, |s| s.log_filter.as_str());
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter_directive));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Stagehand v{}", env!("CARGO_PKG_VERSION"));

    let settings = settings.unwrap_or_else(|e| {
        tracing::warn!("Failed to read settings {}: {e}; using defaults", settings_path.display());
        EditorSettings::default()
    });

    if let Err(e) = run(&project_path, settings) {
        tracing::error!("Playback failed: {e}");
        std::process::exit(1);
    }
}

fn run(project_path: &Path, settings: EditorSettings) -> Result<(), ProjectError> {
    let fps = settings.playback_fps;
    let mut studio = Studio::new(settings);
    studio.open(project_path)?;

    let duration = studio.timeline.duration();
    let frame_time = 1.0 / fps;
    let frames = studio.timeline.time_to_frame(duration);
    tracing::info!("Playing {:.2}s ({} frames at {} fps)", duration, frames, fps);

    studio.seek(0.0);
    let mut request = studio.play();
    for frame in 1..=frames {
        let Some(next) = studio.tick(request, frame_time) else {
            break;
        };
        request = next;
        log_frame(&studio, frame);
    }
    studio.pause();

    tracing::info!("Playback finished at {:.3}s", studio.timeline.current_time());
    Ok(())
}

fn log_frame(studio: &Studio, frame: u32) {
    let scene = &studio.editor.scene;
    let camera = &scene.camera;
    tracing::debug!(
        frame,
        time = studio.timeline.current_time(),
        fov = camera.fov,
        "camera at {:?}",
        camera.position
    );
    for entity in scene.objects.iter().filter(|e| e.is_active()) {
        let transform = entity.transform(&scene.graph);
        tracing::trace!(frame, entity = %entity.name, "position {:?}", transform.position);
    }
}
