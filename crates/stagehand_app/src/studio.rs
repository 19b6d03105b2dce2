// SPDX-License-Identifier: MIT OR Apache-2.0
//! Studio: the editor and its timeline as one project.

use crate::project::{ProjectError, ProjectFile, RenderSettings, PROJECT_FORMAT_VERSION};
use crate::settings::EditorSettings;
use stagehand_core::Editor;
use stagehand_sequencer::{FrameRequest, TimelineManager};
use std::path::Path;

/// Name of the camera track every new project starts with
pub const DEFAULT_CAMERA_TRACK: &str = "Camera";

/// Editor plus timeline, loaded and saved together
#[derive(Debug)]
pub struct Studio {
    /// Scene, selection, gizmo and history
    pub editor: Editor,
    /// Tracks and playhead
    pub timeline: TimelineManager,
    render_settings: RenderSettings,
    settings: EditorSettings,
}

impl Default for Studio {
    fn default() -> Self {
        Self::new(EditorSettings::default())
    }
}

impl Studio {
    /// Create a studio holding an empty project
    pub fn new(settings: EditorSettings) -> Self {
        let mut studio = Self {
            editor: Editor::with_history_depth(settings.history_depth),
            timeline: TimelineManager::with_duration(settings.default_duration),
            render_settings: RenderSettings::default(),
            settings,
        };
        studio.new_project();
        studio
    }

    /// Settings this studio was created with
    pub fn settings(&self) -> &EditorSettings {
        &self.settings
    }

    /// Current render settings
    pub fn render_settings(&self) -> RenderSettings {
        self.render_settings
    }

    /// Change render settings and the camera aspect with them
    pub fn set_render_settings(&mut self, render_settings: RenderSettings) {
        self.render_settings = render_settings;
        self.editor.scene.camera.set_aspect(render_settings.aspect());
    }

    /// Discard everything and start an empty project with one camera track
    pub fn new_project(&mut self) {
        self.editor.reset();
        self.timeline.clear(&mut self.editor.scene);
        self.timeline.set_duration(self.settings.default_duration);
        self.timeline.set_frame_rate(self.settings.playback_fps);
        self.timeline.create_camera_track(DEFAULT_CAMERA_TRACK);
        self.set_render_settings(RenderSettings::default());
        tracing::info!("Started new project");
    }

    /// Replace the current project.
    ///
    /// Unresolvable parents and track targets are skipped with a warning.
    /// A project without a timeline gets a fresh one. History is cleared.
    pub fn load_project(&mut self, project: ProjectFile) -> usize {
        self.editor.reset();
        let render_settings = project.render_settings_or_default();
        let loaded = self.editor.scene.load_entities(project.entities);

        match project.timeline {
            Some(record) => {
                self.timeline.load(record, &mut self.editor.scene);
            }
            None => {
                self.timeline.clear(&mut self.editor.scene);
                self.timeline.set_duration(self.settings.default_duration);
                self.timeline.create_camera_track(DEFAULT_CAMERA_TRACK);
            }
        }
        self.timeline.set_frame_rate(self.settings.playback_fps);
        self.set_render_settings(render_settings);
        self.editor.history.clear_history();

        tracing::info!(
            "Loaded project: {} entities, {} tracks",
            loaded.len(),
            self.timeline.track_count()
        );
        loaded.len()
    }

    /// Load a project file from disk
    pub fn open(&mut self, path: &Path) -> Result<usize, ProjectError> {
        let project = ProjectFile::load(path)?;
        Ok(self.load_project(project))
    }

    /// Snapshot the current project
    pub fn to_project(&self) -> ProjectFile {
        ProjectFile {
            version: PROJECT_FORMAT_VERSION,
            entities: self.editor.scene.serialize_entities(),
            timeline: Some(self.timeline.serialize()),
            render_settings: Some(self.render_settings),
        }
    }

    /// Write the current project to disk
    pub fn save_project(&self, path: &Path) -> Result<(), ProjectError> {
        self.to_project().save(path)?;
        tracing::info!("Saved project to {}", path.display());
        Ok(())
    }

    /// Start timeline playback
    pub fn play(&mut self) -> FrameRequest {
        self.editor.deselect_all();
        self.timeline.play(&mut self.editor.scene)
    }

    /// Advance playback by one frame
    pub fn tick(&mut self, request: FrameRequest, delta: f32) -> Option<FrameRequest> {
        self.timeline.tick(request, delta, &mut self.editor.scene)
    }

    /// Stop playback
    pub fn pause(&mut self) {
        self.timeline.pause(&mut self.editor.scene);
    }

    /// Scrub the playhead
    pub fn seek(&mut self, time: f32) {
        self.timeline.set_current_time(time, &mut self.editor.scene);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stagehand_core::{CreateEntityCommand, EntityBlueprint, ShapeKind};
    use stagehand_sequencer::TrackType;

    #[test]
    fn test_new_project_has_camera_track() {
        let studio = Studio::default();
        assert_eq!(studio.timeline.track_count(), 1);
        let active = studio.timeline.active_track().unwrap();
        assert_eq!(studio.timeline.track(active).unwrap().track_type(), TrackType::Camera);
        assert!(studio.editor.scene.objects.is_empty());
    }

    #[test]
    fn test_load_clears_history_and_defaults_timeline() {
        let mut studio = Studio::default();
        studio
            .editor
            .execute(CreateEntityCommand::new(EntityBlueprint::shape("cube", ShapeKind::Cube)))
            .unwrap();
        assert!(studio.editor.history.can_undo());

        let project = ProjectFile::from_json("{}").unwrap();
        assert_eq!(studio.load_project(project), 0);
        assert!(!studio.editor.history.can_undo());
        assert!(studio.editor.scene.objects.is_empty());
        assert_eq!(studio.timeline.track_count(), 1);
        assert_eq!(studio.render_settings(), RenderSettings::default());
    }

    #[test]
    fn test_load_without_render_settings_resets_previous() {
        let mut studio = Studio::default();
        studio.set_render_settings(RenderSettings { width: 640, height: 640 });
        assert_eq!(studio.editor.scene.camera.aspect, 1.0);

        studio.load_project(ProjectFile::default());
        assert_eq!(studio.render_settings(), RenderSettings::default());
        assert_eq!(studio.editor.scene.camera.aspect, 1920.0 / 1080.0);
    }

    #[test]
    fn test_project_round_trip() {
        let mut studio = Studio::default();
        studio
            .editor
            .execute(CreateEntityCommand::new(
                EntityBlueprint::shape("cube", ShapeKind::Cube).at([1.0, 2.0, 3.0]),
            ))
            .unwrap();
        studio.set_render_settings(RenderSettings { width: 800, height: 800 });
        studio.editor.scene.camera.fov = 35.0;
        studio.timeline.add_keyframe(&studio.editor.scene).unwrap();

        let json = studio.to_project().to_json().unwrap();
        let mut other = Studio::default();
        assert_eq!(other.load_project(ProjectFile::from_json(&json).unwrap()), 1);
        assert_eq!(other.render_settings().width, 800);
        assert_eq!(other.editor.scene.camera.aspect, 1.0);

        let id = other.editor.scene.objects.iter().next().unwrap().id();
        assert_eq!(other.editor.scene.entity_transform(id).unwrap().position, [1.0, 2.0, 3.0]);

        other.seek(0.0);
        assert_eq!(other.editor.scene.camera.fov, 35.0);
    }
}
