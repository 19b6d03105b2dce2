// SPDX-License-Identifier: MIT OR Apache-2.0
//! Project file format.
//!
//! A project is one JSON document holding the serialized entities, the
//! timeline and render settings. Optional sections may be missing; they load
//! as defaults.

use serde::{Deserialize, Serialize};
use stagehand_core::EntityRecord;
use stagehand_sequencer::TimelineRecord;
use std::path::Path;
use thiserror::Error;

/// Current project format version
pub const PROJECT_FORMAT_VERSION: u32 = 1;

/// Project persistence errors
#[derive(Debug, Error)]
pub enum ProjectError {
    /// File system error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed project JSON
    #[error("Project JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Malformed RON settings
    #[error("Settings parse error: {0}")]
    RonParse(#[from] ron::error::SpannedError),

    /// RON serialization failure
    #[error("Settings write error: {0}")]
    Ron(#[from] ron::Error),

    /// File written by a newer version
    #[error("Project version {found} is newer than supported version {supported}")]
    UnsupportedVersion {
        /// Version in the file
        found: u32,
        /// Newest version this build reads
        supported: u32,
    },
}

/// Output resolution used by the renderer
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RenderSettings {
    /// Output width in pixels
    pub width: u32,
    /// Output height in pixels
    pub height: u32,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
        }
    }
}

impl RenderSettings {
    /// Width over height, falling back to 16:9 for a zero height
    pub fn aspect(&self) -> f32 {
        if self.height == 0 {
            16.0 / 9.0
        } else {
            self.width as f32 / self.height as f32
        }
    }
}

/// Serialized project
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectFile {
    /// Format version
    #[serde(default = "default_version")]
    pub version: u32,
    /// Entities, parents before children
    #[serde(default)]
    pub entities: Vec<EntityRecord>,
    /// Timeline, if one was saved
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeline: Option<TimelineRecord>,
    /// Render settings, if any were saved
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub render_settings: Option<RenderSettings>,
}

fn default_version() -> u32 {
    PROJECT_FORMAT_VERSION
}

impl Default for ProjectFile {
    fn default() -> Self {
        Self {
            version: PROJECT_FORMAT_VERSION,
            entities: Vec::new(),
            timeline: None,
            render_settings: None,
        }
    }
}

impl ProjectFile {
    /// Parse a project from JSON text
    pub fn from_json(json: &str) -> Result<Self, ProjectError> {
        let project: ProjectFile = serde_json::from_str(json)?;
        if project.version > PROJECT_FORMAT_VERSION {
            return Err(ProjectError::UnsupportedVersion {
                found: project.version,
                supported: PROJECT_FORMAT_VERSION,
            });
        }
        Ok(project)
    }

    /// Pretty-printed JSON
    pub fn to_json(&self) -> Result<String, ProjectError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Load a project from disk
    pub fn load(path: &Path) -> Result<Self, ProjectError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Save a project to disk
    pub fn save(&self, path: &Path) -> Result<(), ProjectError> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }

    /// Render settings or defaults
    pub fn render_settings_or_default(&self) -> RenderSettings {
        self.render_settings.unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_project_loads_with_defaults() {
        let project = ProjectFile::from_json("{}").unwrap();
        assert_eq!(project.version, PROJECT_FORMAT_VERSION);
        assert!(project.entities.is_empty());
        assert!(project.timeline.is_none());
        assert_eq!(project.render_settings_or_default(), RenderSettings::default());
    }

    #[test]
    fn test_newer_version_rejected() {
        let err = ProjectFile::from_json(r#"{"version": 99}"#).unwrap_err();
        assert!(matches!(err, ProjectError::UnsupportedVersion { found: 99, .. }));
    }

    #[test]
    fn test_malformed_json() {
        assert!(matches!(ProjectFile::from_json("{"), Err(ProjectError::Json(_))));
    }

    #[test]
    fn test_optional_sections_omitted() {
        let json = ProjectFile::default().to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert!(value.get("timeline").is_none());
        assert!(value.get("renderSettings").is_none());
    }

    #[test]
    fn test_aspect() {
        assert_eq!(RenderSettings { width: 200, height: 100 }.aspect(), 2.0);
        assert_eq!(RenderSettings { width: 200, height: 0 }.aspect(), 16.0 / 9.0);
    }
}
