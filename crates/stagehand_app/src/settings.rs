// SPDX-License-Identifier: MIT OR Apache-2.0
//! Editor settings persisted as RON.

use crate::project::ProjectError;
use serde::{Deserialize, Serialize};
use stagehand_core::history::MAX_HISTORY;
use stagehand_sequencer::timeline::{DEFAULT_DURATION, DEFAULT_FRAME_RATE};
use std::path::Path;

/// Settings file name inside a settings directory
pub const SETTINGS_FILE_NAME: &str = "stagehand.ron";

/// Default tracing filter directive
pub const DEFAULT_LOG_FILTER: &str = "stagehand=info,stagehand_core=info,stagehand_sequencer=info";

/// Editor-wide tunables
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorSettings {
    /// Maximum undo depth
    pub history_depth: usize,
    /// Timeline length for new projects, in seconds
    pub default_duration: f32,
    /// Frame rate of the headless player
    pub playback_fps: f32,
    /// Tracing filter directive, overridden by `RUST_LOG`
    pub log_filter: String,
}

impl Default for EditorSettings {
    fn default() -> Self {
        Self {
            history_depth: MAX_HISTORY,
            default_duration: DEFAULT_DURATION,
            playback_fps: DEFAULT_FRAME_RATE,
            log_filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

impl EditorSettings {
    /// Load settings; a missing file yields the defaults
    pub fn load(path: &Path) -> Result<Self, ProjectError> {
        if !path.exists() {
            tracing::debug!("No settings at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let settings: EditorSettings = ron::from_str(&content)?;
        Ok(settings.sanitized())
    }

    /// Save settings
    pub fn save(&self, path: &Path) -> Result<(), ProjectError> {
        let config = ron::ser::PrettyConfig::default().struct_names(true);
        let content = ron::ser::to_string_pretty(self, config)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Replace out-of-range values with defaults
    fn sanitized(mut self) -> Self {
        let defaults = Self::default();
        if self.history_depth == 0 {
            tracing::warn!("history_depth must be at least 1; using {}", defaults.history_depth);
            self.history_depth = defaults.history_depth;
        }
        if self.default_duration.is_nan() || self.default_duration <= 0.0 {
            self.default_duration = defaults.default_duration;
        }
        if self.playback_fps.is_nan() || self.playback_fps <= 0.0 {
            tracing::warn!("playback_fps must be positive; using {}", defaults.playback_fps);
            self.playback_fps = defaults.playback_fps;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_settings_fill_defaults() {
        let settings: EditorSettings = ron::from_str("(history_depth: 20)").unwrap();
        assert_eq!(settings.history_depth, 20);
        assert_eq!(settings.default_duration, 10.0);
        assert_eq!(settings.playback_fps, 30.0);
        assert_eq!(settings.log_filter, DEFAULT_LOG_FILTER);
    }

    #[test]
    fn test_save_and_load() {
        let dir = std::env::temp_dir().join(format!("stagehand-settings-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(SETTINGS_FILE_NAME);

        let settings = EditorSettings {
            history_depth: 12,
            playback_fps: 24.0,
            ..EditorSettings::default()
        };
        settings.save(&path).unwrap();
        assert_eq!(EditorSettings::load(&path).unwrap(), settings);

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_missing_file_and_bad_values() {
        let missing = std::env::temp_dir().join(format!("{}.ron", uuid::Uuid::new_v4()));
        assert_eq!(EditorSettings::load(&missing).unwrap(), EditorSettings::default());

        let settings: EditorSettings = ron::from_str("(history_depth: 0, playback_fps: -1.0)").unwrap();
        let settings = settings.sanitized();
        assert_eq!(settings.history_depth, MAX_HISTORY);
        assert_eq!(settings.playback_fps, 30.0);
    }
}
