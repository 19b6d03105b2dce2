// SPDX-License-Identifier: MIT OR Apache-2.0
//! Stagehand studio.
//!
//! This crate ties the scene-authoring core to the timeline:
//! - Editor settings persisted as RON
//! - JSON project files holding entities, timeline and render settings
//! - A [`Studio`] that loads, saves and plays a project
//!
//! The `stagehand` binary is a headless player built on top of it.

pub mod project;
pub mod settings;
pub mod studio;

pub use project::{ProjectError, ProjectFile, RenderSettings, PROJECT_FORMAT_VERSION};
pub use settings::{EditorSettings, DEFAULT_LOG_FILTER, SETTINGS_FILE_NAME};
pub use studio::{Studio, DEFAULT_CAMERA_TRACK};
