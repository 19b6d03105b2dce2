// SPDX-License-Identifier: MIT OR Apache-2.0
//! Keyframe timeline for Stagehand.
//!
//! This crate provides scene animation:
//! - Camera tracks (position, orientation, field of view)
//! - Entity transform tracks
//! - Sparse character pose tracks
//!
//! ## Architecture
//!
//! The sequencer is built on:
//! - Time-sorted keyframe lists with typed data
//! - Linear and spherical interpolation
//! - Targets resolved against a [`stagehand_core::Scene`] by ID
//! - Frame-request driven playback

pub mod binding;
pub mod keyframe;
pub mod timeline;
pub mod track;

pub use binding::TrackTarget;
pub use keyframe::{
    CameraKeyframe, Interpolation, Keyframe, KeyframeData, KeyframeId, KeyframeList, PoseKeyframe, Sample,
    TransformKeyframe, KEYFRAME_EPSILON,
};
pub use timeline::{FrameRequest, TimelineEvent, TimelineManager, TimelineRecord, DEFAULT_DURATION, MIN_DURATION};
pub use track::{CameraTrack, CharacterPoseTrack, EntityTransformTrack, Track, TrackError, TrackId, TrackRecord, TrackType};
