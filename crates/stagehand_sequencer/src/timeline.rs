// SPDX-License-Identifier: MIT OR Apache-2.0
//! Timeline playback and track management.
//!
//! The manager owns every track and drives them against a [`Scene`]. Playback
//! is frame-callback shaped: [`TimelineManager::play`] hands out a
//! [`FrameRequest`], the host passes it back to [`TimelineManager::tick`] with
//! the elapsed wall-clock time, and each tick returns the next request.
//! Pausing invalidates the outstanding request, so a tick scheduled before the
//! pause is ignored.

use crate::binding::TrackTarget;
use crate::keyframe::KeyframeId;
use crate::track::{
    CameraTrack, CharacterPoseTrack, EntityTransformTrack, Track, TrackError, TrackId, TrackRecord, TrackType,
};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use stagehand_core::{EntityId, Observer, Scene};

/// Default timeline length in seconds
pub const DEFAULT_DURATION: f32 = 10.0;

/// Shortest allowed timeline
pub const MIN_DURATION: f32 = 0.1;

/// Default frame rate for frame/time conversion
pub const DEFAULT_FRAME_RATE: f32 = 30.0;

/// Token for one scheduled playback frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameRequest(u64);

/// Timeline change notifications
#[derive(Debug, Clone, PartialEq)]
pub enum TimelineEvent {
    /// Current time moved
    TimeChanged(f32),
    /// Playback started (`true`) or stopped (`false`)
    PlaybackChanged(bool),
    /// A track was added or removed
    TracksChanged,
    /// Keyframes of a track changed
    KeyframesChanged(TrackId),
    /// The active track changed
    ActiveTrackChanged(Option<TrackId>),
    /// Duration changed
    DurationChanged(f32),
}

/// Serialized timeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineRecord {
    /// Length in seconds
    #[serde(default = "default_duration")]
    pub duration: f32,
    /// Track that receives new keyframes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_track: Option<TrackId>,
    /// Tracks in order
    #[serde(default)]
    pub tracks: Vec<TrackRecord>,
}

fn default_duration() -> f32 {
    DEFAULT_DURATION
}

impl Default for TimelineRecord {
    fn default() -> Self {
        Self {
            duration: DEFAULT_DURATION,
            active_track: None,
            tracks: Vec::new(),
        }
    }
}

/// Owns the tracks and the playhead
#[derive(Debug)]
pub struct TimelineManager {
    duration: f32,
    current_time: f32,
    playing: bool,
    frame_rate: f32,
    tracks: IndexMap<TrackId, Track>,
    active: Option<TrackId>,
    pending: Option<FrameRequest>,
    next_request: u64,
    /// Change notifications
    pub events: Observer<TimelineEvent>,
}

impl Default for TimelineManager {
    fn default() -> Self {
        Self::new()
    }
}

impl TimelineManager {
    /// Create an empty timeline of [`DEFAULT_DURATION`]
    pub fn new() -> Self {
        Self::with_duration(DEFAULT_DURATION)
    }

    /// Create an empty timeline of the given length
    pub fn with_duration(duration: f32) -> Self {
        Self {
            duration: duration.max(MIN_DURATION),
            current_time: 0.0,
            playing: false,
            frame_rate: DEFAULT_FRAME_RATE,
            tracks: IndexMap::new(),
            active: None,
            pending: None,
            next_request: 1,
            events: Observer::new(),
        }
    }

    // ---- playhead ----

    /// Timeline length in seconds
    pub fn duration(&self) -> f32 {
        self.duration
    }

    /// Set the length, clamped to [`MIN_DURATION`]. The playhead is pulled in
    /// when it falls past the new end.
    pub fn set_duration(&mut self, duration: f32) {
        self.duration = duration.max(MIN_DURATION);
        if self.current_time > self.duration {
            self.current_time = self.duration;
            self.events.notify(&TimelineEvent::TimeChanged(self.current_time));
        }
        self.events.notify(&TimelineEvent::DurationChanged(self.duration));
    }

    /// Playhead position in seconds
    pub fn current_time(&self) -> f32 {
        self.current_time
    }

    /// Frame rate used by [`Self::time_to_frame`]
    pub fn frame_rate(&self) -> f32 {
        self.frame_rate
    }

    /// Set the frame rate. Non-positive rates are ignored.
    pub fn set_frame_rate(&mut self, fps: f32) {
        if fps > 0.0 {
            self.frame_rate = fps;
        }
    }

    /// Whether playback is running
    pub fn is_playing(&self) -> bool {
        self.playing
    }

    /// Scrub to `time`: clamp, evaluate every track once and give manual
    /// camera control back to the user
    pub fn set_current_time(&mut self, time: f32, scene: &mut Scene) {
        self.current_time = time.clamp(0.0, self.duration);
        self.evaluate(scene);
        scene.camera_controls.enabled = true;
        self.events.notify(&TimelineEvent::TimeChanged(self.current_time));
    }

    /// Start playback. Manual camera controls stay disabled until [`Self::pause`].
    pub fn play(&mut self, scene: &mut Scene) -> FrameRequest {
        if let (true, Some(pending)) = (self.playing, self.pending) {
            return pending;
        }
        self.playing = true;
        scene.camera_controls.enabled = false;
        tracing::info!("Timeline playback started at {:.3}s", self.current_time);
        self.events.notify(&TimelineEvent::PlaybackChanged(true));
        self.schedule()
    }

    /// Advance by `delta` seconds for a scheduled frame.
    ///
    /// Returns the next request, or `None` when `request` is stale (playback
    /// was paused or restarted since it was issued).
    pub fn tick(&mut self, request: FrameRequest, delta: f32, scene: &mut Scene) -> Option<FrameRequest> {
        if !self.playing || self.pending != Some(request) {
            tracing::trace!("Ignoring stale frame request {:?}", request);
            return None;
        }
        self.current_time += delta.max(0.0);
        if self.current_time > self.duration {
            self.current_time = 0.0;
        }
        self.evaluate(scene);
        self.events.notify(&TimelineEvent::TimeChanged(self.current_time));
        Some(self.schedule())
    }

    /// Stop playback, cancel the pending frame and restore manual camera control
    pub fn pause(&mut self, scene: &mut Scene) {
        self.pending = None;
        scene.camera_controls.enabled = true;
        if self.playing {
            self.playing = false;
            tracing::info!("Timeline paused at {:.3}s", self.current_time);
            self.events.notify(&TimelineEvent::PlaybackChanged(false));
        }
    }

    fn schedule(&mut self) -> FrameRequest {
        let request = FrameRequest(self.next_request);
        self.next_request += 1;
        self.pending = Some(request);
        request
    }

    /// Write every track's value at the playhead into the scene
    pub fn evaluate(&self, scene: &mut Scene) {
        for track in self.tracks.values() {
            if let Err(err) = track.update_target_at_time(self.current_time, scene) {
                tracing::debug!("Track {} not evaluated: {}", track.name(), err);
            }
        }
    }

    // ---- tracks ----

    /// Tracks in creation order
    pub fn tracks(&self) -> impl Iterator<Item = &Track> {
        self.tracks.values()
    }

    /// Number of tracks
    pub fn track_count(&self) -> usize {
        self.tracks.len()
    }

    /// Look up a track
    pub fn track(&self, id: TrackId) -> Option<&Track> {
        self.tracks.get(&id)
    }

    /// Look up a track mutably
    pub fn track_mut(&mut self, id: TrackId) -> Option<&mut Track> {
        self.tracks.get_mut(&id)
    }

    /// First track driving `target`
    pub fn track_for_target(&self, target: TrackTarget) -> Option<&Track> {
        self.tracks.values().find(|t| t.target() == target)
    }

    /// Track receiving new keyframes
    pub fn active_track(&self) -> Option<TrackId> {
        self.active
    }

    /// Choose the track that receives new keyframes
    pub fn set_active_track(&mut self, id: Option<TrackId>) -> Result<(), TrackError> {
        if let Some(id) = id {
            if !self.tracks.contains_key(&id) {
                return Err(TrackError::TrackNotFound(id));
            }
        }
        if self.active != id {
            self.active = id;
            self.events.notify(&TimelineEvent::ActiveTrackChanged(id));
        }
        Ok(())
    }

    fn push_track(&mut self, track: Track) -> TrackId {
        let id = track.id();
        let first_camera = track.track_type() == TrackType::Camera
            && !self.tracks.values().any(|t| t.track_type() == TrackType::Camera);
        tracing::debug!("Adding {} track {}", track.track_type().name(), track.name());
        self.tracks.insert(id, track);
        self.events.notify(&TimelineEvent::TracksChanged);
        if first_camera {
            self.active = Some(id);
            self.events.notify(&TimelineEvent::ActiveTrackChanged(Some(id)));
        }
        id
    }

    /// Add a camera track. The first camera track becomes active.
    pub fn create_camera_track(&mut self, name: impl Into<String>) -> TrackId {
        self.push_track(Track::Camera(CameraTrack::new(name)))
    }

    /// Add a transform track for an entity
    pub fn create_entity_track(
        &mut self,
        name: impl Into<String>,
        entity: EntityId,
        scene: &Scene,
    ) -> Result<TrackId, TrackError> {
        let target = TrackTarget::Entity(entity);
        if !target.resolves(scene) {
            return Err(TrackError::TargetNotFound(target));
        }
        Ok(self.push_track(Track::EntityTransform(EntityTransformTrack::new(name, entity))))
    }

    /// Add a pose track for a character
    pub fn create_character_pose_track(
        &mut self,
        name: impl Into<String>,
        character: EntityId,
        scene: &Scene,
    ) -> Result<TrackId, TrackError> {
        let target = TrackTarget::Character(character);
        if !scene.objects.contains(character) {
            return Err(TrackError::TargetNotFound(target));
        }
        if !target.resolves(scene) {
            return Err(TrackError::WrongTargetKind(target, "character"));
        }
        Ok(self.push_track(Track::CharacterPose(CharacterPoseTrack::new(name, character))))
    }

    /// Remove a track. If it was active, the first remaining camera track
    /// takes over.
    pub fn remove_track(&mut self, id: TrackId) -> Option<Track> {
        let track = self.tracks.shift_remove(&id)?;
        self.events.notify(&TimelineEvent::TracksChanged);
        if self.active == Some(id) {
            self.active = self
                .tracks
                .values()
                .find(|t| t.track_type() == TrackType::Camera)
                .map(Track::id);
            self.events.notify(&TimelineEvent::ActiveTrackChanged(self.active));
        }
        Some(track)
    }

    /// Drop every track and rewind
    pub fn clear(&mut self, scene: &mut Scene) {
        self.pause(scene);
        self.tracks.clear();
        self.active = None;
        self.current_time = 0.0;
        self.events.notify(&TimelineEvent::TracksChanged);
        self.events.notify(&TimelineEvent::ActiveTrackChanged(None));
        self.events.notify(&TimelineEvent::TimeChanged(0.0));
    }

    // ---- keyframes ----

    /// Capture the active track's target at the playhead
    pub fn add_keyframe(&mut self, scene: &Scene) -> Result<KeyframeId, TrackError> {
        let id = self.active.ok_or(TrackError::NoActiveTrack)?;
        let track = self.tracks.get_mut(&id).ok_or(TrackError::NoActiveTrack)?;
        let keyframe = track.add_keyframe(self.current_time, scene)?;
        self.events.notify(&TimelineEvent::KeyframesChanged(id));
        Ok(keyframe)
    }

    /// Remove a keyframe from the active track
    pub fn remove_keyframe(&mut self, keyframe: KeyframeId) -> bool {
        let Some(id) = self.active else {
            return false;
        };
        let removed = self.tracks.get_mut(&id).is_some_and(|t| t.remove_keyframe(keyframe));
        if removed {
            self.events.notify(&TimelineEvent::KeyframesChanged(id));
        }
        removed
    }

    // ---- queries ----

    /// Time of the latest keyframe across all tracks
    pub fn content_duration(&self) -> f32 {
        self.tracks.values().map(Track::duration).fold(0.0, f32::max)
    }

    /// Convert time to frame number
    pub fn time_to_frame(&self, time: f32) -> u32 {
        (time.max(0.0) * self.frame_rate).round() as u32
    }

    /// Convert frame number to time
    pub fn frame_to_time(&self, frame: u32) -> f32 {
        frame as f32 / self.frame_rate
    }

    // ---- persistence ----

    /// Serializable snapshot of every track in order
    pub fn serialize(&self) -> TimelineRecord {
        TimelineRecord {
            duration: self.duration,
            active_track: self.active,
            tracks: self.tracks.values().map(Track::to_record).collect(),
        }
    }

    /// Replace the tracks with `record`.
    ///
    /// Targets are resolved against `scene`; a track whose target is missing
    /// is dropped with a warning and the rest still load. Returns the number
    /// of tracks loaded.
    pub fn load(&mut self, record: TimelineRecord, scene: &mut Scene) -> usize {
        self.pause(scene);
        self.tracks.clear();
        self.active = None;
        self.duration = record.duration.max(MIN_DURATION);
        self.current_time = 0.0;

        for track in record.tracks {
            let target = track.target();
            match Track::from_record(track, scene) {
                Ok(track) => {
                    self.tracks.insert(track.id(), track);
                }
                Err(err) => tracing::warn!("Skipping timeline track for {}: {}", target, err),
            }
        }

        self.active = record
            .active_track
            .filter(|id| self.tracks.contains_key(id))
            .or_else(|| {
                self.tracks
                    .values()
                    .find(|t| t.track_type() == TrackType::Camera)
                    .map(Track::id)
            });

        tracing::info!("Loaded timeline with {} tracks", self.tracks.len());
        self.events.notify(&TimelineEvent::DurationChanged(self.duration));
        self.events.notify(&TimelineEvent::TracksChanged);
        self.events.notify(&TimelineEvent::ActiveTrackChanged(self.active));
        self.events.notify(&TimelineEvent::TimeChanged(0.0));
        self.tracks.len()
    }
}
