// SPDX-License-Identifier: MIT OR Apache-2.0
//! Track definitions for the sequencer.
//!
//! Each track captures its target's live state into keyframes and writes
//! resolved values back into the scene:
//! - [`CameraTrack`]: position, orientation and field of view
//! - [`EntityTransformTrack`]: position, orientation and scale
//! - [`CharacterPoseTrack`]: sparse per-bone pose

use crate::binding::TrackTarget;
use crate::keyframe::{CameraKeyframe, Keyframe, KeyframeId, KeyframeList, PoseKeyframe, TransformKeyframe};
use serde::{Deserialize, Serialize};
use stagehand_core::{BonePose, Entity, EntityId, Scene, Transform};
use thiserror::Error;
use uuid::Uuid;

/// Track errors
#[derive(Debug, Error)]
pub enum TrackError {
    /// Target is not in the scene
    #[error("Track target not found: {0}")]
    TargetNotFound(TrackTarget),

    /// Target exists but has the wrong kind
    #[error("Track target {0} is not a {1}")]
    WrongTargetKind(TrackTarget, &'static str),

    /// No track is active
    #[error("No active track")]
    NoActiveTrack,

    /// Unknown track
    #[error("Track not found: {0:?}")]
    TrackNotFound(TrackId),
}

/// Unique identifier for a track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TrackId(pub Uuid);

impl TrackId {
    /// Create a new random track ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TrackId {
    fn default() -> Self {
        Self::new()
    }
}

/// Type of track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrackType {
    /// Camera settings
    Camera,
    /// Entity transform
    EntityTransform,
    /// Character pose
    CharacterPose,
}

impl TrackType {
    /// Get the display name
    pub fn name(&self) -> &'static str {
        match self {
            Self::Camera => "Camera",
            Self::EntityTransform => "Transform",
            Self::CharacterPose => "Pose",
        }
    }
}

/// Camera track
#[derive(Debug, Clone)]
pub struct CameraTrack {
    /// Unique track ID
    pub id: TrackId,
    /// Track name
    pub name: String,
    /// Keyframes
    pub keyframes: KeyframeList<CameraKeyframe>,
}

impl CameraTrack {
    /// Create an empty camera track
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: TrackId::new(),
            name: name.into(),
            keyframes: KeyframeList::new(),
        }
    }

    /// Capture the camera into a keyframe
    pub fn add_keyframe(&mut self, time: f32, scene: &Scene) -> KeyframeId {
        let camera = &scene.camera;
        self.keyframes.insert(
            time,
            CameraKeyframe {
                position: camera.position,
                rotation: camera.rotation,
                fov: camera.fov,
            },
        )
    }

    /// Drive the camera to its state at `time` and refresh the projection
    pub fn update_target_at_time(&self, time: f32, scene: &mut Scene) {
        let Some(state) = self.keyframes.evaluate(time) else {
            return;
        };
        let camera = &mut scene.camera;
        camera.position = state.position;
        camera.rotation = state.rotation;
        camera.fov = state.fov;
        camera.update_projection_matrix();
    }
}

/// Entity transform track
#[derive(Debug, Clone)]
pub struct EntityTransformTrack {
    /// Unique track ID
    pub id: TrackId,
    /// Track name
    pub name: String,
    /// Driven entity
    pub entity: EntityId,
    /// Keyframes
    pub keyframes: KeyframeList<TransformKeyframe>,
}

impl EntityTransformTrack {
    /// Create an empty track for an entity
    pub fn new(name: impl Into<String>, entity: EntityId) -> Self {
        Self {
            id: TrackId::new(),
            name: name.into(),
            entity,
            keyframes: KeyframeList::new(),
        }
    }

    /// Capture the entity's local transform into a keyframe
    pub fn add_keyframe(&mut self, time: f32, scene: &Scene) -> Result<KeyframeId, TrackError> {
        let transform = scene
            .entity_transform(self.entity)
            .ok_or(TrackError::TargetNotFound(TrackTarget::Entity(self.entity)))?;
        Ok(self.keyframes.insert(
            time,
            TransformKeyframe {
                position: transform.position,
                rotation: transform.rotation,
                scale: transform.scale,
            },
        ))
    }

    /// Drive the entity to its state at `time`. The world matrix is
    /// refreshed before returning.
    pub fn update_target_at_time(&self, time: f32, scene: &mut Scene) -> Result<(), TrackError> {
        let node = scene
            .objects
            .get(self.entity)
            .map(Entity::node)
            .ok_or(TrackError::TargetNotFound(TrackTarget::Entity(self.entity)))?;
        let Some(state) = self.keyframes.evaluate(time) else {
            return Ok(());
        };
        let transform = Transform {
            position: state.position,
            rotation: state.rotation,
            scale: state.scale,
        };
        scene
            .graph
            .set_transform(node, transform)
            .map_err(|_| TrackError::TargetNotFound(TrackTarget::Entity(self.entity)))?;
        scene.graph.update_world_matrix(node);
        Ok(())
    }
}

/// Character pose track
#[derive(Debug, Clone)]
pub struct CharacterPoseTrack {
    /// Unique track ID
    pub id: TrackId,
    /// Track name
    pub name: String,
    /// Driven character
    pub character: EntityId,
    /// Keyframes
    pub keyframes: KeyframeList<PoseKeyframe>,
}

impl CharacterPoseTrack {
    /// Create an empty track for a character
    pub fn new(name: impl Into<String>, character: EntityId) -> Self {
        Self {
            id: TrackId::new(),
            name: name.into(),
            character,
            keyframes: KeyframeList::new(),
        }
    }

    fn target(&self) -> TrackTarget {
        TrackTarget::Character(self.character)
    }

    /// Capture every bone whose live orientation or position differs from
    /// the character's initial pose
    pub fn add_keyframe(&mut self, time: f32, scene: &Scene) -> Result<KeyframeId, TrackError> {
        let entity = scene
            .objects
            .get(self.character)
            .ok_or(TrackError::TargetNotFound(self.target()))?;
        let data = entity
            .character()
            .ok_or(TrackError::WrongTargetKind(self.target(), "character"))?;
        let bones = data.sparse_pose(&scene.graph);
        Ok(self.keyframes.insert(time, PoseKeyframe { bones }))
    }

    /// Pose the character for `time`.
    ///
    /// Bones absent from the resolved pose return to the initial pose. Bone
    /// world matrices, the skeleton and the bone-control overlay are all
    /// refreshed.
    pub fn update_target_at_time(&self, time: f32, scene: &mut Scene) -> Result<(), TrackError> {
        let target = self.target();
        let Scene { graph, objects, .. } = scene;
        let data = objects
            .get_mut(self.character)
            .ok_or(TrackError::TargetNotFound(target))?
            .character_mut()
            .ok_or(TrackError::WrongTargetKind(target, "character"))?;
        let Some(pose) = self.keyframes.evaluate(time) else {
            return Ok(());
        };

        for (name, rest) in data.initial_pose() {
            let bone = pose.bones.get(name).copied().unwrap_or(BonePose {
                rotation: rest.rotation,
                position: Some(rest.position),
            });
            data.apply_bone_pose(graph, name, &bone);
        }
        for name in pose.bones.keys().filter(|name| !data.initial_pose().contains_key(*name)) {
            tracing::warn!("Pose keyframe references unknown bone {}; skipping", name);
        }
        data.update_skeleton(graph);
        Ok(())
    }
}

/// A track in the sequencer
#[derive(Debug, Clone)]
pub enum Track {
    /// Camera track
    Camera(CameraTrack),
    /// Entity transform track
    EntityTransform(EntityTransformTrack),
    /// Character pose track
    CharacterPose(CharacterPoseTrack),
}

impl Track {
    /// Track ID
    pub fn id(&self) -> TrackId {
        match self {
            Self::Camera(t) => t.id,
            Self::EntityTransform(t) => t.id,
            Self::CharacterPose(t) => t.id,
        }
    }

    /// Track name
    pub fn name(&self) -> &str {
        match self {
            Self::Camera(t) => &t.name,
            Self::EntityTransform(t) => &t.name,
            Self::CharacterPose(t) => &t.name,
        }
    }

    /// Track type
    pub fn track_type(&self) -> TrackType {
        match self {
            Self::Camera(_) => TrackType::Camera,
            Self::EntityTransform(_) => TrackType::EntityTransform,
            Self::CharacterPose(_) => TrackType::CharacterPose,
        }
    }

    /// What this track drives
    pub fn target(&self) -> TrackTarget {
        match self {
            Self::Camera(_) => TrackTarget::Camera,
            Self::EntityTransform(t) => TrackTarget::Entity(t.entity),
            Self::CharacterPose(t) => TrackTarget::Character(t.character),
        }
    }

    /// Number of keyframes
    pub fn keyframe_count(&self) -> usize {
        match self {
            Self::Camera(t) => t.keyframes.len(),
            Self::EntityTransform(t) => t.keyframes.len(),
            Self::CharacterPose(t) => t.keyframes.len(),
        }
    }

    /// Time of the last keyframe
    pub fn duration(&self) -> f32 {
        match self {
            Self::Camera(t) => t.keyframes.duration(),
            Self::EntityTransform(t) => t.keyframes.duration(),
            Self::CharacterPose(t) => t.keyframes.duration(),
        }
    }

    /// Keyframe times in order
    pub fn keyframe_times(&self) -> Vec<f32> {
        match self {
            Self::Camera(t) => t.keyframes.iter().map(|k| k.time).collect(),
            Self::EntityTransform(t) => t.keyframes.iter().map(|k| k.time).collect(),
            Self::CharacterPose(t) => t.keyframes.iter().map(|k| k.time).collect(),
        }
    }

    /// Capture the target's live state at `time`
    pub fn add_keyframe(&mut self, time: f32, scene: &Scene) -> Result<KeyframeId, TrackError> {
        match self {
            Self::Camera(t) => Ok(t.add_keyframe(time, scene)),
            Self::EntityTransform(t) => t.add_keyframe(time, scene),
            Self::CharacterPose(t) => t.add_keyframe(time, scene),
        }
    }

    /// Remove a keyframe
    pub fn remove_keyframe(&mut self, id: KeyframeId) -> bool {
        match self {
            Self::Camera(t) => t.keyframes.remove(id).is_some(),
            Self::EntityTransform(t) => t.keyframes.remove(id).is_some(),
            Self::CharacterPose(t) => t.keyframes.remove(id).is_some(),
        }
    }

    /// Write the state at `time` into the target
    pub fn update_target_at_time(&self, time: f32, scene: &mut Scene) -> Result<(), TrackError> {
        match self {
            Self::Camera(t) => {
                t.update_target_at_time(time, scene);
                Ok(())
            }
            Self::EntityTransform(t) => t.update_target_at_time(time, scene),
            Self::CharacterPose(t) => t.update_target_at_time(time, scene),
        }
    }

    /// Serializable record
    pub fn to_record(&self) -> TrackRecord {
        match self {
            Self::Camera(t) => TrackRecord::Camera {
                id: t.id,
                name: t.name.clone(),
                keyframes: t.keyframes.to_vec(),
            },
            Self::EntityTransform(t) => TrackRecord::EntityTransform {
                id: t.id,
                name: t.name.clone(),
                entity_id: t.entity,
                keyframes: t.keyframes.to_vec(),
            },
            Self::CharacterPose(t) => TrackRecord::CharacterPose {
                id: t.id,
                name: t.name.clone(),
                character_id: t.character,
                keyframes: t.keyframes.to_vec(),
            },
        }
    }

    /// Rebuild from a record, resolving the target against `scene`
    pub fn from_record(record: TrackRecord, scene: &Scene) -> Result<Self, TrackError> {
        let target = record.target();
        if !target.resolves(scene) {
            return Err(match target {
                TrackTarget::Character(id) if scene.objects.contains(id) => {
                    TrackError::WrongTargetKind(target, "character")
                }
                _ => TrackError::TargetNotFound(target),
            });
        }
        Ok(match record {
            TrackRecord::Camera { id, name, keyframes } => Self::Camera(CameraTrack {
                id,
                name,
                keyframes: keyframes.into(),
            }),
            TrackRecord::EntityTransform {
                id,
                name,
                entity_id,
                keyframes,
            } => Self::EntityTransform(EntityTransformTrack {
                id,
                name,
                entity: entity_id,
                keyframes: keyframes.into(),
            }),
            TrackRecord::CharacterPose {
                id,
                name,
                character_id,
                keyframes,
            } => Self::CharacterPose(CharacterPoseTrack {
                id,
                name,
                character: character_id,
                keyframes: keyframes.into(),
            }),
        })
    }
}

/// Serialized form of a track, discriminated by `type`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum TrackRecord {
    /// Camera track; the camera is identified by type alone
    Camera {
        /// Track ID
        #[serde(default)]
        id: TrackId,
        /// Track name
        #[serde(default)]
        name: String,
        /// Keyframes
        keyframes: Vec<Keyframe<CameraKeyframe>>,
    },
    /// Entity transform track
    EntityTransform {
        /// Track ID
        #[serde(default)]
        id: TrackId,
        /// Track name
        #[serde(default)]
        name: String,
        /// Driven entity
        entity_id: EntityId,
        /// Keyframes
        keyframes: Vec<Keyframe<TransformKeyframe>>,
    },
    /// Character pose track
    CharacterPose {
        /// Track ID
        #[serde(default)]
        id: TrackId,
        /// Track name
        #[serde(default)]
        name: String,
        /// Driven character
        character_id: EntityId,
        /// Keyframes
        keyframes: Vec<Keyframe<PoseKeyframe>>,
    },
}

impl TrackRecord {
    /// Target named by this record
    pub fn target(&self) -> TrackTarget {
        match self {
            Self::Camera { .. } => TrackTarget::Camera,
            Self::EntityTransform { entity_id, .. } => TrackTarget::Entity(*entity_id),
            Self::CharacterPose { character_id, .. } => TrackTarget::Character(*character_id),
        }
    }
}
