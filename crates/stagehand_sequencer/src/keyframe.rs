// SPDX-License-Identifier: MIT OR Apache-2.0
//! Keyframe definitions for the sequencer.
//!
//! A [`KeyframeList`] keeps its keyframes sorted by time. Inserting within
//! [`KEYFRAME_EPSILON`] of an existing keyframe replaces it.

use serde::{Deserialize, Serialize};
use stagehand_core::{BonePose, SparsePose};
use uuid::Uuid;

/// Two keyframes closer than this (seconds) occupy the same slot
pub const KEYFRAME_EPSILON: f32 = 0.01;

/// Unique identifier for a keyframe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KeyframeId(pub Uuid);

impl KeyframeId {
    /// Create a new random keyframe ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for KeyframeId {
    fn default() -> Self {
        Self::new()
    }
}

/// Interpolation utilities
pub struct Interpolation;

impl Interpolation {
    /// Linear interpolation between two floats
    pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
        a + (b - a) * t
    }

    /// Interpolate Vec3
    pub fn lerp_vec3(a: [f32; 3], b: [f32; 3], t: f32) -> [f32; 3] {
        [
            Self::lerp(a[0], b[0], t),
            Self::lerp(a[1], b[1], t),
            Self::lerp(a[2], b[2], t),
        ]
    }

    /// Interpolate Vec4
    pub fn lerp_vec4(a: [f32; 4], b: [f32; 4], t: f32) -> [f32; 4] {
        [
            Self::lerp(a[0], b[0], t),
            Self::lerp(a[1], b[1], t),
            Self::lerp(a[2], b[2], t),
            Self::lerp(a[3], b[3], t),
        ]
    }

    /// Spherical linear interpolation for quaternions
    pub fn slerp(a: [f32; 4], b: [f32; 4], t: f32) -> [f32; 4] {
        let mut dot = a[0] * b[0] + a[1] * b[1] + a[2] * b[2] + a[3] * b[3];

        // Take the short way round
        let mut b = b;
        if dot < 0.0 {
            b = [-b[0], -b[1], -b[2], -b[3]];
            dot = -dot;
        }

        // Use lerp for very close quaternions
        if dot > 0.9995 {
            return Self::normalize(Self::lerp_vec4(a, b, t));
        }

        let theta_0 = dot.acos();
        let theta = theta_0 * t;
        let sin_theta = theta.sin();
        let sin_theta_0 = theta_0.sin();

        let s0 = theta.cos() - dot * sin_theta / sin_theta_0;
        let s1 = sin_theta / sin_theta_0;

        Self::normalize([
            a[0] * s0 + b[0] * s1,
            a[1] * s0 + b[1] * s1,
            a[2] * s0 + b[2] * s1,
            a[3] * s0 + b[3] * s1,
        ])
    }

    fn normalize(q: [f32; 4]) -> [f32; 4] {
        let len = (q[0] * q[0] + q[1] * q[1] + q[2] * q[2] + q[3] * q[3]).sqrt();
        if len <= f32::EPSILON {
            return [0.0, 0.0, 0.0, 1.0];
        }
        [q[0] / len, q[1] / len, q[2] / len, q[3] / len]
    }
}

/// Data a keyframe can carry
pub trait KeyframeData: Clone {
    /// Value between `self` (t = 0) and `other` (t = 1)
    fn interpolate(&self, other: &Self, t: f32) -> Self;
}

/// A keyframe in a track
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Keyframe<D> {
    /// Unique keyframe ID
    pub id: KeyframeId,
    /// Time in seconds
    pub time: f32,
    /// Captured state
    pub data: D,
}

impl<D> Keyframe<D> {
    /// Create a new keyframe
    pub fn new(time: f32, data: D) -> Self {
        Self {
            id: KeyframeId::new(),
            time,
            data,
        }
    }
}

/// Position of a time relative to the keyframes
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Sample<'a, D> {
    /// Before the first, after the last, or on a single keyframe
    Hold(&'a D),
    /// Between two keyframes
    Blend {
        /// Keyframe at or before the time
        before: &'a D,
        /// Keyframe after the time
        after: &'a D,
        /// Normalized parameter in [0, 1)
        t: f32,
    },
}

/// Time-sorted keyframes
#[derive(Debug, Clone, PartialEq)]
pub struct KeyframeList<D> {
    keyframes: Vec<Keyframe<D>>,
}

impl<D> Default for KeyframeList<D> {
    fn default() -> Self {
        Self { keyframes: Vec::new() }
    }
}

impl<D> KeyframeList<D> {
    /// Create an empty list
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert in time order, replacing a keyframe within [`KEYFRAME_EPSILON`].
    /// A replaced keyframe keeps its ID.
    pub fn insert(&mut self, time: f32, data: D) -> KeyframeId {
        if let Some(existing) = self
            .keyframes
            .iter_mut()
            .find(|k| (k.time - time).abs() < KEYFRAME_EPSILON)
        {
            existing.time = time;
            existing.data = data;
            return existing.id;
        }
        let keyframe = Keyframe::new(time, data);
        let id = keyframe.id;
        let index = self.keyframes.partition_point(|k| k.time < time);
        self.keyframes.insert(index, keyframe);
        id
    }

    /// Remove a keyframe
    pub fn remove(&mut self, id: KeyframeId) -> Option<Keyframe<D>> {
        let index = self.keyframes.iter().position(|k| k.id == id)?;
        Some(self.keyframes.remove(index))
    }

    /// Get keyframe at time (if exists)
    pub fn keyframe_at(&self, time: f32) -> Option<&Keyframe<D>> {
        self.keyframes.iter().find(|k| (k.time - time).abs() < KEYFRAME_EPSILON)
    }

    /// Keyframes in time order
    pub fn iter(&self) -> impl Iterator<Item = &Keyframe<D>> {
        self.keyframes.iter()
    }

    /// Number of keyframes
    pub fn len(&self) -> usize {
        self.keyframes.len()
    }

    /// Whether there are no keyframes
    pub fn is_empty(&self) -> bool {
        self.keyframes.is_empty()
    }

    /// Time of the last keyframe
    pub fn duration(&self) -> f32 {
        self.keyframes.last().map_or(0.0, |k| k.time)
    }

    /// Locate `time` among the keyframes
    pub fn sample(&self, time: f32) -> Option<Sample<'_, D>> {
        let first = self.keyframes.first()?;
        let next = self.keyframes.partition_point(|k| k.time <= time);
        if next == 0 {
            return Some(Sample::Hold(&first.data));
        }
        let before = &self.keyframes[next - 1];
        let Some(after) = self.keyframes.get(next) else {
            return Some(Sample::Hold(&before.data));
        };
        let span = after.time - before.time;
        let t = if span > 0.0 { (time - before.time) / span } else { 0.0 };
        Some(Sample::Blend {
            before: &before.data,
            after: &after.data,
            t,
        })
    }

    /// Copy out as a plain vector
    pub fn to_vec(&self) -> Vec<Keyframe<D>>
    where
        D: Clone,
    {
        self.keyframes.clone()
    }
}

impl<D: KeyframeData> KeyframeList<D> {
    /// Resolved value at `time`
    pub fn evaluate(&self, time: f32) -> Option<D> {
        match self.sample(time)? {
            Sample::Hold(data) => Some(data.clone()),
            Sample::Blend { before, after, t } => Some(before.interpolate(after, t)),
        }
    }
}

impl<D> From<Vec<Keyframe<D>>> for KeyframeList<D> {
    fn from(mut keyframes: Vec<Keyframe<D>>) -> Self {
        keyframes.sort_by(|a, b| a.time.total_cmp(&b.time));
        Self { keyframes }
    }
}

/// Camera state
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraKeyframe {
    /// Position
    pub position: [f32; 3],
    /// Orientation quaternion (x, y, z, w)
    pub rotation: [f32; 4],
    /// Vertical field of view in degrees
    pub fov: f32,
}

impl KeyframeData for CameraKeyframe {
    fn interpolate(&self, other: &Self, t: f32) -> Self {
        Self {
            position: Interpolation::lerp_vec3(self.position, other.position, t),
            rotation: Interpolation::slerp(self.rotation, other.rotation, t),
            fov: Interpolation::lerp(self.fov, other.fov, t),
        }
    }
}

/// Entity transform state
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TransformKeyframe {
    /// Position
    pub position: [f32; 3],
    /// Orientation quaternion (x, y, z, w)
    pub rotation: [f32; 4],
    /// Scale
    pub scale: [f32; 3],
}

impl KeyframeData for TransformKeyframe {
    fn interpolate(&self, other: &Self, t: f32) -> Self {
        Self {
            position: Interpolation::lerp_vec3(self.position, other.position, t),
            rotation: Interpolation::slerp(self.rotation, other.rotation, t),
            scale: Interpolation::lerp_vec3(self.scale, other.scale, t),
        }
    }
}

/// Sparse character pose: only bones posed away from the initial pose
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PoseKeyframe {
    /// Posed bones by name
    pub bones: SparsePose,
}

impl KeyframeData for PoseKeyframe {
    /// Each bone resolves on its own. A bone present on one side only holds
    /// that side's value.
    fn interpolate(&self, other: &Self, t: f32) -> Self {
        let mut bones = SparsePose::new();
        for (name, before) in &self.bones {
            let pose = match other.bones.get(name) {
                Some(after) => BonePose {
                    rotation: Interpolation::slerp(before.rotation, after.rotation, t),
                    position: match (before.position, after.position) {
                        (Some(a), Some(b)) => Some(Interpolation::lerp_vec3(a, b, t)),
                        (a, b) => a.or(b),
                    },
                },
                None => *before,
            };
            bones.insert(name.clone(), pose);
        }
        for (name, after) in &other.bones {
            bones.entry(name.clone()).or_insert(*after);
        }
        Self { bones }
    }
}
