// SPDX-License-Identifier: MIT OR Apache-2.0
//! Transform data and small vector/quaternion helpers.
//!
//! Values are stored as plain arrays so they serialize as numeric arrays;
//! matrix work goes through `glam`.

use glam::{Mat4, Quat, Vec3};
use serde::{Deserialize, Serialize};

/// Identity quaternion (x, y, z, w)
pub const QUAT_IDENTITY: [f32; 4] = [0.0, 0.0, 0.0, 1.0];

/// Local transform: position, orientation and scale
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    /// Position (x, y, z)
    pub position: [f32; 3],
    /// Rotation quaternion (x, y, z, w)
    pub rotation: [f32; 4],
    /// Scale (x, y, z)
    pub scale: [f32; 3],
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: [0.0, 0.0, 0.0],
            rotation: QUAT_IDENTITY,
            scale: [1.0, 1.0, 1.0],
        }
    }
}

impl Transform {
    /// Transform at a position with identity rotation and unit scale
    pub fn from_position(position: [f32; 3]) -> Self {
        Self {
            position,
            ..Default::default()
        }
    }

    /// Builder: replace rotation
    pub fn with_rotation(mut self, rotation: [f32; 4]) -> Self {
        self.rotation = rotation;
        self
    }

    /// Builder: replace scale
    pub fn with_scale(mut self, scale: [f32; 3]) -> Self {
        self.scale = scale;
        self
    }

    /// Compose into a local matrix
    pub fn to_matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(
            Vec3::from_array(self.scale),
            Quat::from_array(self.rotation).normalize(),
            Vec3::from_array(self.position),
        )
    }
}

/// Normalize a quaternion, falling back to identity for degenerate input
pub fn quat_normalize(q: [f32; 4]) -> [f32; 4] {
    let len = (q[0] * q[0] + q[1] * q[1] + q[2] * q[2] + q[3] * q[3]).sqrt();
    if len <= f32::EPSILON {
        return QUAT_IDENTITY;
    }
    [q[0] / len, q[1] / len, q[2] / len, q[3] / len]
}

/// Four-component dot product
pub fn quat_dot(a: [f32; 4], b: [f32; 4]) -> f32 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2] + a[3] * b[3]
}

/// Whether two orientations are the same rotation within `epsilon`.
///
/// `q` and `-q` describe the same rotation, so the sign of the dot product is ignored.
pub fn quat_approx_eq(a: [f32; 4], b: [f32; 4], epsilon: f32) -> bool {
    1.0 - quat_dot(quat_normalize(a), quat_normalize(b)).abs() <= epsilon
}

/// Quaternion from an axis and angle in radians
pub fn quat_from_axis_angle(axis: [f32; 3], angle: f32) -> [f32; 4] {
    Quat::from_axis_angle(Vec3::from_array(axis).normalize_or_zero(), angle).to_array()
}

/// Component-wise approximate equality for vectors
pub fn vec3_approx_eq(a: [f32; 3], b: [f32; 3], epsilon: f32) -> bool {
    a.iter().zip(b.iter()).all(|(x, y)| (x - y).abs() <= epsilon)
}
