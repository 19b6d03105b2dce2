// SPDX-License-Identifier: MIT OR Apache-2.0
//! Scene camera and its manual controls.

use glam::{Mat4, Quat, Vec3};

/// Perspective camera. The camera has no entity ID; tracks address it by type.
#[derive(Debug, Clone)]
pub struct PerspectiveCamera {
    /// Camera position
    pub position: [f32; 3],
    /// Camera orientation quaternion (x, y, z, w)
    pub rotation: [f32; 4],
    /// Vertical field of view in degrees
    pub fov: f32,
    /// Viewport width / height
    pub aspect: f32,
    /// Near clip plane
    pub near: f32,
    /// Far clip plane
    pub far: f32,
    projection: Mat4,
}

impl Default for PerspectiveCamera {
    fn default() -> Self {
        let mut camera = Self {
            position: [0.0, 1.6, 5.0],
            rotation: [0.0, 0.0, 0.0, 1.0],
            fov: 50.0,
            aspect: 16.0 / 9.0,
            near: 0.1,
            far: 1000.0,
            projection: Mat4::IDENTITY,
        };
        camera.update_projection_matrix();
        camera
    }
}

impl PerspectiveCamera {
    /// Create a camera with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Recompute the projection after changing fov, aspect or clip planes
    pub fn update_projection_matrix(&mut self) {
        self.projection = Mat4::perspective_rh(self.fov.to_radians(), self.aspect, self.near, self.far);
    }

    /// Projection matrix as of the last [`Self::update_projection_matrix`]
    pub fn projection_matrix(&self) -> Mat4 {
        self.projection
    }

    /// Camera-to-world matrix
    pub fn world_matrix(&self) -> Mat4 {
        Mat4::from_rotation_translation(
            Quat::from_array(self.rotation).normalize(),
            Vec3::from_array(self.position),
        )
    }

    /// Set viewport aspect ratio and refresh the projection
    pub fn set_aspect(&mut self, aspect: f32) {
        self.aspect = aspect;
        self.update_projection_matrix();
    }
}

/// Orbit/pan controls that move the camera from user input
#[derive(Debug, Clone)]
pub struct CameraControls {
    /// Whether user input moves the camera
    pub enabled: bool,
    /// Orbit target
    pub target: [f32; 3],
}

impl Default for CameraControls {
    fn default() -> Self {
        Self {
            enabled: true,
            target: [0.0, 1.0, 0.0],
        }
    }
}
