// SPDX-License-Identifier: MIT OR Apache-2.0
//! Track targets.

use serde::{Deserialize, Serialize};
use stagehand_core::{EntityId, EntityType, Scene};
use std::fmt;

/// What a track drives. The camera has no ID and is addressed by kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TrackTarget {
    /// The scene camera
    Camera,
    /// An entity's transform
    Entity(EntityId),
    /// A character's skeleton
    Character(EntityId),
}

impl TrackTarget {
    /// Entity ID, if the target has one
    pub fn entity_id(&self) -> Option<EntityId> {
        match self {
            Self::Camera => None,
            Self::Entity(id) | Self::Character(id) => Some(*id),
        }
    }

    /// Whether the target currently exists in `scene` with the right kind
    pub fn resolves(&self, scene: &Scene) -> bool {
        match self {
            Self::Camera => true,
            Self::Entity(id) => scene.objects.contains(*id),
            Self::Character(id) => scene
                .objects
                .get(*id)
                .is_some_and(|e| e.entity_type() == EntityType::Character),
        }
    }
}

impl fmt::Display for TrackTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Camera => write!(f, "camera"),
            Self::Entity(id) => write!(f, "entity {id}"),
            Self::Character(id) => write!(f, "character {id}"),
        }
    }
}
