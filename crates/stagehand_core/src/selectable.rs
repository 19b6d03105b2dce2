// SPDX-License-Identifier: MIT OR Apache-2.0
//! The selectable capability shared by entities and bone controls.

use crate::entity::EntityId;
use crate::graph::{NodeId, SceneGraph};
use serde::{Deserialize, Serialize};

/// Transform mode offered by the gizmo
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransformMode {
    /// Translate
    Position,
    /// Rotate
    Rotation,
    /// Scale
    Scale,
    /// Bounding-box resize; drives the scale gizmo
    BoundingBox,
}

impl TransformMode {
    /// All modes in UI order
    pub const ALL: [TransformMode; 4] = [
        TransformMode::Position,
        TransformMode::Rotation,
        TransformMode::Scale,
        TransformMode::BoundingBox,
    ];

    /// Get the name of this mode
    pub fn name(&self) -> &'static str {
        match self {
            Self::Position => "Position",
            Self::Rotation => "Rotation",
            Self::Scale => "Scale",
            Self::BoundingBox => "Bounding Box",
        }
    }
}

/// Coordinate space of the gizmo
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TransformSpace {
    /// World axes
    #[default]
    World,
    /// Object-local axes
    Local,
}

impl TransformSpace {
    /// The other space
    pub fn toggled(self) -> Self {
        match self {
            Self::World => Self::Local,
            Self::Local => Self::World,
        }
    }
}

/// Cursor shown while hovering a selectable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CursorHint {
    /// Platform default
    #[default]
    Default,
    /// Clickable
    Pointer,
    /// Draggable
    Grab,
}

/// Transform configuration of a selectable
#[derive(Debug, Clone, PartialEq)]
pub struct SelectableConfig {
    /// Modes the gizmo may use; never empty
    pub allowed_modes: Vec<TransformMode>,
    /// Mode picked on attach, if any
    pub default_mode: Option<TransformMode>,
    /// Space picked on attach, if any
    pub default_space: Option<TransformSpace>,
    /// Gizmo size multiplier
    pub control_size: f32,
    /// Hover cursor
    pub cursor: CursorHint,
}

impl SelectableConfig {
    /// Position, rotation and scale allowed
    pub fn standard() -> Self {
        Self {
            allowed_modes: vec![TransformMode::Position, TransformMode::Rotation, TransformMode::Scale],
            default_mode: None,
            default_space: None,
            control_size: 1.0,
            cursor: CursorHint::Pointer,
        }
    }

    /// Only rotation allowed, in local space
    pub fn rotation_only() -> Self {
        Self {
            allowed_modes: vec![TransformMode::Rotation],
            default_mode: Some(TransformMode::Rotation),
            default_space: Some(TransformSpace::Local),
            control_size: 0.5,
            cursor: CursorHint::Grab,
        }
    }

    /// Builder: replace allowed modes. An empty list falls back to position.
    pub fn with_modes(mut self, modes: impl Into<Vec<TransformMode>>) -> Self {
        self.allowed_modes = modes.into();
        if self.allowed_modes.is_empty() {
            self.allowed_modes.push(TransformMode::Position);
        }
        self
    }

    /// Builder: default mode
    pub fn with_default_mode(mut self, mode: TransformMode) -> Self {
        self.default_mode = Some(mode);
        self
    }

    /// Builder: default space
    pub fn with_default_space(mut self, space: TransformSpace) -> Self {
        self.default_space = Some(space);
        self
    }

    /// Builder: gizmo size
    pub fn with_control_size(mut self, size: f32) -> Self {
        self.control_size = size;
        self
    }

    /// Whether a mode is allowed
    pub fn allows(&self, mode: TransformMode) -> bool {
        self.allowed_modes.contains(&mode)
    }

    /// Return `mode` if allowed, otherwise the first allowed mode
    pub fn coerce(&self, mode: TransformMode) -> TransformMode {
        if self.allows(mode) {
            mode
        } else {
            self.allowed_modes.first().copied().unwrap_or(TransformMode::Position)
        }
    }
}

impl Default for SelectableConfig {
    fn default() -> Self {
        Self::standard()
    }
}

/// Typed handle to anything that can be selected
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SelectableRef {
    /// A scene entity
    Entity(EntityId),
    /// A bone control owned by a character entity
    BoneControl {
        /// Owning character
        character: EntityId,
        /// Bone name
        bone: String,
    },
}

impl SelectableRef {
    /// Create a bone control reference
    pub fn bone(character: EntityId, bone: impl Into<String>) -> Self {
        Self::BoneControl {
            character,
            bone: bone.into(),
        }
    }

    /// Nearest enclosing entity
    pub fn owning_entity(&self) -> EntityId {
        match self {
            Self::Entity(id) => *id,
            Self::BoneControl { character, .. } => *character,
        }
    }

    /// The entity ID if this is an entity
    pub fn as_entity(&self) -> Option<EntityId> {
        match self {
            Self::Entity(id) => Some(*id),
            Self::BoneControl { .. } => None,
        }
    }

    /// Whether this is a bone control of `character`
    pub fn is_sub_component_of(&self, character: EntityId) -> bool {
        matches!(self, Self::BoneControl { character: owner, .. } if *owner == character)
    }
}

/// Selection flag carried by every selectable
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SelectionState {
    /// Whether this object is the current selection or current entity
    pub selected: bool,
}

/// Something the user can pick and manipulate with the gizmo.
///
/// The hooks default to no-ops. They receive the scene graph so proxies can
/// push their state into the nodes they drive.
pub trait Selectable {
    /// Handle identifying this selectable
    fn selectable_ref(&self) -> SelectableRef;

    /// Transform configuration
    fn config(&self) -> &SelectableConfig;

    /// Node the gizmo attaches to
    fn transform_target(&self) -> NodeId;

    /// Selection flag
    fn selection_state(&self) -> &SelectionState;

    /// Mutable selection flag
    fn selection_state_mut(&mut self) -> &mut SelectionState;

    /// Whether currently selected
    fn is_selected(&self) -> bool {
        self.selection_state().selected
    }

    /// Called after this object becomes selected
    fn on_select(&mut self, _graph: &mut SceneGraph) {}

    /// Called after this object stops being selected
    fn on_deselect(&mut self, _graph: &mut SceneGraph) {}

    /// Called when a gizmo drag begins
    fn on_transform_start(&mut self, _graph: &mut SceneGraph) {}

    /// Called for every gizmo-driven change
    fn on_transform_update(&mut self, _graph: &mut SceneGraph) {}

    /// Called when a gizmo drag ends
    fn on_transform_end(&mut self, _graph: &mut SceneGraph) {}
}
