// SPDX-License-Identifier: MIT OR Apache-2.0
//! Scene-authoring core for Stagehand.
//!
//! This crate provides the editing model of a 3D scene:
//! - Entities (shapes, lights, characters, generated and imported assets)
//! - Character skeletons with per-bone selectable controls
//! - Selection and transform gizmo binding
//! - Undo/redo history of reversible commands
//!
//! ## Architecture
//!
//! The core is built on:
//! - An arena scene graph addressed by [`NodeId`]
//! - An [`ObjectManager`] registry with a node-owner side table for picking
//! - Managers that receive the state they touch as arguments
//! - Typed observers for change notifications

pub mod camera;
pub mod character;
pub mod commands;
pub mod editor;
pub mod entity;
pub mod graph;
pub mod history;
pub mod math;
pub mod object_manager;
pub mod observer;
pub mod scene;
pub mod selectable;
pub mod selection;
pub mod transform_controls;

pub use camera::{CameraControls, PerspectiveCamera};
pub use character::{BoneControl, BonePose, BoneSpec, CharacterData, CharacterSpec, Skeleton, SparsePose};
pub use commands::{
    BlueprintFuture, Command, CommandError, CreateEntityAsyncCommand, CreateEntityCommand, DeleteEntityCommand,
    EditContext, RenameEntityCommand, ReparentEntityCommand, SetVisibilityCommand, TransformCommand,
};
pub use editor::Editor;
pub use entity::{
    Entity, EntityBlueprint, EntityId, EntityKind, EntityProperties, EntityRecord, EntityType, GenerativeData,
    Lifecycle, LightData, LightKind, ModelData, ParentBoneRecord, ParentRef, ShapeData, ShapeKind,
};
pub use graph::{GraphError, Node, NodeId, NodeKind, SceneGraph};
pub use history::{HistoryEvent, HistoryManager, HistoryStats};
pub use math::Transform;
pub use object_manager::{ObjectEvent, ObjectManager, RootEntities};
pub use observer::{Observer, SubscriptionId};
pub use scene::{Scene, SceneError};
pub use selectable::{Selectable, SelectableConfig, SelectableRef, SelectionState, TransformMode, TransformSpace};
pub use selection::{SelectionEvent, SelectionManager, SelectionPhase};
pub use transform_controls::{GizmoMode, TransformControlManager, TransformEvent};
