// SPDX-License-Identifier: MIT OR Apache-2.0
//! Editor commands for undo/redo support.
//!
//! A command is a reversible unit of scene change. Commands receive the
//! managers they touch through an [`EditContext`] on every call rather than
//! holding references to them.

use crate::entity::{EntityBlueprint, EntityId, ParentRef};
use crate::graph::{GraphError, NodeId};
use crate::math::Transform;
use crate::scene::{Scene, SceneError};
use crate::selectable::{Selectable, SelectableRef};
use crate::selection::SelectionManager;
use crate::transform_controls::TransformControlManager;
use futures::future::LocalBoxFuture;
use std::fmt;

/// Error type for command execution
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    /// Entity not found
    #[error("Entity not found: {0}")]
    EntityNotFound(EntityId),

    /// Scene rejected the change
    #[error("Scene error: {0}")]
    Scene(#[from] SceneError),

    /// Scene graph rejected the change
    #[error("Scene graph error: {0}")]
    Graph(#[from] GraphError),

    /// Asynchronous creation failed
    #[error("Entity creation failed: {0}")]
    Creation(String),

    /// Invalid operation
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),
}

/// Managers a command may touch
pub struct EditContext<'a> {
    /// Scene contents
    pub scene: &'a mut Scene,
    /// Current selection
    pub selection: &'a mut SelectionManager,
    /// Gizmo binding
    pub gizmo: &'a mut TransformControlManager,
}

impl EditContext<'_> {
    /// Clear the selection if it refers to `id` or one of its bone controls
    pub fn release_selection(&mut self, id: EntityId) {
        if self.selection.involves(id) {
            self.selection.deselect_all(self.scene, self.gizmo);
        }
    }
}

/// Trait for editor commands that can be undone/redone
pub trait Command {
    /// Get a description of this command
    fn description(&self) -> &str;

    /// Run the forward action. Also used for redo.
    fn execute(&mut self, ctx: &mut EditContext<'_>) -> Result<(), CommandError>;

    /// Run the inverse action
    fn undo(&mut self, ctx: &mut EditContext<'_>) -> Result<(), CommandError>;
}

impl fmt::Debug for dyn Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Command").field(&self.description()).finish()
    }
}

/// Command to create an entity.
///
/// Undo retracts the entity instead of destroying it so redo can bring the
/// same instance back.
#[derive(Debug, Clone)]
pub struct CreateEntityCommand {
    blueprint: EntityBlueprint,
    entity: Option<EntityId>,
    description: String,
}

impl CreateEntityCommand {
    /// Create a new creation command
    pub fn new(blueprint: EntityBlueprint) -> Self {
        let description = format!("Create {}", blueprint.name);
        Self {
            blueprint,
            entity: None,
            description,
        }
    }

    /// The created entity, once executed
    pub fn entity(&self) -> Option<EntityId> {
        self.entity
    }
}

impl Command for CreateEntityCommand {
    fn description(&self) -> &str {
        &self.description
    }

    fn execute(&mut self, ctx: &mut EditContext<'_>) -> Result<(), CommandError> {
        if let Some(id) = self.entity.filter(|id| ctx.scene.objects.contains(*id)) {
            ctx.scene.objects.restore_entity(id, &mut ctx.scene.graph);
            return Ok(());
        }
        let id = ctx.scene.spawn(self.blueprint.clone())?;
        self.entity = Some(id);
        Ok(())
    }

    fn undo(&mut self, ctx: &mut EditContext<'_>) -> Result<(), CommandError> {
        let Some(id) = self.entity else {
            return Ok(());
        };
        ctx.release_selection(id);
        ctx.scene.objects.retract_entity(id, &mut ctx.scene.graph);
        Ok(())
    }
}

/// Future resolving to the blueprint of an entity whose assets load asynchronously
pub type BlueprintFuture = LocalBoxFuture<'static, Result<EntityBlueprint, String>>;

/// Command to create an entity from an asynchronous factory.
///
/// Until [`Self::resolve`] completes the command has no entity, and undo is
/// a no-op.
pub struct CreateEntityAsyncCommand {
    pending: Option<BlueprintFuture>,
    entity: Option<EntityId>,
    description: String,
}

impl CreateEntityAsyncCommand {
    /// Create a command around a pending blueprint
    pub fn new(description: impl Into<String>, loader: BlueprintFuture) -> Self {
        Self {
            pending: Some(loader),
            entity: None,
            description: description.into(),
        }
    }

    /// The created entity, once resolved
    pub fn entity(&self) -> Option<EntityId> {
        self.entity
    }

    /// Await the factory and spawn the entity. A failed load leaves the
    /// command without an entity.
    pub async fn resolve(&mut self, ctx: &mut EditContext<'_>) -> Result<EntityId, CommandError> {
        if let Some(id) = self.entity {
            return Ok(id);
        }
        let loader = self
            .pending
            .take()
            .ok_or_else(|| CommandError::Creation("factory already consumed".to_string()))?;
        let blueprint = match loader.await {
            Ok(blueprint) => blueprint,
            Err(e) => {
                tracing::error!("{} failed: {}", self.description, e);
                return Err(CommandError::Creation(e));
            }
        };
        let id = ctx.scene.spawn(blueprint)?;
        self.entity = Some(id);
        Ok(id)
    }
}

impl fmt::Debug for CreateEntityAsyncCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CreateEntityAsyncCommand")
            .field("pending", &self.pending.is_some())
            .field("entity", &self.entity)
            .field("description", &self.description)
            .finish()
    }
}

impl Command for CreateEntityAsyncCommand {
    fn description(&self) -> &str {
        &self.description
    }

    fn execute(&mut self, ctx: &mut EditContext<'_>) -> Result<(), CommandError> {
        if let Some(id) = self.entity {
            ctx.scene.objects.restore_entity(id, &mut ctx.scene.graph);
        }
        Ok(())
    }

    fn undo(&mut self, ctx: &mut EditContext<'_>) -> Result<(), CommandError> {
        let Some(id) = self.entity else {
            return Ok(());
        };
        ctx.release_selection(id);
        ctx.scene.objects.retract_entity(id, &mut ctx.scene.graph);
        Ok(())
    }
}

/// Command to soft-delete an entity
#[derive(Debug, Clone)]
pub struct DeleteEntityCommand {
    entity: EntityId,
    description: String,
}

impl DeleteEntityCommand {
    /// Create a new delete command
    pub fn new(entity: EntityId) -> Self {
        Self {
            entity,
            description: "Delete Entity".to_string(),
        }
    }
}

impl Command for DeleteEntityCommand {
    fn description(&self) -> &str {
        &self.description
    }

    fn execute(&mut self, ctx: &mut EditContext<'_>) -> Result<(), CommandError> {
        let Some(entity) = ctx.scene.objects.get(self.entity) else {
            return Err(CommandError::EntityNotFound(self.entity));
        };
        if !entity.is_active() {
            return Err(CommandError::InvalidOperation(format!(
                "Entity {} is not active",
                self.entity
            )));
        }
        ctx.release_selection(self.entity);
        ctx.scene.objects.delete_entity(self.entity, &mut ctx.scene.graph);
        Ok(())
    }

    fn undo(&mut self, ctx: &mut EditContext<'_>) -> Result<(), CommandError> {
        if !ctx.scene.objects.contains(self.entity) {
            return Err(CommandError::EntityNotFound(self.entity));
        }
        ctx.scene.objects.undo_delete_entity(self.entity, &mut ctx.scene.graph);
        Ok(())
    }
}

/// Command recording a gizmo drag
#[derive(Debug, Clone)]
pub struct TransformCommand {
    target: SelectableRef,
    node: NodeId,
    before: Transform,
    after: Transform,
    description: String,
}

impl TransformCommand {
    /// Snapshot the starting transform of `node`
    pub fn new(target: SelectableRef, node: NodeId, before: Transform) -> Self {
        Self {
            target,
            node,
            before,
            after: before,
            description: "Transform".to_string(),
        }
    }

    /// Record the final transform
    pub fn set_after(&mut self, after: Transform) {
        self.after = after;
    }

    /// Selectable that was dragged
    pub fn target(&self) -> &SelectableRef {
        &self.target
    }

    /// Node that was dragged
    pub fn node(&self) -> NodeId {
        self.node
    }

    /// Starting transform
    pub fn before(&self) -> Transform {
        self.before
    }

    /// Final transform
    pub fn after(&self) -> Transform {
        self.after
    }

    fn apply(&self, scene: &mut Scene, transform: Transform) -> Result<(), CommandError> {
        scene.graph.set_transform(self.node, transform)?;
        scene.graph.update_world_matrix(self.node);
        // Bone controls forward the change into their bone
        scene.with_selectable(&self.target, |selectable, graph| selectable.on_transform_update(graph));
        Ok(())
    }
}

impl Command for TransformCommand {
    fn description(&self) -> &str {
        &self.description
    }

    fn execute(&mut self, ctx: &mut EditContext<'_>) -> Result<(), CommandError> {
        self.apply(ctx.scene, self.after)
    }

    fn undo(&mut self, ctx: &mut EditContext<'_>) -> Result<(), CommandError> {
        self.apply(ctx.scene, self.before)
    }
}

/// Command to rename an entity
#[derive(Debug, Clone)]
pub struct RenameEntityCommand {
    entity: EntityId,
    name: String,
    previous: Option<String>,
}

impl RenameEntityCommand {
    /// Create a new rename command
    pub fn new(entity: EntityId, name: impl Into<String>) -> Self {
        Self {
            entity,
            name: name.into(),
            previous: None,
        }
    }

    fn set_name(ctx: &mut EditContext<'_>, id: EntityId, name: String) -> Result<String, CommandError> {
        let entity = ctx.scene.objects.get_mut(id).ok_or(CommandError::EntityNotFound(id))?;
        let previous = std::mem::replace(&mut entity.name, name.clone());
        if let Some(node) = ctx.scene.graph.node_mut(entity.node()) {
            node.name = name;
        }
        ctx.scene.objects.notify_hierarchy_changed(&ctx.scene.graph);
        Ok(previous)
    }
}

impl Command for RenameEntityCommand {
    fn description(&self) -> &str {
        "Rename Entity"
    }

    fn execute(&mut self, ctx: &mut EditContext<'_>) -> Result<(), CommandError> {
        self.previous = Some(Self::set_name(ctx, self.entity, self.name.clone())?);
        Ok(())
    }

    fn undo(&mut self, ctx: &mut EditContext<'_>) -> Result<(), CommandError> {
        if let Some(previous) = self.previous.clone() {
            Self::set_name(ctx, self.entity, previous)?;
        }
        Ok(())
    }
}

/// Command to move an entity under a different parent
#[derive(Debug, Clone)]
pub struct ReparentEntityCommand {
    entity: EntityId,
    parent: ParentRef,
    previous: Option<ParentRef>,
}

impl ReparentEntityCommand {
    /// Create a new reparent command
    pub fn new(entity: EntityId, parent: ParentRef) -> Self {
        Self {
            entity,
            parent,
            previous: None,
        }
    }
}

impl Command for ReparentEntityCommand {
    fn description(&self) -> &str {
        "Reparent Entity"
    }

    fn execute(&mut self, ctx: &mut EditContext<'_>) -> Result<(), CommandError> {
        self.previous = Some(ctx.scene.reparent(self.entity, self.parent.clone())?);
        Ok(())
    }

    fn undo(&mut self, ctx: &mut EditContext<'_>) -> Result<(), CommandError> {
        if let Some(previous) = self.previous.clone() {
            ctx.scene.reparent(self.entity, previous)?;
        }
        Ok(())
    }
}

/// Command to show or hide an entity
#[derive(Debug, Clone)]
pub struct SetVisibilityCommand {
    entity: EntityId,
    visible: bool,
    previous: Option<bool>,
}

impl SetVisibilityCommand {
    /// Create a new visibility command
    pub fn new(entity: EntityId, visible: bool) -> Self {
        Self {
            entity,
            visible,
            previous: None,
        }
    }

    fn node(&self, ctx: &EditContext<'_>) -> Result<NodeId, CommandError> {
        ctx.scene
            .objects
            .get(self.entity)
            .map(|e| e.node())
            .ok_or(CommandError::EntityNotFound(self.entity))
    }
}

impl Command for SetVisibilityCommand {
    fn description(&self) -> &str {
        if self.visible {
            "Show Entity"
        } else {
            "Hide Entity"
        }
    }

    fn execute(&mut self, ctx: &mut EditContext<'_>) -> Result<(), CommandError> {
        let node = self.node(ctx)?;
        self.previous = Some(ctx.scene.graph.is_visible(node));
        ctx.scene.graph.set_visible(node, self.visible)?;
        Ok(())
    }

    fn undo(&mut self, ctx: &mut EditContext<'_>) -> Result<(), CommandError> {
        let node = self.node(ctx)?;
        if let Some(previous) = self.previous {
            ctx.scene.graph.set_visible(node, previous)?;
        }
        Ok(())
    }
}
