// SPDX-License-Identifier: MIT OR Apache-2.0
//! Editor façade bundling the scene with its managers.
//!
//! The managers are plain fields; methods here only split borrows so
//! callers do not have to build an [`EditContext`] by hand.

use crate::commands::{Command, CommandError, CreateEntityAsyncCommand, EditContext};
use crate::entity::EntityId;
use crate::graph::NodeId;
use crate::history::HistoryManager;
use crate::math::Transform;
use crate::scene::Scene;
use crate::selectable::SelectableRef;
use crate::selection::SelectionManager;
use crate::transform_controls::TransformControlManager;

/// Scene plus selection, gizmo and history
#[derive(Debug, Default)]
pub struct Editor {
    /// Scene contents
    pub scene: Scene,
    /// Selection state
    pub selection: SelectionManager,
    /// Gizmo binding
    pub gizmo: TransformControlManager,
    /// Undo/redo history
    pub history: HistoryManager,
}

impl Editor {
    /// Create an empty editor
    pub fn new() -> Self {
        Self::default()
    }

    /// Create with a custom undo depth
    pub fn with_history_depth(depth: usize) -> Self {
        Self {
            history: HistoryManager::with_max_depth(depth),
            ..Self::default()
        }
    }

    fn split(&mut self) -> (EditContext<'_>, &mut HistoryManager) {
        let Self {
            scene,
            selection,
            gizmo,
            history,
        } = self;
        (EditContext { scene, selection, gizmo }, history)
    }

    /// Run a command and record it
    pub fn execute(&mut self, command: impl Command + 'static) -> Result<(), CommandError> {
        let (mut ctx, history) = self.split();
        history.execute_command(Box::new(command), &mut ctx, false)
    }

    /// Record a command whose effect is already applied
    pub fn push_executed(&mut self, command: impl Command + 'static) {
        self.history.push_executed(Box::new(command));
    }

    /// Resolve an asynchronous creation and record it on success
    pub async fn execute_async(&mut self, command: CreateEntityAsyncCommand) -> Result<EntityId, CommandError> {
        let (mut ctx, history) = self.split();
        history.execute_async(command, &mut ctx).await
    }

    /// Undo the last command
    pub fn undo(&mut self) -> Result<bool, CommandError> {
        let (mut ctx, history) = self.split();
        history.undo(&mut ctx)
    }

    /// Redo the last undone command
    pub fn redo(&mut self) -> Result<bool, CommandError> {
        let (mut ctx, history) = self.split();
        history.redo(&mut ctx)
    }

    /// Select a candidate
    pub fn select(&mut self, candidate: SelectableRef) -> bool {
        self.selection.select(candidate, &mut self.scene, &mut self.gizmo)
    }

    /// Select whatever owns a picked node
    pub fn select_node(&mut self, node: NodeId) -> bool {
        self.selection.select_node(node, &mut self.scene, &mut self.gizmo)
    }

    /// Clear the selection
    pub fn deselect_all(&mut self) {
        self.selection.deselect_all(&mut self.scene, &mut self.gizmo);
    }

    /// Start a gizmo drag on the current selection
    pub fn begin_drag(&mut self) -> bool {
        self.gizmo.begin_drag(&mut self.scene)
    }

    /// Apply one gizmo-driven change
    pub fn update_drag(&mut self, proposed: Transform) -> bool {
        self.gizmo.update_drag(&mut self.scene, proposed)
    }

    /// Finish the drag and record it
    pub fn end_drag(&mut self) -> bool {
        self.gizmo.end_drag(&mut self.scene, &mut self.history)
    }

    /// Drop every entity, the selection and the history
    pub fn reset(&mut self) {
        self.deselect_all();
        self.scene.clear();
        self.history.clear_history();
    }
}
