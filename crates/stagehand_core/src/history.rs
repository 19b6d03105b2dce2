// SPDX-License-Identifier: MIT OR Apache-2.0
//! Undo/redo history of executed commands.
//!
//! Strict LIFO: any newly recorded command clears the redo stack. The undo
//! stack is bounded; the oldest entries fall off first.

use crate::commands::{Command, CommandError, CreateEntityAsyncCommand, EditContext};
use crate::entity::EntityId;
use crate::observer::Observer;
use std::collections::VecDeque;

/// Default maximum undo history depth
pub const MAX_HISTORY: usize = 100;

/// History statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HistoryStats {
    /// Commands in the undo stack
    pub undo_count: usize,
    /// Commands in the redo stack
    pub redo_count: usize,
    /// Maximum history depth
    pub max_depth: usize,
}

/// History change notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryEvent {
    /// A stack changed
    Changed(HistoryStats),
}

/// Undo/redo history manager
#[derive(Debug)]
pub struct HistoryManager {
    undo_stack: VecDeque<Box<dyn Command>>,
    redo_stack: VecDeque<Box<dyn Command>>,
    max_depth: usize,
    /// Change notifications
    pub events: Observer<HistoryEvent>,
}

impl HistoryManager {
    /// Create a new history manager
    pub fn new() -> Self {
        Self::with_max_depth(MAX_HISTORY)
    }

    /// Create with custom maximum depth
    pub fn with_max_depth(max_depth: usize) -> Self {
        Self {
            undo_stack: VecDeque::new(),
            redo_stack: VecDeque::new(),
            max_depth: max_depth.max(1),
            events: Observer::new(),
        }
    }

    /// Run a command and record it.
    ///
    /// With `push_only` the forward action is assumed to have happened
    /// already. A command that fails to execute is not recorded.
    pub fn execute_command(
        &mut self,
        mut command: Box<dyn Command>,
        ctx: &mut EditContext<'_>,
        push_only: bool,
    ) -> Result<(), CommandError> {
        if !push_only {
            command.execute(ctx)?;
        }
        self.record(command);
        Ok(())
    }

    /// Record a command whose effect is already applied
    pub fn push_executed(&mut self, command: Box<dyn Command>) {
        self.record(command);
    }

    /// Resolve an asynchronous creation and record it once it succeeds.
    ///
    /// A failed creation leaves the history untouched.
    pub async fn execute_async(
        &mut self,
        mut command: CreateEntityAsyncCommand,
        ctx: &mut EditContext<'_>,
    ) -> Result<EntityId, CommandError> {
        let id = command.resolve(ctx).await?;
        self.record(Box::new(command));
        Ok(id)
    }

    fn record(&mut self, command: Box<dyn Command>) {
        tracing::debug!("Recorded: {}", command.description());
        self.redo_stack.clear();
        self.undo_stack.push_back(command);

        while self.undo_stack.len() > self.max_depth {
            self.undo_stack.pop_front();
        }
        self.notify();
    }

    /// Undo the last command. Returns false when there is nothing to undo.
    ///
    /// If the inverse action fails the command stays on the undo stack.
    pub fn undo(&mut self, ctx: &mut EditContext<'_>) -> Result<bool, CommandError> {
        let Some(mut command) = self.undo_stack.pop_back() else {
            return Ok(false);
        };
        if let Err(e) = command.undo(ctx) {
            tracing::error!("Undo of {} failed: {}", command.description(), e);
            self.undo_stack.push_back(command);
            return Err(e);
        }
        tracing::debug!("Undo: {}", command.description());
        self.redo_stack.push_back(command);
        self.notify();
        Ok(true)
    }

    /// Redo the last undone command. Returns false when there is nothing to redo.
    pub fn redo(&mut self, ctx: &mut EditContext<'_>) -> Result<bool, CommandError> {
        let Some(mut command) = self.redo_stack.pop_back() else {
            return Ok(false);
        };
        if let Err(e) = command.execute(ctx) {
            tracing::error!("Redo of {} failed: {}", command.description(), e);
            self.redo_stack.push_back(command);
            return Err(e);
        }
        tracing::debug!("Redo: {}", command.description());
        self.undo_stack.push_back(command);
        self.notify();
        Ok(true)
    }

    /// Check if undo is available
    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    /// Check if redo is available
    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    /// Get undo stack depth
    pub fn undo_depth(&self) -> usize {
        self.undo_stack.len()
    }

    /// Get redo stack depth
    pub fn redo_depth(&self) -> usize {
        self.redo_stack.len()
    }

    /// Maximum undo depth
    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Empty both stacks
    pub fn clear_history(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
        self.notify();
    }

    /// Get history statistics
    pub fn stats(&self) -> HistoryStats {
        HistoryStats {
            undo_count: self.undo_stack.len(),
            redo_count: self.redo_stack.len(),
            max_depth: self.max_depth,
        }
    }

    /// Get description of next undo operation
    pub fn undo_description(&self) -> Option<&str> {
        self.undo_stack.back().map(|c| c.description())
    }

    /// Get description of next redo operation
    pub fn redo_description(&self) -> Option<&str> {
        self.redo_stack.back().map(|c| c.description())
    }

    fn notify(&mut self) {
        let stats = self.stats();
        self.events.notify(&HistoryEvent::Changed(stats));
    }
}

impl Default for HistoryManager {
    fn default() -> Self {
        Self::new()
    }
}
