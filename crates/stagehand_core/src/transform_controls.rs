// SPDX-License-Identifier: MIT OR Apache-2.0
//! Transform gizmo binding.
//!
//! The manager owns the single gizmo, binds it to the current selectable and
//! turns a drag into one [`TransformCommand`] pushed to history when the drag
//! ends.

use crate::commands::TransformCommand;
use crate::graph::NodeId;
use crate::history::HistoryManager;
use crate::math::Transform;
use crate::observer::Observer;
use crate::scene::Scene;
use crate::selectable::{Selectable, SelectableRef, TransformMode, TransformSpace};

/// Gizmo geometry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GizmoMode {
    /// Translate (move) handles
    #[default]
    Translate,
    /// Rotate rings
    Rotate,
    /// Scale handles
    Scale,
}

impl GizmoMode {
    /// Get the name of this mode
    pub fn name(&self) -> &'static str {
        match self {
            Self::Translate => "Translate",
            Self::Rotate => "Rotate",
            Self::Scale => "Scale",
        }
    }
}

impl From<TransformMode> for GizmoMode {
    fn from(mode: TransformMode) -> Self {
        match mode {
            TransformMode::Position => Self::Translate,
            TransformMode::Rotation => Self::Rotate,
            // Bounding box reuses the scale geometry
            TransformMode::Scale | TransformMode::BoundingBox => Self::Scale,
        }
    }
}

/// Gizmo notifications
#[derive(Debug, Clone, PartialEq)]
pub enum TransformEvent {
    /// Gizmo attached to a selectable, or detached
    Attached(Option<SelectableRef>),
    /// Active mode changed
    ModeChanged(TransformMode),
    /// Active space changed
    SpaceChanged(TransformSpace),
    /// A drag began
    TransformStarted(SelectableRef),
    /// A drag ended and was recorded
    TransformEnded(SelectableRef),
}

#[derive(Debug, Clone)]
struct GizmoTarget {
    selectable: SelectableRef,
    node: NodeId,
}

/// Transform control manager
#[derive(Debug)]
pub struct TransformControlManager {
    target: Option<GizmoTarget>,
    allowed_modes: Vec<TransformMode>,
    mode: TransformMode,
    space: TransformSpace,
    size: f32,
    last_mode: TransformMode,
    last_space: TransformSpace,
    drag: Option<TransformCommand>,
    /// Gizmo notifications
    pub events: Observer<TransformEvent>,
}

impl TransformControlManager {
    /// Create a detached gizmo
    pub fn new() -> Self {
        Self {
            target: None,
            allowed_modes: TransformMode::ALL.to_vec(),
            mode: TransformMode::Position,
            space: TransformSpace::World,
            size: 1.0,
            last_mode: TransformMode::Position,
            last_space: TransformSpace::World,
            drag: None,
            events: Observer::new(),
        }
    }

    /// Bind the gizmo to a selectable, or detach it with `None`.
    ///
    /// An in-flight drag is discarded without being recorded.
    pub fn attach_to_selectable(&mut self, selectable: Option<&SelectableRef>, scene: &Scene) {
        if let Some(drag) = self.drag.take() {
            tracing::debug!("Discarding unfinished drag of {:?}", drag.target());
        }
        self.target = None;
        self.allowed_modes = TransformMode::ALL.to_vec();
        self.size = 1.0;

        let Some(target) = selectable else {
            self.events.notify(&TransformEvent::Attached(None));
            return;
        };
        let Some(found) = scene.objects.selectable(target) else {
            tracing::warn!("Cannot attach gizmo to unknown {:?}", target);
            self.events.notify(&TransformEvent::Attached(None));
            return;
        };

        let config = found.config();
        self.allowed_modes = config.allowed_modes.clone();
        self.mode = config.coerce(config.default_mode.unwrap_or(self.last_mode));
        self.space = config.default_space.unwrap_or(self.last_space);
        self.size = config.control_size;
        self.target = Some(GizmoTarget {
            selectable: target.clone(),
            node: found.transform_target(),
        });
        self.events.notify(&TransformEvent::Attached(Some(target.clone())));
    }

    /// Whether the gizmo is bound to a target
    pub fn is_attached(&self) -> bool {
        self.target.is_some()
    }

    /// Selectable the gizmo is bound to
    pub fn target(&self) -> Option<&SelectableRef> {
        self.target.as_ref().map(|t| &t.selectable)
    }

    /// Node the gizmo manipulates
    pub fn target_node(&self) -> Option<NodeId> {
        self.target.as_ref().map(|t| t.node)
    }

    /// Modes the current target allows
    pub fn allowed_modes(&self) -> &[TransformMode] {
        &self.allowed_modes
    }

    /// Active mode
    pub fn mode(&self) -> TransformMode {
        self.mode
    }

    /// Gizmo geometry for the active mode
    pub fn gizmo_mode(&self) -> GizmoMode {
        self.mode.into()
    }

    /// Active space
    pub fn space(&self) -> TransformSpace {
        self.space
    }

    /// Gizmo size multiplier
    pub fn size(&self) -> f32 {
        self.size
    }

    /// Request a mode. Modes the target does not allow fall back to its
    /// first allowed mode. Returns the mode in effect.
    pub fn set_mode(&mut self, mode: TransformMode) -> TransformMode {
        let effective = if self.allowed_modes.contains(&mode) {
            mode
        } else {
            self.allowed_modes.first().copied().unwrap_or(TransformMode::Position)
        };
        self.last_mode = effective;
        if self.mode != effective {
            self.mode = effective;
            self.events.notify(&TransformEvent::ModeChanged(effective));
        }
        effective
    }

    /// Set the manipulation space
    pub fn set_space(&mut self, space: TransformSpace) {
        self.last_space = space;
        if self.space != space {
            self.space = space;
            self.events.notify(&TransformEvent::SpaceChanged(space));
        }
    }

    /// Switch between world and local space
    pub fn toggle_space(&mut self) -> TransformSpace {
        let space = self.space.toggled();
        self.set_space(space);
        space
    }

    /// Whether a drag is in progress
    pub fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }

    /// Snapshot the target and start a drag. Returns false when detached.
    pub fn begin_drag(&mut self, scene: &mut Scene) -> bool {
        let Some(target) = self.target.clone() else {
            return false;
        };
        let Some(before) = scene.graph.transform(target.node) else {
            tracing::warn!("Gizmo target node {:?} is gone", target.node);
            return false;
        };
        self.drag = Some(TransformCommand::new(target.selectable.clone(), target.node, before));
        self.events.notify(&TransformEvent::TransformStarted(target.selectable.clone()));
        scene.with_selectable(&target.selectable, |selectable, graph| selectable.on_transform_start(graph));
        true
    }

    /// Apply one gizmo-driven change. Only the component the active mode
    /// manipulates is taken from `proposed`.
    pub fn update_drag(&mut self, scene: &mut Scene, proposed: Transform) -> bool {
        let (Some(target), true) = (self.target.as_ref(), self.drag.is_some()) else {
            return false;
        };
        let Some(mut current) = scene.graph.transform(target.node) else {
            return false;
        };
        match self.mode {
            TransformMode::Position => current.position = proposed.position,
            TransformMode::Rotation => current.rotation = proposed.rotation,
            TransformMode::Scale | TransformMode::BoundingBox => current.scale = proposed.scale,
        }
        if scene.graph.set_transform(target.node, current).is_err() {
            return false;
        }
        scene.graph.update_world_matrix(target.node);
        scene.with_selectable(&target.selectable, |selectable, graph| selectable.on_transform_update(graph));
        true
    }

    /// Finish the drag and record it in history without re-applying it
    pub fn end_drag(&mut self, scene: &mut Scene, history: &mut HistoryManager) -> bool {
        let Some(mut command) = self.drag.take() else {
            return false;
        };
        let target = command.target().clone();
        if let Some(after) = scene.graph.transform(command.node()) {
            command.set_after(after);
        }
        history.push_executed(Box::new(command));
        self.events.notify(&TransformEvent::TransformEnded(target.clone()));
        scene.with_selectable(&target, |selectable, graph| selectable.on_transform_end(graph));
        true
    }
}

impl Default for TransformControlManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{EntityBlueprint, EntityType, ShapeKind};
    use crate::math::quat_from_axis_angle;

    fn attached_cube(scene: &mut Scene, gizmo: &mut TransformControlManager) -> SelectableRef {
        let id = scene
            .spawn(EntityBlueprint::shape("cube", ShapeKind::Cube).at([1.0, 2.0, 3.0]))
            .unwrap();
        let target = SelectableRef::Entity(id);
        gizmo.attach_to_selectable(Some(&target), scene);
        target
    }

    #[test]
    fn test_gizmo_mode_mapping() {
        assert_eq!(GizmoMode::from(TransformMode::Position), GizmoMode::Translate);
        assert_eq!(GizmoMode::from(TransformMode::Rotation), GizmoMode::Rotate);
        assert_eq!(GizmoMode::from(TransformMode::BoundingBox), GizmoMode::Scale);
        assert_eq!(GizmoMode::Rotate.name(), "Rotate");
    }

    #[test]
    fn test_disallowed_mode_is_coerced() {
        let mut scene = Scene::new();
        let mut gizmo = TransformControlManager::new();
        let light = scene
            .spawn(EntityBlueprint::new(
                "key",
                crate::entity::EntityProperties::Light(crate::entity::LightData {
                    light: crate::entity::LightKind::Point,
                    color: [1.0, 1.0, 1.0],
                    intensity: 2.0,
                }),
            ))
            .unwrap();
        gizmo.attach_to_selectable(Some(&SelectableRef::Entity(light)), &scene);

        assert_eq!(gizmo.allowed_modes(), EntityType::Light.default_config().allowed_modes.as_slice());
        assert_eq!(gizmo.set_mode(TransformMode::Scale), TransformMode::Position);
        assert_eq!(gizmo.size(), 0.75);
    }

    #[test]
    fn test_last_global_mode_carries_over() {
        let mut scene = Scene::new();
        let mut gizmo = TransformControlManager::new();
        attached_cube(&mut scene, &mut gizmo);
        gizmo.set_mode(TransformMode::Scale);
        gizmo.toggle_space();

        let other = scene.spawn(EntityBlueprint::shape("other", ShapeKind::Sphere)).unwrap();
        gizmo.attach_to_selectable(Some(&SelectableRef::Entity(other)), &scene);
        assert_eq!(gizmo.mode(), TransformMode::Scale);
        assert_eq!(gizmo.space(), TransformSpace::Local);
    }

    #[test]
    fn test_drag_records_one_command() {
        let mut scene = Scene::new();
        let mut gizmo = TransformControlManager::new();
        let mut history = HistoryManager::new();
        let target = attached_cube(&mut scene, &mut gizmo);
        let id = target.owning_entity();

        assert!(gizmo.begin_drag(&mut scene));
        for step in 1..=3 {
            let offset = step as f32;
            gizmo.update_drag(&mut scene, Transform::from_position([1.0 + offset, 2.0 + offset, 3.0 + offset]));
        }
        assert!(gizmo.end_drag(&mut scene, &mut history));

        assert_eq!(history.undo_depth(), 1);
        assert_eq!(scene.entity_transform(id).unwrap().position, [4.0, 5.0, 6.0]);
        assert!(!gizmo.is_dragging());
    }

    #[test]
    fn test_update_masks_by_mode() {
        let mut scene = Scene::new();
        let mut gizmo = TransformControlManager::new();
        let target = attached_cube(&mut scene, &mut gizmo);
        gizmo.set_mode(TransformMode::Rotation);

        let rotation = quat_from_axis_angle([0.0, 1.0, 0.0], 0.5);
        gizmo.begin_drag(&mut scene);
        gizmo.update_drag(
            &mut scene,
            Transform::from_position([9.0, 9.0, 9.0]).with_rotation(rotation),
        );
        let now = scene.entity_transform(target.owning_entity()).unwrap();
        assert_eq!(now.position, [1.0, 2.0, 3.0]);
        assert_eq!(now.rotation, rotation);
    }

    #[test]
    fn test_detach_mid_drag_discards_command() {
        let mut scene = Scene::new();
        let mut gizmo = TransformControlManager::new();
        let mut history = HistoryManager::new();
        attached_cube(&mut scene, &mut gizmo);

        gizmo.begin_drag(&mut scene);
        gizmo.update_drag(&mut scene, Transform::from_position([0.0, 0.0, 0.0]));
        gizmo.attach_to_selectable(None, &scene);

        assert!(!gizmo.end_drag(&mut scene, &mut history));
        assert_eq!(history.undo_depth(), 0);
    }

    #[test]
    fn test_update_without_drag_is_ignored() {
        let mut scene = Scene::new();
        let mut gizmo = TransformControlManager::new();
        let target = attached_cube(&mut scene, &mut gizmo);
        assert!(!gizmo.update_drag(&mut scene, Transform::default()));
        assert_eq!(
            scene.entity_transform(target.owning_entity()).unwrap().position,
            [1.0, 2.0, 3.0]
        );
    }
}
