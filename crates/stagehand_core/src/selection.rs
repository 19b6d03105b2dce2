// SPDX-License-Identifier: MIT OR Apache-2.0
//! Selection state machine.
//!
//! Tracks the current entity and the current selectable separately so a
//! bone control can be selected without losing its character as the
//! current entity.

use crate::entity::EntityId;
use crate::graph::NodeId;
use crate::observer::Observer;
use crate::scene::Scene;
use crate::selectable::{Selectable, SelectableRef};
use crate::transform_controls::TransformControlManager;

/// Selection notifications. `None` means cleared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionEvent {
    /// The current entity changed
    EntitySelected(Option<EntityId>),
    /// The current selectable changed
    SelectableSelected(Option<SelectableRef>),
}

/// Observable selection state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionPhase {
    /// Nothing selected
    NothingSelected,
    /// An entity is selected
    EntitySelected(EntityId),
    /// A sub-component is selected
    SubComponentSelected {
        /// Entity owning the sub-component
        owner: EntityId,
        /// The selected sub-component
        selection: SelectableRef,
    },
}

/// Selection manager
#[derive(Debug, Default)]
pub struct SelectionManager {
    current_entity: Option<EntityId>,
    current: Option<SelectableRef>,
    /// Selection notifications
    pub events: Observer<SelectionEvent>,
}

impl SelectionManager {
    /// Create with nothing selected
    pub fn new() -> Self {
        Self::default()
    }

    /// Current entity, kept while one of its sub-components is selected
    pub fn current_entity(&self) -> Option<EntityId> {
        self.current_entity
    }

    /// Current selectable
    pub fn current(&self) -> Option<&SelectableRef> {
        self.current.as_ref()
    }

    /// Current state
    pub fn phase(&self) -> SelectionPhase {
        match (&self.current, self.current_entity) {
            (Some(selection @ SelectableRef::BoneControl { .. }), _) => SelectionPhase::SubComponentSelected {
                owner: selection.owning_entity(),
                selection: selection.clone(),
            },
            (_, Some(entity)) => SelectionPhase::EntitySelected(entity),
            (None, None) => SelectionPhase::NothingSelected,
            (Some(SelectableRef::Entity(entity)), None) => SelectionPhase::EntitySelected(*entity),
        }
    }

    /// Whether `id` or one of its sub-components is selected
    pub fn involves(&self, id: EntityId) -> bool {
        self.current_entity == Some(id) || self.current.as_ref().is_some_and(|c| c.owning_entity() == id)
    }

    /// Select a candidate.
    ///
    /// Returns false, leaving the selection unchanged, if the candidate does
    /// not resolve to a live selectable. Re-selecting the current selection
    /// is a no-op.
    pub fn select(
        &mut self,
        candidate: SelectableRef,
        scene: &mut Scene,
        gizmo: &mut TransformControlManager,
    ) -> bool {
        let owner_live = scene
            .objects
            .get(candidate.owning_entity())
            .is_some_and(|e| e.is_active());
        if !owner_live || scene.objects.selectable(&candidate).is_none() {
            tracing::debug!("Ignoring selection of unavailable {:?}", candidate);
            return false;
        }
        if self.current.as_ref() == Some(&candidate) {
            return true;
        }

        if let Some(entity) = self.current_entity {
            if !candidate.is_sub_component_of(entity) {
                self.deselect_entity(entity, scene);
            }
        }

        if let Some(current @ SelectableRef::BoneControl { .. }) = self.current.clone() {
            if current != candidate {
                self.current = None;
                Self::release(&current, scene);
            }
        }

        if let SelectableRef::Entity(id) = candidate {
            self.current_entity = Some(id);
            self.events.notify(&SelectionEvent::EntitySelected(Some(id)));
        }

        self.current = Some(candidate.clone());
        gizmo.attach_to_selectable(Some(&candidate), scene);
        scene.with_selectable(&candidate, |selectable, graph| {
            selectable.selection_state_mut().selected = true;
            selectable.on_select(graph);
        });
        self.events.notify(&SelectionEvent::SelectableSelected(Some(candidate)));
        true
    }

    /// Select whatever owns a picked node
    pub fn select_node(&mut self, node: NodeId, scene: &mut Scene, gizmo: &mut TransformControlManager) -> bool {
        match scene.objects.owning_selectable(node, &scene.graph) {
            Some(candidate) => self.select(candidate, scene, gizmo),
            None => false,
        }
    }

    /// Clear the selection and detach the gizmo
    pub fn deselect_all(&mut self, scene: &mut Scene, gizmo: &mut TransformControlManager) {
        if let Some(current) = self.current.take() {
            Self::release(&current, scene);
        }
        if let Some(entity) = self.current_entity.take() {
            Self::release(&SelectableRef::Entity(entity), scene);
        }
        gizmo.attach_to_selectable(None, scene);
        self.events.notify(&SelectionEvent::EntitySelected(None));
        self.events.notify(&SelectionEvent::SelectableSelected(None));
    }

    fn deselect_entity(&mut self, entity: EntityId, scene: &mut Scene) {
        self.current_entity = None;
        let entity_ref = SelectableRef::Entity(entity);
        if self.current.as_ref() == Some(&entity_ref) {
            self.current = None;
        }
        Self::release(&entity_ref, scene);
        self.events.notify(&SelectionEvent::EntitySelected(None));
    }

    fn release(target: &SelectableRef, scene: &mut Scene) {
        scene.with_selectable(target, |selectable, graph| {
            if selectable.is_selected() {
                selectable.selection_state_mut().selected = false;
                selectable.on_deselect(graph);
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::character::{BoneSpec, CharacterSpec};
    use crate::entity::{EntityBlueprint, EntityProperties, ShapeKind};
    use crate::selectable::{Selectable, TransformMode};
    use std::cell::RefCell;
    use std::rc::Rc;

    fn character(scene: &mut Scene, name: &str) -> EntityId {
        scene
            .spawn(EntityBlueprint::new(
                name,
                EntityProperties::Character(CharacterSpec {
                    source: "rig.glb".to_string(),
                    bones: vec![
                        BoneSpec::new("hips", None, [0.0, 1.0, 0.0]),
                        BoneSpec::new("hand", Some("hips"), [0.5, 0.5, 0.0]),
                    ],
                    pose: Default::default(),
                }),
            ))
            .unwrap()
    }

    fn recorder(selection: &mut SelectionManager) -> Rc<RefCell<Vec<SelectionEvent>>> {
        let events = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&events);
        selection.events.subscribe(move |e| sink.borrow_mut().push(e.clone()));
        events
    }

    #[test]
    fn test_bone_of_current_character_keeps_entity() {
        let mut scene = Scene::new();
        let mut gizmo = TransformControlManager::new();
        let mut selection = SelectionManager::new();
        let hero = character(&mut scene, "hero");

        assert!(selection.select(SelectableRef::Entity(hero), &mut scene, &mut gizmo));
        assert!(scene.objects.get(hero).unwrap().character().unwrap().bones_visible());
        let events = recorder(&mut selection);

        let bone = SelectableRef::bone(hero, "hand");
        assert!(selection.select(bone.clone(), &mut scene, &mut gizmo));
        assert_eq!(selection.current_entity(), Some(hero));
        assert!(!events.borrow().contains(&SelectionEvent::EntitySelected(None)));
        assert_eq!(
            selection.phase(),
            SelectionPhase::SubComponentSelected {
                owner: hero,
                selection: bone.clone(),
            }
        );

        let control = scene.objects.get(hero).unwrap().character().unwrap().bone_control("hand").unwrap();
        assert!(control.is_highlighted());
        assert_eq!(gizmo.mode(), TransformMode::Rotation);
    }

    #[test]
    fn test_reselecting_current_entity_is_silent() {
        let mut scene = Scene::new();
        let mut gizmo = TransformControlManager::new();
        let mut selection = SelectionManager::new();
        let hero = character(&mut scene, "hero");

        assert!(selection.select(SelectableRef::Entity(hero), &mut scene, &mut gizmo));
        let events = recorder(&mut selection);
        assert!(selection.select(SelectableRef::Entity(hero), &mut scene, &mut gizmo));

        assert!(events.borrow().is_empty());
        assert_eq!(selection.current_entity(), Some(hero));
        assert!(gizmo.is_attached());
        let entity = scene.objects.get(hero).unwrap();
        assert!(entity.is_selected());
        assert!(entity.character().unwrap().bones_visible());
    }

    #[test]
    fn test_bone_of_other_character_deselects_current() {
        let mut scene = Scene::new();
        let mut gizmo = TransformControlManager::new();
        let mut selection = SelectionManager::new();
        let hero = character(&mut scene, "hero");
        let villain = character(&mut scene, "villain");

        selection.select(SelectableRef::Entity(hero), &mut scene, &mut gizmo);
        let events = recorder(&mut selection);
        selection.select(SelectableRef::bone(villain, "hand"), &mut scene, &mut gizmo);

        assert_eq!(selection.current_entity(), None);
        assert_eq!(events.borrow()[0], SelectionEvent::EntitySelected(None));
        assert!(!scene.objects.get(hero).unwrap().character().unwrap().bones_visible());
    }

    #[test]
    fn test_switching_bones_unhighlights_previous() {
        let mut scene = Scene::new();
        let mut gizmo = TransformControlManager::new();
        let mut selection = SelectionManager::new();
        let hero = character(&mut scene, "hero");

        selection.select(SelectableRef::Entity(hero), &mut scene, &mut gizmo);
        selection.select(SelectableRef::bone(hero, "hips"), &mut scene, &mut gizmo);
        selection.select(SelectableRef::bone(hero, "hand"), &mut scene, &mut gizmo);

        let data = scene.objects.get(hero).unwrap().character().unwrap();
        assert!(!data.bone_control("hips").unwrap().is_highlighted());
        assert!(data.bone_control("hand").unwrap().is_highlighted());
        assert_eq!(selection.current_entity(), Some(hero));
    }

    #[test]
    fn test_deselect_all_fires_both_notifications() {
        let mut scene = Scene::new();
        let mut gizmo = TransformControlManager::new();
        let mut selection = SelectionManager::new();
        let cube = scene.spawn(EntityBlueprint::shape("cube", ShapeKind::Cube)).unwrap();

        selection.select(SelectableRef::Entity(cube), &mut scene, &mut gizmo);
        assert!(gizmo.is_attached());
        let events = recorder(&mut selection);

        selection.deselect_all(&mut scene, &mut gizmo);
        assert_eq!(selection.phase(), SelectionPhase::NothingSelected);
        assert!(!gizmo.is_attached());
        assert_eq!(
            *events.borrow(),
            vec![
                SelectionEvent::EntitySelected(None),
                SelectionEvent::SelectableSelected(None),
            ]
        );
        assert!(!scene.objects.get(cube).unwrap().is_selected());
    }

    #[test]
    fn test_select_node_resolves_owner_and_rejects_deleted() {
        let mut scene = Scene::new();
        let mut gizmo = TransformControlManager::new();
        let mut selection = SelectionManager::new();
        let cube = scene.spawn(EntityBlueprint::shape("cube", ShapeKind::Cube)).unwrap();
        let mesh = scene.objects.get(cube).unwrap().mesh_children(&scene.graph)[0];

        assert!(selection.select_node(mesh, &mut scene, &mut gizmo));
        assert_eq!(selection.current(), Some(&SelectableRef::Entity(cube)));
        selection.deselect_all(&mut scene, &mut gizmo);

        scene.objects.delete_entity(cube, &mut scene.graph);
        assert!(!selection.select(SelectableRef::Entity(cube), &mut scene, &mut gizmo));
        assert_eq!(selection.phase(), SelectionPhase::NothingSelected);
    }
}
