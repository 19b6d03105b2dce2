// SPDX-License-Identifier: MIT OR Apache-2.0
//! Registry of every entity in the scene.
//!
//! Besides the primary `id -> entity` map the manager keeps a type index, the
//! set of soft-deleted IDs and a node-owner side table used by picking code
//! to resolve any node (mesh, bone marker) back to its selectable.

use crate::entity::{Entity, EntityId, EntityType, Lifecycle};
use crate::graph::{NodeId, NodeKind, SceneGraph};
use crate::observer::Observer;
use crate::selectable::{Selectable, SelectableRef};
use indexmap::{IndexMap, IndexSet};
use std::collections::{HashMap, HashSet};

/// Registry change notifications
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObjectEvent {
    /// An entity was registered
    EntityAdded(EntityId),
    /// An entity was unregistered
    EntityRemoved(EntityId),
    /// An entity was soft-deleted or restored
    EntityDeletedStateChanged {
        /// Entity
        id: EntityId,
        /// New deleted flag
        deleted: bool,
    },
    /// Parent/child structure or listing changed
    HierarchyChanged,
    /// Helper gizmos were shown or hidden
    GizmosVisibilityChanged(bool),
}

/// Root-level entities split by deleted state
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RootEntities {
    /// Live entities
    pub active: Vec<EntityId>,
    /// Soft-deleted entities
    pub deleted: Vec<EntityId>,
}

/// Entity registry
#[derive(Debug, Default)]
pub struct ObjectManager {
    entities: IndexMap<EntityId, Entity>,
    by_type: HashMap<EntityType, IndexSet<EntityId>>,
    deleted: HashSet<EntityId>,
    node_owners: HashMap<NodeId, SelectableRef>,
    gizmos_visible: bool,
    /// Change notifications
    pub events: Observer<ObjectEvent>,
}

impl ObjectManager {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            gizmos_visible: true,
            ..Default::default()
        }
    }

    /// Register an entity. Registering a known ID is a no-op returning false.
    pub fn register_entity(&mut self, entity: Entity, graph: &SceneGraph) -> bool {
        let id = entity.id();
        if self.entities.contains_key(&id) {
            return false;
        }
        self.by_type.entry(entity.entity_type()).or_default().insert(id);
        if entity.is_deleted() {
            self.deleted.insert(id);
        }
        let node = entity.node();
        self.entities.insert(id, entity);
        self.index_subtree(node, graph);

        tracing::debug!("Registered entity {}", id);
        self.events.notify(&ObjectEvent::EntityAdded(id));
        self.events.notify(&ObjectEvent::HierarchyChanged);
        true
    }

    /// Remove an entity from every index. Unknown IDs are a no-op.
    pub fn unregister_entity(&mut self, id: EntityId) -> Option<Entity> {
        let entity = self.entities.shift_remove(&id)?;
        if let Some(ids) = self.by_type.get_mut(&entity.entity_type()) {
            ids.shift_remove(&id);
        }
        self.deleted.remove(&id);
        self.node_owners.retain(|_, owner| owner.owning_entity() != id);

        tracing::debug!("Unregistered entity {}", id);
        self.events.notify(&ObjectEvent::EntityRemoved(id));
        self.events.notify(&ObjectEvent::HierarchyChanged);
        Some(entity)
    }

    /// Rebuild every index from a traversal of the graph.
    ///
    /// Registered entities whose node is no longer reachable from the root
    /// are kept but logged.
    pub fn scan_scene(&mut self, graph: &SceneGraph) {
        self.by_type.clear();
        self.deleted.clear();
        self.node_owners.clear();

        let mut reached = HashSet::new();
        for node in graph.descendants(graph.root()) {
            if let Some(NodeKind::Entity(id)) = graph.node(node).map(|n| &n.kind) {
                if self.entities.contains_key(id) {
                    reached.insert(*id);
                }
            }
        }

        for (id, entity) in &self.entities {
            self.by_type.entry(entity.entity_type()).or_default().insert(*id);
            if entity.is_deleted() {
                self.deleted.insert(*id);
            }
            if !reached.contains(id) && !entity.is_disposed() {
                tracing::warn!("Entity {} ({}) is not reachable from the scene root", entity.name, id);
            }
        }

        let nodes: Vec<NodeId> = self.entities.values().map(Entity::node).collect();
        for node in nodes {
            self.index_subtree(node, graph);
        }
        self.events.notify(&ObjectEvent::HierarchyChanged);
    }

    fn index_subtree(&mut self, node: NodeId, graph: &SceneGraph) {
        let Some(NodeKind::Entity(owner)) = graph.node(node).map(|n| n.kind.clone()) else {
            return;
        };
        self.node_owners.insert(node, SelectableRef::Entity(owner));

        let mut stack: Vec<(NodeId, SelectableRef)> = graph
            .children(node)
            .iter()
            .map(|c| (*c, SelectableRef::Entity(owner)))
            .collect();
        while let Some((current, inherited)) = stack.pop() {
            let Some(kind) = graph.node(current).map(|n| &n.kind) else {
                continue;
            };
            let owner = match kind {
                // Nested entities index themselves
                NodeKind::Entity(_) => continue,
                NodeKind::BoneControl { character, bone } => SelectableRef::bone(*character, bone.clone()),
                _ => inherited,
            };
            self.node_owners.insert(current, owner.clone());
            stack.extend(graph.children(current).iter().map(|c| (*c, owner.clone())));
        }
    }

    /// Get an entity
    pub fn get(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(&id)
    }

    /// Get an entity mutably
    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities.get_mut(&id)
    }

    /// Whether the ID is registered
    pub fn contains(&self, id: EntityId) -> bool {
        self.entities.contains_key(&id)
    }

    /// Number of registered entities
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Whether no entity is registered
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// All entities in registration order
    pub fn iter(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    /// IDs of a given type in registration order
    pub fn ids_of_type(&self, entity_type: EntityType) -> Vec<EntityId> {
        self.by_type
            .get(&entity_type)
            .map(|ids| ids.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Whether the entity is soft-deleted
    pub fn is_deleted(&self, id: EntityId) -> bool {
        self.deleted.contains(&id)
    }

    /// Soft-delete an entity. Returns false if it was not active.
    pub fn delete_entity(&mut self, id: EntityId, graph: &mut SceneGraph) -> bool {
        let Some(entity) = self.entities.get_mut(&id) else {
            return false;
        };
        if !entity.delete(graph) {
            return false;
        }
        self.deleted.insert(id);
        self.events.notify(&ObjectEvent::EntityDeletedStateChanged { id, deleted: true });
        true
    }

    /// Restore a soft-deleted entity
    pub fn undo_delete_entity(&mut self, id: EntityId, graph: &mut SceneGraph) -> bool {
        let Some(entity) = self.entities.get_mut(&id) else {
            return false;
        };
        if !entity.undo_delete(graph) {
            return false;
        }
        self.deleted.remove(&id);
        self.events.notify(&ObjectEvent::EntityDeletedStateChanged { id, deleted: false });
        true
    }

    /// Hide an entity whose creation was undone
    pub fn retract_entity(&mut self, id: EntityId, graph: &mut SceneGraph) -> bool {
        let retracted = self.entities.get_mut(&id).is_some_and(|e| e.retract(graph));
        if retracted {
            self.events.notify(&ObjectEvent::HierarchyChanged);
        }
        retracted
    }

    /// Bring back a retracted entity
    pub fn restore_entity(&mut self, id: EntityId, graph: &mut SceneGraph) -> bool {
        let restored = self.entities.get_mut(&id).is_some_and(|e| e.restore(graph));
        if restored {
            self.events.notify(&ObjectEvent::HierarchyChanged);
        }
        restored
    }

    /// Dispose and unregister an entity and every entity nested under it
    pub fn destroy_entity(&mut self, id: EntityId, graph: &mut SceneGraph) -> bool {
        let Some(node) = self.entities.get(&id).map(Entity::node) else {
            return false;
        };
        let nested: Vec<EntityId> = graph
            .descendants(node)
            .into_iter()
            .filter_map(|n| match graph.node(n).map(|n| &n.kind) {
                Some(NodeKind::Entity(child)) => Some(*child),
                _ => None,
            })
            .collect();
        for child in nested.into_iter().rev() {
            if let Some(mut entity) = self.unregister_entity(child) {
                entity.dispose(graph);
            }
        }
        if let Some(mut entity) = self.unregister_entity(id) {
            entity.dispose(graph);
        }
        true
    }

    /// Dispose every entity and reset indices
    pub fn clear(&mut self, graph: &mut SceneGraph) {
        let ids: Vec<EntityId> = self.entities.keys().copied().collect();
        for id in ids {
            if let Some(mut entity) = self.entities.shift_remove(&id) {
                entity.dispose(graph);
                self.events.notify(&ObjectEvent::EntityRemoved(id));
            }
        }
        self.by_type.clear();
        self.deleted.clear();
        self.node_owners.clear();
        self.events.notify(&ObjectEvent::HierarchyChanged);
    }

    fn is_listed(entity: &Entity) -> bool {
        entity.lifecycle() != Lifecycle::Retracted && !entity.is_disposed()
    }

    /// Entities attached directly to the scene root, split by deleted state
    pub fn root_entities(&self, graph: &SceneGraph) -> RootEntities {
        let mut roots = RootEntities::default();
        for entity in self.entities.values().filter(|e| Self::is_listed(e)) {
            let parent = graph.parent(entity.node());
            if parent.is_some() && parent != Some(graph.root()) {
                continue;
            }
            if entity.is_deleted() {
                roots.deleted.push(entity.id());
            } else {
                roots.active.push(entity.id());
            }
        }
        roots
    }

    /// Nearest entity descendants of an entity.
    ///
    /// Non-entity nodes (meshes, bones, bone markers) are looked through but
    /// never returned.
    pub fn entity_children(&self, id: EntityId, graph: &SceneGraph) -> Vec<EntityId> {
        let mut out = Vec::new();
        self.walk_entity_children(id, graph, |child| {
            out.push(child);
            false
        });
        out
    }

    /// Whether an entity has any entity descendants, without collecting them
    pub fn has_entity_children(&self, id: EntityId, graph: &SceneGraph) -> bool {
        let mut found = false;
        self.walk_entity_children(id, graph, |_| {
            found = true;
            true
        });
        found
    }

    fn walk_entity_children(&self, id: EntityId, graph: &SceneGraph, mut visit: impl FnMut(EntityId) -> bool) {
        let Some(entity) = self.entities.get(&id) else {
            return;
        };
        let mut stack: Vec<NodeId> = graph.children(entity.node()).iter().rev().copied().collect();
        while let Some(node) = stack.pop() {
            match graph.node(node).map(|n| &n.kind) {
                Some(NodeKind::Entity(child)) => {
                    let listed = self.entities.get(child).is_some_and(Self::is_listed);
                    if listed && visit(*child) {
                        return;
                    }
                }
                Some(_) => stack.extend(graph.children(node).iter().rev().copied()),
                None => {}
            }
        }
    }

    /// Resolve a node to the selectable that owns it.
    ///
    /// Checks the side table first, then walks up the structural parent chain.
    pub fn owning_selectable(&self, node: NodeId, graph: &SceneGraph) -> Option<SelectableRef> {
        if let Some(owner) = self.node_owners.get(&node) {
            return Some(owner.clone());
        }
        std::iter::once(node).chain(graph.ancestors(node)).find_map(|n| {
            self.node_owners.get(&n).cloned().or_else(|| match graph.node(n).map(|n| &n.kind) {
                Some(NodeKind::Entity(id)) if self.entities.contains_key(id) => Some(SelectableRef::Entity(*id)),
                Some(NodeKind::BoneControl { character, bone }) => Some(SelectableRef::bone(*character, bone.clone())),
                _ => None,
            })
        })
    }

    /// Look up a selectable by reference
    pub fn selectable(&self, target: &SelectableRef) -> Option<&dyn Selectable> {
        match target {
            SelectableRef::Entity(id) => self.entities.get(id).map(|e| e as &dyn Selectable),
            SelectableRef::BoneControl { character, bone } => self
                .entities
                .get(character)
                .and_then(Entity::character)
                .and_then(|c| c.bone_control(bone))
                .map(|c| c as &dyn Selectable),
        }
    }

    /// Look up a selectable mutably
    pub fn selectable_mut(&mut self, target: &SelectableRef) -> Option<&mut dyn Selectable> {
        match target {
            SelectableRef::Entity(id) => self.entities.get_mut(id).map(|e| e as &mut dyn Selectable),
            SelectableRef::BoneControl { character, bone } => self
                .entities
                .get_mut(character)
                .and_then(Entity::character_mut)
                .and_then(|c| c.bone_control_mut(bone))
                .map(|c| c as &mut dyn Selectable),
        }
    }

    /// Whether helper gizmos (light helpers, bone markers) are shown
    pub fn gizmos_visible(&self) -> bool {
        self.gizmos_visible
    }

    /// Show or hide helper gizmos
    pub fn set_gizmos_visible(&mut self, visible: bool) {
        if self.gizmos_visible == visible {
            return;
        }
        self.gizmos_visible = visible;
        self.events.notify(&ObjectEvent::GizmosVisibilityChanged(visible));
    }

    /// Announce a structural change made outside the registry
    pub fn notify_hierarchy_changed(&mut self, graph: &SceneGraph) {
        let nodes: Vec<NodeId> = self.entities.values().map(Entity::node).collect();
        for node in nodes {
            self.index_subtree(node, graph);
        }
        self.events.notify(&ObjectEvent::HierarchyChanged);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::character::{BoneSpec, CharacterSpec};
    use crate::entity::{EntityBlueprint, EntityProperties, ParentRef, ShapeKind};
    use crate::math::Transform;
    use crate::scene::Scene;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn recorder(objects: &mut ObjectManager) -> Rc<RefCell<Vec<ObjectEvent>>> {
        let events = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&events);
        objects.events.subscribe(move |e| sink.borrow_mut().push(e.clone()));
        events
    }

    fn character_blueprint(name: &str) -> EntityBlueprint {
        EntityBlueprint::new(
            name,
            EntityProperties::Character(CharacterSpec {
                source: "rig.glb".to_string(),
                bones: vec![
                    BoneSpec::new("hips", None, [0.0, 1.0, 0.0]),
                    BoneSpec::new("hand", Some("hips"), [0.5, 0.5, 0.0]),
                ],
                pose: Default::default(),
            }),
        )
        .with_meshes(["body"])
    }

    #[test]
    fn test_root_entities_split_by_deleted() {
        let mut scene = Scene::new();
        let a = scene.spawn(EntityBlueprint::shape("a", ShapeKind::Cube)).unwrap();
        let b = scene.spawn(EntityBlueprint::shape("b", ShapeKind::Cube)).unwrap();
        scene
            .spawn(EntityBlueprint::shape("c", ShapeKind::Cube).with_parent(ParentRef::Entity(a)))
            .unwrap();

        assert!(scene.objects.delete_entity(b, &mut scene.graph));
        let roots = scene.objects.root_entities(&scene.graph);
        assert_eq!(roots.active, vec![a]);
        assert_eq!(roots.deleted, vec![b]);
        assert!(scene.objects.is_deleted(b));
    }

    #[test]
    fn test_owning_selectable_from_deep_node() {
        let mut scene = Scene::new();
        let character = scene.spawn(character_blueprint("hero")).unwrap();
        let entity = scene.objects.get(character).unwrap();
        let body = entity.mesh_children(&scene.graph)[0];
        let control = entity.character().unwrap().bone_control("hand").unwrap().node();

        assert_eq!(
            scene.objects.owning_selectable(body, &scene.graph),
            Some(SelectableRef::Entity(character))
        );
        assert_eq!(
            scene.objects.owning_selectable(control, &scene.graph),
            Some(SelectableRef::bone(character, "hand"))
        );

        // A node added after registration resolves through the parent chain
        let extra = scene
            .graph
            .add_node("decal", NodeKind::Mesh, Transform::default(), body)
            .unwrap();
        assert_eq!(
            scene.objects.owning_selectable(extra, &scene.graph),
            Some(SelectableRef::Entity(character))
        );
    }

    #[test]
    fn test_destroy_removes_nested_entities() {
        let mut scene = Scene::new();
        let a = scene.spawn(EntityBlueprint::shape("a", ShapeKind::Cube)).unwrap();
        let b = scene
            .spawn(EntityBlueprint::shape("b", ShapeKind::Cube).with_parent(ParentRef::Entity(a)))
            .unwrap();
        assert!(scene.objects.destroy_entity(a, &mut scene.graph));
        assert!(!scene.objects.contains(a));
        assert!(!scene.objects.contains(b));
        assert!(scene.graph.is_empty());
    }

    #[test]
    fn test_gizmo_visibility_event_fires_once() {
        let mut scene = Scene::new();
        let hits = Rc::new(RefCell::new(0));
        let h = Rc::clone(&hits);
        scene.objects.events.subscribe(move |e| {
            if matches!(e, ObjectEvent::GizmosVisibilityChanged(_)) {
                *h.borrow_mut() += 1;
            }
        });
        scene.objects.set_gizmos_visible(false);
        scene.objects.set_gizmos_visible(false);
        assert!(!scene.objects.gizmos_visible());
        assert_eq!(*hits.borrow(), 1);
    }

    #[test]
    fn test_delete_and_undo_delete_notify_once() {
        let mut scene = Scene::new();
        let id = scene.spawn(EntityBlueprint::shape("cube", ShapeKind::Cube)).unwrap();
        let events = recorder(&mut scene.objects);

        assert!(scene.objects.delete_entity(id, &mut scene.graph));
        assert!(!scene.objects.delete_entity(id, &mut scene.graph));
        assert!(scene.objects.undo_delete_entity(id, &mut scene.graph));
        assert!(!scene.objects.undo_delete_entity(id, &mut scene.graph));

        assert_eq!(
            *events.borrow(),
            vec![
                ObjectEvent::EntityDeletedStateChanged { id, deleted: true },
                ObjectEvent::EntityDeletedStateChanged { id, deleted: false },
            ]
        );
        assert!(!scene.objects.is_deleted(id));
    }

    #[test]
    fn test_retract_and_restore_keep_registration() {
        let mut scene = Scene::new();
        let id = scene.spawn(EntityBlueprint::shape("cube", ShapeKind::Cube)).unwrap();

        assert!(scene.objects.retract_entity(id, &mut scene.graph));
        assert!(scene.objects.contains(id));
        assert!(!scene.objects.get(id).unwrap().is_active());
        assert!(!scene.objects.delete_entity(id, &mut scene.graph));

        assert!(scene.objects.restore_entity(id, &mut scene.graph));
        assert!(!scene.objects.restore_entity(id, &mut scene.graph));
        assert!(scene.objects.get(id).unwrap().is_active());
    }
}
