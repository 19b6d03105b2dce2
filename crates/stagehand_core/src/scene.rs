// SPDX-License-Identifier: MIT OR Apache-2.0
//! The scene: graph, entity registry and camera.
//!
//! [`Scene::spawn`] is the single place entities are constructed. It
//! resolves the requested parent, builds the entity's nodes and registers it
//! with the [`ObjectManager`].

use crate::camera::{CameraControls, PerspectiveCamera};
use crate::character::CharacterData;
use crate::entity::{
    now_millis, Entity, EntityBlueprint, EntityId, EntityKind, EntityProperties, EntityRecord, Lifecycle, ParentRef,
};
use crate::graph::{GraphError, NodeId, NodeKind, SceneGraph};
use crate::math::Transform;
use crate::object_manager::ObjectManager;
use crate::selectable::{Selectable, SelectableRef};
use std::collections::HashSet;
use thiserror::Error;

/// Scene errors
#[derive(Debug, Error)]
pub enum SceneError {
    /// No entity with this ID
    #[error("Entity not found: {0}")]
    EntityNotFound(EntityId),

    /// Requested parent does not exist
    #[error("Parent not found: {0:?}")]
    ParentNotFound(ParentRef),

    /// Scene graph rejected the operation
    #[error("Scene graph error: {0}")]
    Graph(#[from] GraphError),
}

/// Scene contents
#[derive(Debug)]
pub struct Scene {
    /// Scene graph
    pub graph: SceneGraph,
    /// Entity registry
    pub objects: ObjectManager,
    /// Render camera
    pub camera: PerspectiveCamera,
    /// Manual camera controls
    pub camera_controls: CameraControls,
}

impl Scene {
    /// Create an empty scene
    pub fn new() -> Self {
        Self {
            graph: SceneGraph::new(),
            objects: ObjectManager::new(),
            camera: PerspectiveCamera::new(),
            camera_controls: CameraControls::default(),
        }
    }

    /// Construct and register an entity.
    ///
    /// An unresolvable parent falls back to the scene root with a warning.
    /// Spawning an ID that is already registered returns that ID unchanged.
    pub fn spawn(&mut self, blueprint: EntityBlueprint) -> Result<EntityId, SceneError> {
        let id = blueprint.id.unwrap_or_default();
        if self.objects.contains(id) {
            tracing::debug!("Entity {} already exists; spawn ignored", id);
            return Ok(id);
        }

        let (parent_node, parent) = self.resolve_parent_lenient(&blueprint.parent, &blueprint.name);
        let node = self.graph.add_node_with_id(
            id.into(),
            blueprint.name.clone(),
            NodeKind::Entity(id),
            blueprint.transform,
            parent_node,
        )?;

        match self.build_entity(id, node, &blueprint) {
            Ok(mut entity) => {
                entity.set_parent(parent);
                self.objects.register_entity(entity, &self.graph);
                Ok(id)
            }
            Err(e) => {
                let _ = self.graph.remove_subtree(node);
                Err(e)
            }
        }
    }

    fn build_entity(&mut self, id: EntityId, node: NodeId, blueprint: &EntityBlueprint) -> Result<Entity, SceneError> {
        for mesh in &blueprint.meshes {
            self.graph.add_node(mesh.clone(), NodeKind::Mesh, Transform::default(), node)?;
        }
        let kind = match &blueprint.properties {
            EntityProperties::Shape(data) => EntityKind::Shape(data.clone()),
            EntityProperties::Light(data) => EntityKind::Light(data.clone()),
            EntityProperties::Generative(data) => EntityKind::Generative(data.clone()),
            EntityProperties::Basic3D(data) => EntityKind::Basic3D(data.clone()),
            EntityProperties::Character(spec) => {
                EntityKind::Character(CharacterData::spawn(&mut self.graph, id, node, spec)?)
            }
        };
        if !blueprint.visible {
            self.graph.set_visible(node, false)?;
        }
        let created_at = blueprint.created_at.unwrap_or_else(now_millis);
        Ok(Entity::new(id, blueprint.name.clone(), kind, node, created_at))
    }

    fn parent_node(&self, parent: &ParentRef) -> Option<NodeId> {
        match parent {
            ParentRef::Root => Some(self.graph.root()),
            ParentRef::Entity(id) => self
                .objects
                .get(*id)
                .map(Entity::node)
                .filter(|node| self.graph.contains(*node)),
            ParentRef::Bone { character, bone } => self
                .objects
                .get(*character)
                .and_then(Entity::character)
                .and_then(|c| c.bone_control(bone))
                .map(|c| c.node()),
        }
    }

    fn resolve_parent_lenient(&self, parent: &ParentRef, name: &str) -> (NodeId, ParentRef) {
        match self.parent_node(parent) {
            Some(node) => (node, parent.clone()),
            None => {
                tracing::warn!("Parent {:?} of {} not found; attaching to scene root", parent, name);
                (self.graph.root(), ParentRef::Root)
            }
        }
    }

    /// Move an entity under a new parent. Returns the previous parent.
    ///
    /// Fails if the parent is unknown or would create a cycle.
    pub fn reparent(&mut self, id: EntityId, parent: ParentRef) -> Result<ParentRef, SceneError> {
        let node = self.objects.get(id).map(Entity::node).ok_or(SceneError::EntityNotFound(id))?;
        let parent_node = self
            .parent_node(&parent)
            .ok_or_else(|| SceneError::ParentNotFound(parent.clone()))?;
        self.graph.attach(node, parent_node)?;

        let entity = self.objects.get_mut(id).ok_or(SceneError::EntityNotFound(id))?;
        let previous = entity.parent().clone();
        entity.set_parent(parent);
        self.objects.notify_hierarchy_changed(&self.graph);
        Ok(previous)
    }

    /// Local transform of an entity
    pub fn entity_transform(&self, id: EntityId) -> Option<Transform> {
        self.objects.get(id).map(|e| e.transform(&self.graph))
    }

    /// Replace an entity's local transform
    pub fn set_entity_transform(&mut self, id: EntityId, transform: Transform) -> Result<(), SceneError> {
        let node = self.objects.get(id).map(Entity::node).ok_or(SceneError::EntityNotFound(id))?;
        self.graph.set_transform(node, transform)?;
        Ok(())
    }

    /// Run `f` against a selectable and the graph it lives in
    pub fn with_selectable<R>(
        &mut self,
        target: &SelectableRef,
        f: impl FnOnce(&mut dyn Selectable, &mut SceneGraph) -> R,
    ) -> Option<R> {
        let Self { graph, objects, .. } = self;
        objects.selectable_mut(target).map(|s| f(s, graph))
    }

    /// Records for every entity that is not retracted or disposed
    pub fn serialize_entities(&self) -> Vec<EntityRecord> {
        self.objects
            .iter()
            .filter(|e| e.lifecycle() != Lifecycle::Retracted && !e.is_disposed())
            .map(|e| e.serialize(&self.graph))
            .collect()
    }

    /// Spawn entities from records, parents before children.
    ///
    /// A record that fails to spawn is logged and skipped; the rest continue.
    pub fn load_entities(&mut self, records: Vec<EntityRecord>) -> Vec<EntityId> {
        let known: HashSet<EntityId> = records.iter().map(|r| r.uuid).collect();
        let mut spawned: HashSet<EntityId> = HashSet::new();
        let mut loaded = Vec::new();
        let mut pending = records;

        loop {
            let (ready, rest): (Vec<_>, Vec<_>) = pending.into_iter().partition(|record| {
                let parent = match record.parent_ref() {
                    ParentRef::Root => return true,
                    ParentRef::Entity(parent) => parent,
                    ParentRef::Bone { character, .. } => character,
                };
                !known.contains(&parent) || spawned.contains(&parent)
            });
            pending = rest;
            if ready.is_empty() {
                break;
            }
            for record in ready {
                let id = record.uuid;
                spawned.insert(id);
                self.spawn_record(record, &mut loaded);
            }
        }

        // Whatever remains references each other in a cycle
        for record in pending {
            tracing::warn!("Entity {} is part of a parent cycle", record.uuid);
            self.spawn_record(record, &mut loaded);
        }

        self.objects.scan_scene(&self.graph);
        loaded
    }

    fn spawn_record(&mut self, record: EntityRecord, loaded: &mut Vec<EntityId>) {
        let name = record.name.clone();
        match self.spawn(EntityBlueprint::from(record)) {
            Ok(id) => loaded.push(id),
            Err(e) => tracing::warn!("Failed to load entity {}: {}", name, e),
        }
    }

    /// Remove every entity
    pub fn clear(&mut self) {
        self.objects.clear(&mut self.graph);
        self.graph = SceneGraph::new();
    }
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}
