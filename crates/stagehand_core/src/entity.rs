// SPDX-License-Identifier: MIT OR Apache-2.0
//! Scene entities.
//!
//! An [`Entity`] is composed of a kind-specific payload ([`EntityKind`]), a
//! scene graph node carrying its transform, a selection state and a
//! lifecycle flag. Entities are created and registered by
//! [`Scene::spawn`](crate::scene::Scene::spawn).

use crate::character::{CharacterData, CharacterSpec};
use crate::graph::{NodeId, NodeKind, SceneGraph};
use crate::math::Transform;
use crate::selectable::{Selectable, SelectableConfig, SelectableRef, SelectionState, TransformMode};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Unique identifier for entities
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(pub Uuid);

impl EntityId {
    /// Create a new random entity ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Type tag of an entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EntityType {
    /// AI-generated billboard or mesh
    Generative,
    /// Primitive shape
    Shape,
    /// Light source
    Light,
    /// Skinned character
    Character,
    /// Imported 3D model
    Basic3D,
}

impl EntityType {
    /// Get the display name
    pub fn name(&self) -> &'static str {
        match self {
            Self::Generative => "Generative",
            Self::Shape => "Shape",
            Self::Light => "Light",
            Self::Character => "Character",
            Self::Basic3D => "3D Model",
        }
    }

    /// Default gizmo configuration for entities of this type
    pub fn default_config(&self) -> SelectableConfig {
        match self {
            Self::Shape | Self::Basic3D => SelectableConfig::standard().with_modes([
                TransformMode::Position,
                TransformMode::Rotation,
                TransformMode::Scale,
                TransformMode::BoundingBox,
            ]),
            Self::Light => SelectableConfig::standard()
                .with_modes([TransformMode::Position, TransformMode::Rotation])
                .with_control_size(0.75),
            Self::Character | Self::Generative => SelectableConfig::standard(),
        }
    }
}

/// Lifecycle of an entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Lifecycle {
    /// Live in the scene
    #[default]
    Active,
    /// Its creation was undone; hidden and excluded from queries and saves
    Retracted,
    /// Soft-deleted; hidden, listed as deleted, restorable
    Deleted,
}

/// Where an entity is attached
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ParentRef {
    /// The scene root
    #[default]
    Root,
    /// Another entity
    Entity(EntityId),
    /// A bone control of a character
    Bone {
        /// Owning character
        character: EntityId,
        /// Bone name
        bone: String,
    },
}

/// Primitive shape type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ShapeKind {
    /// Cube
    #[default]
    Cube,
    /// Sphere
    Sphere,
    /// Cylinder
    Cylinder,
    /// Cone
    Cone,
    /// Plane
    Plane,
    /// Torus
    Torus,
}

/// Shape payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShapeData {
    /// Shape type
    pub shape: ShapeKind,
    /// Base color (RGB)
    #[serde(default = "default_color")]
    pub color: [f32; 3],
}

/// Light type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LightKind {
    /// Omni light
    #[default]
    Point,
    /// Cone light
    Spot,
    /// Sun-like light
    Directional,
    /// Uniform ambient light
    Ambient,
}

/// Light payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LightData {
    /// Light type
    pub light: LightKind,
    /// Color (RGB)
    #[serde(default = "default_color")]
    pub color: [f32; 3],
    /// Intensity
    #[serde(default = "default_intensity")]
    pub intensity: f32,
}

/// Generated billboard or mesh payload
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerativeData {
    /// Prompt used to generate the asset
    #[serde(default)]
    pub prompt: String,
    /// Location of the generated image or mesh
    #[serde(default)]
    pub asset_url: Option<String>,
    /// Width / height of the billboard
    #[serde(default = "default_aspect")]
    pub aspect_ratio: f32,
}

/// Imported model payload
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelData {
    /// Model source path or URL
    pub source: String,
}

fn default_color() -> [f32; 3] {
    [1.0, 1.0, 1.0]
}

fn default_intensity() -> f32 {
    1.0
}

fn default_aspect() -> f32 {
    1.0
}

/// Serializable kind-specific properties
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EntityProperties {
    /// Shape
    Shape(ShapeData),
    /// Light
    Light(LightData),
    /// Character with skeleton and pose
    Character(CharacterSpec),
    /// Generated asset
    Generative(GenerativeData),
    /// Imported model
    Basic3D(ModelData),
}

impl EntityProperties {
    /// Type tag of these properties
    pub fn entity_type(&self) -> EntityType {
        match self {
            Self::Shape(_) => EntityType::Shape,
            Self::Light(_) => EntityType::Light,
            Self::Character(_) => EntityType::Character,
            Self::Generative(_) => EntityType::Generative,
            Self::Basic3D(_) => EntityType::Basic3D,
        }
    }
}

/// Runtime kind payload of an entity
#[derive(Debug, Clone)]
pub enum EntityKind {
    /// Shape
    Shape(ShapeData),
    /// Light
    Light(LightData),
    /// Character
    Character(CharacterData),
    /// Generated asset
    Generative(GenerativeData),
    /// Imported model
    Basic3D(ModelData),
}

impl EntityKind {
    /// Type tag
    pub fn entity_type(&self) -> EntityType {
        match self {
            Self::Shape(_) => EntityType::Shape,
            Self::Light(_) => EntityType::Light,
            Self::Character(_) => EntityType::Character,
            Self::Generative(_) => EntityType::Generative,
            Self::Basic3D(_) => EntityType::Basic3D,
        }
    }
}

/// Bone a child entity is attached to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParentBoneRecord {
    /// Bone name
    pub bone_name: String,
    /// Owning character
    pub character_id: EntityId,
}

/// Serialized form of an entity.
///
/// At most one of `parent_uuid` and `parent_bone` is set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityRecord {
    /// Entity ID
    pub uuid: EntityId,
    /// Display name
    pub name: String,
    /// Type tag
    pub entity_type: EntityType,
    /// Kind-specific properties
    pub properties: EntityProperties,
    /// Local position
    pub position: [f32; 3],
    /// Local rotation quaternion
    #[serde(default = "default_rotation")]
    pub rotation: [f32; 4],
    /// Local scale
    #[serde(default = "default_scale")]
    pub scale: [f32; 3],
    /// Visibility flag
    #[serde(default = "default_visible")]
    pub visible: bool,
    /// Creation time in milliseconds since the Unix epoch
    #[serde(default)]
    pub created_at: u64,
    /// Names of mesh children
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub meshes: Vec<String>,
    /// Parent entity
    #[serde(
        default,
        rename = "parentUUID",
        alias = "parentUuid",
        skip_serializing_if = "Option::is_none"
    )]
    pub parent_uuid: Option<EntityId>,
    /// Parent bone
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_bone: Option<ParentBoneRecord>,
}

fn default_rotation() -> [f32; 4] {
    [0.0, 0.0, 0.0, 1.0]
}

fn default_scale() -> [f32; 3] {
    [1.0, 1.0, 1.0]
}

fn default_visible() -> bool {
    true
}

impl EntityRecord {
    /// Parent placement described by this record
    pub fn parent_ref(&self) -> ParentRef {
        if let Some(bone) = &self.parent_bone {
            ParentRef::Bone {
                character: bone.character_id,
                bone: bone.bone_name.clone(),
            }
        } else if let Some(parent) = self.parent_uuid {
            ParentRef::Entity(parent)
        } else {
            ParentRef::Root
        }
    }
}

/// Everything needed to construct an entity
#[derive(Debug, Clone, PartialEq)]
pub struct EntityBlueprint {
    /// Fixed ID; a fresh one is generated when absent
    pub id: Option<EntityId>,
    /// Display name
    pub name: String,
    /// Kind-specific properties
    pub properties: EntityProperties,
    /// Initial local transform
    pub transform: Transform,
    /// Requested parent
    pub parent: ParentRef,
    /// Mesh children to create
    pub meshes: Vec<String>,
    /// Initial visibility
    pub visible: bool,
    /// Creation timestamp to keep; now when absent
    pub created_at: Option<u64>,
}

impl EntityBlueprint {
    /// Blueprint at the origin under the scene root
    pub fn new(name: impl Into<String>, properties: EntityProperties) -> Self {
        Self {
            id: None,
            name: name.into(),
            properties,
            transform: Transform::default(),
            parent: ParentRef::Root,
            meshes: Vec::new(),
            visible: true,
            created_at: None,
        }
    }

    /// Shape blueprint with one mesh child
    pub fn shape(name: impl Into<String>, shape: ShapeKind) -> Self {
        let name = name.into();
        let mesh = format!("{name}_mesh");
        Self::new(
            name,
            EntityProperties::Shape(ShapeData {
                shape,
                color: default_color(),
            }),
        )
        .with_meshes([mesh])
    }

    /// Builder: fixed ID
    pub fn with_id(mut self, id: EntityId) -> Self {
        self.id = Some(id);
        self
    }

    /// Builder: transform
    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    /// Builder: position
    pub fn at(mut self, position: [f32; 3]) -> Self {
        self.transform.position = position;
        self
    }

    /// Builder: parent
    pub fn with_parent(mut self, parent: ParentRef) -> Self {
        self.parent = parent;
        self
    }

    /// Builder: mesh children
    pub fn with_meshes<S: Into<String>>(mut self, meshes: impl IntoIterator<Item = S>) -> Self {
        self.meshes = meshes.into_iter().map(Into::into).collect();
        self
    }
}

impl From<EntityRecord> for EntityBlueprint {
    fn from(record: EntityRecord) -> Self {
        let parent = record.parent_ref();
        Self {
            id: Some(record.uuid),
            name: record.name,
            properties: record.properties,
            transform: Transform {
                position: record.position,
                rotation: record.rotation,
                scale: record.scale,
            },
            parent,
            meshes: record.meshes,
            visible: record.visible,
            created_at: Some(record.created_at),
        }
    }
}

/// Current time in milliseconds since the Unix epoch
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

/// A placeable object in the scene
#[derive(Debug, Clone)]
pub struct Entity {
    id: EntityId,
    /// Display name
    pub name: String,
    /// Kind payload
    pub kind: EntityKind,
    node: NodeId,
    created_at: u64,
    lifecycle: Lifecycle,
    parent: ParentRef,
    config: SelectableConfig,
    selection: SelectionState,
    /// Visibility of self and direct mesh children before being hidden
    saved_visibility: Vec<(NodeId, bool)>,
    disposed: bool,
}

impl Entity {
    /// Wrap an already-created node
    pub fn new(id: EntityId, name: impl Into<String>, kind: EntityKind, node: NodeId, created_at: u64) -> Self {
        let config = kind.entity_type().default_config();
        Self {
            id,
            name: name.into(),
            kind,
            node,
            created_at,
            lifecycle: Lifecycle::Active,
            parent: ParentRef::Root,
            config,
            selection: SelectionState::default(),
            saved_visibility: Vec::new(),
            disposed: false,
        }
    }

    /// Entity ID
    pub fn id(&self) -> EntityId {
        self.id
    }

    /// Type tag
    pub fn entity_type(&self) -> EntityType {
        self.kind.entity_type()
    }

    /// Scene graph node carrying the transform
    pub fn node(&self) -> NodeId {
        self.node
    }

    /// Creation timestamp (ms since epoch)
    pub fn created_at(&self) -> u64 {
        self.created_at
    }

    /// Current lifecycle state
    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    /// Whether live in the scene
    pub fn is_active(&self) -> bool {
        self.lifecycle == Lifecycle::Active
    }

    /// Whether soft-deleted
    pub fn is_deleted(&self) -> bool {
        self.lifecycle == Lifecycle::Deleted
    }

    /// Whether resources were released
    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Resolved parent placement
    pub fn parent(&self) -> &ParentRef {
        &self.parent
    }

    /// Record the resolved parent placement
    pub fn set_parent(&mut self, parent: ParentRef) {
        self.parent = parent;
    }

    /// Replace the gizmo configuration
    pub fn set_config(&mut self, config: SelectableConfig) {
        self.config = config;
    }

    /// Character payload, if this is a character
    pub fn character(&self) -> Option<&CharacterData> {
        match &self.kind {
            EntityKind::Character(data) => Some(data),
            _ => None,
        }
    }

    /// Mutable character payload
    pub fn character_mut(&mut self) -> Option<&mut CharacterData> {
        match &mut self.kind {
            EntityKind::Character(data) => Some(data),
            _ => None,
        }
    }

    /// Local transform
    pub fn transform(&self, graph: &SceneGraph) -> Transform {
        graph.transform(self.node).unwrap_or_default()
    }

    /// Visibility of the entity node
    pub fn is_visible(&self, graph: &SceneGraph) -> bool {
        graph.is_visible(self.node)
    }

    /// Direct mesh children of the entity node
    pub fn mesh_children(&self, graph: &SceneGraph) -> Vec<NodeId> {
        graph
            .children(self.node)
            .iter()
            .copied()
            .filter(|c| graph.node(*c).is_some_and(|n| n.kind == NodeKind::Mesh))
            .collect()
    }

    /// Soft-delete: hide self and direct mesh children and flag as deleted.
    ///
    /// Returns false if the entity was not active.
    pub fn delete(&mut self, graph: &mut SceneGraph) -> bool {
        if self.lifecycle != Lifecycle::Active || self.disposed {
            return false;
        }
        self.conceal(graph);
        self.lifecycle = Lifecycle::Deleted;
        true
    }

    /// Reverse [`Self::delete`], restoring prior visibility
    pub fn undo_delete(&mut self, graph: &mut SceneGraph) -> bool {
        if self.lifecycle != Lifecycle::Deleted {
            return false;
        }
        self.reveal(graph);
        self.lifecycle = Lifecycle::Active;
        true
    }

    /// Hide after an undone creation
    pub fn retract(&mut self, graph: &mut SceneGraph) -> bool {
        if self.lifecycle != Lifecycle::Active || self.disposed {
            return false;
        }
        self.conceal(graph);
        self.lifecycle = Lifecycle::Retracted;
        true
    }

    /// Reverse [`Self::retract`]
    pub fn restore(&mut self, graph: &mut SceneGraph) -> bool {
        if self.lifecycle != Lifecycle::Retracted {
            return false;
        }
        self.reveal(graph);
        self.lifecycle = Lifecycle::Active;
        true
    }

    fn conceal(&mut self, graph: &mut SceneGraph) {
        let mut targets = vec![self.node];
        targets.extend(self.mesh_children(graph));
        self.saved_visibility = targets.iter().map(|n| (*n, graph.is_visible(*n))).collect();
        for node in targets {
            let _ = graph.set_visible(node, false);
        }
    }

    fn reveal(&mut self, graph: &mut SceneGraph) {
        for (node, visible) in std::mem::take(&mut self.saved_visibility) {
            let _ = graph.set_visible(node, visible);
        }
    }

    /// Release owned resources and detach from the graph. Safe to call twice.
    pub fn dispose(&mut self, graph: &mut SceneGraph) {
        if self.disposed {
            return;
        }
        if let EntityKind::Character(data) = &mut self.kind {
            data.release();
        }
        if graph.contains(self.node) {
            if let Err(e) = graph.remove_subtree(self.node) {
                tracing::warn!("Failed to remove nodes of entity {}: {}", self.id, e);
            }
        }
        self.saved_visibility.clear();
        self.disposed = true;
    }

    /// Serializable record. Emits a parent entity or a parent bone, never both.
    pub fn serialize(&self, graph: &SceneGraph) -> EntityRecord {
        let transform = self.transform(graph);
        let properties = match &self.kind {
            EntityKind::Shape(data) => EntityProperties::Shape(data.clone()),
            EntityKind::Light(data) => EntityProperties::Light(data.clone()),
            EntityKind::Character(data) => EntityProperties::Character(data.to_spec(graph)),
            EntityKind::Generative(data) => EntityProperties::Generative(data.clone()),
            EntityKind::Basic3D(data) => EntityProperties::Basic3D(data.clone()),
        };
        let (parent_uuid, parent_bone) = match &self.parent {
            ParentRef::Root => (None, None),
            ParentRef::Entity(id) => (Some(*id), None),
            ParentRef::Bone { character, bone } => (
                None,
                Some(ParentBoneRecord {
                    bone_name: bone.clone(),
                    character_id: *character,
                }),
            ),
        };
        let meshes = self
            .mesh_children(graph)
            .into_iter()
            .filter_map(|n| graph.node(n).map(|node| node.name.clone()))
            .collect();
        let visible = match self.lifecycle {
            Lifecycle::Active => self.is_visible(graph),
            Lifecycle::Retracted | Lifecycle::Deleted => self
                .saved_visibility
                .first()
                .map_or(true, |(_, visible)| *visible),
        };

        EntityRecord {
            uuid: self.id,
            name: self.name.clone(),
            entity_type: self.entity_type(),
            properties,
            position: transform.position,
            rotation: transform.rotation,
            scale: transform.scale,
            visible,
            created_at: self.created_at,
            meshes,
            parent_uuid,
            parent_bone,
        }
    }
}

impl Selectable for Entity {
    fn selectable_ref(&self) -> SelectableRef {
        SelectableRef::Entity(self.id)
    }

    fn config(&self) -> &SelectableConfig {
        &self.config
    }

    fn transform_target(&self) -> NodeId {
        self.node
    }

    fn selection_state(&self) -> &SelectionState {
        &self.selection
    }

    fn selection_state_mut(&mut self) -> &mut SelectionState {
        &mut self.selection
    }

    fn on_select(&mut self, graph: &mut SceneGraph) {
        if let EntityKind::Character(data) = &mut self.kind {
            data.set_bones_visible(graph, true);
        }
    }

    fn on_deselect(&mut self, graph: &mut SceneGraph) {
        if let EntityKind::Character(data) = &mut self.kind {
            data.set_bones_visible(graph, false);
        }
    }
}
