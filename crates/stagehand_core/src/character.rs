// SPDX-License-Identifier: MIT OR Apache-2.0
//! Skinned characters: skeleton, bone controls and pose snapshots.
//!
//! A character owns one [`BoneControl`] per bone. The control's marker node
//! is a sibling of the bone (same parent, same local space), so a rotation
//! applied to the marker maps directly onto the bone's local rotation. The
//! control references its bone by node ID only; [`BoneControl::push_to_bone`]
//! and [`BoneControl::pull_from_bone`] are the only synchronization points.

use crate::entity::EntityId;
use crate::graph::{GraphError, NodeId, NodeKind, SceneGraph};
use crate::math::{quat_approx_eq, vec3_approx_eq, Transform};
use crate::selectable::{Selectable, SelectableConfig, SelectableRef, SelectionState};
use glam::Mat4;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Orientation tolerance (1 - |dot|) below which a bone counts as unposed
pub const POSE_ROTATION_EPSILON: f32 = 1e-6;

/// Position tolerance below which a bone counts as unmoved
pub const POSE_POSITION_EPSILON: f32 = 1e-4;

/// Bone definition used to build a skeleton
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoneSpec {
    /// Bone name, unique within the skeleton
    pub name: String,
    /// Parent bone name; `None` attaches to the character root
    #[serde(default)]
    pub parent: Option<String>,
    /// Rest transform relative to the parent
    #[serde(default)]
    pub transform: Transform,
}

impl BoneSpec {
    /// Create a bone at a rest position
    pub fn new(name: impl Into<String>, parent: Option<&str>, position: [f32; 3]) -> Self {
        Self {
            name: name.into(),
            parent: parent.map(str::to_string),
            transform: Transform::from_position(position),
        }
    }
}

/// Local pose of one bone
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BonePose {
    /// Local rotation quaternion (x, y, z, w)
    pub rotation: [f32; 4],
    /// Local position, when it differs from rest
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<[f32; 3]>,
}

impl BonePose {
    /// Rotation-only pose
    pub fn rotation(rotation: [f32; 4]) -> Self {
        Self {
            rotation,
            position: None,
        }
    }
}

/// Sparse map of bone name to pose
pub type SparsePose = BTreeMap<String, BonePose>;

/// Serializable character description
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CharacterSpec {
    /// Model source path or URL
    #[serde(default)]
    pub source: String,
    /// Skeleton in rest pose
    #[serde(default)]
    pub bones: Vec<BoneSpec>,
    /// Bones posed away from rest
    #[serde(default)]
    pub pose: SparsePose,
}

#[derive(Debug, Clone)]
struct SkeletonBone {
    name: String,
    node: NodeId,
}

/// Bones of a character plus their skinning matrices
#[derive(Debug, Clone, Default)]
pub struct Skeleton {
    bones: Vec<SkeletonBone>,
    bone_inverses: Vec<Mat4>,
    bone_matrices: Vec<Mat4>,
}

impl Skeleton {
    /// Create bone nodes under `root` from their specs.
    ///
    /// A bone whose parent name is unknown is attached to `root`.
    pub fn build(graph: &mut SceneGraph, root: NodeId, specs: &[BoneSpec]) -> Result<Self, GraphError> {
        let mut skeleton = Self::default();
        for spec in specs {
            let parent = match &spec.parent {
                None => root,
                Some(name) => match skeleton.bone(name) {
                    Some(node) => node,
                    None => {
                        tracing::warn!("Bone {} references unknown parent {}; attaching to character root", spec.name, name);
                        root
                    }
                },
            };
            let node = graph.add_node(spec.name.clone(), NodeKind::Bone, spec.transform, parent)?;
            skeleton.bones.push(SkeletonBone {
                name: spec.name.clone(),
                node,
            });
        }
        skeleton.calculate_inverses(graph);
        Ok(skeleton)
    }

    /// Node of a bone by name
    pub fn bone(&self, name: &str) -> Option<NodeId> {
        self.bones.iter().find(|b| b.name == name).map(|b| b.node)
    }

    /// Bone names in skeleton order
    pub fn bone_names(&self) -> impl Iterator<Item = &str> {
        self.bones.iter().map(|b| b.name.as_str())
    }

    /// Bone nodes in skeleton order
    pub fn bone_nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.bones.iter().map(|b| b.node)
    }

    /// Number of bones
    pub fn len(&self) -> usize {
        self.bones.len()
    }

    /// Whether the skeleton has no bones
    pub fn is_empty(&self) -> bool {
        self.bones.is_empty()
    }

    /// Store the inverse of every bone's current world matrix as its bind pose
    pub fn calculate_inverses(&mut self, graph: &SceneGraph) {
        self.bone_inverses = self
            .bones
            .iter()
            .map(|b| graph.world_matrix(b.node).unwrap_or(Mat4::IDENTITY).inverse())
            .collect();
        self.bone_matrices = vec![Mat4::IDENTITY; self.bones.len()];
    }

    /// Recompute skinning matrices from the bones' world matrices
    pub fn update(&mut self, graph: &SceneGraph) {
        self.bone_matrices = self
            .bones
            .iter()
            .zip(self.bone_inverses.iter())
            .map(|(bone, inverse)| graph.world_matrix(bone.node).unwrap_or(Mat4::IDENTITY) * *inverse)
            .collect();
    }

    /// Skinning matrices, one per bone
    pub fn bone_matrices(&self) -> &[Mat4] {
        &self.bone_matrices
    }
}

/// Selectable proxy for one bone. Only rotation is allowed.
#[derive(Debug, Clone)]
pub struct BoneControl {
    name: String,
    character: EntityId,
    bone: NodeId,
    node: NodeId,
    config: SelectableConfig,
    selection: SelectionState,
    highlighted: bool,
}

impl BoneControl {
    /// Create the marker node next to `bone`, sharing its parent
    pub fn new(
        graph: &mut SceneGraph,
        character: EntityId,
        bone: NodeId,
        name: impl Into<String>,
    ) -> Result<Self, GraphError> {
        let name = name.into();
        let parent = graph.parent(bone).ok_or(GraphError::UnknownNode(bone))?;
        let bone_local = graph.transform(bone).ok_or(GraphError::UnknownNode(bone))?;
        let marker = Transform {
            position: bone_local.position,
            rotation: bone_local.rotation,
            scale: [1.0, 1.0, 1.0],
        };
        let node = graph.add_node(
            format!("{name}_control"),
            NodeKind::BoneControl {
                character,
                bone: name.clone(),
            },
            marker,
            parent,
        )?;
        Ok(Self {
            name,
            character,
            bone,
            node,
            config: SelectableConfig::rotation_only(),
            selection: SelectionState::default(),
            highlighted: false,
        })
    }

    /// Bone name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Owning character
    pub fn character(&self) -> EntityId {
        self.character
    }

    /// Bone node this control drives
    pub fn bone(&self) -> NodeId {
        self.bone
    }

    /// Marker node
    pub fn node(&self) -> NodeId {
        self.node
    }

    /// Whether the highlight material is applied
    pub fn is_highlighted(&self) -> bool {
        self.highlighted
    }

    /// Copy the control's rotation into the bone and refresh the bone's world matrix
    pub fn push_to_bone(&self, graph: &mut SceneGraph) {
        let Some(rotation) = graph.transform(self.node).map(|t| t.rotation) else {
            return;
        };
        if let Some(bone) = graph.node_mut(self.bone) {
            bone.transform.rotation = rotation;
        }
        graph.update_world_matrix(self.bone);
    }

    /// Copy the bone's rotation into the control
    pub fn pull_from_bone(&self, graph: &mut SceneGraph) {
        let Some(rotation) = graph.transform(self.bone).map(|t| t.rotation) else {
            return;
        };
        if let Some(marker) = graph.node_mut(self.node) {
            marker.transform.rotation = rotation;
        }
        graph.update_world_matrix(self.node);
    }

    /// Move the marker onto the bone's current local position and rotation
    pub fn sync_overlay(&self, graph: &mut SceneGraph) {
        let Some(bone) = graph.transform(self.bone) else {
            return;
        };
        if let Some(marker) = graph.node_mut(self.node) {
            marker.transform.position = bone.position;
            marker.transform.rotation = bone.rotation;
        }
        graph.update_world_matrix(self.node);
    }

    /// Hide the marker. Bone controls live as long as their character.
    pub fn delete(&self, graph: &mut SceneGraph) {
        let _ = graph.set_visible(self.node, false);
    }

    /// Show the marker again
    pub fn undo_delete(&self, graph: &mut SceneGraph) {
        let _ = graph.set_visible(self.node, true);
    }
}

impl Selectable for BoneControl {
    fn selectable_ref(&self) -> SelectableRef {
        SelectableRef::bone(self.character, self.name.clone())
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
        self.pull_from_bone(graph);
        self.highlighted = true;
    }

    fn on_deselect(&mut self, _graph: &mut SceneGraph) {
        self.highlighted = false;
    }

    fn on_transform_start(&mut self, graph: &mut SceneGraph) {
        self.push_to_bone(graph);
    }

    fn on_transform_update(&mut self, graph: &mut SceneGraph) {
        self.push_to_bone(graph);
    }
}

/// Runtime state of a character entity
#[derive(Debug, Clone)]
pub struct CharacterData {
    /// Model source path or URL
    pub source: String,
    bone_specs: Vec<BoneSpec>,
    skeleton: Skeleton,
    bone_controls: IndexMap<String, BoneControl>,
    initial_pose: IndexMap<String, Transform>,
    show_bones: bool,
}

impl CharacterData {
    /// Build skeleton and bone controls under `root`.
    ///
    /// The initial pose snapshot is taken from the rest pose, before
    /// `spec.pose` is applied.
    pub fn spawn(
        graph: &mut SceneGraph,
        character: EntityId,
        root: NodeId,
        spec: &CharacterSpec,
    ) -> Result<Self, GraphError> {
        let skeleton = Skeleton::build(graph, root, &spec.bones)?;

        let mut bone_controls = IndexMap::new();
        for bone in &skeleton.bones {
            let control = BoneControl::new(graph, character, bone.node, bone.name.clone())?;
            let _ = graph.set_visible(control.node(), false);
            bone_controls.insert(bone.name.clone(), control);
        }

        let mut data = Self {
            source: spec.source.clone(),
            bone_specs: spec.bones.clone(),
            skeleton,
            bone_controls,
            initial_pose: IndexMap::new(),
            show_bones: false,
        };
        data.capture_initial_pose(graph);

        for (name, pose) in &spec.pose {
            if !data.apply_bone_pose(graph, name, pose) {
                tracing::warn!("Saved pose references unknown bone {}; skipping", name);
            }
        }
        data.update_skeleton(graph);
        Ok(data)
    }

    /// Record every bone's current local transform as the reference pose
    /// used by sparse pose encoding
    pub fn capture_initial_pose(&mut self, graph: &SceneGraph) {
        self.initial_pose = self
            .skeleton
            .bones
            .iter()
            .filter_map(|b| graph.transform(b.node).map(|t| (b.name.clone(), t)))
            .collect();
    }

    /// Reference pose captured by [`Self::capture_initial_pose`]
    pub fn initial_pose(&self) -> &IndexMap<String, Transform> {
        &self.initial_pose
    }

    /// Skeleton
    pub fn skeleton(&self) -> &Skeleton {
        &self.skeleton
    }

    /// Bone control by bone name
    pub fn bone_control(&self, name: &str) -> Option<&BoneControl> {
        self.bone_controls.get(name)
    }

    /// Mutable bone control by bone name
    pub fn bone_control_mut(&mut self, name: &str) -> Option<&mut BoneControl> {
        self.bone_controls.get_mut(name)
    }

    /// All bone controls in skeleton order
    pub fn bone_controls(&self) -> impl Iterator<Item = &BoneControl> {
        self.bone_controls.values()
    }

    /// Whether bone markers are shown
    pub fn bones_visible(&self) -> bool {
        self.show_bones
    }

    /// Show or hide every bone marker
    pub fn set_bones_visible(&mut self, graph: &mut SceneGraph, visible: bool) {
        self.show_bones = visible;
        for control in self.bone_controls.values() {
            let _ = graph.set_visible(control.node(), visible);
        }
    }

    /// Bones whose live local transform differs from the initial pose.
    ///
    /// Position is included only when it moved.
    pub fn sparse_pose(&self, graph: &SceneGraph) -> SparsePose {
        let mut pose = SparsePose::new();
        for control in self.bone_controls.values() {
            let Some(live) = graph.transform(control.bone()) else {
                continue;
            };
            let initial = self.initial_pose.get(control.name()).copied().unwrap_or_default();
            let rotated = !quat_approx_eq(live.rotation, initial.rotation, POSE_ROTATION_EPSILON);
            let moved = !vec3_approx_eq(live.position, initial.position, POSE_POSITION_EPSILON);
            if rotated || moved {
                pose.insert(
                    control.name().to_string(),
                    BonePose {
                        rotation: live.rotation,
                        position: moved.then_some(live.position),
                    },
                );
            }
        }
        pose
    }

    /// Write a pose into a bone's local transform. Returns false for unknown bones.
    ///
    /// World matrices are not refreshed; call [`Self::update_skeleton`] after a batch.
    pub fn apply_bone_pose(&self, graph: &mut SceneGraph, name: &str, pose: &BonePose) -> bool {
        let Some(node) = self.skeleton.bone(name) else {
            return false;
        };
        let Some(bone) = graph.node_mut(node) else {
            return false;
        };
        bone.transform.rotation = pose.rotation;
        if let Some(position) = pose.position {
            bone.transform.position = position;
        }
        true
    }

    /// Put every bone back to the initial pose
    pub fn reset_pose(&self, graph: &mut SceneGraph) {
        for (name, transform) in &self.initial_pose {
            if let Some(node) = self.skeleton.bone(name) {
                let _ = graph.set_transform(node, *transform);
            }
        }
        self.refresh_bone_controls(graph);
    }

    /// Refresh bone world matrices, run the skeleton update, then move the
    /// overlay markers onto the bones
    pub fn update_skeleton(&mut self, graph: &mut SceneGraph) {
        for node in self.skeleton.bone_nodes().collect::<Vec<_>>() {
            graph.update_world_matrix(node);
        }
        self.skeleton.update(graph);
        self.refresh_bone_controls(graph);
    }

    /// Move every overlay marker onto its bone
    pub fn refresh_bone_controls(&self, graph: &mut SceneGraph) {
        for control in self.bone_controls.values() {
            control.sync_overlay(graph);
        }
    }

    /// Serializable description including the current sparse pose
    pub fn to_spec(&self, graph: &SceneGraph) -> CharacterSpec {
        CharacterSpec {
            source: self.source.clone(),
            bones: self.bone_specs.clone(),
            pose: self.sparse_pose(graph),
        }
    }

    /// Drop skeleton and controls. Nodes are removed with the character subtree.
    pub fn release(&mut self) {
        self.bone_controls.clear();
        self.skeleton = Skeleton::default();
        self.initial_pose.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::quat_from_axis_angle;

    fn arm_spec() -> CharacterSpec {
        CharacterSpec {
            source: "rig.glb".to_string(),
            bones: vec![
                BoneSpec::new("hips", None, [0.0, 1.0, 0.0]),
                BoneSpec::new("spine", Some("hips"), [0.0, 0.3, 0.0]),
                BoneSpec::new("arm", Some("spine"), [0.2, 0.2, 0.0]),
            ],
            pose: SparsePose::new(),
        }
    }

    fn spawn(spec: &CharacterSpec) -> (SceneGraph, CharacterData, EntityId) {
        let mut graph = SceneGraph::new();
        let id = EntityId::new();
        let root = graph
            .add_node("character", NodeKind::Entity(id), Transform::default(), NodeId::ROOT)
            .unwrap();
        let data = CharacterData::spawn(&mut graph, id, root, spec).unwrap();
        (graph, data, id)
    }

    #[test]
    fn test_controls_are_bone_siblings() {
        let (graph, data, _) = spawn(&arm_spec());
        for control in data.bone_controls() {
            assert_eq!(graph.parent(control.node()), graph.parent(control.bone()));
            assert!(!graph.is_visible(control.node()));
        }
        assert_eq!(data.skeleton().len(), 3);
    }

    #[test]
    fn test_push_and_pull_rotation() {
        let (mut graph, data, _) = spawn(&arm_spec());
        let control = data.bone_control("arm").unwrap();
        let q = quat_from_axis_angle([0.0, 0.0, 1.0], 0.5);

        graph.node_mut(control.node()).unwrap().transform.rotation = q;
        control.push_to_bone(&mut graph);
        assert_eq!(graph.transform(control.bone()).unwrap().rotation, q);

        graph.node_mut(control.bone()).unwrap().transform.rotation = [0.0, 0.0, 0.0, 1.0];
        control.pull_from_bone(&mut graph);
        assert_eq!(graph.transform(control.node()).unwrap().rotation, [0.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_sparse_pose_only_lists_changed_bones() {
        let (mut graph, data, _) = spawn(&arm_spec());
        assert!(data.sparse_pose(&graph).is_empty());

        let q = quat_from_axis_angle([1.0, 0.0, 0.0], 0.25);
        assert!(data.apply_bone_pose(&mut graph, "spine", &BonePose::rotation(q)));
        let pose = data.sparse_pose(&graph);
        assert_eq!(pose.len(), 1);
        assert_eq!(pose["spine"].rotation, q);
        assert_eq!(pose["spine"].position, None);
    }

    #[test]
    fn test_initial_pose_taken_before_saved_pose() {
        let mut spec = arm_spec();
        let q = quat_from_axis_angle([0.0, 1.0, 0.0], 1.0);
        spec.pose.insert("arm".to_string(), BonePose::rotation(q));

        let (graph, data, _) = spawn(&spec);
        assert_eq!(data.initial_pose()["arm"].rotation, [0.0, 0.0, 0.0, 1.0]);
        // The saved pose survives as a diff against rest
        assert_eq!(data.sparse_pose(&graph).keys().collect::<Vec<_>>(), vec!["arm"]);
        // Overlay follows the posed bone
        let control = data.bone_control("arm").unwrap();
        assert_eq!(graph.transform(control.node()).unwrap().rotation, q);
    }

    #[test]
    fn test_skeleton_update_tracks_world_matrices() {
        let (mut graph, mut data, _) = spawn(&arm_spec());
        assert!(data.skeleton().bone_matrices().iter().all(|m| m.abs_diff_eq(Mat4::IDENTITY, 1e-5)));

        let q = quat_from_axis_angle([0.0, 0.0, 1.0], 0.8);
        data.apply_bone_pose(&mut graph, "hips", &BonePose::rotation(q));
        data.update_skeleton(&mut graph);
        assert!(!data.skeleton().bone_matrices()[2].abs_diff_eq(Mat4::IDENTITY, 1e-5));
    }

    #[test]
    fn test_unknown_bone_is_rejected() {
        let (mut graph, data, _) = spawn(&arm_spec());
        assert!(!data.apply_bone_pose(&mut graph, "tail", &BonePose::rotation([0.0, 0.0, 0.0, 1.0])));
    }
}
