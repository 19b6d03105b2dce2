// SPDX-License-Identifier: MIT OR Apache-2.0
//! Minimal scene graph host.
//!
//! Nodes live in an arena keyed by [`NodeId`]. The graph owns parent/child
//! placement, local transforms, visibility and cached world matrices. Any
//! attach that would make a node its own ancestor is rejected.

use crate::entity::EntityId;
use crate::math::Transform;
use glam::Mat4;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Unique identifier for a scene graph node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub Uuid);

impl NodeId {
    /// Create a new random node ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// The fixed ID of the scene root
    pub const ROOT: NodeId = NodeId(Uuid::nil());
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<EntityId> for NodeId {
    fn from(id: EntityId) -> Self {
        Self(id.0)
    }
}

/// What a node represents
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    /// The scene root
    Root,
    /// Node carrying an entity's transform
    Entity(EntityId),
    /// Skeleton bone
    Bone,
    /// Visual marker of a bone control
    BoneControl {
        /// Owning character
        character: EntityId,
        /// Bone name
        bone: String,
    },
    /// Renderable mesh
    Mesh,
    /// Plain grouping node
    Group,
}

/// Graph errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GraphError {
    /// No node with this ID
    #[error("Unknown node: {0:?}")]
    UnknownNode(NodeId),

    /// Attaching would create a cycle
    #[error("Cannot attach {child:?} under its own descendant {parent:?}")]
    Cycle {
        /// Node being attached
        child: NodeId,
        /// Requested parent
        parent: NodeId,
    },

    /// The root cannot be moved or removed
    #[error("The scene root cannot be reparented or removed")]
    RootImmutable,
}

/// A node in the scene graph
#[derive(Debug, Clone)]
pub struct Node {
    /// Node ID
    pub id: NodeId,
    /// Display name
    pub name: String,
    /// Node kind
    pub kind: NodeKind,
    /// Local transform
    pub transform: Transform,
    /// Visibility flag
    pub visible: bool,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    world: Mat4,
}

impl Node {
    /// Parent node, `None` for the root or detached nodes
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Child nodes in insertion order
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// Cached world matrix
    pub fn world_matrix(&self) -> Mat4 {
        self.world
    }
}

/// Arena-backed scene graph
#[derive(Debug, Clone)]
pub struct SceneGraph {
    nodes: IndexMap<NodeId, Node>,
}

impl SceneGraph {
    /// Create a graph holding only the root
    pub fn new() -> Self {
        let mut nodes = IndexMap::new();
        nodes.insert(
            NodeId::ROOT,
            Node {
                id: NodeId::ROOT,
                name: "Scene".to_string(),
                kind: NodeKind::Root,
                transform: Transform::default(),
                visible: true,
                parent: None,
                children: Vec::new(),
                world: Mat4::IDENTITY,
            },
        );
        Self { nodes }
    }

    /// The scene root
    pub fn root(&self) -> NodeId {
        NodeId::ROOT
    }

    /// Add a node with a fresh ID under `parent`
    pub fn add_node(
        &mut self,
        name: impl Into<String>,
        kind: NodeKind,
        transform: Transform,
        parent: NodeId,
    ) -> Result<NodeId, GraphError> {
        self.add_node_with_id(NodeId::new(), name, kind, transform, parent)
    }

    /// Add a node with a caller-chosen ID under `parent`
    pub fn add_node_with_id(
        &mut self,
        id: NodeId,
        name: impl Into<String>,
        kind: NodeKind,
        transform: Transform,
        parent: NodeId,
    ) -> Result<NodeId, GraphError> {
        if !self.nodes.contains_key(&parent) {
            return Err(GraphError::UnknownNode(parent));
        }
        if id == NodeId::ROOT {
            return Err(GraphError::RootImmutable);
        }
        // Re-adding an existing ID replaces its data but keeps placement rules.
        if self.nodes.contains_key(&id) {
            self.remove_subtree(id)?;
        }
        self.nodes.insert(
            id,
            Node {
                id,
                name: name.into(),
                kind,
                transform,
                visible: true,
                parent: None,
                children: Vec::new(),
                world: Mat4::IDENTITY,
            },
        );
        self.link(id, parent);
        self.update_world_matrix(id);
        Ok(id)
    }

    /// Whether the node exists
    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    /// Get a node
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    /// Get a node mutably
    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(&id)
    }

    /// Number of nodes including the root
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether only the root exists
    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    /// Parent of a node
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(&id).and_then(|n| n.parent)
    }

    /// Children of a node (empty for unknown nodes)
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.nodes.get(&id).map(|n| n.children.as_slice()).unwrap_or(&[])
    }

    /// Whether `ancestor` appears on the parent chain of `node`
    pub fn is_ancestor(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = self.parent(node);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.parent(id);
        }
        false
    }

    /// Parent chain of a node, nearest first
    pub fn ancestors(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut current = self.parent(id);
        while let Some(parent) = current {
            out.push(parent);
            current = self.parent(parent);
        }
        out
    }

    /// All descendants in depth-first pre-order, excluding `id` itself
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(id).iter().rev().copied().collect();
        while let Some(next) = stack.pop() {
            out.push(next);
            stack.extend(self.children(next).iter().rev().copied());
        }
        out
    }

    /// Move `child` under `parent`, keeping its local transform.
    ///
    /// Rejects attaching a node under itself or under any of its descendants.
    pub fn attach(&mut self, child: NodeId, parent: NodeId) -> Result<(), GraphError> {
        if child == NodeId::ROOT {
            return Err(GraphError::RootImmutable);
        }
        if !self.nodes.contains_key(&child) {
            return Err(GraphError::UnknownNode(child));
        }
        if !self.nodes.contains_key(&parent) {
            return Err(GraphError::UnknownNode(parent));
        }
        if child == parent || self.is_ancestor(child, parent) {
            return Err(GraphError::Cycle { child, parent });
        }

        self.unlink(child);
        self.link(child, parent);
        self.update_world_matrix(child);
        Ok(())
    }

    /// Detach a node from its parent. The node stays in the arena but is no
    /// longer reachable from the root.
    pub fn detach(&mut self, id: NodeId) -> Result<(), GraphError> {
        if id == NodeId::ROOT {
            return Err(GraphError::RootImmutable);
        }
        if !self.nodes.contains_key(&id) {
            return Err(GraphError::UnknownNode(id));
        }
        self.unlink(id);
        Ok(())
    }

    /// Remove a node and all its descendants. Returns the removed IDs.
    pub fn remove_subtree(&mut self, id: NodeId) -> Result<Vec<NodeId>, GraphError> {
        if id == NodeId::ROOT {
            return Err(GraphError::RootImmutable);
        }
        if !self.nodes.contains_key(&id) {
            return Err(GraphError::UnknownNode(id));
        }
        self.unlink(id);
        let mut removed = vec![id];
        removed.extend(self.descendants(id));
        for node in &removed {
            self.nodes.shift_remove(node);
        }
        Ok(removed)
    }

    /// Local transform of a node
    pub fn transform(&self, id: NodeId) -> Option<Transform> {
        self.nodes.get(&id).map(|n| n.transform)
    }

    /// Replace the local transform and refresh world matrices below it
    pub fn set_transform(&mut self, id: NodeId, transform: Transform) -> Result<(), GraphError> {
        let node = self.nodes.get_mut(&id).ok_or(GraphError::UnknownNode(id))?;
        node.transform = transform;
        self.update_world_matrix(id);
        Ok(())
    }

    /// Visibility flag of a node
    pub fn is_visible(&self, id: NodeId) -> bool {
        self.nodes.get(&id).is_some_and(|n| n.visible)
    }

    /// Set the visibility flag of a single node
    pub fn set_visible(&mut self, id: NodeId, visible: bool) -> Result<(), GraphError> {
        let node = self.nodes.get_mut(&id).ok_or(GraphError::UnknownNode(id))?;
        node.visible = visible;
        Ok(())
    }

    /// Recompute the world matrix of `id` and all of its descendants
    pub fn update_world_matrix(&mut self, id: NodeId) {
        let parent_world = self
            .parent(id)
            .and_then(|p| self.nodes.get(&p))
            .map_or(Mat4::IDENTITY, |p| p.world);

        let mut stack = vec![(id, parent_world)];
        while let Some((current, parent_world)) = stack.pop() {
            let Some(node) = self.nodes.get_mut(&current) else {
                continue;
            };
            node.world = parent_world * node.transform.to_matrix();
            let world = node.world;
            stack.extend(node.children.iter().map(|child| (*child, world)));
        }
    }

    /// Cached world matrix of a node
    pub fn world_matrix(&self, id: NodeId) -> Option<Mat4> {
        self.nodes.get(&id).map(|n| n.world)
    }

    /// World-space position of a node
    pub fn world_position(&self, id: NodeId) -> Option<[f32; 3]> {
        self.world_matrix(id).map(|m| m.w_axis.truncate().to_array())
    }

    fn link(&mut self, child: NodeId, parent: NodeId) {
        if let Some(p) = self.nodes.get_mut(&parent) {
            p.children.push(child);
        }
        if let Some(c) = self.nodes.get_mut(&child) {
            c.parent = Some(parent);
        }
    }

    fn unlink(&mut self, child: NodeId) {
        let old_parent = self.nodes.get_mut(&child).and_then(|c| c.parent.take());
        if let Some(parent) = old_parent.and_then(|p| self.nodes.get_mut(&p)) {
            parent.children.retain(|id| *id != child);
        }
    }
}

impl Default for SceneGraph {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn group(graph: &mut SceneGraph, name: &str, parent: NodeId) -> NodeId {
        graph
            .add_node(name, NodeKind::Group, Transform::default(), parent)
            .unwrap()
    }

    #[test]
    fn test_attach_rejects_cycles() {
        let mut graph = SceneGraph::new();
        let root = graph.root();
        let a = group(&mut graph, "a", root);
        let b = group(&mut graph, "b", a);
        let c = group(&mut graph, "c", b);

        assert_eq!(graph.attach(a, c), Err(GraphError::Cycle { child: a, parent: c }));
        assert_eq!(graph.attach(a, a), Err(GraphError::Cycle { child: a, parent: a }));
        assert_eq!(graph.attach(NodeId::ROOT, a), Err(GraphError::RootImmutable));

        // Hierarchy untouched after a rejected attach
        assert_eq!(graph.parent(a), Some(NodeId::ROOT));
        assert_eq!(graph.parent(c), Some(b));
    }

    #[test]
    fn test_attach_moves_child() {
        let mut graph = SceneGraph::new();
        let root = graph.root();
        let a = group(&mut graph, "a", root);
        let b = group(&mut graph, "b", root);
        let c = group(&mut graph, "c", a);

        graph.attach(c, b).unwrap();
        assert!(graph.children(a).is_empty());
        assert_eq!(graph.children(b), &[c]);
        assert!(graph.is_ancestor(b, c));
    }

    #[test]
    fn test_world_matrix_propagation() {
        let mut graph = SceneGraph::new();
        let parent = graph
            .add_node("p", NodeKind::Group, Transform::from_position([1.0, 0.0, 0.0]), NodeId::ROOT)
            .unwrap();
        let child = graph
            .add_node("c", NodeKind::Group, Transform::from_position([0.0, 2.0, 0.0]), parent)
            .unwrap();
        assert_eq!(graph.world_position(child), Some([1.0, 2.0, 0.0]));

        graph
            .set_transform(parent, Transform::from_position([5.0, 0.0, 0.0]))
            .unwrap();
        assert_eq!(graph.world_position(child), Some([5.0, 2.0, 0.0]));
    }

    #[test]
    fn test_remove_subtree() {
        let mut graph = SceneGraph::new();
        let root = graph.root();
        let a = group(&mut graph, "a", root);
        let b = group(&mut graph, "b", a);
        group(&mut graph, "c", b);

        let removed = graph.remove_subtree(a).unwrap();
        assert_eq!(removed.len(), 3);
        assert!(graph.is_empty());
        assert!(graph.children(NodeId::ROOT).is_empty());
    }

    #[test]
    fn test_descendants_preorder() {
        let mut graph = SceneGraph::new();
        let root = graph.root();
        let a = group(&mut graph, "a", root);
        let b = group(&mut graph, "b", a);
        let c = group(&mut graph, "c", a);
        let d = group(&mut graph, "d", b);
        assert_eq!(graph.descendants(a), vec![b, d, c]);
        assert_eq!(graph.ancestors(d), vec![b, a, NodeId::ROOT]);
    }
}
