//! Identity-addressed tree arena
//!
//! `NodeGraph<T>` owns every node of a tree and is the only place identities
//! are allocated. Identities are sequential `u32`s, never reused, and a node
//! can never be detached or reparented: the tree only grows, and existing
//! nodes are changed through [`NodeGraph::update`] only.
//!
//! Because a child is always created after its parent, a child's identity is
//! strictly larger than its parent's. Several traversals below rely on that.
//!
//! Observation is a separately-owned registry keyed by node identity (see
//! [`observe`]), so nodes never hold references to their listeners.

pub mod observe;
pub mod tree;

pub use observe::{Listener, SubscriptionId};
pub use tree::Tree;

use observe::ObserverRegistry;
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Identities
// ============================================================================

/// Identity of a node inside one `NodeGraph`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(u32);

impl NodeId {
    /// The root is always the first node allocated.
    pub const ROOT: NodeId = NodeId(0);

    pub fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> u32 {
        self.0
    }

    fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// ============================================================================
// Nodes
// ============================================================================

#[derive(Debug, Clone)]
pub struct Node<T> {
    id: NodeId,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    data: T,
}

impl<T> Node<T> {
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// `None` only for the root.
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Children in insertion (display) order.
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn data(&self) -> &T {
        &self.data
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }
}

/// Node payloads that accept partial updates.
///
/// The patch type only reaches the payload, never the child list, so callers
/// cannot restructure the tree through `update`.
pub trait NodeData {
    type Patch;

    /// Merge `patch` into `self`. Returns `true` when any field changed.
    fn apply_patch(&mut self, patch: Self::Patch) -> bool;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphError {
    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),
    #[error("Graph already has a root")]
    RootAlreadyExists,
    #[error("Node identity space exhausted")]
    CapacityExceeded,
}

// ============================================================================
// Graph
// ============================================================================

pub struct NodeGraph<T> {
    /// Indexed by identity; position `i` holds the node with id `i`.
    nodes: Vec<Node<T>>,
    observers: ObserverRegistry<T>,
}

impl<T> Default for NodeGraph<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: fmt::Debug> fmt::Debug for NodeGraph<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeGraph")
            .field("nodes", &self.nodes)
            .field("subscriptions", &self.observers.len())
            .finish()
    }
}

impl<T> NodeGraph<T> {
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            observers: ObserverRegistry::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn root_id(&self) -> Option<NodeId> {
        self.root().map(Node::id)
    }

    pub fn root(&self) -> Option<&Node<T>> {
        self.nodes.first()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        id.index() < self.nodes.len()
    }

    fn next_id(&self) -> Result<NodeId, GraphError> {
        u32::try_from(self.nodes.len())
            .map(NodeId)
            .map_err(|_| GraphError::CapacityExceeded)
    }

    /// Allocate the root (identity 0).
    pub fn create_root(&mut self, data: T) -> Result<NodeId, GraphError> {
        if !self.nodes.is_empty() {
            return Err(GraphError::RootAlreadyExists);
        }
        self.nodes.push(Node {
            id: NodeId::ROOT,
            parent: None,
            children: Vec::new(),
            data,
        });
        Ok(NodeId::ROOT)
    }

    pub fn get(&self, id: NodeId) -> Result<&Node<T>, GraphError> {
        self.nodes.get(id.index()).ok_or(GraphError::NodeNotFound(id))
    }

    pub fn get_parent(&self, id: NodeId) -> Result<Option<&Node<T>>, GraphError> {
        match self.get(id)?.parent {
            Some(parent) => self.get(parent).map(Some),
            None => Ok(None),
        }
    }

    pub fn children(&self, id: NodeId) -> Result<&[NodeId], GraphError> {
        self.get(id).map(Node::children)
    }

    /// Append a new node under `parent`, after any existing children.
    pub fn add_child(&mut self, parent: NodeId, data: T) -> Result<NodeId, GraphError> {
        if !self.contains(parent) {
            return Err(GraphError::NodeNotFound(parent));
        }
        let id = self.next_id()?;
        self.nodes.push(Node {
            id,
            parent: Some(parent),
            children: Vec::new(),
            data,
        });
        self.nodes[parent.index()].children.push(id);
        Ok(id)
    }

    /// Nodes in identity order.
    pub fn iter(&self) -> impl Iterator<Item = &Node<T>> {
        self.nodes.iter()
    }

    /// `id` followed by all of its descendants, pre-order, left to right.
    pub fn descendants(&self, id: NodeId) -> Result<Vec<NodeId>, GraphError> {
        self.get(id)?;
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            out.push(current);
            stack.extend(self.nodes[current.index()].children.iter().rev().copied());
        }
        Ok(out)
    }

    /// Parent chain of `id`, nearest first, ending at the root.
    pub fn ancestors(&self, id: NodeId) -> Result<Vec<NodeId>, GraphError> {
        let mut out = Vec::new();
        let mut current = self.get(id)?.parent;
        while let Some(parent) = current {
            out.push(parent);
            current = self.get(parent)?.parent;
        }
        Ok(out)
    }

    pub fn subscribe(
        &mut self,
        id: NodeId,
        listener: impl FnMut(NodeId, &T) + 'static,
    ) -> Result<SubscriptionId, GraphError> {
        self.get(id)?;
        Ok(self.observers.subscribe(id, Box::new(listener)))
    }

    pub fn unsubscribe(&mut self, subscription: SubscriptionId) -> bool {
        self.observers.unsubscribe(subscription)
    }

    /// Plain nested copy of the tree, without identities or parent links.
    pub fn serialize(&self) -> Option<Tree<T>>
    where
        T: Clone,
    {
        self.serialize_with(T::clone)
    }

    /// Like [`serialize`](Self::serialize), projecting every payload first.
    ///
    /// Built bottom-up over descending identities, so no recursion is needed
    /// however deep the tree is.
    pub fn serialize_with<U>(&self, mut project: impl FnMut(&T) -> U) -> Option<Tree<U>> {
        if self.nodes.is_empty() {
            return None;
        }
        let mut built: Vec<Option<Tree<U>>> = Vec::with_capacity(self.nodes.len());
        built.resize_with(self.nodes.len(), || None);

        for node in self.nodes.iter().rev() {
            let children = node
                .children
                .iter()
                .filter_map(|child| built[child.index()].take())
                .collect();
            built[node.id.index()] = Some(Tree {
                data: project(&node.data),
                children,
            });
        }
        built.into_iter().next().flatten()
    }
}

impl<T: NodeData> NodeGraph<T> {
    /// Merge a partial update into one node's payload.
    ///
    /// Observers of `id` are notified after the payload is fully updated, and
    /// only if something actually changed. Returns whether it did.
    pub fn update(&mut self, id: NodeId, patch: T::Patch) -> Result<bool, GraphError> {
        let node = self
            .nodes
            .get_mut(id.index())
            .ok_or(GraphError::NodeNotFound(id))?;
        let changed = node.data.apply_patch(patch);
        if changed {
            tracing::trace!(node = %id, "node updated");
            self.observers.notify(id, &node.data);
        }
        Ok(changed)
    }
}
