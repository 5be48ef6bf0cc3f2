//! The schema model: an identity-addressed tree of schema nodes.
//!
//! Built once from an expression tree. Afterwards the structure is frozen;
//! only payload fields (selection flags, chosen attributes and type, name)
//! change, and only through the methods below or the selection engine.

use crate::SelectError;
use serde::{Deserialize, Serialize};
use xsdtree_fragments::{last_segment, ExpressionNode, FragmentDictionary, MaxOccurs, NodeKind};
use xsdtree_graph::{Node, NodeData, NodeGraph, NodeId, SubscriptionId, Tree};

/// Value type of a LEAF before any resolution.
pub const DEFAULT_TYPE: &str = "string";

/// `chosen_type` of AND/OR nodes, which carry no value.
pub const PARENT_TYPE: &str = "PARENT";

/// Display name for a node value: the last path segment without its
/// `-c`/`-s` suffix.
pub fn display_name(value: &str) -> String {
    let tag = last_segment(value);
    tag.strip_suffix("-c")
        .or_else(|| tag.strip_suffix("-s"))
        .unwrap_or(tag)
        .to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaNode {
    #[serde(rename = "type")]
    pub kind: NodeKind,
    pub probability: f64,
    pub min_occurs: u32,
    pub max_occurs: MaxOccurs,
    /// Composite dictionary key for resolved leaves, a label otherwise.
    pub value: String,
    pub name: String,
    pub chosen: bool,
    pub chosen_attributes: Vec<String>,
    pub chosen_type: String,
}

impl SchemaNode {
    fn from_expression(expression: &ExpressionNode) -> Self {
        let chosen_type = if expression.kind.is_leaf() {
            DEFAULT_TYPE
        } else {
            PARENT_TYPE
        };
        Self {
            kind: expression.kind,
            probability: expression.probability,
            min_occurs: expression.min_occurs,
            max_occurs: expression.max_occurs,
            value: expression.value.clone(),
            name: display_name(&expression.value),
            chosen: false,
            chosen_attributes: Vec::new(),
            chosen_type: chosen_type.to_string(),
        }
    }
}

/// Partial update of a schema node. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SchemaNodePatch {
    pub chosen: Option<bool>,
    pub chosen_attributes: Option<Vec<String>>,
    pub chosen_type: Option<String>,
    pub name: Option<String>,
}

impl SchemaNodePatch {
    pub fn chosen(chosen: bool) -> Self {
        Self {
            chosen: Some(chosen),
            ..Default::default()
        }
    }

    /// Fold a later patch into this one; the later value wins per field.
    pub fn merge(&mut self, later: SchemaNodePatch) {
        if later.chosen.is_some() {
            self.chosen = later.chosen;
        }
        if later.chosen_attributes.is_some() {
            self.chosen_attributes = later.chosen_attributes;
        }
        if later.chosen_type.is_some() {
            self.chosen_type = later.chosen_type;
        }
        if later.name.is_some() {
            self.name = later.name;
        }
    }
}

fn assign<T: PartialEq>(slot: &mut T, value: Option<T>) -> bool {
    match value {
        Some(value) if *slot != value => {
            *slot = value;
            true
        }
        _ => false,
    }
}

impl NodeData for SchemaNode {
    type Patch = SchemaNodePatch;

    fn apply_patch(&mut self, patch: SchemaNodePatch) -> bool {
        let mut changed = assign(&mut self.chosen, patch.chosen);
        changed |= assign(&mut self.chosen_attributes, patch.chosen_attributes);
        changed |= assign(&mut self.chosen_type, patch.chosen_type);
        changed |= assign(&mut self.name, patch.name);
        changed
    }
}

// ============================================================================
// Model
// ============================================================================

#[derive(Debug)]
pub struct SchemaModel {
    graph: NodeGraph<SchemaNode>,
}

impl SchemaModel {
    /// Materialize an expression tree.
    ///
    /// Every expression node becomes one schema node, in the same sibling
    /// order, except an AND directly under a LEAF: it is dropped and its
    /// children attach to that LEAF. All nodes start unchosen.
    pub fn build(expression: &ExpressionNode) -> Result<Self, SelectError> {
        let mut graph = NodeGraph::new();
        let root = graph.create_root(SchemaNode::from_expression(expression))?;

        let mut elided = 0usize;
        let mut stack: Vec<(&ExpressionNode, NodeId)> =
            expression.children.iter().rev().map(|child| (child, root)).collect();
        while let Some((expr, parent)) = stack.pop() {
            let parent_is_leaf = graph.get(parent)?.data().kind.is_leaf();
            let attach_to = if expr.kind == NodeKind::And && parent_is_leaf {
                elided += 1;
                parent
            } else {
                graph.add_child(parent, SchemaNode::from_expression(expr))?
            };
            stack.extend(expr.children.iter().rev().map(|child| (child, attach_to)));
        }

        tracing::debug!(nodes = graph.len(), elided, "schema model built");
        Ok(Self { graph })
    }

    pub fn graph(&self) -> &NodeGraph<SchemaNode> {
        &self.graph
    }

    pub fn root_id(&self) -> NodeId {
        NodeId::ROOT
    }

    pub fn len(&self) -> usize {
        self.graph.len()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.is_empty()
    }

    pub fn node(&self, id: NodeId) -> Result<&Node<SchemaNode>, SelectError> {
        Ok(self.graph.get(id)?)
    }

    pub fn data(&self, id: NodeId) -> Result<&SchemaNode, SelectError> {
        self.node(id).map(Node::data)
    }

    pub fn parent(&self, id: NodeId) -> Result<Option<&Node<SchemaNode>>, SelectError> {
        Ok(self.graph.get_parent(id)?)
    }

    pub fn children(&self, id: NodeId) -> Result<&[NodeId], SelectError> {
        Ok(self.graph.children(id)?)
    }

    pub fn chosen_ids(&self) -> Vec<NodeId> {
        self.graph
            .iter()
            .filter(|node| node.data().chosen)
            .map(Node::id)
            .collect()
    }

    pub fn chosen_count(&self) -> usize {
        self.graph.iter().filter(|node| node.data().chosen).count()
    }

    pub fn chosen_leaf_count(&self) -> usize {
        self.graph
            .iter()
            .filter(|node| node.data().chosen && node.data().kind.is_leaf())
            .count()
    }

    /// Plain nested copy for presentation layers.
    pub fn serialize(&self) -> Option<Tree<SchemaNode>> {
        self.graph.serialize()
    }

    pub fn subscribe(
        &mut self,
        id: NodeId,
        listener: impl FnMut(NodeId, &SchemaNode) + 'static,
    ) -> Result<SubscriptionId, SelectError> {
        Ok(self.graph.subscribe(id, listener)?)
    }

    pub fn unsubscribe(&mut self, subscription: SubscriptionId) -> bool {
        self.graph.unsubscribe(subscription)
    }

    pub(crate) fn update(&mut self, id: NodeId, patch: SchemaNodePatch) -> Result<bool, SelectError> {
        Ok(self.graph.update(id, patch)?)
    }

    // ========================================================================
    // Manual edits
    // ========================================================================

    pub fn rename(&mut self, id: NodeId, name: impl Into<String>) -> Result<bool, SelectError> {
        self.update(
            id,
            SchemaNodePatch {
                name: Some(name.into()),
                ..Default::default()
            },
        )
    }

    fn leaf(&self, id: NodeId) -> Result<&SchemaNode, SelectError> {
        let data = self.data(id)?;
        if !data.kind.is_leaf() {
            return Err(SelectError::NotALeaf(id));
        }
        Ok(data)
    }

    /// Set a LEAF's value type to one of the types its fragment proposes.
    pub fn choose_type(
        &mut self,
        dictionary: &FragmentDictionary,
        id: NodeId,
        type_name: &str,
    ) -> Result<bool, SelectError> {
        let data = self.leaf(id)?;
        let known = dictionary
            .get(&data.value)
            .is_some_and(|entry| entry.types.contains_key(type_name));
        if !known {
            return Err(SelectError::UnknownType {
                node: id,
                type_name: type_name.to_string(),
            });
        }
        self.update(
            id,
            SchemaNodePatch {
                chosen_type: Some(type_name.to_string()),
                ..Default::default()
            },
        )
    }

    /// Add or remove one attribute of a LEAF. Returns whether the attribute
    /// is kept afterwards.
    pub fn toggle_attribute(
        &mut self,
        dictionary: &FragmentDictionary,
        id: NodeId,
        attribute: &str,
    ) -> Result<bool, SelectError> {
        let data = self.leaf(id)?;
        let entry = dictionary.get(&data.value);
        let Some(position) = entry.and_then(|e| e.attributes.get_index_of(attribute)) else {
            return Err(SelectError::UnknownAttribute {
                node: id,
                attribute: attribute.to_string(),
            });
        };

        let kept = !data.chosen_attributes.iter().any(|a| a == attribute);
        let mut attributes: Vec<String> = data
            .chosen_attributes
            .iter()
            .filter(|a| a.as_str() != attribute)
            .cloned()
            .collect();
        if kept {
            // keep dictionary order among the chosen names
            let attributes_in_entry = entry.map(|e| &e.attributes);
            let insert_at = attributes
                .iter()
                .position(|a| {
                    attributes_in_entry
                        .and_then(|attrs| attrs.get_index_of(a.as_str()))
                        .is_some_and(|index| index > position)
                })
                .unwrap_or(attributes.len());
            attributes.insert(insert_at, attribute.to_string());
        }

        self.update(
            id,
            SchemaNodePatch {
                chosen_attributes: Some(attributes),
                ..Default::default()
            },
        )?;
        Ok(kept)
    }
}
