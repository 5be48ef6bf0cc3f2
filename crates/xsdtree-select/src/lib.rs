//! Schema selection
//!
//! Turns an expression tree into an editable, identity-addressed
//! [`SchemaModel`], resolves its OR alternatives by probability
//! ([`SelectionEngine`]), and reduces the chosen subset into a LEAF-only
//! [`FinalSchema`] for code generation ([`SchemaReducer`]).
//!
//! ```text
//!   FragmentDictionary ──build_expression_tree──► ExpressionNode
//!                                                      │
//!                                              SchemaModel::build
//!                                                      ▼
//!        SelectionEngine ◄──── flag changes ────► SchemaModel
//!                                                      │
//!                                          SchemaReducer::reduce
//!                                                      ▼
//!                                                FinalSchema
//! ```
//!
//! Invariants kept by every operation here:
//! - a chosen node's parent is chosen (the root is chosen once resolved),
//! - a chosen OR has at most one chosen child,
//! - a chosen AND has all or none of its children chosen,
//! - `chosen_attributes` of a LEAF only names attributes from its fragment.

pub mod config;
pub mod engine;
pub mod model;
pub mod reduce;

pub use config::{SelectionConfig, DEFAULT_ATTRIBUTE_THRESHOLD};
pub use engine::{SelectionEngine, SelectionOutcome};
pub use model::{display_name, SchemaModel, SchemaNode, SchemaNodePatch, DEFAULT_TYPE, PARENT_TYPE};
pub use reduce::{FinalSchema, FinalSchemaNode, SchemaReducer};

use xsdtree_graph::{GraphError, NodeId};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SelectError {
    #[error(transparent)]
    Graph(#[from] GraphError),
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),
    #[error("Missing dictionary entry: {0}")]
    MissingDictionaryEntry(String),
    #[error("Node {0} is not a LEAF")]
    NotALeaf(NodeId),
    #[error("Unknown type `{type_name}` for node {node}")]
    UnknownType { node: NodeId, type_name: String },
    #[error("Unknown attribute `{attribute}` for node {node}")]
    UnknownAttribute { node: NodeId, attribute: String },
}

impl SelectError {
    pub fn is_node_not_found(&self) -> bool {
        matches!(self, SelectError::Graph(GraphError::NodeNotFound(_)))
    }
}
