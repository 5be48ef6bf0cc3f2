//! xsdtree workspace session
//!
//! The single entry point presentation layers talk to:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                    WorkspaceController                       │
//! ├──────────────────────────────────────────────────────────────┤
//! │  FragmentDictionary ──► expression tree ──► SchemaModel      │
//! │                                                 │            │
//! │                  SelectionEngine ◄──────────────┤            │
//! │                  (initial pass + overrides)     │            │
//! │                                                 ▼            │
//! │  inspection cursor                       SchemaReducer       │
//! │  (LEAF ids only)                                │            │
//! └─────────────────────────────────────────────────┼────────────┘
//!                                                   ▼
//!                                     final schema JSON (code generation)
//! ```
//!
//! Every operation is synchronous and atomic: it either applies completely
//! or returns an error without changing the workspace.

pub mod config;
pub mod controller;

#[cfg(test)]
mod tests;

pub use config::WorkspaceConfig;
pub use controller::{NodeInspection, WorkspaceController};

use xsdtree_fragments::FragmentError;
use xsdtree_select::SelectError;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Fragments(#[from] FragmentError),
    #[error(transparent)]
    Select(#[from] SelectError),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SessionError {
    pub fn is_node_not_found(&self) -> bool {
        matches!(self, SessionError::Select(err) if err.is_node_not_found())
    }
}

pub type Result<T> = std::result::Result<T, SessionError>;
