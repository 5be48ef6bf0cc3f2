//! Workspace configuration.

use crate::{Result, SessionError};
use serde::{Deserialize, Serialize};
use std::path::Path;
use xsdtree_select::SelectionConfig;

/// Configuration for one workspace session.
///
/// Every field has a default, so a config file only needs the values it
/// overrides:
///
/// ```json
/// { "selection": { "attribute_threshold": 0.6 } }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkspaceConfig {
    pub selection: SelectionConfig,
}

impl WorkspaceConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        Self::from_json(&contents)
    }

    pub fn validate(&self) -> Result<()> {
        let threshold = self.selection.attribute_threshold;
        if !(0.0..=1.0).contains(&threshold) {
            return Err(SessionError::Config(format!(
                "attribute_threshold must be within [0, 1], got {threshold}"
            )));
        }
        Ok(())
    }
}
