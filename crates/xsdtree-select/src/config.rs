use serde::{Deserialize, Serialize};
use xsdtree_fragments::TieBreak;

/// Attributes at or above this probability are kept by automatic selection.
pub const DEFAULT_ATTRIBUTE_THRESHOLD: f64 = 0.55;

/// Tunables for automatic resolution.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionConfig {
    /// Minimum attribute probability (inclusive).
    pub attribute_threshold: f64,
    /// Winner among equally probable OR children and XSD types.
    pub tie_break: TieBreak,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            attribute_threshold: DEFAULT_ATTRIBUTE_THRESHOLD,
            tie_break: TieBreak::FirstSeen,
        }
    }
}

impl SelectionConfig {
    pub fn with_threshold(mut self, attribute_threshold: f64) -> Self {
        self.attribute_threshold = attribute_threshold;
        self
    }
}
