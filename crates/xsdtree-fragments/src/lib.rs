//! Fragment dictionaries
//!
//! The recognizer upstream produces a flat dictionary: one entry per
//! recognized tag-path key such as `order-c/item-c` or `item-c/price-s`.
//! Each entry carries the tag's local expansion (an AND/OR/LEAF expression)
//! plus candidate probability tables for renames, semantic aliases,
//! attributes and XSD value types.
//!
//! This crate owns the input boundary:
//! - serde types for the dictionary (`FragmentDictionary`, `FragmentEntry`,
//!   `ExpressionNode`),
//! - [`build_expression_tree`], which stitches the flat dictionary into one
//!   rooted expression tree,
//! - [`most_probable`], the shared arg-max with a configurable tie-break.

pub mod builder;
pub mod probability;

pub use builder::build_expression_tree;
pub use probability::{most_probable, TieBreak};

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Prefix of the one key that holds the root fragment.
pub const ROOT_PREFIX: &str = "begin-c/";

/// Separator between the parent tag and the tag in a composite key.
pub const KEY_SEPARATOR: char = '/';

/// Candidate name → probability, in the order the recognizer emitted them.
pub type ProbabilityMap = IndexMap<String, f64>;

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FragmentError {
    #[error("Invalid schema data: {0}")]
    InvalidSchemaData(String),
    #[error("Duplicate root data: {count} keys start with `begin-c/`: {keys:?}")]
    DuplicateRootData { count: usize, keys: Vec<String> },
}

// ============================================================================
// Expressions
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum NodeKind {
    Leaf,
    And,
    Or,
}

impl NodeKind {
    pub fn is_leaf(self) -> bool {
        matches!(self, NodeKind::Leaf)
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            NodeKind::Leaf => "LEAF",
            NodeKind::And => "AND",
            NodeKind::Or => "OR",
        })
    }
}

/// Upper occurrence bound; `"unbounded"` on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawOccurs", into = "RawOccurs")]
pub enum MaxOccurs {
    Bounded(u32),
    Unbounded,
}

impl Default for MaxOccurs {
    fn default() -> Self {
        MaxOccurs::Bounded(1)
    }
}

impl fmt::Display for MaxOccurs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MaxOccurs::Bounded(n) => write!(f, "{n}"),
            MaxOccurs::Unbounded => f.write_str("unbounded"),
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum RawOccurs {
    Count(u32),
    Text(String),
}

impl TryFrom<RawOccurs> for MaxOccurs {
    type Error = String;

    fn try_from(raw: RawOccurs) -> Result<Self, Self::Error> {
        match raw {
            RawOccurs::Count(n) => Ok(MaxOccurs::Bounded(n)),
            RawOccurs::Text(text) if text.eq_ignore_ascii_case("unbounded") => {
                Ok(MaxOccurs::Unbounded)
            }
            RawOccurs::Text(text) => text
                .trim()
                .parse()
                .map(MaxOccurs::Bounded)
                .map_err(|_| format!("invalid maxOccurs `{text}`")),
        }
    }
}

impl From<MaxOccurs> for RawOccurs {
    fn from(occurs: MaxOccurs) -> Self {
        match occurs {
            MaxOccurs::Bounded(n) => RawOccurs::Count(n),
            MaxOccurs::Unbounded => RawOccurs::Text("unbounded".to_string()),
        }
    }
}

fn default_probability() -> f64 {
    1.0
}

fn default_min_occurs() -> u32 {
    1
}

/// One node of a fragment's expression.
///
/// For LEAF nodes `value` is a tag name in the raw dictionary; after
/// [`build_expression_tree`] it is the composite key of the fragment the
/// leaf resolved to. AND/OR values are synthetic labels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpressionNode {
    #[serde(rename = "type")]
    pub kind: NodeKind,
    #[serde(default = "default_probability")]
    pub probability: f64,
    #[serde(default = "default_min_occurs")]
    pub min_occurs: u32,
    #[serde(default)]
    pub max_occurs: MaxOccurs,
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub children: Vec<ExpressionNode>,
}

impl ExpressionNode {
    fn new(kind: NodeKind, value: impl Into<String>, probability: f64) -> Self {
        Self {
            kind,
            probability,
            min_occurs: 1,
            max_occurs: MaxOccurs::default(),
            value: value.into(),
            children: Vec::new(),
        }
    }

    pub fn leaf(value: impl Into<String>, probability: f64) -> Self {
        Self::new(NodeKind::Leaf, value, probability)
    }

    pub fn and(children: Vec<ExpressionNode>) -> Self {
        let mut node = Self::new(NodeKind::And, "AND", 1.0);
        node.children = children;
        node
    }

    pub fn or(children: Vec<ExpressionNode>) -> Self {
        let mut node = Self::new(NodeKind::Or, "OR", 1.0);
        node.children = children;
        node
    }

    pub fn with_probability(mut self, probability: f64) -> Self {
        self.probability = probability;
        self
    }

    pub fn with_occurs(mut self, min: u32, max: MaxOccurs) -> Self {
        self.min_occurs = min;
        self.max_occurs = max;
        self
    }

    /// Number of nodes in this subtree.
    pub fn size(&self) -> usize {
        let mut count = 0;
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            count += 1;
            stack.extend(node.children.iter());
        }
        count
    }
}

impl Drop for ExpressionNode {
    // spliced fragments nest arbitrarily deep, so no recursion here
    fn drop(&mut self) {
        let mut pending = std::mem::take(&mut self.children);
        while let Some(mut node) = pending.pop() {
            pending.append(&mut node.children);
        }
    }
}

// ============================================================================
// Dictionary entries
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AttributeCandidate {
    /// Probability that the attribute belongs to the tag at all.
    #[serde(default)]
    pub probability: f64,
    /// XSD type → probability. Recognizer output names it `XSDTypes`.
    #[serde(default, alias = "XSDTypes")]
    pub types: ProbabilityMap,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FragmentEntry {
    /// `None` when the fragment has no expansion (`null` or `{}` on the wire).
    #[serde(
        default,
        deserialize_with = "trivial_expression_as_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub expression: Option<ExpressionNode>,
    #[serde(default)]
    pub typo_space: ProbabilityMap,
    #[serde(default)]
    pub semantic_space: ProbabilityMap,
    #[serde(default)]
    pub attributes: IndexMap<String, AttributeCandidate>,
    #[serde(default, alias = "XSDTypes")]
    pub types: ProbabilityMap,
}

fn trivial_expression_as_none<'de, D>(deserializer: D) -> Result<Option<ExpressionNode>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;
    use serde_json::Value;

    let value = Value::deserialize(deserializer)?;
    match &value {
        Value::Null => Ok(None),
        Value::Object(map) if map.is_empty() => Ok(None),
        _ => serde_json::from_value(value).map(Some).map_err(D::Error::custom),
    }
}

/// Complex (`-c`) or simple (`-s`) fragment, from a key's last segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FragmentKind {
    Complex,
    Simple,
}

impl FragmentKind {
    pub fn of_key(key: &str) -> Option<Self> {
        let tag = last_segment(key);
        if tag.ends_with("-c") {
            Some(FragmentKind::Complex)
        } else if tag.ends_with("-s") {
            Some(FragmentKind::Simple)
        } else {
            None
        }
    }
}

/// The part of a composite key after the last separator.
pub fn last_segment(key: &str) -> &str {
    key.rsplit_once(KEY_SEPARATOR).map_or(key, |(_, tag)| tag)
}

// ============================================================================
// Dictionary
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FragmentDictionary {
    entries: IndexMap<String, FragmentEntry>,
}

impl FragmentDictionary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json(json: &str) -> Result<Self, FragmentError> {
        serde_json::from_str(json).map_err(|e| FragmentError::InvalidSchemaData(e.to_string()))
    }

    pub fn from_value(value: serde_json::Value) -> Result<Self, FragmentError> {
        serde_json::from_value(value).map_err(|e| FragmentError::InvalidSchemaData(e.to_string()))
    }

    pub fn insert(&mut self, key: impl Into<String>, entry: FragmentEntry) -> Option<FragmentEntry> {
        self.entries.insert(key.into(), entry)
    }

    pub fn get(&self, key: &str) -> Option<&FragmentEntry> {
        self.entries.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &FragmentEntry)> {
        self.entries.iter()
    }

    /// The single key starting with [`ROOT_PREFIX`].
    pub fn root_key(&self) -> Result<&str, FragmentError> {
        let roots: Vec<&str> = self
            .entries
            .keys()
            .filter(|key| key.starts_with(ROOT_PREFIX))
            .map(String::as_str)
            .collect();
        match roots.as_slice() {
            [] => Err(FragmentError::InvalidSchemaData(format!(
                "no fragment key starts with `{ROOT_PREFIX}`"
            ))),
            [only] => Ok(*only),
            many => Err(FragmentError::DuplicateRootData {
                count: many.len(),
                keys: many.iter().map(|k| k.to_string()).collect(),
            }),
        }
    }
}

impl FromIterator<(String, FragmentEntry)> for FragmentDictionary {
    fn from_iter<I: IntoIterator<Item = (String, FragmentEntry)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_entry_from_wire_format() {
        let dict = FragmentDictionary::from_value(json!({
            "begin-c/order-c": {
                "expression": {
                    "type": "AND",
                    "value": "AND",
                    "children": [
                        { "type": "LEAF", "value": "item-c", "minOccurs": 0, "maxOccurs": "unbounded", "probability": 0.9 }
                    ]
                },
                "typoSpace": { "order": 0.9, "ordr": 0.1 },
                "attributes": {
                    "id": { "probability": 0.8, "types": { "integer": 0.7, "string": 0.3 } }
                },
                "types": { "string": 1.0 }
            },
            "order-c/item-c": { "expression": {} }
        }))
        .unwrap();

        let root = dict.get("begin-c/order-c").unwrap();
        let expr = root.expression.as_ref().unwrap();
        assert_eq!(expr.kind, NodeKind::And);
        let item = &expr.children[0];
        assert_eq!(item.kind, NodeKind::Leaf);
        assert_eq!(item.min_occurs, 0);
        assert_eq!(item.max_occurs, MaxOccurs::Unbounded);
        assert_eq!(root.typo_space.keys().collect::<Vec<_>>(), vec!["order", "ordr"]);
        assert_eq!(root.attributes["id"].types["integer"], 0.7);

        assert!(dict.get("order-c/item-c").unwrap().expression.is_none());
    }

    #[test]
    fn test_recognizer_type_tables() {
        let dict = FragmentDictionary::from_value(json!({
            "begin-c/event-c": {
                "XSDTypes": { "date": 0.8, "string": 0.2 },
                "attributes": {
                    "when": { "probability": 0.9, "XSDTypes": { "dateTime": 0.9, "string": 0.1 } }
                }
            }
        }))
        .unwrap();

        let entry = dict.get("begin-c/event-c").unwrap();
        assert_eq!(entry.types.keys().collect::<Vec<_>>(), vec!["date", "string"]);
        assert_eq!(entry.attributes["when"].types["dateTime"], 0.9);
    }

    #[test]
    fn test_deep_expression_drops_iteratively() {
        let mut node = ExpressionNode::leaf("n0", 1.0);
        for i in 1..100_000 {
            let mut parent = ExpressionNode::leaf(format!("n{i}"), 1.0);
            parent.children.push(node);
            node = parent;
        }
        assert_eq!(node.size(), 100_000);
        drop(node);
    }

    #[test]
    fn test_expression_defaults() {
        let node: ExpressionNode = serde_json::from_value(json!({ "type": "LEAF" })).unwrap();
        assert_eq!(node.probability, 1.0);
        assert_eq!(node.min_occurs, 1);
        assert_eq!(node.max_occurs, MaxOccurs::Bounded(1));
        assert!(node.children.is_empty());
    }

    #[test]
    fn test_max_occurs_wire_values() {
        let parse = |v: serde_json::Value| serde_json::from_value::<MaxOccurs>(v);
        assert_eq!(parse(json!(3)).unwrap(), MaxOccurs::Bounded(3));
        assert_eq!(parse(json!("7")).unwrap(), MaxOccurs::Bounded(7));
        assert_eq!(parse(json!("UNBOUNDED")).unwrap(), MaxOccurs::Unbounded);
        assert!(parse(json!("many")).is_err());
        assert_eq!(serde_json::to_value(MaxOccurs::Unbounded).unwrap(), json!("unbounded"));
    }

    #[test]
    fn test_malformed_dictionary_is_invalid_schema_data() {
        let err = FragmentDictionary::from_json(r#"{"begin-c/a-c": {"expression": {"type": "XOR"}}}"#)
            .unwrap_err();
        assert!(matches!(err, FragmentError::InvalidSchemaData(_)));
    }

    #[test]
    fn test_root_key_lookup() {
        let mut dict = FragmentDictionary::new();
        assert!(matches!(dict.root_key(), Err(FragmentError::InvalidSchemaData(_))));

        dict.insert("begin-c/a-c", FragmentEntry::default());
        dict.insert("a-c/b-s", FragmentEntry::default());
        assert_eq!(dict.root_key().unwrap(), "begin-c/a-c");

        dict.insert("begin-c/z-c", FragmentEntry::default());
        match dict.root_key() {
            Err(FragmentError::DuplicateRootData { count, keys }) => {
                assert_eq!(count, 2);
                assert_eq!(keys, vec!["begin-c/a-c", "begin-c/z-c"]);
            }
            other => panic!("expected duplicate root, got {other:?}"),
        }
    }

    #[test]
    fn test_fragment_kind_from_key() {
        assert_eq!(FragmentKind::of_key("a-c/b-s"), Some(FragmentKind::Simple));
        assert_eq!(FragmentKind::of_key("begin-c/a-c"), Some(FragmentKind::Complex));
        assert_eq!(FragmentKind::of_key("plain"), None);
        assert_eq!(last_segment("a-c/b-s"), "b-s");
        assert_eq!(last_segment("b-s"), "b-s");
    }
}
