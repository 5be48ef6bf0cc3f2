//! Final schema reduction
//!
//! Keeps the chosen LEAF nodes only. A chosen LEAF hangs under its nearest
//! chosen LEAF ancestor; AND/OR survivors in between disappear. Each kept
//! attribute gets its most probable XSD type from the fragment dictionary.

use crate::model::{SchemaModel, SchemaNode, DEFAULT_TYPE};
use crate::SelectError;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use xsdtree_fragments::{most_probable, FragmentDictionary, MaxOccurs, TieBreak};
use xsdtree_graph::{NodeGraph, NodeId, Tree};

/// One element of the final schema, as consumed by code generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalSchemaNode {
    #[serde(rename = "type")]
    pub type_name: String,
    pub name: String,
    pub min_occurs: u32,
    pub max_occurs: MaxOccurs,
    /// Attribute name → XSD type.
    pub attributes: IndexMap<String, String>,
}

/// Read-only result of a reduction.
#[derive(Debug)]
pub struct FinalSchema {
    graph: NodeGraph<FinalSchemaNode>,
}

impl FinalSchema {
    pub fn len(&self) -> usize {
        self.graph.len()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.is_empty()
    }

    pub fn graph(&self) -> &NodeGraph<FinalSchemaNode> {
        &self.graph
    }

    pub fn root(&self) -> Option<&FinalSchemaNode> {
        self.graph.root().map(|node| node.data())
    }

    /// Nested tree with identities and parent links stripped.
    pub fn to_tree(&self) -> Option<Tree<FinalSchemaNode>> {
        self.graph.serialize()
    }

    /// Compact JSON, `null` for an empty schema. Written without recursion,
    /// whatever the nesting depth.
    pub fn to_json(&self) -> serde_json::Result<String> {
        self.to_tree()
            .map_or_else(|| Ok("null".to_string()), |tree| tree.to_json_string())
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        self.to_tree()
            .map_or_else(|| Ok("null".to_string()), |tree| tree.to_json_string_pretty())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SchemaReducer {
    tie_break: TieBreak,
}

impl SchemaReducer {
    pub fn new(tie_break: TieBreak) -> Self {
        Self { tie_break }
    }

    /// Build the final schema from the chosen part of `model`.
    ///
    /// Fails with `MissingDictionaryEntry` when a chosen LEAF (or one of its
    /// chosen attributes) has no counterpart in `dictionary`; the model is
    /// never modified.
    pub fn reduce(
        &self,
        model: &SchemaModel,
        dictionary: &FragmentDictionary,
    ) -> Result<FinalSchema, SelectError> {
        let root = model.node(model.root_id())?;
        if !root.data().chosen || !root.data().kind.is_leaf() {
            return Err(SelectError::InvariantViolation(
                "the root must be a chosen LEAF before reduction".to_string(),
            ));
        }

        let mut graph = NodeGraph::new();
        let out_root = graph.create_root(self.project(root.data(), dictionary)?)?;

        let mut stack: Vec<(NodeId, NodeId)> =
            root.children().iter().rev().map(|&child| (child, out_root)).collect();
        while let Some((id, out_parent)) = stack.pop() {
            let node = model.node(id)?;
            let data = node.data();
            if !data.chosen {
                continue;
            }
            let attach_to = if data.kind.is_leaf() {
                graph.add_child(out_parent, self.project(data, dictionary)?)?
            } else {
                out_parent
            };
            stack.extend(node.children().iter().rev().map(|&child| (child, attach_to)));
        }

        tracing::info!(
            chosen = model.chosen_count(),
            elements = graph.len(),
            "final schema reduced"
        );
        Ok(FinalSchema { graph })
    }

    fn project(
        &self,
        data: &SchemaNode,
        dictionary: &FragmentDictionary,
    ) -> Result<FinalSchemaNode, SelectError> {
        let entry = dictionary
            .get(&data.value)
            .ok_or_else(|| SelectError::MissingDictionaryEntry(data.value.clone()))?;

        let mut attributes = IndexMap::with_capacity(data.chosen_attributes.len());
        for name in &data.chosen_attributes {
            let candidate = entry.attributes.get(name).ok_or_else(|| {
                SelectError::MissingDictionaryEntry(format!("{}@{name}", data.value))
            })?;
            let type_name = most_probable(
                candidate.types.iter().map(|(ty, p)| (ty, *p)),
                self.tie_break,
            )
            .map_or_else(|| DEFAULT_TYPE.to_string(), String::clone);
            attributes.insert(name.clone(), type_name);
        }

        Ok(FinalSchemaNode {
            type_name: data.chosen_type.clone(),
            name: data.name.clone(),
            min_occurs: data.min_occurs,
            max_occurs: data.max_occurs,
            attributes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SelectionEngine;
    use serde_json::json;
    use xsdtree_fragments::build_expression_tree;

    fn dictionary() -> FragmentDictionary {
        FragmentDictionary::from_value(json!({
            "begin-c/order-c": {
                "expression": { "type": "AND", "children": [
                    { "type": "LEAF", "value": "item-c", "maxOccurs": "unbounded", "probability": 1.0 }
                ]},
                "attributes": { "id": { "probability": 0.9, "types": { "integer": 0.8, "string": 0.2 } } },
                "types": { "string": 1.0 }
            },
            "order-c/item-c": {
                "expression": { "type": "OR", "children": [
                    { "type": "LEAF", "value": "sku-s", "probability": 0.3 },
                    { "type": "AND", "probability": 0.7, "children": [
                        { "type": "LEAF", "value": "name-s" },
                        { "type": "LEAF", "value": "price-s", "minOccurs": 0 }
                    ]}
                ]},
                "types": { "string": 1.0 }
            },
            "item-c/sku-s": { "types": { "string": 1.0 } },
            "item-c/name-s": { "types": { "string": 0.9, "token": 0.1 } },
            "item-c/price-s": {
                "types": { "decimal": 0.7, "string": 0.3 },
                "attributes": { "currency": { "probability": 0.6, "types": { "string": 0.5, "token": 0.5 } } }
            }
        }))
        .unwrap()
    }

    fn resolved() -> (SchemaModel, FragmentDictionary) {
        let dict = dictionary();
        let mut model = SchemaModel::build(&build_expression_tree(&dict).unwrap()).unwrap();
        SelectionEngine::default()
            .select_most_probable(&mut model, &dict, NodeId::ROOT)
            .unwrap();
        (model, dict)
    }

    #[test]
    fn test_reduce_keeps_chosen_leaves_only() {
        let (model, dict) = resolved();
        let schema = SchemaReducer::default().reduce(&model, &dict).unwrap();
        assert_eq!(schema.len(), model.chosen_leaf_count());
        assert_eq!(schema.len(), 4);

        let json: serde_json::Value = serde_json::from_str(&schema.to_json().unwrap()).unwrap();
        assert_eq!(json["name"], "order");
        assert_eq!(json["attributes"]["id"], "integer");
        let item = &json["children"][0];
        assert_eq!(item["name"], "item");
        assert_eq!(item["maxOccurs"], "unbounded");
        // OR and AND in between are skipped
        let names: Vec<&str> = item["children"]
            .as_array()
            .unwrap()
            .iter()
            .map(|c| c["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["name", "price"]);
        let price = &item["children"][1];
        assert_eq!(price["type"], "decimal");
        assert_eq!(price["minOccurs"], 0);
        assert_eq!(price["attributes"]["currency"], "string");
    }

    #[test]
    fn test_reduce_requires_resolved_root() {
        let dict = dictionary();
        let model = SchemaModel::build(&build_expression_tree(&dict).unwrap()).unwrap();
        assert!(matches!(
            SchemaReducer::default().reduce(&model, &dict),
            Err(SelectError::InvariantViolation(_))
        ));
    }

    #[test]
    fn test_reduce_reports_missing_entry() {
        let (model, dict) = resolved();
        let tampered: FragmentDictionary = dict
            .iter()
            .filter(|(key, _)| key.as_str() != "item-c/price-s")
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        assert_eq!(
            SchemaReducer::default().reduce(&model, &tampered).unwrap_err(),
            SelectError::MissingDictionaryEntry("item-c/price-s".to_string())
        );
    }
}
