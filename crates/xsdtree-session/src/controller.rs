use crate::{Result, WorkspaceConfig};
use serde::Serialize;
use std::path::Path;
use xsdtree_fragments::{build_expression_tree, FragmentDictionary, FragmentEntry, FragmentKind};
use xsdtree_graph::{NodeId, SubscriptionId};
use xsdtree_select::{
    FinalSchema, SchemaModel, SchemaNode, SchemaReducer, SelectionEngine, SelectionOutcome,
};

/// Detail of the inspected LEAF, for per-node panels.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeInspection<'a> {
    pub id: NodeId,
    pub node: &'a SchemaNode,
    pub fragment_kind: Option<FragmentKind>,
    /// `None` for leaves that never resolved to a fragment.
    pub fragment: Option<&'a FragmentEntry>,
}

/// Owns one schema model, the dictionary it was built from and the
/// inspection cursor.
pub struct WorkspaceController {
    config: WorkspaceConfig,
    dictionary: FragmentDictionary,
    model: SchemaModel,
    engine: SelectionEngine,
    reducer: SchemaReducer,
    inspected: Option<NodeId>,
}

impl WorkspaceController {
    /// Build the model from `dictionary` and run the initial automatic pass.
    pub fn new(dictionary: FragmentDictionary, config: WorkspaceConfig) -> Result<Self> {
        config.validate()?;
        let expression = build_expression_tree(&dictionary)?;
        let mut model = SchemaModel::build(&expression)?;

        let engine = SelectionEngine::new(config.selection);
        let root = model.root_id();
        engine.select_most_probable(&mut model, &dictionary, root)?;

        tracing::info!(
            fragments = dictionary.len(),
            nodes = model.len(),
            chosen = model.chosen_count(),
            "workspace initialized"
        );
        Ok(Self {
            reducer: SchemaReducer::new(config.selection.tie_break),
            config,
            dictionary,
            model,
            engine,
            inspected: None,
        })
    }

    pub fn from_json(json: &str, config: WorkspaceConfig) -> Result<Self> {
        Self::new(FragmentDictionary::from_json(json)?, config)
    }

    pub fn from_path(path: impl AsRef<Path>, config: WorkspaceConfig) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        Self::from_json(&contents, config)
    }

    pub fn config(&self) -> &WorkspaceConfig {
        &self.config
    }

    pub fn dictionary(&self) -> &FragmentDictionary {
        &self.dictionary
    }

    pub fn model(&self) -> &SchemaModel {
        &self.model
    }

    // ========================================================================
    // Selection
    // ========================================================================

    /// Manually select `id`, re-deriving every OR decision above it.
    pub fn select_subtree(&mut self, id: NodeId) -> Result<SelectionOutcome> {
        Ok(self
            .engine
            .select_subtree(&mut self.model, &self.dictionary, id)?)
    }

    /// Re-resolve the subtree under `id` automatically.
    pub fn select_most_probable(&mut self, id: NodeId) -> Result<SelectionOutcome> {
        Ok(self
            .engine
            .select_most_probable(&mut self.model, &self.dictionary, id)?)
    }

    /// Drop all manual choices and start over from the most probable variant.
    pub fn reset_selection(&mut self) -> Result<SelectionOutcome> {
        let root = self.model.root_id();
        self.select_most_probable(root)
    }

    // ========================================================================
    // Inspection cursor
    // ========================================================================

    /// Point the cursor at a LEAF. Non-LEAF ids are ignored; unknown ids are
    /// an error. Returns whether the cursor now points at `id`.
    pub fn inspect(&mut self, id: NodeId) -> Result<bool> {
        if !self.model.data(id)?.kind.is_leaf() {
            tracing::debug!(node = %id, "ignoring inspection of a non-LEAF node");
            return Ok(false);
        }
        self.inspected = Some(id);
        Ok(true)
    }

    pub fn clear_inspection(&mut self) {
        self.inspected = None;
    }

    pub fn inspected(&self) -> Option<NodeId> {
        self.inspected
    }

    pub fn inspection(&self) -> Option<NodeInspection<'_>> {
        let id = self.inspected?;
        let node = self.model.data(id).ok()?;
        Some(NodeInspection {
            id,
            node,
            fragment_kind: FragmentKind::of_key(&node.value),
            fragment: self.dictionary.get(&node.value),
        })
    }

    // ========================================================================
    // Manual edits
    // ========================================================================

    pub fn rename(&mut self, id: NodeId, name: impl Into<String>) -> Result<bool> {
        Ok(self.model.rename(id, name)?)
    }

    pub fn choose_type(&mut self, id: NodeId, type_name: &str) -> Result<bool> {
        Ok(self.model.choose_type(&self.dictionary, id, type_name)?)
    }

    /// Returns whether the attribute is kept afterwards.
    pub fn toggle_attribute(&mut self, id: NodeId, attribute: &str) -> Result<bool> {
        Ok(self.model.toggle_attribute(&self.dictionary, id, attribute)?)
    }

    // ========================================================================
    // Observation
    // ========================================================================

    pub fn subscribe(
        &mut self,
        id: NodeId,
        listener: impl FnMut(NodeId, &SchemaNode) + 'static,
    ) -> Result<SubscriptionId> {
        Ok(self.model.subscribe(id, listener)?)
    }

    pub fn unsubscribe(&mut self, subscription: SubscriptionId) -> bool {
        self.model.unsubscribe(subscription)
    }

    // ========================================================================
    // Output
    // ========================================================================

    pub fn build_final_schema(&self) -> Result<FinalSchema> {
        Ok(self.reducer.reduce(&self.model, &self.dictionary)?)
    }

    /// Compact final schema JSON, as handed to code generation.
    pub fn final_schema_json(&self) -> Result<String> {
        Ok(self.build_final_schema()?.to_json()?)
    }

    /// The whole selection tree as compact JSON, for presentation layers.
    pub fn model_json(&self) -> Result<String> {
        let json = match self.model.serialize() {
            Some(tree) => tree.to_json_string()?,
            None => "null".to_string(),
        };
        Ok(json)
    }
}
