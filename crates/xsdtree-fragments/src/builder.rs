//! Expression tree building
//!
//! Stitches the flat fragment dictionary into a single expression tree
//! rooted at the unique `begin-c/...` fragment.
//!
//! Every LEAF is looked up under `<parent tag>/<leaf tag>`. When that key is
//! in the dictionary, the leaf's value becomes the composite key and the
//! entry's expression (if it has one) is appended as an extra child, whose
//! leaves are in turn looked up under the leaf's *short* tag. A leaf whose
//! key is missing is terminal. AND/OR connectors pass their parent tag
//! through unchanged.
//!
//! The caller's dictionary is only read; every spliced expression is a clone.

use crate::{last_segment, ExpressionNode, FragmentDictionary, FragmentError, NodeKind};

/// A node still waiting to be expanded.
struct Pending<'a> {
    node: &'a mut ExpressionNode,
    parent_tag: String,
    /// Index into the expansion chain of the nearest expanded leaf above.
    scope: usize,
}

/// One expanded fragment, linked to the fragment it was spliced under.
struct Expansion {
    key: String,
    parent: Option<usize>,
}

fn on_chain(chain: &[Expansion], mut scope: Option<usize>, key: &str) -> bool {
    while let Some(index) = scope {
        if chain[index].key == key {
            return true;
        }
        scope = chain[index].parent;
    }
    false
}

/// Build the global expression tree.
///
/// The result is a LEAF whose value is the root key. Fails with
/// `InvalidSchemaData` when no root key exists and `DuplicateRootData` when
/// several do.
pub fn build_expression_tree(
    dictionary: &FragmentDictionary,
) -> Result<ExpressionNode, FragmentError> {
    let root_key = dictionary.root_key()?;
    let mut root = ExpressionNode::leaf(root_key, 1.0);
    if let Some(expression) = dictionary.get(root_key).and_then(|e| e.expression.as_ref()) {
        root.children.push(expression.clone());
    }

    let mut chain = vec![Expansion {
        key: root_key.to_string(),
        parent: None,
    }];
    let mut terminal = 0usize;

    {
        let root_tag = last_segment(root_key);
        let mut stack: Vec<Pending<'_>> = root
            .children
            .iter_mut()
            .rev()
            .map(|node| Pending {
                node,
                parent_tag: root_tag.to_string(),
                scope: 0,
            })
            .collect();

        while let Some(Pending {
            node,
            parent_tag,
            scope,
        }) = stack.pop()
        {
            match node.kind {
                NodeKind::Leaf => {
                    let key = format!("{parent_tag}/{}", node.value);
                    let Some(entry) = dictionary.get(&key) else {
                        terminal += 1;
                        continue;
                    };
                    let tag = std::mem::replace(&mut node.value, key.clone());

                    if on_chain(&chain, Some(scope), &key) {
                        tracing::warn!(
                            key = %key,
                            "fragment refers to itself through its ancestors; leaving leaf unexpanded"
                        );
                        continue;
                    }
                    chain.push(Expansion {
                        key,
                        parent: Some(scope),
                    });
                    let child_scope = chain.len() - 1;

                    if let Some(expression) = &entry.expression {
                        node.children.push(expression.clone());
                    }
                    for child in node.children.iter_mut().rev() {
                        stack.push(Pending {
                            node: child,
                            parent_tag: tag.clone(),
                            scope: child_scope,
                        });
                    }
                }
                NodeKind::And | NodeKind::Or => {
                    for child in node.children.iter_mut().rev() {
                        stack.push(Pending {
                            node: child,
                            parent_tag: parent_tag.clone(),
                            scope,
                        });
                    }
                }
            }
        }
    }

    tracing::debug!(
        root = %root_key,
        expanded = chain.len(),
        terminal,
        nodes = root.size(),
        "expression tree built"
    );
    Ok(root)
}
