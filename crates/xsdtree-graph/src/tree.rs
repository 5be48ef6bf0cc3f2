//! Plain nested trees for transport.
//!
//! Everything here walks the tree with explicit stacks: dropping it and
//! writing it as JSON both work for any depth. Derived serde serialization
//! would recurse once per level, so `Tree` writes its own JSON instead.

use serde::ser::Error as _;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::io::{self, Write};

/// A detached tree: payload fields flattened next to an ordered `children`
/// array. Carries no identities and no parent links.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct Tree<T> {
    #[serde(flatten)]
    pub data: T,
    #[serde(default)]
    pub children: Vec<Tree<T>>,
}

impl<T> Tree<T> {
    /// Total number of nodes, counted without recursion.
    pub fn len(&self) -> usize {
        let mut count = 0;
        let mut stack = vec![self];
        while let Some(tree) = stack.pop() {
            count += 1;
            stack.extend(tree.children.iter());
        }
        count
    }

    /// Payloads in pre-order, left to right.
    pub fn preorder(&self) -> Vec<&T> {
        let mut out = Vec::new();
        let mut stack = vec![self];
        while let Some(tree) = stack.pop() {
            out.push(&tree.data);
            stack.extend(tree.children.iter().rev());
        }
        out
    }
}

impl<T> Drop for Tree<T> {
    fn drop(&mut self) {
        let mut pending = std::mem::take(&mut self.children);
        while let Some(mut tree) = pending.pop() {
            pending.append(&mut tree.children);
        }
    }
}

// ============================================================================
// JSON output
// ============================================================================

impl<T: Serialize> Tree<T> {
    /// Write the tree as one JSON object per node: the payload's fields
    /// followed by `children`.
    ///
    /// The payload must serialize to a JSON object and is expected to be
    /// shallow; only the tree structure itself is walked iteratively.
    pub fn write_json<W: Write>(&self, writer: W, pretty: bool) -> serde_json::Result<()> {
        let mut out = JsonOut { writer, pretty };

        // (node, indentation level, next child to write)
        let mut stack: Vec<(&Tree<T>, usize, usize)> = Vec::new();
        if out.open(self, 0)? {
            stack.push((self, 0, 0));
        }
        while let Some((tree, level, next)) = stack.pop() {
            if next == tree.children.len() {
                out.newline(level + 1)?;
                out.raw(b"]")?;
                out.newline(level)?;
                out.raw(b"}")?;
                continue;
            }
            if next > 0 {
                out.raw(b",")?;
            }
            out.newline(level + 2)?;
            stack.push((tree, level, next + 1));

            let child = &tree.children[next];
            if out.open(child, level + 2)? {
                stack.push((child, level + 2, 0));
            }
        }
        Ok(())
    }

    pub fn to_json_string(&self) -> serde_json::Result<String> {
        self.render(false)
    }

    pub fn to_json_string_pretty(&self) -> serde_json::Result<String> {
        self.render(true)
    }

    fn render(&self, pretty: bool) -> serde_json::Result<String> {
        let mut buf = Vec::new();
        self.write_json(&mut buf, pretty)?;
        String::from_utf8(buf).map_err(serde_json::Error::custom)
    }
}

struct JsonOut<W> {
    writer: W,
    pretty: bool,
}

impl<W: Write> JsonOut<W> {
    fn raw(&mut self, bytes: &[u8]) -> serde_json::Result<()> {
        self.writer.write_all(bytes).map_err(serde_json::Error::io)
    }

    fn newline(&mut self, level: usize) -> serde_json::Result<()> {
        if !self.pretty {
            return Ok(());
        }
        self.raw(b"\n")?;
        for _ in 0..level {
            self.raw(b"  ")?;
        }
        Ok(())
    }

    fn key(&mut self, key: &str, level: usize) -> serde_json::Result<()> {
        self.newline(level)?;
        serde_json::to_writer(&mut self.writer, key)?;
        let separator: &[u8] = if self.pretty { b": " } else { b":" };
        self.raw(separator)
    }

    /// A payload value. Pretty output re-indents its continuation lines;
    /// JSON strings never contain raw newlines, so splitting is safe.
    fn value(&mut self, value: &Value, level: usize) -> serde_json::Result<()> {
        if !self.pretty {
            return serde_json::to_writer(&mut self.writer, value);
        }
        let text = serde_json::to_string_pretty(value)?;
        for (i, line) in text.split('\n').enumerate() {
            if i > 0 {
                self.newline(level)?;
            }
            self.raw(line.as_bytes())?;
        }
        Ok(())
    }

    /// Write `{`, the payload fields and the opening of `children`.
    /// Returns whether the node has children still to be written; a
    /// childless node is closed right away.
    fn open<T: Serialize>(&mut self, tree: &Tree<T>, level: usize) -> serde_json::Result<bool> {
        let fields: Map<String, Value> = match serde_json::to_value(&tree.data)? {
            Value::Object(fields) => fields,
            other => {
                return Err(serde_json::Error::custom(format!(
                    "tree payload must serialize to a JSON object, got {other}"
                )))
            }
        };

        self.raw(b"{")?;
        for (name, value) in &fields {
            self.key(name, level + 1)?;
            self.value(value, level + 1)?;
            self.raw(b",")?;
        }
        self.key("children", level + 1)?;
        if tree.children.is_empty() {
            self.raw(b"[]")?;
            self.newline(level)?;
            self.raw(b"}")?;
            Ok(false)
        } else {
            self.raw(b"[")?;
            Ok(true)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Tag {
        name: String,
    }

    fn node(name: &str, children: Vec<Tree<Tag>>) -> Tree<Tag> {
        Tree {
            data: Tag {
                name: name.to_string(),
            },
            children,
        }
    }

    fn sample() -> Tree<Tag> {
        node(
            "root",
            vec![node("a", vec![node("a1", vec![])]), node("b", vec![])],
        )
    }

    #[test]
    fn test_compact_json() {
        assert_eq!(
            sample().to_json_string().unwrap(),
            r#"{"name":"root","children":[{"name":"a","children":[{"name":"a1","children":[]}]},{"name":"b","children":[]}]}"#
        );
    }

    #[test]
    fn test_pretty_json_matches_serde_json_layout() {
        let written = sample().to_json_string_pretty().unwrap();
        let value: Value = serde_json::from_str(&written).unwrap();
        assert_eq!(written, serde_json::to_string_pretty(&value).unwrap());
    }

    #[test]
    fn test_json_reads_back() {
        let tree: Tree<Tag> = serde_json::from_str(&sample().to_json_string().unwrap()).unwrap();
        assert_eq!(tree, sample());
    }

    #[test]
    fn test_non_object_payload_is_rejected() {
        let tree = Tree {
            data: 7u32,
            children: Vec::new(),
        };
        assert!(tree.to_json_string().is_err());
    }

    #[test]
    fn test_deep_tree_writes_and_drops() {
        let mut tree = node("n0", vec![]);
        for i in 1..50_000 {
            tree = node(&format!("n{i}"), vec![tree]);
        }
        let json = tree.to_json_string().unwrap();
        assert!(json.starts_with(r#"{"name":"n49999","children":[{"name":"n49998""#));
        assert!(json.ends_with(&"]}".repeat(50_000)));
        drop(tree);
    }
}
