// ── Key-value tree nodes ──
//
// Mirrors the etcd v2 `node` object. A read of a directory returns the
// directory node with its children; a recursive read nests the full tree.

use serde::{Deserialize, Serialize};

/// Path separator of the hierarchical key space.
pub const SEPARATOR: char = '/';

/// One node of a key-value read: either a value or a directory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    /// Absolute key, without a trailing separator.
    pub key: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,

    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub dir: bool,

    /// Children of a directory. One level deep unless read recursively.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub nodes: Vec<Node>,

    #[serde(rename = "createdIndex", default)]
    pub created_index: u64,

    #[serde(rename = "modifiedIndex", default)]
    pub modified_index: u64,
}

impl Node {
    /// A value node.
    pub fn leaf(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: Some(value.into()),
            ..Self::default()
        }
    }

    /// A directory node with the given children.
    pub fn directory(key: impl Into<String>, nodes: Vec<Node>) -> Self {
        Self {
            key: key.into(),
            dir: true,
            nodes,
            ..Self::default()
        }
    }

    /// The final path segment of this node's key.
    pub fn name(&self) -> &str {
        self.key.rsplit(SEPARATOR).next().unwrap_or(&self.key)
    }

    /// Every node in this subtree that has no children, depth-first.
    ///
    /// A node without children is its own only leaf. That includes an
    /// empty directory, so listing an empty directory yields the directory
    /// itself -- callers scanning for a particular shape of key must filter
    /// that entry out.
    pub fn leaves(&self) -> Vec<&Node> {
        let mut out = Vec::new();
        self.collect_leaves(&mut out);
        out
    }

    fn collect_leaves<'a>(&'a self, out: &mut Vec<&'a Node>) {
        if self.nodes.is_empty() {
            out.push(self);
            return;
        }
        for child in &self.nodes {
            child.collect_leaves(out);
        }
    }
}

/// Normalize a key: leading separator, no trailing separator, no empty segments.
pub fn normalize_key(key: &str) -> String {
    let segments: Vec<&str> = key.split(SEPARATOR).filter(|s| !s.is_empty()).collect();
    format!("{SEPARATOR}{}", segments.join("/"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn leaves_of_empty_directory_is_the_directory() {
        let dir = Node::directory("/calico/v1/ipam/v4/pool", Vec::new());
        let leaves = dir.leaves();
        assert_eq!(leaves.len(), 1);
        assert_eq!(leaves[0].key, "/calico/v1/ipam/v4/pool");
    }

    #[test]
    fn leaves_flatten_nested_directories() {
        let tree = Node::directory(
            "/a",
            vec![
                Node::leaf("/a/x", "1"),
                Node::directory("/a/b", vec![Node::leaf("/a/b/y", "2")]),
                Node::directory("/a/empty", Vec::new()),
            ],
        );
        let keys: Vec<&str> = tree.leaves().iter().map(|n| n.key.as_str()).collect();
        assert_eq!(keys, vec!["/a/x", "/a/b/y", "/a/empty"]);
    }

    #[test]
    fn name_is_last_segment() {
        assert_eq!(Node::leaf("/calico/v1/Ready", "true").name(), "Ready");
    }

    #[test]
    fn normalize_strips_redundant_separators() {
        assert_eq!(normalize_key("/calico/v1/host/"), "/calico/v1/host");
        assert_eq!(normalize_key("calico//v1"), "/calico/v1");
        assert_eq!(normalize_key("/"), "/");
    }

    #[test]
    fn deserializes_etcd_node() {
        let raw = r#"{"key":"/calico","dir":true,"nodes":[{"key":"/calico/v1","value":"x","modifiedIndex":7,"createdIndex":7}],"modifiedIndex":3,"createdIndex":3}"#;
        let node: Node = serde_json::from_str(raw).unwrap();
        assert!(node.dir);
        assert_eq!(node.nodes[0].value.as_deref(), Some("x"));
        assert_eq!(node.nodes[0].modified_index, 7);
    }
}
