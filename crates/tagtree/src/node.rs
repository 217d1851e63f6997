// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Store data model
//!
//! Nodes and responses as exchanged with a hierarchical key/value store.
//! Field names follow the store's JSON shape (`modifiedIndex`, `prevNode`, ...).

use crate::path;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A node in the remote tree.
///
/// A node is either a leaf (`value` set, no children) or a directory
/// (`dir == true`, children, no value).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    /// Canonical key (`/a/b`).
    pub key: String,

    /// Leaf value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,

    /// Directory flag.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub dir: bool,

    /// Children, only populated for directories.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub nodes: Vec<Node>,

    /// Store index at creation.
    #[serde(default)]
    pub created_index: u64,

    /// Store index of the last modification.
    #[serde(default)]
    pub modified_index: u64,

    /// Time to live in seconds, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl: Option<u64>,
}

impl Node {
    /// Build a leaf node.
    pub fn leaf(key: impl Into<String>, value: impl Into<String>, index: u64) -> Self {
        Self {
            key: key.into(),
            value: Some(value.into()),
            created_index: index,
            modified_index: index,
            ..Default::default()
        }
    }

    /// Build an empty directory node.
    pub fn dir(key: impl Into<String>, index: u64) -> Self {
        Self {
            key: key.into(),
            dir: true,
            created_index: index,
            modified_index: index,
            ..Default::default()
        }
    }

    /// Leaf value, or the empty string for directories.
    pub fn value_str(&self) -> &str {
        self.value.as_deref().unwrap_or_default()
    }

    /// Last segment of the key.
    pub fn name(&self) -> &str {
        path::last_segment(&self.key)
    }

    /// Direct child whose key matches `key` in canonical form.
    pub fn child(&self, key: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| path::same(&n.key, key))
    }

    /// Highest modified index of this node and everything below it.
    ///
    /// A directory's own index only moves when the directory itself is
    /// rewritten, so child writes are only visible through this.
    pub fn newest_index(&self) -> u64 {
        self.nodes
            .iter()
            .map(Node::newest_index)
            .fold(self.modified_index, u64::max)
    }

    /// Sort children by key, recursively.
    pub fn sort(&mut self) {
        self.nodes.sort_by(|a, b| a.key.cmp(&b.key));
        for child in &mut self.nodes {
            child.sort();
        }
    }

    /// Drop grandchildren, keeping only the direct listing.
    pub fn shallow(&mut self) {
        for child in &mut self.nodes {
            child.nodes.clear();
        }
    }

    /// Serialize the node as JSON.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// Kind of operation that produced a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Get,
    Set,
    Create,
    Update,
    Delete,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Action::Get => "get",
            Action::Set => "set",
            Action::Create => "create",
            Action::Update => "update",
            Action::Delete => "delete",
        };
        f.write_str(s)
    }
}

/// Store response, also used as a watch event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    pub action: Action,
    pub node: Node,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prev_node: Option<Node>,
    /// Store index when the response was produced.
    pub index: u64,
}

impl Response {
    pub fn new(action: Action, node: Node, index: u64) -> Self {
        Self {
            action,
            node,
            prev_node: None,
            index,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_leaf_and_dir_shapes() {
        let leaf = Node::leaf("/name", "alpha", 3);
        assert!(!leaf.dir);
        assert_eq!(leaf.value_str(), "alpha");
        assert_eq!(leaf.modified_index, 3);

        let dir = Node::dir("/items", 4);
        assert!(dir.dir);
        assert!(dir.value.is_none());
        assert_eq!(dir.value_str(), "");
    }

    #[test]
    fn test_child_lookup_is_canonical() {
        let mut dir = Node::dir("/cfg", 1);
        dir.nodes.push(Node::leaf("/cfg/name", "x", 2));

        assert!(dir.child("/cfg/name").is_some());
        assert!(dir.child("cfg/name/").is_some());
        assert!(dir.child("/cfg/other").is_none());
        assert_eq!(dir.nodes[0].name(), "name");
    }

    #[test]
    fn test_newest_index_covers_subtree() {
        let mut limits = Node::dir("/limits", 2);
        limits.nodes.push(Node::leaf("/limits/max", "1", 3));
        let mut nested = Node::dir("/limits/inner", 4);
        nested.nodes.push(Node::leaf("/limits/inner/burst", "9", 8));
        limits.nodes.push(nested);
        limits.nodes.push(Node::leaf("/limits/min", "0", 5));

        assert_eq!(limits.newest_index(), 8);
        assert_eq!(Node::dir("/empty", 6).newest_index(), 6);
    }

    #[test]
    fn test_sort_and_shallow() {
        let mut root = Node::dir("/", 0);
        let mut b = Node::dir("/b", 1);
        b.nodes.push(Node::leaf("/b/x", "1", 2));
        root.nodes.push(b);
        root.nodes.push(Node::leaf("/a", "2", 3));

        root.sort();
        assert_eq!(root.nodes[0].key, "/a");

        root.shallow();
        assert!(root.nodes[1].nodes.is_empty());
    }

    #[test]
    fn test_json_shape() {
        let mut resp = Response::new(Action::Set, Node::leaf("/k", "v", 7), 7);
        resp.prev_node = Some(Node::leaf("/k", "old", 5));

        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["action"], "set");
        assert_eq!(json["node"]["modifiedIndex"], 7);
        assert_eq!(json["prevNode"]["value"], "old");
        assert!(json["node"].get("dir").is_none());

        let back: Response = serde_json::from_value(json).unwrap();
        assert_eq!(back, resp);
    }
}
