//! Hierarchical view of the flat field list, split on `/`.

use std::collections::BTreeMap;

use serde::Serialize;

use super::FieldHandle;

/// One node of the field tree. Interior nodes may also carry a field when a
/// key is both a value and a prefix of other keys.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FieldTreeNode {
    pub field: Option<FieldHandle>,
    pub children: BTreeMap<String, FieldTreeNode>,
}

impl FieldTreeNode {
    /// Build a tree from `(display key, handle)` pairs.
    pub(crate) fn build<'a>(items: impl IntoIterator<Item = (&'a str, FieldHandle)>) -> Self {
        let mut root = FieldTreeNode::default();
        for (display_key, handle) in items {
            let path = display_key.strip_prefix('/').unwrap_or(display_key);
            let mut node = &mut root;
            for segment in path.split('/') {
                node = node.children.entry(segment.to_string()).or_default();
            }
            node.field = Some(handle);
        }
        root
    }

    /// Descend along a `/`-separated path.
    pub fn get(&self, path: &str) -> Option<&FieldTreeNode> {
        let path = path.strip_prefix('/').unwrap_or(path);
        path.split('/')
            .try_fold(self, |node, segment| node.children.get(segment))
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}
