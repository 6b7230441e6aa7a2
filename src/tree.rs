//! Generic element tree shared by the SGML and XML builders
//!
//! Nodes live in an arena and refer to each other by [`NodeId`]. The parent
//! link is an index, used for error paths and implicit-closing decisions.

use crate::error::ParseError;
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};

/// Where a markup body starts inside the whole document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Origin {
    pub offset: usize,
    /// 1-based line number of the first body byte.
    pub line: usize,
}

impl Default for Origin {
    fn default() -> Self {
        Origin { offset: 0, line: 1 }
    }
}

impl Origin {
    /// Position of the body start within `data`.
    pub fn at(data: &[u8], offset: usize) -> Self {
        let end = offset.min(data.len());
        Origin {
            offset,
            line: 1 + memchr::memchr_iter(b'\n', &data[..end]).count(),
        }
    }

    pub(crate) fn markup_error(&self, body: &str, at: usize, message: impl Into<String>) -> ParseError {
        let end = at.min(body.len());
        ParseError::MalformedMarkup {
            message: message.into(),
            offset: self.offset + at,
            line: self.line + memchr::memchr_iter(b'\n', &body.as_bytes()[..end]).count(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone)]
pub struct Node {
    tag: String,
    /// `Some` only for leaves.
    text: Option<String>,
    children: Vec<NodeId>,
    parent: Option<NodeId>,
    /// Absolute byte offset of the opening tag.
    offset: usize,
}

impl Node {
    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    pub fn is_leaf(&self) -> bool {
        self.text.is_some()
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn offset(&self) -> usize {
        self.offset
    }
}

#[derive(Debug, Clone, Default)]
pub struct ElementTree {
    nodes: Vec<Node>,
}

impl ElementTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// First node pushed without a parent.
    pub fn root(&self) -> Option<NodeId> {
        if self.nodes.is_empty() {
            None
        } else {
            Some(NodeId(0))
        }
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub(crate) fn push(&mut self, parent: Option<NodeId>, tag: &str, offset: usize) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            tag: tag.to_string(),
            text: None,
            children: Vec::new(),
            parent,
            offset,
        });
        if let Some(parent) = parent {
            self.nodes[parent.0].children.push(id);
        }
        id
    }

    pub(crate) fn set_text(&mut self, id: NodeId, text: String) {
        self.nodes[id.0].text = Some(text);
    }

    pub fn children(&self, id: NodeId) -> impl Iterator<Item = (NodeId, &Node)> + '_ {
        self.nodes[id.0]
            .children
            .iter()
            .map(move |&child| (child, &self.nodes[child.0]))
    }

    pub fn find_child(&self, id: NodeId, tag: &str) -> Option<NodeId> {
        self.children(id)
            .find(|(_, node)| node.tag == tag)
            .map(|(child, _)| child)
    }

    /// Follow a chain of child tags from `id`.
    pub fn find_path(&self, id: NodeId, path: &[&str]) -> Option<NodeId> {
        path.iter()
            .try_fold(id, |current, tag| self.find_child(current, tag))
    }

    /// Slash-separated tags from the root down to `id`.
    pub fn path(&self, id: NodeId) -> String {
        let mut tags = Vec::new();
        let mut current = Some(id);
        while let Some(node_id) = current {
            let node = &self.nodes[node_id.0];
            tags.push(node.tag.as_str());
            current = node.parent;
        }
        tags.reverse();
        tags.join("/")
    }

    /// Leaf text of the child `tag`, if present.
    pub fn child_text(&self, id: NodeId, tag: &str) -> Option<&str> {
        self.find_child(id, tag).and_then(|child| self.node(child).text())
    }

    fn subtree_eq(&self, a: NodeId, other: &ElementTree, b: NodeId) -> bool {
        let left = self.node(a);
        let right = other.node(b);
        left.tag == right.tag
            && left.text == right.text
            && left.children.len() == right.children.len()
            && left
                .children
                .iter()
                .zip(&right.children)
                .all(|(&x, &y)| self.subtree_eq(x, other, y))
    }
}

/// Structural equality: tags, texts and child order. Offsets and arena
/// positions are ignored.
impl PartialEq for ElementTree {
    fn eq(&self, other: &Self) -> bool {
        match (self.root(), other.root()) {
            (None, None) => true,
            (Some(a), Some(b)) => self.subtree_eq(a, other, b),
            _ => false,
        }
    }
}

struct NodeView<'a> {
    tree: &'a ElementTree,
    id: NodeId,
}

struct ChildrenView<'a> {
    tree: &'a ElementTree,
    id: NodeId,
}

impl Serialize for NodeView<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let node = self.tree.node(self.id);
        let mut map = serializer.serialize_map(Some(2))?;
        map.serialize_entry("tag", &node.tag)?;
        match &node.text {
            Some(text) => map.serialize_entry("text", text)?,
            None => map.serialize_entry(
                "children",
                &ChildrenView {
                    tree: self.tree,
                    id: self.id,
                },
            )?,
        }
        map.end()
    }
}

impl Serialize for ChildrenView<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let node = self.tree.node(self.id);
        let mut seq = serializer.serialize_seq(Some(node.children.len()))?;
        for &child in &node.children {
            seq.serialize_element(&NodeView {
                tree: self.tree,
                id: child,
            })?;
        }
        seq.end()
    }
}

impl Serialize for ElementTree {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self.root() {
            Some(id) => NodeView { tree: self, id }.serialize(serializer),
            None => serializer.serialize_none(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_tree(offset_shift: usize) -> ElementTree {
        let mut tree = ElementTree::new();
        let status = tree.push(None, "STATUS", 0);
        let code = tree.push(Some(status), "CODE", 8 + offset_shift);
        tree.set_text(code, "0".into());
        let severity = tree.push(Some(status), "SEVERITY", 15 + offset_shift);
        tree.set_text(severity, "INFO".into());
        tree
    }

    #[test]
    fn test_navigation() {
        let tree = status_tree(0);
        let root = tree.root().unwrap();
        assert_eq!(tree.node(root).tag(), "STATUS");
        assert!(!tree.node(root).is_leaf());
        assert_eq!(tree.child_text(root, "SEVERITY"), Some("INFO"));
        let code = tree.find_child(root, "CODE").unwrap();
        assert_eq!(tree.node(code).parent(), Some(root));
        assert_eq!(tree.path(code), "STATUS/CODE");
        assert_eq!(tree.find_path(root, &["CODE"]), Some(code));
        assert_eq!(tree.find_path(root, &["CODE", "X"]), None);
    }

    #[test]
    fn test_equality_ignores_offsets() {
        assert_eq!(status_tree(0), status_tree(7));
        let mut other = status_tree(0);
        let root = other.root().unwrap();
        other.push(Some(root), "MESSAGE", 40);
        assert_ne!(status_tree(0), other);
    }

    #[test]
    fn test_serialize_nested() {
        let json = serde_json::to_value(status_tree(0)).unwrap();
        assert_eq!(json["tag"], "STATUS");
        assert_eq!(json["children"][1]["tag"], "SEVERITY");
        assert_eq!(json["children"][1]["text"], "INFO");
    }
}
