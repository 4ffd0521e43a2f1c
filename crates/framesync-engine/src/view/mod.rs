//! Arena mirror of the surface's live rendering.
//!
//! The bridge never touches a real DOM: the embedder mirrors whatever its
//! rendering technology produced into a [`VisualTree`] and keeps it current
//! (wholesale replacement after a re-render, point mutations for local
//! edits). Nodes are addressed by [`NodeId`] handles into the arena; handles
//! from before a tree replacement are dead and every component re-resolves
//! through logical identity (paths, unit ids) instead of holding them.

pub mod binding;
pub mod geometry;

pub use geometry::Rect;

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Main layout direction of an element's children. Drop-side resolution is
/// perpendicular to this axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LayoutAxis {
    #[default]
    Column,
    Row,
}

#[derive(Debug, Clone, Default)]
pub struct ElementData {
    pub tag: String,
    pub attrs: BTreeMap<String, String>,
    pub classes: BTreeSet<String>,
    /// `display:none`-equivalent styling.
    pub display_none: bool,
    /// Whether this element clips descendants to its own bounds
    /// (`overflow:hidden`-equivalent). Visibility is computed against the
    /// nearest clipping ancestor.
    pub clips: bool,
    pub axis: LayoutAxis,
}

#[derive(Debug, Clone)]
pub enum VisualContent {
    Element(ElementData),
    Text(String),
}

#[derive(Debug, Clone)]
struct VisualNode {
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    content: VisualContent,
    rect: Rect,
    attached: bool,
}

#[derive(Debug, Clone)]
pub struct VisualTree {
    nodes: Vec<VisualNode>,
    root: NodeId,
}

impl Default for VisualTree {
    fn default() -> Self {
        Self::new("main")
    }
}

impl VisualTree {
    pub fn new(root_tag: &str) -> Self {
        let root = VisualNode {
            parent: None,
            children: Vec::new(),
            content: VisualContent::Element(ElementData {
                tag: root_tag.to_string(),
                ..ElementData::default()
            }),
            rect: Rect::default(),
            attached: true,
        };
        Self {
            nodes: vec![root],
            root: NodeId(0),
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    fn node(&self, id: NodeId) -> &VisualNode {
        &self.nodes[id.0]
    }

    fn node_mut(&mut self, id: NodeId) -> &mut VisualNode {
        &mut self.nodes[id.0]
    }

    fn push(&mut self, parent: NodeId, content: VisualContent) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(VisualNode {
            parent: Some(parent),
            children: Vec::new(),
            content,
            rect: Rect::default(),
            attached: self.node(parent).attached,
        });
        self.node_mut(parent).children.push(id);
        id
    }

    pub fn append_element(&mut self, parent: NodeId, tag: &str) -> NodeId {
        self.push(
            parent,
            VisualContent::Element(ElementData {
                tag: tag.to_string(),
                ..ElementData::default()
            }),
        )
    }

    pub fn append_text(&mut self, parent: NodeId, text: &str) -> NodeId {
        self.push(parent, VisualContent::Text(text.to_string()))
    }

    /// Insert a text run as a sibling immediately after `after`.
    pub fn insert_text_after(&mut self, after: NodeId, text: &str) -> Option<NodeId> {
        let parent = self.node(after).parent?;
        let id = self.push(parent, VisualContent::Text(text.to_string()));
        // push appended at the end; move into position
        let children = &mut self.node_mut(parent).children;
        children.pop();
        let at = children.iter().position(|&c| c == after)? + 1;
        children.insert(at, id);
        Some(id)
    }

    /// Remove a node (and its subtree) from its parent. Handles stay valid
    /// for reads but the subtree reports as detached.
    pub fn detach(&mut self, id: NodeId) {
        if let Some(parent) = self.node(id).parent {
            self.node_mut(parent).children.retain(|&c| c != id);
        }
        self.node_mut(id).parent = None;
        let mut stack = vec![id];
        while let Some(n) = stack.pop() {
            self.node_mut(n).attached = false;
            stack.extend(self.node(n).children.clone());
        }
    }

    pub fn is_attached(&self, id: NodeId) -> bool {
        id.0 < self.nodes.len() && self.node(id).attached
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.node(id).children
    }

    pub fn element(&self, id: NodeId) -> Option<&ElementData> {
        match &self.node(id).content {
            VisualContent::Element(el) => Some(el),
            VisualContent::Text(_) => None,
        }
    }

    pub fn element_mut(&mut self, id: NodeId) -> Option<&mut ElementData> {
        match &mut self.node_mut(id).content {
            VisualContent::Element(el) => Some(el),
            VisualContent::Text(_) => None,
        }
    }

    pub fn is_element(&self, id: NodeId) -> bool {
        matches!(self.node(id).content, VisualContent::Element(_))
    }

    pub fn text(&self, id: NodeId) -> Option<&str> {
        match &self.node(id).content {
            VisualContent::Text(t) => Some(t),
            VisualContent::Element(_) => None,
        }
    }

    pub fn set_text(&mut self, id: NodeId, text: &str) {
        if let VisualContent::Text(t) = &mut self.node_mut(id).content {
            *t = text.to_string();
        }
    }

    pub fn attr(&self, id: NodeId, name: &str) -> Option<&str> {
        self.element(id)?.attrs.get(name).map(String::as_str)
    }

    pub fn set_attr(&mut self, id: NodeId, name: &str, value: &str) {
        if let Some(el) = self.element_mut(id) {
            el.attrs.insert(name.to_string(), value.to_string());
        }
    }

    pub fn add_class(&mut self, id: NodeId, class: &str) {
        if let Some(el) = self.element_mut(id) {
            el.classes.insert(class.to_string());
        }
    }

    pub fn remove_class(&mut self, id: NodeId, class: &str) {
        if let Some(el) = self.element_mut(id) {
            el.classes.remove(class);
        }
    }

    pub fn rect(&self, id: NodeId) -> Rect {
        self.node(id).rect
    }

    pub fn set_rect(&mut self, id: NodeId, rect: Rect) {
        self.node_mut(id).rect = rect;
    }

    /// `id` and then each ancestor up to the root.
    pub fn ancestors_inclusive(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        let mut current = Some(id);
        std::iter::from_fn(move || {
            let here = current?;
            current = self.node(here).parent;
            Some(here)
        })
    }

    /// Document-order traversal of the subtree rooted at `id` (inclusive).
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(n) = stack.pop() {
            out.push(n);
            for &child in self.node(n).children.iter().rev() {
                stack.push(child);
            }
        }
        out
    }

    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.node(id).parent?;
        let siblings = &self.node(parent).children;
        let at = siblings.iter().position(|&c| c == id)?;
        siblings.get(at + 1).copied()
    }

    pub fn prev_sibling(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.node(id).parent?;
        let siblings = &self.node(parent).children;
        let at = siblings.iter().position(|&c| c == id)?;
        at.checked_sub(1).map(|i| siblings[i])
    }

    /// Child-index path from the root; the tree-level analogue of a
    /// structural path, used only for document-order comparison.
    fn index_path(&self, id: NodeId) -> Vec<usize> {
        let mut path = Vec::new();
        let mut current = id;
        while let Some(parent) = self.node(current).parent {
            let at = self.node(parent)
                .children
                .iter()
                .position(|&c| c == current)
                .unwrap_or(0);
            path.push(at);
            current = parent;
        }
        path.reverse();
        path
    }

    pub fn document_order(&self, a: NodeId, b: NodeId) -> std::cmp::Ordering {
        self.index_path(a).cmp(&self.index_path(b))
    }

    /// True when `ancestor` is `id` or one of its ancestors.
    pub fn is_in_subtree(&self, id: NodeId, ancestor: NodeId) -> bool {
        self.ancestors_inclusive(id).any(|n| n == ancestor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tiny() -> (VisualTree, NodeId, NodeId, NodeId) {
        let mut tree = VisualTree::new("main");
        let div = tree.append_element(tree.root(), "div");
        let a = tree.append_text(div, "a");
        let b = tree.append_text(div, "b");
        (tree, div, a, b)
    }

    #[test]
    fn insert_text_after_places_between_siblings() {
        let (mut tree, div, a, b) = tiny();
        let mid = tree.insert_text_after(a, "-").unwrap();
        assert_eq!(tree.children(div), &[a, mid, b]);
        assert_eq!(tree.text(mid), Some("-"));
    }

    #[test]
    fn detach_marks_whole_subtree() {
        let (mut tree, div, a, _b) = tiny();
        tree.detach(div);
        assert!(!tree.is_attached(div));
        assert!(!tree.is_attached(a));
        assert_eq!(tree.children(tree.root()), &[] as &[NodeId]);
    }

    #[test]
    fn document_order_follows_tree_position() {
        let (mut tree, _div, a, b) = tiny();
        let second = tree.append_element(tree.root(), "div");
        assert_eq!(tree.document_order(a, b), std::cmp::Ordering::Less);
        assert_eq!(tree.document_order(b, second), std::cmp::Ordering::Less);
        assert_eq!(tree.document_order(a, a), std::cmp::Ordering::Equal);
    }

    #[test]
    fn descendants_are_in_document_order() {
        let (tree, div, a, b) = tiny();
        assert_eq!(tree.descendants(tree.root()), vec![tree.root(), div, a, b]);
    }

    #[test]
    fn siblings_navigate_both_ways() {
        let (tree, _div, a, b) = tiny();
        assert_eq!(tree.next_sibling(a), Some(b));
        assert_eq!(tree.prev_sibling(b), Some(a));
        assert_eq!(tree.prev_sibling(a), None);
    }
}
