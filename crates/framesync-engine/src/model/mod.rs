//! Document model shared between host and surface.
//!
//! The model is an ordered tree: element nodes carry a type tag and children,
//! text leaves carry literal text. The host owns the source of truth; the
//! bridge keeps a [`shadow::ShadowDocument`] working copy so local edits are
//! readable before the next round-trip. Nodes are addressed positionally by
//! [`StructuralPath`] — there are no persistent node ids in the wire model.

pub mod path;
pub mod shadow;

pub use path::{PathParseError, StructuralPath};
pub use shadow::ShadowDocument;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ModelError {
    #[error("no node exists at path {path}")]
    NoSuchPath { path: StructuralPath },

    #[error("node at path {path} is not a text leaf")]
    NotAText { path: StructuralPath },

    #[error("node at path {path} is not an element")]
    NotAnElement { path: StructuralPath },
}

/// A single node of the document tree.
///
/// The serialized form matches the host's wire shape: text leaves are
/// `{"text": …}` objects, elements are `{"type": …, "children": […]}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DocNode {
    Text(TextNode),
    Element(ElementNode),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextNode {
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementNode {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub children: Vec<DocNode>,
}

impl DocNode {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(TextNode { text: text.into() })
    }

    pub fn element(kind: impl Into<String>, children: Vec<DocNode>) -> Self {
        Self::Element(ElementNode {
            kind: kind.into(),
            children,
        })
    }

    pub fn is_text(&self) -> bool {
        matches!(self, Self::Text(_))
    }

    pub fn children(&self) -> &[DocNode] {
        match self {
            Self::Element(el) => &el.children,
            Self::Text(_) => &[],
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(t) => Some(&t.text),
            Self::Element(_) => None,
        }
    }

    pub fn kind(&self) -> Option<&str> {
        match self {
            Self::Element(el) => Some(&el.kind),
            Self::Text(_) => None,
        }
    }
}

/// The whole document: an ordered list of root nodes.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentModel {
    pub children: Vec<DocNode>,
}

impl DocumentModel {
    pub fn new(children: Vec<DocNode>) -> Self {
        Self { children }
    }

    /// Resolve a path to its node. The root path addresses the document
    /// itself, which is not a node, so it resolves to `None`.
    pub fn node_at(&self, path: &StructuralPath) -> Option<&DocNode> {
        let mut children = &self.children[..];
        let mut found = None;
        for &index in path.segments() {
            let node = children.get(index)?;
            children = node.children();
            found = Some(node);
        }
        found
    }

    pub fn node_at_mut(&mut self, path: &StructuralPath) -> Option<&mut DocNode> {
        let segments = path.segments();
        let (&leaf_index, ancestors) = segments.split_last()?;
        let mut children = &mut self.children;
        for &index in ancestors {
            match children.get_mut(index)? {
                DocNode::Element(el) => children = &mut el.children,
                DocNode::Text(_) => return None,
            }
        }
        children.get_mut(leaf_index)
    }

    pub fn text_at(&self, path: &StructuralPath) -> Option<&str> {
        self.node_at(path).and_then(DocNode::as_text)
    }

    /// Concatenated text of every leaf under `path`, in document order.
    /// The root path yields the whole document's text.
    pub fn plain_text_of(&self, path: &StructuralPath) -> Option<String> {
        let nodes: &[DocNode] = if path.is_root() {
            &self.children
        } else {
            match self.node_at(path)? {
                DocNode::Text(t) => return Some(t.text.clone()),
                DocNode::Element(el) => &el.children,
            }
        };
        let mut out = String::new();
        let mut stack: Vec<&DocNode> = nodes.iter().rev().collect();
        while let Some(node) = stack.pop() {
            match node {
                DocNode::Text(t) => out.push_str(&t.text),
                DocNode::Element(el) => stack.extend(el.children.iter().rev()),
            }
        }
        Some(out)
    }
}
