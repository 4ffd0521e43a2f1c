//! Selection codec: bidirectional mapping between live cursor positions in
//! the rendered tree and structural path + offset positions in the document
//! model.
//!
//! Serialization ([`serialize_point`]) walks from a rendered node to its
//! nearest bound ancestor and derives the model position from the binding
//! attributes, never from raw sibling counting — multiple rendered elements
//! may share one path (wrapper collapsing) and transparent wrappers must not
//! shift indices. Resolution ([`resolve_point`]) goes the other way and owns
//! the two zero-width anchor placements ("cursor exit" and "prospective
//! formatting") that let a caret sit where the model has no text.
//!
//! Failures are split by recovery strategy: [`CodecError::Unresolvable`] and
//! [`CodecError::NotYetRendered`] are transient (the caller retries once the
//! render settles), [`CodecError::NotApplicable`] means the unit carries no
//! bound content at all, and [`CodecError::Desync`] is a structural
//! mismatch that must be surfaced, never guessed around.

pub mod placeholder;
mod resolve;
mod serialize;

pub use resolve::{resolve_point, resolve_selection, ResolvedCaret, ResolvedSelection};
pub use serialize::{serialize_point, serialize_selection};

use crate::model::StructuralPath;
use crate::view::NodeId;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A model-space selection endpoint: the point `offset` visible characters
/// into the text run addressed by `path` (or, when `path` addresses an
/// element, the boundary before child index `offset`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionPoint {
    pub path: StructuralPath,
    pub offset: usize,
}

impl SelectionPoint {
    pub fn new(path: impl Into<StructuralPath>, offset: usize) -> Self {
        Self {
            path: path.into(),
            offset,
        }
    }
}

/// An ordered pair of endpoints; equal endpoints denote a collapsed cursor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    pub anchor: SelectionPoint,
    pub focus: SelectionPoint,
}

impl Selection {
    pub fn caret(point: SelectionPoint) -> Self {
        Self {
            anchor: point.clone(),
            focus: point,
        }
    }

    pub fn is_collapsed(&self) -> bool {
        self.anchor == self.focus
    }
}

/// A view-space selection endpoint.
///
/// `InText` offsets are raw character offsets into the run's content
/// (anchors included); `InElement` child indices address the element's
/// *logical* children (after wrapper collapsing).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewPoint {
    InText { node: NodeId, offset: usize },
    InElement { node: NodeId, child_index: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewSelection {
    pub anchor: ViewPoint,
    pub focus: ViewPoint,
}

impl ViewSelection {
    pub fn caret(point: ViewPoint) -> Self {
        Self {
            anchor: point,
            focus: point,
        }
    }

    pub fn is_collapsed(&self) -> bool {
        self.anchor == self.focus
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum CodecError {
    /// No bound ancestor is reachable yet the unit does contain bound
    /// content. Retry after the next render settles; never guess.
    #[error("selection endpoint is not resolvable against the current rendering")]
    Unresolvable,

    /// The containing unit has no bound nodes at all: it is not a
    /// structured field and serialization legitimately does not apply.
    #[error("containing unit has no bound content")]
    NotApplicable,

    /// The path does not exist in the current document model.
    #[error("structural desync: no model node at path {path}")]
    Desync { path: StructuralPath },

    /// The model has the node but the rendering has not caught up.
    /// Transient; the caller retries.
    #[error("no rendered element for path {path} yet")]
    NotYetRendered { path: StructuralPath },

    /// The view point references a node that left the tree.
    #[error("view point references a detached node")]
    DetachedNode,

    /// The view point is malformed (text offset on an element, etc).
    #[error("view point does not match the node it references")]
    InvalidViewPoint,
}

impl CodecError {
    /// Transient failures are retried with bounded backoff and never
    /// surfaced to the user.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Unresolvable | Self::NotYetRendered { .. } | Self::DetachedNode
        )
    }
}
