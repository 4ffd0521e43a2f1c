use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Positional address of a node in the document tree.
///
/// A path is the sequence of child indices walked from the document root to
/// reach a node: `[0, 1, 0]` is "first root node, its second child, its first
/// child". Paths are recomputed on every document mutation and are only valid
/// against the document the surface last rendered — a path computed against a
/// stale document must be re-resolved, never trusted.
///
/// On the wire a path is a JSON array of indices; in rendered markup it is the
/// dot-joined form (`"0.1.0"`) carried by the binding attribute.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StructuralPath(Vec<usize>);

#[derive(Debug, Error, PartialEq)]
#[error("invalid structural path segment {segment:?} in {input:?}")]
pub struct PathParseError {
    pub input: String,
    pub segment: String,
}

impl StructuralPath {
    /// The document root itself (an empty path).
    pub fn root() -> Self {
        Self(Vec::new())
    }

    pub fn from_segments(segments: Vec<usize>) -> Self {
        Self(segments)
    }

    pub fn segments(&self) -> &[usize] {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Index of this node among its siblings, `None` for the root.
    pub fn last(&self) -> Option<usize> {
        self.0.last().copied()
    }

    pub fn parent(&self) -> Option<Self> {
        if self.0.is_empty() {
            None
        } else {
            Some(Self(self.0[..self.0.len() - 1].to_vec()))
        }
    }

    pub fn child(&self, index: usize) -> Self {
        let mut segments = self.0.clone();
        segments.push(index);
        Self(segments)
    }

    /// Strict-prefix test: the root is an ancestor of everything but itself.
    pub fn is_ancestor_of(&self, other: &Self) -> bool {
        self.0.len() < other.0.len() && other.0[..self.0.len()] == self.0[..]
    }
}

impl fmt::Display for StructuralPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for segment in &self.0 {
            if !first {
                write!(f, ".")?;
            }
            write!(f, "{segment}")?;
            first = false;
        }
        Ok(())
    }
}

impl FromStr for StructuralPath {
    type Err = PathParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Ok(Self::root());
        }
        let mut segments = Vec::new();
        for part in s.split('.') {
            let segment = part.parse::<usize>().map_err(|_| PathParseError {
                input: s.to_string(),
                segment: part.to_string(),
            })?;
            segments.push(segment);
        }
        Ok(Self(segments))
    }
}

impl From<Vec<usize>> for StructuralPath {
    fn from(segments: Vec<usize>) -> Self {
        Self(segments)
    }
}

impl From<&[usize]> for StructuralPath {
    fn from(segments: &[usize]) -> Self {
        Self(segments.to_vec())
    }
}
