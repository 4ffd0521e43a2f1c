use crate::codec::placeholder;
use crate::model::{DocNode, DocumentModel, ModelError, StructuralPath, TextNode};

/// The bridge-owned working copy of the document.
///
/// Local text mutations are written here immediately so that every read made
/// before the next host round-trip observes them; the host replaces the whole
/// copy with each inbound snapshot. Exactly one shadow exists per bridge
/// instance. Zero-width cursor anchors never enter the shadow: all writes
/// strip them first, so no read can leak an editor affordance back into the
/// document.
#[derive(Debug, Clone, Default)]
pub struct ShadowDocument {
    doc: DocumentModel,
    revision: u64,
}

impl ShadowDocument {
    pub fn new(doc: DocumentModel) -> Self {
        Self { doc, revision: 0 }
    }

    pub fn document(&self) -> &DocumentModel {
        &self.doc
    }

    /// Bumped on every mutation, including host replacement.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Apply a host snapshot, discarding local state.
    pub fn replace(&mut self, doc: DocumentModel) {
        self.doc = doc;
        self.revision += 1;
    }

    /// Replace the literal text of the leaf at `path`.
    pub fn set_text(&mut self, path: &StructuralPath, text: &str) -> Result<(), ModelError> {
        let node = self
            .doc
            .node_at_mut(path)
            .ok_or_else(|| ModelError::NoSuchPath { path: path.clone() })?;
        match node {
            DocNode::Text(leaf) => {
                leaf.text = placeholder::strip(text);
                self.revision += 1;
                Ok(())
            }
            DocNode::Element(_) => Err(ModelError::NotAText { path: path.clone() }),
        }
    }

    /// Replace the element at `path` with a single text leaf holding `text`.
    /// This is how plain and multi-line fields are written back: the field's
    /// rendered markup may be arbitrarily nested, but its model value is flat.
    pub fn set_field_text(&mut self, path: &StructuralPath, text: &str) -> Result<(), ModelError> {
        let node = self
            .doc
            .node_at_mut(path)
            .ok_or_else(|| ModelError::NoSuchPath { path: path.clone() })?;
        match node {
            DocNode::Element(el) => {
                el.children = vec![DocNode::Text(TextNode {
                    text: placeholder::strip(text),
                })];
                self.revision += 1;
                Ok(())
            }
            DocNode::Text(_) => Err(ModelError::NotAnElement { path: path.clone() }),
        }
    }

    pub fn plain_text_of(&self, path: &StructuralPath) -> Option<String> {
        self.doc.plain_text_of(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::placeholder::CURSOR_ANCHOR;
    use pretty_assertions::assert_eq;

    fn shadow() -> ShadowDocument {
        ShadowDocument::new(DocumentModel::new(vec![DocNode::element(
            "p",
            vec![
                DocNode::text("Hello "),
                DocNode::element("strong", vec![DocNode::text("world")]),
            ],
        )]))
    }

    #[test]
    fn set_text_replaces_leaf_and_bumps_revision() {
        let mut shadow = shadow();
        let before = shadow.revision();
        shadow.set_text(&vec![0, 1, 0].into(), "moon").unwrap();
        assert_eq!(shadow.plain_text_of(&vec![0].into()).unwrap(), "Hello moon");
        assert_eq!(shadow.revision(), before + 1);
    }

    #[test]
    fn set_text_rejects_elements() {
        let mut shadow = shadow();
        let err = shadow.set_text(&vec![0, 1].into(), "x").unwrap_err();
        assert_eq!(
            err,
            ModelError::NotAText {
                path: vec![0, 1].into()
            }
        );
    }

    #[test]
    fn set_field_text_flattens_children() {
        let mut shadow = shadow();
        shadow.set_field_text(&vec![0].into(), "rewritten").unwrap();
        assert_eq!(shadow.document().children[0].children().len(), 1);
        assert_eq!(shadow.plain_text_of(&vec![0].into()).unwrap(), "rewritten");
    }

    #[test]
    fn cursor_anchors_never_reach_the_model() {
        let mut shadow = shadow();
        let typed = format!("wor{CURSOR_ANCHOR}ld");
        shadow.set_text(&vec![0, 1, 0].into(), &typed).unwrap();
        assert_eq!(shadow.document().text_at(&vec![0, 1, 0].into()), Some("world"));
    }

    #[test]
    fn missing_paths_are_loud() {
        let mut shadow = shadow();
        let err = shadow.set_text(&vec![3].into(), "x").unwrap_err();
        assert_eq!(err, ModelError::NoSuchPath { path: vec![3].into() });
    }
}
