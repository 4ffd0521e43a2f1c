//! Model position → rendered caret placement.

use super::placeholder::{self, CURSOR_ANCHOR};
use super::serialize::is_artifact_run;
use super::{CodecError, Selection, SelectionPoint, ViewPoint};
use crate::model::{DocNode, DocumentModel, StructuralPath};
use crate::view::binding::{self, LogicalChild};
use crate::view::{NodeId, VisualTree};

/// A resolved caret endpoint. When resolution had to materialize a
/// zero-width anchor in the rendered text, `inserted_anchor` names the new
/// run so the embedder can mirror it into the real rendering.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedCaret {
    pub point: ViewPoint,
    pub inserted_anchor: Option<NodeId>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedSelection {
    pub anchor: ResolvedCaret,
    pub focus: ResolvedCaret,
}

pub fn resolve_selection(
    tree: &mut VisualTree,
    doc: &DocumentModel,
    selection: &Selection,
) -> Result<ResolvedSelection, CodecError> {
    let anchor = resolve_point(tree, doc, &selection.anchor)?;
    let focus = if selection.is_collapsed() {
        anchor.clone()
    } else {
        resolve_point(tree, doc, &selection.focus)?
    };
    Ok(ResolvedSelection { anchor, focus })
}

/// Resolve a model-space point to a rendered caret.
///
/// Text leaves are never individually bound, so a leaf resolves through its
/// parent's rendered element and the leaf's index among its model siblings.
/// Element-granular points place the caret at a child boundary and own the
/// two anchor rules: "cursor exit" (a boundary after an inline element with
/// no following text) and "prospective formatting" (inside an empty inline
/// element). If the rendering has not caught up with the document yet the
/// result is [`CodecError::NotYetRendered`] and the caller must retry —
/// applying a default position here would move the user's cursor.
pub fn resolve_point(
    tree: &mut VisualTree,
    doc: &DocumentModel,
    point: &SelectionPoint,
) -> Result<ResolvedCaret, CodecError> {
    if point.path.is_root() {
        return resolve_in_element(tree, doc, &point.path, point.offset);
    }
    match doc.node_at(&point.path) {
        None => Err(CodecError::Desync {
            path: point.path.clone(),
        }),
        Some(DocNode::Text(_)) => resolve_in_text_leaf(tree, doc, point),
        Some(DocNode::Element(_)) => resolve_in_element(tree, doc, &point.path, point.offset),
    }
}

fn rendered_element_for(
    tree: &VisualTree,
    path: &StructuralPath,
) -> Result<NodeId, CodecError> {
    if path.is_root() {
        return Ok(tree.root());
    }
    binding::primary_element_for_path(tree, path).ok_or_else(|| CodecError::NotYetRendered {
        path: path.clone(),
    })
}

/// The rendered text run occupying model child slot `leaf_index` of
/// `element`, using the binding attributes of intervening element children
/// to resync the count (wrapper collapsing safe).
fn run_for_leaf_index(
    tree: &VisualTree,
    element: NodeId,
    leaf_index: usize,
) -> Option<NodeId> {
    let mut model_index = 0usize;
    for child in binding::logical_children(tree, element) {
        match child {
            LogicalChild::Text(run_node) => {
                let text = tree.text(run_node).unwrap_or_default();
                if placeholder::is_anchor_only(text) || is_artifact_run(tree, run_node) {
                    continue;
                }
                if model_index == leaf_index {
                    return Some(run_node);
                }
                model_index += 1;
            }
            LogicalChild::Element { path, .. } => {
                model_index = path.last().map_or(model_index + 1, |i| i + 1);
            }
        }
    }
    None
}

fn resolve_in_text_leaf(
    tree: &mut VisualTree,
    doc: &DocumentModel,
    point: &SelectionPoint,
) -> Result<ResolvedCaret, CodecError> {
    // leaves are never individually bound: resolve through the parent
    let parent_path = point.path.parent().unwrap_or_else(StructuralPath::root);
    let leaf_index = point.path.last().unwrap_or(0);
    let element = rendered_element_for(tree, &parent_path)?;
    let run = run_for_leaf_index(tree, element, leaf_index).ok_or_else(|| {
        CodecError::NotYetRendered {
            path: point.path.clone(),
        }
    })?;
    let text = tree.text(run).unwrap_or_default();
    let rendered = point.offset.min(placeholder::rendered_len(text));
    let raw = placeholder::raw_offset_for_rendered(text, rendered);
    Ok(ResolvedCaret {
        point: ViewPoint::InText { node: run, offset: raw },
        inserted_anchor: None,
    })
}

fn model_children_of<'a>(doc: &'a DocumentModel, path: &StructuralPath) -> Option<&'a [DocNode]> {
    if path.is_root() {
        Some(&doc.children)
    } else {
        doc.node_at(path).map(DocNode::children)
    }
}

fn resolve_in_element(
    tree: &mut VisualTree,
    doc: &DocumentModel,
    path: &StructuralPath,
    child_offset: usize,
) -> Result<ResolvedCaret, CodecError> {
    let children = model_children_of(doc, path).ok_or_else(|| CodecError::Desync {
        path: path.clone(),
    })?;
    let element = rendered_element_for(tree, path)?;

    // prospective formatting: an empty inline element gets a zero-width
    // anchor so the collapsed cursor has somewhere to sit
    if children.is_empty() {
        let anchor = tree.append_text(element, &CURSOR_ANCHOR.to_string());
        return Ok(ResolvedCaret {
            point: ViewPoint::InText {
                node: anchor,
                offset: 1,
            },
            inserted_anchor: Some(anchor),
        });
    }

    let index = child_offset.min(children.len());

    // a text leaf at the boundary: the caret belongs at its start
    if index < children.len() && children[index].is_text() {
        return resolve_in_text_leaf(
            tree,
            doc,
            &SelectionPoint::new(path.child(index), 0),
        );
    }

    if index > 0 {
        match &children[index - 1] {
            // the boundary follows a text leaf: park at its end
            DocNode::Text(leaf) => resolve_in_text_leaf(
                tree,
                doc,
                &SelectionPoint::new(path.child(index - 1), leaf.text.chars().count()),
            ),
            // cursor exit: the boundary follows an inline element with no
            // following text, so materialize an anchor right after it
            DocNode::Element(_) => {
                let prev_path = path.child(index - 1);
                let prev = binding::primary_element_for_path(tree, &prev_path).ok_or(
                    CodecError::NotYetRendered { path: prev_path },
                )?;
                let anchor = tree
                    .insert_text_after(prev, &CURSOR_ANCHOR.to_string())
                    .ok_or(CodecError::DetachedNode)?;
                Ok(ResolvedCaret {
                    point: ViewPoint::InText {
                        node: anchor,
                        offset: 1,
                    },
                    inserted_anchor: Some(anchor),
                })
            }
        }
    } else {
        // boundary before an element child: element-granular placement
        let target_path = path.child(0);
        let view_index = binding::logical_children(tree, element)
            .iter()
            .position(|c| matches!(c, LogicalChild::Element { path, .. } if *path == target_path))
            .unwrap_or(0);
        Ok(ResolvedCaret {
            point: ViewPoint::InElement {
                node: element,
                child_index: view_index,
            },
            inserted_anchor: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::serialize_point;
    use crate::model::DocNode;
    use crate::view::binding::PATH_ATTR;
    use pretty_assertions::assert_eq;

    /// <p data-sync-path="0">"Hello " <strong data-sync-path="0.1">"world"</strong></p>
    fn rendered_paragraph() -> (VisualTree, DocumentModel, NodeId, NodeId) {
        let doc = DocumentModel::new(vec![DocNode::element(
            "p",
            vec![
                DocNode::text("Hello "),
                DocNode::element("strong", vec![DocNode::text("world")]),
            ],
        )]);
        let mut tree = VisualTree::new("main");
        let p = tree.append_element(tree.root(), "p");
        tree.set_attr(p, PATH_ATTR, "0");
        tree.append_text(p, "Hello ");
        let strong = tree.append_element(p, "strong");
        tree.set_attr(strong, PATH_ATTR, "0.1");
        tree.append_text(strong, "world");
        (tree, doc, p, strong)
    }

    #[test]
    fn text_leaf_resolves_through_parent_element() {
        let (mut tree, doc, _p, strong) = rendered_paragraph();
        let caret = resolve_point(&mut tree, &doc, &SelectionPoint::new(vec![0, 1, 0], 5)).unwrap();
        let ViewPoint::InText { node, offset } = caret.point else {
            panic!("expected text placement");
        };
        assert_eq!(tree.parent(node), Some(strong));
        assert_eq!(offset, 5);
        assert_eq!(caret.inserted_anchor, None);
    }

    #[test]
    fn offset_clamps_to_rendered_length() {
        let (mut tree, doc, _p, _strong) = rendered_paragraph();
        let caret =
            resolve_point(&mut tree, &doc, &SelectionPoint::new(vec![0, 1, 0], 99)).unwrap();
        let ViewPoint::InText { offset, .. } = caret.point else {
            panic!();
        };
        assert_eq!(offset, 5);
    }

    #[test]
    fn cursor_exit_inserts_anchor_after_trailing_inline() {
        let (mut tree, doc, p, strong) = rendered_paragraph();
        // boundary after the <strong> (child index 2 of the paragraph)
        let caret = resolve_point(&mut tree, &doc, &SelectionPoint::new(vec![0], 2)).unwrap();
        let anchor = caret.inserted_anchor.expect("anchor inserted");
        assert_eq!(tree.prev_sibling(anchor), Some(strong));
        assert_eq!(tree.parent(anchor), Some(p));
        assert_eq!(
            caret.point,
            ViewPoint::InText {
                node: anchor,
                offset: 1
            }
        );
        // the anchor run serializes back to the same boundary
        let round = serialize_point(
            &tree,
            &ViewPoint::InText {
                node: anchor,
                offset: 1,
            },
        )
        .unwrap();
        assert_eq!(round, SelectionPoint::new(vec![0], 2));
    }

    #[test]
    fn prospective_formatting_fills_empty_inline() {
        let doc = DocumentModel::new(vec![DocNode::element(
            "p",
            vec![DocNode::element("em", vec![])],
        )]);
        let mut tree = VisualTree::new("main");
        let p = tree.append_element(tree.root(), "p");
        tree.set_attr(p, PATH_ATTR, "0");
        let em = tree.append_element(p, "em");
        tree.set_attr(em, PATH_ATTR, "0.0");
        let caret = resolve_point(&mut tree, &doc, &SelectionPoint::new(vec![0, 0], 0)).unwrap();
        let anchor = caret.inserted_anchor.expect("anchor inserted");
        assert_eq!(tree.parent(anchor), Some(em));
        let round = serialize_point(
            &tree,
            &ViewPoint::InText {
                node: anchor,
                offset: 1,
            },
        )
        .unwrap();
        assert_eq!(round, SelectionPoint::new(vec![0, 0], 0));
    }

    #[test]
    fn missing_model_path_is_a_desync() {
        let (mut tree, doc, _p, _strong) = rendered_paragraph();
        let err = resolve_point(&mut tree, &doc, &SelectionPoint::new(vec![4], 0)).unwrap_err();
        assert_eq!(
            err,
            CodecError::Desync {
                path: vec![4].into()
            }
        );
    }

    #[test]
    fn unrendered_path_asks_for_retry() {
        let (_, doc, ..) = rendered_paragraph();
        // a tree that has not rendered the strong element yet
        let mut stale = VisualTree::new("main");
        let p = stale.append_element(stale.root(), "p");
        stale.set_attr(p, PATH_ATTR, "0");
        stale.append_text(p, "Hello ");
        let err =
            resolve_point(&mut stale, &doc, &SelectionPoint::new(vec![0, 1, 0], 2)).unwrap_err();
        assert!(err.is_transient(), "{err:?}");
    }
}
