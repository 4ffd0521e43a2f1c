//! Rendered position → model position.

use super::placeholder;
use super::{CodecError, Selection, SelectionPoint, ViewPoint, ViewSelection};
use crate::model::StructuralPath;
use crate::view::binding::{
    self, LogicalChild, nearest_bound_ancestor, unit_root, UNIT_ATTR,
};
use crate::view::{NodeId, VisualTree};
use std::cmp::Ordering;

pub fn serialize_selection(
    tree: &VisualTree,
    selection: &ViewSelection,
) -> Result<Selection, CodecError> {
    let anchor = serialize_point(tree, &selection.anchor)?;
    let focus = if selection.is_collapsed() {
        anchor.clone()
    } else {
        serialize_point(tree, &selection.focus)?
    };
    Ok(Selection { anchor, focus })
}

pub fn serialize_point(tree: &VisualTree, point: &ViewPoint) -> Result<SelectionPoint, CodecError> {
    match *point {
        ViewPoint::InText { node, offset } => serialize_in_text(tree, node, offset),
        ViewPoint::InElement { node, child_index } => serialize_in_element(tree, node, child_index),
    }
}

fn serialize_in_text(
    tree: &VisualTree,
    node: NodeId,
    raw_offset: usize,
) -> Result<SelectionPoint, CodecError> {
    if !tree.is_attached(node) {
        return Err(CodecError::DetachedNode);
    }
    let run = tree.text(node).ok_or(CodecError::InvalidViewPoint)?;

    if placeholder::is_anchor_only(run) {
        return serialize_anchor_run(tree, node);
    }
    if is_artifact_run(tree, node) {
        return fallback_to_content_edge(tree, node);
    }

    let (element, element_path) =
        nearest_bound_ancestor(tree, node).ok_or_else(|| no_binding_error(tree, node))?;

    let mut model_index = 0usize;
    for child in binding::logical_children(tree, element) {
        match child {
            LogicalChild::Text(run_node) => {
                if run_node == node {
                    let offset = placeholder::rendered_prefix_len(run, raw_offset);
                    return Ok(SelectionPoint::new(element_path.child(model_index), offset));
                }
                let text = tree.text(run_node).unwrap_or_default();
                if !placeholder::is_anchor_only(text) && !is_artifact_run(tree, run_node) {
                    model_index += 1;
                }
            }
            LogicalChild::Element { path, .. } => {
                // resync from the authoritative binding attribute rather
                // than counting rendered siblings
                model_index = path.last().map_or(model_index + 1, |i| i + 1);
            }
        }
    }
    Err(CodecError::Unresolvable)
}

fn serialize_in_element(
    tree: &VisualTree,
    node: NodeId,
    child_index: usize,
) -> Result<SelectionPoint, CodecError> {
    if !tree.is_attached(node) {
        return Err(CodecError::DetachedNode);
    }
    if !tree.is_element(node) {
        return Err(CodecError::InvalidViewPoint);
    }
    let (element, element_path) =
        nearest_bound_ancestor(tree, node).ok_or_else(|| no_binding_error(tree, node))?;
    if element != node {
        // element-granular points on unbound chrome cannot be trusted
        return Err(no_binding_error(tree, node));
    }

    let mut model_index = 0usize;
    for child in binding::logical_children(tree, element)
        .into_iter()
        .take(child_index)
    {
        match child {
            LogicalChild::Text(run_node) => {
                let text = tree.text(run_node).unwrap_or_default();
                if !placeholder::is_anchor_only(text) && !is_artifact_run(tree, run_node) {
                    model_index += 1;
                }
            }
            LogicalChild::Element { path, .. } => {
                model_index = path.last().map_or(model_index + 1, |i| i + 1);
            }
        }
    }
    Ok(SelectionPoint::new(element_path, model_index))
}

/// Map a caret sitting on a zero-width anchor run back to the affordance
/// that created it: either "inside an empty inline element" (prospective
/// formatting) or "immediately after a trailing inline element" (cursor
/// exit). Both serialize as element-granular points, which is what
/// re-resolution expects.
fn serialize_anchor_run(tree: &VisualTree, node: NodeId) -> Result<SelectionPoint, CodecError> {
    let (element, element_path) =
        nearest_bound_ancestor(tree, node).ok_or(CodecError::Unresolvable)?;

    let mut preceding_element: Option<StructuralPath> = None;
    for child in binding::logical_children(tree, element) {
        match child {
            LogicalChild::Text(run_node) => {
                if run_node == node {
                    return Ok(match &preceding_element {
                        // cursor exit: the point after the preceding child
                        Some(path) => SelectionPoint::new(
                            element_path.clone(),
                            path.last().map_or(0, |i| i + 1),
                        ),
                        // prospective formatting (or a leading anchor):
                        // the boundary before any content
                        None => SelectionPoint::new(element_path.clone(), 0),
                    });
                }
            }
            LogicalChild::Element { path, .. } => {
                preceding_element = Some(path);
            }
        }
    }
    Err(CodecError::Unresolvable)
}

/// A run is ignorable rendering whitespace when it is whitespace-only and
/// sits outside any bound element — or directly under a bound unit root,
/// where templating frameworks commonly leave indentation between the
/// unit's real bound children.
pub(crate) fn is_artifact_run(tree: &VisualTree, node: NodeId) -> bool {
    let Some(text) = tree.text(node) else {
        return false;
    };
    if !placeholder::is_whitespace_artifact_text(text) || placeholder::is_anchor_only(text) {
        return false;
    }
    match nearest_bound_ancestor(tree, node) {
        None => true,
        Some((element, _)) => tree.attr(element, UNIT_ATTR).is_some(),
    }
}

/// Every bound, non-artifact text run inside the unit, in document order.
fn bound_runs_of_unit(tree: &VisualTree, unit: NodeId) -> Vec<NodeId> {
    tree.descendants(unit)
        .into_iter()
        .filter(|&n| {
            let Some(text) = tree.text(n) else { return false };
            !placeholder::is_anchor_only(text)
                && !is_artifact_run(tree, n)
                && nearest_bound_ancestor(tree, n).is_some()
        })
        .collect()
}

/// The un-bound whitespace fallback: address the nearest content edge of
/// the containing unit — the start of its first bound run when the point
/// precedes all content, the end of its last bound run otherwise. Never
/// address a path into the whitespace itself.
fn fallback_to_content_edge(tree: &VisualTree, node: NodeId) -> Result<SelectionPoint, CodecError> {
    let unit = unit_root(tree, node).ok_or(CodecError::NotApplicable)?;
    let runs = bound_runs_of_unit(tree, unit);
    let (Some(&first), Some(&last)) = (runs.first(), runs.last()) else {
        return Err(CodecError::NotApplicable);
    };
    if tree.document_order(node, first) == Ordering::Less {
        serialize_in_text(tree, first, 0)
    } else {
        let len = tree.text(last).map_or(0, |t| t.chars().count());
        serialize_in_text(tree, last, len)
    }
}

/// Distinguish "retry later" from "not a structured field at all".
fn no_binding_error(tree: &VisualTree, node: NodeId) -> CodecError {
    match unit_root(tree, node) {
        Some(unit) if !bound_runs_of_unit(tree, unit).is_empty() => CodecError::Unresolvable,
        _ => CodecError::NotApplicable,
    }
}
