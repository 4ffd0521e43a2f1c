//! The binding contract between rendered markup and the document model.
//!
//! A rendered element is *bound* to a model node only when it carries that
//! node's structural path in [`PATH_ATTR`]. Everything else — layout divs,
//! framework wrappers, whitespace emitted by a templating engine — is
//! transparent: skipped, not counted, when matching model children to
//! visual children. Two adjacent elements sharing one path are one logical
//! unit (a node plus its own wrapper); only the first in document order is
//! authoritative.

use super::{NodeId, VisualTree};
use crate::model::StructuralPath;

/// Structural path of the model node this element renders.
pub const PATH_ATTR: &str = "data-sync-path";
/// Identity of the editable unit this element roots.
pub const UNIT_ATTR: &str = "data-sync-unit";
/// Declared type of the unit (schema lookup key).
pub const TYPE_ATTR: &str = "data-sync-type";
/// Field name within the owning unit.
pub const FIELD_ATTR: &str = "data-sync-field";
/// Navigation control: makes the named unit visible directly.
pub const NAV_GOTO_ATTR: &str = "data-sync-goto";
/// Navigation control: advance the containing group by one.
pub const NAV_NEXT_ATTR: &str = "data-sync-next";
/// Navigation control: step the containing group back by one.
pub const NAV_PREV_ATTR: &str = "data-sync-prev";

pub fn bound_path(tree: &VisualTree, node: NodeId) -> Option<StructuralPath> {
    tree.attr(node, PATH_ATTR)?.parse().ok()
}

/// Nearest self-or-ancestor element carrying a parseable path attribute.
pub fn nearest_bound_ancestor(
    tree: &VisualTree,
    node: NodeId,
) -> Option<(NodeId, StructuralPath)> {
    tree.ancestors_inclusive(node)
        .find_map(|n| bound_path(tree, n).map(|p| (n, p)))
}

/// The authoritative rendered element for a path: the first element in
/// document order that carries it (wrapper collapsing).
pub fn primary_element_for_path(tree: &VisualTree, path: &StructuralPath) -> Option<NodeId> {
    let wanted = path.to_string();
    tree.descendants(tree.root())
        .into_iter()
        .find(|&n| tree.attr(n, PATH_ATTR) == Some(wanted.as_str()))
}

/// Nearest self-or-ancestor element that roots an editable unit.
pub fn unit_root(tree: &VisualTree, node: NodeId) -> Option<NodeId> {
    tree.ancestors_inclusive(node)
        .find(|&n| tree.attr(n, UNIT_ATTR).is_some())
}

pub fn unit_id_of(tree: &VisualTree, node: NodeId) -> Option<&str> {
    tree.attr(node, UNIT_ATTR)
}

/// First element in document order rooting the unit with this identity.
pub fn find_unit(tree: &VisualTree, unit_id: &str) -> Option<NodeId> {
    tree.descendants(tree.root())
        .into_iter()
        .find(|&n| tree.attr(n, UNIT_ATTR) == Some(unit_id))
}

/// First element in document order carrying `attr` = `value`.
pub fn find_by_attr(tree: &VisualTree, attr: &str, value: &str) -> Option<NodeId> {
    tree.descendants(tree.root())
        .into_iter()
        .find(|&n| tree.attr(n, attr) == Some(value))
}

/// A logical child of a bound element, after wrapper collapsing.
#[derive(Debug, Clone, PartialEq)]
pub enum LogicalChild {
    /// A rendered text run (may contain zero-width cursor anchors).
    Text(NodeId),
    /// A bound descendant element, with its path.
    Element { node: NodeId, path: StructuralPath },
}

/// The logical children of a bound element: its rendered text runs and bound
/// descendant elements, with transparent wrappers flattened away, same-path
/// wrappers of the element itself descended into, and duplicate same-path
/// siblings collapsed onto the first occurrence.
pub fn logical_children(tree: &VisualTree, element: NodeId) -> Vec<LogicalChild> {
    let own_path = bound_path(tree, element);
    let mut out = Vec::new();
    let mut seen = std::collections::BTreeSet::new();
    let mut stack: Vec<NodeId> = tree.children(element).iter().rev().copied().collect();
    while let Some(node) = stack.pop() {
        if tree.text(node).is_some() {
            out.push(LogicalChild::Text(node));
            continue;
        }
        match bound_path(tree, node) {
            Some(path) if Some(&path) == own_path.as_ref() => {
                // the element's own wrapper: its children are our children
                stack.extend(tree.children(node).iter().rev());
            }
            Some(path) => {
                if seen.insert(path.clone()) {
                    out.push(LogicalChild::Element { node, path });
                }
            }
            None => {
                // transparent wrapper
                stack.extend(tree.children(node).iter().rev());
            }
        }
    }
    out
}
