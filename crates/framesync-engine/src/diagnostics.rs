//! Structural-desync diagnostics.
//!
//! When a path stops matching the rendering, the bridge logs both sides of
//! the disagreement: the rendered subtree and the logical subtree. The full
//! dump always goes to the log; the visible developer warning fires once
//! per session so a systematically broken rendering does not bury the
//! editor in alerts.

use crate::model::{DocNode, DocumentModel, StructuralPath};
use crate::view::binding::PATH_ATTR;
use crate::view::{NodeId, VisualTree};
use std::fmt::Write;

/// Indented dump of a rendered subtree: tags, binding attributes, text.
pub fn dump_visual_subtree(tree: &VisualTree, root: NodeId) -> String {
    let mut out = String::new();
    let mut stack = vec![(root, 0usize)];
    while let Some((node, depth)) = stack.pop() {
        let pad = "  ".repeat(depth);
        if let Some(text) = tree.text(node) {
            let printable: String = text
                .chars()
                .map(|c| if c == '\u{FEFF}' { '¤' } else { c })
                .collect();
            let _ = writeln!(out, "{pad}{printable:?}");
        } else if let Some(el) = tree.element(node) {
            let path = tree
                .attr(node, PATH_ATTR)
                .map(|p| format!(" path={p}"))
                .unwrap_or_default();
            let _ = writeln!(out, "{pad}<{}{path}>", el.tag);
            for &child in tree.children(node).iter().rev() {
                stack.push((child, depth + 1));
            }
        }
    }
    out
}

/// Indented dump of the model subtree at `path` (the whole document for the
/// root path, a placeholder line when the path is dangling).
pub fn dump_model_subtree(doc: &DocumentModel, path: &StructuralPath) -> String {
    let mut out = String::new();
    let roots: Vec<(&DocNode, usize)> = if path.is_root() {
        doc.children.iter().map(|n| (n, 0)).collect()
    } else {
        match doc.node_at(path) {
            Some(node) => vec![(node, 0)],
            None => {
                let _ = writeln!(out, "(no node at {path})");
                return out;
            }
        }
    };
    let mut stack: Vec<(&DocNode, usize)> = roots.into_iter().rev().collect();
    while let Some((node, depth)) = stack.pop() {
        let pad = "  ".repeat(depth);
        match node {
            DocNode::Text(t) => {
                let _ = writeln!(out, "{pad}{:?}", t.text);
            }
            DocNode::Element(el) => {
                let _ = writeln!(out, "{pad}{}", el.kind);
                for child in el.children.iter().rev() {
                    stack.push((child, depth + 1));
                }
            }
        }
    }
    out
}

/// Once-per-session gate for the visible desync warning. Logging is not
/// gated — every occurrence lands in the log with full context.
#[derive(Debug, Default)]
pub struct DesyncGate {
    warned: bool,
}

impl DesyncGate {
    /// Records a desync and reports whether a visible warning should be
    /// surfaced for it.
    pub fn report(
        &mut self,
        tree: &VisualTree,
        doc: &DocumentModel,
        path: &StructuralPath,
    ) -> Option<String> {
        let message = format!("structural desync at path {path}");
        log::warn!(
            "{message}\nrendered:\n{}logical:\n{}",
            dump_visual_subtree(tree, tree.root()),
            dump_model_subtree(doc, &path.parent().unwrap_or_else(StructuralPath::root)),
        );
        if self.warned {
            log::debug!("suppressing repeated desync warning for {path}");
            return None;
        }
        self.warned = true;
        Some(message)
    }
}
