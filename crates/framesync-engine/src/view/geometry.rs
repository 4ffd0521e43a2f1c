//! Geometry and the derived visibility map.
//!
//! Visibility is never stored: at any instant a node is hidden if it has
//! zero extent, `display:none`-equivalent styling on itself or an ancestor,
//! or lies entirely outside its nearest clipping ancestor's bounds.

use super::{NodeId, VisualTree};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    pub fn area(&self) -> f64 {
        self.width.max(0.0) * self.height.max(0.0)
    }

    pub fn center_x(&self) -> f64 {
        self.x + self.width / 2.0
    }

    pub fn center_y(&self) -> f64 {
        self.y + self.height / 2.0
    }

    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.x && x < self.right() && y >= self.y && y < self.bottom()
    }

    pub fn intersection(&self, other: &Rect) -> Rect {
        let x = self.x.max(other.x);
        let y = self.y.max(other.y);
        let right = self.right().min(other.right());
        let bottom = self.bottom().min(other.bottom());
        Rect {
            x,
            y,
            width: (right - x).max(0.0),
            height: (bottom - y).max(0.0),
        }
    }

    /// Whether any edge moved by at least `threshold` rendered pixels.
    /// The size watcher re-issues overlay geometry on a ≥1px change.
    pub fn differs_by(&self, other: &Rect, threshold: f64) -> bool {
        (self.x - other.x).abs() >= threshold
            || (self.y - other.y).abs() >= threshold
            || (self.width - other.width).abs() >= threshold
            || (self.height - other.height).abs() >= threshold
    }
}

/// Bounds of the nearest ancestor that clips its descendants, if any.
fn clip_bounds(tree: &VisualTree, node: NodeId) -> Option<Rect> {
    for ancestor in tree.ancestors_inclusive(node).skip(1) {
        if let Some(el) = tree.element(ancestor) {
            if el.clips {
                return Some(tree.rect(ancestor));
            }
        }
    }
    None
}

fn display_suppressed(tree: &VisualTree, node: NodeId) -> bool {
    tree.ancestors_inclusive(node)
        .any(|n| tree.element(n).is_some_and(|el| el.display_none))
}

/// Fraction of the node's own area that falls inside its clip container
/// (1.0 when unclipped). Zero-area nodes report 0.
pub fn visibility_ratio(tree: &VisualTree, node: NodeId) -> f64 {
    if display_suppressed(tree, node) {
        return 0.0;
    }
    let rect = tree.rect(node);
    let area = rect.area();
    if area == 0.0 {
        return 0.0;
    }
    match clip_bounds(tree, node) {
        Some(bounds) => rect.intersection(&bounds).area() / area,
        None => 1.0,
    }
}

pub fn is_hidden(tree: &VisualTree, node: NodeId) -> bool {
    visibility_ratio(tree, node) == 0.0
}

/// A unit "reports itself visible" once most of it is inside the viewport of
/// its clip container; partially scrolled-in carousel slides do not qualify.
pub const VISIBLE_RATIO: f64 = 0.5;

pub fn is_visible(tree: &VisualTree, node: NodeId) -> bool {
    visibility_ratio(tree, node) >= VISIBLE_RATIO
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::view::VisualTree;

    fn clipped_pair() -> (VisualTree, NodeId, NodeId) {
        let mut tree = VisualTree::new("main");
        let viewport = tree.append_element(tree.root(), "div");
        if let Some(el) = tree.element_mut(viewport) {
            el.clips = true;
        }
        tree.set_rect(viewport, Rect::new(0.0, 0.0, 100.0, 100.0));
        let inside = tree.append_element(viewport, "div");
        tree.set_rect(inside, Rect::new(10.0, 10.0, 50.0, 50.0));
        let outside = tree.append_element(viewport, "div");
        tree.set_rect(outside, Rect::new(120.0, 0.0, 50.0, 50.0));
        (tree, inside, outside)
    }

    #[test]
    fn clipping_hides_out_of_bounds_nodes() {
        let (tree, inside, outside) = clipped_pair();
        assert_eq!(visibility_ratio(&tree, inside), 1.0);
        assert_eq!(visibility_ratio(&tree, outside), 0.0);
        assert!(is_hidden(&tree, outside));
        assert!(is_visible(&tree, inside));
    }

    #[test]
    fn partial_overlap_reports_fraction() {
        let (mut tree, inside, _) = clipped_pair();
        tree.set_rect(inside, Rect::new(75.0, 0.0, 50.0, 100.0));
        let ratio = visibility_ratio(&tree, inside);
        assert!((ratio - 0.5).abs() < 1e-9);
    }

    #[test]
    fn zero_extent_is_hidden() {
        let mut tree = VisualTree::new("main");
        let node = tree.append_element(tree.root(), "div");
        tree.set_rect(node, Rect::new(10.0, 10.0, 0.0, 30.0));
        assert!(is_hidden(&tree, node));
    }

    #[test]
    fn display_none_propagates_to_descendants() {
        let mut tree = VisualTree::new("main");
        let outer = tree.append_element(tree.root(), "div");
        let inner = tree.append_element(outer, "div");
        tree.set_rect(inner, Rect::new(0.0, 0.0, 10.0, 10.0));
        if let Some(el) = tree.element_mut(outer) {
            el.display_none = true;
        }
        assert!(is_hidden(&tree, inner));
    }

    #[test]
    fn rect_change_detection_uses_one_pixel_threshold() {
        let a = Rect::new(0.0, 0.0, 100.0, 50.0);
        let b = Rect::new(0.4, 0.0, 100.0, 50.0);
        let c = Rect::new(0.0, 1.0, 100.0, 50.0);
        assert!(!a.differs_by(&b, 1.0));
        assert!(a.differs_by(&c, 1.0));
    }
}
