//! Pointer-driven relocation of structural units.
//!
//! The drag never mutates the document: it resolves a drop target under the
//! pointer, walking up from the unit under the cursor to the nearest
//! ancestor whose parent accepts the dragged unit's type as a child, picks
//! the insertion side from the pointer's position against the candidate's
//! midpoint (perpendicular to the container's layout axis), and on release
//! emits a relocation request carrying both units' structural parentage.
//! The drop indicator is shown only while a fully valid target is resolved,
//! and release commits only if the indicator was visible at that instant —
//! that rule closes the race where a valid target goes invalid between
//! hover and release.

use crate::fields::SchemaRegistry;
use crate::model::StructuralPath;
use crate::protocol::{Side, UnitId, UnitRef};
use crate::view::binding::{self, TYPE_ATTR};
use crate::view::{LayoutAxis, NodeId, VisualTree};

#[derive(Debug, Clone, PartialEq)]
pub struct DropTarget {
    pub unit: UnitId,
    pub node: NodeId,
    pub side: Side,
}

/// Target state after a pointer move.
#[derive(Debug, Clone, PartialEq)]
pub enum DragUpdate {
    /// A fully valid target: show the indicator here.
    Indicator { node: NodeId, side: Side },
    /// No valid target under the pointer: hide the indicator.
    NoTarget,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RelocationIntent {
    pub moved: UnitRef,
    pub target: UnitRef,
    pub side: Side,
}

#[derive(Debug)]
struct DragState {
    unit: UnitId,
    node: NodeId,
    unit_type: String,
    target: Option<DropTarget>,
    indicator_visible: bool,
}

#[derive(Debug, Default)]
pub struct ReorderController {
    drag: Option<DragState>,
}

impl ReorderController {
    pub fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }

    /// Begin dragging a unit. Returns false when the unit is not in the
    /// rendering (nothing to drag).
    pub fn begin(&mut self, tree: &VisualTree, unit: &UnitId) -> bool {
        let Some(node) = binding::find_unit(tree, unit.as_str()) else {
            return false;
        };
        let unit_type = tree.attr(node, TYPE_ATTR).unwrap_or_default().to_string();
        self.drag = Some(DragState {
            unit: unit.clone(),
            node,
            unit_type,
            target: None,
            indicator_visible: false,
        });
        true
    }

    /// Re-resolve the drop target for a new pointer position.
    pub fn update(
        &mut self,
        tree: &VisualTree,
        schema: &SchemaRegistry,
        x: f64,
        y: f64,
    ) -> Option<DragUpdate> {
        let drag = self.drag.as_ref()?;
        let target = resolve_target(tree, schema, drag, x, y);
        let update = match &target {
            Some(t) => DragUpdate::Indicator {
                node: t.node,
                side: t.side,
            },
            None => DragUpdate::NoTarget,
        };
        let drag = self.drag.as_mut()?;
        drag.indicator_visible = target.is_some();
        drag.target = target;
        Some(update)
    }

    /// Release the drag. Commits only when the indicator was visible at
    /// this instant; otherwise the drop is abandoned.
    pub fn release(&mut self, tree: &VisualTree) -> Option<RelocationIntent> {
        let drag = self.drag.take()?;
        if !drag.indicator_visible {
            return None;
        }
        let target = drag.target?;
        let moved = unit_ref(tree, drag.node, &drag.unit)?;
        let target_ref = unit_ref(tree, target.node, &target.unit)?;
        Some(RelocationIntent {
            moved,
            target: target_ref,
            side: target.side,
        })
    }

    pub fn cancel(&mut self) {
        self.drag = None;
    }
}

/// A unit plus its structural parentage, read off the binding attributes.
fn unit_ref(tree: &VisualTree, node: NodeId, unit: &UnitId) -> Option<UnitRef> {
    let path = binding::bound_path(tree, node)?;
    Some(UnitRef {
        unit: unit.clone(),
        parent: path.parent().unwrap_or_else(StructuralPath::root),
        index: path.last()?,
    })
}

fn resolve_target(
    tree: &VisualTree,
    schema: &SchemaRegistry,
    drag: &DragState,
    x: f64,
    y: f64,
) -> Option<DropTarget> {
    let hit = hit_test(tree, drag.node, x, y)?;
    let mut candidate = binding::unit_root(tree, hit)?;
    if candidate == drag.node {
        return None;
    }

    // walk up until some ancestor's parent accepts the dragged type
    loop {
        let parent_unit = tree
            .parent(candidate)
            .and_then(|p| binding::unit_root(tree, p));
        let parent_type = parent_unit.and_then(|p| tree.attr(p, TYPE_ATTR));
        if schema.allows_child(parent_type, &drag.unit_type) {
            break;
        }
        candidate = parent_unit?;
        if candidate == drag.node {
            return None;
        }
    }

    let unit = binding::unit_id_of(tree, candidate)?.into();
    let side = insertion_side(tree, candidate, x, y);
    Some(DropTarget {
        unit,
        node: candidate,
        side,
    })
}

/// Deepest attached element containing the pointer, excluding the dragged
/// unit's subtree (the floating proxy is not mirrored into the tree at all).
fn hit_test(tree: &VisualTree, dragged: NodeId, x: f64, y: f64) -> Option<NodeId> {
    let mut best: Option<(usize, NodeId)> = None;
    for node in tree.descendants(tree.root()) {
        if !tree.is_element(node)
            || tree.is_in_subtree(node, dragged)
            || !tree.rect(node).contains(x, y)
        {
            continue;
        }
        let depth = tree.ancestors_inclusive(node).count();
        if best.is_none_or(|(d, _)| depth >= d) {
            best = Some((depth, node));
        }
    }
    best.map(|(_, n)| n)
}

/// Before/after, chosen perpendicular to the container's layout axis.
fn insertion_side(tree: &VisualTree, candidate: NodeId, x: f64, y: f64) -> Side {
    let axis = tree
        .parent(candidate)
        .and_then(|p| tree.element(p))
        .map(|el| el.axis)
        .unwrap_or_default();
    let rect = tree.rect(candidate);
    let before = match axis {
        LayoutAxis::Column => y < rect.center_y(),
        LayoutAxis::Row => x < rect.center_x(),
    };
    if before { Side::Before } else { Side::After }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::{SchemaRegistry, UnitTypeSchema};
    use crate::view::binding::{PATH_ATTR, UNIT_ATTR};
    use crate::view::Rect;
    use pretty_assertions::assert_eq;

    /// Three stacked units under the root: hero (0), quote (1), and a
    /// carousel (2) that only accepts slides, containing one slide.
    fn layout() -> (VisualTree, SchemaRegistry) {
        let mut tree = VisualTree::new("main");
        for (ix, (kind, unit)) in [("hero", "u0"), ("quote", "u1"), ("carousel", "u2")]
            .iter()
            .enumerate()
        {
            let node = tree.append_element(tree.root(), "section");
            tree.set_attr(node, UNIT_ATTR, unit);
            tree.set_attr(node, TYPE_ATTR, kind);
            tree.set_attr(node, PATH_ATTR, &ix.to_string());
            tree.set_rect(node, Rect::new(0.0, ix as f64 * 100.0, 800.0, 100.0));
        }
        let carousel = binding::find_unit(&tree, "u2").unwrap();
        let slide = tree.append_element(carousel, "div");
        tree.set_attr(slide, UNIT_ATTR, "u2s0");
        tree.set_attr(slide, TYPE_ATTR, "slide");
        tree.set_attr(slide, PATH_ATTR, "2.0");
        tree.set_rect(slide, Rect::new(10.0, 210.0, 200.0, 80.0));

        let mut schema = SchemaRegistry::default();
        for kind in ["hero", "quote", "slide"] {
            schema.insert(kind, UnitTypeSchema::default());
        }
        schema.insert(
            "carousel",
            UnitTypeSchema {
                fields: vec![],
                allowed_children: Some(["slide".to_string()].into()),
            },
        );
        // the page root accepts anything (no parent unit → None → allowed)
        (tree, schema)
    }

    #[test]
    fn drop_above_midpoint_targets_before() {
        let (tree, schema) = layout();
        let mut reorder = ReorderController::default();
        assert!(reorder.begin(&tree, &"u0".into()));
        let update = reorder.update(&tree, &schema, 400.0, 110.0).unwrap();
        assert_eq!(
            update,
            DragUpdate::Indicator {
                node: binding::find_unit(&tree, "u1").unwrap(),
                side: Side::Before
            }
        );
        let intent = reorder.release(&tree).unwrap();
        assert_eq!(intent.moved.unit, "u0".into());
        assert_eq!(intent.target.unit, "u1".into());
        assert_eq!(intent.target.index, 1);
        assert_eq!(intent.side, Side::Before);
    }

    #[test]
    fn disallowed_nesting_walks_up_to_permissive_ancestor() {
        let (tree, schema) = layout();
        let mut reorder = ReorderController::default();
        // drag the hero over the slide: carousels only accept slides, so
        // the candidate escalates to the carousel itself (root allows it)
        reorder.begin(&tree, &"u0".into());
        let update = reorder.update(&tree, &schema, 50.0, 215.0).unwrap();
        let carousel = binding::find_unit(&tree, "u2").unwrap();
        assert_eq!(
            update,
            DragUpdate::Indicator {
                node: carousel,
                side: Side::Before
            }
        );
    }

    #[test]
    fn pointer_over_dragged_unit_resolves_nothing() {
        let (tree, schema) = layout();
        let mut reorder = ReorderController::default();
        reorder.begin(&tree, &"u1".into());
        let update = reorder.update(&tree, &schema, 400.0, 150.0).unwrap();
        assert_eq!(update, DragUpdate::NoTarget);
    }

    #[test]
    fn release_without_visible_indicator_abandons_the_drop() {
        let (tree, schema) = layout();
        let mut reorder = ReorderController::default();
        reorder.begin(&tree, &"u0".into());
        reorder.update(&tree, &schema, 400.0, 110.0).unwrap();
        // the target goes invalid between hover and release
        let update = reorder.update(&tree, &schema, 400.0, 150.0);
        assert_eq!(update, Some(DragUpdate::NoTarget));
        assert_eq!(reorder.release(&tree), None);
    }

    #[test]
    fn release_without_any_drag_is_inert() {
        let (tree, _schema) = layout();
        let mut reorder = ReorderController::default();
        assert_eq!(reorder.release(&tree), None);
    }

    #[test]
    fn slide_reorders_inside_its_carousel() {
        let (mut tree, schema) = layout();
        let carousel = binding::find_unit(&tree, "u2").unwrap();
        let second = tree.append_element(carousel, "div");
        tree.set_attr(second, UNIT_ATTR, "u2s1");
        tree.set_attr(second, TYPE_ATTR, "slide");
        tree.set_attr(second, PATH_ATTR, "2.1");
        tree.set_rect(second, Rect::new(220.0, 210.0, 200.0, 80.0));
        if let Some(el) = tree.element_mut(carousel) {
            el.axis = crate::view::LayoutAxis::Row;
        }
        let mut reorder = ReorderController::default();
        reorder.begin(&tree, &"u2s1".into());
        // left of the first slide's midpoint along the row axis
        let update = reorder.update(&tree, &schema, 20.0, 250.0).unwrap();
        let first = binding::find_unit(&tree, "u2s0").unwrap();
        assert_eq!(
            update,
            DragUpdate::Indicator {
                node: first,
                side: Side::Before
            }
        );
        let intent = reorder.release(&tree).unwrap();
        assert_eq!(intent.moved.parent, vec![2].into());
        assert_eq!(intent.target.parent, vec![2].into());
        assert_eq!(intent.target.index, 0);
    }
}
