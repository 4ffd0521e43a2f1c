//! Visibility navigation: driving the surface's own controls until hidden
//! content becomes visible.
//!
//! The navigator never positions anything itself — carousels, tabs and
//! accordions keep their own state — it only invokes the rendering's
//! controls: a direct selector (`data-sync-goto`) when the rendering
//! provides one, otherwise the group's next/previous control, one step at a
//! time, polling between steps for the expected sibling to report itself
//! visible. Every poll re-resolves nodes from identity and re-checks that
//! the sibling group is the one the sequence started against; if the user
//! navigated away the sequence aborts rather than replaying stale steps.
//! Exhausted retries fall back to a defined unit (most visible sibling,
//! else the containing unit) so the operation never ends unresolved.

use crate::protocol::UnitId;
use crate::tuning::{Millis, Tuning};
use crate::view::binding::{self, NAV_GOTO_ATTR, NAV_NEXT_ATTR, NAV_PREV_ATTR};
use crate::view::geometry;
use crate::view::{NodeId, VisualTree};

#[derive(Debug, Clone, PartialEq)]
pub enum NavOutcome {
    /// The target became visible (and should be selected).
    Visible(UnitId),
    /// The target could not be reached; this unit is the defined fallback.
    Fallback(UnitId),
    /// The sibling group changed under the sequence; selection untouched.
    Aborted,
}

#[derive(Debug)]
struct NavSequence {
    target: UnitId,
    /// Identity snapshot of the sibling group: the liveness condition.
    siblings: Vec<UnitId>,
    /// Sibling expected to report visible before the next step. For a
    /// direct selector this is the target itself.
    expected: UnitId,
    retries_left: u32,
    next_poll_at: Millis,
}

pub struct VisibilityNavigator {
    active: Option<NavSequence>,
    poll_interval_ms: Millis,
    retry_limit: u32,
}

impl VisibilityNavigator {
    pub fn new(tuning: &Tuning) -> Self {
        Self {
            active: None,
            poll_interval_ms: tuning.nav_poll_interval_ms,
            retry_limit: tuning.nav_retry_limit,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    /// Drop any in-flight sequence (the user took over).
    pub fn cancel(&mut self) {
        self.active = None;
    }

    /// Start making `target` visible. Returns controls to invoke now and,
    /// when no navigation is needed (or possible), the final outcome.
    pub fn begin(
        &mut self,
        tree: &VisualTree,
        target: &UnitId,
        now: Millis,
    ) -> (Vec<NodeId>, Option<NavOutcome>) {
        self.active = None;
        let Some(node) = binding::find_unit(tree, target.as_str()) else {
            log::debug!("navigation target {target} is not in the rendering");
            return (Vec::new(), Some(NavOutcome::Aborted));
        };
        if geometry::is_visible(tree, node) {
            return (Vec::new(), Some(NavOutcome::Visible(target.clone())));
        }

        let (container, siblings) = sibling_group(tree, node);

        // a rendering-provided direct selector wins
        if let Some(control) = binding::find_by_attr(tree, NAV_GOTO_ATTR, target.as_str()) {
            self.active = Some(NavSequence {
                target: target.clone(),
                siblings: ids_of(&siblings),
                expected: target.clone(),
                retries_left: self.retry_limit,
                next_poll_at: now + self.poll_interval_ms,
            });
            return (vec![control], None);
        }

        let Some(target_ix) = siblings.iter().position(|(id, _)| id == target) else {
            return (Vec::new(), Some(self.fallback(tree, container, &siblings)));
        };
        let current_ix = most_visible_index(tree, &siblings);
        if current_ix == target_ix {
            // already current but still hidden: nothing to step through
            return (Vec::new(), Some(self.fallback(tree, container, &siblings)));
        }
        let forward = target_ix > current_ix;
        let Some(control) = step_control(tree, container, forward) else {
            log::debug!("no step control for the group containing {target}");
            return (Vec::new(), Some(self.fallback(tree, container, &siblings)));
        };
        let expected_ix = if forward { current_ix + 1 } else { current_ix - 1 };
        self.active = Some(NavSequence {
            target: target.clone(),
            siblings: ids_of(&siblings),
            expected: siblings[expected_ix].0.clone(),
            retries_left: self.retry_limit,
            next_poll_at: now + self.poll_interval_ms,
        });
        (vec![control], None)
    }

    /// Poll an in-flight sequence. Returns further controls to invoke and
    /// the outcome once the sequence terminates.
    pub fn tick(&mut self, tree: &VisualTree, now: Millis) -> (Vec<NodeId>, Option<NavOutcome>) {
        let Some(seq) = &self.active else {
            return (Vec::new(), None);
        };
        if now < seq.next_poll_at {
            return (Vec::new(), None);
        }

        let target = seq.target.clone();
        let Some(node) = binding::find_unit(tree, target.as_str()) else {
            self.active = None;
            return (Vec::new(), Some(NavOutcome::Aborted));
        };
        let (container, siblings) = sibling_group(tree, node);

        // liveness: abort rather than drive a stale sequence
        if ids_of(&siblings) != seq.siblings {
            log::debug!("sibling group changed while navigating to {target}; aborting");
            self.active = None;
            return (Vec::new(), Some(NavOutcome::Aborted));
        }

        let expected_visible = binding::find_unit(tree, seq.expected.as_str())
            .is_some_and(|n| geometry::is_visible(tree, n));

        if expected_visible {
            if seq.expected == target {
                self.active = None;
                return (Vec::new(), Some(NavOutcome::Visible(target)));
            }
            // next step toward the target
            let Some(expected_ix) = siblings.iter().position(|(id, _)| *id == seq.expected)
            else {
                self.active = None;
                return (Vec::new(), Some(NavOutcome::Aborted));
            };
            let Some(target_ix) = siblings.iter().position(|(id, _)| *id == target) else {
                self.active = None;
                return (Vec::new(), Some(NavOutcome::Aborted));
            };
            let forward = target_ix > expected_ix;
            let next_ix = if forward { expected_ix + 1 } else { expected_ix - 1 };
            let Some(control) = step_control(tree, container, forward) else {
                self.active = None;
                return (Vec::new(), Some(self.fallback(tree, container, &siblings)));
            };
            let next_expected = siblings[next_ix].0.clone();
            let retry_limit = self.retry_limit;
            let poll = self.poll_interval_ms;
            if let Some(seq) = &mut self.active {
                seq.expected = next_expected;
                seq.retries_left = retry_limit;
                seq.next_poll_at = now + poll;
            }
            return (vec![control], None);
        }

        // expected sibling not visible yet
        let exhausted = seq.retries_left == 0;
        if exhausted {
            self.active = None;
            return (Vec::new(), Some(self.fallback(tree, container, &siblings)));
        }
        let poll = self.poll_interval_ms;
        if let Some(seq) = &mut self.active {
            seq.retries_left -= 1;
            seq.next_poll_at = now + poll;
        }
        (Vec::new(), None)
    }

    /// The defined end state when the target cannot be reached: whichever
    /// sibling is currently most visible, else the containing unit.
    fn fallback(
        &self,
        tree: &VisualTree,
        container: NodeId,
        siblings: &[(UnitId, NodeId)],
    ) -> NavOutcome {
        let best = siblings
            .iter()
            .map(|(id, node)| (id, geometry::visibility_ratio(tree, *node)))
            .filter(|(_, ratio)| *ratio > 0.0)
            .max_by(|a, b| a.1.total_cmp(&b.1));
        if let Some((id, _)) = best {
            return NavOutcome::Fallback(id.clone());
        }
        match binding::unit_root(tree, container)
            .and_then(|n| binding::unit_id_of(tree, n))
        {
            Some(id) => NavOutcome::Fallback(id.into()),
            None => NavOutcome::Aborted,
        }
    }
}

fn ids_of(siblings: &[(UnitId, NodeId)]) -> Vec<UnitId> {
    siblings.iter().map(|(id, _)| id.clone()).collect()
}

/// The unit's sibling group: the first-level unit roots under the parent of
/// its own unit root, wrappers skipped. Returns the shared container too.
fn sibling_group(tree: &VisualTree, node: NodeId) -> (NodeId, Vec<(UnitId, NodeId)>) {
    let unit_root = binding::unit_root(tree, node).unwrap_or(node);
    let container = tree.parent(unit_root).unwrap_or_else(|| tree.root());
    (container, first_level_units(tree, container))
}

/// Unit roots reachable from `container` without passing through another
/// unit root, in document order.
fn first_level_units(tree: &VisualTree, container: NodeId) -> Vec<(UnitId, NodeId)> {
    let mut out = Vec::new();
    let mut stack: Vec<NodeId> = tree.children(container).iter().rev().copied().collect();
    while let Some(node) = stack.pop() {
        if let Some(id) = binding::unit_id_of(tree, node) {
            out.push((id.into(), node));
            continue;
        }
        stack.extend(tree.children(node).iter().rev());
    }
    out
}

/// The group's own next/previous control, looked up inside the unit that
/// owns the container (the carousel itself), falling back to a whole-tree
/// scan for renderings that keep controls outside it.
fn step_control(tree: &VisualTree, container: NodeId, forward: bool) -> Option<NodeId> {
    let attr = if forward { NAV_NEXT_ATTR } else { NAV_PREV_ATTR };
    let scope = binding::unit_root(tree, container).unwrap_or_else(|| tree.root());
    tree.descendants(scope)
        .into_iter()
        .find(|&n| tree.attr(n, attr).is_some())
        .or_else(|| {
            tree.descendants(tree.root())
                .into_iter()
                .find(|&n| tree.attr(n, attr).is_some())
        })
}

fn most_visible_index(tree: &VisualTree, siblings: &[(UnitId, NodeId)]) -> usize {
    siblings
        .iter()
        .enumerate()
        .max_by(|(_, a), (_, b)| {
            geometry::visibility_ratio(tree, a.1).total_cmp(&geometry::visibility_ratio(tree, b.1))
        })
        .map(|(ix, _)| ix)
        .unwrap_or(0)
}
