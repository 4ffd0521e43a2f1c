//! Render observation: mutation, size and motion watching per selected unit.
//!
//! Watchers are keyed by logical unit identity, never node identity —
//! observers attached to nodes that a re-render replaced are dead, so
//! [`RenderObserver::reattach_all`] re-resolves every watched unit against
//! the new tree after each host-driven structural update. Re-attachment is
//! idempotent.
//!
//! Size and mutation observation does not fire for pure positional
//! transforms, so class changes that look like a CSS transition start a
//! motion watch: position is polled every frame until it holds still for a
//! configured number of consecutive frames.

use crate::codec::placeholder;
use crate::protocol::UnitId;
use crate::tuning::Tuning;
use crate::view::binding::{self, FIELD_ATTR};
use crate::view::{geometry::Rect, NodeId, VisualTree};
use regex::Regex;
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ObserveError {
    #[error("invalid motion class pattern: {source}")]
    MotionPattern {
        #[from]
        source: regex::Error,
    },
}

/// A raw mutation reported by the embedder, in DOM MutationObserver terms.
#[derive(Debug, Clone, PartialEq)]
pub struct MutationRecord {
    pub target: NodeId,
    pub kind: MutationKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MutationKind {
    /// A text node's content changed; carries the new content so the
    /// mirror can be brought current before anything reads it.
    CharacterData { text: String },
    ChildList,
    Attribute { name: String },
}

/// What the observer noticed; the bridge routes these onward.
#[derive(Debug, Clone, PartialEq)]
pub enum Observation {
    /// A watched unit's bounding box moved or resized by ≥1px: the host
    /// overlay must be repositioned.
    OverlayMoved { unit: UnitId, rect: Rect },
    /// Text inside a watched unit's field changed locally.
    LocalEdit {
        unit: UnitId,
        field: String,
        /// The whole field's rendered text, anchors stripped.
        value: String,
        /// The mutated node, for leaf-precise shadow writes.
        target: NodeId,
    },
}

#[derive(Debug)]
struct UnitWatcher {
    node: NodeId,
    last_rect: Rect,
    /// Consecutive still frames remaining before motion counts as settled;
    /// `None` when no transition is believed active.
    motion_still_needed: Option<u32>,
}

pub struct RenderObserver {
    watchers: HashMap<UnitId, UnitWatcher>,
    motion_re: Regex,
    settle_frames: u32,
}

impl RenderObserver {
    pub fn new(tuning: &Tuning) -> Result<Self, ObserveError> {
        Ok(Self {
            watchers: HashMap::new(),
            motion_re: Regex::new(&tuning.motion_class_pattern)?,
            settle_frames: tuning.motion_settle_frames,
        })
    }

    /// Start (or refresh) watching a unit. Idempotent: watching an already
    /// watched unit re-resolves its node and keeps existing motion state.
    pub fn watch(&mut self, tree: &VisualTree, unit: &UnitId) {
        let Some(node) = binding::find_unit(tree, unit.as_str()) else {
            log::debug!("cannot watch {unit}: no rendered unit root");
            return;
        };
        let rect = tree.rect(node);
        self.watchers
            .entry(unit.clone())
            .and_modify(|w| {
                w.node = node;
                w.last_rect = rect;
            })
            .or_insert(UnitWatcher {
                node,
                last_rect: rect,
                motion_still_needed: None,
            });
    }

    pub fn unwatch(&mut self, unit: &UnitId) {
        self.watchers.remove(unit);
    }

    /// Re-resolve every watcher after the surface replaced its rendering.
    /// Units that vanished from the tree are dropped.
    pub fn reattach_all(&mut self, tree: &VisualTree) {
        let ids: Vec<UnitId> = self.watchers.keys().cloned().collect();
        for unit in ids {
            match binding::find_unit(tree, unit.as_str()) {
                Some(node) => {
                    if let Some(w) = self.watchers.get_mut(&unit) {
                        w.node = node;
                        w.last_rect = tree.rect(node);
                    }
                }
                None => {
                    log::debug!("watched unit {unit} left the rendering");
                    self.watchers.remove(&unit);
                }
            }
        }
    }

    pub fn is_watching(&self, unit: &UnitId) -> bool {
        self.watchers.contains_key(unit)
    }

    /// Whether a transition-driven move is still believed active for the
    /// unit. Replay and overlay consumers treat in-motion units as not yet
    /// stabilized.
    pub fn in_motion(&self, unit: &UnitId) -> bool {
        self.watchers
            .get(unit)
            .is_some_and(|w| w.motion_still_needed.is_some())
    }

    /// Classify a raw mutation against the watched units.
    pub fn on_mutation(&mut self, tree: &VisualTree, record: &MutationRecord) -> Vec<Observation> {
        let Some((unit_id, _)) = self.owning_watcher(tree, record.target) else {
            return Vec::new();
        };
        match &record.kind {
            MutationKind::CharacterData { .. } | MutationKind::ChildList => {
                let Some(field_node) = tree
                    .ancestors_inclusive(record.target)
                    .find(|&n| tree.attr(n, FIELD_ATTR).is_some())
                else {
                    return Vec::new();
                };
                let field = tree
                    .attr(field_node, FIELD_ATTR)
                    .unwrap_or_default()
                    .to_string();
                let value = placeholder::strip(&rendered_text(tree, field_node));
                vec![Observation::LocalEdit {
                    unit: unit_id,
                    field,
                    value,
                    target: record.target,
                }]
            }
            MutationKind::Attribute { name } if name == "class" => {
                let looks_like_motion = tree
                    .element(record.target)
                    .map(|el| el.classes.iter().any(|c| self.motion_re.is_match(c)))
                    .unwrap_or(false);
                if looks_like_motion {
                    if let Some(w) = self.watchers.get_mut(&unit_id) {
                        w.motion_still_needed = Some(self.settle_frames);
                    }
                }
                Vec::new()
            }
            MutationKind::Attribute { .. } => Vec::new(),
        }
    }

    /// Per-frame geometry poll: compares every watched unit's bounding box
    /// against the last seen one and advances motion settling.
    pub fn on_frame(&mut self, tree: &VisualTree) -> Vec<Observation> {
        let mut observations = Vec::new();
        for (unit, watcher) in &mut self.watchers {
            if !tree.is_attached(watcher.node) {
                continue;
            }
            let rect = tree.rect(watcher.node);
            if rect.differs_by(&watcher.last_rect, 1.0) {
                watcher.last_rect = rect;
                if let Some(needed) = &mut watcher.motion_still_needed {
                    *needed = self.settle_frames.max(1);
                }
                observations.push(Observation::OverlayMoved {
                    unit: unit.clone(),
                    rect,
                });
            } else if let Some(needed) = &mut watcher.motion_still_needed {
                if *needed <= 1 {
                    watcher.motion_still_needed = None;
                } else {
                    *needed -= 1;
                }
            }
        }
        observations
    }

    fn owning_watcher(&self, tree: &VisualTree, node: NodeId) -> Option<(UnitId, NodeId)> {
        let unit_root = binding::unit_root(tree, node)?;
        let id = binding::unit_id_of(tree, unit_root)?;
        let unit: UnitId = id.into();
        self.watchers
            .contains_key(&unit)
            .then_some((unit, unit_root))
    }
}

/// Concatenated rendered text under a node, in document order.
pub fn rendered_text(tree: &VisualTree, node: NodeId) -> String {
    let mut out = String::new();
    for n in tree.descendants(node) {
        if let Some(text) = tree.text(n) {
            out.push_str(text);
        }
    }
    out
}
