//! A deterministic reference surface.
//!
//! Stands in for "any rendering technology" in tests and the scenario
//! harness: renders a document into a bound [`VisualTree`] with a plain
//! block layout, optional transparent wrappers and templating whitespace
//! (to exercise wrapper collapsing and the artifact fallback), and a
//! carousel rendering with its own navigation controls and slide state.
//! The bridge proper must never assume anything in here — the sim consumes
//! [`SurfaceEffect`]s exactly as an embedder would and answers with the
//! events a real rendering would produce.

use crate::bridge::{Bridge, Outcome, SurfaceEffect, SurfaceEvent};
use crate::fields::{FieldDescriptor, FieldKind, SchemaRegistry, UnitTypeSchema};
use crate::model::{DocNode, DocumentModel, StructuralPath};
use crate::observe::{MutationKind, MutationRecord};
use crate::view::binding::{
    FIELD_ATTR, NAV_GOTO_ATTR, NAV_NEXT_ATTR, NAV_PREV_ATTR, PATH_ATTR, TYPE_ATTR, UNIT_ATTR,
};
use crate::view::{LayoutAxis, NodeId, Rect, VisualTree};
use std::collections::{HashMap, VecDeque};

#[derive(Debug, Clone)]
pub struct SimOptions {
    /// Wrap rendered content in unbound and same-path wrapper elements.
    pub wrappers: bool,
    /// Emit templating whitespace between bound children of unit roots.
    pub whitespace_artifacts: bool,
    /// Also render direct per-slide `data-sync-goto` controls.
    pub direct_controls: bool,
    pub viewport_width: f64,
    pub unit_height: f64,
}

impl Default for SimOptions {
    fn default() -> Self {
        Self {
            wrappers: false,
            whitespace_artifacts: false,
            direct_controls: false,
            viewport_width: 800.0,
            unit_height: 100.0,
        }
    }
}

/// The rendering-side half of a simulated session.
pub struct SimSurface {
    doc: DocumentModel,
    opts: SimOptions,
    tree: VisualTree,
    /// Carousel slide positions, keyed by carousel unit id; survives
    /// re-renders the way a real rendering's component state would.
    carousel_state: HashMap<String, usize>,
}

pub fn unit_id_for_path(path: &StructuralPath) -> String {
    format!("u{}", path.to_string().replace('.', "-"))
}

/// A permissive schema matching what the sim renders: every unit type gets
/// a rich-text `body` field; carousels take only slides and carry no text.
pub fn default_schema(doc: &DocumentModel) -> SchemaRegistry {
    let mut schema = SchemaRegistry::default();
    let mut stack: Vec<&DocNode> = doc.children.iter().collect();
    while let Some(node) = stack.pop() {
        let DocNode::Element(el) = node else { continue };
        if el.kind == "carousel" {
            schema.insert(
                "carousel",
                UnitTypeSchema {
                    fields: vec![],
                    allowed_children: Some(["slide".to_string()].into()),
                },
            );
        } else {
            schema.insert(
                el.kind.clone(),
                UnitTypeSchema {
                    fields: vec![FieldDescriptor {
                        name: "body".to_string(),
                        kind: FieldKind::RichText,
                    }],
                    allowed_children: None,
                },
            );
        }
        stack.extend(el.children.iter());
    }
    schema
}

impl SimSurface {
    pub fn new(doc: DocumentModel, opts: SimOptions) -> Self {
        let mut surface = Self {
            doc,
            opts,
            tree: VisualTree::new("main"),
            carousel_state: HashMap::new(),
        };
        surface.render();
        surface
    }

    pub fn tree(&self) -> &VisualTree {
        &self.tree
    }

    pub fn snapshot_tree(&self) -> VisualTree {
        self.tree.clone()
    }

    pub fn document(&self) -> &DocumentModel {
        &self.doc
    }

    pub fn render_document(&mut self, doc: DocumentModel) {
        self.doc = doc;
        self.render();
    }

    /// Consume a bridge effect the way an embedder would, answering with
    /// the events the rendering produces in response.
    pub fn apply(&mut self, effect: &SurfaceEffect) -> Vec<SurfaceEvent> {
        match effect {
            SurfaceEffect::RenderDocument { document } => {
                self.render_document(document.clone());
                vec![SurfaceEvent::TreeReplaced {
                    tree: self.snapshot_tree(),
                }]
            }
            SurfaceEffect::InvokeControl { node } => self.invoke_control(*node),
            SurfaceEffect::InsertText { unit, text } => self.insert_text(unit.as_str(), text),
            _ => Vec::new(),
        }
    }

    fn invoke_control(&mut self, control: NodeId) -> Vec<SurfaceEvent> {
        let Some(carousel_id) = crate::view::binding::unit_root(&self.tree, control)
            .and_then(|n| self.tree.attr(n, UNIT_ATTR))
            .map(str::to_string)
        else {
            return Vec::new();
        };
        let slides = self.slide_count(&carousel_id);
        if slides == 0 {
            return Vec::new();
        }
        let current = self.carousel_state.get(&carousel_id).copied().unwrap_or(0);
        let next = if self.tree.attr(control, NAV_NEXT_ATTR).is_some() {
            (current + 1).min(slides - 1)
        } else if self.tree.attr(control, NAV_PREV_ATTR).is_some() {
            current.saturating_sub(1)
        } else if let Some(target) = self.tree.attr(control, NAV_GOTO_ATTR) {
            match self.slide_index(&carousel_id, target) {
                Some(ix) => ix,
                None => return Vec::new(),
            }
        } else {
            return Vec::new();
        };
        self.carousel_state.insert(carousel_id, next);
        self.render();
        vec![SurfaceEvent::TreeReplaced {
            tree: self.snapshot_tree(),
        }]
    }

    fn insert_text(&mut self, unit: &str, text: &str) -> Vec<SurfaceEvent> {
        let Some(root) = crate::view::binding::find_unit(&self.tree, unit) else {
            return Vec::new();
        };
        let field = self
            .tree
            .descendants(root)
            .into_iter()
            .find(|&n| self.tree.attr(n, FIELD_ATTR).is_some())
            .unwrap_or(root);
        let Some(run) = self
            .tree
            .descendants(field)
            .into_iter()
            .filter(|&n| self.tree.text(n).is_some())
            .next_back()
        else {
            return Vec::new();
        };
        let updated = format!("{}{text}", self.tree.text(run).unwrap_or_default());
        self.tree.set_text(run, &updated);
        vec![SurfaceEvent::Mutation {
            record: MutationRecord {
                target: run,
                kind: MutationKind::CharacterData { text: updated },
            },
            now: 0,
        }]
    }

    fn slide_count(&self, carousel_id: &str) -> usize {
        self.find_slides(carousel_id).len()
    }

    fn slide_index(&self, carousel_id: &str, slide_unit: &str) -> Option<usize> {
        self.find_slides(carousel_id)
            .iter()
            .position(|id| id == slide_unit)
    }

    fn find_slides(&self, carousel_id: &str) -> Vec<String> {
        let Some(root) = crate::view::binding::find_unit(&self.tree, carousel_id) else {
            return Vec::new();
        };
        self.tree
            .descendants(root)
            .into_iter()
            .filter(|&n| n != root)
            .filter_map(|n| self.tree.attr(n, UNIT_ATTR))
            .map(str::to_string)
            .collect()
    }

    fn render(&mut self) {
        let mut tree = VisualTree::new("main");
        let root = tree.root();
        tree.set_rect(
            root,
            Rect::new(0.0, 0.0, self.opts.viewport_width, 10_000.0),
        );
        let children: Vec<DocNode> = self.doc.children.clone();
        let mut y = 0.0;
        for (ix, node) in children.iter().enumerate() {
            let DocNode::Element(el) = node else {
                // stray top-level text is rendered unbound, like template
                // chrome a CMS page would not address
                if let DocNode::Text(t) = node {
                    tree.append_text(root, &t.text);
                }
                continue;
            };
            let path = StructuralPath::from_segments(vec![ix]);
            let rect = Rect::new(0.0, y, self.opts.viewport_width, self.opts.unit_height);
            if el.kind == "carousel" {
                self.render_carousel(&mut tree, root, el, &path, rect);
            } else {
                self.render_unit(&mut tree, root, el, &path, rect);
            }
            y += self.opts.unit_height;
        }
        self.tree = tree;
    }

    fn render_unit(
        &self,
        tree: &mut VisualTree,
        parent: NodeId,
        el: &crate::model::ElementNode,
        path: &StructuralPath,
        rect: Rect,
    ) {
        let unit = tree.append_element(parent, "section");
        tree.set_attr(unit, UNIT_ATTR, &unit_id_for_path(path));
        tree.set_attr(unit, TYPE_ATTR, &el.kind);
        tree.set_attr(unit, PATH_ATTR, &path.to_string());
        tree.set_rect(unit, rect);
        if self.opts.whitespace_artifacts {
            tree.append_text(unit, "\n  ");
        }
        // the body field collapses onto the unit's own path
        let field = tree.append_element(unit, "div");
        tree.set_attr(field, FIELD_ATTR, "body");
        tree.set_attr(field, PATH_ATTR, &path.to_string());
        tree.set_rect(field, rect);
        for (ix, child) in el.children.iter().enumerate() {
            self.render_inline(tree, field, child, &path.child(ix));
        }
        if self.opts.whitespace_artifacts {
            tree.append_text(unit, "\n");
        }
    }

    fn render_inline(
        &self,
        tree: &mut VisualTree,
        parent: NodeId,
        node: &DocNode,
        path: &StructuralPath,
    ) {
        match node {
            DocNode::Text(t) => {
                let container = if self.opts.wrappers {
                    tree.append_element(parent, "span")
                } else {
                    parent
                };
                tree.append_text(container, &t.text);
            }
            DocNode::Element(el) => {
                let container = if self.opts.wrappers {
                    // a wrapper sharing the element's own path
                    let outer = tree.append_element(parent, "div");
                    tree.set_attr(outer, PATH_ATTR, &path.to_string());
                    outer
                } else {
                    parent
                };
                let element = tree.append_element(container, &el.kind);
                tree.set_attr(element, PATH_ATTR, &path.to_string());
                for (ix, child) in el.children.iter().enumerate() {
                    self.render_inline(tree, element, child, &path.child(ix));
                }
            }
        }
    }

    fn render_carousel(
        &self,
        tree: &mut VisualTree,
        parent: NodeId,
        el: &crate::model::ElementNode,
        path: &StructuralPath,
        rect: Rect,
    ) {
        let unit_id = unit_id_for_path(path);
        let current = self.carousel_state.get(&unit_id).copied().unwrap_or(0);
        let unit = tree.append_element(parent, "section");
        tree.set_attr(unit, UNIT_ATTR, &unit_id);
        tree.set_attr(unit, TYPE_ATTR, &el.kind);
        tree.set_attr(unit, PATH_ATTR, &path.to_string());
        tree.set_rect(unit, rect);

        let viewport = tree.append_element(unit, "div");
        tree.set_rect(viewport, rect);
        if let Some(data) = tree.element_mut(viewport) {
            data.clips = true;
            data.axis = LayoutAxis::Row;
        }
        for (ix, child) in el.children.iter().enumerate() {
            let DocNode::Element(slide) = child else {
                continue;
            };
            let slide_path = path.child(ix);
            let offset = (ix as f64 - current as f64) * rect.width;
            let slide_rect = Rect::new(rect.x + offset, rect.y, rect.width, rect.height);
            self.render_unit(tree, viewport, slide, &slide_path, slide_rect);
        }

        let prev = tree.append_element(unit, "button");
        tree.set_attr(prev, NAV_PREV_ATTR, &unit_id);
        tree.append_text(prev, "‹");
        let next = tree.append_element(unit, "button");
        tree.set_attr(next, NAV_NEXT_ATTR, &unit_id);
        tree.append_text(next, "›");
        if self.opts.direct_controls {
            for (ix, child) in el.children.iter().enumerate() {
                if matches!(child, DocNode::Element(_)) {
                    let goto = tree.append_element(unit, "button");
                    tree.set_attr(goto, NAV_GOTO_ATTR, &unit_id_for_path(&path.child(ix)));
                }
            }
        }
    }
}

/// Drive one event through the bridge, feeding every effect back through
/// the sim until the exchange settles. The accumulated outcome is what the
/// host would have seen.
pub fn pump(bridge: &mut Bridge, surface: &mut SimSurface, event: SurfaceEvent) -> Outcome {
    let mut all = Outcome::default();
    let mut queue = VecDeque::from([event]);
    while let Some(event) = queue.pop_front() {
        let out = bridge.handle(event);
        for effect in &out.effects {
            queue.extend(surface.apply(effect));
        }
        all.messages.extend(out.messages);
        all.effects.extend(out.effects);
    }
    all
}
