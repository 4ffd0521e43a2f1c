//! The bridge runtime: one event loop over everything that can happen.
//!
//! A [`Bridge`] is a function of (state, event) → (state mutation, outbound
//! messages, surface effects). It owns the shadow document, the mirror of
//! the rendering, and the five cooperating components (selection codec,
//! flow controller, render observer, visibility navigator, reorder
//! controller). There is no interior waiting anywhere: suspension points
//! are the embedder's frame ticks, and every polling loop is bounded.
//!
//! Exactly one bridge exists per surface document. [`Bridge::install`]
//! creates the process-wide instance once and hands the same handle to
//! every later initialization call, so a hot-reloaded embedding script
//! re-attaches instead of spawning a second bridge.

pub mod effects;
pub mod events;
pub mod origin;

pub use effects::SurfaceEffect;
pub use events::SurfaceEvent;

use crate::codec::{
    self, CodecError, Selection, ViewPoint, ViewSelection, placeholder,
};
use crate::diagnostics::DesyncGate;
use crate::error::BridgeError;
use crate::fields::SchemaRegistry;
use crate::flow::{FlowController, FlowSignal, LocalEdit, RawInput};
use crate::model::{DocumentModel, ShadowDocument, StructuralPath};
use crate::navigate::{NavOutcome, VisibilityNavigator};
use crate::observe::{self, MutationRecord, Observation, RenderObserver};
use crate::protocol::{
    self, EditSource, HostMessage, ProtocolError, SurfaceMessage, TransformOp, UnitId,
};
use crate::reorder::{DragUpdate, ReorderController};
use crate::tuning::{Millis, Tuning};
use crate::view::binding::{self, FIELD_ATTR, TYPE_ATTR};
use crate::view::{NodeId, VisualTree};
use origin::OriginGate;
use std::sync::{Arc, Mutex, OnceLock};

#[derive(Debug, Clone, Default)]
pub struct BridgeOptions {
    pub tuning: Tuning,
    pub schema: SchemaRegistry,
    /// Wildcard patterns for trusted host origins; empty means learn the
    /// first inbound origin (reduced trust).
    pub trusted_origins: Vec<String>,
}

/// Everything one event produced: messages for the host, effects for the
/// surface, in emission order.
#[derive(Debug, Default)]
pub struct Outcome {
    pub messages: Vec<SurfaceMessage>,
    pub effects: Vec<SurfaceEffect>,
}

struct PendingRestore {
    selection: Selection,
    retries_left: u32,
}

pub struct Bridge {
    tuning: Tuning,
    schema: SchemaRegistry,
    origin: OriginGate,
    shadow: ShadowDocument,
    tree: VisualTree,
    flow: FlowController,
    observer: RenderObserver,
    navigator: VisibilityNavigator,
    reorder: ReorderController,
    desync: DesyncGate,
    selected: Option<UnitId>,
    view_selection: Option<ViewSelection>,
    /// Last successfully serialized selection; what outbound traffic carries.
    last_selection: Option<Selection>,
    pending_restore: Option<PendingRestore>,
    now: Millis,
}

static INSTANCE: OnceLock<Arc<Mutex<Bridge>>> = OnceLock::new();

pub type BridgeHandle = Arc<Mutex<Bridge>>;

impl Bridge {
    pub fn new(options: BridgeOptions) -> Result<Self, BridgeError> {
        Ok(Self {
            origin: OriginGate::new(&options.trusted_origins)?,
            flow: FlowController::new(&options.tuning),
            observer: RenderObserver::new(&options.tuning)?,
            navigator: VisibilityNavigator::new(&options.tuning),
            reorder: ReorderController::default(),
            desync: DesyncGate::default(),
            shadow: ShadowDocument::default(),
            tree: VisualTree::default(),
            selected: None,
            view_selection: None,
            last_selection: None,
            pending_restore: None,
            now: 0,
            schema: options.schema,
            tuning: options.tuning,
        })
    }

    /// Create or re-attach to the process-wide bridge. The first call wins;
    /// later calls get the existing handle and their options are ignored.
    pub fn install(options: BridgeOptions) -> Result<BridgeHandle, BridgeError> {
        if let Some(existing) = INSTANCE.get() {
            log::debug!("bridge already installed; reusing existing instance");
            return Ok(existing.clone());
        }
        let bridge = Arc::new(Mutex::new(Self::new(options)?));
        Ok(INSTANCE.get_or_init(|| bridge).clone())
    }

    pub fn shadow(&self) -> &DocumentModel {
        self.shadow.document()
    }

    pub fn selected_unit(&self) -> Option<&UnitId> {
        self.selected.as_ref()
    }

    /// The single event-loop entry point.
    pub fn handle(&mut self, event: SurfaceEvent) -> Outcome {
        let mut out = Outcome::default();
        match event {
            SurfaceEvent::Inbound {
                origin,
                payload,
                now,
            } => {
                self.now = now.max(self.now);
                if !self.origin.admit(&origin) {
                    log::warn!(
                        "{}",
                        ProtocolError::UntrustedOrigin { origin }
                    );
                    return out;
                }
                match protocol::decode_host_message(&payload) {
                    Ok(message) => self.handle_host_message(message, &mut out),
                    Err(err) => {
                        // protocol contract violation: fatal for this call
                        log::error!("{err}");
                        out.effects.push(SurfaceEffect::ShowDevWarning {
                            message: err.to_string(),
                        });
                    }
                }
            }
            SurfaceEvent::HostMessage {
                origin,
                message,
                now,
            } => {
                self.now = now.max(self.now);
                if self.origin.admit(&origin) {
                    self.handle_host_message(message, &mut out);
                }
            }
            SurfaceEvent::TreeReplaced { tree } => self.on_tree_replaced(tree, &mut out),
            SurfaceEvent::Frame { now } => self.on_frame(now, &mut out),
            SurfaceEvent::FieldInput {
                unit,
                field,
                value,
                now,
            } => {
                self.now = now.max(self.now);
                self.on_local_edit(&unit, &field, &value, None, &mut out);
            }
            SurfaceEvent::RawKey { unit, input, now } => {
                self.now = now.max(self.now);
                self.on_raw_key(&unit, input, &mut out);
            }
            SurfaceEvent::StructuralCommand { unit, op, now } => {
                self.now = now.max(self.now);
                self.dispatch_transform(&unit, op, &mut out);
            }
            SurfaceEvent::Mutation { record, now } => {
                self.now = now.max(self.now);
                self.on_mutation(&record, &mut out);
            }
            SurfaceEvent::SelectionChanged { selection } => {
                self.on_selection_changed(selection);
            }
            SurfaceEvent::UnitClicked { unit } => {
                self.navigator.cancel();
                self.select_unit(&unit, &mut out);
            }
            SurfaceEvent::PointerDown { unit, x, y } => {
                if self.reorder.begin(&self.tree, &unit) {
                    out.effects.push(SurfaceEffect::SpawnDragProxy { unit });
                    out.effects.push(SurfaceEffect::MoveDragProxy { x, y });
                }
            }
            SurfaceEvent::PointerMove { x, y } => {
                if self.reorder.is_dragging() {
                    out.effects.push(SurfaceEffect::MoveDragProxy { x, y });
                    match self.reorder.update(&self.tree, &self.schema, x, y) {
                        Some(DragUpdate::Indicator { node, side }) => {
                            out.effects
                                .push(SurfaceEffect::ShowDropIndicator { node, side });
                        }
                        Some(DragUpdate::NoTarget) => {
                            out.effects.push(SurfaceEffect::HideDropIndicator);
                        }
                        None => {}
                    }
                }
            }
            SurfaceEvent::PointerUp => {
                if let Some(intent) = self.reorder.release(&self.tree) {
                    out.messages.push(SurfaceMessage::Relocate {
                        moved: intent.moved,
                        target: intent.target,
                        side: intent.side,
                    });
                }
                out.effects.push(SurfaceEffect::RemoveDragProxy);
                out.effects.push(SurfaceEffect::HideDropIndicator);
            }
            SurfaceEvent::LocationChanged { path } => {
                out.messages.push(SurfaceMessage::Navigated { path });
            }
        }
        out
    }

    fn handle_host_message(&mut self, message: HostMessage, out: &mut Outcome) {
        match message {
            HostMessage::Document {
                document,
                selection,
                ack,
            } => {
                self.shadow.replace(document.clone());
                self.pending_restore = selection.map(|selection| PendingRestore {
                    selection,
                    retries_left: self.tuning.restore_retry_limit,
                });
                if let Some(request) = ack {
                    if let Some(unit) = self.flow.acknowledge(request) {
                        out.effects.push(SurfaceEffect::SetBusy { unit, busy: false });
                    }
                }
                out.effects
                    .push(SurfaceEffect::RenderDocument { document });
            }
            HostMessage::SelectUnit { unit } => {
                let now = self.now;
                let (controls, outcome) = self.navigator.begin(&self.tree, &unit, now);
                for node in controls {
                    out.effects.push(SurfaceEffect::InvokeControl { node });
                }
                if let Some(outcome) = outcome {
                    self.on_nav_outcome(outcome, out);
                }
            }
            HostMessage::FlushEdits { request } => {
                let signals = self.flow.flush_all(EditSource::HostFlush);
                let mut flushed_seq = None;
                for signal in &signals {
                    if let FlowSignal::FlushEdit { seq, .. } = signal {
                        flushed_seq = Some(*seq);
                    }
                }
                self.process_flow_signals(signals, out);
                out.messages.push(SurfaceMessage::Flushed {
                    request,
                    seq: flushed_seq,
                });
            }
            HostMessage::TransformFailed { request, reason } => {
                log::warn!("host rejected transform {request}: {reason}");
                let signals = self.flow.transform_failed(request, &reason);
                self.process_flow_signals(signals, out);
            }
        }
    }

    fn on_tree_replaced(&mut self, tree: VisualTree, out: &mut Outcome) {
        self.tree = tree;
        self.view_selection = None;
        self.observer.reattach_all(&self.tree);
        self.record_host_values();
        self.try_restore_selection(out);
        if let Some(unit) = self.selected.clone() {
            self.push_unit_selected(&unit, out);
        }
    }

    fn on_frame(&mut self, now: Millis, out: &mut Outcome) {
        self.now = now.max(self.now);

        let signals = self.flow.tick(now);
        self.process_flow_signals(signals, out);

        for observation in self.observer.on_frame(&self.tree) {
            if let Observation::OverlayMoved { unit, .. } = observation {
                if Some(&unit) == self.selected.as_ref() {
                    self.push_unit_selected(&unit, out);
                }
            }
        }

        let (controls, outcome) = self.navigator.tick(&self.tree, now);
        for node in controls {
            out.effects.push(SurfaceEffect::InvokeControl { node });
        }
        if let Some(outcome) = outcome {
            self.on_nav_outcome(outcome, out);
        }

        self.try_restore_selection(out);

        // buffered-input replay once the rendering has settled
        for unit in self.flow.replaying_units() {
            let stable = self.pending_restore.is_none() && !self.observer.in_motion(&unit);
            let signals = self.flow.try_replay(&unit, stable);
            self.process_flow_signals(signals, out);
        }
    }

    fn on_mutation(&mut self, record: &MutationRecord, out: &mut Outcome) {
        // bring the mirror current before anything reads it
        if let crate::observe::MutationKind::CharacterData { text } = &record.kind {
            self.tree.set_text(record.target, text);
        }
        let observations = self.observer.on_mutation(&self.tree, record);
        for observation in observations {
            match observation {
                Observation::LocalEdit {
                    unit,
                    field,
                    value,
                    target,
                } => {
                    let leaf = self.leaf_path_of_run(target);
                    self.on_local_edit(&unit, &field, &value, leaf, out);
                }
                Observation::OverlayMoved { unit, .. } => {
                    if Some(&unit) == self.selected.as_ref() {
                        self.push_unit_selected(&unit, out);
                    }
                }
            }
        }
    }

    /// Route a local text change through echo suppression and, when it is a
    /// genuine edit, into the shadow copy. `leaf` narrows the write to one
    /// text leaf (rich text); otherwise the whole field value is written.
    fn on_local_edit(
        &mut self,
        unit: &UnitId,
        field: &str,
        value: &str,
        leaf: Option<(StructuralPath, String)>,
        out: &mut Outcome,
    ) {
        let Some(unit_type) = self.unit_type_of(unit) else {
            return;
        };
        if !self.schema.field_kind(&unit_type, field).is_editable() {
            log::debug!("field {field} of {unit_type} is not declared editable; ignoring edit");
            return;
        }
        match self.flow.local_edit(unit, field, value, self.now) {
            LocalEdit::Echo | LocalEdit::Ignored => {}
            LocalEdit::Buffered => {
                let result = match &leaf {
                    Some((path, text)) => self.shadow.set_text(path, text),
                    None => match self.field_path(unit, field) {
                        Some(path) => self.shadow.set_field_text(&path, value),
                        None => {
                            log::debug!("no bound path for field {field} of {unit}");
                            return;
                        }
                    },
                };
                if let Err(err) = result {
                    self.report_desync(&err_path(&err), out);
                }
            }
        }
    }

    fn on_raw_key(&mut self, unit: &UnitId, input: RawInput, out: &mut Outcome) {
        if self.flow.intercept_input(unit, input.clone()) {
            return;
        }
        // structural keys dispatch transforms; plain typing flows through
        // the rendering natively and comes back as mutations
        if input == RawInput::Enter {
            self.dispatch_transform(unit, TransformOp::Enter, out);
        }
    }

    fn dispatch_transform(&mut self, unit: &UnitId, op: TransformOp, out: &mut Outcome) {
        let Some(selection) = self.current_selection() else {
            let message = format!("cannot dispatch {op:?} for {unit}: no resolvable selection");
            log::warn!("{message}");
            out.effects.push(SurfaceEffect::ShowDevWarning { message });
            return;
        };
        match self.flow.begin_transform(unit, op, self.now) {
            Ok(signals) => self.process_flow_signals_with_selection(signals, Some(selection), out),
            Err(err) => {
                // at-most-one-in-flight: the second command is refused
                log::warn!("{err}");
                out.effects.push(SurfaceEffect::ShowDevWarning {
                    message: err.to_string(),
                });
            }
        }
    }

    fn on_selection_changed(&mut self, selection: Option<ViewSelection>) {
        self.view_selection = selection;
        if let Some(view) = &self.view_selection {
            match codec::serialize_selection(&self.tree, view) {
                Ok(selection) => self.last_selection = Some(selection),
                Err(err) if err.is_transient() => {
                    log::debug!("selection not serializable yet: {err}");
                }
                Err(CodecError::NotApplicable) => {}
                Err(err) => log::warn!("selection serialization failed: {err}"),
            }
        }
    }

    fn on_nav_outcome(&mut self, outcome: NavOutcome, out: &mut Outcome) {
        match outcome {
            NavOutcome::Visible(unit) | NavOutcome::Fallback(unit) => {
                self.select_unit(&unit, out);
            }
            NavOutcome::Aborted => {
                log::debug!("visibility navigation ended without selection change");
            }
        }
    }

    fn select_unit(&mut self, unit: &UnitId, out: &mut Outcome) {
        self.selected = Some(unit.clone());
        self.observer.watch(&self.tree, unit);
        self.push_unit_selected(unit, out);
    }

    /// Unit-selected notification: bounding geometry, declared field
    /// inventory, and the focused field.
    fn push_unit_selected(&mut self, unit: &UnitId, out: &mut Outcome) {
        let Some(node) = binding::find_unit(&self.tree, unit.as_str()) else {
            return;
        };
        let unit_type = self.unit_type_of(unit).unwrap_or_default();
        out.messages.push(SurfaceMessage::UnitSelected {
            unit: unit.clone(),
            rect: self.tree.rect(node),
            fields: self.schema.fields_of(&unit_type),
            focused: self.focused_field(),
        });
    }

    fn try_restore_selection(&mut self, out: &mut Outcome) {
        let Some(pending) = &mut self.pending_restore else {
            return;
        };
        let selection = pending.selection.clone();
        match codec::resolve_selection(&mut self.tree, self.shadow.document(), &selection) {
            Ok(resolved) => {
                for caret in [&resolved.anchor, &resolved.focus] {
                    if let Some(node) = caret.inserted_anchor {
                        out.effects.push(SurfaceEffect::MirrorCursorAnchor { node });
                    }
                }
                out.effects.push(SurfaceEffect::PlaceCaret {
                    anchor: resolved.anchor.point,
                    focus: resolved.focus.point,
                });
                self.view_selection = Some(ViewSelection {
                    anchor: resolved.anchor.point,
                    focus: resolved.focus.point,
                });
                self.last_selection = Some(selection);
                self.pending_restore = None;
            }
            Err(err) if err.is_transient() => {
                if pending.retries_left == 0 {
                    log::warn!("giving up on selection restore: {err}");
                    self.pending_restore = None;
                } else {
                    pending.retries_left -= 1;
                }
            }
            Err(CodecError::Desync { path }) => {
                self.pending_restore = None;
                self.report_desync(&path, out);
            }
            Err(err) => {
                log::warn!("selection restore failed: {err}");
                self.pending_restore = None;
            }
        }
    }

    fn process_flow_signals(&mut self, signals: Vec<FlowSignal>, out: &mut Outcome) {
        self.process_flow_signals_with_selection(signals, None, out);
    }

    fn process_flow_signals_with_selection(
        &mut self,
        signals: Vec<FlowSignal>,
        selection: Option<Selection>,
        out: &mut Outcome,
    ) {
        for signal in signals {
            match signal {
                FlowSignal::FlushEdit { seq, source } => {
                    out.messages.push(SurfaceMessage::Edit {
                        seq,
                        document: self.shadow.document().clone(),
                        selection: selection.clone().or_else(|| self.last_selection.clone()),
                        source,
                    });
                }
                FlowSignal::DispatchTransform {
                    seq,
                    request,
                    unit,
                    op,
                } => {
                    let Some(selection) =
                        selection.clone().or_else(|| self.last_selection.clone())
                    else {
                        // guarded by dispatch_transform; defensive here
                        log::warn!("transform {request} dropped: no selection");
                        continue;
                    };
                    out.messages.push(SurfaceMessage::Transform {
                        seq,
                        request,
                        unit,
                        op,
                        document: self.shadow.document().clone(),
                        selection,
                    });
                }
                FlowSignal::SetBusy { unit, busy } => {
                    out.effects.push(SurfaceEffect::SetBusy { unit, busy });
                }
                FlowSignal::LockUnit { unit, reason } => {
                    out.effects.push(SurfaceEffect::LockUnit {
                        unit,
                        message: reason,
                    });
                }
                FlowSignal::ReplayText { unit, text } => {
                    out.effects.push(SurfaceEffect::InsertText { unit, text });
                }
                FlowSignal::Warn { message } => {
                    out.effects.push(SurfaceEffect::ShowDevWarning { message });
                }
            }
        }
    }

    /// Serialize the live selection now, falling back to the last
    /// successful serialization.
    fn current_selection(&mut self) -> Option<Selection> {
        if let Some(view) = &self.view_selection {
            if let Ok(selection) = codec::serialize_selection(&self.tree, view) {
                self.last_selection = Some(selection);
            }
        }
        self.last_selection.clone()
    }

    fn focused_field(&self) -> Option<String> {
        let focus = self.view_selection.as_ref()?.focus;
        let node = match focus {
            ViewPoint::InText { node, .. } | ViewPoint::InElement { node, .. } => node,
        };
        self.tree
            .ancestors_inclusive(node)
            .find_map(|n| self.tree.attr(n, FIELD_ATTR))
            .map(str::to_string)
    }

    fn unit_type_of(&self, unit: &UnitId) -> Option<String> {
        let node = binding::find_unit(&self.tree, unit.as_str())?;
        Some(self.tree.attr(node, TYPE_ATTR).unwrap_or_default().to_string())
    }

    /// The bound path of the field element for (unit, field), if rendered.
    fn field_path(&self, unit: &UnitId, field: &str) -> Option<StructuralPath> {
        let root = binding::find_unit(&self.tree, unit.as_str())?;
        let field_node = self
            .tree
            .descendants(root)
            .into_iter()
            .find(|&n| self.tree.attr(n, FIELD_ATTR) == Some(field))?;
        binding::nearest_bound_ancestor(&self.tree, field_node).map(|(_, path)| path)
    }

    /// For a mutated text run, the model leaf it maps to plus its raw text
    /// (placeholders are stripped on write).
    fn leaf_path_of_run(&self, target: NodeId) -> Option<(StructuralPath, String)> {
        let text = self.tree.text(target)?;
        let point = codec::serialize_point(
            &self.tree,
            &ViewPoint::InText {
                node: target,
                offset: 0,
            },
        )
        .ok()?;
        Some((point.path, placeholder::strip(text)))
    }

    /// Record the field values a host snapshot rendered, for echo
    /// suppression.
    fn record_host_values(&mut self) {
        let mut recorded = Vec::new();
        for node in self.tree.descendants(self.tree.root()) {
            let Some(field) = self.tree.attr(node, FIELD_ATTR) else {
                continue;
            };
            let Some(unit_node) = binding::unit_root(&self.tree, node) else {
                continue;
            };
            let Some(unit) = binding::unit_id_of(&self.tree, unit_node) else {
                continue;
            };
            let value = placeholder::strip(&observe::rendered_text(&self.tree, node));
            recorded.push((UnitId::from(unit), field.to_string(), value));
        }
        for (unit, field, value) in recorded {
            self.flow.note_host_value(&unit, &field, &value);
        }
    }

    fn report_desync(&mut self, path: &StructuralPath, out: &mut Outcome) {
        if let Some(message) = self.desync.report(&self.tree, self.shadow.document(), path) {
            out.effects.push(SurfaceEffect::ShowDevWarning { message });
        }
    }
}

/// The path a model error complains about.
fn err_path(err: &crate::model::ModelError) -> StructuralPath {
    match err {
        crate::model::ModelError::NoSuchPath { path }
        | crate::model::ModelError::NotAText { path }
        | crate::model::ModelError::NotAnElement { path } => path.clone(),
    }
}
