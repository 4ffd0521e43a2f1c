//! End-to-end bridge sessions against the reference surface.

use framesync_engine::bridge::{Bridge, BridgeOptions, SurfaceEffect, SurfaceEvent};
use framesync_engine::codec::{ViewPoint, ViewSelection};
use framesync_engine::flow::RawInput;
use framesync_engine::model::{DocNode, DocumentModel};
use framesync_engine::protocol::{HostMessage, RequestId, SurfaceMessage, TransformOp, UnitId};
use framesync_engine::sim::{self, SimOptions, SimSurface};
use framesync_engine::tuning::Tuning;
use framesync_engine::view::binding;

const ORIGIN: &str = "https://editor.example.com";

fn document() -> DocumentModel {
    DocumentModel::new(vec![
        DocNode::element(
            "p",
            vec![
                DocNode::text("Hello "),
                DocNode::element("strong", vec![DocNode::text("world")]),
            ],
        ),
        DocNode::element("quote", vec![DocNode::text("fine words")]),
    ])
}

struct Session {
    bridge: Bridge,
    surface: SimSurface,
    now: u64,
}

impl Session {
    fn start(doc: DocumentModel, opts: SimOptions) -> Self {
        let surface = SimSurface::new(doc.clone(), opts);
        let bridge = Bridge::new(BridgeOptions {
            tuning: Tuning::default(),
            schema: sim::default_schema(&doc),
            trusted_origins: vec!["https://*.example.com".to_string()],
        })
        .unwrap();
        let mut session = Self {
            bridge,
            surface,
            now: 0,
        };
        session.host(HostMessage::Document {
            document: doc,
            selection: None,
            ack: None,
        });
        session
    }

    fn pump(&mut self, event: SurfaceEvent) -> framesync_engine::bridge::Outcome {
        sim::pump(&mut self.bridge, &mut self.surface, event)
    }

    fn host(&mut self, message: HostMessage) -> framesync_engine::bridge::Outcome {
        self.pump(SurfaceEvent::HostMessage {
            origin: ORIGIN.to_string(),
            message,
            now: self.now,
        })
    }

    fn frame(&mut self, advance: u64) -> framesync_engine::bridge::Outcome {
        self.now += advance;
        self.pump(SurfaceEvent::Frame { now: self.now })
    }

    /// A caret at the start of the first text run of a unit's body.
    fn caret_in(&self, unit: &str) -> ViewSelection {
        let tree = self.surface.tree();
        let root = binding::find_unit(tree, unit).unwrap();
        let run = tree
            .descendants(root)
            .into_iter()
            .find(|&n| tree.text(n).is_some_and(|t| !t.trim().is_empty()))
            .unwrap();
        ViewSelection::caret(ViewPoint::InText {
            node: run,
            offset: 0,
        })
    }

    fn focus(&mut self, unit: &str) {
        let selection = self.caret_in(unit);
        self.pump(SurfaceEvent::UnitClicked {
            unit: UnitId::from(unit),
        });
        self.pump(SurfaceEvent::SelectionChanged {
            selection: Some(selection),
        });
    }
}

fn edits(outcome: &framesync_engine::bridge::Outcome) -> Vec<&SurfaceMessage> {
    outcome
        .messages
        .iter()
        .filter(|m| matches!(m, SurfaceMessage::Edit { .. }))
        .collect()
}

#[test]
fn selecting_a_unit_reports_geometry_and_fields() {
    let mut session = Session::start(document(), SimOptions::default());
    let outcome = session.pump(SurfaceEvent::UnitClicked { unit: "u0".into() });
    let selected = outcome
        .messages
        .iter()
        .find_map(|m| match m {
            SurfaceMessage::UnitSelected { unit, rect, fields, .. } => {
                Some((unit.clone(), *rect, fields.clone()))
            }
            _ => None,
        })
        .expect("unit selected message");
    assert_eq!(selected.0, UnitId::from("u0"));
    assert!(selected.1.height > 0.0);
    assert_eq!(selected.2[0].name, "body");
}

#[test]
fn typing_debounces_into_an_edit_with_the_new_text() {
    let mut session = Session::start(document(), SimOptions::default());
    session.focus("u1");
    let outcome = session.pump(SurfaceEvent::FieldInput {
        unit: "u1".into(),
        field: "body".to_string(),
        value: "finer words".to_string(),
        now: session.now,
    });
    assert!(edits(&outcome).is_empty(), "edit must wait for the debounce");
    let outcome = session.frame(Tuning::default().debounce_ms + 10);
    let edits = edits(&outcome);
    assert_eq!(edits.len(), 1);
    let SurfaceMessage::Edit { seq, document, .. } = edits[0] else {
        unreachable!()
    };
    assert_eq!(*seq, 0);
    assert_eq!(
        document.plain_text_of(&vec![1].into()).unwrap(),
        "finer words"
    );
}

#[test]
fn host_echo_never_produces_an_outbound_edit() {
    let mut session = Session::start(document(), SimOptions::default());
    session.focus("u1");
    session.pump(SurfaceEvent::FieldInput {
        unit: "u1".into(),
        field: "body".to_string(),
        value: "fine words".to_string(), // exactly what the host rendered
        now: session.now,
    });
    let outcome = session.frame(Tuning::default().debounce_ms + 10);
    assert!(edits(&outcome).is_empty());
}

#[test]
fn format_then_paste_is_refused_until_the_ack_arrives() {
    let mut session = Session::start(document(), SimOptions::default());
    session.focus("u0");
    let outcome = session.pump(SurfaceEvent::StructuralCommand {
        unit: "u0".into(),
        op: TransformOp::Format {
            mark: "bold".to_string(),
        },
        now: session.now,
    });
    let request = outcome
        .messages
        .iter()
        .find_map(|m| match m {
            SurfaceMessage::Transform { request, .. } => Some(*request),
            _ => None,
        })
        .expect("transform request");

    // the second structural command before the ack must be refused
    let outcome = session.pump(SurfaceEvent::StructuralCommand {
        unit: "u0".into(),
        op: TransformOp::Paste {
            text: "pasted".to_string(),
        },
        now: session.now,
    });
    assert!(
        !outcome
            .messages
            .iter()
            .any(|m| matches!(m, SurfaceMessage::Transform { .. })),
        "second transform must not be dispatched"
    );
    assert!(outcome
        .effects
        .iter()
        .any(|e| matches!(e, SurfaceEffect::ShowDevWarning { .. })));

    // typed input while blocked is intercepted, then replayed after the ack
    session.pump(SurfaceEvent::RawKey {
        unit: "u0".into(),
        input: RawInput::Text("!".to_string()),
        now: session.now,
    });
    session.host(HostMessage::Document {
        document: document(),
        selection: None,
        ack: Some(request),
    });
    let outcome = session.frame(16);
    assert!(outcome.effects.iter().any(
        |e| matches!(e, SurfaceEffect::InsertText { unit, text } if unit == &UnitId::from("u0") && text == "!")
    ));

    // with the transform resolved, a new command goes through
    session.focus("u0");
    let outcome = session.pump(SurfaceEvent::StructuralCommand {
        unit: "u0".into(),
        op: TransformOp::Paste {
            text: "pasted".to_string(),
        },
        now: session.now,
    });
    assert!(outcome
        .messages
        .iter()
        .any(|m| matches!(m, SurfaceMessage::Transform { .. })));
}

#[test]
fn unacknowledged_transform_locks_only_its_unit() {
    let mut session = Session::start(document(), SimOptions::default());
    session.focus("u0");
    session.pump(SurfaceEvent::StructuralCommand {
        unit: "u0".into(),
        op: TransformOp::Enter,
        now: session.now,
    });
    let outcome = session.frame(Tuning::default().transform_timeout_ms + 1);
    assert!(outcome.effects.iter().any(
        |e| matches!(e, SurfaceEffect::LockUnit { unit, .. } if unit == &UnitId::from("u0"))
    ));
    // the other unit still edits normally
    session.focus("u1");
    let outcome = session.pump(SurfaceEvent::FieldInput {
        unit: "u1".into(),
        field: "body".to_string(),
        value: "still alive".to_string(),
        now: session.now,
    });
    assert!(outcome.effects.is_empty());
    let outcome = session.frame(Tuning::default().debounce_ms + 10);
    assert_eq!(edits(&outcome).len(), 1);
}

#[test]
fn transform_seq_follows_flushed_edit_seq() {
    let mut session = Session::start(document(), SimOptions::default());
    session.focus("u0");
    session.pump(SurfaceEvent::FieldInput {
        unit: "u0".into(),
        field: "body".to_string(),
        value: "Hello moon".to_string(),
        now: session.now,
    });
    // structural command while the debounce is still pending: the buffered
    // edit flushes first and both stay in send order
    let outcome = session.pump(SurfaceEvent::StructuralCommand {
        unit: "u0".into(),
        op: TransformOp::Enter,
        now: session.now,
    });
    let mut seqs = Vec::new();
    for message in &outcome.messages {
        match message {
            SurfaceMessage::Edit { seq, .. } => seqs.push(*seq),
            SurfaceMessage::Transform { seq, .. } => seqs.push(*seq),
            _ => {}
        }
    }
    assert_eq!(seqs, vec![0, 1]);
}

#[test]
fn host_flush_acknowledges_with_the_carrying_seq() {
    let mut session = Session::start(document(), SimOptions::default());
    session.focus("u1");
    session.pump(SurfaceEvent::FieldInput {
        unit: "u1".into(),
        field: "body".to_string(),
        value: "draft".to_string(),
        now: session.now,
    });
    let request = RequestId::fresh();
    let outcome = session.host(HostMessage::FlushEdits { request });
    let flushed = outcome
        .messages
        .iter()
        .find_map(|m| match m {
            SurfaceMessage::Flushed { request: r, seq } => Some((*r, *seq)),
            _ => None,
        })
        .expect("flushed ack");
    assert_eq!(flushed.0, request);
    assert_eq!(flushed.1, Some(0));
    assert_eq!(edits(&outcome).len(), 1);

    // nothing pending: flush acknowledges with no seq
    let request = RequestId::fresh();
    let outcome = session.host(HostMessage::FlushEdits { request });
    let flushed = outcome
        .messages
        .iter()
        .find_map(|m| match m {
            SurfaceMessage::Flushed { seq, .. } => Some(*seq),
            _ => None,
        })
        .unwrap();
    assert_eq!(flushed, None);
}

#[test]
fn carousel_navigation_steps_exactly_twice_with_polls_between() {
    let doc = DocumentModel::new(vec![DocNode::element(
        "carousel",
        vec![
            DocNode::element("slide", vec![DocNode::text("one")]),
            DocNode::element("slide", vec![DocNode::text("two")]),
            DocNode::element("slide", vec![DocNode::text("three")]),
        ],
    )]);
    let mut session = Session::start(doc, SimOptions::default());
    let mut invocations = 0;

    let outcome = session.host(HostMessage::SelectUnit {
        unit: "u0-2".into(),
    });
    invocations += outcome
        .effects
        .iter()
        .filter(|e| matches!(e, SurfaceEffect::InvokeControl { .. }))
        .count();

    let mut selected = None;
    for _ in 0..6 {
        let outcome = session.frame(Tuning::default().nav_poll_interval_ms + 1);
        invocations += outcome
            .effects
            .iter()
            .filter(|e| matches!(e, SurfaceEffect::InvokeControl { .. }))
            .count();
        if let Some(unit) = outcome.messages.iter().find_map(|m| match m {
            SurfaceMessage::UnitSelected { unit, .. } => Some(unit.clone()),
            _ => None,
        }) {
            selected = Some(unit);
            break;
        }
    }
    assert_eq!(invocations, 2, "a +1 control reaches slide 2 in two steps");
    assert_eq!(selected, Some(UnitId::from("u0-2")));
}

#[test]
fn direct_selector_wins_over_stepping() {
    let doc = DocumentModel::new(vec![DocNode::element(
        "carousel",
        vec![
            DocNode::element("slide", vec![DocNode::text("one")]),
            DocNode::element("slide", vec![DocNode::text("two")]),
            DocNode::element("slide", vec![DocNode::text("three")]),
        ],
    )]);
    let mut session = Session::start(
        doc,
        SimOptions {
            direct_controls: true,
            ..SimOptions::default()
        },
    );
    let outcome = session.host(HostMessage::SelectUnit {
        unit: "u0-2".into(),
    });
    assert_eq!(
        outcome
            .effects
            .iter()
            .filter(|e| matches!(e, SurfaceEffect::InvokeControl { .. }))
            .count(),
        1
    );
    let outcome = session.frame(Tuning::default().nav_poll_interval_ms + 1);
    assert!(outcome.messages.iter().any(|m| matches!(
        m,
        SurfaceMessage::UnitSelected { unit, .. } if unit == &UnitId::from("u0-2")
    )));
}

#[test]
fn dragging_a_unit_emits_a_relocation_with_parentage() {
    let mut session = Session::start(document(), SimOptions::default());
    session.pump(SurfaceEvent::PointerDown {
        unit: "u0".into(),
        x: 10.0,
        y: 10.0,
    });
    let outcome = session.pump(SurfaceEvent::PointerMove { x: 400.0, y: 180.0 });
    assert!(outcome
        .effects
        .iter()
        .any(|e| matches!(e, SurfaceEffect::ShowDropIndicator { .. })));
    let outcome = session.pump(SurfaceEvent::PointerUp);
    let relocation = outcome
        .messages
        .iter()
        .find_map(|m| match m {
            SurfaceMessage::Relocate { moved, target, side } => {
                Some((moved.clone(), target.clone(), *side))
            }
            _ => None,
        })
        .expect("relocation request");
    assert_eq!(relocation.0.unit, UnitId::from("u0"));
    assert_eq!(relocation.1.unit, UnitId::from("u1"));
    assert_eq!(relocation.1.index, 1);
}

#[test]
fn untrusted_origins_are_dropped_entirely() {
    let mut session = Session::start(document(), SimOptions::default());
    let outcome = session.pump(SurfaceEvent::HostMessage {
        origin: "https://evil.test".to_string(),
        message: HostMessage::SelectUnit { unit: "u0".into() },
        now: 0,
    });
    assert!(outcome.messages.is_empty());
    assert!(outcome.effects.is_empty());
}

#[test]
fn malformed_inbound_payloads_fail_loudly() {
    let mut session = Session::start(document(), SimOptions::default());
    let outcome = session.pump(SurfaceEvent::Inbound {
        origin: ORIGIN.to_string(),
        payload: r#"{"kind":"flush_edits"}"#.to_string(),
        now: 0,
    });
    assert!(outcome
        .effects
        .iter()
        .any(|e| matches!(e, SurfaceEffect::ShowDevWarning { .. })));
}

#[test]
fn location_changes_are_forwarded() {
    let mut session = Session::start(document(), SimOptions::default());
    let outcome = session.pump(SurfaceEvent::LocationChanged {
        path: "/about".to_string(),
    });
    assert!(outcome
        .messages
        .iter()
        .any(|m| matches!(m, SurfaceMessage::Navigated { path } if path == "/about")));
}
