use crate::codec::ViewSelection;
use crate::flow::RawInput;
use crate::observe::MutationRecord;
use crate::protocol::{HostMessage, TransformOp, UnitId};
use crate::tuning::Millis;
use crate::view::VisualTree;

/// Everything that can happen to the bridge, in one queue.
///
/// The embedder translates its platform's callbacks (message port, input
/// listeners, mutation observers, animation frames) into these events and
/// feeds them to [`Bridge::handle`](crate::bridge::Bridge::handle) on a
/// single cooperative timeline. Events that start or advance timed work
/// carry the embedder's monotonic clock.
#[derive(Debug, Clone)]
pub enum SurfaceEvent {
    /// Raw inbound payload from the cross-context channel.
    Inbound {
        origin: String,
        payload: String,
        now: Millis,
    },
    /// An already-decoded host message (trusted callers and tests).
    HostMessage {
        origin: String,
        message: HostMessage,
        now: Millis,
    },
    /// The surface re-rendered; this is the fresh mirror.
    TreeReplaced { tree: VisualTree },
    /// Animation-frame tick: geometry polling, debounce, timeouts.
    Frame { now: Millis },
    /// Committed input into a plain/multiline field (input event level).
    FieldInput {
        unit: UnitId,
        field: String,
        value: String,
        now: Millis,
    },
    /// Raw key-level input for an editable unit (interception point while
    /// a transform is in flight).
    RawKey {
        unit: UnitId,
        input: RawInput,
        now: Millis,
    },
    /// A structural command for a unit (editor chrome or key handling).
    StructuralCommand {
        unit: UnitId,
        op: TransformOp,
        now: Millis,
    },
    /// A DOM-level mutation inside the rendering.
    Mutation { record: MutationRecord, now: Millis },
    /// The live selection moved.
    SelectionChanged { selection: Option<ViewSelection> },
    /// The user clicked a unit in the surface.
    UnitClicked { unit: UnitId },
    /// Drag lifecycle.
    PointerDown { unit: UnitId, x: f64, y: f64 },
    PointerMove { x: f64, y: f64 },
    PointerUp,
    /// The surface's own navigation changed the location.
    LocationChanged { path: String },
}
