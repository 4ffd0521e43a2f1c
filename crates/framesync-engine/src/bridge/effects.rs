use crate::model::DocumentModel;
use crate::protocol::{Side, UnitId};
use crate::view::NodeId;

/// What the bridge asks the embedding surface to do.
///
/// The bridge computes; the embedder touches the real rendering. Effects
/// reference mirror nodes by [`NodeId`]; the embedder maps those back onto
/// whatever it mirrored them from.
#[derive(Debug, Clone, PartialEq)]
pub enum SurfaceEffect {
    /// Hand a fresh host document to the rendering logic. The embedder
    /// re-renders and reports back with a tree replacement.
    RenderDocument { document: DocumentModel },
    /// Place the live selection.
    PlaceCaret {
        anchor: crate::codec::ViewPoint,
        focus: crate::codec::ViewPoint,
    },
    /// A zero-width cursor anchor was inserted into the mirror at `node`;
    /// insert the same character into the real rendering.
    MirrorCursorAnchor { node: NodeId },
    /// Mark a unit's rendering busy (input suppressed) or available.
    SetBusy { unit: UnitId, busy: bool },
    /// Permanently lock a unit as non-editable, with a visible explanation.
    LockUnit { unit: UnitId, message: String },
    /// Drag lifecycle: float a visual clone of the unit under the pointer.
    SpawnDragProxy { unit: UnitId },
    MoveDragProxy { x: f64, y: f64 },
    RemoveDragProxy,
    /// Show the drop indicator at a fully resolved target.
    ShowDropIndicator { node: NodeId, side: Side },
    HideDropIndicator,
    /// Invoke a rendering-provided control (navigation button, etc).
    InvokeControl { node: NodeId },
    /// Insert replayed text at the current caret of a unit.
    InsertText { unit: UnitId, text: String },
    /// Developer-visible warning; never silently dropped.
    ShowDevWarning { message: String },
}
