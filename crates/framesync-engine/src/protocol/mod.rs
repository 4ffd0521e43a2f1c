//! Wire protocol between host and surface.
//!
//! All cross-context traffic is asynchronous, ordered message passing over a
//! single channel; messages are JSON objects tagged by `kind`. Delivery
//! order host→surface is preserved but round-trip latency is unbounded, so
//! nothing in the protocol assumes a synchronous reply. Outbound edits and
//! transform requests carry a sequence number allocated at send time, which
//! is what keeps debounced flushes and structural commands ordered when they
//! race.

use crate::codec::Selection;
use crate::fields::FieldDescriptor;
use crate::model::{DocumentModel, StructuralPath};
use crate::view::Rect;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

/// Correlates a structural transform request with its acknowledgement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(Uuid);

impl RequestId {
    pub fn fresh() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Identity of an editable unit, as carried by the unit binding attribute.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UnitId(pub String);

impl UnitId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UnitId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Host → surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HostMessage {
    /// Full document snapshot, optionally with a selection to restore and
    /// the id of the transform this snapshot acknowledges.
    Document {
        document: DocumentModel,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        selection: Option<Selection>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        ack: Option<RequestId>,
    },
    /// Select (and if necessary navigate to) a unit.
    SelectUnit { unit: UnitId },
    /// Flush pending local edits immediately.
    FlushEdits { request: RequestId },
    /// A previously requested transform could not be applied.
    TransformFailed { request: RequestId, reason: String },
}

/// A structural edit only the host may apply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum TransformOp {
    Paste { text: String },
    DeleteBoundary,
    Enter,
    Format { mark: String },
}

/// Diagnostic label on outbound edits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EditSource {
    Typing,
    Replay,
    HostFlush,
}

/// A unit plus its structural parentage, so the host can relocate across
/// arbitrary nesting depth.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitRef {
    pub unit: UnitId,
    pub parent: StructuralPath,
    pub index: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Before,
    After,
}

/// Surface → host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SurfaceMessage {
    /// Debounced incremental edit: the full current shadow document.
    Edit {
        seq: u64,
        document: DocumentModel,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        selection: Option<Selection>,
        source: EditSource,
    },
    /// Structural transform request; the host answers with a `Document`
    /// snapshot whose `ack` carries the same request id.
    Transform {
        seq: u64,
        request: RequestId,
        unit: UnitId,
        op: TransformOp,
        document: DocumentModel,
        selection: Selection,
    },
    /// A unit was selected (or its overlay geometry changed).
    UnitSelected {
        unit: UnitId,
        rect: Rect,
        fields: Vec<FieldDescriptor>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        focused: Option<String>,
    },
    /// Pointer-driven relocation of a unit.
    Relocate {
        moved: UnitRef,
        target: UnitRef,
        side: Side,
    },
    /// The surface's own navigation changed its location.
    Navigated { path: String },
    /// Acknowledges a host-requested flush; `seq` names the edit that
    /// carried the flushed state, absent when nothing was pending.
    Flushed {
        request: RequestId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        seq: Option<u64>,
    },
}

/// An inbound message with the origin it arrived from. Trust is decided by
/// the bridge, not here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub origin: String,
    #[serde(flatten)]
    pub message: HostMessage,
}

#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Required companion data was missing or malformed. Fatal for the
    /// call: raised loudly, never defaulted.
    #[error("malformed inbound message: {source}")]
    Malformed {
        #[from]
        source: serde_json::Error,
    },

    #[error("message from untrusted origin {origin:?} dropped")]
    UntrustedOrigin { origin: String },
}

pub fn decode_host_message(payload: &str) -> Result<HostMessage, ProtocolError> {
    Ok(serde_json::from_str(payload)?)
}
