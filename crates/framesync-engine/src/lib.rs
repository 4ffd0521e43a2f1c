//! Synchronization bridge between a visual editor host and an
//! independently rendered surface.
//!
//! The two contexts share no runtime, framework or rendering model: they
//! exchange asynchronous, ordered messages, and the bridge — which lives
//! entirely on the surface side — keeps them consistent. It maps a
//! rich-text document tree onto an arbitrary rendering of it and back
//! (including cursor positions), keeps locally typed edits, host-issued
//! structural transforms and re-renders from racing each other, navigates
//! to content the rendering is currently hiding, and implements
//! pointer-driven reordering of structural units.
//!
//! Module map, mirroring the component design:
//!
//! - [`model`]: the document tree, structural paths, and the shadow copy
//! - [`view`]: the arena mirror of the rendering, binding and geometry
//! - [`codec`]: selection serialization in both directions
//! - [`flow`]: the per-unit buffered-write state machine
//! - [`observe`]: mutation/size/motion watching per selected unit
//! - [`navigate`]: making hidden units visible via the surface's controls
//! - [`reorder`]: pointer-driven structural relocation
//! - [`protocol`]: the wire messages; [`fields`]: host-declared schemas
//! - [`bridge`]: the event-loop runtime tying it all together
//! - [`sim`]: a deterministic reference surface for tests and the harness

pub mod bridge;
pub mod codec;
pub mod diagnostics;
pub mod error;
pub mod fields;
pub mod flow;
pub mod model;
pub mod navigate;
pub mod observe;
pub mod protocol;
pub mod reorder;
pub mod sim;
pub mod tuning;
pub mod view;

pub use bridge::{Bridge, BridgeHandle, BridgeOptions, Outcome, SurfaceEffect, SurfaceEvent};
pub use codec::{Selection, SelectionPoint, ViewPoint, ViewSelection};
pub use error::BridgeError;
pub use model::{DocNode, DocumentModel, StructuralPath};
pub use protocol::{HostMessage, RequestId, SurfaceMessage, TransformOp, UnitId};
pub use tuning::{Millis, Tuning};
