use crate::codec::CodecError;
use crate::flow::FlowError;
use crate::model::ModelError;
use crate::observe::ObserveError;
use crate::protocol::ProtocolError;
use thiserror::Error;

/// Bridge-level failure taxonomy.
///
/// Four classes with four distinct policies: transient resolution failures
/// are retried with bounded backoff and never surfaced; structural desyncs
/// are logged with full context and surfaced once per session; protocol
/// contract violations are fatal for the offending call and raised loudly;
/// a transform timeout is fatal for its unit only. Nothing here may
/// silently corrupt the shadow document — when in doubt the bridge prefers
/// a loud, visible failure over a guessed recovery.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Flow(#[from] FlowError),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Observe(#[from] ObserveError),

    #[error("invalid trusted origin pattern {pattern:?}: {source}")]
    OriginPattern {
        pattern: String,
        source: glob::PatternError,
    },
}
