//! Edit buffer and flow control.
//!
//! One state machine per editable unit:
//!
//! ```text
//! Idle → Buffering → (flush) → Idle
//! Idle/Buffering → Blocked ⇄ Replaying → Idle
//! Blocked → Disabled            (transform timeout; fatal for the unit)
//! ```
//!
//! Flushing is an atomic transition, not a resting state: the buffered
//! shadow state becomes an outbound edit within the same event turn that
//! triggered it. At most one [`PendingTransform`] exists per unit at any
//! time — the invariant is structural, because the only place a transform
//! lives is the `Blocked` variant — and a second structural command while
//! one is in flight is rejected, never queued silently.
//!
//! Sequence numbers for outbound traffic are allocated here, at send time
//! rather than buffer time, so a debounce timer racing a structural command
//! can never emit out of order.

pub mod buffer;

pub use buffer::{EventBuffer, RawInput};

use crate::protocol::{EditSource, RequestId, TransformOp, UnitId};
use crate::tuning::{Millis, Tuning};
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum FlowError {
    /// A transform is already in flight for this unit; callers issuing
    /// commands must disable themselves while blocked.
    #[error("a structural transform is already in flight for unit {unit}")]
    TransformInFlight { unit: UnitId },

    #[error("unit {unit} is disabled: {reason}")]
    UnitDisabled { unit: UnitId, reason: String },
}

/// The single in-flight structural transform of a unit.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingTransform {
    pub request: RequestId,
    pub started: Millis,
    /// Raw input for the unit is intercepted while this is set.
    pub input_suppressed: bool,
}

#[derive(Debug, Clone, PartialEq)]
enum UnitState {
    Idle,
    Buffering {
        deadline: Millis,
    },
    Blocked {
        pending: PendingTransform,
        buffer: EventBuffer,
    },
    Replaying {
        buffer: EventBuffer,
        retries_left: u32,
    },
    Disabled {
        reason: String,
    },
}

#[derive(Debug)]
struct UnitFlow {
    state: UnitState,
    /// Last value received from the host, per field: the echo-suppression
    /// reference. A mutation matching this is the rendering of a host
    /// update, not a user edit.
    host_values: HashMap<String, String>,
}

impl UnitFlow {
    fn new() -> Self {
        Self {
            state: UnitState::Idle,
            host_values: HashMap::new(),
        }
    }
}

/// What the controller wants done; the bridge turns these into outbound
/// messages (attaching the shadow document and current selection) and
/// surface effects.
#[derive(Debug, Clone, PartialEq)]
pub enum FlowSignal {
    /// Send the shadow document as an incremental edit.
    FlushEdit { seq: u64, source: EditSource },
    /// Send a structural transform request.
    DispatchTransform {
        seq: u64,
        request: RequestId,
        unit: UnitId,
        op: TransformOp,
    },
    /// Mark a unit's rendering busy/available while blocked.
    SetBusy { unit: UnitId, busy: bool },
    /// Lock a unit as permanently non-editable (transform timeout).
    LockUnit { unit: UnitId, reason: String },
    /// Insert replayed text at the current caret.
    ReplayText { unit: UnitId, text: String },
    /// Developer-visible warning (never silent).
    Warn { message: String },
}

/// Outcome of observing a local mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalEdit {
    /// Genuine user edit: write it to the shadow; the debounce is armed.
    Buffered,
    /// Harmless echo of a host update; dropped.
    Echo,
    /// The unit cannot accept edits right now (blocked or disabled).
    Ignored,
}

#[derive(Debug, Default)]
struct SeqAllocator {
    next: u64,
}

impl SeqAllocator {
    fn allocate(&mut self) -> u64 {
        let seq = self.next;
        self.next += 1;
        seq
    }
}

pub struct FlowController {
    units: HashMap<UnitId, UnitFlow>,
    seq: SeqAllocator,
    debounce_ms: Millis,
    transform_timeout_ms: Millis,
    replay_retry_limit: u32,
}

impl FlowController {
    pub fn new(tuning: &Tuning) -> Self {
        Self {
            units: HashMap::new(),
            seq: SeqAllocator::default(),
            debounce_ms: tuning.debounce_ms,
            transform_timeout_ms: tuning.transform_timeout_ms,
            replay_retry_limit: tuning.replay_retry_limit,
        }
    }

    fn unit(&mut self, unit: &UnitId) -> &mut UnitFlow {
        self.units.entry(unit.clone()).or_insert_with(UnitFlow::new)
    }

    /// Record the value a host update rendered into a field.
    pub fn note_host_value(&mut self, unit: &UnitId, field: &str, value: &str) {
        self.unit(unit)
            .host_values
            .insert(field.to_string(), value.to_string());
    }

    /// Classify a local mutation. `Buffered` means the caller must write the
    /// value into the shadow copy; the debounce timer is armed (or re-armed)
    /// here.
    pub fn local_edit(
        &mut self,
        unit: &UnitId,
        field: &str,
        value: &str,
        now: Millis,
    ) -> LocalEdit {
        let debounce = self.debounce_ms;
        let flow = self.unit(unit);
        if flow.host_values.get(field).map(String::as_str) == Some(value) {
            return LocalEdit::Echo;
        }
        match &flow.state {
            UnitState::Idle | UnitState::Buffering { .. } => {}
            UnitState::Blocked { .. } | UnitState::Replaying { .. } => {
                log::debug!("dropping mutation for blocked unit {unit}");
                return LocalEdit::Ignored;
            }
            UnitState::Disabled { .. } => return LocalEdit::Ignored,
        }
        flow.state = UnitState::Buffering {
            deadline: now + debounce,
        };
        LocalEdit::Buffered
    }

    /// Advance debounce timers and transform timeouts.
    pub fn tick(&mut self, now: Millis) -> Vec<FlowSignal> {
        enum Due {
            Flush,
            Timeout(RequestId),
        }
        let timeout = self.transform_timeout_ms;
        let mut signals = Vec::new();
        let ids: Vec<UnitId> = self.units.keys().cloned().collect();
        for id in ids {
            let due = match self.units.get(&id).map(|f| &f.state) {
                Some(UnitState::Buffering { deadline }) if now >= *deadline => Due::Flush,
                Some(UnitState::Blocked { pending, .. })
                    if now.saturating_sub(pending.started) >= timeout =>
                {
                    Due::Timeout(pending.request)
                }
                _ => continue,
            };
            match due {
                Due::Flush => {
                    self.unit(&id).state = UnitState::Idle;
                    signals.push(FlowSignal::FlushEdit {
                        seq: self.seq.allocate(),
                        source: EditSource::Typing,
                    });
                }
                Due::Timeout(request) => {
                    let reason = format!(
                        "no acknowledgement for transform {request} within {timeout}ms; \
                         reload required"
                    );
                    log::warn!("unit {id} locked: {reason}");
                    self.unit(&id).state = UnitState::Disabled {
                        reason: reason.clone(),
                    };
                    signals.push(FlowSignal::SetBusy {
                        unit: id.clone(),
                        busy: false,
                    });
                    signals.push(FlowSignal::LockUnit { unit: id, reason });
                }
            }
        }
        signals
    }

    /// Flush every buffering unit immediately (host-requested flush or a
    /// structural command about to be issued elsewhere). Returns the edit
    /// signal, with the sequence number allocated now.
    pub fn flush_all(&mut self, source: EditSource) -> Vec<FlowSignal> {
        let mut any = false;
        for flow in self.units.values_mut() {
            if matches!(flow.state, UnitState::Buffering { .. }) {
                flow.state = UnitState::Idle;
                any = true;
            }
        }
        if any {
            vec![FlowSignal::FlushEdit {
                seq: self.seq.allocate(),
                source,
            }]
        } else {
            Vec::new()
        }
    }

    /// Dispatch a structural command for a unit. Rejected while another
    /// transform is in flight; flushes pending buffered text synchronously
    /// first so the host's mutation applies atop the latest value.
    pub fn begin_transform(
        &mut self,
        unit: &UnitId,
        op: TransformOp,
        now: Millis,
    ) -> Result<Vec<FlowSignal>, FlowError> {
        match &self.unit(unit).state {
            UnitState::Blocked { .. } | UnitState::Replaying { .. } => {
                return Err(FlowError::TransformInFlight { unit: unit.clone() });
            }
            UnitState::Disabled { reason } => {
                return Err(FlowError::UnitDisabled {
                    unit: unit.clone(),
                    reason: reason.clone(),
                });
            }
            UnitState::Idle | UnitState::Buffering { .. } => {}
        }

        let mut signals = Vec::new();
        if matches!(self.unit(unit).state, UnitState::Buffering { .. }) {
            signals.push(FlowSignal::FlushEdit {
                seq: self.seq.allocate(),
                source: EditSource::Typing,
            });
        }
        let request = RequestId::fresh();
        signals.push(FlowSignal::DispatchTransform {
            seq: self.seq.allocate(),
            request,
            unit: unit.clone(),
            op,
        });
        signals.push(FlowSignal::SetBusy {
            unit: unit.clone(),
            busy: true,
        });
        self.unit(unit).state = UnitState::Blocked {
            pending: PendingTransform {
                request,
                started: now,
                input_suppressed: true,
            },
            buffer: EventBuffer::default(),
        };
        Ok(signals)
    }

    /// Intercept raw input while a transform is in flight. Returns `true`
    /// when the event was captured (and must not mutate the rendering).
    pub fn intercept_input(&mut self, unit: &UnitId, input: RawInput) -> bool {
        match &mut self.unit(unit).state {
            UnitState::Blocked { pending, buffer } => {
                if pending.input_suppressed {
                    buffer.push(input);
                }
                true
            }
            UnitState::Replaying { buffer, .. } => {
                buffer.push(input);
                true
            }
            UnitState::Disabled { .. } => true, // swallowed; the unit is dead
            UnitState::Idle | UnitState::Buffering { .. } => false,
        }
    }

    /// Match an inbound acknowledgement to its blocked unit. The unit moves
    /// to `Replaying`; actual replay waits for the rendering to stabilize.
    pub fn acknowledge(&mut self, request: RequestId) -> Option<UnitId> {
        let replay_retries = self.replay_retry_limit;
        for (id, flow) in &mut self.units {
            let matched = matches!(
                &flow.state,
                UnitState::Blocked { pending, .. } if pending.request == request
            );
            if matched {
                let buffer = match std::mem::replace(&mut flow.state, UnitState::Idle) {
                    UnitState::Blocked { buffer, .. } => buffer,
                    _ => EventBuffer::default(),
                };
                flow.state = UnitState::Replaying {
                    buffer,
                    retries_left: replay_retries,
                };
                return Some(id.clone());
            }
        }
        log::debug!("acknowledgement {request} matches no pending transform");
        None
    }

    /// The host refused the transform. The unit unblocks (local typing is
    /// still valid) and buffered input replays; only silence disables.
    pub fn transform_failed(&mut self, request: RequestId, reason: &str) -> Vec<FlowSignal> {
        match self.acknowledge(request) {
            Some(unit) => vec![
                FlowSignal::SetBusy {
                    unit: unit.clone(),
                    busy: false,
                },
                FlowSignal::Warn {
                    message: format!("transform {request} on {unit} failed: {reason}"),
                },
            ],
            None => Vec::new(),
        }
    }

    /// Attempt buffered-input replay for a replaying unit. `stable` is the
    /// bridge's judgement that the rendered view has settled (selection
    /// restored, no motion). A bounded number of unstable attempts is
    /// tolerated before the buffer is abandoned with a warning.
    pub fn try_replay(&mut self, unit: &UnitId, stable: bool) -> Vec<FlowSignal> {
        let flow = self.unit(unit);
        let UnitState::Replaying {
            buffer,
            retries_left,
        } = &mut flow.state
        else {
            return Vec::new();
        };
        if stable {
            let text = buffer.coalesce();
            flow.state = UnitState::Idle;
            if text.is_empty() {
                Vec::new()
            } else {
                vec![FlowSignal::ReplayText {
                    unit: unit.clone(),
                    text,
                }]
            }
        } else if *retries_left == 0 {
            let dropped = buffer.len();
            flow.state = UnitState::Idle;
            let message = format!(
                "abandoning replay of {dropped} buffered input event(s) for unit {unit}: \
                 rendering never stabilized"
            );
            log::warn!("{message}");
            vec![FlowSignal::Warn { message }]
        } else {
            *retries_left -= 1;
            Vec::new()
        }
    }

    pub fn replaying_units(&self) -> Vec<UnitId> {
        self.units
            .iter()
            .filter(|(_, f)| matches!(f.state, UnitState::Replaying { .. }))
            .map(|(id, _)| id.clone())
            .collect()
    }

    pub fn is_blocked(&self, unit: &UnitId) -> bool {
        matches!(
            self.units.get(unit).map(|f| &f.state),
            Some(UnitState::Blocked { .. })
        )
    }

    pub fn is_disabled(&self, unit: &UnitId) -> bool {
        matches!(
            self.units.get(unit).map(|f| &f.state),
            Some(UnitState::Disabled { .. })
        )
    }

    /// Named state, for diagnostics and tests.
    pub fn state_name(&self, unit: &UnitId) -> &'static str {
        match self.units.get(unit).map(|f| &f.state) {
            None | Some(UnitState::Idle) => "idle",
            Some(UnitState::Buffering { .. }) => "buffering",
            Some(UnitState::Blocked { .. }) => "blocked",
            Some(UnitState::Replaying { .. }) => "replaying",
            Some(UnitState::Disabled { .. }) => "disabled",
        }
    }
}
