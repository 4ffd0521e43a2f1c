use serde::{Deserialize, Serialize};

/// Monotonic milliseconds supplied by the embedder with every timed event.
/// The engine never reads a wall clock: all debounce, timeout and polling
/// decisions compare instants the embedder handed in, which keeps every
/// state machine deterministic under test.
pub type Millis = u64;

/// Timing and retry budgets. Every polling loop in the bridge is bounded by
/// one of these: fixed retry count times fixed interval, never unbounded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tuning {
    /// Quiet period before buffered local edits flush to the host.
    pub debounce_ms: Millis,
    /// How long a structural transform may stay unacknowledged before its
    /// unit is locked as non-editable.
    pub transform_timeout_ms: Millis,
    /// Stabilization attempts before buffered input replay is abandoned.
    pub replay_retry_limit: u32,
    /// Frame attempts to re-resolve a host-supplied target selection.
    pub restore_retry_limit: u32,
    /// Interval between visibility polls while navigating.
    pub nav_poll_interval_ms: Millis,
    /// Visibility polls per navigation step before falling back.
    pub nav_retry_limit: u32,
    /// Consecutive still frames before a CSS transition counts as settled.
    pub motion_settle_frames: u32,
    /// Class-attribute mutations matching this pattern start motion
    /// polling; size/mutation observation does not fire for pure
    /// positional transforms.
    pub motion_class_pattern: String,
}

impl Default for Tuning {
    fn default() -> Self {
        Self {
            debounce_ms: 300,
            transform_timeout_ms: 10_000,
            replay_retry_limit: 5,
            restore_retry_limit: 10,
            nav_poll_interval_ms: 250,
            nav_retry_limit: 8,
            motion_settle_frames: 3,
            motion_class_pattern: r"(^|[-_])(transitioning|transition|animate|anim|slide|fade)"
                .to_string(),
        }
    }
}
