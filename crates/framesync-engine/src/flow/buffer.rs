//! Raw input captured while a unit is blocked on a transform.

/// One intercepted input event. Only plain text survives replay; structural
/// keys cannot be replayed faithfully after the document changed underneath
/// them, so they are dropped during coalescing.
#[derive(Debug, Clone, PartialEq)]
pub enum RawInput {
    Text(String),
    Backspace,
    Enter,
    Other(String),
}

/// Ordered queue of input captured for a blocked unit, replayed as a
/// best-effort plain-text insertion once the transform resolves.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventBuffer {
    events: Vec<RawInput>,
}

impl EventBuffer {
    pub fn push(&mut self, input: RawInput) {
        self.events.push(input);
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Collapse the queue into the plain text a user would have produced:
    /// text concatenates, backspace retracts the previous character (only
    /// within the buffer), everything else is dropped.
    pub fn coalesce(&self) -> String {
        let mut out = String::new();
        for event in &self.events {
            match event {
                RawInput::Text(t) => out.push_str(t),
                RawInput::Backspace => {
                    out.pop();
                }
                RawInput::Enter | RawInput::Other(_) => {}
            }
        }
        out
    }
}
