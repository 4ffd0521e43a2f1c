use crate::error::BridgeError;
use glob::Pattern;

/// Trusted-origin gate for the inbound channel.
///
/// Origins are either configured up front (wildcard patterns allowed, e.g.
/// `https://*.example.com`) or, when no patterns were configured, learned
/// from the first inbound message — a reduced-trust fallback that is logged
/// as such.
#[derive(Debug)]
pub struct OriginGate {
    patterns: Vec<Pattern>,
    learned: Option<String>,
}

impl OriginGate {
    pub fn new(patterns: &[String]) -> Result<Self, BridgeError> {
        let patterns = patterns
            .iter()
            .map(|p| {
                Pattern::new(p).map_err(|source| BridgeError::OriginPattern {
                    pattern: p.clone(),
                    source,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            patterns,
            learned: None,
        })
    }

    /// Whether a message from `origin` may be processed. Rejections are the
    /// caller's to log; learning is logged here.
    pub fn admit(&mut self, origin: &str) -> bool {
        if !self.patterns.is_empty() {
            return self.patterns.iter().any(|p| p.matches(origin));
        }
        match &self.learned {
            Some(trusted) => trusted == origin,
            None => {
                log::warn!(
                    "no trusted origin configured; learning {origin:?} from first \
                     inbound message (reduced trust)"
                );
                self.learned = Some(origin.to_string());
                true
            }
        }
    }
}
