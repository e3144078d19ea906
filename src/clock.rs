//! Deterministic logical clock.
//!
//! Timestamps are a pure function of `(tick, local_seq)`. The kernel never
//! reads wall time, so replaying the same inputs reproduces the same tokens.

/// Capability that turns logical time into a timestamp token.
///
/// Injected into the governance state machine; the kernel never builds its own.
pub trait Clock: Send + Sync {
    /// Timestamp token for a tick and a sequence number within that tick.
    fn ts(&self, tick: u64, local_seq: u64) -> String;
}

impl<F> Clock for F
where
    F: Fn(u64, u64) -> String + Send + Sync,
{
    fn ts(&self, tick: u64, local_seq: u64) -> String {
        self(tick, local_seq)
    }
}

/// Zero-padded logical clock bound to a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeterministicClock {
    session_id: String,
}

impl DeterministicClock {
    /// Create a clock for a session.
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
        }
    }

    /// Session this clock belongs to.
    ///
    /// Not part of the token: tokens are comparable across sessions.
    pub fn session_id(&self) -> &str {
        &self.session_id
    }
}

impl Clock for DeterministicClock {
    fn ts(&self, tick: u64, local_seq: u64) -> String {
        format!("LT{:09}_S{:06}", tick, local_seq)
    }
}
