// Cancellable deadlines driven by host timestamps.
// A slot holds at most one pending deadline; re-arming or cancelling bumps the generation,
// so a superseded deadline can never fire against newer state.

use crate::types::Millis;

/// Identifies one arming of a `TimerSlot`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerToken(u64);

#[derive(Debug, Clone, Copy)]
struct Pending {
    deadline: Millis,
    token: TimerToken,
}

/// A single-shot timer that the owner polls with `fire_due`.
#[derive(Debug, Default)]
pub struct TimerSlot {
    generation: u64,
    pending: Option<Pending>,
}

impl TimerSlot {
    pub fn new() -> Self {
        TimerSlot::default()
    }

    /// Schedule a deadline, replacing whatever was pending.
    pub fn arm(&mut self, deadline: Millis) -> TimerToken {
        self.generation += 1;
        let token = TimerToken(self.generation);
        self.pending = Some(Pending { deadline, token });
        token
    }

    pub fn cancel(&mut self) {
        if self.pending.take().is_some() {
            self.generation += 1;
        }
    }

    pub fn is_armed(&self) -> bool {
        self.pending.is_some()
    }

    pub fn deadline(&self) -> Option<Millis> {
        self.pending.map(|p| p.deadline)
    }

    /// Disarm and return the token if the deadline has passed.
    pub fn fire_due(&mut self, now: Millis) -> Option<TimerToken> {
        match self.pending {
            Some(p) if now >= p.deadline => {
                self.pending = None;
                Some(p.token)
            }
            _ => None,
        }
    }

    /// True if `token` belongs to the current arming.
    pub fn is_current(&self, token: TimerToken) -> bool {
        token.0 == self.generation
    }
}
