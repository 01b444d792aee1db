use std::time::Duration;

/// Server-requested wait before the next send.
///
/// Set from a rate-limit response and cleared at the start of the next
/// flush attempt.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Backoff {
    wait: Duration,
}

impl Backoff {
    pub fn set(&mut self, wait: Duration) {
        self.wait = wait;
    }

    pub fn clear(&mut self) {
        self.wait = Duration::ZERO;
    }

    pub fn current(&self) -> Duration {
        self.wait
    }

    /// Minimum spacing between flushes given the regular interval.
    pub fn window(&self, interval: Duration) -> Duration {
        interval.max(self.wait)
    }
}
