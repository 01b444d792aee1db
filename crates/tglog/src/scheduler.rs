use crate::buffer::Accumulator;
use std::time::{Duration, Instant};

/// Decides when buffered text is flushed.
#[derive(Debug, Clone, Copy)]
pub struct FlushPolicy {
    pub update_interval: Duration,
    pub minimum_lines: usize,
}

impl FlushPolicy {
    /// Regular flush check run after every write and on every tick.
    pub fn is_due(&self, acc: &Accumulator, now: Instant) -> bool {
        !acc.is_empty()
            && acc.lines() >= self.minimum_lines
            && elapsed(acc, now) >= acc.backoff().window(self.update_interval)
    }

    /// Whether a forced flush may run; only an active backoff holds it back.
    pub fn backoff_elapsed(&self, acc: &Accumulator, now: Instant) -> bool {
        elapsed(acc, now) >= acc.backoff().current()
    }
}

fn elapsed(acc: &Accumulator, now: Instant) -> Duration {
    acc.last_flush()
        .map(|at| now.saturating_duration_since(at))
        .unwrap_or(Duration::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::Limits;

    const LIMITS: Limits = Limits {
        working_limit: 4000,
        pending_size: 20_000,
    };

    fn policy(minimum_lines: usize) -> FlushPolicy {
        FlushPolicy {
            update_interval: Duration::from_secs(3),
            minimum_lines,
        }
    }

    #[test]
    fn test_first_write_is_due() {
        let mut acc = Accumulator::new();
        acc.append("hello");
        assert!(policy(1).is_due(&acc, Instant::now()));
    }

    #[test]
    fn test_empty_buffer_never_due() {
        let acc = Accumulator::new();
        assert!(!policy(1).is_due(&acc, Instant::now()));
    }

    #[test]
    fn test_waits_for_interval() {
        let mut acc = Accumulator::new();
        let start = Instant::now();
        acc.append("a");
        acc.begin_flush(&LIMITS, start);
        acc.append("b");

        assert!(!policy(1).is_due(&acc, start + Duration::from_secs(1)));
        assert!(policy(1).is_due(&acc, start + Duration::from_secs(3)));
    }

    #[test]
    fn test_waits_for_minimum_lines() {
        let mut acc = Accumulator::new();
        acc.append("a");
        acc.append("b");
        assert!(!policy(3).is_due(&acc, Instant::now()));
        acc.append("c");
        assert!(policy(3).is_due(&acc, Instant::now()));
    }

    #[test]
    fn test_backoff_extends_window() {
        let mut acc = Accumulator::new();
        let start = Instant::now();
        acc.append("a");
        acc.throttle(Duration::from_secs(10), start);

        assert!(!policy(1).is_due(&acc, start + Duration::from_secs(5)));
        assert!(!policy(1).backoff_elapsed(&acc, start + Duration::from_secs(5)));
        assert!(policy(1).is_due(&acc, start + Duration::from_secs(10)));
        assert!(policy(1).backoff_elapsed(&acc, start + Duration::from_secs(10)));
    }
}
