use std::time::{Duration, Instant};

/// Rate limiter for periodic diagnostics (at most one log per interval).
#[derive(Debug)]
pub struct LogThrottle {
    last_log: Option<Instant>,
    min_interval: Duration,
}

impl LogThrottle {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            last_log: None,
            min_interval,
        }
    }

    pub fn should_log(&mut self, now: Instant) -> bool {
        match self.last_log {
            Some(last) if now.saturating_duration_since(last) < self.min_interval => false,
            _ => {
                self.last_log = Some(now);
                true
            }
        }
    }
}
