use std::collections::VecDeque;
use std::time::Instant;

use crate::constants::MAX_PENDING_TICKS;
use crate::sample_window::SampleWindow;

/// Paired frame-rate measurement: a tick records its time and asks the
/// host for the next display refresh; the refresh turns every tick still
/// waiting on it into one fps reading.
#[derive(Debug, Default)]
pub struct FrameSampler {
    pending: VecDeque<Instant>,
    window: SampleWindow,
}

impl FrameSampler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a sampling tick. The caller requests the refresh callback.
    pub fn tick(&mut self, now: Instant) {
        if self.pending.len() >= MAX_PENDING_TICKS {
            self.pending.pop_front();
        }
        self.pending.push_back(now);
    }

    /// Completes the ticks scheduled strictly before `at`.
    pub fn on_refresh(&mut self, at: Instant) {
        while let Some(&tick) = self.pending.front() {
            if tick >= at {
                break;
            }
            self.pending.pop_front();
            let elapsed_ms = at.duration_since(tick).as_secs_f64() * 1000.0;
            self.window.add_sample(1000.0 / elapsed_ms);
        }
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    pub fn window(&self) -> &SampleWindow {
        &self.window
    }

    /// Mean fps of the interval that just ended; the window starts over.
    pub fn drain_mean(&mut self) -> Option<f64> {
        self.window.drain_mean()
    }

    /// Drops in-flight ticks and collected samples.
    pub fn discard(&mut self) {
        self.pending.clear();
        self.window.clear();
    }
}
