use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectorState {
    WarmingUp, // evidence measured, no verdict yet
    Healthy,
    Degraded,
}

impl DetectorState {
    pub fn is_degraded(self) -> bool {
        matches!(self, DetectorState::Degraded)
    }
}

/// What caused a verdict change.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Cause {
    LowFrameRate { mean_fps: f64 },
    LongTask { duration_ms: f64 },
    Recovered { mean_fps: f64 },
    ManualReset,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transition {
    pub from: DetectorState,
    pub to: DetectorState,
    pub cause: Cause,
}

/// Outcome of one check boundary.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Evaluation {
    /// Empty window, nothing to judge.
    Skipped,
    /// Still warming up; the mean was measured and ignored.
    Suppressed { mean_fps: f64 },
    /// No state change.
    Held { mean_fps: f64 },
    Changed(Transition),
}

/// Fuses frame-rate means and long-task reports into one verdict with
/// warm-up suppression and recovery hysteresis.
#[derive(Debug)]
pub struct DegradationStateMachine {
    state: DetectorState,
    last_degraded_at: Option<Instant>,
    fps_threshold: f64,
    recovery_delay: Duration,
    auto_recover: bool,
}

impl DegradationStateMachine {
    pub fn new(fps_threshold: f64, recovery_delay: Duration, auto_recover: bool) -> Self {
        Self {
            state: DetectorState::WarmingUp,
            last_degraded_at: None,
            fps_threshold,
            recovery_delay,
            auto_recover,
        }
    }

    pub fn state(&self) -> DetectorState {
        self.state
    }

    pub fn last_degraded_at(&self) -> Option<Instant> {
        self.last_degraded_at
    }

    pub fn is_warm(&self) -> bool {
        self.state != DetectorState::WarmingUp
    }

    /// Leaves `WarmingUp`. Returns `false` if warm-up had already ended.
    pub fn complete_warmup(&mut self) -> bool {
        if self.state != DetectorState::WarmingUp {
            return false;
        }
        self.state = DetectorState::Healthy;
        true
    }

    /// Immediate degrade on a task over threshold. Ignored while warming up.
    pub fn record_long_task(&mut self, now: Instant, duration: Duration) -> Option<Transition> {
        if !self.is_warm() {
            return None;
        }
        self.degrade(
            now,
            Cause::LongTask {
                duration_ms: duration.as_secs_f64() * 1000.0,
            },
        )
    }

    /// Check-boundary evaluation of the interval's mean frame rate.
    pub fn evaluate(&mut self, now: Instant, mean_fps: Option<f64>) -> Evaluation {
        let Some(mean_fps) = mean_fps else {
            return Evaluation::Skipped;
        };

        match self.state {
            DetectorState::WarmingUp => Evaluation::Suppressed { mean_fps },
            _ if mean_fps < self.fps_threshold => {
                match self.degrade(now, Cause::LowFrameRate { mean_fps }) {
                    Some(transition) => Evaluation::Changed(transition),
                    None => Evaluation::Held { mean_fps },
                }
            }
            DetectorState::Healthy => Evaluation::Held { mean_fps },
            DetectorState::Degraded => {
                if self.can_recover(now) {
                    Evaluation::Changed(self.transition(
                        DetectorState::Healthy,
                        Cause::Recovered { mean_fps },
                    ))
                } else {
                    Evaluation::Held { mean_fps }
                }
            }
        }
    }

    /// Forces the verdict back to healthy. Keeps `last_degraded_at` and
    /// never re-enters warm-up.
    pub fn reset(&mut self) -> Option<Transition> {
        if self.state != DetectorState::Degraded {
            return None;
        }
        Some(self.transition(DetectorState::Healthy, Cause::ManualReset))
    }

    fn can_recover(&self, now: Instant) -> bool {
        self.auto_recover
            && self.last_degraded_at.map_or(true, |at| {
                now.saturating_duration_since(at) >= self.recovery_delay
            })
    }

    // Stamps on every qualifying event, also while already degraded.
    fn degrade(&mut self, now: Instant, cause: Cause) -> Option<Transition> {
        self.last_degraded_at = Some(now);
        if self.state == DetectorState::Degraded {
            return None;
        }
        Some(self.transition(DetectorState::Degraded, cause))
    }

    fn transition(&mut self, to: DetectorState, cause: Cause) -> Transition {
        let from = self.state;
        self.state = to;
        Transition { from, to, cause }
    }
}
