use std::time::{Duration, Instant};

use log::{debug, info, warn};

use crate::config::DetectorConfig;
use crate::constants::METRICS_LOG_INTERVAL_SECS;
use crate::frame_sampler::FrameSampler;
use crate::log_throttle::LogThrottle;
use crate::long_task::LongTaskObserver;
use crate::state_machine::{
    Cause, DegradationStateMachine, DetectorState, Evaluation, Transition,
};
use crate::verdict::VerdictPublisher;
use crate::visibility::VisibilityGate;

/// Degradation detector core.
///
/// Owns every piece of mutable state and is driven by one caller on one
/// timeline: the threaded runtime in [`crate::runtime`], or a host loop
/// that calls the `on_*` handlers itself with its own timestamps.
pub struct Detector {
    sampler: FrameSampler,
    long_tasks: LongTaskObserver,
    gate: VisibilityGate,
    machine: DegradationStateMachine,
    verdict: VerdictPublisher,
    metrics_throttle: LogThrottle,
}

impl Detector {
    pub fn new(config: &DetectorConfig, visible: bool, verdict: VerdictPublisher) -> Self {
        verdict.publish(false);
        Self {
            sampler: FrameSampler::new(),
            long_tasks: LongTaskObserver::new(config.long_task_threshold_ms),
            gate: VisibilityGate::new(visible),
            machine: DegradationStateMachine::new(
                config.fps_threshold,
                config.lag_recovery_delay(),
                config.auto_recover,
            ),
            verdict,
            metrics_throttle: LogThrottle::new(Duration::from_secs(METRICS_LOG_INTERVAL_SECS)),
        }
    }

    pub fn state(&self) -> DetectorState {
        self.machine.state()
    }

    pub fn is_degraded(&self) -> bool {
        self.verdict.get()
    }

    pub fn last_degraded_at(&self) -> Option<Instant> {
        self.machine.last_degraded_at()
    }

    /// Frame-sampling tick. Returns `true` when the caller must request
    /// the next display refresh from the host.
    pub fn on_frame_tick(&mut self, now: Instant) -> bool {
        if !self.gate.is_visible() {
            return false;
        }
        self.sampler.tick(now);
        true
    }

    pub fn on_refresh(&mut self, at: Instant) {
        if !self.gate.is_visible() {
            return;
        }
        self.sampler.on_refresh(at);
    }

    /// A batch of long-task durations delivered by the host.
    pub fn on_long_tasks(&mut self, now: Instant, durations: &[Duration]) {
        if !self.gate.is_visible() || !self.machine.is_warm() {
            return;
        }
        let mut transition = None;
        for duration in self.long_tasks.over_threshold(durations) {
            debug!("long task detected: {:.2}ms", duration.as_secs_f64() * 1000.0);
            transition = transition.or(self.machine.record_long_task(now, duration));
        }
        if let Some(transition) = transition {
            self.apply(transition);
        }
    }

    pub fn on_visibility(&mut self, visible: bool) {
        if self.gate.update(visible) {
            debug!(
                "host became {}, discarding {} frame samples",
                if visible { "visible" } else { "hidden" },
                self.sampler.window().len()
            );
            self.sampler.discard();
        }
    }

    pub fn on_warmup_elapsed(&mut self) {
        if self.machine.complete_warmup() {
            info!("initial sampling complete, lag verdicts enabled");
        }
    }

    /// Check-interval boundary: judges the window and starts a new one.
    pub fn on_check(&mut self, now: Instant) -> Evaluation {
        let mean = if self.gate.is_visible() {
            self.sampler.drain_mean()
        } else {
            self.sampler.discard();
            None
        };
        let evaluation = self.machine.evaluate(now, mean);

        match evaluation {
            Evaluation::Skipped => debug!("no frames sampled this interval, check skipped"),
            Evaluation::Suppressed { mean_fps } => {
                debug!("warming up, ignoring average fps {mean_fps:.2}")
            }
            Evaluation::Held { .. } => {}
            Evaluation::Changed(transition) => self.apply(transition),
        }

        if let Some(mean_fps) = mean {
            if self.metrics_throttle.should_log(now) {
                debug!("average fps: {mean_fps:.2}");
                if self.verdict.get() {
                    warn!("performance warning: fps is below the threshold");
                }
            }
        }

        evaluation
    }

    /// Clears a stale degraded verdict outside the normal transitions.
    pub fn reset(&mut self) -> Option<Transition> {
        let transition = self.machine.reset()?;
        self.apply(transition);
        Some(transition)
    }

    fn apply(&self, transition: Transition) {
        match transition.cause {
            Cause::LowFrameRate { mean_fps } => {
                info!("lag detected: average fps {mean_fps:.2} below threshold")
            }
            Cause::LongTask { duration_ms } => {
                info!("lag detected: long task of {duration_ms:.2}ms")
            }
            Cause::Recovered { mean_fps } => {
                info!("lag cleared: average fps back to {mean_fps:.2}")
            }
            Cause::ManualReset => info!("lag verdict reset manually"),
        }
        self.verdict.publish(transition.to.is_degraded());
    }
}
