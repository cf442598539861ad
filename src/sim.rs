//! In-process host with a simulated display.
//!
//! A vsync thread ticks at an adjustable frame time and reports a refresh
//! whenever one was requested and the host is visible. Long tasks and
//! visibility changes are injected through a [`SimController`].

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use log::debug;
use parking_lot::Mutex;

use crate::host::{EventSink, Host, ObserveRejected, Subscription};

const DEFAULT_FRAME_TIME_US: u64 = 16_667;

#[derive(Default)]
struct SimState {
    frame_time_us: AtomicU64,
    refresh_requested: AtomicBool,
    visible: AtomicBool,
    active_subscriptions: AtomicUsize,
    long_task_sink: Mutex<Option<EventSink>>,
    visibility_sink: Mutex<Option<EventSink>>,
}

pub struct SimulatedHost {
    state: Arc<SimState>,
    event_loop: bool,
    long_tasks: bool,
    reject_long_tasks: bool,
}

impl SimulatedHost {
    pub fn new() -> Self {
        let state = SimState::default();
        state.frame_time_us.store(DEFAULT_FRAME_TIME_US, Ordering::SeqCst);
        state.visible.store(true, Ordering::SeqCst);
        Self {
            state: Arc::new(state),
            event_loop: true,
            long_tasks: true,
            reject_long_tasks: false,
        }
    }

    pub fn without_event_loop(mut self) -> Self {
        self.event_loop = false;
        self
    }

    pub fn without_long_tasks(mut self) -> Self {
        self.long_tasks = false;
        self
    }

    /// Long tasks exist but the subscription request fails.
    pub fn rejecting_long_tasks(mut self) -> Self {
        self.reject_long_tasks = true;
        self
    }

    pub fn hidden(self) -> Self {
        self.state.visible.store(false, Ordering::SeqCst);
        self
    }

    pub fn controller(&self) -> SimController {
        SimController {
            state: self.state.clone(),
        }
    }
}

impl Default for SimulatedHost {
    fn default() -> Self {
        Self::new()
    }
}

impl Host for SimulatedHost {
    fn has_event_loop(&self) -> bool {
        self.event_loop
    }

    fn supports_long_tasks(&self) -> bool {
        self.long_tasks
    }

    fn is_visible(&self) -> bool {
        self.state.visible.load(Ordering::SeqCst)
    }

    fn request_refresh(&mut self) {
        self.state.refresh_requested.store(true, Ordering::SeqCst);
    }

    fn observe_long_tasks(&mut self, sink: EventSink) -> Result<Subscription, ObserveRejected> {
        if self.reject_long_tasks {
            return Err(ObserveRejected(
                "entry type \"longtask\" is not supported".into(),
            ));
        }
        *self.state.long_task_sink.lock() = Some(sink.clone());
        self.state.active_subscriptions.fetch_add(1, Ordering::SeqCst);

        // The display runs for as long as long tasks are observed.
        let running = Arc::new(AtomicBool::new(true));
        let vsync = {
            let state = self.state.clone();
            let running = running.clone();
            thread::spawn(move || run_vsync(&state, &running, &sink))
        };

        let state = self.state.clone();
        Ok(Subscription::new(move || {
            running.store(false, Ordering::SeqCst);
            let _ = vsync.join();
            state.long_task_sink.lock().take();
            state.active_subscriptions.fetch_sub(1, Ordering::SeqCst);
        }))
    }

    fn observe_visibility(&mut self, sink: EventSink) -> Result<Subscription, ObserveRejected> {
        *self.state.visibility_sink.lock() = Some(sink);
        self.state.active_subscriptions.fetch_add(1, Ordering::SeqCst);
        let state = self.state.clone();
        Ok(Subscription::new(move || {
            state.visibility_sink.lock().take();
            state.active_subscriptions.fetch_sub(1, Ordering::SeqCst);
        }))
    }
}

fn run_vsync(state: &SimState, running: &AtomicBool, sink: &EventSink) {
    while running.load(Ordering::SeqCst) {
        let frame_time = Duration::from_micros(state.frame_time_us.load(Ordering::SeqCst));
        thread::sleep(frame_time);
        if state.visible.load(Ordering::SeqCst)
            && state.refresh_requested.swap(false, Ordering::SeqCst)
        {
            sink.refresh(Instant::now());
        }
    }
}

/// Drives a [`SimulatedHost`] from outside the detector.
#[derive(Clone)]
pub struct SimController {
    state: Arc<SimState>,
}

impl SimController {
    pub fn set_frame_time(&self, frame_time: Duration) {
        let us = u64::try_from(frame_time.as_micros()).unwrap_or(u64::MAX).max(1);
        self.state.frame_time_us.store(us, Ordering::SeqCst);
    }

    pub fn set_fps(&self, fps: f64) {
        self.set_frame_time(Duration::from_secs_f64(1.0 / fps.max(0.1)));
    }

    /// Delivers one batch of long-task durations, as the host would after
    /// the tasks completed.
    pub fn inject_long_tasks(&self, durations: Vec<Duration>) {
        if let Some(sink) = self.state.long_task_sink.lock().as_ref() {
            debug!("simulating {} long task(s)", durations.len());
            sink.long_tasks(durations);
        }
    }

    pub fn set_visible(&self, visible: bool) {
        self.state.visible.store(visible, Ordering::SeqCst);
        if let Some(sink) = self.state.visibility_sink.lock().as_ref() {
            sink.visibility(visible);
        }
    }

    /// Host registrations the detector currently holds.
    pub fn active_subscriptions(&self) -> usize {
        self.state.active_subscriptions.load(Ordering::SeqCst)
    }
}
