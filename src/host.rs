//! Boundary to the application hosting the detector.
//!
//! The host owns the display refresh, long-task accounting and visibility;
//! it reports them through an [`EventSink`]. The detector never calls back
//! into the host except to request the next refresh.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crossbeam_channel::Sender;
use thiserror::Error;

/// Facilities a host offers the detector.
pub trait Host: Send + 'static {
    /// Whether timers, visibility and refresh reporting can run at all.
    fn has_event_loop(&self) -> bool {
        true
    }

    /// Whether long-task observation exists in this host.
    fn supports_long_tasks(&self) -> bool;

    /// Visibility at the moment monitoring starts.
    fn is_visible(&self) -> bool;

    /// Asks for the next display refresh to be reported via
    /// [`EventSink::refresh`].
    fn request_refresh(&mut self);

    fn observe_long_tasks(&mut self, sink: EventSink) -> Result<Subscription, ObserveRejected>;

    fn observe_visibility(&mut self, sink: EventSink) -> Result<Subscription, ObserveRejected>;
}

/// The host refused an observation request.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct ObserveRejected(pub String);

/// Cancellable registration with the host. Cancelled at most once,
/// explicitly or on drop.
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    pub fn cancel(mut self) {
        self.run_cancel();
    }

    fn run_cancel(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.run_cancel();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}

/// Shared flag flipped once when a detector is torn down.
#[derive(Debug, Clone, Default)]
pub struct TeardownToken(Arc<AtomicBool>);

impl TeardownToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_torn_down(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Returns `true` only for the call that performed the teardown.
    pub fn tear_down(&self) -> bool {
        !self.0.swap(true, Ordering::SeqCst)
    }
}

#[derive(Debug)]
pub(crate) enum Event {
    Refresh(Instant),
    LongTasks(Vec<Duration>),
    Visibility(bool),
    Reset,
    Stop,
}

/// Handle the host uses to report what it observes. Every report made
/// after teardown is dropped.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: Sender<Event>,
    token: TeardownToken,
}

impl EventSink {
    pub(crate) fn new(tx: Sender<Event>, token: TeardownToken) -> Self {
        Self { tx, token }
    }

    /// The display refreshed at `at`.
    pub fn refresh(&self, at: Instant) {
        self.push(Event::Refresh(at));
    }

    /// One notification carrying the durations of completed long tasks.
    pub fn long_tasks(&self, durations: Vec<Duration>) {
        if durations.is_empty() {
            return;
        }
        self.push(Event::LongTasks(durations));
    }

    pub fn visibility(&self, visible: bool) {
        self.push(Event::Visibility(visible));
    }

    pub fn is_closed(&self) -> bool {
        self.token.is_torn_down()
    }

    fn push(&self, event: Event) {
        if self.token.is_torn_down() {
            return;
        }
        // The detector may already be gone; late reports are no-ops.
        let _ = self.tx.send(event);
    }
}
