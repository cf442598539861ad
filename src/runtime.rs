use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use log::{error, info, warn};
use parking_lot::Mutex;
use watch::WatchReceiver;

use crate::capability;
use crate::config::DetectorConfig;
use crate::constants::FRAME_TICK_INTERVAL_US;
use crate::detector::Detector;
use crate::error::{DetectorError, DetectorResult};
use crate::host::{Event, EventSink, Host, Subscription, TeardownToken};
use crate::verdict::{self, VerdictReader};

/// Called at most once, synchronously from [`start_detector`], when the
/// detector cannot start.
pub type UnavailableHook = Box<dyn FnOnce(&DetectorError) + Send>;

/// Handle to a running (or inert) detector.
pub struct DetectorHandle {
    verdict: VerdictReader,
    control: Option<Sender<Event>>,
    token: TeardownToken,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl DetectorHandle {
    fn inert() -> Self {
        let (_publisher, verdict) = verdict::channel();
        let token = TeardownToken::new();
        token.tear_down();
        Self {
            verdict,
            control: None,
            token,
            worker: Mutex::new(None),
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.verdict.is_degraded()
    }

    /// Receiver woken on every verdict transition.
    pub fn subscribe(&self) -> WatchReceiver<bool> {
        self.verdict.subscribe()
    }

    pub fn is_running(&self) -> bool {
        !self.token.is_torn_down()
    }

    /// Forces the verdict back to healthy. Applied on the detector's own
    /// timeline, so `is_degraded` may lag this call briefly.
    pub fn reset(&self) {
        if self.token.is_torn_down() {
            return;
        }
        if let Some(control) = &self.control {
            let _ = control.send(Event::Reset);
        }
    }

    /// Stops sampling and releases every host subscription. Idempotent.
    pub fn stop(&self) {
        if !self.token.tear_down() {
            return;
        }
        if let Some(control) = &self.control {
            let _ = control.send(Event::Stop);
        }
        if let Some(worker) = self.worker.lock().take() {
            if worker.join().is_err() {
                error!("lag detector thread panicked");
            }
        }
    }
}

impl Drop for DetectorHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Starts monitoring `host`. Always returns a handle; when the host lacks
/// a required capability the handle is inert, the verdict stays `false`
/// and `on_unavailable` is invoked once before this returns.
pub fn start_detector<H: Host>(
    config: DetectorConfig,
    host: H,
    on_unavailable: Option<UnavailableHook>,
) -> DetectorHandle {
    match spawn(config, host) {
        Ok(handle) => handle,
        Err(err) => {
            match &err {
                DetectorError::CapabilityUnsupported(_) => warn!("{err}"),
                _ => error!("{err}"),
            }
            if let Some(hook) = on_unavailable {
                hook(&err);
            }
            DetectorHandle::inert()
        }
    }
}

fn spawn<H: Host>(config: DetectorConfig, mut host: H) -> DetectorResult<DetectorHandle> {
    config.validate()?;
    capability::probe(&host)?;

    let (tx, rx) = crossbeam_channel::unbounded();
    let token = TeardownToken::new();
    let sink = EventSink::new(tx.clone(), token.clone());

    let long_tasks = host
        .observe_long_tasks(sink.clone())
        .map_err(|e| DetectorError::unsupported(format!("failed to observe long tasks: {e}")))?;
    let visibility = match host.observe_visibility(sink) {
        Ok(sub) => sub,
        Err(e) => {
            long_tasks.cancel();
            return Err(DetectorError::environment(format!(
                "failed to observe visibility: {e}"
            )));
        }
    };

    let (publisher, reader) = verdict::channel();
    let detector = Detector::new(&config, host.is_visible(), publisher);
    let driver = Driver::new(
        detector,
        host,
        rx,
        token.clone(),
        [long_tasks, visibility],
        &config,
        Instant::now(),
    );

    info!("lag detector started monitoring performance");
    let worker = std::thread::Builder::new()
        .name("lag-detector".into())
        .spawn(move || driver.run())?;

    Ok(DetectorHandle {
        verdict: reader,
        control: Some(tx),
        token,
        worker: Mutex::new(Some(worker)),
    })
}

/// Owns the detector on its thread; dropping it unsubscribes from the host.
struct Driver<H: Host> {
    detector: Detector,
    host: H,
    rx: Receiver<Event>,
    token: TeardownToken,
    _subscriptions: [Subscription; 2],
    frame_interval: Duration,
    check_interval: Duration,
    warmup_at: Instant,
    warm: bool,
    next_frame: Instant,
    next_check: Instant,
}

impl<H: Host> Driver<H> {
    fn new(
        detector: Detector,
        host: H,
        rx: Receiver<Event>,
        token: TeardownToken,
        subscriptions: [Subscription; 2],
        config: &DetectorConfig,
        start: Instant,
    ) -> Self {
        let check_interval = config.check_interval();
        Self {
            detector,
            host,
            rx,
            token,
            _subscriptions: subscriptions,
            frame_interval: Duration::from_micros(FRAME_TICK_INTERVAL_US),
            check_interval,
            warmup_at: start + config.initial_sampling_duration(),
            warm: false,
            next_frame: start,
            next_check: start + check_interval,
        }
    }

    fn run(mut self) {
        loop {
            let mut deadline = self.next_frame.min(self.next_check);
            if !self.warm {
                deadline = deadline.min(self.warmup_at);
            }

            let event = match self.rx.recv_deadline(deadline) {
                Ok(Event::Stop) | Err(RecvTimeoutError::Disconnected) => break,
                Ok(event) => Some(event),
                Err(RecvTimeoutError::Timeout) => None,
            };
            if self.token.is_torn_down() {
                break;
            }
            self.wake(event, Instant::now());
        }
        info!("lag detector stopped");
    }

    /// One turn of the timeline. Warm-up ends before the event is handled,
    /// so a report arriving on the warm-up wake-up still counts.
    fn wake(&mut self, event: Option<Event>, now: Instant) {
        if !self.warm && now >= self.warmup_at {
            self.warm = true;
            self.detector.on_warmup_elapsed();
        }
        if let Some(event) = event {
            self.handle(event, now);
        }
        if now >= self.next_frame {
            if self.detector.on_frame_tick(now) {
                self.host.request_refresh();
            }
            self.next_frame = advance(self.next_frame, self.frame_interval, now);
        }
        if now >= self.next_check {
            self.detector.on_check(now);
            self.next_check = advance(self.next_check, self.check_interval, now);
        }
    }

    fn handle(&mut self, event: Event, now: Instant) {
        match event {
            Event::Refresh(at) => self.detector.on_refresh(at),
            Event::LongTasks(durations) => self.detector.on_long_tasks(now, &durations),
            Event::Visibility(visible) => self.detector.on_visibility(visible),
            Event::Reset => {
                self.detector.reset();
            }
            Event::Stop => {}
        }
    }
}

// Skips missed ticks instead of firing them in a burst.
fn advance(scheduled: Instant, interval: Duration, now: Instant) -> Instant {
    let next = scheduled + interval;
    if next > now { next } else { now + interval }
}
