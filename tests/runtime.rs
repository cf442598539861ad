use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use lag_detector::sim::SimulatedHost;
use lag_detector::{
    DetectorConfig, DetectorError, EventSink, Host, ObserveRejected, Subscription,
    UnavailableHook, start_detector,
};
use parking_lot::Mutex;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn fast_config() -> DetectorConfig {
    DetectorConfig::default()
        .with_initial_sampling_duration_ms(100)
        .with_check_interval_ms(100)
        .with_lag_recovery_delay_ms(300)
}

fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    cond()
}

/// Hook recording every error it receives.
fn recording_hook() -> (UnavailableHook, Arc<Mutex<Vec<String>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let hook: UnavailableHook = Box::new(move |err: &DetectorError| {
        let kind = match err {
            DetectorError::EnvironmentUnavailable(_) => "environment",
            DetectorError::CapabilityUnsupported(_) => "unsupported",
            DetectorError::InvalidConfig(_) => "config",
            _ => "other",
        };
        sink.lock().push(kind.to_string());
    });
    (hook, seen)
}

/// Host that keeps every sink it is handed, even after unsubscribing.
#[derive(Clone, Default)]
struct RetainingHost {
    sinks: Arc<Mutex<Vec<EventSink>>>,
}

impl RetainingHost {
    fn retain(&self, sink: EventSink) -> Result<Subscription, ObserveRejected> {
        self.sinks.lock().push(sink);
        Ok(Subscription::new(|| {}))
    }
}

impl Host for RetainingHost {
    fn supports_long_tasks(&self) -> bool {
        true
    }

    fn is_visible(&self) -> bool {
        true
    }

    fn request_refresh(&mut self) {}

    fn observe_long_tasks(&mut self, sink: EventSink) -> Result<Subscription, ObserveRejected> {
        self.retain(sink)
    }

    fn observe_visibility(&mut self, sink: EventSink) -> Result<Subscription, ObserveRejected> {
        self.retain(sink)
    }
}

#[test]
fn missing_long_tasks_never_starts() {
    init_logging();
    let host = SimulatedHost::new().without_long_tasks();
    let controller = host.controller();
    let (hook, seen) = recording_hook();

    let handle = start_detector(fast_config(), host, Some(hook));

    assert_eq!(*seen.lock(), vec!["unsupported".to_string()]);
    assert!(!handle.is_running());
    assert_eq!(controller.active_subscriptions(), 0);
    assert!(!handle.is_degraded());
}

#[test]
fn missing_event_loop_reports_environment() {
    init_logging();
    let host = SimulatedHost::new().without_event_loop();
    let (hook, seen) = recording_hook();
    let handle = start_detector(fast_config(), host, Some(hook));
    assert_eq!(*seen.lock(), vec!["environment".to_string()]);
    assert!(!handle.is_running());
}

#[test]
fn rejected_subscription_aborts_without_leaking() {
    init_logging();
    let host = SimulatedHost::new().rejecting_long_tasks();
    let controller = host.controller();
    let (hook, seen) = recording_hook();

    let handle = start_detector(fast_config(), host, Some(hook));

    assert_eq!(*seen.lock(), vec!["unsupported".to_string()]);
    assert!(!handle.is_running());
    assert_eq!(controller.active_subscriptions(), 0);
}

#[test]
fn invalid_config_is_reported_through_hook() {
    init_logging();
    let (hook, seen) = recording_hook();
    let handle = start_detector(
        fast_config().with_check_interval_ms(0),
        SimulatedHost::new(),
        Some(hook),
    );
    assert_eq!(*seen.lock(), vec!["config".to_string()]);
    assert!(!handle.is_running());
}

#[test]
fn long_task_after_warm_up_degrades_immediately() {
    init_logging();
    let host = SimulatedHost::new();
    let controller = host.controller();
    let config = fast_config().with_check_interval_ms(60_000);
    let handle = start_detector(config, host, None);

    thread::sleep(Duration::from_millis(200));
    assert!(!handle.is_degraded());
    controller.inject_long_tasks(vec![Duration::from_millis(80)]);

    // Check interval is a minute away; only the long task can flip it.
    assert!(wait_until(Duration::from_secs(1), || handle.is_degraded()));
    handle.stop();
}

#[test]
fn evidence_during_warm_up_is_ignored() {
    init_logging();
    let host = SimulatedHost::new();
    let controller = host.controller();
    let config = fast_config().with_initial_sampling_duration_ms(60_000);
    controller.set_fps(4.0);
    let handle = start_detector(config, host, None);

    controller.inject_long_tasks(vec![Duration::from_millis(500)]);
    thread::sleep(Duration::from_millis(600));
    assert!(!handle.is_degraded());
    handle.stop();
}

#[test]
fn low_frame_rate_degrades_then_recovers() {
    init_logging();
    let host = SimulatedHost::new();
    let controller = host.controller();
    controller.set_fps(4.0);
    let config = fast_config().with_check_interval_ms(300);
    let handle = start_detector(config, host, None);

    assert!(wait_until(Duration::from_secs(3), || handle.is_degraded()));

    controller.set_fps(60.0);
    assert!(wait_until(Duration::from_secs(3), || !handle.is_degraded()));
    handle.stop();
}

#[test]
fn degraded_holds_without_auto_recover_until_reset() {
    init_logging();
    let host = SimulatedHost::new();
    let controller = host.controller();
    let handle = start_detector(fast_config().with_auto_recover(false), host, None);

    thread::sleep(Duration::from_millis(200));
    controller.inject_long_tasks(vec![Duration::from_millis(90)]);
    assert!(wait_until(Duration::from_secs(1), || handle.is_degraded()));

    thread::sleep(Duration::from_millis(800));
    assert!(handle.is_degraded());

    handle.reset();
    assert!(wait_until(Duration::from_secs(1), || !handle.is_degraded()));
    handle.stop();
}

#[test]
fn hidden_host_ignores_long_tasks() {
    init_logging();
    let host = SimulatedHost::new();
    let controller = host.controller();
    let handle = start_detector(fast_config(), host, None);

    thread::sleep(Duration::from_millis(200));
    controller.set_visible(false);
    controller.inject_long_tasks(vec![Duration::from_millis(300)]);
    thread::sleep(Duration::from_millis(300));
    assert!(!handle.is_degraded());
    handle.stop();
}

#[test]
fn subscribers_see_transitions() {
    init_logging();
    let host = SimulatedHost::new();
    let controller = host.controller();
    let handle = start_detector(fast_config(), host, None);
    let mut changes = handle.subscribe();

    thread::sleep(Duration::from_millis(200));
    controller.inject_long_tasks(vec![Duration::from_millis(80)]);

    let mut seen = None;
    assert!(wait_until(Duration::from_secs(1), || {
        seen = seen.or(changes.get_if_new());
        seen.is_some()
    }));
    assert_eq!(seen, Some(true));
    handle.stop();
}

#[test]
fn late_subscriber_starts_from_current_verdict() {
    init_logging();
    let host = SimulatedHost::new();
    let controller = host.controller();
    let config = fast_config().with_check_interval_ms(60_000);
    let handle = start_detector(config, host, None);

    thread::sleep(Duration::from_millis(200));
    controller.inject_long_tasks(vec![Duration::from_millis(80)]);
    assert!(wait_until(Duration::from_secs(1), || handle.is_degraded()));

    let mut changes = handle.subscribe();
    assert_eq!(changes.get_if_new(), None);

    handle.reset();
    assert!(wait_until(Duration::from_secs(1), || !handle.is_degraded()));
    assert_eq!(changes.get_if_new(), Some(false));
    handle.stop();
}

#[test]
fn stop_is_idempotent_and_releases_host() {
    init_logging();
    let host = SimulatedHost::new();
    let controller = host.controller();
    let handle = start_detector(fast_config(), host, None);
    assert!(handle.is_running());
    assert_eq!(controller.active_subscriptions(), 2);

    handle.stop();
    handle.stop();
    assert!(!handle.is_running());
    assert_eq!(controller.active_subscriptions(), 0);

    thread::sleep(Duration::from_millis(200));
    controller.inject_long_tasks(vec![Duration::from_millis(500)]);
    handle.reset();
    assert!(!handle.is_degraded());
}

#[test]
fn reports_through_retained_sinks_after_stop_are_dropped() {
    init_logging();
    let host = RetainingHost::default();
    let sinks = host.sinks.clone();
    let config = fast_config()
        .with_initial_sampling_duration_ms(0)
        .with_check_interval_ms(60_000);
    let handle = start_detector(config, host, None);
    assert_eq!(sinks.lock().len(), 2);

    // Live sinks reach the detector.
    thread::sleep(Duration::from_millis(50));
    sinks.lock()[0].long_tasks(vec![Duration::from_millis(80)]);
    assert!(wait_until(Duration::from_secs(1), || handle.is_degraded()));
    handle.reset();
    assert!(wait_until(Duration::from_secs(1), || !handle.is_degraded()));

    handle.stop();
    for sink in sinks.lock().iter() {
        assert!(sink.is_closed());
        sink.visibility(true);
        sink.long_tasks(vec![Duration::from_millis(500)]);
    }
    thread::sleep(Duration::from_millis(100));
    assert!(!handle.is_degraded());
    assert!(!handle.is_running());
}

#[test]
fn starting_hidden_gates_until_visible() {
    init_logging();
    let host = SimulatedHost::new().hidden();
    let controller = host.controller();
    let handle = start_detector(fast_config(), host, None);

    thread::sleep(Duration::from_millis(200));
    controller.inject_long_tasks(vec![Duration::from_millis(300)]);
    thread::sleep(Duration::from_millis(200));
    assert!(!handle.is_degraded());

    controller.set_visible(true);
    controller.inject_long_tasks(vec![Duration::from_millis(300)]);
    assert!(wait_until(Duration::from_secs(1), || handle.is_degraded()));
    handle.stop();
}
