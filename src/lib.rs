// Public modules
pub mod capability;
pub mod config;
pub mod detector;
pub mod error;
pub mod frame_sampler;
pub mod host;
pub mod log_throttle;
pub mod long_task;
pub mod runtime;
pub mod sample_window;
pub mod sim;
pub mod state_machine;
pub mod verdict;
pub mod visibility;

pub use config::DetectorConfig;
pub use detector::Detector;
pub use error::{DetectorError, DetectorResult};
pub use host::{EventSink, Host, ObserveRejected, Subscription};
pub use runtime::{DetectorHandle, UnavailableHook, start_detector};
pub use state_machine::DetectorState;

// Re-export constants commonly used
pub mod constants {
    pub const DEFAULT_FPS_THRESHOLD: f64 = 20.0;
    pub const DEFAULT_LONG_TASK_THRESHOLD_MS: f64 = 50.0;
    pub const DEFAULT_CHECK_INTERVAL_MS: u64 = 1000;
    pub const DEFAULT_INITIAL_SAMPLING_MS: u64 = 5000;
    pub const DEFAULT_LAG_RECOVERY_DELAY_MS: u64 = 3000;

    /// 60 Hz sampling cadence
    pub const FRAME_TICK_INTERVAL_US: u64 = 1_000_000 / 60;
    /// ~10 s of ticks without a refresh
    pub const MAX_PENDING_TICKS: usize = 600;
    pub const METRICS_LOG_INTERVAL_SECS: u64 = 10;
}
