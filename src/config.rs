use std::path::Path;
use std::time::Duration;

use log::warn;
use serde::Serialize;
use toml::{Table, Value};

use crate::constants::*;
use crate::error::{DetectorError, DetectorResult};

/// Options for one detector instance. Immutable once the detector starts;
/// changing them means stopping the old detector and starting a new one.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct DetectorConfig {
    /// frames/sec, a window mean below this is degraded
    pub fps_threshold: f64,
    /// ms, a single task longer than this is degraded
    pub long_task_threshold_ms: f64,
    pub check_interval_ms: u64,
    /// ms during which no verdict is issued
    pub initial_sampling_duration_ms: u64,
    /// ms without degrading evidence required before recovering
    pub lag_recovery_delay_ms: u64,
    pub auto_recover: bool,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            fps_threshold: DEFAULT_FPS_THRESHOLD,
            long_task_threshold_ms: DEFAULT_LONG_TASK_THRESHOLD_MS,
            check_interval_ms: DEFAULT_CHECK_INTERVAL_MS,
            initial_sampling_duration_ms: DEFAULT_INITIAL_SAMPLING_MS,
            lag_recovery_delay_ms: DEFAULT_LAG_RECOVERY_DELAY_MS,
            auto_recover: true,
        }
    }
}

impl DetectorConfig {
    pub fn with_fps_threshold(mut self, fps: f64) -> Self {
        self.fps_threshold = fps;
        self
    }

    pub fn with_long_task_threshold_ms(mut self, ms: f64) -> Self {
        self.long_task_threshold_ms = ms;
        self
    }

    pub fn with_check_interval_ms(mut self, ms: u64) -> Self {
        self.check_interval_ms = ms;
        self
    }

    pub fn with_initial_sampling_duration_ms(mut self, ms: u64) -> Self {
        self.initial_sampling_duration_ms = ms;
        self
    }

    pub fn with_lag_recovery_delay_ms(mut self, ms: u64) -> Self {
        self.lag_recovery_delay_ms = ms;
        self
    }

    pub fn with_auto_recover(mut self, auto_recover: bool) -> Self {
        self.auto_recover = auto_recover;
        self
    }

    pub fn check_interval(&self) -> Duration {
        Duration::from_millis(self.check_interval_ms)
    }

    pub fn initial_sampling_duration(&self) -> Duration {
        Duration::from_millis(self.initial_sampling_duration_ms)
    }

    pub fn lag_recovery_delay(&self) -> Duration {
        Duration::from_millis(self.lag_recovery_delay_ms)
    }

    pub fn validate(&self) -> DetectorResult<()> {
        if !(self.fps_threshold.is_finite() && self.fps_threshold > 0.0) {
            return Err(DetectorError::InvalidConfig(
                "fps threshold must be a positive number",
            ));
        }
        if !(self.long_task_threshold_ms.is_finite() && self.long_task_threshold_ms >= 0.0) {
            return Err(DetectorError::InvalidConfig(
                "long-task threshold must be a non-negative number",
            ));
        }
        if self.check_interval_ms == 0 {
            return Err(DetectorError::InvalidConfig(
                "check interval must be positive",
            ));
        }
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> DetectorResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parses a TOML config. Missing or invalid keys fall back to their
    /// default with a warning; only malformed TOML is an error.
    pub fn from_toml_str(content: &str) -> DetectorResult<Self> {
        let config = content.parse::<Table>()?;
        let defaults = Self::default();

        let thresholds = config.get("thresholds").and_then(|t| t.as_table());
        // frames/sec
        let fps_threshold = thresholds
            .and_then(|t| t.get("fps"))
            .ok_or("is missing")
            .and_then(as_number)
            .and_then(|v| (v > 0.0).then_some(v).ok_or("must be positive"))
            .unwrap_or_else(|s| {
                warn!(
                    "thresholds.fps {s}, replaced with the default of {} fps",
                    defaults.fps_threshold
                );
                defaults.fps_threshold
            });
        // ms
        let long_task_threshold_ms = thresholds
            .and_then(|t| t.get("long-task"))
            .ok_or("is missing")
            .and_then(as_number)
            .and_then(|v| {
                (!v.is_sign_negative())
                    .then_some(v)
                    .ok_or("must not be negative")
            })
            .unwrap_or_else(|s| {
                warn!(
                    "thresholds.long-task {s}, replaced with the default of {} ms",
                    defaults.long_task_threshold_ms
                );
                defaults.long_task_threshold_ms
            });

        let timing = config.get("timing").and_then(|t| t.as_table());
        // ms
        let check_interval_ms = timing
            .and_then(|t| t.get("check-interval"))
            .ok_or("is missing")
            .and_then(as_millis)
            .and_then(|v| (v > 0).then_some(v).ok_or("must be positive"))
            .unwrap_or_else(|s| {
                warn!(
                    "timing.check-interval {s}, replaced with the default of {} ms",
                    defaults.check_interval_ms
                );
                defaults.check_interval_ms
            });
        // ms
        let initial_sampling_duration_ms = timing
            .and_then(|t| t.get("initial-sampling"))
            .ok_or("is missing")
            .and_then(as_millis)
            .unwrap_or_else(|s| {
                warn!(
                    "timing.initial-sampling {s}, replaced with the default of {} ms",
                    defaults.initial_sampling_duration_ms
                );
                defaults.initial_sampling_duration_ms
            });

        let recovery = config.get("recovery").and_then(|t| t.as_table());
        let auto_recover = recovery
            .and_then(|t| t.get("auto"))
            .ok_or("is missing")
            .and_then(|v| v.as_bool().ok_or("must be a boolean"))
            .unwrap_or_else(|s| {
                warn!("recovery.auto {s}, replaced with the default of true");
                defaults.auto_recover
            });
        // ms
        let lag_recovery_delay_ms = recovery
            .and_then(|t| t.get("delay"))
            .ok_or("is missing")
            .and_then(as_millis)
            .unwrap_or_else(|s| {
                warn!(
                    "recovery.delay {s}, replaced with the default of {} ms",
                    defaults.lag_recovery_delay_ms
                );
                defaults.lag_recovery_delay_ms
            });

        Ok(Self {
            fps_threshold,
            long_task_threshold_ms,
            check_interval_ms,
            initial_sampling_duration_ms,
            lag_recovery_delay_ms,
            auto_recover,
        })
    }
}

fn as_number(v: &Value) -> Result<f64, &'static str> {
    v.as_float()
        .or_else(|| v.as_integer().map(|v| v as f64))
        .filter(|v| v.is_finite())
        .ok_or("must be a number")
}

fn as_millis(v: &Value) -> Result<u64, &'static str> {
    v.as_integer()
        .ok_or("must be an integer")
        .and_then(|v| u64::try_from(v).map_err(|_| "must not be negative"))
}
