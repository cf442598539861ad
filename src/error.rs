use thiserror::Error;

pub type DetectorResult<T> = Result<T, DetectorError>;

/// Failures that keep a detector from starting, or a config from loading.
///
/// None of these ever reach a verdict consumer: start-up failures are
/// handed to the capability hook once and the detector stays inert.
#[derive(Debug, Error)]
pub enum DetectorError {
    #[error("host environment unavailable: {0}")]
    EnvironmentUnavailable(String),

    #[error("long-task observation unsupported: {0}")]
    CapabilityUnsupported(String),

    #[error("invalid detector configuration: {0}")]
    InvalidConfig(&'static str),

    #[error("config parse error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("config read error: {0}")]
    Io(#[from] std::io::Error),
}

impl DetectorError {
    pub fn environment(reason: impl Into<String>) -> Self {
        DetectorError::EnvironmentUnavailable(reason.into())
    }

    pub fn unsupported(reason: impl Into<String>) -> Self {
        DetectorError::CapabilityUnsupported(reason.into())
    }
}
