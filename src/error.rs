use thiserror::Error;

/// Custom error type for the gravity sampler
///
/// Only structural failures surface as errors. Probe-level problems are
/// recovered locally into `ProbeResult::Unavailable`.
#[derive(Error, Debug)]
pub enum GravityError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Environment detection failed: {0}")]
    Environment(String),

    #[error("Sampler runtime error: {0}")]
    Runtime(String),
}

/// Result type alias for the gravity sampler
pub type Result<T> = std::result::Result<T, GravityError>;

impl GravityError {
    /// Create a config error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        GravityError::Config(msg.into())
    }

    /// Create an environment detection error
    pub fn environment<S: Into<String>>(msg: S) -> Self {
        GravityError::Environment(msg.into())
    }

    pub fn runtime<S: Into<String>>(msg: S) -> Self {
        GravityError::Runtime(msg.into())
    }
}
