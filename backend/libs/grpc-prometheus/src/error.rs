//! Error types for metric configuration and registration

use thiserror::Error;

/// Result type for configuration and factory construction
pub type Result<T> = std::result::Result<T, ConfigurationError>;

/// Fatal configuration errors.
///
/// These surface while building a [`Configuration`](crate::Configuration) or
/// while constructing an interceptor. None of them can occur on the call path.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    /// Bucket list has no boundaries
    #[error("latency buckets must not be empty")]
    EmptyLatencyBuckets,

    /// Bucket boundary is zero, negative, NaN or infinite
    #[error("latency bucket boundary must be a positive finite number, got {value}")]
    InvalidLatencyBucket { value: f64 },

    /// Bucket boundaries are not strictly increasing
    #[error("latency buckets must be strictly increasing, got {previous} followed by {next}")]
    NonIncreasingLatencyBuckets { previous: f64, next: f64 },

    /// Header name is not a valid ASCII metadata key
    #[error("invalid label header name {name:?}")]
    InvalidLabelHeader { name: String },

    /// Two label names collide after header sanitization
    #[error("label name {label:?} is declared more than once")]
    DuplicateLabelName { label: String },

    /// Metric family already exists in the target registry
    #[error("metric family {name} is already registered in this registry")]
    DuplicateRegistration { name: String },

    /// Registry or metric construction failure
    #[error("failed to set up metric family {name}: {source}")]
    Metric {
        name: String,
        #[source]
        source: prometheus::Error,
    },

    /// `GRPC_METRICS_*` environment settings could not be parsed
    #[error("invalid metrics settings in environment: {0}")]
    InvalidSetting(#[from] envy::Error),
}

impl ConfigurationError {
    /// Map a prometheus error raised while creating or registering `name`
    pub(crate) fn metric(name: impl Into<String>, source: prometheus::Error) -> Self {
        let name = name.into();
        match source {
            prometheus::Error::AlreadyReg => Self::DuplicateRegistration { name },
            source => Self::Metric { name, source },
        }
    }
}
