//! Monitoring configuration
//!
//! [`Configuration`] is an immutable value: every `with_*` method returns a
//! new instance. [`MetricsSettings`] is its serializable counterpart, loaded
//! from the environment at startup.

use crate::error::{ConfigurationError, Result};
use prometheus::Registry;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Default latency histogram boundaries, in seconds
pub const DEFAULT_LATENCY_BUCKETS: [f64; 12] = [
    0.001, 0.005, 0.01, 0.05, 0.075, 0.1, 0.25, 0.5, 1.0, 2.0, 5.0, 10.0,
];

/// Which metrics to record for RPCs and where to record them.
///
/// Latency histograms are the expensive part and are off in
/// [`Configuration::cheap_metrics_only`].
#[derive(Clone)]
pub struct Configuration {
    include_latency_histograms: bool,
    registry: Registry,
    latency_buckets: Vec<f64>,
    label_headers: Vec<String>,
    add_code_label_to_histograms: bool,
    legacy_code_label: bool,
}

impl Configuration {
    /// Counters only, default registry, no custom labels
    pub fn cheap_metrics_only() -> Self {
        Self {
            include_latency_histograms: false,
            registry: prometheus::default_registry().clone(),
            latency_buckets: DEFAULT_LATENCY_BUCKETS.to_vec(),
            label_headers: Vec::new(),
            add_code_label_to_histograms: false,
            legacy_code_label: true,
        }
    }

    /// Counters plus latency histograms
    pub fn all_metrics() -> Self {
        Self {
            include_latency_histograms: true,
            ..Self::cheap_metrics_only()
        }
    }

    /// Build a configuration from loaded settings, against the default registry
    pub fn from_settings(settings: &MetricsSettings) -> Result<Self> {
        let base = if settings.include_latency_histograms {
            Self::all_metrics()
        } else {
            Self::cheap_metrics_only()
        };

        let mut config = base
            .with_latency_buckets(&settings.latency_buckets)?
            .with_label_headers(settings.label_headers.iter().cloned());
        config.add_code_label_to_histograms = settings.add_code_label_to_histograms;
        config.legacy_code_label = settings.legacy_code_label;
        Ok(config)
    }

    /// Record into `registry` instead
    pub fn with_registry(&self, registry: Registry) -> Self {
        Self {
            registry,
            ..self.clone()
        }
    }

    /// Use `buckets` as the latency histogram boundaries
    ///
    /// Boundaries must be positive, finite and strictly increasing. The
    /// implicit `+Inf` bucket is always added by the registry.
    pub fn with_latency_buckets(&self, buckets: &[f64]) -> Result<Self> {
        validate_buckets(buckets)?;
        Ok(Self {
            latency_buckets: buckets.to_vec(),
            ..self.clone()
        })
    }

    /// Append header names whose values become labels on every metric
    ///
    /// Order is preserved and names are not deduplicated. Names that collide
    /// once sanitized are rejected when the metric families are registered.
    pub fn with_label_headers<I, S>(&self, headers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut label_headers = self.label_headers.clone();
        label_headers.extend(headers.into_iter().map(Into::into));
        Self {
            label_headers,
            ..self.clone()
        }
    }

    /// Add the status code as a `grpc_code` label on latency histograms
    pub fn with_code_label_on_histograms(&self) -> Self {
        Self {
            add_code_label_to_histograms: true,
            ..self.clone()
        }
    }

    /// Register only `grpc_code` on the handled/completed counters.
    ///
    /// By default the counters carry both `code` and `grpc_code` with the
    /// same value; `code` is deprecated.
    pub fn without_legacy_code_label(&self) -> Self {
        Self {
            legacy_code_label: false,
            ..self.clone()
        }
    }

    pub fn include_latency_histograms(&self) -> bool {
        self.include_latency_histograms
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn latency_buckets(&self) -> &[f64] {
        &self.latency_buckets
    }

    /// Header names as declared; used as metadata lookup keys
    pub fn label_headers(&self) -> &[String] {
        &self.label_headers
    }

    pub fn add_code_label_to_histograms(&self) -> bool {
        self.add_code_label_to_histograms
    }

    pub fn legacy_code_label(&self) -> bool {
        self.legacy_code_label
    }

    /// Header names as label names: `-` replaced with `_`
    pub fn sanitized_label_headers(&self) -> Vec<String> {
        self.label_headers
            .iter()
            .map(|header| header.replace('-', "_"))
            .collect()
    }
}

impl fmt::Debug for Configuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Configuration")
            .field("include_latency_histograms", &self.include_latency_histograms)
            .field("latency_buckets", &self.latency_buckets)
            .field("label_headers", &self.label_headers)
            .field("add_code_label_to_histograms", &self.add_code_label_to_histograms)
            .field("legacy_code_label", &self.legacy_code_label)
            .finish_non_exhaustive()
    }
}

fn validate_buckets(buckets: &[f64]) -> Result<()> {
    if buckets.is_empty() {
        return Err(ConfigurationError::EmptyLatencyBuckets);
    }

    if let Some(&value) = buckets.iter().find(|b| !b.is_finite() || **b <= 0.0) {
        return Err(ConfigurationError::InvalidLatencyBucket { value });
    }

    for pair in buckets.windows(2) {
        if pair[1] <= pair[0] {
            return Err(ConfigurationError::NonIncreasingLatencyBuckets {
                previous: pair[0],
                next: pair[1],
            });
        }
    }

    Ok(())
}

/// Serializable monitoring settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsSettings {
    /// Record latency histograms
    pub include_latency_histograms: bool,

    /// Latency histogram boundaries in seconds
    pub latency_buckets: Vec<f64>,

    /// Request headers turned into labels
    pub label_headers: Vec<String>,

    /// Add `grpc_code` to latency histograms
    pub add_code_label_to_histograms: bool,

    /// Keep the deprecated `code` label next to `grpc_code`
    pub legacy_code_label: bool,
}

impl Default for MetricsSettings {
    fn default() -> Self {
        Self {
            include_latency_histograms: false,
            latency_buckets: DEFAULT_LATENCY_BUCKETS.to_vec(),
            label_headers: Vec::new(),
            add_code_label_to_histograms: false,
            legacy_code_label: true,
        }
    }
}

impl MetricsSettings {
    /// Load settings from `GRPC_METRICS_`-prefixed environment variables
    ///
    /// **Environment Variables**:
    /// - `GRPC_METRICS_INCLUDE_LATENCY_HISTOGRAMS`: record latency histograms (default: false)
    /// - `GRPC_METRICS_LATENCY_BUCKETS`: comma-separated boundaries in seconds
    /// - `GRPC_METRICS_LABEL_HEADERS`: comma-separated request header names
    /// - `GRPC_METRICS_ADD_CODE_LABEL_TO_HISTOGRAMS`: add `grpc_code` to histograms (default: false)
    /// - `GRPC_METRICS_LEGACY_CODE_LABEL`: keep the `code` label (default: true)
    pub fn from_env() -> Result<Self> {
        let mut settings: Self = envy::prefixed(ENV_PREFIX).from_env()?;
        settings.label_headers = settings
            .label_headers
            .iter()
            .map(|header| header.trim())
            .filter(|header| !header.is_empty())
            .map(str::to_string)
            .collect();
        Ok(settings)
    }
}

const ENV_PREFIX: &str = "GRPC_METRICS_";
