//! Server-side monitoring
//!
//! [`ServerMetricsFactory`] registers the `grpc_server_*` families once per
//! configuration and registry; [`ServerMetrics`] records the events of one
//! call against them.

mod call;
mod interceptor;

pub use call::{MonitoringServerCall, MonitoringServerCallListener};
pub use interceptor::MonitoringServerInterceptor;

use crate::config::Configuration;
use crate::error::Result;
use crate::method::MethodDescriptor;
use crate::metrics::{MetricFamilies, SERVER_FAMILIES};
use std::sync::Arc;
use tonic::metadata::MetadataMap;
use tonic::Code;

/// Produces [`ServerMetrics`] for individual methods
#[derive(Clone)]
pub struct ServerMetricsFactory {
    families: Arc<MetricFamilies>,
}

impl ServerMetricsFactory {
    /// Register the server metric families in the configured registry
    ///
    /// Returns [`ConfigurationError::DuplicateRegistration`](crate::ConfigurationError)
    /// if another factory already registered them in the same registry.
    pub fn new(configuration: &Configuration) -> Result<Self> {
        let families = MetricFamilies::register(configuration, &SERVER_FAMILIES)?;
        Ok(Self {
            families: Arc::new(families),
        })
    }

    /// Bind the registered families to `method`
    pub fn create_metrics_for_method(&self, method: &MethodDescriptor) -> ServerMetrics {
        ServerMetrics {
            method: method.clone(),
            families: Arc::clone(&self.families),
        }
    }
}

/// Records the lifecycle of server calls to one method.
///
/// Performs no call-type filtering; the call decorators decide which stream
/// events apply to the method.
#[derive(Clone)]
pub struct ServerMetrics {
    method: MethodDescriptor,
    families: Arc<MetricFamilies>,
}

impl ServerMetrics {
    pub fn method(&self) -> &MethodDescriptor {
        &self.method
    }

    pub fn record_call_started(&self, metadata: &MetadataMap) {
        self.families.record_started(&self.method, metadata);
    }

    pub fn record_stream_message_sent(&self, metadata: &MetadataMap) {
        self.families.record_msg_sent(&self.method, metadata);
    }

    pub fn record_stream_message_received(&self, metadata: &MetadataMap) {
        self.families.record_msg_received(&self.method, metadata);
    }

    pub fn record_server_handled(&self, code: Code, metadata: &MetadataMap) {
        self.families.record_terminal(&self.method, code, metadata);
    }

    /// Only has an effect when latency histograms are enabled
    pub fn record_latency(&self, latency_secs: f64, metadata: &MetadataMap, code: Code) {
        self.families.record_latency(&self.method, latency_secs, metadata, code);
    }

    pub fn latency_enabled(&self) -> bool {
        self.families.latency_enabled()
    }
}
