//! Client-side monitoring
//!
//! Mirrors the server side with the `grpc_client_*` families and a
//! `completed` counter in place of `handled`.

mod call;
mod interceptor;

pub use call::{MonitoringClientCall, MonitoringClientCallListener};
pub use interceptor::MonitoringClientInterceptor;

use crate::config::Configuration;
use crate::error::Result;
use crate::method::MethodDescriptor;
use crate::metrics::{MetricFamilies, CLIENT_FAMILIES};
use std::sync::Arc;
use tonic::metadata::MetadataMap;
use tonic::Code;

/// Produces [`ClientMetrics`] for individual methods
#[derive(Clone)]
pub struct ClientMetricsFactory {
    families: Arc<MetricFamilies>,
}

impl ClientMetricsFactory {
    /// Register the client metric families in the configured registry
    pub fn new(configuration: &Configuration) -> Result<Self> {
        let families = MetricFamilies::register(configuration, &CLIENT_FAMILIES)?;
        Ok(Self {
            families: Arc::new(families),
        })
    }

    pub fn create_metrics_for_method(&self, method: &MethodDescriptor) -> ClientMetrics {
        ClientMetrics {
            method: method.clone(),
            families: Arc::clone(&self.families),
        }
    }
}

/// Records the lifecycle of client calls to one method
#[derive(Clone)]
pub struct ClientMetrics {
    method: MethodDescriptor,
    families: Arc<MetricFamilies>,
}

impl ClientMetrics {
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

    pub fn record_client_handled(&self, code: Code, metadata: &MetadataMap) {
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
