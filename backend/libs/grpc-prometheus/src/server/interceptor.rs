//! Server interceptor recording Prometheus metrics for incoming calls

use super::{MonitoringServerCall, MonitoringServerCallListener, ServerMetricsFactory};
use crate::config::Configuration;
use crate::error::Result;
use crate::rpc::{
    system_clock, BoxServerCall, BoxServerCallListener, Clock, ServerCallHandler,
    ServerInterceptor,
};
use std::sync::Arc;
use tonic::metadata::MetadataMap;

/// Records `grpc_server_*` metrics for every call passing through it.
///
/// ## Usage
///
/// ```rust
/// use grpc_prometheus::{Configuration, MonitoringServerInterceptor};
/// use prometheus::Registry;
///
/// # fn main() -> grpc_prometheus::Result<()> {
/// let registry = Registry::new();
/// let interceptor = MonitoringServerInterceptor::create(
///     Configuration::all_metrics().with_registry(registry),
/// )?;
/// # let _ = interceptor;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct MonitoringServerInterceptor {
    configuration: Configuration,
    factory: ServerMetricsFactory,
    clock: Arc<dyn Clock>,
}

impl MonitoringServerInterceptor {
    /// Register the server metric families and build the interceptor
    ///
    /// Fails if the families are already registered in the configured
    /// registry; this is meant to abort server startup.
    pub fn create(configuration: Configuration) -> Result<Self> {
        let factory = ServerMetricsFactory::new(&configuration)?;
        Ok(Self {
            configuration,
            factory,
            clock: system_clock(),
        })
    }

    /// Measure latency with `clock`
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn configuration(&self) -> &Configuration {
        &self.configuration
    }
}

impl ServerInterceptor for MonitoringServerInterceptor {
    fn intercept_call<Req, Resp, H>(
        &self,
        call: BoxServerCall<Resp>,
        headers: &MetadataMap,
        next: &H,
    ) -> BoxServerCallListener<Req>
    where
        Req: Send + 'static,
        Resp: Send + 'static,
        H: ServerCallHandler<Req, Resp>,
    {
        let metrics = self
            .factory
            .create_metrics_for_method(call.method_descriptor());
        let request_metadata = Arc::new(headers.clone());

        let monitoring_call = MonitoringServerCall::new(
            call,
            metrics.clone(),
            Arc::clone(&self.clock),
            Arc::clone(&request_metadata),
        );
        let listener = next.start_call(Box::new(monitoring_call), headers);

        Box::new(MonitoringServerCallListener::new(
            listener,
            metrics,
            request_metadata,
        ))
    }
}
