//! Client interceptor recording Prometheus metrics for outgoing calls

use super::{ClientMetricsFactory, MonitoringClientCall};
use crate::config::Configuration;
use crate::error::Result;
use crate::method::MethodDescriptor;
use crate::rpc::{system_clock, BoxClientCall, Channel, ClientInterceptor, Clock};
use std::sync::Arc;

/// Records `grpc_client_*` metrics for every call created through it
#[derive(Clone)]
pub struct MonitoringClientInterceptor {
    configuration: Configuration,
    factory: ClientMetricsFactory,
    clock: Arc<dyn Clock>,
}

impl MonitoringClientInterceptor {
    /// Register the client metric families and build the interceptor
    pub fn create(configuration: Configuration) -> Result<Self> {
        let factory = ClientMetricsFactory::new(&configuration)?;
        Ok(Self {
            configuration,
            factory,
            clock: system_clock(),
        })
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn configuration(&self) -> &Configuration {
        &self.configuration
    }
}

impl ClientInterceptor for MonitoringClientInterceptor {
    fn intercept_call<Req, Resp, C>(
        &self,
        method: &MethodDescriptor,
        next: &C,
    ) -> BoxClientCall<Req, Resp>
    where
        Req: Send + 'static,
        Resp: Send + 'static,
        C: Channel<Req, Resp>,
    {
        let metrics = self.factory.create_metrics_for_method(method);
        Box::new(MonitoringClientCall::new(
            next.new_call(method),
            metrics,
            Arc::clone(&self.clock),
        ))
    }
}
