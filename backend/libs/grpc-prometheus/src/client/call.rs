//! Client call and listener decorators

use super::ClientMetrics;
use crate::rpc::{BoxClientCall, BoxClientCallListener, ClientCall, ClientCallListener, Clock};
use std::sync::Arc;
use std::time::Instant;
use tonic::metadata::MetadataMap;
use tonic::Status;
use tracing::trace;

/// Wraps a client call and records started and sent events.
///
/// Request headers are first available in `start`, so that is where the call
/// counts as started and where the listener decorator is installed.
pub struct MonitoringClientCall<Req, Resp> {
    inner: BoxClientCall<Req, Resp>,
    metrics: ClientMetrics,
    clock: Arc<dyn Clock>,
    request_metadata: Option<Arc<MetadataMap>>,
}

impl<Req, Resp> MonitoringClientCall<Req, Resp> {
    pub fn new(
        inner: BoxClientCall<Req, Resp>,
        metrics: ClientMetrics,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            inner,
            metrics,
            clock,
            request_metadata: None,
        }
    }
}

impl<Req, Resp> ClientCall<Req, Resp> for MonitoringClientCall<Req, Resp>
where
    Req: Send,
    Resp: Send + 'static,
{
    fn start(&mut self, listener: BoxClientCallListener<Resp>, headers: MetadataMap) {
        let request_metadata = Arc::new(headers.clone());
        let start = self.clock.now();
        self.metrics.record_call_started(&request_metadata);
        trace!(
            method = %self.metrics.method().full_name(),
            "gRPC client call started"
        );

        let listener = MonitoringClientCallListener::new(
            listener,
            self.metrics.clone(),
            Arc::clone(&self.clock),
            start,
            Arc::clone(&request_metadata),
        );
        self.request_metadata = Some(request_metadata);

        self.inner.start(Box::new(listener), headers);
    }

    fn request(&mut self, num_messages: usize) {
        self.inner.request(num_messages);
    }

    fn send_message(&mut self, message: Req) {
        if self.metrics.method().method_type().streams_requests() {
            // Not started yet means the framework rejects the send anyway
            if let Some(metadata) = &self.request_metadata {
                self.metrics.record_stream_message_sent(metadata);
            }
        }
        self.inner.send_message(message);
    }

    fn half_close(&mut self) {
        self.inner.half_close();
    }

    fn cancel(&mut self, message: Option<&str>) {
        self.inner.cancel(message);
    }

    fn is_ready(&self) -> bool {
        self.inner.is_ready()
    }
}

/// Wraps the caller's listener; records received messages, completion and latency
pub struct MonitoringClientCallListener<Resp> {
    inner: BoxClientCallListener<Resp>,
    metrics: ClientMetrics,
    clock: Arc<dyn Clock>,
    start: Instant,
    request_metadata: Arc<MetadataMap>,
    closed: bool,
}

impl<Resp> MonitoringClientCallListener<Resp> {
    pub fn new(
        inner: BoxClientCallListener<Resp>,
        metrics: ClientMetrics,
        clock: Arc<dyn Clock>,
        start: Instant,
        request_metadata: Arc<MetadataMap>,
    ) -> Self {
        Self {
            inner,
            metrics,
            clock,
            start,
            request_metadata,
            closed: false,
        }
    }

    fn report_end_metrics(&self, status: &Status) {
        let code = status.code();
        // Labels come from the request headers, never the response trailers
        self.metrics.record_client_handled(code, &self.request_metadata);

        let latency_secs = self
            .clock
            .now()
            .saturating_duration_since(self.start)
            .as_secs_f64();
        if self.metrics.latency_enabled() {
            self.metrics.record_latency(latency_secs, &self.request_metadata, code);
        }

        trace!(
            method = %self.metrics.method().full_name(),
            code = ?code,
            latency_secs,
            "gRPC client call completed"
        );
    }
}

impl<Resp: Send> ClientCallListener<Resp> for MonitoringClientCallListener<Resp> {
    fn on_headers(&mut self, headers: &MetadataMap) {
        self.inner.on_headers(headers);
    }

    fn on_message(&mut self, message: Resp) {
        if self.metrics.method().method_type().streams_responses() {
            self.metrics.record_stream_message_received(&self.request_metadata);
        }
        self.inner.on_message(message);
    }

    fn on_close(&mut self, status: Status, trailers: MetadataMap) {
        if !self.closed {
            self.closed = true;
            self.report_end_metrics(&status);
        }
        self.inner.on_close(status, trailers);
    }

    fn on_ready(&mut self) {
        self.inner.on_ready();
    }
}
