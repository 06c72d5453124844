//! Server call and listener decorators

use super::ServerMetrics;
use crate::method::MethodDescriptor;
use crate::rpc::{BoxServerCall, BoxServerCallListener, Clock, ServerCall, ServerCallListener};
use std::sync::Arc;
use std::time::Instant;
use tonic::metadata::MetadataMap;
use tonic::Status;
use tracing::trace;

/// Wraps a server call and records started, sent, handled and latency.
///
/// The call counts as started as soon as this decorator is constructed, before
/// the service has created its listener. Request headers are snapshotted at
/// that point and label every later event of the call.
pub struct MonitoringServerCall<Resp> {
    inner: BoxServerCall<Resp>,
    metrics: ServerMetrics,
    clock: Arc<dyn Clock>,
    start: Instant,
    request_metadata: Arc<MetadataMap>,
    closed: bool,
}

impl<Resp> MonitoringServerCall<Resp> {
    pub fn new(
        inner: BoxServerCall<Resp>,
        metrics: ServerMetrics,
        clock: Arc<dyn Clock>,
        request_metadata: Arc<MetadataMap>,
    ) -> Self {
        let start = clock.now();
        metrics.record_call_started(&request_metadata);
        trace!(
            method = %metrics.method().full_name(),
            "gRPC server call started"
        );

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
        self.metrics.record_server_handled(code, &self.request_metadata);

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
            "gRPC server call handled"
        );
    }
}

impl<Resp: Send> ServerCall<Resp> for MonitoringServerCall<Resp> {
    fn method_descriptor(&self) -> &MethodDescriptor {
        self.inner.method_descriptor()
    }

    fn request(&mut self, num_messages: usize) {
        self.inner.request(num_messages);
    }

    fn send_headers(&mut self, headers: MetadataMap) {
        self.inner.send_headers(headers);
    }

    fn send_message(&mut self, message: Resp) {
        if self.metrics.method().method_type().streams_responses() {
            self.metrics.record_stream_message_sent(&self.request_metadata);
        }
        self.inner.send_message(message);
    }

    fn close(&mut self, status: Status, trailers: MetadataMap) {
        if !self.closed {
            self.closed = true;
            self.report_end_metrics(&status);
        }
        self.inner.close(status, trailers);
    }

    fn is_cancelled(&self) -> bool {
        self.inner.is_cancelled()
    }
}

/// Wraps the service's listener and counts received stream messages
pub struct MonitoringServerCallListener<Req> {
    inner: BoxServerCallListener<Req>,
    metrics: ServerMetrics,
    request_metadata: Arc<MetadataMap>,
}

impl<Req> MonitoringServerCallListener<Req> {
    pub fn new(
        inner: BoxServerCallListener<Req>,
        metrics: ServerMetrics,
        request_metadata: Arc<MetadataMap>,
    ) -> Self {
        Self {
            inner,
            metrics,
            request_metadata,
        }
    }
}

impl<Req: Send> ServerCallListener<Req> for MonitoringServerCallListener<Req> {
    fn on_message(&mut self, message: Req) {
        if self.metrics.method().method_type().streams_requests() {
            self.metrics.record_stream_message_received(&self.request_metadata);
        }
        self.inner.on_message(message);
    }

    fn on_half_close(&mut self) {
        self.inner.on_half_close();
    }

    fn on_cancel(&mut self) {
        self.inner.on_cancel();
    }

    fn on_complete(&mut self) {
        self.inner.on_complete();
    }

    fn on_ready(&mut self) {
        self.inner.on_ready();
    }
}
