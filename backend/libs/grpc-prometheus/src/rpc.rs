//! Call and listener hooks consumed from the RPC framework
//!
//! The monitoring decorators wrap these capability sets, intercept the
//! lifecycle operations they need and forward everything else untouched.
//! A transport binding implements the traits for its own call objects.
//!
//! For a single call the framework invokes hooks sequentially; distinct calls
//! may run concurrently on different threads, hence the `Send` bounds.

use crate::method::MethodDescriptor;
use std::sync::Arc;
use std::time::Instant;
use tonic::metadata::MetadataMap;
use tonic::Status;

pub type BoxServerCall<Resp> = Box<dyn ServerCall<Resp>>;
pub type BoxServerCallListener<Req> = Box<dyn ServerCallListener<Req>>;
pub type BoxClientCall<Req, Resp> = Box<dyn ClientCall<Req, Resp>>;
pub type BoxClientCallListener<Resp> = Box<dyn ClientCallListener<Resp>>;

/// Server side of one call, as driven by the service implementation
pub trait ServerCall<Resp>: Send {
    fn method_descriptor(&self) -> &MethodDescriptor;

    /// Ask for `num_messages` more request messages
    fn request(&mut self, num_messages: usize);

    fn send_headers(&mut self, headers: MetadataMap);

    fn send_message(&mut self, message: Resp);

    /// Terminate the call with `status`; no further hooks follow
    fn close(&mut self, status: Status, trailers: MetadataMap);

    fn is_cancelled(&self) -> bool;
}

/// Receives inbound events for one server call
pub trait ServerCallListener<Req>: Send {
    fn on_message(&mut self, message: Req);

    fn on_half_close(&mut self) {}

    fn on_cancel(&mut self) {}

    fn on_complete(&mut self) {}

    fn on_ready(&mut self) {}
}

/// Next stage of the server pipeline (another interceptor or the service)
pub trait ServerCallHandler<Req, Resp> {
    fn start_call(
        &self,
        call: BoxServerCall<Resp>,
        headers: &MetadataMap,
    ) -> BoxServerCallListener<Req>;
}

/// Server-side entry point, invoked once per incoming call
pub trait ServerInterceptor {
    fn intercept_call<Req, Resp, H>(
        &self,
        call: BoxServerCall<Resp>,
        headers: &MetadataMap,
        next: &H,
    ) -> BoxServerCallListener<Req>
    where
        Req: Send + 'static,
        Resp: Send + 'static,
        H: ServerCallHandler<Req, Resp>;
}

/// Client side of one call
pub trait ClientCall<Req, Resp>: Send {
    /// Begin the call; `listener` receives all responses and the final status
    fn start(&mut self, listener: BoxClientCallListener<Resp>, headers: MetadataMap);

    fn request(&mut self, num_messages: usize);

    fn send_message(&mut self, message: Req);

    /// No more request messages will be sent
    fn half_close(&mut self);

    fn cancel(&mut self, message: Option<&str>);

    fn is_ready(&self) -> bool {
        true
    }
}

/// Receives inbound events for one client call
pub trait ClientCallListener<Resp>: Send {
    fn on_headers(&mut self, _headers: &MetadataMap) {}

    fn on_message(&mut self, message: Resp);

    /// Terminal event; carries the final status and response trailers
    fn on_close(&mut self, status: Status, trailers: MetadataMap);

    fn on_ready(&mut self) {}
}

/// Creates client calls for a method
pub trait Channel<Req, Resp> {
    fn new_call(&self, method: &MethodDescriptor) -> BoxClientCall<Req, Resp>;
}

/// Client-side entry point, invoked once per outgoing call
pub trait ClientInterceptor {
    fn intercept_call<Req, Resp, C>(
        &self,
        method: &MethodDescriptor,
        next: &C,
    ) -> BoxClientCall<Req, Resp>
    where
        Req: Send + 'static,
        Resp: Send + 'static,
        C: Channel<Req, Resp>;
}

/// Time source for latency measurement
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// Monotonic system clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

pub(crate) fn system_clock() -> Arc<dyn Clock> {
    Arc::new(SystemClock)
}
