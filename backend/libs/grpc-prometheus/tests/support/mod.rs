//! In-process Hello transport driving the monitoring decorators
#![allow(dead_code)]

use grpc_prometheus::{
    BoxClientCall, BoxClientCallListener, BoxServerCall, BoxServerCallListener, Channel,
    ClientCall, ClientCallListener, Clock, MethodDescriptor, MethodType, ServerCall,
    ServerCallHandler, ServerCallListener, ServerInterceptor,
};
use std::sync::{Arc, Mutex, Once};
use std::time::{Duration, Instant};
use tonic::metadata::MetadataMap;
use tonic::{Code, Status};

pub const SERVICE: &str = "grpc.testing.HelloService";

pub fn unary() -> MethodDescriptor {
    MethodDescriptor::new(SERVICE, "SayHello", MethodType::Unary)
}

pub fn client_streaming() -> MethodDescriptor {
    MethodDescriptor::new(SERVICE, "SayHelloClientStream", MethodType::ClientStreaming)
}

pub fn server_streaming() -> MethodDescriptor {
    MethodDescriptor::new(SERVICE, "SayHelloServerStream", MethodType::ServerStreaming)
}

pub fn bidi_streaming() -> MethodDescriptor {
    MethodDescriptor::new(SERVICE, "SayHelloBidiStream", MethodType::BidiStreaming)
}

/// Standard label tuple of `method`
pub fn method_labels(method: &MethodDescriptor) -> Vec<(&'static str, String)> {
    vec![
        ("grpc_type", method.method_type().as_str().to_string()),
        ("grpc_service", method.service_name().to_string()),
        ("grpc_method", method.method_name().to_string()),
    ]
}

/// Borrow an owned label list in the shape the registry helpers take
pub fn borrowed<'a>(labels: &'a [(&'static str, String)]) -> Vec<(&'a str, &'a str)> {
    labels
        .iter()
        .map(|(name, value)| (*name, value.as_str()))
        .collect()
}

pub fn metadata(pairs: &[(&'static str, &str)]) -> MetadataMap {
    let mut map = MetadataMap::new();
    for (key, value) in pairs {
        map.insert(*key, value.parse().unwrap());
    }
    map
}

pub fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_test_writer()
            .with_env_filter("grpc_prometheus=trace")
            .try_init();
    });
}

/// Run `f` with a trace-level subscriber and return what it logged
pub fn capture_logs<F: FnOnce()>(f: F) -> String {
    let buffer = Arc::new(Mutex::new(Vec::new()));
    let writer = Arc::clone(&buffer);
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::TRACE)
        .with_ansi(false)
        .with_writer(move || LogWriter(Arc::clone(&writer)))
        .finish();

    tracing::subscriber::with_default(subscriber, f);

    let bytes = buffer.lock().unwrap().clone();
    String::from_utf8(bytes).unwrap()
}

struct LogWriter(Arc<Mutex<Vec<u8>>>);

impl std::io::Write for LogWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Settable time source
pub struct ManualClock {
    now: Mutex<Instant>,
}

impl ManualClock {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            now: Mutex::new(Instant::now()),
        })
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap();
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        *self.now.lock().unwrap()
    }
}

// ==================== Server ====================

/// What reached the transport through a server call
#[derive(Default)]
pub struct ServerCallRecord {
    pub sent: Vec<String>,
    pub headers_sent: usize,
    pub closes: Vec<(Code, String, MetadataMap)>,
}

/// Transport end of a server call
pub struct FakeServerCall {
    method: MethodDescriptor,
    record: Arc<Mutex<ServerCallRecord>>,
}

impl FakeServerCall {
    pub fn new(method: MethodDescriptor) -> (Self, Arc<Mutex<ServerCallRecord>>) {
        let record = Arc::new(Mutex::new(ServerCallRecord::default()));
        let call = Self {
            method,
            record: Arc::clone(&record),
        };
        (call, record)
    }
}

impl ServerCall<String> for FakeServerCall {
    fn method_descriptor(&self) -> &MethodDescriptor {
        &self.method
    }

    fn request(&mut self, _num_messages: usize) {}

    fn send_headers(&mut self, _headers: MetadataMap) {
        self.record.lock().unwrap().headers_sent += 1;
    }

    fn send_message(&mut self, message: String) {
        self.record.lock().unwrap().sent.push(message);
    }

    fn close(&mut self, status: Status, trailers: MetadataMap) {
        self.record.lock().unwrap().closes.push((
            status.code(),
            status.message().to_string(),
            trailers,
        ));
    }

    fn is_cancelled(&self) -> bool {
        false
    }
}

/// Hello service: replies once per request, `responses` times for server
/// streaming, and echoes every message for bidi streaming
#[derive(Clone)]
pub struct HelloHandler {
    pub responses: usize,
    pub code: Code,
    pub message: &'static str,
    pub trailers: MetadataMap,
}

impl Default for HelloHandler {
    fn default() -> Self {
        Self {
            responses: 1,
            code: Code::Ok,
            message: "",
            trailers: MetadataMap::new(),
        }
    }
}

impl ServerCallHandler<String, String> for HelloHandler {
    fn start_call(
        &self,
        mut call: BoxServerCall<String>,
        _headers: &MetadataMap,
    ) -> BoxServerCallListener<String> {
        call.request(1);
        Box::new(HelloListener {
            call,
            handler: self.clone(),
            names: Vec::new(),
            closed: false,
        })
    }
}

struct HelloListener {
    call: BoxServerCall<String>,
    handler: HelloHandler,
    names: Vec<String>,
    closed: bool,
}

impl HelloListener {
    fn method_type(&self) -> MethodType {
        self.call.method_descriptor().method_type()
    }

    fn close(&mut self, status: Status, trailers: MetadataMap) {
        if !self.closed {
            self.closed = true;
            self.call.close(status, trailers);
        }
    }
}

impl ServerCallListener<String> for HelloListener {
    fn on_message(&mut self, message: String) {
        if self.method_type() == MethodType::BidiStreaming {
            self.call.send_message(format!("Hello, {message}"));
        } else {
            self.names.push(message);
        }
        self.call.request(1);
    }

    fn on_half_close(&mut self) {
        if self.closed {
            return;
        }
        let replies = match self.method_type() {
            MethodType::Unary | MethodType::ClientStreaming => 1,
            MethodType::ServerStreaming => self.handler.responses,
            MethodType::BidiStreaming => 0,
        };
        let greeting = format!("Hello, {}", self.names.join(" "));
        self.call.send_headers(MetadataMap::new());
        for _ in 0..replies {
            self.call.send_message(greeting.clone());
        }

        let status = Status::new(self.handler.code, self.handler.message);
        let trailers = self.handler.trailers.clone();
        self.close(status, trailers);
    }

    fn on_cancel(&mut self) {
        self.close(Status::cancelled("client cancelled"), MetadataMap::new());
    }
}

/// Inbound event delivered to a server listener
pub enum Inbound {
    Message(&'static str),
    HalfClose,
    Cancel,
}

/// Run one call through `interceptor` into `handler`
pub fn run_server_call<I: ServerInterceptor>(
    interceptor: &I,
    handler: &HelloHandler,
    method: MethodDescriptor,
    headers: &MetadataMap,
    events: &[Inbound],
) -> Arc<Mutex<ServerCallRecord>> {
    let (call, record) = FakeServerCall::new(method);
    let call: BoxServerCall<String> = Box::new(call);
    let mut listener: BoxServerCallListener<String> =
        interceptor.intercept_call(call, headers, handler);

    for event in events {
        match event {
            Inbound::Message(message) => listener.on_message(message.to_string()),
            Inbound::HalfClose => listener.on_half_close(),
            Inbound::Cancel => listener.on_cancel(),
        }
    }
    listener.on_complete();
    record
}

// ==================== Client ====================

/// What the caller's listener observed
#[derive(Default)]
pub struct ClientListenerRecord {
    pub headers: usize,
    pub messages: Vec<String>,
    pub closes: Vec<(Code, String, MetadataMap)>,
}

pub struct RecordingListener {
    record: Arc<Mutex<ClientListenerRecord>>,
}

impl RecordingListener {
    pub fn new() -> (Box<Self>, Arc<Mutex<ClientListenerRecord>>) {
        let record = Arc::new(Mutex::new(ClientListenerRecord::default()));
        let listener = Box::new(Self {
            record: Arc::clone(&record),
        });
        (listener, record)
    }
}

impl ClientCallListener<String> for RecordingListener {
    fn on_headers(&mut self, _headers: &MetadataMap) {
        self.record.lock().unwrap().headers += 1;
    }

    fn on_message(&mut self, message: String) {
        self.record.lock().unwrap().messages.push(message);
    }

    fn on_close(&mut self, status: Status, trailers: MetadataMap) {
        self.record.lock().unwrap().closes.push((
            status.code(),
            status.message().to_string(),
            trailers,
        ));
    }
}

/// Channel whose calls are answered in-process by the Hello service logic
#[derive(Clone)]
pub struct HelloChannel {
    pub service: HelloHandler,
}

impl HelloChannel {
    pub fn new(service: HelloHandler) -> Self {
        Self { service }
    }
}

impl Channel<String, String> for HelloChannel {
    fn new_call(&self, method: &MethodDescriptor) -> BoxClientCall<String, String> {
        Box::new(FakeClientCall {
            method: method.clone(),
            service: self.service.clone(),
            listener: None,
            names: Vec::new(),
            closed: false,
        })
    }
}

struct FakeClientCall {
    method: MethodDescriptor,
    service: HelloHandler,
    listener: Option<BoxClientCallListener<String>>,
    names: Vec<String>,
    closed: bool,
}

impl FakeClientCall {
    fn close(&mut self, status: Status, trailers: MetadataMap) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let Some(listener) = self.listener.as_mut() {
            listener.on_close(status, trailers);
        }
    }
}

impl ClientCall<String, String> for FakeClientCall {
    fn start(&mut self, mut listener: BoxClientCallListener<String>, _headers: MetadataMap) {
        listener.on_headers(&MetadataMap::new());
        self.listener = Some(listener);
    }

    fn request(&mut self, _num_messages: usize) {}

    fn send_message(&mut self, message: String) {
        if self.method.method_type() == MethodType::BidiStreaming {
            if let Some(listener) = self.listener.as_mut() {
                listener.on_message(format!("Hello, {message}"));
            }
        } else {
            self.names.push(message);
        }
    }

    fn half_close(&mut self) {
        if self.closed {
            return;
        }
        let replies = match self.method.method_type() {
            MethodType::Unary | MethodType::ClientStreaming => 1,
            MethodType::ServerStreaming => self.service.responses,
            MethodType::BidiStreaming => 0,
        };
        let greeting = format!("Hello, {}", self.names.join(" "));
        if let Some(listener) = self.listener.as_mut() {
            for _ in 0..replies {
                listener.on_message(greeting.clone());
            }
        }

        let status = Status::new(self.service.code, self.service.message);
        let trailers = self.service.trailers.clone();
        self.close(status, trailers);
    }

    fn cancel(&mut self, message: Option<&str>) {
        let status = Status::cancelled(message.unwrap_or("cancelled"));
        self.close(status, MetadataMap::new());
    }
}
