//! gRPC Prometheus interceptors
//!
//! Server and client interceptors that record Prometheus metrics for every
//! call passing through them. Each side tracks:
//! - Calls started
//! - Calls handled (server) or completed (client), by status code
//! - Stream messages received and sent
//! - Optionally, a latency histogram
//!
//! Metric families are registered once per configuration and registry; every
//! series carries the `grpc_type`, `grpc_service` and `grpc_method` labels,
//! plus one label per configured request header.
//!
//! Usage:
//! ```ignore
//! use grpc_prometheus::{Configuration, MonitoringServerInterceptor};
//!
//! let configuration = Configuration::all_metrics()
//!     .with_registry(registry.clone())
//!     .with_label_headers(["x-tenant"]);
//! let interceptor = MonitoringServerInterceptor::create(configuration)?;
//!
//! // for each incoming call
//! let listener = interceptor.intercept_call(call, &headers, &handler);
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod labels;
pub mod method;
mod metrics;
pub mod rpc;
pub mod server;
pub mod testing;

pub use client::{
    ClientMetrics, ClientMetricsFactory, MonitoringClientCall, MonitoringClientCallListener,
    MonitoringClientInterceptor,
};
pub use config::{Configuration, MetricsSettings, DEFAULT_LATENCY_BUCKETS};
pub use error::{ConfigurationError, Result};
pub use method::{code_label, MethodDescriptor, MethodType};
pub use rpc::{
    BoxClientCall, BoxClientCallListener, BoxServerCall, BoxServerCallListener, Channel,
    ClientCall, ClientCallListener, ClientInterceptor, Clock, ServerCall, ServerCallHandler,
    ServerCallListener, ServerInterceptor, SystemClock,
};
pub use server::{
    MonitoringServerCall, MonitoringServerCallListener, MonitoringServerInterceptor,
    ServerMetrics, ServerMetricsFactory,
};
