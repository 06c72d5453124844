//! Static description of a gRPC method and its status-code labels

use std::fmt;
use tonic::Code;

/// Streaming shape of a gRPC method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MethodType {
    Unary,
    ClientStreaming,
    ServerStreaming,
    BidiStreaming,
}

impl MethodType {
    /// Label value used for the `grpc_type` label
    pub fn as_str(&self) -> &'static str {
        match self {
            MethodType::Unary => "UNARY",
            MethodType::ClientStreaming => "CLIENT_STREAMING",
            MethodType::ServerStreaming => "SERVER_STREAMING",
            MethodType::BidiStreaming => "BIDI_STREAMING",
        }
    }

    /// Whether the client sends a stream of request messages
    pub fn streams_requests(&self) -> bool {
        matches!(self, MethodType::ClientStreaming | MethodType::BidiStreaming)
    }

    /// Whether the server sends a stream of response messages
    pub fn streams_responses(&self) -> bool {
        matches!(self, MethodType::ServerStreaming | MethodType::BidiStreaming)
    }
}

impl fmt::Display for MethodType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifies one RPC method: service, method and call type.
///
/// The service and method names become the `grpc_service` and `grpc_method`
/// labels verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodDescriptor {
    service_name: String,
    method_name: String,
    method_type: MethodType,
}

impl MethodDescriptor {
    pub fn new(
        service_name: impl Into<String>,
        method_name: impl Into<String>,
        method_type: MethodType,
    ) -> Self {
        Self {
            service_name: service_name.into(),
            method_name: method_name.into(),
            method_type,
        }
    }

    /// Build a descriptor from a full gRPC method name
    ///
    /// Accepts `pkg.Service/Method` with or without the leading `/` used in
    /// HTTP/2 paths. A name without a `/` is treated as a method with an empty
    /// service name.
    pub fn from_full_name(full_name: &str, method_type: MethodType) -> Self {
        let trimmed = full_name.strip_prefix('/').unwrap_or(full_name);
        match trimmed.rsplit_once('/') {
            Some((service, method)) => Self::new(service, method, method_type),
            None => Self::new("", trimmed, method_type),
        }
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    pub fn method_name(&self) -> &str {
        &self.method_name
    }

    pub fn method_type(&self) -> MethodType {
        self.method_type
    }

    /// `service/method`
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.service_name, self.method_name)
    }
}

/// Canonical gRPC name of a status code, used as the `code`/`grpc_code` label
pub fn code_label(code: Code) -> &'static str {
    match code {
        Code::Ok => "OK",
        Code::Cancelled => "CANCELLED",
        Code::Unknown => "UNKNOWN",
        Code::InvalidArgument => "INVALID_ARGUMENT",
        Code::DeadlineExceeded => "DEADLINE_EXCEEDED",
        Code::NotFound => "NOT_FOUND",
        Code::AlreadyExists => "ALREADY_EXISTS",
        Code::PermissionDenied => "PERMISSION_DENIED",
        Code::ResourceExhausted => "RESOURCE_EXHAUSTED",
        Code::FailedPrecondition => "FAILED_PRECONDITION",
        Code::Aborted => "ABORTED",
        Code::OutOfRange => "OUT_OF_RANGE",
        Code::Unimplemented => "UNIMPLEMENTED",
        Code::Internal => "INTERNAL",
        Code::Unavailable => "UNAVAILABLE",
        Code::DataLoss => "DATA_LOSS",
        Code::Unauthenticated => "UNAUTHENTICATED",
    }
}
