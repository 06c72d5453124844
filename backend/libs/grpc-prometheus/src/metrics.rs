//! Prometheus metric families for gRPC monitoring
//!
//! Both sides register the same shape of families: a started counter, a
//! terminal counter (handled on the server, completed on the client), two
//! stream message counters and an optional latency histogram. Label names
//! are fixed at registration; the recording methods build value vectors in
//! the same order.

use crate::config::Configuration;
use crate::error::{ConfigurationError, Result};
use crate::labels::{
    add_labels, as_array, custom_labels, ensure_unique, metadata_keys, CODE_LABEL,
    LEGACY_CODE_LABEL, STANDARD_LABELS,
};
use crate::method::{code_label, MethodDescriptor};
use prometheus::{CounterVec, HistogramOpts, HistogramVec, Opts, Registry};
use tonic::metadata::{Ascii, MetadataKey, MetadataMap};
use tonic::Code;
use tracing::{error, info};

/// Name and help text of one metric family
pub(crate) struct MetricDef {
    pub name: &'static str,
    pub help: &'static str,
}

/// Names of the five families registered for one side
pub(crate) struct FamilyDefs {
    pub side: &'static str,
    pub started: MetricDef,
    pub terminal: MetricDef,
    pub msg_received: MetricDef,
    pub msg_sent: MetricDef,
    pub latency: MetricDef,
}

pub(crate) const SERVER_FAMILIES: FamilyDefs = FamilyDefs {
    side: "server",
    started: MetricDef {
        name: "grpc_server_started",
        help: "Total number of RPCs started on the server.",
    },
    terminal: MetricDef {
        name: "grpc_server_handled",
        help: "Total number of RPCs completed on the server, regardless of success or failure.",
    },
    msg_received: MetricDef {
        name: "grpc_server_msg_received",
        help: "Total number of stream messages received from the client.",
    },
    msg_sent: MetricDef {
        name: "grpc_server_msg_sent",
        help: "Total number of stream messages sent by the server.",
    },
    latency: MetricDef {
        name: "grpc_server_handled_latency_seconds",
        help: "Histogram of response latency (seconds) of gRPC that had been application-level handled by the server.",
    },
};

pub(crate) const CLIENT_FAMILIES: FamilyDefs = FamilyDefs {
    side: "client",
    started: MetricDef {
        name: "grpc_client_started",
        help: "Total number of RPCs started on the client.",
    },
    terminal: MetricDef {
        name: "grpc_client_completed",
        help: "Total number of RPCs completed on the client, regardless of success or failure.",
    },
    msg_received: MetricDef {
        name: "grpc_client_msg_received",
        help: "Total number of stream messages received from the server.",
    },
    msg_sent: MetricDef {
        name: "grpc_client_msg_sent",
        help: "Total number of stream messages sent by the client.",
    },
    latency: MetricDef {
        name: "grpc_client_completed_latency_seconds",
        help: "Histogram of rpc response latency (in seconds) for completed rpcs.",
    },
};

/// Latency histogram, present only when histograms are enabled
#[derive(Clone)]
pub(crate) enum LatencyHistogram {
    Disabled,
    Enabled {
        histogram: HistogramVec,
        with_code_label: bool,
    },
}

/// Registered families plus the custom-label lookup keys
pub(crate) struct MetricFamilies {
    label_header_keys: Vec<MetadataKey<Ascii>>,
    legacy_code_label: bool,
    started: CounterVec,
    terminal: CounterVec,
    msg_received: CounterVec,
    msg_sent: CounterVec,
    latency: LatencyHistogram,
}

impl MetricFamilies {
    /// Register all families of `defs` in the configured registry.
    ///
    /// Fails if any of them already exists in that registry.
    pub fn register(configuration: &Configuration, defs: &FamilyDefs) -> Result<Self> {
        let registry = configuration.registry();
        let label_header_keys = metadata_keys(configuration.label_headers())?;
        let custom = configuration.sanitized_label_headers();

        let request_labels = as_array(&STANDARD_LABELS, &custom);

        let mut code_labels = Vec::with_capacity(2);
        if configuration.legacy_code_label() {
            code_labels.push(LEGACY_CODE_LABEL);
        }
        code_labels.push(CODE_LABEL);
        let response_labels = as_array(&as_array(&STANDARD_LABELS, &code_labels), &custom);

        let started = register_counter(registry, &defs.started, &request_labels)?;
        let terminal = register_counter(registry, &defs.terminal, &response_labels)?;
        let msg_received = register_counter(registry, &defs.msg_received, &request_labels)?;
        let msg_sent = register_counter(registry, &defs.msg_sent, &request_labels)?;

        let latency = if configuration.include_latency_histograms() {
            let with_code_label = configuration.add_code_label_to_histograms();
            let mut labels = request_labels.clone();
            if with_code_label {
                labels.push(CODE_LABEL.to_string());
            }
            let histogram = register_histogram(
                registry,
                &defs.latency,
                &labels,
                configuration.latency_buckets(),
            )?;
            LatencyHistogram::Enabled {
                histogram,
                with_code_label,
            }
        } else {
            LatencyHistogram::Disabled
        };

        info!(
            side = defs.side,
            latency_histograms = configuration.include_latency_histograms(),
            label_headers = ?configuration.label_headers(),
            legacy_code_label = configuration.legacy_code_label(),
            "Registered gRPC metric families"
        );

        Ok(Self {
            label_header_keys,
            legacy_code_label: configuration.legacy_code_label(),
            started,
            terminal,
            msg_received,
            msg_sent,
            latency,
        })
    }

    pub fn record_started(&self, method: &MethodDescriptor, metadata: &MetadataMap) {
        add_labels(&self.started, &self.custom_labels(metadata), method).inc();
    }

    pub fn record_msg_sent(&self, method: &MethodDescriptor, metadata: &MetadataMap) {
        add_labels(&self.msg_sent, &self.custom_labels(metadata), method).inc();
    }

    pub fn record_msg_received(&self, method: &MethodDescriptor, metadata: &MetadataMap) {
        add_labels(&self.msg_received, &self.custom_labels(metadata), method).inc();
    }

    /// `[type, service, method, code(, code)] ++ custom`
    pub fn record_terminal(&self, method: &MethodDescriptor, code: Code, metadata: &MetadataMap) {
        let code = code_label(code);
        let mut labels = Vec::with_capacity(2 + self.label_header_keys.len());
        if self.legacy_code_label {
            labels.push(code.to_string());
        }
        labels.push(code.to_string());
        labels.extend(self.custom_labels(metadata));
        add_labels(&self.terminal, &labels, method).inc();
    }

    /// `[type, service, method] ++ custom (++ code)`; no-op when disabled
    pub fn record_latency(
        &self,
        method: &MethodDescriptor,
        latency_secs: f64,
        metadata: &MetadataMap,
        code: Code,
    ) {
        let LatencyHistogram::Enabled {
            histogram,
            with_code_label,
        } = &self.latency
        else {
            return;
        };

        let mut labels = self.custom_labels(metadata);
        if *with_code_label {
            labels.push(code_label(code).to_string());
        }
        add_labels(histogram, &labels, method).observe(latency_secs);
    }

    pub fn latency_enabled(&self) -> bool {
        matches!(self.latency, LatencyHistogram::Enabled { .. })
    }

    fn custom_labels(&self, metadata: &MetadataMap) -> Vec<String> {
        custom_labels(metadata, &self.label_header_keys)
    }
}

fn register_counter(
    registry: &Registry,
    def: &MetricDef,
    label_names: &[String],
) -> Result<CounterVec> {
    ensure_unique(label_names)?;
    let names: Vec<&str> = label_names.iter().map(String::as_str).collect();

    let counter = CounterVec::new(Opts::new(def.name, def.help), &names)
        .map_err(|e| ConfigurationError::metric(def.name, e))?;
    register(registry, def.name, Box::new(counter.clone()))?;

    Ok(counter)
}

fn register_histogram(
    registry: &Registry,
    def: &MetricDef,
    label_names: &[String],
    buckets: &[f64],
) -> Result<HistogramVec> {
    ensure_unique(label_names)?;
    let names: Vec<&str> = label_names.iter().map(String::as_str).collect();

    let opts = HistogramOpts::new(def.name, def.help).buckets(buckets.to_vec());
    let histogram =
        HistogramVec::new(opts, &names).map_err(|e| ConfigurationError::metric(def.name, e))?;
    register(registry, def.name, Box::new(histogram.clone()))?;

    Ok(histogram)
}

fn register(
    registry: &Registry,
    name: &str,
    collector: Box<dyn prometheus::core::Collector>,
) -> Result<()> {
    registry.register(collector).map_err(|e| {
        error!(metric = name, error = %e, "Failed to register gRPC metric family");
        ConfigurationError::metric(name, e)
    })
}
