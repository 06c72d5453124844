//! Label-vector construction
//!
//! Every metric family is registered with `[grpc_type, grpc_service,
//! grpc_method]` followed by kind-specific labels and the sanitized custom
//! header labels. The helpers here build the matching value vectors in that
//! exact order.

use crate::error::{ConfigurationError, Result};
use crate::method::MethodDescriptor;
use prometheus::core::{MetricVec, MetricVecBuilder};
use tonic::metadata::{Ascii, MetadataKey, MetadataMap};
use tracing::debug;

/// Label names shared by every metric family
pub const STANDARD_LABELS: [&str; 3] = ["grpc_type", "grpc_service", "grpc_method"];

/// Deprecated status-code label kept for existing dashboards
pub const LEGACY_CODE_LABEL: &str = "code";

/// Status-code label
pub const CODE_LABEL: &str = "grpc_code";

/// Concatenate two label lists, first list first
pub fn as_array<A, B>(first: &[A], second: &[B]) -> Vec<String>
where
    A: AsRef<str>,
    B: AsRef<str>,
{
    first
        .iter()
        .map(|label| label.as_ref().to_string())
        .chain(second.iter().map(|label| label.as_ref().to_string()))
        .collect()
}

/// Convert header names into typed metadata keys
///
/// gRPC metadata keys are case-insensitive, so names are lower-cased. Binary
/// (`-bin`) headers and names that are not valid header names are rejected.
pub fn metadata_keys<S: AsRef<str>>(header_names: &[S]) -> Result<Vec<MetadataKey<Ascii>>> {
    header_names
        .iter()
        .map(|name| {
            let name = name.as_ref();
            MetadataKey::<Ascii>::from_bytes(name.to_ascii_lowercase().as_bytes()).map_err(|_| {
                ConfigurationError::InvalidLabelHeader {
                    name: name.to_string(),
                }
            })
        })
        .collect()
}

/// Custom label values for one call, in key order.
///
/// A key absent from `metadata` yields `""`, so the result always has
/// `keys.len()` entries.
pub fn custom_labels(metadata: &MetadataMap, keys: &[MetadataKey<Ascii>]) -> Vec<String> {
    keys.iter()
        .map(|key| match metadata.get(key) {
            Some(value) => match value.to_str() {
                Ok(value) => value.to_string(),
                Err(_) => {
                    debug!(
                        header = key.as_str(),
                        "custom label header is not visible ASCII, using empty value"
                    );
                    String::new()
                }
            },
            None => String::new(),
        })
        .collect()
}

/// Resolve the series for `[type, service, method] ++ extra` on `family`
pub fn add_labels<T>(family: &MetricVec<T>, extra: &[String], method: &MethodDescriptor) -> T::M
where
    T: MetricVecBuilder,
{
    let mut values: Vec<&str> = Vec::with_capacity(STANDARD_LABELS.len() + extra.len());
    values.push(method.method_type().as_str());
    values.push(method.service_name());
    values.push(method.method_name());
    values.extend(extra.iter().map(String::as_str));
    family.with_label_values(&values)
}

/// Reject label name lists containing the same name twice
pub(crate) fn ensure_unique(label_names: &[String]) -> Result<()> {
    let mut seen = std::collections::HashSet::with_capacity(label_names.len());
    for label in label_names {
        if !seen.insert(label.as_str()) {
            return Err(ConfigurationError::DuplicateLabelName {
                label: label.clone(),
            });
        }
    }
    Ok(())
}
