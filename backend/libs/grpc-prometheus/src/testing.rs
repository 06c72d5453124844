//! Registry inspection helpers for tests
//!
//! Lookups go through `Registry::gather`, which omits families without any
//! series; an absent family therefore reads as zero series and zero value.

use prometheus::proto::{Metric, MetricFamily};
use prometheus::{Encoder, Registry, TextEncoder};

/// Find the gathered family called `name`, if it has at least one series
pub fn find_recorded_metric(registry: &Registry, name: &str) -> Option<MetricFamily> {
    registry
        .gather()
        .into_iter()
        .find(|family| family.get_name() == name)
}

/// Number of label tuples recorded for `name`
pub fn series_count(registry: &Registry, name: &str) -> usize {
    find_recorded_metric(registry, name)
        .map(|family| family.get_metric().len())
        .unwrap_or(0)
}

/// Counter value of the series whose labels are exactly `labels`, or 0.0
///
/// Label order does not matter.
pub fn sample_value(registry: &Registry, name: &str, labels: &[(&str, &str)]) -> f64 {
    find_series(registry, name, labels)
        .map(|metric| metric.get_counter().get_value())
        .unwrap_or(0.0)
}

/// Observation count of the histogram series whose labels are exactly `labels`
pub fn histogram_sample_count(registry: &Registry, name: &str, labels: &[(&str, &str)]) -> u64 {
    find_series(registry, name, labels)
        .map(|metric| metric.get_histogram().get_sample_count())
        .unwrap_or(0)
}

/// Observation sum of the histogram series whose labels are exactly `labels`
pub fn histogram_sample_sum(registry: &Registry, name: &str, labels: &[(&str, &str)]) -> f64 {
    find_series(registry, name, labels)
        .map(|metric| metric.get_histogram().get_sample_sum())
        .unwrap_or(0.0)
}

/// Count the exposition lines of `metric` named `sample_name`
///
/// Works on the text format, so a histogram reports one `<name>_bucket`
/// sample per configured bound plus `+Inf`.
pub fn count_samples(registry: &Registry, metric: &str, sample_name: &str) -> usize {
    let Some(family) = find_recorded_metric(registry, metric) else {
        return 0;
    };

    let mut buffer = Vec::new();
    if TextEncoder::new().encode(&[family], &mut buffer).is_err() {
        return 0;
    }

    String::from_utf8_lossy(&buffer)
        .lines()
        .filter(|line| {
            line.strip_prefix(sample_name)
                .map(|rest| rest.starts_with('{') || rest.starts_with(' '))
                .unwrap_or(false)
        })
        .count()
}

fn find_series(registry: &Registry, name: &str, labels: &[(&str, &str)]) -> Option<Metric> {
    let family = find_recorded_metric(registry, name)?;
    family
        .get_metric()
        .iter()
        .find(|metric| has_exact_labels(metric, labels))
        .cloned()
}

fn has_exact_labels(metric: &Metric, labels: &[(&str, &str)]) -> bool {
    let pairs = metric.get_label();
    pairs.len() == labels.len()
        && labels.iter().all(|(name, value)| {
            pairs
                .iter()
                .any(|pair| pair.get_name() == *name && pair.get_value() == *value)
        })
}
