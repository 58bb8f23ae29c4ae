//! Prometheus middleware for the match server's HTTP/WS surface.

use actix_web_prom::{PrometheusMetrics, PrometheusMetricsBuilder};
use once_cell::sync::Lazy;

/// Global Prometheus handle; the `skirmish` namespace prefixes every
/// exported series.
pub static METRICS: Lazy<PrometheusMetrics> = Lazy::new(|| {
    PrometheusMetricsBuilder::new("skirmish")
        .endpoint("/metrics")
        .build()
        .expect("metrics builder")
});
