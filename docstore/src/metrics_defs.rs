//! Metrics definitions for document store access.

use shared::metrics_defs::{MetricDef, MetricType};

pub const STORE_REQUESTS: MetricDef = MetricDef {
    name: "docstore.requests",
    metric_type: MetricType::Counter,
    description: "Number of requests sent to the document store, by operation",
};

pub const STORE_ERRORS: MetricDef = MetricDef {
    name: "docstore.errors",
    metric_type: MetricType::Counter,
    description: "Number of document store requests that failed, by operation",
};

pub const STORE_REQUEST_DURATION: MetricDef = MetricDef {
    name: "docstore.request.duration",
    metric_type: MetricType::Histogram,
    description: "Time for a document store request to complete in seconds",
};

pub const ALL_METRICS: &[MetricDef] = &[STORE_REQUESTS, STORE_ERRORS, STORE_REQUEST_DURATION];
