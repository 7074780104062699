//! Metrics definitions for the fan-out merger.

use shared::metrics_defs::{MetricDef, MetricType};

pub const FANOUT_BATCHES_DISPATCHED: MetricDef = MetricDef {
    name: "fanout.batches.dispatched",
    metric_type: MetricType::Counter,
    description: "Number of bounded batch queries dispatched",
};

pub const FANOUT_BATCHES_FAILED: MetricDef = MetricDef {
    name: "fanout.batches.failed",
    metric_type: MetricType::Counter,
    description: "Number of batch queries that failed or panicked",
};

pub const FANOUT_BATCHES_IN_FLIGHT: MetricDef = MetricDef {
    name: "fanout.batches.in_flight",
    metric_type: MetricType::Gauge,
    description: "Number of batch queries currently running",
};

pub const FANOUT_DURATION: MetricDef = MetricDef {
    name: "fanout.duration",
    metric_type: MetricType::Histogram,
    description: "Time to complete a fan-out call in seconds",
};

pub const FANOUT_RECORDS: MetricDef = MetricDef {
    name: "fanout.records",
    metric_type: MetricType::Histogram,
    description: "Number of distinct records returned by a fan-out call",
};

pub const ALL_METRICS: &[MetricDef] = &[
    FANOUT_BATCHES_DISPATCHED,
    FANOUT_BATCHES_FAILED,
    FANOUT_BATCHES_IN_FLIGHT,
    FANOUT_DURATION,
    FANOUT_RECORDS,
];
