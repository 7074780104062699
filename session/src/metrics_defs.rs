//! Metrics definitions for sign-in and the role gate.

use shared::metrics_defs::{MetricDef, MetricType};

pub const SIGN_IN_SUCCESS: MetricDef = MetricDef {
    name: "session.sign_in.success",
    metric_type: MetricType::Counter,
    description: "Number of sign-ins that resolved a profile",
};

pub const SIGN_IN_FAILURE: MetricDef = MetricDef {
    name: "session.sign_in.failure",
    metric_type: MetricType::Counter,
    description: "Number of sign-ins rejected or left without a profile",
};

pub const GATE_DENIED: MetricDef = MetricDef {
    name: "session.gate.denied",
    metric_type: MetricType::Counter,
    description: "Number of screen visits redirected by the role gate",
};

pub const ALL_METRICS: &[MetricDef] = &[SIGN_IN_SUCCESS, SIGN_IN_FAILURE, GATE_DENIED];
