//! Metrics definitions for the classroom CLI.

use shared::metrics_defs::{MetricDef, MetricType, describe_all};

pub const COMMANDS_RUN: MetricDef = MetricDef {
    name: "classroom.commands",
    metric_type: MetricType::Counter,
    description: "Number of CLI commands run, tagged with command and outcome",
};

pub const COMMAND_DURATION: MetricDef = MetricDef {
    name: "classroom.command.duration",
    metric_type: MetricType::Histogram,
    description: "Time taken to run a CLI command in seconds",
};

pub const ALL_METRICS: &[MetricDef] = &[COMMANDS_RUN, COMMAND_DURATION];

/// Describes the metrics of every crate in the workspace.
pub fn describe_workspace_metrics() {
    for defs in [
        ALL_METRICS,
        fanout::metrics_defs::ALL_METRICS,
        docstore::metrics_defs::ALL_METRICS,
        session::metrics_defs::ALL_METRICS,
    ] {
        describe_all(defs);
    }
}
