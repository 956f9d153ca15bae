/******************************************************************************
 * Copyright ContinuousC. Licensed under the "Elastic License 2.0".           *
 ******************************************************************************/

mod dashboard;
mod services;

use const_format::concatcp;

use crate::{
    config::Fields,
    dsl::{Aggregation, AggregationKind, ScriptedMetric},
};

pub use dashboard::{dashboard_error_rate_query, dashboard_query};
pub use services::services_query;

pub const TRACE_GROUP: &str = "trace_group";
pub const TOTAL_LATENCY: &str = "total_latency";
pub const AVERAGE_LATENCY: &str = "average_latency";
pub const ERROR_COUNT: &str = "error_count";
pub const ERROR_RATE: &str = "error_rate";

const COUNT: &str = "_count";

/// Sum of span latencies (end minus start, in milliseconds) per bucket.
fn total_latency(fields: &Fields) -> Aggregation {
    Aggregation::new(AggregationKind::ScriptedMetric(ScriptedMetric {
        init_script: String::from("state.latencies = [];"),
        map_script: format!(
            "state.latencies.add(doc['{}'].value.toInstant().toEpochMilli() \
             - doc['{}'].value.toInstant().toEpochMilli());",
            fields.end_time, fields.start_time
        ),
        combine_script: String::from(
            "double sumLatency = 0; \
             for (t in state.latencies) { sumLatency += t; } \
             return sumLatency;",
        ),
        reduce_script: String::from(
            "double sumLatency = 0; \
             for (a in states) { if (a != null) { sumLatency += a; } } \
             return sumLatency;",
        ),
    }))
}

fn average_latency() -> Aggregation {
    Aggregation::bucket_script(
        [
            ("count", COUNT),
            ("latency", concatcp!(TOTAL_LATENCY, ".value")),
        ],
        "params.latency / params.count",
    )
}

/// Percentage of spans in the bucket counted by the `error_count`
/// sub-aggregation.
fn error_rate() -> Aggregation {
    Aggregation::bucket_script(
        [
            ("total", COUNT),
            ("errors", concatcp!(ERROR_COUNT, "._count")),
        ],
        "params.errors / params.total * 100",
    )
}
