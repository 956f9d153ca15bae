/******************************************************************************
 * Copyright ContinuousC. Licensed under the "Elastic License 2.0".           *
 ******************************************************************************/

use std::collections::BTreeMap;

use serde_json::Value;

use crate::{
    config::QueryConfig,
    dsl::{Aggregation, BoolQuery, IndexedSearch, Query, RangeBounds, SearchBody},
};

use super::{
    average_latency, error_rate, total_latency, AVERAGE_LATENCY, ERROR_COUNT, ERROR_RATE,
    TOTAL_LATENCY, TRACE_GROUP,
};

/// Total and average latency of root spans, per trace group.
pub fn dashboard_query(config: &QueryConfig) -> IndexedSearch {
    let fields = &config.fields;
    IndexedSearch {
        index: config.index.clone(),
        size: 0,
        query: SearchBody {
            size: None,
            query: Query::Bool(
                BoolQuery::default().with_must_not(Query::exists(&fields.parent_span_id)),
            ),
            aggs: BTreeMap::from([(
                String::from(TRACE_GROUP),
                Aggregation::terms(&fields.trace_group_keyword)
                    .sub(TOTAL_LATENCY, total_latency(fields))
                    .sub(AVERAGE_LATENCY, average_latency()),
            )]),
        },
    }
}

/// Error count and rate for a single trace group.
pub fn dashboard_error_rate_query(config: &QueryConfig, trace_group_name: &str) -> IndexedSearch {
    let fields = &config.fields;
    IndexedSearch {
        index: config.index.clone(),
        size: 0,
        query: SearchBody {
            size: None,
            query: Query::Bool(
                BoolQuery::default()
                    .with_must(Query::term(&fields.trace_group_keyword, trace_group_name)),
            ),
            aggs: BTreeMap::from([(
                String::from(TRACE_GROUP),
                Aggregation::terms(&fields.trace_group_keyword)
                    .sub(
                        ERROR_COUNT,
                        Aggregation::filter(Query::range(
                            &fields.status_code,
                            RangeBounds {
                                gt: Some(Value::from("0")),
                                ..RangeBounds::default()
                            },
                        )),
                    )
                    .sub(ERROR_RATE, error_rate()),
            )]),
        },
    }
}
