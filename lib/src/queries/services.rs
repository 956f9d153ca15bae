/******************************************************************************
 * Copyright ContinuousC. Licensed under the "Elastic License 2.0".           *
 ******************************************************************************/

use std::collections::BTreeMap;

use tap::Pipe;

use crate::{
    config::QueryConfig,
    dsl::{Aggregation, BoolQuery, Query, SearchBody},
};

use super::{
    average_latency, error_rate, total_latency, AVERAGE_LATENCY, ERROR_COUNT, ERROR_RATE,
    TOTAL_LATENCY, TRACE_GROUP,
};

/// Latency and error statistics per service, optionally restricted to a
/// single service.
pub fn services_query(config: &QueryConfig, service_name: Option<&str>) -> SearchBody {
    let fields = &config.fields;
    SearchBody {
        size: Some(0),
        query: BoolQuery::default()
            .pipe(|query| match service_name.filter(|name| !name.is_empty()) {
                Some(name) => query.with_must(Query::term(&fields.service_name, name)),
                None => query,
            })
            .pipe(Query::Bool),
        aggs: BTreeMap::from([(
            String::from(TRACE_GROUP),
            Aggregation::terms(&fields.service_name)
                .sub(
                    ERROR_COUNT,
                    Aggregation::filter(Query::exists(&fields.status_code)),
                )
                .sub(TOTAL_LATENCY, total_latency(fields))
                .sub(ERROR_RATE, error_rate())
                .sub(AVERAGE_LATENCY, average_latency()),
        )]),
    }
}
