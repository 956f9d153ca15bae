/******************************************************************************
 * Copyright ContinuousC. Licensed under the "Elastic License 2.0".           *
 ******************************************************************************/

use const_format::concatcp;
use serde::{Deserialize, Serialize};

use crate::dsl::MinimumShouldMatch;

pub const INDEX: &str = "apm-spans-1";

pub const START_TIME: &str = "startTime";
pub const END_TIME: &str = "endTime";
pub const TRACE_GROUP: &str = "name";
pub const TRACE_GROUP_KEYWORD: &str = concatcp!(TRACE_GROUP, ".value.keyword");
pub const DURATION: &str = "durationInNanos";
pub const SERVICE_NAME: &str = "resource.attributes.service.name";
pub const PARENT_SPAN_ID: &str = "parentSpanId";
pub const STATUS_CODE: &str = "status.code";

#[derive(Serialize, Deserialize, PartialEq, Eq, Clone, Debug)]
#[serde(default)]
pub struct QueryConfig {
    pub index: String,
    pub fields: Fields,
    pub minimum_should_match: ShouldMatchMerge,
}

/// Names of the span document fields the query builders refer to.
#[derive(Serialize, Deserialize, PartialEq, Eq, Clone, Debug)]
#[serde(default)]
pub struct Fields {
    pub start_time: String,
    pub end_time: String,
    pub trace_group: String,
    pub trace_group_keyword: String,
    pub duration: String,
    pub service_name: String,
    pub parent_span_id: String,
    pub status_code: String,
}

/// How `minimum_should_match` is combined when more than one
/// precomputed fragment contributes `should` clauses.
#[derive(Serialize, Deserialize, PartialEq, Eq, Default, Clone, Copy, Debug)]
#[serde(rename_all = "lowercase")]
pub enum ShouldMatchMerge {
    /// The last fragment in filter order wins.
    #[default]
    Last,
    Max,
}

impl ShouldMatchMerge {
    /// Only clause counts are compared; otherwise the later value wins.
    pub fn merge(
        self,
        current: Option<MinimumShouldMatch>,
        next: Option<MinimumShouldMatch>,
    ) -> Option<MinimumShouldMatch> {
        match (self, current, next) {
            (
                ShouldMatchMerge::Max,
                Some(MinimumShouldMatch::Count(a)),
                Some(MinimumShouldMatch::Count(b)),
            ) => Some(MinimumShouldMatch::Count(a.max(b))),
            (ShouldMatchMerge::Max, current, None) => current,
            (_, _, next) => next,
        }
    }
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            index: String::from(INDEX),
            fields: Fields::default(),
            minimum_should_match: ShouldMatchMerge::default(),
        }
    }
}

impl Default for Fields {
    fn default() -> Self {
        Self {
            start_time: String::from(START_TIME),
            end_time: String::from(END_TIME),
            trace_group: String::from(TRACE_GROUP),
            trace_group_keyword: String::from(TRACE_GROUP_KEYWORD),
            duration: String::from(DURATION),
            service_name: String::from(SERVICE_NAME),
            parent_span_id: String::from(PARENT_SPAN_ID),
            status_code: String::from(STATUS_CODE),
        }
    }
}
