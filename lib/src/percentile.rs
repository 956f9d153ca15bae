/******************************************************************************
 * Copyright ContinuousC. Licensed under the "Elastic License 2.0".           *
 ******************************************************************************/

use std::{fmt::Display, str::FromStr};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use serde_with::{DeserializeFromStr, SerializeDisplay};

use crate::{
    config::Fields,
    dsl::{BoolQuery, Query, RangeBounds, TermValue},
    filter::{Filter, SynthesizedFilter},
    units::milli_to_nano,
};

pub const PERCENTILE_FILTER_LABEL: &str = "Latency percentile within trace group";

/// Duration range selected for one trace group.
#[derive(Serialize, Deserialize, PartialEq, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct PercentileInput {
    pub trace_group_name: String,
    pub duration_filter: DurationFilter,
}

/// Duration bounds in nanoseconds.
#[derive(Serialize, Deserialize, PartialEq, Default, Clone, Copy, Debug)]
pub struct DurationFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gte: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lte: Option<f64>,
}

/// Side of the 95th latency percentile picked on the box plot.
#[derive(SerializeDisplay, DeserializeFromStr, PartialEq, Eq, Clone, Copy, Debug)]
pub enum PercentileCondition {
    Below,
    AtOrAbove,
}

impl PercentileInput {
    pub fn new<N: Into<String>>(trace_group_name: N, duration_filter: DurationFilter) -> Self {
        Self {
            trace_group_name: trace_group_name.into(),
            duration_filter,
        }
    }

    fn clause(&self, fields: &Fields) -> Query {
        Query::Bool(
            BoolQuery::default()
                .with_must(Query::term(
                    &fields.trace_group,
                    TermValue::explicit(self.trace_group_name.as_str()),
                ))
                .with_must(Query::range(&fields.duration, self.duration_filter.bounds())),
        )
    }
}

impl DurationFilter {
    pub fn for_condition(condition: PercentileCondition, percentile_ms: f64) -> Self {
        let bound = Some(milli_to_nano(percentile_ms));
        match condition {
            PercentileCondition::Below => Self {
                gte: None,
                lte: bound,
            },
            PercentileCondition::AtOrAbove => Self {
                gte: bound,
                lte: None,
            },
        }
    }

    pub fn bounds(&self) -> RangeBounds {
        RangeBounds {
            gte: self.gte.map(number),
            lte: self.lte.map(number),
            ..RangeBounds::default()
        }
    }
}

/// Whole durations are written as integers.
fn number(n: f64) -> Value {
    const MAX_SAFE_INTEGER: f64 = 9007199254740991.0;
    if n.fract() == 0.0 && n.abs() <= MAX_SAFE_INTEGER {
        Value::from(n as i64)
    } else {
        Value::from(n)
    }
}

/// Build a filter matching spans whose duration lies in the selected range
/// for any of the given trace groups.
pub fn percentile_filter(fields: &Fields, inputs: &[PercentileInput], condition: &str) -> Filter {
    let fragment = inputs
        .iter()
        .fold(BoolQuery::default(), |fragment, input| {
            fragment.with_should(input.clause(fields))
        })
        .with_minimum_should_match(1);

    Filter::Synthesized(SynthesizedFilter {
        field: String::from(PERCENTILE_FILTER_LABEL),
        condition: condition.to_string(),
        fragment,
        disabled: false,
    })
}

/// Percentile filter for a box plot selection, from each trace group's
/// 95th percentile latency in milliseconds.
pub fn percentile_condition_filter<'a, I>(
    fields: &Fields,
    condition: PercentileCondition,
    percentiles: I,
) -> Filter
where
    I: IntoIterator<Item = (&'a str, f64)>,
{
    let inputs = percentiles
        .into_iter()
        .map(|(trace_group, percentile_ms)| {
            PercentileInput::new(
                trace_group,
                DurationFilter::for_condition(condition, percentile_ms),
            )
        })
        .collect::<Vec<_>>();
    percentile_filter(fields, &inputs, &condition.to_string())
}

impl Display for PercentileCondition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PercentileCondition::Below => write!(f, "< 95"),
            PercentileCondition::AtOrAbove => write!(f, ">= 95"),
        }
    }
}

impl FromStr for PercentileCondition {
    type Err = InvalidPercentileCondition;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "lte" | "< 95" | "<95" => Ok(Self::Below),
            "gte" | ">= 95" | ">=95" => Ok(Self::AtOrAbove),
            _ => Err(InvalidPercentileCondition),
        }
    }
}

#[derive(thiserror::Error, Debug)]
#[error("expected 'lte' ('< 95') or 'gte' ('>= 95')")]
pub struct InvalidPercentileCondition;
