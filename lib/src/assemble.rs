/******************************************************************************
 * Copyright ContinuousC. Licensed under the "Elastic License 2.0".           *
 ******************************************************************************/

use crate::{
    config::QueryConfig,
    dsl::{BoolQuery, Query, SearchQuery},
    filter::{Branch, CompileError, Compiled, Filter},
    time_range::TimeRange,
};

/// Combine the time range, free-text query and enabled filters into a
/// single bool query. The time range clause is always the first `must`
/// clause.
pub fn filters_to_query(
    config: &QueryConfig,
    filters: &[Filter],
    query: &str,
    time_range: &TimeRange,
) -> Result<SearchQuery, CompileError> {
    let mut bool_query =
        BoolQuery::default().with_must(time_range.clause(&config.fields.start_time));

    if !query.is_empty() {
        bool_query.must.push(Query::query_string(query));
    }

    for filter in filters {
        match filter.compile()? {
            Compiled::Skip => {}
            Compiled::Merge(fragment) => {
                bool_query.should.extend(fragment.should.iter().cloned());
                let merged = config.minimum_should_match.merge(
                    bool_query.minimum_should_match.clone(),
                    fragment.minimum_should_match.clone(),
                );
                if bool_query.minimum_should_match.is_some()
                    && bool_query.minimum_should_match != merged
                {
                    log::debug!(
                        "'{}' replaces minimum_should_match {:?} with {merged:?}",
                        filter.field(),
                        bool_query.minimum_should_match
                    );
                }
                bool_query.minimum_should_match = merged;
            }
            Compiled::Clause {
                branch: Branch::Must,
                clause,
            } => bool_query.must.push(clause),
            Compiled::Clause {
                branch: Branch::MustNot,
                clause,
            } => bool_query.must_not.push(clause),
        }
    }

    Ok(SearchQuery {
        query: Query::Bool(bool_query),
    })
}

#[cfg(test)]
mod test {
    use serde_json::json;

    use super::filters_to_query;
    use crate::{
        config::{QueryConfig, ShouldMatchMerge},
        dsl::{BoolQuery, MinimumShouldMatch, Query},
        filter::{AuthoredFilter, CompileError, Filter, Operator, SynthesizedFilter},
        percentile::{percentile_filter, DurationFilter, PercentileInput},
        time_range::TimeRange,
    };

    fn time_range() -> TimeRange {
        TimeRange::new("now-15m", "now")
    }

    fn fragment_filter(name: &str, should: &[&str], minimum_should_match: i64) -> Filter {
        Filter::Synthesized(SynthesizedFilter {
            field: name.to_string(),
            condition: String::new(),
            fragment: should
                .iter()
                .fold(BoolQuery::default(), |fragment, field| {
                    fragment.with_should(Query::exists(*field))
                })
                .with_minimum_should_match(minimum_should_match),
            disabled: false,
        })
    }

    #[test]
    fn time_range_only() {
        let query = filters_to_query(&QueryConfig::default(), &[], "", &time_range()).unwrap();
        assert_eq!(
            serde_json::to_value(&query).unwrap(),
            json!({
                "query": {
                    "bool": {
                        "must": [
                            { "range": { "startTime": { "gte": "now-15m", "lte": "now" } } }
                        ],
                        "filter": [],
                        "should": [],
                        "must_not": []
                    }
                }
            })
        );
    }

    #[test]
    fn full_query() {
        let filters = [
            Filter::from(AuthoredFilter::new("serviceName", Operator::Is).value("frontend")),
            Filter::from(AuthoredFilter::new("status.code", Operator::Exists).inverted()),
            Filter::from(
                AuthoredFilter::new("durationInNanos", Operator::IsBetween)
                    .range("1000", "\u{221E}")
                    .disabled(),
            ),
            percentile_filter(
                &QueryConfig::default().fields,
                &[PercentileInput::new(
                    "HTTP GET /dispatch",
                    DurationFilter {
                        gte: None,
                        lte: Some(2000000.0),
                    },
                )],
                "< 95",
            ),
        ];
        let query = filters_to_query(
            &QueryConfig::default(),
            &filters,
            "error AND timeout",
            &time_range(),
        )
        .unwrap();

        assert_eq!(
            serde_json::to_value(&query).unwrap(),
            json!({
                "query": {
                    "bool": {
                        "must": [
                            { "range": { "startTime": { "gte": "now-15m", "lte": "now" } } },
                            { "query_string": { "query": "error AND timeout" } },
                            { "term": { "serviceName": "frontend" } }
                        ],
                        "filter": [],
                        "should": [
                            {
                                "bool": {
                                    "must": [
                                        { "term": { "name": { "value": "HTTP GET /dispatch" } } },
                                        { "range": { "durationInNanos": { "lte": 2000000 } } }
                                    ],
                                    "filter": [],
                                    "should": [],
                                    "must_not": []
                                }
                            }
                        ],
                        "must_not": [
                            { "exists": { "field": "status.code" } }
                        ],
                        "minimum_should_match": 1
                    }
                }
            })
        );
    }

    #[test]
    fn disabled_filters_are_invisible() {
        let operators = [
            Operator::Exists,
            Operator::DoesNotExist,
            Operator::Is,
            Operator::IsNot,
            Operator::IsBetween,
            Operator::IsNotBetween,
            Operator::from("bogus"),
        ];
        let baseline =
            filters_to_query(&QueryConfig::default(), &[], "", &time_range()).unwrap();
        for operator in operators {
            for inverted in [false, true] {
                let mut filter = AuthoredFilter::new("serviceName", operator.clone())
                    .value("frontend")
                    .disabled();
                filter.inverted = inverted;
                let mut synthesized = fragment_filter("percentile", &["a"], 3);
                synthesized.set_disabled(true);
                let query = filters_to_query(
                    &QueryConfig::default(),
                    &[Filter::from(filter), synthesized],
                    "",
                    &time_range(),
                )
                .unwrap();
                assert_eq!(query, baseline);
            }
        }
    }

    #[test]
    fn time_bound_always_present() {
        let filters = [
            Filter::from(AuthoredFilter::new("startTime", Operator::IsBetween).range("1", "2")),
            fragment_filter("percentile", &["a"], 1),
        ];
        let query =
            filters_to_query(&QueryConfig::default(), &filters, "x", &time_range()).unwrap();
        let bool_query = query.bool_query().unwrap();
        let time_clause = time_range().clause("startTime");
        assert_eq!(
            bool_query
                .must
                .iter()
                .filter(|clause| **clause == time_clause)
                .count(),
            1
        );
        assert_eq!(bool_query.must[0], time_clause);
    }

    #[test]
    fn last_minimum_should_match_wins() {
        let filters = [
            fragment_filter("first", &["a", "b"], 2),
            fragment_filter("second", &["c"], 1),
        ];
        let query = filters_to_query(&QueryConfig::default(), &filters, "", &time_range()).unwrap();
        let bool_query = query.bool_query().unwrap();
        assert_eq!(
            bool_query.minimum_should_match,
            Some(MinimumShouldMatch::Count(1))
        );
        assert_eq!(
            bool_query.should,
            [Query::exists("a"), Query::exists("b"), Query::exists("c")]
        );
    }

    #[test]
    fn max_minimum_should_match() {
        let config = QueryConfig {
            minimum_should_match: ShouldMatchMerge::Max,
            ..QueryConfig::default()
        };
        let filters = [
            fragment_filter("first", &["a", "b"], 2),
            fragment_filter("second", &["c"], 1),
        ];
        let query = filters_to_query(&config, &filters, "", &time_range()).unwrap();
        assert_eq!(
            query.bool_query().unwrap().minimum_should_match,
            Some(MinimumShouldMatch::Count(2))
        );
    }

    #[test]
    fn unknown_operator_is_rejected() {
        let filters = [Filter::from(
            AuthoredFilter::new("serviceName", Operator::from("matches")).value("x"),
        )];
        assert_eq!(
            filters_to_query(&QueryConfig::default(), &filters, "", &time_range()),
            Err(CompileError::UnknownOperator(String::from("matches")))
        );
    }

    #[test]
    fn repeated_assembly_is_stable() {
        let filters = [
            Filter::from(AuthoredFilter::new("serviceName", Operator::IsNot).value("frontend")),
            fragment_filter("percentile", &["a"], 1),
        ];
        let first =
            filters_to_query(&QueryConfig::default(), &filters, "q", &time_range()).unwrap();
        let mut second =
            filters_to_query(&QueryConfig::default(), &filters, "q", &time_range()).unwrap();
        assert_eq!(first, second);

        if let Query::Bool(bool_query) = &mut second.query {
            bool_query.should.clear();
        }
        assert_ne!(first, second);
        assert_eq!(first.bool_query().unwrap().should.len(), 1);
    }
}
