/******************************************************************************
 * Copyright ContinuousC. Licensed under the "Elastic License 2.0".           *
 ******************************************************************************/

mod assemble;
mod config;
mod dsl;
mod filter;
mod interval;
mod percentile;
mod queries;
mod state;
mod ticks;
mod time_range;
mod units;

pub use assemble::filters_to_query;
pub use config::{Fields, QueryConfig, ShouldMatchMerge};
pub use dsl::{
    Aggregation, AggregationKind, BoolQuery, BucketScript, ExistsQuery, ExplicitTerm, FieldQuery,
    IndexedSearch, MinimumShouldMatch, Query, QueryStringQuery, RangeBounds, ScriptedMetric,
    SearchBody, SearchQuery, TermValue,
};
pub use filter::{
    AuthoredFilter, Branch, CompileError, Compiled, Filter, FilterFormatError, FilterValue,
    Operator, OtherOperator, RangeValue, SynthesizedFilter, UNBOUNDED,
};
pub use interval::{FixedInterval, InvalidInterval};
pub use percentile::{
    percentile_condition_filter, percentile_filter, DurationFilter, InvalidPercentileCondition,
    PercentileCondition, PercentileInput, PERCENTILE_FILTER_LABEL,
};
pub use queries::{dashboard_error_rate_query, dashboard_query, services_query};
pub use state::{
    MemoryStore, SearchState, StateStore, END_TIME_KEY, FILTERS_KEY, QUERY_KEY, START_TIME_KEY,
};
pub use ticks::{calculate_ticks, TickIter, Ticks, DEFAULT_NUM_TICKS};
pub use time_range::{
    min_fixed_interval, min_fixed_interval_at, resolve_time, TimeParseError, TimeRange,
    DEFAULT_END_TIME, DEFAULT_START_TIME,
};
pub use units::{milli_to_nano, nano_to_milli, Benchmark, Trend};
