/******************************************************************************
 * Copyright ContinuousC. Licensed under the "Elastic License 2.0".           *
 ******************************************************************************/

mod error;
mod store;

use std::{
    path::{Path, PathBuf},
    str::FromStr,
};

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tap::Pipe;
use trace_analytics::{
    calculate_ticks, dashboard_error_rate_query, dashboard_query, min_fixed_interval_at,
    percentile_condition_filter, services_query, AuthoredFilter, Filter, FixedInterval, Operator,
    PercentileCondition, QueryConfig, SearchState, TimeRange, DEFAULT_NUM_TICKS, UNBOUNDED,
};

use error::{Error, InvalidGroupPercentile, Result};
use store::FileStore;

#[derive(Parser, Clone)]
#[clap(version, about)]
struct Args {
    /// Field names and index overrides (yaml).
    #[clap(long, env = "TRACE_ANALYTICS_CONFIG")]
    config: Option<PathBuf>,
    #[clap(long, env = "TRACE_ANALYTICS_STATE", default_value = "state.json")]
    state: PathBuf,
    #[clap(long)]
    pretty: bool,
    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Clone)]
enum Command {
    /// Print the search query for the stored state.
    Query,
    /// Print the smallest histogram interval for the stored time range.
    Interval {
        #[clap(long)]
        now: Option<DateTime<Utc>>,
    },
    /// Print axis ticks between MIN and MAX.
    Ticks {
        min: f64,
        max: f64,
        #[clap(long, default_value_t = DEFAULT_NUM_TICKS)]
        num_ticks: usize,
    },
    /// Print the trace group latency request.
    Dashboard,
    /// Print the error rate request for a trace group.
    ErrorRate { trace_group: String },
    /// Print the per-service statistics request.
    Services { service_name: Option<String> },
    SetQuery { query: String },
    SetTime { start_time: String, end_time: String },
    AddFilter {
        field: String,
        operator: Operator,
        value: Option<String>,
        /// Upper bound for range operators; VALUE is the lower bound.
        #[clap(long)]
        to: Option<String>,
        #[clap(long)]
        inverted: bool,
        #[clap(long)]
        disabled: bool,
    },
    /// Add a filter on the latency percentile of one or more trace groups.
    AddPercentileFilter {
        #[clap(long)]
        condition: PercentileCondition,
        #[clap(required = true)]
        percentiles: Vec<GroupPercentile>,
    },
    ClearFilters,
}

/// Trace group with its 95th percentile latency in milliseconds.
#[derive(PartialEq, Clone, Debug)]
struct GroupPercentile {
    trace_group: String,
    percentile_ms: f64,
}

fn main() {
    let args = Args::parse();
    env_logger::init();

    if let Err(e) = run(&args) {
        log::error!("{e}");
        std::process::exit(1);
    }
}

fn run(args: &Args) -> Result<()> {
    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => QueryConfig::default(),
    };

    let mut store = FileStore::load(&args.state)?;
    let mut state = SearchState::load(&store);

    match &args.command {
        Command::Query => print(&state.to_query(&config)?, args.pretty)?,
        Command::Interval { now } => println!("{}", interval(&state.time_range, *now)),
        Command::Ticks {
            min,
            max,
            num_ticks,
        } => calculate_ticks(*min, *max, *num_ticks)
            .into_iter()
            .collect::<Vec<_>>()
            .pipe(|ticks| print(&ticks, args.pretty))?,
        Command::Dashboard => print(&dashboard_query(&config), args.pretty)?,
        Command::ErrorRate { trace_group } => {
            print(&dashboard_error_rate_query(&config, trace_group), args.pretty)?
        }
        Command::Services { service_name } => print(
            &services_query(&config, service_name.as_deref()),
            args.pretty,
        )?,
        Command::SetQuery { query } => {
            state.set_query(&mut store, query.clone());
            store.save()?;
        }
        Command::SetTime {
            start_time,
            end_time,
        } => {
            state.set_start_time(&mut store, start_time.clone());
            state.set_end_time(&mut store, end_time.clone());
            store.save()?;
        }
        Command::AddFilter {
            field,
            operator,
            value,
            to,
            inverted,
            disabled,
        } => {
            let filter = authored_filter(
                field,
                operator,
                value.as_deref(),
                to.as_deref(),
                *inverted,
                *disabled,
            )?;
            state.add_filter(&mut store, Filter::from(filter));
            store.save()?;
        }
        Command::AddPercentileFilter {
            condition,
            percentiles,
        } => {
            let filter = percentile_condition_filter(
                &config.fields,
                *condition,
                percentiles
                    .iter()
                    .map(|p| (p.trace_group.as_str(), p.percentile_ms)),
            );
            state.add_filter(&mut store, filter);
            store.save()?;
        }
        Command::ClearFilters => {
            state.set_filters(&mut store, Vec::new());
            store.save()?;
        }
    }

    Ok(())
}

fn interval(time_range: &TimeRange, now: Option<DateTime<Utc>>) -> FixedInterval {
    min_fixed_interval_at(
        &time_range.start_time,
        &time_range.end_time,
        now.unwrap_or_else(Utc::now),
    )
}

fn load_config(path: &Path) -> Result<QueryConfig> {
    let data = std::fs::read(path).map_err(|e| Error::ReadFile(path.to_path_buf(), e))?;
    serde_yaml::from_slice(&data).map_err(|e| Error::DeserializeConfig(path.to_path_buf(), e))
}

fn print<T: Serialize>(value: &T, pretty: bool) -> Result<()> {
    let output = if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    }
    .map_err(Error::Serialize)?;
    println!("{output}");
    Ok(())
}

/// Build and validate a filter from command line arguments. A missing
/// lower bound on a range is unbounded.
fn authored_filter(
    field: &str,
    operator: &Operator,
    value: Option<&str>,
    to: Option<&str>,
    inverted: bool,
    disabled: bool,
) -> Result<AuthoredFilter> {
    let mut filter = AuthoredFilter::new(field, operator.clone());
    filter = match (value, to) {
        (from, Some(to)) => filter.range(
            from.map_or_else(|| UNBOUNDED.to_string(), str::to_string),
            to,
        ),
        (Some(value), None) => filter.value(value),
        (None, None) => filter,
    };
    filter.inverted = inverted;
    filter.disabled = disabled;

    filter.clause()?;
    Ok(filter)
}

impl FromStr for GroupPercentile {
    type Err = InvalidGroupPercentile;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let (trace_group, percentile_ms) = s
            .rsplit_once('=')
            .ok_or_else(|| InvalidGroupPercentile(s.to_string()))?;
        let percentile_ms = percentile_ms
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|ms| ms.is_finite())
            .ok_or_else(|| InvalidGroupPercentile(s.to_string()))?;
        Ok(Self {
            trace_group: trace_group.to_string(),
            percentile_ms,
        })
    }
}

#[cfg(test)]
mod test {
    use chrono::{TimeZone, Utc};
    use clap::Parser;
    use serde_json::json;
    use trace_analytics::{
        dashboard_query, FixedInterval, Operator, ShouldMatchMerge, TimeRange, UNBOUNDED,
    };

    use super::{authored_filter, interval, load_config, Args, GroupPercentile};
    use crate::error::Error;

    #[test]
    fn load_yaml_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(
            &path,
            "index: otel-v1-apm-span-*\n\
             fields:\n  trace_group_keyword: traceGroup\n\
             minimum_should_match: max\n",
        )
        .unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.index, "otel-v1-apm-span-*");
        assert_eq!(config.fields.trace_group_keyword, "traceGroup");
        assert_eq!(config.fields.start_time, "startTime");
        assert_eq!(config.minimum_should_match, ShouldMatchMerge::Max);

        let query = serde_json::to_value(dashboard_query(&config)).unwrap();
        assert_eq!(query["index"], json!("otel-v1-apm-span-*"));
        assert_eq!(
            query["query"]["aggs"]["trace_group"]["terms"],
            json!({ "field": "traceGroup" })
        );
    }

    #[test]
    fn invalid_config() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            load_config(&dir.path().join("missing.yaml")),
            Err(Error::ReadFile(..))
        ));

        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "minimum_should_match: sometimes\n").unwrap();
        assert!(matches!(
            load_config(&path),
            Err(Error::DeserializeConfig(..))
        ));
    }

    #[test]
    fn interval_for_state() {
        let now = Utc.with_ymd_and_hms(2020, 10, 15, 8, 30, 12).unwrap();
        assert_eq!(
            interval(&TimeRange::new("now-1h", "now"), Some(now)),
            FixedInterval::I1m
        );
        assert_eq!(
            interval(&TimeRange::new("now-1y", "now"), Some(now)),
            FixedInterval::I30d
        );
        assert_eq!(
            interval(&TimeRange::new("2020-10-01", "2020-10-15"), Some(now)),
            FixedInterval::I7d
        );
        assert_eq!(
            interval(&TimeRange::new("", "now"), None),
            FixedInterval::Minute
        );
        assert_eq!(
            interval(&TimeRange::new("yesterday", "now"), Some(now)),
            FixedInterval::Minute
        );
    }

    #[test]
    fn parse_group_percentile() {
        assert_eq!(
            "HTTP GET /dispatch=12.5".parse::<GroupPercentile>().unwrap(),
            GroupPercentile {
                trace_group: String::from("HTTP GET /dispatch"),
                percentile_ms: 12.5
            }
        );
        assert_eq!(
            "a=b=3".parse::<GroupPercentile>().unwrap().trace_group,
            "a=b"
        );
        assert!("dispatch".parse::<GroupPercentile>().is_err());
        assert!("dispatch=fast".parse::<GroupPercentile>().is_err());
        assert!("dispatch=inf".parse::<GroupPercentile>().is_err());
    }

    #[test]
    fn build_filters() {
        let filter =
            authored_filter("durationInNanos", &Operator::IsBetween, None, Some("5"), false, false)
                .unwrap();
        assert_eq!(
            serde_json::to_value(filter.clause().unwrap()).unwrap(),
            json!({ "range": { "durationInNanos": { "lte": "5" } } })
        );
        assert_eq!(
            filter.value.unwrap().to_string(),
            format!("{UNBOUNDED} to 5")
        );

        let filter =
            authored_filter("serviceName", &Operator::Is, Some("redis"), None, true, false)
                .unwrap();
        assert!(filter.inverted);

        assert!(matches!(
            authored_filter("serviceName", &Operator::from("like"), Some("x"), None, false, false),
            Err(Error::Compile(_))
        ));
        assert!(matches!(
            authored_filter("serviceName", &Operator::Is, None, None, false, false),
            Err(Error::Compile(_))
        ));
    }

    #[test]
    fn parse_args() {
        let args = Args::try_parse_from([
            "trace-analytics",
            "--state",
            "/tmp/state.json",
            "add-percentile-filter",
            "--condition",
            "gte",
            "HTTP GET /dispatch=12",
            "HTTP GET /route=3.5",
        ])
        .unwrap();
        assert!(matches!(
            args.command,
            super::Command::AddPercentileFilter { ref percentiles, .. } if percentiles.len() == 2
        ));

        let args =
            Args::try_parse_from(["trace-analytics", "add-filter", "status.code", "exists"])
                .unwrap();
        assert!(matches!(
            args.command,
            super::Command::AddFilter { operator: Operator::Exists, value: None, .. }
        ));
    }
}
