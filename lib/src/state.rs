/******************************************************************************
 * Copyright ContinuousC. Licensed under the "Elastic License 2.0".           *
 ******************************************************************************/

use std::collections::BTreeMap;

use serde_json::Value;

use crate::{
    assemble::filters_to_query,
    config::QueryConfig,
    dsl::SearchQuery,
    filter::{CompileError, Filter},
    time_range::{TimeRange, DEFAULT_END_TIME, DEFAULT_START_TIME},
};

pub const QUERY_KEY: &str = "TraceAnalyticsQuery";
pub const FILTERS_KEY: &str = "TraceAnalyticsFilters";
pub const START_TIME_KEY: &str = "TraceAnalyticsStartTime";
pub const END_TIME_KEY: &str = "TraceAnalyticsEndTime";

/// String key-value storage for the search state.
pub trait StateStore {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: String);
}

#[derive(Default, Clone, Debug)]
pub struct MemoryStore(BTreeMap<String, String>);

impl StateStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.0.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: String) {
        self.0.insert(key.to_string(), value);
    }
}

/// The user's current search: free-text query, filters and time range.
#[derive(PartialEq, Default, Clone, Debug)]
pub struct SearchState {
    pub query: String,
    pub filters: Vec<Filter>,
    pub time_range: TimeRange,
}

impl SearchState {
    /// Missing or empty entries take their defaults.
    pub fn load<S: StateStore + ?Sized>(store: &S) -> Self {
        let get = |key| store.get(key).filter(|value| !value.is_empty());

        let filters = match get(FILTERS_KEY) {
            Some(data) => load_filters(&data),
            None => Vec::new(),
        };

        Self {
            query: get(QUERY_KEY).unwrap_or_default(),
            filters,
            time_range: TimeRange::new(
                get(START_TIME_KEY).unwrap_or_else(|| DEFAULT_START_TIME.to_string()),
                get(END_TIME_KEY).unwrap_or_else(|| DEFAULT_END_TIME.to_string()),
            ),
        }
    }

    pub fn set_query<S: StateStore + ?Sized>(&mut self, store: &mut S, query: String) {
        store.set(QUERY_KEY, query.clone());
        self.query = query;
    }

    pub fn set_filters<S: StateStore + ?Sized>(&mut self, store: &mut S, filters: Vec<Filter>) {
        self.filters = filters;
        self.save_filters(store);
    }

    pub fn add_filter<S: StateStore + ?Sized>(&mut self, store: &mut S, filter: Filter) {
        self.filters.push(filter);
        self.save_filters(store);
    }

    pub fn set_start_time<S: StateStore + ?Sized>(&mut self, store: &mut S, start_time: String) {
        store.set(START_TIME_KEY, start_time.clone());
        self.time_range.start_time = start_time;
    }

    pub fn set_end_time<S: StateStore + ?Sized>(&mut self, store: &mut S, end_time: String) {
        store.set(END_TIME_KEY, end_time.clone());
        self.time_range.end_time = end_time;
    }

    pub fn to_query(&self, config: &QueryConfig) -> Result<SearchQuery, CompileError> {
        filters_to_query(config, &self.filters, &self.query, &self.time_range)
    }

    fn save_filters<S: StateStore + ?Sized>(&self, store: &mut S) {
        match serde_json::to_string(&self.filters) {
            Ok(data) => store.set(FILTERS_KEY, data),
            Err(e) => log::warn!("failed to store filters: {e}"),
        }
    }
}

/// Entries that fail to load are skipped, keeping the rest of the list.
fn load_filters(data: &str) -> Vec<Filter> {
    let entries = match serde_json::from_str::<Vec<Value>>(data) {
        Ok(entries) => entries,
        Err(e) => {
            log::warn!("ignoring stored filters: {e}");
            return Vec::new();
        }
    };
    entries
        .into_iter()
        .enumerate()
        .filter_map(|(i, entry)| {
            serde_json::from_value::<Filter>(entry)
                .map_err(|e| log::warn!("ignoring stored filter #{i}: {e}"))
                .ok()
        })
        .collect()
}
