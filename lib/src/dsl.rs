/******************************************************************************
 * Copyright ContinuousC. Licensed under the "Elastic License 2.0".           *
 ******************************************************************************/

use std::{collections::BTreeMap, fmt, marker::PhantomData};

use serde::{
    de::{self, IgnoredAny, MapAccess, Visitor},
    ser::SerializeMap,
    Deserialize, Deserializer, Serialize, Serializer,
};
use serde_json::Value;

/* Queries */

/// A complete query document: `{ "query": { ... } }`.
#[derive(Serialize, Deserialize, PartialEq, Clone, Debug)]
pub struct SearchQuery {
    pub query: Query,
}

impl SearchQuery {
    pub fn bool_query(&self) -> Option<&BoolQuery> {
        match &self.query {
            Query::Bool(query) => Some(query),
            _ => None,
        }
    }
}

#[derive(Serialize, Deserialize, PartialEq, Clone, Debug)]
#[serde(rename_all = "snake_case")]
pub enum Query {
    Bool(BoolQuery),
    Term(FieldQuery<TermValue>),
    Range(FieldQuery<RangeBounds>),
    Exists(ExistsQuery),
    QueryString(QueryStringQuery),
    /// Any other clause, kept verbatim.
    #[serde(untagged)]
    Other(Value),
}

impl Query {
    pub fn term<F: Into<String>, V: Into<TermValue>>(field: F, value: V) -> Self {
        Self::Term(FieldQuery::new(field, value.into()))
    }

    pub fn range<F: Into<String>>(field: F, bounds: RangeBounds) -> Self {
        Self::Range(FieldQuery::new(field, bounds))
    }

    pub fn exists<F: Into<String>>(field: F) -> Self {
        Self::Exists(ExistsQuery {
            field: field.into(),
        })
    }

    pub fn query_string<Q: Into<String>>(query: Q) -> Self {
        Self::QueryString(QueryStringQuery {
            query: query.into(),
        })
    }
}

/// The four clause lists are always serialized, even when empty.
#[derive(Serialize, Deserialize, PartialEq, Default, Clone, Debug)]
pub struct BoolQuery {
    #[serde(default)]
    pub must: Vec<Query>,
    #[serde(default)]
    pub filter: Vec<Query>,
    #[serde(default)]
    pub should: Vec<Query>,
    #[serde(default)]
    pub must_not: Vec<Query>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minimum_should_match: Option<MinimumShouldMatch>,
}

/// A clause count, or one of the other forms the search engine accepts
/// (`"75%"`, `"3<90%"`).
#[derive(Serialize, Deserialize, PartialEq, Eq, Clone, Debug)]
#[serde(untagged)]
pub enum MinimumShouldMatch {
    Count(i64),
    Expr(String),
}

impl BoolQuery {
    pub fn with_must(mut self, query: Query) -> Self {
        self.must.push(query);
        self
    }

    pub fn with_must_not(mut self, query: Query) -> Self {
        self.must_not.push(query);
        self
    }

    pub fn with_should(mut self, query: Query) -> Self {
        self.should.push(query);
        self
    }

    pub fn with_minimum_should_match(mut self, n: i64) -> Self {
        self.minimum_should_match = Some(MinimumShouldMatch::Count(n));
        self
    }
}

/// A clause keyed by the document field it applies to, e.g.
/// `{ "startTime": { "gte": ... } }`.
#[derive(PartialEq, Clone, Debug)]
pub struct FieldQuery<T> {
    pub field: String,
    pub value: T,
}

impl<T> FieldQuery<T> {
    pub fn new<F: Into<String>>(field: F, value: T) -> Self {
        Self {
            field: field.into(),
            value,
        }
    }
}

impl<T: Serialize> Serialize for FieldQuery<T> {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(&self.field, &self.value)?;
        map.end()
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for FieldQuery<T> {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_map(FieldQueryVisitor(PhantomData))
    }
}

struct FieldQueryVisitor<T>(PhantomData<T>);

impl<'de, T: Deserialize<'de>> Visitor<'de> for FieldQueryVisitor<T> {
    type Value = FieldQuery<T>;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "a map with a single field")
    }

    fn visit_map<A>(self, mut map: A) -> std::result::Result<Self::Value, A::Error>
    where
        A: MapAccess<'de>,
    {
        let (field, value) = map
            .next_entry::<String, T>()?
            .ok_or_else(|| de::Error::invalid_length(0, &self))?;
        if map.next_key::<IgnoredAny>()?.is_some() {
            return Err(de::Error::invalid_length(2, &self));
        }
        Ok(FieldQuery { field, value })
    }
}

/// Term values come in two spellings: `{ "f": "x" }` and
/// `{ "f": { "value": "x" } }`.
#[derive(Serialize, Deserialize, PartialEq, Clone, Debug)]
#[serde(untagged)]
pub enum TermValue {
    Explicit(ExplicitTerm),
    Value(Value),
}

#[derive(Serialize, Deserialize, PartialEq, Clone, Debug)]
#[serde(deny_unknown_fields)]
pub struct ExplicitTerm {
    pub value: Value,
}

impl TermValue {
    pub fn explicit<V: Into<Value>>(value: V) -> Self {
        Self::Explicit(ExplicitTerm {
            value: value.into(),
        })
    }
}

impl From<Value> for TermValue {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

impl From<&str> for TermValue {
    fn from(value: &str) -> Self {
        Self::Value(Value::from(value))
    }
}

/// An empty set of bounds serializes as `{}` and matches every document
/// that has the field.
#[derive(Serialize, Deserialize, PartialEq, Default, Clone, Debug)]
#[serde(deny_unknown_fields)]
pub struct RangeBounds {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gte: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gt: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lte: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lt: Option<Value>,
}

/* Clauses carrying options not modelled here load as `Query::Other`. */

#[derive(Serialize, Deserialize, PartialEq, Clone, Debug)]
#[serde(deny_unknown_fields)]
pub struct ExistsQuery {
    pub field: String,
}

#[derive(Serialize, Deserialize, PartialEq, Clone, Debug)]
#[serde(deny_unknown_fields)]
pub struct QueryStringQuery {
    pub query: String,
}

/* Aggregations */

#[derive(Serialize, PartialEq, Clone, Debug)]
pub struct Aggregation {
    #[serde(flatten)]
    pub kind: AggregationKind,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub aggs: BTreeMap<String, Aggregation>,
}

#[derive(Serialize, PartialEq, Clone, Debug)]
#[serde(rename_all = "snake_case")]
pub enum AggregationKind {
    Terms { field: String },
    Filter(Query),
    ScriptedMetric(ScriptedMetric),
    BucketScript(BucketScript),
}

#[derive(Serialize, PartialEq, Clone, Debug)]
pub struct ScriptedMetric {
    pub init_script: String,
    pub map_script: String,
    pub combine_script: String,
    pub reduce_script: String,
}

#[derive(Serialize, PartialEq, Clone, Debug)]
pub struct BucketScript {
    pub buckets_path: BTreeMap<String, String>,
    pub script: String,
}

impl Aggregation {
    pub fn new(kind: AggregationKind) -> Self {
        Self {
            kind,
            aggs: BTreeMap::new(),
        }
    }

    pub fn terms<F: Into<String>>(field: F) -> Self {
        Self::new(AggregationKind::Terms {
            field: field.into(),
        })
    }

    pub fn filter(query: Query) -> Self {
        Self::new(AggregationKind::Filter(query))
    }

    pub fn bucket_script<'a, P, S>(buckets_path: P, script: S) -> Self
    where
        P: IntoIterator<Item = (&'a str, &'a str)>,
        S: Into<String>,
    {
        Self::new(AggregationKind::BucketScript(BucketScript {
            buckets_path: buckets_path
                .into_iter()
                .map(|(var, path)| (var.to_string(), path.to_string()))
                .collect(),
            script: script.into(),
        }))
    }

    pub fn sub<N: Into<String>>(mut self, name: N, agg: Aggregation) -> Self {
        self.aggs.insert(name.into(), agg);
        self
    }
}

/* Requests */

#[derive(Serialize, PartialEq, Clone, Debug)]
pub struct SearchBody {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<usize>,
    pub query: Query,
    pub aggs: BTreeMap<String, Aggregation>,
}

/// A search body addressed to a specific index, as passed to the
/// dashboard's search proxy.
#[derive(Serialize, PartialEq, Clone, Debug)]
pub struct IndexedSearch {
    pub index: String,
    pub size: usize,
    pub query: SearchBody,
}

#[cfg(test)]
mod test {
    use serde_json::json;

    use super::{
        Aggregation, BoolQuery, FieldQuery, MinimumShouldMatch, Query, RangeBounds, SearchQuery,
        TermValue,
    };

    #[test]
    fn serialize_bool_query() {
        let query = SearchQuery {
            query: Query::Bool(
                BoolQuery::default()
                    .with_must(Query::term("serviceName", "frontend"))
                    .with_must_not(Query::exists("parentSpanId")),
            ),
        };
        assert_eq!(
            serde_json::to_value(&query).unwrap(),
            json!({
                "query": {
                    "bool": {
                        "must": [{ "term": { "serviceName": "frontend" } }],
                        "filter": [],
                        "should": [],
                        "must_not": [{ "exists": { "field": "parentSpanId" } }]
                    }
                }
            })
        );
    }

    #[test]
    fn deserialize_percentile_fragment() {
        let query = serde_json::from_value::<SearchQuery>(json!({
            "query": {
                "bool": {
                    "must": [],
                    "filter": [],
                    "should": [{
                        "bool": {
                            "must": [
                                { "term": { "name": { "value": "HTTP GET /dispatch" } } },
                                { "range": { "durationInNanos": { "gte": 1500000 } } }
                            ]
                        }
                    }],
                    "must_not": [],
                    "minimum_should_match": 1
                }
            }
        }))
        .unwrap();

        let expected = BoolQuery::default()
            .with_should(Query::Bool(
                BoolQuery::default()
                    .with_must(Query::term(
                        "name",
                        TermValue::explicit("HTTP GET /dispatch"),
                    ))
                    .with_must(Query::range(
                        "durationInNanos",
                        RangeBounds {
                            gte: Some(json!(1500000)),
                            ..RangeBounds::default()
                        },
                    )),
            ))
            .with_minimum_should_match(1);
        assert_eq!(query.bool_query(), Some(&expected));
    }

    #[test]
    fn reject_multi_field_clause() {
        let res = serde_json::from_value::<FieldQuery<TermValue>>(json!({ "a": "x", "b": "y" }));
        assert!(res.is_err());

        let clause = json!({ "term": { "a": "x", "b": "y" } });
        assert_eq!(
            serde_json::from_value::<Query>(clause.clone()).unwrap(),
            Query::Other(clause)
        );
    }

    #[test]
    fn keep_unknown_clauses_verbatim() {
        let fragment = json!({
            "query": {
                "bool": {
                    "should": [
                        { "match": { "serviceName": "frontend" } },
                        { "range": { "startTime": { "gte": 0, "format": "epoch_millis" } } },
                        { "query_string": { "query": "error", "default_field": "name" } },
                        { "exists": { "field": "status.code" } }
                    ],
                    "minimum_should_match": "75%"
                }
            }
        });
        let query = serde_json::from_value::<SearchQuery>(fragment.clone()).unwrap();
        let bool_query = query.bool_query().unwrap();
        assert_eq!(
            bool_query.should[0],
            Query::Other(json!({ "match": { "serviceName": "frontend" } }))
        );
        assert!(matches!(bool_query.should[1], Query::Other(_)));
        assert!(matches!(bool_query.should[2], Query::Other(_)));
        assert_eq!(bool_query.should[3], Query::exists("status.code"));
        assert_eq!(
            bool_query.minimum_should_match,
            Some(MinimumShouldMatch::Expr(String::from("75%")))
        );
        assert_eq!(
            serde_json::to_value(&query).unwrap()["query"]["bool"]["should"],
            fragment["query"]["bool"]["should"]
        );
    }

    #[test]
    fn serialize_unbounded_range() {
        assert_eq!(
            serde_json::to_value(Query::range("duration", RangeBounds::default())).unwrap(),
            json!({ "range": { "duration": {} } })
        );
    }

    #[test]
    fn serialize_nested_aggregation() {
        let agg = Aggregation::terms("serviceName").sub(
            "errors",
            Aggregation::filter(Query::exists("status.code")),
        );
        assert_eq!(
            serde_json::to_value(&agg).unwrap(),
            json!({
                "terms": { "field": "serviceName" },
                "aggs": {
                    "errors": { "filter": { "exists": { "field": "status.code" } } }
                }
            })
        );
    }
}
