/******************************************************************************
 * Copyright ContinuousC. Licensed under the "Elastic License 2.0".           *
 ******************************************************************************/

use std::{convert::Infallible, fmt::Display, str::FromStr};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use serde_with::{DeserializeFromStr, SerializeDisplay};

use crate::dsl::{BoolQuery, Query, RangeBounds, SearchQuery};

/// Marks an open end of a range entered in the filter editor.
pub const UNBOUNDED: char = '\u{221E}';

/// A search constraint from the filter bar. Filters are either entered by
/// the user, or synthesized from a chart selection and carry a
/// precomputed query fragment.
#[derive(Serialize, Deserialize, PartialEq, Clone, Debug)]
#[serde(try_from = "StoredFilter", into = "StoredFilter")]
pub enum Filter {
    Authored(AuthoredFilter),
    Synthesized(SynthesizedFilter),
}

#[derive(PartialEq, Clone, Debug)]
pub struct AuthoredFilter {
    pub field: String,
    pub operator: Operator,
    pub value: Option<FilterValue>,
    /// Place the clause in `must_not` instead of `must`.
    pub inverted: bool,
    pub disabled: bool,
}

#[derive(PartialEq, Clone, Debug)]
pub struct SynthesizedFilter {
    /// Descriptive label shown in the filter bar.
    pub field: String,
    pub condition: String,
    pub fragment: BoolQuery,
    pub disabled: bool,
}

/// Negated operators produce the same clause shape as their positive
/// counterparts; only `inverted` decides between `must` and `must_not`.
#[derive(SerializeDisplay, DeserializeFromStr, PartialEq, Eq, Clone, Debug)]
pub enum Operator {
    Exists,
    DoesNotExist,
    Is,
    IsNot,
    IsBetween,
    IsNotBetween,
    Other(OtherOperator),
}

/// An operator name the compiler does not know. Only obtained by parsing,
/// so it never holds one of the known names.
#[derive(PartialEq, Eq, Clone, Debug)]
pub struct OtherOperator(String);

impl OtherOperator {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Serialize, Deserialize, PartialEq, Clone, Debug)]
#[serde(untagged)]
pub enum FilterValue {
    Range(RangeValue),
    Scalar(Value),
}

#[derive(Serialize, Deserialize, PartialEq, Eq, Clone, Debug)]
pub struct RangeValue {
    pub from: String,
    pub to: String,
}

#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub enum Branch {
    Must,
    MustNot,
}

/// Result of compiling a single filter.
#[derive(PartialEq, Debug)]
pub enum Compiled<'a> {
    /// Disabled filters contribute nothing.
    Skip,
    Clause { branch: Branch, clause: Query },
    /// Precomputed fragment whose `should` clauses are merged into the
    /// top-level query.
    Merge(&'a BoolQuery),
}

#[derive(thiserror::Error, PartialEq, Eq, Debug)]
pub enum CompileError {
    #[error("unknown filter operator: '{0}'")]
    UnknownOperator(String),
    #[error("filter on '{field}' with operator '{operator}' requires a single value")]
    ExpectedScalar { field: String, operator: Operator },
    #[error("filter on '{field}' with operator '{operator}' requires a from/to range")]
    ExpectedRange { field: String, operator: Operator },
}

#[derive(thiserror::Error, Debug)]
pub enum FilterFormatError {
    #[error("filter '{0}': query fragment must be a bool query")]
    FragmentNotBool(String),
}

impl Filter {
    pub fn field(&self) -> &str {
        match self {
            Filter::Authored(filter) => &filter.field,
            Filter::Synthesized(filter) => &filter.field,
        }
    }

    pub fn is_disabled(&self) -> bool {
        match self {
            Filter::Authored(filter) => filter.disabled,
            Filter::Synthesized(filter) => filter.disabled,
        }
    }

    pub fn set_disabled(&mut self, disabled: bool) {
        match self {
            Filter::Authored(filter) => filter.disabled = disabled,
            Filter::Synthesized(filter) => filter.disabled = disabled,
        }
    }

    pub fn compile(&self) -> Result<Compiled<'_>, CompileError> {
        match self {
            _ if self.is_disabled() => Ok(Compiled::Skip),
            Filter::Synthesized(filter) => Ok(Compiled::Merge(&filter.fragment)),
            Filter::Authored(filter) => Ok(Compiled::Clause {
                branch: filter.branch(),
                clause: filter.clause()?,
            }),
        }
    }
}

impl From<AuthoredFilter> for Filter {
    fn from(filter: AuthoredFilter) -> Self {
        Self::Authored(filter)
    }
}

impl From<SynthesizedFilter> for Filter {
    fn from(filter: SynthesizedFilter) -> Self {
        Self::Synthesized(filter)
    }
}

impl AuthoredFilter {
    pub fn new<F: Into<String>>(field: F, operator: Operator) -> Self {
        Self {
            field: field.into(),
            operator,
            value: None,
            inverted: false,
            disabled: false,
        }
    }

    pub fn value<V: Into<Value>>(mut self, value: V) -> Self {
        self.value = Some(FilterValue::Scalar(value.into()));
        self
    }

    pub fn range<F: Into<String>, T: Into<String>>(mut self, from: F, to: T) -> Self {
        self.value = Some(FilterValue::Range(RangeValue {
            from: from.into(),
            to: to.into(),
        }));
        self
    }

    pub fn inverted(mut self) -> Self {
        self.inverted = true;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.disabled = true;
        self
    }

    pub fn branch(&self) -> Branch {
        match self.inverted {
            true => Branch::MustNot,
            false => Branch::Must,
        }
    }

    pub fn clause(&self) -> Result<Query, CompileError> {
        match &self.operator {
            Operator::Exists | Operator::DoesNotExist => Ok(Query::exists(&self.field)),
            Operator::Is | Operator::IsNot => match &self.value {
                Some(FilterValue::Scalar(value)) => Ok(Query::term(&self.field, value.clone())),
                _ => Err(CompileError::ExpectedScalar {
                    field: self.field.clone(),
                    operator: self.operator.clone(),
                }),
            },
            Operator::IsBetween | Operator::IsNotBetween => match &self.value {
                Some(FilterValue::Range(range)) => Ok(Query::range(&self.field, range.bounds())),
                _ => Err(CompileError::ExpectedRange {
                    field: self.field.clone(),
                    operator: self.operator.clone(),
                }),
            },
            Operator::Other(op) => Err(CompileError::UnknownOperator(op.0.clone())),
        }
    }
}

impl RangeValue {
    /// Sides containing the unbounded marker are left open.
    pub fn bounds(&self) -> RangeBounds {
        let bound = |s: &String| (!s.contains(UNBOUNDED)).then(|| Value::String(s.clone()));
        RangeBounds {
            gte: bound(&self.from),
            lte: bound(&self.to),
            ..RangeBounds::default()
        }
    }
}

impl Display for FilterValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FilterValue::Range(range) => write!(f, "{} to {}", range.from, range.to),
            FilterValue::Scalar(Value::String(s)) => write!(f, "{s}"),
            FilterValue::Scalar(value) => write!(f, "{value}"),
        }
    }
}

impl Display for Operator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Operator::Exists => write!(f, "exists"),
            Operator::DoesNotExist => write!(f, "does not exist"),
            Operator::Is => write!(f, "is"),
            Operator::IsNot => write!(f, "is not"),
            Operator::IsBetween => write!(f, "is between"),
            Operator::IsNotBetween => write!(f, "is not between"),
            Operator::Other(op) => write!(f, "{}", op.0),
        }
    }
}

impl From<&str> for Operator {
    fn from(s: &str) -> Self {
        match s {
            "exists" => Operator::Exists,
            "does not exist" => Operator::DoesNotExist,
            "is" => Operator::Is,
            "is not" => Operator::IsNot,
            "is between" => Operator::IsBetween,
            "is not between" => Operator::IsNotBetween,
            _ => Operator::Other(OtherOperator(s.to_string())),
        }
    }
}

impl FromStr for Operator {
    type Err = Infallible;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Operator::from(s))
    }
}

/* Persisted form, shared with the filter bar. */

#[derive(Serialize, Deserialize)]
struct StoredFilter {
    #[serde(default)]
    field: String,
    #[serde(default)]
    operator: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    value: Option<FilterValue>,
    #[serde(default)]
    inverted: bool,
    #[serde(default)]
    disabled: bool,
    #[serde(rename = "DSL", default, skip_serializing_if = "Option::is_none")]
    dsl: Option<SearchQuery>,
}

impl TryFrom<StoredFilter> for Filter {
    type Error = FilterFormatError;

    fn try_from(stored: StoredFilter) -> Result<Self, Self::Error> {
        match stored.dsl {
            Some(SearchQuery {
                query: Query::Bool(fragment),
            }) => Ok(Filter::Synthesized(SynthesizedFilter {
                field: stored.field,
                condition: stored.value.map(|v| v.to_string()).unwrap_or_default(),
                fragment,
                disabled: stored.disabled,
            })),
            Some(_) => Err(FilterFormatError::FragmentNotBool(stored.field)),
            None => Ok(Filter::Authored(AuthoredFilter {
                operator: Operator::from(stored.operator.as_str()),
                field: stored.field,
                value: stored.value,
                inverted: stored.inverted,
                disabled: stored.disabled,
            })),
        }
    }
}

impl From<Filter> for StoredFilter {
    fn from(filter: Filter) -> Self {
        match filter {
            Filter::Authored(filter) => StoredFilter {
                field: filter.field,
                operator: filter.operator.to_string(),
                value: filter.value,
                inverted: filter.inverted,
                disabled: filter.disabled,
                dsl: None,
            },
            Filter::Synthesized(filter) => StoredFilter {
                field: filter.field,
                operator: String::new(),
                value: Some(FilterValue::Scalar(Value::String(filter.condition))),
                inverted: false,
                disabled: filter.disabled,
                dsl: Some(SearchQuery {
                    query: Query::Bool(filter.fragment),
                }),
            },
        }
    }
}
