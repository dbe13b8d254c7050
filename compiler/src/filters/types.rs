//! Filter type definitions
//!
//! Defines filter descriptors, combinators, conversion rules, bound values
//! and the compiled predicate returned by the compiler.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;

use super::error::FilterError;
use super::params::SqlParams;

/// Boolean join operator used to compose sub-filters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Combinator {
    /// `all` - every fragment must hold
    #[default]
    All,
    /// `any` - at least one fragment must hold
    Any,
}

impl Combinator {
    /// Recognize a body key as a combinator
    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "all" => Some(Self::All),
            "any" => Some(Self::Any),
            _ => None,
        }
    }

    pub fn key(&self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Any => "any",
        }
    }

    pub fn sql(&self) -> &'static str {
        match self {
            Self::All => "AND",
            Self::Any => "OR",
        }
    }
}

impl fmt::Display for Combinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key())
    }
}

/// Strategy used to turn one named filter into a predicate fragment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterKind {
    Reference,
    PolymorphicReference,
    MappedList,
    TimestampRange,
    Custom,
    /// Accepted in bodies but never emits a fragment
    Passthrough,
}

impl fmt::Display for FilterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Reference => "reference",
            Self::PolymorphicReference => "polymorphic_reference",
            Self::MappedList => "mapped_list",
            Self::TimestampRange => "timestamp_range",
            Self::Custom => "custom",
            Self::Passthrough => "passthrough",
        };
        write!(f, "{}", name)
    }
}

/// Which half of an `{only, except}` body a list came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListSide {
    Only,
    Except,
}

impl ListSide {
    pub fn key(&self) -> &'static str {
        match self {
            Self::Only => "only",
            Self::Except => "except",
        }
    }
}

pub type ConvertFn = Arc<dyn Fn(Vec<Value>, ListSide) -> Vec<Value> + Send + Sync>;

/// Conversion applied to raw list values before set algebra
#[derive(Clone, Default)]
pub enum Convert {
    #[default]
    Identity,
    /// Keep integers, parse numeric strings, drop the rest
    Integer,
    /// Render scalars as strings, drop the rest
    String,
    Downcase,
    Upcase,
    Function(ConvertFn),
}

impl Convert {
    /// Look up a named conversion (as written in configuration files)
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "identity" | "none" => Some(Self::Identity),
            "integer" | "to_i" => Some(Self::Integer),
            "string" | "to_s" => Some(Self::String),
            "downcase" => Some(Self::Downcase),
            "upcase" => Some(Self::Upcase),
            _ => None,
        }
    }

    pub fn function<F>(f: F) -> Self
    where
        F: Fn(Vec<Value>, ListSide) -> Vec<Value> + Send + Sync + 'static,
    {
        Self::Function(Arc::new(f))
    }

    pub fn apply(&self, values: Vec<Value>, side: ListSide) -> Vec<Value> {
        match self {
            Self::Identity => values,
            Self::Integer => values
                .into_iter()
                .filter_map(|v| match v {
                    Value::Number(n) => n.as_i64().map(Value::from),
                    Value::String(s) => s.trim().parse::<i64>().ok().map(Value::from),
                    _ => None,
                })
                .collect(),
            Self::String => values
                .into_iter()
                .filter_map(|v| match v {
                    Value::String(s) => Some(Value::String(s)),
                    Value::Number(n) => Some(Value::String(n.to_string())),
                    Value::Bool(b) => Some(Value::String(b.to_string())),
                    _ => None,
                })
                .collect(),
            Self::Downcase => map_strings(values, |s| s.to_lowercase()),
            Self::Upcase => map_strings(values, |s| s.to_uppercase()),
            Self::Function(f) => f(values, side),
        }
    }
}

fn map_strings(values: Vec<Value>, f: impl Fn(&str) -> String) -> Vec<Value> {
    values
        .into_iter()
        .map(|v| match v {
            Value::String(s) => Value::String(f(&s)),
            other => other,
        })
        .collect()
}

impl fmt::Debug for Convert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Identity => write!(f, "Identity"),
            Self::Integer => write!(f, "Integer"),
            Self::String => write!(f, "String"),
            Self::Downcase => write!(f, "Downcase"),
            Self::Upcase => write!(f, "Upcase"),
            Self::Function(_) => write!(f, "Function(..)"),
        }
    }
}

/// Caller-supplied generator for custom filters
///
/// Receives the bind table of the running pass so it can allocate
/// placeholders, plus the filter name, its descriptor and the body value.
pub type CustomGenerator = Arc<
    dyn Fn(&mut SqlParams, &str, &FilterDescriptor, &Value) -> Result<String, FilterError>
        + Send
        + Sync,
>;

/// Static description of one named filter
#[derive(Clone)]
pub struct FilterDescriptor {
    pub kind: FilterKind,
    pub field: String,
    pub convert: Convert,
    pub class_name: Option<String>,
    pub generator: Option<CustomGenerator>,
}

impl FilterDescriptor {
    fn new(kind: FilterKind, field: &str) -> Self {
        Self {
            kind,
            field: field.to_string(),
            convert: Convert::default(),
            class_name: None,
            generator: None,
        }
    }

    pub fn reference(field: &str) -> Self {
        Self::new(FilterKind::Reference, field)
    }

    pub fn polymorphic_reference(field: &str) -> Self {
        Self::new(FilterKind::PolymorphicReference, field)
    }

    pub fn mapped_list(field: &str) -> Self {
        Self::new(FilterKind::MappedList, field)
    }

    pub fn timestamp_range(field: &str) -> Self {
        Self::new(FilterKind::TimestampRange, field)
    }

    pub fn passthrough() -> Self {
        Self::new(FilterKind::Passthrough, "")
    }

    pub fn custom<F>(field: &str, generator: F) -> Self
    where
        F: Fn(&mut SqlParams, &str, &FilterDescriptor, &Value) -> Result<String, FilterError>
            + Send
            + Sync
            + 'static,
    {
        let mut descriptor = Self::new(FilterKind::Custom, field);
        descriptor.generator = Some(Arc::new(generator));
        descriptor
    }

    pub fn with_class_name(mut self, class_name: &str) -> Self {
        self.class_name = Some(class_name.to_string());
        self
    }

    pub fn with_convert(mut self, convert: Convert) -> Self {
        self.convert = convert;
        self
    }
}

impl fmt::Debug for FilterDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterDescriptor")
            .field("kind", &self.kind)
            .field("field", &self.field)
            .field("convert", &self.convert)
            .field("class_name", &self.class_name)
            .field("generator", &self.generator.as_ref().map(|_| ".."))
            .finish()
    }
}

/// Ordered, immutable mapping of filter name to descriptor
///
/// Cloning is cheap; compilers built from the same set share it.
#[derive(Debug, Clone, Default)]
pub struct FilterSet {
    entries: Arc<Vec<(String, FilterDescriptor)>>,
}

impl FilterSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) a filter, returning the extended set
    pub fn with(self, name: &str, descriptor: FilterDescriptor) -> Self {
        let mut entries = Arc::unwrap_or_clone(self.entries);
        match entries.iter_mut().find(|(n, _)| n == name) {
            Some(entry) => entry.1 = descriptor,
            None => entries.push((name.to_string(), descriptor)),
        }
        Self {
            entries: Arc::new(entries),
        }
    }

    pub fn get(&self, name: &str) -> Option<&FilterDescriptor> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, d)| d)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FilterDescriptor)> {
        self.entries.iter().map(|(n, d)| (n.as_str(), d))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(String, FilterDescriptor)> for FilterSet {
    fn from_iter<I: IntoIterator<Item = (String, FilterDescriptor)>>(iter: I) -> Self {
        iter.into_iter()
            .fold(Self::new(), |set, (name, descriptor)| set.with(&name, descriptor))
    }
}

/// Result of compiling a body or a single filter
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    /// Parenthesized SQL fragment with `:pN` placeholders
    Sql(String),
    /// Nothing to constrain
    Empty,
    /// No row can possibly match; callers should skip the query
    NoMatch,
}

impl Predicate {
    pub fn as_sql(&self) -> Option<&str> {
        match self {
            Self::Sql(sql) => Some(sql),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    pub fn is_no_match(&self) -> bool {
        matches!(self, Self::NoMatch)
    }
}

/// Serializes as the SQL string, `null` (empty) or `false` (no match)
impl Serialize for Predicate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Sql(sql) => serializer.serialize_str(sql),
            Self::Empty => serializer.serialize_none(),
            Self::NoMatch => serializer.serialize_bool(false),
        }
    }
}

/// Value bound to a placeholder
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum BindValue {
    Integer(i64),
    Text(String),
    Timestamp(DateTime<Utc>),
    List(Vec<BindValue>),
    Json(Value),
}

impl From<Value> for BindValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Number(n) => match n.as_i64() {
                Some(i) => Self::Integer(i),
                None => Self::Json(Value::Number(n)),
            },
            Value::String(s) => Self::Text(s),
            Value::Array(items) => Self::List(items.into_iter().map(Self::from).collect()),
            other => Self::Json(other),
        }
    }
}

impl From<i64> for BindValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<String> for BindValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&str> for BindValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<DateTime<Utc>> for BindValue {
    fn from(value: DateTime<Utc>) -> Self {
        Self::Timestamp(value)
    }
}

impl<T: Into<BindValue>> From<Vec<T>> for BindValue {
    fn from(values: Vec<T>) -> Self {
        Self::List(values.into_iter().map(Into::into).collect())
    }
}
