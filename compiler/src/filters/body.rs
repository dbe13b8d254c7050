//! Filter body acceptance and normalization
//!
//! A body is an ordered key-value mapping. Callers may hand over a JSON
//! object directly or a request-parameter container using bracket notation
//! (`author[only][]=User/1`), which is converted to the nested mapping.

use std::borrow::Cow;

use serde_json::{Map, Value};

use super::compiler::MAX_BODY_DEPTH;
use super::error::FilterError;

/// Maximum bracket segments in one request-parameter key
///
/// Room for `MAX_BODY_DEPTH` combinators plus the filter name, a set side
/// and a trailing `[]`. Longer keys are kept flat.
pub const MAX_KEY_SEGMENTS: usize = MAX_BODY_DEPTH + 4;

/// Anything that can be compiled as a filter body
pub trait FilterBody {
    /// The body as a JSON mapping, or `None` when the shape is not acceptable
    fn as_body(&self) -> Option<Cow<'_, Value>>;
}

impl FilterBody for Value {
    fn as_body(&self) -> Option<Cow<'_, Value>> {
        self.is_object().then_some(Cow::Borrowed(self))
    }
}

impl FilterBody for Map<String, Value> {
    fn as_body(&self) -> Option<Cow<'_, Value>> {
        Some(Cow::Owned(Value::Object(self.clone())))
    }
}

impl FilterBody for RequestParams {
    fn as_body(&self) -> Option<Cow<'_, Value>> {
        Some(Cow::Owned(self.to_body()))
    }
}

/// Request-parameter container: decoded `(key, value)` pairs in bracket notation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestParams {
    pairs: Vec<(String, String)>,
}

impl RequestParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, key: &str, value: &str) {
        self.pairs.push((key.to_string(), value.to_string()));
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Convert to a nested ordered mapping
    ///
    /// `[]` appends to a list, `[key]` descends into a mapping. A later scalar
    /// for the same key overwrites an earlier one. Keys without a name
    /// (`""`, `[]`, `[x]`) are skipped, so the result is always a mapping.
    pub fn to_body(&self) -> Value {
        let mut root = Value::Object(Map::new());
        for (key, value) in &self.pairs {
            let segments = split_key(key);
            match segments.first() {
                Some(head) if !head.is_empty() => insert_segments(&mut root, &segments, value),
                _ => tracing::trace!(key = %key, "Skipping request parameter without a name"),
            }
        }
        root
    }
}

impl<K: AsRef<str>, V: AsRef<str>> FromIterator<(K, V)> for RequestParams {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = Self::new();
        for (key, value) in iter {
            params.push(key.as_ref(), value.as_ref());
        }
        params
    }
}

/// Split `a[b][]` into `["a", "b", ""]`; malformed or overly deep keys stay whole
fn split_key(key: &str) -> Vec<&str> {
    let Some(open) = key.find('[') else {
        return vec![key];
    };
    let mut segments = vec![&key[..open]];
    let mut rest = &key[open..];
    while let Some(stripped) = rest.strip_prefix('[') {
        if segments.len() >= MAX_KEY_SEGMENTS {
            return vec![key];
        }
        let Some(close) = stripped.find(']') else {
            return vec![key];
        };
        segments.push(&stripped[..close]);
        rest = &stripped[close + 1..];
    }
    if !rest.is_empty() {
        return vec![key];
    }
    segments
}

fn insert_segments(node: &mut Value, segments: &[&str], value: &str) {
    let Some((head, rest)) = segments.split_first() else {
        *node = Value::String(value.to_string());
        return;
    };

    if head.is_empty() {
        if !node.is_array() {
            *node = Value::Array(Vec::new());
        }
        let Value::Array(items) = node else {
            return;
        };
        if rest.is_empty() {
            items.push(Value::String(value.to_string()));
            return;
        }
        // Rack semantics: keep filling the last mapping until a key repeats
        let reuse_last = matches!(
            (items.last(), rest.first()),
            (Some(Value::Object(last)), Some(next)) if !last.contains_key(*next)
        );
        if !reuse_last {
            items.push(Value::Object(Map::new()));
        }
        if let Some(last) = items.last_mut() {
            insert_segments(last, rest, value);
        }
        return;
    }

    if !node.is_object() {
        *node = Value::Object(Map::new());
    }
    if let Value::Object(map) = node {
        let child = map.entry(head.to_string()).or_insert(Value::Null);
        insert_segments(child, rest, value);
    }
}

/// `{only, except}` lists of a set filter, before resolution
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SetBody {
    pub only: Option<Vec<Value>>,
    pub except: Option<Vec<Value>>,
}

impl SetBody {
    /// Read a set filter value
    ///
    /// A bare list (or scalar) is read as `only`; `null` means no criteria.
    pub fn parse(filter: &str, value: &Value) -> Result<Self, FilterError> {
        match value {
            Value::Null => Ok(Self::default()),
            Value::Object(map) => Ok(Self {
                only: map.get("only").and_then(as_list),
                except: map.get("except").and_then(as_list),
            }),
            Value::Array(_) | Value::String(_) | Value::Number(_) => Ok(Self {
                only: as_list(value),
                except: None,
            }),
            Value::Bool(_) => Err(FilterError::invalid_value(
                filter,
                "expected {only, except} lists",
            )),
        }
    }
}

fn as_list(value: &Value) -> Option<Vec<Value>> {
    match value {
        Value::Null => None,
        Value::Array(items) => Some(items.clone()),
        scalar => Some(vec![scalar.clone()]),
    }
}

/// Effective membership test after `only`/`except` set algebra
#[derive(Debug, Clone, PartialEq)]
pub enum Membership<T> {
    In(Vec<T>),
    NotIn(Vec<T>),
    /// No restriction
    Empty,
    /// `only` fully cancelled by `except`
    NoMatch,
}

/// Apply set algebra to resolved `only`/`except` lists
pub fn membership<T: PartialEq>(only: Option<Vec<T>>, except: Option<Vec<T>>) -> Membership<T> {
    match (only.map(dedup), except.map(dedup)) {
        (None, None) => Membership::Empty,
        (Some(only), None) if only.is_empty() => Membership::Empty,
        (Some(only), None) => Membership::In(only),
        (Some(only), Some(except)) => {
            let effective = difference(only, &except);
            if effective.is_empty() {
                Membership::NoMatch
            } else {
                Membership::In(effective)
            }
        }
        (None, Some(except)) if except.is_empty() => Membership::Empty,
        (None, Some(except)) => Membership::NotIn(except),
    }
}

/// Remove duplicates, keeping the first occurrence
pub fn dedup<T: PartialEq>(values: Vec<T>) -> Vec<T> {
    let mut out: Vec<T> = Vec::with_capacity(values.len());
    for value in values {
        if !out.contains(&value) {
            out.push(value);
        }
    }
    out
}

/// Elements of `left` not present in `right`, order preserved
pub fn difference<T: PartialEq>(left: Vec<T>, right: &[T]) -> Vec<T> {
    left.into_iter().filter(|v| !right.contains(v)).collect()
}
