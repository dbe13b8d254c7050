//! Timestamp range filter
//!
//! Each key of the value selects one comparison. Range forms are reordered so
//! bounds are always bound ascending.

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::filters::error::FilterError;
use crate::filters::params::SqlParams;
use crate::filters::types::{FilterDescriptor, Predicate};
use crate::utils::time::parse_timestamp;

/// Comparison keyword of a timestamp range filter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeOp {
    At,
    NotAt,
    After,
    AtOrAfter,
    Before,
    AtOrBefore,
    Between,
    NotBetween,
}

impl RangeOp {
    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "at" => Some(Self::At),
            "not_at" => Some(Self::NotAt),
            "after" => Some(Self::After),
            "at_or_after" => Some(Self::AtOrAfter),
            "before" => Some(Self::Before),
            "at_or_before" => Some(Self::AtOrBefore),
            "between" => Some(Self::Between),
            "not_between" => Some(Self::NotBetween),
            _ => None,
        }
    }

    pub fn sql(&self) -> &'static str {
        match self {
            Self::At => "=",
            Self::NotAt => "!=",
            Self::After => ">",
            Self::AtOrAfter => ">=",
            Self::Before => "<",
            Self::AtOrBefore => "<=",
            Self::Between => "BETWEEN",
            Self::NotBetween => "NOT BETWEEN",
        }
    }

    fn is_range(&self) -> bool {
        matches!(self, Self::Between | Self::NotBetween)
    }
}

pub(super) fn generate(
    params: &mut SqlParams,
    name: &str,
    descriptor: &FilterDescriptor,
    value: &Value,
) -> Result<Predicate, FilterError> {
    let comparisons = match value {
        Value::Null => return Ok(Predicate::Empty),
        Value::Object(map) => map,
        _ => {
            return Err(FilterError::invalid_value(
                name,
                "expected a mapping of comparison to timestamp",
            ));
        }
    };

    let field = &descriptor.field;
    let mut parts = Vec::with_capacity(comparisons.len());
    for (key, operand) in comparisons {
        let op = RangeOp::from_key(key).ok_or_else(|| FilterError::UnknownComparison {
            filter: name.to_string(),
            operator: key.clone(),
        })?;

        if op.is_range() {
            let (low, high) = bounds(name, operand)?;
            let low = params.placeholder(low);
            let high = params.placeholder(high);
            parts.push(format!("{} {} {} AND {}", field, op.sql(), low, high));
        } else {
            let at = timestamp(name, operand)?;
            let placeholder = params.placeholder(at);
            parts.push(format!("{} {} {}", field, op.sql(), placeholder));
        }
    }

    if parts.is_empty() {
        return Ok(Predicate::Empty);
    }
    Ok(Predicate::Sql(format!("({})", parts.join(" AND "))))
}

fn timestamp(name: &str, value: &Value) -> Result<DateTime<Utc>, FilterError> {
    parse_timestamp(value)
        .ok_or_else(|| FilterError::invalid_value(name, format!("invalid timestamp: {}", value)))
}

/// Two timestamps, ascending
fn bounds(name: &str, value: &Value) -> Result<(DateTime<Utc>, DateTime<Utc>), FilterError> {
    let [first, second] = value.as_array().map(Vec::as_slice).unwrap_or_default() else {
        return Err(FilterError::invalid_value(
            name,
            "range expects exactly two timestamps",
        ));
    };
    let first = timestamp(name, first)?;
    let second = timestamp(name, second)?;
    if first > second {
        Ok((second, first))
    } else {
        Ok((first, second))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::types::BindValue;
    use chrono::TimeZone;
    use serde_json::json;

    fn created() -> FilterDescriptor {
        FilterDescriptor::timestamp_range("posts.created_at")
    }

    fn compile(value: Value) -> (Result<Predicate, FilterError>, SqlParams) {
        let mut params = SqlParams::default();
        let result = generate(&mut params, "created", &created(), &value);
        (result, params)
    }

    #[test]
    fn single_comparisons() {
        let cases = [
            ("at", "="),
            ("not_at", "!="),
            ("after", ">"),
            ("at_or_after", ">="),
            ("before", "<"),
            ("at_or_before", "<="),
        ];

        for (key, sql_op) in cases {
            let (result, params) = compile(json!({ key: "2024-01-01T00:00:00Z" }));
            assert_eq!(
                result.unwrap(),
                Predicate::Sql(format!("(posts.created_at {} :p1)", sql_op))
            );
            assert_eq!(
                params.get("p1"),
                Some(&BindValue::Timestamp(
                    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
                ))
            );
        }
    }

    #[test]
    fn between_reorders_bounds() {
        let (result, params) = compile(json!({"between": ["2024-06-01", "2024-01-01"]}));
        assert_eq!(
            result.unwrap(),
            Predicate::Sql("(posts.created_at BETWEEN :p1 AND :p2)".into())
        );
        let earlier = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let later = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        assert_eq!(params.get("p1"), Some(&BindValue::Timestamp(earlier)));
        assert_eq!(params.get("p2"), Some(&BindValue::Timestamp(later)));
    }

    #[test]
    fn not_between() {
        let (result, _) = compile(json!({"not_between": ["2024-01-01", "2024-02-01"]}));
        assert_eq!(
            result.unwrap(),
            Predicate::Sql("(posts.created_at NOT BETWEEN :p1 AND :p2)".into())
        );
    }

    #[test]
    fn several_comparisons_are_anded() {
        let (result, params) = compile(json!({"after": "2024-01-01", "before": "2024-02-01"}));
        assert_eq!(
            result.unwrap(),
            Predicate::Sql("(posts.created_at > :p1 AND posts.created_at < :p2)".into())
        );
        assert_eq!(params.len(), 2);
    }

    #[test]
    fn unknown_comparison_raises() {
        let (result, _) = compile(json!({"around": "2024-01-01"}));
        assert_eq!(
            result.unwrap_err(),
            FilterError::UnknownComparison {
                filter: "created".into(),
                operator: "around".into(),
            }
        );
    }

    #[test]
    fn malformed_values_raise() {
        let (result, _) = compile(json!({"between": ["2024-01-01"]}));
        assert!(matches!(result, Err(FilterError::InvalidValue { .. })));

        let (result, _) = compile(json!({"at": "soon"}));
        assert!(matches!(result, Err(FilterError::InvalidValue { .. })));

        let (result, _) = compile(json!("2024-01-01"));
        assert!(matches!(result, Err(FilterError::InvalidValue { .. })));
    }

    #[test]
    fn empty_values_emit_nothing() {
        assert_eq!(compile(json!(null)).0.unwrap(), Predicate::Empty);
        assert_eq!(compile(json!({})).0.unwrap(), Predicate::Empty);
    }
}
