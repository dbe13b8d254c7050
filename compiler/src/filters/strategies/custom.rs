//! Custom filter: delegates to the descriptor's generator function

use serde_json::Value;

use crate::filters::error::FilterError;
use crate::filters::params::SqlParams;
use crate::filters::types::{FilterDescriptor, Predicate};

pub(super) fn generate(
    params: &mut SqlParams,
    name: &str,
    descriptor: &FilterDescriptor,
    value: &Value,
) -> Result<Predicate, FilterError> {
    let generator = descriptor
        .generator
        .as_ref()
        .ok_or_else(|| FilterError::MissingGenerator(name.to_string()))?;

    if value.is_null() {
        return Ok(Predicate::Empty);
    }
    let sql = generator(params, name, descriptor, value)?;
    if sql.trim().is_empty() {
        return Ok(Predicate::Empty);
    }
    Ok(Predicate::Sql(sql))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::types::{BindValue, FilterKind};
    use serde_json::json;

    fn score() -> FilterDescriptor {
        FilterDescriptor::custom("posts.score", |params, name, descriptor, value| {
            let min = value
                .get("min")
                .and_then(Value::as_i64)
                .ok_or_else(|| FilterError::custom(format!("{} requires 'min'", name)))?;
            Ok(format!("({} >= {})", descriptor.field, params.placeholder(min)))
        })
    }

    #[test]
    fn generator_allocates_parameters() {
        let mut params = SqlParams::default();
        let predicate = generate(&mut params, "score", &score(), &json!({"min": 10})).unwrap();
        assert_eq!(predicate, Predicate::Sql("(posts.score >= :p1)".into()));
        assert_eq!(params.get("p1"), Some(&BindValue::Integer(10)));
    }

    #[test]
    fn generator_errors_propagate_unchanged() {
        let mut params = SqlParams::default();
        let err = generate(&mut params, "score", &score(), &json!({})).unwrap_err();
        assert_eq!(err, FilterError::Custom("score requires 'min'".into()));
    }

    #[test]
    fn missing_generator() {
        let mut params = SqlParams::default();
        let mut descriptor = FilterDescriptor::passthrough();
        descriptor.kind = FilterKind::Custom;
        let err = generate(&mut params, "score", &descriptor, &json!({})).unwrap_err();
        assert_eq!(err, FilterError::MissingGenerator("score".into()));
    }

    #[test]
    fn null_value_skips_generator() {
        let mut params = SqlParams::default();
        let predicate = generate(&mut params, "score", &score(), &Value::Null).unwrap();
        assert_eq!(predicate, Predicate::Empty);
        assert!(params.is_empty());
    }

    #[test]
    fn blank_output_is_empty() {
        let mut params = SqlParams::default();
        let descriptor = FilterDescriptor::custom("x", |_, _, _, _| Ok(String::new()));
        let predicate = generate(&mut params, "x", &descriptor, &json!(1)).unwrap();
        assert_eq!(predicate, Predicate::Empty);
    }
}
