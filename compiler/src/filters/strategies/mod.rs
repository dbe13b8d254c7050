//! Generator strategies
//!
//! One strategy per [`FilterKind`]. Each turns a named filter, its descriptor
//! and the body value into a predicate fragment, binding values into the
//! running pass's [`SqlParams`].

mod custom;
mod mapped_list;
mod polymorphic;
mod reference;
mod timestamp_range;

use serde_json::Value;

use super::body::Membership;
use super::error::FilterError;
use super::params::SqlParams;
use super::types::{BindValue, FilterDescriptor, FilterKind, Predicate};

pub use timestamp_range::RangeOp;

/// Compile one named filter
pub fn generate_simple_clause(
    params: &mut SqlParams,
    name: &str,
    descriptor: &FilterDescriptor,
    value: &Value,
) -> Result<Predicate, FilterError> {
    let predicate = match descriptor.kind {
        FilterKind::Reference => reference::generate(params, name, descriptor, value)?,
        FilterKind::PolymorphicReference => {
            polymorphic::generate(params, name, descriptor, value)?
        }
        FilterKind::MappedList => mapped_list::generate(params, name, descriptor, value)?,
        FilterKind::TimestampRange => timestamp_range::generate(params, name, descriptor, value)?,
        FilterKind::Custom => custom::generate(params, name, descriptor, value)?,
        FilterKind::Passthrough => Predicate::Empty,
    };
    tracing::trace!(filter = name, kind = %descriptor.kind, predicate = ?predicate, "Compiled filter");
    Ok(predicate)
}

/// Render an `IN`/`NOT IN` test with the whole set bound to one placeholder
fn render_membership<T: Into<BindValue>>(
    params: &mut SqlParams,
    field: &str,
    membership: Membership<T>,
) -> Predicate {
    match membership {
        Membership::In(values) => {
            let placeholder = params.placeholder(values);
            Predicate::Sql(format!("({} IN ({}))", field, placeholder))
        }
        Membership::NotIn(values) => {
            let placeholder = params.placeholder(values);
            Predicate::Sql(format!("({} NOT IN ({}))", field, placeholder))
        }
        Membership::Empty => Predicate::Empty,
        Membership::NoMatch => Predicate::NoMatch,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn passthrough_emits_nothing() {
        let mut params = SqlParams::default();
        let predicate = generate_simple_clause(
            &mut params,
            "order",
            &FilterDescriptor::passthrough(),
            &json!({"only": [1]}),
        )
        .unwrap();
        assert_eq!(predicate, Predicate::Empty);
        assert!(params.is_empty());
    }

    #[test]
    fn render_membership_binds_one_list() {
        let mut params = SqlParams::default();
        let predicate = render_membership(&mut params, "t.id", Membership::NotIn(vec![1_i64, 2]));
        assert_eq!(predicate, Predicate::Sql("(t.id NOT IN (:p1))".into()));
        assert_eq!(
            params.get("p1"),
            Some(&BindValue::List(vec![BindValue::Integer(1), BindValue::Integer(2)]))
        );
    }

    #[test]
    fn render_membership_no_match_binds_nothing() {
        let mut params = SqlParams::default();
        let predicate = render_membership::<i64>(&mut params, "t.id", Membership::NoMatch);
        assert_eq!(predicate, Predicate::NoMatch);
        assert!(params.is_empty());
    }
}
