//! Mapped list filter: arbitrary scalars passed through the descriptor's conversion

use serde_json::Value;

use super::render_membership;
use crate::filters::body::{SetBody, membership};
use crate::filters::error::FilterError;
use crate::filters::params::SqlParams;
use crate::filters::types::{BindValue, FilterDescriptor, ListSide, Predicate};

pub(super) fn generate(
    params: &mut SqlParams,
    name: &str,
    descriptor: &FilterDescriptor,
    value: &Value,
) -> Result<Predicate, FilterError> {
    let body = SetBody::parse(name, value)?;
    let convert = move |side: ListSide| {
        move |values: Vec<Value>| -> Vec<BindValue> {
            descriptor
                .convert
                .apply(values, side)
                .into_iter()
                .map(BindValue::from)
                .collect()
        }
    };

    let set = membership(
        body.only.map(convert(ListSide::Only)),
        body.except.map(convert(ListSide::Except)),
    );
    Ok(render_membership(params, &descriptor.field, set))
}
