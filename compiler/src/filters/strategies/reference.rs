//! Reference filter: objects of one class, matched by numeric id

use serde_json::Value;

use super::render_membership;
use crate::filters::body::{SetBody, membership};
use crate::filters::error::FilterError;
use crate::filters::params::SqlParams;
use crate::filters::reference::resolve_id;
use crate::filters::types::{FilterDescriptor, Predicate};

pub(super) fn generate(
    params: &mut SqlParams,
    name: &str,
    descriptor: &FilterDescriptor,
    value: &Value,
) -> Result<Predicate, FilterError> {
    let body = SetBody::parse(name, value)?;
    let class_name = descriptor.class_name.as_deref();

    let resolve = |elements: Vec<Value>| -> Vec<i64> {
        elements
            .iter()
            .filter_map(|element| {
                let id = resolve_id(element, class_name);
                if id.is_none() {
                    tracing::trace!(filter = name, element = %element, "Dropping unresolvable reference");
                }
                id
            })
            .collect()
    };

    let set = membership(body.only.map(resolve), body.except.map(resolve));
    Ok(render_membership(params, &descriptor.field, set))
}
