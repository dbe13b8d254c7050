//! Polymorphic reference filter: objects of any class, matched by fingerprint

use serde_json::Value;

use super::render_membership;
use crate::filters::body::{SetBody, membership};
use crate::filters::error::FilterError;
use crate::filters::params::SqlParams;
use crate::filters::reference::resolve_fingerprint;
use crate::filters::types::{FilterDescriptor, Predicate};

pub(super) fn generate(
    params: &mut SqlParams,
    name: &str,
    descriptor: &FilterDescriptor,
    value: &Value,
) -> Result<Predicate, FilterError> {
    let body = SetBody::parse(name, value)?;

    let resolve = |elements: Vec<Value>| -> Vec<String> {
        elements
            .iter()
            .filter_map(|element| {
                let fingerprint = resolve_fingerprint(element);
                if fingerprint.is_none() {
                    tracing::trace!(filter = name, element = %element, "Dropping unresolvable reference");
                }
                fingerprint
            })
            .collect()
    };

    let set = membership(body.only.map(resolve), body.except.map(resolve));
    Ok(render_membership(params, &descriptor.field, set))
}
