//! Parse engine: defaults, type coercion, and rule parsers.
//!
//! Parsing is synchronous and total: whatever the input, the result is a
//! record with exactly the schema's field set, in declaration order. Bad
//! input degrades through best-effort coercion; it never fails the call.
//! Nested-schema fields delegate to the nested schema's own `parse`, so
//! custom parsers merged into a child schema stay effective when the child
//! is embedded elsewhere.

use std::convert::Infallible;

use tracing::trace;

use crate::decl::parse_rule_option;
use crate::map::map_values;
use crate::params::{FieldDescriptor, FieldType};
use crate::schema::Schema;
use crate::value::{Record, Value};

/// Parses `values` against the schema.
pub(crate) fn parse_values(schema: &Schema, values: &Value) -> Value {
    trace!(fields = schema.params().len(), "parsing record");
    let result = map_values::<_, Infallible>(
        values,
        schema.params(),
        None,
        &mut |value, descriptor, _name, _path, so_far| {
            Ok(apply_parsers(schema, value, descriptor, so_far))
        },
    );
    match result {
        Ok(parsed) => parsed,
        Err(never) => match never {},
    }
}

/// Transforms one leaf: default substitution, then the type step, then every
/// declared rule with a registered parser, threading the value through each
/// in declaration order.
fn apply_parsers(
    schema: &Schema,
    value: Option<&Value>,
    descriptor: &FieldDescriptor,
    so_far: &Record,
) -> Value {
    let mut current = match value {
        None | Some(Value::Null) => descriptor.default.clone().unwrap_or(Value::Null),
        Some(present) => present.clone(),
    };
    current = match &descriptor.field_type {
        FieldType::Primitive(kind) => kind.coerce(current),
        FieldType::Nested(nested) => nested.parse(&current),
        // Arrays are dispatched per element by the mapper.
        FieldType::ArrayOf(_) => current,
    };
    for (rule, config) in &descriptor.rules {
        if let Some(parser) = schema.parsers().get(rule.as_str()) {
            let option = parse_rule_option(config, rule != "enum");
            current = parser(current, &option, so_far, schema.params());
        }
    }
    current
}
