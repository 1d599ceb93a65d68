//! Recursive value mapper: the single recursion point shared by parsing and
//! validation.
//!
//! [`map_values`] walks a value against a schema's params in declaration
//! order, mirrors the declared structure (records of arrays of records, to
//! arbitrary depth), and invokes a caller-supplied transform at each leaf
//! with a dotted path for error reporting.
//!
//! Nested-schema fields are leaves from the mapper's point of view: the
//! transform receives the full descriptor and delegates into the nested
//! schema's own operations, so a nested schema keeps its own parsers and
//! validators wherever it is embedded. Absent nested values map to `Null`
//! without invoking the transform — defaulting stays a per-leaf concern.

use crate::params::{FieldDescriptor, FieldType, Params};
use crate::value::{to_array, Record, Value};

/// Maps `values` against `params`, invoking `transform` at each leaf.
///
/// The transform receives the raw value (`None` when absent), the field's
/// descriptor, the field name, the dotted path, and the output record built
/// so far. Output preserves the params' key set and order; array results
/// mirror the coerced input shape. Non-record input is treated as empty.
///
/// # Errors
///
/// Forwards the first error returned by the transform.
pub fn map_values<F, E>(
    values: &Value,
    params: &Params,
    path_prefix: Option<&str>,
    transform: &mut F,
) -> Result<Value, E>
where
    F: FnMut(Option<&Value>, &FieldDescriptor, &str, &str, &Record) -> Result<Value, E>,
{
    let empty = Record::new();
    let input = values.as_record().unwrap_or(&empty);
    let mut output = Record::new();
    for (name, descriptor) in params {
        let value = input.get(name);
        let path = match path_prefix {
            Some(prefix) => format!("{prefix}.{name}"),
            None => name.clone(),
        };
        let mapped = map_field(value, descriptor, name, &path, &output, transform)?;
        output.insert(name.clone(), mapped);
    }
    Ok(Value::Record(output))
}

fn map_field<F, E>(
    value: Option<&Value>,
    descriptor: &FieldDescriptor,
    name: &str,
    path: &str,
    so_far: &Record,
    transform: &mut F,
) -> Result<Value, E>
where
    F: FnMut(Option<&Value>, &FieldDescriptor, &str, &str, &Record) -> Result<Value, E>,
{
    match &descriptor.field_type {
        FieldType::ArrayOf(inner) => {
            let items = to_array(value);
            let mut mapped = Vec::with_capacity(items.len());
            for (index, item) in items.iter().enumerate() {
                let item_path = format!("{path}.{index}");
                mapped.push(map_field(
                    Some(item),
                    inner,
                    name,
                    &item_path,
                    so_far,
                    transform,
                )?);
            }
            Ok(Value::Array(mapped))
        }
        FieldType::Nested(_) if value.map_or(true, Value::is_null) => Ok(Value::Null),
        FieldType::Nested(_) | FieldType::Primitive(_) => {
            transform(value, descriptor, name, path, so_far)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::convert::Infallible;

    use super::*;
    use crate::decl;
    use crate::schema::Schema;

    /// Runs the mapper and records every transform invocation as
    /// `(path, value)`, echoing the value back into the output.
    fn collect(values: &Value, schema: &Schema) -> (Value, Vec<(String, Option<Value>)>) {
        let mut calls = Vec::new();
        let result = map_values::<_, Infallible>(
            values,
            schema.params(),
            None,
            &mut |value, _descriptor, _name, path, _so_far| {
                calls.push((path.to_string(), value.cloned()));
                Ok(value.cloned().unwrap_or(Value::Null))
            },
        );
        let mapped = result.unwrap();
        (mapped, calls)
    }

    // ---- Shape and order ----

    #[test]
    fn output_preserves_param_order_and_key_set() {
        let schema = Schema::define([("b", decl::string()), ("a", decl::int())]).unwrap();
        let (mapped, _) = collect(&Value::record([("a", Value::Int(1))]), &schema);
        let record = mapped.as_record().unwrap();
        let keys: Vec<&String> = record.keys().collect();
        assert_eq!(keys, ["b", "a"]);
        assert_eq!(record["b"], Value::Null);
    }

    #[test]
    fn absent_scalar_still_reaches_transform() {
        let schema = Schema::define([("foo", decl::string())]).unwrap();
        let (_, calls) = collect(&Value::Null, &schema);
        assert_eq!(calls, vec![("foo".to_string(), None)]);
    }

    #[test]
    fn non_record_input_is_treated_as_empty() {
        let schema = Schema::define([("foo", decl::string())]).unwrap();
        let (mapped, _) = collect(&Value::Int(42), &schema);
        assert_eq!(mapped.as_record().unwrap()["foo"], Value::Null);
    }

    // ---- Arrays ----

    #[test]
    fn array_elements_get_indexed_paths() {
        let schema = Schema::define([("tags", decl::list(decl::string()))]).unwrap();
        let input = Value::record([("tags", vec!["a", "b"])]);
        let (_, calls) = collect(&input, &schema);
        let paths: Vec<&str> = calls.iter().map(|(p, _)| p.as_str()).collect();
        assert_eq!(paths, ["tags.0", "tags.1"]);
    }

    #[test]
    fn scalar_becomes_one_element_array() {
        let schema = Schema::define([("tags", decl::list(decl::string()))]).unwrap();
        let input = Value::record([("tags", "solo")]);
        let (mapped, calls) = collect(&input, &schema);
        assert_eq!(
            mapped.as_record().unwrap()["tags"],
            Value::Array(vec![Value::String("solo".to_string())])
        );
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "tags.0");
    }

    #[test]
    fn missing_array_maps_to_empty_without_transform_calls() {
        let schema = Schema::define([("tags", decl::list(decl::string()))]).unwrap();
        let (mapped, calls) = collect(&Value::record([("x", Value::Int(1))]), &schema);
        assert_eq!(mapped.as_record().unwrap()["tags"], Value::Array(vec![]));
        assert!(calls.is_empty());
    }

    #[test]
    fn array_of_array_recurses_with_deep_paths() {
        let schema =
            Schema::define([("grid", decl::list(decl::list(decl::int())))]).unwrap();
        let input = Value::record([(
            "grid",
            Value::Array(vec![
                Value::Array(vec![Value::Int(1), Value::Int(2)]),
                Value::Int(3),
            ]),
        )]);
        let (mapped, calls) = collect(&input, &schema);
        let paths: Vec<&str> = calls.iter().map(|(p, _)| p.as_str()).collect();
        assert_eq!(paths, ["grid.0.0", "grid.0.1", "grid.1.0"]);
        // The stray scalar element is wrapped one level deeper.
        assert_eq!(
            mapped.as_record().unwrap()["grid"],
            Value::Array(vec![
                Value::Array(vec![Value::Int(1), Value::Int(2)]),
                Value::Array(vec![Value::Int(3)]),
            ])
        );
    }

    // ---- Nested schemas ----

    #[test]
    fn present_nested_value_is_a_single_leaf_call() {
        let child = Schema::define([("name", decl::string())]).unwrap();
        let schema = Schema::define([("teacher", decl::schema(&child))]).unwrap();
        let input = Value::record([("teacher", Value::record([("name", "Grace")]))]);
        let (_, calls) = collect(&input, &schema);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "teacher");
    }

    #[test]
    fn absent_nested_value_maps_to_null_without_transform() {
        let child = Schema::define([("name", decl::string())]).unwrap();
        let schema = Schema::define([("teacher", decl::schema(&child))]).unwrap();
        let (mapped, calls) = collect(&Value::record([("other", Value::Int(1))]), &schema);
        assert_eq!(mapped.as_record().unwrap()["teacher"], Value::Null);
        assert!(calls.is_empty());
    }

    #[test]
    fn nested_inside_array_gets_indexed_paths() {
        let child = Schema::define([("name", decl::string())]).unwrap();
        let schema = Schema::define([("students", decl::list(decl::schema(&child)))]).unwrap();
        let input = Value::record([(
            "students",
            Value::Array(vec![
                Value::record([("name", "foo")]),
                Value::record([("name", "bar")]),
            ]),
        )]);
        let (_, calls) = collect(&input, &schema);
        let paths: Vec<&str> = calls.iter().map(|(p, _)| p.as_str()).collect();
        assert_eq!(paths, ["students.0", "students.1"]);
    }

    // ---- The so-far record ----

    #[test]
    fn transform_sees_previously_mapped_fields() {
        let schema = Schema::define([("a", decl::int()), ("b", decl::int())]).unwrap();
        let input = Value::record([("a", Value::Int(1)), ("b", Value::Int(2))]);
        let mut seen_a = None;
        let result = map_values::<_, Infallible>(
            &input,
            schema.params(),
            None,
            &mut |value, _d, name, _path, so_far| {
                if name == "b" {
                    seen_a = so_far.get("a").cloned();
                }
                Ok(value.cloned().unwrap_or(Value::Null))
            },
        );
        result.unwrap();
        assert_eq!(seen_a, Some(Value::Int(1)));
    }

    // ---- Path prefixes ----

    #[test]
    fn path_prefix_is_prepended() {
        let schema = Schema::define([("foo", decl::string())]).unwrap();
        let mut paths = Vec::new();
        let result = map_values::<_, Infallible>(
            &Value::record([("foo", "x")]),
            schema.params(),
            Some("outer"),
            &mut |value, _d, _n, path, _s| {
                paths.push(path.to_string());
                Ok(value.cloned().unwrap_or(Value::Null))
            },
        );
        result.unwrap();
        assert_eq!(paths, ["outer.foo"]);
    }
}
