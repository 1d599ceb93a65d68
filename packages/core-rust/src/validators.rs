//! Built-in validators seeded into every schema.
//!
//! Each validator checks one rule against one leaf value and reports a
//! [`ValidatorOutcome`]. Misconfigured rules (a `match` without a pattern, an
//! `enum` without an array) are configuration errors, not validation
//! failures. The `type` validator is the async recursion point: when a
//! field's type is a nested schema, it defers to that schema's own
//! validation and reports a pending outcome.

use std::cmp::Ordering;
use std::sync::Arc;

use crate::decl::{parse_rule_option, RuleDecl, RuleOption};
use crate::error::SchemaError;
use crate::params::FieldType;
use crate::schema::{ValidatorFn, ValidatorMap};
use crate::validate::{PendingCheck, PendingOutcome, ValidatorCtx, ValidatorOutcome};
use crate::value::{PrimitiveKind, Value};

/// The built-in validator registry: `type`, `required`, `match`, `enum`,
/// `max`, `min`, `maxlength`, `minlength`, and the composite `validate`.
pub(crate) fn builtins() -> ValidatorMap {
    let mut validators = ValidatorMap::new();
    validators.insert("type".to_string(), Arc::new(type_rule) as ValidatorFn);
    validators.insert("required".to_string(), Arc::new(required) as ValidatorFn);
    validators.insert("match".to_string(), Arc::new(match_rule) as ValidatorFn);
    validators.insert("enum".to_string(), Arc::new(enum_rule) as ValidatorFn);
    validators.insert("max".to_string(), Arc::new(max) as ValidatorFn);
    validators.insert("min".to_string(), Arc::new(min) as ValidatorFn);
    validators.insert("maxlength".to_string(), Arc::new(maxlength) as ValidatorFn);
    validators.insert("minlength".to_string(), Arc::new(minlength) as ValidatorFn);
    validators.insert("validate".to_string(), Arc::new(validate_rule) as ValidatorFn);
    validators
}

fn invalid(option: &RuleOption, default_message: String) -> ValidatorOutcome {
    ValidatorOutcome::Invalid {
        message: Some(option.message.clone().unwrap_or(default_message)),
    }
}

/// Primitive and array fields always pass (coercion already ran during
/// parse); nested-schema fields defer to the nested schema's validation.
fn type_rule(ctx: &ValidatorCtx<'_>) -> Result<ValidatorOutcome, SchemaError> {
    match &ctx.descriptor.field_type {
        FieldType::Nested(schema) => {
            let schema = schema.clone();
            let value = ctx.value.clone();
            Ok(ValidatorOutcome::Pending(PendingCheck::new(async move {
                match schema.validate(value).await {
                    Ok(_) => PendingOutcome::Valid,
                    Err(crate::error::ValidateError::Invalid(errors)) => {
                        PendingOutcome::Nested(errors)
                    }
                    Err(crate::error::ValidateError::Config(e)) => PendingOutcome::Config(e),
                }
            })))
        }
        FieldType::Primitive(_) | FieldType::ArrayOf(_) => Ok(ValidatorOutcome::Valid),
    }
}

/// Fails on `Null`, the empty string, and NaN when the option is truthy.
fn required(ctx: &ValidatorCtx<'_>) -> Result<ValidatorOutcome, SchemaError> {
    let demanded = match &ctx.option.value {
        RuleDecl::Value(v) => v.truthy(),
        _ => true,
    };
    let missing = match ctx.value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Float(f) => f.is_nan(),
        _ => false,
    };
    if demanded && missing {
        Ok(invalid(ctx.option, "{PARAM} is required".to_string()))
    } else {
        Ok(ValidatorOutcome::Valid)
    }
}

/// Falsy values pass; anything else must match the pattern in string form.
fn match_rule(ctx: &ValidatorCtx<'_>) -> Result<ValidatorOutcome, SchemaError> {
    let RuleDecl::Pattern(pattern) = &ctx.option.value else {
        return Err(SchemaError::InvalidRuleOption {
            rule: "match".to_string(),
            path: ctx.path.to_string(),
            expected: "a regular expression",
        });
    };
    let valid = !ctx.value.truthy()
        || match PrimitiveKind::String.coerce(ctx.value.clone()) {
            Value::String(s) => pattern.is_match(&s),
            _ => false,
        };
    if valid {
        Ok(ValidatorOutcome::Valid)
    } else {
        Ok(invalid(ctx.option, "{PARAM} does not match".to_string()))
    }
}

/// The value must be one of the configured alternatives.
fn enum_rule(ctx: &ValidatorCtx<'_>) -> Result<ValidatorOutcome, SchemaError> {
    let RuleDecl::Value(Value::Array(allowed)) = &ctx.option.value else {
        return Err(SchemaError::InvalidRuleOption {
            rule: "enum".to_string(),
            path: ctx.path.to_string(),
            expected: "an array of allowed values",
        });
    };
    if allowed.contains(ctx.value) {
        Ok(ValidatorOutcome::Valid)
    } else {
        let alternatives = allowed
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        Ok(invalid(
            ctx.option,
            format!("{{PARAM}} must be one of the following: {alternatives}"),
        ))
    }
}

fn max(ctx: &ValidatorCtx<'_>) -> Result<ValidatorOutcome, SchemaError> {
    bound(ctx, "max", |ordering| ordering != Ordering::Greater, "lower")
}

fn min(ctx: &ValidatorCtx<'_>) -> Result<ValidatorOutcome, SchemaError> {
    bound(ctx, "min", |ordering| ordering != Ordering::Less, "greater")
}

/// Shared bound check: null passes, incomparable pairs fail.
fn bound(
    ctx: &ValidatorCtx<'_>,
    rule: &str,
    within: fn(Ordering) -> bool,
    direction: &str,
) -> Result<ValidatorOutcome, SchemaError> {
    let RuleDecl::Value(limit) = &ctx.option.value else {
        return Err(SchemaError::InvalidRuleOption {
            rule: rule.to_string(),
            path: ctx.path.to_string(),
            expected: "a comparable value",
        });
    };
    if ctx.value.is_null() {
        return Ok(ValidatorOutcome::Valid);
    }
    if ctx.value.compare(limit).is_some_and(within) {
        Ok(ValidatorOutcome::Valid)
    } else {
        Ok(invalid(
            ctx.option,
            format!("{{PARAM}} must be {direction} than or equal {limit}"),
        ))
    }
}

fn maxlength(ctx: &ValidatorCtx<'_>) -> Result<ValidatorOutcome, SchemaError> {
    length_bound(ctx, "maxlength", |len, limit| len <= limit, "lower")
}

fn minlength(ctx: &ValidatorCtx<'_>) -> Result<ValidatorOutcome, SchemaError> {
    length_bound(ctx, "minlength", |len, limit| len >= limit, "greater")
}

/// Shared length check over strings and arrays: null passes, values without
/// a length fail.
fn length_bound(
    ctx: &ValidatorCtx<'_>,
    rule: &str,
    within: fn(usize, usize) -> bool,
    direction: &str,
) -> Result<ValidatorOutcome, SchemaError> {
    let limit = match &ctx.option.value {
        RuleDecl::Value(Value::Int(i)) if *i >= 0 => usize::try_from(*i).ok(),
        _ => None,
    };
    let Some(limit) = limit else {
        return Err(SchemaError::InvalidRuleOption {
            rule: rule.to_string(),
            path: ctx.path.to_string(),
            expected: "a non-negative integer length",
        });
    };
    if ctx.value.is_null() {
        return Ok(ValidatorOutcome::Valid);
    }
    if ctx.value.length().is_some_and(|len| within(len, limit)) {
        Ok(ValidatorOutcome::Valid)
    } else {
        Ok(invalid(
            ctx.option,
            format!("{{PARAM}} length must be {direction} than or equal {limit}"),
        ))
    }
}

/// Composite rule: one predicate, or a list of predicate configs evaluated in
/// order with the first failure winning. Each list entry goes through option
/// parsing, so per-predicate messages work.
fn validate_rule(ctx: &ValidatorCtx<'_>) -> Result<ValidatorOutcome, SchemaError> {
    match &ctx.option.value {
        RuleDecl::Predicates(items) => {
            for item in items {
                let option = parse_rule_option(item, true);
                if let ValidatorOutcome::Invalid { message } = run_predicate(&option, ctx)? {
                    return Ok(ValidatorOutcome::Invalid { message });
                }
            }
            Ok(ValidatorOutcome::Valid)
        }
        _ => run_predicate(ctx.option, ctx),
    }
}

fn run_predicate(
    option: &RuleOption,
    ctx: &ValidatorCtx<'_>,
) -> Result<ValidatorOutcome, SchemaError> {
    let RuleDecl::Predicate(predicate) = &option.value else {
        return Err(SchemaError::InvalidRuleOption {
            rule: "validate".to_string(),
            path: ctx.path.to_string(),
            expected: "a predicate function",
        });
    };
    if predicate(ctx.value, ctx.parsed) {
        Ok(ValidatorOutcome::Valid)
    } else {
        Ok(ValidatorOutcome::Invalid {
            message: option.message.clone(),
        })
    }
}
