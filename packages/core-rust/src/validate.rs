//! Validation engine: per-leaf rule evaluation with async error aggregation.
//!
//! Validation first parses the input, then walks the parsed record once. Each
//! leaf evaluates its rules in declaration order and short-circuits at the
//! first synchronous failure; other leaves continue independently. Validators
//! may also return a *pending* outcome (nested-schema validation, custom async
//! rules): those are issued eagerly during the walk and awaited together
//! afterwards — fan-out/fan-in, no sequential awaiting.
//!
//! A nested schema's rejected errors are spliced flat into the parent's list
//! with the parent leaf's path prefixed; they are never wrapped in a single
//! opaque "child failed" entry. Synchronous errors appear in declaration
//! order; ordering across concurrently resolving pending branches is not
//! contractual.

use std::collections::HashSet;
use std::future::Future;

use futures_util::future::{self, BoxFuture};
use tracing::{debug, trace};

use crate::decl::{parse_rule_option, RuleDecl, RuleOption};
use crate::error::{SchemaError, ValidateError, ValidationError};
use crate::map::map_values;
use crate::params::{FieldDescriptor, Params};
use crate::schema::Schema;
use crate::value::Value;

/// Everything a validator can see when checking one rule on one leaf.
pub struct ValidatorCtx<'a> {
    /// The leaf value under validation.
    pub value: &'a Value,
    /// The rule's parsed option.
    pub option: &'a RuleOption,
    /// The leaf's full descriptor.
    pub descriptor: &'a FieldDescriptor,
    /// The whole parsed record.
    pub parsed: &'a Value,
    /// The schema's params.
    pub params: &'a Params,
    /// Dotted path of the leaf.
    pub path: &'a str,
}

/// Immediate result of running one validator.
#[derive(Debug)]
pub enum ValidatorOutcome {
    /// The rule passed.
    Valid,
    /// The rule failed; the engine records one error for the leaf and stops
    /// evaluating its remaining rules.
    Invalid {
        /// Message template, substituted when the error is built.
        message: Option<String>,
    },
    /// The outcome is not known yet; the engine continues this leaf and
    /// awaits the check together with all other pending checks.
    Pending(PendingCheck),
}

/// A deferred validation outcome.
pub struct PendingCheck {
    future: BoxFuture<'static, PendingOutcome>,
}

impl std::fmt::Debug for PendingCheck {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingCheck").finish_non_exhaustive()
    }
}

impl PendingCheck {
    /// Wraps a future resolving to the deferred outcome.
    pub fn new<F>(future: F) -> Self
    where
        F: Future<Output = PendingOutcome> + Send + 'static,
    {
        PendingCheck {
            future: Box::pin(future),
        }
    }
}

/// Resolution of a [`PendingCheck`].
pub enum PendingOutcome {
    /// The deferred check passed.
    Valid,
    /// The deferred check failed; wrapped exactly like a synchronous failure
    /// of the same rule.
    Invalid {
        /// Message template, substituted when the error is built.
        message: Option<String>,
    },
    /// A nested schema rejected; its errors are spliced into the parent list
    /// with the leaf's path prefixed.
    Nested(Vec<ValidationError>),
    /// The nested schema (or custom check) hit a configuration error.
    Config(SchemaError),
}

/// Context captured alongside a pending check so its eventual failure can be
/// wrapped like a synchronous one.
struct PendingValidation {
    path: String,
    validator: String,
    value: Value,
    option: RuleOption,
    check: PendingCheck,
}

/// One leaf position during the validation walk.
struct Leaf<'a> {
    schema: &'a Schema,
    value: &'a Value,
    descriptor: &'a FieldDescriptor,
    parsed: &'a Value,
    path: &'a str,
}

impl Leaf<'_> {
    /// Evaluates the implicit `type` rule, then the declared rules in order.
    /// Stops at the first synchronous failure.
    fn run_rules(
        &self,
        errors: &mut Vec<ValidationError>,
        pending: &mut Vec<PendingValidation>,
    ) -> Result<(), SchemaError> {
        let type_option = RuleOption {
            value: RuleDecl::Value(Value::Null),
            message: None,
        };
        if self.run_rule("type", type_option, errors, pending)? {
            return Ok(());
        }
        for (rule, config) in &self.descriptor.rules {
            if rule == "type" {
                // The type rule is implicit; a declared alias must not fire twice.
                continue;
            }
            let option = parse_rule_option(config, rule != "enum");
            if self.run_rule(rule, option, errors, pending)? {
                break;
            }
        }
        Ok(())
    }

    /// Runs a single rule. Returns `true` when the leaf short-circuits.
    fn run_rule(
        &self,
        rule: &str,
        option: RuleOption,
        errors: &mut Vec<ValidationError>,
        pending: &mut Vec<PendingValidation>,
    ) -> Result<bool, SchemaError> {
        let Some(validator) = self.schema.validators().get(rule) else {
            if !self.schema.parsers().contains_key(rule) {
                debug!(rule, path = self.path, "rule has no registered handler");
            }
            return Ok(false);
        };
        let ctx = ValidatorCtx {
            value: self.value,
            option: &option,
            descriptor: self.descriptor,
            parsed: self.parsed,
            params: self.schema.params(),
            path: self.path,
        };
        match validator(&ctx)? {
            ValidatorOutcome::Valid => Ok(false),
            ValidatorOutcome::Invalid { message } => {
                errors.push(ValidationError::new(
                    self.path, self.value, rule, &option, message,
                ));
                Ok(true)
            }
            ValidatorOutcome::Pending(check) => {
                pending.push(PendingValidation {
                    path: self.path.to_string(),
                    validator: rule.to_string(),
                    value: self.value.clone(),
                    option,
                    check,
                });
                Ok(false)
            }
        }
    }
}

/// Validates `values` against the schema, resolving with the parsed record or
/// rejecting with the full aggregated error list.
pub(crate) async fn validate_values(
    schema: &Schema,
    values: Value,
) -> Result<Value, ValidateError> {
    let parsed = schema.parse(&values);
    trace!(fields = schema.params().len(), "validating record");

    let mut errors: Vec<ValidationError> = Vec::new();
    let mut pending: Vec<PendingValidation> = Vec::new();
    let null = Value::Null;

    map_values::<_, SchemaError>(
        &parsed,
        schema.params(),
        None,
        &mut |value, descriptor, _name, path, _so_far| {
            let leaf = Leaf {
                schema,
                value: value.unwrap_or(&null),
                descriptor,
                parsed: &parsed,
                path,
            };
            leaf.run_rules(&mut errors, &mut pending)?;
            Ok(Value::Null)
        },
    )?;

    if !pending.is_empty() {
        trace!(count = pending.len(), "awaiting pending validations");
        let (contexts, futures): (Vec<_>, Vec<_>) = pending
            .into_iter()
            .map(|p| ((p.path, p.validator, p.value, p.option), p.check.future))
            .unzip();
        let outcomes = future::join_all(futures).await;
        for ((path, validator, value, option), outcome) in
            contexts.into_iter().zip(outcomes)
        {
            match outcome {
                PendingOutcome::Valid => {}
                PendingOutcome::Invalid { message } => {
                    errors.push(ValidationError::new(
                        &path, &value, &validator, &option, message,
                    ));
                }
                PendingOutcome::Nested(nested) => {
                    errors.extend(nested.into_iter().map(|e| e.prefixed(&path)));
                }
                PendingOutcome::Config(e) => return Err(ValidateError::Config(e)),
            }
        }
    }

    dedup_errors(&mut errors);
    if errors.is_empty() {
        Ok(parsed)
    } else {
        Err(ValidateError::Invalid(errors))
    }
}

/// Keeps one error per distinct `(param, validator)` pair, first occurrence
/// winning.
fn dedup_errors(errors: &mut Vec<ValidationError>) {
    let mut seen = HashSet::new();
    errors.retain(|e| seen.insert((e.param.clone(), e.validator.clone())));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decl::{self, RuleDecl};
    use crate::schema::Patch;
    use crate::value::PrimitiveKind;

    fn required_string() -> decl::FieldDecl {
        decl::field(decl::string()).rule("required", RuleDecl::value(true))
    }

    fn rejection(err: ValidateError) -> Vec<ValidationError> {
        match err {
            ValidateError::Invalid(errors) => errors,
            ValidateError::Config(e) => panic!("expected data rejection, got config error {e}"),
        }
    }

    // ---- Resolution ----

    #[tokio::test]
    async fn resolves_with_parsed_record() {
        let schema = Schema::define([("foo", decl::string())]).unwrap();
        let parsed = schema
            .validate(Value::record([("foo", Value::Int(1))]))
            .await
            .unwrap();
        assert_eq!(parsed, Value::record([("foo", "1")]));
    }

    // ---- Synchronous rejection ----

    #[tokio::test]
    async fn missing_required_field_rejects_with_templated_message() {
        let schema = Schema::define([("foo", required_string())]).unwrap();
        let errors = rejection(schema.validate(Value::Null).await.unwrap_err());
        assert_eq!(errors.len(), 1);
        let error = &errors[0];
        assert_eq!(error.param, "foo");
        assert_eq!(error.validator, "required");
        assert_eq!(error.option, Some(Value::Bool(true)));
        assert_eq!(error.message.as_deref(), Some("foo is required"));
    }

    #[tokio::test]
    async fn leaf_short_circuits_after_first_failing_rule() {
        let schema = Schema::define([(
            "age",
            decl::field(decl::int())
                .rule("required", RuleDecl::value(true))
                .rule("min", RuleDecl::value(18)),
        )])
        .unwrap();
        let errors = rejection(schema.validate(Value::Null).await.unwrap_err());
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].validator, "required");
    }

    #[tokio::test]
    async fn independent_leaves_fail_independently() {
        let schema = Schema::define([
            ("foo", required_string()),
            ("bar", required_string()),
        ])
        .unwrap();
        let errors = rejection(schema.validate(Value::Null).await.unwrap_err());
        let params: Vec<&str> = errors.iter().map(|e| e.param.as_str()).collect();
        assert_eq!(params, ["foo", "bar"]);
    }

    #[tokio::test]
    async fn custom_message_overrides_default() {
        let schema = Schema::define([(
            "age",
            decl::field(decl::int())
                .rule("min", RuleDecl::value(vec![Value::Int(18), Value::String("Too young".into())])),
        )])
        .unwrap();
        let errors = rejection(
            schema
                .validate(Value::record([("age", Value::Int(17))]))
                .await
                .unwrap_err(),
        );
        assert_eq!(errors[0].message.as_deref(), Some("Too young"));
        assert_eq!(errors[0].option, Some(Value::Int(18)));
        assert_eq!(errors[0].value, Some(Value::Int(17)));
    }

    // ---- Custom validators ----

    #[tokio::test]
    async fn custom_validator_rejects_with_rule_name() {
        let schema = Schema::define([(
            "foo",
            decl::field(decl::string()).rule("mustEqual", RuleDecl::value("bar")),
        )])
        .unwrap()
        .merge([Patch::new().validator("mustEqual", |ctx: &ValidatorCtx<'_>| {
            let fallback = Value::Null;
            let expected = match &ctx.option.value {
                RuleDecl::Value(v) => v,
                _ => &fallback,
            };
            Ok(if ctx.value == expected {
                ValidatorOutcome::Valid
            } else {
                ValidatorOutcome::Invalid { message: None }
            })
        })])
        .unwrap();

        let errors = rejection(
            schema
                .validate(Value::record([("foo", "baz")]))
                .await
                .unwrap_err(),
        );
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].param, "foo");
        assert_eq!(errors[0].validator, "mustEqual");
        assert_eq!(errors[0].option, Some(Value::String("bar".into())));
        assert_eq!(errors[0].value, Some(Value::String("baz".into())));
        assert_eq!(errors[0].message, None);
    }

    #[tokio::test]
    async fn custom_async_validator_failure_wraps_like_sync() {
        let schema = Schema::define([(
            "handle",
            decl::field(decl::string()).rule("available", RuleDecl::value(true)),
        )])
        .unwrap()
        .merge([Patch::new().validator("available", |_ctx: &ValidatorCtx<'_>| {
            Ok(ValidatorOutcome::Pending(PendingCheck::new(async {
                PendingOutcome::Invalid {
                    message: Some("{PARAM} is taken".to_string()),
                }
            })))
        })])
        .unwrap();

        let errors = rejection(
            schema
                .validate(Value::record([("handle", "grace")]))
                .await
                .unwrap_err(),
        );
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].param, "handle");
        assert_eq!(errors[0].validator, "available");
        assert_eq!(errors[0].message.as_deref(), Some("handle is taken"));
    }

    // ---- Nested schemas ----

    #[tokio::test]
    async fn nested_failure_uses_dotted_parent_path() {
        let child = Schema::define([("childField", required_string())]).unwrap();
        let parent = Schema::define([("parentField", decl::schema(&child))]).unwrap();
        let input = Value::record([(
            "parentField",
            Value::record([("other", Value::Int(1))]),
        )]);
        let errors = rejection(parent.validate(input).await.unwrap_err());
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].param, "parentField.childField");
        assert_eq!(errors[0].validator, "required");
    }

    #[tokio::test]
    async fn nested_inside_array_prefixes_element_index() {
        let student = Schema::define([("grade", decl::field(decl::int()).rule("required", RuleDecl::value(true)))]).unwrap();
        let class = Schema::define([("students", decl::list(decl::schema(&student)))]).unwrap();
        let input = Value::record([(
            "students",
            Value::Array(vec![
                Value::record([("grade", Value::Int(5))]),
                Value::record([("other", Value::Int(1))]),
            ]),
        )]);
        let errors = rejection(class.validate(input).await.unwrap_err());
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].param, "students.1.grade");
    }

    #[tokio::test]
    async fn absent_nested_value_skips_nested_validation() {
        let child = Schema::define([("name", required_string())]).unwrap();
        let parent = Schema::define([("teacher", decl::schema(&child))]).unwrap();
        let parsed = parent.validate(Value::Null).await.unwrap();
        assert_eq!(parsed.as_record().unwrap()["teacher"], Value::Null);
    }

    #[tokio::test]
    async fn deep_nesting_builds_full_paths() {
        let inner = Schema::define([("qux", required_string())]).unwrap();
        let middle = Schema::define([("baz", decl::list(decl::schema(&inner)))]).unwrap();
        let outer = Schema::define([("bar", decl::schema(&middle))]).unwrap();
        let input = Value::record([(
            "bar",
            Value::record([(
                "baz",
                Value::Array(vec![Value::record([("nope", Value::Int(0))])]),
            )]),
        )]);
        let errors = rejection(outer.validate(input).await.unwrap_err());
        assert_eq!(errors[0].param, "bar.baz.0.qux");
    }

    // ---- Configuration errors ----

    #[tokio::test]
    async fn match_with_non_pattern_is_a_config_error() {
        let schema = Schema::define([(
            "foo",
            decl::field(decl::string()).rule("match", RuleDecl::value("not a regex")),
        )])
        .unwrap();
        let err = schema
            .validate(Value::record([("foo", "x")]))
            .await
            .unwrap_err();
        assert!(matches!(err, ValidateError::Config(SchemaError::InvalidRuleOption { .. })));
    }

    // ---- Enum tuple handling ----

    #[tokio::test]
    async fn enum_option_array_is_not_read_as_tuple() {
        // A two-element array whose second element is a string would be
        // misread as [value, message] if tuple parsing applied to enum.
        let schema = Schema::define([(
            "kind",
            decl::field(decl::string()).rule(
                "enum",
                RuleDecl::value(vec![Value::Int(1), Value::String("b".into())]),
            ),
        )])
        .unwrap();
        let errors = rejection(
            schema
                .validate(Value::record([("kind", "c")]))
                .await
                .unwrap_err(),
        );
        assert_eq!(errors[0].validator, "enum");
        // Option is the whole array, so it is omitted from the error payload.
        assert_eq!(errors[0].option, None);

        let ok = schema.validate(Value::record([("kind", "b")])).await;
        assert!(ok.is_ok());
    }

    // ---- Unknown rules ----

    #[tokio::test]
    async fn unknown_rule_is_skipped() {
        let schema = Schema::define([(
            "foo",
            decl::field(decl::string()).rule("frobnicate", RuleDecl::value(true)),
        )])
        .unwrap();
        assert!(schema
            .validate(Value::record([("foo", "x")]))
            .await
            .is_ok());
    }

    // ---- Type coercion before validation ----

    #[tokio::test]
    async fn rules_see_coerced_values() {
        let schema = Schema::define([(
            "age",
            decl::field(decl::int()).rule("min", RuleDecl::value(18)),
        )])
        .unwrap();
        // "27" coerces to 27 before min runs.
        assert!(schema
            .validate(Value::record([("age", "27")]))
            .await
            .is_ok());
        assert_eq!(
            schema.params()["age"].field_type,
            crate::params::FieldType::Primitive(PrimitiveKind::Int)
        );
    }

    // ---- Dedup ----

    #[test]
    fn dedup_keeps_first_per_param_rule_pair() {
        let option = RuleOption {
            value: RuleDecl::Value(Value::Bool(true)),
            message: None,
        };
        let mut errors = vec![
            ValidationError::new("foo", &Value::Null, "required", &option, None),
            ValidationError::new("foo", &Value::Null, "required", &option, Some("dup".into())),
            ValidationError::new("foo", &Value::Null, "min", &option, None),
        ];
        dedup_errors(&mut errors);
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].message, None);
    }
}
