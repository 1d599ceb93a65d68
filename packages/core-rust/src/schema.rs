//! Schema values, the construction entry points, and composition.
//!
//! A [`Schema`] bundles normalized params with parser/validator registries
//! and the `parse`/`validate` operations. Schemas are immutable: [`merge`]
//! and extension functions always return a new schema, sharing unchanged
//! sub-maps by reference (copy-on-write, never deep cloning). Cloning a
//! schema is cheap, and nested schemas are shared, not copied, when embedded
//! as another schema's field type.
//!
//! [`merge`]: Schema::merge

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use indexmap::IndexMap;
use tracing::debug;

use crate::decl::{Decl, RuleOption};
use crate::error::{SchemaError, ValidateError};
use crate::params::{normalize_decl, normalize_params, Params};
use crate::validate::{ValidatorCtx, ValidatorOutcome};
use crate::value::{Record, Value};
use crate::{parse, validate, validators};

/// A parser: transforms the current value for one rule.
///
/// Receives the value, the rule's parsed option, the parsed-so-far record,
/// and the schema's params; returns the replacement value. Total — parsers
/// never fail.
pub type ParserFn = Arc<dyn Fn(Value, &RuleOption, &Record, &Params) -> Value + Send + Sync>;

/// A validator: checks one rule against a leaf value.
pub type ValidatorFn =
    Arc<dyn Fn(&ValidatorCtx<'_>) -> Result<ValidatorOutcome, SchemaError> + Send + Sync>;

/// Ordered registry of parsers by rule name.
pub type ParserMap = IndexMap<String, ParserFn>;

/// Ordered registry of validators by rule name.
pub type ValidatorMap = IndexMap<String, ValidatorFn>;

/// An extension function: receives the schema built so far and returns the
/// next one, usually via [`Schema::merge`].
pub type Extension = Box<dyn FnOnce(Schema) -> Result<Schema, SchemaError>>;

/// Replacement for the whole `parse` operation.
pub type ParseOverride = Arc<dyn Fn(&Value) -> Value + Send + Sync>;

/// Replacement for the whole `validate` operation.
pub type ValidateOverride =
    Arc<dyn Fn(Value) -> BoxFuture<'static, Result<Value, ValidateError>> + Send + Sync>;

struct SchemaInner {
    params: Arc<Params>,
    parsers: Arc<ParserMap>,
    validators: Arc<ValidatorMap>,
    parse_override: Option<ParseOverride>,
    validate_override: Option<ValidateOverride>,
}

/// An immutable schema value: params plus registries plus operations.
#[derive(Clone)]
pub struct Schema {
    inner: Arc<SchemaInner>,
}

impl Schema {
    /// Builds a schema from field declarations, seeding the built-in
    /// validator set.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError`] when a declaration cannot be normalized.
    pub fn define<K, D, I>(params: I) -> Result<Self, SchemaError>
    where
        K: Into<String>,
        D: Into<Decl>,
        I: IntoIterator<Item = (K, D)>,
    {
        let params = normalize_params(params)?;
        debug!(fields = params.len(), "schema defined");
        Ok(Schema {
            inner: Arc::new(SchemaInner {
                params: Arc::new(params),
                parsers: Arc::new(ParserMap::new()),
                validators: Arc::new(validators::builtins()),
                parse_override: None,
                validate_override: None,
            }),
        })
    }

    /// The schema's normalized params, in declaration order.
    #[must_use]
    pub fn params(&self) -> &Params {
        &self.inner.params
    }

    /// The parser registry.
    #[must_use]
    pub fn parsers(&self) -> &ParserMap {
        &self.inner.parsers
    }

    /// The validator registry.
    #[must_use]
    pub fn validators(&self) -> &ValidatorMap {
        &self.inner.validators
    }

    /// Identity comparison: two handles to the same schema value.
    ///
    /// Schemas are compared by identity, never by structure.
    #[must_use]
    pub fn same(a: &Schema, b: &Schema) -> bool {
        Arc::ptr_eq(&a.inner, &b.inner)
    }

    /// Coerces raw input into a typed record.
    ///
    /// Synchronous and total: always returns a record with the schema's field
    /// set, whatever the input.
    #[must_use]
    pub fn parse(&self, values: &Value) -> Value {
        if let Some(custom) = &self.inner.parse_override {
            return custom(values);
        }
        parse::parse_values(self, values)
    }

    /// Parses, then validates the parsed record against every rule.
    ///
    /// Resolves with the parsed record, or rejects with the aggregated
    /// error list.
    ///
    /// # Errors
    ///
    /// [`ValidateError::Invalid`] carries the validation failures;
    /// [`ValidateError::Config`] reports schema misconfiguration discovered
    /// on first use.
    pub async fn validate(&self, values: Value) -> Result<Value, ValidateError> {
        if let Some(custom) = &self.inner.validate_override {
            return custom(values).await;
        }
        validate::validate_values(self, values).await
    }

    /// Returns a new schema with the patches applied in order.
    ///
    /// Params, parsers, and validators are shallow-merged key by key: new
    /// keys are added, same-named keys are overridden, unrelated keys stay
    /// untouched. A patch may also replace the whole `parse` or `validate`
    /// operation. The receiver is never mutated; unchanged registries are
    /// shared with the new schema by reference.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError`] when a patched declaration cannot be
    /// normalized.
    pub fn merge<I>(&self, patches: I) -> Result<Schema, SchemaError>
    where
        I: IntoIterator<Item = Patch>,
    {
        let mut params = Arc::clone(&self.inner.params);
        let mut parsers = Arc::clone(&self.inner.parsers);
        let mut validators = Arc::clone(&self.inner.validators);
        let mut parse_override = self.inner.parse_override.clone();
        let mut validate_override = self.inner.validate_override.clone();

        for patch in patches {
            if !patch.params.is_empty() {
                let mut next = Params::clone(&params);
                for (name, decl) in patch.params {
                    let descriptor = normalize_decl(&name, &decl)?;
                    next.insert(name, descriptor);
                }
                params = Arc::new(next);
            }
            if !patch.parsers.is_empty() {
                let mut next = ParserMap::clone(&parsers);
                next.extend(patch.parsers);
                parsers = Arc::new(next);
            }
            if !patch.validators.is_empty() {
                let mut next = ValidatorMap::clone(&validators);
                next.extend(patch.validators);
                validators = Arc::new(next);
            }
            if patch.parse.is_some() {
                parse_override = patch.parse;
            }
            if patch.validate.is_some() {
                validate_override = patch.validate;
            }
        }

        debug!(fields = params.len(), "schema merged");
        Ok(Schema {
            inner: Arc::new(SchemaInner {
                params,
                parsers,
                validators,
                parse_override,
                validate_override,
            }),
        })
    }
}

impl fmt::Debug for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Schema")
            .field("params", &self.inner.params.keys().collect::<Vec<_>>())
            .field("parsers", &self.inner.parsers.keys().collect::<Vec<_>>())
            .field(
                "validators",
                &self.inner.validators.keys().collect::<Vec<_>>(),
            )
            .finish_non_exhaustive()
    }
}

/// Starting point for [`schema`]: raw params or an existing schema.
pub enum Definition {
    /// Field declarations for a fresh schema.
    Params(Vec<(String, Decl)>),
    /// An existing schema to compose from.
    Schema(Schema),
}

impl From<Schema> for Definition {
    fn from(schema: Schema) -> Self {
        Definition::Schema(schema)
    }
}

impl From<&Schema> for Definition {
    fn from(schema: &Schema) -> Self {
        Definition::Schema(schema.clone())
    }
}

impl<K, D> From<Vec<(K, D)>> for Definition
where
    K: Into<String>,
    D: Into<Decl>,
{
    fn from(fields: Vec<(K, D)>) -> Self {
        Definition::Params(
            fields
                .into_iter()
                .map(|(k, d)| (k.into(), d.into()))
                .collect(),
        )
    }
}

impl<K, D, const N: usize> From<[(K, D); N]> for Definition
where
    K: Into<String>,
    D: Into<Decl>,
{
    fn from(fields: [(K, D); N]) -> Self {
        Definition::Params(
            fields
                .into_iter()
                .map(|(k, d)| (k.into(), d.into()))
                .collect(),
        )
    }
}

/// Construction entry point: builds (or adopts) the base schema, then applies
/// the extension functions strictly left to right, each receiving the schema
/// produced by the previous step.
///
/// # Errors
///
/// Returns the first [`SchemaError`] raised by normalization or an extension.
pub fn schema(
    base: impl Into<Definition>,
    extensions: impl IntoIterator<Item = Extension>,
) -> Result<Schema, SchemaError> {
    let mut current = match base.into() {
        Definition::Params(fields) => Schema::define(fields)?,
        Definition::Schema(existing) => existing,
    };
    for extension in extensions {
        current = extension(current)?;
    }
    Ok(current)
}

/// Extension that merges additional params into the previous schema.
pub fn with_params<K, D, I>(fields: I) -> Extension
where
    K: Into<String>,
    D: Into<Decl>,
    I: IntoIterator<Item = (K, D)>,
{
    let fields: Vec<(String, Decl)> = fields
        .into_iter()
        .map(|(k, d)| (k.into(), d.into()))
        .collect();
    Box::new(move |previous| previous.merge([Patch::new().params(fields)]))
}

/// One merge patch: params, registry entries, and operation overrides.
#[derive(Default)]
pub struct Patch {
    params: Vec<(String, Decl)>,
    parsers: Vec<(String, ParserFn)>,
    validators: Vec<(String, ValidatorFn)>,
    parse: Option<ParseOverride>,
    validate: Option<ValidateOverride>,
}

impl Patch {
    /// An empty patch.
    #[must_use]
    pub fn new() -> Self {
        Patch::default()
    }

    /// Adds or overrides one field declaration.
    #[must_use]
    pub fn param(mut self, name: impl Into<String>, decl: impl Into<Decl>) -> Self {
        self.params.push((name.into(), decl.into()));
        self
    }

    /// Adds or overrides several field declarations.
    #[must_use]
    pub fn params<K, D, I>(mut self, fields: I) -> Self
    where
        K: Into<String>,
        D: Into<Decl>,
        I: IntoIterator<Item = (K, D)>,
    {
        self.params
            .extend(fields.into_iter().map(|(k, d)| (k.into(), d.into())));
        self
    }

    /// Registers a parser for a rule name.
    #[must_use]
    pub fn parser<F>(mut self, name: impl Into<String>, parser: F) -> Self
    where
        F: Fn(Value, &RuleOption, &Record, &Params) -> Value + Send + Sync + 'static,
    {
        self.parsers.push((name.into(), Arc::new(parser)));
        self
    }

    /// Registers a validator for a rule name.
    #[must_use]
    pub fn validator<F>(mut self, name: impl Into<String>, validator: F) -> Self
    where
        F: Fn(&ValidatorCtx<'_>) -> Result<ValidatorOutcome, SchemaError>
            + Send
            + Sync
            + 'static,
    {
        self.validators.push((name.into(), Arc::new(validator)));
        self
    }

    /// Replaces the whole `parse` operation.
    #[must_use]
    pub fn with_parse<F>(mut self, parse: F) -> Self
    where
        F: Fn(&Value) -> Value + Send + Sync + 'static,
    {
        self.parse = Some(Arc::new(parse));
        self
    }

    /// Replaces the whole `validate` operation.
    #[must_use]
    pub fn with_validate<F, Fut>(mut self, validate: F) -> Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, ValidateError>> + Send + 'static,
    {
        self.validate = Some(Arc::new(move |values| Box::pin(validate(values))));
        self
    }
}
