//! Error types for the two failure channels of the engine.
//!
//! Configuration problems (programmer mistakes in a schema definition) are
//! [`SchemaError`]s and abort the operation that discovered them. Data
//! problems are [`ValidationError`]s, plain serializable records that are
//! never raised as Rust errors on their own: `validate` delivers them in
//! bulk through [`ValidateError::Invalid`].

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use thiserror::Error;

use crate::decl::{RuleDecl, RuleOption};
use crate::value::Value;

/// Schema configuration errors. Fatal to the call that hits them; never part
/// of a validation error list.
#[derive(Debug, Clone, Error)]
pub enum SchemaError {
    /// A field declaration that cannot be normalized.
    #[error("invalid declaration for `{field}`: {reason}")]
    InvalidDeclaration {
        /// Name of the offending field.
        field: String,
        /// What was wrong with the declaration.
        reason: String,
    },
    /// A rule was configured with an option of the wrong shape.
    #[error("`{rule}` rule on `{path}` expects {expected}")]
    InvalidRuleOption {
        /// Rule name as declared.
        rule: String,
        /// Dotted path of the field carrying the rule.
        path: String,
        /// Description of the expected option shape.
        expected: &'static str,
    },
}

/// One validation failure, addressable by its dotted `param` path.
///
/// The `value` and `option` fields are populated only when the respective
/// value is scalar; structured values are omitted from error payloads.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError {
    /// Dotted path of the failing leaf, e.g. `teacher.subjects.2`.
    pub param: String,
    /// The offending value, when scalar.
    pub value: Option<Value>,
    /// Name of the failing rule.
    pub validator: String,
    /// The rule's configured option value, when plain scalar data.
    pub option: Option<Value>,
    /// Human-readable message with placeholders substituted.
    pub message: Option<String>,
}

impl ValidationError {
    /// Builds an error for a failing leaf, filtering non-scalar values and
    /// substituting message placeholders.
    #[must_use]
    pub fn new(
        path: &str,
        value: &Value,
        validator: &str,
        option: &RuleOption,
        message: Option<String>,
    ) -> Self {
        ValidationError {
            param: path.to_string(),
            value: value.is_scalar().then(|| value.clone()),
            validator: validator.to_string(),
            option: match &option.value {
                RuleDecl::Value(v) if v.is_scalar() => Some(v.clone()),
                _ => None,
            },
            message: message.map(|m| replace_message(&m, path, value, validator)),
        }
    }

    /// Returns a copy with `param` re-rooted under a parent path.
    ///
    /// Used when splicing a nested schema's errors into its parent's list.
    #[must_use]
    pub fn prefixed(mut self, prefix: &str) -> Self {
        self.param = format!("{prefix}.{}", self.param);
        self
    }
}

/// Substitutes message template placeholders.
///
/// `{PARAM}`/`{PATH}` become the dotted path, `{VALUE}` the value, and
/// `{VALIDATOR}`/`{TYPE}` the rule name. Plain replace-all, nothing more.
#[must_use]
pub fn replace_message(message: &str, path: &str, value: &Value, validator: &str) -> String {
    message
        .replace("{PARAM}", path)
        .replace("{PATH}", path)
        .replace("{VALUE}", &value.to_string())
        .replace("{VALIDATOR}", validator)
        .replace("{TYPE}", validator)
}

impl Serialize for ValidationError {
    /// Serializes with the rule's option under a key named after the rule
    /// itself (`{"param": "age", "validator": "min", "min": 18, ...}`), the
    /// shape adapter layers forward to clients.
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let len = 2
            + usize::from(self.value.is_some())
            + usize::from(self.option.is_some())
            + usize::from(self.message.is_some());
        let mut map = serializer.serialize_map(Some(len))?;
        map.serialize_entry("param", &self.param)?;
        if let Some(value) = &self.value {
            map.serialize_entry("value", value)?;
        }
        map.serialize_entry("validator", &self.validator)?;
        if let Some(option) = &self.option {
            map.serialize_entry(&self.validator, option)?;
        }
        if let Some(message) = &self.message {
            map.serialize_entry("message", message)?;
        }
        map.end()
    }
}

/// Failure of a `validate` call: either the schema itself is misconfigured,
/// or the data did not pass.
#[derive(Debug, Error)]
pub enum ValidateError {
    /// Programmer error discovered while validating (e.g. a `match` rule
    /// configured with something other than a pattern).
    #[error(transparent)]
    Config(#[from] SchemaError),
    /// The aggregated validation failures, one entry per failing leaf/rule.
    #[error("validation failed with {} error(s)", .0.len())]
    Invalid(Vec<ValidationError>),
}

impl ValidateError {
    /// Returns the validation error list, if this is a data failure.
    #[must_use]
    pub fn errors(&self) -> Option<&[ValidationError]> {
        match self {
            ValidateError::Invalid(errors) => Some(errors),
            ValidateError::Config(_) => None,
        }
    }
}
