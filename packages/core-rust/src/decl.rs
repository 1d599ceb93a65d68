//! Field declaration surface.
//!
//! A [`Decl`] is the raw, author-facing shape of one field: a bare type tag,
//! a literal default, an array shorthand, a nested-record shorthand, a schema
//! reference, or a fully qualified field with rules. The normalizer in
//! [`crate::params`] turns declarations into canonical descriptors once, at
//! schema definition time.
//!
//! Rule configurations ([`RuleDecl`]) have their own, separate normalization:
//! [`parse_rule_option`] extracts the `{value, message}` pair a validator
//! actually consumes.

use std::fmt;
use std::sync::Arc;

use regex::Regex;

use crate::schema::Schema;
use crate::value::{PrimitiveKind, Value};

/// Ad-hoc predicate attached through the composite `validate` rule.
///
/// Receives the leaf value and the fully parsed record.
pub type PredicateFn = Arc<dyn Fn(&Value, &Value) -> bool + Send + Sync>;

/// Raw declaration of one field.
#[derive(Debug, Clone)]
pub enum Decl {
    /// Bare primitive type tag: the field is that type, nothing else.
    Type(PrimitiveKind),
    /// Another schema as the field's type.
    Schema(Schema),
    /// A literal default value; the type is inferred from it.
    Literal(Value),
    /// Array shorthand wrapping the element declaration.
    List(Vec<Decl>),
    /// Nested-record shorthand: fields of an anonymous nested schema.
    Map(Vec<(String, Decl)>),
    /// Fully qualified field: explicit type plus rules.
    Field(FieldDecl),
}

/// Qualified field declaration: `{type, default, rules}`.
#[derive(Debug, Clone, Default)]
pub struct FieldDecl {
    /// The field's type declaration. Required for qualified fields.
    pub field_type: Option<Box<Decl>>,
    /// Default applied to nullish input before coercion.
    pub default: Option<Value>,
    /// Rule configurations in declaration order.
    pub rules: Vec<(String, RuleDecl)>,
}

impl FieldDecl {
    /// Sets the default value.
    #[must_use]
    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Appends a rule configuration.
    #[must_use]
    pub fn rule(mut self, name: impl Into<String>, config: RuleDecl) -> Self {
        self.rules.push((name.into(), config));
        self
    }
}

impl From<FieldDecl> for Decl {
    fn from(f: FieldDecl) -> Self {
        Decl::Field(f)
    }
}

impl From<PrimitiveKind> for Decl {
    fn from(kind: PrimitiveKind) -> Self {
        Decl::Type(kind)
    }
}

impl From<&Schema> for Decl {
    fn from(schema: &Schema) -> Self {
        Decl::Schema(schema.clone())
    }
}

impl From<Schema> for Decl {
    fn from(schema: Schema) -> Self {
        Decl::Schema(schema)
    }
}

/// Bare string type.
#[must_use]
pub fn string() -> Decl {
    Decl::Type(PrimitiveKind::String)
}

/// Bare integer type.
#[must_use]
pub fn int() -> Decl {
    Decl::Type(PrimitiveKind::Int)
}

/// Bare float type.
#[must_use]
pub fn float() -> Decl {
    Decl::Type(PrimitiveKind::Float)
}

/// Bare boolean type.
#[must_use]
pub fn boolean() -> Decl {
    Decl::Type(PrimitiveKind::Bool)
}

/// Bare date type.
#[must_use]
pub fn date() -> Decl {
    Decl::Type(PrimitiveKind::Date)
}

/// Literal default; the type is inferred from the value.
#[must_use]
pub fn literal(value: impl Into<Value>) -> Decl {
    Decl::Literal(value.into())
}

/// Array shorthand: `list(string())` declares an array of strings.
#[must_use]
pub fn list(element: Decl) -> Decl {
    Decl::List(vec![element])
}

/// Nested-record shorthand from field declarations.
#[must_use]
pub fn nested<K, D, I>(fields: I) -> Decl
where
    K: Into<String>,
    D: Into<Decl>,
    I: IntoIterator<Item = (K, D)>,
{
    Decl::Map(
        fields
            .into_iter()
            .map(|(k, d)| (k.into(), d.into()))
            .collect(),
    )
}

/// An existing schema as a field type.
#[must_use]
pub fn schema(schema: &Schema) -> Decl {
    Decl::Schema(schema.clone())
}

/// Starts a qualified field with an explicit type.
#[must_use]
pub fn field(field_type: Decl) -> FieldDecl {
    FieldDecl {
        field_type: Some(Box::new(field_type)),
        default: None,
        rules: Vec::new(),
    }
}

/// Raw configuration of one rule, before option parsing.
#[derive(Clone)]
pub enum RuleDecl {
    /// Plain data: bare value, `[value, message]` tuple, or a record carrying
    /// a `message`/`msg` key next to the value.
    Value(Value),
    /// A compiled pattern, for the `match` rule.
    Pattern(Regex),
    /// An ad-hoc predicate, for the composite `validate` rule.
    Predicate(PredicateFn),
    /// Several rule configs evaluated in order, first failure wins.
    Predicates(Vec<RuleDecl>),
    /// Any config paired with an explicit message.
    WithMessage(Box<RuleDecl>, String),
}

impl RuleDecl {
    /// Plain data config.
    #[must_use]
    pub fn value(value: impl Into<Value>) -> Self {
        RuleDecl::Value(value.into())
    }

    /// Pattern config for the `match` rule.
    #[must_use]
    pub fn pattern(pattern: Regex) -> Self {
        RuleDecl::Pattern(pattern)
    }

    /// Predicate config for the composite `validate` rule.
    pub fn predicate<F>(f: F) -> Self
    where
        F: Fn(&Value, &Value) -> bool + Send + Sync + 'static,
    {
        RuleDecl::Predicate(Arc::new(f))
    }

    /// A list of configs for the composite `validate` rule.
    #[must_use]
    pub fn predicates(items: impl IntoIterator<Item = RuleDecl>) -> Self {
        RuleDecl::Predicates(items.into_iter().collect())
    }

    /// Attaches a message to this config.
    #[must_use]
    pub fn with_message(self, message: impl Into<String>) -> Self {
        RuleDecl::WithMessage(Box::new(self), message.into())
    }
}

impl fmt::Debug for RuleDecl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleDecl::Value(v) => f.debug_tuple("Value").field(v).finish(),
            RuleDecl::Pattern(re) => f.debug_tuple("Pattern").field(&re.as_str()).finish(),
            RuleDecl::Predicate(_) => f.write_str("Predicate(..)"),
            RuleDecl::Predicates(items) => f.debug_tuple("Predicates").field(items).finish(),
            RuleDecl::WithMessage(inner, msg) => f
                .debug_tuple("WithMessage")
                .field(inner)
                .field(msg)
                .finish(),
        }
    }
}

impl PartialEq for RuleDecl {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (RuleDecl::Value(a), RuleDecl::Value(b)) => a == b,
            (RuleDecl::Pattern(a), RuleDecl::Pattern(b)) => a.as_str() == b.as_str(),
            (RuleDecl::Predicate(a), RuleDecl::Predicate(b)) => {
                std::ptr::eq(Arc::as_ptr(a).cast::<u8>(), Arc::as_ptr(b).cast::<u8>())
            }
            (RuleDecl::Predicates(a), RuleDecl::Predicates(b)) => a == b,
            (RuleDecl::WithMessage(a, am), RuleDecl::WithMessage(b, bm)) => {
                am == bm && a == b
            }
            _ => false,
        }
    }
}

/// A rule's configuration after option parsing: the semantic value plus an
/// optional message.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleOption {
    /// The single semantic option value.
    pub value: RuleDecl,
    /// Message override for failures of this rule.
    pub message: Option<String>,
}

/// Normalizes a rule's raw configuration into a [`RuleOption`].
///
/// With `allow_tuple`, a two-element data array whose second element is a
/// string reads as `[value, message]`. The `enum` rule disables this, since
/// its legitimate option is itself an array. A data record carrying a
/// `message` or `msg` key yields the first remaining key's value (insertion
/// order, deterministically) as the option value. Anything else passes
/// through verbatim.
#[must_use]
pub fn parse_rule_option(config: &RuleDecl, allow_tuple: bool) -> RuleOption {
    match config {
        RuleDecl::WithMessage(inner, message) => RuleOption {
            value: (**inner).clone(),
            message: Some(message.clone()),
        },
        RuleDecl::Value(Value::Array(items))
            if allow_tuple && items.len() == 2 && matches!(items[1], Value::String(_)) =>
        {
            let Value::String(message) = &items[1] else {
                unreachable!()
            };
            RuleOption {
                value: RuleDecl::Value(items[0].clone()),
                message: Some(message.clone()),
            }
        }
        RuleDecl::Value(Value::Record(map))
            if map.contains_key("message") || map.contains_key("msg") =>
        {
            let mut rest = map.clone();
            let message = rest
                .shift_remove("message")
                .or_else(|| rest.shift_remove("msg"))
                .and_then(|m| match m {
                    Value::String(s) => Some(s),
                    _ => None,
                });
            rest.shift_remove("msg");
            let value = rest
                .shift_remove_index(0)
                .map_or(Value::Null, |(_, v)| v);
            RuleOption {
                value: RuleDecl::Value(value),
                message,
            }
        }
        other => RuleOption {
            value: other.clone(),
            message: None,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ---- Tuple form ----

    #[test]
    fn two_element_array_with_string_reads_as_value_message() {
        let config = RuleDecl::value(vec![Value::Int(18), Value::String("Too young".into())]);
        let option = parse_rule_option(&config, true);
        assert_eq!(option.value, RuleDecl::Value(Value::Int(18)));
        assert_eq!(option.message.as_deref(), Some("Too young"));
    }

    #[test]
    fn tuple_interpretation_disabled_for_enum_style_options() {
        let config = RuleDecl::value(vec![Value::String("a".into()), Value::String("b".into())]);
        let option = parse_rule_option(&config, false);
        assert_eq!(
            option.value,
            RuleDecl::Value(Value::Array(vec![
                Value::String("a".into()),
                Value::String("b".into()),
            ]))
        );
        assert_eq!(option.message, None);
    }

    #[test]
    fn array_without_string_tail_is_verbatim() {
        let config = RuleDecl::value(vec![Value::Int(1), Value::Int(2)]);
        let option = parse_rule_option(&config, true);
        assert_eq!(
            option.value,
            RuleDecl::Value(Value::Array(vec![Value::Int(1), Value::Int(2)]))
        );
    }

    // ---- Record form ----

    #[test]
    fn record_with_message_key_extracts_both() {
        let config = RuleDecl::value(Value::record([
            ("min", Value::Int(18)),
            ("message", Value::String("Too young".into())),
        ]));
        let option = parse_rule_option(&config, true);
        assert_eq!(option.value, RuleDecl::Value(Value::Int(18)));
        assert_eq!(option.message.as_deref(), Some("Too young"));
    }

    #[test]
    fn msg_is_accepted_as_alias() {
        let config = RuleDecl::value(Value::record([
            ("max", Value::Int(10)),
            ("msg", Value::String("Too big".into())),
        ]));
        let option = parse_rule_option(&config, true);
        assert_eq!(option.value, RuleDecl::Value(Value::Int(10)));
        assert_eq!(option.message.as_deref(), Some("Too big"));
    }

    #[test]
    fn first_remaining_key_wins_deterministically() {
        let config = RuleDecl::value(Value::record([
            ("first", Value::Int(1)),
            ("second", Value::Int(2)),
            ("message", Value::String("m".into())),
        ]));
        let option = parse_rule_option(&config, true);
        assert_eq!(option.value, RuleDecl::Value(Value::Int(1)));
    }

    #[test]
    fn record_without_message_key_is_verbatim() {
        let record = Value::record([("a", Value::Int(1))]);
        let option = parse_rule_option(&RuleDecl::Value(record.clone()), true);
        assert_eq!(option.value, RuleDecl::Value(record));
        assert_eq!(option.message, None);
    }

    // ---- Explicit message wrapper ----

    #[test]
    fn with_message_unwraps() {
        let config = RuleDecl::value(true).with_message("{PARAM} is mandatory");
        let option = parse_rule_option(&config, true);
        assert_eq!(option.value, RuleDecl::Value(Value::Bool(true)));
        assert_eq!(option.message.as_deref(), Some("{PARAM} is mandatory"));
    }

    #[test]
    fn pattern_with_message_survives_parsing() {
        let config = RuleDecl::pattern(regex::Regex::new("^a").unwrap())
            .with_message("must start with a");
        let option = parse_rule_option(&config, true);
        assert!(matches!(option.value, RuleDecl::Pattern(_)));
        assert_eq!(option.message.as_deref(), Some("must start with a"));
    }

    // ---- Verbatim ----

    #[test]
    fn bare_value_passes_through() {
        let option = parse_rule_option(&RuleDecl::value(true), true);
        assert_eq!(option.value, RuleDecl::Value(Value::Bool(true)));
        assert_eq!(option.message, None);
    }

    #[test]
    fn predicate_passes_through() {
        let config = RuleDecl::predicate(|value, _| value.truthy());
        let option = parse_rule_option(&config, true);
        assert!(matches!(option.value, RuleDecl::Predicate(_)));
    }

    // ---- Equality helpers ----

    #[test]
    fn predicate_equality_is_identity() {
        let a = RuleDecl::predicate(|_, _| true);
        let b = a.clone();
        let c = RuleDecl::predicate(|_, _| true);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
