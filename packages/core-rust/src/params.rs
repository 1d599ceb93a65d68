//! Canonical field descriptors and the declaration normalizer.
//!
//! Declarations arrive in several convenient shapes (bare type, literal
//! default, array shorthand, nested record, qualified field). Normalization
//! runs once per field at schema definition time and produces one canonical
//! [`FieldDescriptor`] per field; descriptors are immutable afterwards.
//!
//! The field type is a closed union: a primitive kind, a nested schema, or
//! "array of" another descriptor, recursively — arrays of arrays of schemas
//! nest to arbitrary depth.

use indexmap::IndexMap;

use crate::decl::{Decl, FieldDecl, RuleDecl};
use crate::error::SchemaError;
use crate::schema::Schema;
use crate::value::{PrimitiveKind, Value};

/// Ordered mapping from field name to canonical descriptor.
pub type Params = IndexMap<String, FieldDescriptor>;

/// The type of a field: exactly one of primitive, nested schema, or array-of.
#[derive(Debug, Clone)]
pub enum FieldType {
    /// A primitive type tag; input is coerced to it.
    Primitive(PrimitiveKind),
    /// A nested schema; parsing and validation delegate to it.
    Nested(Schema),
    /// An array whose elements follow the inner descriptor.
    ArrayOf(Box<FieldDescriptor>),
}

impl PartialEq for FieldType {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (FieldType::Primitive(a), FieldType::Primitive(b)) => a == b,
            // Schemas compare by identity, not structure.
            (FieldType::Nested(a), FieldType::Nested(b)) => Schema::same(a, b),
            (FieldType::ArrayOf(a), FieldType::ArrayOf(b)) => a == b,
            _ => false,
        }
    }
}

/// Canonical per-field specification: type, optional default, rules.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDescriptor {
    /// The field's type.
    pub field_type: FieldType,
    /// Default substituted for nullish input before coercion.
    pub default: Option<Value>,
    /// Rule configurations in declaration order.
    pub rules: Vec<(String, RuleDecl)>,
}

impl FieldDescriptor {
    fn of_type(field_type: FieldType) -> Self {
        FieldDescriptor {
            field_type,
            default: None,
            rules: Vec::new(),
        }
    }

    /// Rebuilds the qualified declaration this descriptor normalizes from.
    ///
    /// Canonical descriptors re-normalize to themselves; this is the bridge
    /// that makes the property checkable (and lets callers re-declare a field
    /// based on an existing schema's descriptor).
    #[must_use]
    pub fn to_decl(&self) -> Decl {
        let field_type = match &self.field_type {
            FieldType::Primitive(kind) => Decl::Type(*kind),
            FieldType::Nested(schema) => Decl::Schema(schema.clone()),
            FieldType::ArrayOf(inner) => Decl::List(vec![inner.to_decl()]),
        };
        Decl::Field(FieldDecl {
            field_type: Some(Box::new(field_type)),
            default: self.default.clone(),
            rules: self.rules.clone(),
        })
    }
}

/// Normalizes a full parameter list, preserving declaration order.
pub fn normalize_params<K, D, I>(fields: I) -> Result<Params, SchemaError>
where
    K: Into<String>,
    D: Into<Decl>,
    I: IntoIterator<Item = (K, D)>,
{
    let mut params = Params::new();
    for (name, decl) in fields {
        let name = name.into();
        let descriptor = normalize_decl(&name, &decl.into())?;
        params.insert(name, descriptor);
    }
    Ok(params)
}

/// Normalizes one field declaration into its canonical descriptor.
///
/// Precedence: array shorthand first (including a qualified field whose type
/// is an array), then bare types and schemas, then literal defaults, then
/// the nested-record shorthand, and finally qualified fields pass through.
/// Rule configurations are left untouched here; they have their own
/// normalization at validation time.
pub fn normalize_decl(field: &str, decl: &Decl) -> Result<FieldDescriptor, SchemaError> {
    match decl {
        Decl::List(items) => {
            let element = first_element(field, items)?;
            let inner = normalize_decl(field, element)?;
            Ok(FieldDescriptor::of_type(FieldType::ArrayOf(Box::new(
                inner,
            ))))
        }
        Decl::Field(f) if matches!(f.field_type.as_deref(), Some(Decl::List(_))) => {
            let Some(Decl::List(items)) = f.field_type.as_deref() else {
                unreachable!("guarded by match arm");
            };
            let element = first_element(field, items)?;
            let inner = normalize_decl(field, element)?;
            Ok(FieldDescriptor {
                field_type: FieldType::ArrayOf(Box::new(inner)),
                default: f.default.clone(),
                rules: f.rules.clone(),
            })
        }
        Decl::Type(kind) => Ok(FieldDescriptor::of_type(FieldType::Primitive(*kind))),
        Decl::Schema(schema) => Ok(FieldDescriptor::of_type(FieldType::Nested(
            schema.clone(),
        ))),
        Decl::Literal(value) => normalize_literal(field, value),
        Decl::Map(fields) => {
            let nested = Schema::define(fields.clone())?;
            Ok(FieldDescriptor::of_type(FieldType::Nested(nested)))
        }
        Decl::Field(f) => {
            let Some(field_type) = f.field_type.as_deref() else {
                return Err(SchemaError::InvalidDeclaration {
                    field: field.to_string(),
                    reason: "qualified field is missing a type".to_string(),
                });
            };
            let field_type = match field_type {
                Decl::Type(kind) => FieldType::Primitive(*kind),
                Decl::Schema(schema) => FieldType::Nested(schema.clone()),
                Decl::Map(fields) => FieldType::Nested(Schema::define(fields.clone())?),
                Decl::List(_) => unreachable!("handled by the array arm"),
                Decl::Literal(_) | Decl::Field(_) => {
                    return Err(SchemaError::InvalidDeclaration {
                        field: field.to_string(),
                        reason: "type must be a type tag, schema, nested record, or array"
                            .to_string(),
                    });
                }
            };
            Ok(FieldDescriptor {
                field_type,
                default: f.default.clone(),
                rules: f.rules.clone(),
            })
        }
    }
}

fn first_element<'a>(field: &str, items: &'a [Decl]) -> Result<&'a Decl, SchemaError> {
    items.first().ok_or_else(|| SchemaError::InvalidDeclaration {
        field: field.to_string(),
        reason: "array declaration must contain an element declaration".to_string(),
    })
}

fn normalize_literal(field: &str, value: &Value) -> Result<FieldDescriptor, SchemaError> {
    match value {
        Value::Record(map) => {
            // A record literal is the nested shorthand with per-field defaults.
            let fields: Vec<(String, Decl)> = map
                .iter()
                .map(|(k, v)| (k.clone(), Decl::Literal(v.clone())))
                .collect();
            normalize_decl(field, &Decl::Map(fields))
        }
        Value::Array(items) => {
            let first = items.first().ok_or_else(|| SchemaError::InvalidDeclaration {
                field: field.to_string(),
                reason: "array declaration must contain an element declaration".to_string(),
            })?;
            let inner = normalize_decl(field, &Decl::Literal(first.clone()))?;
            Ok(FieldDescriptor::of_type(FieldType::ArrayOf(Box::new(
                inner,
            ))))
        }
        scalar => Ok(FieldDescriptor {
            field_type: FieldType::Primitive(PrimitiveKind::infer(scalar)),
            default: Some(scalar.clone()),
            rules: Vec::new(),
        }),
    }
}
