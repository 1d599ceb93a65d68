//! Schemata Core — composable schema definitions, record parsing, and async
//! validation.
//!
//! A schema is built once from field declarations, then used as an immutable
//! value: [`Schema::parse`] coerces raw input into a typed record
//! synchronously, [`Schema::validate`] checks the parsed record against its
//! rules asynchronously (nested schemas and custom async rules validate
//! concurrently), and [`Schema::merge`] composes new schemas out of existing
//! ones without ever mutating them.

pub mod decl;
pub mod error;
pub mod map;
pub mod params;
mod parse;
pub mod schema;
mod validate;
mod validators;
pub mod value;

pub use decl::{parse_rule_option, Decl, FieldDecl, PredicateFn, RuleDecl, RuleOption};
pub use error::{SchemaError, ValidateError, ValidationError};
pub use map::map_values;
pub use params::{normalize_decl, normalize_params, FieldDescriptor, FieldType, Params};
pub use schema::{
    schema, with_params, Definition, Extension, ParseOverride, ParserFn, ParserMap, Patch,
    Schema, ValidateOverride, ValidatorFn, ValidatorMap,
};
pub use validate::{PendingCheck, PendingOutcome, ValidatorCtx, ValidatorOutcome};
pub use value::{to_array, PrimitiveKind, Record, Value};
