//! Helpers for code generated by derive macros.

use std::sync::Arc;

use super::{EnumMetadata, RecordMetadata, Ty};
use crate::{
    error::{SchemaError, ValidationError},
    typed::ToTyped,
    value::{Plain, Record, TypedValue},
};

/// Converts a Rust default value to the plain default stored in field metadata.
///
/// # Panics
///
/// Panics if the value cannot be dumped using the field type. This is a programming error.
pub fn default_plain<T: ToTyped>(ty: &Ty, value: &T, record: &str, field: &str) -> Plain {
    let result = value
        .to_typed()
        .map_err(crate::Error::from)
        .and_then(|value| crate::dump(ty, &value));
    match result {
        Ok(plain) => plain,
        Err(err) => panic!("invalid default value for field `{record}.{field}`: {err}"),
    }
}

/// # Panics
///
/// Panics on schema errors, which indicate an invalid derive input.
pub fn finish_record(result: Result<Arc<RecordMetadata>, SchemaError>) -> Arc<RecordMetadata> {
    result.unwrap_or_else(|err| panic!("{err}"))
}

/// # Panics
///
/// Panics on schema errors, which indicate an invalid derive input.
pub fn finish_enum(result: Result<Arc<EnumMetadata>, SchemaError>) -> Arc<EnumMetadata> {
    result.unwrap_or_else(|err| panic!("{err}"))
}

pub fn expect_record(value: TypedValue, meta: &RecordMetadata) -> Result<Record, ValidationError> {
    match value {
        TypedValue::Record(record) if **record.metadata() == *meta => Ok(record),
        _ => Err(ValidationError::type_mismatch(
            format_args!("record {}", meta.name()),
            value.kind_name(),
        )),
    }
}

pub fn enum_index(value: &TypedValue, meta: &EnumMetadata) -> Result<usize, ValidationError> {
    match value {
        TypedValue::Enum(value) if **value.metadata() == *meta => Ok(value.index()),
        _ => Err(ValidationError::type_mismatch(
            format_args!("member of enum {}", meta.name()),
            value.kind_name(),
        )),
    }
}

pub fn enum_value(meta: &Arc<EnumMetadata>, index: usize) -> Result<TypedValue, ValidationError> {
    crate::value::EnumValue::new(meta, index)
        .map(TypedValue::Enum)
        .ok_or_else(|| {
            ValidationError::custom(format!("no member #{index} in enum {}", meta.name()))
        })
}
