//! Handlers for records and class configs.

use std::sync::Arc;

use super::{ParseContext, PathSegment, TypeHandler, expected_plain, expected_typed, unexpected_type};
use crate::{
    cli::CliKind,
    error::{Error, ErrorKind, ValidationError},
    metadata::{RecordMetadata, Ty},
    value::{META_KEY, Plain, PlainMap, Record, TypedValue, missing_field, unrecognized_fields},
};

/// Loads record fields from a mapping. Keys listed in `skipped_keys` are neither loaded nor considered unrecognized.
pub(super) fn load_record(
    meta: &Arc<RecordMetadata>,
    map: &PlainMap,
    skipped_keys: &[&str],
    ctx: &mut ParseContext<'_>,
) -> Result<Record, Error> {
    let mut values = Vec::with_capacity(meta.fields().len());
    for field in meta.fields() {
        // Defaults are loaded in the same way as the provided values.
        let Some(plain) = map.get(&field.name).or(field.default.as_ref()) else {
            return Err(missing_field(&field.name).into());
        };
        let value = ctx.onto(PathSegment::Field(field.name.clone()), |ctx| {
            ctx.load(&field.ty, plain)
        })?;
        values.push(value);
    }

    let unrecognized: Vec<_> = map
        .keys()
        .filter(|&key| {
            key != META_KEY && !skipped_keys.contains(&key.as_str()) && meta.field(key).is_none()
        })
        .cloned()
        .collect();
    if !unrecognized.is_empty() {
        return Err(unrecognized_fields(meta, unrecognized).into());
    }

    let mut record = Record::from_values(meta.clone(), values);
    record.set_meta(map.get(META_KEY).cloned());
    ctx.mark_cli_anchor(CliKind::Dict);
    Ok(record)
}

/// Dumps record fields into `output`. The `_meta` side channel is not emitted.
pub(super) fn dump_record(
    record: &Record,
    mut output: PlainMap,
    ctx: &mut ParseContext<'_>,
) -> Result<Plain, Error> {
    for (field, value) in record.metadata().fields().iter().zip(record.values()) {
        let plain = ctx.onto(PathSegment::Field(field.name.clone()), |ctx| {
            ctx.dump(&field.ty, value)
        })?;
        output.insert(field.name.clone(), plain);
    }
    Ok(Plain::Object(output))
}

/// Runs the structural check and post-validations for a loaded record.
pub(super) fn validate_record(ty: &Ty, value: &TypedValue) -> Result<(), Error> {
    ty.check(value)?;
    let TypedValue::Record(record) = value else {
        return Err(expected_typed("a record", value));
    };
    let meta = record.metadata();
    for validation in meta.validations() {
        if let Err(err) = validation.validate(record) {
            tracing::warn!(record = meta.name(), %validation, %err, "record post-validation failed");
            let message = if err.message().is_empty() {
                format!("{}: post validation failed", meta.name())
            } else {
                format!("{}: post validation failed with: {}", meta.name(), err.message())
            };
            return Err(ValidationError::new(ErrorKind::PostValidation, message).into());
        }
    }
    Ok(())
}

#[derive(Debug)]
pub(super) struct RecordHandler;

impl TypeHandler for RecordHandler {
    fn name(&self) -> &str {
        "record"
    }

    fn claims(&self, ty: &Ty) -> bool {
        matches!(ty, Ty::Record(_))
    }

    fn load(&self, ty: &Ty, plain: &Plain, ctx: &mut ParseContext<'_>) -> Result<TypedValue, Error> {
        let Ty::Record(meta) = ty else {
            return Err(unexpected_type(self, ty));
        };
        let Plain::Object(map) = plain else {
            return Err(expected_plain("a mapping", plain));
        };
        load_record(meta, map, &[], ctx).map(TypedValue::Record)
    }

    fn dump(&self, ty: &Ty, value: &TypedValue, ctx: &mut ParseContext<'_>) -> Result<Plain, Error> {
        let Ty::Record(meta) = ty else {
            return Err(unexpected_type(self, ty));
        };
        match value {
            TypedValue::Record(record) if **record.metadata() == **meta => {
                dump_record(record, PlainMap::new(), ctx)
            }
            _ => Err(expected_typed(&format!("record {}", meta.name()), value)),
        }
    }

    fn validate(&self, ty: &Ty, value: &TypedValue, _ctx: &mut ParseContext<'_>) -> Result<(), Error> {
        validate_record(ty, value)
    }
}

#[derive(Debug)]
pub(super) struct ClassHandler;

impl TypeHandler for ClassHandler {
    fn name(&self) -> &str {
        "class"
    }

    fn claims(&self, ty: &Ty) -> bool {
        matches!(ty, Ty::Class(_))
    }

    fn load(&self, ty: &Ty, plain: &Plain, ctx: &mut ParseContext<'_>) -> Result<TypedValue, Error> {
        let Ty::Class(config) = ty else {
            return Err(unexpected_type(self, ty));
        };
        let Plain::Object(map) = plain else {
            return Err(expected_plain("a mapping", plain));
        };
        load_record(config.record(), map, &[], ctx).map(TypedValue::Record)
    }

    fn dump(&self, ty: &Ty, value: &TypedValue, ctx: &mut ParseContext<'_>) -> Result<Plain, Error> {
        let Ty::Class(config) = ty else {
            return Err(unexpected_type(self, ty));
        };
        match value {
            TypedValue::Record(record)
                if record
                    .class()
                    .is_some_and(|class| class.id() == config.class().id()) =>
            {
                dump_record(record, PlainMap::new(), ctx)
            }
            _ => Err(expected_typed(
                &format!("config for class {}", config.class().name()),
                value,
            )),
        }
    }

    fn validate(&self, ty: &Ty, value: &TypedValue, _ctx: &mut ParseContext<'_>) -> Result<(), Error> {
        validate_record(ty, value)
    }
}
