//! Handlers for polymorphic configs resolved via the `type` discriminator.

use super::{
    ParseContext, PathSegment, TypeHandler, expected_plain, expected_typed,
    record::{dump_record, load_record, validate_record},
    unexpected_type,
};
use crate::{
    cli::CliKind,
    error::{Error, ErrorKind, ValidationError},
    metadata::Ty,
    value::{Plain, PlainMap, TypedValue, missing_field},
};

/// Name of the discriminator key.
pub(crate) const TYPE_KEY: &str = "type";

fn discriminator<'a>(
    plain: &'a Plain,
    ctx: &mut ParseContext<'_>,
) -> Result<(&'a PlainMap, &'a str), Error> {
    let Plain::Object(map) = plain else {
        return Err(expected_plain("a mapping with the `type` key", plain));
    };
    let name = match map.get(TYPE_KEY) {
        Some(Plain::String(name)) => name.as_str(),
        Some(other) => {
            return Err(ValidationError::type_mismatch(
                "a string `type` discriminator",
                super::plain_kind(other),
            )
            .into());
        }
        None => return Err(missing_field(TYPE_KEY).into()),
    };
    ctx.onto(PathSegment::Field(TYPE_KEY.to_owned()), |ctx| {
        ctx.mark_cli_anchor(CliKind::Str);
    });
    Ok((map, name))
}

fn unknown_class(name: &str, message: String) -> Error {
    ValidationError::new(
        ErrorKind::UnknownClass {
            name: name.to_owned(),
        },
        message,
    )
    .into()
}

fn with_discriminator(name: String) -> PlainMap {
    let mut output = PlainMap::new();
    output.insert(TYPE_KEY.to_owned(), Plain::String(name));
    output
}

#[derive(Debug)]
pub(super) struct RegistryHandler;

impl TypeHandler for RegistryHandler {
    fn name(&self) -> &str {
        "registry"
    }

    fn claims(&self, ty: &Ty) -> bool {
        matches!(ty, Ty::Registry(_))
    }

    fn load(&self, ty: &Ty, plain: &Plain, ctx: &mut ParseContext<'_>) -> Result<TypedValue, Error> {
        let Ty::Registry(registry) = ty else {
            return Err(unexpected_type(self, ty));
        };
        let (map, name) = discriminator(plain, ctx)?;
        let (class, inherit) = registry.lookup_with_inherit(name).ok_or_else(|| {
            unknown_class(
                name,
                format!("`{name}` is not registered in registry `{}`", registry.name()),
            )
        })?;
        tracing::debug!(registry = registry.name(), name, class = class.name(), inherit, "resolved class");

        let meta = class.record_metadata(inherit)?;
        load_record(&meta, map, &[TYPE_KEY], ctx).map(TypedValue::Record)
    }

    fn dump(&self, ty: &Ty, value: &TypedValue, ctx: &mut ParseContext<'_>) -> Result<Plain, Error> {
        let Ty::Registry(registry) = ty else {
            return Err(unexpected_type(self, ty));
        };
        let TypedValue::Record(record) = value else {
            return Err(expected_typed("a class config", value));
        };
        let class = record.class().ok_or_else(|| {
            expected_typed("a class config", value)
        })?;
        let name = registry
            .reverse_lookup(&class)
            .map_err(|err| unknown_class(class.name(), err.to_string()))?;
        dump_record(record, with_discriminator(name), ctx)
    }

    fn validate(&self, ty: &Ty, value: &TypedValue, _ctx: &mut ParseContext<'_>) -> Result<(), Error> {
        validate_record(ty, value)
    }
}

#[derive(Debug)]
pub(super) struct SubclassHandler;

impl TypeHandler for SubclassHandler {
    fn name(&self) -> &str {
        "subclass"
    }

    fn claims(&self, ty: &Ty) -> bool {
        matches!(ty, Ty::Subclass(_))
    }

    fn load(&self, ty: &Ty, plain: &Plain, ctx: &mut ParseContext<'_>) -> Result<TypedValue, Error> {
        let Ty::Subclass(spec) = ty else {
            return Err(unexpected_type(self, ty));
        };
        let (map, name) = discriminator(plain, ctx)?;
        let class = spec
            .catalog()
            .resolve_subclass(spec.base(), name)
            .map_err(|err| unknown_class(name, err.to_string()))?;
        tracing::debug!(base = spec.base().name(), name, class = class.name(), "resolved subclass");

        let meta = class.record_metadata(false)?;
        load_record(&meta, map, &[TYPE_KEY], ctx).map(TypedValue::Record)
    }

    fn dump(&self, ty: &Ty, value: &TypedValue, ctx: &mut ParseContext<'_>) -> Result<Plain, Error> {
        let Ty::Subclass(spec) = ty else {
            return Err(unexpected_type(self, ty));
        };
        let TypedValue::Record(record) = value else {
            return Err(expected_typed("a class config", value));
        };
        let class = record.class().ok_or_else(|| {
            expected_typed("a class config", value)
        })?;
        let name = spec
            .catalog()
            .discriminator_for(spec.base(), &class)
            .map_err(|err| unknown_class(class.name(), err.to_string()))?;
        dump_record(record, with_discriminator(name), ctx)
    }

    fn validate(&self, ty: &Ty, value: &TypedValue, _ctx: &mut ParseContext<'_>) -> Result<(), Error> {
        validate_record(ty, value)
    }
}
