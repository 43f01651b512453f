//! Handlers for structural types.

use std::path::PathBuf;

use super::{
    ParseContext, PathSegment, TypeHandler, expected_plain, expected_typed, path_to_string,
    scalar_key, unexpected_type, untyped_to_plain,
};
use crate::{
    cli::CliKind,
    error::{Error, ErrorKind, ValidationError},
    metadata::{PrimitiveType, Ty},
    value::{EnumValue, Plain, PlainMap, TypedValue},
};

#[derive(Debug)]
pub(super) struct AnyHandler;

impl TypeHandler for AnyHandler {
    fn name(&self) -> &str {
        "any"
    }

    fn claims(&self, ty: &Ty) -> bool {
        matches!(ty, Ty::Any)
    }

    fn load(&self, _ty: &Ty, plain: &Plain, _ctx: &mut ParseContext<'_>) -> Result<TypedValue, Error> {
        Ok(TypedValue::Any(plain.clone()))
    }

    fn dump(&self, _ty: &Ty, value: &TypedValue, _ctx: &mut ParseContext<'_>) -> Result<Plain, Error> {
        Ok(untyped_to_plain(value)?)
    }
}

#[derive(Debug)]
pub(super) struct NoneHandler;

impl TypeHandler for NoneHandler {
    fn name(&self) -> &str {
        "none"
    }

    fn claims(&self, ty: &Ty) -> bool {
        matches!(ty, Ty::None)
    }

    fn load(&self, _ty: &Ty, plain: &Plain, _ctx: &mut ParseContext<'_>) -> Result<TypedValue, Error> {
        match plain {
            Plain::Null => Ok(TypedValue::Null),
            _ => Err(expected_plain("null", plain)),
        }
    }

    fn dump(&self, _ty: &Ty, value: &TypedValue, _ctx: &mut ParseContext<'_>) -> Result<Plain, Error> {
        match value {
            TypedValue::Null => Ok(Plain::Null),
            _ => Err(expected_typed("null", value)),
        }
    }
}

#[derive(Debug)]
pub(super) struct OptionalHandler;

impl TypeHandler for OptionalHandler {
    fn name(&self) -> &str {
        "optional"
    }

    fn claims(&self, ty: &Ty) -> bool {
        ty.as_optional().is_some()
    }

    fn load(&self, ty: &Ty, plain: &Plain, ctx: &mut ParseContext<'_>) -> Result<TypedValue, Error> {
        let inner = ty.as_optional().ok_or_else(|| unexpected_type(self, ty))?;
        if plain.is_null() {
            if let Some(kind) = null_anchor_kind(inner) {
                ctx.mark_cli_anchor(kind);
            }
            return Ok(TypedValue::Null);
        }
        ctx.load(inner, plain)
    }

    fn dump(&self, ty: &Ty, value: &TypedValue, ctx: &mut ParseContext<'_>) -> Result<Plain, Error> {
        let inner = ty.as_optional().ok_or_else(|| unexpected_type(self, ty))?;
        match value {
            TypedValue::Null => Ok(Plain::Null),
            _ => ctx.dump(inner, value),
        }
    }
}

/// Optional fields set to `null` still produce a CLI flag if the inner type is primitive.
fn null_anchor_kind(inner: &Ty) -> Option<CliKind> {
    match inner {
        Ty::Primitive(ty) => Some(primitive_kind(*ty)),
        Ty::Path => Some(CliKind::Path),
        _ => None,
    }
}

pub(super) fn primitive_kind(ty: PrimitiveType) -> CliKind {
    match ty {
        PrimitiveType::Bool => CliKind::Bool,
        PrimitiveType::Int => CliKind::Int,
        PrimitiveType::Float => CliKind::Float,
        PrimitiveType::Str => CliKind::Str,
    }
}

#[derive(Debug)]
pub(super) struct PathHandler;

impl TypeHandler for PathHandler {
    fn name(&self) -> &str {
        "path"
    }

    fn claims(&self, ty: &Ty) -> bool {
        matches!(ty, Ty::Path)
    }

    fn load(&self, _ty: &Ty, plain: &Plain, ctx: &mut ParseContext<'_>) -> Result<TypedValue, Error> {
        let Plain::String(path) = plain else {
            return Err(expected_plain("a path string", plain));
        };
        ctx.mark_cli_anchor(CliKind::Path);
        Ok(TypedValue::Path(PathBuf::from(path)))
    }

    fn dump(&self, _ty: &Ty, value: &TypedValue, _ctx: &mut ParseContext<'_>) -> Result<Plain, Error> {
        match value {
            TypedValue::Path(path) => Ok(Plain::String(path_to_string(path)?)),
            _ => Err(expected_typed("a path", value)),
        }
    }
}

#[derive(Debug)]
pub(super) struct ListHandler;

impl TypeHandler for ListHandler {
    fn name(&self) -> &str {
        "list"
    }

    fn claims(&self, ty: &Ty) -> bool {
        matches!(ty, Ty::List(_))
    }

    fn load(&self, ty: &Ty, plain: &Plain, ctx: &mut ParseContext<'_>) -> Result<TypedValue, Error> {
        let Ty::List(item_ty) = ty else {
            return Err(unexpected_type(self, ty));
        };
        let Plain::Array(items) = plain else {
            return Err(expected_plain("a list", plain));
        };

        let items = items
            .iter()
            .enumerate()
            .map(|(i, item)| ctx.onto(PathSegment::Index(i), |ctx| ctx.load(item_ty, item)))
            .collect::<Result<_, _>>()?;
        ctx.mark_cli_anchor(CliKind::List);
        Ok(TypedValue::List(items))
    }

    fn dump(&self, ty: &Ty, value: &TypedValue, ctx: &mut ParseContext<'_>) -> Result<Plain, Error> {
        let Ty::List(item_ty) = ty else {
            return Err(unexpected_type(self, ty));
        };
        let TypedValue::List(items) = value else {
            return Err(expected_typed("a list", value));
        };

        let items = items
            .iter()
            .enumerate()
            .map(|(i, item)| ctx.onto(PathSegment::Index(i), |ctx| ctx.dump(item_ty, item)))
            .collect::<Result<_, _>>()?;
        Ok(Plain::Array(items))
    }
}

#[derive(Debug)]
pub(super) struct TupleHandler;

impl TypeHandler for TupleHandler {
    fn name(&self) -> &str {
        "tuple"
    }

    fn claims(&self, ty: &Ty) -> bool {
        matches!(ty, Ty::Tuple(_))
    }

    fn load(&self, ty: &Ty, plain: &Plain, ctx: &mut ParseContext<'_>) -> Result<TypedValue, Error> {
        let Ty::Tuple(types) = ty else {
            return Err(unexpected_type(self, ty));
        };
        let Plain::Array(items) = plain else {
            return Err(expected_plain("a list", plain));
        };
        check_len(types.len(), items.len())?;

        let items = types
            .iter()
            .zip(items)
            .enumerate()
            .map(|(i, (ty, item))| ctx.onto(PathSegment::Index(i), |ctx| ctx.load(ty, item)))
            .collect::<Result<_, _>>()?;
        ctx.mark_cli_anchor(CliKind::List);
        Ok(TypedValue::Tuple(items))
    }

    fn dump(&self, ty: &Ty, value: &TypedValue, ctx: &mut ParseContext<'_>) -> Result<Plain, Error> {
        let Ty::Tuple(types) = ty else {
            return Err(unexpected_type(self, ty));
        };
        let TypedValue::Tuple(items) = value else {
            return Err(expected_typed("a tuple", value));
        };
        check_len(types.len(), items.len())?;

        let items = types
            .iter()
            .zip(items)
            .enumerate()
            .map(|(i, (ty, item))| ctx.onto(PathSegment::Index(i), |ctx| ctx.dump(ty, item)))
            .collect::<Result<_, _>>()?;
        Ok(Plain::Array(items))
    }
}

fn check_len(expected: usize, actual: usize) -> Result<(), ValidationError> {
    if expected == actual {
        Ok(())
    } else {
        Err(ValidationError::type_mismatch(
            format_args!("a tuple of length {expected}"),
            format_args!("length {actual}"),
        ))
    }
}

#[derive(Debug)]
pub(super) struct DictHandler;

impl TypeHandler for DictHandler {
    fn name(&self) -> &str {
        "dict"
    }

    fn claims(&self, ty: &Ty) -> bool {
        matches!(ty, Ty::Dict(..))
    }

    fn load(&self, ty: &Ty, plain: &Plain, ctx: &mut ParseContext<'_>) -> Result<TypedValue, Error> {
        let Ty::Dict(key_ty, value_ty) = ty else {
            return Err(unexpected_type(self, ty));
        };
        let Plain::Object(map) = plain else {
            return Err(expected_plain("a mapping", plain));
        };

        let mut entries = Vec::with_capacity(map.len());
        for (name, value) in map {
            let plain_key = Plain::String(name.clone());
            let key = ctx.onto(PathSegment::DictKey(name.clone()), |ctx| {
                ctx.load(key_ty, &plain_key)
            })?;
            let value = ctx.onto(PathSegment::Field(name.clone()), |ctx| {
                ctx.load(value_ty, value)
            })?;
            entries.push((key, value));
        }
        ctx.mark_cli_anchor(CliKind::Dict);
        Ok(TypedValue::Dict(entries))
    }

    fn dump(&self, ty: &Ty, value: &TypedValue, ctx: &mut ParseContext<'_>) -> Result<Plain, Error> {
        let Ty::Dict(key_ty, value_ty) = ty else {
            return Err(unexpected_type(self, ty));
        };
        let TypedValue::Dict(entries) = value else {
            return Err(expected_typed("a dict", value));
        };

        let mut map = PlainMap::new();
        for (key, value) in entries {
            let key = ctx.onto(PathSegment::DictKey(key_segment(key)), |ctx| {
                let key = ctx.dump(key_ty, key)?;
                scalar_key(&key).map_err(|err| ctx.locate(err.into(), || key.to_string()))
            })?;
            let value = ctx.onto(PathSegment::Field(key.clone()), |ctx| {
                ctx.dump(value_ty, value)
            })?;
            map.insert(key, value);
        }
        Ok(Plain::Object(map))
    }
}

/// Renders a dict key for error paths; string keys are unquoted, as on load.
fn key_segment(key: &TypedValue) -> String {
    match key {
        TypedValue::Str(s) => s.clone(),
        TypedValue::Path(path) => path.display().to_string(),
        _ => key.to_string(),
    }
}

#[derive(Debug)]
pub(super) struct EnumHandler;

impl TypeHandler for EnumHandler {
    fn name(&self) -> &str {
        "enum"
    }

    fn claims(&self, ty: &Ty) -> bool {
        matches!(ty, Ty::Enum(_))
    }

    fn load(&self, ty: &Ty, plain: &Plain, ctx: &mut ParseContext<'_>) -> Result<TypedValue, Error> {
        let Ty::Enum(meta) = ty else {
            return Err(unexpected_type(self, ty));
        };
        let value = EnumValue::by_value(meta, plain).ok_or_else(|| {
            ValidationError::new(
                ErrorKind::NotEnumMember {
                    enum_name: meta.name().to_owned(),
                },
                format!("{plain} is not a valid member of enum {}", meta.name()),
            )
        })?;
        let choices = meta.members().iter().map(|member| member.value.clone());
        ctx.mark_cli_anchor(CliKind::Enum(choices.collect()));
        Ok(TypedValue::Enum(value))
    }

    fn dump(&self, ty: &Ty, value: &TypedValue, _ctx: &mut ParseContext<'_>) -> Result<Plain, Error> {
        let Ty::Enum(meta) = ty else {
            return Err(unexpected_type(self, ty));
        };
        match value {
            TypedValue::Enum(value) if **value.metadata() == **meta => Ok(value.raw_value().clone()),
            _ => Err(expected_typed(&format!("a member of enum {}", meta.name()), value)),
        }
    }
}

#[derive(Debug)]
pub(super) struct UnionHandler;

impl UnionHandler {
    /// Tries alternatives one by one. Validation errors make the handler proceed to the next alternative;
    /// schema errors are propagated immediately.
    fn try_alternatives<T>(
        ty: &Ty,
        alternatives: &[Ty],
        ctx: &mut ParseContext<'_>,
        mut action: impl FnMut(&Ty, &mut ParseContext<'_>) -> Result<T, Error>,
    ) -> Result<T, Error> {
        let mut errors = Vec::with_capacity(alternatives.len());
        for alternative in alternatives {
            let checkpoint = ctx.cli_checkpoint();
            let result = ctx.matching(format!("union:{alternative}"), |ctx| action(alternative, ctx));
            match result {
                Ok(output) => return Ok(output),
                Err(Error::Validation(err)) => {
                    tracing::trace!(%alternative, %err, "union alternative failed");
                    ctx.cli_rollback(checkpoint);
                    errors.push(err);
                }
                Err(err @ Error::Schema(_)) => return Err(err),
            }
        }
        Err(ValidationError::exhausted(
            format!("all possible types from {ty} are exhausted"),
            errors,
        )
        .into())
    }
}

impl TypeHandler for UnionHandler {
    fn name(&self) -> &str {
        "union"
    }

    fn claims(&self, ty: &Ty) -> bool {
        matches!(ty, Ty::Union(_))
    }

    fn load(&self, ty: &Ty, plain: &Plain, ctx: &mut ParseContext<'_>) -> Result<TypedValue, Error> {
        let Ty::Union(alternatives) = ty else {
            return Err(unexpected_type(self, ty));
        };
        Self::try_alternatives(ty, alternatives, ctx, |alternative, ctx| {
            ctx.load(alternative, plain)
        })
    }

    fn dump(&self, ty: &Ty, value: &TypedValue, ctx: &mut ParseContext<'_>) -> Result<Plain, Error> {
        let Ty::Union(alternatives) = ty else {
            return Err(unexpected_type(self, ty));
        };
        Self::try_alternatives(ty, alternatives, ctx, |alternative, ctx| {
            ctx.dump(alternative, value)
        })
    }
}
