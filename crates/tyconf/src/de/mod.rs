//! Load / dump dispatching.
//!
//! # How it works
//!
//! Conversion between [`Plain`] and [`TypedValue`]s is driven by an ordered collection of [`TypeHandler`]s,
//! [`TypeHandlers`]. For each type descriptor, the first handler that [claims](TypeHandler::claims) the descriptor
//! performs the conversion. Handlers for composite types (lists, records, etc.) recurse into child values via
//! [`ParseContext::load()`] / [`ParseContext::dump()`], so that each child value passes through the dispatcher as well.
//!
//! The dispatcher records the name of the matched handler in the [`ParseContext`], and attaches the location
//! (path, matched types and the offending value) to the errors produced by the handler. Because a location
//! is only set once, the reported location is the innermost one.
//!
//! After a successful load, the dispatcher calls [`TypeHandler::validate()`]. By default, it performs a structural
//! check of the produced value against the descriptor; record handlers additionally run post-validations.
//!
//! # Built-in handlers
//!
//! [`TypeHandlers::builtin()`] contains handlers for all [`Ty`] variants except for [`Ty::Opaque`],
//! in the following order: `any`, `none`, `optional`, `path`, `list`, `tuple`, `dict`, `enum`, `union`,
//! `primitive`, `record`, `class`, `registry`, `subclass`. The order matters: e.g., `Union[T, None]`
//! is claimed by the `optional` handler.
//!
//! # Custom handlers
//!
//! Custom handlers can be added with [`TypeHandlers::with()`] (lowest priority) or
//! [`TypeHandlers::with_priority()`] (highest priority). Custom handlers usually claim [`Ty::Opaque`] descriptors.
//!
//! ```
//! use std::time::Duration;
//! use tyconf::{
//!     de::{ParseContext, TypeHandler, TypeHandlers},
//!     Error, Plain, Ty, TypedValue, ValidationError, value::OpaqueValue,
//! };
//!
//! #[derive(Debug)]
//! struct DurationHandler;
//!
//! impl TypeHandler for DurationHandler {
//!     fn name(&self) -> &str {
//!         "duration"
//!     }
//!
//!     fn claims(&self, ty: &Ty) -> bool {
//!         matches!(ty, Ty::Opaque(ty) if ty.name == "Duration")
//!     }
//!
//!     fn load(&self, _ty: &Ty, plain: &Plain, _ctx: &mut ParseContext<'_>) -> Result<TypedValue, Error> {
//!         let millis = plain
//!             .as_u64()
//!             .ok_or_else(|| ValidationError::custom("expected duration in milliseconds"))?;
//!         let duration = Duration::from_millis(millis);
//!         Ok(TypedValue::Opaque(OpaqueValue::new("Duration", duration)))
//!     }
//!
//!     fn dump(&self, _ty: &Ty, value: &TypedValue, _ctx: &mut ParseContext<'_>) -> Result<Plain, Error> {
//!         let duration = match value {
//!             TypedValue::Opaque(value) => value.downcast_ref::<Duration>(),
//!             _ => None,
//!         };
//!         let duration = duration.ok_or_else(|| ValidationError::custom("expected duration"))?;
//!         Ok(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX).into())
//!     }
//! }
//!
//! let handlers = TypeHandlers::builtin().with(DurationHandler);
//! let ty = Ty::list(Ty::opaque("Duration", []));
//! let value = handlers.load(&ty, &serde_json::json!([100, 2_000]))?;
//! let TypedValue::List(items) = &value else { unreachable!() };
//! assert_eq!(items.len(), 2);
//! assert_eq!(handlers.dump(&ty, &value)?, serde_json::json!([100, 2_000]));
//!
//! // Without the handler, the type cannot be processed.
//! let err = tyconf::load(&ty, &serde_json::json!([100])).unwrap_err();
//! assert!(err.as_schema().is_some());
//! # anyhow::Ok(())
//! ```

use std::{fmt, sync::{Arc, OnceLock}};

pub use self::{
    context::{ParseContext, PathSegment},
    primitive::parse_bool,
};
use crate::{
    cli::CliTable,
    error::{Error, Operation, SchemaError, ValidationError},
    metadata::Ty,
    value::{Plain, TypedValue},
};

mod builtin;
mod context;
mod polymorphic;
mod primitive;
mod record;

/// Handler converting values of a certain family of types.
pub trait TypeHandler: 'static + Send + Sync + fmt::Debug {
    /// Returns the handler name. It is recorded as a matched type in [`ParseContext`] and shown in error messages.
    fn name(&self) -> &str;

    /// Checks whether this handler can process the specified type.
    fn claims(&self, ty: &Ty) -> bool;

    /// Loads a plain value.
    ///
    /// # Errors
    ///
    /// Should return a validation error if the value has an unexpected shape.
    fn load(&self, ty: &Ty, plain: &Plain, ctx: &mut ParseContext<'_>) -> Result<TypedValue, Error>;

    /// Dumps a typed value.
    ///
    /// # Errors
    ///
    /// Should return a validation error if the value doesn't correspond to the type.
    fn dump(&self, ty: &Ty, value: &TypedValue, ctx: &mut ParseContext<'_>) -> Result<Plain, Error>;

    /// Validates the loaded value. By default, performs a structural check via [`Ty::check()`].
    ///
    /// # Errors
    ///
    /// Should return a validation error if validation fails.
    fn validate(&self, ty: &Ty, value: &TypedValue, ctx: &mut ParseContext<'_>) -> Result<(), Error> {
        let _ = ctx;
        ty.check(value).map_err(Into::into)
    }
}

/// Ordered collection of [`TypeHandler`]s.
#[derive(Debug, Clone)]
pub struct TypeHandlers {
    handlers: Vec<Arc<dyn TypeHandler>>,
}

impl Default for TypeHandlers {
    fn default() -> Self {
        Self::builtin()
    }
}

impl TypeHandlers {
    /// Returns built-in handlers in the canonical order.
    pub fn builtin() -> Self {
        Self::empty()
            .with(builtin::AnyHandler)
            .with(builtin::NoneHandler)
            .with(builtin::OptionalHandler)
            .with(builtin::PathHandler)
            .with(builtin::ListHandler)
            .with(builtin::TupleHandler)
            .with(builtin::DictHandler)
            .with(builtin::EnumHandler)
            .with(builtin::UnionHandler)
            .with(primitive::PrimitiveHandler)
            .with(record::RecordHandler)
            .with(record::ClassHandler)
            .with(polymorphic::RegistryHandler)
            .with(polymorphic::SubclassHandler)
    }

    pub(crate) fn global() -> &'static Self {
        static BUILTIN: OnceLock<TypeHandlers> = OnceLock::new();
        BUILTIN.get_or_init(Self::builtin)
    }

    /// Creates an empty collection.
    pub fn empty() -> Self {
        Self {
            handlers: Vec::new(),
        }
    }

    /// Appends a handler with the lowest priority.
    #[must_use]
    pub fn with(mut self, handler: impl TypeHandler) -> Self {
        self.handlers.push(Arc::new(handler));
        self
    }

    /// Prepends a handler with the highest priority.
    #[must_use]
    pub fn with_priority(mut self, handler: impl TypeHandler) -> Self {
        self.handlers.insert(0, Arc::new(handler));
        self
    }

    /// Iterates over handler names in the priority order.
    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.handlers.iter().map(|handler| handler.name())
    }

    /// Finds the handler for the specified type.
    pub fn find(&self, ty: &Ty) -> Option<&dyn TypeHandler> {
        self.handlers
            .iter()
            .find(|handler| handler.claims(ty))
            .map(|handler| &**handler)
    }

    /// Loads a plain value.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the value doesn't correspond to the type, or a schema error
    /// if the type cannot be processed.
    pub fn load(&self, ty: &Ty, plain: &Plain) -> Result<TypedValue, Error> {
        ParseContext::new(self, Operation::Load, None).load(ty, plain)
    }

    /// Loads a plain value, collecting CLI anchor points into the provided table.
    ///
    /// # Errors
    ///
    /// Same as for [`Self::load()`].
    pub fn load_with_cli(
        &self,
        ty: &Ty,
        plain: &Plain,
        cli: &mut CliTable,
    ) -> Result<TypedValue, Error> {
        ParseContext::new(self, Operation::Load, Some(cli)).load(ty, plain)
    }

    /// Dumps a typed value.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the value doesn't correspond to the type, or a schema error
    /// if the type cannot be processed.
    pub fn dump(&self, ty: &Ty, value: &TypedValue) -> Result<Plain, Error> {
        ParseContext::new(self, Operation::Dump, None).dump(ty, value)
    }
}

fn find_handler<'a>(ctx: &ParseContext<'a>, ty: &Ty) -> Result<&'a dyn TypeHandler, Error> {
    ctx.handlers()
        .find(ty)
        .ok_or_else(|| SchemaError::new(format!("no handler for type {ty}")).into())
}

fn dispatch_load(ctx: &mut ParseContext<'_>, ty: &Ty, plain: &Plain) -> Result<TypedValue, Error> {
    let handler = find_handler(ctx, ty)?;
    let _span = tracing::trace_span!("load", %ty, handler = handler.name()).entered();
    ctx.matching(handler.name(), |ctx| {
        let result = handler.load(ty, plain, ctx).and_then(|value| {
            handler.validate(ty, &value, ctx)?;
            Ok(value)
        });
        result.map_err(|err| ctx.locate(err, || plain.to_string()))
    })
}

fn dispatch_dump(ctx: &mut ParseContext<'_>, ty: &Ty, value: &TypedValue) -> Result<Plain, Error> {
    let handler = find_handler(ctx, ty)?;
    let _span = tracing::trace_span!("dump", %ty, handler = handler.name()).entered();
    ctx.matching(handler.name(), |ctx| {
        handler
            .dump(ty, value, ctx)
            .map_err(|err| ctx.locate(err, || value.to_string()))
    })
}

/// Describes the kind of plain value for error messages.
pub(crate) fn plain_kind(plain: &Plain) -> &'static str {
    match plain {
        Plain::Null => "null",
        Plain::Bool(_) => "bool",
        Plain::Number(num) if num.is_f64() => "float",
        Plain::Number(_) => "int",
        Plain::String(_) => "string",
        Plain::Array(_) => "list",
        Plain::Object(_) => "mapping",
    }
}

pub(crate) fn expected_plain(expected: &str, plain: &Plain) -> Error {
    ValidationError::type_mismatch(expected, plain_kind(plain)).into()
}

pub(crate) fn expected_typed(expected: &str, value: &TypedValue) -> Error {
    ValidationError::type_mismatch(expected, value.kind_name()).into()
}

pub(crate) fn unexpected_type(handler: &dyn TypeHandler, ty: &Ty) -> Error {
    SchemaError::new(format!(
        "handler `{}` cannot process type {ty}",
        handler.name()
    ))
    .into()
}

/// Untyped conversion of a typed value to a plain value, used when the target type is `Any`.
pub(crate) fn untyped_to_plain(value: &TypedValue) -> Result<Plain, ValidationError> {
    Ok(match value {
        TypedValue::Null => Plain::Null,
        TypedValue::Bool(val) => Plain::Bool(*val),
        TypedValue::Int(val) => Plain::from(*val),
        TypedValue::Float(val) => float_to_plain(*val)?,
        TypedValue::Str(val) => Plain::String(val.clone()),
        TypedValue::Path(path) => Plain::String(path_to_string(path)?),
        TypedValue::Enum(val) => val.raw_value().clone(),
        TypedValue::List(items) | TypedValue::Tuple(items) => Plain::Array(
            items
                .iter()
                .map(untyped_to_plain)
                .collect::<Result<_, _>>()?,
        ),
        TypedValue::Dict(entries) => {
            let mut map = crate::PlainMap::new();
            for (key, value) in entries {
                let key = scalar_key(&untyped_to_plain(key)?)?;
                map.insert(key, untyped_to_plain(value)?);
            }
            Plain::Object(map)
        }
        TypedValue::Record(record) => {
            let mut map = crate::PlainMap::new();
            for (name, value) in record.fields() {
                map.insert(name.to_owned(), untyped_to_plain(value)?);
            }
            Plain::Object(map)
        }
        TypedValue::Any(val) => val.clone(),
        TypedValue::Opaque(val) => {
            return Err(ValidationError::custom(format!(
                "cannot convert opaque value of type `{}` without a type",
                val.type_name()
            )));
        }
    })
}

pub(crate) fn float_to_plain(val: f64) -> Result<Plain, ValidationError> {
    serde_json::Number::from_f64(val)
        .map(Plain::Number)
        .ok_or_else(|| ValidationError::custom(format!("cannot represent float {val} as a plain value")))
}

pub(crate) fn path_to_string(path: &std::path::Path) -> Result<String, ValidationError> {
    path.to_str()
        .map(str::to_owned)
        .ok_or_else(|| ValidationError::custom(format!("path {} is not valid UTF-8", path.display())))
}

pub(crate) fn scalar_key(key: &Plain) -> Result<String, ValidationError> {
    match key {
        Plain::String(s) => Ok(s.clone()),
        Plain::Number(num) => Ok(num.to_string()),
        Plain::Bool(val) => Ok(val.to_string()),
        _ => Err(ValidationError::type_mismatch(
            "dictionary key dumped to a scalar",
            plain_kind(key),
        )),
    }
}
