//! `tyconf` – type-directed marshalling of plain configuration data into strongly typed, polymorphic config trees.
//!
//! # Overview
//!
//! Configuration payloads (JSON / YAML documents, command-line overrides etc.) follow the JSON object model;
//! in this library, such payloads are represented as [`Plain`] values. The library converts plain values
//! to [`TypedValue`]s and back, guided by a [type descriptor](Ty). Descriptors range from primitives
//! and containers to records, enums and polymorphic class configs:
//!
//! - [Records](RecordMetadata) are named, ordered sets of typed fields with defaults and post-validations.
//!   Records are usually described with the [`DescribeRecord`](macro@DescribeRecord) derive macro.
//! - [Class configs](Ty::Class) are records synthesized from the constructor of a [class](class::ClassDef).
//!   A loaded class config can [build](Record::build()) the class instance.
//! - [Registry configs](Ty::Registry) and [subclass configs](Ty::Subclass) choose the class based on the `type`
//!   discriminator in the payload; the class is resolved via a [`ClassRegistry`](class::ClassRegistry)
//!   or a [`ClassCatalog`](class::ClassCatalog), respectively.
//!
//! Conversion is performed by a [dispatcher](de) over an ordered collection of [type handlers](de::TypeHandler).
//! Handlers for composite types recurse into child values via the dispatcher, so that each value in the tree
//! is processed in the same way. Errors are attributed to the path in the value tree and list
//! the types matched at this path, which helps debugging unions and optional types.
//!
//! Besides converting values, a load can collect [CLI anchor points](CliTable): paths in the value tree
//! that can be overridden from the command line. See the `tyconf-commands` crate for the CLI parser builder
//! consuming such a table.
//!
//! # Examples
//!
//! ```
//! use std::collections::HashMap;
//! use tyconf::{DescribeEnum, DescribeRecord};
//!
//! #[derive(Debug, PartialEq, DescribeEnum)]
//! enum Optimizer {
//!     #[config(rename = "sgd")]
//!     Sgd,
//!     #[config(rename = "adam")]
//!     Adam,
//! }
//!
//! /// Trainer configuration.
//! #[derive(Debug, DescribeRecord)]
//! struct TrainerConfig {
//!     /// Number of training epochs.
//!     epochs: u32,
//!     /// Learning rate.
//!     #[config(default_t = 0.1)]
//!     lr: f64,
//!     optimizer: Optimizer,
//!     #[config(default)]
//!     tags: HashMap<String, String>,
//! }
//!
//! let plain = serde_json::json!({
//!     "epochs": "10", // implicit lossless conversions are supported
//!     "optimizer": "adam",
//! });
//! let config: TrainerConfig = tyconf::from_plain(&plain)?;
//! assert_eq!(config.epochs, 10);
//! assert_eq!(config.lr, 0.1);
//! assert_eq!(config.optimizer, Optimizer::Adam);
//!
//! // Dumping produces a complete payload.
//! let dumped = tyconf::to_plain(&config)?;
//! assert_eq!(
//!     dumped,
//!     serde_json::json!({ "epochs": 10, "lr": 0.1, "optimizer": "adam", "tags": {} })
//! );
//!
//! // Errors are attributed to the path in the value tree.
//! let plain = serde_json::json!({ "epochs": 1.5, "optimizer": "sgd" });
//! let err = tyconf::from_plain::<TrainerConfig>(&plain).unwrap_err();
//! let err = err.as_validation().unwrap();
//! assert_eq!(err.path(), Some("epochs"));
//! assert_eq!(err.message(), "cannot implicitly cast float 1.5 to int");
//! # anyhow::Ok(())
//! ```
//!
//! # Logging
//!
//! The library logs via [`tracing`](https://docs.rs/tracing/) and never installs a subscriber.
//! Dispatching is instrumented with `trace`-level spans; class resolution and registry mutations are logged
//! at the `debug` level; post-validation failures are logged at the `warn` level.

// Linter settings
#![warn(missing_docs)]

/// Derives the [`DescribeRecord`](trait@DescribeRecord) trait for a struct with named fields.
///
/// Besides `DescribeRecord`, the macro implements [`Describe`], [`FromTyped`] and [`ToTyped`] traits,
/// so that the struct can be used with [`from_plain()`] and [`to_plain()`], and as a field
/// in other derived records.
///
/// Doc comments for the struct and its fields are used as human-readable help.
///
/// # Container attributes
///
/// ## `crate`
///
/// **Type:** path
///
/// Path to the `tyconf` crate. Useful if the crate is re-exported.
///
/// ## `rename`
///
/// **Type:** string
///
/// Record name used in error messages. By default, the struct name is used.
///
/// ## `validate`
///
/// **Type:** `(expr, description)`; can be specified multiple times
///
/// Post-validation for the record. The expression must either implement [`Validate`](validation::Validate)
/// for the struct, or be a closure / function taking a reference to the struct and returning
/// `bool`, `(bool, String)` or `Result<(), ValidationError>`.
///
/// # Field attributes
///
/// ## `rename`
///
/// **Type:** string
///
/// Field name in plain payloads. By default, the Rust field name is used.
///
/// ## `default`
///
/// **Type:** optional expression
///
/// Default value for the field. If the expression is omitted, [`Default`] is used. The default value
/// is dumped into a plain value when the metadata is created; on load, it's processed in the same way
/// as a value provided in the payload.
///
/// `Option`al fields have the implicit `None` default.
///
/// ## `default_t`
///
/// Synonym for `default = expr`.
///
/// ## `ty`
///
/// **Type:** expression evaluating to [`Ty`]
///
/// Overrides the type descriptor for the field. Useful for class configs, which don't have
/// a corresponding Rust type; such fields should have the [`Record`] Rust type.
///
/// # Examples
///
/// ```
/// use std::path::PathBuf;
/// use tyconf::DescribeRecord;
///
/// #[derive(Debug, DescribeRecord)]
/// #[config(validate(Self::check_batch_size, "batch size must be divisible by the number of devices"))]
/// struct DataConfig {
///     /// Path to the dataset.
///     #[config(rename = "path")]
///     dataset_path: PathBuf,
///     #[config(default_t = 32)]
///     batch_size: usize,
///     #[config(default_t = 1)]
///     devices: usize,
///     /// Samples to skip.
///     skip: Option<u64>,
/// }
///
/// impl DataConfig {
///     fn check_batch_size(&self) -> bool {
///         self.batch_size % self.devices == 0
///     }
/// }
///
/// let plain = serde_json::json!({ "path": "/data/train", "devices": 8 });
/// let config: DataConfig = tyconf::from_plain(&plain)?;
/// assert_eq!(config.dataset_path.as_os_str(), "/data/train");
/// assert_eq!(config.skip, None);
///
/// let plain = serde_json::json!({ "path": "/data/train", "devices": 3 });
/// let err = tyconf::from_plain::<DataConfig>(&plain).unwrap_err();
/// assert!(err.to_string().contains("DataConfig: post validation failed"));
/// # anyhow::Ok(())
/// ```
pub use tyconf_derive::DescribeRecord;

/// Derives the [`DescribeEnum`](trait@DescribeEnum) trait for an enum with unit variants.
///
/// Besides `DescribeEnum`, the macro implements [`Describe`], [`FromTyped`] and [`ToTyped`] traits.
///
/// # Variant attributes
///
/// ## `rename`
///
/// **Type:** string
///
/// Raw string value of the variant used in plain payloads. By default, the variant name is used.
///
/// ## `value`
///
/// **Type:** expression convertible to [`Plain`]
///
/// Raw value of the variant, e.g. an integer.
///
/// # Container attributes
///
/// ## `crate`, `rename`
///
/// Same as for [`DescribeRecord`](macro@DescribeRecord).
///
/// # Examples
///
/// ```
/// use tyconf::DescribeEnum;
///
/// #[derive(Debug, PartialEq, DescribeEnum)]
/// enum Precision {
///     #[config(value = 16)]
///     Half,
///     #[config(value = 32)]
///     Full,
/// }
///
/// let precision: Precision = tyconf::from_plain(&serde_json::json!(16))?;
/// assert_eq!(precision, Precision::Half);
/// assert_eq!(tyconf::to_plain(&Precision::Full)?, serde_json::json!(32));
/// # anyhow::Ok(())
/// ```
pub use tyconf_derive::DescribeEnum;

pub use self::{
    cli::{CliKind, CliTable},
    de::{TypeHandlers, parse_bool},
    error::{Error, ErrorKind, Operation, SchemaError, ValidationError},
    metadata::{EnumMetadata, FieldMetadata, PrimitiveType, RecordMetadata, Ty},
    typed::{Describe, DescribeEnum, DescribeRecord, FromTyped, ToTyped},
    utils::merge_at,
    value::{Plain, PlainMap, Record, TypedValue},
};

pub mod class;
pub mod cli;
pub mod de;
mod error;
pub mod metadata;
pub mod testing;
#[cfg(test)]
mod testonly;
mod typed;
mod utils;
pub mod validation;
pub mod value;

/// Loads a plain value using the built-in handlers.
///
/// # Errors
///
/// Returns a validation error if the value doesn't correspond to the type, or a schema error if the type
/// cannot be processed (e.g., there's no handler for an [opaque type](Ty::Opaque)).
pub fn load(ty: &Ty, plain: &Plain) -> Result<TypedValue, Error> {
    TypeHandlers::global().load(ty, plain)
}

/// Dumps a typed value using the built-in handlers.
///
/// # Errors
///
/// Returns a validation error if the value doesn't correspond to the type, or a schema error if the type
/// cannot be processed.
pub fn dump(ty: &Ty, value: &TypedValue) -> Result<Plain, Error> {
    TypeHandlers::global().dump(ty, value)
}

/// Loads a plain value collecting CLI anchor points. This is the shape discovery pass of the two-pass
/// CLI protocol: the returned table lists the paths that can be overridden from the command line.
///
/// # Errors
///
/// Same as for [`load()`].
pub fn discover(ty: &Ty, plain: &Plain) -> Result<(TypedValue, CliTable), Error> {
    let mut table = CliTable::new();
    let value = TypeHandlers::global().load_with_cli(ty, plain, &mut table)?;
    Ok((value, table))
}

/// Reconstructs a typed value by dumping it and loading the dump. This re-runs all validations
/// and fills in defaults for the current type definitions.
///
/// # Errors
///
/// Same as for [`load()`] and [`dump()`].
pub fn reload(ty: &Ty, value: &TypedValue) -> Result<TypedValue, Error> {
    let plain = dump(ty, value)?;
    load(ty, &plain)
}

/// Loads a Rust value from a plain value.
///
/// # Errors
///
/// Same as for [`load()`]. Additionally, the conversion to the Rust type may fail (e.g., if an integer is out
/// of range for the Rust type).
pub fn from_plain<T: Describe + FromTyped>(plain: &Plain) -> Result<T, Error> {
    let value = load(&T::ty(), plain)?;
    Ok(T::from_typed(value)?)
}

/// Dumps a Rust value into a plain value.
///
/// # Errors
///
/// Same as for [`dump()`].
pub fn to_plain<T: Describe + ToTyped>(value: &T) -> Result<Plain, Error> {
    let typed = value.to_typed()?;
    dump(&T::ty(), &typed)
}

/// Creates a plain mapping from the provided dotted path–value pairs. Values are converted via [`Plain::from()`]
/// and merged as per [`merge_at()`].
///
/// # Examples
///
/// ```
/// let plain = tyconf::config!(
///     "trainer.epochs": 10,
///     "trainer.optimizer.lr": 0.1,
///     "output": "/tmp/run",
/// );
/// assert_eq!(
///     plain,
///     serde_json::json!({
///         "trainer": { "epochs": 10, "optimizer": { "lr": 0.1 } },
///         "output": "/tmp/run",
///     })
/// );
/// ```
#[macro_export]
macro_rules! config {
    ($($path:tt : $value:expr),* $(,)?) => {{
        #[allow(unused_mut)]
        let mut plain = $crate::Plain::Object($crate::PlainMap::new());
        $(
        $crate::merge_at(&mut plain, $path, $crate::Plain::from($value));
        )*
        plain
    }};
}

#[cfg(doctest)]
doc_comment::doctest!("../README.md");
