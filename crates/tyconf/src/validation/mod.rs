//! Record post-validation.
//!
//! # Overview
//!
//! Post-validations are encapsulated in the [`Validate`] trait. They are attached to [`RecordMetadata`](crate::RecordMetadata)
//! and run after all record fields are loaded. A failed post-validation results in a
//! [`PostValidation`](crate::ErrorKind::PostValidation) error.
//!
//! Validations are usually defined via closures returning a `bool` or a `(bool, message)` tuple:
//!
//! ```
//! use tyconf::{validation, Record, RecordMetadata, Ty, TypedValue};
//!
//! let meta = RecordMetadata::builder("Schedule")
//!     .field("warmup", Ty::int())
//!     .field("total", Ty::int())
//!     .validate(validation::predicate(
//!         |record: &Record| {
//!             let warmup = record.get("warmup");
//!             let total = record.get("total");
//!             match (warmup, total) {
//!                 (Some(TypedValue::Int(warmup)), Some(TypedValue::Int(total))) => {
//!                     (warmup <= total, format!("warmup {warmup} exceeds total {total}"))
//!                 }
//!                 _ => (false, "unexpected field types".to_owned()),
//!             }
//!         },
//!         "warmup must not exceed total steps",
//!     ))
//!     .build()?;
//! let err = tyconf::load(&Ty::Record(meta), &serde_json::json!({ "warmup": 10, "total": 5 }))
//!     .unwrap_err();
//! assert!(err.to_string().contains("Schedule: post validation failed with: warmup 10 exceeds total 5"));
//! # anyhow::Ok(())
//! ```

use std::fmt;

use crate::error::{ErrorKind, ValidationError};

#[doc(hidden)] // only used in proc macros
pub mod _private;

/// Generic post-validation for a record.
pub trait Validate<T: ?Sized>: 'static + Send + Sync {
    /// Describes this validation.
    ///
    /// # Errors
    ///
    /// Should propagate formatting errors.
    fn describe(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result;

    /// Validates the target.
    ///
    /// # Errors
    ///
    /// Should return an error if validation fails. The error message is included into the post-validation error.
    fn validate(&self, target: &T) -> Result<(), ValidationError>;
}

impl<T: 'static + ?Sized> fmt::Debug for dyn Validate<T> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_tuple("Validate")
            .field(&self.to_string())
            .finish()
    }
}

impl<T: 'static + ?Sized> fmt::Display for dyn Validate<T> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.describe(formatter)
    }
}

/// Outcome of a post-validation predicate. Can be created from a `bool` or a `(bool, message)` tuple.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostValidation {
    ok: bool,
    message: Option<String>,
}

impl PostValidation {
    /// Successful outcome.
    pub const OK: Self = Self {
        ok: true,
        message: None,
    };

    /// Creates a failed outcome with the specified message.
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            message: Some(message.into()),
        }
    }

    /// Converts this outcome into a result.
    ///
    /// # Errors
    ///
    /// Returns a post-validation error for failed outcomes. The message is empty if the outcome doesn't specify it.
    pub fn into_result(self) -> Result<(), ValidationError> {
        if self.ok {
            Ok(())
        } else {
            Err(ValidationError::new(
                ErrorKind::PostValidation,
                self.message.unwrap_or_default(),
            ))
        }
    }
}

impl From<bool> for PostValidation {
    fn from(ok: bool) -> Self {
        Self { ok, message: None }
    }
}

impl From<(bool, String)> for PostValidation {
    fn from((ok, message): (bool, String)) -> Self {
        Self {
            ok,
            message: Some(message),
        }
    }
}

impl From<(bool, &str)> for PostValidation {
    fn from((ok, message): (bool, &str)) -> Self {
        Self::from((ok, message.to_owned()))
    }
}

/// Creates a validation from a predicate returning a `bool` or a `(bool, message)` tuple.
pub fn predicate<T, F, O>(predicate: F, description: &'static str) -> impl Validate<T>
where
    T: ?Sized + 'static,
    F: Fn(&T) -> O + Send + Sync + 'static,
    O: Into<PostValidation>,
{
    _private::WithDescription::<_, _private::OutcomePredicate>::new(predicate, description)
}

/// Creates a validation from a fallible predicate.
pub fn fallible<T, F>(predicate: F, description: &'static str) -> impl Validate<T>
where
    T: ?Sized + 'static,
    F: Fn(&T) -> Result<(), ValidationError> + Send + Sync + 'static,
{
    _private::WithDescription::<_, _private::ResultPredicate>::new(predicate, description)
}
