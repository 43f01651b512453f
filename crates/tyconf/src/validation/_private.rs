use std::{fmt, marker::PhantomData};

use super::{PostValidation, Validate};
use crate::{
    error::ValidationError,
    typed::FromTyped,
    value::{Record, TypedValue},
};

/// Tag for `WithDescription` wrapping a type that already implements a validation.
#[derive(Debug)]
pub struct Delegated(());

/// Tag for `WithDescription` wrapping a predicate returning `bool` or `(bool, String)`.
#[derive(Debug)]
pub struct OutcomePredicate(());

/// Tag for `WithDescription` wrapping a predicate of form `fn(&T) -> Result<(), ValidationError>`.
#[derive(Debug)]
pub struct ResultPredicate(());

/// Wrapper for validation allowing to (re)define its description.
///
/// The `Kind` type param is inferred automatically by the compiler and allows to distinguish between
/// 3 types of wrappers currently supported.
#[derive(Debug)]
pub struct WithDescription<V, Kind> {
    inner: V,
    description: &'static str,
    _kind: PhantomData<Kind>,
}

impl<V, Kind> WithDescription<V, Kind> {
    pub const fn new(inner: V, description: &'static str) -> Self {
        Self {
            inner,
            description,
            _kind: PhantomData,
        }
    }
}

impl<T: ?Sized, V: Validate<T>> Validate<T> for WithDescription<V, Delegated> {
    fn describe(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.description)
    }

    fn validate(&self, target: &T) -> Result<(), ValidationError> {
        self.inner.validate(target)
    }
}

impl<T, F, O> Validate<T> for WithDescription<F, OutcomePredicate>
where
    T: ?Sized + 'static,
    F: Fn(&T) -> O + Send + Sync + 'static,
    O: Into<PostValidation>,
{
    fn describe(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.description)
    }

    fn validate(&self, target: &T) -> Result<(), ValidationError> {
        (self.inner)(target).into().into_result()
    }
}

impl<T, F> Validate<T> for WithDescription<F, ResultPredicate>
where
    T: ?Sized + 'static,
    F: Fn(&T) -> Result<(), ValidationError> + Send + Sync + 'static,
{
    fn describe(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.description)
    }

    fn validate(&self, target: &T) -> Result<(), ValidationError> {
        (self.inner)(target)
    }
}

/// Runs a validation defined on a typed struct against a loaded [`Record`].
#[derive(Debug)]
pub struct TypedValidation<T, V> {
    validation: V,
    _ty: PhantomData<fn(&T)>,
}

impl<T: FromTyped + 'static, V: Validate<T>> TypedValidation<T, V> {
    pub const fn new(validation: V) -> Self {
        Self {
            validation,
            _ty: PhantomData,
        }
    }
}

impl<T: FromTyped + 'static, V: Validate<T>> Validate<Record> for TypedValidation<T, V> {
    fn describe(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.validation.describe(formatter)
    }

    fn validate(&self, target: &Record) -> Result<(), ValidationError> {
        let target = T::from_typed(TypedValue::Record(target.clone()))?;
        self.validation.validate(&target)
    }
}
