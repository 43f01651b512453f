//! Marshalling errors.

use std::fmt;

/// Direction of the conversion during which an error has occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Conversion from a plain value into a typed value.
    Load,
    /// Conversion from a typed value into a plain value.
    Dump,
}

impl Operation {
    fn verb(self) -> &'static str {
        match self {
            Self::Load => "loaded",
            Self::Dump => "dumped",
        }
    }
}

/// Category of a [`ValidationError`].
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorKind {
    /// Value has a shape incompatible with the expected type (e.g., a string instead of a list).
    TypeMismatch,
    /// Primitive conversion would lose information (e.g., `1.5` to an integer).
    ImplicitCast,
    /// Record field without a default is not set in the payload.
    MissingField {
        /// Name of the missing field.
        field: String,
    },
    /// Payload contains keys not declared by the record.
    UnrecognizedFields {
        /// Unrecognized keys in the payload order.
        fields: Vec<String>,
    },
    /// Value doesn't correspond to any enum member.
    NotEnumMember {
        /// Name of the enum.
        enum_name: String,
    },
    /// Polymorphic discriminator could not be resolved to a class.
    UnknownClass {
        /// Discriminator value.
        name: String,
    },
    /// All alternatives of a union were tried and failed.
    AlternativesExhausted,
    /// Record post-validation has failed.
    PostValidation,
    /// Other error.
    Custom,
}

#[derive(Debug, Clone)]
struct Location {
    path: String,
    matched_types: Vec<String>,
    value: String,
    operation: Operation,
}

/// Error converting between plain and typed values.
///
/// Besides the error cause, an error carries its location: the path in the value tree, the types
/// that were matched at this path (useful to debug unions and optionals), and the rendered offending value.
/// The location is assigned by the innermost dispatcher boundary the error passes through.
#[derive(Clone)]
pub struct ValidationError {
    kind: ErrorKind,
    message: String,
    location: Option<Location>,
    alternatives: Vec<ValidationError>,
}

impl fmt::Debug for ValidationError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("ValidationError")
            .field("kind", &self.kind)
            .field("message", &self.message)
            .field("location", &self.location)
            .field("alternatives", &self.alternatives.len())
            .finish()
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_indented(formatter, 0)
    }
}

impl std::error::Error for ValidationError {}

impl ValidationError {
    /// Creates an error with the specified kind and message.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            location: None,
            alternatives: Vec::new(),
        }
    }

    /// Creates a custom error.
    pub fn custom(message: impl fmt::Display) -> Self {
        Self::new(ErrorKind::Custom, message.to_string())
    }

    pub(crate) fn type_mismatch(expected: impl fmt::Display, actual: impl fmt::Display) -> Self {
        Self::new(
            ErrorKind::TypeMismatch,
            format!("expected {expected}, found {actual}"),
        )
    }

    pub(crate) fn implicit_cast(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ImplicitCast, message)
    }

    pub(crate) fn exhausted(message: String, alternatives: Vec<Self>) -> Self {
        Self {
            alternatives,
            ..Self::new(ErrorKind::AlternativesExhausted, message)
        }
    }

    /// Returns the error category.
    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    /// Returns the error cause without location info.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the rendered path at which the error has occurred, e.g. `trainer.optimizer.lr`
    /// or `layers.index:0`. The root path is rendered as `<root>`.
    pub fn path(&self) -> Option<&str> {
        self.location.as_ref().map(|loc| loc.path.as_str())
    }

    /// Returns types matched at the error path, outermost first.
    pub fn matched_types(&self) -> &[String] {
        self.location
            .as_ref()
            .map_or(&[], |loc| loc.matched_types.as_slice())
    }

    /// Returns the rendered offending value.
    pub fn value(&self) -> Option<&str> {
        self.location.as_ref().map(|loc| loc.value.as_str())
    }

    /// Returns the operation during which the error has occurred.
    pub fn operation(&self) -> Option<Operation> {
        self.location.as_ref().map(|loc| loc.operation)
    }

    /// Returns errors for each tried alternative if this error is [`ErrorKind::AlternativesExhausted`].
    pub fn alternatives(&self) -> &[Self] {
        &self.alternatives
    }

    pub(crate) fn with_location_if_unset(
        mut self,
        operation: Operation,
        path: impl FnOnce() -> String,
        matched_types: impl FnOnce() -> Vec<String>,
        value: impl FnOnce() -> String,
    ) -> Self {
        if self.location.is_none() {
            self.location = Some(Location {
                path: path(),
                matched_types: matched_types(),
                value: value(),
                operation,
            });
        }
        self
    }

    fn fmt_indented(&self, formatter: &mut fmt::Formatter<'_>, indent: usize) -> fmt::Result {
        let Some(location) = &self.location else {
            return formatter.write_str(&self.message);
        };
        let matched = if location.matched_types.is_empty() {
            "empty".to_owned()
        } else {
            location.matched_types.join(" -> ")
        };
        write!(
            formatter,
            "value cannot be {verb} at `{path}` (matched types: {matched}): {message}; value: {value}",
            verb = location.operation.verb(),
            path = location.path,
            message = self.message,
            value = location.value
        )?;
        for alternative in &self.alternatives {
            write!(formatter, "\n{:indent$}  - ", "", indent = indent)?;
            alternative.fmt_indented(formatter, indent + 2)?;
        }
        Ok(())
    }
}

/// Error in a type schema, e.g. a missing type annotation for a class param or a type without a handler.
///
/// Unlike [`ValidationError`]s, schema errors indicate programming errors; they are never recovered from
/// (e.g., a union doesn't proceed to the next alternative on a schema error).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaError {
    message: String,
}

impl fmt::Display for SchemaError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "invalid schema: {}", self.message)
    }
}

impl std::error::Error for SchemaError {}

impl SchemaError {
    pub(crate) fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Returns the error message.
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Error returned by load / dump operations.
#[derive(Debug, Clone)]
pub enum Error {
    /// Data cannot be converted to / from the requested type.
    Validation(ValidationError),
    /// The type schema is malformed.
    Schema(SchemaError),
}

impl fmt::Display for Error {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Validation(err) => fmt::Display::fmt(err, formatter),
            Self::Schema(err) => fmt::Display::fmt(err, formatter),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Schema(err) => Some(err),
        }
    }
}

impl From<ValidationError> for Error {
    fn from(err: ValidationError) -> Self {
        Self::Validation(err)
    }
}

impl From<SchemaError> for Error {
    fn from(err: SchemaError) -> Self {
        Self::Schema(err)
    }
}

impl Error {
    /// Returns the validation error, if this is one.
    pub fn as_validation(&self) -> Option<&ValidationError> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Schema(_) => None,
        }
    }

    /// Returns the schema error, if this is one.
    pub fn as_schema(&self) -> Option<&SchemaError> {
        match self {
            Self::Schema(err) => Some(err),
            Self::Validation(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn displaying_error_with_location() {
        let err = ValidationError::implicit_cast("cannot implicitly cast float 1.5 to int")
            .with_location_if_unset(
                Operation::Load,
                || "trainer.lr".to_owned(),
                || vec!["record".to_owned(), "primitive".to_owned()],
                || "1.5".to_owned(),
            );
        let message = err.to_string();
        assert_eq!(
            message,
            "value cannot be loaded at `trainer.lr` (matched types: record -> primitive): \
             cannot implicitly cast float 1.5 to int; value: 1.5"
        );

        // Location is only set once.
        let err = err.with_location_if_unset(
            Operation::Dump,
            || "other".to_owned(),
            Vec::new,
            String::new,
        );
        assert_eq!(err.path(), Some("trainer.lr"));
        assert_eq!(err.operation(), Some(Operation::Load));
    }

    #[test]
    fn displaying_error_without_location() {
        let err = ValidationError::type_mismatch("a list", "string \"1\"");
        assert_eq!(err.to_string(), "expected a list, found string \"1\"");
        assert_eq!(err.path(), None);
        assert!(err.matched_types().is_empty());
    }
}
