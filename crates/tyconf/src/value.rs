//! Plain and typed values.

use std::{any::Any, borrow::Cow, fmt, mem, path::PathBuf, sync::Arc};

use anyhow::Context as _;

use crate::{
    class::{Args, ClassDef, Instance},
    error::{ErrorKind, ValidationError},
    metadata::{EnumMetadata, RecordMetadata},
    typed::FromTyped,
};

/// Plain (JSON-like) value: `null`, booleans, numbers, strings, lists and string-keyed mappings.
pub type Plain = serde_json::Value;
/// Plain mapping. Preserves the key insertion order.
pub type PlainMap = serde_json::Map<String, Plain>;

/// Reserved key in record payloads carrying free-form side-channel data. It is popped before field matching.
pub const META_KEY: &str = "_meta";

/// Typed value produced by loading a [`Plain`] value against a [`Ty`](crate::Ty).
#[derive(Debug, Clone, Default, PartialEq)]
#[non_exhaustive]
pub enum TypedValue {
    /// Null value.
    #[default]
    Null,
    /// Boolean value.
    Bool(bool),
    /// Integer value.
    Int(i64),
    /// Floating-point value.
    Float(f64),
    /// String value.
    Str(String),
    /// Filesystem path.
    Path(PathBuf),
    /// Enum member.
    Enum(EnumValue),
    /// List.
    List(Vec<TypedValue>),
    /// Tuple.
    Tuple(Vec<TypedValue>),
    /// Dictionary. Entries are ordered as in the source payload.
    Dict(Vec<(TypedValue, TypedValue)>),
    /// Record.
    Record(Record),
    /// Untyped value.
    Any(Plain),
    /// Value produced by a custom handler.
    Opaque(OpaqueValue),
}

impl TypedValue {
    /// Returns a human-readable description of the value kind, e.g. `int` or `record TrainerConfig`.
    pub fn kind_name(&self) -> Cow<'static, str> {
        match self {
            Self::Null => "null".into(),
            Self::Bool(_) => "bool".into(),
            Self::Int(_) => "int".into(),
            Self::Float(_) => "float".into(),
            Self::Str(_) => "str".into(),
            Self::Path(_) => "path".into(),
            Self::Enum(value) => format!("enum {}", value.meta.name()).into(),
            Self::List(_) => "list".into(),
            Self::Tuple(_) => "tuple".into(),
            Self::Dict(_) => "dict".into(),
            Self::Record(record) => format!("record {}", record.metadata.name()).into(),
            Self::Any(_) => "any".into(),
            Self::Opaque(value) => value.type_name.clone(),
        }
    }

    /// Returns the contained record, if any.
    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Self::Record(record) => Some(record),
            _ => None,
        }
    }

    /// Returns the contained string, if any.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for TypedValue {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn write_seq(
            formatter: &mut fmt::Formatter<'_>,
            items: &[TypedValue],
            (start, end): (&str, &str),
        ) -> fmt::Result {
            formatter.write_str(start)?;
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    formatter.write_str(", ")?;
                }
                fmt::Display::fmt(item, formatter)?;
            }
            formatter.write_str(end)
        }

        match self {
            Self::Null => formatter.write_str("null"),
            Self::Bool(val) => write!(formatter, "{val}"),
            Self::Int(val) => write!(formatter, "{val}"),
            Self::Float(val) => write!(formatter, "{val:?}"),
            Self::Str(val) => write!(formatter, "{val:?}"),
            Self::Path(val) => write!(formatter, "{:?}", val.display().to_string()),
            Self::Enum(val) => write!(formatter, "{}.{}", val.meta.name(), val.name()),
            Self::List(items) => write_seq(formatter, items, ("[", "]")),
            Self::Tuple(items) => write_seq(formatter, items, ("(", ")")),
            Self::Dict(entries) => {
                formatter.write_str("{")?;
                for (i, (key, value)) in entries.iter().enumerate() {
                    if i > 0 {
                        formatter.write_str(", ")?;
                    }
                    write!(formatter, "{key}: {value}")?;
                }
                formatter.write_str("}")
            }
            Self::Record(record) => fmt::Display::fmt(record, formatter),
            Self::Any(val) => write!(formatter, "{val}"),
            Self::Opaque(val) => write!(formatter, "<{}>", val.type_name),
        }
    }
}

/// Enum member as a typed value.
#[derive(Debug, Clone, PartialEq)]
pub struct EnumValue {
    meta: Arc<EnumMetadata>,
    index: usize,
}

impl EnumValue {
    /// Gets a member by its 0-based index.
    pub fn new(meta: &Arc<EnumMetadata>, index: usize) -> Option<Self> {
        (index < meta.members().len()).then(|| Self {
            meta: meta.clone(),
            index,
        })
    }

    /// Gets a member by its name.
    pub fn by_name(meta: &Arc<EnumMetadata>, name: &str) -> Option<Self> {
        let index = meta.index_of_name(name)?;
        Some(Self {
            meta: meta.clone(),
            index,
        })
    }

    /// Gets a member by its raw value.
    pub fn by_value(meta: &Arc<EnumMetadata>, value: &Plain) -> Option<Self> {
        let index = meta.index_of_value(value)?;
        Some(Self {
            meta: meta.clone(),
            index,
        })
    }

    /// Returns the enum metadata.
    pub fn metadata(&self) -> &Arc<EnumMetadata> {
        &self.meta
    }

    /// Returns the 0-based member index.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Returns the member name.
    pub fn name(&self) -> &str {
        &self.meta.members()[self.index].name
    }

    /// Returns the raw member value.
    pub fn raw_value(&self) -> &Plain {
        &self.meta.members()[self.index].value
    }
}

/// Value produced by a custom [`TypeHandler`](crate::de::TypeHandler).
#[derive(Clone)]
pub struct OpaqueValue {
    type_name: Cow<'static, str>,
    value: Arc<dyn Any + Send + Sync>,
}

impl fmt::Debug for OpaqueValue {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("OpaqueValue")
            .field("type_name", &self.type_name)
            .finish_non_exhaustive()
    }
}

impl PartialEq for OpaqueValue {
    fn eq(&self, other: &Self) -> bool {
        self.type_name == other.type_name && Arc::ptr_eq(&self.value, &other.value)
    }
}

impl OpaqueValue {
    /// Wraps a value.
    pub fn new<T: Any + Send + Sync>(type_name: impl Into<Cow<'static, str>>, value: T) -> Self {
        Self {
            type_name: type_name.into(),
            value: Arc::new(value),
        }
    }

    /// Returns the type name.
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Attempts to downcast the wrapped value.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.value.downcast_ref()
    }
}

/// Loaded record: field values in the declaration order plus an optional side-channel `_meta` payload.
#[derive(Debug, Clone)]
pub struct Record {
    metadata: Arc<RecordMetadata>,
    values: Vec<TypedValue>,
    meta: Option<Plain>,
}

impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        self.metadata.id() == other.metadata.id()
            && self.values == other.values
            && self.meta == other.meta
    }
}

impl fmt::Display for Record {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}(", self.metadata.name())?;
        for (i, (name, value)) in self.fields().enumerate() {
            if i > 0 {
                formatter.write_str(", ")?;
            }
            write!(formatter, "{name}={value}")?;
        }
        formatter.write_str(")")
    }
}

impl Record {
    /// Creates a record from the provided field values. Missing fields are filled with defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if a field without a default is missing, an unknown field is provided,
    /// or a value doesn't match the field type.
    pub fn from_fields<N: Into<String>>(
        metadata: &Arc<RecordMetadata>,
        fields: impl IntoIterator<Item = (N, TypedValue)>,
    ) -> Result<Self, ValidationError> {
        let mut values: Vec<Option<TypedValue>> = vec![None; metadata.fields().len()];
        let mut unrecognized = vec![];
        for (name, value) in fields {
            let name = name.into();
            match metadata.field_index(&name) {
                Some(idx) => values[idx] = Some(value),
                None => unrecognized.push(name),
            }
        }
        if !unrecognized.is_empty() {
            return Err(unrecognized_fields(metadata, unrecognized));
        }

        let values = metadata
            .fields()
            .iter()
            .zip(values)
            .map(|(field, value)| -> Result<_, ValidationError> {
                let value = match (value, &field.default) {
                    (Some(value), _) => value,
                    (None, Some(default)) => {
                        crate::load(&field.ty, default).map_err(|err| match err {
                            crate::Error::Validation(err) => err,
                            crate::Error::Schema(err) => ValidationError::custom(err),
                        })?
                    }
                    (None, None) => return Err(missing_field(&field.name)),
                };
                field.ty.check(&value)?;
                Ok(value)
            })
            .collect::<Result<_, _>>()?;
        Ok(Self {
            metadata: metadata.clone(),
            values,
            meta: None,
        })
    }

    /// Creates a record from values in the field declaration order without checks.
    #[doc(hidden)] // used by derive macros
    pub fn from_values(metadata: Arc<RecordMetadata>, values: Vec<TypedValue>) -> Self {
        debug_assert_eq!(metadata.fields().len(), values.len());
        Self {
            metadata,
            values,
            meta: None,
        }
    }

    /// Returns the record metadata.
    pub fn metadata(&self) -> &Arc<RecordMetadata> {
        &self.metadata
    }

    /// Returns field values in the declaration order.
    pub fn values(&self) -> &[TypedValue] {
        &self.values
    }

    /// Iterates over `(name, value)` pairs in the declaration order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &TypedValue)> + '_ {
        self.metadata
            .fields()
            .iter()
            .map(|field| field.name.as_str())
            .zip(&self.values)
    }

    /// Gets a field value by name.
    pub fn get(&self, name: &str) -> Option<&TypedValue> {
        let idx = self.metadata.field_index(name)?;
        Some(&self.values[idx])
    }

    /// Takes a field value, replacing it with [`TypedValue::Null`].
    pub fn take(&mut self, name: &str) -> Option<TypedValue> {
        let idx = self.metadata.field_index(name)?;
        Some(mem::take(&mut self.values[idx]))
    }

    /// Takes and converts a field value.
    #[doc(hidden)] // used by derive macros
    pub fn take_field<T: FromTyped>(&mut self, name: &str) -> Result<T, ValidationError> {
        let value = self.take(name).ok_or_else(|| missing_field(name))?;
        T::from_typed(value)
    }

    /// Returns the side-channel `_meta` payload, if it was present.
    pub fn meta(&self) -> Option<&Plain> {
        self.meta.as_ref()
    }

    pub(crate) fn set_meta(&mut self, meta: Option<Plain>) {
        self.meta = meta;
    }

    /// Returns the class the record was synthesized from, if any.
    pub fn class(&self) -> Option<Arc<ClassDef>> {
        self.metadata.class()
    }

    /// Converts fields to constructor arguments.
    pub fn args(&self) -> Args {
        self.fields()
            .map(|(name, value)| (name.to_owned(), value.clone()))
            .collect()
    }

    /// Builds an instance of the bound class.
    ///
    /// # Errors
    ///
    /// Returns an error if the record isn't bound to a class, or the class constructor fails.
    pub fn build(&self) -> anyhow::Result<Instance> {
        self.build_with(Args::default())
    }

    /// Builds an instance of the bound class, overriding some constructor arguments.
    ///
    /// # Errors
    ///
    /// Returns an error if the record isn't bound to a class, or the class constructor fails.
    pub fn build_with(&self, overrides: Args) -> anyhow::Result<Instance> {
        let class = self.class().with_context(|| {
            format!("record `{}` is not bound to a class", self.metadata.name())
        })?;
        let mut args = self.args();
        args.extend(overrides);
        class
            .construct(args)
            .with_context(|| format!("failed constructing `{}`", class.name()))
    }

    /// Builds an instance of the bound class and downcasts it to the specified type.
    ///
    /// # Errors
    ///
    /// Returns an error if building fails, or the built instance has an unexpected type.
    pub fn build_as<T: Any>(&self) -> anyhow::Result<T> {
        let instance = self.build()?;
        instance.downcast()
    }
}

pub(crate) fn missing_field(name: &str) -> ValidationError {
    ValidationError::new(
        ErrorKind::MissingField {
            field: name.to_owned(),
        },
        format!("`{name}` is expected, but it is not set"),
    )
}

pub(crate) fn unrecognized_fields(meta: &RecordMetadata, fields: Vec<String>) -> ValidationError {
    let message = format!(
        "{}: unrecognized fields {}",
        meta.name(),
        fields.join(", ")
    );
    ValidationError::new(ErrorKind::UnrecognizedFields { fields }, message)
}
