//! Type descriptors and record / enum metadata.
//!
//! A [`Ty`] describes the expected shape of a configuration value. Descriptors are immutable and can be freely
//! shared among threads; composite descriptors reference [`RecordMetadata`], [`EnumMetadata`] and class-related
//! types via `Arc`s.

use std::{
    borrow::Cow,
    fmt,
    sync::{Arc, Weak},
};

use crate::{
    class::{ClassCatalog, ClassDef, ClassRegistry},
    error::{SchemaError, ValidationError},
    utils::next_id,
    validation::Validate,
    value::{Plain, Record, TypedValue},
};

#[doc(hidden)] // only used in proc macros
pub mod _private;
#[cfg(test)]
mod tests;

/// Primitive scalar type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveType {
    /// Boolean value.
    Bool,
    /// Signed integer (fits into `i64`).
    Int,
    /// Floating-point number.
    Float,
    /// String.
    Str,
}

impl PrimitiveType {
    /// Returns the type name as used in error messages, e.g. `int`.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::Int => "int",
            Self::Float => "float",
            Self::Str => "str",
        }
    }
}

impl fmt::Display for PrimitiveType {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.name())
    }
}

/// Type descriptor.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum Ty {
    /// Any plain value; no conversion is performed.
    Any,
    /// `null` only.
    None,
    /// Primitive scalar.
    Primitive(PrimitiveType),
    /// Filesystem path.
    Path,
    /// Either `null` or a value of the inner type.
    Optional(Box<Ty>),
    /// Value of one of the listed types. Alternatives are tried in the declaration order.
    Union(Vec<Ty>),
    /// Homogeneous list.
    List(Box<Ty>),
    /// Fixed-length heterogeneous tuple.
    Tuple(Vec<Ty>),
    /// Mapping with the specified key and value types.
    Dict(Box<Ty>, Box<Ty>),
    /// Enumeration.
    Enum(Arc<EnumMetadata>),
    /// Nested record.
    Record(Arc<RecordMetadata>),
    /// Record synthesized from the constructor of a fixed class.
    Class(ClassConfig),
    /// Record for a class resolved from a [`ClassRegistry`] via the `type` discriminator.
    Registry(Arc<ClassRegistry>),
    /// Record for a subclass of a base class resolved via the `type` discriminator.
    Subclass(SubclassSpec),
    /// Type handled by a custom [`TypeHandler`](crate::de::TypeHandler).
    Opaque(OpaqueType),
}

impl Ty {
    /// Boolean type.
    pub const fn bool() -> Self {
        Self::Primitive(PrimitiveType::Bool)
    }

    /// Integer type.
    pub const fn int() -> Self {
        Self::Primitive(PrimitiveType::Int)
    }

    /// Floating-point type.
    pub const fn float() -> Self {
        Self::Primitive(PrimitiveType::Float)
    }

    /// String type.
    pub const fn str() -> Self {
        Self::Primitive(PrimitiveType::Str)
    }

    /// Optional type.
    pub fn optional(inner: Self) -> Self {
        Self::Optional(Box::new(inner))
    }

    /// Union type.
    pub fn union(alternatives: impl IntoIterator<Item = Self>) -> Self {
        Self::Union(alternatives.into_iter().collect())
    }

    /// List type.
    pub fn list(item: Self) -> Self {
        Self::List(Box::new(item))
    }

    /// Tuple type.
    pub fn tuple(items: impl IntoIterator<Item = Self>) -> Self {
        Self::Tuple(items.into_iter().collect())
    }

    /// Dictionary type.
    pub fn dict(key: Self, value: Self) -> Self {
        Self::Dict(Box::new(key), Box::new(value))
    }

    /// Opaque type with the specified name and type arguments.
    pub fn opaque(name: impl Into<Cow<'static, str>>, args: impl IntoIterator<Item = Self>) -> Self {
        Self::Opaque(OpaqueType {
            name: name.into(),
            args: args.into_iter().collect(),
        })
    }

    /// Creates a class config for the specified class. The config record is synthesized eagerly,
    /// so that schema errors surface at definition time.
    ///
    /// # Errors
    ///
    /// Returns an error if the class constructor signature cannot be represented as a record.
    pub fn class_config(class: &Arc<ClassDef>) -> Result<Self, SchemaError> {
        let record = class.record_metadata(false)?;
        Ok(Self::Class(ClassConfig {
            class: class.clone(),
            record,
        }))
    }

    /// Creates a registry-resolved config.
    pub fn registry(registry: &Arc<ClassRegistry>) -> Self {
        Self::Registry(registry.clone())
    }

    /// Creates a subclass-resolved config.
    pub fn subclass(base: &Arc<ClassDef>, catalog: &Arc<ClassCatalog>) -> Self {
        Self::Subclass(SubclassSpec {
            base: base.clone(),
            catalog: catalog.clone(),
        })
    }

    /// Returns the inner type if this is an optional type. `Union[T, None]` is treated as `Optional[T]`.
    pub fn as_optional(&self) -> Option<&Self> {
        match self {
            Self::Optional(inner) => Some(inner),
            Self::Union(alternatives) => match alternatives.as_slice() {
                [inner, Self::None] => Some(inner),
                _ => None,
            },
            _ => None,
        }
    }

    /// Strips optional wrappers from this type.
    pub fn strip_optional(&self) -> &Self {
        let mut ty = self;
        while let Some(inner) = ty.as_optional() {
            ty = inner;
        }
        ty
    }

    /// Checks the structure of a typed value against this descriptor. This is performed after each successful load.
    ///
    /// # Errors
    ///
    /// Returns a type mismatch error.
    pub fn check(&self, value: &TypedValue) -> Result<(), ValidationError> {
        if self.matches(value) {
            Ok(())
        } else {
            Err(ValidationError::type_mismatch(
                format!("value of type {self}"),
                value.kind_name(),
            ))
        }
    }

    fn matches(&self, value: &TypedValue) -> bool {
        match (self, value) {
            (Self::Any | Self::Opaque(_), _)
            | (Self::None, TypedValue::Null)
            | (Self::Path, TypedValue::Path(_)) => true,
            (Self::Primitive(ty), value) => matches!(
                (ty, value),
                (PrimitiveType::Bool, TypedValue::Bool(_))
                    | (PrimitiveType::Int, TypedValue::Int(_))
                    | (PrimitiveType::Float, TypedValue::Float(_))
                    | (PrimitiveType::Str, TypedValue::Str(_))
            ),
            (Self::Optional(_), TypedValue::Null) => true,
            (Self::Optional(inner), value) => inner.matches(value),
            (Self::Union(alternatives), value) => alternatives.iter().any(|ty| ty.matches(value)),
            (Self::List(item), TypedValue::List(items)) => items.iter().all(|val| item.matches(val)),
            (Self::Tuple(types), TypedValue::Tuple(items)) => {
                types.len() == items.len()
                    && types.iter().zip(items).all(|(ty, val)| ty.matches(val))
            }
            (Self::Dict(key_ty, value_ty), TypedValue::Dict(entries)) => entries
                .iter()
                .all(|(key, value)| key_ty.matches(key) && value_ty.matches(value)),
            (Self::Enum(meta), TypedValue::Enum(value)) => **meta == **value.metadata(),
            (Self::Record(meta), TypedValue::Record(record)) => {
                record.metadata().id == meta.id
                    && meta
                        .fields
                        .iter()
                        .zip(record.values())
                        .all(|(field, value)| field.ty.matches(value))
            }
            (Self::Class(config), TypedValue::Record(record)) => record
                .class()
                .is_some_and(|class| class.id() == config.class.id()),
            (Self::Registry(registry), TypedValue::Record(record)) => record
                .class()
                .is_some_and(|class| registry.contains_class(&class)),
            (Self::Subclass(spec), TypedValue::Record(record)) => record
                .class()
                .is_some_and(|class| class.is_subclass_of(&spec.base)),
            _ => false,
        }
    }
}

impl fmt::Display for Ty {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn write_list(formatter: &mut fmt::Formatter<'_>, types: &[Ty]) -> fmt::Result {
            for (i, ty) in types.iter().enumerate() {
                if i > 0 {
                    formatter.write_str(", ")?;
                }
                fmt::Display::fmt(ty, formatter)?;
            }
            Ok(())
        }

        match self {
            Self::Any => formatter.write_str("Any"),
            Self::None => formatter.write_str("None"),
            Self::Primitive(ty) => fmt::Display::fmt(ty, formatter),
            Self::Path => formatter.write_str("Path"),
            Self::Optional(inner) => write!(formatter, "Optional[{inner}]"),
            Self::Union(alternatives) => {
                formatter.write_str("Union[")?;
                write_list(formatter, alternatives)?;
                formatter.write_str("]")
            }
            Self::List(item) => write!(formatter, "List[{item}]"),
            Self::Tuple(items) => {
                formatter.write_str("Tuple[")?;
                write_list(formatter, items)?;
                formatter.write_str("]")
            }
            Self::Dict(key, value) => write!(formatter, "Dict[{key}, {value}]"),
            Self::Enum(meta) => formatter.write_str(&meta.name),
            Self::Record(meta) => formatter.write_str(&meta.name),
            Self::Class(config) => write!(formatter, "ClassConfig[{}]", config.class.name()),
            Self::Registry(registry) => write!(formatter, "RegistryConfig[{}]", registry.name()),
            Self::Subclass(spec) => write!(formatter, "SubclassConfig[{}]", spec.base.name()),
            Self::Opaque(ty) => {
                formatter.write_str(&ty.name)?;
                if !ty.args.is_empty() {
                    formatter.write_str("[")?;
                    write_list(formatter, &ty.args)?;
                    formatter.write_str("]")?;
                }
                Ok(())
            }
        }
    }
}

/// Type handled by a custom handler.
#[derive(Debug, Clone, PartialEq)]
pub struct OpaqueType {
    /// Type name. Custom handlers usually claim types based on the name.
    pub name: Cow<'static, str>,
    /// Type arguments.
    pub args: Vec<Ty>,
}

/// Payload of [`Ty::Class`].
#[derive(Debug, Clone)]
pub struct ClassConfig {
    class: Arc<ClassDef>,
    record: Arc<RecordMetadata>,
}

impl PartialEq for ClassConfig {
    fn eq(&self, other: &Self) -> bool {
        self.class.id() == other.class.id()
    }
}

impl ClassConfig {
    /// Returns the configured class.
    pub fn class(&self) -> &Arc<ClassDef> {
        &self.class
    }

    /// Returns the record synthesized from the class constructor.
    pub fn record(&self) -> &Arc<RecordMetadata> {
        &self.record
    }
}

/// Payload of [`Ty::Subclass`].
#[derive(Debug, Clone)]
pub struct SubclassSpec {
    base: Arc<ClassDef>,
    catalog: Arc<ClassCatalog>,
}

impl PartialEq for SubclassSpec {
    fn eq(&self, other: &Self) -> bool {
        self.base.id() == other.base.id() && Arc::ptr_eq(&self.catalog, &other.catalog)
    }
}

impl SubclassSpec {
    /// Returns the base class.
    pub fn base(&self) -> &Arc<ClassDef> {
        &self.base
    }

    /// Returns the catalog used to search for subclasses.
    pub fn catalog(&self) -> &Arc<ClassCatalog> {
        &self.catalog
    }
}

/// Member of an [`EnumMetadata`].
#[derive(Debug, Clone, PartialEq)]
pub struct EnumMember {
    /// Member name.
    pub name: String,
    /// Raw value used in plain payloads.
    pub value: Plain,
}

/// Enumeration metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct EnumMetadata {
    name: String,
    members: Vec<EnumMember>,
}

impl EnumMetadata {
    /// Creates an enumeration with the specified `(name, raw_value)` members.
    ///
    /// # Errors
    ///
    /// Returns an error if there are no members, or member names or values are duplicated.
    pub fn new<N, V>(
        name: impl Into<String>,
        members: impl IntoIterator<Item = (N, V)>,
    ) -> Result<Arc<Self>, SchemaError>
    where
        N: Into<String>,
        V: Into<Plain>,
    {
        let name = name.into();
        let mut this = Self {
            name,
            members: Vec::new(),
        };
        for (member_name, value) in members {
            let member = EnumMember {
                name: member_name.into(),
                value: value.into(),
            };
            if this.members.iter().any(|m| m.name == member.name) {
                return Err(SchemaError::new(format!(
                    "duplicate member `{}` in enum `{}`",
                    member.name, this.name
                )));
            }
            if this.members.iter().any(|m| m.value == member.value) {
                return Err(SchemaError::new(format!(
                    "duplicate value {} in enum `{}`",
                    member.value, this.name
                )));
            }
            this.members.push(member);
        }
        if this.members.is_empty() {
            return Err(SchemaError::new(format!("enum `{}` has no members", this.name)));
        }
        Ok(Arc::new(this))
    }

    /// Returns the enum name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns enum members in the declaration order.
    pub fn members(&self) -> &[EnumMember] {
        &self.members
    }

    /// Finds the member index by the raw value.
    pub fn index_of_value(&self, value: &Plain) -> Option<usize> {
        self.members.iter().position(|member| member.value == *value)
    }

    /// Finds the member index by the member name.
    pub fn index_of_name(&self, name: &str) -> Option<usize> {
        self.members.iter().position(|member| member.name == name)
    }
}

/// Metadata for a record field.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldMetadata {
    /// Field name.
    pub name: String,
    /// Field type.
    pub ty: Ty,
    /// Plain default value. It is loaded in the same way as a value provided in the payload.
    pub default: Option<Plain>,
    /// Human-readable help.
    pub help: String,
}

impl FieldMetadata {
    /// Creates a field without a default value.
    pub fn new(name: impl Into<String>, ty: Ty) -> Self {
        Self {
            name: name.into(),
            ty,
            default: None,
            help: String::new(),
        }
    }

    /// Sets the default value.
    #[must_use]
    pub fn with_default(mut self, default: impl Into<Plain>) -> Self {
        self.default = Some(default.into());
        self
    }

    /// Sets the help.
    #[must_use]
    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = help.into();
        self
    }
}

/// Metadata for a record, i.e. a named, ordered set of typed fields.
pub struct RecordMetadata {
    id: u64,
    name: String,
    help: String,
    fields: Vec<FieldMetadata>,
    // Weak to break the `ClassDef -> memoized record -> ClassDef` cycle.
    class: Option<Weak<ClassDef>>,
    validations: Vec<Arc<dyn Validate<Record>>>,
}

impl fmt::Debug for RecordMetadata {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("RecordMetadata")
            .field("name", &self.name)
            .field("fields", &self.fields)
            .field("class", &self.class().map(|class| class.name().to_owned()))
            .field("validations", &self.validations)
            .finish_non_exhaustive()
    }
}

impl PartialEq for RecordMetadata {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl RecordMetadata {
    /// Starts building a record with the specified name.
    pub fn builder(name: impl Into<String>) -> RecordBuilder {
        RecordBuilder {
            name: name.into(),
            help: String::new(),
            fields: Vec::new(),
            class: None,
            validations: Vec::new(),
        }
    }

    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    /// Returns the record name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the record help.
    pub fn help(&self) -> &str {
        &self.help
    }

    /// Returns fields in the declaration order.
    pub fn fields(&self) -> &[FieldMetadata] {
        &self.fields
    }

    /// Gets a field by name.
    pub fn field(&self, name: &str) -> Option<&FieldMetadata> {
        self.fields.iter().find(|field| field.name == name)
    }

    pub(crate) fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|field| field.name == name)
    }

    /// Returns the class this record was synthesized from, if any. Returns `None` if the class
    /// has been dropped.
    pub fn class(&self) -> Option<Arc<ClassDef>> {
        self.class.as_ref()?.upgrade()
    }

    /// Returns post-validations for this record.
    pub fn validations(&self) -> &[Arc<dyn Validate<Record>>] {
        &self.validations
    }
}

/// Builder for [`RecordMetadata`].
#[derive(Debug)]
#[must_use = "Should be finalized via `build()`"]
pub struct RecordBuilder {
    name: String,
    help: String,
    fields: Vec<FieldMetadata>,
    class: Option<Weak<ClassDef>>,
    validations: Vec<Arc<dyn Validate<Record>>>,
}

impl RecordBuilder {
    /// Sets human-readable help for the record.
    pub fn help(mut self, help: impl Into<String>) -> Self {
        self.help = help.into();
        self
    }

    /// Adds a field without a default value.
    pub fn field(self, name: impl Into<String>, ty: Ty) -> Self {
        self.push_field(FieldMetadata::new(name, ty))
    }

    /// Adds a field with a plain default value.
    pub fn field_with_default(
        self,
        name: impl Into<String>,
        ty: Ty,
        default: impl Into<Plain>,
    ) -> Self {
        self.push_field(FieldMetadata::new(name, ty).with_default(default))
    }

    /// Adds a field.
    pub fn push_field(mut self, field: FieldMetadata) -> Self {
        self.fields.push(field);
        self
    }

    /// Adds a post-validation. Validations run after all fields are loaded, in the order of addition.
    pub fn validate(mut self, validation: impl Validate<Record>) -> Self {
        self.validations.push(Arc::new(validation));
        self
    }

    pub(crate) fn class(mut self, class: Weak<ClassDef>) -> Self {
        self.class = Some(class);
        self
    }

    /// Finalizes the record.
    ///
    /// # Errors
    ///
    /// Returns an error if field names are duplicated or a field uses a reserved name.
    pub fn build(self) -> Result<Arc<RecordMetadata>, SchemaError> {
        for (i, field) in self.fields.iter().enumerate() {
            if field.name == crate::value::META_KEY {
                return Err(SchemaError::new(format!(
                    "field name `{}` in record `{}` is reserved",
                    field.name, self.name
                )));
            }
            if self.fields[..i].iter().any(|prev| prev.name == field.name) {
                return Err(SchemaError::new(format!(
                    "duplicate field `{}` in record `{}`",
                    field.name, self.name
                )));
            }
        }

        Ok(Arc::new(RecordMetadata {
            id: next_id(),
            name: self.name,
            help: self.help,
            fields: self.fields,
            class: self.class,
            validations: self.validations,
        }))
    }
}
