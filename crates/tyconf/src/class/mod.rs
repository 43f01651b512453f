//! Classes that can be built from configs.
//!
//! Rust has no runtime introspection of constructor signatures, so a class opts into config-driven construction
//! by describing its constructor explicitly with [`ClassDef::builder()`]. The description lists constructor params
//! together with their types and defaults; based on it, the class can be used in [`Ty::Class`](crate::Ty::Class),
//! [`ClassRegistry`] and [`ClassCatalog`].
//!
//! # Examples
//!
//! ```
//! use std::sync::Arc;
//! use tyconf::{class::ClassDef, Ty};
//!
//! #[derive(Debug)]
//! struct Linear {
//!     inputs: usize,
//!     outputs: usize,
//!     bias: bool,
//! }
//!
//! let linear = ClassDef::builder("Linear")
//!     .module("nn")
//!     .param("inputs", Ty::int())
//!     .param("outputs", Ty::int())
//!     .param_with_default("bias", Ty::bool(), true)
//!     .constructor(|mut args| {
//!         Ok(Linear {
//!             inputs: args.take("inputs")?,
//!             outputs: args.take("outputs")?,
//!             bias: args.take("bias")?,
//!         })
//!     });
//!
//! let ty = Ty::class_config(&linear)?;
//! let config = tyconf::load(&ty, &serde_json::json!({ "inputs": 4, "outputs": 2 }))?;
//! let config = config.as_record().unwrap();
//! let layer: Linear = config.build_as()?;
//! assert_eq!((layer.inputs, layer.outputs, layer.bias), (4, 2, true));
//! # anyhow::Ok(())
//! ```

use std::{
    any::{self, Any},
    fmt, iter,
    sync::{Arc, OnceLock, Weak},
};

use anyhow::Context as _;

pub use self::{
    catalog::{ClassCatalog, ResolveError},
    registry::{ClassKey, ClassRegistry, RegisterOptions, RegistryError},
};
use crate::{
    error::SchemaError,
    metadata::{RecordMetadata, Ty},
    typed::FromTyped,
    utils::next_id,
    value::{Plain, TypedValue},
};

mod adapter;
mod catalog;
mod registry;
#[cfg(test)]
mod tests;

/// Kind of constructor param.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    /// Regular named param.
    Regular,
    /// Variadic positional param (`*args`). Classes with such params cannot be represented as records.
    VarPositional,
    /// Variadic keyword param (`**kwargs`). Enables merging of parent params if inheritance is requested.
    VarKeyword,
}

/// Constructor param description.
#[derive(Debug, Clone)]
pub struct ParamDef {
    /// Param name.
    pub name: String,
    /// Param kind.
    pub kind: ParamKind,
    /// Param type. `None` means that the param is not annotated.
    pub ty: Option<Ty>,
    /// Plain default value.
    pub default: Option<Plain>,
    /// Human-readable help.
    pub help: String,
}

type Constructor = dyn Fn(Args) -> anyhow::Result<Instance> + Send + Sync;

/// Description of a class constructible from a config.
pub struct ClassDef {
    id: u64,
    this: Weak<Self>,
    name: String,
    module: Option<String>,
    alias: Option<String>,
    help: String,
    parent: Option<Arc<Self>>,
    params: Vec<ParamDef>,
    constructor: Box<Constructor>,
    /// Records synthesized without and with inheritance, respectively.
    records: [OnceLock<Result<Arc<RecordMetadata>, SchemaError>>; 2],
}

impl fmt::Debug for ClassDef {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("ClassDef")
            .field("name", &self.name)
            .field("module", &self.module)
            .field("alias", &self.alias)
            .field("parent", &self.parent.as_ref().map(|parent| &parent.name))
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

impl ClassDef {
    /// Starts describing a class with the specified name.
    pub fn builder(name: impl Into<String>) -> ClassBuilder {
        ClassBuilder {
            name: name.into(),
            module: None,
            alias: None,
            help: String::new(),
            parent: None,
            params: Vec::new(),
        }
    }

    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    /// Returns the class name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the module the class is defined in, if specified.
    pub fn module(&self) -> Option<&str> {
        self.module.as_deref()
    }

    /// Returns the alias used to refer to this class in subclass configs.
    pub fn alias(&self) -> Option<&str> {
        self.alias.as_deref()
    }

    /// Returns human-readable help for the class.
    pub fn help(&self) -> &str {
        &self.help
    }

    /// Returns the qualified path of the class, e.g. `nn::Linear`. If the module is not specified, the path
    /// is equal to the class name.
    pub fn qualified_path(&self) -> String {
        match &self.module {
            Some(module) => format!("{module}::{}", self.name),
            None => self.name.clone(),
        }
    }

    /// Returns the parent class.
    pub fn parent(&self) -> Option<&Arc<Self>> {
        self.parent.as_ref()
    }

    /// Iterates over ancestors, starting from the parent.
    pub fn ancestors(&self) -> impl Iterator<Item = &Arc<Self>> + '_ {
        iter::successors(self.parent.as_ref(), |class| class.parent.as_ref())
    }

    /// Checks whether this class is `base` or its (transitive) subclass.
    pub fn is_subclass_of(&self, base: &Self) -> bool {
        self.id == base.id || self.ancestors().any(|class| class.id == base.id)
    }

    /// Returns constructor params in the declaration order.
    pub fn params(&self) -> &[ParamDef] {
        &self.params
    }

    pub(crate) fn has_var_keyword(&self) -> bool {
        self.params
            .iter()
            .any(|param| param.kind == ParamKind::VarKeyword)
    }

    /// Returns the record synthesized from the constructor signature. If `inherit` is set and the constructor
    /// accepts variadic keyword params, the record additionally contains params of ancestors.
    /// The result is memoized.
    ///
    /// # Errors
    ///
    /// Returns an error if the constructor signature cannot be represented as a record: a param is not annotated,
    /// there's a variadic positional param, or inherited params have conflicting types.
    pub fn record_metadata(&self, inherit: bool) -> Result<Arc<RecordMetadata>, SchemaError> {
        self.records[usize::from(inherit)]
            .get_or_init(|| adapter::synthesize_record(self, inherit))
            .clone()
    }

    /// Invokes the constructor.
    ///
    /// # Errors
    ///
    /// Propagates constructor errors.
    pub fn construct(&self, args: Args) -> anyhow::Result<Instance> {
        (self.constructor)(args)
    }

    /// Invokes the constructor and downcasts the created instance. Useful for child class constructors
    /// delegating to the parent.
    ///
    /// # Errors
    ///
    /// Propagates constructor errors. Errors if the instance has an unexpected type.
    pub fn construct_as<T: Any>(&self, args: Args) -> anyhow::Result<T> {
        self.construct(args)?.downcast()
    }
}

/// Builder for [`ClassDef`].
#[derive(Debug)]
#[must_use = "Should be finalized via `constructor()` or `build()`"]
pub struct ClassBuilder {
    name: String,
    module: Option<String>,
    alias: Option<String>,
    help: String,
    parent: Option<Arc<ClassDef>>,
    params: Vec<ParamDef>,
}

impl ClassBuilder {
    /// Sets the module, which is used in the qualified path of the class.
    pub fn module(mut self, module: impl Into<String>) -> Self {
        self.module = Some(module.into());
        self
    }

    /// Sets the alias for subclass configs.
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// Sets human-readable help.
    pub fn help(mut self, help: impl Into<String>) -> Self {
        self.help = help.into();
        self
    }

    /// Sets the parent class.
    pub fn extends(mut self, parent: &Arc<ClassDef>) -> Self {
        self.parent = Some(parent.clone());
        self
    }

    fn push_param(mut self, name: String, kind: ParamKind, ty: Option<Ty>, default: Option<Plain>) -> Self {
        self.params.push(ParamDef {
            name,
            kind,
            ty,
            default,
            help: String::new(),
        });
        self
    }

    /// Adds a required param.
    pub fn param(self, name: impl Into<String>, ty: Ty) -> Self {
        self.push_param(name.into(), ParamKind::Regular, Some(ty), None)
    }

    /// Adds a param with a plain default value.
    pub fn param_with_default(self, name: impl Into<String>, ty: Ty, default: impl Into<Plain>) -> Self {
        self.push_param(name.into(), ParamKind::Regular, Some(ty), Some(default.into()))
    }

    /// Adds a param without a type. Synthesizing a record for such a class will fail.
    pub fn untyped_param(self, name: impl Into<String>) -> Self {
        self.push_param(name.into(), ParamKind::Regular, None, None)
    }

    /// Adds a variadic positional param. Synthesizing a record for such a class will fail.
    pub fn var_positional(self, name: impl Into<String>) -> Self {
        self.push_param(name.into(), ParamKind::VarPositional, None, None)
    }

    /// Adds a variadic keyword param.
    pub fn var_keyword(self, name: impl Into<String>) -> Self {
        self.push_param(name.into(), ParamKind::VarKeyword, None, None)
    }

    /// Sets help for the last added param.
    pub fn param_help(mut self, help: impl Into<String>) -> Self {
        if let Some(param) = self.params.last_mut() {
            param.help = help.into();
        }
        self
    }

    /// Finalizes the class with the specified constructor.
    pub fn constructor<T, F>(self, constructor: F) -> Arc<ClassDef>
    where
        T: Any + Send + Sync,
        F: Fn(Args) -> anyhow::Result<T> + Send + Sync + 'static,
    {
        self.finish(Box::new(move |args: Args| constructor(args).map(Instance::new)))
    }

    /// Finalizes a class without a constructor (e.g., an abstract base class). Building such a class will fail.
    pub fn build(self) -> Arc<ClassDef> {
        let name = self.name.clone();
        self.finish(Box::new(move |_: Args| -> anyhow::Result<Instance> {
            Err(anyhow::anyhow!("class `{name}` cannot be constructed"))
        }))
    }

    fn finish(self, constructor: Box<Constructor>) -> Arc<ClassDef> {
        Arc::new_cyclic(|this| ClassDef {
            id: next_id(),
            this: this.clone(),
            name: self.name,
            module: self.module,
            alias: self.alias,
            help: self.help,
            parent: self.parent,
            params: self.params,
            constructor,
            records: [OnceLock::new(), OnceLock::new()],
        })
    }
}

/// Instance built by a class constructor.
pub struct Instance {
    type_name: &'static str,
    value: Box<dyn Any + Send + Sync>,
}

impl fmt::Debug for Instance {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("Instance")
            .field("type_name", &self.type_name)
            .finish_non_exhaustive()
    }
}

impl Instance {
    /// Wraps the provided value.
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self {
            type_name: any::type_name::<T>(),
            value: Box::new(value),
        }
    }

    /// Returns the Rust type name of the instance.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Checks whether the instance has the specified type.
    pub fn is<T: Any>(&self) -> bool {
        self.value.is::<T>()
    }

    /// Returns a reference to the instance if it has the specified type.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.value.downcast_ref()
    }

    /// Unwraps the instance.
    ///
    /// # Errors
    ///
    /// Errors if the instance has an unexpected type.
    pub fn downcast<T: Any>(self) -> anyhow::Result<T> {
        let type_name = self.type_name;
        let value = self.value.downcast::<T>().map_err(|_| {
            anyhow::anyhow!(
                "instance of `{type_name}` cannot be downcast to `{}`",
                any::type_name::<T>()
            )
        })?;
        Ok(*value)
    }
}

/// Constructor arguments: an ordered map from param names to typed values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Args {
    entries: Vec<(String, TypedValue)>,
}

impl FromIterator<(String, TypedValue)> for Args {
    fn from_iter<I: IntoIterator<Item = (String, TypedValue)>>(iter: I) -> Self {
        let mut this = Self::default();
        this.extend(iter);
        this
    }
}

/// Later values override earlier ones with the same name.
impl Extend<(String, TypedValue)> for Args {
    fn extend<I: IntoIterator<Item = (String, TypedValue)>>(&mut self, iter: I) {
        for (name, value) in iter {
            self.insert(name, value);
        }
    }
}

impl IntoIterator for Args {
    type Item = (String, TypedValue);
    type IntoIter = std::vec::IntoIter<(String, TypedValue)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl Args {
    /// Inserts an argument, replacing the existing value with the same name.
    pub fn insert(&mut self, name: impl Into<String>, value: TypedValue) {
        let name = name.into();
        if let Some((_, existing)) = self.entries.iter_mut().find(|(n, _)| *n == name) {
            *existing = value;
        } else {
            self.entries.push((name, value));
        }
    }

    /// Adds an argument, replacing the existing value with the same name.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: TypedValue) -> Self {
        self.insert(name, value);
        self
    }

    /// Gets an argument by name.
    pub fn get(&self, name: &str) -> Option<&TypedValue> {
        self.entries
            .iter()
            .find_map(|(n, value)| (n == name).then_some(value))
    }

    /// Removes an argument.
    pub fn remove(&mut self, name: &str) -> Option<TypedValue> {
        let idx = self.entries.iter().position(|(n, _)| n == name)?;
        Some(self.entries.remove(idx).1)
    }

    /// Removes and converts a required argument.
    ///
    /// # Errors
    ///
    /// Errors if the argument is missing or cannot be converted.
    pub fn take<T: FromTyped>(&mut self, name: &str) -> anyhow::Result<T> {
        let value = self
            .remove(name)
            .with_context(|| format!("missing argument `{name}`"))?;
        T::from_typed(value).with_context(|| format!("invalid argument `{name}`"))
    }

    /// Removes and converts an optional argument. Returns `Ok(None)` if the argument is missing.
    ///
    /// # Errors
    ///
    /// Errors if the argument cannot be converted.
    pub fn take_opt<T: FromTyped>(&mut self, name: &str) -> anyhow::Result<Option<T>> {
        let Some(value) = self.remove(name) else {
            return Ok(None);
        };
        let value = T::from_typed(value).with_context(|| format!("invalid argument `{name}`"))?;
        Ok(Some(value))
    }

    /// Iterates over argument names.
    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    /// Iterates over arguments.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &TypedValue)> + '_ {
        self.entries.iter().map(|(name, value)| (name.as_str(), value))
    }

    /// Returns the number of arguments.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Checks whether there are no arguments.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
