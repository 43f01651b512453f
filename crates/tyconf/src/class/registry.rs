//! Name-to-class registries.

use std::{
    fmt,
    sync::{
        Arc, PoisonError, RwLock,
        atomic::{AtomicBool, Ordering},
    },
};

use super::{ClassDef, Instance};
use crate::{
    error::{Error, ErrorKind, ValidationError},
    metadata::Ty,
    value::{Plain, Record, TypedValue},
};

/// Error registering or looking up classes in a [`ClassRegistry`].
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum RegistryError {
    /// Name is already registered, and overwriting is not allowed.
    AlreadyRegistered {
        /// Registry name.
        registry: String,
        /// Registered name.
        name: String,
    },
    /// Name or class is not registered.
    NotRegistered {
        /// Registry name.
        registry: String,
        /// Name or class description.
        key: String,
    },
    /// Class is registered under multiple names, so reverse lookup is ambiguous.
    AmbiguousNames {
        /// Registry name.
        registry: String,
        /// Class name.
        class: String,
        /// Names the class is registered under.
        names: Vec<String>,
    },
    /// Registry is sealed and cannot be modified.
    Sealed {
        /// Registry name.
        registry: String,
    },
}

impl fmt::Display for RegistryError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlreadyRegistered { registry, name } => {
                write!(formatter, "`{name}` is already registered in `{registry}`")
            }
            Self::NotRegistered { registry, key } => {
                write!(formatter, "{key} is not registered in `{registry}`")
            }
            Self::AmbiguousNames {
                registry,
                class,
                names,
            } => write!(
                formatter,
                "class `{class}` is registered in `{registry}` under multiple names: {}",
                names.join(", ")
            ),
            Self::Sealed { registry } => write!(formatter, "registry `{registry}` is sealed"),
        }
    }
}

impl std::error::Error for RegistryError {}

/// Options for [`ClassRegistry::register_as()`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegisterOptions {
    /// Allow overwriting existing entries with the same name.
    pub overwrite: bool,
    /// Merge parent constructor params into the class config (only if the class accepts variadic keyword params).
    pub inherit: bool,
}

impl RegisterOptions {
    /// Default options: no overwriting, no inheritance.
    pub const fn new() -> Self {
        Self {
            overwrite: false,
            inherit: false,
        }
    }

    /// Allows overwriting.
    #[must_use]
    pub const fn overwrite(mut self) -> Self {
        self.overwrite = true;
        self
    }

    /// Enables inheritance.
    #[must_use]
    pub const fn inherit(mut self) -> Self {
        self.inherit = true;
        self
    }
}

/// Key for [`ClassRegistry::unregister()`].
#[derive(Debug, Clone)]
pub enum ClassKey {
    /// Registered name.
    Name(String),
    /// Class; all names it's registered under are removed.
    Class(Arc<ClassDef>),
}

impl From<&str> for ClassKey {
    fn from(name: &str) -> Self {
        Self::Name(name.to_owned())
    }
}

impl From<String> for ClassKey {
    fn from(name: String) -> Self {
        Self::Name(name)
    }
}

impl From<&Arc<ClassDef>> for ClassKey {
    fn from(class: &Arc<ClassDef>) -> Self {
        Self::Class(class.clone())
    }
}

#[derive(Debug, Clone)]
struct Entry {
    name: String,
    class: Arc<ClassDef>,
    inherit: bool,
}

/// Registry mapping names to classes. Lookups are case-sensitive.
///
/// The registry is populated during initialization and can then be [sealed](Self::seal()); mutations
/// of a sealed registry fail.
#[derive(Debug)]
pub struct ClassRegistry {
    name: String,
    entries: RwLock<Vec<Entry>>,
    sealed: AtomicBool,
}

impl PartialEq for ClassRegistry {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self, other)
    }
}

impl ClassRegistry {
    /// Creates an empty registry.
    pub fn new(name: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            entries: RwLock::default(),
            sealed: AtomicBool::new(false),
        })
    }

    /// Returns the registry name.
    pub fn name(&self) -> &str {
        &self.name
    }

    fn entries(&self) -> std::sync::RwLockReadGuard<'_, Vec<Entry>> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn entries_mut(&self) -> Result<std::sync::RwLockWriteGuard<'_, Vec<Entry>>, RegistryError> {
        if self.is_sealed() {
            return Err(RegistryError::Sealed {
                registry: self.name.clone(),
            });
        }
        Ok(self.entries.write().unwrap_or_else(PoisonError::into_inner))
    }

    /// Registers a class under its name.
    ///
    /// # Errors
    ///
    /// Errors if the name is already registered, or the registry is sealed.
    pub fn register(&self, class: &Arc<ClassDef>) -> Result<(), RegistryError> {
        self.register_as([class.name()], class, RegisterOptions::new())
    }

    /// Registers a class under the specified names. If no names are provided, the class name is used.
    /// Either all names are registered, or none.
    ///
    /// # Errors
    ///
    /// Errors if a name is already registered and overwriting is not allowed, or the registry is sealed.
    pub fn register_as<N: Into<String>>(
        &self,
        names: impl IntoIterator<Item = N>,
        class: &Arc<ClassDef>,
        options: RegisterOptions,
    ) -> Result<(), RegistryError> {
        let mut names: Vec<String> = names.into_iter().map(Into::into).collect();
        if names.is_empty() {
            names.push(class.name().to_owned());
        }

        let mut entries = self.entries_mut()?;
        if !options.overwrite {
            let duplicate = names.iter().enumerate().find(|&(i, name)| {
                names[..i].contains(name) || entries.iter().any(|entry| entry.name == *name)
            });
            if let Some((_, name)) = duplicate {
                return Err(RegistryError::AlreadyRegistered {
                    registry: self.name.clone(),
                    name: name.clone(),
                });
            }
        }

        for name in names {
            tracing::debug!(
                registry = %self.name,
                name = %name,
                class = class.name(),
                inherit = options.inherit,
                "registered class"
            );
            let entry = Entry {
                name,
                class: class.clone(),
                inherit: options.inherit,
            };
            if let Some(existing) = entries.iter_mut().find(|existing| existing.name == entry.name) {
                *existing = entry;
            } else {
                entries.push(entry);
            }
        }
        Ok(())
    }

    /// Unregisters a name, or all names of a class.
    ///
    /// # Errors
    ///
    /// Errors if the name / class is not registered, or the registry is sealed.
    pub fn unregister(&self, key: impl Into<ClassKey>) -> Result<(), RegistryError> {
        let key = key.into();
        let mut entries = self.entries_mut()?;
        let len_before = entries.len();
        let key_description = match &key {
            ClassKey::Name(name) => {
                entries.retain(|entry| entry.name != *name);
                format!("`{name}`")
            }
            ClassKey::Class(class) => {
                entries.retain(|entry| entry.class.id() != class.id());
                format!("class `{}`", class.name())
            }
        };
        if entries.len() == len_before {
            return Err(RegistryError::NotRegistered {
                registry: self.name.clone(),
                key: key_description,
            });
        }
        tracing::debug!(registry = %self.name, key = %key_description, "unregistered class");
        Ok(())
    }

    /// Looks up a class by name.
    pub fn lookup(&self, name: &str) -> Option<Arc<ClassDef>> {
        self.lookup_with_inherit(name).map(|(class, _)| class)
    }

    /// Looks up a class by name together with its inheritance flag.
    pub fn lookup_with_inherit(&self, name: &str) -> Option<(Arc<ClassDef>, bool)> {
        self.entries()
            .iter()
            .find(|entry| entry.name == name)
            .map(|entry| (entry.class.clone(), entry.inherit))
    }

    /// Returns the single name the class is registered under.
    ///
    /// # Errors
    ///
    /// Errors if the class is registered under zero or multiple names.
    pub fn reverse_lookup(&self, class: &ClassDef) -> Result<String, RegistryError> {
        let mut names: Vec<_> = self
            .entries()
            .iter()
            .filter(|entry| entry.class.id() == class.id())
            .map(|entry| entry.name.clone())
            .collect();
        match names.len() {
            0 => Err(RegistryError::NotRegistered {
                registry: self.name.clone(),
                key: format!("class `{}`", class.name()),
            }),
            1 => Ok(names.swap_remove(0)),
            _ => Err(RegistryError::AmbiguousNames {
                registry: self.name.clone(),
                class: class.name().to_owned(),
                names,
            }),
        }
    }

    /// Checks whether a name is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.entries().iter().any(|entry| entry.name == name)
    }

    /// Checks whether a class is registered under any name.
    pub fn contains_class(&self, class: &ClassDef) -> bool {
        self.entries()
            .iter()
            .any(|entry| entry.class.id() == class.id())
    }

    /// Returns the number of registered names.
    pub fn len(&self) -> usize {
        self.entries().len()
    }

    /// Checks whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    /// Returns registered names in the registration order.
    pub fn names(&self) -> Vec<String> {
        self.entries().iter().map(|entry| entry.name.clone()).collect()
    }

    /// Seals the registry, ending its initialization phase.
    pub fn seal(&self) {
        self.sealed.store(true, Ordering::Release);
        tracing::debug!(registry = %self.name, "sealed registry");
    }

    /// Checks whether the registry is sealed.
    pub fn is_sealed(&self) -> bool {
        self.sealed.load(Ordering::Acquire)
    }

    /// Loads a config for the class registered under the specified name. Unlike [`Ty::Registry`],
    /// the payload must not contain the `type` discriminator.
    ///
    /// # Errors
    ///
    /// Errors if the name is not registered or the payload is invalid.
    pub fn load_config(&self, name: &str, plain: &Plain) -> Result<Record, Error> {
        let (class, inherit) = self.lookup_with_inherit(name).ok_or_else(|| {
            ValidationError::new(
                ErrorKind::UnknownClass {
                    name: name.to_owned(),
                },
                format!("`{name}` is not registered in registry `{}`", self.name),
            )
        })?;
        let ty = Ty::Record(class.record_metadata(inherit)?);
        match crate::load(&ty, plain)? {
            TypedValue::Record(record) => Ok(record),
            other => Err(ValidationError::type_mismatch("a record", other.kind_name()).into()),
        }
    }

    /// Loads a config for the class registered under the specified name and builds the class.
    ///
    /// # Errors
    ///
    /// Errors if loading the config or building fails.
    pub fn build_from_name(&self, name: &str, plain: &Plain) -> anyhow::Result<Instance> {
        self.load_config(name, plain)?.build()
    }
}
