//! Catalog of classes used to resolve subclass configs.

use std::{
    fmt,
    sync::{Arc, PoisonError, RwLock},
};

use super::ClassDef;

/// Error resolving a subclass.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ResolveError {
    /// No matching class.
    NotFound {
        /// Name, alias or path being resolved.
        name: String,
        /// Base class name.
        base: String,
    },
    /// Bare name or alias matches multiple subclasses.
    Ambiguous {
        /// Name or alias being resolved.
        name: String,
        /// Base class name.
        base: String,
        /// Qualified paths of matching subclasses.
        candidates: Vec<String>,
    },
    /// Class found by path is not a subclass of the base class.
    NotSubclass {
        /// Qualified path.
        path: String,
        /// Base class name.
        base: String,
    },
    /// Class cannot be referred to by a path that resolves back to it.
    NotReconstructible {
        /// Class name.
        class: String,
        /// Qualified path of the class.
        path: String,
    },
    /// Another class with the same qualified path is already in the catalog.
    DuplicatePath(String),
}

impl fmt::Display for ResolveError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound { name, base } => write!(
                formatter,
                "`{name}` is not found among subclasses of `{base}` and is not a known class path"
            ),
            Self::Ambiguous {
                name,
                base,
                candidates,
            } => write!(
                formatter,
                "`{name}` matches multiple subclasses of `{base}`: {}; use a qualified path instead",
                candidates.join(", ")
            ),
            Self::NotSubclass { path, base } => {
                write!(formatter, "`{path}` is not a subclass of `{base}`")
            }
            Self::NotReconstructible { class, path } => write!(
                formatter,
                "class `{class}` cannot be resolved back from its path `{path}`"
            ),
            Self::DuplicatePath(path) => {
                write!(formatter, "class path `{path}` is already present in the catalog")
            }
        }
    }
}

impl std::error::Error for ResolveError {}

/// Catalog of classes available for subclass configs. Classes are referenced by their name, alias,
/// or qualified path (`module::Name`).
#[derive(Debug, Default)]
pub struct ClassCatalog {
    classes: RwLock<Vec<Arc<ClassDef>>>,
}

impl ClassCatalog {
    /// Creates an empty catalog.
    pub fn new() -> Arc<Self> {
        Arc::default()
    }

    fn classes(&self) -> std::sync::RwLockReadGuard<'_, Vec<Arc<ClassDef>>> {
        self.classes.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Inserts a class. Inserting the same class multiple times is a no-op.
    ///
    /// # Errors
    ///
    /// Errors if another class with the same qualified path is present.
    pub fn insert(&self, class: &Arc<ClassDef>) -> Result<(), ResolveError> {
        let path = class.qualified_path();
        let mut classes = self.classes.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(existing) = classes.iter().find(|existing| existing.qualified_path() == path) {
            return if existing.id() == class.id() {
                Ok(())
            } else {
                Err(ResolveError::DuplicatePath(path))
            };
        }
        tracing::debug!(%path, "inserted class into catalog");
        classes.push(class.clone());
        Ok(())
    }

    /// Gets a class by its qualified path.
    pub fn get(&self, path: &str) -> Option<Arc<ClassDef>> {
        self.classes()
            .iter()
            .find(|class| class.qualified_path() == path)
            .cloned()
    }

    /// Returns strict (transitive) subclasses of `base` in the insertion order.
    pub fn subclasses_of(&self, base: &ClassDef) -> Vec<Arc<ClassDef>> {
        self.classes()
            .iter()
            .filter(|class| class.id() != base.id() && class.is_subclass_of(base))
            .cloned()
            .collect()
    }

    /// Resolves a subclass of `base` by a bare name, alias or qualified path.
    ///
    /// Names and aliases must match exactly one strict subclass of `base`. If no subclass matches and `name`
    /// is a qualified path (i.e., contains `::`), the class is looked up by path; it must be `base` or its subclass.
    ///
    /// # Errors
    ///
    /// Errors if the class cannot be resolved, or the resolution is ambiguous.
    pub fn resolve_subclass(&self, base: &ClassDef, name: &str) -> Result<Arc<ClassDef>, ResolveError> {
        let mut matching: Vec<_> = self
            .subclasses_of(base)
            .into_iter()
            .filter(|class| class.name() == name || class.alias() == Some(name))
            .collect();
        match matching.len() {
            1 => return Ok(matching.swap_remove(0)),
            0 => { /* fall back to resolving by path */ }
            _ => {
                return Err(ResolveError::Ambiguous {
                    name: name.to_owned(),
                    base: base.name().to_owned(),
                    candidates: matching.iter().map(|class| class.qualified_path()).collect(),
                });
            }
        }

        if name.contains("::") {
            if let Some(class) = self.get(name) {
                return if class.is_subclass_of(base) {
                    Ok(class)
                } else {
                    Err(ResolveError::NotSubclass {
                        path: name.to_owned(),
                        base: base.name().to_owned(),
                    })
                };
            }
        }
        Err(ResolveError::NotFound {
            name: name.to_owned(),
            base: base.name().to_owned(),
        })
    }

    /// Returns the discriminator for a class in a subclass config for `base`. This is the class alias if it's defined,
    /// or the qualified path otherwise. In the latter case, the path is checked to resolve back to the class.
    ///
    /// # Errors
    ///
    /// Errors if the qualified path doesn't resolve back to the class.
    pub fn discriminator_for(&self, base: &ClassDef, class: &ClassDef) -> Result<String, ResolveError> {
        if let Some(alias) = class.alias() {
            return Ok(alias.to_owned());
        }
        let path = class.qualified_path();
        match self.resolve_subclass(base, &path) {
            Ok(resolved) if resolved.id() == class.id() => Ok(path),
            _ => Err(ResolveError::NotReconstructible {
                class: class.name().to_owned(),
                path,
            }),
        }
    }
}
