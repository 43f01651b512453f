//! CLI flag table collected during shape discovery.
//!
//! While loading, handlers for scalar-like types mark *anchor points*: dotted paths that can be overridden
//! from the command line (e.g., `trainer.optimizer.lr`). The resulting [`CliTable`] is consumed by a CLI parser builder.

use std::fmt;

use crate::value::Plain;

/// Kind of CLI flag, which determines how its value is parsed.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum CliKind {
    /// Boolean flag accepting common spellings (`true`, `yes`, `1`, etc.).
    Bool,
    /// Integer flag.
    Int,
    /// Floating-point flag.
    Float,
    /// String flag.
    Str,
    /// Path flag.
    Path,
    /// Enum flag restricted to the listed raw values.
    Enum(Vec<Plain>),
    /// List flag; the value is parsed as a JSON literal.
    List,
    /// Dictionary flag; the value is parsed as a JSON literal.
    Dict,
}

impl fmt::Display for CliKind {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool => formatter.write_str("bool"),
            Self::Int => formatter.write_str("int"),
            Self::Float => formatter.write_str("float"),
            Self::Str => formatter.write_str("str"),
            Self::Path => formatter.write_str("path"),
            Self::Enum(choices) => {
                formatter.write_str("enum{")?;
                for (i, choice) in choices.iter().enumerate() {
                    if i > 0 {
                        formatter.write_str(", ")?;
                    }
                    formatter.write_str(&render_choice(choice))?;
                }
                formatter.write_str("}")
            }
            Self::List => formatter.write_str("list"),
            Self::Dict => formatter.write_str("dict"),
        }
    }
}

/// Renders an enum choice as it should be typed on the command line: strings are unquoted,
/// other values use JSON syntax.
pub fn render_choice(choice: &Plain) -> String {
    match choice {
        Plain::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Ordered table of CLI anchor points. The first entry for a path wins.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CliTable {
    entries: Vec<(String, CliKind)>,
}

impl CliTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an anchor point. Does nothing if the path is already present, or it cannot be
    /// expressed as a flag (e.g., the root path or a dictionary key path).
    pub fn add(&mut self, path: impl Into<String>, kind: CliKind) {
        let path = path.into();
        if !is_flag_path(&path) {
            return;
        }
        if self.entries.iter().any(|(existing, _)| *existing == path) {
            return;
        }
        tracing::trace!(path = %path, %kind, "marked CLI anchor point");
        self.entries.push((path, kind));
    }

    /// Gets the kind for the specified path.
    pub fn get(&self, path: &str) -> Option<&CliKind> {
        self.entries
            .iter()
            .find_map(|(existing, kind)| (existing == path).then_some(kind))
    }

    /// Iterates over entries in the order of their addition.
    pub fn iter(&self) -> impl ExactSizeIterator<Item = (&str, &CliKind)> + '_ {
        self.entries.iter().map(|(path, kind)| (path.as_str(), kind))
    }

    /// Returns the number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Checks whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn checkpoint(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn rollback(&mut self, checkpoint: usize) {
        self.entries.truncate(checkpoint);
    }
}

fn is_flag_path(path: &str) -> bool {
    !path.is_empty() && !path.contains(['(', ')', ':'])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_entry_wins() {
        let mut table = CliTable::new();
        table.add("trainer.lr", CliKind::Float);
        table.add("trainer.lr", CliKind::Str);
        table.add("trainer.epochs", CliKind::Int);
        assert_eq!(table.len(), 2);
        assert_eq!(table.get("trainer.lr"), Some(&CliKind::Float));

        let paths: Vec<_> = table.iter().map(|(path, _)| path).collect();
        assert_eq!(paths, ["trainer.lr", "trainer.epochs"]);
    }

    #[test]
    fn special_paths_are_skipped() {
        let mut table = CliTable::new();
        table.add("", CliKind::Dict);
        table.add("mapping.(key)a", CliKind::Str);
        table.add("a:b", CliKind::Str);
        assert!(table.is_empty());
    }

    #[test]
    fn rolling_back_entries() {
        let mut table = CliTable::new();
        table.add("a", CliKind::Int);
        let checkpoint = table.checkpoint();
        table.add("b", CliKind::Int);
        table.add("c", CliKind::Int);
        table.rollback(checkpoint);
        assert_eq!(table.len(), 1);
        assert_eq!(table.get("b"), None);
    }

    #[test]
    fn displaying_enum_kind() {
        let kind = CliKind::Enum(vec!["sgd".into(), 1.into()]);
        assert_eq!(kind.to_string(), "enum{sgd, 1}");
    }
}
