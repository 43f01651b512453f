//! Per-call parsing state.

use std::fmt;

use super::TypeHandlers;
use crate::{
    cli::{CliKind, CliTable},
    error::{Error, Operation},
    metadata::Ty,
    value::{Plain, TypedValue},
};

/// Segment of a path in the value tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    /// Record field or dictionary entry.
    Field(String),
    /// List or tuple element.
    Index(usize),
    /// Dictionary key (as opposed to the value under it). Paths with such segments never produce CLI flags.
    DictKey(String),
}

impl fmt::Display for PathSegment {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Field(name) => formatter.write_str(name),
            Self::Index(idx) => write!(formatter, "index:{idx}"),
            Self::DictKey(key) => write!(formatter, "(key){key}"),
        }
    }
}

/// Context for a single load or dump call.
///
/// Tracks the current path in the value tree, types matched at each path level (used in error messages),
/// and optionally collects CLI anchor points into a [`CliTable`].
#[derive(Debug)]
pub struct ParseContext<'a> {
    handlers: &'a TypeHandlers,
    operation: Operation,
    path: Vec<PathSegment>,
    matches: Vec<Vec<String>>,
    cli: Option<&'a mut CliTable>,
}

impl<'a> ParseContext<'a> {
    pub(crate) fn new(
        handlers: &'a TypeHandlers,
        operation: Operation,
        cli: Option<&'a mut CliTable>,
    ) -> Self {
        Self {
            handlers,
            operation,
            path: Vec::new(),
            matches: vec![Vec::new()],
            cli,
        }
    }

    /// Returns handlers used by this context.
    pub fn handlers(&self) -> &'a TypeHandlers {
        self.handlers
    }

    /// Returns the current operation.
    pub fn operation(&self) -> Operation {
        self.operation
    }

    /// Returns the current path.
    pub fn path(&self) -> &[PathSegment] {
        &self.path
    }

    /// Returns types matched at the current path level, outermost first.
    pub fn current_matches(&self) -> &[String] {
        self.matches.last().map_or(&[], Vec::as_slice)
    }

    /// Renders the current path for error messages, e.g. `layers.index:0.size`. The empty path is rendered as `<root>`.
    pub fn rendered_path(&self) -> String {
        if self.path.is_empty() {
            return "<root>".to_owned();
        }
        let segments: Vec<_> = self.path.iter().map(ToString::to_string).collect();
        segments.join(".")
    }

    /// Returns the current path as a CLI flag name, e.g. `layers.0.size`. Returns `None` for the root path
    /// and for paths that go through a dictionary key.
    pub fn cli_path(&self) -> Option<String> {
        if self.path.is_empty() {
            return None;
        }
        let mut segments = Vec::with_capacity(self.path.len());
        for segment in &self.path {
            segments.push(match segment {
                PathSegment::Field(name) => name.clone(),
                PathSegment::Index(idx) => idx.to_string(),
                PathSegment::DictKey(_) => return None,
            });
        }
        Some(segments.join("."))
    }

    /// Performs an action one level deeper in the value tree.
    pub fn onto<R>(&mut self, segment: PathSegment, action: impl FnOnce(&mut Self) -> R) -> R {
        self.path.push(segment);
        self.matches.push(Vec::new());
        let output = action(self);
        self.path.pop();
        self.matches.pop();
        output
    }

    /// Performs an action recording a type match at the current path level.
    pub fn matching<R>(&mut self, name: impl Into<String>, action: impl FnOnce(&mut Self) -> R) -> R {
        if let Some(level) = self.matches.last_mut() {
            level.push(name.into());
        }
        let output = action(self);
        if let Some(level) = self.matches.last_mut() {
            level.pop();
        }
        output
    }

    /// Checks whether this context collects CLI anchor points.
    pub fn collects_cli(&self) -> bool {
        self.cli.is_some()
    }

    /// Marks the current path as a CLI anchor point. No-op if CLI anchors aren't collected.
    pub fn mark_cli_anchor(&mut self, kind: CliKind) {
        if self.cli.is_none() {
            return;
        }
        if let Some(path) = self.cli_path() {
            if let Some(cli) = self.cli.as_deref_mut() {
                cli.add(path, kind);
            }
        }
    }

    pub(crate) fn cli_checkpoint(&self) -> Option<usize> {
        self.cli.as_deref().map(CliTable::checkpoint)
    }

    pub(crate) fn cli_rollback(&mut self, checkpoint: Option<usize>) {
        if let (Some(cli), Some(checkpoint)) = (self.cli.as_deref_mut(), checkpoint) {
            cli.rollback(checkpoint);
        }
    }

    /// Loads a value at the current path. This is how handlers for composite types should process child values.
    ///
    /// # Errors
    ///
    /// Propagates validation and schema errors.
    pub fn load(&mut self, ty: &Ty, plain: &Plain) -> Result<TypedValue, Error> {
        super::dispatch_load(self, ty, plain)
    }

    /// Dumps a value at the current path.
    ///
    /// # Errors
    ///
    /// Propagates validation and schema errors.
    pub fn dump(&mut self, ty: &Ty, value: &TypedValue) -> Result<Plain, Error> {
        super::dispatch_dump(self, ty, value)
    }

    pub(crate) fn locate(&self, err: Error, value: impl FnOnce() -> String) -> Error {
        match err {
            Error::Validation(err) => Error::Validation(err.with_location_if_unset(
                self.operation,
                || self.rendered_path(),
                || self.current_matches().to_vec(),
                value,
            )),
            Error::Schema(err) => Error::Schema(err),
        }
    }
}
