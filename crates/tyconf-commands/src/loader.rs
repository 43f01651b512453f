//! Two-pass loading of configs from a file and command-line overrides.

use std::{ffi::OsString, path::PathBuf};

use clap::{Arg, ArgAction, Command, value_parser};
use tyconf::{CliTable, Describe, FromTyped, Plain, Ty, TypeHandlers, TypedValue};

use crate::{Overrides, file::load_file, parser::CliParser};

const CONFIG_ARG: &str = "config";
const REST_ARG: &str = "rest";

/// Result of [loading](CliLoader::load()) a config from the command line.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct LoadedConfig {
    /// Loaded typed value.
    pub value: TypedValue,
    /// Path to the config file.
    pub config_path: PathBuf,
    /// Command-line overrides applied to the file contents.
    pub overrides: Overrides,
    /// Extra command-line args following `--`. Always empty unless [allowed](CliLoader::allow_rest()).
    pub rest: Vec<OsString>,
}

/// Command-line config loader.
///
/// The command line has the form `NAME CONFIG [--path.to.param VALUE]... [-- REST...]`, where `CONFIG`
/// is the path to a JSON / YAML config file; it must be the first arg. Loading proceeds as follows:
///
/// 1. The config file is loaded, and its contents are loaded as the target type collecting CLI anchor points.
///    Failures at this stage are not fatal; the table of anchor points collected before the failure is used.
/// 2. A `clap` command is built from the anchor table and parses the command line.
/// 3. Parsed overrides are merged into the file contents, which are loaded again.
#[derive(Debug, Clone)]
pub struct CliLoader {
    name: String,
    about: Option<String>,
    shortcuts: Vec<(String, String)>,
    allow_rest: bool,
    handlers: TypeHandlers,
}

impl CliLoader {
    /// Creates a loader for the program with the specified name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            about: None,
            shortcuts: vec![],
            allow_rest: false,
            handlers: TypeHandlers::builtin(),
        }
    }

    /// Sets the description of the program displayed in help.
    #[must_use]
    pub fn about(mut self, about: impl Into<String>) -> Self {
        self.about = Some(about.into());
        self
    }

    /// Adds a shortcut flag for the specified anchor path. See [`CliParser::shortcut()`] for details.
    #[must_use]
    pub fn shortcut(mut self, flag: impl Into<String>, path: impl Into<String>) -> Self {
        self.shortcuts.push((flag.into(), path.into()));
        self
    }

    /// Allows extra args after the `--` separator. They will be returned in [`LoadedConfig::rest`].
    #[must_use]
    pub fn allow_rest(mut self) -> Self {
        self.allow_rest = true;
        self
    }

    /// Sets handlers used for loading. By default, [built-in handlers](TypeHandlers::builtin()) are used.
    #[must_use]
    pub fn with_handlers(mut self, handlers: TypeHandlers) -> Self {
        self.handlers = handlers;
        self
    }

    /// Loads a typed value from the provided command-line args. The first arg is the program name.
    ///
    /// # Errors
    ///
    /// - Returns [`clap::Error`]s (including ones requesting to display help) wrapped into [`anyhow::Error`].
    /// - Returns config file errors and load errors ([`tyconf::Error`]).
    pub fn load<I, T>(&self, ty: &Ty, args: I) -> anyhow::Result<LoadedConfig>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let args: Vec<OsString> = args.into_iter().map(Into::into).collect();
        let config_path = args
            .get(1)
            .filter(|arg| !arg.to_string_lossy().starts_with('-'))
            .map(PathBuf::from);

        let mut plain = match &config_path {
            Some(path) => load_file(path)?,
            None => Plain::Object(tyconf::PlainMap::new()),
        };
        let table = self.discover(ty, &plain);
        tracing::debug!(
            config_path = ?config_path,
            anchors = table.len(),
            "discovered CLI anchor points"
        );

        let mut parser = CliParser::new(table);
        for (flag, path) in &self.shortcuts {
            parser = parser.shortcut(flag.clone(), path.clone());
        }
        let matches = parser.augment(self.command()).try_get_matches_from(args)?;
        let overrides = parser.overrides(&matches);
        overrides.apply(&mut plain);

        let value = self.handlers.load(ty, &plain)?;
        let config_path = matches
            .get_one::<PathBuf>(CONFIG_ARG)
            .cloned()
            .unwrap_or_default();
        let rest = if self.allow_rest {
            matches
                .get_many::<OsString>(REST_ARG)
                .map(|values| values.cloned().collect())
                .unwrap_or_default()
        } else {
            vec![]
        };
        Ok(LoadedConfig {
            value,
            config_path,
            overrides,
            rest,
        })
    }

    /// Loads a Rust value from the provided command-line args. The first arg is the program name.
    ///
    /// # Errors
    ///
    /// Same as for [`Self::load()`]. Additionally, the conversion to the Rust type may fail.
    pub fn from_args<C, I, T>(&self, args: I) -> anyhow::Result<C>
    where
        C: Describe + FromTyped,
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let loaded = self.load(&C::ty(), args)?;
        Ok(C::from_typed(loaded.value).map_err(tyconf::Error::from)?)
    }

    fn discover(&self, ty: &Ty, plain: &Plain) -> CliTable {
        let mut table = CliTable::new();
        if let Err(err) = self.handlers.load_with_cli(ty, plain, &mut table) {
            // The error may be fixed by overrides; if it's not, it will be reported by the final load.
            tracing::debug!(%err, "shape discovery failed; using partial table of CLI anchor points");
        }
        table
    }

    fn command(&self) -> Command {
        let mut command = Command::new(self.name.clone()).arg(
            Arg::new(CONFIG_ARG)
                .value_name("CONFIG")
                .help("Path to the JSON / YAML config file")
                .required(true)
                .value_parser(value_parser!(PathBuf)),
        );
        if let Some(about) = &self.about {
            command = command.about(about.clone());
        }
        if self.allow_rest {
            command = command.arg(
                Arg::new(REST_ARG)
                    .value_name("REST")
                    .action(ArgAction::Append)
                    .num_args(0..)
                    .last(true)
                    .value_parser(value_parser!(OsString)),
            );
        }
        command
    }
}

/// Loads a typed value from the command-line args of the current process using the default [`CliLoader`].
///
/// # Errors
///
/// Same as for [`CliLoader::load()`].
pub fn load_cli<I, T>(ty: &Ty, args: I) -> anyhow::Result<TypedValue>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let args: Vec<OsString> = args.into_iter().map(Into::into).collect();
    let name = program_name(&args);
    Ok(CliLoader::new(name).load(ty, args)?.value)
}

/// Loads a Rust value from the command-line args of the current process.
///
/// Like `clap::Parser::parse()`, this function exits the process on `clap` errors, e.g. if help is requested.
///
/// # Errors
///
/// Returns config file errors and load errors.
pub fn from_cli<C: Describe + FromTyped>() -> anyhow::Result<C> {
    let args: Vec<OsString> = std::env::args_os().collect();
    let name = program_name(&args);
    CliLoader::new(name)
        .from_args(args)
        .map_err(|err| match err.downcast::<clap::Error>() {
            Ok(err) => err.exit(),
            Err(err) => err,
        })
}

fn program_name(args: &[OsString]) -> String {
    args.first()
        .map(PathBuf::from)
        .and_then(|path| Some(path.file_stem()?.to_string_lossy().into_owned()))
        .unwrap_or_else(|| "app".to_owned())
}
