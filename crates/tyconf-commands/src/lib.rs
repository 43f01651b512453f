//! Command-line extensions for `tyconf` library.
//!
//! The extensions are as follows:
//!
//! - [Synthesizing a `clap` parser](CliParser) from the [`CliTable`](tyconf::CliTable) collected
//!   during shape discovery, and merging parsed overrides into a plain payload.
//! - [Two-pass loading](CliLoader) of a config from a file and command-line overrides.
//! - [Loading](load_file()) JSON / YAML config documents.
//! - [Printing](Printer) the synthesized flags and loaded configs.
//!
//! # Two-pass protocol
//!
//! The set of flags depends on the config payload: e.g., the fields of a registry config depend on the class
//! chosen by its `type` discriminator. Thus, the payload is first loaded from the config file with
//! CLI anchor collection enabled ([`tyconf::discover()`]). The resulting table is used to build
//! the parser, and parsed overrides are merged into the payload, which is then loaded again.
//!
//! # Examples
//!
//! ```
//! use tyconf::{CliKind, DescribeRecord};
//! use tyconf_commands::CliParser;
//!
//! #[derive(Debug, DescribeRecord)]
//! struct TrainerConfig {
//!     epochs: u32,
//!     #[config(default_t = 0.1)]
//!     lr: f64,
//! }
//!
//! let mut plain = serde_json::json!({ "epochs": 10 });
//! let (_, table) = tyconf::discover(&<TrainerConfig as tyconf::Describe>::ty(), &plain)?;
//! assert_eq!(table.get("lr"), Some(&CliKind::Float));
//!
//! let parser = CliParser::new(table).shortcut("-e", "epochs");
//! let command = clap::Command::new("train");
//! let overrides = parser.parse_from(command, ["train", "-e", "3", "--lr", "0.5"])?;
//! overrides.apply(&mut plain);
//!
//! let config: TrainerConfig = tyconf::from_plain(&plain)?;
//! assert_eq!(config.epochs, 3);
//! assert_eq!(config.lr, 0.5);
//! # anyhow::Ok(())
//! ```

// Linter settings
#![warn(missing_docs)]

use std::{
    io,
    io::{StderrLock, StdoutLock},
};

use anstream::{AutoStream, stream::RawStream};

pub use crate::{
    file::{FileFormat, load_file, parse_document},
    loader::{CliLoader, LoadedConfig, from_cli, load_cli},
    parser::{CliParser, Overrides},
};

mod file;
mod help;
mod loader;
mod parser;

/// Wrapper around an I/O writer. Will style the output with ANSI sequences if appropriate.
///
/// Internally, the printer is based on [`anstream`] / [`anstyle`]; see their docs to find out how styling support
/// is detected by default. If this detection doesn't work for you, you can always [create](Self::custom())
/// a fully custom `Printer`.
///
/// [`anstream`]: https://docs.rs/anstream/
/// [`anstyle`]: https://docs.rs/anstyle/
#[derive(Debug)]
pub struct Printer<W: RawStream> {
    writer: AutoStream<W>,
}

impl Printer<StdoutLock<'static>> {
    /// Creates a printer to stdout. The stdout is locked while the printer is alive!
    pub fn stdout() -> Self {
        Self {
            writer: AutoStream::auto(io::stdout()).lock(),
        }
    }
}

impl Printer<StderrLock<'static>> {
    /// Creates a printer to stderr. The stderr is locked while the printer is alive!
    pub fn stderr() -> Self {
        Self {
            writer: AutoStream::auto(io::stderr()).lock(),
        }
    }
}

impl<W: RawStream> Printer<W> {
    /// Creates a custom printer.
    pub fn custom(writer: AutoStream<W>) -> Self {
        Self { writer }
    }
}
