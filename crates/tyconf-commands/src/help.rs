//! Printing CLI flags and config payloads.

use std::io::{self, Write as _};

use anstream::stream::{AsLockedWrite, RawStream};
use anstyle::{AnsiColor, Color, Style};
use tyconf::{CliKind, CliTable, Plain, cli::render_choice};

use crate::Printer;

const DIMMED: Style = Style::new().dimmed();
const FLAG: Style = Style::new().bold();
const KIND: Style = Style::new().fg_color(Some(Color::Ansi(AnsiColor::Yellow)));
const CHOICE: Style = Style::new().fg_color(Some(Color::Ansi(AnsiColor::Green)));

const STRING: Style = Style::new().fg_color(Some(Color::Ansi(AnsiColor::Cyan)));
const NULL: Style = Style::new().bold();
const BOOL: Style = Style::new().fg_color(Some(Color::Ansi(AnsiColor::Yellow)));
const NUMBER: Style = Style::new().fg_color(Some(Color::Ansi(AnsiColor::Green)));
const OBJECT_KEY: Style = Style::new().bold();

impl<W: RawStream + AsLockedWrite> Printer<W> {
    /// Prints flags synthesized for the anchor points in the table, one per line, together with their kinds.
    ///
    /// # Errors
    ///
    /// Proxies I/O errors.
    pub fn print_flags(&mut self, table: &CliTable) -> io::Result<()> {
        let writer = &mut self.writer;
        if table.is_empty() {
            return writeln!(writer, "{DIMMED}(no flags){DIMMED:#}");
        }

        let width = table.iter().map(|(path, _)| path.len()).max().unwrap_or(0);
        for (path, kind) in table.iter() {
            write!(writer, "  {FLAG}--{path:<width$}{FLAG:#}  ")?;
            if let CliKind::Enum(choices) = kind {
                write!(writer, "{KIND}enum{KIND:#} {DIMMED}{{{DIMMED:#}")?;
                for (i, choice) in choices.iter().enumerate() {
                    if i > 0 {
                        write!(writer, "{DIMMED}, {DIMMED:#}")?;
                    }
                    write!(writer, "{CHOICE}{}{CHOICE:#}", render_choice(choice))?;
                }
                writeln!(writer, "{DIMMED}}}{DIMMED:#}")?;
            } else {
                writeln!(writer, "{KIND}{kind}{KIND:#}")?;
            }
        }
        Ok(())
    }

    /// Outputs a plain value as JSON with syntax highlighting.
    ///
    /// # Errors
    ///
    /// Proxies I/O errors.
    pub fn print_json(&mut self, plain: &Plain) -> io::Result<()> {
        write_json_value(&mut self.writer, plain, 0)?;
        writeln!(&mut self.writer)
    }
}

fn write_json_value(writer: &mut impl io::Write, value: &Plain, indent: usize) -> io::Result<()> {
    match value {
        Plain::Null => write!(writer, "{NULL}null{NULL:#}"),
        Plain::Bool(val) => write!(writer, "{BOOL}{val}{BOOL:#}"),
        Plain::Number(val) => write!(writer, "{NUMBER}{val}{NUMBER:#}"),
        Plain::String(val) => write!(writer, "{STRING}{val:?}{STRING:#}"),
        Plain::Array(items) if items.is_empty() => write!(writer, "[]"),
        Plain::Array(items) => {
            writeln!(writer, "[")?;
            for (i, item) in items.iter().enumerate() {
                write!(writer, "{:indent$}  ", "")?;
                write_json_value(writer, item, indent + 2)?;
                let separator = if i + 1 < items.len() { "," } else { "" };
                writeln!(writer, "{separator}")?;
            }
            write!(writer, "{:indent$}]", "")
        }
        Plain::Object(map) if map.is_empty() => write!(writer, "{{}}"),
        Plain::Object(map) => {
            writeln!(writer, "{{")?;
            for (i, (key, item)) in map.iter().enumerate() {
                write!(writer, "{:indent$}  {OBJECT_KEY}{key:?}{OBJECT_KEY:#}: ", "")?;
                write_json_value(writer, item, indent + 2)?;
                let separator = if i + 1 < map.len() { "," } else { "" };
                writeln!(writer, "{separator}")?;
            }
            write!(writer, "{:indent$}}}", "")
        }
    }
}
