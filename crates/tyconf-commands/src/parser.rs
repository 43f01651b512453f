//! `clap` parser synthesis from a CLI anchor table.

use std::{collections::HashSet, ffi::OsString};

use clap::{
    Arg, ArgAction, ArgMatches, Command, Id,
    builder::{PossibleValuesParser, TypedValueParser},
    parser::ValueSource,
};
use tyconf::{CliKind, CliTable, Plain, cli::render_choice};

/// Prefix of arg IDs for anchor point flags. Anchor paths never contain `:`, so these IDs cannot
/// collide with args defined by the augmented command.
const FLAG_PREFIX: &str = "flag:";
/// Prefix of arg IDs for Boolean shortcut switches.
const SWITCH_PREFIX: &str = "switch:";

fn flag_id(path: &str) -> String {
    format!("{FLAG_PREFIX}{path}")
}

fn switch_id(path: &str) -> String {
    format!("{SWITCH_PREFIX}{path}")
}

/// Builder of command-line args for the anchor points in a [`CliTable`].
///
/// Each anchor path `a.b.c` is exposed as the `--a.b.c VALUE` flag. Values are parsed according
/// to the [`CliKind`] of the anchor:
///
/// - Integers and floats are parsed as numbers.
/// - Booleans accept common spellings (`true` / `false`, `yes` / `no`, `1` / `0` etc.).
/// - Enum values are restricted to the enum choices.
/// - Lists and dictionaries are parsed as JSON literals.
/// - Strings and paths are passed as is.
#[derive(Debug, Clone)]
pub struct CliParser {
    table: CliTable,
    shortcuts: Vec<(String, String)>,
}

impl CliParser {
    /// Creates a parser for the specified table.
    pub fn new(table: CliTable) -> Self {
        Self {
            table,
            shortcuts: vec![],
        }
    }

    /// Adds a shortcut flag for the specified anchor path. The flag may be short (`-e`) or long (`--epochs`);
    /// leading dashes may be omitted. For Boolean anchors, the shortcut is a switch setting the value to `true`.
    ///
    /// Shortcuts for paths missing from the table are ignored.
    #[must_use]
    pub fn shortcut(mut self, flag: impl Into<String>, path: impl Into<String>) -> Self {
        self.shortcuts.push((flag.into(), path.into()));
        self
    }

    /// Returns the underlying table.
    pub fn table(&self) -> &CliTable {
        &self.table
    }

    /// Adds args for all anchor points to the provided command.
    ///
    /// Anchor points and shortcuts whose flag names are already used by the command (e.g., `--help`)
    /// or by a preceding anchor point are skipped with a warning.
    pub fn augment(&self, mut command: Command) -> Command {
        let mut used = UsedNames::new(&command);
        for (path, kind) in self.table.iter() {
            if !used.reserve(FlagName::Long(path)) {
                tracing::warn!(path, "skipping CLI anchor point: its flag is already used by the command");
                continue;
            }
            let mut arg = Arg::new(flag_id(path))
                .long(path.to_owned())
                .action(ArgAction::Set)
                .value_name(value_name(kind))
                .help(format!("Overrides `{path}` ({kind})"));
            arg = with_value_parser(arg, kind);

            for flag in self.shortcuts_for(path) {
                let name = FlagName::new(flag);
                if !used.reserve(name) {
                    tracing::warn!(flag, path, "skipping shortcut: its flag is already used by the command");
                    continue;
                }
                if *kind == CliKind::Bool {
                    let switch = Arg::new(switch_id(path))
                        .action(ArgAction::SetTrue)
                        .help(format!("Sets `{path}` to true"))
                        .conflicts_with(flag_id(path));
                    command = command.arg(with_flag(switch, name));
                } else {
                    arg = with_flag(arg, name);
                }
            }
            command = command.arg(arg);
        }

        for (flag, path) in &self.shortcuts {
            if self.table.get(path).is_none() {
                tracing::warn!(flag, path, "ignoring shortcut for unknown CLI anchor point");
            }
        }
        command
    }

    fn shortcuts_for<'a>(&'a self, path: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.shortcuts
            .iter()
            .filter(move |(_, target)| target == path)
            .map(|(flag, _)| flag.as_str())
    }

    /// Extracts overrides from the matches produced by a command [augmented](Self::augment()) by this parser.
    /// Only values explicitly provided on the command line are extracted.
    pub fn overrides(&self, matches: &ArgMatches) -> Overrides {
        let provided: HashSet<&str> = matches
            .ids()
            .map(Id::as_str)
            .filter(|&id| matches.value_source(id) == Some(ValueSource::CommandLine))
            .collect();

        let mut values = vec![];
        for (path, _) in self.table.iter() {
            let id = flag_id(path);
            if provided.contains(switch_id(path).as_str()) {
                values.push((path.to_owned(), Plain::Bool(true)));
            } else if provided.contains(id.as_str()) {
                if let Some(value) = matches.get_one::<Plain>(&id) {
                    values.push((path.to_owned(), value.clone()));
                }
            }
        }
        tracing::debug!(count = values.len(), "parsed command-line overrides");
        Overrides { values }
    }

    /// Augments the command, parses the provided args and extracts overrides.
    ///
    /// # Errors
    ///
    /// Proxies `clap` errors, including ones requesting to display help.
    pub fn parse_from<I, T>(&self, command: Command, args: I) -> Result<Overrides, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let matches = self.augment(command).try_get_matches_from(args)?;
        Ok(self.overrides(&matches))
    }
}

/// Flag name with leading dashes stripped.
#[derive(Debug, Clone, Copy)]
enum FlagName<'a> {
    Short(char),
    Long(&'a str),
}

impl<'a> FlagName<'a> {
    fn new(flag: &'a str) -> Self {
        let name = flag.trim_start_matches('-');
        let mut chars = name.chars();
        match (chars.next(), chars.next()) {
            (Some(ch), None) => Self::Short(ch),
            _ => Self::Long(name),
        }
    }
}

/// Flag names used by a command being augmented.
#[derive(Debug, Default)]
struct UsedNames {
    longs: HashSet<String>,
    shorts: HashSet<char>,
}

impl UsedNames {
    fn new(command: &Command) -> Self {
        let mut names = Self::default();
        if !command.is_disable_help_flag_set() {
            names.longs.insert("help".to_owned());
            names.shorts.insert('h');
        }
        let has_version = command.get_version().is_some() || command.get_long_version().is_some();
        if has_version && !command.is_disable_version_flag_set() {
            names.longs.insert("version".to_owned());
            names.shorts.insert('V');
        }
        for arg in command.get_arguments() {
            names.longs.extend(arg.get_long().map(str::to_owned));
            let aliases = arg.get_all_aliases().into_iter().flatten();
            names.longs.extend(aliases.map(str::to_owned));
            names.shorts.extend(arg.get_short());
            names.shorts.extend(arg.get_all_short_aliases().into_iter().flatten());
        }
        names
    }

    /// Returns `false` if the name is already used.
    fn reserve(&mut self, name: FlagName<'_>) -> bool {
        match name {
            FlagName::Short(ch) => self.shorts.insert(ch),
            FlagName::Long(long) => self.longs.insert(long.to_owned()),
        }
    }
}

fn with_flag(arg: Arg, name: FlagName<'_>) -> Arg {
    match name {
        FlagName::Short(ch) => arg.short(ch),
        FlagName::Long(long) if arg.get_long().is_some() => arg.visible_alias(long.to_owned()),
        FlagName::Long(long) => arg.long(long.to_owned()),
    }
}

fn value_name(kind: &CliKind) -> &'static str {
    match kind {
        CliKind::Bool => "BOOL",
        CliKind::Int => "INT",
        CliKind::Float => "FLOAT",
        CliKind::Path => "PATH",
        CliKind::Enum(_) => "CHOICE",
        CliKind::List => "JSON_LIST",
        CliKind::Dict => "JSON_DICT",
        _ => "STR",
    }
}

fn with_value_parser(arg: Arg, kind: &CliKind) -> Arg {
    match kind {
        CliKind::Bool => arg.value_parser(parse_bool),
        CliKind::Int => arg.value_parser(parse_int),
        CliKind::Float => arg.value_parser(parse_float),
        CliKind::Enum(choices) => {
            let choices: Vec<_> = choices
                .iter()
                .map(|choice| (render_choice(choice), choice.clone()))
                .collect();
            let names: Vec<_> = choices.iter().map(|(name, _)| name.clone()).collect();
            let parser = PossibleValuesParser::new(names).map(move |name: String| {
                choices
                    .iter()
                    .find_map(|(choice_name, choice)| (*choice_name == name).then(|| choice.clone()))
                    .unwrap_or(Plain::String(name))
            });
            arg.value_parser(parser)
        }
        CliKind::List => arg.value_parser(parse_list),
        CliKind::Dict => arg.value_parser(parse_dict),
        _ => arg.value_parser(parse_str),
    }
}

fn parse_bool(s: &str) -> Result<Plain, String> {
    tyconf::parse_bool(s)
        .map(Plain::Bool)
        .ok_or_else(|| "Boolean value expected".to_owned())
}

fn parse_int(s: &str) -> Result<Plain, String> {
    if let Ok(value) = s.parse::<i64>() {
        Ok(value.into())
    } else {
        s.parse::<u64>()
            .map(Plain::from)
            .map_err(|err| format!("invalid integer: {err}"))
    }
}

fn parse_float(s: &str) -> Result<Plain, String> {
    let value = s
        .parse::<f64>()
        .map_err(|err| format!("invalid float: {err}"))?;
    serde_json::Number::from_f64(value)
        .map(Plain::Number)
        .ok_or_else(|| "float must be finite".to_owned())
}

fn parse_str(s: &str) -> Result<Plain, String> {
    Ok(Plain::String(s.to_owned()))
}

fn parse_list(s: &str) -> Result<Plain, String> {
    match serde_json::from_str(s).map_err(|err| format!("invalid JSON: {err}"))? {
        value @ Plain::Array(_) => Ok(value),
        _ => Err("expected a JSON array".to_owned()),
    }
}

fn parse_dict(s: &str) -> Result<Plain, String> {
    match serde_json::from_str(s).map_err(|err| format!("invalid JSON: {err}"))? {
        value @ Plain::Object(_) => Ok(value),
        _ => Err("expected a JSON object".to_owned()),
    }
}

/// Values parsed from the command line, keyed by dotted anchor paths.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Overrides {
    values: Vec<(String, Plain)>,
}

impl Overrides {
    /// Iterates over overrides in the order of anchor points.
    pub fn iter(&self) -> impl ExactSizeIterator<Item = (&str, &Plain)> + '_ {
        self.values.iter().map(|(path, value)| (path.as_str(), value))
    }

    /// Gets the override for the specified path.
    pub fn get(&self, path: &str) -> Option<&Plain> {
        self.values
            .iter()
            .find_map(|(existing, value)| (existing == path).then_some(value))
    }

    /// Returns the number of overrides.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Checks whether there are no overrides.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Merges overrides into the payload at their dotted paths.
    pub fn apply(&self, plain: &mut Plain) {
        for (path, value) in &self.values {
            tracing::trace!(path, %value, "applying override");
            tyconf::merge_at(plain, path, value.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use clap::error::ErrorKind;
    use serde_json::json;
    use test_casing::test_casing;

    use super::*;

    fn test_table() -> CliTable {
        let mut table = CliTable::new();
        table.add("epochs", CliKind::Int);
        table.add("lr", CliKind::Float);
        table.add("verbose", CliKind::Bool);
        table.add(
            "optimizer.kind",
            CliKind::Enum(vec![json!("sgd"), json!("adam")]),
        );
        table.add("precision", CliKind::Enum(vec![json!(16), json!(32)]));
        table.add("layers", CliKind::List);
        table.add("labels", CliKind::Dict);
        table.add("output_dir", CliKind::Path);
        table
    }

    fn parse(parser: &CliParser, args: &[&str]) -> Result<Overrides, clap::Error> {
        let args = ["test"].into_iter().chain(args.iter().copied());
        parser.parse_from(Command::new("test"), args)
    }

    #[test]
    fn parsing_overrides() {
        let parser = CliParser::new(test_table());
        let overrides = parse(
            &parser,
            &[
                "--lr",
                "0.5",
                "--epochs=3",
                "--optimizer.kind",
                "adam",
                "--precision",
                "16",
                "--layers",
                "[4, 8]",
                "--labels",
                r#"{"a": "b"}"#,
                "--output_dir",
                "/tmp/out",
            ],
        )
        .unwrap();

        let values: Vec<_> = overrides.iter().collect();
        assert_eq!(
            values,
            [
                ("epochs", &json!(3)),
                ("lr", &json!(0.5)),
                ("optimizer.kind", &json!("adam")),
                ("precision", &json!(16)),
                ("layers", &json!([4, 8])),
                ("labels", &json!({ "a": "b" })),
                ("output_dir", &json!("/tmp/out")),
            ]
        );
        assert_eq!(overrides.get("verbose"), None);
    }

    #[test_casing(6, ["true", "Yes", "y", "1", "false", "N"])]
    #[test]
    fn parsing_bool_spellings(spelling: &str) {
        let parser = CliParser::new(test_table());
        let overrides = parse(&parser, &["--verbose", spelling]).unwrap();
        let expected = !matches!(spelling, "false" | "N");
        assert_eq!(overrides.get("verbose"), Some(&Plain::Bool(expected)));
    }

    #[test_casing(5, [
        ["--epochs", "1.5"],
        ["--lr", "fast"],
        ["--verbose", "maybe"],
        ["--layers", "{}"],
        ["--labels", "[1"],
    ])]
    #[test]
    fn invalid_values(args: [&str; 2]) {
        let parser = CliParser::new(test_table());
        let err = parse(&parser, &args).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValueValidation);
    }

    #[test]
    fn enum_choices_are_restricted() {
        let parser = CliParser::new(test_table());
        let err = parse(&parser, &["--optimizer.kind", "adamw"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidValue);
        let err = parse(&parser, &["--precision", "8"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidValue);
    }

    #[test]
    fn unknown_flags_are_rejected() {
        let parser = CliParser::new(test_table());
        let err = parse(&parser, &["--optimizer.momentum", "0.9"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownArgument);
    }

    #[test]
    fn shortcuts() {
        let parser = CliParser::new(test_table())
            .shortcut("-e", "epochs")
            .shortcut("opt", "optimizer.kind")
            .shortcut("v", "verbose")
            .shortcut("--missing", "missing.path");

        let overrides = parse(&parser, &["-e", "5", "--opt", "sgd", "-v"]).unwrap();
        assert_eq!(overrides.get("epochs"), Some(&json!(5)));
        assert_eq!(overrides.get("optimizer.kind"), Some(&json!("sgd")));
        assert_eq!(overrides.get("verbose"), Some(&json!(true)));

        // The full flag is still available.
        let overrides = parse(&parser, &["--optimizer.kind", "adam"]).unwrap();
        assert_eq!(overrides.get("optimizer.kind"), Some(&json!("adam")));
        assert_eq!(overrides.get("verbose"), None);

        let err = parse(&parser, &["-v", "--verbose", "false"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ArgumentConflict);
    }

    #[test]
    fn applying_overrides() {
        let parser = CliParser::new(test_table());
        let overrides = parse(
            &parser,
            &["--optimizer.kind", "adam", "--layers", "[1]", "--epochs", "2"],
        )
        .unwrap();
        assert_eq!(overrides.len(), 3);

        let mut plain = json!({
            "epochs": 10,
            "optimizer": { "kind": "sgd", "lr": 0.1 },
            "layers": [4, 8],
        });
        overrides.apply(&mut plain);
        assert_eq!(
            plain,
            json!({
                "epochs": 2,
                "optimizer": { "kind": "adam", "lr": 0.1 },
                "layers": [1],
            })
        );
    }

    #[test]
    fn help_lists_flags() {
        let parser = CliParser::new(test_table()).shortcut("-e", "epochs");
        let err = parse(&parser, &["--help"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DisplayHelp);
        let help = err.to_string();
        assert!(help.contains("--optimizer.kind <CHOICE>"), "{help}");
        assert!(help.contains("-e, --epochs <INT>"), "{help}");
        assert!(help.contains("[possible values: sgd, adam]"), "{help}");
    }

    #[test]
    fn anchors_clashing_with_command_flags() {
        let mut table = CliTable::new();
        table.add("help", CliKind::Str);
        table.add("version", CliKind::Str);
        table.add("config", CliKind::Int);
        table.add("epochs", CliKind::Int);
        let parser = CliParser::new(table)
            .shortcut("-h", "epochs")
            .shortcut("--config", "epochs")
            .shortcut("-n", "epochs");
        let command = Command::new("test")
            .version("1.0.0")
            .arg(Arg::new("config").value_name("CONFIG"));

        let args = ["test", "config.yml", "--config", "2", "-n", "3"];
        let matches = parser.augment(command.clone()).try_get_matches_from(args).unwrap();
        assert_eq!(matches.get_one::<String>("config").unwrap(), "config.yml");
        let overrides = parser.overrides(&matches);
        let values: Vec<_> = overrides.iter().collect();
        assert_eq!(
            values,
            [("config", &json!(2)), ("epochs", &json!(3))]
        );

        let err = parser
            .augment(command.clone())
            .try_get_matches_from(["test", "--help"])
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DisplayHelp);
        let help = err.to_string();
        assert!(!help.contains("Overrides `help`"), "{help}");
        assert!(!help.contains("Overrides `version`"), "{help}");
        assert!(help.contains("--config <INT>"), "{help}");
        assert!(help.contains("-n, --epochs <INT>"), "{help}");

        let err = parser
            .augment(command)
            .try_get_matches_from(["test", "c.yml", "-V"])
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DisplayVersion);
    }

    #[test]
    fn empty_table() {
        let parser = CliParser::new(CliTable::new());
        let overrides = parse(&parser, &[]).unwrap();
        assert!(overrides.is_empty());
        assert_matches!(
            parse(&parser, &["--epochs", "1"]),
            Err(err) if err.kind() == ErrorKind::UnknownArgument
        );
    }
}
