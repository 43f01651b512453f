//! Loading config documents from files.

use std::{fs, path::Path};

use anyhow::Context as _;
use tyconf::{Plain, PlainMap};

/// Format of a config document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum FileFormat {
    /// JSON document.
    Json,
    /// YAML document. Since YAML is a superset of JSON, this is the fallback format.
    Yaml,
}

impl FileFormat {
    /// Infers the format from the file extension.
    pub fn from_path(path: &Path) -> Self {
        let extension = path.extension().and_then(|ext| ext.to_str());
        match extension {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Self::Json,
            _ => Self::Yaml,
        }
    }
}

/// Parses a config document. The document must be a mapping; an empty YAML document is treated
/// as an empty mapping.
///
/// # Errors
///
/// Returns an error if the document cannot be parsed, or if it's not a mapping.
pub fn parse_document(contents: &str, format: FileFormat) -> anyhow::Result<Plain> {
    let plain: Plain = match format {
        FileFormat::Json => serde_json::from_str(contents).context("invalid JSON")?,
        FileFormat::Yaml => serde_yaml::from_str(contents).context("invalid YAML")?,
    };
    match plain {
        Plain::Null => Ok(Plain::Object(PlainMap::new())),
        Plain::Object(_) => Ok(plain),
        _ => anyhow::bail!("config document must be a mapping"),
    }
}

/// Loads a config document from the specified file. The format is inferred from the file extension
/// (`.json` for JSON, YAML otherwise).
///
/// # Errors
///
/// Returns I/O and parsing errors.
pub fn load_file(path: impl AsRef<Path>) -> anyhow::Result<Plain> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed reading config file `{}`", path.display()))?;
    let format = FileFormat::from_path(path);
    tracing::debug!(path = %path.display(), ?format, "loading config file");
    parse_document(&contents, format)
        .with_context(|| format!("failed parsing config file `{}`", path.display()))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn inferring_format() {
        assert_eq!(FileFormat::from_path(Path::new("config.json")), FileFormat::Json);
        assert_eq!(FileFormat::from_path(Path::new("CONFIG.JSON")), FileFormat::Json);
        assert_eq!(FileFormat::from_path(Path::new("config.yml")), FileFormat::Yaml);
        assert_eq!(FileFormat::from_path(Path::new("config")), FileFormat::Yaml);
    }

    #[test]
    fn parsing_yaml() {
        let yaml = "a: 1\nb: 2.0\nc:\n  n: 0\nd: [x, y]\n";
        let plain = parse_document(yaml, FileFormat::Yaml).unwrap();
        assert_eq!(
            plain,
            json!({ "a": 1, "b": 2.0, "c": { "n": 0 }, "d": ["x", "y"] })
        );

        let plain = parse_document("", FileFormat::Yaml).unwrap();
        assert_eq!(plain, json!({}));
    }

    #[test]
    fn parsing_json() {
        let plain = parse_document(r#"{ "a": [1, null] }"#, FileFormat::Json).unwrap();
        assert_eq!(plain, json!({ "a": [1, null] }));
    }

    #[test]
    fn document_errors() {
        let err = parse_document("- 1\n- 2\n", FileFormat::Yaml).unwrap_err();
        assert_eq!(err.to_string(), "config document must be a mapping");

        let err = parse_document("{ \"a\": ", FileFormat::Json).unwrap_err();
        assert_eq!(err.to_string(), "invalid JSON");

        let err = load_file("/non-existing/config.yml").unwrap_err();
        assert_eq!(
            err.to_string(),
            "failed reading config file `/non-existing/config.yml`"
        );
    }
}
