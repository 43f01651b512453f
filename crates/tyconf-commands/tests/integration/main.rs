//! Integration tests for command-line extensions.

use std::{fs, path::PathBuf};

use anstream::AutoStream;
use assert_matches::assert_matches;
use serde_json::json;
use test_casing::test_casing;
use tyconf::{CliKind, Describe};
use tyconf_commands::{CliLoader, Printer};

use crate::configs::{LauncherConfig, Layer, ModelConfig, OptimizerKind, TrainConfig};

mod configs;

/// Config file in the temp dir removed on drop.
#[derive(Debug)]
struct TempConfig(PathBuf);

impl TempConfig {
    fn new(name: &str, contents: &str) -> Self {
        let path = std::env::temp_dir().join(format!("tyconf-{}-{name}", std::process::id()));
        fs::write(&path, contents).unwrap();
        Self(path)
    }

    fn args<'a>(&'a self, extra: &[&'a str]) -> Vec<String> {
        let mut args = vec!["train".to_owned(), self.0.to_string_lossy().into_owned()];
        args.extend(extra.iter().map(|&arg| arg.to_owned()));
        args
    }
}

impl Drop for TempConfig {
    fn drop(&mut self) {
        fs::remove_file(&self.0).ok();
    }
}

const TRAIN_YAML: &str = "\
epochs: 10
optimizer:
  kind: sgd
data:
  path: /data/train
  shuffle: true
";

#[test]
fn loading_config_without_overrides() {
    let file = TempConfig::new("plain.yml", TRAIN_YAML);
    let config: TrainConfig = CliLoader::new("train").from_args(file.args(&[])).unwrap();
    assert_eq!(config.epochs, 10);
    assert_eq!(config.optimizer.kind, OptimizerKind::Sgd);
    assert_eq!(config.optimizer.lr, 0.01);
    assert_eq!(config.data.path.as_os_str(), "/data/train");
    assert!(config.data.shuffle);
    assert_eq!(config.tags, [] as [String; 0]);
}

#[test]
fn loading_config_with_overrides() {
    let file = TempConfig::new("overrides.yml", TRAIN_YAML);
    let args = file.args(&[
        "--epochs",
        "3",
        "--optimizer.kind",
        "adam",
        "--optimizer.lr=0.5",
        "--data.shuffle",
        "no",
        "--tags",
        r#"["a", "b"]"#,
    ]);
    let loaded = CliLoader::new("train")
        .load(&TrainConfig::ty(), args)
        .unwrap();
    assert_eq!(loaded.config_path, file.0);
    assert_eq!(loaded.overrides.len(), 5);
    assert!(loaded.rest.is_empty());

    let config: TrainConfig = tyconf::FromTyped::from_typed(loaded.value).unwrap();
    assert_eq!(config.epochs, 3);
    assert_eq!(config.optimizer.kind, OptimizerKind::Adam);
    assert_eq!(config.optimizer.lr, 0.5);
    assert!(!config.data.shuffle);
    assert_eq!(config.tags, ["a", "b"]);
}

#[test]
fn overriding_record_with_json_dict() {
    let file = TempConfig::new("dict.yml", TRAIN_YAML);
    let args = file.args(&["--optimizer", r#"{"lr": 0.2}"#]);
    let config: TrainConfig = CliLoader::new("train").from_args(args).unwrap();
    // Dictionaries are merged into the existing value.
    assert_eq!(config.optimizer.kind, OptimizerKind::Sgd);
    assert_eq!(config.optimizer.lr, 0.2);
}

#[test]
fn shortcuts() {
    let file = TempConfig::new("shortcuts.yml", TRAIN_YAML);
    let loader = CliLoader::new("train")
        .shortcut("-e", "epochs")
        .shortcut("--shuffle", "data.shuffle")
        .shortcut("-q", "quiet");
    let config: TrainConfig = loader.from_args(file.args(&["-e", "7", "-q"])).unwrap();
    assert_eq!(config.epochs, 7);
    assert!(config.quiet);
}

#[test]
fn discovery_failure_keeps_collected_flags() {
    let file = TempConfig::new("partial.json", r#"{ "epochs": 10, "optimizer": { "kind": "sgd" } }"#);
    let loader = CliLoader::new("train");

    // Flags for fields preceding the missing `data` field are available.
    let err = loader
        .from_args::<TrainConfig, _, _>(file.args(&["--epochs", "3", "--optimizer.lr", "1e-3"]))
        .unwrap_err();
    let err = err.downcast::<tyconf::Error>().unwrap();
    let err = err.as_validation().unwrap();
    assert_matches!(err.kind(), tyconf::ErrorKind::MissingField { field } if field == "data");

    let err = loader
        .from_args::<TrainConfig, _, _>(file.args(&["--data.path", "/tmp"]))
        .unwrap_err();
    let err = err.downcast::<clap::Error>().unwrap();
    assert_eq!(err.kind(), clap::error::ErrorKind::UnknownArgument);
}

#[test_casing(3, [
    ["--epochs", "many"],
    ["--optimizer.kind", "rmsprop"],
    ["--optimizer.momentum", "0.9"],
])]
#[test]
fn invalid_command_lines(extra: [&str; 2]) {
    let file = TempConfig::new(&format!("invalid-{}.yml", extra[0].trim_start_matches('-')), TRAIN_YAML);
    let err = CliLoader::new("train")
        .from_args::<TrainConfig, _, _>(file.args(&extra))
        .unwrap_err();
    assert_matches!(err.downcast_ref::<clap::Error>(), Some(_));
}

#[test]
fn rest_args() {
    let file = TempConfig::new("rest.yml", TRAIN_YAML);
    let loaded = CliLoader::new("train")
        .allow_rest()
        .load(&TrainConfig::ty(), file.args(&["--epochs", "2", "--", "--seed", "1"]))
        .unwrap();
    assert_eq!(loaded.rest, ["--seed", "1"]);
    assert_eq!(loaded.overrides.get("epochs"), Some(&json!(2)));

    let err = CliLoader::new("train")
        .load(&TrainConfig::ty(), file.args(&["--", "--seed", "1"]))
        .unwrap_err();
    assert_matches!(err.downcast_ref::<clap::Error>(), Some(_));
}

#[test]
fn fields_named_like_loader_args() {
    let file = TempConfig::new("launcher.yml", "config: 1\nhelp: from file\n");
    let loader = CliLoader::new("train").allow_rest();
    let args = file.args(&["--config", "2", "--rest", r#"["a"]"#, "--", "x"]);
    let loaded = loader.load(&LauncherConfig::ty(), args).unwrap();
    assert_eq!(loaded.config_path, file.0);
    assert_eq!(loaded.rest, ["x"]);

    let config: LauncherConfig = tyconf::FromTyped::from_typed(loaded.value).unwrap();
    assert_eq!(config.config, 2);
    assert_eq!(config.help, "from file");
    assert_eq!(config.rest, ["a"]);

    // `--help` is kept by the command; the `help` field can only be set in the config file.
    let err = loader
        .load(&LauncherConfig::ty(), file.args(&["--help"]))
        .unwrap_err();
    let err = err.downcast::<clap::Error>().unwrap();
    assert_eq!(err.kind(), clap::error::ErrorKind::DisplayHelp);
    let help = err.to_string();
    assert!(help.contains("--config <INT>"), "{help}");
    assert!(help.contains("--rest <JSON_LIST>"), "{help}");
    assert!(!help.contains("Overrides `help`"), "{help}");
}

#[test]
fn help_depends_on_config_contents() {
    let file = TempConfig::new("help.yml", "model:\n  type: conv\n  channels: 8\n");
    let err = CliLoader::new("train")
        .about("Trains a model")
        .load(&ModelConfig::ty(), file.args(&["--help"]))
        .unwrap_err();
    let err = err.downcast::<clap::Error>().unwrap();
    assert_eq!(err.kind(), clap::error::ErrorKind::DisplayHelp);
    let help = err.to_string();
    assert!(help.contains("Trains a model"), "{help}");
    assert!(help.contains("--model.channels <INT>"), "{help}");
    assert!(help.contains("--model.kernel <INT>"), "{help}");
    assert!(!help.contains("--model.inputs"), "{help}");
}

#[test_casing(2, ["conv", "linear"])]
#[test]
fn registry_configs_from_command_line(layer_type: &str) {
    let yaml = if layer_type == "conv" {
        "model:\n  type: conv\n  channels: 8\n"
    } else {
        "model:\n  type: linear\n  inputs: 4\n  outputs: 2\n"
    };
    let file = TempConfig::new(&format!("registry-{layer_type}.yml"), yaml);

    let extra: &[&str] = if layer_type == "conv" {
        &["--model.kernel", "5"]
    } else {
        &["--model.outputs", "3"]
    };
    let config: ModelConfig = CliLoader::new("train").from_args(file.args(extra)).unwrap();
    let layer: Layer = config.model.build_as().unwrap();
    let expected = if layer_type == "conv" {
        Layer::Conv {
            channels: 8,
            kernel: 5,
        }
    } else {
        Layer::Linear {
            inputs: 4,
            outputs: 3,
        }
    };
    assert_eq!(layer, expected);
}

#[test]
fn printing_flags() {
    let (_, table) =
        tyconf::discover(&TrainConfig::ty(), &serde_yaml::from_str(TRAIN_YAML).unwrap()).unwrap();
    assert_eq!(
        table.get("optimizer.kind"),
        Some(&CliKind::Enum(vec![json!("sgd"), json!("adam")]))
    );

    let mut buffer = vec![];
    Printer::custom(AutoStream::never(&mut buffer))
        .print_flags(&table)
        .unwrap();
    let buffer = String::from_utf8(buffer).unwrap();
    let lines: Vec<_> = buffer.lines().map(str::trim_end).collect();
    assert!(lines.contains(&"  --epochs          int"), "{buffer}");
    assert!(lines.contains(&"  --optimizer.kind  enum{sgd, adam}"), "{buffer}");
    assert!(lines.contains(&"  --data.path       path"), "{buffer}");
}

#[test]
fn printing_json() {
    let mut buffer = vec![];
    Printer::custom(AutoStream::never(&mut buffer))
        .print_json(&json!({ "a": [1, null], "b": { "c": "d" }, "e": {} }))
        .unwrap();
    let buffer = String::from_utf8(buffer).unwrap();
    assert_eq!(
        buffer,
        "{\n  \"a\": [\n    1,\n    null\n  ],\n  \"b\": {\n    \"c\": \"d\"\n  },\n  \"e\": {}\n}\n"
    );
}
