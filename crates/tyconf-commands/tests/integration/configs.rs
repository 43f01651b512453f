//! Configs used in integration tests.

use std::{path::PathBuf, sync::{Arc, OnceLock}};

use tyconf::{
    DescribeEnum, DescribeRecord, Record, Ty,
    class::{Args, ClassDef, ClassRegistry},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, DescribeEnum)]
pub(crate) enum OptimizerKind {
    #[config(rename = "sgd")]
    Sgd,
    #[config(rename = "adam")]
    Adam,
}

#[derive(Debug, DescribeRecord)]
pub(crate) struct OptimizerConfig {
    pub kind: OptimizerKind,
    /// Learning rate.
    #[config(default_t = 0.01)]
    pub lr: f64,
}

#[derive(Debug, DescribeRecord)]
pub(crate) struct DataConfig {
    pub path: PathBuf,
    #[config(default)]
    pub shuffle: bool,
}

/// Training configuration.
#[derive(Debug, DescribeRecord)]
pub(crate) struct TrainConfig {
    pub epochs: u32,
    pub optimizer: OptimizerConfig,
    pub data: DataConfig,
    #[config(default)]
    pub tags: Vec<String>,
    #[config(default)]
    pub quiet: bool,
}

#[derive(Debug, PartialEq)]
pub(crate) enum Layer {
    Linear { inputs: i64, outputs: i64 },
    Conv { channels: i64, kernel: i64 },
}

pub(crate) fn layers() -> &'static Arc<ClassRegistry> {
    static LAYERS: OnceLock<Arc<ClassRegistry>> = OnceLock::new();
    LAYERS.get_or_init(|| {
        let linear = ClassDef::builder("Linear")
            .param("inputs", Ty::int())
            .param("outputs", Ty::int())
            .constructor(|mut args: Args| {
                Ok(Layer::Linear {
                    inputs: args.take("inputs")?,
                    outputs: args.take("outputs")?,
                })
            });
        let conv = ClassDef::builder("Conv")
            .param("channels", Ty::int())
            .param_with_default("kernel", Ty::int(), 3)
            .constructor(|mut args: Args| {
                Ok(Layer::Conv {
                    channels: args.take("channels")?,
                    kernel: args.take("kernel")?,
                })
            });

        let registry = ClassRegistry::new("layers");
        registry
            .register_as(["linear"], &linear, Default::default())
            .unwrap();
        registry
            .register_as(["conv"], &conv, Default::default())
            .unwrap();
        registry
    })
}

#[derive(Debug, DescribeRecord)]
pub(crate) struct ModelConfig {
    #[config(ty = Ty::registry(layers()))]
    pub model: Record,
}

/// Config with fields named like the args defined by the loader.
#[derive(Debug, DescribeRecord)]
pub(crate) struct LauncherConfig {
    pub config: u32,
    #[config(default)]
    pub help: String,
    #[config(default)]
    pub rest: Vec<String>,
}
