//! Test-only functionality shared among multiple test modules.

use std::{collections::HashMap, path::PathBuf, sync::Arc};

use crate::{
    DescribeEnum, DescribeRecord, Ty,
    class::{Args, ClassCatalog, ClassDef, ClassRegistry},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, DescribeEnum)]
#[config(crate = crate)]
pub(crate) enum OptimizerKind {
    #[config(rename = "sgd")]
    Sgd,
    #[config(rename = "adam")]
    Adam,
}

/// Optimizer settings.
#[derive(Debug, Clone, PartialEq, DescribeRecord)]
#[config(crate = crate)]
pub(crate) struct OptimizerConfig {
    pub kind: OptimizerKind,
    /// Learning rate.
    #[config(default_t = 0.01)]
    pub lr: f64,
    pub betas: Option<(f64, f64)>,
}

#[derive(Debug, Clone, PartialEq, DescribeRecord)]
#[config(crate = crate, validate(Self::check_warmup, "warmup must not exceed the number of epochs"))]
pub(crate) struct TrainerConfig {
    /// Number of epochs.
    pub epochs: u32,
    #[config(default)]
    pub warmup: u32,
    pub optimizer: OptimizerConfig,
    #[config(default)]
    pub layers: Vec<u32>,
    #[config(default, rename = "labels")]
    pub tags: HashMap<String, String>,
    pub output_dir: Option<PathBuf>,
}

impl TrainerConfig {
    fn check_warmup(&self) -> (bool, String) {
        (
            self.warmup <= self.epochs,
            format!("warmup {} exceeds {} epochs", self.warmup, self.epochs),
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Layer {
    Linear {
        inputs: i64,
        outputs: i64,
        bias: bool,
    },
    Conv {
        channels: i64,
        kernel: i64,
    },
    Gated {
        inner: Box<Layer>,
        gate: f64,
    },
}

/// Class hierarchy used in tests:
///
/// ```text
/// nn::Module (abstract)
/// ├── nn::Linear
/// │   └── nn::GatedLinear (forwards keyword params to `Linear`)
/// └── nn.conv::Conv (alias `conv`)
/// ```
#[derive(Debug)]
pub(crate) struct ModelClasses {
    pub module: Arc<ClassDef>,
    pub linear: Arc<ClassDef>,
    pub gated: Arc<ClassDef>,
    pub conv: Arc<ClassDef>,
}

impl ModelClasses {
    pub fn new() -> Self {
        let module = ClassDef::builder("Module").module("nn").build();
        let linear = ClassDef::builder("Linear")
            .module("nn")
            .extends(&module)
            .help("Fully connected layer.")
            .param("inputs", Ty::int())
            .param("outputs", Ty::int())
            .param_with_default("bias", Ty::bool(), true)
            .constructor(|mut args: Args| {
                Ok(Layer::Linear {
                    inputs: args.take("inputs")?,
                    outputs: args.take("outputs")?,
                    bias: args.take("bias")?,
                })
            });

        let parent = linear.clone();
        let gated = ClassDef::builder("GatedLinear")
            .module("nn")
            .extends(&linear)
            .param_with_default("gate", Ty::float(), 0.5)
            .var_keyword("kwargs")
            .constructor(move |mut args: Args| {
                let gate = args.take("gate")?;
                let inner = parent.construct_as::<Layer>(args)?;
                Ok(Layer::Gated {
                    inner: Box::new(inner),
                    gate,
                })
            });

        let conv = ClassDef::builder("Conv")
            .module("nn.conv")
            .alias("conv")
            .extends(&module)
            .param("channels", Ty::int())
            .param_with_default("kernel", Ty::int(), 3)
            .constructor(|mut args: Args| {
                Ok(Layer::Conv {
                    channels: args.take("channels")?,
                    kernel: args.take("kernel")?,
                })
            });

        Self {
            module,
            linear,
            gated,
            conv,
        }
    }

    pub fn catalog(&self) -> Arc<ClassCatalog> {
        let catalog = ClassCatalog::new();
        for class in [&self.module, &self.linear, &self.gated, &self.conv] {
            catalog.insert(class).unwrap();
        }
        catalog
    }

    /// Registry with `linear`, `gated` (with inheritance) and `conv` names.
    pub fn registry(&self) -> Arc<ClassRegistry> {
        let registry = ClassRegistry::new("layers");
        let options = crate::class::RegisterOptions::new();
        registry.register_as(["linear"], &self.linear, options).unwrap();
        registry
            .register_as(["gated"], &self.gated, options.inherit())
            .unwrap();
        registry.register_as(["conv"], &self.conv, options).unwrap();
        registry
    }
}
