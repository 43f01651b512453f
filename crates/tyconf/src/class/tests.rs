//! Tests for classes, registries and catalogs.

use assert_matches::assert_matches;
use serde_json::json;

use super::*;
use crate::{ErrorKind, testonly::{Layer, ModelClasses}};

#[test]
fn class_paths_and_ancestry() {
    let classes = ModelClasses::new();
    assert_eq!(classes.linear.qualified_path(), "nn::Linear");
    assert_eq!(classes.conv.qualified_path(), "nn.conv::Conv");
    assert_eq!(ClassDef::builder("Free").build().qualified_path(), "Free");

    let ancestors: Vec<_> = classes.gated.ancestors().map(|class| class.name()).collect();
    assert_eq!(ancestors, ["Linear", "Module"]);
    assert!(classes.gated.is_subclass_of(&classes.module));
    assert!(classes.linear.is_subclass_of(&classes.linear));
    assert!(!classes.conv.is_subclass_of(&classes.linear));
}

#[test]
fn synthesized_record() {
    let classes = ModelClasses::new();
    let meta = classes.linear.record_metadata(false).unwrap();
    assert_eq!(meta.name(), "Linear");
    assert_eq!(meta.help(), "Fully connected layer.");
    let fields: Vec<_> = meta
        .fields()
        .iter()
        .map(|field| (field.name.as_str(), field.ty.clone(), field.default.clone()))
        .collect();
    assert_eq!(
        fields,
        [
            ("inputs", Ty::int(), None),
            ("outputs", Ty::int(), None),
            ("bias", Ty::bool(), Some(json!(true))),
        ]
    );
    assert_eq!(meta.class().map(|class| class.id()), Some(classes.linear.id()));
    // Metadata is memoized.
    assert!(Arc::ptr_eq(&meta, &classes.linear.record_metadata(false).unwrap()));
}

#[test]
fn synthesized_record_does_not_keep_class_alive() {
    let class = ClassDef::builder("Scale")
        .param("factor", Ty::float())
        .constructor(|mut args: Args| Ok(args.take::<f64>("factor")?));
    let ty = Ty::class_config(&class).unwrap();
    let value = crate::load(&ty, &json!({ "factor": 2 })).unwrap();
    let record = value.as_record().unwrap();
    assert_eq!(record.build_as::<f64>().unwrap(), 2.0);
    assert_eq!(Arc::strong_count(&class), 2);

    let weak = Arc::downgrade(&class);
    drop(ty);
    drop(class);
    assert!(weak.upgrade().is_none());
    // The loaded record outlives its class, but can no longer be built.
    assert!(record.class().is_none());
    let err = record.build().unwrap_err();
    assert!(err.to_string().contains("not bound to a class"), "{err}");
}

#[test]
fn inheritance_requires_var_keyword() {
    let classes = ModelClasses::new();
    let gated = classes.gated.record_metadata(false).unwrap();
    let names: Vec<_> = gated.fields().iter().map(|field| field.name.as_str()).collect();
    assert_eq!(names, ["gate"]);
    let gated = classes.gated.record_metadata(true).unwrap();
    let names: Vec<_> = gated.fields().iter().map(|field| field.name.as_str()).collect();
    assert_eq!(names, ["gate", "inputs", "outputs", "bias"]);

    // `Linear` doesn't accept keyword params, so inheritance is a no-op.
    let linear = classes.linear.record_metadata(true).unwrap();
    assert_eq!(linear.fields().len(), 3);
}

#[test]
fn inherited_params_with_same_type_are_merged() {
    let base = ClassDef::builder("Base")
        .param("size", Ty::int())
        .param_with_default("name", Ty::str(), "base")
        .build();
    let child = ClassDef::builder("Child")
        .extends(&base)
        .param_with_default("size", Ty::int(), 8)
        .var_keyword("kwargs")
        .build();
    let meta = child.record_metadata(true).unwrap();
    let fields: Vec<_> = meta
        .fields()
        .iter()
        .map(|field| (field.name.as_str(), field.default.clone()))
        .collect();
    // The subclass declaration wins.
    assert_eq!(fields, [("size", Some(json!(8))), ("name", Some(json!("base")))]);
}

#[test]
fn inherited_params_with_conflicting_types() {
    let base = ClassDef::builder("Base").param("size", Ty::int()).build();
    let child = ClassDef::builder("Child")
        .extends(&base)
        .param("size", Ty::str())
        .var_keyword("kwargs")
        .build();
    let err = child.record_metadata(true).unwrap_err();
    assert_eq!(
        err.message(),
        "`Base::size`: param type int conflicts with the type str declared by a subclass"
    );
    // Without inheritance, the record is fine.
    child.record_metadata(false).unwrap();
}

#[test]
fn unsupported_signatures() {
    let class = ClassDef::builder("Variadic")
        .param("size", Ty::int())
        .var_positional("args")
        .build();
    let err = class.record_metadata(false).unwrap_err();
    assert_eq!(
        err.message(),
        "`Variadic::args`: variadic positional params are not supported"
    );
    let err = Ty::class_config(&class).unwrap_err();
    assert!(err.message().contains("variadic positional"), "{err}");

    let class = ClassDef::builder("Untyped").untyped_param("size").build();
    let err = class.record_metadata(false).unwrap_err();
    assert_eq!(err.message(), "`Untyped::size`: param type must be specified");

    // Schema errors surface on load as well.
    let registry = ClassRegistry::new("test");
    registry.register(&class).unwrap();
    let err = crate::load(&Ty::registry(&registry), &json!({ "type": "Untyped" })).unwrap_err();
    assert!(err.as_schema().is_some(), "{err:?}");
}

#[test]
fn constructing_instances() {
    let classes = ModelClasses::new();
    let args = Args::default()
        .with("inputs", TypedValue::Int(2))
        .with("outputs", TypedValue::Int(3))
        .with("bias", TypedValue::Bool(false));
    let instance = classes.linear.construct(args.clone()).unwrap();
    assert!(instance.is::<Layer>());
    assert!(instance.type_name().ends_with("Layer"));

    let err = classes.linear.construct_as::<String>(args).unwrap_err();
    assert!(err.to_string().contains("cannot be downcast"), "{err}");

    let err = classes.module.construct(Args::default()).unwrap_err();
    assert_eq!(err.to_string(), "class `Module` cannot be constructed");

    let mut args = Args::default().with("inputs", TypedValue::Str("2".into()));
    let err = args.take::<i64>("inputs").unwrap_err();
    assert_eq!(err.to_string(), "invalid argument `inputs`");
    let err = args.take::<i64>("inputs").unwrap_err();
    assert_eq!(err.to_string(), "missing argument `inputs`");
    assert_eq!(args.take_opt::<i64>("outputs").unwrap(), None);
}

#[test]
fn args_override_existing_values() {
    let mut args: Args = [
        ("a".to_owned(), TypedValue::Int(1)),
        ("b".to_owned(), TypedValue::Int(2)),
    ]
    .into_iter()
    .collect();
    args.extend([("a".to_owned(), TypedValue::Int(3))]);
    assert_eq!(args.len(), 2);
    assert_eq!(args.get("a"), Some(&TypedValue::Int(3)));
    assert_eq!(args.names().collect::<Vec<_>>(), ["a", "b"]);
}

#[test]
fn registering_classes() {
    let classes = ModelClasses::new();
    let registry = ClassRegistry::new("layers");
    assert!(registry.is_empty());
    registry.register(&classes.linear).unwrap();
    registry
        .register_as(["conv", "conv2d"], &classes.conv, RegisterOptions::new())
        .unwrap();
    assert_eq!(registry.names(), ["Linear", "conv", "conv2d"]);
    assert!(registry.contains("conv2d"));
    assert!(registry.contains_class(&classes.conv));
    assert!(!registry.contains_class(&classes.gated));

    let conv = registry.lookup("conv2d").unwrap();
    assert_eq!(conv.id(), classes.conv.id());
    assert!(registry.lookup("Conv").is_none(), "lookups are case-sensitive");
    assert_eq!(registry.reverse_lookup(&classes.linear).unwrap(), "Linear");
}

#[test]
fn duplicate_registrations() {
    let classes = ModelClasses::new();
    let registry = ClassRegistry::new("layers");
    registry.register_as(["layer"], &classes.linear, RegisterOptions::new()).unwrap();

    let err = registry
        .register_as(["other", "layer"], &classes.conv, RegisterOptions::new())
        .unwrap_err();
    assert_matches!(err, RegistryError::AlreadyRegistered { name, .. } if name == "layer");
    // Registration is atomic.
    assert!(!registry.contains("other"));

    let err = registry
        .register_as(["x", "x"], &classes.conv, RegisterOptions::new())
        .unwrap_err();
    assert_eq!(err.to_string(), "`x` is already registered in `layers`");

    registry
        .register_as(["layer"], &classes.conv, RegisterOptions::new().overwrite())
        .unwrap();
    assert_eq!(registry.lookup("layer").unwrap().name(), "Conv");
    assert_eq!(registry.len(), 1);
}

#[test]
fn unregistering_classes() {
    let classes = ModelClasses::new();
    let registry = ClassRegistry::new("layers");
    let options = RegisterOptions::new();
    registry.register_as(["a", "b"], &classes.linear, options).unwrap();
    registry.register_as(["c"], &classes.conv, options).unwrap();

    registry.unregister("a").unwrap();
    assert_eq!(registry.names(), ["b", "c"]);
    registry.unregister(&classes.linear).unwrap();
    assert_eq!(registry.names(), ["c"]);

    let err = registry.unregister("a").unwrap_err();
    assert_eq!(err.to_string(), "`a` is not registered in `layers`");
    let err = registry.unregister(&classes.linear).unwrap_err();
    assert_eq!(err.to_string(), "class `Linear` is not registered in `layers`");
}

#[test]
fn reverse_lookup_errors() {
    let classes = ModelClasses::new();
    let registry = ClassRegistry::new("layers");
    registry
        .register_as(["a", "b"], &classes.linear, RegisterOptions::new())
        .unwrap();
    let err = registry.reverse_lookup(&classes.linear).unwrap_err();
    assert_matches!(&err, RegistryError::AmbiguousNames { names, .. } if *names == ["a", "b"]);
    assert_eq!(
        err.to_string(),
        "class `Linear` is registered in `layers` under multiple names: a, b"
    );

    let err = registry.reverse_lookup(&classes.conv).unwrap_err();
    assert_matches!(err, RegistryError::NotRegistered { .. });
}

#[test]
fn sealed_registry() {
    let classes = ModelClasses::new();
    let registry = classes.registry();
    registry.seal();
    assert!(registry.is_sealed());

    let err = registry.register(&classes.module).unwrap_err();
    assert_eq!(err, RegistryError::Sealed { registry: "layers".to_owned() });
    registry.unregister("conv").unwrap_err();
    // Lookups still work.
    assert!(registry.lookup("conv").is_some());
}

#[test]
fn loading_configs_by_name() {
    let classes = ModelClasses::new();
    let registry = classes.registry();
    let config = registry
        .load_config("gated", &json!({ "inputs": 2, "outputs": 2 }))
        .unwrap();
    assert_eq!(config.get("gate"), Some(&TypedValue::Float(0.5)));

    let instance = registry
        .build_from_name("conv", &json!({ "channels": 1, "kernel": 5 }))
        .unwrap();
    assert_eq!(
        instance.downcast_ref::<Layer>(),
        Some(&Layer::Conv { channels: 1, kernel: 5 })
    );

    let err = registry.load_config("rnn", &json!({})).unwrap_err();
    let err = err.as_validation().unwrap();
    assert_matches!(err.kind(), ErrorKind::UnknownClass { name } if name == "rnn");
    // The discriminator is not expected here.
    registry
        .load_config("conv", &json!({ "type": "conv", "channels": 1 }))
        .unwrap_err();
}

#[test]
fn catalog_insertion() {
    let classes = ModelClasses::new();
    let catalog = classes.catalog();
    catalog.insert(&classes.linear).unwrap();
    assert_eq!(catalog.get("nn::Linear").unwrap().id(), classes.linear.id());
    assert!(catalog.get("Linear").is_none());

    let impostor = ClassDef::builder("Linear").module("nn").build();
    let err = catalog.insert(&impostor).unwrap_err();
    assert_eq!(err, ResolveError::DuplicatePath("nn::Linear".to_owned()));

    let subclasses: Vec<_> = catalog
        .subclasses_of(&classes.module)
        .iter()
        .map(|class| class.name().to_owned())
        .collect();
    assert_eq!(subclasses, ["Linear", "GatedLinear", "Conv"]);
    assert_eq!(catalog.subclasses_of(&classes.linear).len(), 1);
}

#[test]
fn resolving_subclasses() {
    let classes = ModelClasses::new();
    let catalog = classes.catalog();
    let module = &classes.module;

    let resolved = catalog.resolve_subclass(module, "GatedLinear").unwrap();
    assert_eq!(resolved.id(), classes.gated.id());
    let resolved = catalog.resolve_subclass(module, "conv").unwrap();
    assert_eq!(resolved.id(), classes.conv.id());
    let resolved = catalog.resolve_subclass(module, "nn.conv::Conv").unwrap();
    assert_eq!(resolved.id(), classes.conv.id());

    let err = catalog.resolve_subclass(module, "Module").unwrap_err();
    assert_matches!(err, ResolveError::NotFound { .. });
    let err = catalog.resolve_subclass(&classes.linear, "conv").unwrap_err();
    assert_eq!(
        err.to_string(),
        "`conv` is not found among subclasses of `Linear` and is not a known class path"
    );
    let err = catalog
        .resolve_subclass(&classes.conv, "nn::Linear")
        .unwrap_err();
    assert_matches!(err, ResolveError::NotSubclass { .. });
}

#[test]
fn ambiguous_subclass_names() {
    let classes = ModelClasses::new();
    let catalog = classes.catalog();
    let other_linear = ClassDef::builder("Linear")
        .module("nn.quantized")
        .extends(&classes.module)
        .build();
    catalog.insert(&other_linear).unwrap();

    let err = catalog.resolve_subclass(&classes.module, "Linear").unwrap_err();
    assert_matches!(
        &err,
        ResolveError::Ambiguous { candidates, .. }
            if *candidates == ["nn::Linear", "nn.quantized::Linear"]
    );
    // Qualified paths are unambiguous.
    let resolved = catalog
        .resolve_subclass(&classes.module, "nn.quantized::Linear")
        .unwrap();
    assert_eq!(resolved.id(), other_linear.id());
    assert_eq!(
        catalog.discriminator_for(&classes.module, &other_linear).unwrap(),
        "nn.quantized::Linear"
    );
}

#[test]
fn discriminators() {
    let classes = ModelClasses::new();
    let catalog = classes.catalog();
    assert_eq!(
        catalog.discriminator_for(&classes.module, &classes.conv).unwrap(),
        "conv"
    );
    assert_eq!(
        catalog.discriminator_for(&classes.module, &classes.linear).unwrap(),
        "nn::Linear"
    );

    // A class missing from the catalog cannot be resolved back.
    let stray = ClassDef::builder("Stray").module("nn").extends(&classes.module).build();
    let err = catalog.discriminator_for(&classes.module, &stray).unwrap_err();
    assert_eq!(
        err,
        ResolveError::NotReconstructible {
            class: "Stray".to_owned(),
            path: "nn::Stray".to_owned(),
        }
    );
}
