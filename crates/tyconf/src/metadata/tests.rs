//! Tests for metadata.

use assert_matches::assert_matches;
use serde_json::json;

use super::*;
use crate::{
    Describe, DescribeEnum, DescribeRecord,
    class::ClassRegistry,
    testonly::{ModelClasses, OptimizerConfig, OptimizerKind, TrainerConfig},
};

#[test]
fn displaying_types() {
    let ty = Ty::union([
        Ty::list(Ty::int()),
        Ty::dict(Ty::str(), Ty::optional(Ty::float())),
        Ty::tuple([Ty::bool(), Ty::Path]),
        Ty::Any,
        Ty::None,
    ]);
    assert_eq!(
        ty.to_string(),
        "Union[List[int], Dict[str, Optional[float]], Tuple[bool, Path], Any, None]"
    );

    let classes = ModelClasses::new();
    let ty = Ty::class_config(&classes.linear).unwrap();
    assert_eq!(ty.to_string(), "ClassConfig[Linear]");
    let ty = Ty::subclass(&classes.module, &classes.catalog());
    assert_eq!(ty.to_string(), "SubclassConfig[Module]");
    let ty = Ty::registry(&ClassRegistry::new("optimizers"));
    assert_eq!(ty.to_string(), "RegistryConfig[optimizers]");
    assert_eq!(TrainerConfig::ty().to_string(), "TrainerConfig");
    assert_eq!(Ty::opaque("Duration", [Ty::int()]).to_string(), "Duration[int]");
}

#[test]
fn optional_types() {
    let ty = Ty::optional(Ty::int());
    assert_eq!(ty.as_optional(), Some(&Ty::int()));
    let ty = Ty::union([Ty::str(), Ty::None]);
    assert_eq!(ty.as_optional(), Some(&Ty::str()));
    let ty = Ty::union([Ty::None, Ty::str()]);
    assert_eq!(ty.as_optional(), None);
    let ty = Ty::union([Ty::str(), Ty::int(), Ty::None]);
    assert_eq!(ty.as_optional(), None);

    let ty = Ty::optional(Ty::union([Ty::list(Ty::int()), Ty::None]));
    assert_eq!(ty.strip_optional(), &Ty::list(Ty::int()));
}

#[test]
fn structural_checks() {
    let ty = Ty::list(Ty::optional(Ty::int()));
    let value = TypedValue::List(vec![TypedValue::Int(1), TypedValue::Null]);
    ty.check(&value).unwrap();

    let value = TypedValue::List(vec![TypedValue::Str("1".into())]);
    let err = ty.check(&value).unwrap_err();
    assert_eq!(*err.kind(), crate::ErrorKind::TypeMismatch);
    assert_eq!(err.message(), "expected value of type List[Optional[int]], found list");

    let ty = Ty::tuple([Ty::int(), Ty::str()]);
    ty.check(&TypedValue::Tuple(vec![TypedValue::Int(1)]))
        .unwrap_err();
    Ty::Any.check(&TypedValue::Float(1.0)).unwrap();
}

#[test]
fn record_checks_use_identity() {
    let first = RecordMetadata::builder("Point")
        .field("x", Ty::int())
        .build()
        .unwrap();
    let second = RecordMetadata::builder("Point")
        .field("x", Ty::int())
        .build()
        .unwrap();
    assert_ne!(*first, *second);

    let record = Record::from_fields(&first, [("x", TypedValue::Int(1))]).unwrap();
    let value = TypedValue::Record(record);
    Ty::Record(first).check(&value).unwrap();
    Ty::Record(second).check(&value).unwrap_err();
}

#[test]
fn enum_metadata_errors() {
    let err = EnumMetadata::new("Empty", Vec::<(&str, Plain)>::new()).unwrap_err();
    assert_eq!(err.message(), "enum `Empty` has no members");

    let err = EnumMetadata::new("Kind", [("a", json!(1)), ("a", json!(2))]).unwrap_err();
    assert_eq!(err.message(), "duplicate member `a` in enum `Kind`");

    let err = EnumMetadata::new("Kind", [("a", json!(1)), ("b", json!(1))]).unwrap_err();
    assert_eq!(err.message(), "duplicate value 1 in enum `Kind`");

    let meta = EnumMetadata::new("Kind", [("a", json!("x")), ("b", json!(2))]).unwrap();
    assert_eq!(meta.index_of_value(&json!(2)), Some(1));
    assert_eq!(meta.index_of_value(&json!("a")), None);
    assert_eq!(meta.index_of_name("a"), Some(0));
}

#[test]
fn record_builder_errors() {
    let err = RecordMetadata::builder("Test")
        .field("x", Ty::int())
        .field("x", Ty::str())
        .build()
        .unwrap_err();
    assert_eq!(err.message(), "duplicate field `x` in record `Test`");

    let err = RecordMetadata::builder("Test")
        .field("_meta", Ty::Any)
        .build()
        .unwrap_err();
    assert_eq!(err.message(), "field name `_meta` in record `Test` is reserved");
}

#[test]
fn derived_record_metadata() {
    let meta = <TrainerConfig as DescribeRecord>::metadata();
    assert_eq!(meta.name(), "TrainerConfig");
    assert_eq!(meta.help(), "");
    assert_eq!(meta.validations().len(), 1);
    assert_eq!(
        meta.validations()[0].to_string(),
        "warmup must not exceed the number of epochs"
    );
    // Metadata is cached.
    assert!(Arc::ptr_eq(&meta, &<TrainerConfig as DescribeRecord>::metadata()));

    let field_names: Vec<_> = meta.fields().iter().map(|field| field.name.as_str()).collect();
    assert_eq!(
        field_names,
        ["epochs", "warmup", "optimizer", "layers", "labels", "output_dir"]
    );

    let epochs = meta.field("epochs").unwrap();
    assert_eq!(epochs.ty, Ty::int());
    assert_eq!(epochs.default, None);
    assert_eq!(epochs.help, "Number of epochs.");

    let warmup = meta.field("warmup").unwrap();
    assert_eq!(warmup.default, Some(json!(0)));
    let labels = meta.field("labels").unwrap();
    assert_eq!(labels.ty, Ty::dict(Ty::str(), Ty::str()));
    assert_eq!(labels.default, Some(json!({})));
    let output_dir = meta.field("output_dir").unwrap();
    assert_eq!(output_dir.ty, Ty::optional(Ty::Path));
    assert_eq!(output_dir.default, Some(Plain::Null));

    let optimizer = meta.field("optimizer").unwrap();
    let Ty::Record(optimizer_meta) = &optimizer.ty else {
        panic!("unexpected optimizer type: {:?}", optimizer.ty);
    };
    assert_eq!(**optimizer_meta, *<OptimizerConfig as DescribeRecord>::metadata());
    assert_eq!(optimizer_meta.help(), "Optimizer settings.");
    let lr = optimizer_meta.field("lr").unwrap();
    assert_eq!(lr.default, Some(json!(0.01)));
    assert_eq!(lr.help, "Learning rate.");
}

#[test]
fn derived_enum_metadata() {
    let meta = <OptimizerKind as DescribeEnum>::metadata();
    assert_eq!(meta.name(), "OptimizerKind");
    let members: Vec<_> = meta
        .members()
        .iter()
        .map(|member| (member.name.as_str(), member.value.clone()))
        .collect();
    assert_eq!(members, [("Sgd", json!("sgd")), ("Adam", json!("adam"))]);
    assert_matches!(OptimizerKind::ty(), Ty::Enum(meta) if meta.name() == "OptimizerKind");
}

#[test]
fn class_config_type_equality() {
    let classes = ModelClasses::new();
    let linear = Ty::class_config(&classes.linear).unwrap();
    assert_eq!(linear, Ty::class_config(&classes.linear).unwrap());
    assert_ne!(linear, Ty::class_config(&classes.conv).unwrap());

    let catalog = classes.catalog();
    assert_eq!(
        Ty::subclass(&classes.module, &catalog),
        Ty::subclass(&classes.module, &catalog)
    );
    assert_ne!(
        Ty::subclass(&classes.module, &catalog),
        Ty::subclass(&classes.module, &classes.catalog())
    );
}
