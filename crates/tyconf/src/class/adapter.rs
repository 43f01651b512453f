//! Synthesizing records from constructor signatures.

use std::sync::Arc;

use super::{ClassDef, ParamKind};
use crate::{
    error::SchemaError,
    metadata::{FieldMetadata, RecordMetadata},
};

pub(super) fn synthesize_record(
    class: &ClassDef,
    inherit: bool,
) -> Result<Arc<RecordMetadata>, SchemaError> {
    let mut fields = Vec::with_capacity(class.params.len());
    collect_fields(class, &mut fields)?;
    if inherit && class.has_var_keyword() {
        // Parent params are reachable only while each class in the chain forwards its keyword params.
        for ancestor in class.ancestors() {
            collect_fields(ancestor, &mut fields)?;
            if !ancestor.has_var_keyword() {
                break;
            }
        }
    }
    tracing::debug!(
        class = %class.name,
        inherit,
        fields = ?fields.iter().map(|field| &field.name).collect::<Vec<_>>(),
        "synthesized record for class"
    );

    let mut builder = RecordMetadata::builder(&class.name)
        .help(&class.help)
        .class(class.this.clone());
    for field in fields {
        builder = builder.push_field(field);
    }
    builder.build()
}

fn collect_fields(class: &ClassDef, fields: &mut Vec<FieldMetadata>) -> Result<(), SchemaError> {
    for param in &class.params {
        match param.kind {
            ParamKind::Regular => { /* processed below */ }
            ParamKind::VarKeyword => continue,
            ParamKind::VarPositional => {
                return Err(SchemaError::new(format!(
                    "`{}::{}`: variadic positional params are not supported",
                    class.name, param.name
                )));
            }
        }

        let Some(ty) = &param.ty else {
            return Err(SchemaError::new(format!(
                "`{}::{}`: param type must be specified",
                class.name, param.name
            )));
        };
        if let Some(existing) = fields.iter().find(|field| field.name == param.name) {
            if existing.ty == *ty {
                continue;
            }
            return Err(SchemaError::new(format!(
                "`{}::{}`: param type {ty} conflicts with the type {} declared by a subclass",
                class.name, param.name, existing.ty
            )));
        }

        let mut field = FieldMetadata::new(&param.name, ty.clone()).with_help(&param.help);
        field.default.clone_from(&param.default);
        fields.push(field);
    }
    Ok(())
}
