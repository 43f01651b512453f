//! Miscellaneous utils.

use quote::{quote, quote_spanned};
use syn::{
    Attribute, DeriveInput, Expr, Lit, LitStr, Path, PathArguments, Type, TypePath,
    spanned::Spanned,
};

pub(crate) fn parse_docs(attrs: &[Attribute]) -> String {
    let doc_lines = attrs.iter().filter_map(|attr| {
        if attr.meta.path().is_ident("doc") {
            let name_value = attr.meta.require_name_value().ok()?;
            let Expr::Lit(doc_literal) = &name_value.value else {
                return None;
            };
            match &doc_literal.lit {
                Lit::Str(doc_literal) => Some(doc_literal.value()),
                _ => None,
            }
        } else {
            None
        }
    });

    let mut docs = String::new();
    for line in doc_lines {
        let line = line.trim();
        if line.is_empty() {
            if !docs.is_empty() {
                // New paragraph; convert it to a new line.
                docs.push('\n');
            }
        } else {
            if !docs.is_empty() && !docs.ends_with(|ch: char| ch.is_ascii_whitespace()) {
                docs.push(' ');
            }
            docs.push_str(line);
        }
    }
    docs
}

pub(crate) fn is_option(ty: &Type) -> bool {
    let Type::Path(TypePath { path, qself: None }) = ty else {
        return false;
    };
    let Some(segment) = path.segments.last() else {
        return false;
    };
    if segment.ident != "Option" {
        return false;
    }
    let PathArguments::AngleBracketed(angle_bracketed) = &segment.arguments else {
        return false;
    };
    angle_bracketed.args.len() == 1
}

pub(crate) fn reject_generics(raw: &DeriveInput) -> syn::Result<()> {
    if raw.generics.type_params().count() != 0
        || raw.generics.const_params().count() != 0
        || raw.generics.lifetimes().count() != 0
    {
        let message = "generics are not supported";
        return Err(syn::Error::new_spanned(&raw.generics, message));
    }
    Ok(())
}

/// Container attributes shared by all derive macros.
pub(crate) struct ContainerAttrs {
    pub(crate) cr: Option<Path>,
    pub(crate) rename: Option<LitStr>,
    pub(crate) validations: Vec<Validation>,
}

pub(crate) struct Validation {
    pub(crate) expr: Expr,
    pub(crate) description: Option<LitStr>,
}

impl ContainerAttrs {
    pub(crate) fn new(attrs: &[Attribute], allow_validations: bool) -> syn::Result<Self> {
        let config_attrs = attrs.iter().filter(|attr| attr.path().is_ident("config"));

        let mut cr = None;
        let mut rename = None;
        let mut validations = vec![];
        for attr in config_attrs {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("crate") {
                    cr = Some(meta.value()?.parse()?);
                    Ok(())
                } else if meta.path.is_ident("rename") {
                    rename = Some(meta.value()?.parse()?);
                    Ok(())
                } else if allow_validations && meta.path.is_ident("validate") {
                    let content;
                    syn::parenthesized!(content in meta.input);
                    let expr: Expr = content.parse()?;
                    let description = if content.is_empty() {
                        None
                    } else {
                        content.parse::<syn::Token![,]>()?;
                        let description: LitStr = content.parse()?;
                        if !content.is_empty() {
                            content.parse::<syn::Token![,]>()?;
                        }
                        Some(description)
                    };
                    validations.push(Validation { expr, description });
                    Ok(())
                } else if allow_validations {
                    Err(meta.error(
                        "Unsupported attribute; only `crate`, `rename` and `validate` are supported",
                    ))
                } else {
                    Err(meta.error("Unsupported attribute; only `crate` and `rename` are supported"))
                }
            })?;
        }
        Ok(Self {
            cr,
            rename,
            validations,
        })
    }

    /// Returns the path to the main crate.
    pub(crate) fn cr(&self, span: proc_macro2::Span) -> proc_macro2::TokenStream {
        if let Some(cr) = &self.cr {
            quote!(#cr)
        } else {
            quote_spanned!(span=> ::tyconf)
        }
    }
}

impl Validation {
    pub(crate) fn wrap(&self, cr: &proc_macro2::TokenStream) -> proc_macro2::TokenStream {
        let expr = &self.expr;
        let description = if let Some(description) = &self.description {
            quote!(#description)
        } else {
            quote!(::core::stringify!(#expr))
        };
        quote_spanned! {expr.span()=>
            #cr::validation::_private::WithDescription::new(#expr, #description)
        }
    }
}
