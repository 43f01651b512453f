//! `DescribeRecord` derive macro implementation.

use proc_macro::TokenStream;
use proc_macro2::Ident;
use quote::{quote, quote_spanned};
use syn::{Attribute, Data, DeriveInput, Expr, Field, Fields, LitStr, Type, spanned::Spanned};

use crate::utils::{ContainerAttrs, is_option, parse_docs, reject_generics};

enum DefaultValue {
    DefaultTrait,
    Expr(Expr),
}

struct FieldAttrs {
    rename: Option<LitStr>,
    default: Option<DefaultValue>,
    ty: Option<Expr>,
}

impl FieldAttrs {
    fn new(attrs: &[Attribute]) -> syn::Result<Self> {
        let config_attrs = attrs.iter().filter(|attr| attr.path().is_ident("config"));

        let mut rename = None;
        let mut default = None;
        let mut ty = None;
        for attr in config_attrs {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("rename") {
                    rename = Some(meta.value()?.parse()?);
                    Ok(())
                } else if meta.path.is_ident("default") {
                    default = Some(if meta.input.peek(syn::Token![=]) {
                        DefaultValue::Expr(meta.value()?.parse()?)
                    } else {
                        DefaultValue::DefaultTrait
                    });
                    Ok(())
                } else if meta.path.is_ident("default_t") {
                    default = Some(DefaultValue::Expr(meta.value()?.parse()?));
                    Ok(())
                } else if meta.path.is_ident("ty") {
                    ty = Some(meta.value()?.parse()?);
                    Ok(())
                } else {
                    Err(meta.error(
                        "Unsupported attribute; only `rename`, `default`, `default_t` and `ty` are supported",
                    ))
                }
            })?;
        }
        Ok(Self {
            rename,
            default,
            ty,
        })
    }
}

struct RecordField {
    attrs: FieldAttrs,
    name: Ident,
    ty: Type,
    docs: String,
}

impl RecordField {
    fn new(raw: &Field) -> syn::Result<Self> {
        let name = raw.ident.clone().ok_or_else(|| {
            let message = "Only named fields are supported";
            syn::Error::new_spanned(raw, message)
        })?;
        Ok(Self {
            attrs: FieldAttrs::new(&raw.attrs)?,
            name,
            ty: raw.ty.clone(),
            docs: parse_docs(&raw.attrs),
        })
    }

    fn param_name(&self) -> String {
        self.attrs
            .rename
            .as_ref()
            .map_or_else(|| self.name.to_string(), LitStr::value)
    }

    fn default_value(&self) -> Option<proc_macro2::TokenStream> {
        let ty = &self.ty;
        let span = self.name.span();
        match &self.attrs.default {
            None if !is_option(ty) => None,
            Some(DefaultValue::DefaultTrait) | None => Some(quote_spanned! {span=>
                <#ty as ::core::default::Default>::default()
            }),
            Some(DefaultValue::Expr(expr)) => Some(quote!(#expr)),
        }
    }

    fn describe(&self, cr: &proc_macro2::TokenStream, record_name: &str) -> proc_macro2::TokenStream {
        let ty = &self.ty;
        let span = self.name.span();
        let param_name = self.param_name();
        let help = &self.docs;

        let ty_expr = if let Some(expr) = &self.attrs.ty {
            quote_spanned!(expr.span()=> #expr)
        } else {
            quote_spanned!(ty.span()=> <#ty as #cr::Describe>::ty())
        };
        let with_default = self.default_value().map(|value| {
            // The type param is specified explicitly so that literals are inferred as the field type.
            quote_spanned! {span=>
                let field = field.with_default(#cr::metadata::_private::default_plain::<#ty>(
                    &ty,
                    &(#value),
                    #record_name,
                    #param_name,
                ));
            }
        });

        quote_spanned! {span=> {
            let ty: #cr::Ty = #ty_expr;
            let field = #cr::FieldMetadata::new(#param_name, ::core::clone::Clone::clone(&ty))
                .with_help(#help);
            #with_default
            field
        }}
    }
}

struct DescribeRecordImpl {
    attrs: ContainerAttrs,
    name: Ident,
    help: String,
    fields: Vec<RecordField>,
}

impl DescribeRecordImpl {
    fn new(raw: &DeriveInput) -> syn::Result<Self> {
        let Data::Struct(data) = &raw.data else {
            let message = "#[derive(DescribeRecord)] can only be placed on structs";
            return Err(syn::Error::new_spanned(raw, message));
        };
        if !matches!(data.fields, Fields::Named(_) | Fields::Unit) {
            let message = "#[derive(DescribeRecord)] can only be placed on structs with named fields";
            return Err(syn::Error::new_spanned(&data.fields, message));
        }
        reject_generics(raw)?;

        let attrs = ContainerAttrs::new(&raw.attrs, true)?;
        let fields: Vec<_> = data
            .fields
            .iter()
            .map(RecordField::new)
            .collect::<syn::Result<_>>()?;
        for (i, field) in fields.iter().enumerate() {
            let param_name = field.param_name();
            if fields[..i].iter().any(|prev| prev.param_name() == param_name) {
                let message = format!("duplicate field name `{param_name}`");
                return Err(syn::Error::new(field.name.span(), message));
            }
        }

        Ok(Self {
            attrs,
            name: raw.ident.clone(),
            help: parse_docs(&raw.attrs),
            fields,
        })
    }

    fn record_name(&self) -> String {
        self.attrs
            .rename
            .as_ref()
            .map_or_else(|| self.name.to_string(), LitStr::value)
    }

    fn derive_describe(&self, cr: &proc_macro2::TokenStream) -> proc_macro2::TokenStream {
        let name = &self.name;
        let record_name = self.record_name();
        let help = &self.help;
        let fields = self
            .fields
            .iter()
            .map(|field| field.describe(cr, &record_name));
        let validations = self.attrs.validations.iter().map(|validation| {
            let wrapped = validation.wrap(cr);
            quote! {
                let builder = builder.validate(
                    #cr::validation::_private::TypedValidation::<Self, _>::new(#wrapped),
                );
            }
        });

        quote! {
            impl #cr::Describe for #name {
                fn ty() -> #cr::Ty {
                    #cr::Ty::Record(<Self as #cr::DescribeRecord>::metadata())
                }
            }

            impl #cr::DescribeRecord for #name {
                fn metadata() -> ::std::sync::Arc<#cr::RecordMetadata> {
                    static METADATA_CELL: ::std::sync::OnceLock<::std::sync::Arc<#cr::RecordMetadata>> =
                        ::std::sync::OnceLock::new();
                    let metadata = METADATA_CELL.get_or_init(|| {
                        let builder = #cr::RecordMetadata::builder(#record_name).help(#help);
                        #(let builder = builder.push_field(#fields);)*
                        #(#validations)*
                        #cr::metadata::_private::finish_record(builder.build())
                    });
                    ::std::sync::Arc::clone(metadata)
                }
            }
        }
    }

    fn derive_conversions(&self, cr: &proc_macro2::TokenStream) -> proc_macro2::TokenStream {
        let name = &self.name;
        let field_names: Vec<_> = self.fields.iter().map(|field| &field.name).collect();
        let param_names = self.fields.iter().map(RecordField::param_name);

        quote! {
            impl #cr::FromTyped for #name {
                fn from_typed(value: #cr::TypedValue) -> ::core::result::Result<Self, #cr::ValidationError> {
                    let metadata = <Self as #cr::DescribeRecord>::metadata();
                    #[allow(unused_mut, unused_variables)]
                    let mut record = #cr::metadata::_private::expect_record(value, &metadata)?;
                    ::core::result::Result::Ok(Self {
                        #(#field_names: record.take_field(#param_names)?,)*
                    })
                }
            }

            impl #cr::ToTyped for #name {
                fn to_typed(&self) -> ::core::result::Result<#cr::TypedValue, #cr::ValidationError> {
                    let metadata = <Self as #cr::DescribeRecord>::metadata();
                    let values = ::std::vec![
                        #(#cr::ToTyped::to_typed(&self.#field_names)?,)*
                    ];
                    ::core::result::Result::Ok(#cr::TypedValue::Record(
                        #cr::Record::from_values(metadata, values),
                    ))
                }
            }
        }
    }

    fn derive(&self) -> proc_macro2::TokenStream {
        let cr = self.attrs.cr(self.name.span());
        let describe = self.derive_describe(&cr);
        let conversions = self.derive_conversions(&cr);
        quote! {
            #describe
            #conversions
        }
    }
}

pub(crate) fn impl_describe_record(input: TokenStream) -> TokenStream {
    let input: DeriveInput = match syn::parse(input) {
        Ok(input) => input,
        Err(err) => return err.into_compile_error().into(),
    };
    let trait_impl = match DescribeRecordImpl::new(&input) {
        Ok(trait_impl) => trait_impl,
        Err(err) => return err.into_compile_error().into(),
    };
    trait_impl.derive().into()
}
