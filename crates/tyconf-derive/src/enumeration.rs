//! `DescribeEnum` derive macro implementation.

use proc_macro::TokenStream;
use proc_macro2::Ident;
use quote::{quote, quote_spanned};
use syn::{Attribute, Data, DeriveInput, Expr, Fields, LitStr, Variant, spanned::Spanned};

use crate::utils::{ContainerAttrs, reject_generics};

enum RawValue {
    Rename(LitStr),
    Expr(Expr),
}

struct EnumVariant {
    name: Ident,
    value: Option<RawValue>,
}

impl EnumVariant {
    fn new(raw: &Variant) -> syn::Result<Self> {
        if !matches!(raw.fields, Fields::Unit) {
            let message = "Only unit variants are supported";
            return Err(syn::Error::new_spanned(raw, message));
        }
        if let Some((_, discriminant)) = &raw.discriminant {
            let message = "Explicit discriminants are not supported; use `#[config(value = ..)]` instead";
            return Err(syn::Error::new_spanned(discriminant, message));
        }

        Ok(Self {
            name: raw.ident.clone(),
            value: Self::parse_value(&raw.attrs)?,
        })
    }

    fn parse_value(attrs: &[Attribute]) -> syn::Result<Option<RawValue>> {
        let config_attrs = attrs.iter().filter(|attr| attr.path().is_ident("config"));

        let mut value = None;
        for attr in config_attrs {
            attr.parse_nested_meta(|meta| {
                let new_value = if meta.path.is_ident("rename") {
                    RawValue::Rename(meta.value()?.parse()?)
                } else if meta.path.is_ident("value") {
                    RawValue::Expr(meta.value()?.parse()?)
                } else {
                    return Err(meta.error("Unsupported attribute; only `rename` and `value` are supported"));
                };
                if value.is_some() {
                    return Err(meta.error("Raw value for the variant is already specified"));
                }
                value = Some(new_value);
                Ok(())
            })?;
        }
        Ok(value)
    }

    fn raw_value(&self, cr: &proc_macro2::TokenStream) -> proc_macro2::TokenStream {
        match &self.value {
            None => {
                let name = self.name.to_string();
                quote!(#cr::Plain::from(#name))
            }
            Some(RawValue::Rename(lit)) => quote_spanned!(lit.span()=> #cr::Plain::from(#lit)),
            Some(RawValue::Expr(expr)) => quote_spanned!(expr.span()=> #cr::Plain::from(#expr)),
        }
    }
}

struct DescribeEnumImpl {
    attrs: ContainerAttrs,
    name: Ident,
    variants: Vec<EnumVariant>,
}

impl DescribeEnumImpl {
    fn new(raw: &DeriveInput) -> syn::Result<Self> {
        let Data::Enum(data) = &raw.data else {
            let message = "#[derive(DescribeEnum)] can only be placed on enums";
            return Err(syn::Error::new_spanned(raw, message));
        };
        reject_generics(raw)?;
        if data.variants.is_empty() {
            let message = "#[derive(DescribeEnum)] requires at least one variant";
            return Err(syn::Error::new_spanned(raw, message));
        }

        let variants = data
            .variants
            .iter()
            .map(EnumVariant::new)
            .collect::<syn::Result<_>>()?;
        Ok(Self {
            attrs: ContainerAttrs::new(&raw.attrs, false)?,
            name: raw.ident.clone(),
            variants,
        })
    }

    fn derive(&self) -> proc_macro2::TokenStream {
        let cr = self.attrs.cr(self.name.span());
        let name = &self.name;
        let enum_name = self
            .attrs
            .rename
            .as_ref()
            .map_or_else(|| self.name.to_string(), LitStr::value);

        let members = self.variants.iter().map(|variant| {
            let variant_name = variant.name.to_string();
            let raw_value = variant.raw_value(&cr);
            quote!((#variant_name, #raw_value))
        });
        let variant_names: Vec<_> = self.variants.iter().map(|variant| &variant.name).collect();
        let indices: Vec<_> = (0..self.variants.len()).collect();

        quote! {
            impl #cr::Describe for #name {
                fn ty() -> #cr::Ty {
                    #cr::Ty::Enum(<Self as #cr::DescribeEnum>::metadata())
                }
            }

            impl #cr::DescribeEnum for #name {
                fn metadata() -> ::std::sync::Arc<#cr::EnumMetadata> {
                    static METADATA_CELL: ::std::sync::OnceLock<::std::sync::Arc<#cr::EnumMetadata>> =
                        ::std::sync::OnceLock::new();
                    let metadata = METADATA_CELL.get_or_init(|| {
                        let members: ::std::vec::Vec<(&str, #cr::Plain)> = ::std::vec![#(#members,)*];
                        #cr::metadata::_private::finish_enum(#cr::EnumMetadata::new(#enum_name, members))
                    });
                    ::std::sync::Arc::clone(metadata)
                }
            }

            impl #cr::FromTyped for #name {
                fn from_typed(value: #cr::TypedValue) -> ::core::result::Result<Self, #cr::ValidationError> {
                    let metadata = <Self as #cr::DescribeEnum>::metadata();
                    match #cr::metadata::_private::enum_index(&value, &metadata)? {
                        #(#indices => ::core::result::Result::Ok(Self::#variant_names),)*
                        index => ::core::result::Result::Err(#cr::ValidationError::custom(
                            ::core::format_args!("no member #{} in enum {}", index, #enum_name),
                        )),
                    }
                }
            }

            impl #cr::ToTyped for #name {
                fn to_typed(&self) -> ::core::result::Result<#cr::TypedValue, #cr::ValidationError> {
                    let metadata = <Self as #cr::DescribeEnum>::metadata();
                    let index: usize = match self {
                        #(Self::#variant_names => #indices,)*
                    };
                    #cr::metadata::_private::enum_value(&metadata, index)
                }
            }
        }
    }
}

pub(crate) fn impl_describe_enum(input: TokenStream) -> TokenStream {
    let input: DeriveInput = match syn::parse(input) {
        Ok(input) => input,
        Err(err) => return err.into_compile_error().into(),
    };
    let trait_impl = match DescribeEnumImpl::new(&input) {
        Ok(trait_impl) => trait_impl,
        Err(err) => return err.into_compile_error().into(),
    };
    trait_impl.derive().into()
}
