//! Procedural macros for `tyconf`.
//!
//! All macros in this crate are re-exported from the `tyconf` crate. See its docs for more details
//! and the examples of usage.

// General settings
#![recursion_limit = "128"]
// Linter settings
#![allow(missing_docs)] // Adding docs here would interfere with docs in the main crate

extern crate proc_macro;

use proc_macro::TokenStream;

mod enumeration;
mod record;
mod utils;

#[proc_macro_derive(DescribeRecord, attributes(config))]
pub fn describe_record(input: TokenStream) -> TokenStream {
    record::impl_describe_record(input)
}

#[proc_macro_derive(DescribeEnum, attributes(config))]
pub fn describe_enum(input: TokenStream) -> TokenStream {
    enumeration::impl_describe_enum(input)
}
