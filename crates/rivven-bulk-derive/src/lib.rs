//! Derive macro for rivven-bulk records
//!
//! `#[derive(BulkRecord)]` generates the static field-descriptor table for a
//! struct with named fields, in declaration order.
//!
//! # Example
//!
//! ```rust,ignore
//! use rivven_bulk::BulkRecord;
//!
//! #[derive(BulkRecord)]
//! #[bulk(name = "User")]
//! pub struct UserRow {
//!     pub id: i64,
//!     pub name: String,
//!     #[bulk(marker = "audit", marker = "computed")]
//!     pub modified_by: String,
//!     #[bulk(skip)]
//!     pub display_name: String,
//! }
//! ```

use darling::{ast, FromDeriveInput, FromField};
use proc_macro::TokenStream;
use quote::quote;
use syn::ext::IdentExt;
use syn::{parse_macro_input, DeriveInput};

/// Attributes on the record struct
#[derive(Debug, FromDeriveInput)]
#[darling(attributes(bulk), supports(struct_named))]
struct RecordAttrs {
    ident: syn::Ident,
    generics: syn::Generics,
    data: ast::Data<(), FieldAttrs>,
    /// Record name used in logs and errors (defaults to the struct name)
    #[darling(default)]
    name: Option<String>,
}

/// Attributes on one field
#[derive(Debug, FromField)]
#[darling(attributes(bulk))]
struct FieldAttrs {
    ident: Option<syn::Ident>,
    /// Never bulk load this field
    #[darling(default)]
    skip: bool,
    /// Marker kinds a caller may exclude at load time
    #[darling(multiple, rename = "marker")]
    markers: Vec<String>,
}

/// Derive `rivven_bulk::BulkRecord`
///
/// # Attributes
///
/// - `#[bulk(name = "...")]` on the struct - record name (defaults to the struct name)
/// - `#[bulk(skip)]` on a field - never loaded; the field type needs no `Value` conversion
/// - `#[bulk(marker = "...")]` on a field - attach a marker kind (repeatable)
///
/// Every other field needs `Clone + Into<rivven_bulk::Value>`.
#[proc_macro_derive(BulkRecord, attributes(bulk))]
pub fn derive_bulk_record(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    let attrs = match RecordAttrs::from_derive_input(&input) {
        Ok(v) => v,
        Err(e) => return TokenStream::from(e.write_errors()),
    };

    let struct_name = &attrs.ident;
    let record_name = attrs
        .name
        .clone()
        .unwrap_or_else(|| struct_name.unraw().to_string());
    let (impl_generics, ty_generics, where_clause) = attrs.generics.split_for_impl();

    let fields = match attrs.data.as_ref().take_struct() {
        Some(fields) => fields.fields,
        None => {
            return TokenStream::from(darling::Error::unsupported_shape("enum").write_errors())
        }
    };

    let descriptors = fields.iter().filter_map(|field| {
        let ident = field.ident.as_ref()?;
        let name = ident.unraw().to_string();

        let descriptor = if field.skip {
            quote! {
                ::rivven_bulk::FieldDescriptor::new(
                    #name,
                    |_: &Self| ::rivven_bulk::Value::Null,
                )
                .always_excluded()
            }
        } else {
            let markers = &field.markers;
            let markers_code = if markers.is_empty() {
                quote! {}
            } else {
                quote! { .with_markers(&[#(#markers),*]) }
            };
            quote! {
                ::rivven_bulk::FieldDescriptor::new(
                    #name,
                    |record: &Self| ::rivven_bulk::ToValue::to_value(&record.#ident),
                )
                #markers_code
            }
        };
        Some(descriptor)
    });

    let expanded = quote! {
        impl #impl_generics ::rivven_bulk::BulkRecord for #struct_name #ty_generics #where_clause {
            fn record_name() -> &'static str {
                #record_name
            }

            fn field_descriptors() -> ::std::vec::Vec<::rivven_bulk::FieldDescriptor<Self>> {
                ::std::vec![#(#descriptors),*]
            }
        }
    };

    TokenStream::from(expanded)
}
