//! Derive macros for user-defined aggregate ("Composite") types.
//!
//! A `#[derive(Composite)]` struct becomes usable as a rendergraph value type:
//! the macro emits the `CompositeType` impl the IR needs to manipulate the
//! type without knowing its Rust layout (member names, `is_default`,
//! `format_to` — see `rendergraph::types::CompositeType`).

extern crate proc_macro;
extern crate proc_macro2;
#[macro_use]
extern crate quote;
extern crate darling;
extern crate syn;
#[macro_use]
extern crate log;

use darling::FromField;
use proc_macro::TokenStream;
use syn::{Data, DeriveInput, Fields};

/// Per-field options recognized inside `#[derive(Composite)]` structs.
///
/// `#[composite(default)]` marks a field that may be left unset by the
/// caller and filled in later from an aliased source (see
/// `TypeDesc::Composite::is_default`, spec.md §3).
#[derive(Debug, FromField, Default)]
#[darling(attributes(composite), default)]
struct FieldOpts {
    default: bool,
}

#[proc_macro_derive(Composite, attributes(composite))]
pub fn derive_composite(input: TokenStream) -> TokenStream {
    let ast: DeriveInput = syn::parse(input).expect("failed to parse derive input");
    let name = &ast.ident;

    let fields = match ast.data {
        Data::Struct(ref data) => match data.fields {
            Fields::Named(ref named) => &named.named,
            _ => panic!("#[derive(Composite)] only supports structs with named fields"),
        },
        _ => panic!("#[derive(Composite)] can only be applied to structs"),
    };

    let field_idents: Vec<_> = fields.iter().map(|f| f.ident.clone().unwrap()).collect();
    let field_names: Vec<_> = field_idents.iter().map(|i| i.to_string()).collect();
    let field_defaults: Vec<bool> = fields
        .iter()
        .map(|f| {
            FieldOpts::from_field(f)
                .unwrap_or_else(|_| FieldOpts::default())
                .default
        })
        .collect();
    let count = field_idents.len();

    let get_arms = field_idents.iter().enumerate().map(|(i, ident)| {
        quote! {
            #i => ::std::fmt::Debug::fmt(&self.#ident, f),
        }
    });

    let is_default_arms = field_idents.iter().enumerate().map(|(i, _)| {
        let is_default = field_defaults[i];
        quote! { #i => #is_default, }
    });

    let expanded = quote! {
        impl ::rendergraph::types::CompositeType for #name {
            const MEMBERS: &'static [::rendergraph::types::MemberDesc] = &[
                #(
                    ::rendergraph::types::MemberDesc {
                        name: #field_names,
                    }
                ),*
            ];

            fn member_count() -> usize {
                #count
            }

            fn is_default(index: usize) -> bool {
                match index {
                    #(#is_default_arms)*
                    _ => false,
                }
            }

            fn format_member_to(&self, index: usize, f: &mut ::std::fmt::Formatter) -> ::std::fmt::Result {
                match index {
                    #(#get_arms)*
                    _ => panic!("composite member index out of range"),
                }
            }
        }
    };

    trace!("derived Composite for {}", name);
    expanded.into()
}
