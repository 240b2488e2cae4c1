//! Record derive macro implementation

mod attrs;

use crate::common::syn_types::{NestedSlot, is_optional, nested_slot, option_inner, vec_inner};
use attrs::{FieldRole, column_name, container_attr, field_attr};
use proc_macro2::TokenStream;
use quote::quote;
use syn::{Data, DeriveInput, Fields, Result};

pub fn expand(input: DeriveInput) -> Result<TokenStream> {
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    &input,
                    "Record can only be derived for structs with named fields",
                ));
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                &input,
                "Record can only be derived for structs",
            ));
        }
    };

    let container = container_attr(&input.attrs)?;
    let type_name = container.name.clone().unwrap_or_else(|| name.to_string());

    let mut registrations = Vec::new();
    let mut key_field = None;
    let mut implicit_key = None;
    let mut deleted = None;
    let mut ghost = None;
    let mut last_change = None;

    for field in fields {
        let Some(ident) = field.ident.as_ref() else {
            continue;
        };
        let attr = field_attr(field)?;
        if attr.role == FieldRole::Skip {
            continue;
        }
        let column = column_name(ident, &attr);
        let ty = &field.ty;

        let registration = match attr.role {
            FieldRole::Scalar => quote! {
                .field(#column, |r| &r.#ident, |r| &mut r.#ident)
            },
            FieldRole::Nested => match nested_slot(ty) {
                Some(NestedSlot::Plain) => quote! {
                    .nested(#column, |r| &r.#ident, |r| &mut r.#ident)
                },
                Some(NestedSlot::Boxed) => quote! {
                    .nested_boxed(#column, |r| &r.#ident, |r| &mut r.#ident)
                },
                None => {
                    return Err(syn::Error::new_spanned(
                        ty,
                        "#[orm(nested)] requires Option<T> or Option<Box<T>>",
                    ));
                }
            },
            FieldRole::Collection => {
                if option_inner(ty).and_then(vec_inner).is_none() {
                    return Err(syn::Error::new_spanned(
                        ty,
                        "#[orm(collection)] requires Option<Vec<T>>",
                    ));
                }
                quote! {
                    .collection(#column, |r| &r.#ident, |r| &mut r.#ident)
                }
            }
            FieldRole::Skip => continue,
        };
        registrations.push(registration);

        if attr.id {
            if key_field.is_some() {
                return Err(syn::Error::new_spanned(
                    field,
                    "only one field may carry #[orm(id)], use SchemaMap::keys for composite keys",
                ));
            }
            key_field = Some((ident.clone(), column.clone()));
        } else if ident == "id" {
            implicit_key = Some((ident.clone(), column.clone()));
        }
        if attr.deleted {
            deleted = Some(ident.clone());
        }
        if attr.ghost {
            ghost = Some(ident.clone());
        }
        if attr.last_change {
            last_change = Some((ident.clone(), is_optional(ty)));
        }
    }

    let Some((key, key_column)) = key_field.or(implicit_key) else {
        return Err(syn::Error::new_spanned(
            &input,
            "Record requires an `id` field or a field marked #[orm(id)]",
        ));
    };

    let is_deleted = deleted.map(|f| {
        quote! {
            fn is_deleted(&self) -> bool {
                self.#f
            }
        }
    });
    let is_ghost = ghost.map(|f| {
        quote! {
            fn is_ghost(&self) -> bool {
                self.#f
            }
        }
    });
    let last_change = last_change.map(|(f, optional)| {
        let body = if optional {
            quote!(self.#f)
        } else {
            quote!(Some(self.#f))
        };
        quote! {
            fn last_change(&self) -> Option<::graphorm::chrono::DateTime<::graphorm::chrono::Utc>> {
                #body
            }
        }
    });

    let mut configure_chain = Vec::new();
    match (&container.schema, &container.table) {
        (Some(schema), Some(table)) => configure_chain.push(quote!(.table(#schema, #table))),
        (Some(schema), None) => configure_chain.push(quote!(.schema(#schema))),
        (None, Some(table)) => configure_chain.push(quote!(.named(#table))),
        (None, None) => {}
    }
    // A renamed key replaces the default `Id` key, which is generated and read-only.
    if key_column != "Id" {
        configure_chain.push(quote!(.id(#key_column).read_only([#key_column])));
    }
    let configure = (!configure_chain.is_empty()).then(|| {
        quote! {
            fn configure(map: ::graphorm::SchemaMap<Self>) -> ::graphorm::SchemaMap<Self> {
                map #(#configure_chain)*
            }
        }
    });

    Ok(quote! {
        impl #impl_generics ::graphorm::Record for #name #ty_generics #where_clause {
            const TYPE_NAME: &'static str = #type_name;

            fn fields(f: &mut ::graphorm::FieldSet<Self>) {
                f #(#registrations)*;
            }

            fn key(&self) -> ::graphorm::Value {
                ::graphorm::FieldValue::to_value(&self.#key)
            }

            #configure
            #is_deleted
            #is_ghost
            #last_change
        }
    })
}
