//! Procedural macros for dbcontext.
//!
//! `dbcontext-macros` is the compile-time codegen layer. It turns Rust
//! structs into mapped entities by generating the `EntityPart` and `Entity`
//! trait implementations the change tracker and query layers consume.
//!
//! These macros are used by application crates via the `dbcontext` facade.

use proc_macro::TokenStream;
use quote::quote;

mod parse;

use parse::{EntityDef, parse_entity};

/// Derive macro for the `Entity` trait.
///
/// Generates `EntityPart` (field metadata, value extraction, row
/// materialization, key and timestamp bookkeeping) and `Entity` (table
/// name, row construction) implementations.
///
/// # Attributes
///
/// - `#[entity(table = "name")]` - Override table name (defaults to the
///   snake_case struct name, not pluralized)
/// - `#[entity(primary_key)]` - Mark field as the surrogate key
/// - `#[entity(column = "name")]` - Override column name
/// - `#[entity(skip)]` - Exclude this field from persistence
/// - `#[entity(embed)]` - Splice an embedded part's columns in flat
/// - `#[entity(created_at)]` / `#[entity(updated_at)]` - Mark audit
///   timestamp fields
///
/// Fields named `id`, `created_at` and `updated_at` take those roles by
/// convention when no field claims them explicitly.
///
/// # Example
///
/// ```ignore
/// use dbcontext::{BaseEntity, Entity};
///
/// #[derive(Entity, Default)]
/// struct Hero {
///     #[entity(embed)]
///     base: BaseEntity,
///
///     name: String,
///
///     #[entity(column = "secret_name")]
///     alias: Option<String>,
/// }
/// ```
#[proc_macro_derive(Entity, attributes(entity))]
pub fn derive_entity(input: TokenStream) -> TokenStream {
    let input = syn::parse_macro_input!(input as syn::DeriveInput);

    let entity = match parse_entity(&input) {
        Ok(e) => e,
        Err(e) => return e.to_compile_error().into(),
    };

    generate_entity_impl(&entity).into()
}

/// Generate the `EntityPart` and `Entity` implementations.
fn generate_entity_impl(entity: &EntityDef) -> proc_macro2::TokenStream {
    let name = &entity.name;
    let table_name = &entity.table_name;
    let (impl_generics, ty_generics, where_clause) = entity.generics.split_for_impl();

    let mut field_stmts = Vec::new();
    let mut value_stmts = Vec::new();
    let mut apply_stmts = Vec::new();
    let mut id_value_stmts = Vec::new();
    let mut set_id_stmts = Vec::new();
    let mut created_stmts = Vec::new();
    let mut updated_stmts = Vec::new();

    for field in &entity.fields {
        let fname = &field.name;
        let fty = &field.ty;

        if field.embed {
            field_stmts.push(quote! {
                fields.extend(<#fty as dbcontext_core::EntityPart>::part_fields());
            });
            value_stmts.push(quote! {
                values.extend(dbcontext_core::EntityPart::part_values(&self.#fname));
            });
            apply_stmts.push(quote! {
                dbcontext_core::EntityPart::apply_row(&mut self.#fname, row);
            });
            id_value_stmts.push(quote! {
                if let Some(id) = dbcontext_core::EntityPart::id_value(&self.#fname) {
                    return Some(id);
                }
            });
            set_id_stmts.push(quote! {
                if dbcontext_core::EntityPart::set_id(&mut self.#fname, id) {
                    return true;
                }
            });
            created_stmts.push(quote! {
                if dbcontext_core::EntityPart::touch_created(&mut self.#fname, at) {
                    return true;
                }
            });
            updated_stmts.push(quote! {
                if dbcontext_core::EntityPart::touch_updated(&mut self.#fname, at) {
                    return true;
                }
            });
            continue;
        }

        let name_lit = field.name.to_string();
        let column_lit = &field.column_name;

        if field.skip {
            field_stmts.push(quote! {
                fields.push(dbcontext_core::FieldMeta::new(#name_lit, #column_lit).skip());
            });
            value_stmts.push(quote! {
                values.push(dbcontext_core::Value::Null);
            });
            continue;
        }

        let meta = if field.primary_key {
            quote! { dbcontext_core::FieldMeta::new(#name_lit, #column_lit).primary_key() }
        } else {
            quote! { dbcontext_core::FieldMeta::new(#name_lit, #column_lit) }
        };
        field_stmts.push(quote! { fields.push(#meta); });
        value_stmts.push(quote! {
            values.push(dbcontext_core::Value::from(self.#fname.clone()));
        });
        apply_stmts.push(quote! {
            dbcontext_core::apply_column(&mut self.#fname, row, #column_lit);
        });

        if field.primary_key {
            id_value_stmts.push(quote! {
                if let Some(id) = dbcontext_core::IdField::as_id(&self.#fname) {
                    return Some(id);
                }
            });
            set_id_stmts.push(quote! {
                dbcontext_core::IdField::assign(&mut self.#fname, id);
                return true;
            });
        }
        if field.created_at {
            created_stmts.push(quote! {
                dbcontext_core::TimestampField::stamp(&mut self.#fname, at);
                return true;
            });
        }
        if field.updated_at {
            updated_stmts.push(quote! {
                dbcontext_core::TimestampField::stamp(&mut self.#fname, at);
                return true;
            });
        }
    }

    let row_param = if apply_stmts.is_empty() {
        quote! { _row }
    } else {
        quote! { row }
    };
    let set_id_param = if set_id_stmts.is_empty() {
        quote! { _id }
    } else {
        quote! { id }
    };
    let created_param = if created_stmts.is_empty() {
        quote! { _at }
    } else {
        quote! { at }
    };
    let updated_param = if updated_stmts.is_empty() {
        quote! { _at }
    } else {
        quote! { at }
    };

    quote! {
        impl #impl_generics dbcontext_core::EntityPart for #name #ty_generics #where_clause {
            fn part_fields() -> ::std::vec::Vec<dbcontext_core::FieldMeta> {
                let mut fields = ::std::vec::Vec::new();
                #(#field_stmts)*
                fields
            }

            fn part_values(&self) -> ::std::vec::Vec<dbcontext_core::Value> {
                let mut values = ::std::vec::Vec::new();
                #(#value_stmts)*
                values
            }

            fn apply_row(&mut self, #row_param: &dbcontext_core::Row) {
                #(#apply_stmts)*
            }

            fn id_value(&self) -> ::std::option::Option<i64> {
                #(#id_value_stmts)*
                None
            }

            #[allow(unreachable_code)]
            fn set_id(&mut self, #set_id_param: i64) -> bool {
                #(#set_id_stmts)*
                false
            }

            #[allow(unreachable_code)]
            fn touch_created(&mut self, #created_param: dbcontext_core::PrimitiveDateTime) -> bool {
                #(#created_stmts)*
                false
            }

            #[allow(unreachable_code)]
            fn touch_updated(&mut self, #updated_param: dbcontext_core::PrimitiveDateTime) -> bool {
                #(#updated_stmts)*
                false
            }
        }

        impl #impl_generics dbcontext_core::Entity for #name #ty_generics #where_clause {
            fn table_name() -> ::std::string::String {
                #table_name.to_string()
            }
        }
    }
}
