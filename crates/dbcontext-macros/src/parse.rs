//! Parsing logic for the Entity derive macro.
//!
//! This module extracts struct-level and field-level attributes from the
//! derive input to build the `EntityDef` and `FieldDef` structures used
//! for code generation.

use syn::{Attribute, Data, DeriveInput, Error, Fields, Generics, Ident, Lit, Result, Type};

/// Parsed entity definition from a struct with `#[derive(Entity)]`.
#[derive(Debug)]
pub struct EntityDef {
    /// The struct name (e.g., `Hero`).
    pub name: Ident,
    /// The SQL table name (e.g., `"hero"`).
    pub table_name: String,
    /// Parsed field definitions.
    pub fields: Vec<FieldDef>,
    /// Generic parameters from the struct.
    pub generics: Generics,
}

/// Parsed field definition from a struct field.
#[derive(Debug)]
pub struct FieldDef {
    /// The Rust field name (e.g., `secret_name`).
    pub name: Ident,
    /// The SQL column name (field name or custom override).
    pub column_name: String,
    /// The Rust type of the field.
    pub ty: Type,
    /// Whether this field is the surrogate primary key.
    pub primary_key: bool,
    /// Skip this field entirely in database operations.
    pub skip: bool,
    /// This field is an embedded part whose columns splice in flat.
    pub embed: bool,
    /// This field is the creation audit timestamp.
    pub created_at: bool,
    /// This field is the update audit timestamp.
    pub updated_at: bool,
}

/// Parse a `DeriveInput` into an `EntityDef`.
///
/// # Errors
///
/// Returns an error if:
/// - The input is not a struct with named fields
/// - Unknown or conflicting attributes are present
/// - More than one field claims the same role (key, timestamps)
pub fn parse_entity(input: &DeriveInput) -> Result<EntityDef> {
    let name = input.ident.clone();
    let generics = input.generics.clone();

    let table_name = parse_struct_entity_attrs(&input.attrs)?
        .unwrap_or_else(|| to_snake_case(&name.to_string()));

    let mut fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(named) => named
                .named
                .iter()
                .map(parse_field)
                .collect::<Result<Vec<_>>>()?,
            _ => {
                return Err(Error::new_spanned(
                    input,
                    "Entity requires a struct with named fields",
                ));
            }
        },
        Data::Enum(_) => {
            return Err(Error::new_spanned(
                input,
                "Entity can only be derived for structs, not enums",
            ));
        }
        Data::Union(_) => {
            return Err(Error::new_spanned(
                input,
                "Entity can only be derived for structs, not unions",
            ));
        }
    };

    apply_conventions(&mut fields);
    check_roles(input, &fields)?;

    Ok(EntityDef {
        name,
        table_name,
        fields,
        generics,
    })
}

/// Parse struct-level `#[entity(table = "name")]`.
fn parse_struct_entity_attrs(attrs: &[Attribute]) -> Result<Option<String>> {
    let mut table_name: Option<String> = None;

    for attr in attrs {
        if !attr.path().is_ident("entity") {
            continue;
        }

        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("table") {
                if table_name.is_some() {
                    return Err(Error::new_spanned(
                        meta.path,
                        "duplicate entity attribute: table",
                    ));
                }
                let value: Lit = meta.value()?.parse()?;
                if let Lit::Str(lit_str) = value {
                    table_name = Some(lit_str.value());
                    Ok(())
                } else {
                    Err(Error::new_spanned(
                        value,
                        "expected string literal for table name",
                    ))
                }
            } else {
                Err(Error::new_spanned(
                    meta.path,
                    "unknown entity struct attribute (supported: table)",
                ))
            }
        })?;
    }

    Ok(table_name)
}

/// Parse one named field and its `#[entity(...)]` attributes.
fn parse_field(field: &syn::Field) -> Result<FieldDef> {
    let name = field
        .ident
        .clone()
        .ok_or_else(|| Error::new_spanned(field, "expected a named field"))?;
    let mut def = FieldDef {
        column_name: name.to_string(),
        name,
        ty: field.ty.clone(),
        primary_key: false,
        skip: false,
        embed: false,
        created_at: false,
        updated_at: false,
    };

    for attr in &field.attrs {
        if !attr.path().is_ident("entity") {
            continue;
        }

        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("column") {
                let value: Lit = meta.value()?.parse()?;
                if let Lit::Str(lit_str) = value {
                    def.column_name = lit_str.value();
                    Ok(())
                } else {
                    Err(Error::new_spanned(
                        value,
                        "expected string literal for column name",
                    ))
                }
            } else if meta.path.is_ident("primary_key") {
                def.primary_key = true;
                Ok(())
            } else if meta.path.is_ident("skip") {
                def.skip = true;
                Ok(())
            } else if meta.path.is_ident("embed") {
                def.embed = true;
                Ok(())
            } else if meta.path.is_ident("created_at") {
                def.created_at = true;
                Ok(())
            } else if meta.path.is_ident("updated_at") {
                def.updated_at = true;
                Ok(())
            } else {
                Err(Error::new_spanned(
                    meta.path,
                    "unknown entity field attribute (supported: column, primary_key, skip, \
                     embed, created_at, updated_at)",
                ))
            }
        })?;
    }

    Ok(def)
}

/// Apply naming conventions for roles no field claimed explicitly.
///
/// A non-skipped, non-embedded field literally named `id`, `created_at` or
/// `updated_at` takes that role when no explicit attribute assigned it.
fn apply_conventions(fields: &mut [FieldDef]) {
    let has_pk = fields.iter().any(|f| f.primary_key);
    let has_created = fields.iter().any(|f| f.created_at);
    let has_updated = fields.iter().any(|f| f.updated_at);

    for field in fields.iter_mut() {
        if field.skip || field.embed {
            continue;
        }
        if !has_pk && field.name == "id" {
            field.primary_key = true;
        }
        if !has_created && field.name == "created_at" {
            field.created_at = true;
        }
        if !has_updated && field.name == "updated_at" {
            field.updated_at = true;
        }
    }
}

/// Reject conflicting role assignments.
fn check_roles(input: &DeriveInput, fields: &[FieldDef]) -> Result<()> {
    if fields.iter().filter(|f| f.primary_key).count() > 1 {
        return Err(Error::new_spanned(
            input,
            "only one field may be marked primary_key",
        ));
    }
    if fields.iter().filter(|f| f.created_at).count() > 1 {
        return Err(Error::new_spanned(
            input,
            "only one field may be marked created_at",
        ));
    }
    if fields.iter().filter(|f| f.updated_at).count() > 1 {
        return Err(Error::new_spanned(
            input,
            "only one field may be marked updated_at",
        ));
    }
    for field in fields {
        if field.embed
            && (field.primary_key || field.created_at || field.updated_at || field.skip)
        {
            return Err(Error::new_spanned(
                &field.name,
                "embed cannot be combined with other entity attributes",
            ));
        }
    }
    Ok(())
}

/// Convert PascalCase to snake_case.
///
/// Examples:
/// - `Hero` -> `hero`
/// - `TeamMember` -> `team_member`
/// - `HTTPServer` -> `http_server`
pub fn to_snake_case(s: &str) -> String {
    let mut result = String::with_capacity(s.len() + 4);
    let chars: Vec<char> = s.chars().collect();

    for (i, &c) in chars.iter().enumerate() {
        if c.is_uppercase() {
            if i > 0 {
                let prev = chars[i - 1];
                let next = chars.get(i + 1).copied();

                let should_underscore = prev.is_lowercase()
                    || (prev.is_uppercase() && next.is_some_and(|n| n.is_lowercase()));

                if should_underscore {
                    result.push('_');
                }
            }
            result.push(c.to_ascii_lowercase());
        } else {
            result.push(c);
        }
    }

    result
}
