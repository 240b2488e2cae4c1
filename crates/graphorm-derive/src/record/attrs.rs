//! `#[orm(...)]` attribute parsing for the Record derive.

use heck::ToUpperCamelCase;
use syn::meta::ParseNestedMeta;
use syn::{Attribute, Field, LitStr, Result};

/// Struct-level attributes.
#[derive(Default)]
pub(super) struct ContainerAttr {
    pub name: Option<String>,
    pub schema: Option<String>,
    pub table: Option<String>,
}

/// How a field takes part in mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(super) enum FieldRole {
    #[default]
    Scalar,
    Nested,
    Collection,
    Skip,
}

#[derive(Default)]
pub(super) struct FieldAttr {
    pub id: bool,
    pub column: Option<String>,
    pub role: FieldRole,
    pub deleted: bool,
    pub ghost: bool,
    pub last_change: bool,
}

fn orm_attrs(attrs: &[Attribute]) -> impl Iterator<Item = &Attribute> {
    attrs.iter().filter(|a| a.path().is_ident("orm"))
}

pub(super) fn container_attr(attrs: &[Attribute]) -> Result<ContainerAttr> {
    let mut out = ContainerAttr::default();
    for attr in orm_attrs(attrs) {
        attr.parse_nested_meta(|meta| {
            let value = || -> Result<String> { Ok(meta.value()?.parse::<LitStr>()?.value()) };
            if meta.path.is_ident("name") {
                out.name = Some(value()?);
            } else if meta.path.is_ident("schema") {
                out.schema = Some(value()?);
            } else if meta.path.is_ident("table") {
                out.table = Some(value()?);
            } else {
                return Err(meta.error("unknown struct attribute, expected `name`, `schema` or `table`"));
            }
            Ok(())
        })?;
    }
    Ok(out)
}

pub(super) fn field_attr(field: &Field) -> Result<FieldAttr> {
    let mut out = FieldAttr::default();
    for attr in orm_attrs(&field.attrs) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("id") {
                out.id = true;
            } else if meta.path.is_ident("column") {
                out.column = Some(meta.value()?.parse::<LitStr>()?.value());
            } else if meta.path.is_ident("nested") {
                set_role(&mut out, &meta, FieldRole::Nested)?;
            } else if meta.path.is_ident("collection") {
                set_role(&mut out, &meta, FieldRole::Collection)?;
            } else if meta.path.is_ident("skip") {
                set_role(&mut out, &meta, FieldRole::Skip)?;
            } else if meta.path.is_ident("deleted") {
                out.deleted = true;
            } else if meta.path.is_ident("ghost") {
                out.ghost = true;
            } else if meta.path.is_ident("last_change") {
                out.last_change = true;
            } else {
                return Err(meta.error("unknown field attribute"));
            }
            Ok(())
        })?;
    }
    Ok(out)
}

fn set_role(out: &mut FieldAttr, meta: &ParseNestedMeta, role: FieldRole) -> Result<()> {
    if out.role != FieldRole::Scalar && out.role != role {
        return Err(meta.error("conflicting field roles"));
    }
    out.role = role;
    Ok(())
}

/// Field name used in rows and conditions: `customer_id` becomes `CustomerId`.
pub(super) fn column_name(ident: &syn::Ident, attr: &FieldAttr) -> String {
    attr.column.clone().unwrap_or_else(|| {
        ident
            .to_string()
            .trim_start_matches("r#")
            .to_upper_camel_case()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use syn::parse_quote;

    #[test]
    fn parses_container() {
        let attrs: Vec<Attribute> = vec![parse_quote!(#[orm(schema = "sales", table = "Orders")])];
        let c = container_attr(&attrs).unwrap();
        assert_eq!(c.schema.as_deref(), Some("sales"));
        assert_eq!(c.table.as_deref(), Some("Orders"));
        assert!(c.name.is_none());
    }

    #[test]
    fn parses_field_flags() {
        let field: Field = parse_quote!(#[orm(id, column = "OrderNo")] pub order_no: i64);
        let a = field_attr(&field).unwrap();
        assert!(a.id);
        assert_eq!(column_name(field.ident.as_ref().unwrap(), &a), "OrderNo");

        let field: Field = parse_quote!(#[orm(nested)] pub customer: Option<Customer>);
        assert_eq!(field_attr(&field).unwrap().role, FieldRole::Nested);
    }

    #[test]
    fn default_column_is_upper_camel() {
        let field: Field = parse_quote!(pub last_change: Option<i64>);
        let a = field_attr(&field).unwrap();
        assert_eq!(column_name(field.ident.as_ref().unwrap(), &a), "LastChange");
    }

    #[test]
    fn rejects_conflicting_roles() {
        let field: Field = parse_quote!(#[orm(nested, collection)] pub lines: Option<Vec<Line>>);
        assert!(field_attr(&field).is_err());
    }
}
