//! Safe SQL identifier handling.
//!
//! [`Ident`] is a schema-qualified name (`schema.table`) or a single column name.
//! Every part is rendered quoted in the target [`Dialect`], so names keep their case
//! and column names may contain dots (`"Company.Name"` is one view column).
//!
//! Accepted input forms when parsing qualified names:
//!
//! - Unquoted parts validated against `[A-Za-z_][A-Za-z0-9_$]*`
//! - Double-quoted parts (`"Order Lines"`, `""` escapes a quote)
//! - Bracketed parts (`[Order Lines]`, `]]` escapes a bracket)

use crate::dialect::Dialect;
use crate::error::{OrmError, OrmResult};

/// A SQL identifier made of one or more parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ident {
    pub parts: Vec<String>,
}

fn check_part(name: &str) -> OrmResult<()> {
    if name.is_empty() {
        return Err(OrmError::validation("Empty identifier"));
    }
    if name.contains('\0') {
        return Err(OrmError::validation(
            "Identifier cannot contain NUL character",
        ));
    }
    Ok(())
}

impl Ident {
    /// A single-part identifier taken verbatim, dots included.
    pub fn column(name: &str) -> OrmResult<Self> {
        check_part(name)?;
        Ok(Self {
            parts: vec![name.to_string()],
        })
    }

    /// A `schema.name` pair, both parts verbatim.
    pub fn qualified(schema: &str, name: &str) -> OrmResult<Self> {
        check_part(schema)?;
        check_part(name)?;
        Ok(Self {
            parts: vec![schema.to_string(), name.to_string()],
        })
    }

    /// Parse a possibly qualified name such as `sales.OrderLines` or `[sales].[Order Lines]`.
    pub fn parse(s: &str) -> OrmResult<Self> {
        if s.is_empty() {
            return Err(OrmError::validation("Identifier cannot be empty"));
        }
        if s.contains('\0') {
            return Err(OrmError::validation(
                "Identifier cannot contain NUL character",
            ));
        }

        let mut parts = Vec::new();
        let mut chars = s.chars().peekable();

        while chars.peek().is_some() {
            if !parts.is_empty() {
                match chars.next() {
                    Some('.') => {
                        if chars.peek().is_none() {
                            return Err(OrmError::validation("Trailing '.' in identifier"));
                        }
                    }
                    Some(c) => {
                        return Err(OrmError::validation(format!(
                            "Expected '.' between identifier parts, got '{c}'"
                        )));
                    }
                    None => break,
                }
            }

            let close = match chars.peek() {
                Some('"') => Some('"'),
                Some('[') => Some(']'),
                _ => None,
            };

            if let Some(close) = close {
                chars.next();
                let mut name = String::new();
                loop {
                    match chars.next() {
                        Some(c) if c == close => {
                            if chars.peek() == Some(&close) {
                                chars.next();
                                name.push(close);
                            } else {
                                break;
                            }
                        }
                        Some(c) => name.push(c),
                        None => return Err(OrmError::validation("Unclosed quoted identifier")),
                    }
                }
                check_part(&name)?;
                parts.push(name);
                continue;
            }

            let mut name = String::new();
            while let Some(&c) = chars.peek() {
                if c == '.' {
                    break;
                }
                let ok = if name.is_empty() {
                    c == '_' || c.is_ascii_alphabetic()
                } else {
                    c == '_' || c == '$' || c.is_ascii_alphanumeric()
                };
                if !ok {
                    return Err(OrmError::validation(format!(
                        "Invalid character in identifier: '{c}'"
                    )));
                }
                name.push(c);
                chars.next();
            }
            if name.is_empty() {
                return Err(OrmError::validation("Empty identifier segment"));
            }
            parts.push(name);
        }

        if parts.is_empty() {
            return Err(OrmError::validation("Empty identifier"));
        }

        Ok(Self { parts })
    }

    /// Last part, i.e. the unqualified name.
    pub fn name(&self) -> &str {
        self.parts.last().map(String::as_str).unwrap_or_default()
    }

    /// Render the identifier as SQL for `dialect`.
    pub fn to_sql(&self, dialect: Dialect) -> String {
        let mut out = String::new();
        self.write_sql(dialect, &mut out);
        out
    }

    pub(crate) fn write_sql(&self, dialect: Dialect, out: &mut String) {
        for (i, part) in self.parts.iter().enumerate() {
            if i > 0 {
                out.push('.');
            }
            dialect.write_quoted(part, out);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn qualified_name_renders_per_dialect() {
        let ident = Ident::parse("sales.OrderLines").unwrap();
        assert_eq!(ident.to_sql(Dialect::Postgres), r#""sales"."OrderLines""#);
        assert_eq!(ident.to_sql(Dialect::SqlServer), "[sales].[OrderLines]");
    }

    #[test]
    fn bracketed_and_quoted_parts() {
        let ident = Ident::parse(r#"[dbo]."Order Lines""#).unwrap();
        assert_eq!(ident.parts, ["dbo", "Order Lines"]);
    }

    #[test]
    fn column_keeps_dots() {
        let ident = Ident::column("Company.Name").unwrap();
        assert_eq!(ident.to_sql(Dialect::SqlServer), "[Company.Name]");
        assert_eq!(ident.to_sql(Dialect::Postgres), r#""Company.Name""#);
    }

    #[test]
    fn escapes_closing_quote() {
        let ident = Ident::column("odd]name").unwrap();
        assert_eq!(ident.to_sql(Dialect::SqlServer), "[odd]]name]");
        let ident = Ident::column("odd\"name").unwrap();
        assert_eq!(ident.to_sql(Dialect::Postgres), r#""odd""name""#);
    }

    #[test]
    fn rejects_malformed() {
        assert!(Ident::parse("").is_err());
        assert!(Ident::parse("1table").is_err());
        assert!(Ident::parse("my table").is_err());
        assert!(Ident::parse("schema..table").is_err());
        assert!(Ident::parse("schema.").is_err());
        assert!(Ident::parse("[unclosed").is_err());
        assert!(Ident::column("").is_err());
    }
}
