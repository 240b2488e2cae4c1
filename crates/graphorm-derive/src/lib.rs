//! Derive macros for graphorm
//!
//! Provides `#[derive(Record)]`.

use proc_macro::TokenStream;
use syn::{DeriveInput, parse_macro_input};

mod common;
mod record;

/// Derive `Record` for a struct with named fields.
///
/// # Example
///
/// ```ignore
/// use graphorm::Record;
///
/// #[derive(Debug, Clone, Default, Record)]
/// #[orm(schema = "sales", table = "Orders")]
/// struct Order {
///     #[orm(id)]
///     id: i64,
///     total: f64,
///     #[orm(nested)]
///     customer: Option<Customer>,
///     #[orm(collection)]
///     lines: Option<Vec<OrderLine>>,
///     #[orm(last_change)]
///     changed_at: Option<chrono::DateTime<chrono::Utc>>,
/// }
/// ```
///
/// # Struct attributes
///
/// - `#[orm(name = "...")]` - Type name used by naming conventions (defaults to the struct name)
/// - `#[orm(schema = "...")]` - Schema of the default table
/// - `#[orm(table = "...")]` - Default table name
///
/// # Field attributes
///
/// - `#[orm(id)]` - Key field (falls back to a field named `id`)
/// - `#[orm(column = "...")]` - Field name in rows and conditions (defaults to UpperCamelCase)
/// - `#[orm(nested)]` - `Option<C>` or `Option<Box<C>>` holding another record
/// - `#[orm(collection)]` - `Option<Vec<C>>` child collection
/// - `#[orm(skip)]` - Not mapped
/// - `#[orm(deleted)]`, `#[orm(ghost)]` - `bool` flags backing `is_deleted` / `is_ghost`
/// - `#[orm(last_change)]` - Timestamp backing `last_change`
#[proc_macro_derive(Record, attributes(orm))]
pub fn derive_record(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    record::expand(input)
        .unwrap_or_else(|e| e.to_compile_error())
        .into()
}
