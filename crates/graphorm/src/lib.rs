//! # graphorm
//!
//! A relational mapping engine for object graphs.
//!
//! ## Features
//!
//! - **Condition trees**: compose predicates by value, compile to deterministic SQL
//! - **Schema maps**: per-type table, key, view, ordering and relation metadata
//! - **Row mapping**: by-name mapping with dotted paths and lazily created nested records
//! - **Graph saves**: insert-or-update plus one-to-many and many-to-many synchronization
//! - **Two dialects**: PostgreSQL (default) and SQL Server text generation
//! - **Pluggable execution**: any [`Executor`]; tokio-postgres ships behind the `postgres` feature
//!
//! ## Example
//!
//! ```ignore
//! use graphorm::{Catalog, ChildCollectionSpec, Dao, MapperConfig, PgExecutor, Record};
//! use std::sync::Arc;
//!
//! #[derive(Debug, Clone, Default, Record)]
//! #[orm(schema = "sales")]
//! struct Order {
//!     #[orm(id)]
//!     id: i64,
//!     total: f64,
//!     #[orm(nested)]
//!     customer: Option<Customer>,
//!     #[orm(collection)]
//!     lines: Option<Vec<OrderLine>>,
//! }
//!
//! let catalog = Arc::new(Catalog::new(MapperConfig::default()));
//! catalog.register::<Order, _>(|map| {
//!     map.by_default_order_by("Id")
//!         .descending()
//!         .with_many::<OrderLine>(ChildCollectionSpec::new("Lines"))
//! })?;
//!
//! let dao = Dao::new(PgExecutor::new(client), catalog);
//! let recent: Vec<Order> = dao
//!     .query::<Order>()?
//!     .where_(|c| c.field("Total").is_greater_than(100.0))
//!     .take(20)
//!     .to_extended_list()
//!     .await?;
//!
//! let mut order = recent.into_iter().next().unwrap_or_default();
//! order.total += 1.0;
//! dao.save(&mut order).await?;
//! ```

pub mod catalog;
pub mod compiler;
pub mod condition;
pub mod config;
pub mod dao;
pub mod diagnostics;
pub mod dialect;
pub mod error;
pub mod executor;
pub mod ident;
pub mod mapper;
pub mod order;
pub mod query;
pub mod record;
pub mod relation;
pub mod row;
pub mod schema;
pub mod statement;
pub mod value;

#[cfg(feature = "postgres")]
pub mod pg;

pub use catalog::Catalog;
pub use compiler::{QueryCompiler, QuerySpec, Source};
pub use condition::{Condition, Operand, Operator};
pub use config::{Clock, FixedClock, MapperConfig, PluralNaming, SingularNaming, SystemClock, TableNaming};
pub use dao::{Dao, LastChangeCheck, StaleCheck};
pub use diagnostics::{CollectingSink, Diagnostic, DiagnosticSink, NoopSink, TracingSink};
pub use dialect::Dialect;
pub use error::{OrmError, OrmResult};
pub use executor::Executor;
pub use ident::Ident;
pub use mapper::RowMapper;
pub use order::{OrderKey, OrderSpec};
pub use query::Query;
pub use record::{CollectionField, DynRecord, FieldSet, PathWrite, Record, field_set, same_identity};
pub use relation::{ManyToMany, OneToMany, Relation, RelationDiff, RelationKind, diff};
pub use row::Row;
pub use schema::{ChildCollectionSpec, ReadCommand, SchemaMap, Variant};
pub use statement::{Statement, StatementKind};
pub use value::{FieldValue, Value};

#[cfg(feature = "postgres")]
pub use pg::PgExecutor;

#[cfg(feature = "derive")]
pub use graphorm_derive::Record;

// Used by derive-generated code.
#[doc(hidden)]
pub use chrono;

#[cfg(test)]
mod fixtures;
