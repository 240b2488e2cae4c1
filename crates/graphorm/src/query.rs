//! Fluent queries.
//!
//! ```ignore
//! let adults: Vec<Customer> = dao
//!     .query::<Customer>()?
//!     .where_(|c| c.field("Age").is_greater_than(18))
//!     .and(|c| c.field("Active").is_true())
//!     .order_by("Name")
//!     .ascending()
//!     .take(50)
//!     .to_list()
//!     .await?;
//! ```
//!
//! Builder misuse (an unparsable source name, a direction with no pending order key)
//! is remembered and returned by the terminal call.

use crate::compiler::{QueryCompiler, QuerySpec, Source};
use crate::condition::Condition;
use crate::dao::Dao;
use crate::error::{OrmError, OrmResult};
use crate::ident::Ident;
use crate::record::Record;
use crate::schema::{SchemaMap, Variant, object_ident};
use crate::statement::Statement;
use std::sync::Arc;

/// Column compared by [`Query::changed_within`].
pub const LAST_CHANGE_FIELD: &str = "LastChange";

#[must_use = "a query does nothing until a terminal method is awaited"]
pub struct Query<'a, T: Record> {
    dao: &'a Dao<'a>,
    map: Arc<SchemaMap<T>>,
    spec: QuerySpec,
    build_error: Option<OrmError>,
}

impl<'a, T: Record> Query<'a, T> {
    pub(crate) fn new(dao: &'a Dao<'a>, map: Arc<SchemaMap<T>>) -> Self {
        Self {
            dao,
            map,
            spec: QuerySpec::default(),
            build_error: None,
        }
    }

    fn fail(&mut self, err: OrmError) {
        if self.build_error.is_none() {
            self.build_error = Some(err);
        }
    }

    /// Read from another table or view. Bare names use the map's schema.
    pub fn from(mut self, view: &str) -> Self {
        match object_ident(self.map.schema_name(), view) {
            Ok(ident) => self.spec.source = Source::Object(ident),
            Err(e) => self.fail(e),
        }
        self
    }

    pub fn from_schema(mut self, schema: &str, view: &str) -> Self {
        match Ident::qualified(schema, view) {
            Ok(ident) => self.spec.source = Source::Object(ident),
            Err(e) => self.fail(e),
        }
        self
    }

    /// Use a complete select as the base. Conditions are appended to it as-is.
    pub fn from_sql(mut self, sql: impl Into<String>) -> Self {
        self.spec.source = Source::Sql(sql.into());
        self
    }

    /// Replace all conditions with one.
    pub fn where_(mut self, build: impl FnOnce(Condition) -> Condition) -> Self {
        self.spec.conditions = vec![build(Condition::default())];
        self
    }

    pub fn and(mut self, build: impl FnOnce(Condition) -> Condition) -> Self {
        self.spec.conditions.push(build(Condition::default()));
        self
    }

    pub fn or(mut self, build: impl FnOnce(Condition) -> Condition) -> Self {
        self.spec
            .conditions
            .push(build(Condition::default()).joined_by_or());
        self
    }

    /// Only rows whose `LastChange` falls within `window` of the configured clock.
    pub fn changed_within(self, window: chrono::Duration) -> Self {
        let since = self.dao.now() - window;
        self.and(|c| c.field(LAST_CHANGE_FIELD).is_greater_or_equal(since))
    }

    pub fn order_by(mut self, field: impl Into<String>) -> Self {
        self.spec.order.push(field);
        self
    }

    pub fn then_by(mut self, field: impl Into<String>) -> Self {
        self.spec.order.push(field);
        self
    }

    pub fn ascending(mut self) -> Self {
        if let Err(e) = self.spec.order.ascending() {
            self.fail(e);
        }
        self
    }

    pub fn descending(mut self) -> Self {
        if let Err(e) = self.spec.order.descending() {
            self.fail(e);
        }
        self
    }

    /// Cap the number of rows; 0 removes the cap.
    pub fn take(mut self, n: usize) -> Self {
        self.spec.take = n;
        self
    }

    fn compile(&self, variant: Variant) -> OrmResult<Statement> {
        QueryCompiler::new(&self.map, self.dao.config().dialect).select(&self.spec, variant)
    }

    fn checked(mut self) -> OrmResult<Self> {
        match self.build_error.take() {
            Some(err) => Err(err),
            None => Ok(self),
        }
    }

    /// The select this query would run.
    pub fn statement(self) -> OrmResult<Statement> {
        self.checked()?.compile(Variant::Short)
    }

    pub fn count_statement(self) -> OrmResult<Statement> {
        self.checked()?.compile(Variant::Count)
    }

    pub async fn to_list(self) -> OrmResult<Vec<T>> {
        let query = self.checked()?;
        let statement = query.compile(Variant::Short)?;
        query.dao.fetch(&statement).await
    }

    /// Read from the full source and load every declared relation of each record.
    pub async fn to_extended_list(self) -> OrmResult<Vec<T>> {
        let query = self.checked()?;
        let statement = query.compile(Variant::Full)?;
        let mut records: Vec<T> = query.dao.fetch(&statement).await?;
        for record in &mut records {
            query.dao.load_relations(record).await?;
        }
        Ok(records)
    }

    pub async fn first_or_default(self) -> OrmResult<Option<T>> {
        let query = self.take(1).checked()?;
        let statement = query.compile(Variant::Short)?;
        let records: Vec<T> = query.dao.fetch(&statement).await?;
        Ok(records.into_iter().next())
    }

    pub async fn count(self) -> OrmResult<i64> {
        let query = self.checked()?;
        let statement = query.compile(Variant::Count)?;
        let value = query.dao.run_scalar(&statement).await?;
        match value {
            None => Ok(0),
            Some(v) => v
                .as_i64()
                .ok_or_else(|| OrmError::decode("count", format!("expected an integer, got {}", v.kind()))),
        }
    }
}
