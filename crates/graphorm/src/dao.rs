//! Data access object: executor plus catalog.
//!
//! [`Dao`] is the entry point for everything that touches the database: fluent
//! queries, fetching by key, saving whole object graphs and deleting.
//!
//! A save runs as one sequential pass:
//!
//! 1. probe the write table by key (skipped for new records);
//! 2. update the stored row, or insert when there is none;
//! 3. reload the record to pick up generated and trigger-computed values;
//! 4. synchronize every declared relation against the stored state.
//!
//! Any failure stops the pass; relations are never synchronized against a parent
//! whose own write failed. Wrap the executor in a transaction for atomicity.

use crate::catalog::Catalog;
use crate::compiler::QueryCompiler;
use crate::config::MapperConfig;
use crate::diagnostics::Diagnostic;
use crate::error::{OrmError, OrmResult};
use crate::executor::Executor;
use crate::query::Query;
use crate::record::{DynRecord, PathWrite, Record};
use crate::row::Row;
use crate::schema::{SchemaMap, Variant};
use crate::statement::Statement;
use crate::value::Value;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Check run against the stored row before an update.
///
/// Returning [`OrmError::StaleData`] aborts the save before anything is written.
pub trait StaleCheck: Send + Sync {
    fn check(&self, stored: &Row, record: &dyn DynRecord) -> OrmResult<()>;
}

/// Rejects an update when the stored change timestamp is newer than the one the
/// record was read with.
#[derive(Debug, Clone)]
pub struct LastChangeCheck {
    column: String,
}

impl LastChangeCheck {
    pub fn new(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
        }
    }
}

impl Default for LastChangeCheck {
    fn default() -> Self {
        Self::new("LastChange")
    }
}

impl StaleCheck for LastChangeCheck {
    fn check(&self, stored: &Row, record: &dyn DynRecord) -> OrmResult<()> {
        let Some(seen) = record.record_last_change() else {
            return Ok(());
        };
        let stored_at = match stored.get(&self.column) {
            Some(Value::Timestamp(t)) => *t,
            Some(Value::DateTime(t)) => t.and_utc(),
            _ => return Ok(()),
        };
        if stored_at > seen {
            return Err(OrmError::StaleData(format!(
                "{} {} changed at {stored_at}, record was read at {seen}",
                record.record_type(),
                record.record_key()
            )));
        }
        Ok(())
    }
}

/// Executor plus catalog. Cheap to clone.
#[derive(Clone)]
pub struct Dao<'e> {
    executor: Arc<dyn Executor + 'e>,
    catalog: Arc<Catalog>,
}

impl std::fmt::Debug for Dao<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dao").field("catalog", &self.catalog).finish()
    }
}

impl<'e> Dao<'e> {
    pub fn new(executor: impl Executor + 'e, catalog: Arc<Catalog>) -> Self {
        Self {
            executor: Arc::new(executor),
            catalog,
        }
    }

    /// A dao with a fresh catalog built from `config`.
    pub fn with_config(executor: impl Executor + 'e, config: MapperConfig) -> Self {
        Self::new(executor, Arc::new(Catalog::new(config)))
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn config(&self) -> &MapperConfig {
        self.catalog.config()
    }

    /// Current time from the configured clock.
    pub fn now(&self) -> DateTime<Utc> {
        self.config().clock.now()
    }

    /// Start a fluent query over `T`.
    pub fn query<T: Record>(&self) -> OrmResult<Query<'_, T>> {
        Ok(Query::new(self, self.catalog.schema_map::<T>()?))
    }

    pub(crate) fn compiler<'m, T: Record>(&self, map: &'m SchemaMap<T>) -> QueryCompiler<'m, T> {
        QueryCompiler::new(map, self.config().dialect)
    }

    pub(crate) fn diagnose(&self, diagnostic: Diagnostic) {
        self.config().diagnostics.report(diagnostic);
    }

    fn trace(&self, statement: &Statement) {
        if self.config().trace_sql {
            tracing::debug!(
                target: "graphorm.sql",
                kind = %statement.kind,
                param_count = statement.params.len(),
                sql = %statement.sql,
                "executing statement"
            );
        }
    }

    pub(crate) async fn run_query(&self, statement: &Statement) -> OrmResult<Vec<Row>> {
        self.trace(statement);
        self.executor.query(statement).await
    }

    pub(crate) async fn run_execute(&self, statement: &Statement) -> OrmResult<u64> {
        self.trace(statement);
        self.executor.execute(statement).await
    }

    pub(crate) async fn run_scalar(&self, statement: &Statement) -> OrmResult<Option<Value>> {
        self.trace(statement);
        self.executor.query_scalar(statement).await
    }

    pub(crate) async fn run_describe(&self, statement: &Statement) -> OrmResult<Vec<String>> {
        self.trace(statement);
        self.executor.describe(statement).await
    }

    // ── raw mapping ─────────────────────────────────────────────────────────

    pub fn map<T: Record>(&self, row: &Row) -> OrmResult<T> {
        self.catalog.row_mapper::<T>().map(row)
    }

    pub fn map_into<T: Record>(&self, record: &mut T, row: &Row) -> OrmResult<()> {
        self.catalog.row_mapper::<T>().map_into(record, row)
    }

    pub fn map_all<T: Record>(&self, rows: &[Row]) -> OrmResult<Vec<T>> {
        self.catalog.row_mapper::<T>().map_all(rows)
    }

    /// Run any statement (a stored procedure call, hand-written SQL) and map the rows.
    pub async fn fetch<T: Record>(&self, statement: &Statement) -> OrmResult<Vec<T>> {
        let rows = self.run_query(statement).await?;
        self.map_all(&rows)
    }

    // ── reads ───────────────────────────────────────────────────────────────

    async fn select_one<T: Record>(
        &self,
        map: &SchemaMap<T>,
        variant: Variant,
        keys: &[Value],
    ) -> OrmResult<Option<T>> {
        let statement = self.compiler(map).select_by_keys(variant, keys)?;
        let rows = self.run_query(&statement).await?;
        let Some(row) = rows.first() else {
            return Ok(None);
        };
        let mut record: T = self.map(row)?;
        self.load_relations_with(map, &mut record).await?;
        Ok(Some(record))
    }

    /// Fetch one record by its single key from the full source, relations loaded.
    pub async fn get<T: Record>(&self, id: impl Into<Value>) -> OrmResult<Option<T>> {
        let map = self.catalog.schema_map::<T>()?;
        self.select_one(&map, Variant::Full, &[id.into()]).await
    }

    /// Fetch one record by its (possibly composite) key, relations loaded.
    pub async fn get_by_keys<T: Record>(&self, keys: &[Value]) -> OrmResult<Option<T>> {
        let map = self.catalog.schema_map::<T>()?;
        self.select_one(&map, Variant::Short, keys).await
    }

    /// Merge the stored row back into `record`.
    pub async fn reload<T: Record>(&self, record: &mut T, with_relations: bool) -> OrmResult<()> {
        let map = self.catalog.schema_map::<T>()?;
        self.reload_with(&map, record).await?;
        if with_relations {
            self.load_relations_with(&map, record).await?;
        }
        Ok(())
    }

    async fn reload_with<T: Record>(&self, map: &SchemaMap<T>, record: &mut T) -> OrmResult<()> {
        let keys = map.key_values(record);
        let statement = self.compiler(map).select_by_keys(Variant::Short, &keys)?;
        let rows = self.run_query(&statement).await?;
        let row = rows.first().ok_or_else(|| {
            OrmError::not_found(format!("{} {}", T::TYPE_NAME, record.record_key()))
        })?;
        self.map_into(record, row)
    }

    /// Read every declared relation of `record`.
    pub async fn load_relations<T: Record>(&self, record: &mut T) -> OrmResult<()> {
        let map = self.catalog.schema_map::<T>()?;
        self.load_relations_with(&map, record).await
    }

    async fn load_relations_with<T: Record>(
        &self,
        map: &SchemaMap<T>,
        record: &mut T,
    ) -> OrmResult<()> {
        for relation in map.relations() {
            relation.load(self, map, record).await?;
        }
        Ok(())
    }

    // ── writes ──────────────────────────────────────────────────────────────

    /// Insert or update `record`, then synchronize its relations.
    pub async fn save<T: Record>(&self, record: &mut T) -> OrmResult<()> {
        let map = self.catalog.schema_map::<T>()?;
        let compiler = self.compiler(&map);

        let stored = if record.is_new() {
            None
        } else {
            let probe = compiler.probe(&map.key_values(record))?;
            self.run_query(&probe).await?.into_iter().next()
        };

        let old = match stored {
            Some(row) => {
                if let Some(check) = &self.config().stale_check {
                    check.check(&row, &*record)?;
                }
                if let Some(update) = compiler.update(record, row.columns())? {
                    self.run_execute(&update).await?;
                }
                if map.relations().is_empty() {
                    None
                } else {
                    let mut old: T = self.map(&row)?;
                    self.load_relations_with(&map, &mut old).await?;
                    Some(old)
                }
            }
            None => {
                self.insert(&map, record).await?;
                None
            }
        };

        self.reload_with(&map, record).await?;

        for relation in map.relations() {
            relation.synchronize(self, &map, old.as_ref(), record).await?;
        }
        Ok(())
    }

    async fn insert<T: Record>(&self, map: &SchemaMap<T>, record: &mut T) -> OrmResult<()> {
        let compiler = self.compiler(map);
        let columns = self.run_describe(&compiler.describe()?).await?;
        let statement = compiler.insert(record, &columns)?;

        if !map.auto_id() {
            self.run_execute(&statement).await?;
            return Ok(());
        }

        let key = self.run_scalar(&statement).await?.ok_or_else(|| {
            OrmError::executor(format!("insert into {} returned no key", T::TYPE_NAME))
        })?;
        let field = map
            .key_fields()
            .first()
            .ok_or_else(|| OrmError::schema(format!("{}: no key fields", T::TYPE_NAME)))?;
        match record.set_path(field, key)? {
            PathWrite::Set => Ok(()),
            PathWrite::Missing { segment } => Err(OrmError::schema(format!(
                "{}: generated key has no field {segment}",
                T::TYPE_NAME
            ))),
        }
    }

    /// Delete the stored row of `record`. Relations are not followed.
    pub async fn delete<T: Record>(&self, record: &T) -> OrmResult<u64> {
        if record.is_new() {
            return Err(OrmError::validation(format!(
                "cannot delete an unsaved {}",
                T::TYPE_NAME
            )));
        }
        let map = self.catalog.schema_map::<T>()?;
        let statement = self.compiler(&map).delete_by_keys(&map.key_values(record))?;
        self.run_execute(&statement).await
    }

    pub async fn delete_by_keys<T: Record>(&self, keys: &[Value]) -> OrmResult<u64> {
        let map = self.catalog.schema_map::<T>()?;
        let statement = self.compiler(&map).delete_by_keys(keys)?;
        self.run_execute(&statement).await
    }

    /// Delete every row matching all `(field, value)` pairs. An empty filter is refused.
    pub async fn delete_where<T: Record>(&self, filter: &[(&str, Value)]) -> OrmResult<u64> {
        let map = self.catalog.schema_map::<T>()?;
        let statement = self.compiler(&map).delete_where(filter)?;
        self.run_execute(&statement).await
    }
}
