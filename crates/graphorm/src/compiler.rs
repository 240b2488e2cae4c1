//! SQL assembly for one record type.
//!
//! [`QueryCompiler`] turns a [`SchemaMap`] plus a [`QuerySpec`] (conditions,
//! ordering, row cap, source override) into a [`Statement`]. It also builds the
//! key-addressed statements used by save, reload and delete, and the statements a
//! relation needs to read children or maintain link rows.
//!
//! Output is deterministic: the same inputs always give the same text and
//! parameter order.

use crate::condition::{Condition, render_all};
use crate::dialect::Dialect;
use crate::error::{OrmError, OrmResult};
use crate::ident::Ident;
use crate::order::OrderSpec;
use crate::record::{DynRecord, Record, field_set};
use crate::schema::{ChildCollectionSpec, ReadCommand, SchemaMap, Variant, object_ident};
use crate::statement::{ParamList, Statement, StatementKind};
use crate::value::Value;

/// Base a select reads from.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Source {
    /// The map's table or views.
    #[default]
    Map,
    /// Another table or view.
    Object(Ident),
    /// A complete select used as-is.
    Sql(String),
}

/// Everything a select needs besides the schema map.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct QuerySpec {
    pub source: Source,
    pub conditions: Vec<Condition>,
    pub order: OrderSpec,
    /// Row cap, 0 for none.
    pub take: usize,
}

pub struct QueryCompiler<'m, T: Record> {
    map: &'m SchemaMap<T>,
    dialect: Dialect,
}

impl<'m, T: Record> QueryCompiler<'m, T> {
    pub fn new(map: &'m SchemaMap<T>, dialect: Dialect) -> Self {
        Self { map, dialect }
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    fn table_sql(&self) -> OrmResult<String> {
        Ok(self.map.table_ident()?.to_sql(self.dialect))
    }

    /// Quoted column from a configured name. Dots stay inside the one identifier.
    fn column_sql(&self, name: &str) -> OrmResult<String> {
        Ok(Ident::column(name)?.to_sql(self.dialect))
    }

    /// Select for `spec` in the given variant.
    ///
    /// Explicit ordering replaces the map's default ordering. Count selects carry no
    /// ordering and no row cap.
    pub fn select(&self, spec: &QuerySpec, variant: Variant) -> OrmResult<Statement> {
        let d = self.dialect;
        let mut params = ParamList::new(d);

        let mut sql = match (&spec.source, variant) {
            (Source::Sql(raw), Variant::Count) => format!("select count(*) from ({raw}) as counted"),
            (Source::Sql(raw), _) => raw.clone(),
            (Source::Object(ident), Variant::Count) => {
                format!("select count(*) from {}", ident.to_sql(d))
            }
            (Source::Object(ident), _) => format!("select * from {}", ident.to_sql(d)),
            (Source::Map, Variant::Count) => format!(
                "select count(*) from {}",
                self.map.source(Variant::Count)?.to_sql(d)
            ),
            (Source::Map, v) => format!("select * from {}", self.map.source(v)?.to_sql(d)),
        };

        if !spec.conditions.is_empty() {
            let predicate = render_all(&spec.conditions, &mut params)?;
            sql.push_str(" where ");
            sql.push_str(&predicate);
        }

        let kind = if variant == Variant::Count {
            StatementKind::Count
        } else {
            let order = if spec.order.is_empty() {
                self.map.default_order()
            } else {
                &spec.order
            };
            let order_sql = order.to_sql(d);
            if !order_sql.is_empty() {
                sql.push(' ');
                sql.push_str(&order_sql);
            }
            sql = d.apply_row_limit(&sql, spec.take);
            StatementKind::Select
        };

        Ok(Statement::new(kind, sql, params.into_values()))
    }

    fn check_key_count(&self, keys: &[Value]) -> OrmResult<()> {
        let expected = self.map.key_fields().len();
        if keys.len() != expected {
            return Err(OrmError::KeyCardinality {
                type_name: T::TYPE_NAME.to_string(),
                expected,
                actual: keys.len(),
            });
        }
        Ok(())
    }

    fn key_predicate(&self, keys: &[Value], params: &mut ParamList) -> OrmResult<String> {
        self.check_key_count(keys)?;
        let parts: Vec<String> = self
            .map
            .key_fields()
            .iter()
            .zip(keys)
            .map(|(field, value)| {
                let p = params.push(value.clone());
                format!("{} = {p}", self.dialect.quote(field))
            })
            .collect();
        Ok(parts.join(" and "))
    }

    /// Select one record by key from the short or full source.
    pub fn select_by_keys(&self, variant: Variant, keys: &[Value]) -> OrmResult<Statement> {
        let mut params = ParamList::new(self.dialect);
        let source = self.map.source(variant)?.to_sql(self.dialect);
        let predicate = self.key_predicate(keys, &mut params)?;
        Ok(Statement::new(
            StatementKind::Select,
            format!("select * from {source} where {predicate}"),
            params.into_values(),
        ))
    }

    /// Probe the write table for the stored row.
    pub fn probe(&self, keys: &[Value]) -> OrmResult<Statement> {
        let mut params = ParamList::new(self.dialect);
        let table = self.table_sql()?;
        let predicate = self.key_predicate(keys, &mut params)?;
        Ok(Statement::new(
            StatementKind::Select,
            format!("select * from {table} where {predicate}"),
            params.into_values(),
        ))
    }

    /// Zero-row select exposing the write table's columns.
    pub fn describe(&self) -> OrmResult<Statement> {
        Ok(Statement::new(
            StatementKind::Describe,
            format!("select * from {} where 1=0", self.table_sql()?),
            Vec::new(),
        ))
    }

    /// Values `record` contributes to the given table columns.
    ///
    /// A column is written when it is not skipped by the map and is either a declared
    /// reference, a scalar field, or an `<X>Id` column backed by a nested record `X`
    /// (null when `X` is unset).
    pub fn write_values(&self, record: &T, columns: &[String]) -> Vec<(String, Value)> {
        let fields = field_set::<T>();
        let mut out = Vec::new();
        for column in columns {
            if self.map.skips_on_write(column) {
                continue;
            }
            let value = if let Some(path) = self.map.reference(column) {
                record.field_value(path).unwrap_or(Value::Null)
            } else if let Some(value) = fields.get(record, column) {
                value
            } else if let Some(prefix) = column
                .strip_suffix("Id")
                .filter(|p| !p.is_empty() && fields.is_nested(p))
            {
                record
                    .field_value(&format!("{prefix}.Id"))
                    .unwrap_or(Value::Null)
            } else {
                continue;
            };
            out.push((column.clone(), value));
        }
        out
    }

    /// Insert into the write table.
    ///
    /// With a generated key the statement yields the new key as a scalar.
    pub fn insert(&self, record: &T, columns: &[String]) -> OrmResult<Statement> {
        let d = self.dialect;
        let table = self.table_sql()?;
        let values = self.write_values(record, columns);
        let mut params = ParamList::new(d);

        let mut sql = if values.is_empty() {
            format!("insert into {table} default values")
        } else {
            let cols: Vec<String> = values.iter().map(|(c, _)| d.quote(c)).collect();
            let placeholders: Vec<String> = values
                .into_iter()
                .map(|(_, v)| params.push(v))
                .collect();
            format!(
                "insert into {table} ({}) values ({})",
                cols.join(", "),
                placeholders.join(", ")
            )
        };

        if self.map.auto_id() {
            let key = self
                .map
                .key_fields()
                .first()
                .ok_or_else(|| OrmError::schema(format!("{}: no key fields", T::TYPE_NAME)))?;
            match d {
                Dialect::Postgres => {
                    sql.push_str(" returning ");
                    sql.push_str(&self.column_sql(key)?);
                }
                Dialect::SqlServer => sql.push_str("; select cast(scope_identity() as bigint)"),
            }
        }

        Ok(Statement::new(StatementKind::Insert, sql, params.into_values()))
    }

    /// Update the stored row. `None` when no column is writable.
    pub fn update(&self, record: &T, columns: &[String]) -> OrmResult<Option<Statement>> {
        let d = self.dialect;
        let values: Vec<(String, Value)> = self
            .write_values(record, columns)
            .into_iter()
            .filter(|(c, _)| !self.map.is_key(c))
            .collect();
        if values.is_empty() {
            return Ok(None);
        }

        let table = self.table_sql()?;
        let mut params = ParamList::new(d);
        let sets: Vec<String> = values
            .into_iter()
            .map(|(c, v)| format!("{} = {}", d.quote(&c), params.push(v)))
            .collect();
        let predicate = self.key_predicate(&self.map.key_values(record), &mut params)?;
        Ok(Some(Statement::new(
            StatementKind::Update,
            format!("update {table} set {} where {predicate}", sets.join(", ")),
            params.into_values(),
        )))
    }

    pub fn delete_by_keys(&self, keys: &[Value]) -> OrmResult<Statement> {
        let mut params = ParamList::new(self.dialect);
        let table = self.table_sql()?;
        let predicate = self.key_predicate(keys, &mut params)?;
        Ok(Statement::new(
            StatementKind::Delete,
            format!("delete from {table} where {predicate}"),
            params.into_values(),
        ))
    }

    /// Delete by field equality. An empty filter is refused.
    pub fn delete_where(&self, filter: &[(&str, Value)]) -> OrmResult<Statement> {
        if filter.is_empty() {
            return Err(OrmError::validation(format!(
                "delete on {} requires at least one filter field",
                T::TYPE_NAME
            )));
        }
        let conditions: Vec<Condition> = filter
            .iter()
            .map(|(field, value)| match value {
                Value::Null => Condition::default().field(*field).is_null(),
                v => Condition::default().field(*field).is_equal_to(v.clone()),
            })
            .collect();
        let mut params = ParamList::new(self.dialect);
        let predicate = render_all(&conditions, &mut params)?;
        Ok(Statement::new(
            StatementKind::Delete,
            format!("delete from {} where {predicate}", self.table_sql()?),
            params.into_values(),
        ))
    }

    /// Read the children of one parent.
    pub fn relation_read(&self, spec: &ChildCollectionSpec, master: Value) -> OrmResult<Statement> {
        let d = self.dialect;
        let parent = T::TYPE_NAME;
        let schema = self.map.schema_name();
        let mut params = ParamList::new(d);

        let (kind, sql) = match spec.read_command(parent) {
            ReadCommand::Source(name) => {
                let source = object_ident(schema, &name)?.to_sql(d);
                let column = self.column_sql(&spec.master_field_name(parent))?;
                let p = params.push(master);
                (
                    StatementKind::Select,
                    format!("select * from {source} where {column} = {p}"),
                )
            }
            ReadCommand::Procedure(name) => {
                let proc = object_ident(schema, &name)?.to_sql(d);
                let p = params.push(master);
                let sql = match d {
                    Dialect::SqlServer => format!("exec {proc} @{parent}Id = {p}"),
                    Dialect::Postgres => format!("select * from {proc}({p})"),
                };
                (StatementKind::Procedure, sql)
            }
            ReadCommand::Function(name) => {
                let func = object_ident(schema, &name)?.to_sql(d);
                let p = params.push(master);
                (StatementKind::Procedure, format!("select * from {func}({p})"))
            }
        };
        Ok(Statement::new(kind, sql, params.into_values()))
    }

    fn link_table(&self, spec: &ChildCollectionSpec) -> OrmResult<String> {
        spec.write_table(self.map.schema_name(), T::TYPE_NAME)?
            .map(|t| t.to_sql(self.dialect))
            .ok_or_else(|| OrmError::relation(&spec.property, "relation is read-only"))
    }

    /// Insert one n:m link row.
    pub fn link_insert(
        &self,
        spec: &ChildCollectionSpec,
        child_type: &str,
        master: Value,
        child: Value,
    ) -> OrmResult<Statement> {
        let d = self.dialect;
        let table = self.link_table(spec)?;
        let master_col = self.column_sql(&spec.master_field_name(T::TYPE_NAME))?;
        let child_col = self.column_sql(&spec.child_field_name(child_type))?;
        let mut params = ParamList::new(d);
        let p1 = params.push(master);
        let p2 = params.push(child);
        Ok(Statement::new(
            StatementKind::Insert,
            format!("insert into {table} ({master_col}, {child_col}) values ({p1}, {p2})"),
            params.into_values(),
        ))
    }

    /// Delete one n:m link row.
    pub fn link_delete(
        &self,
        spec: &ChildCollectionSpec,
        child_type: &str,
        master: Value,
        child: Value,
    ) -> OrmResult<Statement> {
        let d = self.dialect;
        let table = self.link_table(spec)?;
        let master_col = self.column_sql(&spec.master_field_name(T::TYPE_NAME))?;
        let child_col = self.column_sql(&spec.child_field_name(child_type))?;
        let mut params = ParamList::new(d);
        let p1 = params.push(master);
        let p2 = params.push(child);
        Ok(Statement::new(
            StatementKind::Delete,
            format!("delete from {table} where {master_col} = {p1} and {child_col} = {p2}"),
            params.into_values(),
        ))
    }
}

#[cfg(test)]
mod tests;
