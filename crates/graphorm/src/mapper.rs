//! Row to record mapping.
//!
//! A [`RowMapper`] belongs to one record type. For every column name it sees it
//! decides once how the column lands on the record, and keeps that decision:
//!
//! 1. `<TypeName>Id` is read as `Id` when the `type_id_alias` convention is on.
//! 2. Null values are skipped; they never overwrite what the record already holds.
//! 3. Dotted names (`Company.Country.Name`) walk nested records, creating unset ones.
//! 4. `<X>Id` goes to `X.Id` when `X` is a nested record with an `Id` field.
//! 5. Otherwise the same-named writable field is set.
//! 6. Anything else is unmapped: an error in strict mode, a diagnostic when
//!    `log_unmapped` is on, silently skipped otherwise.
//!
//! Problems with one column never abort the rest of the row in lenient mode.

use crate::config::MapperConfig;
use crate::diagnostics::{Diagnostic, DiagnosticSink};
use crate::error::{OrmError, OrmResult};
use crate::record::{DynRecord, FieldSet, PathWrite, Record, field_set};
use crate::row::Row;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

#[derive(Debug, Clone, PartialEq, Eq)]
enum ColumnPlan {
    Field(String),
    Path(String),
    Unmapped,
}

#[derive(Debug, Clone, Copy)]
struct MapOptions {
    strict: bool,
    log_unmapped: bool,
    type_id_alias: bool,
}

/// Maps rows into records of type `T`.
pub struct RowMapper<T: Record> {
    fields: Arc<FieldSet<T>>,
    plans: RwLock<HashMap<String, Arc<ColumnPlan>>>,
    options: MapOptions,
    diagnostics: Arc<dyn DiagnosticSink>,
}

impl<T: Record> RowMapper<T> {
    pub fn new(config: &MapperConfig) -> Self {
        Self {
            fields: field_set::<T>(),
            plans: RwLock::new(HashMap::new()),
            options: MapOptions {
                strict: config.strict_mapping,
                log_unmapped: config.log_unmapped,
                type_id_alias: config.type_id_alias,
            },
            diagnostics: config.diagnostics.clone(),
        }
    }

    fn plan_for(&self, column: &str) -> Arc<ColumnPlan> {
        if let Some(plan) = self
            .plans
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(column)
        {
            return plan.clone();
        }

        let plan = Arc::new(self.resolve(column));
        self.plans
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(column.to_string())
            .or_insert(plan)
            .clone()
    }

    fn resolve(&self, column: &str) -> ColumnPlan {
        let fields = &self.fields;
        let alias = format!("{}Id", T::TYPE_NAME);
        let name = if self.options.type_id_alias && column == alias && fields.contains("Id") {
            "Id"
        } else {
            column
        };

        if name.contains('.') {
            return ColumnPlan::Path(name.to_string());
        }
        if let Some(prefix) = name.strip_suffix("Id").filter(|p| !p.is_empty()) {
            if fields.nested_has_field(prefix, "Id") {
                return ColumnPlan::Path(format!("{prefix}.Id"));
            }
        }
        if fields.is_writable(name) {
            return ColumnPlan::Field(name.to_string());
        }
        ColumnPlan::Unmapped
    }

    fn plans(&self, row: &Row) -> Vec<Arc<ColumnPlan>> {
        row.columns().iter().map(|c| self.plan_for(c)).collect()
    }

    /// Map a row into a new record.
    pub fn map(&self, row: &Row) -> OrmResult<T> {
        let mut record = T::default();
        self.map_into(&mut record, row)?;
        Ok(record)
    }

    /// Merge a row into an existing record.
    pub fn map_into(&self, record: &mut T, row: &Row) -> OrmResult<()> {
        let plans = self.plans(row);
        self.apply(record, row, &plans)
    }

    /// Map every row. Column plans are looked up once for the whole set.
    pub fn map_all(&self, rows: &[Row]) -> OrmResult<Vec<T>> {
        let Some(first) = rows.first() else {
            return Ok(Vec::new());
        };
        let plans = self.plans(first);
        rows.iter()
            .map(|row| {
                let mut record = T::default();
                if row.columns() == first.columns() {
                    self.apply(&mut record, row, &plans)?;
                } else {
                    self.map_into(&mut record, row)?;
                }
                Ok(record)
            })
            .collect()
    }

    fn apply(&self, record: &mut T, row: &Row, plans: &[Arc<ColumnPlan>]) -> OrmResult<()> {
        for ((column, value), plan) in row.iter().zip(plans) {
            if value.is_null() {
                continue;
            }
            match plan.as_ref() {
                ColumnPlan::Field(name) => match record.set_field(name, value.clone()) {
                    Ok(_) => {}
                    Err(err) => self.decode_failed(column, err)?,
                },
                ColumnPlan::Path(path) => match record.set_path(path, value.clone()) {
                    Ok(PathWrite::Set) => {}
                    Ok(PathWrite::Missing { segment }) => self.unresolved(column, &segment)?,
                    Err(err) => self.decode_failed(column, err)?,
                },
                ColumnPlan::Unmapped => self.unmapped(column)?,
            }
        }
        Ok(())
    }

    fn decode_failed(&self, column: &str, err: OrmError) -> OrmResult<()> {
        if self.options.strict {
            return Err(err);
        }
        let message = match err {
            OrmError::Decode { message, .. } => message,
            other => other.to_string(),
        };
        self.diagnostics.report(Diagnostic::ColumnDecode {
            type_name: T::TYPE_NAME.to_string(),
            column: column.to_string(),
            message,
        });
        Ok(())
    }

    fn unresolved(&self, column: &str, segment: &str) -> OrmResult<()> {
        if self.options.strict {
            return Err(OrmError::mapping(T::TYPE_NAME, column));
        }
        self.diagnostics.report(Diagnostic::UnresolvedPath {
            type_name: T::TYPE_NAME.to_string(),
            column: column.to_string(),
            segment: segment.to_string(),
        });
        Ok(())
    }

    fn unmapped(&self, column: &str) -> OrmResult<()> {
        if self.options.strict {
            return Err(OrmError::mapping(T::TYPE_NAME, column));
        }
        if self.options.log_unmapped {
            self.diagnostics.report(Diagnostic::UnmappedColumn {
                type_name: T::TYPE_NAME.to_string(),
                column: column.to_string(),
            });
        }
        Ok(())
    }

    /// Number of distinct column names planned so far.
    pub fn planned_columns(&self) -> usize {
        self.plans
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
