//! Mapper configuration.
//!
//! Everything that used to be an ambient global switch lives on [`MapperConfig`],
//! which is handed to [`Catalog::new`](crate::Catalog::new) and shared from there.

use crate::diagnostics::{DiagnosticSink, TracingSink};
use crate::dialect::Dialect;
use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::Arc;

/// Source of the canonical current time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock frozen at one instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Derives a table name from a record type name.
pub trait TableNaming: Send + Sync {
    fn table_name(&self, type_name: &str) -> String;
}

/// English plural of the type name: `Customer` → `Customers`, `Category` → `Categories`.
#[derive(Debug, Clone, Copy, Default)]
pub struct PluralNaming;

impl TableNaming for PluralNaming {
    fn table_name(&self, base: &str) -> String {
        if base.ends_with('y')
            && base.len() > 1
            && !matches!(
                base.chars().nth(base.len() - 2),
                Some('a' | 'e' | 'i' | 'o' | 'u')
            )
        {
            format!("{}ies", &base[..base.len() - 1])
        } else if base.ends_with('s')
            || base.ends_with('x')
            || base.ends_with('z')
            || base.ends_with("ch")
            || base.ends_with("sh")
        {
            format!("{base}es")
        } else {
            format!("{base}s")
        }
    }
}

/// Uses the type name unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct SingularNaming;

impl TableNaming for SingularNaming {
    fn table_name(&self, type_name: &str) -> String {
        type_name.to_string()
    }
}

/// Configuration shared by the compiler, mapper and synchronizer.
#[derive(Clone)]
pub struct MapperConfig {
    pub dialect: Dialect,
    /// Unresolvable columns fail the mapping instead of being skipped.
    pub strict_mapping: bool,
    /// Report unresolvable columns to the diagnostic sink.
    pub log_unmapped: bool,
    /// Emit every statement as a `tracing` debug event on target `graphorm.sql`.
    pub trace_sql: bool,
    /// Treat a `<TypeName>Id` column as the key column `Id` on the top-level type.
    pub type_id_alias: bool,
    /// Schema for maps that do not name one. Falls back to the dialect default.
    pub default_schema: Option<String>,
    pub naming: Arc<dyn TableNaming>,
    pub clock: Arc<dyn Clock>,
    pub diagnostics: Arc<dyn DiagnosticSink>,
    /// Optional check run against the stored row before an update.
    pub stale_check: Option<Arc<dyn crate::dao::StaleCheck>>,
}

impl Default for MapperConfig {
    fn default() -> Self {
        Self {
            dialect: Dialect::default(),
            strict_mapping: false,
            log_unmapped: false,
            trace_sql: false,
            type_id_alias: true,
            default_schema: None,
            naming: Arc::new(PluralNaming),
            clock: Arc::new(SystemClock),
            diagnostics: Arc::new(TracingSink),
            stale_check: None,
        }
    }
}

impl fmt::Debug for MapperConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MapperConfig")
            .field("dialect", &self.dialect)
            .field("strict_mapping", &self.strict_mapping)
            .field("log_unmapped", &self.log_unmapped)
            .field("trace_sql", &self.trace_sql)
            .field("type_id_alias", &self.type_id_alias)
            .field("default_schema", &self.default_schema)
            .field("stale_check", &self.stale_check.is_some())
            .finish_non_exhaustive()
    }
}

impl MapperConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = dialect;
        self
    }

    /// Fail on columns that resolve to no field.
    pub fn strict(mut self) -> Self {
        self.strict_mapping = true;
        self
    }

    pub fn with_log_unmapped(mut self, on: bool) -> Self {
        self.log_unmapped = on;
        self
    }

    pub fn with_trace_sql(mut self, on: bool) -> Self {
        self.trace_sql = on;
        self
    }

    /// Turn the `<TypeName>Id` → `Id` column convention on or off.
    pub fn with_type_id_alias(mut self, on: bool) -> Self {
        self.type_id_alias = on;
        self
    }

    pub fn with_default_schema(mut self, schema: impl Into<String>) -> Self {
        self.default_schema = Some(schema.into());
        self
    }

    pub fn with_naming(mut self, naming: impl TableNaming + 'static) -> Self {
        self.naming = Arc::new(naming);
        self
    }

    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    pub fn with_diagnostics(mut self, sink: Arc<dyn DiagnosticSink>) -> Self {
        self.diagnostics = sink;
        self
    }

    pub fn with_stale_check(mut self, check: impl crate::dao::StaleCheck + 'static) -> Self {
        self.stale_check = Some(Arc::new(check));
        self
    }

    /// Configured schema or the dialect default.
    pub fn schema(&self) -> &str {
        self.default_schema
            .as_deref()
            .unwrap_or_else(|| self.dialect.default_schema())
    }
}
