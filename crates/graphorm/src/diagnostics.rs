//! Non-fatal mapping and relation anomalies.
//!
//! The row mapper and relation synchronizer recover locally from per-column and
//! per-relation problems. What they skipped is reported through a [`DiagnosticSink`].

use serde::Serialize;
use std::sync::Mutex;

/// A recovered anomaly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Diagnostic {
    /// A column matched no field. Only reported when `log_unmapped` is on.
    UnmappedColumn { type_name: String, column: String },
    /// A dotted column stopped at a segment that is not a nested record.
    UnresolvedPath {
        type_name: String,
        column: String,
        segment: String,
    },
    /// A value could not be converted into the field type.
    ColumnDecode {
        type_name: String,
        column: String,
        message: String,
    },
    /// The driver could not read a column value. The column is returned as null.
    ColumnRead {
        sql_type: String,
        column: String,
        message: String,
    },
    /// A relation (or one of its rows) was left unsynchronized.
    RelationSkipped {
        type_name: String,
        relation: String,
        reason: String,
    },
}

impl Diagnostic {
    pub fn type_name(&self) -> &str {
        match self {
            Diagnostic::UnmappedColumn { type_name, .. }
            | Diagnostic::UnresolvedPath { type_name, .. }
            | Diagnostic::ColumnDecode { type_name, .. }
            | Diagnostic::RelationSkipped { type_name, .. } => type_name,
            Diagnostic::ColumnRead { sql_type, .. } => sql_type,
        }
    }
}

/// Receiver for [`Diagnostic`]s.
pub trait DiagnosticSink: Send + Sync {
    fn report(&self, diagnostic: Diagnostic);
}

/// Discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl DiagnosticSink for NoopSink {
    fn report(&self, _diagnostic: Diagnostic) {}
}

/// Emits a `tracing` warning per diagnostic on target `graphorm.mapper` (`graphorm.pg` for column reads).
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn report(&self, diagnostic: Diagnostic) {
        match &diagnostic {
            Diagnostic::UnmappedColumn { type_name, column } => {
                tracing::warn!(target: "graphorm.mapper", %type_name, %column, "unmapped column");
            }
            Diagnostic::UnresolvedPath {
                type_name,
                column,
                segment,
            } => {
                tracing::warn!(
                    target: "graphorm.mapper",
                    %type_name,
                    %column,
                    %segment,
                    "unresolved path segment"
                );
            }
            Diagnostic::ColumnDecode {
                type_name,
                column,
                message,
            } => {
                tracing::warn!(target: "graphorm.mapper", %type_name, %column, %message, "column skipped");
            }
            Diagnostic::ColumnRead {
                sql_type,
                column,
                message,
            } => {
                tracing::warn!(target: "graphorm.pg", %sql_type, %column, %message, "column read as null");
            }
            Diagnostic::RelationSkipped {
                type_name,
                relation,
                reason,
            } => {
                tracing::warn!(target: "graphorm.mapper", %type_name, %relation, %reason, "relation skipped");
            }
        }
    }
}

/// Keeps diagnostics in memory until taken.
#[derive(Debug, Default)]
pub struct CollectingSink {
    items: Mutex<Vec<Diagnostic>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drain everything reported so far.
    pub fn take(&self) -> Vec<Diagnostic> {
        let mut items = self
            .items
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        std::mem::take(&mut *items)
    }
}

impl DiagnosticSink for CollectingSink {
    fn report(&self, diagnostic: Diagnostic) {
        self.items
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(diagnostic);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collecting_sink_drains() {
        let sink = CollectingSink::new();
        sink.report(Diagnostic::UnmappedColumn {
            type_name: "Customer".into(),
            column: "Nickname".into(),
        });
        let taken = sink.take();
        assert_eq!(taken.len(), 1);
        assert_eq!(taken[0].type_name(), "Customer");
        assert!(sink.take().is_empty());
    }

    #[test]
    fn serializes_with_kind_tag() {
        let d = Diagnostic::RelationSkipped {
            type_name: "Order".into(),
            relation: "Lines".into(),
            reason: "collection not loaded".into(),
        };
        let json = serde_json::to_value(&d).unwrap();
        assert_eq!(json["kind"], "relation_skipped");
        assert_eq!(json["relation"], "Lines");
    }
}
