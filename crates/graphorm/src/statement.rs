//! Compiled statements and positional parameter lists.

use crate::dialect::Dialect;
use crate::value::Value;
use std::fmt;

/// What a statement does. Drives executor dispatch and SQL tracing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    Select,
    Count,
    Insert,
    Update,
    Delete,
    /// Zero-row select used to learn a table's columns.
    Describe,
    /// Stored procedure or table function call returning rows.
    Procedure,
}

impl fmt::Display for StatementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StatementKind::Select => "select",
            StatementKind::Count => "count",
            StatementKind::Insert => "insert",
            StatementKind::Update => "update",
            StatementKind::Delete => "delete",
            StatementKind::Describe => "describe",
            StatementKind::Procedure => "procedure",
        };
        f.write_str(s)
    }
}

/// SQL text with its bound parameters in placeholder order.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<Value>,
    pub kind: StatementKind,
}

impl Statement {
    pub fn new(kind: StatementKind, sql: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            sql: sql.into(),
            params,
            kind,
        }
    }

    /// A raw select with parameters, e.g. for stored procedure callers.
    pub fn raw(sql: impl Into<String>, params: Vec<Value>) -> Self {
        Self::new(StatementKind::Select, sql, params)
    }
}

/// Collects parameters and hands out dialect placeholders.
///
/// Placeholders are numbered by push order and never reused.
#[derive(Debug)]
pub(crate) struct ParamList {
    dialect: Dialect,
    values: Vec<Value>,
}

impl ParamList {
    pub(crate) fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            values: Vec::new(),
        }
    }

    pub(crate) fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Bind a value and return its placeholder.
    pub(crate) fn push(&mut self, value: Value) -> String {
        self.values.push(value);
        self.dialect.placeholder(self.values.len())
    }

    pub(crate) fn into_values(self) -> Vec<Value> {
        self.values
    }
}
