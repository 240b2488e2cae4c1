//! Executor trait: the boundary between the engine and a database driver.
//!
//! The engine compiles [`Statement`]s and hands them to an executor; everything
//! that waits on I/O happens behind this trait.

use crate::error::OrmResult;
use crate::row::Row;
use crate::value::Value;
use std::sync::Arc;

pub use crate::statement::{Statement, StatementKind};

/// Runs compiled statements.
///
/// Implemented by [`PgExecutor`](crate::pg::PgExecutor) for tokio-postgres clients
/// and transactions, and by in-memory doubles in tests.
#[async_trait::async_trait]
pub trait Executor: Send + Sync {
    /// Run a statement and return all rows.
    async fn query(&self, statement: &Statement) -> OrmResult<Vec<Row>>;

    /// Run a statement and return the number of affected rows.
    async fn execute(&self, statement: &Statement) -> OrmResult<u64>;

    /// First column of the first row, if any. Used for generated keys and counts.
    async fn query_scalar(&self, statement: &Statement) -> OrmResult<Option<Value>> {
        let rows = self.query(statement).await?;
        Ok(rows.first().and_then(|row| row.value(0)).cloned())
    }

    /// Column names of the statement's result shape.
    async fn describe(&self, statement: &Statement) -> OrmResult<Vec<String>>;
}

#[async_trait::async_trait]
impl<E: Executor + ?Sized> Executor for Arc<E> {
    async fn query(&self, statement: &Statement) -> OrmResult<Vec<Row>> {
        (**self).query(statement).await
    }

    async fn execute(&self, statement: &Statement) -> OrmResult<u64> {
        (**self).execute(statement).await
    }

    async fn query_scalar(&self, statement: &Statement) -> OrmResult<Option<Value>> {
        (**self).query_scalar(statement).await
    }

    async fn describe(&self, statement: &Statement) -> OrmResult<Vec<String>> {
        (**self).describe(statement).await
    }
}

#[async_trait::async_trait]
impl<E: Executor + ?Sized> Executor for &E {
    async fn query(&self, statement: &Statement) -> OrmResult<Vec<Row>> {
        (**self).query(statement).await
    }

    async fn execute(&self, statement: &Statement) -> OrmResult<u64> {
        (**self).execute(statement).await
    }

    async fn query_scalar(&self, statement: &Statement) -> OrmResult<Option<Value>> {
        (**self).query_scalar(statement).await
    }

    async fn describe(&self, statement: &Statement) -> OrmResult<Vec<String>> {
        (**self).describe(statement).await
    }
}
