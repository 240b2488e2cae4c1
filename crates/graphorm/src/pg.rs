//! tokio-postgres executor.
//!
//! [`PgExecutor`] wraps anything implementing [`tokio_postgres::GenericClient`], so
//! the same engine code runs on a plain client or inside a transaction:
//!
//! ```ignore
//! let executor = PgExecutor::new(client.transaction().await?);
//! let dao = Dao::new(&executor, catalog.clone());
//! dao.save(&mut order).await?;
//! drop(dao);
//! executor.into_inner().commit().await?;
//! ```

use crate::diagnostics::{Diagnostic, DiagnosticSink, TracingSink};
use crate::error::{OrmError, OrmResult};
use crate::executor::Executor;
use crate::row::Row;
use crate::statement::Statement;
use crate::value::Value;
use bytes::BytesMut;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use std::error::Error;
use std::fmt;
use std::sync::Arc;
use tokio_postgres::GenericClient;
use tokio_postgres::types::{FromSql, IsNull, ToSql, Type};

type BoxError = Box<dyn Error + Sync + Send>;

fn encode<T: ToSql>(value: &T, ty: &Type, out: &mut BytesMut) -> Result<IsNull, BoxError> {
    if !T::accepts(ty) {
        return Err(format!("cannot encode {} as {ty}", std::any::type_name::<T>()).into());
    }
    value.to_sql(ty, out)
}

impl ToSql for Value {
    fn to_sql(&self, ty: &Type, out: &mut BytesMut) -> Result<IsNull, BoxError> {
        match self {
            Value::Null => Ok(IsNull::Yes),
            Value::Bool(v) => encode(v, ty, out),
            Value::Int(v) => match *ty {
                Type::INT2 => encode(&i16::try_from(*v)?, ty, out),
                Type::INT4 => encode(&i32::try_from(*v)?, ty, out),
                Type::FLOAT8 => encode(&(*v as f64), ty, out),
                _ => encode(v, ty, out),
            },
            Value::Float(v) => match *ty {
                Type::FLOAT4 => encode(&(*v as f32), ty, out),
                _ => encode(v, ty, out),
            },
            Value::Text(v) => encode(v, ty, out),
            Value::Uuid(v) => encode(v, ty, out),
            Value::Timestamp(v) => encode(v, ty, out),
            Value::DateTime(v) => encode(v, ty, out),
            Value::Date(v) => encode(v, ty, out),
            Value::Bytes(v) => encode(v, ty, out),
            Value::Json(v) => encode(v, ty, out),
        }
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }

    tokio_postgres::types::to_sql_checked!();
}

/// How a column is pulled out of a driver row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReadAs {
    Bool,
    Int2,
    Int4,
    Int8,
    Float4,
    Float8,
    Numeric,
    Text,
    Uuid,
    Timestamptz,
    Timestamp,
    Date,
    Bytes,
    Json,
    Unsupported,
}

fn read_as(ty: &Type) -> ReadAs {
    match *ty {
        Type::BOOL => ReadAs::Bool,
        Type::INT2 => ReadAs::Int2,
        Type::INT4 => ReadAs::Int4,
        Type::INT8 => ReadAs::Int8,
        Type::FLOAT4 => ReadAs::Float4,
        Type::FLOAT8 => ReadAs::Float8,
        Type::NUMERIC => ReadAs::Numeric,
        Type::UUID => ReadAs::Uuid,
        Type::TIMESTAMPTZ => ReadAs::Timestamptz,
        Type::TIMESTAMP => ReadAs::Timestamp,
        Type::DATE => ReadAs::Date,
        Type::BYTEA => ReadAs::Bytes,
        Type::JSON | Type::JSONB => ReadAs::Json,
        ref other if <String as FromSql>::accepts(other) => ReadAs::Text,
        _ => ReadAs::Unsupported,
    }
}

fn get<'a, T: FromSql<'a>>(row: &'a tokio_postgres::Row, idx: usize) -> Result<Option<T>, String> {
    row.try_get::<_, Option<T>>(idx).map_err(|e| e.to_string())
}

fn read_value(row: &tokio_postgres::Row, idx: usize) -> Result<Value, String> {
    let ty = row.columns()[idx].type_();
    let value = match read_as(ty) {
        ReadAs::Bool => get::<bool>(row, idx)?.map(Value::Bool),
        ReadAs::Int2 => get::<i16>(row, idx)?.map(|v| Value::Int(v.into())),
        ReadAs::Int4 => get::<i32>(row, idx)?.map(|v| Value::Int(v.into())),
        ReadAs::Int8 => get::<i64>(row, idx)?.map(Value::Int),
        ReadAs::Float4 => get::<f32>(row, idx)?.map(|v| Value::Float(v.into())),
        ReadAs::Float8 => get::<f64>(row, idx)?.map(Value::Float),
        ReadAs::Numeric => get::<Decimal>(row, idx)?
            .map(|d| {
                d.to_f64()
                    .map(Value::Float)
                    .ok_or_else(|| format!("numeric {d} does not fit a float"))
            })
            .transpose()?,
        ReadAs::Text => get::<String>(row, idx)?.map(Value::Text),
        ReadAs::Uuid => get::<uuid::Uuid>(row, idx)?.map(Value::Uuid),
        ReadAs::Timestamptz => get::<DateTime<Utc>>(row, idx)?.map(Value::Timestamp),
        ReadAs::Timestamp => get::<NaiveDateTime>(row, idx)?.map(Value::DateTime),
        ReadAs::Date => get::<NaiveDate>(row, idx)?.map(Value::Date),
        ReadAs::Bytes => get::<Vec<u8>>(row, idx)?.map(Value::Bytes),
        ReadAs::Json => get::<serde_json::Value>(row, idx)?.map(Value::Json),
        ReadAs::Unsupported => return Err(format!("unsupported column type {ty}")),
    };
    Ok(value.unwrap_or(Value::Null))
}

/// A column that cannot be read becomes null and is reported; the rest of the row stands.
fn recover(
    read: Result<Value, String>,
    column: &str,
    ty: &Type,
    diagnostics: &dyn DiagnosticSink,
) -> Value {
    read.unwrap_or_else(|message| {
        diagnostics.report(Diagnostic::ColumnRead {
            sql_type: ty.name().to_string(),
            column: column.to_string(),
            message,
        });
        Value::Null
    })
}

fn convert_rows(rows: &[tokio_postgres::Row], diagnostics: &dyn DiagnosticSink) -> Vec<Row> {
    let Some(first) = rows.first() else {
        return Vec::new();
    };
    let columns: Arc<[String]> = first
        .columns()
        .iter()
        .map(|c| c.name().to_string())
        .collect();
    rows.iter()
        .map(|row| {
            let values = row
                .columns()
                .iter()
                .enumerate()
                .map(|(idx, c)| recover(read_value(row, idx), c.name(), c.type_(), diagnostics))
                .collect();
            Row::new(columns.clone(), values)
        })
        .collect()
}

fn bind(statement: &Statement) -> Vec<&(dyn ToSql + Sync)> {
    statement
        .params
        .iter()
        .map(|v| v as &(dyn ToSql + Sync))
        .collect()
}

/// [`Executor`] over a tokio-postgres client or transaction.
///
/// Column values the driver cannot read come back as null and are reported to the
/// executor's diagnostic sink ([`TracingSink`] unless replaced).
pub struct PgExecutor<C> {
    client: C,
    diagnostics: Arc<dyn DiagnosticSink>,
}

impl<C: fmt::Debug> fmt::Debug for PgExecutor<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PgExecutor")
            .field("client", &self.client)
            .finish_non_exhaustive()
    }
}

impl<C> PgExecutor<C> {
    pub fn new(client: C) -> Self {
        Self {
            client,
            diagnostics: Arc::new(TracingSink),
        }
    }

    pub fn with_diagnostics(mut self, sink: Arc<dyn DiagnosticSink>) -> Self {
        self.diagnostics = sink;
        self
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn into_inner(self) -> C {
        self.client
    }
}

#[async_trait::async_trait]
impl<C> Executor for PgExecutor<C>
where
    C: GenericClient + Send + Sync,
{
    async fn query(&self, statement: &Statement) -> OrmResult<Vec<Row>> {
        let params = bind(statement);
        let rows = self
            .client
            .query(statement.sql.as_str(), &params)
            .await
            .map_err(OrmError::from_db_error)?;
        Ok(convert_rows(&rows, self.diagnostics.as_ref()))
    }

    async fn execute(&self, statement: &Statement) -> OrmResult<u64> {
        let params = bind(statement);
        self.client
            .execute(statement.sql.as_str(), &params)
            .await
            .map_err(OrmError::from_db_error)
    }

    async fn describe(&self, statement: &Statement) -> OrmResult<Vec<String>> {
        let prepared = self
            .client
            .prepare(&statement.sql)
            .await
            .map_err(OrmError::from_db_error)?;
        Ok(prepared
            .columns()
            .iter()
            .map(|c| c.name().to_string())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::CollectingSink;
    use tokio_postgres::types::Kind;

    #[test]
    fn null_encodes_as_sql_null() {
        let mut buf = BytesMut::new();
        let r = Value::Null.to_sql(&Type::INT4, &mut buf).unwrap();
        assert!(matches!(r, IsNull::Yes));
        assert!(buf.is_empty());
    }

    #[test]
    fn int_narrows_to_column_width() {
        let mut buf = BytesMut::new();
        Value::Int(7).to_sql(&Type::INT4, &mut buf).unwrap();
        assert_eq!(&buf[..], &7i32.to_be_bytes());

        let mut buf = BytesMut::new();
        Value::Int(7).to_sql(&Type::INT8, &mut buf).unwrap();
        assert_eq!(&buf[..], &7i64.to_be_bytes());
    }

    #[test]
    fn out_of_range_int_is_rejected() {
        let mut buf = BytesMut::new();
        assert!(Value::Int(70_000).to_sql(&Type::INT2, &mut buf).is_err());
    }

    #[test]
    fn column_types_pick_a_reader() {
        assert_eq!(read_as(&Type::NUMERIC), ReadAs::Numeric);
        assert_eq!(read_as(&Type::VARCHAR), ReadAs::Text);
        assert_eq!(read_as(&Type::INTERVAL), ReadAs::Unsupported);
        assert_eq!(read_as(&Type::INT4_ARRAY), ReadAs::Unsupported);

        let citext = Type::new("citext".into(), 90_001, Kind::Simple, "public".into());
        assert_eq!(read_as(&citext), ReadAs::Text);
        let mood = Type::new(
            "mood".into(),
            90_002,
            Kind::Enum(vec!["sad".into(), "ok".into()]),
            "public".into(),
        );
        assert_eq!(read_as(&mood), ReadAs::Unsupported);
    }

    #[test]
    fn unreadable_column_becomes_null_and_is_reported() {
        let sink = CollectingSink::new();
        let value = recover(
            Err("unsupported column type interval".into()),
            "Elapsed",
            &Type::INTERVAL,
            &sink,
        );
        assert_eq!(value, Value::Null);
        assert_eq!(
            sink.take(),
            vec![Diagnostic::ColumnRead {
                sql_type: "interval".into(),
                column: "Elapsed".into(),
                message: "unsupported column type interval".into(),
            }]
        );

        let value = recover(Ok(Value::Int(3)), "Qty", &Type::INT4, &sink);
        assert_eq!(value, Value::Int(3));
        assert!(sink.take().is_empty());
    }

    #[test]
    fn mismatched_type_is_rejected() {
        let mut buf = BytesMut::new();
        assert!(Value::Text("x".into()).to_sql(&Type::INT4, &mut buf).is_err());
    }
}
