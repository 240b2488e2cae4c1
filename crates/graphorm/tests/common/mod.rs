//! Shared models and a scripted executor for integration tests.
#![allow(dead_code)]

use chrono::{DateTime, Utc};
use graphorm::{
    Catalog, ChildCollectionSpec, Executor, MapperConfig, OrmError, OrmResult, Record, Row,
    Statement, Value,
};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Default, PartialEq, Record)]
pub struct Customer {
    pub id: i64,
    pub name: String,
    #[orm(last_change)]
    pub last_change: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Record)]
#[orm(schema = "sales")]
pub struct OrderLine {
    pub id: i64,
    pub order_id: i64,
    pub product: String,
    pub qty: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Record)]
#[orm(schema = "sales")]
pub struct Tag {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Record)]
#[orm(schema = "sales")]
pub struct Order {
    pub id: i64,
    #[orm(nested)]
    pub customer: Option<Customer>,
    pub total: f64,
    #[orm(collection)]
    pub lines: Option<Vec<OrderLine>>,
    #[orm(collection)]
    pub tags: Option<Vec<Tag>>,
}

/// Catalog with `Order` relations registered.
pub fn catalog(config: MapperConfig) -> Arc<Catalog> {
    let catalog = Catalog::new(config);
    catalog
        .register::<Order, _>(|map| {
            map.with_many::<OrderLine>(ChildCollectionSpec::new("Lines"))
                .with_many_to_many::<Tag>(ChildCollectionSpec::new("Tags"))
        })
        .unwrap();
    Arc::new(catalog)
}

pub fn row<const N: usize>(pairs: [(&str, Value); N]) -> Row {
    Row::from_pairs(pairs)
}

/// What the executor answers to one statement.
pub enum Reply {
    Rows(Vec<Row>),
    Columns(&'static [&'static str]),
    Affected(u64),
}

/// Executor that expects an exact sequence of statements.
#[derive(Default)]
pub struct ScriptedExecutor {
    script: Mutex<VecDeque<(String, Reply)>>,
    log: Mutex<Vec<Statement>>,
}

impl ScriptedExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn expect(self, sql: &str, reply: Reply) -> Self {
        self.script
            .lock()
            .unwrap()
            .push_back((sql.to_string(), reply));
        self
    }

    fn next(&self, statement: &Statement) -> OrmResult<Reply> {
        self.log.lock().unwrap().push(statement.clone());
        let (expected, reply) = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| OrmError::executor(format!("unexpected statement: {}", statement.sql)))?;
        if expected != statement.sql {
            return Err(OrmError::executor(format!(
                "expected `{expected}`, got `{}`",
                statement.sql
            )));
        }
        Ok(reply)
    }

    pub fn log(&self) -> Vec<Statement> {
        self.log.lock().unwrap().clone()
    }

    pub fn assert_finished(&self) {
        let left: Vec<String> = self
            .script
            .lock()
            .unwrap()
            .iter()
            .map(|(sql, _)| sql.clone())
            .collect();
        assert!(left.is_empty(), "statements never ran: {left:?}");
    }
}

#[async_trait::async_trait]
impl Executor for ScriptedExecutor {
    async fn query(&self, statement: &Statement) -> OrmResult<Vec<Row>> {
        match self.next(statement)? {
            Reply::Rows(rows) => Ok(rows),
            _ => Ok(Vec::new()),
        }
    }

    async fn execute(&self, statement: &Statement) -> OrmResult<u64> {
        match self.next(statement)? {
            Reply::Affected(n) => Ok(n),
            _ => Ok(0),
        }
    }

    async fn describe(&self, statement: &Statement) -> OrmResult<Vec<String>> {
        match self.next(statement)? {
            Reply::Columns(columns) => Ok(columns.iter().map(|c| c.to_string()).collect()),
            _ => Err(OrmError::executor("describe expects columns")),
        }
    }
}
