//! Ordering keys with deferred direction.
//!
//! `order_by`/`then_by` append a key whose direction is still open; the next
//! `ascending`/`descending` settles it. Settling with no open key is an error.

use crate::dialect::Dialect;
use crate::error::{OrmError, OrmResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderKey {
    pub field: String,
    pub descending: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderSpec {
    keys: Vec<OrderKey>,
    pending: bool,
}

impl OrderSpec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a key. Its direction stays open until settled (ascending if never settled).
    pub fn push(&mut self, field: impl Into<String>) {
        self.keys.push(OrderKey {
            field: field.into(),
            descending: false,
        });
        self.pending = true;
    }

    pub fn ascending(&mut self) -> OrmResult<()> {
        self.settle(false)
    }

    pub fn descending(&mut self) -> OrmResult<()> {
        self.settle(true)
    }

    fn settle(&mut self, descending: bool) -> OrmResult<()> {
        if !self.pending {
            return Err(OrmError::validation(
                "ordering direction given without a pending order key",
            ));
        }
        if let Some(last) = self.keys.last_mut() {
            last.descending = descending;
        }
        self.pending = false;
        Ok(())
    }

    pub fn keys(&self) -> &[OrderKey] {
        &self.keys
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// `order by "A", "B" desc`, or an empty string.
    pub(crate) fn to_sql(&self, dialect: Dialect) -> String {
        if self.keys.is_empty() {
            return String::new();
        }
        let parts: Vec<String> = self
            .keys
            .iter()
            .map(|k| {
                let col = dialect.quote(&k.field);
                if k.descending {
                    format!("{col} desc")
                } else {
                    col
                }
            })
            .collect();
        format!("order by {}", parts.join(", "))
    }
}
