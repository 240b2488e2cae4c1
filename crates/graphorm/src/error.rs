//! Error types for graphorm

use thiserror::Error;

/// Result type alias for graphorm operations
pub type OrmResult<T> = Result<T, OrmError>;

/// Error types for mapping, query compilation and persistence
#[derive(Debug, Error)]
pub enum OrmError {
    /// Executor failure reported by a driver that is not tokio-postgres
    #[error("Executor error: {0}")]
    Executor(String),

    /// Query execution error
    #[cfg(feature = "postgres")]
    #[error("Query error: {0}")]
    Query(#[from] tokio_postgres::Error),

    /// Row not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Unique constraint violation
    #[error("Unique constraint violation: {0}")]
    UniqueViolation(String),

    /// Foreign key constraint violation
    #[error("Foreign key violation: {0}")]
    ForeignKeyViolation(String),

    /// Check constraint violation
    #[error("Check constraint violation: {0}")]
    CheckViolation(String),

    /// A value could not be converted to or from a field type
    #[error("Decode error on column '{column}': {message}")]
    Decode { column: String, message: String },

    /// A column could not be resolved to any field while strict mapping is on
    #[error("Mapping error: column '{column}' has no field on {type_name}")]
    Mapping { type_name: String, column: String },

    /// A condition leaf cannot be rendered
    #[error("Condition error: {0}")]
    Condition(String),

    /// Composite key values do not match the declared key fields
    #[error("Key cardinality mismatch on {type_name}: expected {expected} key value(s), got {actual}")]
    KeyCardinality {
        type_name: String,
        expected: usize,
        actual: usize,
    },

    /// A relation references a field the record does not expose
    #[error("Relation '{relation}': {message}")]
    RelationIntegrity { relation: String, message: String },

    /// The stored row changed since the record was read
    #[error("Stale data: {0}")]
    StaleData(String),

    /// Invalid schema map registration
    #[error("Schema error: {0}")]
    Schema(String),

    /// Validation error (builder misuse, unsafe statements)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Other errors
    #[error("{0}")]
    Other(String),
}

impl OrmError {
    /// Create a decode error for a specific column
    pub fn decode(column: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            column: column.into(),
            message: message.into(),
        }
    }

    /// Create a mapping error for an unresolved column
    pub fn mapping(type_name: impl Into<String>, column: impl Into<String>) -> Self {
        Self::Mapping {
            type_name: type_name.into(),
            column: column.into(),
        }
    }

    /// Create a condition compile error
    pub fn condition(message: impl Into<String>) -> Self {
        Self::Condition(message.into())
    }

    /// Create a relation integrity error
    pub fn relation(relation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::RelationIntegrity {
            relation: relation.into(),
            message: message.into(),
        }
    }

    /// Create a schema registration error
    pub fn schema(message: impl Into<String>) -> Self {
        Self::Schema(message.into())
    }

    /// Create an executor error
    pub fn executor(message: impl Into<String>) -> Self {
        Self::Executor(message.into())
    }

    /// Create a not found error
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Check if this is a not found error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Check if this is a unique violation error
    pub fn is_unique_violation(&self) -> bool {
        matches!(self, Self::UniqueViolation(_))
    }

    /// Check if this is a stale data error
    pub fn is_stale(&self) -> bool {
        matches!(self, Self::StaleData(_))
    }

    /// Check if this error was raised by a malformed condition or key list.
    ///
    /// These are always raised at the point of misuse.
    pub fn is_shape_error(&self) -> bool {
        matches!(self, Self::Condition(_) | Self::KeyCardinality { .. })
    }

    /// Parse a tokio_postgres error into a more specific OrmError
    #[cfg(feature = "postgres")]
    pub fn from_db_error(err: tokio_postgres::Error) -> Self {
        if let Some(db_err) = err.as_db_error() {
            let constraint = db_err.constraint().unwrap_or("unknown");
            let message = db_err.message();

            match db_err.code().code() {
                "23505" => return Self::UniqueViolation(format!("{constraint}: {message}")),
                "23503" => return Self::ForeignKeyViolation(format!("{constraint}: {message}")),
                "23514" => return Self::CheckViolation(format!("{constraint}: {message}")),
                _ => {}
            }
        }
        Self::Query(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_cardinality_message() {
        let err = OrmError::KeyCardinality {
            type_name: "OrderLine".into(),
            expected: 2,
            actual: 1,
        };
        assert_eq!(
            err.to_string(),
            "Key cardinality mismatch on OrderLine: expected 2 key value(s), got 1"
        );
        assert!(err.is_shape_error());
    }

    #[test]
    fn mapping_message_names_type_and_column() {
        let err = OrmError::mapping("Customer", "Nickname");
        assert_eq!(
            err.to_string(),
            "Mapping error: column 'Nickname' has no field on Customer"
        );
        assert!(!err.is_shape_error());
    }
}
