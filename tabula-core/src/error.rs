use crate::Error;
use thiserror::Error as ThisError;

/// Classification of the failures produced by the adapter, builder and table layers.
///
/// It travels as the root cause inside an [`anyhow::Error`], any context added on the way
/// up (the failing statement, the table, the operation) stays attached to it.
/// Use [`error_kind`] to recover it.
#[derive(Debug, Clone, ThisError)]
pub enum DbError {
    /// Missing or unknown adapter, invalid configuration values.
    #[error("configuration error: {0}")]
    Configuration(String),
    /// Pool not initialized, ping or liveness failure.
    #[error("connection error: {0}")]
    Connection(String),
    /// Invalid join type, duplicate correlation name, union mixed with joins.
    #[error("query build error: {0}")]
    Build(String),
    /// Prepare, execute or scan failure of the named operation.
    #[error("`{operation}` failed: {message}")]
    Statement { operation: String, message: String },
    /// No primary key, primary key not among the columns, column absent from metadata.
    #[error("schema error: {0}")]
    Schema(String),
    /// A referential action could not be applied to a dependent table.
    #[error("cascade on `{table}` failed: {message}")]
    Cascade { table: String, message: String },
    /// The call context was cancelled by the caller.
    #[error("`{0}` was cancelled")]
    Cancelled(String),
    /// The deadline derived from the call context expired.
    #[error("`{0}` exceeded its deadline")]
    DeadlineExceeded(String),
}

impl DbError {
    pub fn statement(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Statement {
            operation: operation.into(),
            message: message.into(),
        }
    }
    pub fn cascade(table: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Cascade {
            table: table.into(),
            message: message.into(),
        }
    }
}

/// Find the [`DbError`] classifying `error`, either attached as context or as the root cause.
pub fn error_kind(error: &Error) -> Option<&DbError> {
    error
        .downcast_ref::<DbError>()
        .or_else(|| error.chain().find_map(|e| e.downcast_ref::<DbError>()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn kind_survives_context() {
        let error: Error = Err::<(), _>(DbError::Schema("no primary key".into()))
            .context("While resolving `users`")
            .context("While inserting")
            .unwrap_err();
        assert!(matches!(error_kind(&error), Some(DbError::Schema(..))));
        assert!(format!("{:#}", error).contains("no primary key"));
    }

    #[test]
    fn kind_absent() {
        let error = Error::msg("plain");
        assert!(error_kind(&error).is_none());
    }
}
