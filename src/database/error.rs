//! Storage and configuration errors.

use thiserror::Error;

/// Failure of the durable group store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("mongodb error: {0}")]
    Mongo(#[from] mongodb::error::Error),

    #[error("failed to serialize group config: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("group store is closed")]
    Closed,
}

/// Invalid use of the field-level configuration API.
///
/// The messages are shown to users as-is.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unknown setting '{0}'")]
    UnknownField(String),

    #[error("'{field}' expects {expected}")]
    InvalidValue {
        field: &'static str,
        expected: &'static str,
    },

    #[error("'{0}' is not a list setting")]
    NotAList(&'static str),

    #[error(transparent)]
    Store(#[from] StoreError),
}
