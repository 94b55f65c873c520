use thiserror::Error;

use crate::entity::EntityKey;
use query_core::FieldKind;

/// Errors raised by a storage backend.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("duplicate key: {0}")]
    DuplicateKey(EntityKey),

    #[error("row not found: {0}")]
    Missing(EntityKey),

    #[error("field '{field}' holds a {found} value, expected {expected:?}")]
    TypeMismatch {
        field: String,
        expected: FieldKind,
        found: &'static str,
    },

    #[error("parameter @{0} is missing or malformed")]
    BadParameter(usize),

    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

/// Library-local result type.
pub type Result<T> = std::result::Result<T, RepoError>;

/// Typed error for repository operations.
#[derive(Debug, Error)]
pub enum RepoError {
    /// The dynamic filter, sort or page request was rejected.
    #[error(transparent)]
    Query(#[from] query_core::Error),

    #[error("soft delete of {entity} is not supported: one-to-one relation '{relation}' would be orphaned")]
    UnsupportedSoftDelete {
        entity: &'static str,
        relation: &'static str,
    },

    #[error("not supported: {0}")]
    NotSupported(&'static str),

    #[error("operation cancelled")]
    Cancelled,

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("entity graph: {0}")]
    Graph(String),
}

impl RepoError {
    /// True for errors caused by client input rather than by the store.
    pub fn is_client_error(&self) -> bool {
        matches!(self, RepoError::Query(_))
    }
}
