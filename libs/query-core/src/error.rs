use thiserror::Error;

use crate::filter::Operator;
use crate::schema::FieldKind;

/// Reasons a filter tree is rejected before it reaches storage.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FilterError {
    #[error("filter field is empty")]
    EmptyField,

    #[error("unknown operator: {0:?}")]
    UnknownOperator(String),

    #[error("filter on '{field}' has nested filters but no logic")]
    MissingLogic { field: String },

    #[error("invalid logic: {0:?} (expected 'and' or 'or')")]
    InvalidLogic(String),

    #[error("unknown field: {0}")]
    UnknownField(String),

    #[error("operator '{op}' needs a string field, '{field}' is {kind:?}")]
    NotAStringField {
        field: String,
        op: Operator,
        kind: FieldKind,
    },

    #[error("value {value:?} is not a valid {kind:?} for field '{field}'")]
    TypeMismatch {
        field: String,
        value: String,
        kind: FieldKind,
    },

    #[error("filter exceeds {0} nodes")]
    TooManyNodes(usize),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SortError {
    #[error("sort field is empty")]
    EmptyField,

    #[error("invalid sort direction: {0:?} (expected 'asc' or 'desc')")]
    InvalidDirection(String),

    #[error("unknown sort field: {0}")]
    UnknownField(String),

    #[error("sort exceeds {0} keys")]
    TooManyKeys(usize),
}

/// Unified error for everything this crate validates.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("invalid filter: {0}")]
    InvalidFilter(#[from] FilterError),

    #[error("invalid sort: {0}")]
    InvalidSort(#[from] SortError),

    #[error("invalid page request: {0}")]
    InvalidPage(String),
}

pub type Result<T> = std::result::Result<T, Error>;
