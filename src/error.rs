//! Error types for the Gertrude storage engine

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, GertrudeError>;

#[derive(Error, Debug)]
pub enum GertrudeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid name: {0}")]
    InvalidName(String),

    #[error("Invalid type: {0}")]
    InvalidType(String),

    #[error("Type error: {0}")]
    TypeError(String),

    #[error("Table not found: {0}")]
    TableNotFound(String),

    #[error("Table already exists: {0}")]
    TableExists(String),

    #[error("Index not found: {0}")]
    IndexNotFound(String),

    #[error("Index already exists: {0}")]
    IndexExists(String),

    #[error("Column not found: {0}")]
    ColumnNotFound(String),

    #[error("Unknown fields: {0}")]
    UnknownFields(String),

    #[error("Missing fields: {0} - not nullable, but no default value defined")]
    MissingFields(String),

    #[error("Unique constraint violation: {0}")]
    UniqueViolation(String),

    #[error("Null constraint violation: {0}")]
    NullViolation(String),

    #[error("Database is in read-only mode")]
    ReadOnly,

    #[error("{0} is closed")]
    Closed(String),

    #[error("Database {0} is not initialized")]
    NotInitialized(PathBuf),

    #[error("Database {0} already exists and is not empty")]
    AlreadyExists(PathBuf),

    #[error("Version mismatch: {0}")]
    VersionMismatch(String),

    #[error("Data corruption: {0}")]
    Corruption(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Cache error: {0}")]
    Cache(String),

    #[error("Plan error: {0}")]
    Plan(String),

    #[error("Unknown scan operator: {0}")]
    UnknownOperator(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

impl From<serde_json::Error> for GertrudeError {
    fn from(err: serde_json::Error) -> Self {
        GertrudeError::Serialization(err.to_string())
    }
}

impl From<bincode::Error> for GertrudeError {
    fn from(err: bincode::Error) -> Self {
        GertrudeError::Serialization(err.to_string())
    }
}
