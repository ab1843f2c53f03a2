use crate::ast::DataType;
use thiserror::Error;

pub type DbResult<T> = std::result::Result<T, DbError>;

/// Every way a statement can fail. A failing statement aborts the rest of
/// its batch and leaves the database file exactly as it was.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("no database selected")]
    NoDatabaseSelected,

    #[error("database '{0}' does not exist")]
    DatabaseNotFound(String),

    #[error("database '{0}' already exists")]
    DatabaseAlreadyExists(String),

    #[error("table '{0}' does not exist")]
    TableNotFound(String),

    #[error("table '{0}' already exists")]
    TableAlreadyExists(String),

    #[error("column '{column}' does not exist in table '{table}'")]
    ColumnNotFound { table: String, column: String },

    #[error("invalid identifier '{0}'")]
    InvalidIdentifier(String),

    #[error("column '{column}' of table '{table}' only accepts values of type {expected}")]
    TypeMismatch {
        table: String,
        column: String,
        expected: DataType,
    },

    #[error("column '{column}' of table '{table}' cannot be null")]
    NullabilityViolation { table: String, column: String },

    #[error("column '{column}' of table '{table}' must be unique")]
    UniquenessViolation { table: String, column: String },

    #[error("column '{column}' of table '{table}' is a key and cannot be updated")]
    ImmutableColumnViolation { table: String, column: String },

    #[error("operator '{op}' cannot be applied to column '{column}' of table '{table}'")]
    UnsupportedOperatorForType {
        table: String,
        column: String,
        op: &'static str,
    },

    #[error("malformed statement: {0}")]
    MalformedStatement(String),

    #[error("unterminated string literal")]
    UnterminatedQuotedLiteral,

    #[error("join columns '{0}' and '{1}' have incompatible types")]
    JoinTypeMismatch(String, String),

    #[error("arithmetic error: {0}")]
    Arithmetic(String),

    #[error("database file is corrupt: {0}")]
    Corrupt(String),

    #[error("i/o failure: {0}")]
    Io(#[from] std::io::Error),
}
