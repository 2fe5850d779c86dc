//! Proxy error types.

use thiserror::Error;

use crate::types::ValueType;

/// Errors raised by the proxy engine.
#[derive(Error, Debug, Clone)]
pub enum ProxyError {
    /// Row does not exist in the proxy
    #[error("Row {row} out of range")]
    RowOutOfRange { row: usize },

    /// Column does not exist in the base table
    #[error("Column {col} out of range (columns: {count})")]
    ColumnOutOfRange { col: usize, count: usize },

    /// Value type does not match the column type
    #[error("Type mismatch in column {column}: expected {expected}, got {got}")]
    TypeMismatch {
        column: usize,
        expected: ValueType,
        got: ValueType,
    },

    /// Column cannot be written for this row
    #[error("Column {column} is read-only")]
    ColumnReadOnly { column: usize },

    /// Column has no default to fall back to
    #[error("Column {column} has no default value")]
    NoDefault { column: usize },

    /// Base table cannot insert rows
    #[error("Base table does not support inserting rows")]
    InsertNotSupported,

    /// Base table cannot delete rows
    #[error("Base table does not support deleting rows")]
    DeleteNotSupported,

    /// New rows need a known base row count
    #[error("Base table row count is unknown")]
    UnknownRowCount,

    /// The synthetic leading row cannot be modified
    #[error("The leading blank row cannot be modified")]
    SyntheticRow,

    /// Base table does not offer random access
    #[error("Base table does not support random access")]
    RandomAccessRequired,

    /// A validation hook vetoed the commit
    #[error("Changes to row {row} rejected: {reason}")]
    ValidationRejected { row: usize, reason: String },

    /// Writing a row back to the base table failed
    #[error("Write back of row {row} failed: {source}")]
    WriteBackFailed {
        row: usize,
        #[source]
        source: TableError,
    },

    /// Reading from the base table failed
    #[error("Reading row {row}, column {col} failed: {source}")]
    BaseRead {
        row: usize,
        col: usize,
        #[source]
        source: TableError,
    },

    /// Filter could not be compiled or executed
    #[error(transparent)]
    Filter(#[from] FilterError),

    /// Base table acted outside its contract
    #[error("Consistency violation: {0}")]
    ConsistencyViolation(String),

    /// Configuration value out of range or unparsable
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Commits are refused until the proxy is reset
    #[error("Commits are locked after a consistency violation: {0}")]
    CommitsLocked(String),
}

/// Errors raised while compiling or running a filter.
#[derive(Error, Debug, Clone)]
pub enum FilterError {
    /// Text is not valid SQL
    #[error(transparent)]
    Parser(#[from] sqlparser::parser::ParserError),

    /// Text is valid SQL but not a usable filter
    #[error("Incorrect filter expression: {0}")]
    Syntax(String),

    /// Construct the filter engine does not handle
    #[error("Unsupported filter construct: {0}")]
    Unsupported(String),

    /// Filter names a column the source does not have
    #[error("Unknown column '{0}'")]
    UnknownColumn(String),

    /// Query collaborator failed
    #[error("Filter execution failed: {0}")]
    Execution(String),
}

/// Errors reported by a base table.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TableError {
    /// Row index past the end of the table
    #[error("Row {row} out of range (rows: {count})")]
    RowOutOfRange { row: usize, count: usize },

    /// Column index past the end of the table
    #[error("Column {col} out of range (columns: {count})")]
    ColumnOutOfRange { col: usize, count: usize },

    /// Row has the wrong number of values
    #[error("Expected {expected} values, got {got}")]
    ArityMismatch { expected: usize, got: usize },

    /// Value rejected by a column constraint
    #[error("Invalid value for column '{column}': {reason}")]
    InvalidValue { column: String, reason: String },

    /// Operation not permitted by the table
    #[error("Operation not supported: {0}")]
    Unsupported(&'static str),

    /// Any other failure of the table implementation
    #[error("{0}")]
    Other(String),
}
