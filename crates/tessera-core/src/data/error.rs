//! Error types for table and accessor operations

use thiserror::Error;

/// Result type for data operations
pub type DataResult<T> = Result<T, DataError>;

/// Errors that can occur during data operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DataError {
    /// Arrow error (from arrow-rs)
    #[error("Arrow error: {0}")]
    Arrow(String),

    /// Column not found in DataFrame
    #[error("column not found: {0}")]
    ColumnNotFound(String),

    /// Invalid column index
    #[error("invalid column index: {0}")]
    InvalidColumnIndex(usize),

    /// Type mismatch during operation
    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: String, found: String },

    /// Invalid operation for the data type
    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    /// Caller supplied an argument that cannot be used (row locator, source type)
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Feature not compiled in or not available for this value
    #[error("unsupported: {0}")]
    Unsupported(String),

    /// I/O error (file read/write)
    #[error("I/O error: {0}")]
    Io(String),

    /// Schema mismatch
    #[error("schema mismatch: {0}")]
    SchemaMismatch(String),

    /// CSV error
    #[error("CSV error: {0}")]
    Csv(String),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(String),

    /// Index out of bounds
    #[error("index {index} out of bounds for length {length}")]
    OutOfBounds { index: usize, length: usize },

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),
}

impl From<arrow::error::ArrowError> for DataError {
    fn from(err: arrow::error::ArrowError) -> Self {
        DataError::Arrow(err.to_string())
    }
}

impl From<std::io::Error> for DataError {
    fn from(err: std::io::Error) -> Self {
        DataError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for DataError {
    fn from(err: serde_json::Error) -> Self {
        DataError::Json(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DataError::ColumnNotFound("age".to_string());
        assert_eq!(err.to_string(), "column not found: age");

        let err = DataError::TypeMismatch {
            expected: "Int".to_string(),
            found: "String".to_string(),
        };
        assert_eq!(err.to_string(), "type mismatch: expected Int, found String");

        let err = DataError::InvalidArgument("cannot edit row at \"a\"".to_string());
        assert_eq!(err.to_string(), "invalid argument: cannot edit row at \"a\"");
    }
}
