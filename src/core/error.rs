/// Rowbind Error Module
///
/// This module defines the error taxonomy shared by every layer of the
/// mapper: templating, model resolution, type conversion, statement
/// execution and session lifecycle.
use thiserror::Error;

/// Error type for all rowbind operations.
///
/// Each variant is one failure kind; callers branch on the variant rather
/// than inspecting message text:
/// - SQL text, model declarations and converter setup (`Configuration`)
/// - Named placeholder resolution (`MissingParameter`, `InvalidParameterType`)
/// - Transaction state machine violations (`Transaction`)
/// - Connection acquisition (`Connection`)
/// - Prepare/bind/step failures (`Execution`)
/// - Value conversion into Rust types (`Conversion`)
#[derive(Error, Debug)]
pub enum OrmError {
    /// Invalid or empty SQL text, invalid model type, empty field map,
    /// missing converter for a declared field type
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A named placeholder has no matching map key or model field
    #[error("Missing parameter: {0}")]
    MissingParameter(String),

    /// Parameters do not fit the binding mode, or a value has no converter
    #[error("Invalid parameter type: {0}")]
    InvalidParameterType(String),

    /// Transaction state machine violations (e.g. repeated begin)
    #[error("Transaction error: {0}")]
    Transaction(String),

    /// The connection provider failed to supply a connection
    #[error("Connection error: {0}")]
    Connection(String),

    /// Statement preparation, binding or execution failed
    #[error("Statement execution error: {0}")]
    Execution(String),

    /// A column or parameter value could not be converted to the requested type
    #[error("Conversion error: {0}")]
    Conversion(String),

    /// Raw driver errors outside statement execution (transaction control)
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// File system and I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Type alias for Result to use OrmError as the error type.
pub type Result<T> = std::result::Result<T, OrmError>;
