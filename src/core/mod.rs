/// Core Module for Rowbind
///
/// This module contains the fundamental components shared by the mapper:
/// the error taxonomy, the dynamic value model, and the database layer
/// (sessions and statement execution).

pub mod db;
pub mod error;
pub mod value;

// Re-export commonly used types for convenience
pub use error::{OrmError, Result};
