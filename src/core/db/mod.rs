/// Database Module
///
/// This module provides the database layer for Rowbind, organized into
/// focused submodules:
///
/// - **Connection Management** (`connection.rs`): connection providers,
///   session state and the transaction lifecycle
/// - **Query Execution** (`query.rs`): parameter binding, statement
///   execution and result materialization
///
/// ## Error Handling
///
/// All database operations use the standardized `OrmError` type for
/// consistent error propagation.
pub mod connection;
pub mod query;

pub use connection::*;
pub use query::*;
