//! Rowbind: a minimal object-relational mapping layer over blocking
//! SQLite connections.
//!
//! ```
//! use rowbind::{value_map, AnsiEncoder, Model, ModelSchema, Params, Session, SqliteProvider};
//!
//! #[derive(Debug, Default)]
//! struct User {
//!     id: i64,
//!     name: String,
//! }
//!
//! impl Model for User {
//!     fn schema() -> ModelSchema<Self> {
//!         ModelSchema::new("User", User::default)
//!             .field("id", |u| &u.id, |u| &mut u.id)
//!             .field("name", |u| &u.name, |u| &mut u.name)
//!     }
//! }
//!
//! # fn main() -> rowbind::Result<()> {
//! let mut session = Session::new(SqliteProvider::in_memory(), AnsiEncoder);
//! session.execute("CREATE TABLE \"User\" (id INTEGER PRIMARY KEY, name TEXT)", Params::none())?;
//! session.add("User", &value_map! { "id" => 1_i64, "name" => "alice" })?;
//!
//! let user: Option<User> = session.get(&value_map! { "id" => 1_i64 })?;
//! assert_eq!(user.map(|u| u.name).as_deref(), Some("alice"));
//! # Ok(())
//! # }
//! ```

// Core infrastructure modules
pub mod core;

// Mapping layers
pub mod builder;
pub mod config;
mod crud;
pub mod dialect;
pub mod model;
pub mod template;
pub mod types;

#[cfg(test)]
pub(crate) mod test_utils;

pub use crate::builder::SqlBuilder;
pub use crate::core::db::{
    ConnectionProvider, IsolationLevel, QueryExecutor, Record, Session, SessionState,
    SqliteProvider,
};
pub use crate::core::value::{BigInteger, Clob, Decimal, SqlType, Value, ValueKind, ValueMap};
pub use crate::core::{OrmError, Result};
pub use crate::dialect::{AnsiEncoder, BacktickEncoder, BracketEncoder, Dialect, IdentifierEncoder};
pub use crate::model::{
    FieldDescriptor, FieldMap, Model, ModelParam, ModelReflector, ModelSchema, Persistable, Shape,
};
pub use crate::template::{ParameterizedStatement, Params, SqlTemplateEngine};
pub use crate::types::{TypeConverter, TypeConverterRegistry};
