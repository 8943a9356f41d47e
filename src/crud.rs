//! High-level session operations.
//!
//! Each call renders or builds its statement first, then opens the session
//! if needed and runs the statement through a [`QueryExecutor`].
//!
//! [`QueryExecutor`]: crate::core::db::QueryExecutor

use crate::builder::SqlBuilder;
use crate::core::db::{Record, Session};
use crate::core::value::ValueMap;
use crate::core::{OrmError, Result};
use crate::model::{Model, ModelReflector, Persistable};
use crate::template::{ParameterizedStatement, Params, SqlTemplateEngine};

impl Session {
    /// Runs a non-query statement and returns the affected row count.
    pub fn execute(&mut self, sql: &str, params: Params<'_>) -> Result<usize> {
        let statement = SqlTemplateEngine::render(sql, params)?;
        self.run(&statement)
    }

    /// First row as `T`; with no row, the zero value for scalars and `None`
    /// for models.
    pub fn query_one<T: Persistable>(&mut self, sql: &str, params: Params<'_>) -> Result<Option<T>> {
        ModelReflector::check_model::<T>()?;
        let statement = SqlTemplateEngine::render(sql, params)?;
        self.executor()?.query_one(&statement)
    }

    /// Every row as `T`, in result order.
    pub fn query_list<T: Persistable>(&mut self, sql: &str, params: Params<'_>) -> Result<Vec<T>> {
        ModelReflector::check_model::<T>()?;
        let statement = SqlTemplateEngine::render(sql, params)?;
        self.executor()?.query_list(&statement)
    }

    /// First row as a column → driver value record.
    pub fn query_one_map(&mut self, sql: &str, params: Params<'_>) -> Result<Option<Record>> {
        let statement = SqlTemplateEngine::render(sql, params)?;
        self.executor()?.query_map(&statement)
    }

    pub fn query_list_map(&mut self, sql: &str, params: Params<'_>) -> Result<Vec<Record>> {
        let statement = SqlTemplateEngine::render(sql, params)?;
        self.executor()?.query_list_map(&statement)
    }

    /// First `M` whose columns equal every entry of `filter`.
    pub fn get<M: Model>(&mut self, filter: &ValueMap) -> Result<Option<M>> {
        let statement = SqlBuilder::new(self.encoder()).select::<M>(filter)?;
        self.executor()?.query_one(&statement)
    }

    /// Every `M` whose columns equal every entry of `filter`.
    pub fn get_list<M: Model>(&mut self, filter: &ValueMap) -> Result<Vec<M>> {
        let statement = SqlBuilder::new(self.encoder()).select::<M>(filter)?;
        self.executor()?.query_list(&statement)
    }

    /// Inserts one row into `table`.
    ///
    /// # Errors
    ///
    /// Returns `OrmError::Configuration` for an empty `values` map, before
    /// the session is opened.
    pub fn add(&mut self, table: &str, values: &ValueMap) -> Result<usize> {
        if values.is_empty() {
            return Err(OrmError::Configuration(format!(
                "add into {} requires at least one column value",
                table
            )));
        }
        let statement = SqlBuilder::new(self.encoder()).insert(table, values)?;
        self.run(&statement)
    }

    /// Inserts `model` into the table named after its type, skipping the
    /// fields listed in `ignore` (e.g. an auto-increment key).
    pub fn add_model<M: Model>(&mut self, model: &M, ignore: &[&str]) -> Result<usize> {
        let fields = ModelReflector::field_map::<M>()?;
        let values: ValueMap = fields
            .iter()
            .filter(|field| !ignore.contains(&field.name()))
            .map(|field| (field.name().to_string(), field.get(model)))
            .collect();
        self.add(fields.type_name(), &values)
    }

    /// Updates rows of `table` matching `filter`.
    ///
    /// # Errors
    ///
    /// Returns `OrmError::Configuration` for an empty `set` map, before the
    /// session is opened.
    pub fn update(&mut self, table: &str, set: &ValueMap, filter: &ValueMap) -> Result<usize> {
        if set.is_empty() {
            return Err(OrmError::Configuration(format!(
                "update of {} requires at least one column to set",
                table
            )));
        }
        let statement = SqlBuilder::new(self.encoder()).update(table, set, filter)?;
        self.run(&statement)
    }

    /// [`Session::update`] on the table named after `M`.
    pub fn update_model<M: Model>(&mut self, set: &ValueMap, filter: &ValueMap) -> Result<usize> {
        let table = ModelReflector::field_map::<M>()?.type_name();
        self.update(table, set, filter)
    }

    /// Deletes rows of `table` matching `filter`. An empty filter deletes
    /// every row.
    pub fn delete(&mut self, table: &str, filter: &ValueMap) -> Result<usize> {
        let statement = SqlBuilder::new(self.encoder()).delete(table, filter)?;
        self.run(&statement)
    }

    /// [`Session::delete`] on the table named after `M`.
    pub fn delete_model<M: Model>(&mut self, filter: &ValueMap) -> Result<usize> {
        let table = ModelReflector::field_map::<M>()?.type_name();
        self.delete(table, filter)
    }

    fn run(&mut self, statement: &ParameterizedStatement) -> Result<usize> {
        self.executor()?.execute(statement)
    }
}
