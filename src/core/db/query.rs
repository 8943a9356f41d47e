/// Query Execution Module
///
/// This module binds parameters to prepared statements, runs them, and
/// materializes result rows as scalars, model instances or generic
/// column → value records.
///
/// Statements and cursors are scoped to each call and released by `Drop`
/// on every exit path.
use crate::core::value::Value;
use crate::core::{OrmError, Result};
use crate::model::{Persistable, Shape};
use crate::template::ParameterizedStatement;
use crate::types::{TypeConverter, TypeConverterRegistry};
use indexmap::IndexMap;
use rusqlite::types::Value as SqlValue;
use rusqlite::{Connection, Row, Rows, Statement};
use std::collections::HashMap;
use tracing::debug;

/// One result row as column label → driver-native value, in column order.
pub type Record = IndexMap<String, SqlValue>;

/// Query execution service that operates on a database connection
pub struct QueryExecutor<'a> {
    connection: &'a Connection,
    registry: &'a TypeConverterRegistry,
}

impl<'a> QueryExecutor<'a> {
    /// Creates a new QueryExecutor for the given connection
    pub fn new(connection: &'a Connection, registry: &'a TypeConverterRegistry) -> Self {
        QueryExecutor {
            connection,
            registry,
        }
    }

    /// Runs a non-query statement and returns the affected row count.
    ///
    /// # Errors
    ///
    /// Returns `OrmError::Execution` if preparation, binding or execution
    /// fails, including a parameter count mismatch.
    pub fn execute(&self, statement: &ParameterizedStatement) -> Result<usize> {
        let mut stmt = self.prepare(statement)?;
        stmt.raw_execute()
            .map_err(|e| OrmError::Execution(format!("Statement execution failed: {}", e)))
    }

    /// Materializes the first row as `T`.
    ///
    /// With no row, returns `T::default_value()`: the zero value for
    /// scalars, `None` for models.
    pub fn query_one<T: Persistable>(&self, statement: &ParameterizedStatement) -> Result<Option<T>> {
        let shape = T::shape()?;
        let mut stmt = self.prepare(statement)?;
        let mut materializer = Materializer::new(shape, self.registry, &stmt);
        let mut rows = stmt.raw_query();
        match next_row(&mut rows)? {
            Some(row) => materializer.materialize(row).map(Some),
            None => Ok(T::default_value()),
        }
    }

    /// Materializes every row as `T`, in result order.
    pub fn query_list<T: Persistable>(&self, statement: &ParameterizedStatement) -> Result<Vec<T>> {
        let shape = T::shape()?;
        let mut stmt = self.prepare(statement)?;
        let mut materializer = Materializer::new(shape, self.registry, &stmt);
        let mut rows = stmt.raw_query();
        let mut results = Vec::new();
        while let Some(row) = next_row(&mut rows)? {
            results.push(materializer.materialize(row)?);
        }
        Ok(results)
    }

    /// First row as a [`Record`], or `None` for an empty result.
    pub fn query_map(&self, statement: &ParameterizedStatement) -> Result<Option<Record>> {
        let mut stmt = self.prepare(statement)?;
        let labels = column_labels(&stmt);
        let mut rows = stmt.raw_query();
        match next_row(&mut rows)? {
            Some(row) => to_record(row, &labels).map(Some),
            None => Ok(None),
        }
    }

    /// Every row as a [`Record`], in result order.
    pub fn query_list_map(&self, statement: &ParameterizedStatement) -> Result<Vec<Record>> {
        let mut stmt = self.prepare(statement)?;
        let labels = column_labels(&stmt);
        let mut rows = stmt.raw_query();
        let mut records = Vec::new();
        while let Some(row) = next_row(&mut rows)? {
            records.push(to_record(row, &labels)?);
        }
        Ok(records)
    }

    /// Prepares `statement` and binds its parameters.
    fn prepare(&self, statement: &ParameterizedStatement) -> Result<Statement<'a>> {
        debug!(
            sql = statement.sql(),
            params = statement.params().len(),
            "Executing statement"
        );
        let mut stmt = self
            .connection
            .prepare(statement.sql())
            .map_err(|e| OrmError::Execution(format!("Failed to prepare statement: {}", e)))?;
        self.bind(&mut stmt, statement.params())?;
        Ok(stmt)
    }

    /// Binds each parameter by one-based index. `Null` binds SQL NULL;
    /// anything else goes through the converter for its kind.
    fn bind(&self, stmt: &mut Statement<'_>, params: &[Value]) -> Result<()> {
        let expected = stmt.parameter_count();
        if expected != params.len() {
            return Err(OrmError::Execution(format!(
                "statement expects {} parameter(s) but {} were supplied",
                expected,
                params.len()
            )));
        }

        for (i, value) in params.iter().enumerate() {
            let index = i + 1;
            match value.kind() {
                Some(kind) => self.registry.converter_for(kind)?.write(stmt, index, value)?,
                None => stmt.raw_bind_parameter(index, SqlValue::Null).map_err(|e| {
                    OrmError::Execution(format!("Failed to bind parameter #{}: {}", index, e))
                })?,
            }
        }
        Ok(())
    }
}

fn column_labels(stmt: &Statement<'_>) -> Vec<String> {
    stmt.column_names().into_iter().map(String::from).collect()
}

fn next_row<'r, 's>(rows: &'r mut Rows<'s>) -> Result<Option<&'r Row<'s>>> {
    rows.next()
        .map_err(|e| OrmError::Execution(format!("Query execution failed: {}", e)))
}

fn to_record(row: &Row<'_>, labels: &[String]) -> Result<Record> {
    let mut record = Record::with_capacity(labels.len());
    for (index, label) in labels.iter().enumerate() {
        let raw = row.get_ref(index).map_err(|e| {
            OrmError::Execution(format!("Result processing failed: {}", e))
        })?;
        record.insert(label.clone(), SqlValue::from(raw));
    }
    Ok(record)
}

/// Turns rows into values of one result type.
///
/// For models, converters are looked up once per column label and reused
/// for every following row of the same query.
struct Materializer<'r, T> {
    shape: Shape<T>,
    registry: &'r TypeConverterRegistry,
    labels: Vec<String>,
    converters: HashMap<String, &'r dyn TypeConverter>,
}

impl<'r, T: 'static> Materializer<'r, T> {
    fn new(shape: Shape<T>, registry: &'r TypeConverterRegistry, stmt: &Statement<'_>) -> Self {
        let labels = match &shape {
            Shape::Scalar { .. } => Vec::new(),
            Shape::Model(_) => column_labels(stmt),
        };
        Materializer {
            shape,
            registry,
            labels,
            converters: HashMap::new(),
        }
    }

    fn materialize(&mut self, row: &Row<'_>) -> Result<T> {
        match &self.shape {
            Shape::Scalar { kind, decode } => {
                let converter = self.registry.get(*kind).ok_or_else(|| {
                    OrmError::Configuration(format!("no converter registered for {}", kind))
                })?;
                decode(converter.read_by_index(row, 0)?)
            }
            Shape::Model(fields) => {
                let mut model = fields.create();
                for label in &self.labels {
                    let Some(field) = fields.get(label) else {
                        continue;
                    };
                    let converter = match self.converters.get(label) {
                        Some(converter) => *converter,
                        None => {
                            let converter = self.registry.get(field.kind()).ok_or_else(|| {
                                OrmError::Configuration(format!(
                                    "no converter registered for {} (field `{}`)",
                                    field.kind(),
                                    label
                                ))
                            })?;
                            self.converters.insert(label.clone(), converter);
                            converter
                        }
                    };
                    let value = converter.read_by_name(row, label)?;
                    // NULL columns keep the instance default
                    if value.is_null() {
                        continue;
                    }
                    field.set(&mut model, value)?;
                }
                Ok(model)
            }
        }
    }
}
