//! CRUD statement generation.
//!
//! Every identifier goes through the session's [`IdentifierEncoder`] and
//! every value becomes a bound `?` parameter. Column and parameter order is
//! the iteration order of the supplied maps.

use crate::core::value::{Value, ValueMap};
use crate::core::{OrmError, Result};
use crate::dialect::IdentifierEncoder;
use crate::model::{Model, ModelReflector};
use crate::template::ParameterizedStatement;

/// Builds parameterized SELECT/INSERT/UPDATE/DELETE statements.
pub struct SqlBuilder<'a> {
    encoder: &'a dyn IdentifierEncoder,
}

impl<'a> SqlBuilder<'a> {
    pub fn new(encoder: &'a dyn IdentifierEncoder) -> Self {
        SqlBuilder { encoder }
    }

    /// `SELECT {fields} FROM {type name}[ WHERE 1=1 AND {col} = ?...]`
    pub fn select<M: Model>(&self, filter: &ValueMap) -> Result<ParameterizedStatement> {
        let fields = ModelReflector::field_map::<M>()?;
        let columns = fields
            .names()
            .map(|name| self.encoder.encode(name))
            .collect::<Vec<_>>()
            .join(", ");

        let mut sql = format!(
            "SELECT {} FROM {}",
            columns,
            self.encoder.encode(fields.type_name())
        );
        let mut params = Vec::with_capacity(filter.len());
        if !filter.is_empty() {
            sql.push_str(" WHERE 1=1");
            self.push_conditions(&mut sql, &mut params, filter);
        }
        Ok(ParameterizedStatement::new(sql, params))
    }

    /// `INSERT INTO {table}({cols}) VALUES({?, ...})`
    ///
    /// # Errors
    ///
    /// Returns `OrmError::MissingParameter` when `values` is empty.
    pub fn insert(&self, table: &str, values: &ValueMap) -> Result<ParameterizedStatement> {
        self.check_table(table)?;
        if values.is_empty() {
            return Err(OrmError::MissingParameter(format!(
                "no values to insert into {}",
                table
            )));
        }

        let columns = values
            .keys()
            .map(|col| self.encoder.encode(col))
            .collect::<Vec<_>>()
            .join(", ");
        let placeholders = vec!["?"; values.len()].join(", ");
        let sql = format!(
            "INSERT INTO {}({}) VALUES({})",
            self.encoder.encode(table),
            columns,
            placeholders
        );
        Ok(ParameterizedStatement::new(
            sql,
            values.values().cloned().collect(),
        ))
    }

    /// `UPDATE {table} SET {col} = ?, ... WHERE 1=1[ AND {col} = ?...]`
    ///
    /// # Errors
    ///
    /// Returns `OrmError::MissingParameter` when `set` is empty.
    pub fn update(
        &self,
        table: &str,
        set: &ValueMap,
        filter: &ValueMap,
    ) -> Result<ParameterizedStatement> {
        self.check_table(table)?;
        if set.is_empty() {
            return Err(OrmError::MissingParameter(format!(
                "no columns to update in {}",
                table
            )));
        }

        let assignments = set
            .keys()
            .map(|col| format!("{} = ?", self.encoder.encode(col)))
            .collect::<Vec<_>>()
            .join(", ");
        let mut sql = format!(
            "UPDATE {} SET {} WHERE 1=1",
            self.encoder.encode(table),
            assignments
        );
        let mut params: Vec<Value> = set.values().cloned().collect();
        self.push_conditions(&mut sql, &mut params, filter);
        Ok(ParameterizedStatement::new(sql, params))
    }

    /// `DELETE FROM {table} WHERE 1=1[ AND {col} = ?...]`
    ///
    /// An empty `filter` deletes every row.
    pub fn delete(&self, table: &str, filter: &ValueMap) -> Result<ParameterizedStatement> {
        self.check_table(table)?;
        let mut sql = format!("DELETE FROM {} WHERE 1=1", self.encoder.encode(table));
        let mut params = Vec::with_capacity(filter.len());
        self.push_conditions(&mut sql, &mut params, filter);
        Ok(ParameterizedStatement::new(sql, params))
    }

    fn push_conditions(&self, sql: &mut String, params: &mut Vec<Value>, filter: &ValueMap) {
        for (col, value) in filter {
            sql.push_str(" AND ");
            sql.push_str(&self.encoder.encode(col));
            sql.push_str(" = ?");
            params.push(value.clone());
        }
    }

    fn check_table(&self, table: &str) -> Result<()> {
        if table.trim().is_empty() {
            return Err(OrmError::Configuration("table name is empty".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::{AnsiEncoder, BacktickEncoder};
    use crate::test_utils::Account;
    use crate::value_map;

    #[test]
    fn test_insert_order_and_params() {
        let builder = SqlBuilder::new(&AnsiEncoder);
        let stmt = builder
            .insert("t", &value_map! { "a" => 1_i64, "b" => "x" })
            .unwrap();
        assert_eq!(stmt.sql(), "INSERT INTO \"t\"(\"a\", \"b\") VALUES(?, ?)");
        assert_eq!(
            stmt.params(),
            &[Value::BigInt(1), Value::Text("x".to_string())]
        );
    }

    #[test]
    fn test_insert_requires_values() {
        let builder = SqlBuilder::new(&AnsiEncoder);
        match builder.insert("t", &ValueMap::new()) {
            Err(OrmError::MissingParameter(_)) => {}
            other => panic!("Expected MissingParameter, got {:?}", other),
        }
        assert!(matches!(
            builder.insert(" ", &value_map! { "a" => 1_i64 }),
            Err(OrmError::Configuration(_))
        ));
    }

    #[test]
    fn test_select_without_filter() {
        let builder = SqlBuilder::new(&BacktickEncoder);
        let stmt = builder.select::<Account>(&ValueMap::new()).unwrap();
        assert_eq!(
            stmt.sql(),
            "SELECT `id`, `name`, `balance`, `active`, `nickname`, `created_by`, `revision` FROM `Account`"
        );
        assert!(stmt.params().is_empty());
    }

    #[test]
    fn test_select_with_filter() {
        let builder = SqlBuilder::new(&BacktickEncoder);
        let stmt = builder
            .select::<Account>(&value_map! { "active" => true, "name" => "a" })
            .unwrap();
        assert!(stmt
            .sql()
            .ends_with("FROM `Account` WHERE 1=1 AND `active` = ? AND `name` = ?"));
        assert_eq!(
            stmt.params(),
            &[Value::Bool(true), Value::Text("a".to_string())]
        );
    }

    #[test]
    fn test_update_params_set_then_filter() {
        let builder = SqlBuilder::new(&AnsiEncoder);
        let stmt = builder
            .update(
                "t",
                &value_map! { "a" => 1_i64, "b" => 2_i64 },
                &value_map! { "id" => 9_i64 },
            )
            .unwrap();
        assert_eq!(
            stmt.sql(),
            "UPDATE \"t\" SET \"a\" = ?, \"b\" = ? WHERE 1=1 AND \"id\" = ?"
        );
        assert_eq!(
            stmt.params(),
            &[Value::BigInt(1), Value::BigInt(2), Value::BigInt(9)]
        );

        assert!(matches!(
            builder.update("t", &ValueMap::new(), &ValueMap::new()),
            Err(OrmError::MissingParameter(_))
        ));
    }

    #[test]
    fn test_delete_is_unguarded() {
        let builder = SqlBuilder::new(&AnsiEncoder);
        let stmt = builder.delete("t", &ValueMap::new()).unwrap();
        assert_eq!(stmt.sql(), "DELETE FROM \"t\" WHERE 1=1");
        assert!(stmt.params().is_empty());

        let stmt = builder.delete("t", &value_map! { "id" => 3_i64 }).unwrap();
        assert_eq!(stmt.sql(), "DELETE FROM \"t\" WHERE 1=1 AND \"id\" = ?");
    }
}
