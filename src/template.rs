//! Named-placeholder rewriting.
//!
//! SQL text uses either `?` positional markers or `${name}` / `#{name}`
//! named markers (the two named syntaxes are interchangeable). Named text
//! is rewritten into positional text with the parameter list ordered by
//! appearance, so the executor only ever binds by index.

use crate::core::value::{Value, ValueMap};
use crate::core::{OrmError, Result};
use crate::model::ModelParam;
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;

static NAMED_TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"[$#]\{([^}]*)\}").unwrap());

/// Final SQL text plus its ordered parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterizedStatement {
    sql: String,
    params: Vec<Value>,
}

impl ParameterizedStatement {
    pub fn new(sql: impl Into<String>, params: Vec<Value>) -> Self {
        ParameterizedStatement {
            sql: sql.into(),
            params,
        }
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn params(&self) -> &[Value] {
        &self.params
    }

    pub fn into_parts(self) -> (String, Vec<Value>) {
        (self.sql, self.params)
    }
}

/// Statement parameters.
///
/// Positional lists bind `?` markers in order. A map or a model instance is
/// the single parameter of a named-placeholder statement.
pub enum Params<'a> {
    Positional(Vec<Value>),
    Map(&'a ValueMap),
    Model(&'a dyn ModelParam),
}

impl<'a> Params<'a> {
    pub fn none() -> Self {
        Params::Positional(Vec::new())
    }

    pub fn map(values: &'a ValueMap) -> Self {
        Params::Map(values)
    }

    pub fn model<M: ModelParam>(model: &'a M) -> Self {
        Params::Model(model)
    }
}

impl Default for Params<'_> {
    fn default() -> Self {
        Params::none()
    }
}

impl From<Vec<Value>> for Params<'_> {
    fn from(values: Vec<Value>) -> Self {
        Params::Positional(values)
    }
}

impl<'a> From<&'a ValueMap> for Params<'a> {
    fn from(values: &'a ValueMap) -> Self {
        Params::Map(values)
    }
}

impl fmt::Debug for Params<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Params::Positional(values) => f.debug_tuple("Positional").field(values).finish(),
            Params::Map(values) => f.debug_tuple("Map").field(values).finish(),
            Params::Model(_) => f.write_str("Model(..)"),
        }
    }
}

/// Builds positional [`Params`] from anything convertible into a `Value`.
///
/// ```
/// let params = rowbind::params![1_i64, "alice", None::<String>];
/// assert!(matches!(params, rowbind::Params::Positional(ref v) if v.len() == 3));
/// ```
#[macro_export]
macro_rules! params {
    () => { $crate::Params::none() };
    ($($value:expr),+ $(,)?) => {
        $crate::Params::Positional(vec![$($crate::Value::from($value)),+])
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BindingMode {
    Positional,
    Named,
}

/// Rewrites SQL text and parameters into a [`ParameterizedStatement`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SqlTemplateEngine;

impl SqlTemplateEngine {
    /// Resolves `sql` against `params`.
    ///
    /// # Errors
    ///
    /// - `Configuration` for empty or blank SQL text
    /// - `InvalidParameterType` when the parameters do not fit the detected mode
    /// - `MissingParameter` when a named token has no matching key or field
    pub fn render(sql: &str, params: Params<'_>) -> Result<ParameterizedStatement> {
        if sql.trim().is_empty() {
            return Err(OrmError::Configuration("SQL text is empty".to_string()));
        }

        match Self::detect_mode(sql) {
            BindingMode::Positional => match params {
                Params::Positional(values) => Ok(ParameterizedStatement::new(sql, values)),
                other => Err(OrmError::InvalidParameterType(format!(
                    "statement has no named placeholders but {} was supplied",
                    Self::describe(&other)
                ))),
            },
            BindingMode::Named => Self::rewrite(sql, params),
        }
    }

    /// Whichever marker style appears first decides the mode.
    fn detect_mode(sql: &str) -> BindingMode {
        let positional = sql.find('?');
        let named = NAMED_TOKEN.find(sql).map(|m| m.start());
        match (positional, named) {
            (Some(p), Some(n)) if n < p => BindingMode::Named,
            (None, Some(_)) => BindingMode::Named,
            _ => BindingMode::Positional,
        }
    }

    fn rewrite(sql: &str, params: Params<'_>) -> Result<ParameterizedStatement> {
        let values = match params {
            Params::Map(map) if !map.is_empty() => map.clone(),
            Params::Model(model) => {
                let values = model.field_values()?;
                if values.is_empty() {
                    return Err(OrmError::InvalidParameterType(
                        "named placeholders require a model with persistable fields".to_string(),
                    ));
                }
                values
            }
            other => {
                return Err(OrmError::InvalidParameterType(format!(
                    "named placeholders require a single non-empty map or model, got {}",
                    Self::describe(&other)
                )))
            }
        };

        let mut rewritten = String::with_capacity(sql.len());
        let mut ordered = Vec::new();
        let mut last = 0;
        for caps in NAMED_TOKEN.captures_iter(sql) {
            let (Some(token), Some(name)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            let value = values
                .get(name.as_str())
                .ok_or_else(|| OrmError::MissingParameter(token.as_str().to_string()))?;
            rewritten.push_str(&sql[last..token.start()]);
            rewritten.push('?');
            ordered.push(value.clone());
            last = token.end();
        }
        rewritten.push_str(&sql[last..]);

        Ok(ParameterizedStatement::new(rewritten, ordered))
    }

    fn describe(params: &Params<'_>) -> String {
        match params {
            Params::Positional(values) => format!("{} positional value(s)", values.len()),
            Params::Map(map) if map.is_empty() => "an empty map".to_string(),
            Params::Map(_) => "a map".to_string(),
            Params::Model(_) => "a model".to_string(),
        }
    }
}
