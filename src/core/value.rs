//! Dynamic SQL values.
//!
//! `Value` is what flows between models, templates and the driver. Every
//! non-null variant has a matching `ValueKind`, which is the key used to
//! look up a type converter.

use crate::core::{OrmError, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Ordered column/parameter name to value mapping. Iteration order is
/// insertion order, which fixes column and placeholder order in generated SQL.
pub type ValueMap = IndexMap<String, Value>;

static DECIMAL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[+-]?(\d+(\.\d*)?|\.\d+)([eE][+-]?\d+)?$").unwrap());
static INTEGER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[+-]?\d+$").unwrap());

/// Arbitrary-precision decimal number kept as validated text.
///
/// Store it in a column declared TEXT. SQLite turns text bound into a
/// DECIMAL or NUMERIC column into REAL, which keeps only about 15
/// significant digits; reading a rounded value back is a conversion error.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Decimal(String);

impl Decimal {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for Decimal {
    fn default() -> Self {
        Decimal("0".to_string())
    }
}

impl FromStr for Decimal {
    type Err = OrmError;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        if DECIMAL_RE.is_match(trimmed) {
            Ok(Decimal(trimmed.to_string()))
        } else {
            Err(OrmError::Conversion(format!("`{}` is not a decimal number", s)))
        }
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Arbitrary-precision integer kept as validated text.
///
/// Values outside `i64` need a column declared TEXT for the same reason as
/// [`Decimal`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BigInteger(String);

impl BigInteger {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the value as `i64` when it fits.
    pub fn to_i64(&self) -> Option<i64> {
        self.0.parse().ok()
    }
}

impl Default for BigInteger {
    fn default() -> Self {
        BigInteger("0".to_string())
    }
}

impl From<i64> for BigInteger {
    fn from(v: i64) -> Self {
        BigInteger(v.to_string())
    }
}

impl FromStr for BigInteger {
    type Err = OrmError;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        if INTEGER_RE.is_match(trimmed) {
            Ok(BigInteger(trimmed.to_string()))
        } else {
            Err(OrmError::Conversion(format!("`{}` is not an integer", s)))
        }
    }
}

impl fmt::Display for BigInteger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Large character object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Clob(pub String);

impl Clob {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// A dynamically-typed SQL value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    TinyInt(i8),
    SmallInt(i16),
    Int(i32),
    BigInt(i64),
    UTinyInt(u8),
    USmallInt(u16),
    UInt(u32),
    UBigInt(u64),
    Float(f32),
    Double(f64),
    Char(char),
    Text(String),
    Decimal(Decimal),
    BigInteger(BigInteger),
    /// Large binary object
    Blob(Vec<u8>),
    Clob(Clob),
    Date(NaiveDate),
    Time(NaiveTime),
    DateTime(NaiveDateTime),
    Timestamp(DateTime<Utc>),
    Uuid(Uuid),
    Json(serde_json::Value),
}

/// The runtime type of a non-null `Value`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Bool,
    TinyInt,
    SmallInt,
    Int,
    BigInt,
    UTinyInt,
    USmallInt,
    UInt,
    UBigInt,
    Float,
    Double,
    Char,
    Text,
    Decimal,
    BigInteger,
    Blob,
    Clob,
    Date,
    Time,
    DateTime,
    Timestamp,
    Uuid,
    Json,
}

impl ValueKind {
    /// Every kind, in declaration order.
    pub const ALL: [ValueKind; 23] = [
        ValueKind::Bool,
        ValueKind::TinyInt,
        ValueKind::SmallInt,
        ValueKind::Int,
        ValueKind::BigInt,
        ValueKind::UTinyInt,
        ValueKind::USmallInt,
        ValueKind::UInt,
        ValueKind::UBigInt,
        ValueKind::Float,
        ValueKind::Double,
        ValueKind::Char,
        ValueKind::Text,
        ValueKind::Decimal,
        ValueKind::BigInteger,
        ValueKind::Blob,
        ValueKind::Clob,
        ValueKind::Date,
        ValueKind::Time,
        ValueKind::DateTime,
        ValueKind::Timestamp,
        ValueKind::Uuid,
        ValueKind::Json,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            ValueKind::Bool => "BOOLEAN",
            ValueKind::TinyInt => "TINYINT",
            ValueKind::SmallInt => "SMALLINT",
            ValueKind::Int => "INTEGER",
            ValueKind::BigInt => "BIGINT",
            ValueKind::UTinyInt => "TINYINT UNSIGNED",
            ValueKind::USmallInt => "SMALLINT UNSIGNED",
            ValueKind::UInt => "INTEGER UNSIGNED",
            ValueKind::UBigInt => "BIGINT UNSIGNED",
            ValueKind::Float => "REAL",
            ValueKind::Double => "DOUBLE",
            ValueKind::Char => "CHAR",
            ValueKind::Text => "TEXT",
            ValueKind::Decimal => "DECIMAL",
            ValueKind::BigInteger => "NUMERIC",
            ValueKind::Blob => "BLOB",
            ValueKind::Clob => "CLOB",
            ValueKind::Date => "DATE",
            ValueKind::Time => "TIME",
            ValueKind::DateTime => "DATETIME",
            ValueKind::Timestamp => "TIMESTAMP",
            ValueKind::Uuid => "UUID",
            ValueKind::Json => "JSON",
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Value {
    pub const fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Runtime type of this value, `None` for `Null`.
    pub const fn kind(&self) -> Option<ValueKind> {
        Some(match self {
            Value::Null => return None,
            Value::Bool(_) => ValueKind::Bool,
            Value::TinyInt(_) => ValueKind::TinyInt,
            Value::SmallInt(_) => ValueKind::SmallInt,
            Value::Int(_) => ValueKind::Int,
            Value::BigInt(_) => ValueKind::BigInt,
            Value::UTinyInt(_) => ValueKind::UTinyInt,
            Value::USmallInt(_) => ValueKind::USmallInt,
            Value::UInt(_) => ValueKind::UInt,
            Value::UBigInt(_) => ValueKind::UBigInt,
            Value::Float(_) => ValueKind::Float,
            Value::Double(_) => ValueKind::Double,
            Value::Char(_) => ValueKind::Char,
            Value::Text(_) => ValueKind::Text,
            Value::Decimal(_) => ValueKind::Decimal,
            Value::BigInteger(_) => ValueKind::BigInteger,
            Value::Blob(_) => ValueKind::Blob,
            Value::Clob(_) => ValueKind::Clob,
            Value::Date(_) => ValueKind::Date,
            Value::Time(_) => ValueKind::Time,
            Value::DateTime(_) => ValueKind::DateTime,
            Value::Timestamp(_) => ValueKind::Timestamp,
            Value::Uuid(_) => ValueKind::Uuid,
            Value::Json(_) => ValueKind::Json,
        })
    }

    pub const fn type_name(&self) -> &'static str {
        match self.kind() {
            Some(kind) => kind.name(),
            None => "NULL",
        }
    }
}

/// A Rust type that maps onto a single SQL value.
pub trait SqlType: Sized {
    /// Kind used to look up the converter for columns of this type.
    const KIND: ValueKind;

    fn to_value(&self) -> Value;

    fn from_value(value: Value) -> Result<Self>;
}

fn mismatch(expected: ValueKind, found: &Value) -> OrmError {
    if found.is_null() {
        OrmError::Conversion(format!(
            "cannot read NULL into non-optional {} (use Option<_>)",
            expected
        ))
    } else {
        OrmError::Conversion(format!("expected {}, found {}", expected, found.type_name()))
    }
}

macro_rules! sql_types {
    ($($ty:ty => $variant:ident),* $(,)?) => {$(
        impl SqlType for $ty {
            const KIND: ValueKind = ValueKind::$variant;

            fn to_value(&self) -> Value {
                Value::$variant(self.clone())
            }

            fn from_value(value: Value) -> Result<Self> {
                match value {
                    Value::$variant(v) => Ok(v),
                    other => Err(mismatch(Self::KIND, &other)),
                }
            }
        }

        impl From<$ty> for Value {
            fn from(v: $ty) -> Self {
                Value::$variant(v)
            }
        }
    )*};
}

sql_types! {
    bool => Bool,
    i8 => TinyInt,
    i16 => SmallInt,
    i32 => Int,
    i64 => BigInt,
    u8 => UTinyInt,
    u16 => USmallInt,
    u32 => UInt,
    u64 => UBigInt,
    f32 => Float,
    f64 => Double,
    char => Char,
    String => Text,
    Decimal => Decimal,
    BigInteger => BigInteger,
    Vec<u8> => Blob,
    Clob => Clob,
    NaiveDate => Date,
    NaiveTime => Time,
    NaiveDateTime => DateTime,
    DateTime<Utc> => Timestamp,
    Uuid => Uuid,
    serde_json::Value => Json,
}

impl<T: SqlType> SqlType for Option<T> {
    const KIND: ValueKind = T::KIND;

    fn to_value(&self) -> Value {
        match self {
            Some(v) => v.to_value(),
            None => Value::Null,
        }
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<&[u8]> for Value {
    fn from(v: &[u8]) -> Self {
        Value::Blob(v.to_vec())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

/// Builds a [`ValueMap`] preserving the written order.
///
/// ```
/// let set = rowbind::value_map! { "name" => "alice", "age" => 30 };
/// assert_eq!(set.len(), 2);
/// ```
#[macro_export]
macro_rules! value_map {
    () => { $crate::ValueMap::new() };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut map = $crate::ValueMap::new();
        $( map.insert(::std::string::String::from($key), $crate::Value::from($value)); )+
        map
    }};
}
