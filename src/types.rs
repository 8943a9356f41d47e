//! Type encoding and decoding between `Value` and SQLite.
//!
//! SQLite stores every value in one of five storage classes (NULL, INTEGER,
//! REAL, TEXT, BLOB). A [`TypeConverter`] adapts one [`ValueKind`] to those
//! classes in both directions: reading a result column into a `Value` and
//! binding a `Value` as a statement parameter.
//!
//! The [`TypeConverterRegistry`] holds one converter per kind. It is built
//! once and only read afterwards, so a shared instance needs no locking.

use crate::core::value::{BigInteger, Clob, Decimal, Value, ValueKind};
use crate::core::{OrmError, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use once_cell::sync::Lazy;
use rusqlite::types::{FromSql, ToSql, ToSqlOutput, Value as SqlValue, ValueRef};
use rusqlite::{Row, Statement};
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use uuid::Uuid;

static GLOBAL_REGISTRY: Lazy<Arc<TypeConverterRegistry>> =
    Lazy::new(|| Arc::new(TypeConverterRegistry::with_defaults()));

/// Bidirectional adapter between one value kind and the driver.
pub trait TypeConverter: Send + Sync {
    /// The kind this converter reads and writes.
    fn kind(&self) -> ValueKind;

    /// Decodes a non-null column value.
    fn decode(&self, raw: ValueRef<'_>) -> Result<Value>;

    /// Encodes a non-null value of this converter's kind.
    fn encode(&self, value: &Value) -> Result<SqlValue>;

    /// Reads the zero-based column `index` of `row`.
    ///
    /// The driver's null indicator is checked before decoding, so a NULL
    /// column always yields `Value::Null` and never the kind's zero value.
    fn read_by_index(&self, row: &Row<'_>, index: usize) -> Result<Value> {
        let raw = row.get_ref(index).map_err(|e| {
            OrmError::Execution(format!(
                "Error attempting to get column #{} from result set: {}",
                index + 1,
                e
            ))
        })?;
        match raw {
            ValueRef::Null => Ok(Value::Null),
            raw => self.decode(raw),
        }
    }

    /// Reads the column labelled `name` of `row`.
    fn read_by_name(&self, row: &Row<'_>, name: &str) -> Result<Value> {
        let raw = row.get_ref(name).map_err(|e| {
            OrmError::Execution(format!(
                "Error attempting to get column '{}' from result set: {}",
                name, e
            ))
        })?;
        match raw {
            ValueRef::Null => Ok(Value::Null),
            raw => self.decode(raw),
        }
    }

    /// Binds `value` to the one-based parameter `index`; `Value::Null`
    /// binds SQL NULL.
    fn write(&self, stmt: &mut Statement<'_>, index: usize, value: &Value) -> Result<()> {
        let bound = match value {
            Value::Null => SqlValue::Null,
            value => self.encode(value)?,
        };
        stmt.raw_bind_parameter(index, bound).map_err(|e| {
            OrmError::Execution(format!("Failed to bind parameter #{}: {}", index, e))
        })
    }
}

fn wrong_kind(expected: ValueKind, value: &Value) -> OrmError {
    OrmError::InvalidParameterType(format!(
        "{} converter cannot bind a {} value",
        expected,
        value.type_name()
    ))
}

fn undecodable(kind: ValueKind, raw: ValueRef<'_>) -> OrmError {
    OrmError::Conversion(format!("cannot read {} column as {}", raw.data_type(), kind))
}

fn text_of(kind: ValueKind, bytes: &[u8]) -> Result<&str> {
    std::str::from_utf8(bytes)
        .map_err(|e| OrmError::Conversion(format!("invalid UTF-8 in {} column: {}", kind, e)))
}

fn into_owned(output: ToSqlOutput<'_>) -> Result<SqlValue> {
    match output {
        ToSqlOutput::Borrowed(raw) => Ok(raw.into()),
        ToSqlOutput::Owned(value) => Ok(value),
        _ => Err(OrmError::Conversion(
            "unsupported driver parameter representation".to_string(),
        )),
    }
}

/// BOOLEAN stored as INTEGER 0/1.
#[derive(Debug, Default)]
pub struct BoolConverter;

impl TypeConverter for BoolConverter {
    fn kind(&self) -> ValueKind {
        ValueKind::Bool
    }

    fn decode(&self, raw: ValueRef<'_>) -> Result<Value> {
        match raw {
            ValueRef::Integer(i) => Ok(Value::Bool(i != 0)),
            ValueRef::Real(f) => Ok(Value::Bool(f != 0.0)),
            ValueRef::Text(t) => match text_of(self.kind(), t)?.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "t" | "yes" => Ok(Value::Bool(true)),
                "0" | "false" | "f" | "no" => Ok(Value::Bool(false)),
                _ => Err(undecodable(self.kind(), raw)),
            },
            _ => Err(undecodable(self.kind(), raw)),
        }
    }

    fn encode(&self, value: &Value) -> Result<SqlValue> {
        match value {
            Value::Bool(b) => Ok(SqlValue::Integer(i64::from(*b))),
            other => Err(wrong_kind(self.kind(), other)),
        }
    }
}

/// Every integer width, range-checked in both directions.
#[derive(Debug)]
pub struct IntegerConverter {
    kind: ValueKind,
}

impl IntegerConverter {
    /// Returns `None` for non-integer kinds.
    pub fn new(kind: ValueKind) -> Option<Self> {
        match kind {
            ValueKind::TinyInt
            | ValueKind::SmallInt
            | ValueKind::Int
            | ValueKind::BigInt
            | ValueKind::UTinyInt
            | ValueKind::USmallInt
            | ValueKind::UInt
            | ValueKind::UBigInt => Some(IntegerConverter { kind }),
            _ => None,
        }
    }

    fn narrow(&self, wide: i128) -> Result<Value> {
        let out_of_range =
            |_| OrmError::Conversion(format!("{} is out of range for {}", wide, self.kind));
        Ok(match self.kind {
            ValueKind::TinyInt => Value::TinyInt(i8::try_from(wide).map_err(out_of_range)?),
            ValueKind::SmallInt => Value::SmallInt(i16::try_from(wide).map_err(out_of_range)?),
            ValueKind::Int => Value::Int(i32::try_from(wide).map_err(out_of_range)?),
            ValueKind::BigInt => Value::BigInt(i64::try_from(wide).map_err(out_of_range)?),
            ValueKind::UTinyInt => Value::UTinyInt(u8::try_from(wide).map_err(out_of_range)?),
            ValueKind::USmallInt => Value::USmallInt(u16::try_from(wide).map_err(out_of_range)?),
            ValueKind::UInt => Value::UInt(u32::try_from(wide).map_err(out_of_range)?),
            _ => Value::UBigInt(u64::try_from(wide).map_err(out_of_range)?),
        })
    }
}

impl TypeConverter for IntegerConverter {
    fn kind(&self) -> ValueKind {
        self.kind
    }

    fn decode(&self, raw: ValueRef<'_>) -> Result<Value> {
        let wide = match raw {
            ValueRef::Integer(i) => i128::from(i),
            ValueRef::Real(f) if f.fract() == 0.0 && f.is_finite() => f as i128,
            ValueRef::Text(t) => text_of(self.kind, t)?
                .trim()
                .parse::<i128>()
                .map_err(|_| undecodable(self.kind, raw))?,
            _ => return Err(undecodable(self.kind, raw)),
        };
        self.narrow(wide)
    }

    fn encode(&self, value: &Value) -> Result<SqlValue> {
        if value.kind() != Some(self.kind) {
            return Err(wrong_kind(self.kind, value));
        }
        let wide = match value {
            Value::TinyInt(v) => i64::from(*v),
            Value::SmallInt(v) => i64::from(*v),
            Value::Int(v) => i64::from(*v),
            Value::BigInt(v) => *v,
            Value::UTinyInt(v) => i64::from(*v),
            Value::USmallInt(v) => i64::from(*v),
            Value::UInt(v) => i64::from(*v),
            Value::UBigInt(v) => i64::try_from(*v).map_err(|_| {
                OrmError::Conversion(format!("{} exceeds the driver's 64-bit signed range", v))
            })?,
            other => return Err(wrong_kind(self.kind, other)),
        };
        Ok(SqlValue::Integer(wide))
    }
}

/// REAL and DOUBLE.
#[derive(Debug)]
pub struct FloatConverter {
    single: bool,
}

impl FloatConverter {
    pub fn single() -> Self {
        FloatConverter { single: true }
    }

    pub fn double() -> Self {
        FloatConverter { single: false }
    }
}

impl TypeConverter for FloatConverter {
    fn kind(&self) -> ValueKind {
        if self.single {
            ValueKind::Float
        } else {
            ValueKind::Double
        }
    }

    fn decode(&self, raw: ValueRef<'_>) -> Result<Value> {
        let wide = match raw {
            ValueRef::Real(f) => f,
            ValueRef::Integer(i) => i as f64,
            ValueRef::Text(t) => text_of(self.kind(), t)?
                .trim()
                .parse::<f64>()
                .map_err(|_| undecodable(self.kind(), raw))?,
            _ => return Err(undecodable(self.kind(), raw)),
        };
        Ok(if self.single {
            Value::Float(wide as f32)
        } else {
            Value::Double(wide)
        })
    }

    fn encode(&self, value: &Value) -> Result<SqlValue> {
        match (self.single, value) {
            (true, Value::Float(v)) => Ok(SqlValue::Real(f64::from(*v))),
            (false, Value::Double(v)) => Ok(SqlValue::Real(*v)),
            (_, other) => Err(wrong_kind(self.kind(), other)),
        }
    }
}

/// Single character stored as one-character TEXT.
#[derive(Debug, Default)]
pub struct CharConverter;

impl TypeConverter for CharConverter {
    fn kind(&self) -> ValueKind {
        ValueKind::Char
    }

    fn decode(&self, raw: ValueRef<'_>) -> Result<Value> {
        match raw {
            ValueRef::Text(t) => text_of(self.kind(), t)?
                .chars()
                .next()
                .map(Value::Char)
                .ok_or_else(|| OrmError::Conversion("empty text cannot be read as CHAR".to_string())),
            _ => Err(undecodable(self.kind(), raw)),
        }
    }

    fn encode(&self, value: &Value) -> Result<SqlValue> {
        match value {
            Value::Char(c) => Ok(SqlValue::Text(c.to_string())),
            other => Err(wrong_kind(self.kind(), other)),
        }
    }
}

/// TEXT. Numeric columns are rendered to their textual form on read.
#[derive(Debug, Default)]
pub struct TextConverter;

impl TypeConverter for TextConverter {
    fn kind(&self) -> ValueKind {
        ValueKind::Text
    }

    fn decode(&self, raw: ValueRef<'_>) -> Result<Value> {
        match raw {
            ValueRef::Text(t) => Ok(Value::Text(text_of(self.kind(), t)?.to_string())),
            ValueRef::Integer(i) => Ok(Value::Text(i.to_string())),
            ValueRef::Real(f) => Ok(Value::Text(f.to_string())),
            _ => Err(undecodable(self.kind(), raw)),
        }
    }

    fn encode(&self, value: &Value) -> Result<SqlValue> {
        match value {
            Value::Text(s) => Ok(SqlValue::Text(s.clone())),
            other => Err(wrong_kind(self.kind(), other)),
        }
    }
}

/// Large character object stored as TEXT.
#[derive(Debug, Default)]
pub struct ClobConverter;

impl TypeConverter for ClobConverter {
    fn kind(&self) -> ValueKind {
        ValueKind::Clob
    }

    fn decode(&self, raw: ValueRef<'_>) -> Result<Value> {
        match raw {
            ValueRef::Text(t) => Ok(Value::Clob(Clob(text_of(self.kind(), t)?.to_string()))),
            _ => Err(undecodable(self.kind(), raw)),
        }
    }

    fn encode(&self, value: &Value) -> Result<SqlValue> {
        match value {
            Value::Clob(c) => Ok(SqlValue::Text(c.0.clone())),
            other => Err(wrong_kind(self.kind(), other)),
        }
    }
}

/// Significant decimal digits a REAL is guaranteed to carry.
const REAL_EXACT_DIGITS: usize = 15;

/// Text of a REAL read back for an arbitrary-precision kind. SQLite stores
/// text bound into a DECIMAL or NUMERIC column as REAL, so anything beyond
/// [`REAL_EXACT_DIGITS`] significant digits has already been rounded away.
fn exact_real_text(kind: ValueKind, f: f64) -> Result<String> {
    let text = f.to_string();
    let digits: String = text.chars().filter(char::is_ascii_digit).collect();
    let significant = digits.trim_start_matches('0').trim_end_matches('0').len();
    if significant > REAL_EXACT_DIGITS {
        return Err(OrmError::Conversion(format!(
            "{} column holds REAL {} with {} significant digits; precision was lost (declare the column TEXT)",
            kind, text, significant
        )));
    }
    Ok(text)
}

/// Arbitrary-precision decimal, bound as TEXT to avoid float rounding.
/// Columns must be declared TEXT to keep more than 15 significant digits.
#[derive(Debug, Default)]
pub struct DecimalConverter;

impl TypeConverter for DecimalConverter {
    fn kind(&self) -> ValueKind {
        ValueKind::Decimal
    }

    fn decode(&self, raw: ValueRef<'_>) -> Result<Value> {
        let text = match raw {
            ValueRef::Integer(i) => i.to_string(),
            ValueRef::Real(f) => exact_real_text(self.kind(), f)?,
            ValueRef::Text(t) => text_of(self.kind(), t)?.to_string(),
            _ => return Err(undecodable(self.kind(), raw)),
        };
        text.parse::<Decimal>().map(Value::Decimal)
    }

    fn encode(&self, value: &Value) -> Result<SqlValue> {
        match value {
            Value::Decimal(d) => Ok(SqlValue::Text(d.as_str().to_string())),
            other => Err(wrong_kind(self.kind(), other)),
        }
    }
}

/// Arbitrary-precision integer; bound as INTEGER when it fits, TEXT otherwise.
/// Values outside `i64` need a TEXT column.
#[derive(Debug, Default)]
pub struct BigIntegerConverter;

impl TypeConverter for BigIntegerConverter {
    fn kind(&self) -> ValueKind {
        ValueKind::BigInteger
    }

    fn decode(&self, raw: ValueRef<'_>) -> Result<Value> {
        match raw {
            ValueRef::Integer(i) => Ok(Value::BigInteger(BigInteger::from(i))),
            ValueRef::Real(f) if f.fract() == 0.0 && f.is_finite() => {
                exact_real_text(self.kind(), f)?
                    .parse::<BigInteger>()
                    .map(Value::BigInteger)
            }
            ValueRef::Text(t) => text_of(self.kind(), t)?
                .parse::<BigInteger>()
                .map(Value::BigInteger),
            _ => Err(undecodable(self.kind(), raw)),
        }
    }

    fn encode(&self, value: &Value) -> Result<SqlValue> {
        match value {
            Value::BigInteger(b) => Ok(match b.to_i64() {
                Some(i) => SqlValue::Integer(i),
                None => SqlValue::Text(b.as_str().to_string()),
            }),
            other => Err(wrong_kind(self.kind(), other)),
        }
    }
}

/// Large binary object.
#[derive(Debug, Default)]
pub struct BlobConverter;

impl TypeConverter for BlobConverter {
    fn kind(&self) -> ValueKind {
        ValueKind::Blob
    }

    fn decode(&self, raw: ValueRef<'_>) -> Result<Value> {
        match raw {
            ValueRef::Blob(b) | ValueRef::Text(b) => Ok(Value::Blob(b.to_vec())),
            _ => Err(undecodable(self.kind(), raw)),
        }
    }

    fn encode(&self, value: &Value) -> Result<SqlValue> {
        match value {
            Value::Blob(b) => Ok(SqlValue::Blob(b.clone())),
            other => Err(wrong_kind(self.kind(), other)),
        }
    }
}

/// Kinds whose storage format is owned by the driver's own
/// `FromSql`/`ToSql` implementations (date/time, UUID, JSON).
pub struct NativeConverter<T> {
    kind: ValueKind,
    wrap: fn(T) -> Value,
    unwrap: fn(&Value) -> Option<&T>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> NativeConverter<T> {
    pub fn new(kind: ValueKind, wrap: fn(T) -> Value, unwrap: fn(&Value) -> Option<&T>) -> Self {
        NativeConverter {
            kind,
            wrap,
            unwrap,
            _marker: PhantomData,
        }
    }
}

impl<T> fmt::Debug for NativeConverter<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeConverter").field("kind", &self.kind).finish()
    }
}

impl<T: FromSql + ToSql> TypeConverter for NativeConverter<T> {
    fn kind(&self) -> ValueKind {
        self.kind
    }

    fn decode(&self, raw: ValueRef<'_>) -> Result<Value> {
        T::column_result(raw).map(self.wrap).map_err(|e| {
            OrmError::Conversion(format!(
                "cannot read {} column as {}: {}",
                raw.data_type(),
                self.kind,
                e
            ))
        })
    }

    fn encode(&self, value: &Value) -> Result<SqlValue> {
        let native = (self.unwrap)(value).ok_or_else(|| wrong_kind(self.kind, value))?;
        let output = native
            .to_sql()
            .map_err(|e| OrmError::Conversion(format!("cannot encode {}: {}", self.kind, e)))?;
        into_owned(output)
    }
}

fn as_date(value: &Value) -> Option<&NaiveDate> {
    match value {
        Value::Date(v) => Some(v),
        _ => None,
    }
}

fn as_time(value: &Value) -> Option<&NaiveTime> {
    match value {
        Value::Time(v) => Some(v),
        _ => None,
    }
}

fn as_datetime(value: &Value) -> Option<&NaiveDateTime> {
    match value {
        Value::DateTime(v) => Some(v),
        _ => None,
    }
}

fn as_timestamp(value: &Value) -> Option<&DateTime<Utc>> {
    match value {
        Value::Timestamp(v) => Some(v),
        _ => None,
    }
}

fn as_uuid(value: &Value) -> Option<&Uuid> {
    match value {
        Value::Uuid(v) => Some(v),
        _ => None,
    }
}

fn as_json(value: &Value) -> Option<&serde_json::Value> {
    match value {
        Value::Json(v) => Some(v),
        _ => None,
    }
}

/// One converter per value kind.
pub struct TypeConverterRegistry {
    converters: HashMap<ValueKind, Box<dyn TypeConverter>>,
}

impl TypeConverterRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        TypeConverterRegistry {
            converters: HashMap::new(),
        }
    }

    /// Creates a registry with a converter for every [`ValueKind`].
    pub fn with_defaults() -> Self {
        let mut registry = TypeConverterRegistry::new();
        registry.register(BoolConverter);
        for kind in ValueKind::ALL {
            if let Some(converter) = IntegerConverter::new(kind) {
                registry.register(converter);
            }
        }
        registry.register(FloatConverter::single());
        registry.register(FloatConverter::double());
        registry.register(CharConverter);
        registry.register(TextConverter);
        registry.register(ClobConverter);
        registry.register(DecimalConverter);
        registry.register(BigIntegerConverter);
        registry.register(BlobConverter);
        registry.register(NativeConverter::new(ValueKind::Date, Value::Date, as_date));
        registry.register(NativeConverter::new(ValueKind::Time, Value::Time, as_time));
        registry.register(NativeConverter::new(
            ValueKind::DateTime,
            Value::DateTime,
            as_datetime,
        ));
        registry.register(NativeConverter::new(
            ValueKind::Timestamp,
            Value::Timestamp,
            as_timestamp,
        ));
        registry.register(NativeConverter::new(ValueKind::Uuid, Value::Uuid, as_uuid));
        registry.register(NativeConverter::new(ValueKind::Json, Value::Json, as_json));
        registry
    }

    /// The process-wide default registry, initialised on first use.
    pub fn global() -> Arc<TypeConverterRegistry> {
        Arc::clone(&GLOBAL_REGISTRY)
    }

    /// Registers `converter` for its kind, returning the one it replaces.
    pub fn register<C: TypeConverter + 'static>(
        &mut self,
        converter: C,
    ) -> Option<Box<dyn TypeConverter>> {
        self.converters.insert(converter.kind(), Box::new(converter))
    }

    pub fn get(&self, kind: ValueKind) -> Option<&dyn TypeConverter> {
        self.converters.get(&kind).map(|c| c.as_ref())
    }

    /// Looks up the converter for `kind`.
    ///
    /// # Errors
    ///
    /// Returns `OrmError::InvalidParameterType` when no converter is registered.
    pub fn converter_for(&self, kind: ValueKind) -> Result<&dyn TypeConverter> {
        self.get(kind).ok_or_else(|| {
            OrmError::InvalidParameterType(format!("no converter registered for {}", kind))
        })
    }

    pub fn contains(&self, kind: ValueKind) -> bool {
        self.converters.contains_key(&kind)
    }

    pub fn len(&self) -> usize {
        self.converters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.converters.is_empty()
    }
}

impl Default for TypeConverterRegistry {
    fn default() -> Self {
        TypeConverterRegistry::with_defaults()
    }
}

impl fmt::Debug for TypeConverterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut kinds: Vec<&ValueKind> = self.converters.keys().collect();
        kinds.sort_by_key(|k| k.name());
        f.debug_struct("TypeConverterRegistry")
            .field("kinds", &kinds)
            .finish()
    }
}
