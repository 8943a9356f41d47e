//! Model declarations and field resolution.
//!
//! A model is a struct whose fields map one-to-one onto result-set columns
//! by name. Instead of discovering fields at runtime, every model declares
//! an explicit [`ModelSchema`]: its type name, a factory for empty
//! instances, and an ordered list of field accessors. Embedded "base"
//! models contribute their fields after the model's own, so the most
//! derived declaration of a name wins.
//!
//! [`ModelReflector::field_map`] resolves a declaration once per type and
//! caches the resulting [`FieldMap`].
//!
//! ```
//! use rowbind::{Model, ModelSchema};
//!
//! #[derive(Default)]
//! struct Tag {
//!     id: i64,
//!     label: String,
//! }
//!
//! impl Model for Tag {
//!     fn schema() -> ModelSchema<Self> {
//!         ModelSchema::new("Tag", Tag::default)
//!             .field("id", |t| &t.id, |t| &mut t.id)
//!             .field("label", |t| &t.label, |t| &mut t.label)
//!     }
//! }
//! ```

use crate::core::value::{SqlType, Value, ValueKind, ValueMap};
use crate::core::{OrmError, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};
use uuid::Uuid;

use crate::core::value::{BigInteger, Clob, Decimal};

type Getter<M> = Box<dyn Fn(&M) -> Value + Send + Sync>;
type Setter<M> = Box<dyn Fn(&mut M, Value) -> Result<()> + Send + Sync>;

static FIELD_MAPS: Lazy<RwLock<HashMap<TypeId, Arc<dyn Any + Send + Sync>>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));

/// A struct that maps onto the columns of a table.
pub trait Model: Sized + 'static {
    /// Declares the model's name, factory and persistable fields.
    fn schema() -> ModelSchema<Self>;
}

/// One persistable field: the column label it matches (case-sensitive),
/// its declared kind, and an accessor/mutator pair.
pub struct FieldDescriptor<M> {
    name: &'static str,
    kind: ValueKind,
    getter: Getter<M>,
    setter: Setter<M>,
}

impl<M: 'static> FieldDescriptor<M> {
    pub fn new<F, G, S>(name: &'static str, get: G, get_mut: S) -> Self
    where
        F: SqlType + 'static,
        G: Fn(&M) -> &F + Send + Sync + 'static,
        S: Fn(&mut M) -> &mut F + Send + Sync + 'static,
    {
        FieldDescriptor {
            name,
            kind: F::KIND,
            getter: Box::new(move |m: &M| get(m).to_value()),
            setter: Box::new(move |m: &mut M, value: Value| {
                *get_mut(m) = F::from_value(value)?;
                Ok(())
            }),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Declared type, used to pick the converter for this column.
    pub fn kind(&self) -> ValueKind {
        self.kind
    }

    pub fn get(&self, model: &M) -> Value {
        (self.getter)(model)
    }

    pub fn set(&self, model: &mut M, value: Value) -> Result<()> {
        (self.setter)(model, value).map_err(|e| match e {
            OrmError::Conversion(msg) => {
                OrmError::Conversion(format!("field `{}`: {}", self.name, msg))
            }
            other => other,
        })
    }

    /// Re-targets this descriptor at a model `P` embedding `M`.
    fn embed<P: 'static>(
        self,
        outer: Arc<dyn Fn(&P) -> &M + Send + Sync>,
        outer_mut: Arc<dyn Fn(&mut P) -> &mut M + Send + Sync>,
    ) -> FieldDescriptor<P> {
        let getter = self.getter;
        let setter = self.setter;
        FieldDescriptor {
            name: self.name,
            kind: self.kind,
            getter: Box::new(move |p: &P| getter((*outer)(p))),
            setter: Box::new(move |p: &mut P, value: Value| setter((*outer_mut)(p), value)),
        }
    }
}

impl<M> fmt::Debug for FieldDescriptor<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldDescriptor")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .finish()
    }
}

/// Declaration of a model type.
pub struct ModelSchema<M> {
    name: &'static str,
    factory: fn() -> M,
    fields: Vec<FieldDescriptor<M>>,
    inherited: Vec<FieldDescriptor<M>>,
}

impl<M: 'static> ModelSchema<M> {
    /// `name` is the simple type name, also used as the implied table
    /// name; `factory` creates an instance with every field at its default.
    pub fn new(name: &'static str, factory: fn() -> M) -> Self {
        ModelSchema {
            name,
            factory,
            fields: Vec::new(),
            inherited: Vec::new(),
        }
    }

    /// Declares a field, in declaration order.
    pub fn field<F, G, S>(mut self, name: &'static str, get: G, get_mut: S) -> Self
    where
        F: SqlType + 'static,
        G: Fn(&M) -> &F + Send + Sync + 'static,
        S: Fn(&mut M) -> &mut F + Send + Sync + 'static,
    {
        self.fields.push(FieldDescriptor::new(name, get, get_mut));
        self
    }

    /// Embeds base model `B`. Its fields follow this model's own fields;
    /// names already declared here shadow the base's.
    pub fn extend<B, G, S>(mut self, base: G, base_mut: S) -> Self
    where
        B: Model,
        G: Fn(&M) -> &B + Send + Sync + 'static,
        S: Fn(&mut M) -> &mut B + Send + Sync + 'static,
    {
        let outer: Arc<dyn Fn(&M) -> &B + Send + Sync> = Arc::new(base);
        let outer_mut: Arc<dyn Fn(&mut M) -> &mut B + Send + Sync> = Arc::new(base_mut);
        for descriptor in B::schema().into_ordered() {
            self.inherited
                .push(descriptor.embed(Arc::clone(&outer), Arc::clone(&outer_mut)));
        }
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Own fields then inherited ones, first declaration of a name wins.
    fn into_ordered(self) -> Vec<FieldDescriptor<M>> {
        let mut seen = std::collections::HashSet::new();
        self.fields
            .into_iter()
            .chain(self.inherited)
            .filter(|d| seen.insert(d.name))
            .collect()
    }

    fn resolve(self) -> Result<FieldMap<M>> {
        let name = self.name;
        if name.trim().is_empty() || name.chars().any(char::is_whitespace) {
            return Err(OrmError::Configuration(format!(
                "invalid model type `{}`: type name must be a non-empty identifier",
                name
            )));
        }
        let factory = self.factory;
        let fields: IndexMap<&'static str, FieldDescriptor<M>> = self
            .into_ordered()
            .into_iter()
            .map(|d| (d.name, d))
            .collect();
        if fields.is_empty() {
            return Err(OrmError::Configuration(format!(
                "invalid model type `{}`: no persistable fields declared",
                name
            )));
        }
        Ok(FieldMap {
            type_name: name,
            factory,
            fields,
        })
    }
}

/// Resolved, ordered name → descriptor table for one model type.
pub struct FieldMap<M> {
    type_name: &'static str,
    factory: fn() -> M,
    fields: IndexMap<&'static str, FieldDescriptor<M>>,
}

impl<M: 'static> FieldMap<M> {
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Creates a new instance with every field at its default.
    pub fn create(&self) -> M {
        (self.factory)()
    }

    pub fn get(&self, name: &str) -> Option<&FieldDescriptor<M>> {
        self.fields.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldDescriptor<M>> {
        self.fields.values()
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.fields.keys().copied()
    }

    /// Current field values of `model`, in field order.
    pub fn values_of(&self, model: &M) -> ValueMap {
        self.iter()
            .map(|d| (d.name().to_string(), d.get(model)))
            .collect()
    }
}

impl<M> fmt::Debug for FieldMap<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldMap")
            .field("type_name", &self.type_name)
            .field("fields", &self.fields.values().collect::<Vec<_>>())
            .finish()
    }
}

/// How a result type is materialized from a row.
pub enum Shape<T> {
    /// Read from the first column with the kind's converter.
    Scalar {
        kind: ValueKind,
        decode: fn(Value) -> Result<T>,
    },
    /// Assembled field by field from matching column labels.
    Model(Arc<FieldMap<T>>),
}

/// Types a query can return: the scalar allow-list and every [`Model`].
pub trait Persistable: Sized + 'static {
    fn shape() -> Result<Shape<Self>>;

    /// Result when a query yields no row: the zero value for scalars,
    /// `None` for models.
    fn default_value() -> Option<Self>;
}

impl<M: Model> Persistable for M {
    fn shape() -> Result<Shape<Self>> {
        ModelReflector::field_map::<M>().map(Shape::Model)
    }

    fn default_value() -> Option<Self> {
        None
    }
}

macro_rules! scalar_persistable {
    ($($ty:ty),* $(,)?) => {$(
        impl Persistable for $ty {
            fn shape() -> Result<Shape<Self>> {
                Ok(Shape::Scalar {
                    kind: <$ty as SqlType>::KIND,
                    decode: <$ty as SqlType>::from_value,
                })
            }

            fn default_value() -> Option<Self> {
                Some(<$ty>::default())
            }
        }
    )*};
}

scalar_persistable! {
    bool, i8, i16, i32, i64, u8, u16, u32, u64, f32, f64, char, String,
    Decimal, BigInteger, Vec<u8>, Clob, NaiveDate, NaiveTime, NaiveDateTime,
    DateTime<Utc>, Uuid, serde_json::Value,
}

impl<T: SqlType + 'static> Persistable for Option<T> {
    fn shape() -> Result<Shape<Self>> {
        Ok(Shape::Scalar {
            kind: T::KIND,
            decode: <Option<T> as SqlType>::from_value,
        })
    }

    fn default_value() -> Option<Self> {
        Some(None)
    }
}

/// A model instance usable as the single parameter of a named-placeholder
/// statement.
pub trait ModelParam {
    /// Field name → current value, in field order.
    fn field_values(&self) -> Result<ValueMap>;
}

impl<M: Model> ModelParam for M {
    fn field_values(&self) -> Result<ValueMap> {
        Ok(ModelReflector::field_map::<M>()?.values_of(self))
    }
}

/// Entry points for model validation and field resolution.
pub struct ModelReflector;

impl ModelReflector {
    /// Whether `T` is a scalar of the allow-list or a valid model.
    pub fn is_persistable_type<T: Persistable>() -> bool {
        T::shape().is_ok()
    }

    pub fn is_scalar<T: Persistable>() -> bool {
        matches!(T::shape(), Ok(Shape::Scalar { .. }))
    }

    /// # Errors
    ///
    /// Returns `OrmError::Configuration` when `T` is a model whose
    /// declaration is invalid.
    pub fn check_model<T: Persistable>() -> Result<()> {
        T::shape().map(|_| ())
    }

    /// Resolves and caches the field map of `M`.
    ///
    /// # Errors
    ///
    /// Returns `OrmError::Configuration` for an invalid type name or a
    /// declaration without fields.
    pub fn field_map<M: Model>() -> Result<Arc<FieldMap<M>>> {
        let key = TypeId::of::<M>();
        let cached = FIELD_MAPS
            .read()
            .map_err(|_| OrmError::Configuration("model schema cache is poisoned".to_string()))?
            .get(&key)
            .cloned();
        let entry = match cached {
            Some(entry) => entry,
            None => {
                let resolved: Arc<dyn Any + Send + Sync> = Arc::new(M::schema().resolve()?);
                let mut guard = FIELD_MAPS.write().map_err(|_| {
                    OrmError::Configuration("model schema cache is poisoned".to_string())
                })?;
                Arc::clone(guard.entry(key).or_insert(resolved))
            }
        };
        entry.downcast::<FieldMap<M>>().map_err(|_| {
            OrmError::Configuration(format!(
                "schema cache entry for `{}` has the wrong type",
                std::any::type_name::<M>()
            ))
        })
    }

    pub fn create_instance<M: Model>() -> Result<M> {
        Ok(Self::field_map::<M>()?.create())
    }

    pub fn default_value<T: Persistable>() -> Option<T> {
        T::default_value()
    }
}
