//! Whitelisted entity fields and the typed values they hold.

use std::cmp::Ordering;
use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Field kind, used to coerce raw filter values and to pick comparison rules.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldKind {
    String,
    I64,
    F64,
    Bool,
    Uuid,
    DateTimeUtc,
    Date,
}

/// A field name after resolution against a [`FieldSet`].
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct FieldRef {
    /// Dotted path into the entity, e.g. `address.city`.
    pub path: String,
    pub kind: FieldKind,
}

impl FieldRef {
    pub fn new(path: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }

    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.path.split('.')
    }
}

/// Declared fields of one entity type. Lookups are case-insensitive.
#[derive(Clone, Debug, Default)]
pub struct FieldSet {
    map: HashMap<String, FieldRef>,
}

impl FieldSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a field whose API name is also its path.
    pub fn insert(self, name: impl Into<String>, kind: FieldKind) -> Self {
        let name = name.into();
        let path = name.clone();
        self.insert_path(name, path, kind)
    }

    /// Declare a field exposed under `name` but stored at `path`.
    pub fn insert_path(
        mut self,
        name: impl Into<String>,
        path: impl Into<String>,
        kind: FieldKind,
    ) -> Self {
        self.map
            .insert(name.into().to_lowercase(), FieldRef::new(path, kind));
        self
    }

    pub fn get(&self, name: &str) -> Option<&FieldRef> {
        self.map.get(&name.trim().to_lowercase())
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldRef)> {
        self.map.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// A typed scalar, either read from an entity or coerced from a filter parameter.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    I64(i64),
    F64(f64),
    String(String),
    Uuid(Uuid),
    DateTime(DateTime<Utc>),
    Date(NaiveDate),
}

impl Value {
    /// Coerce a raw parameter into the representation of `kind`.
    pub fn parse(kind: FieldKind, raw: &str) -> Option<Value> {
        Some(match kind {
            FieldKind::String => Value::String(raw.to_string()),
            FieldKind::I64 => Value::I64(raw.trim().parse().ok()?),
            FieldKind::F64 => {
                let f: f64 = raw.trim().parse().ok()?;
                if f.is_nan() {
                    return None;
                }
                Value::F64(f)
            }
            FieldKind::Bool => match raw.trim().to_ascii_lowercase().as_str() {
                "true" => Value::Bool(true),
                "false" => Value::Bool(false),
                _ => return None,
            },
            FieldKind::Uuid => Value::Uuid(raw.trim().parse().ok()?),
            FieldKind::DateTimeUtc => Value::DateTime(
                DateTime::parse_from_rfc3339(raw.trim())
                    .ok()?
                    .with_timezone(&Utc),
            ),
            FieldKind::Date => Value::Date(NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").ok()?),
        })
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::I64(_) => "i64",
            Value::F64(_) => "f64",
            Value::String(_) => "string",
            Value::Uuid(_) => "uuid",
            Value::DateTime(_) => "datetime",
            Value::Date(_) => "date",
        }
    }

    /// Total-ish order used for sorting: null sorts first, numbers compare
    /// across `I64`/`F64`, other mixed kinds are incomparable.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        use Value as V;
        match (self, other) {
            (V::Null, V::Null) => Some(Ordering::Equal),
            (V::Null, _) => Some(Ordering::Less),
            (_, V::Null) => Some(Ordering::Greater),
            (V::Bool(a), V::Bool(b)) => Some(a.cmp(b)),
            (V::I64(a), V::I64(b)) => Some(a.cmp(b)),
            (V::F64(a), V::F64(b)) => a.partial_cmp(b),
            (V::I64(a), V::F64(b)) => (*a as f64).partial_cmp(b),
            (V::F64(a), V::I64(b)) => a.partial_cmp(&(*b as f64)),
            (V::String(a), V::String(b)) => Some(a.cmp(b)),
            (V::Uuid(a), V::Uuid(b)) => Some(a.cmp(b)),
            (V::DateTime(a), V::DateTime(b)) => Some(a.cmp(b)),
            (V::Date(a), V::Date(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::I64(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::I64(v.into())
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::I64(v.into())
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::F64(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<Uuid> for Value {
    fn from(v: Uuid) -> Self {
        Value::Uuid(v)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Value::DateTime(v)
    }
}

impl From<NaiveDate> for Value {
    fn from(v: NaiveDate) -> Self {
        Value::Date(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}
