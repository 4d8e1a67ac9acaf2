use std::collections::BTreeMap;

use chrono::DateTime;
use tracing::trace;

use crate::{
    adapters::{AttributeValue, Item},
    error::Error,
    object::Object,
    query::Value,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeType {
    String,
    Number,
    Boolean,
    /// Stored as epoch milliseconds
    Date,
    StringSet,
    NumberSet,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    pub kind: AttributeType,
}

impl Attribute {
    pub fn new(name: impl Into<String>, kind: AttributeType) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }

    /// Encode a literal into the store's wire representation.
    ///
    /// With `filter` set, set-typed attributes also accept a single element,
    /// which is what `contains`/`eq` comparisons against a set operate on.
    pub fn to_wire(&self, value: &Value, filter: bool) -> Result<AttributeValue, Error> {
        match (self.kind, value) {
            (AttributeType::String, Value::String(s)) => Ok(AttributeValue::S(s.clone())),
            (AttributeType::Number, Value::Int(_) | Value::Float(_)) => {
                Ok(AttributeValue::N(self.number(value)?))
            }
            (AttributeType::Boolean, Value::Bool(b)) => Ok(AttributeValue::Bool(*b)),
            (AttributeType::Date, Value::Timestamp(t)) => {
                Ok(AttributeValue::N(t.timestamp_millis().to_string()))
            }
            (AttributeType::Date, Value::Int(ms)) => Ok(AttributeValue::N(ms.to_string())),
            (AttributeType::StringSet, Value::List(items)) => {
                let members = self.non_empty(items)?;
                members
                    .iter()
                    .map(|item| match item {
                        Value::String(s) => Ok(s.clone()),
                        other => Err(self.mismatch(other)),
                    })
                    .collect::<Result<Vec<_>, _>>()
                    .map(AttributeValue::Ss)
            }
            (AttributeType::StringSet, Value::String(s)) if filter => {
                Ok(AttributeValue::S(s.clone()))
            }
            (AttributeType::NumberSet, Value::List(items)) => {
                let members = self.non_empty(items)?;
                members
                    .iter()
                    .map(|item| self.number(item))
                    .collect::<Result<Vec<_>, _>>()
                    .map(AttributeValue::Ns)
            }
            (AttributeType::NumberSet, Value::Int(_) | Value::Float(_)) if filter => {
                Ok(AttributeValue::N(self.number(value)?))
            }
            (_, other) => Err(self.mismatch(other)),
        }
    }

    /// Decode a wire value into the JSON shape the object deserializes from.
    pub fn from_wire(&self, wire: &AttributeValue) -> Result<serde_json::Value, Error> {
        match (self.kind, wire) {
            (_, AttributeValue::Null(true)) => Ok(serde_json::Value::Null),
            (AttributeType::String, AttributeValue::S(s)) => Ok(serde_json::Value::String(s.clone())),
            (AttributeType::Number, AttributeValue::N(n)) => self.parse_number(n),
            (AttributeType::Boolean, AttributeValue::Bool(b)) => Ok(serde_json::Value::Bool(*b)),
            (AttributeType::Date, AttributeValue::N(n)) => {
                let millis = n.parse::<i64>().map_err(|_| {
                    Error::Decoding(format!("`{}` holds an invalid date: {}", self.name, n))
                })?;
                let date = DateTime::from_timestamp_millis(millis).ok_or_else(|| {
                    Error::Decoding(format!("`{}` holds an out of range date: {}", self.name, n))
                })?;
                Ok(serde_json::Value::String(date.to_rfc3339()))
            }
            (AttributeType::StringSet, AttributeValue::Ss(members)) => Ok(serde_json::Value::Array(
                members
                    .iter()
                    .cloned()
                    .map(serde_json::Value::String)
                    .collect(),
            )),
            (AttributeType::NumberSet, AttributeValue::Ns(members)) => members
                .iter()
                .map(|n| self.parse_number(n))
                .collect::<Result<Vec<_>, _>>()
                .map(serde_json::Value::Array),
            (kind, other) => Err(Error::Decoding(format!(
                "`{}` is {:?} but the row holds a {} value",
                self.name,
                kind,
                other.tag()
            ))),
        }
    }

    fn number(&self, value: &Value) -> Result<String, Error> {
        match value {
            Value::Int(i) => Ok(i.to_string()),
            Value::Float(f) if f.is_finite() => Ok(f.to_string()),
            Value::Float(f) => Err(Error::Encoding(format!(
                "`{}` cannot store non-finite number {}",
                self.name, f
            ))),
            other => Err(self.mismatch(other)),
        }
    }

    fn parse_number(&self, n: &str) -> Result<serde_json::Value, Error> {
        if let Ok(i) = n.parse::<i64>() {
            return Ok(serde_json::Value::from(i));
        }
        n.parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map(serde_json::Value::Number)
            .ok_or_else(|| Error::Decoding(format!("`{}` holds an invalid number: {}", self.name, n)))
    }

    fn non_empty<'v>(&self, items: &'v [Value]) -> Result<&'v [Value], Error> {
        if items.is_empty() {
            return Err(Error::Encoding(format!("`{}` cannot store an empty set", self.name)));
        }
        Ok(items)
    }

    fn mismatch(&self, value: &Value) -> Error {
        Error::Encoding(format!(
            "`{}` is {:?} and cannot encode a {} value",
            self.name,
            self.kind,
            value.kind()
        ))
    }
}

/// Attribute definitions of one object type.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    attributes: BTreeMap<String, Attribute>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attribute(mut self, name: impl Into<String>, kind: AttributeType) -> Self {
        let attribute = Attribute::new(name, kind);
        self.attributes.insert(attribute.name.clone(), attribute);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Attribute> {
        self.attributes.get(name)
    }

    /// Encode `value` for the named attribute.
    pub fn to_wire(&self, name: &str, value: &Value, filter: bool) -> Result<AttributeValue, Error> {
        self.get(name)
            .ok_or_else(|| Error::Encoding(format!("`{}` is not a schema attribute", name)))?
            .to_wire(value, filter)
    }

    /// Populate `obj` from a stored row.
    ///
    /// Attributes missing from the schema are skipped, as are stored `NULL`s,
    /// which leaves the field at its default. The object's `Meta` is kept as
    /// it was before decoding.
    pub fn parse_row<T: Object>(&self, obj: &mut T, row: &Item) -> Result<(), Error> {
        let mut data = serde_json::Map::with_capacity(row.len());
        for (name, wire) in row {
            if wire.is_null() {
                continue;
            }
            match self.get(name) {
                Some(attribute) => {
                    data.insert(name.clone(), attribute.from_wire(wire)?);
                }
                None => trace!(attribute = %name, table = T::TABLE, "skipping unknown attribute"),
            }
        }

        let mut decoded = serde_json::from_value::<T>(serde_json::Value::Object(data))
            .map_err(|e| Error::Decoding(e.to_string()))?;
        *decoded.meta_mut() = obj.meta().clone();
        *obj = decoded;
        Ok(())
    }
}
