//! Attribute value types and coercion

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;
use uuid::Uuid;

/// A polymorphic attribute value that can hold different types
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum FieldValue {
    String(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Uuid(Uuid),
    DateTime(DateTime<Utc>),
    Null,
}

impl FieldValue {
    /// Get the value as a string if possible
    pub fn as_string(&self) -> Option<&str> {
        match self {
            FieldValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Get the value as an integer if possible
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            FieldValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Get the value as a UUID if possible
    pub fn as_uuid(&self) -> Option<Uuid> {
        match self {
            FieldValue::Uuid(u) => Some(*u),
            _ => None,
        }
    }

    /// Check if the value is null
    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    /// Wire representation inside a resource object's `attributes`
    pub fn to_json(&self) -> Value {
        match self {
            FieldValue::String(s) => Value::String(s.clone()),
            FieldValue::Integer(i) => Value::from(*i),
            FieldValue::Float(f) => serde_json::Number::from_f64(*f)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            FieldValue::Boolean(b) => Value::Bool(*b),
            FieldValue::Uuid(u) => Value::String(u.to_string()),
            FieldValue::DateTime(d) => Value::String(d.to_rfc3339()),
            FieldValue::Null => Value::Null,
        }
    }

    /// Text used when the value is written back as a query string literal
    pub fn to_literal_text(&self) -> String {
        match self {
            FieldValue::String(s) => s.clone(),
            FieldValue::Integer(i) => i.to_string(),
            FieldValue::Float(f) => f.to_string(),
            FieldValue::Boolean(b) => b.to_string(),
            FieldValue::Uuid(u) => u.to_string(),
            FieldValue::DateTime(d) => d.to_rfc3339(),
            FieldValue::Null => "null".to_string(),
        }
    }

    /// Total order used when sorting rows: null first, then by value
    ///
    /// Values of unrelated types compare equal so that sorting stays stable.
    pub fn sort_cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (FieldValue::Null, FieldValue::Null) => Ordering::Equal,
            (FieldValue::Null, _) => Ordering::Less,
            (_, FieldValue::Null) => Ordering::Greater,
            _ => self.partial_cmp(other).unwrap_or(Ordering::Equal),
        }
    }
}

impl PartialOrd for FieldValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (FieldValue::String(a), FieldValue::String(b)) => a.partial_cmp(b),
            (FieldValue::Integer(a), FieldValue::Integer(b)) => a.partial_cmp(b),
            (FieldValue::Float(a), FieldValue::Float(b)) => a.partial_cmp(b),
            (FieldValue::Integer(a), FieldValue::Float(b)) => (*a as f64).partial_cmp(b),
            (FieldValue::Float(a), FieldValue::Integer(b)) => a.partial_cmp(&(*b as f64)),
            (FieldValue::Boolean(a), FieldValue::Boolean(b)) => a.partial_cmp(b),
            (FieldValue::Uuid(a), FieldValue::Uuid(b)) => a.partial_cmp(b),
            (FieldValue::DateTime(a), FieldValue::DateTime(b)) => a.partial_cmp(b),
            (FieldValue::Null, FieldValue::Null) => Some(Ordering::Equal),
            _ => None,
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::String(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::String(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Integer(value)
    }
}

impl From<i32> for FieldValue {
    fn from(value: i32) -> Self {
        FieldValue::Integer(value.into())
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Float(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Boolean(value)
    }
}

impl From<Uuid> for FieldValue {
    fn from(value: Uuid) -> Self {
        FieldValue::Uuid(value)
    }
}

impl From<DateTime<Utc>> for FieldValue {
    fn from(value: DateTime<Utc>) -> Self {
        FieldValue::DateTime(value)
    }
}

/// Declared type of an attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttrType {
    String,
    Integer,
    Float,
    Boolean,
    Uuid,
    DateTime,
}

impl AttrType {
    pub fn name(&self) -> &'static str {
        match self {
            AttrType::String => "String",
            AttrType::Integer => "Integer",
            AttrType::Float => "Float",
            AttrType::Boolean => "Boolean",
            AttrType::Uuid => "Uuid",
            AttrType::DateTime => "DateTime",
        }
    }

    /// Coerce a query string literal to this type
    pub fn parse_literal(&self, text: &str) -> Option<FieldValue> {
        match self {
            AttrType::String => Some(FieldValue::String(text.to_string())),
            AttrType::Integer => text.parse().ok().map(FieldValue::Integer),
            AttrType::Float => text
                .parse::<f64>()
                .ok()
                .filter(|f| f.is_finite())
                .map(FieldValue::Float),
            AttrType::Boolean => match text {
                "true" => Some(FieldValue::Boolean(true)),
                "false" => Some(FieldValue::Boolean(false)),
                _ => None,
            },
            AttrType::Uuid => Uuid::parse_str(text).ok().map(FieldValue::Uuid),
            AttrType::DateTime => parse_datetime(text).map(FieldValue::DateTime),
        }
    }

    /// Coerce a request body value to this type
    ///
    /// JSON `null` maps to [`FieldValue::Null`]; nullability is checked by the caller.
    pub fn from_json(&self, value: &Value) -> Option<FieldValue> {
        if value.is_null() {
            return Some(FieldValue::Null);
        }

        match (self, value) {
            (AttrType::String, Value::String(s)) => Some(FieldValue::String(s.clone())),
            (AttrType::Integer, Value::Number(n)) => n.as_i64().map(FieldValue::Integer),
            (AttrType::Float, Value::Number(n)) => n.as_f64().map(FieldValue::Float),
            (AttrType::Boolean, Value::Bool(b)) => Some(FieldValue::Boolean(*b)),
            (AttrType::Uuid, Value::String(s)) => Uuid::parse_str(s).ok().map(FieldValue::Uuid),
            (AttrType::DateTime, Value::String(s)) => parse_datetime(s).map(FieldValue::DateTime),
            _ => None,
        }
    }
}

fn parse_datetime(text: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text)
        .ok()
        .map(|d| d.with_timezone(&Utc))
        .or_else(|| {
            chrono::NaiveDate::parse_from_str(text, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .map(|d| d.and_utc())
        })
}
