use std::collections::HashMap;

use crdt_protocol::OpId;
use serde::Serialize;
use smol_str::SmolStr;

/// A leaf value as seen by the application: either a JSON-ish primitive or
/// one of the two CRDT-specific scalars (a millisecond timestamp or a
/// counter).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Primitive {
    Null,
    Boolean(bool),
    Int(i64),
    Uint(u64),
    F64(f64),
    Str(SmolStr),
    Counter(i64),
    Timestamp(i64),
}

impl Primitive {
    pub fn is_counter(&self) -> bool {
        matches!(self, Primitive::Counter(_))
    }
}

/// A composite value as seen by the application: the resolved view of a
/// map, list, text, or table object, or a leaf primitive.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Map(HashMap<SmolStr, Value>),
    List(Vec<Value>),
    Text(Vec<char>),
    Table(HashMap<SmolStr, Value>),
    Primitive(Primitive),
}

impl Value {
    pub fn is_map(&self) -> bool {
        matches!(self, Value::Map(_))
    }

    pub fn map(&self) -> Option<&HashMap<SmolStr, Value>> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn is_list(&self) -> bool {
        matches!(self, Value::List(_))
    }

    pub fn list(&self) -> Option<&[Value]> {
        match self {
            Value::List(l) => Some(l),
            _ => None,
        }
    }

    pub fn is_text(&self) -> bool {
        matches!(self, Value::Text(_))
    }

    pub fn text(&self) -> Option<&[char]> {
        match self {
            Value::Text(t) => Some(t),
            _ => None,
        }
    }

    pub fn is_table(&self) -> bool {
        matches!(self, Value::Table(_))
    }

    pub fn table(&self) -> Option<&HashMap<SmolStr, Value>> {
        match self {
            Value::Table(t) => Some(t),
            _ => None,
        }
    }

    pub fn primitive(&self) -> Option<&Primitive> {
        match self {
            Value::Primitive(p) => Some(p),
            _ => None,
        }
    }

    pub(crate) fn type_name(&self) -> &'static str {
        match self {
            Value::Map(_) => "map",
            Value::List(_) => "list",
            Value::Text(_) => "text",
            Value::Table(_) => "table",
            Value::Primitive(_) => "primitive",
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Map(m) | Value::Table(m) => serde_json::Value::Object(
                m.iter().map(|(k, v)| (k.to_string(), v.to_json())).collect(),
            ),
            Value::List(vs) => serde_json::Value::Array(vs.iter().map(Value::to_json).collect()),
            Value::Text(chars) => serde_json::Value::String(chars.iter().collect()),
            Value::Primitive(p) => match p {
                Primitive::Null => serde_json::Value::Null,
                Primitive::Boolean(b) => serde_json::Value::Bool(*b),
                Primitive::Int(i) => serde_json::Value::Number((*i).into()),
                Primitive::Uint(u) => serde_json::Value::Number((*u).into()),
                Primitive::F64(f) => serde_json::Number::from_f64(*f)
                    .map(serde_json::Value::Number)
                    .unwrap_or(serde_json::Value::Null),
                Primitive::Str(s) => serde_json::Value::String(s.to_string()),
                Primitive::Counter(c) => serde_json::Value::Number((*c).into()),
                Primitive::Timestamp(t) => serde_json::Value::Number((*t).into()),
            },
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Primitive(Primitive::Str(SmolStr::new(s)))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Primitive(Primitive::Str(SmolStr::new(s)))
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Primitive(Primitive::Int(i))
    }
}

impl From<u64> for Value {
    fn from(u: u64) -> Self {
        Value::Primitive(Primitive::Uint(u))
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Primitive(Primitive::F64(f))
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Primitive(Primitive::Boolean(b))
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::List(v.into_iter().map(Into::into).collect())
    }
}

/// The set of candidate values at a key/index that currently has more than
/// one writer racing for it, keyed by the `OpId` that wrote each
/// candidate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Conflicts(pub HashMap<OpId, Value>);
