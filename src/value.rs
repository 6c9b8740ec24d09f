//! The built value model.

use std::fmt;

use bigdecimal::BigDecimal;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime};
use num_bigint::BigInt;
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use uuid::Uuid;

use crate::big_float::BigFloat;
use crate::conversion::Number;
use crate::decimal_float::DecimalFloat;
use crate::path::Slot;

/// A value produced by a build.
///
/// Typed targets produce the variant matching their type (an `i16` target produces
/// [`Value::Int`], a record target produces [`Value::Record`], ...). Dynamic targets produce
/// whatever the stream described, in its natural representation.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Uint(u64),
    Float(f64),
    BigInt(BigInt),
    BigFloat(BigFloat),
    DecimalFloat(DecimalFloat),
    BigDecimalFloat(BigDecimal),
    String(String),
    ResourceId(String),
    RemoteReference(String),
    Bytes(Vec<u8>),
    CustomBinary(Vec<u8>),
    CustomText(String),
    Uid(Uuid),
    Time(Time),
    List(Vec<Value>),
    Map(Map),
    Record(Record),
    Optional(Option<Box<Value>>),
    Markup(Markup),
    Edge(Box<Edge>),
    Node(Node),
    /// Back-reference to a marked container that encloses this position (a cycle).
    ///
    /// The value tree stays finite; the marker id names the container being referred to.
    Recursive(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Time {
    Date(NaiveDate),
    Time(NaiveTime),
    Timestamp(DateTime<FixedOffset>),
}

impl fmt::Display for Time {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Time::Date(d) => write!(f, "{d}"),
            Time::Time(t) => write!(f, "{t}"),
            Time::Timestamp(ts) => write!(f, "{}", ts.to_rfc3339()),
        }
    }
}

/// Insertion-ordered map. Keys are unique; re-inserting a key replaces its value in place.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Map {
    entries: Vec<(Value, Value)>,
}

impl Map {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &Value) -> Option<&Value> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Look up a string key.
    pub fn get_str(&self, key: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(k, _)| matches!(k, Value::String(s) if s == key))
            .map(|(_, v)| v)
    }

    /// Insert or replace. Returns the previous value for the key.
    pub fn insert(&mut self, key: Value, value: Value) -> Option<Value> {
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, slot)) => Some(std::mem::replace(slot, value)),
            None => {
                self.entries.push((key, value));
                None
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Value, &Value)> {
        self.entries.iter().map(|(k, v)| (k, v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &Value> {
        self.entries.iter().map(|(k, _)| k)
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.entries.iter().map(|(_, v)| v)
    }

    pub(crate) fn entries(&self) -> &[(Value, Value)] {
        &self.entries
    }

    pub(crate) fn entries_mut(&mut self) -> &mut Vec<(Value, Value)> {
        &mut self.entries
    }
}

impl FromIterator<(Value, Value)> for Map {
    fn from_iter<I: IntoIterator<Item = (Value, Value)>>(iter: I) -> Self {
        let mut map = Map::new();
        for (k, v) in iter {
            map.insert(k, v);
        }
        map
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Record {
    pub type_name: String,
    pub fields: Vec<RecordField>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct RecordField {
    pub name: String,
    pub value: Value,
    pub embedded: bool,
}

impl Record {
    /// Field by name. Fields of embedded records are found by their own names.
    pub fn get(&self, name: &str) -> Option<&Value> {
        if let Some(field) = self.fields.iter().find(|f| f.name == name) {
            return Some(&field.value);
        }
        self.fields
            .iter()
            .filter(|f| f.embedded)
            .find_map(|f| match &f.value {
                Value::Record(inner) => inner.get(name),
                _ => None,
            })
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Markup {
    pub name: String,
    pub attributes: Map,
    pub contents: Vec<Value>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Edge {
    pub source: Value,
    pub description: Value,
    pub destination: Value,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Node {
    pub value: Box<Value>,
    pub children: Vec<Value>,
}

impl Value {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Uint(_) => "uint",
            Value::Float(_) => "float",
            Value::BigInt(_) => "big int",
            Value::BigFloat(_) => "big float",
            Value::DecimalFloat(_) => "decimal float",
            Value::BigDecimalFloat(_) => "big decimal float",
            Value::String(_) => "string",
            Value::ResourceId(_) => "resource id",
            Value::RemoteReference(_) => "remote reference",
            Value::Bytes(_) => "bytes",
            Value::CustomBinary(_) => "custom binary",
            Value::CustomText(_) => "custom text",
            Value::Uid(_) => "uid",
            Value::Time(_) => "time",
            Value::List(_) => "list",
            Value::Map(_) => "map",
            Value::Record(_) => "record",
            Value::Optional(_) => "optional",
            Value::Markup(_) => "markup",
            Value::Edge(_) => "edge",
            Value::Node(_) => "node",
            Value::Recursive(_) => "recursive reference",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            Value::Uint(v) => i64::try_from(*v).ok(),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Value::Uint(v) => Some(*v),
            Value::Int(v) => u64::try_from(*v).ok(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) | Value::ResourceId(s) | Value::RemoteReference(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&Map> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Value::Record(r) => Some(r),
            _ => None,
        }
    }

    /// Payload of a present optional, `None` for an absent one, `self` for anything else.
    pub fn unwrap_optional(&self) -> Option<&Value> {
        match self {
            Value::Optional(inner) => inner.as_deref(),
            other => Some(other),
        }
    }

    /// The value as a [`Number`], if it is numeric.
    pub fn as_number(&self) -> Option<Number> {
        Some(match self {
            Value::Int(v) => Number::Int(*v),
            Value::Uint(v) => Number::Uint(*v),
            Value::Float(v) => Number::Float(*v),
            Value::BigInt(v) => Number::BigInt(v.clone()),
            Value::BigFloat(v) => Number::BigFloat(v.clone()),
            Value::DecimalFloat(v) => Number::DecimalFloat(*v),
            Value::BigDecimalFloat(v) => Number::BigDecimalFloat(v.clone()),
            _ => return None,
        })
    }

    pub(crate) fn slot(&self, slot: Slot) -> Option<&Value> {
        match (self, slot) {
            (Value::List(items), Slot::Index(i)) => items.get(i),
            (Value::Map(m), Slot::EntryKey(i)) => m.entries.get(i).map(|(k, _)| k),
            (Value::Map(m), Slot::EntryValue(i)) => m.entries.get(i).map(|(_, v)| v),
            (Value::Record(r), Slot::Field(i)) => r.fields.get(i).map(|f| &f.value),
            (Value::Optional(Some(inner)), Slot::Inner) => Some(&**inner),
            (Value::Markup(m), Slot::EntryKey(i)) => m.attributes.entries.get(i).map(|(k, _)| k),
            (Value::Markup(m), Slot::EntryValue(i)) => m.attributes.entries.get(i).map(|(_, v)| v),
            (Value::Markup(m), Slot::Index(i)) => m.contents.get(i),
            (Value::Edge(e), Slot::Field(0)) => Some(&e.source),
            (Value::Edge(e), Slot::Field(1)) => Some(&e.description),
            (Value::Edge(e), Slot::Field(2)) => Some(&e.destination),
            (Value::Node(n), Slot::Field(0)) => Some(&*n.value),
            (Value::Node(n), Slot::Index(i)) => n.children.get(i),
            _ => None,
        }
    }

    pub(crate) fn slot_mut(&mut self, slot: Slot) -> Option<&mut Value> {
        match (self, slot) {
            (Value::List(items), Slot::Index(i)) => items.get_mut(i),
            (Value::Map(m), Slot::EntryKey(i)) => m.entries.get_mut(i).map(|(k, _)| k),
            (Value::Map(m), Slot::EntryValue(i)) => m.entries.get_mut(i).map(|(_, v)| v),
            (Value::Record(r), Slot::Field(i)) => r.fields.get_mut(i).map(|f| &mut f.value),
            (Value::Optional(Some(inner)), Slot::Inner) => Some(&mut **inner),
            (Value::Markup(m), Slot::EntryKey(i)) => {
                m.attributes.entries.get_mut(i).map(|(k, _)| k)
            }
            (Value::Markup(m), Slot::EntryValue(i)) => {
                m.attributes.entries.get_mut(i).map(|(_, v)| v)
            }
            (Value::Markup(m), Slot::Index(i)) => m.contents.get_mut(i),
            (Value::Edge(e), Slot::Field(0)) => Some(&mut e.source),
            (Value::Edge(e), Slot::Field(1)) => Some(&mut e.description),
            (Value::Edge(e), Slot::Field(2)) => Some(&mut e.destination),
            (Value::Node(n), Slot::Field(0)) => Some(&mut *n.value),
            (Value::Node(n), Slot::Index(i)) => n.children.get_mut(i),
            _ => None,
        }
    }

    pub(crate) fn at_path(&self, path: &[Slot]) -> Option<&Value> {
        path.iter().try_fold(self, |v, s| v.slot(*s))
    }

    pub(crate) fn at_path_mut(&mut self, path: &[Slot]) -> Option<&mut Value> {
        path.iter().try_fold(self, |v, s| v.slot_mut(*s))
    }
}

fn serialize_record_fields<M: SerializeMap>(record: &Record, map: &mut M) -> Result<(), M::Error> {
    for field in &record.fields {
        if field.embedded {
            if let Value::Record(inner) = &field.value {
                serialize_record_fields(inner, map)?;
                continue;
            }
        }
        map.serialize_entry(&field.name, &field.value)?;
    }
    Ok(())
}

/// Big numbers, uids and times serialize as strings; records flatten embedded fields.
impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Int(v) => serializer.serialize_i64(*v),
            Value::Uint(v) => serializer.serialize_u64(*v),
            Value::Float(v) => serializer.serialize_f64(*v),
            Value::BigInt(v) => serializer.collect_str(v),
            Value::BigFloat(v) => serializer.collect_str(v),
            Value::DecimalFloat(v) => serializer.collect_str(v),
            Value::BigDecimalFloat(v) => serializer.collect_str(v),
            Value::String(s)
            | Value::ResourceId(s)
            | Value::RemoteReference(s)
            | Value::CustomText(s) => serializer.serialize_str(s),
            Value::Bytes(b) | Value::CustomBinary(b) => serializer.serialize_bytes(b),
            Value::Uid(u) => serializer.collect_str(u),
            Value::Time(t) => serializer.collect_str(t),
            Value::List(items) => serializer.collect_seq(items),
            Value::Map(m) => serializer.collect_map(m.iter()),
            Value::Record(r) => {
                let mut map = serializer.serialize_map(None)?;
                serialize_record_fields(r, &mut map)?;
                map.end()
            }
            Value::Optional(None) => serializer.serialize_none(),
            Value::Optional(Some(inner)) => serializer.serialize_some(&**inner),
            Value::Markup(m) => {
                let mut map = serializer.serialize_map(Some(3))?;
                map.serialize_entry("name", &m.name)?;
                map.serialize_entry("attributes", &m.attributes)?;
                map.serialize_entry("contents", &m.contents)?;
                map.end()
            }
            Value::Edge(e) => {
                let mut map = serializer.serialize_map(Some(3))?;
                map.serialize_entry("source", &e.source)?;
                map.serialize_entry("description", &e.description)?;
                map.serialize_entry("destination", &e.destination)?;
                map.end()
            }
            Value::Node(n) => {
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry("value", &*n.value)?;
                map.serialize_entry("children", &n.children)?;
                map.end()
            }
            Value::Recursive(id) => serializer.collect_str(&format_args!("*{id}")),
        }
    }
}

impl Serialize for Map {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.iter())
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Value::Uint(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_owned())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<Number> for Value {
    fn from(n: Number) -> Self {
        match n {
            Number::Int(v) => Value::Int(v),
            Number::Uint(v) => Value::Uint(v),
            Number::Float(v) => Value::Float(v),
            Number::BigInt(v) => Value::BigInt(v),
            Number::BigFloat(v) => Value::BigFloat(v),
            Number::DecimalFloat(v) => Value::DecimalFloat(v),
            Number::BigDecimalFloat(v) => Value::BigDecimalFloat(v),
        }
    }
}
