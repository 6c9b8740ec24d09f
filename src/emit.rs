//! Re-emitting built values as data events.
//!
//! Emitting a value and building the events back against the same type gives an equal value.
//! Records are emitted as maps keyed by field name (embedded records flattened), an absent
//! optional as null, and a [`Value::Recursive`] back-edge as a reference to its marker id.

use crate::error::Result;
use crate::events::{ArrayKind, DataEventReceiver};
use crate::float_format::is_signaling_nan;
use crate::value::{Record, Value};

fn emit_text<R: DataEventReceiver + ?Sized>(kind: ArrayKind, text: &str, receiver: &mut R) -> Result<()> {
    receiver.on_array(kind, text.len() as u64, text.as_bytes())
}

fn emit_fields<R: DataEventReceiver + ?Sized>(record: &Record, receiver: &mut R) -> Result<()> {
    for field in &record.fields {
        if field.embedded {
            // An embedded record without a value (cut off by a type cycle) has no fields.
            if let Value::Record(inner) = &field.value {
                emit_fields(inner, receiver)?;
            }
            continue;
        }
        emit_text(ArrayKind::String, &field.name, receiver)?;
        emit_value(&field.value, receiver)?;
    }
    Ok(())
}

/// Emit the events that build `value`.
///
/// ```rust
/// use concise_builder::{emit_value, EventRecorder, Event, Value};
///
/// let mut recorder = EventRecorder::new();
/// emit_value(&Value::List(vec![Value::Int(-2)]), &mut recorder).unwrap();
/// assert_eq!(recorder.events(), &[Event::List, Event::NegativeInt(2), Event::End]);
/// ```
pub fn emit_value<R: DataEventReceiver + ?Sized>(value: &Value, receiver: &mut R) -> Result<()> {
    match value {
        Value::Null | Value::Optional(None) => receiver.on_null(),
        Value::Bool(v) => receiver.on_bool(*v),
        Value::Int(v) if *v >= 0 => receiver.on_positive_int(v.unsigned_abs()),
        Value::Int(v) => receiver.on_negative_int(v.unsigned_abs()),
        Value::Uint(v) => receiver.on_positive_int(*v),
        Value::Float(v) if v.is_nan() => receiver.on_nan(is_signaling_nan(*v)),
        Value::Float(v) => receiver.on_float(*v),
        Value::BigInt(v) => receiver.on_big_int(v.clone()),
        Value::BigFloat(v) => receiver.on_big_float(v.clone()),
        Value::DecimalFloat(v) => receiver.on_decimal_float(*v),
        Value::BigDecimalFloat(v) => receiver.on_big_decimal_float(v.clone()),
        Value::String(s) => emit_text(ArrayKind::String, s, receiver),
        Value::ResourceId(s) => emit_text(ArrayKind::ResourceId, s, receiver),
        Value::RemoteReference(s) => emit_text(ArrayKind::RemoteReference, s, receiver),
        Value::CustomText(s) => emit_text(ArrayKind::CustomText, s, receiver),
        Value::Bytes(b) => receiver.on_array(ArrayKind::Uint8, b.len() as u64, b),
        Value::CustomBinary(b) => receiver.on_array(ArrayKind::CustomBinary, b.len() as u64, b),
        Value::Uid(v) => receiver.on_uid(*v),
        Value::Time(v) => receiver.on_time(*v),
        Value::List(items) => {
            receiver.on_list()?;
            for item in items {
                emit_value(item, receiver)?;
            }
            receiver.on_end()
        }
        Value::Map(map) => {
            receiver.on_map()?;
            for (k, v) in map.iter() {
                emit_value(k, receiver)?;
                emit_value(v, receiver)?;
            }
            receiver.on_end()
        }
        Value::Record(record) => {
            receiver.on_map()?;
            emit_fields(record, receiver)?;
            receiver.on_end()
        }
        Value::Optional(Some(inner)) => emit_value(inner, receiver),
        Value::Markup(markup) => {
            receiver.on_markup(&markup.name)?;
            for (k, v) in markup.attributes.iter() {
                emit_value(k, receiver)?;
                emit_value(v, receiver)?;
            }
            receiver.on_end()?;
            for item in &markup.contents {
                emit_value(item, receiver)?;
            }
            receiver.on_end()
        }
        Value::Edge(edge) => {
            receiver.on_edge()?;
            emit_value(&edge.source, receiver)?;
            emit_value(&edge.description, receiver)?;
            emit_value(&edge.destination, receiver)?;
            receiver.on_end()
        }
        Value::Node(node) => {
            receiver.on_node()?;
            emit_value(&node.value, receiver)?;
            for child in &node.children {
                emit_value(child, receiver)?;
            }
            receiver.on_end()
        }
        Value::Recursive(id) => receiver.on_reference(id),
    }
}

/// Emit `value` as a complete document.
pub fn emit_document<R: DataEventReceiver + ?Sized>(value: &Value, receiver: &mut R) -> Result<()> {
    receiver.on_begin_document()?;
    emit_value(value, receiver)?;
    receiver.on_end_document()
}
