//! The data-event stream: the receiver trait a decoder drives, and an owned event form for
//! recording and replaying streams.

use bigdecimal::BigDecimal;
use num_bigint::BigInt;
use uuid::Uuid;

use crate::big_float::BigFloat;
use crate::decimal_float::DecimalFloat;
use crate::error::Result;
use crate::value::Time;

/// Element type of an array event.
///
/// String-like kinds carry UTF-8 text. The others carry little-endian elements; bit arrays
/// are packed least significant bit first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ArrayKind {
    String,
    ResourceId,
    RemoteReference,
    CustomText,
    CustomBinary,
    Bit,
    Uint8,
    Uint16,
    Uint32,
    Uint64,
    Int8,
    Int16,
    Int32,
    Int64,
    /// bfloat16: the upper half of an `f32`.
    Float16,
    Float32,
    Float64,
    Uid,
}

impl ArrayKind {
    /// Text payload (validated as UTF-8 before it reaches a builder).
    pub fn is_stringlike(self) -> bool {
        matches!(
            self,
            ArrayKind::String | ArrayKind::ResourceId | ArrayKind::RemoteReference | ArrayKind::CustomText
        )
    }

    /// Width of one element in bytes; `None` for bit arrays.
    pub fn element_size(self) -> Option<u64> {
        Some(match self {
            ArrayKind::Bit => return None,
            ArrayKind::String
            | ArrayKind::ResourceId
            | ArrayKind::RemoteReference
            | ArrayKind::CustomText
            | ArrayKind::CustomBinary
            | ArrayKind::Uint8
            | ArrayKind::Int8 => 1,
            ArrayKind::Uint16 | ArrayKind::Int16 | ArrayKind::Float16 => 2,
            ArrayKind::Uint32 | ArrayKind::Int32 | ArrayKind::Float32 => 4,
            ArrayKind::Uint64 | ArrayKind::Int64 | ArrayKind::Float64 => 8,
            ArrayKind::Uid => 16,
        })
    }

    /// Payload size of `element_count` elements.
    pub fn byte_length(self, element_count: u64) -> Option<u64> {
        match self.element_size() {
            Some(size) => element_count.checked_mul(size),
            None => Some(element_count.div_ceil(8)),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ArrayKind::String => "string",
            ArrayKind::ResourceId => "resource id",
            ArrayKind::RemoteReference => "remote reference",
            ArrayKind::CustomText => "custom text",
            ArrayKind::CustomBinary => "custom binary",
            ArrayKind::Bit => "bit array",
            ArrayKind::Uint8 => "u8 array",
            ArrayKind::Uint16 => "u16 array",
            ArrayKind::Uint32 => "u32 array",
            ArrayKind::Uint64 => "u64 array",
            ArrayKind::Int8 => "i8 array",
            ArrayKind::Int16 => "i16 array",
            ArrayKind::Int32 => "i32 array",
            ArrayKind::Int64 => "i64 array",
            ArrayKind::Float16 => "f16 array",
            ArrayKind::Float32 => "f32 array",
            ArrayKind::Float64 => "f64 array",
            ArrayKind::Uid => "uid array",
        }
    }
}

/// Receiver of a data-event stream.
///
/// A decoder calls these in document order. Containers open with `on_list`, `on_map`,
/// `on_markup`, `on_edge` or `on_node` and close with `on_end` (markup closes twice: once
/// after its attributes, once after its contents). `on_marker` applies to the value that
/// follows it; `on_reference` stands in for a value.
///
/// Arrays arrive either whole (`on_array`) or chunked: `on_array_begin`, then one or more
/// `on_array_chunk` headers each followed by `on_array_data` calls supplying exactly that
/// chunk's bytes. The array completes after the data of a chunk whose header said no more
/// chunks follow.
pub trait DataEventReceiver {
    fn on_begin_document(&mut self) -> Result<()>;
    fn on_end_document(&mut self) -> Result<()>;
    fn on_null(&mut self) -> Result<()>;
    fn on_bool(&mut self, value: bool) -> Result<()>;
    fn on_positive_int(&mut self, value: u64) -> Result<()>;
    /// Negative integer given by its magnitude: `on_negative_int(5)` means -5.
    fn on_negative_int(&mut self, magnitude: u64) -> Result<()>;
    fn on_int(&mut self, value: i64) -> Result<()>;
    fn on_big_int(&mut self, value: BigInt) -> Result<()>;
    fn on_float(&mut self, value: f64) -> Result<()>;
    fn on_big_float(&mut self, value: BigFloat) -> Result<()>;
    fn on_decimal_float(&mut self, value: DecimalFloat) -> Result<()>;
    fn on_big_decimal_float(&mut self, value: BigDecimal) -> Result<()>;
    fn on_nan(&mut self, signaling: bool) -> Result<()>;
    fn on_uid(&mut self, value: Uuid) -> Result<()>;
    fn on_time(&mut self, value: Time) -> Result<()>;
    fn on_array(&mut self, kind: ArrayKind, element_count: u64, data: &[u8]) -> Result<()>;
    fn on_array_begin(&mut self, kind: ArrayKind) -> Result<()>;
    fn on_array_chunk(&mut self, element_count: u64, more_chunks_follow: bool) -> Result<()>;
    fn on_array_data(&mut self, data: &[u8]) -> Result<()>;
    fn on_list(&mut self) -> Result<()>;
    fn on_map(&mut self) -> Result<()>;
    fn on_markup(&mut self, name: &str) -> Result<()>;
    fn on_edge(&mut self) -> Result<()>;
    fn on_node(&mut self) -> Result<()>;
    fn on_end(&mut self) -> Result<()>;
    fn on_marker(&mut self, id: &str) -> Result<()>;
    fn on_reference(&mut self, id: &str) -> Result<()>;
}

/// An owned data event.
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    BeginDocument,
    EndDocument,
    Null,
    Bool(bool),
    PositiveInt(u64),
    NegativeInt(u64),
    Int(i64),
    BigInt(BigInt),
    Float(f64),
    BigFloat(BigFloat),
    DecimalFloat(DecimalFloat),
    BigDecimalFloat(BigDecimal),
    NaN { signaling: bool },
    Uid(Uuid),
    Time(Time),
    Array {
        kind: ArrayKind,
        element_count: u64,
        data: Vec<u8>,
    },
    ArrayBegin(ArrayKind),
    ArrayChunk {
        element_count: u64,
        more_chunks_follow: bool,
    },
    ArrayData(Vec<u8>),
    List,
    Map,
    Markup(String),
    Edge,
    Node,
    End,
    Marker(String),
    Reference(String),
}

impl Event {
    /// A whole UTF-8 string array.
    pub fn string(s: &str) -> Event {
        Event::Array {
            kind: ArrayKind::String,
            element_count: s.len() as u64,
            data: s.as_bytes().to_vec(),
        }
    }

    /// A whole byte array.
    pub fn bytes(b: &[u8]) -> Event {
        Event::Array {
            kind: ArrayKind::Uint8,
            element_count: b.len() as u64,
            data: b.to_vec(),
        }
    }

    /// An integer, as a decoder would report it (sign and magnitude).
    pub fn int(v: i64) -> Event {
        if v >= 0 {
            Event::PositiveInt(v.unsigned_abs())
        } else {
            Event::NegativeInt(v.unsigned_abs())
        }
    }

    pub fn marker(id: &str) -> Event {
        Event::Marker(id.to_owned())
    }

    pub fn reference(id: &str) -> Event {
        Event::Reference(id.to_owned())
    }

    /// Deliver this event to `receiver`.
    pub fn apply<R: DataEventReceiver + ?Sized>(&self, receiver: &mut R) -> Result<()> {
        match self {
            Event::BeginDocument => receiver.on_begin_document(),
            Event::EndDocument => receiver.on_end_document(),
            Event::Null => receiver.on_null(),
            Event::Bool(v) => receiver.on_bool(*v),
            Event::PositiveInt(v) => receiver.on_positive_int(*v),
            Event::NegativeInt(v) => receiver.on_negative_int(*v),
            Event::Int(v) => receiver.on_int(*v),
            Event::BigInt(v) => receiver.on_big_int(v.clone()),
            Event::Float(v) => receiver.on_float(*v),
            Event::BigFloat(v) => receiver.on_big_float(v.clone()),
            Event::DecimalFloat(v) => receiver.on_decimal_float(*v),
            Event::BigDecimalFloat(v) => receiver.on_big_decimal_float(v.clone()),
            Event::NaN { signaling } => receiver.on_nan(*signaling),
            Event::Uid(v) => receiver.on_uid(*v),
            Event::Time(v) => receiver.on_time(*v),
            Event::Array {
                kind,
                element_count,
                data,
            } => receiver.on_array(*kind, *element_count, data),
            Event::ArrayBegin(kind) => receiver.on_array_begin(*kind),
            Event::ArrayChunk {
                element_count,
                more_chunks_follow,
            } => receiver.on_array_chunk(*element_count, *more_chunks_follow),
            Event::ArrayData(data) => receiver.on_array_data(data),
            Event::List => receiver.on_list(),
            Event::Map => receiver.on_map(),
            Event::Markup(name) => receiver.on_markup(name),
            Event::Edge => receiver.on_edge(),
            Event::Node => receiver.on_node(),
            Event::End => receiver.on_end(),
            Event::Marker(id) => receiver.on_marker(id),
            Event::Reference(id) => receiver.on_reference(id),
        }
    }
}

/// Deliver `events` in order, stopping at the first error.
pub fn replay<R: DataEventReceiver + ?Sized>(events: &[Event], receiver: &mut R) -> Result<()> {
    events.iter().try_for_each(|event| event.apply(receiver))
}

/// A receiver that stores every event it is given.
#[derive(Clone, Debug, Default)]
pub struct EventRecorder {
    events: Vec<Event>,
}

impl EventRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn into_events(self) -> Vec<Event> {
        self.events
    }

    fn push(&mut self, event: Event) -> Result<()> {
        self.events.push(event);
        Ok(())
    }
}

impl DataEventReceiver for EventRecorder {
    fn on_begin_document(&mut self) -> Result<()> {
        self.push(Event::BeginDocument)
    }
    fn on_end_document(&mut self) -> Result<()> {
        self.push(Event::EndDocument)
    }
    fn on_null(&mut self) -> Result<()> {
        self.push(Event::Null)
    }
    fn on_bool(&mut self, value: bool) -> Result<()> {
        self.push(Event::Bool(value))
    }
    fn on_positive_int(&mut self, value: u64) -> Result<()> {
        self.push(Event::PositiveInt(value))
    }
    fn on_negative_int(&mut self, magnitude: u64) -> Result<()> {
        self.push(Event::NegativeInt(magnitude))
    }
    fn on_int(&mut self, value: i64) -> Result<()> {
        self.push(Event::Int(value))
    }
    fn on_big_int(&mut self, value: BigInt) -> Result<()> {
        self.push(Event::BigInt(value))
    }
    fn on_float(&mut self, value: f64) -> Result<()> {
        self.push(Event::Float(value))
    }
    fn on_big_float(&mut self, value: BigFloat) -> Result<()> {
        self.push(Event::BigFloat(value))
    }
    fn on_decimal_float(&mut self, value: DecimalFloat) -> Result<()> {
        self.push(Event::DecimalFloat(value))
    }
    fn on_big_decimal_float(&mut self, value: BigDecimal) -> Result<()> {
        self.push(Event::BigDecimalFloat(value))
    }
    fn on_nan(&mut self, signaling: bool) -> Result<()> {
        self.push(Event::NaN { signaling })
    }
    fn on_uid(&mut self, value: Uuid) -> Result<()> {
        self.push(Event::Uid(value))
    }
    fn on_time(&mut self, value: Time) -> Result<()> {
        self.push(Event::Time(value))
    }
    fn on_array(&mut self, kind: ArrayKind, element_count: u64, data: &[u8]) -> Result<()> {
        self.push(Event::Array {
            kind,
            element_count,
            data: data.to_vec(),
        })
    }
    fn on_array_begin(&mut self, kind: ArrayKind) -> Result<()> {
        self.push(Event::ArrayBegin(kind))
    }
    fn on_array_chunk(&mut self, element_count: u64, more_chunks_follow: bool) -> Result<()> {
        self.push(Event::ArrayChunk {
            element_count,
            more_chunks_follow,
        })
    }
    fn on_array_data(&mut self, data: &[u8]) -> Result<()> {
        self.push(Event::ArrayData(data.to_vec()))
    }
    fn on_list(&mut self) -> Result<()> {
        self.push(Event::List)
    }
    fn on_map(&mut self) -> Result<()> {
        self.push(Event::Map)
    }
    fn on_markup(&mut self, name: &str) -> Result<()> {
        self.push(Event::Markup(name.to_owned()))
    }
    fn on_edge(&mut self) -> Result<()> {
        self.push(Event::Edge)
    }
    fn on_node(&mut self) -> Result<()> {
        self.push(Event::Node)
    }
    fn on_end(&mut self) -> Result<()> {
        self.push(Event::End)
    }
    fn on_marker(&mut self, id: &str) -> Result<()> {
        self.push(Event::Marker(id.to_owned()))
    }
    fn on_reference(&mut self, id: &str) -> Result<()> {
        self.push(Event::Reference(id.to_owned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn byte_lengths() {
        assert_eq!(ArrayKind::Bit.byte_length(9), Some(2));
        assert_eq!(ArrayKind::Bit.byte_length(8), Some(1));
        assert_eq!(ArrayKind::Uint32.byte_length(3), Some(12));
        assert_eq!(ArrayKind::Uid.byte_length(2), Some(32));
        assert_eq!(ArrayKind::Int64.byte_length(u64::MAX), None);
    }

    #[test]
    fn int_helper_splits_sign() {
        assert_eq!(Event::int(5), Event::PositiveInt(5));
        assert_eq!(Event::int(-5), Event::NegativeInt(5));
        assert_eq!(Event::int(i64::MIN), Event::NegativeInt(1u64 << 63));
    }

    #[test]
    fn recorder_replays_identically() {
        let events = vec![
            Event::BeginDocument,
            Event::Map,
            Event::string("k"),
            Event::Marker("m".into()),
            Event::List,
            Event::Bool(true),
            Event::End,
            Event::End,
            Event::EndDocument,
        ];
        let mut recorder = EventRecorder::new();
        replay(&events, &mut recorder).unwrap();
        assert_eq!(recorder.events(), events.as_slice());
    }
}
