//! Runtime type descriptors: the "target type" a build is directed by.
//!
//! A [`TypeDescriptor`] is a cheap, clonable handle onto a [`Shape`]. Descriptors compare and
//! hash structurally, except records which have identity: two record descriptors are the same
//! type only if they are the same handle. This lets record types refer to themselves (directly
//! or through an optional/list) without making equality or hashing recurse forever.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, OnceLock};

use bigdecimal::BigDecimal;
use num_bigint::BigInt;
use num_traits::Zero;

use crate::big_float::BigFloat;
use crate::decimal_float::DecimalFloat;
use crate::error::{Error, Result};
use crate::value::{Map, Record, RecordField, Value};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum IntWidth {
    I8,
    I16,
    I32,
    I64,
}

impl IntWidth {
    pub fn min(self) -> i64 {
        match self {
            IntWidth::I8 => i64::from(i8::MIN),
            IntWidth::I16 => i64::from(i16::MIN),
            IntWidth::I32 => i64::from(i32::MIN),
            IntWidth::I64 => i64::MIN,
        }
    }

    pub fn max(self) -> i64 {
        match self {
            IntWidth::I8 => i64::from(i8::MAX),
            IntWidth::I16 => i64::from(i16::MAX),
            IntWidth::I32 => i64::from(i32::MAX),
            IntWidth::I64 => i64::MAX,
        }
    }

    pub fn contains(self, v: i64) -> bool {
        (self.min()..=self.max()).contains(&v)
    }

    pub fn name(self) -> &'static str {
        match self {
            IntWidth::I8 => "i8",
            IntWidth::I16 => "i16",
            IntWidth::I32 => "i32",
            IntWidth::I64 => "i64",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum UintWidth {
    U8,
    U16,
    U32,
    U64,
}

impl UintWidth {
    pub fn max(self) -> u64 {
        match self {
            UintWidth::U8 => u64::from(u8::MAX),
            UintWidth::U16 => u64::from(u16::MAX),
            UintWidth::U32 => u64::from(u32::MAX),
            UintWidth::U64 => u64::MAX,
        }
    }

    pub fn contains(self, v: u64) -> bool {
        v <= self.max()
    }

    pub fn name(self) -> &'static str {
        match self {
            UintWidth::U8 => "u8",
            UintWidth::U16 => "u16",
            UintWidth::U32 => "u32",
            UintWidth::U64 => "u64",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FloatWidth {
    F32,
    F64,
}

impl FloatWidth {
    pub fn name(self) -> &'static str {
        match self {
            FloatWidth::F32 => "f32",
            FloatWidth::F64 => "f64",
        }
    }
}

/// What a target type looks like.
#[derive(Debug, PartialEq, Eq, Hash)]
pub enum Shape {
    /// Dynamic target: whatever the stream says, in its natural representation.
    Any,
    Bool,
    Int(IntWidth),
    Uint(UintWidth),
    Float(FloatWidth),
    BigInt,
    BigFloat,
    DecimalFloat,
    BigDecimalFloat,
    String,
    Bytes,
    Uid,
    Time,
    /// Growable sequence.
    List(TypeDescriptor),
    /// Fixed-size sequence; unfilled trailing elements keep their zero value.
    Array(TypeDescriptor, usize),
    Map(TypeDescriptor, TypeDescriptor),
    Record(RecordShape),
    /// Nullable wrapper: null builds "absent", anything else builds the inner type.
    Optional(TypeDescriptor),
    /// Application-defined type filled from custom binary/text payloads.
    Custom(String),
    Markup,
    Edge,
    Node,
}

/// A named record type with an ordered field list.
///
/// The field list is set once, possibly after the descriptor has been created, so that
/// fields can refer back to the record itself.
pub struct RecordShape {
    name: String,
    fields: OnceLock<Vec<FieldDescriptor>>,
}

impl RecordShape {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fields(&self) -> &[FieldDescriptor] {
        self.fields.get().map(Vec::as_slice).unwrap_or(&[])
    }

    /// Whether the field list has been set.
    pub fn is_defined(&self) -> bool {
        self.fields.get().is_some()
    }
}

impl PartialEq for RecordShape {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self, other)
    }
}

impl Eq for RecordShape {}

impl Hash for RecordShape {
    fn hash<H: Hasher>(&self, state: &mut H) {
        (self as *const Self as usize).hash(state);
    }
}

impl fmt::Debug for RecordShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Field types may point back at this record; print names only.
        let names: Vec<&str> = self.fields().iter().map(|f| f.name.as_str()).collect();
        f.debug_struct("RecordShape")
            .field("name", &self.name)
            .field("fields", &names)
            .finish()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct FieldDescriptor {
    pub name: String,
    pub ty: TypeDescriptor,
    /// Embedded record: its fields are addressable by their own names on the outer record.
    pub embedded: bool,
}

impl FieldDescriptor {
    pub fn new(name: impl Into<String>, ty: TypeDescriptor) -> Self {
        Self {
            name: name.into(),
            ty,
            embedded: false,
        }
    }

    pub fn embedded(name: impl Into<String>, ty: TypeDescriptor) -> Self {
        Self {
            name: name.into(),
            ty,
            embedded: true,
        }
    }
}

#[derive(Clone, PartialEq, Eq, Hash)]
pub struct TypeDescriptor(Arc<Shape>);

impl TypeDescriptor {
    pub fn new(shape: Shape) -> Self {
        Self(Arc::new(shape))
    }

    pub fn any() -> Self {
        Self::new(Shape::Any)
    }

    pub fn bool() -> Self {
        Self::new(Shape::Bool)
    }

    pub fn int(width: IntWidth) -> Self {
        Self::new(Shape::Int(width))
    }

    pub fn uint(width: UintWidth) -> Self {
        Self::new(Shape::Uint(width))
    }

    pub fn float(width: FloatWidth) -> Self {
        Self::new(Shape::Float(width))
    }

    pub fn big_int() -> Self {
        Self::new(Shape::BigInt)
    }

    pub fn big_float() -> Self {
        Self::new(Shape::BigFloat)
    }

    pub fn decimal_float() -> Self {
        Self::new(Shape::DecimalFloat)
    }

    pub fn big_decimal_float() -> Self {
        Self::new(Shape::BigDecimalFloat)
    }

    pub fn string() -> Self {
        Self::new(Shape::String)
    }

    pub fn bytes() -> Self {
        Self::new(Shape::Bytes)
    }

    pub fn uid() -> Self {
        Self::new(Shape::Uid)
    }

    pub fn time() -> Self {
        Self::new(Shape::Time)
    }

    pub fn list(element: TypeDescriptor) -> Self {
        Self::new(Shape::List(element))
    }

    pub fn array(element: TypeDescriptor, len: usize) -> Self {
        Self::new(Shape::Array(element, len))
    }

    pub fn map(key: TypeDescriptor, value: TypeDescriptor) -> Self {
        Self::new(Shape::Map(key, value))
    }

    pub fn optional(inner: TypeDescriptor) -> Self {
        Self::new(Shape::Optional(inner))
    }

    pub fn custom(name: impl Into<String>) -> Self {
        Self::new(Shape::Custom(name.into()))
    }

    pub fn markup() -> Self {
        Self::new(Shape::Markup)
    }

    pub fn edge() -> Self {
        Self::new(Shape::Edge)
    }

    pub fn node() -> Self {
        Self::new(Shape::Node)
    }

    /// Declare a record type whose fields are supplied later with [`define_fields`].
    ///
    /// [`define_fields`]: TypeDescriptor::define_fields
    pub fn record(name: impl Into<String>) -> Self {
        Self::new(Shape::Record(RecordShape {
            name: name.into(),
            fields: OnceLock::new(),
        }))
    }

    pub fn record_with_fields(name: impl Into<String>, fields: Vec<FieldDescriptor>) -> Result<Self> {
        let ty = Self::record(name);
        ty.define_fields(fields)?;
        Ok(ty)
    }

    /// Set the field list of a record declared with [`record`](TypeDescriptor::record).
    ///
    /// Fails if this is not a record, the fields were already set, a field name repeats, or an
    /// embedded field is not itself a record.
    pub fn define_fields(&self, fields: Vec<FieldDescriptor>) -> Result<()> {
        let Shape::Record(record) = self.shape() else {
            return Err(Error::descriptor(format!("{self} is not a record type")));
        };
        for (i, field) in fields.iter().enumerate() {
            if fields[..i].iter().any(|f| f.name == field.name) {
                return Err(Error::descriptor(format!(
                    "record {} declares field `{}` twice",
                    record.name, field.name
                )));
            }
            if field.embedded && !matches!(field.ty.shape(), Shape::Record(_)) {
                return Err(Error::descriptor(format!(
                    "embedded field `{}` of record {} must be a record, not {}",
                    field.name, record.name, field.ty
                )));
            }
        }
        record
            .fields
            .set(fields)
            .map_err(|_| Error::descriptor(format!("fields of record {} are already defined", record.name)))
    }

    pub fn shape(&self) -> &Shape {
        &self.0
    }

    /// Record fields, or an empty slice for anything else.
    pub fn fields(&self) -> &[FieldDescriptor] {
        match self.shape() {
            Shape::Record(record) => record.fields(),
            _ => &[],
        }
    }

    pub fn is_record(&self) -> bool {
        matches!(self.shape(), Shape::Record(_))
    }

    pub fn is_optional(&self) -> bool {
        matches!(self.shape(), Shape::Optional(_))
    }

    /// The value a slot of this type holds before anything is built into it.
    pub fn zero_value(&self) -> Value {
        self.zero_value_guarded(&mut Vec::new())
    }

    fn zero_value_guarded(&self, open_records: &mut Vec<*const Shape>) -> Value {
        match self.shape() {
            Shape::Any | Shape::Custom(_) | Shape::Time => Value::Null,
            Shape::Markup | Shape::Edge | Shape::Node => Value::Null,
            Shape::Bool => Value::Bool(false),
            Shape::Int(_) => Value::Int(0),
            Shape::Uint(_) => Value::Uint(0),
            Shape::Float(_) => Value::Float(0.0),
            Shape::BigInt => Value::BigInt(BigInt::zero()),
            Shape::BigFloat => Value::BigFloat(BigFloat::zero()),
            Shape::DecimalFloat => Value::DecimalFloat(DecimalFloat::zero()),
            Shape::BigDecimalFloat => Value::BigDecimalFloat(BigDecimal::zero()),
            Shape::String => Value::String(String::new()),
            Shape::Bytes => Value::Bytes(Vec::new()),
            Shape::Uid => Value::Uid(uuid::Uuid::nil()),
            Shape::List(_) => Value::List(Vec::new()),
            Shape::Array(element, len) => {
                let zero = element.zero_value_guarded(open_records);
                Value::List(vec![zero; *len])
            }
            Shape::Map(_, _) => Value::Map(Map::new()),
            Shape::Optional(_) => Value::Optional(None),
            Shape::Record(record) => {
                let ptr = Arc::as_ptr(&self.0);
                // A record that (non-optionally) contains itself has no finite zero value.
                if open_records.contains(&ptr) {
                    return Value::Null;
                }
                open_records.push(ptr);
                let fields = record
                    .fields()
                    .iter()
                    .map(|f| RecordField {
                        name: f.name.clone(),
                        value: f.ty.zero_value_guarded(open_records),
                        embedded: f.embedded,
                    })
                    .collect();
                open_records.pop();
                Value::Record(Record {
                    type_name: record.name.clone(),
                    fields,
                })
            }
        }
    }
}

impl fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.shape() {
            Shape::Any => f.write_str("any"),
            Shape::Bool => f.write_str("bool"),
            Shape::Int(w) => f.write_str(w.name()),
            Shape::Uint(w) => f.write_str(w.name()),
            Shape::Float(w) => f.write_str(w.name()),
            Shape::BigInt => f.write_str("big int"),
            Shape::BigFloat => f.write_str("big float"),
            Shape::DecimalFloat => f.write_str("decimal float"),
            Shape::BigDecimalFloat => f.write_str("big decimal float"),
            Shape::String => f.write_str("string"),
            Shape::Bytes => f.write_str("bytes"),
            Shape::Uid => f.write_str("uid"),
            Shape::Time => f.write_str("time"),
            Shape::List(e) => write!(f, "list<{e}>"),
            Shape::Array(e, n) => write!(f, "array<{e}; {n}>"),
            Shape::Map(k, v) => write!(f, "map<{k}, {v}>"),
            Shape::Record(r) => write!(f, "record {}", r.name),
            Shape::Optional(t) => write!(f, "optional<{t}>"),
            Shape::Custom(name) => write!(f, "custom {name}"),
            Shape::Markup => f.write_str("markup"),
            Shape::Edge => f.write_str("edge"),
            Shape::Node => f.write_str("node"),
        }
    }
}

impl fmt::Debug for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeDescriptor({self})")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn structural_equality_for_non_records() {
        let a = TypeDescriptor::list(TypeDescriptor::int(IntWidth::I32));
        let b = TypeDescriptor::list(TypeDescriptor::int(IntWidth::I32));
        assert_eq!(a, b);
        let mut set = HashSet::new();
        set.insert(a);
        assert!(set.contains(&b));
        assert_ne!(
            TypeDescriptor::int(IntWidth::I32),
            TypeDescriptor::int(IntWidth::I64)
        );
    }

    #[test]
    fn records_have_identity() {
        let a = TypeDescriptor::record("Point");
        let b = TypeDescriptor::record("Point");
        assert_ne!(a, b);
        assert_eq!(a, a.clone());
        assert_eq!(
            TypeDescriptor::optional(a.clone()),
            TypeDescriptor::optional(a.clone())
        );
    }

    #[test]
    fn recursive_record_zero_value_terminates() {
        let tree = TypeDescriptor::record("Tree");
        tree.define_fields(vec![
            FieldDescriptor::new("value", TypeDescriptor::int(IntWidth::I64)),
            FieldDescriptor::new("left", tree.clone()),
            FieldDescriptor::new("kids", TypeDescriptor::list(tree.clone())),
        ])
        .unwrap();
        let zero = tree.zero_value();
        let Value::Record(record) = zero else {
            panic!("expected record");
        };
        assert_eq!(record.fields[0].value, Value::Int(0));
        assert_eq!(record.fields[1].value, Value::Null);
        assert_eq!(record.fields[2].value, Value::List(vec![]));
        // Debug must not recurse through the self reference.
        assert!(format!("{tree:?}").contains("Tree"));
    }

    #[test]
    fn define_fields_validates() {
        let rec = TypeDescriptor::record("R");
        let err = rec
            .define_fields(vec![FieldDescriptor::embedded("x", TypeDescriptor::string())])
            .unwrap_err();
        assert!(err.to_string().contains("must be a record"));
        rec.define_fields(vec![FieldDescriptor::new("x", TypeDescriptor::string())])
            .unwrap();
        assert!(rec.define_fields(vec![]).is_err());
        assert!(TypeDescriptor::string().define_fields(vec![]).is_err());
        let dup = TypeDescriptor::record_with_fields(
            "D",
            vec![
                FieldDescriptor::new("a", TypeDescriptor::bool()),
                FieldDescriptor::new("a", TypeDescriptor::bool()),
            ],
        );
        assert!(dup.is_err());
    }

    #[test]
    fn fixed_array_zero_value() {
        let ty = TypeDescriptor::array(TypeDescriptor::uint(UintWidth::U8), 3);
        assert_eq!(
            ty.zero_value(),
            Value::List(vec![Value::Uint(0), Value::Uint(0), Value::Uint(0)])
        );
        assert_eq!(ty.to_string(), "array<u8; 3>");
    }
}
