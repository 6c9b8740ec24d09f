//! Builders: per-type strategies that turn data events into values.
//!
//! A [`Builder`] is stateless. It knows its target type and how to react to each event kind:
//! scalar events produce a finished [`Value`], container-begin events push a frame onto the
//! build stack. All mutable state of an in-progress container lives in its frame, so builders
//! can be cached per type and shared between concurrent builds.
//!
//! An event a builder has no handler for is an [`Error::InvalidEvent`] naming both the event
//! and the builder's target type.

mod custom;
mod frame;
mod record;

use std::fmt;
use std::sync::{Arc, LazyLock};

use bigdecimal::BigDecimal;
use num_bigint::BigInt;
use uuid::Uuid;

pub use custom::CustomHooks;
pub(crate) use frame::{Accepted, Ending, Finisher, FrameStack};
pub(crate) use record::FieldTable;

use crate::array::{check_payload_length, decode_elements, ArrayElement};
use crate::big_float::BigFloat;
use crate::conversion::{convert, ConversionLimits, Number, NumericKind};
use crate::decimal_float::DecimalFloat;
use crate::error::{Error, Result};
use crate::events::ArrayKind;
use crate::float_format::signaling_nan;
use crate::markers::Reshape;
use crate::options::BuilderOptions;
use crate::session::Session;
use crate::types::{Shape, TypeDescriptor};
use crate::value::{Edge, Map, Markup, Node, Time, Value};
use frame::{FieldExpect, FrameState};

/// What every builder of one build can see: the session that supplies builders for nested
/// types, and the options.
pub(crate) struct BuildEnv {
    pub(crate) session: Session,
    pub(crate) options: BuilderOptions,
    pub(crate) limits: ConversionLimits,
}

impl BuildEnv {
    pub(crate) fn new(session: Session, options: BuilderOptions) -> Self {
        let limits = options.conversion_limits();
        Self {
            session,
            options,
            limits,
        }
    }

    pub(crate) fn builder_for(&self, ty: &TypeDescriptor) -> Builder {
        self.session.builder_for_type(ty)
    }
}

/// Strategy for building values of one target type.
#[derive(Clone)]
pub struct Builder {
    target: TypeDescriptor,
    variant: Variant,
}

#[derive(Clone)]
enum Variant {
    Bool,
    String,
    Bytes,
    Uid,
    Time,
    Numeric(NumericKind),
    List(TypeDescriptor),
    Array(TypeDescriptor, usize),
    Map(TypeDescriptor, TypeDescriptor),
    Record(Arc<FieldTable>),
    Optional(TypeDescriptor),
    Any,
    /// Builds like `Any`; used for values the parent throws away.
    Ignore,
    Custom(Option<Arc<CustomHooks>>),
    Markup,
    Edge,
    Node,
}

static ANY: LazyLock<Builder> = LazyLock::new(|| Builder::for_type(&TypeDescriptor::any()));

static IGNORE: LazyLock<Builder> = LazyLock::new(|| Builder {
    target: TypeDescriptor::any(),
    variant: Variant::Ignore,
});

static FIELD_NAME: LazyLock<Builder> =
    LazyLock::new(|| Builder::for_type(&TypeDescriptor::string()));

impl Builder {
    /// The default builder for `ty`.
    pub fn for_type(ty: &TypeDescriptor) -> Builder {
        let variant = match ty.shape() {
            Shape::Any => Variant::Any,
            Shape::Bool => Variant::Bool,
            Shape::Int(w) => Variant::Numeric(NumericKind::Int(*w)),
            Shape::Uint(w) => Variant::Numeric(NumericKind::Uint(*w)),
            Shape::Float(w) => Variant::Numeric(NumericKind::Float(*w)),
            Shape::BigInt => Variant::Numeric(NumericKind::BigInt),
            Shape::BigFloat => Variant::Numeric(NumericKind::BigFloat),
            Shape::DecimalFloat => Variant::Numeric(NumericKind::DecimalFloat),
            Shape::BigDecimalFloat => Variant::Numeric(NumericKind::BigDecimalFloat),
            Shape::String => Variant::String,
            Shape::Bytes => Variant::Bytes,
            Shape::Uid => Variant::Uid,
            Shape::Time => Variant::Time,
            Shape::List(element) => Variant::List(element.clone()),
            Shape::Array(element, len) => Variant::Array(element.clone(), *len),
            Shape::Map(key, value) => Variant::Map(key.clone(), value.clone()),
            Shape::Record(_) => Variant::Record(Arc::new(FieldTable::new(ty))),
            Shape::Optional(inner) => Variant::Optional(inner.clone()),
            Shape::Custom(_) => Variant::Custom(None),
            Shape::Markup => Variant::Markup,
            Shape::Edge => Variant::Edge,
            Shape::Node => Variant::Node,
        };
        Builder {
            target: ty.clone(),
            variant,
        }
    }

    /// A builder for an application-defined type, filled by `hooks` from custom payloads.
    pub fn custom(ty: &TypeDescriptor, hooks: CustomHooks) -> Builder {
        Builder {
            target: ty.clone(),
            variant: Variant::Custom(Some(Arc::new(hooks))),
        }
    }

    pub(crate) fn any() -> Builder {
        ANY.clone()
    }

    pub(crate) fn ignore() -> Builder {
        IGNORE.clone()
    }

    pub(crate) fn field_name() -> Builder {
        FIELD_NAME.clone()
    }

    pub fn target(&self) -> &TypeDescriptor {
        &self.target
    }

    pub fn name(&self) -> &'static str {
        match &self.variant {
            Variant::Bool => "bool builder",
            Variant::String => "string builder",
            Variant::Bytes => "bytes builder",
            Variant::Uid => "uid builder",
            Variant::Time => "time builder",
            Variant::Numeric(_) => "numeric builder",
            Variant::List(_) => "list builder",
            Variant::Array(_, _) => "array builder",
            Variant::Map(_, _) => "map builder",
            Variant::Record(_) => "record builder",
            Variant::Optional(_) => "optional builder",
            Variant::Any => "dynamic builder",
            Variant::Ignore => "ignoring builder",
            Variant::Custom(_) => "custom builder",
            Variant::Markup => "markup builder",
            Variant::Edge => "edge builder",
            Variant::Node => "node builder",
        }
    }

    fn invalid(&self, event: &'static str) -> Error {
        Error::invalid_event(event, self.name(), self.target.to_string())
    }

    /// Build through an optional: the inner type's builder does the work, the result is wrapped.
    fn through_optional(
        env: &BuildEnv,
        inner: &TypeDescriptor,
        build: impl FnOnce(&Builder) -> Result<Value>,
    ) -> Result<Value> {
        let inner = env.builder_for(inner);
        Ok(Value::Optional(Some(Box::new(build(&inner)?))))
    }

    /// The value left in a slot whose reference is not resolved yet.
    pub(crate) fn placeholder(&self) -> Value {
        Value::Null
    }

    pub(crate) fn build_from_null(&self, _env: &BuildEnv) -> Result<Value> {
        match &self.variant {
            Variant::Any | Variant::Ignore => Ok(Value::Null),
            Variant::Optional(_) => Ok(Value::Optional(None)),
            _ => Err(self.invalid("null")),
        }
    }

    pub(crate) fn build_from_bool(&self, env: &BuildEnv, v: bool) -> Result<Value> {
        match &self.variant {
            Variant::Bool | Variant::Any | Variant::Ignore => Ok(Value::Bool(v)),
            Variant::Optional(inner) => {
                Self::through_optional(env, inner, |b| b.build_from_bool(env, v))
            }
            _ => Err(self.invalid("a boolean")),
        }
    }

    pub(crate) fn build_from_int(&self, env: &BuildEnv, v: i64) -> Result<Value> {
        self.build_number(env, Number::Int(v), "an integer")
    }

    pub(crate) fn build_from_uint(&self, env: &BuildEnv, v: u64) -> Result<Value> {
        self.build_number(env, Number::Uint(v), "an integer")
    }

    pub(crate) fn build_from_big_int(&self, env: &BuildEnv, v: BigInt) -> Result<Value> {
        self.build_number(env, Number::BigInt(v), "a big integer")
    }

    pub(crate) fn build_from_float(&self, env: &BuildEnv, v: f64) -> Result<Value> {
        self.build_number(env, Number::Float(v), "a float")
    }

    pub(crate) fn build_from_big_float(&self, env: &BuildEnv, v: BigFloat) -> Result<Value> {
        self.build_number(env, Number::BigFloat(v), "a big float")
    }

    pub(crate) fn build_from_decimal_float(&self, env: &BuildEnv, v: DecimalFloat) -> Result<Value> {
        self.build_number(env, Number::DecimalFloat(v), "a decimal float")
    }

    pub(crate) fn build_from_big_decimal_float(&self, env: &BuildEnv, v: BigDecimal) -> Result<Value> {
        self.build_number(env, Number::BigDecimalFloat(v), "a big decimal float")
    }

    pub(crate) fn build_from_nan(&self, env: &BuildEnv, signaling: bool) -> Result<Value> {
        let nan = if signaling { signaling_nan() } else { f64::NAN };
        self.build_number(env, Number::Float(nan), "a NaN")
    }

    fn build_number(&self, env: &BuildEnv, number: Number, event: &'static str) -> Result<Value> {
        match &self.variant {
            Variant::Numeric(kind) => Ok(Value::from(convert(&number, *kind, &env.limits)?)),
            Variant::Any | Variant::Ignore => Ok(natural_number(number)),
            Variant::Optional(inner) => {
                Self::through_optional(env, inner, |b| b.build_number(env, number, event))
            }
            _ => Err(self.invalid(event)),
        }
    }

    pub(crate) fn build_from_uid(&self, env: &BuildEnv, v: Uuid) -> Result<Value> {
        match &self.variant {
            Variant::Uid | Variant::Any | Variant::Ignore => Ok(Value::Uid(v)),
            Variant::Optional(inner) => {
                Self::through_optional(env, inner, |b| b.build_from_uid(env, v))
            }
            _ => Err(self.invalid("a uid")),
        }
    }

    pub(crate) fn build_from_time(&self, env: &BuildEnv, v: Time) -> Result<Value> {
        match &self.variant {
            Variant::Time | Variant::Any | Variant::Ignore => Ok(Value::Time(v)),
            Variant::Optional(inner) => {
                Self::through_optional(env, inner, |b| b.build_from_time(env, v))
            }
            _ => Err(self.invalid("a time")),
        }
    }

    /// A complete text-carrying array (string, resource id, remote reference, custom text).
    pub(crate) fn build_from_stringlike_array(
        &self,
        env: &BuildEnv,
        kind: ArrayKind,
        text: String,
    ) -> Result<Value> {
        match (&self.variant, kind) {
            (
                Variant::String,
                ArrayKind::String | ArrayKind::ResourceId | ArrayKind::RemoteReference,
            ) => Ok(Value::String(text)),
            (Variant::Any | Variant::Ignore, _) => Ok(match kind {
                ArrayKind::ResourceId => Value::ResourceId(text),
                ArrayKind::RemoteReference => Value::RemoteReference(text),
                ArrayKind::CustomText => Value::CustomText(text),
                _ => Value::String(text),
            }),
            (Variant::Custom(hooks), ArrayKind::CustomText) => {
                custom::build_custom(self, env, hooks.as_deref(), kind, text.as_bytes())
            }
            (Variant::Optional(inner), _) => Self::through_optional(env, inner, |b| {
                b.build_from_stringlike_array(env, kind, text)
            }),
            _ => Err(self.invalid(array_event_name(kind))),
        }
    }

    /// A complete binary array (numeric elements, bits, uids, bytes, custom binary).
    pub(crate) fn build_from_array(
        &self,
        env: &BuildEnv,
        kind: ArrayKind,
        element_count: u64,
        data: &[u8],
    ) -> Result<Value> {
        match &self.variant {
            Variant::Bytes if kind == ArrayKind::Uint8 => {
                check_payload_length(kind, element_count, data)?;
                Ok(Value::Bytes(data.to_vec()))
            }
            Variant::Custom(hooks) if kind == ArrayKind::CustomBinary => {
                custom::build_custom(self, env, hooks.as_deref(), kind, data)
            }
            Variant::List(element) => {
                let element = env.builder_for(element);
                let items = build_elements(&element, env, kind, element_count, data)?;
                Ok(Value::List(items))
            }
            Variant::Array(element, len) => {
                if element_count > *len as u64 {
                    return Err(Error::ArrayLength {
                        target: self.target.to_string(),
                        len: *len,
                    });
                }
                let zero = element.zero_value();
                let element = env.builder_for(element);
                let mut items = build_elements(&element, env, kind, element_count, data)?;
                items.resize(*len, zero);
                Ok(Value::List(items))
            }
            Variant::Any | Variant::Ignore => match kind {
                ArrayKind::Uint8 => {
                    check_payload_length(kind, element_count, data)?;
                    Ok(Value::Bytes(data.to_vec()))
                }
                ArrayKind::CustomBinary => {
                    check_payload_length(kind, element_count, data)?;
                    Ok(Value::CustomBinary(data.to_vec()))
                }
                _ => Ok(Value::List(build_elements(
                    self,
                    env,
                    kind,
                    element_count,
                    data,
                )?)),
            },
            Variant::Optional(inner) => Self::through_optional(env, inner, |b| {
                b.build_from_array(env, kind, element_count, data)
            }),
            _ => Err(self.invalid(array_event_name(kind))),
        }
    }

    pub(crate) fn build_begin_list(&self, env: &BuildEnv, stack: &mut FrameStack) -> Result<()> {
        match &self.variant {
            Variant::List(element) => {
                stack.push(
                    self.target.clone(),
                    Value::List(Vec::new()),
                    FrameState::List {
                        element: env.builder_for(element),
                    },
                );
            }
            Variant::Array(element, len) => {
                stack.push(
                    self.target.clone(),
                    self.target.zero_value(),
                    FrameState::Array {
                        element: env.builder_for(element),
                        next: 0,
                        len: *len,
                    },
                );
            }
            Variant::Any | Variant::Ignore => {
                stack.push(
                    self.target.clone(),
                    Value::List(Vec::new()),
                    FrameState::List {
                        element: self.clone(),
                    },
                );
            }
            Variant::Optional(inner) => {
                env.builder_for(inner).build_begin_list(env, stack)?;
                stack.top_mut()?.finishers.push(Finisher::WrapOptional);
            }
            _ => return Err(self.invalid("a list")),
        }
        Ok(())
    }

    pub(crate) fn build_begin_map(&self, env: &BuildEnv, stack: &mut FrameStack) -> Result<()> {
        match &self.variant {
            Variant::Map(key, value) => {
                stack.push(
                    self.target.clone(),
                    Value::Map(Map::new()),
                    FrameState::Map {
                        key: env.builder_for(key),
                        value: env.builder_for(value),
                        pending_key: None,
                    },
                );
            }
            Variant::Record(table) => {
                stack.push(
                    self.target.clone(),
                    self.target.zero_value(),
                    FrameState::Record {
                        table: Arc::clone(table),
                        expect: FieldExpect::Name,
                    },
                );
            }
            Variant::Any | Variant::Ignore => {
                stack.push(
                    self.target.clone(),
                    Value::Map(Map::new()),
                    FrameState::Map {
                        key: self.clone(),
                        value: self.clone(),
                        pending_key: None,
                    },
                );
            }
            Variant::Optional(inner) => {
                env.builder_for(inner).build_begin_map(env, stack)?;
                stack.top_mut()?.finishers.push(Finisher::WrapOptional);
            }
            _ => return Err(self.invalid("a map")),
        }
        Ok(())
    }

    pub(crate) fn build_begin_markup(
        &self,
        env: &BuildEnv,
        stack: &mut FrameStack,
        name: &str,
    ) -> Result<()> {
        match &self.variant {
            Variant::Markup | Variant::Any | Variant::Ignore => {
                stack.push(
                    self.target.clone(),
                    Value::Markup(Markup {
                        name: name.to_owned(),
                        ..Markup::default()
                    }),
                    FrameState::Markup {
                        in_contents: false,
                        pending_key: None,
                    },
                );
            }
            Variant::Optional(inner) => {
                env.builder_for(inner).build_begin_markup(env, stack, name)?;
                stack.top_mut()?.finishers.push(Finisher::WrapOptional);
            }
            _ => return Err(self.invalid("a markup")),
        }
        Ok(())
    }

    pub(crate) fn build_begin_edge(&self, env: &BuildEnv, stack: &mut FrameStack) -> Result<()> {
        match &self.variant {
            Variant::Edge | Variant::Any | Variant::Ignore => {
                stack.push(
                    self.target.clone(),
                    Value::Edge(Box::new(Edge::default())),
                    FrameState::Edge { filled: 0 },
                );
            }
            Variant::Optional(inner) => {
                env.builder_for(inner).build_begin_edge(env, stack)?;
                stack.top_mut()?.finishers.push(Finisher::WrapOptional);
            }
            _ => return Err(self.invalid("an edge")),
        }
        Ok(())
    }

    pub(crate) fn build_begin_node(&self, env: &BuildEnv, stack: &mut FrameStack) -> Result<()> {
        match &self.variant {
            Variant::Node | Variant::Any | Variant::Ignore => {
                stack.push(
                    self.target.clone(),
                    Value::Node(Node::default()),
                    FrameState::Node { has_value: false },
                );
            }
            Variant::Optional(inner) => {
                env.builder_for(inner).build_begin_node(env, stack)?;
                stack.top_mut()?.finishers.push(Finisher::WrapOptional);
            }
            _ => return Err(self.invalid("a node")),
        }
        Ok(())
    }

    /// Fit a copy of the value marked `id` into a slot of this builder's type.
    ///
    /// Optionals are wrapped or unwrapped as needed and numbers are converted; anything else
    /// must already have the right kind. The returned [`Reshape`] records the optional layers
    /// added or removed.
    pub(crate) fn build_from_reference(
        &self,
        env: &BuildEnv,
        id: &str,
        value: Value,
    ) -> Result<(Value, Reshape)> {
        match &self.variant {
            Variant::Any | Variant::Ignore | Variant::Custom(_) => Ok((value, Reshape::default())),
            Variant::Optional(inner) => match value {
                Value::Null | Value::Optional(None) => {
                    Ok((Value::Optional(None), Reshape::default()))
                }
                Value::Recursive(_) => Ok((value, Reshape::default())),
                // The wrapper lines up with this slot's; the payload still has to fit `inner`.
                Value::Optional(Some(payload)) => {
                    let (inner_value, reshape) =
                        env.builder_for(inner).build_from_reference(env, id, *payload)?;
                    Ok((Value::Optional(Some(Box::new(inner_value))), reshape))
                }
                other => {
                    let (inner_value, reshape) =
                        env.builder_for(inner).build_from_reference(env, id, other)?;
                    Ok((Value::Optional(Some(Box::new(inner_value))), reshape.wrapped()))
                }
            },
            _ => {
                let (value, reshape) = match value {
                    Value::Optional(Some(inner)) => (*inner, Reshape::default().unwrapped()),
                    other => (other, Reshape::default()),
                };
                if matches!(value, Value::Recursive(_)) {
                    return Ok((value, reshape));
                }
                if let (Variant::Numeric(kind), Some(number)) = (&self.variant, value.as_number()) {
                    let converted = convert(&number, *kind, &env.limits)?;
                    return Ok((Value::from(converted), reshape));
                }
                if self.accepts(&value) {
                    Ok((value, reshape))
                } else {
                    Err(Error::ReferenceMismatch {
                        id: id.to_owned(),
                        target: self.target.to_string(),
                        found: value.kind_name(),
                    })
                }
            }
        }
    }

    fn accepts(&self, value: &Value) -> bool {
        match (&self.variant, value) {
            (Variant::Bool, Value::Bool(_))
            | (Variant::String, Value::String(_))
            | (Variant::Bytes, Value::Bytes(_))
            | (Variant::Uid, Value::Uid(_))
            | (Variant::Time, Value::Time(_))
            | (Variant::List(_), Value::List(_))
            | (Variant::Map(_, _), Value::Map(_))
            | (Variant::Markup, Value::Markup(_))
            | (Variant::Edge, Value::Edge(_))
            | (Variant::Node, Value::Node(_)) => true,
            (Variant::Array(_, len), Value::List(items)) => items.len() == *len,
            (Variant::Record(table), Value::Record(record)) => table.type_name() == record.type_name,
            _ => false,
        }
    }
}

impl fmt::Debug for Builder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Builder({} for {})", self.name(), self.target)
    }
}

/// Representation a dynamic target gives a number: the stream's own, with small unsigned
/// integers folded into signed ones.
fn natural_number(number: Number) -> Value {
    match number {
        Number::Uint(v) => match i64::try_from(v) {
            Ok(v) => Value::Int(v),
            Err(_) => Value::Uint(v),
        },
        other => Value::from(other),
    }
}

fn build_elements(
    element: &Builder,
    env: &BuildEnv,
    kind: ArrayKind,
    element_count: u64,
    data: &[u8],
) -> Result<Vec<Value>> {
    decode_elements(kind, element_count, data)?
        .into_iter()
        .map(|e| match e {
            ArrayElement::Bool(b) => element.build_from_bool(env, b),
            ArrayElement::Int(v) => element.build_from_int(env, v),
            ArrayElement::Uint(v) => element.build_from_uint(env, v),
            ArrayElement::Float(v) => element.build_from_float(env, v),
            ArrayElement::Uid(v) => element.build_from_uid(env, v),
        })
        .collect()
}

pub(crate) fn array_event_name(kind: ArrayKind) -> &'static str {
    match kind {
        ArrayKind::String => "a string",
        ArrayKind::ResourceId => "a resource id",
        ArrayKind::RemoteReference => "a remote reference",
        ArrayKind::CustomText => "a custom text",
        ArrayKind::CustomBinary => "a custom binary",
        ArrayKind::Bit => "a bit array",
        ArrayKind::Uint8 => "a byte array",
        ArrayKind::Uint16 => "a u16 array",
        ArrayKind::Uint32 => "a u32 array",
        ArrayKind::Uint64 => "a u64 array",
        ArrayKind::Int8 => "an i8 array",
        ArrayKind::Int16 => "an i16 array",
        ArrayKind::Int32 => "an i32 array",
        ArrayKind::Int64 => "an i64 array",
        ArrayKind::Float16 => "an f16 array",
        ArrayKind::Float32 => "an f32 array",
        ArrayKind::Float64 => "an f64 array",
        ArrayKind::Uid => "a uid array",
    }
}
