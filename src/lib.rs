//! Type-directed, event-driven value builder.
//!
//! A decoder turns a document into a linear stream of data events (scalars, arrays, container
//! begin/end, markers and references). This crate consumes such a stream and builds a typed
//! [`Value`] matching a [`TypeDescriptor`] chosen by the caller:
//!
//! - numbers are converted between seven representations only when no information is lost;
//! - records map field names onto declared fields, skipping unknown ones;
//! - references may point forward, and cyclic ones become [`Value::Recursive`] back-edges;
//! - chunked arrays are reassembled before any builder sees them.
//!
//! Example: build a record from events.
//!
//! ```rust
//! use concise_builder::{build_from_events, Event, FieldDescriptor, IntWidth, TypeDescriptor};
//!
//! let point = TypeDescriptor::record_with_fields(
//!     "Point",
//!     vec![
//!         FieldDescriptor::new("x", TypeDescriptor::int(IntWidth::I32)),
//!         FieldDescriptor::new("y", TypeDescriptor::int(IntWidth::I32)),
//!     ],
//! )
//! .unwrap();
//! let events = [
//!     Event::Map,
//!     Event::string("x"),
//!     Event::int(3),
//!     Event::string("y"),
//!     Event::int(-4),
//!     Event::End,
//! ];
//! let value = build_from_events(&point, &events).unwrap();
//! let record = value.as_record().unwrap();
//! assert_eq!(record.get("y").and_then(|v| v.as_i64()), Some(-4));
//! ```

mod macros;
mod tracing_macros;

mod array;
pub mod big_float;
pub mod budget;
mod builder;
mod context;
pub mod conversion;
pub mod decimal_float;
mod emit;
mod error;
pub mod events;
mod float_format;
mod markers;
mod options;
mod path;
mod session;
pub mod types;
pub mod value;

pub use big_float::BigFloat;
pub use budget::{Budget, BudgetBreach, BudgetEnforcer, BudgetReport};
pub use builder::{Builder, CustomHooks};
pub use context::BuildContext;
pub use conversion::{convert, ConversionError, ConversionFailure, ConversionLimits, Number, NumericKind};
pub use decimal_float::DecimalFloat;
pub use emit::{emit_document, emit_value};
pub use error::{BoxError, Error, Result};
pub use events::{replay, ArrayKind, DataEventReceiver, Event, EventRecorder};
pub use markers::MarkerRegistry;
pub use options::{BuilderOptions, CustomBuildFunction};
pub use path::{BuildPath, PathKind, PathSegment};
pub use session::{BuilderGenerator, Session};
pub use types::{FieldDescriptor, FloatWidth, IntWidth, RecordShape, Shape, TypeDescriptor, UintWidth};
pub use value::{Edge, Map, Markup, Node, Record, RecordField, Time, Value};

/// Build a value of type `ty` from `events` with default options and a fresh session.
///
/// Example: a list of optional strings, one of them null.
///
/// ```rust
/// use concise_builder::{build_from_events, Event, TypeDescriptor, Value};
///
/// let ty = TypeDescriptor::list(TypeDescriptor::optional(TypeDescriptor::string()));
/// let events = [Event::List, Event::string("a"), Event::Null, Event::End];
/// let value = build_from_events(&ty, &events).unwrap();
/// assert_eq!(
///     value,
///     Value::List(vec![
///         Value::Optional(Some(Box::new(Value::from("a")))),
///         Value::Optional(None),
///     ])
/// );
/// ```
pub fn build_from_events(ty: &TypeDescriptor, events: &[Event]) -> Result<Value> {
    build_from_events_with_options(ty, events, BuilderOptions::default())
}

/// Build a value of type `ty` from `events` with the given options.
///
/// Example: a forward reference inside a map.
///
/// ```rust
/// use concise_builder::{build_from_events_with_options, BuilderOptions, Event, TypeDescriptor};
///
/// let events = [
///     Event::Map,
///     Event::string("copy"),
///     Event::reference("v"),
///     Event::string("original"),
///     Event::marker("v"),
///     Event::string("shared"),
///     Event::End,
/// ];
/// let value = build_from_events_with_options(
///     &TypeDescriptor::any(),
///     &events,
///     BuilderOptions::default(),
/// )
/// .unwrap();
/// let map = value.as_map().unwrap();
/// assert_eq!(map.get_str("copy").and_then(|v| v.as_str()), Some("shared"));
/// ```
pub fn build_from_events_with_options(
    ty: &TypeDescriptor,
    events: &[Event],
    options: BuilderOptions,
) -> Result<Value> {
    let mut ctx = Session::new().new_build(ty, options);
    replay(events, &mut ctx)?;
    ctx.into_built_object()
}
