//! Defines the build error and where in the document it happened.
use std::fmt;

use crate::budget::BudgetBreach;
use crate::conversion::ConversionError;
use crate::path::BuildPath;

pub type Result<T> = std::result::Result<T, Error>;

/// Boxed error returned by custom build functions.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Everything that can go wrong while building a value from an event stream.
#[derive(Debug)]
pub enum Error {
    /// The current builder has no handler for this event.
    InvalidEvent {
        event: &'static str,
        builder: &'static str,
        target: String,
    },
    /// A number could not be stored in the target representation without loss.
    Conversion(ConversionError),
    /// The document ended while references still pointed at markers that never appeared.
    UnresolvedReferences { ids: Vec<String> },
    /// A marker id was used twice in one document.
    DuplicateMarker { id: String },
    /// A referenced value does not fit the slot the reference sits in.
    ReferenceMismatch {
        id: String,
        target: String,
        found: &'static str,
    },
    /// A record received a field name it does not declare (only when unknown fields are rejected).
    UnknownField { field: String, target: String },
    /// More elements than a fixed-size array holds.
    ArrayLength { target: String, len: usize },
    /// An array payload does not match its declared element type or count.
    InvalidArrayPayload { msg: String },
    /// A custom build function failed.
    CustomBuild { target: String, msg: String },
    /// Events arrived in an order the stream grammar does not allow.
    Structure { msg: String },
    /// A type descriptor was declared inconsistently.
    InvalidDescriptor { msg: String },
    /// A [`Budget`](crate::Budget) limit was exceeded.
    Budget { breach: BudgetBreach },
    /// Wraps an error with the document path at which it was raised.
    AtPath { path: BuildPath, error: Box<Error> },
}

impl Error {
    pub(crate) fn invalid_event(event: &'static str, builder: &'static str, target: String) -> Self {
        Error::InvalidEvent {
            event,
            builder,
            target,
        }
    }

    pub(crate) fn structure<S: Into<String>>(msg: S) -> Self {
        Error::Structure { msg: msg.into() }
    }

    pub(crate) fn descriptor<S: Into<String>>(msg: S) -> Self {
        Error::InvalidDescriptor { msg: msg.into() }
    }

    pub(crate) fn array_payload<S: Into<String>>(msg: S) -> Self {
        Error::InvalidArrayPayload { msg: msg.into() }
    }

    /// Attach the document path. Never nests: an error that already carries a path keeps it.
    pub(crate) fn with_path(self, path: BuildPath) -> Self {
        match self {
            Error::AtPath { .. } => self,
            other if path.is_root() => other,
            other => Error::AtPath {
                path,
                error: Box::new(other),
            },
        }
    }

    /// The document path at which the error was raised, if known.
    pub fn path(&self) -> Option<&BuildPath> {
        match self {
            Error::AtPath { path, .. } => Some(path),
            _ => None,
        }
    }

    /// The error without its path wrapper.
    pub fn without_path(&self) -> &Error {
        match self {
            Error::AtPath { error, .. } => error.without_path(),
            other => other,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidEvent {
                event,
                builder,
                target,
            } => write!(f, "{builder} for {target} cannot accept {event}"),
            Error::Conversion(err) => write!(f, "{err}"),
            Error::UnresolvedReferences { ids } => {
                write!(f, "unresolved references to marker(s): {}", ids.join(", "))
            }
            Error::DuplicateMarker { id } => write!(f, "marker `{id}` is defined more than once"),
            Error::ReferenceMismatch { id, target, found } => {
                write!(f, "reference to `{id}` found {found}, which does not fit {target}")
            }
            Error::UnknownField { field, target } => {
                write!(f, "unknown field `{field}` for {target}")
            }
            Error::ArrayLength { target, len } => {
                write!(f, "{target} holds {len} element(s); the stream supplied more")
            }
            Error::InvalidArrayPayload { msg } => write!(f, "invalid array payload: {msg}"),
            Error::CustomBuild { target, msg } => {
                write!(f, "custom build for {target} failed: {msg}")
            }
            Error::Structure { msg } => write!(f, "malformed event stream: {msg}"),
            Error::InvalidDescriptor { msg } => write!(f, "invalid type descriptor: {msg}"),
            Error::Budget { breach } => write!(f, "build budget breached: {breach:?}"),
            Error::AtPath { path, error } => write!(f, "{error} at {path}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Conversion(err) => Some(err),
            Error::AtPath { error, .. } => Some(error.as_ref()),
            _ => None,
        }
    }
}

impl From<ConversionError> for Error {
    fn from(err: ConversionError) -> Self {
        Error::Conversion(err)
    }
}

impl From<BudgetBreach> for Error {
    fn from(breach: BudgetBreach) -> Self {
        Error::Budget { breach }
    }
}
