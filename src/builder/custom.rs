use std::fmt;
use std::sync::Arc;

use crate::error::{BoxError, Error, Result};
use crate::events::ArrayKind;
use crate::options::CustomBuildFunction;
use crate::types::TypeDescriptor;
use crate::value::Value;

use super::{array_event_name, BuildEnv, Builder};

/// Custom payload handlers for one application-defined type.
///
/// A hook that is not set falls back to the matching function in
/// [`BuilderOptions`](crate::BuilderOptions).
///
/// ```rust
/// use concise_builder::{Builder, CustomHooks, Session, TypeDescriptor, Value};
///
/// let point = TypeDescriptor::custom("point");
/// let hooks = CustomHooks::new().with_text(|text, _ty| {
///     let text = std::str::from_utf8(text)?;
///     Ok(Value::String(text.to_uppercase()))
/// });
/// let session = Session::new();
/// session.register_generator_for_type(&point, {
///     let point = point.clone();
///     move || Builder::custom(&point, hooks.clone())
/// });
/// assert!(session.contains(&point));
/// ```
#[derive(Clone, Default)]
pub struct CustomHooks {
    binary: Option<CustomBuildFunction>,
    text: Option<CustomBuildFunction>,
}

impl CustomHooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_binary<F>(mut self, f: F) -> Self
    where
        F: Fn(&[u8], &TypeDescriptor) -> std::result::Result<Value, BoxError> + Send + Sync + 'static,
    {
        self.binary = Some(Arc::new(f));
        self
    }

    pub fn with_text<F>(mut self, f: F) -> Self
    where
        F: Fn(&[u8], &TypeDescriptor) -> std::result::Result<Value, BoxError> + Send + Sync + 'static,
    {
        self.text = Some(Arc::new(f));
        self
    }
}

impl fmt::Debug for CustomHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomHooks")
            .field("binary", &self.binary.is_some())
            .field("text", &self.text.is_some())
            .finish()
    }
}

/// Run the hook (or the options' fallback) for a custom payload of `kind`.
pub(super) fn build_custom(
    builder: &Builder,
    env: &BuildEnv,
    hooks: Option<&CustomHooks>,
    kind: ArrayKind,
    payload: &[u8],
) -> Result<Value> {
    let function = match kind {
        ArrayKind::CustomBinary => hooks
            .and_then(|h| h.binary.as_ref())
            .or(env.options.custom_binary_build_function.as_ref()),
        ArrayKind::CustomText => hooks
            .and_then(|h| h.text.as_ref())
            .or(env.options.custom_text_build_function.as_ref()),
        _ => None,
    };
    let Some(function) = function else {
        return Err(Error::CustomBuild {
            target: builder.target().to_string(),
            msg: format!("no build function accepts {}", array_event_name(kind)),
        });
    };
    function(payload, builder.target()).map_err(|e| Error::CustomBuild {
        target: builder.target().to_string(),
        msg: e.to_string(),
    })
}
