use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::budget::Budget;
use crate::conversion::ConversionLimits;
use crate::error::BoxError;
use crate::types::TypeDescriptor;
use crate::value::Value;

/// Fills a custom-typed slot from a custom binary or custom text payload.
///
/// Receives the raw payload (text payloads as their UTF-8 bytes) and the target type.
pub type CustomBuildFunction =
    Arc<dyn Fn(&[u8], &TypeDescriptor) -> Result<Value, BoxError> + Send + Sync>;

/// Build configuration.
///
/// Example: build with a raised big-int exponent limit and lossy float conversion.
///
/// ```rust
/// use concise_builder::{build_from_events_with_options, Event, TypeDescriptor};
///
/// let options = concise_builder::options! {
///     float_to_big_int_max_exponent: 100,
///     error_on_lossy_float_conversion: false,
/// };
/// let value = build_from_events_with_options(
///     &TypeDescriptor::big_int(),
///     &[Event::Float(1e60)],
///     options,
/// ).unwrap();
/// assert!(matches!(value, concise_builder::Value::BigInt(_)));
/// ```
#[derive(Clone, Serialize, Deserialize)]
pub struct BuilderOptions {
    /// Largest base-10 exponent a float may carry when it is built into an integer.
    /// Binary exponents are scaled to base 10 before the comparison. Default: 50.
    pub float_to_big_int_max_exponent: i64,
    /// If true (default), a number that would need rounding to fit a binary float target is
    /// an error. If false, it is rounded to the nearest representable value.
    pub error_on_lossy_float_conversion: bool,
    /// Significant bits kept when a decimal is rounded into a big float. Default: 128.
    pub big_float_precision: u32,
    /// Match record field names ignoring case when no exact match exists. Default: false.
    pub case_insensitive_struct_field_names: bool,
    /// Fail on record field names the record does not declare instead of skipping the
    /// field's value. Default: false.
    pub reject_unknown_fields: bool,
    /// Fallback for custom binary payloads whose target has no registered custom builder.
    #[serde(skip)]
    pub custom_binary_build_function: Option<CustomBuildFunction>,
    /// Fallback for custom text payloads whose target has no registered custom builder.
    #[serde(skip)]
    pub custom_text_build_function: Option<CustomBuildFunction>,
    /// Resource limits for the build. `None` disables enforcement.
    pub budget: Option<Budget>,
}

impl BuilderOptions {
    /// Registers the fallback custom binary build function.
    ///
    /// ```rust
    /// use concise_builder::{BuilderOptions, Value};
    ///
    /// let options = BuilderOptions::default().with_custom_binary_build_function(|bytes, _ty| {
    ///     Ok(Value::Uint(bytes.len() as u64))
    /// });
    /// assert!(options.custom_binary_build_function.is_some());
    /// ```
    pub fn with_custom_binary_build_function<F>(mut self, f: F) -> Self
    where
        F: Fn(&[u8], &TypeDescriptor) -> Result<Value, BoxError> + Send + Sync + 'static,
    {
        self.custom_binary_build_function = Some(Arc::new(f));
        self
    }

    /// Registers the fallback custom text build function.
    pub fn with_custom_text_build_function<F>(mut self, f: F) -> Self
    where
        F: Fn(&[u8], &TypeDescriptor) -> Result<Value, BoxError> + Send + Sync + 'static,
    {
        self.custom_text_build_function = Some(Arc::new(f));
        self
    }

    pub(crate) fn conversion_limits(&self) -> ConversionLimits {
        ConversionLimits {
            max_big_int_exponent: self.float_to_big_int_max_exponent,
            allow_lossy_float: !self.error_on_lossy_float_conversion,
            big_float_precision: self.big_float_precision,
        }
    }
}

impl Default for BuilderOptions {
    fn default() -> Self {
        Self {
            float_to_big_int_max_exponent: 50,
            error_on_lossy_float_conversion: true,
            big_float_precision: 128,
            case_insensitive_struct_field_names: false,
            reject_unknown_fields: false,
            custom_binary_build_function: None,
            custom_text_build_function: None,
            budget: Some(Budget::default()),
        }
    }
}

impl std::fmt::Debug for BuilderOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let set = |present: bool| if present { "set" } else { "none" };
        f.debug_struct("BuilderOptions")
            .field("float_to_big_int_max_exponent", &self.float_to_big_int_max_exponent)
            .field("error_on_lossy_float_conversion", &self.error_on_lossy_float_conversion)
            .field("big_float_precision", &self.big_float_precision)
            .field(
                "case_insensitive_struct_field_names",
                &self.case_insensitive_struct_field_names,
            )
            .field("reject_unknown_fields", &self.reject_unknown_fields)
            .field(
                "custom_binary_build_function",
                &set(self.custom_binary_build_function.is_some()),
            )
            .field(
                "custom_text_build_function",
                &set(self.custom_text_build_function.is_some()),
            )
            .field("budget", &self.budget)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_options_default() {
        let opts = BuilderOptions::default();
        assert_eq!(opts.float_to_big_int_max_exponent, 50);
        assert!(opts.error_on_lossy_float_conversion);
        assert_eq!(opts.big_float_precision, 128);
        assert!(!opts.case_insensitive_struct_field_names);
        assert!(!opts.reject_unknown_fields);
        assert!(opts.custom_binary_build_function.is_none());
        assert!(opts.custom_text_build_function.is_none());
        assert!(opts.budget.is_some());
    }

    #[test]
    fn test_options_debug_format() {
        let opts = BuilderOptions::default();
        let debug_str = format!("{:?}", opts);
        assert!(debug_str.contains("BuilderOptions"));
        assert!(debug_str.contains("custom_text_build_function: \"none\""));

        let opts = opts.with_custom_text_build_function(|_, _| Ok(Value::Null));
        let debug_str = format!("{:?}", opts);
        assert!(debug_str.contains("custom_text_build_function: \"set\""));
    }

    #[test]
    fn test_conversion_limits_follow_options() {
        let mut opts = BuilderOptions::default();
        opts.error_on_lossy_float_conversion = false;
        opts.float_to_big_int_max_exponent = 7;
        let limits = opts.conversion_limits();
        assert!(limits.allow_lossy_float);
        assert_eq!(limits.max_big_int_exponent, 7);
    }

    #[test]
    fn test_options_serde_skips_callbacks() {
        let opts = BuilderOptions::default().with_custom_binary_build_function(|_, _| Ok(Value::Null));
        let json = serde_json::to_string(&opts).unwrap();
        assert!(!json.contains("custom_binary_build_function"));
        let back: BuilderOptions = serde_json::from_str(&json).unwrap();
        assert!(back.custom_binary_build_function.is_none());
        assert_eq!(back.big_float_precision, 128);
    }
}
