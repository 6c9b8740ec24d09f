//! Public macros for constructing option structs without relying on struct literal syntax.
//!
//! These let call sites stay ergonomic while the option structs gain fields over time.

/// Construct [`crate::BuilderOptions`] from `Default` and a list of field assignments.
///
/// Example:
///
/// ```rust
/// let options = concise_builder::options! {
///     case_insensitive_struct_field_names: true,
///     reject_unknown_fields: true,
/// };
/// assert!(options.reject_unknown_fields);
/// ```
#[macro_export]
macro_rules! options {
    ( $( $field:ident : $value:expr ),* $(,)? ) => {{
        let mut opt = $crate::BuilderOptions::default();
        $(
            {
                opt.$field = $value;
            }
        )*
        opt
    }};
}

/// Construct [`crate::Budget`] from `Default` and a list of field assignments.
///
/// Example:
///
/// ```rust
/// let budget = concise_builder::budget! {
///     max_depth: 16,
///     max_markers: 10,
/// };
/// assert_eq!(budget.max_depth, 16);
/// ```
#[macro_export]
macro_rules! budget {
    ( $( $field:ident : $value:expr ),* $(,)? ) => {{
        let mut budget = $crate::Budget::default();
        $(
            {
                budget.$field = $value;
            }
        )*
        budget
    }};
}
