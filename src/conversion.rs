//! Numeric conversion between the seven number representations.
//!
//! The rule is simple: a conversion succeeds only if the destination holds exactly the same
//! numeric value. Every successful result is verified by converting it back into the source
//! representation and comparing. Opt-in exceptions:
//! - rounding into a binary float (`f32`, `f64`, big float) when lossy float conversion is
//!   allowed;
//! - nothing else. Overflow and fractional parts into integers are always errors.
//!
//! Conversions into integer representations also refuse decimal or binary exponents larger
//! than a configurable bound, so that `1e1000000000` cannot force a gigantic allocation.

use std::fmt;

use bigdecimal::BigDecimal;
use num_bigint::BigInt;
use num_traits::{FromPrimitive, ToPrimitive, Zero};

use crate::big_float::BigFloat;
use crate::decimal_float::DecimalFloat;
use crate::float_format::{is_signaling_nan, signaling_nan};
use crate::types::{FloatWidth, IntWidth, UintWidth};

/// Largest decimal exponent accepted when turning a decimal into a binary float.
const MAX_DECIMAL_TO_BINARY_EXPONENT: i64 = 100_000;

/// Largest binary exponent accepted when turning a binary float into a decimal.
const MAX_BINARY_TO_DECIMAL_EXPONENT: i64 = 350_000;

/// A number in one of its supported representations.
#[derive(Clone, Debug, PartialEq)]
pub enum Number {
    Int(i64),
    Uint(u64),
    Float(f64),
    BigInt(BigInt),
    BigFloat(BigFloat),
    DecimalFloat(DecimalFloat),
    BigDecimalFloat(BigDecimal),
}

/// A numeric destination (or source) representation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NumericKind {
    Int(IntWidth),
    Uint(UintWidth),
    Float(FloatWidth),
    BigInt,
    BigFloat,
    DecimalFloat,
    BigDecimalFloat,
}

impl NumericKind {
    fn is_binary_float(self) -> bool {
        matches!(self, NumericKind::Float(_) | NumericKind::BigFloat)
    }
}

impl fmt::Display for NumericKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NumericKind::Int(w) => f.write_str(w.name()),
            NumericKind::Uint(w) => f.write_str(w.name()),
            NumericKind::Float(w) => f.write_str(w.name()),
            NumericKind::BigInt => f.write_str("big int"),
            NumericKind::BigFloat => f.write_str("big float"),
            NumericKind::DecimalFloat => f.write_str("decimal float"),
            NumericKind::BigDecimalFloat => f.write_str("big decimal float"),
        }
    }
}

impl Number {
    pub fn kind(&self) -> NumericKind {
        match self {
            Number::Int(_) => NumericKind::Int(IntWidth::I64),
            Number::Uint(_) => NumericKind::Uint(UintWidth::U64),
            Number::Float(_) => NumericKind::Float(FloatWidth::F64),
            Number::BigInt(_) => NumericKind::BigInt,
            Number::BigFloat(_) => NumericKind::BigFloat,
            Number::DecimalFloat(_) => NumericKind::DecimalFloat,
            Number::BigDecimalFloat(_) => NumericKind::BigDecimalFloat,
        }
    }

    pub fn is_finite(&self) -> bool {
        match self {
            Number::Float(f) => f.is_finite(),
            Number::DecimalFloat(d) => d.is_finite(),
            _ => true,
        }
    }

    /// Same numeric value and, for NaNs, the same NaN flavour.
    fn same_as(&self, other: &Number) -> bool {
        match (self, other) {
            (Number::Float(a), Number::Float(b)) if a.is_nan() || b.is_nan() => {
                a.is_nan() && b.is_nan() && is_signaling_nan(*a) == is_signaling_nan(*b)
            }
            (Number::Float(a), Number::Float(b)) => a == b,
            _ => self == other,
        }
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Number::Int(v) => write!(f, "{v}"),
            Number::Uint(v) => write!(f, "{v}"),
            Number::Float(v) => write!(f, "{v}"),
            Number::BigInt(v) => write!(f, "{v}"),
            Number::BigFloat(v) => write!(f, "{v}"),
            Number::DecimalFloat(v) => write!(f, "{v}"),
            Number::BigDecimalFloat(v) => write!(f, "{v}"),
        }
    }
}

/// Knobs that influence conversion; derived from the builder options.
#[derive(Clone, Copy, Debug)]
pub struct ConversionLimits {
    /// Largest base-10 exponent a float may carry when converted into a big int.
    pub max_big_int_exponent: i64,
    /// Allow rounding when the destination is a binary float.
    pub allow_lossy_float: bool,
    /// Significant bits kept when a decimal is rounded into a big float.
    pub big_float_precision: u32,
}

impl Default for ConversionLimits {
    fn default() -> Self {
        Self {
            max_big_int_exponent: 50,
            allow_lossy_float: false,
            big_float_precision: 128,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConversionFailure {
    /// Outside the destination's range.
    Overflow,
    /// Has a fractional part and the destination is an integer.
    Fractional,
    /// NaN or infinity into a representation that has none.
    NotFinite,
    /// Would need rounding.
    Lossy,
}

impl fmt::Display for ConversionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ConversionFailure::Overflow => "value out of range",
            ConversionFailure::Fractional => "value has a fractional part",
            ConversionFailure::NotFinite => "value is not finite",
            ConversionFailure::Lossy => "value cannot be represented exactly",
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConversionError {
    NotRepresentable {
        value: String,
        destination: NumericKind,
        failure: ConversionFailure,
    },
    ExponentTooLarge {
        value: String,
        destination: NumericKind,
        exponent: i64,
        max: i64,
    },
}

impl fmt::Display for ConversionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConversionError::NotRepresentable {
                value,
                destination,
                failure,
            } => write!(f, "cannot convert {value} to {destination}: {failure}"),
            ConversionError::ExponentTooLarge {
                value,
                destination,
                exponent,
                max,
            } => write!(
                f,
                "cannot convert {value} to {destination}: exponent {exponent} exceeds the limit of {max}"
            ),
        }
    }
}

impl std::error::Error for ConversionError {}

type ConversionResult<T> = std::result::Result<T, ConversionError>;

/// Convert `value` into the `destination` representation.
///
/// Fails unless the result equals the source exactly (see the module docs for the exceptions).
pub fn convert(
    value: &Number,
    destination: NumericKind,
    limits: &ConversionLimits,
) -> ConversionResult<Number> {
    if value.kind() == destination {
        return Ok(value.clone());
    }
    let converted = convert_unverified(value, destination, limits)?;
    if limits.allow_lossy_float && destination.is_binary_float() {
        return Ok(converted);
    }
    // Verification only needs to reproduce the source; its size is bounded by the source.
    let unbounded = ConversionLimits {
        max_big_int_exponent: i64::MAX,
        allow_lossy_float: false,
        big_float_precision: limits.big_float_precision,
    };
    match convert_unverified(&converted, value.kind(), &unbounded) {
        Ok(back) if back.same_as(value) => Ok(converted),
        _ => Err(not_representable(value, destination, ConversionFailure::Lossy)),
    }
}

fn not_representable(
    value: &Number,
    destination: NumericKind,
    failure: ConversionFailure,
) -> ConversionError {
    ConversionError::NotRepresentable {
        value: value.to_string(),
        destination,
        failure,
    }
}

fn exponent_too_large(
    value: &Number,
    destination: NumericKind,
    exponent: i64,
    max: i64,
) -> ConversionError {
    ConversionError::ExponentTooLarge {
        value: value.to_string(),
        destination,
        exponent,
        max,
    }
}

fn convert_unverified(
    value: &Number,
    destination: NumericKind,
    limits: &ConversionLimits,
) -> ConversionResult<Number> {
    match destination {
        NumericKind::Int(width) => {
            let v = to_big_int(value, destination, limits)?;
            v.to_i64()
                .filter(|v| width.contains(*v))
                .map(Number::Int)
                .ok_or_else(|| not_representable(value, destination, ConversionFailure::Overflow))
        }
        NumericKind::Uint(width) => {
            let v = to_big_int(value, destination, limits)?;
            v.to_u64()
                .filter(|v| width.contains(*v))
                .map(Number::Uint)
                .ok_or_else(|| not_representable(value, destination, ConversionFailure::Overflow))
        }
        NumericKind::Float(width) => {
            let f = to_f64(value, destination)?;
            if f.is_infinite() && value.is_finite() {
                return Err(not_representable(value, destination, ConversionFailure::Overflow));
            }
            match width {
                FloatWidth::F64 => Ok(Number::Float(f)),
                FloatWidth::F32 => narrow_to_f32(value, f, destination, limits),
            }
        }
        NumericKind::BigInt => to_big_int(value, destination, limits).map(Number::BigInt),
        NumericKind::BigFloat => to_big_float(value, destination, limits).map(Number::BigFloat),
        NumericKind::DecimalFloat => to_decimal_float(value, destination).map(Number::DecimalFloat),
        NumericKind::BigDecimalFloat => {
            to_big_decimal(value, destination).map(Number::BigDecimalFloat)
        }
    }
}

fn narrow_to_f32(
    value: &Number,
    f: f64,
    destination: NumericKind,
    limits: &ConversionLimits,
) -> ConversionResult<Number> {
    if f.is_nan() {
        // NaN flavour survives as far as the platform lets it; keep the f64 bits.
        return Ok(Number::Float(f));
    }
    let narrowed = f as f32;
    if narrowed.is_infinite() && f.is_finite() {
        return Err(not_representable(value, destination, ConversionFailure::Overflow));
    }
    let widened = f64::from(narrowed);
    if widened != f && !limits.allow_lossy_float {
        return Err(not_representable(value, destination, ConversionFailure::Lossy));
    }
    Ok(Number::Float(widened))
}

/// Remove trailing decimal zeros, moving them into the exponent.
fn strip_decimal_zeros(mut digits: BigInt, mut exponent: i64) -> (BigInt, i64) {
    if digits.is_zero() {
        return (digits, 0);
    }
    let ten = BigInt::from(10u32);
    loop {
        let (quotient, remainder) = (&digits / &ten, &digits % &ten);
        if !remainder.is_zero() {
            return (digits, exponent);
        }
        digits = quotient;
        exponent += 1;
    }
}

fn pow(base: u32, exponent: u64) -> BigInt {
    num_traits::pow::pow(BigInt::from(base), exponent as usize)
}

fn big_decimal_parts(v: &BigDecimal) -> (BigInt, i64) {
    let (digits, scale) = v.as_bigint_and_exponent();
    (digits, -scale)
}

fn to_big_int(
    value: &Number,
    destination: NumericKind,
    limits: &ConversionLimits,
) -> ConversionResult<BigInt> {
    match value {
        Number::Int(v) => Ok(BigInt::from(*v)),
        Number::Uint(v) => Ok(BigInt::from(*v)),
        Number::BigInt(v) => Ok(v.clone()),
        Number::Float(f) => {
            if !f.is_finite() {
                return Err(not_representable(value, destination, ConversionFailure::NotFinite));
            }
            if f.fract() != 0.0 {
                return Err(not_representable(value, destination, ConversionFailure::Fractional));
            }
            if let Some((_, exponent)) = DecimalFloat::from_f64(*f).parts() {
                let exponent = i64::from(exponent);
                if exponent > limits.max_big_int_exponent {
                    return Err(exponent_too_large(
                        value,
                        destination,
                        exponent,
                        limits.max_big_int_exponent,
                    ));
                }
            }
            BigInt::from_f64(*f)
                .ok_or_else(|| not_representable(value, destination, ConversionFailure::NotFinite))
        }
        Number::BigFloat(v) => {
            if !v.is_integer() {
                return Err(not_representable(value, destination, ConversionFailure::Fractional));
            }
            let exponent = v.decimal_exponent();
            if exponent > limits.max_big_int_exponent {
                return Err(exponent_too_large(
                    value,
                    destination,
                    exponent,
                    limits.max_big_int_exponent,
                ));
            }
            Ok(v.mantissa() << (v.exponent() as u64))
        }
        Number::DecimalFloat(v) => match v.parts() {
            Some((significand, exponent)) => decimal_to_big_int(
                BigInt::from(significand),
                i64::from(exponent),
                value,
                destination,
                limits,
            ),
            None => Err(not_representable(value, destination, ConversionFailure::NotFinite)),
        },
        Number::BigDecimalFloat(v) => {
            let (digits, exponent) = big_decimal_parts(v);
            decimal_to_big_int(digits, exponent, value, destination, limits)
        }
    }
}

fn decimal_to_big_int(
    digits: BigInt,
    exponent: i64,
    value: &Number,
    destination: NumericKind,
    limits: &ConversionLimits,
) -> ConversionResult<BigInt> {
    let (digits, exponent) = strip_decimal_zeros(digits, exponent);
    if digits.is_zero() {
        return Ok(digits);
    }
    if exponent < 0 {
        return Err(not_representable(value, destination, ConversionFailure::Fractional));
    }
    if exponent > limits.max_big_int_exponent || exponent > i64::from(u32::MAX) {
        return Err(exponent_too_large(
            value,
            destination,
            exponent,
            limits.max_big_int_exponent,
        ));
    }
    Ok(digits * pow(10, exponent as u64))
}

fn to_f64(value: &Number, destination: NumericKind) -> ConversionResult<f64> {
    match value {
        Number::Int(v) => Ok(*v as f64),
        Number::Uint(v) => Ok(*v as f64),
        Number::Float(f) => Ok(*f),
        Number::BigInt(v) => v
            .to_f64()
            .ok_or_else(|| not_representable(value, destination, ConversionFailure::Overflow)),
        Number::BigFloat(v) => Ok(v.to_f64()),
        Number::DecimalFloat(v) => Ok(match *v {
            DecimalFloat::Finite {
                significand,
                exponent,
            } => parse_scientific(&BigInt::from(significand), i64::from(exponent)),
            DecimalFloat::NegativeZero => -0.0,
            DecimalFloat::Infinity => f64::INFINITY,
            DecimalFloat::NegativeInfinity => f64::NEG_INFINITY,
            DecimalFloat::NaN => f64::NAN,
            DecimalFloat::SignalingNaN => signaling_nan(),
        }),
        Number::BigDecimalFloat(v) => {
            let (digits, exponent) = big_decimal_parts(v);
            Ok(parse_scientific(&digits, exponent))
        }
    }
}

/// Correctly rounded `digits * 10^exponent` via the standard library's float parser.
fn parse_scientific(digits: &BigInt, exponent: i64) -> f64 {
    let text = format!("{digits}e{exponent}");
    text.parse::<f64>().unwrap_or(f64::NAN)
}

fn to_big_float(
    value: &Number,
    destination: NumericKind,
    limits: &ConversionLimits,
) -> ConversionResult<BigFloat> {
    match value {
        Number::Int(v) => Ok(BigFloat::from_big_int(BigInt::from(*v))),
        Number::Uint(v) => Ok(BigFloat::from_big_int(BigInt::from(*v))),
        Number::BigInt(v) => Ok(BigFloat::from_big_int(v.clone())),
        Number::Float(f) => BigFloat::from_f64(*f)
            .ok_or_else(|| not_representable(value, destination, ConversionFailure::NotFinite)),
        Number::BigFloat(v) => Ok(v.clone()),
        Number::DecimalFloat(v) => match v.parts() {
            Some((significand, exponent)) => decimal_to_big_float(
                BigInt::from(significand),
                i64::from(exponent),
                value,
                destination,
                limits,
            ),
            None => Err(not_representable(value, destination, ConversionFailure::NotFinite)),
        },
        Number::BigDecimalFloat(v) => {
            let (digits, exponent) = big_decimal_parts(v);
            decimal_to_big_float(digits, exponent, value, destination, limits)
        }
    }
}

fn decimal_to_big_float(
    digits: BigInt,
    exponent: i64,
    value: &Number,
    destination: NumericKind,
    limits: &ConversionLimits,
) -> ConversionResult<BigFloat> {
    let (digits, exponent) = strip_decimal_zeros(digits, exponent);
    if digits.is_zero() {
        return Ok(BigFloat::zero());
    }
    if exponent.abs() > MAX_DECIMAL_TO_BINARY_EXPONENT {
        return Err(exponent_too_large(
            value,
            destination,
            exponent,
            MAX_DECIMAL_TO_BINARY_EXPONENT,
        ));
    }
    if exponent >= 0 {
        return Ok(BigFloat::from_big_int(digits * pow(10, exponent as u64)));
    }
    // digits / 10^k == (digits / 5^k) * 2^-k, exact iff 5^k divides digits.
    let k = exponent.unsigned_abs();
    let five_k = pow(5, k);
    if (&digits % &five_k).is_zero() {
        return Ok(BigFloat::new(digits / five_k, exponent));
    }
    if !limits.allow_lossy_float {
        return Err(not_representable(value, destination, ConversionFailure::Lossy));
    }
    let ten_k = pow(10, k);
    let shift = (i64::from(limits.big_float_precision) + ten_k.bits() as i64
        - digits.bits() as i64
        + 1)
    .max(0);
    let quotient = (digits << (shift as u64)) / ten_k;
    Ok(BigFloat::new(quotient, -shift))
}

fn to_decimal_float(value: &Number, destination: NumericKind) -> ConversionResult<DecimalFloat> {
    match value {
        Number::Int(v) => Ok(DecimalFloat::new(*v, 0)),
        Number::Uint(v) => compact_decimal(BigInt::from(*v), 0, value, destination),
        Number::Float(f) => Ok(DecimalFloat::from_f64(*f)),
        Number::BigInt(v) => compact_decimal(v.clone(), 0, value, destination),
        Number::BigFloat(v) => {
            let (digits, exponent) = big_float_to_decimal_parts(v, value, destination)?;
            compact_decimal(digits, exponent, value, destination)
        }
        Number::DecimalFloat(v) => Ok(*v),
        Number::BigDecimalFloat(v) => {
            let (digits, exponent) = big_decimal_parts(v);
            compact_decimal(digits, exponent, value, destination)
        }
    }
}

fn compact_decimal(
    digits: BigInt,
    exponent: i64,
    value: &Number,
    destination: NumericKind,
) -> ConversionResult<DecimalFloat> {
    let (digits, exponent) = strip_decimal_zeros(digits, exponent);
    let significand = digits
        .to_i64()
        .ok_or_else(|| not_representable(value, destination, ConversionFailure::Overflow))?;
    let exponent = i32::try_from(exponent)
        .map_err(|_| not_representable(value, destination, ConversionFailure::Overflow))?;
    Ok(DecimalFloat::new(significand, exponent))
}

/// Exact decimal digits of a big float: `m * 2^-k == (m * 5^k) * 10^-k`.
fn big_float_to_decimal_parts(
    v: &BigFloat,
    value: &Number,
    destination: NumericKind,
) -> ConversionResult<(BigInt, i64)> {
    let exponent = v.exponent();
    if exponent.abs() > MAX_BINARY_TO_DECIMAL_EXPONENT {
        return Err(exponent_too_large(
            value,
            destination,
            exponent,
            MAX_BINARY_TO_DECIMAL_EXPONENT,
        ));
    }
    if exponent >= 0 {
        return Ok((v.mantissa() << (exponent as u64), 0));
    }
    Ok((v.mantissa() * pow(5, exponent.unsigned_abs()), exponent))
}

fn to_big_decimal(value: &Number, destination: NumericKind) -> ConversionResult<BigDecimal> {
    match value {
        Number::Int(v) => Ok(BigDecimal::from(*v)),
        Number::Uint(v) => Ok(BigDecimal::from(*v)),
        Number::BigInt(v) => Ok(BigDecimal::new(v.clone(), 0)),
        Number::Float(f) => {
            if !f.is_finite() {
                return Err(not_representable(value, destination, ConversionFailure::NotFinite));
            }
            let (significand, exponent) = DecimalFloat::from_f64(*f).parts().unwrap_or((0, 0));
            Ok(BigDecimal::new(BigInt::from(significand), -i64::from(exponent)))
        }
        Number::BigFloat(v) => {
            let (digits, exponent) = big_float_to_decimal_parts(v, value, destination)?;
            Ok(BigDecimal::new(digits, -exponent))
        }
        Number::DecimalFloat(v) => match v.parts() {
            Some((significand, exponent)) => {
                Ok(BigDecimal::new(BigInt::from(significand), -i64::from(exponent)))
            }
            None => Err(not_representable(value, destination, ConversionFailure::NotFinite)),
        },
        Number::BigDecimalFloat(v) => Ok(v.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn strict() -> ConversionLimits {
        ConversionLimits::default()
    }

    fn lossy() -> ConversionLimits {
        ConversionLimits {
            allow_lossy_float: true,
            ..ConversionLimits::default()
        }
    }

    fn big_decimal(s: &str) -> Number {
        Number::BigDecimalFloat(BigDecimal::from_str(s).unwrap())
    }

    #[test]
    fn identity_is_unchanged() {
        let n = Number::Float(1.5);
        assert_eq!(convert(&n, n.kind(), &strict()).unwrap(), n);
    }

    #[test]
    fn integers_checked_against_width() {
        let i32_kind = NumericKind::Int(IntWidth::I32);
        assert_eq!(
            convert(&Number::Int(-5), i32_kind, &strict()).unwrap(),
            Number::Int(-5)
        );
        let err = convert(&Number::Int(1 << 40), i32_kind, &strict()).unwrap_err();
        assert!(matches!(
            err,
            ConversionError::NotRepresentable {
                failure: ConversionFailure::Overflow,
                ..
            }
        ));
        let u8_kind = NumericKind::Uint(UintWidth::U8);
        assert!(convert(&Number::Int(-1), u8_kind, &strict()).is_err());
        assert_eq!(
            convert(&Number::Uint(255), u8_kind, &strict()).unwrap(),
            Number::Uint(255)
        );
        assert!(convert(&Number::Uint(u64::MAX), NumericKind::Int(IntWidth::I64), &strict()).is_err());
    }

    #[test]
    fn float_into_integer_requires_whole_number() {
        let kind = NumericKind::Int(IntWidth::I64);
        assert_eq!(convert(&Number::Float(42.0), kind, &strict()).unwrap(), Number::Int(42));
        let err = convert(&Number::Float(1.5), kind, &strict()).unwrap_err();
        assert!(matches!(
            err,
            ConversionError::NotRepresentable {
                failure: ConversionFailure::Fractional,
                ..
            }
        ));
        assert!(convert(&Number::Float(f64::NAN), kind, &strict()).is_err());
    }

    #[test]
    fn large_integer_into_f64_is_lossy() {
        let kind = NumericKind::Float(FloatWidth::F64);
        let exact = convert(&Number::Int(1 << 53), kind, &strict()).unwrap();
        assert_eq!(exact, Number::Float(9007199254740992.0));
        let err = convert(&Number::Int((1 << 53) + 1), kind, &strict()).unwrap_err();
        assert!(matches!(
            err,
            ConversionError::NotRepresentable {
                failure: ConversionFailure::Lossy,
                ..
            }
        ));
        assert!(convert(&Number::Int((1 << 53) + 1), kind, &lossy()).is_ok());
    }

    #[test]
    fn decimal_to_binary_float() {
        let kind = NumericKind::Float(FloatWidth::F64);
        let tenth = Number::DecimalFloat(DecimalFloat::new(1, -1));
        // The shortest decimal of 0.1f64 is 0.1, so the round trip is exact.
        assert_eq!(convert(&tenth, kind, &strict()).unwrap(), Number::Float(0.1));
        let long = big_decimal("0.10000000000000000000000001");
        assert!(convert(&long, kind, &strict()).is_err());
        assert_eq!(convert(&long, kind, &lossy()).unwrap(), Number::Float(0.1));
    }

    #[test]
    fn f32_narrowing() {
        let kind = NumericKind::Float(FloatWidth::F32);
        assert_eq!(convert(&Number::Float(0.5), kind, &strict()).unwrap(), Number::Float(0.5));
        assert!(convert(&Number::Float(0.1), kind, &strict()).is_err());
        assert_eq!(
            convert(&Number::Float(0.1), kind, &lossy()).unwrap(),
            Number::Float(f64::from(0.1f32))
        );
        let err = convert(&Number::Float(1e300), kind, &lossy()).unwrap_err();
        assert!(matches!(
            err,
            ConversionError::NotRepresentable {
                failure: ConversionFailure::Overflow,
                ..
            }
        ));
    }

    #[test]
    fn big_decimal_into_big_int_respects_exponent_limit() {
        let ok = convert(&big_decimal("1e40"), NumericKind::BigInt, &strict()).unwrap();
        assert_eq!(ok, Number::BigInt(num_traits::pow(BigInt::from(10), 40)));
        let err = convert(&big_decimal("1e60"), NumericKind::BigInt, &strict()).unwrap_err();
        assert!(matches!(
            err,
            ConversionError::ExponentTooLarge {
                exponent: 60,
                max: 50,
                ..
            }
        ));
        let raised = ConversionLimits {
            max_big_int_exponent: 100,
            ..strict()
        };
        assert!(convert(&big_decimal("1e60"), NumericKind::BigInt, &raised).is_ok());
        assert!(convert(&big_decimal("1.5"), NumericKind::BigInt, &strict()).is_err());
    }

    #[test]
    fn binary_float_into_big_int_respects_exponent_limit() {
        let err = convert(&Number::Float(1e60), NumericKind::BigInt, &strict()).unwrap_err();
        assert!(matches!(err, ConversionError::ExponentTooLarge { exponent: 60, .. }));
        assert!(convert(&Number::Float(1e20), NumericKind::BigInt, &strict()).is_ok());
    }

    #[test]
    fn trailing_zeros_do_not_count_as_fraction() {
        let n = big_decimal("12.000");
        assert_eq!(
            convert(&n, NumericKind::Int(IntWidth::I8), &strict()).unwrap(),
            Number::Int(12)
        );
    }

    #[test]
    fn big_float_to_big_int_exponent_is_scaled() {
        let big = Number::BigFloat(BigFloat::new(BigInt::from(1), 200));
        let err = convert(&big, NumericKind::BigInt, &strict()).unwrap_err();
        assert!(matches!(err, ConversionError::ExponentTooLarge { exponent: 61, .. }));
        let small = Number::BigFloat(BigFloat::new(BigInt::from(3), 4));
        assert_eq!(
            convert(&small, NumericKind::BigInt, &strict()).unwrap(),
            Number::BigInt(BigInt::from(48))
        );
    }

    #[test]
    fn decimal_into_big_float_exact_or_rounded() {
        let quarter = big_decimal("0.25");
        assert_eq!(
            convert(&quarter, NumericKind::BigFloat, &strict()).unwrap(),
            Number::BigFloat(BigFloat::new(BigInt::from(1), -2))
        );
        let tenth = big_decimal("0.1");
        assert!(convert(&tenth, NumericKind::BigFloat, &strict()).is_err());
        let Number::BigFloat(rounded) = convert(&tenth, NumericKind::BigFloat, &lossy()).unwrap()
        else {
            panic!("expected big float");
        };
        assert!(rounded.mantissa().bits() > 100);
        assert!((rounded.to_f64() - 0.1).abs() < 1e-17);
    }

    #[test]
    fn binary_into_decimal_is_exact() {
        let f = Number::Float(0.1);
        let Number::BigDecimalFloat(d) = convert(&f, NumericKind::BigDecimalFloat, &strict()).unwrap()
        else {
            panic!("expected big decimal");
        };
        assert_eq!(d, BigDecimal::from_str("0.1").unwrap());
        let b = Number::BigFloat(BigFloat::new(BigInt::from(3), -3));
        assert_eq!(
            convert(&b, NumericKind::DecimalFloat, &strict()).unwrap(),
            Number::DecimalFloat(DecimalFloat::new(375, -3))
        );
    }

    #[test]
    fn specials() {
        let kind = NumericKind::Float(FloatWidth::F64);
        let Number::Float(f) =
            convert(&Number::DecimalFloat(DecimalFloat::SignalingNaN), kind, &strict()).unwrap()
        else {
            panic!("expected float");
        };
        assert!(is_signaling_nan(f));
        assert_eq!(
            convert(&Number::Float(f64::NEG_INFINITY), NumericKind::DecimalFloat, &strict()).unwrap(),
            Number::DecimalFloat(DecimalFloat::NegativeInfinity)
        );
        assert!(convert(&Number::Float(f64::INFINITY), NumericKind::BigDecimalFloat, &strict()).is_err());
        assert!(convert(&Number::Float(f64::NAN), NumericKind::BigFloat, &strict()).is_err());
    }

    #[test]
    fn decimal_overflowing_f64_is_an_error_even_when_lossy() {
        let huge = big_decimal("1e400");
        assert!(convert(&huge, NumericKind::Float(FloatWidth::F64), &lossy()).is_err());
    }

    #[test]
    fn error_messages() {
        let err = convert(&Number::Int(300), NumericKind::Uint(UintWidth::U8), &strict()).unwrap_err();
        assert_eq!(err.to_string(), "cannot convert 300 to u8: value out of range");
    }
}
