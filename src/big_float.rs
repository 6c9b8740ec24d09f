//! Arbitrary-precision binary floating point: `mantissa * 2^exponent`.

use std::fmt;

use num_bigint::BigInt;
use num_traits::{Signed, ToPrimitive, Zero};

/// An arbitrary-precision binary float.
///
/// The representation is kept normalized: the mantissa is odd (trailing zero bits are moved
/// into the exponent), and zero is always `0 * 2^0`. Two equal values therefore have equal
/// fields and the derived `PartialEq`/`Hash` are numeric.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct BigFloat {
    mantissa: BigInt,
    exponent: i64,
}

impl BigFloat {
    pub fn new(mantissa: BigInt, exponent: i64) -> Self {
        if mantissa.is_zero() {
            return Self::zero();
        }
        let shift = mantissa.trailing_zeros().unwrap_or(0);
        if shift == 0 {
            return Self { mantissa, exponent };
        }
        Self {
            mantissa: mantissa >> shift,
            exponent: exponent.saturating_add(shift as i64),
        }
    }

    pub fn zero() -> Self {
        Self {
            mantissa: BigInt::zero(),
            exponent: 0,
        }
    }

    pub fn from_big_int(value: BigInt) -> Self {
        Self::new(value, 0)
    }

    /// Exact value of a finite `f64`. Returns `None` for NaN and infinities.
    ///
    /// Negative zero becomes zero.
    pub fn from_f64(f: f64) -> Option<Self> {
        if !f.is_finite() {
            return None;
        }
        if f == 0.0 {
            return Some(Self::zero());
        }
        let (mantissa, exponent, sign) = num_traits::float::FloatCore::integer_decode(f);
        let mut mantissa = BigInt::from(mantissa);
        if sign < 0 {
            mantissa = -mantissa;
        }
        Some(Self::new(mantissa, i64::from(exponent)))
    }

    pub fn mantissa(&self) -> &BigInt {
        &self.mantissa
    }

    pub fn exponent(&self) -> i64 {
        self.exponent
    }

    pub fn is_zero(&self) -> bool {
        self.mantissa.is_zero()
    }

    pub fn is_negative(&self) -> bool {
        self.mantissa.is_negative()
    }

    /// True when the value has no fractional part.
    pub fn is_integer(&self) -> bool {
        self.exponent >= 0
    }

    /// Nearest `f64` (saturating to infinity, flushing to zero).
    pub fn to_f64(&self) -> f64 {
        if self.is_zero() {
            return 0.0;
        }
        let bits = self.mantissa.bits();
        let (mantissa, exponent) = if bits > 64 {
            let excess = bits - 64;
            (
                &self.mantissa >> excess,
                self.exponent.saturating_add(excess as i64),
            )
        } else {
            (self.mantissa.clone(), self.exponent)
        };
        let m = mantissa.to_f64().unwrap_or(f64::NAN);
        scale_by_power_of_two(m, exponent)
    }

    /// Base-10 order of magnitude of `2^exponent`, rounded away from zero.
    pub(crate) fn decimal_exponent(&self) -> i64 {
        let scaled = self.exponent as f64 * std::f64::consts::LOG10_2;
        if scaled >= 0.0 {
            scaled.ceil() as i64
        } else {
            scaled.floor() as i64
        }
    }
}

fn scale_by_power_of_two(mut value: f64, mut exponent: i64) -> f64 {
    const STEP: i64 = 1000;
    while exponent > STEP {
        value *= 2f64.powi(STEP as i32);
        exponent -= STEP;
        if value.is_infinite() {
            return value;
        }
    }
    while exponent < -STEP {
        value *= 2f64.powi(-STEP as i32);
        exponent += STEP;
        if value == 0.0 {
            return value;
        }
    }
    value * 2f64.powi(exponent as i32)
}

impl Default for BigFloat {
    fn default() -> Self {
        Self::zero()
    }
}

impl fmt::Display for BigFloat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.exponent == 0 {
            write!(f, "{}", self.mantissa)
        } else {
            write!(f, "{}p{}", self.mantissa, self.exponent)
        }
    }
}

impl From<BigInt> for BigFloat {
    fn from(value: BigInt) -> Self {
        Self::from_big_int(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_trailing_zero_bits() {
        let v = BigFloat::new(BigInt::from(12), 0);
        assert_eq!(v.mantissa(), &BigInt::from(3));
        assert_eq!(v.exponent(), 2);
        assert_eq!(v, BigFloat::new(BigInt::from(3), 2));
        assert_eq!(BigFloat::new(BigInt::zero(), 17), BigFloat::zero());
    }

    #[test]
    fn exact_from_f64() {
        let half = BigFloat::from_f64(0.5).unwrap();
        assert_eq!(half, BigFloat::new(BigInt::from(1), -1));
        let neg = BigFloat::from_f64(-6.0).unwrap();
        assert_eq!(neg, BigFloat::new(BigInt::from(-3), 1));
        assert!(BigFloat::from_f64(f64::NAN).is_none());
        assert!(BigFloat::from_f64(f64::INFINITY).is_none());
        assert_eq!(BigFloat::from_f64(-0.0).unwrap(), BigFloat::zero());
    }

    #[test]
    fn to_f64_round_trips() {
        for f in [0.1, -123.456, 1e300, 5e-324, 2.0f64.powi(70)] {
            let v = BigFloat::from_f64(f).unwrap();
            assert_eq!(v.to_f64(), f);
        }
    }

    #[test]
    fn to_f64_with_wide_mantissa() {
        let wide = BigInt::from(1) << 200usize;
        let v = BigFloat::new(wide + 1, -200);
        assert_eq!(v.to_f64(), 1.0);
    }

    #[test]
    fn decimal_exponent_estimate() {
        assert_eq!(BigFloat::new(BigInt::from(1), 10).decimal_exponent(), 4);
        assert_eq!(BigFloat::new(BigInt::from(1), -10).decimal_exponent(), -4);
        assert_eq!(BigFloat::from_big_int(BigInt::from(7)).decimal_exponent(), 0);
    }

    #[test]
    fn display() {
        assert_eq!(BigFloat::from_big_int(BigInt::from(5)).to_string(), "5");
        assert_eq!(BigFloat::new(BigInt::from(3), -2).to_string(), "3p-2");
    }
}
