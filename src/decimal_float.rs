//! Compact decimal floating point: `significand * 10^exponent`, plus the IEEE-style specials.

use std::fmt;

use crate::float_format::{is_signaling_nan, shortest_decimal};

#[derive(Clone, Copy, Debug)]
pub enum DecimalFloat {
    /// `significand * 10^exponent`, normalized so the significand has no trailing zero digits.
    Finite { significand: i64, exponent: i32 },
    NegativeZero,
    Infinity,
    NegativeInfinity,
    NaN,
    SignalingNaN,
}

impl DecimalFloat {
    pub fn new(significand: i64, exponent: i32) -> Self {
        if significand == 0 {
            return Self::zero();
        }
        let (mut significand, mut exponent) = (significand, exponent);
        while significand % 10 == 0 && exponent < i32::MAX {
            significand /= 10;
            exponent += 1;
        }
        DecimalFloat::Finite {
            significand,
            exponent,
        }
    }

    pub const fn zero() -> Self {
        DecimalFloat::Finite {
            significand: 0,
            exponent: 0,
        }
    }

    /// Shortest decimal that reads back as `f`. Specials map to their decimal counterparts.
    pub fn from_f64(f: f64) -> Self {
        if f.is_nan() {
            return if is_signaling_nan(f) {
                DecimalFloat::SignalingNaN
            } else {
                DecimalFloat::NaN
            };
        }
        if f.is_infinite() {
            return if f > 0.0 {
                DecimalFloat::Infinity
            } else {
                DecimalFloat::NegativeInfinity
            };
        }
        if f == 0.0 {
            return if f.is_sign_negative() {
                DecimalFloat::NegativeZero
            } else {
                Self::zero()
            };
        }
        let (negative, digits, exponent) = shortest_decimal(f);
        // At most 17 significant digits, always fits.
        let magnitude = digits as i64;
        Self::new(if negative { -magnitude } else { magnitude }, exponent)
    }

    /// `(significand, exponent)` for finite values (negative zero included as `(0, 0)`).
    pub fn parts(&self) -> Option<(i64, i32)> {
        match *self {
            DecimalFloat::Finite {
                significand,
                exponent,
            } => Some((significand, exponent)),
            DecimalFloat::NegativeZero => Some((0, 0)),
            _ => None,
        }
    }

    pub fn is_finite(&self) -> bool {
        self.parts().is_some()
    }

    pub fn is_nan(&self) -> bool {
        matches!(self, DecimalFloat::NaN | DecimalFloat::SignalingNaN)
    }

    pub fn is_zero(&self) -> bool {
        matches!(self.parts(), Some((0, _)))
    }
}

impl Default for DecimalFloat {
    fn default() -> Self {
        Self::zero()
    }
}

/// Numeric comparison of finite values (negative zero equals zero); specials compare by kind.
impl PartialEq for DecimalFloat {
    fn eq(&self, other: &Self) -> bool {
        match (self.parts(), other.parts()) {
            (Some((a, ae)), Some((b, be))) => {
                let lhs = DecimalFloat::new(a, ae);
                let rhs = DecimalFloat::new(b, be);
                match (lhs, rhs) {
                    (
                        DecimalFloat::Finite {
                            significand: a,
                            exponent: ae,
                        },
                        DecimalFloat::Finite {
                            significand: b,
                            exponent: be,
                        },
                    ) => a == b && ae == be,
                    _ => false,
                }
            }
            (None, None) => std::mem::discriminant(self) == std::mem::discriminant(other),
            _ => false,
        }
    }
}

impl fmt::Display for DecimalFloat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecimalFloat::Finite {
                significand,
                exponent: 0,
            } => write!(f, "{significand}"),
            DecimalFloat::Finite {
                significand,
                exponent,
            } => write!(f, "{significand}e{exponent}"),
            DecimalFloat::NegativeZero => f.write_str("-0"),
            DecimalFloat::Infinity => f.write_str("inf"),
            DecimalFloat::NegativeInfinity => f.write_str("-inf"),
            DecimalFloat::NaN => f.write_str("nan"),
            DecimalFloat::SignalingNaN => f.write_str("snan"),
        }
    }
}
