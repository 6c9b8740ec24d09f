//! Shortest round-trip decimal form of a finite binary float, split into sign, digits and exponent.

use zmij::Float;

/// Signaling NaN with the quiet bit cleared and a non-zero payload.
pub(crate) const SIGNALING_NAN_BITS: u64 = 0x7FF4_0000_0000_0000;

const QUIET_BIT: u64 = 1 << 51;

pub(crate) fn signaling_nan() -> f64 {
    f64::from_bits(SIGNALING_NAN_BITS)
}

pub(crate) fn is_signaling_nan(f: f64) -> bool {
    f.is_nan() && f.to_bits() & QUIET_BIT == 0
}

/// Decompose a finite float into `(negative, digits, exponent)` so that
/// `value == (-1)^negative * digits * 10^exponent`, using the shortest digit string
/// that reads back to the same float.
pub(crate) fn shortest_decimal<F: Float>(f: F) -> (bool, u64, i32) {
    let mut buf = zmij::Buffer::new();
    // Callers filter out NaN and infinities.
    let s = buf.format_finite(f);
    split_decimal_literal(s)
}

fn split_decimal_literal(s: &str) -> (bool, u64, i32) {
    let (negative, rest) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s),
    };
    let (mantissa, mut exponent) = match rest.find(['e', 'E']) {
        Some(pos) => (&rest[..pos], rest[pos + 1..].parse::<i32>().unwrap_or(0)),
        None => (rest, 0),
    };

    let mut digits: u64 = 0;
    let mut pending_zeros: i32 = 0;
    let mut after_point = false;
    for b in mantissa.bytes() {
        match b {
            b'.' => after_point = true,
            b'0'..=b'9' => {
                if b == b'0' {
                    pending_zeros += 1;
                } else {
                    for _ in 0..pending_zeros {
                        digits = digits.saturating_mul(10);
                    }
                    pending_zeros = 0;
                    digits = digits.saturating_mul(10).saturating_add(u64::from(b - b'0'));
                }
                if after_point {
                    exponent -= 1;
                }
            }
            _ => {}
        }
    }
    // Trailing zeros were never multiplied in.
    (negative, digits, exponent + pending_zeros)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_plain_and_exponent_forms() {
        assert_eq!(split_decimal_literal("1.5"), (false, 15, -1));
        assert_eq!(split_decimal_literal("-0.001"), (true, 1, -3));
        assert_eq!(split_decimal_literal("4e-6"), (false, 4, -6));
        assert_eq!(split_decimal_literal("1.25e10"), (false, 125, 8));
        assert_eq!(split_decimal_literal("1200"), (false, 12, 2));
        assert_eq!(split_decimal_literal("100.0"), (false, 1, 2));
    }

    #[test]
    fn shortest_decimal_of_common_values() {
        assert_eq!(shortest_decimal(0.1f64), (false, 1, -1));
        assert_eq!(shortest_decimal(-2.5f64), (true, 25, -1));
        assert_eq!(shortest_decimal(1e300f64), (false, 1, 300));
    }

    #[test]
    fn signaling_nan_detection() {
        assert!(is_signaling_nan(signaling_nan()));
        assert!(!is_signaling_nan(f64::NAN));
        assert!(!is_signaling_nan(1.0));
    }
}
