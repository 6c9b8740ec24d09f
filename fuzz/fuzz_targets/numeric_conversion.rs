#![no_main]

use concise_builder::{
    convert, ConversionLimits, FloatWidth, IntWidth, Number, NumericKind, UintWidth,
};
use libfuzzer_sys::fuzz_target;

const DESTINATIONS: [NumericKind; 9] = [
    NumericKind::Int(IntWidth::I8),
    NumericKind::Int(IntWidth::I64),
    NumericKind::Uint(UintWidth::U16),
    NumericKind::Uint(UintWidth::U64),
    NumericKind::Float(FloatWidth::F32),
    NumericKind::Float(FloatWidth::F64),
    NumericKind::BigInt,
    NumericKind::DecimalFloat,
    NumericKind::BigDecimalFloat,
];

// A conversion that succeeds must be reversible: converting the result back to the source
// representation gives a number equal to the source.
fuzz_target!(|data: &[u8]| {
    let Some((selector, rest)) = data.split_first() else {
        return;
    };
    let Ok(raw) = <[u8; 8]>::try_from(rest.get(..8).unwrap_or(&[])) else {
        return;
    };
    let source = match selector % 3 {
        0 => Number::Int(i64::from_le_bytes(raw)),
        1 => Number::Uint(u64::from_le_bytes(raw)),
        _ => Number::Float(f64::from_le_bytes(raw)),
    };
    if matches!(source, Number::Float(f) if f.is_nan()) {
        return;
    }
    let limits = ConversionLimits::default();
    let destination = DESTINATIONS[usize::from(selector / 3) % DESTINATIONS.len()];
    if let Ok(converted) = convert(&source, destination, &limits) {
        let back = convert(&converted, source.kind(), &limits);
        assert!(back.is_ok(), "{source:?} -> {converted:?} does not convert back");
    }
});
