//! Decoding typed array payloads into elements.

use uuid::Uuid;

use crate::error::{Error, Result};
use crate::events::ArrayKind;

#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) enum ArrayElement {
    Bool(bool),
    Int(i64),
    Uint(u64),
    Float(f64),
    Uid(Uuid),
}

/// Check that `data` is exactly the payload of `element_count` elements of `kind`.
pub(crate) fn check_payload_length(kind: ArrayKind, element_count: u64, data: &[u8]) -> Result<()> {
    let expected = kind.byte_length(element_count).ok_or_else(|| {
        Error::array_payload(format!("{element_count} elements of {} overflow", kind.name()))
    })?;
    if data.len() as u64 != expected {
        return Err(Error::array_payload(format!(
            "{} of {element_count} elements needs {expected} bytes, got {}",
            kind.name(),
            data.len()
        )));
    }
    Ok(())
}

fn fixed<const N: usize>(chunk: &[u8]) -> Result<[u8; N]> {
    <[u8; N]>::try_from(chunk)
        .map_err(|_| Error::array_payload(format!("truncated {N}-byte element")))
}

/// Split a numeric, bit or uid array payload into elements.
pub(crate) fn decode_elements(kind: ArrayKind, element_count: u64, data: &[u8]) -> Result<Vec<ArrayElement>> {
    check_payload_length(kind, element_count, data)?;
    let elements = match kind {
        ArrayKind::Bit => (0..element_count as usize)
            .map(|i| ArrayElement::Bool((data[i / 8] >> (i % 8)) & 1 == 1))
            .collect(),
        ArrayKind::Uint8 => data.iter().map(|b| ArrayElement::Uint(u64::from(*b))).collect(),
        ArrayKind::Int8 => data
            .iter()
            .map(|b| ArrayElement::Int(i64::from(*b as i8)))
            .collect(),
        ArrayKind::Uint16 => data
            .chunks_exact(2)
            .map(|c| Ok(ArrayElement::Uint(u64::from(u16::from_le_bytes(fixed(c)?)))))
            .collect::<Result<_>>()?,
        ArrayKind::Uint32 => data
            .chunks_exact(4)
            .map(|c| Ok(ArrayElement::Uint(u64::from(u32::from_le_bytes(fixed(c)?)))))
            .collect::<Result<_>>()?,
        ArrayKind::Uint64 => data
            .chunks_exact(8)
            .map(|c| Ok(ArrayElement::Uint(u64::from_le_bytes(fixed(c)?))))
            .collect::<Result<_>>()?,
        ArrayKind::Int16 => data
            .chunks_exact(2)
            .map(|c| Ok(ArrayElement::Int(i64::from(i16::from_le_bytes(fixed(c)?)))))
            .collect::<Result<_>>()?,
        ArrayKind::Int32 => data
            .chunks_exact(4)
            .map(|c| Ok(ArrayElement::Int(i64::from(i32::from_le_bytes(fixed(c)?)))))
            .collect::<Result<_>>()?,
        ArrayKind::Int64 => data
            .chunks_exact(8)
            .map(|c| Ok(ArrayElement::Int(i64::from_le_bytes(fixed(c)?))))
            .collect::<Result<_>>()?,
        ArrayKind::Float16 => data
            .chunks_exact(2)
            .map(|c| {
                let upper = u32::from(u16::from_le_bytes(fixed(c)?));
                Ok(ArrayElement::Float(f64::from(f32::from_bits(upper << 16))))
            })
            .collect::<Result<_>>()?,
        ArrayKind::Float32 => data
            .chunks_exact(4)
            .map(|c| Ok(ArrayElement::Float(f64::from(f32::from_le_bytes(fixed(c)?)))))
            .collect::<Result<_>>()?,
        ArrayKind::Float64 => data
            .chunks_exact(8)
            .map(|c| Ok(ArrayElement::Float(f64::from_le_bytes(fixed(c)?))))
            .collect::<Result<_>>()?,
        ArrayKind::Uid => data
            .chunks_exact(16)
            .map(|c| Ok(ArrayElement::Uid(Uuid::from_bytes(fixed(c)?))))
            .collect::<Result<_>>()?,
        ArrayKind::String
        | ArrayKind::ResourceId
        | ArrayKind::RemoteReference
        | ArrayKind::CustomText
        | ArrayKind::CustomBinary => {
            return Err(Error::array_payload(format!(
                "{} has no element structure",
                kind.name()
            )));
        }
    };
    Ok(elements)
}
