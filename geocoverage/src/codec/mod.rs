//! Typed value codec
//!
//! Maps raw sample bytes to [`TypedValue`]s and back, detects no-data
//! sentinels, and resolves palette indices. All multi-byte samples are
//! little-endian.

mod palette;
mod types;

pub use palette::{lookup_palette_entry, ColorEntry, Palette, PaletteKind};
pub use types::{SampleLayout, SampleType, Scalar, TypedValue};

fn read_component(bytes: &[u8], sample_type: SampleType) -> Scalar {
    match sample_type {
        SampleType::Byte => Scalar::U8(bytes[0]),
        SampleType::UInt16 => Scalar::U16(u16::from_le_bytes([bytes[0], bytes[1]])),
        SampleType::Int16 | SampleType::CInt16 => {
            Scalar::I16(i16::from_le_bytes([bytes[0], bytes[1]]))
        }
        SampleType::UInt32 => {
            Scalar::U32(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
        }
        SampleType::Int32 | SampleType::CInt32 => {
            Scalar::I32(i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
        }
        SampleType::Float32 | SampleType::CFloat32 => {
            Scalar::F32(f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
        }
        SampleType::Float64 | SampleType::CFloat64 => {
            let mut buf = [0u8; 8];
            buf.copy_from_slice(&bytes[..8]);
            Scalar::F64(f64::from_le_bytes(buf))
        }
    }
}

/// Decodes one interleaved sample.
///
/// `raw` must hold at least `layout.sample_bytes()` bytes; a shorter slice
/// decodes to `Null`. A single channel decodes to `Scalar`, several to
/// `Array` in band order (real before imaginary for complex kinds).
pub fn decode(raw: &[u8], layout: &SampleLayout) -> TypedValue {
    if layout.band_count == 0 || raw.len() < layout.sample_bytes() {
        return TypedValue::Null;
    }

    let width = layout.sample_type.component_width();
    let mut scalars = Vec::with_capacity(layout.channel_count());
    for chunk in raw[..layout.sample_bytes()].chunks_exact(width) {
        scalars.push(read_component(chunk, layout.sample_type));
    }

    if scalars.len() == 1 {
        TypedValue::Scalar(scalars[0])
    } else {
        TypedValue::Array(scalars)
    }
}

/// True when `raw` matches either sentinel byte-for-byte.
///
/// A match against the declared sentinel or the forced one means "no value".
pub fn is_no_data(raw: &[u8], declared: Option<&[u8]>, forced: Option<&[u8]>) -> bool {
    declared.is_some_and(|s| s == raw) || forced.is_some_and(|s| s == raw)
}

/// Encodes a floating-point value as one band value of `sample_type`.
///
/// Integer kinds saturate at their range. Complex kinds store the value in
/// both components.
pub fn encode_value(value: f64, sample_type: SampleType) -> Vec<u8> {
    let component: Vec<u8> = match sample_type {
        SampleType::Byte => vec![value as u8],
        SampleType::UInt16 => (value as u16).to_le_bytes().to_vec(),
        SampleType::Int16 | SampleType::CInt16 => (value as i16).to_le_bytes().to_vec(),
        SampleType::UInt32 => (value as u32).to_le_bytes().to_vec(),
        SampleType::Int32 | SampleType::CInt32 => (value as i32).to_le_bytes().to_vec(),
        SampleType::Float32 | SampleType::CFloat32 => (value as f32).to_le_bytes().to_vec(),
        SampleType::Float64 | SampleType::CFloat64 => value.to_le_bytes().to_vec(),
    };

    if sample_type.is_complex() {
        [component.clone(), component].concat()
    } else {
        component
    }
}

/// Builds the all-band sentinel for one value repeated across `band_count` bands.
pub fn encode_sentinel(value: f64, layout: &SampleLayout) -> Vec<u8> {
    let band = encode_value(value, layout.sample_type);
    band.repeat(layout.band_count)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_byte_widths() {
        let widths: Vec<usize> = [
            SampleType::Byte,
            SampleType::UInt16,
            SampleType::Int16,
            SampleType::UInt32,
            SampleType::Int32,
            SampleType::Float32,
            SampleType::Float64,
            SampleType::CInt16,
            SampleType::CInt32,
            SampleType::CFloat32,
            SampleType::CFloat64,
        ]
        .iter()
        .map(|t| t.byte_width())
        .collect();
        assert_eq!(widths, vec![1, 2, 2, 4, 4, 4, 8, 4, 8, 8, 16]);
    }

    #[test]
    fn test_decode_single_byte() {
        let layout = SampleLayout::new(SampleType::Byte, 1);
        assert_eq!(decode(&[42], &layout), TypedValue::Scalar(Scalar::U8(42)));
    }

    #[test]
    fn test_decode_rgb() {
        let layout = SampleLayout::new(SampleType::Byte, 3);
        let value = decode(&[1, 2, 3], &layout);
        assert_eq!(value.as_rgb(), Some((1, 2, 3)));
        assert_eq!(value.arity(), 3);
    }

    #[test]
    fn test_decode_int16_negative() {
        let layout = SampleLayout::new(SampleType::Int16, 1);
        let raw = (-432i16).to_le_bytes();
        assert_eq!(decode(&raw, &layout), TypedValue::Scalar(Scalar::I16(-432)));
    }

    #[test]
    fn test_decode_complex_has_two_channels() {
        let layout = SampleLayout::new(SampleType::CFloat32, 1);
        let raw = [1.5f32.to_le_bytes(), (-2.0f32).to_le_bytes()].concat();
        assert_eq!(
            decode(&raw, &layout),
            TypedValue::Array(vec![Scalar::F32(1.5), Scalar::F32(-2.0)])
        );
    }

    #[test]
    fn test_decode_short_buffer_is_null() {
        let layout = SampleLayout::new(SampleType::Float64, 1);
        assert!(decode(&[0, 1, 2], &layout).is_null());
    }

    #[test]
    fn test_no_data_precedence() {
        let declared = [0xFFu8];
        let forced = [0x00u8];
        assert!(is_no_data(&[0x00], Some(&declared), Some(&forced)));
        assert!(is_no_data(&[0xFF], Some(&declared), Some(&forced)));
        assert!(!is_no_data(&[0x01], Some(&declared), Some(&forced)));
        assert!(!is_no_data(&[0x00], None, None));
    }

    #[test]
    fn test_encode_sentinel_complex_stores_twice() {
        let layout = SampleLayout::new(SampleType::CInt16, 1);
        let bytes = encode_sentinel(-9999.0, &layout);
        assert_eq!(bytes.len(), 4);
        assert_eq!(&bytes[..2], &bytes[2..]);
    }

    #[test]
    fn test_encode_sentinel_multiband() {
        let layout = SampleLayout::new(SampleType::UInt16, 3);
        let bytes = encode_sentinel(65535.0, &layout);
        assert_eq!(bytes, vec![0xFF; 6]);
    }
}
