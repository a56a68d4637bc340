//! Image payload decoding shared by the network backends.

use image::DynamicImage;

use super::BackendError;
use crate::codec::SampleType;

fn push_band<T: Copy>(
    samples: &[T],
    stride: usize,
    channel: usize,
    out: &mut Vec<u8>,
    encode: impl Fn(T, &mut Vec<u8>),
) {
    for pixel in samples.chunks_exact(stride) {
        encode(pixel[channel], out);
    }
}

/// Decodes an encoded image into band-sequential little-endian samples.
///
/// # Arguments
///
/// * `bytes` - Encoded payload (PNG, JPEG, TIFF, ...)
/// * `sample_type` - Sample type the dataset declares
/// * `band_count` - Bands the dataset declares
/// * `columns`, `rows` - Expected image size
/// * `bands` - Bands to emit, in order
///
/// # Errors
///
/// An undecodable payload or a wrong image size is a transient read error,
/// since servers occasionally return error pages or truncated bodies. An
/// unsupported sample type or band layout is structural.
pub(crate) fn decode_image(
    bytes: &[u8],
    sample_type: SampleType,
    band_count: usize,
    columns: usize,
    rows: usize,
    bands: &[usize],
) -> Result<Vec<u8>, BackendError> {
    let img = image::load_from_memory(bytes)
        .map_err(|e| BackendError::Read(format!("cannot decode image: {}", e)))?;

    if img.width() as usize != columns || img.height() as usize != rows {
        return Err(BackendError::Read(format!(
            "image is {}x{}, requested {}x{}",
            img.width(),
            img.height(),
            columns,
            rows
        )));
    }

    if let Some(band) = bands.iter().find(|b| **b >= band_count) {
        return Err(BackendError::Structure(format!(
            "band {} does not exist ({} bands)",
            band, band_count
        )));
    }

    let mut out = Vec::with_capacity(columns * rows * bands.len() * sample_type.byte_width());
    match (sample_type, band_count) {
        (SampleType::Byte, 1 | 3 | 4) => {
            let samples = byte_samples(&img, band_count);
            for &band in bands {
                push_band(&samples, band_count, band, &mut out, |v, o| o.push(v));
            }
        }
        (SampleType::UInt16, 1 | 3 | 4) => {
            let samples = u16_samples(&img, band_count);
            for &band in bands {
                push_band(&samples, band_count, band, &mut out, |v, o| {
                    o.extend_from_slice(&v.to_le_bytes())
                });
            }
        }
        (SampleType::Float32, 1 | 3 | 4) => {
            let (samples, stride) = if band_count == 4 {
                (img.to_rgba32f().into_raw(), 4)
            } else {
                (img.to_rgb32f().into_raw(), 3)
            };
            for &band in bands {
                push_band(&samples, stride, band, &mut out, |v, o| {
                    o.extend_from_slice(&v.to_le_bytes())
                });
            }
        }
        (other, count) => {
            return Err(BackendError::Structure(format!(
                "cannot decode {} band(s) of {} from an image payload",
                count, other
            )));
        }
    }
    Ok(out)
}

fn byte_samples(img: &DynamicImage, band_count: usize) -> Vec<u8> {
    match band_count {
        1 => img.to_luma8().into_raw(),
        3 => img.to_rgb8().into_raw(),
        _ => img.to_rgba8().into_raw(),
    }
}

fn u16_samples(img: &DynamicImage, band_count: usize) -> Vec<u16> {
    match band_count {
        1 => img.to_luma16().into_raw(),
        3 => img.to_rgb16().into_raw(),
        _ => img.to_rgba16().into_raw(),
    }
}

/// Encodes an RGB image as PNG. Used to build test payloads.
#[cfg(test)]
pub(crate) fn png_rgb(width: u32, height: u32, f: impl Fn(u32, u32) -> [u8; 3]) -> Vec<u8> {
    let img = image::RgbImage::from_fn(width, height, |x, y| image::Rgb(f(x, y)));
    let mut bytes = std::io::Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(img)
        .write_to(&mut bytes, image::ImageFormat::Png)
        .unwrap();
    bytes.into_inner()
}

/// Encodes a 16-bit grayscale image as PNG. Used to build test payloads.
#[cfg(test)]
pub(crate) fn png_luma16(width: u32, height: u32, f: impl Fn(u32, u32) -> u16) -> Vec<u8> {
    let img = image::ImageBuffer::<image::Luma<u16>, Vec<u16>>::from_fn(width, height, |x, y| {
        image::Luma([f(x, y)])
    });
    let mut bytes = std::io::Cursor::new(Vec::new());
    DynamicImage::ImageLuma16(img)
        .write_to(&mut bytes, image::ImageFormat::Png)
        .unwrap();
    bytes.into_inner()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rgb_to_band_sequential() {
        let png = png_rgb(2, 1, |x, _| [x as u8, 10 + x as u8, 20 + x as u8]);
        let out = decode_image(&png, SampleType::Byte, 3, 2, 1, &[0, 1, 2]).unwrap();
        assert_eq!(out, vec![0, 1, 10, 11, 20, 21]);
    }

    #[test]
    fn test_band_subset() {
        let png = png_rgb(2, 1, |x, _| [x as u8, 10 + x as u8, 20 + x as u8]);
        let out = decode_image(&png, SampleType::Byte, 3, 2, 1, &[2]).unwrap();
        assert_eq!(out, vec![20, 21]);
    }

    #[test]
    fn test_luma16() {
        let png = png_luma16(2, 2, |x, y| (y * 1000 + x) as u16);
        let out = decode_image(&png, SampleType::UInt16, 1, 2, 2, &[0]).unwrap();
        assert_eq!(&out[..2], &0u16.to_le_bytes());
        assert_eq!(&out[6..8], &1001u16.to_le_bytes());
    }

    #[test]
    fn test_wrong_size_is_transient() {
        let png = png_rgb(2, 2, |_, _| [0, 0, 0]);
        let err = decode_image(&png, SampleType::Byte, 3, 4, 4, &[0]).unwrap_err();
        assert!(err.is_transient());
    }

    #[test]
    fn test_garbage_is_transient() {
        let err = decode_image(b"<html>busy</html>", SampleType::Byte, 3, 1, 1, &[0]).unwrap_err();
        assert!(err.is_transient());
    }

    #[test]
    fn test_unsupported_layout_is_structural() {
        let png = png_rgb(1, 1, |_, _| [0, 0, 0]);
        let err = decode_image(&png, SampleType::Float64, 1, 1, 1, &[0]).unwrap_err();
        assert!(!err.is_transient());
    }
}
