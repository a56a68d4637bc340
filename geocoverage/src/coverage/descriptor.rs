//! Coverage descriptor derived once at open time.

use std::fmt;

use crate::backend::{Backend, ColorInterpretation, DatasetInfo};
use crate::codec::{
    decode, encode_sentinel, encode_value, is_no_data, lookup_palette_entry, Palette, SampleLayout,
    SampleType, Scalar, TypedValue,
};
use crate::coord::{
    native_to_lower_raster, Bounds, NativePoint, RasterCell, RasterRect, SpatialReference,
    StepSize,
};
use crate::error::CoverageError;

use super::CoverageConfig;

/// How sample values are to be read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueContext {
    /// Single elevation band.
    Elevation,
    /// Single band of palette indices.
    Clut,
    /// Single plain band.
    GreyScale,
    /// Three or four colour bands.
    Rgb,
}

impl fmt::Display for ValueContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueContext::Elevation => "elevation",
            ValueContext::Clut => "clut",
            ValueContext::GreyScale => "greyscale",
            ValueContext::Rgb => "rgb",
        };
        write!(f, "{}", name)
    }
}

/// Chooses which backend bands a coverage serves.
///
/// An empty request picks all bands of a 3- or 4-band dataset and band 0
/// otherwise. A 3- or 4-element request is taken as given; any other
/// request keeps only its first element.
pub fn select_bands(requested: &[usize], available: usize) -> Vec<usize> {
    match requested.len() {
        0 if available == 3 || available == 4 => (0..available).collect(),
        0 => vec![0],
        3 | 4 => requested.to_vec(),
        _ => vec![requested[0]],
    }
}

/// Everything known about a coverage once it is open.
#[derive(Debug, Clone, PartialEq)]
pub struct CoverageDescriptor {
    pub bounds: Bounds,
    pub step: StepSize,
    /// Data extent `(0, 0, width-1, height-1)`.
    pub raster: RasterRect,
    pub srs: SpatialReference,
    /// Backend band indices, in sample order.
    pub bands: Vec<usize>,
    pub layout: SampleLayout,
    pub context: ValueContext,
    pub palette: Option<Palette>,
    /// Declared sentinel across all selected bands.
    pub no_data: Option<Vec<u8>>,
    /// Configured sentinel across all selected bands.
    pub forced_no_data: Option<Vec<u8>>,
    pub wrap_x: bool,
}

impl CoverageDescriptor {
    /// Derives the descriptor from an opened dataset.
    ///
    /// # Errors
    ///
    /// * `DatasetStructure` for missing bands, bands of differing size or
    ///   sample type, or a band count no context accepts
    /// * `UnsupportedPalette` for a CMYK or HLS colour table
    pub fn build(
        info: &DatasetInfo,
        backend: &dyn Backend,
        config: &CoverageConfig,
    ) -> Result<Self, CoverageError> {
        if info.bands.is_empty() {
            return Err(CoverageError::DatasetStructure(format!(
                "{} has no bands",
                backend.name()
            )));
        }

        let bands = select_bands(&config.bands, info.bands.len());
        verify_bands(info, &bands)?;

        let first = &info.bands[bands[0]];
        let layout = SampleLayout::new(first.sample_type, bands.len());
        let (context, palette) = classify(info, &bands)?;

        let mut no_data = Vec::with_capacity(layout.sample_bytes());
        for band in &bands {
            match backend.no_data_value(*band) {
                Some(value) => no_data.extend(encode_value(value, layout.sample_type)),
                None => {
                    no_data.clear();
                    break;
                }
            }
        }
        let no_data = (!no_data.is_empty()).then_some(no_data);
        let forced_no_data = config.forced_no_data.map(|v| encode_sentinel(v, &layout));

        let srs = config.srs_override.clone().unwrap_or_else(|| info.srs.clone());
        let wrap_x = config.wrap_x.unwrap_or_else(|| {
            srs.is_geographic() && info.bounds.width() >= 360.0 - info.step.x.abs()
        });

        Ok(Self {
            bounds: info.bounds,
            step: info.step,
            raster: info.raster_rect(),
            srs,
            bands,
            layout,
            context,
            palette,
            no_data,
            forced_no_data,
            wrap_x,
        })
    }

    /// Raster cell containing `native`; may lie outside the data extent.
    pub fn native_to_cell(&self, native: NativePoint) -> RasterCell {
        native_to_lower_raster(&self.bounds, &self.step, native)
    }

    pub fn contains_cell(&self, cell: RasterCell) -> bool {
        self.raster.contains_cell(cell)
    }

    /// Turns one raw interleaved sample into a value.
    ///
    /// No-data sentinels (declared first, then forced) yield `None`. Palette
    /// coverages resolve the index to an RGB triple.
    pub fn interpret(&self, raw: &[u8]) -> Result<Option<TypedValue>, CoverageError> {
        if is_no_data(raw, self.no_data.as_deref(), self.forced_no_data.as_deref()) {
            return Ok(None);
        }

        let value = decode(raw, &self.layout);
        if value.is_null() {
            return Ok(None);
        }

        match (&self.context, &self.palette) {
            (ValueContext::Clut, Some(palette)) => match value.channel(0) {
                Some(Scalar::U8(index)) => lookup_palette_entry(index as usize, palette),
                _ => Ok(None),
            },
            _ => Ok(Some(value)),
        }
    }
}

fn verify_bands(info: &DatasetInfo, bands: &[usize]) -> Result<(), CoverageError> {
    if let Some(band) = bands.iter().find(|b| **b >= info.bands.len()) {
        return Err(CoverageError::DatasetStructure(format!(
            "band {} does not exist ({} bands)",
            band,
            info.bands.len()
        )));
    }

    let first = &info.bands[bands[0]];
    for band in &bands[1..] {
        let other = &info.bands[*band];
        if other.width != first.width || other.height != first.height {
            return Err(CoverageError::DatasetStructure(format!(
                "band {} is {}x{}, band {} is {}x{}",
                band, other.width, other.height, bands[0], first.width, first.height
            )));
        }
        if other.sample_type != first.sample_type {
            return Err(CoverageError::DatasetStructure(format!(
                "band {} is {}, band {} is {}",
                band, other.sample_type, bands[0], first.sample_type
            )));
        }
    }
    Ok(())
}

fn classify(
    info: &DatasetInfo,
    bands: &[usize],
) -> Result<(ValueContext, Option<Palette>), CoverageError> {
    match bands.len() {
        1 => {
            let band = &info.bands[bands[0]];
            if band.is_elevation {
                return Ok((ValueContext::Elevation, None));
            }
            match &band.palette {
                Some(palette) if band.sample_type == SampleType::Byte => {
                    palette.ensure_supported()?;
                    Ok((ValueContext::Clut, Some(palette.clone())))
                }
                _ => Ok((ValueContext::GreyScale, None)),
            }
        }
        3 | 4 => {
            let colour_bands = bands.iter().all(|b| {
                matches!(
                    info.bands[*b].color,
                    ColorInterpretation::Red
                        | ColorInterpretation::Green
                        | ColorInterpretation::Blue
                        | ColorInterpretation::Alpha
                        | ColorInterpretation::Undefined
                )
            });
            if colour_bands {
                Ok((ValueContext::Rgb, None))
            } else {
                Err(CoverageError::DatasetStructure(
                    "multi-band dataset is not RGB(A)".to_string(),
                ))
            }
        }
        n => Err(CoverageError::DatasetStructure(format!(
            "cannot serve {} bands",
            n
        ))),
    }
}
