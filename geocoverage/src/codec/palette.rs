//! Colour table lookup for palette (CLUT) bands.

use super::types::{Scalar, TypedValue};
use crate::error::CoverageError;

/// How the entries of a colour table are to be read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaletteKind {
    Gray,
    Rgb,
    Cmyk,
    Hls,
}

/// One colour table entry. Meaning of the components depends on the
/// palette kind (`c1` is the gray level for `Gray`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ColorEntry {
    pub c1: i16,
    pub c2: i16,
    pub c3: i16,
    pub c4: i16,
}

impl ColorEntry {
    pub fn rgb(r: i16, g: i16, b: i16) -> Self {
        Self {
            c1: r,
            c2: g,
            c3: b,
            c4: 255,
        }
    }

    pub fn gray(level: i16) -> Self {
        Self {
            c1: level,
            c2: 0,
            c3: 0,
            c4: 255,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Palette {
    pub kind: PaletteKind,
    pub entries: Vec<ColorEntry>,
}

impl Palette {
    pub fn new(kind: PaletteKind, entries: Vec<ColorEntry>) -> Self {
        Self { kind, entries }
    }

    /// Fails unless entries can be turned into RGB triples.
    pub fn ensure_supported(&self) -> Result<(), CoverageError> {
        match self.kind {
            PaletteKind::Gray | PaletteKind::Rgb => Ok(()),
            other => Err(CoverageError::UnsupportedPalette(format!("{:?}", other))),
        }
    }
}

fn component(value: i16) -> Scalar {
    Scalar::U8(value.clamp(0, 255) as u8)
}

/// Resolves a palette index to an RGB triple.
///
/// RGB entries yield `(c1, c2, c3)`, Gray entries `(c1, c1, c1)`. An index
/// past the end of the table yields `None`.
///
/// # Errors
///
/// `UnsupportedPalette` for CMYK or HLS tables.
pub fn lookup_palette_entry(index: usize, palette: &Palette) -> Result<Option<TypedValue>, CoverageError> {
    palette.ensure_supported()?;

    let entry = match palette.entries.get(index) {
        Some(entry) => entry,
        None => return Ok(None),
    };

    let triple = match palette.kind {
        PaletteKind::Rgb => [entry.c1, entry.c2, entry.c3],
        _ => [entry.c1, entry.c1, entry.c1],
    };

    Ok(Some(TypedValue::Array(triple.iter().map(|c| component(*c)).collect())))
}
