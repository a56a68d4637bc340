//! Decoded raster sub-rectangle.

use tracing::debug;

use crate::codec::SampleLayout;
use crate::coord::{RasterCell, RasterRect};
use crate::error::CoverageError;

/// Default hard ceiling on the size of one region buffer (100 MB).
pub const DEFAULT_BUFFER_CEILING: usize = 100_000_000;

/// An owned block of sample bytes for one raster rectangle.
///
/// Bytes are band-sequential: the whole rect for band 0, then band 1, and
/// so on. Within a band, rows run from `y_min` to `y_max` and each row holds
/// `columns` values of `pixel_bytes`.
///
/// A buffer is filled before it is published and is read-only afterwards,
/// so any number of threads may read it concurrently.
#[derive(Debug, Clone, PartialEq)]
pub struct RegionBuffer {
    rect: RasterRect,
    layout: SampleLayout,
    data: Vec<u8>,
}

impl RegionBuffer {
    /// Computes the byte size needed for `rect` with `layout`.
    pub fn required_bytes(rect: &RasterRect, layout: &SampleLayout) -> Option<usize> {
        rect.columns()
            .checked_mul(rect.rows())?
            .checked_mul(layout.band_count)?
            .checked_mul(layout.pixel_bytes())
    }

    /// Allocates a zeroed buffer for `rect`.
    ///
    /// Returns `None` when the size exceeds `ceiling` or the allocation
    /// fails. Callers then fall back to unbuffered single-cell reads.
    pub fn allocate(rect: RasterRect, layout: SampleLayout, ceiling: usize) -> Option<Self> {
        let size = match Self::required_bytes(&rect, &layout) {
            Some(size) if size > 0 && size <= ceiling => size,
            Some(size) => {
                debug!(%rect, size, ceiling, "Region buffer over ceiling, not allocating");
                return None;
            }
            None => return None,
        };

        let mut data = Vec::new();
        if data.try_reserve_exact(size).is_err() {
            debug!(%rect, size, "Region buffer allocation failed");
            return None;
        }
        data.resize(size, 0);

        Some(Self { rect, layout, data })
    }

    /// Wraps bytes already laid out band-sequentially for `rect`.
    pub fn from_bytes(
        rect: RasterRect,
        layout: SampleLayout,
        data: Vec<u8>,
    ) -> Result<Self, CoverageError> {
        let expected = Self::required_bytes(&rect, &layout).unwrap_or(usize::MAX);
        if data.len() != expected {
            return Err(CoverageError::DatasetStructure(format!(
                "region {} needs {} bytes, backend returned {}",
                rect,
                expected,
                data.len()
            )));
        }
        Ok(Self { rect, layout, data })
    }

    pub fn rect(&self) -> &RasterRect {
        &self.rect
    }

    pub fn layout(&self) -> &SampleLayout {
        &self.layout
    }

    pub fn byte_len(&self) -> usize {
        self.data.len()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn pixel_bytes(&self) -> usize {
        self.layout.pixel_bytes()
    }

    /// Bytes in one row of one band.
    pub fn line_bytes(&self) -> usize {
        self.pixel_bytes() * self.rect.columns()
    }

    /// Bytes in one whole band.
    pub fn band_bytes(&self) -> usize {
        self.line_bytes() * self.rect.rows()
    }

    pub fn contains_cell(&self, cell: RasterCell) -> bool {
        self.rect.contains_cell(cell)
    }

    pub fn contains_rect(&self, rect: &RasterRect) -> bool {
        self.rect.contains_rect(rect)
    }

    /// Byte offset of `cell` within band 0. Caller checks containment.
    fn cell_offset(&self, cell: RasterCell) -> usize {
        (cell.x - self.rect.x_min) as usize * self.pixel_bytes()
            + (cell.y - self.rect.y_min) as usize * self.line_bytes()
    }

    /// Copies the interleaved sample at `cell` into `dest`.
    ///
    /// Writes `band_count × pixel_bytes` bytes. Returns false, leaving `dest`
    /// untouched, if the cell is outside this buffer or `dest` is too short.
    pub fn read(&self, cell: RasterCell, dest: &mut [u8]) -> bool {
        let pixel_bytes = self.pixel_bytes();
        if !self.contains_cell(cell) || dest.len() < self.layout.sample_bytes() {
            return false;
        }

        let offset = self.cell_offset(cell);
        let band_bytes = self.band_bytes();
        for band in 0..self.layout.band_count {
            let src = offset + band * band_bytes;
            dest[band * pixel_bytes..(band + 1) * pixel_bytes]
                .copy_from_slice(&self.data[src..src + pixel_bytes]);
        }
        true
    }

    /// Copies a band-sequential block for `src_rect` into this buffer.
    ///
    /// `src_rect` must lie inside this buffer's rect; `src` must be laid out
    /// the same way as this buffer, but for `src_rect`.
    pub(crate) fn splice(&mut self, src_rect: &RasterRect, src: &[u8]) -> Result<(), CoverageError> {
        if !self.rect.contains_rect(src_rect) {
            return Err(CoverageError::DatasetStructure(format!(
                "sub-region {} outside destination {}",
                src_rect, self.rect
            )));
        }
        let expected = Self::required_bytes(src_rect, &self.layout).unwrap_or(usize::MAX);
        if src.len() != expected {
            return Err(CoverageError::DatasetStructure(format!(
                "sub-region {} needs {} bytes, backend returned {}",
                src_rect,
                expected,
                src.len()
            )));
        }

        let pixel_bytes = self.pixel_bytes();
        let src_line = src_rect.columns() * pixel_bytes;
        let src_band = src_line * src_rect.rows();
        let dst_band = self.band_bytes();
        let dst_line = self.line_bytes();
        let dst_origin = self.cell_offset(RasterCell::new(src_rect.x_min, src_rect.y_min));

        for band in 0..self.layout.band_count {
            for row in 0..src_rect.rows() {
                let s = band * src_band + row * src_line;
                let d = band * dst_band + dst_origin + row * dst_line;
                self.data[d..d + src_line].copy_from_slice(&src[s..s + src_line]);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::SampleType;

    fn layout(bands: usize) -> SampleLayout {
        SampleLayout::new(SampleType::Byte, bands)
    }

    #[test]
    fn test_allocate_size() {
        let buffer = RegionBuffer::allocate(RasterRect::new(0, 0, 9, 4), layout(3), 1000).unwrap();
        assert_eq!(buffer.byte_len(), 10 * 5 * 3);
        assert_eq!(buffer.line_bytes(), 10);
        assert_eq!(buffer.band_bytes(), 50);
    }

    #[test]
    fn test_allocate_over_ceiling_is_soft_failure() {
        assert!(RegionBuffer::allocate(RasterRect::new(0, 0, 99, 99), layout(1), 9_999).is_none());
        assert!(RegionBuffer::allocate(RasterRect::new(0, 0, 99, 99), layout(1), 10_000).is_some());
    }

    #[test]
    fn test_read_interleaves_bands() {
        let rect = RasterRect::new(10, 20, 11, 21);
        // band 0 then band 1, rows of two cells
        let data = vec![1, 2, 3, 4, 11, 12, 13, 14];
        let buffer = RegionBuffer::from_bytes(rect, layout(2), data).unwrap();

        let mut dest = [0u8; 2];
        assert!(buffer.read(RasterCell::new(11, 21), &mut dest));
        assert_eq!(dest, [4, 14]);
        assert!(buffer.read(RasterCell::new(10, 20), &mut dest));
        assert_eq!(dest, [1, 11]);
    }

    #[test]
    fn test_read_out_of_rect() {
        let buffer = RegionBuffer::allocate(RasterRect::new(0, 0, 1, 1), layout(1), 100).unwrap();
        let mut dest = [7u8; 1];
        assert!(!buffer.read(RasterCell::new(2, 0), &mut dest));
        assert!(!buffer.read(RasterCell::new(0, -1), &mut dest));
        assert_eq!(dest, [7]);
    }

    #[test]
    fn test_from_bytes_length_mismatch() {
        let err = RegionBuffer::from_bytes(RasterRect::new(0, 0, 1, 1), layout(1), vec![0; 3]);
        assert!(matches!(err, Err(CoverageError::DatasetStructure(_))));
    }

    #[test]
    fn test_splice_places_sub_rect() {
        let mut buffer =
            RegionBuffer::allocate(RasterRect::new(0, 0, 3, 1), layout(1), 100).unwrap();
        buffer
            .splice(&RasterRect::new(2, 0, 3, 1), &[1, 2, 3, 4])
            .unwrap();
        assert_eq!(buffer.as_bytes(), &[0, 0, 1, 2, 0, 0, 3, 4]);
    }
}
