//! Coordinate and raster geometry types.

use std::fmt;

/// A point in the dataset's native coordinate reference system.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NativePoint {
    pub x: f64,
    pub y: f64,
}

impl NativePoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

impl fmt::Display for NativePoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Axis-aligned native rectangle.
///
/// Set once when a coverage opens and never changed afterwards.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub x_min: f64,
    pub y_min: f64,
    pub x_max: f64,
    pub y_max: f64,
}

impl Bounds {
    pub fn new(x_min: f64, y_min: f64, x_max: f64, y_max: f64) -> Self {
        Self {
            x_min,
            y_min,
            x_max,
            y_max,
        }
    }

    /// Bounds of an explicitly empty coverage.
    pub fn empty() -> Self {
        Self::new(0.0, 0.0, 0.0, 0.0)
    }

    /// True when the rectangle has no area.
    pub fn is_empty(&self) -> bool {
        !(self.x_max > self.x_min && self.y_max > self.y_min)
    }

    pub fn width(&self) -> f64 {
        self.x_max - self.x_min
    }

    pub fn height(&self) -> f64 {
        self.y_max - self.y_min
    }

    /// True if the point lies inside or on the edge of the bounds.
    pub fn contains(&self, p: NativePoint) -> bool {
        !self.is_empty()
            && p.x >= self.x_min
            && p.x <= self.x_max
            && p.y >= self.y_min
            && p.y <= self.y_max
    }
}

/// Native distance covered by one raster cell on each axis.
///
/// A negative value means the axis is addressed from its maximum edge,
/// which is the usual case for Y in north-up imagery.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepSize {
    pub x: f64,
    pub y: f64,
}

impl StepSize {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Step for a north-up grid of `columns × rows` cells covering `bounds`.
    pub fn north_up(bounds: &Bounds, columns: u32, rows: u32) -> Self {
        Self {
            x: bounds.width() / f64::from(columns.max(1)),
            y: -bounds.height() / f64::from(rows.max(1)),
        }
    }
}

/// Integer raster cell (column, row).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RasterCell {
    pub x: i64,
    pub y: i64,
}

impl RasterCell {
    pub fn new(x: i64, y: i64) -> Self {
        Self { x, y }
    }

    /// Key of the `chunk_size × chunk_size` block this cell falls in.
    pub fn chunk_key(&self, chunk_size: i64) -> ChunkKey {
        ChunkKey {
            x: self.x.div_euclid(chunk_size),
            y: self.y.div_euclid(chunk_size),
        }
    }

    pub fn offset(&self, dx: i64, dy: i64) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }
}

impl fmt::Display for RasterCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.x, self.y)
    }
}

/// Chunk-grid coordinate used to group nearby requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChunkKey {
    pub x: i64,
    pub y: i64,
}

impl ChunkKey {
    /// Inclusive cell rectangle covered by this chunk, grown by `pad` cells
    /// on every side.
    pub fn rect(&self, chunk_size: i64, pad: i64) -> RasterRect {
        RasterRect::new(
            self.x * chunk_size - pad,
            self.y * chunk_size - pad,
            (self.x + 1) * chunk_size - 1 + pad,
            (self.y + 1) * chunk_size - 1 + pad,
        )
    }
}

/// Inclusive integer rectangle in cell space.
///
/// Both corners are part of the rectangle, so a rect with `x_min == x_max`
/// is one column wide. A rect with `x_max < x_min` is empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RasterRect {
    pub x_min: i64,
    pub y_min: i64,
    pub x_max: i64,
    pub y_max: i64,
}

impl RasterRect {
    pub fn new(x_min: i64, y_min: i64, x_max: i64, y_max: i64) -> Self {
        Self {
            x_min,
            y_min,
            x_max,
            y_max,
        }
    }

    /// Full extent of a `width × height` raster: `(0, 0, width-1, height-1)`.
    pub fn from_size(width: u32, height: u32) -> Self {
        Self::new(0, 0, i64::from(width) - 1, i64::from(height) - 1)
    }

    /// The single-cell rectangle at `cell`.
    pub fn from_cell(cell: RasterCell) -> Self {
        Self::new(cell.x, cell.y, cell.x, cell.y)
    }

    pub fn is_empty(&self) -> bool {
        self.x_max < self.x_min || self.y_max < self.y_min
    }

    /// Number of columns (`x_max - x_min + 1`), zero when empty.
    pub fn columns(&self) -> usize {
        if self.is_empty() {
            0
        } else {
            (self.x_max - self.x_min + 1) as usize
        }
    }

    /// Number of rows (`y_max - y_min + 1`), zero when empty.
    pub fn rows(&self) -> usize {
        if self.is_empty() {
            0
        } else {
            (self.y_max - self.y_min + 1) as usize
        }
    }

    pub fn cell_count(&self) -> usize {
        self.columns() * self.rows()
    }

    pub fn contains_cell(&self, cell: RasterCell) -> bool {
        cell.x >= self.x_min && cell.x <= self.x_max && cell.y >= self.y_min && cell.y <= self.y_max
    }

    pub fn contains_rect(&self, other: &RasterRect) -> bool {
        !other.is_empty()
            && other.x_min >= self.x_min
            && other.x_max <= self.x_max
            && other.y_min >= self.y_min
            && other.y_max <= self.y_max
    }

    /// Overlap of two rectangles, or `None` if they are disjoint.
    pub fn intersection(&self, other: &RasterRect) -> Option<RasterRect> {
        let rect = RasterRect::new(
            self.x_min.max(other.x_min),
            self.y_min.max(other.y_min),
            self.x_max.min(other.x_max),
            self.y_max.min(other.y_max),
        );
        if rect.is_empty() {
            None
        } else {
            Some(rect)
        }
    }

    /// Window of `width × height` cells whose lower corner is `origin`.
    pub fn window(origin: RasterCell, width: u32, height: u32) -> Self {
        Self::new(
            origin.x,
            origin.y,
            origin.x + i64::from(width) - 1,
            origin.y + i64::from(height) - 1,
        )
    }
}

impl fmt::Display for RasterRect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}, {}]..=[{}, {}]",
            self.x_min, self.y_min, self.x_max, self.y_max
        )
    }
}

/// Spatial reference classification of a dataset.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SpatialReference {
    /// No reference system is known.
    #[default]
    Unknown,
    /// Degrees of latitude/longitude.
    Geographic,
    /// Linear units (metres).
    Projected,
}

impl SpatialReference {
    /// Parse an SRS hint such as `EPSG:4326`, `geographic` or `projected`.
    ///
    /// `EPSG:4326` and `CRS:84` map to geographic, any other EPSG code to
    /// projected.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim().to_lowercase();
        match s.as_str() {
            "geographic" | "epsg:4326" | "crs:84" | "wgs84" => Some(Self::Geographic),
            "projected" => Some(Self::Projected),
            "unknown" | "" => Some(Self::Unknown),
            other if other.starts_with("epsg:") => Some(Self::Projected),
            _ => None,
        }
    }

    pub fn is_geographic(&self) -> bool {
        matches!(self, Self::Geographic)
    }
}
