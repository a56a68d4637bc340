//! Coordinate conversion module
//!
//! Converts between native (dataset CRS) coordinates and integer raster cells
//! given a coverage's bounds and per-axis step size. All functions are pure.
//!
//! Raster index 0 on each axis sits on the first-addressed edge: `x_min`/`y_min`
//! for a positive step, `x_max`/`y_max` for a negative one.

mod types;

pub use types::{
    Bounds, ChunkKey, NativePoint, RasterCell, RasterRect, SpatialReference, StepSize,
};

/// Offsets this close to an integer are treated as sitting on the grid line.
///
/// Absorbs the floating-point error of `raster_to_native` so that converting
/// a cell's own native coordinate back lands on the same cell.
pub const GRID_SNAP_TOLERANCE: f64 = 1e-6;

#[inline]
fn reference_edge(min: f64, max: f64, step: f64) -> f64 {
    if step < 0.0 {
        max
    } else {
        min
    }
}

#[inline]
fn axis_offset(value: f64, min: f64, max: f64, step: f64) -> f64 {
    (value - reference_edge(min, max, step)) / step
}

#[inline]
fn floor_snapped(offset: f64) -> i64 {
    let nearest = offset.round();
    if (offset - nearest).abs() < GRID_SNAP_TOLERANCE {
        nearest as i64
    } else {
        offset.floor() as i64
    }
}

/// Converts a native coordinate to the nearest raster cell.
///
/// # Arguments
///
/// * `bounds` - Native bounds of the coverage
/// * `step` - Per-axis step size (may be negative)
/// * `native` - Coordinate to convert
#[inline]
pub fn native_to_nearest_raster(bounds: &Bounds, step: &StepSize, native: NativePoint) -> RasterCell {
    RasterCell {
        x: axis_offset(native.x, bounds.x_min, bounds.x_max, step.x).round() as i64,
        y: axis_offset(native.y, bounds.y_min, bounds.y_max, step.y).round() as i64,
    }
}

/// Converts a native coordinate to the raster cell that contains it.
///
/// Uses a true floor, so coordinates before the reference edge map to
/// negative cells rather than being truncated toward zero.
#[inline]
pub fn native_to_lower_raster(bounds: &Bounds, step: &StepSize, native: NativePoint) -> RasterCell {
    RasterCell {
        x: floor_snapped(axis_offset(native.x, bounds.x_min, bounds.x_max, step.x)),
        y: floor_snapped(axis_offset(native.y, bounds.y_min, bounds.y_max, step.y)),
    }
}

/// Converts a raster cell to the native coordinate of its grid corner.
#[inline]
pub fn raster_to_native(bounds: &Bounds, step: &StepSize, cell: RasterCell) -> NativePoint {
    NativePoint {
        x: reference_edge(bounds.x_min, bounds.x_max, step.x) + cell.x as f64 * step.x,
        y: reference_edge(bounds.y_min, bounds.y_max, step.y) + cell.y as f64 * step.y,
    }
}

/// Finds the equivalent cell on the opposite edge of an X-wrapping raster.
///
/// When a `width`-wide window centered on `center` would spill past one edge
/// of `[x_min, x_max]`, returns the same position shifted by one full period
/// so the spill can be read from the other edge. Returns `None` when the
/// window fits.
pub fn find_center_on_other_side(
    center: RasterCell,
    width: i64,
    x_min: i64,
    x_max: i64,
) -> Option<RasterCell> {
    let dist_min = center.x - x_min;
    if dist_min < width {
        return Some(RasterCell::new(x_max + dist_min + 1, center.y));
    }
    let dist_max = x_max - center.x;
    if dist_max < width {
        return Some(RasterCell::new(x_min - dist_max - 1, center.y));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid() -> (Bounds, StepSize) {
        (
            Bounds::new(0.0, 0.0, 1000.0, 1000.0),
            StepSize::new(1.0, -1.0),
        )
    }

    #[test]
    fn test_negative_step_uses_max_edge() {
        let (bounds, step) = grid();
        let cell = native_to_lower_raster(&bounds, &step, NativePoint::new(500.5, 500.5));
        assert_eq!(cell, RasterCell::new(500, 499));
    }

    #[test]
    fn test_nearest_rounds() {
        let (bounds, step) = grid();
        let cell = native_to_nearest_raster(&bounds, &step, NativePoint::new(500.6, 500.4));
        assert_eq!(cell, RasterCell::new(501, 500));
    }

    #[test]
    fn test_lower_floors_below_edge() {
        let bounds = Bounds::new(0.0, 0.0, 10.0, 10.0);
        let step = StepSize::new(1.0, 1.0);
        let cell = native_to_lower_raster(&bounds, &step, NativePoint::new(-0.5, -2.5));
        assert_eq!(cell, RasterCell::new(-1, -3));
    }

    #[test]
    fn test_raster_to_native_negative_step() {
        let (bounds, step) = grid();
        let p = raster_to_native(&bounds, &step, RasterCell::new(0, 0));
        assert_eq!(p, NativePoint::new(0.0, 1000.0));
        let p = raster_to_native(&bounds, &step, RasterCell::new(10, 10));
        assert_eq!(p, NativePoint::new(10.0, 990.0));
    }

    #[test]
    fn test_fractional_step_grid_line() {
        let bounds = Bounds::new(-180.0, -90.0, 180.0, 90.0);
        let step = StepSize::new(0.1, -0.1);
        let native = raster_to_native(&bounds, &step, RasterCell::new(3, 7));
        assert_eq!(
            native_to_lower_raster(&bounds, &step, native),
            RasterCell::new(3, 7)
        );
    }

    #[test]
    fn test_find_center_on_other_side() {
        assert_eq!(
            find_center_on_other_side(RasterCell::new(1, 10), 4, 0, 20),
            Some(RasterCell::new(22, 10))
        );
        assert_eq!(
            find_center_on_other_side(RasterCell::new(18, 10), 4, 0, 20),
            Some(RasterCell::new(-3, 10))
        );
        assert_eq!(find_center_on_other_side(RasterCell::new(10, 10), 4, 0, 20), None);
    }

    // Property-based tests using proptest
    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        fn any_step() -> impl Strategy<Value = f64> {
            prop_oneof![0.001..1000.0_f64, -1000.0..-0.001_f64]
        }

        proptest! {
            #[test]
            fn test_roundtrip_property(
                x_min in -10_000.0..10_000.0_f64,
                y_min in -10_000.0..10_000.0_f64,
                span in 1.0..10_000.0_f64,
                step_x in any_step(),
                step_y in any_step(),
                cx in 0i64..100_000,
                cy in 0i64..100_000,
            ) {
                let bounds = Bounds::new(x_min, y_min, x_min + span, y_min + span);
                let step = StepSize::new(step_x, step_y);
                let cell = RasterCell::new(cx, cy);

                let native = raster_to_native(&bounds, &step, cell);
                let back = native_to_lower_raster(&bounds, &step, native);

                prop_assert_eq!(back, cell, "native {:?} step {:?}", native, step);
            }

            #[test]
            fn test_lower_never_exceeds_nearest(
                x in -500.0..1500.0_f64,
                y in -500.0..1500.0_f64,
            ) {
                let bounds = Bounds::new(0.0, 0.0, 1000.0, 1000.0);
                let step = StepSize::new(1.0, 1.0);
                let p = NativePoint::new(x, y);
                let lower = native_to_lower_raster(&bounds, &step, p);
                let nearest = native_to_nearest_raster(&bounds, &step, p);

                prop_assert!(nearest.x - lower.x == 0 || nearest.x - lower.x == 1);
                prop_assert!(nearest.y - lower.y == 0 || nearest.y - lower.y == 1);
            }
        }
    }
}
