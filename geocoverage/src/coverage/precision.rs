//! Spatial precision of a raster grid.

use crate::coord::{Bounds, SpatialReference, StepSize};

/// Mean Earth radius in metres.
pub const EARTH_RADIUS_M: f64 = 6_371_008.8;

/// Great-circle distance in metres between two lat/lon points (degrees).
pub fn great_circle_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let (phi1, phi2) = (lat1.to_radians(), lat2.to_radians());
    let d_phi = (lat2 - lat1).to_radians();
    let d_lambda = (lon2 - lon1).to_radians();

    let a = (d_phi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * a.sqrt().min(1.0).asin()
}

/// Half the largest distance spanned by one pixel.
///
/// Projected grids answer in native units: half the larger step. Geographic
/// grids answer in metres: half the larger of one pixel of latitude at the
/// most extreme latitude covered, and one pixel of longitude at the latitude
/// closest to the equator (where it is widest). Unknown reference systems
/// have no precision.
pub fn spatial_precision(bounds: &Bounds, step: &StepSize, srs: &SpatialReference) -> Option<f64> {
    let (pw, ph) = (step.x.abs(), step.y.abs());
    match srs {
        SpatialReference::Unknown => None,
        SpatialReference::Projected => Some(pw.max(ph) / 2.0),
        SpatialReference::Geographic => {
            let extreme = bounds.y_min.abs().max(bounds.y_max.abs()).min(90.0);
            let toward_equator = (extreme - ph).max(-90.0);
            let lat_distance = great_circle_distance(extreme, 0.0, toward_equator, 0.0);

            let nearest_equator = if bounds.y_min <= 0.0 && bounds.y_max >= 0.0 {
                0.0
            } else {
                bounds.y_min.abs().min(bounds.y_max.abs())
            };
            let lon_distance = great_circle_distance(nearest_equator, 0.0, nearest_equator, pw);

            Some(lat_distance.max(lon_distance) / 2.0)
        }
    }
}
