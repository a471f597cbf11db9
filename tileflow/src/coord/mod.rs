//! Coordinate conversion and tile identity module.
//!
//! Provides conversions between geographic coordinates (latitude/longitude)
//! and fractional Web Mercator tile coordinates, plus the quad-tree identity
//! types used throughout the engine.

mod types;

pub use types::{CanonicalTileId, CoordError, LatLng, TileId, UnwrappedTileId};

use std::f64::consts::PI;

/// Southernmost latitude representable in Web Mercator.
pub const MIN_LAT: f64 = -85.05112878;
/// Northernmost latitude representable in Web Mercator.
pub const MAX_LAT: f64 = 85.05112878;
pub const MIN_LON: f64 = -180.0;
pub const MAX_LON: f64 = 180.0;

/// Converts geographic coordinates to fractional tile coordinates.
///
/// # Arguments
///
/// * `lat` - Latitude in degrees (-85.05112878 to 85.05112878)
/// * `lon` - Longitude in degrees (-180.0 to 180.0)
/// * `zoom` - Fractional zoom level
///
/// # Returns
///
/// A `Result` with the fractional `(column, row)` position at `zoom`, where
/// whole numbers fall on tile boundaries, or an error for invalid inputs.
#[inline]
pub fn project(lat: f64, lon: f64, zoom: f64) -> Result<(f64, f64), CoordError> {
    if !(MIN_LAT..=MAX_LAT).contains(&lat) {
        return Err(CoordError::InvalidLatitude(lat));
    }
    if !(MIN_LON..=MAX_LON).contains(&lon) {
        return Err(CoordError::InvalidLongitude(lon));
    }

    let n = zoom.exp2();

    let col = (lon + 180.0) / 360.0 * n;

    let lat_rad = lat.to_radians();
    let row = (1.0 - lat_rad.tan().asinh() / PI) / 2.0 * n;

    Ok((col, row))
}

/// Converts fractional tile coordinates back to geographic coordinates.
///
/// Inverse of [`project`]; returns `(lat, lon)` in degrees.
#[inline]
pub fn unproject(col: f64, row: f64, zoom: f64) -> (f64, f64) {
    let n = zoom.exp2();

    let lon = col / n * 360.0 - 180.0;

    let y = row / n;
    let lat_rad = (PI * (1.0 - 2.0 * y)).sinh().atan();

    (lat_rad.to_degrees(), lon)
}
