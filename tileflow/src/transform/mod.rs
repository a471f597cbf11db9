//! Viewport transform state.
//!
//! [`TransformState`] is the immutable-per-frame snapshot of the camera:
//! viewport size in pixels, fractional zoom, bearing and geographic center.
//! The covering algorithm uses it to unproject screen points into fractional
//! tile coordinates, and the render consumer reads a per-tile 4×4 matrix
//! positioning each tile under the current view.

use crate::coord::{self, LatLng, UnwrappedTileId};

/// Logical pixel size of one tile at the reference scale.
pub const BASE_TILE_SIZE: f64 = 512.0;

/// Tile-local coordinate extent the render matrix maps onto screen pixels.
pub const TILE_EXTENT: f64 = 4096.0;

/// Column-major 4×4 transform matrix.
pub type Mat4 = [f64; 16];

/// Camera snapshot for one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct TransformState {
    width: f64,
    height: f64,
    zoom: f64,
    bearing: f64,
    center: LatLng,
    center_world: (f64, f64),
    min_zoom: f64,
    max_zoom: f64,
}

impl Default for TransformState {
    fn default() -> Self {
        Self {
            width: 0.0,
            height: 0.0,
            zoom: 0.0,
            bearing: 0.0,
            center: LatLng::default(),
            center_world: (0.5, 0.5),
            min_zoom: 0.0,
            max_zoom: 22.0,
        }
    }
}

impl TransformState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the viewport size in pixels.
    pub fn set_size(&mut self, width: f64, height: f64) {
        self.width = width;
        self.height = height;
    }

    /// Sets the fractional zoom, clamped into the configured zoom range.
    pub fn set_zoom(&mut self, zoom: f64) {
        self.zoom = zoom.clamp(self.min_zoom, self.max_zoom);
    }

    /// Sets the bearing in radians, clockwise from north.
    pub fn set_bearing(&mut self, bearing: f64) {
        self.bearing = bearing;
    }

    /// Sets the geographic center. Rejects positions outside the Web
    /// Mercator range so later unprojections cannot fail.
    pub fn set_center(&mut self, center: LatLng) -> Result<(), coord::CoordError> {
        let world = coord::project(center.lat, center.lon, 0.0)?;
        self.center = center;
        self.center_world = world;
        Ok(())
    }

    /// Sets the zoom span the map allows; feeds the per-source cache sizing.
    pub fn set_zoom_range(&mut self, min_zoom: f64, max_zoom: f64) {
        self.min_zoom = min_zoom;
        self.max_zoom = max_zoom;
        self.zoom = self.zoom.clamp(min_zoom, max_zoom);
    }

    pub fn width(&self) -> f64 {
        self.width
    }

    pub fn height(&self) -> f64 {
        self.height
    }

    pub fn zoom(&self) -> f64 {
        self.zoom
    }

    pub fn bearing(&self) -> f64 {
        self.bearing
    }

    pub fn center(&self) -> LatLng {
        self.center
    }

    pub fn min_zoom(&self) -> f64 {
        self.min_zoom
    }

    pub fn max_zoom(&self) -> f64 {
        self.max_zoom
    }

    /// Unprojects a screen point to fractional tile coordinates at integer
    /// zoom `z`, honoring the current bearing. Whole numbers fall on tile
    /// boundaries.
    pub fn point_to_tile(&self, px: f64, py: f64, z: u8) -> (f64, f64) {
        let scale = self.zoom.exp2();
        let cx = self.center_world.0 * scale;
        let cy = self.center_world.1 * scale;

        // Screen offset from the viewport center, rotated back into
        // map-aligned axes.
        let dx = px - self.width * 0.5;
        let dy = py - self.height * 0.5;
        let (sin_b, cos_b) = self.bearing.sin_cos();
        let ux = dx * cos_b + dy * sin_b;
        let uy = -dx * sin_b + dy * cos_b;

        let tx = cx + ux / BASE_TILE_SIZE;
        let ty = cy + uy / BASE_TILE_SIZE;

        let k = ((z as f64) - self.zoom).exp2();
        (tx * k, ty * k)
    }

    /// Render matrix for one tile: maps tile-local `[0, TILE_EXTENT)` units
    /// onto world pixels at the current zoom, including the wrap offset so
    /// wrapped world copies land beside the primary one.
    pub fn matrix_for(&self, id: &UnwrappedTileId) -> Mat4 {
        let dim = f64::from(1u32 << id.canonical.z);
        let world = BASE_TILE_SIZE * self.zoom.exp2();
        let s = world / dim;

        let x = (f64::from(id.canonical.x) + f64::from(id.wrap) * dim) * s;
        let y = f64::from(id.canonical.y) * s;

        let mut m = mat4_identity();
        mat4_translate(&mut m, x, y, 0.0);
        mat4_scale(&mut m, s / TILE_EXTENT, s / TILE_EXTENT, 1.0);
        m
    }
}

fn mat4_identity() -> Mat4 {
    let mut m = [0.0; 16];
    m[0] = 1.0;
    m[5] = 1.0;
    m[10] = 1.0;
    m[15] = 1.0;
    m
}

fn mat4_translate(m: &mut Mat4, x: f64, y: f64, z: f64) {
    m[12] += m[0] * x + m[4] * y + m[8] * z;
    m[13] += m[1] * x + m[5] * y + m[9] * z;
    m[14] += m[2] * x + m[6] * y + m[10] * z;
    m[15] += m[3] * x + m[7] * y + m[11] * z;
}

fn mat4_scale(m: &mut Mat4, x: f64, y: f64, z: f64) {
    for i in 0..4 {
        m[i] *= x;
        m[4 + i] *= y;
        m[8 + i] *= z;
    }
}
