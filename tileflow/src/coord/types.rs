//! Tile identity types.
//!
//! A tile has up to three identities depending on who is asking:
//!
//! - [`TileId`] is the raw quad-tree cell produced by the covering
//!   algorithm. Its `x` is unbounded so that a viewport crossing the
//!   antimeridian yields distinct cells for each wrapped copy of the world.
//! - [`CanonicalTileId`] is the *data* identity: `x` wrapped into
//!   `[0, 2^z)` and never overscaled. All loading, caching and registry
//!   bookkeeping is keyed by this form.
//! - [`UnwrappedTileId`] is the *render* identity: a canonical id plus the
//!   world-wrap offset. Two unwrapped ids with the same canonical part
//!   share tile data but never share clip state.

use std::fmt;

use thiserror::Error;

/// Errors produced by coordinate validation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoordError {
    /// Latitude outside the Web Mercator range.
    #[error("invalid latitude: {0}")]
    InvalidLatitude(f64),

    /// Longitude outside `[-180, 180]`.
    #[error("invalid longitude: {0}")]
    InvalidLongitude(f64),
}

/// Geographic position in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LatLng {
    pub lat: f64,
    pub lon: f64,
}

impl LatLng {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

/// Canonical quad-tree address: `x` wrapped into `[0, 2^z)`, never
/// overscaled. This is the identity under which tile data is fetched,
/// shared and cached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CanonicalTileId {
    pub z: u8,
    pub x: u32,
    pub y: u32,
}

impl CanonicalTileId {
    pub fn new(z: u8, x: u32, y: u32) -> Self {
        debug_assert!(x < 1u32 << z, "canonical x {} out of range at z{}", x, z);
        debug_assert!(y < 1u32 << z, "canonical y {} out of range at z{}", y, z);
        Self { z, x, y }
    }

    /// Parent cell one zoom level up, or `None` at the root.
    pub fn parent(&self) -> Option<Self> {
        (self.z > 0).then(|| Self {
            z: self.z - 1,
            x: self.x >> 1,
            y: self.y >> 1,
        })
    }

    /// The four direct children one zoom level down.
    pub fn children(&self) -> [Self; 4] {
        let z = self.z + 1;
        let x = self.x << 1;
        let y = self.y << 1;
        [
            Self { z, x, y },
            Self { z, x: x + 1, y },
            Self { z, x, y: y + 1 },
            Self { z, x: x + 1, y: y + 1 },
        ]
    }

    /// Ancestor cell at zoom `z` (which must not exceed `self.z`).
    pub fn scaled_to(&self, z: u8) -> Self {
        debug_assert!(z <= self.z);
        let shift = self.z - z;
        Self {
            z,
            x: self.x >> shift,
            y: self.y >> shift,
        }
    }

    /// Whether `other` is a strict quad-tree ancestor of this cell.
    pub fn is_child_of(&self, other: &Self) -> bool {
        other.z < self.z
            && other.x == self.x >> (self.z - other.z)
            && other.y == self.y >> (self.z - other.z)
    }
}

impl fmt::Display for CanonicalTileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.z, self.x, self.y)
    }
}

/// Render identity: a canonical id plus the number of full world-widths the
/// cell is offset by. Ordering sorts by wrap first, then shallow-to-deep, so
/// in a sorted sequence an ancestor always precedes its descendants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UnwrappedTileId {
    pub wrap: i32,
    pub canonical: CanonicalTileId,
}

impl UnwrappedTileId {
    pub fn new(wrap: i32, canonical: CanonicalTileId) -> Self {
        Self { wrap, canonical }
    }

    /// The four direct children, staying in the same world copy.
    pub fn children(&self) -> [Self; 4] {
        self.canonical.children().map(|canonical| Self {
            wrap: self.wrap,
            canonical,
        })
    }

    /// Whether `other` is an ancestor of this tile. Tiles in different world
    /// copies are never related.
    pub fn is_child_of(&self, other: &Self) -> bool {
        self.wrap == other.wrap && self.canonical.is_child_of(&other.canonical)
    }
}

impl fmt::Display for UnwrappedTileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.wrap, self.canonical)
    }
}

/// Raw covering-algorithm cell. `x` is deliberately unbounded: a viewport
/// that crosses the antimeridian produces cells left of column zero or right
/// of the last column, and the wrap offset is recovered on demand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileId {
    pub z: u8,
    pub x: i32,
    pub y: i32,
}

impl TileId {
    pub fn new(z: u8, x: i32, y: i32) -> Self {
        Self { z, x, y }
    }

    /// Number of cells along one axis at this zoom.
    pub fn dim(z: u8) -> i32 {
        1 << z
    }

    /// World-wrap offset implied by the unbounded `x`.
    pub fn wrap(&self) -> i32 {
        self.x.div_euclid(Self::dim(self.z))
    }

    /// Data identity at this zoom: `x` wrapped into range.
    pub fn canonical(&self) -> CanonicalTileId {
        let dim = Self::dim(self.z);
        CanonicalTileId {
            z: self.z,
            x: self.x.rem_euclid(dim) as u32,
            y: self.y.clamp(0, dim - 1) as u32,
        }
    }

    /// Render identity: canonical id plus wrap offset.
    pub fn unwrapped(&self) -> UnwrappedTileId {
        UnwrappedTileId {
            wrap: self.wrap(),
            canonical: self.canonical(),
        }
    }

    /// Data identity with overscaling collapsed: cells deeper than
    /// `max_zoom` resolve to the ancestor at `max_zoom`, so every overscale
    /// level of the same region shares one loaded tile.
    pub fn normalized(&self, max_zoom: u8) -> CanonicalTileId {
        let canonical = self.canonical();
        if canonical.z <= max_zoom {
            canonical
        } else {
            canonical.scaled_to(max_zoom)
        }
    }

    /// Parent cell one zoom level up, or `None` at the root.
    pub fn parent(&self) -> Option<Self> {
        (self.z > 0).then(|| Self {
            z: self.z - 1,
            x: self.x >> 1,
            y: self.y >> 1,
        })
    }

    /// The four direct children one zoom level down.
    pub fn children(&self) -> [Self; 4] {
        let z = self.z + 1;
        let x = self.x * 2;
        let y = self.y * 2;
        [
            Self { z, x, y },
            Self { z, x: x + 1, y },
            Self { z, x, y: y + 1 },
            Self { z, x: x + 1, y: y + 1 },
        ]
    }

    /// Ancestor cell at zoom `z` (which must not exceed `self.z`).
    pub fn scaled_to(&self, z: u8) -> Self {
        debug_assert!(z <= self.z);
        let shift = self.z - z;
        Self {
            z,
            x: self.x >> shift,
            y: self.y >> shift,
        }
    }

    /// Whether `other` is a strict quad-tree ancestor of this cell.
    pub fn is_child_of(&self, other: &Self) -> bool {
        other.z < self.z
            && other.x == self.x >> (self.z - other.z)
            && other.y == self.y >> (self.z - other.z)
    }
}

impl fmt::Display for TileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.z, self.x, self.y)
    }
}
