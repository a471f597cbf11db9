//! Source kind and metadata.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::coord::CanonicalTileId;

/// The four tile-content kinds a source can serve. The set is closed:
/// selection behavior (zoom rounding, retire-to-cache) is decided per kind
/// right here rather than through dynamic dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    Vector,
    Raster,
    GeoJson,
    Annotation,
}

impl SourceKind {
    /// Raster sources snap to the nearest integer zoom so bilinear scaling
    /// stays close to 1:1; everything else floors to avoid upsampling
    /// artifacts in vector data.
    pub fn rounds_zoom(self) -> bool {
        matches!(self, SourceKind::Raster)
    }

    /// Retired parsed tiles go back to the cache for every kind but raster.
    pub fn caches_retired_tiles(self) -> bool {
        !matches!(self, SourceKind::Raster)
    }
}

/// Errors in source metadata handling.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SourceError {
    #[error("invalid source metadata: {0}")]
    Metadata(String),
}

/// TileJSON-style source metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceInfo {
    /// Tile URL templates with `{z}`/`{x}`/`{y}` placeholders.
    #[serde(default)]
    pub tiles: Vec<String>,

    #[serde(default, rename = "minzoom")]
    pub min_zoom: u8,

    #[serde(default = "default_max_zoom", rename = "maxzoom")]
    pub max_zoom: u8,

    /// Pixel size the source's tiles are designed for; 256px sources load
    /// one zoom level deeper than 512px ones.
    #[serde(default = "default_tile_size", rename = "tileSize")]
    pub tile_size: u16,

    #[serde(default)]
    pub attribution: Option<String>,
}

fn default_max_zoom() -> u8 {
    22
}

fn default_tile_size() -> u16 {
    512
}

impl Default for SourceInfo {
    fn default() -> Self {
        Self {
            tiles: Vec::new(),
            min_zoom: 0,
            max_zoom: default_max_zoom(),
            tile_size: default_tile_size(),
            attribution: None,
        }
    }
}

impl SourceInfo {
    /// Parses TileJSON-style metadata.
    pub fn from_json(json: &str) -> Result<Self, SourceError> {
        serde_json::from_str(json).map_err(|e| SourceError::Metadata(e.to_string()))
    }

    /// Expands the first URL template for `id`, if one is configured.
    pub fn url_for(&self, id: &CanonicalTileId) -> Option<String> {
        let template = self.tiles.first()?;
        Some(
            template
                .replace("{z}", &id.z.to_string())
                .replace("{x}", &id.x.to_string())
                .replace("{y}", &id.y.to_string()),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_json_full() {
        let info = SourceInfo::from_json(
            r#"{
                "tiles": ["https://tiles.example.com/{z}/{x}/{y}.pbf"],
                "minzoom": 2,
                "maxzoom": 14,
                "tileSize": 256,
                "attribution": "© Example"
            }"#,
        )
        .unwrap();
        assert_eq!(info.min_zoom, 2);
        assert_eq!(info.max_zoom, 14);
        assert_eq!(info.tile_size, 256);
        assert_eq!(info.attribution.as_deref(), Some("© Example"));
    }

    #[test]
    fn test_from_json_defaults() {
        let info = SourceInfo::from_json("{}").unwrap();
        assert_eq!(info.min_zoom, 0);
        assert_eq!(info.max_zoom, 22);
        assert_eq!(info.tile_size, 512);
        assert!(info.tiles.is_empty());
    }

    #[test]
    fn test_from_json_rejects_garbage() {
        assert!(matches!(
            SourceInfo::from_json("not json"),
            Err(SourceError::Metadata(_))
        ));
    }

    #[test]
    fn test_url_for_expands_template() {
        let info = SourceInfo {
            tiles: vec!["https://tiles.example.com/{z}/{x}/{y}.pbf".into()],
            ..SourceInfo::default()
        };
        let id = CanonicalTileId::new(3, 5, 2);
        assert_eq!(
            info.url_for(&id).as_deref(),
            Some("https://tiles.example.com/3/5/2.pbf")
        );
    }

    #[test]
    fn test_url_for_without_templates() {
        let info = SourceInfo::default();
        assert!(info.url_for(&CanonicalTileId::new(0, 0, 0)).is_none());
    }

    #[test]
    fn test_kind_policies() {
        assert!(SourceKind::Raster.rounds_zoom());
        assert!(!SourceKind::Vector.rounds_zoom());
        assert!(!SourceKind::Raster.caches_retired_tiles());
        assert!(SourceKind::Vector.caches_retired_tiles());
        assert!(SourceKind::GeoJson.caches_retired_tiles());
        assert!(SourceKind::Annotation.caches_retired_tiles());
    }
}
