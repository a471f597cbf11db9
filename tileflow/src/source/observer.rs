//! Outward-facing source notifications.

use crate::coord::CanonicalTileId;
use crate::data::TileError;
use crate::source::SourceError;

/// Callbacks a source emits while updating. All of them fire on the map
/// thread during [`Source::update`](crate::source::Source::update); none may
/// re-enter the source.
pub trait SourceObserver: Send + Sync {
    /// A tile finished loading. `is_new` distinguishes a first load from a
    /// reparse of already-held data.
    fn on_tile_loaded(&self, _id: CanonicalTileId, _is_new: bool) {}

    /// A tile failed permanently. The tile stays out of the render set; the
    /// viewport shows whatever fallback substitution produced.
    fn on_tile_error(&self, _id: CanonicalTileId, _error: &TileError) {}

    /// Source metadata became available.
    fn on_source_loaded(&self) {}

    /// Source metadata could not be used.
    fn on_source_error(&self, _error: &SourceError) {}

    /// Symbol placement re-ran for at least one tile this pass.
    fn on_placement_redone(&self) {}
}

/// Observer that ignores every notification.
#[derive(Debug, Default)]
pub struct NullObserver;

impl SourceObserver for NullObserver {}
