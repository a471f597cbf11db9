//! TileFlow - per-frame tile selection, caching and clip-mask assignment
//! for map viewports that are continuously panned, zoomed and rotated.
//!
//! Every frame, each [`Source`] decides which tile data the viewport needs,
//! reuses or evicts previously loaded data, substitutes loaded ancestors or
//! descendants while the ideal tile is in flight, and hands the render pass
//! an ordered tile list. A [`ClipIdGenerator`] then assigns non-overlapping
//! stencil codes across all sources so overlapping quad-tree levels draw
//! without double-painting.
//!
//! The engine performs no I/O and owns no GPU state: fetching goes through
//! the [`TileLoader`] seam and the render pass consumes per-tile matrices
//! and [`ClipId`]s. All shared state is mutated on the owning map thread;
//! loader completions arrive over a channel and are applied at the top of
//! [`Source::update`].

pub mod cache;
pub mod clip;
pub mod coord;
pub mod cover;
pub mod data;
pub mod loader;
pub mod registry;
pub mod source;
pub mod transform;

pub use cache::TileCache;
pub use clip::{ClipId, ClipIdGenerator, Renderable};
pub use coord::{CanonicalTileId, CoordError, LatLng, TileId, UnwrappedTileId};
pub use cover::tile_cover;
pub use data::{PlacementConfig, TileData, TileError, TileEvent, TileEventSender, TileState};
pub use loader::{LoadHandle, TileDescriptor, TileLoader};
pub use registry::TileDataRegistry;
pub use source::{
    NullObserver, Source, SourceError, SourceInfo, SourceKind, SourceObserver, Tile,
    UpdateParameters,
};
pub use transform::{Mat4, TransformState, BASE_TILE_SIZE, TILE_EXTENT};
