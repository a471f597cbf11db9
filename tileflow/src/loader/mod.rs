//! Tile loader abstraction.
//!
//! The engine never performs I/O itself: every fetch goes through the
//! [`TileLoader`] trait, implemented by the network/offline layer. A loader
//! receives a [`TileDescriptor`] and the source's event sender, performs the
//! fetch and parse wherever it likes (worker pool, async runtime), and
//! delivers exactly one terminal [`TileEvent`](crate::data::TileEvent) per
//! request through the channel. `Source::update` drains that channel on the
//! map thread, which is the only place shared tile state is mutated.
//!
//! Transient failures (network hiccups, 5xx) are the loader's business: it
//! retries internally and the engine only ever sees the terminal outcome.
//! Cancellation is cooperative - dropping the [`LoadHandle`] tells the
//! loader the result is no longer wanted, but an in-flight operation may
//! still run to completion; its late event is discarded on arrival.

use crate::coord::CanonicalTileId;
use crate::data::TileEventSender;
use crate::source::SourceKind;

/// Everything a loader needs to fetch one normalized tile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileDescriptor {
    pub id: CanonicalTileId,
    pub kind: SourceKind,
    /// Resolved URL from the source's template, when one is configured.
    pub url: Option<String>,
}

/// Cancellable handle for one in-flight request. Dropping it detaches the
/// loader from the request.
pub trait LoadHandle: Send {}

/// Asynchronous tile fetcher implemented by the embedding layer.
pub trait TileLoader: Send + Sync {
    /// Begins one fetch. Implementations must deliver exactly one terminal
    /// event (`Loaded` or `Failed`) for the descriptor's id on `events`,
    /// unless the returned handle is dropped first.
    fn load(&self, descriptor: TileDescriptor, events: TileEventSender) -> Box<dyn LoadHandle>;
}

#[cfg(test)]
pub(crate) use tests::MockLoader;
