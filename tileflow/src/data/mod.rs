//! Tile data lifecycle.
//!
//! One [`TileData`] owns the loading/parsing state for one *normalized*
//! tile, independent of how many per-source [`Tile`](crate::source::Tile)
//! wrappers reference it across wrap and overscale levels. The state machine
//! advances only on the map thread: loaders deliver [`TileEvent`]s through a
//! channel and `Source::update` applies them before doing any selection
//! work.
//!
//! A permanent load failure parks the data in `Invalid` with the error
//! recorded; it is never re-requested from here, which keeps a dead tile
//! from turning into a refetch loop. Retry of transient conditions is the
//! loader's job and invisible to this module.

use std::fmt;

use bytes::Bytes;
use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::debug;

use crate::coord::CanonicalTileId;
use crate::loader::{LoadHandle, TileDescriptor, TileLoader};
use crate::source::SourceKind;

/// Lifecycle state of one tile's data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TileState {
    /// No fetch issued yet, or a permanent failure was recorded.
    #[default]
    Invalid,
    /// Fetch in flight.
    Loading,
    /// Usable but incomplete: deferred work (e.g. glyph-dependent layout)
    /// is still outstanding.
    Partial,
    /// Fully processed.
    Parsed,
    /// The owning source invalidated its style/filters; this data must not
    /// be reused.
    Obsolete,
}

impl TileState {
    /// Whether the data can be displayed (possibly with gaps).
    pub fn is_ready(self) -> bool {
        matches!(self, TileState::Partial | TileState::Parsed)
    }
}

/// Permanent, per-tile load failures surfaced to observers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TileError {
    #[error("tile not found")]
    NotFound,
    #[error("malformed tile payload: {0}")]
    Malformed(String),
    #[error("tile load failed: {0}")]
    Transport(String),
}

/// Parameters for symbol/label placement. Equal configs make
/// [`TileData::redo_placement`] a no-op.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlacementConfig {
    /// Camera bearing in radians.
    pub bearing: f64,
}

/// Completion signal delivered by a loader. Exactly one terminal event
/// (`Loaded` or `Failed`) arrives per request; `DependenciesReady` may
/// follow a partial load once shared resources (e.g. glyphs) land.
#[derive(Debug)]
pub enum TileEvent {
    Loaded {
        id: CanonicalTileId,
        payload: Bytes,
        pending_dependencies: bool,
    },
    Failed {
        id: CanonicalTileId,
        error: TileError,
    },
    DependenciesReady {
        id: CanonicalTileId,
    },
}

/// Sending half of a source's completion channel, handed to loaders.
pub type TileEventSender = mpsc::UnboundedSender<TileEvent>;

#[derive(Default)]
struct Inner {
    state: TileState,
    payload: Option<Bytes>,
    pending_dependencies: bool,
    error: Option<TileError>,
    placement: Option<PlacementConfig>,
    placement_generation: u64,
    handle: Option<Box<dyn LoadHandle>>,
    ever_loaded: bool,
}

/// Shared loading/parsing state for one normalized tile.
pub struct TileData {
    id: CanonicalTileId,
    kind: SourceKind,
    inner: Mutex<Inner>,
}

impl TileData {
    pub fn new(id: CanonicalTileId, kind: SourceKind) -> Self {
        Self {
            id,
            kind,
            inner: Mutex::new(Inner::default()),
        }
    }

    pub fn id(&self) -> CanonicalTileId {
        self.id
    }

    pub fn kind(&self) -> SourceKind {
        self.kind
    }

    pub fn state(&self) -> TileState {
        self.inner.lock().state
    }

    pub fn is_ready(&self) -> bool {
        self.state().is_ready()
    }

    /// The recorded permanent failure, if any.
    pub fn error(&self) -> Option<TileError> {
        self.inner.lock().error.clone()
    }

    /// The opaque parsed payload, once any load completed.
    pub fn payload(&self) -> Option<Bytes> {
        self.inner.lock().payload.clone()
    }

    /// Begins the async load. Only the first call from `Invalid` does
    /// anything; repeated calls and calls after a recorded failure are
    /// no-ops, so a tile is fetched at most once per lifecycle.
    pub fn request(
        &self,
        loader: &dyn TileLoader,
        descriptor: TileDescriptor,
        events: TileEventSender,
    ) {
        let mut inner = self.inner.lock();
        if inner.state != TileState::Invalid || inner.error.is_some() {
            return;
        }
        inner.state = TileState::Loading;
        inner.handle = Some(loader.load(descriptor, events));
        debug!(tile = %self.id, "tile fetch started");
    }

    /// Applies a terminal load success. Returns `Some(is_new)` when the
    /// result was accepted (`is_new` distinguishes a first load from a
    /// reparse), or `None` when the data is obsolete and the result is
    /// discarded.
    pub(crate) fn complete_load(&self, payload: Bytes, pending_dependencies: bool) -> Option<bool> {
        let mut inner = self.inner.lock();
        if inner.state == TileState::Obsolete {
            return None;
        }
        let is_new = !inner.ever_loaded;
        inner.ever_loaded = true;
        inner.payload = Some(payload);
        inner.pending_dependencies = pending_dependencies;
        inner.state = if pending_dependencies {
            TileState::Partial
        } else {
            TileState::Parsed
        };
        inner.error = None;
        inner.handle = None;
        Some(is_new)
    }

    /// Applies a terminal load failure. Returns whether the failure was
    /// accepted (obsolete data discards it).
    pub(crate) fn fail(&self, error: TileError) -> bool {
        let mut inner = self.inner.lock();
        if inner.state == TileState::Obsolete {
            return false;
        }
        inner.state = TileState::Invalid;
        inner.error = Some(error);
        inner.handle = None;
        true
    }

    /// Marks a partial tile's outstanding dependencies as arrived. The
    /// state flips to `Parsed` only through [`Self::parse_pending`].
    pub(crate) fn dependencies_ready(&self) {
        let mut inner = self.inner.lock();
        if inner.state == TileState::Partial {
            inner.pending_dependencies = false;
        }
    }

    /// Forces completion of deferred parsing. Returns whether the tile is
    /// now fully resolved. Safe to call in any state.
    pub fn parse_pending(&self) -> bool {
        let mut inner = self.inner.lock();
        match inner.state {
            TileState::Parsed => true,
            TileState::Partial if !inner.pending_dependencies => {
                inner.state = TileState::Parsed;
                debug!(tile = %self.id, "deferred parse completed");
                true
            }
            _ => false,
        }
    }

    /// Re-runs symbol placement against already-parsed geometry. Idempotent
    /// for an unchanged config; returns whether placement actually re-ran.
    pub fn redo_placement(&self, config: PlacementConfig) -> bool {
        let mut inner = self.inner.lock();
        if !inner.state.is_ready() {
            return false;
        }
        if inner.placement == Some(config) {
            return false;
        }
        inner.placement = Some(config);
        inner.placement_generation += 1;
        true
    }

    /// How many times placement has re-run; diagnostic only.
    pub fn placement_generation(&self) -> u64 {
        self.inner.lock().placement_generation
    }

    /// Invalidates the data after a style/filter change. It will never be
    /// reused or transitioned again.
    pub fn make_obsolete(&self) {
        let mut inner = self.inner.lock();
        inner.state = TileState::Obsolete;
        inner.handle = None;
    }

    /// Detaches from the loader. Idempotent, and a no-op once the load
    /// completed. In-flight work may still finish elsewhere; its event is
    /// discarded on arrival.
    pub fn cancel(&self) {
        self.inner.lock().handle = None;
    }
}

impl fmt::Debug for TileData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TileData")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("state", &self.state())
            .finish()
    }
}
