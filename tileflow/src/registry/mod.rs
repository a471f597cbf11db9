//! Shared tile data registry.
//!
//! Maps normalized tile ids to weak references of live [`TileData`], so a
//! second request for the same tile - from another wrap copy, another
//! overscale level, or a later frame - reuses the existing instance instead
//! of starting a duplicate fetch. The registry never keeps data alive on its
//! own; expired entries are pruned lazily by the [`sweep`](TileDataRegistry::sweep)
//! that `Source::update` runs once per pass.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Weak};

use crate::cache::TileCache;
use crate::coord::CanonicalTileId;
use crate::data::{TileData, TileState};

/// Weak-reference map from normalized id to live tile data.
#[derive(Default)]
pub struct TileDataRegistry {
    entries: HashMap<CanonicalTileId, Weak<TileData>>,
}

impl TileDataRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a strong reference to the live data for `id`, if any.
    pub fn find(&self, id: &CanonicalTileId) -> Option<Arc<TileData>> {
        self.entries.get(id).and_then(Weak::upgrade)
    }

    /// Registers `data` under its normalized id. At most one live,
    /// non-obsolete instance may exist per id; re-registering the same
    /// instance (e.g. on cache resurrection) is fine.
    pub fn insert(&mut self, data: &Arc<TileData>) {
        if let Some(live) = self.find(&data.id()) {
            debug_assert!(
                Arc::ptr_eq(&live, data) || live.state() == TileState::Obsolete,
                "second live TileData registered for {}",
                data.id()
            );
        }
        self.entries.insert(data.id(), Arc::downgrade(data));
    }

    /// Drops expired entries and unregisters data no longer referenced by
    /// any active tile. Live data that is neither retained nor resident in
    /// `cache` gets cancelled - nobody is coming back for it.
    pub fn sweep(&mut self, retained: &HashSet<CanonicalTileId>, cache: &TileCache) {
        self.entries.retain(|id, weak| {
            let Some(data) = weak.upgrade() else {
                return false;
            };
            if retained.contains(id) {
                return true;
            }
            if !cache.has(id) {
                data.cancel();
            }
            false
        });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
