//! Retired-tile cache with insertion-order eviction.
//!
//! Holds strong references to parsed tile data that scrolled out of view so
//! a pan back does not refetch it. The policy is deliberately cruder than a
//! touch-on-read LRU: eviction order is the order entries were *added*, and
//! [`get`](TileCache::get) removes the entry outright. Tiles in the active
//! set never touch the cache at all - only retirement inserts and only
//! resurrection removes - so every operation stays O(1)-ish with no
//! per-frame reordering.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use tracing::debug;

use crate::coord::CanonicalTileId;
use crate::data::TileData;

/// Bounded store of retired tile data, evicting oldest-inserted first.
pub struct TileCache {
    size: usize,
    order: VecDeque<CanonicalTileId>,
    entries: HashMap<CanonicalTileId, Arc<TileData>>,
}

impl TileCache {
    pub fn new(size: usize) -> Self {
        Self {
            size,
            order: VecDeque::new(),
            entries: HashMap::new(),
        }
    }

    /// Maximum number of entries; zero disables the cache.
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Resizes the cache, evicting oldest entries when shrinking.
    pub fn set_size(&mut self, size: usize) {
        self.size = size;
        self.shrink();
    }

    /// Inserts retired data. No-op when the cache is disabled or the id is
    /// already resident; insertion is the only thing that counts as a
    /// "touch" for eviction ordering.
    pub fn add(&mut self, data: Arc<TileData>) {
        if self.size == 0 {
            return;
        }
        let id = data.id();
        if self.entries.contains_key(&id) {
            return;
        }
        self.entries.insert(id, data);
        self.order.push_back(id);
        self.shrink();
    }

    /// Takes the data for `id` out of the cache, if resident.
    pub fn get(&mut self, id: &CanonicalTileId) -> Option<Arc<TileData>> {
        let data = self.entries.remove(id)?;
        self.order.retain(|k| k != id);
        Some(data)
    }

    /// Non-removing residency check, used before deciding whether an
    /// unreferenced fetch should be cancelled.
    pub fn has(&self, id: &CanonicalTileId) -> bool {
        self.entries.contains_key(id)
    }

    pub fn clear(&mut self) {
        self.order.clear();
        self.entries.clear();
    }

    fn shrink(&mut self) {
        while self.order.len() > self.size {
            let Some(oldest) = self.order.pop_front() else {
                break;
            };
            if let Some(evicted) = self.entries.remove(&oldest) {
                debug!(tile = %oldest, "evicting cached tile");
                evicted.cancel();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::SourceKind;

    fn data(x: u32) -> Arc<TileData> {
        Arc::new(TileData::new(
            CanonicalTileId::new(4, x, 0),
            SourceKind::Vector,
        ))
    }

    #[test]
    fn test_round_trip_get_is_take() {
        let mut cache = TileCache::new(4);
        let a = data(1);
        cache.add(Arc::clone(&a));

        let got = cache.get(&a.id()).expect("cached data");
        assert!(Arc::ptr_eq(&got, &a));

        // Get removed it; a second get finds nothing.
        assert!(cache.get(&a.id()).is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_has_does_not_remove() {
        let mut cache = TileCache::new(4);
        let a = data(1);
        cache.add(Arc::clone(&a));

        assert!(cache.has(&a.id()));
        assert!(cache.has(&a.id()));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_add_duplicate_is_noop() {
        let mut cache = TileCache::new(4);
        let a = data(1);
        cache.add(Arc::clone(&a));
        cache.add(Arc::clone(&a));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_zero_size_disables_cache() {
        let mut cache = TileCache::new(0);
        let a = data(1);
        cache.add(Arc::clone(&a));
        assert!(cache.is_empty());
        assert!(!cache.has(&a.id()));
    }

    #[test]
    fn test_eviction_is_by_insertion_order() {
        let mut cache = TileCache::new(3);
        let tiles: Vec<_> = (0..4).map(data).collect();

        for tile in &tiles {
            cache.add(Arc::clone(tile));
        }

        // Adding size+1 distinct ids evicts exactly the first-inserted id.
        assert!(!cache.has(&tiles[0].id()));
        for tile in &tiles[1..] {
            assert!(cache.has(&tile.id()));
        }
    }

    #[test]
    fn test_get_does_not_refresh_order() {
        let mut cache = TileCache::new(2);
        let a = data(1);
        let b = data(2);
        let c = data(3);

        cache.add(Arc::clone(&a));
        cache.add(Arc::clone(&b));

        // Taking `a` out and never re-adding it simply removes it; `b` is
        // now the oldest resident.
        cache.get(&a.id());
        cache.add(Arc::clone(&c));
        cache.add(Arc::clone(&a));

        assert!(!cache.has(&b.id()));
        assert!(cache.has(&c.id()));
        assert!(cache.has(&a.id()));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_set_size_shrinks_oldest_first() {
        let mut cache = TileCache::new(4);
        let tiles: Vec<_> = (0..4).map(data).collect();
        for tile in &tiles {
            cache.add(Arc::clone(tile));
        }

        cache.set_size(2);
        assert_eq!(cache.len(), 2);
        assert!(!cache.has(&tiles[0].id()));
        assert!(!cache.has(&tiles[1].id()));
        assert!(cache.has(&tiles[2].id()));
        assert!(cache.has(&tiles[3].id()));
    }

    #[test]
    fn test_clear() {
        let mut cache = TileCache::new(4);
        cache.add(data(1));
        cache.add(data(2));
        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.size(), 4);
    }
}
