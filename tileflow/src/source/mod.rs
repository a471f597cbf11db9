//! Per-source tile orchestration.
//!
//! A [`Source`] owns the active `{TileId -> Tile}` map for one style source
//! and runs the per-frame update algorithm: cover the viewport, reuse or
//! request tile data, substitute loaded ancestors/descendants for tiles
//! still in flight, retire what scrolled away, and keep the registry and
//! cache consistent. Everything here runs on the map thread; loader results
//! arrive through the source's event channel and are applied at the top of
//! [`Source::update`].

mod info;
mod observer;
mod tile;

pub use info::{SourceError, SourceInfo, SourceKind};
pub use observer::{NullObserver, SourceObserver};
pub use tile::{Tile, UpdateParameters};

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::debug;

use crate::cache::TileCache;
use crate::coord::{CanonicalTileId, TileId};
use crate::cover::tile_cover;
use crate::data::{PlacementConfig, TileData, TileEvent, TileEventSender, TileState};
use crate::loader::{TileDescriptor, TileLoader};
use crate::registry::TileDataRegistry;
use crate::transform::{TransformState, BASE_TILE_SIZE};

/// How far above the ideal zoom the parent fallback search may roam.
const PARENT_SEARCH_RANGE: i32 = 10;

/// Per-style-source tile selection and lifetime orchestrator.
pub struct Source {
    kind: SourceKind,
    info: Option<SourceInfo>,
    loader: Arc<dyn TileLoader>,
    observer: Arc<dyn SourceObserver>,
    tiles: BTreeMap<TileId, Tile>,
    registry: TileDataRegistry,
    cache: TileCache,
    events_tx: TileEventSender,
    events_rx: mpsc::UnboundedReceiver<TileEvent>,
    render_order: Vec<TileId>,
    updated: Option<Duration>,
}

impl Source {
    /// Creates a source whose metadata is not yet known; it stays inert
    /// until [`Self::load_metadata`] or [`Self::set_info`] provides it.
    pub fn new(kind: SourceKind, loader: Arc<dyn TileLoader>) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            kind,
            info: None,
            loader,
            observer: Arc::new(NullObserver),
            tiles: BTreeMap::new(),
            registry: TileDataRegistry::new(),
            cache: TileCache::new(0),
            events_tx,
            events_rx,
            render_order: Vec::new(),
            updated: None,
        }
    }

    /// Creates a source with inline metadata (e.g. a GeoJSON source whose
    /// configuration is part of the style).
    pub fn with_info(kind: SourceKind, info: SourceInfo, loader: Arc<dyn TileLoader>) -> Self {
        let mut source = Self::new(kind, loader);
        source.info = Some(info);
        source
    }

    pub fn set_observer(&mut self, observer: Arc<dyn SourceObserver>) {
        self.observer = observer;
    }

    pub fn kind(&self) -> SourceKind {
        self.kind
    }

    pub fn info(&self) -> Option<&SourceInfo> {
        self.info.as_ref()
    }

    /// Whether metadata has arrived; updates are no-ops until then.
    pub fn is_loaded(&self) -> bool {
        self.info.is_some()
    }

    /// Parses TileJSON-style metadata and unblocks updating.
    pub fn load_metadata(&mut self, json: &str) {
        match SourceInfo::from_json(json) {
            Ok(info) => {
                self.info = Some(info);
                self.observer.on_source_loaded();
            }
            Err(error) => {
                tracing::warn!(error = %error, "source metadata rejected");
                self.observer.on_source_error(&error);
            }
        }
    }

    pub fn set_info(&mut self, info: SourceInfo) {
        self.info = Some(info);
        self.observer.on_source_loaded();
    }

    /// Runs one selection pass. Returns whether every *required* tile
    /// reached its fully parsed state; callers use a `false` to schedule
    /// another frame soon.
    ///
    /// Idempotent under a non-advancing timestamp, and a no-op before
    /// metadata arrives.
    pub fn update(&mut self, params: UpdateParameters<'_>) -> bool {
        // Marshalling point: loader completions only ever apply here, on
        // the map thread.
        self.apply_events();

        let Some(info) = self.info.clone() else {
            return true;
        };
        if let Some(updated) = self.updated {
            if params.timestamp <= updated {
                return true;
            }
        }

        let transform = params.transform;
        let zoom = self
            .covering_zoom_level(transform, &info)
            .clamp(info.min_zoom as i32, info.max_zoom as i32) as u8;
        let min_covering_zoom = (zoom as i32 - PARENT_SEARCH_RANGE)
            .clamp(info.min_zoom as i32, info.max_zoom as i32) as u8;
        let max_covering_zoom =
            (zoom as i32 + 1).clamp(info.min_zoom as i32, info.max_zoom as i32) as u8;

        let required = tile_cover(transform, zoom);
        let mut retain: BTreeSet<TileId> = required.iter().copied().collect();

        let mut all_tiles_updated = true;
        for id in &required {
            let mut state = self.has_tile(id);
            match state {
                TileState::Partial if params.reparse_partial => {
                    if !self.handle_partial_tile(id, &info) {
                        all_tiles_updated = false;
                    }
                    state = self.has_tile(id);
                }
                TileState::Invalid => {
                    state = self.add_tile_inner(*id, &info);
                }
                _ => {}
            }

            if !state.is_ready() {
                all_tiles_updated = false;

                // The tile we need is not displayable yet. Loaded children
                // give exact detail for part of the area; a parent gives
                // blurred detail for all of it. Prefer precision, and only
                // fall back upward when the children leave gaps.
                let complete = self.find_loaded_children(id, max_covering_zoom, &mut retain);
                if !complete {
                    self.find_loaded_parent(id, min_covering_zoom, &mut retain);
                }
            } else if state != TileState::Parsed {
                all_tiles_updated = false;
            }
        }

        // Deferred until first use: viewport dimensions are not final at
        // construction time.
        if self.kind.caches_retired_tiles() && self.cache.size() == 0 {
            let tile_px = f64::from(info.tile_size);
            let zoom_span = transform.max_zoom() - transform.min_zoom() + 1.0;
            let conservative =
                (transform.width() / tile_px) * (transform.height() / tile_px) * zoom_span * 0.5;
            self.cache.set_size(conservative.ceil() as usize);
            debug!(size = self.cache.size(), "sized retired-tile cache");
        }

        // Retire everything the pass did not ask to keep. Parsed non-raster
        // retirees go back to the cache; partial tiles do not, because a
        // resurrected partial would have lost its pending completion and
        // could never finish.
        let mut retain_data: HashSet<CanonicalTileId> = HashSet::new();
        let kind = self.kind;
        let cache = &mut self.cache;
        self.tiles.retain(|id, tile| {
            if retain.contains(id) {
                retain_data.insert(tile.data.id());
                true
            } else {
                if kind.caches_retired_tiles() && tile.data.state() == TileState::Parsed {
                    cache.add(Arc::clone(&tile.data));
                }
                debug!(tile = %id, "retired tile");
                false
            }
        });

        // Unreferenced fetches that are not cache-resident are abandoned.
        self.registry.sweep(&retain_data, &self.cache);

        // Re-derive the flat render list, refresh matrices and re-run
        // placement against the current camera.
        self.render_order = self.tiles.keys().copied().collect();

        let placement = PlacementConfig {
            bearing: transform.bearing(),
        };
        let mut placement_changed = false;
        for tile in self.tiles.values_mut() {
            tile.matrix = transform.matrix_for(&tile.id.unwrapped());
            if tile.data.redo_placement(placement) {
                placement_changed = true;
            }
        }
        if placement_changed {
            self.observer.on_placement_redone();
        }

        self.updated = Some(params.timestamp);
        all_tiles_updated
    }

    /// Creates (or revives) the tile for `id`, resolving its data from the
    /// registry, then the cache, then a fresh request - in that order.
    /// Returns the resolved data state.
    pub fn add_tile(&mut self, id: TileId) -> TileState {
        let Some(info) = self.info.clone() else {
            return TileState::Invalid;
        };
        self.add_tile_inner(id, &info)
    }

    /// Marks every live tile's data obsolete after a style/filter change:
    /// nothing currently held may be reused. The next update re-requests
    /// the viewport from scratch.
    pub fn invalidate_tiles(&mut self) {
        for tile in self.tiles.values() {
            tile.data.make_obsolete();
        }
        self.tiles.clear();
        self.render_order.clear();
        self.cache.clear();
        self.updated = None;
    }

    /// State of the active tile for `id`; `Invalid` when absent.
    pub fn tile_state(&self, id: &TileId) -> TileState {
        self.has_tile(id)
    }

    pub fn tile(&self, id: &TileId) -> Option<&Tile> {
        self.tiles.get(id)
    }

    /// Active tiles in render order.
    pub fn render_tiles(&self) -> impl Iterator<Item = &Tile> {
        self.tiles.values()
    }

    /// Mutable pass over the active tiles, used to feed the clip generator.
    pub fn render_tiles_mut(&mut self) -> impl Iterator<Item = &mut Tile> {
        self.tiles.values_mut()
    }

    /// Active tiles whose data is displayable.
    pub fn loaded_tiles(&self) -> impl Iterator<Item = &Tile> {
        self.tiles.values().filter(|tile| tile.data.is_ready())
    }

    /// The flat render list re-derived by the last update.
    pub fn render_order(&self) -> &[TileId] {
        &self.render_order
    }

    pub fn cache(&self) -> &TileCache {
        &self.cache
    }

    pub fn registry(&self) -> &TileDataRegistry {
        &self.registry
    }

    fn apply_events(&mut self) {
        while let Ok(event) = self.events_rx.try_recv() {
            match event {
                TileEvent::Loaded {
                    id,
                    payload,
                    pending_dependencies,
                } => match self.registry.find(&id) {
                    Some(data) => {
                        if let Some(is_new) = data.complete_load(payload, pending_dependencies) {
                            self.observer.on_tile_loaded(id, is_new);
                        }
                    }
                    None => debug!(tile = %id, "dropping load result for unknown tile"),
                },
                TileEvent::Failed { id, error } => {
                    if let Some(data) = self.registry.find(&id) {
                        if data.fail(error.clone()) {
                            debug!(tile = %id, error = %error, "tile failed");
                            self.observer.on_tile_error(id, &error);
                        }
                    }
                }
                TileEvent::DependenciesReady { id } => {
                    if let Some(data) = self.registry.find(&id) {
                        data.dependencies_ready();
                    }
                }
            }
        }
    }

    /// Integer zoom the cover runs at. Sources with smaller tiles load one
    /// level deeper so on-screen density stays constant.
    fn covering_zoom_level(&self, transform: &TransformState, info: &SourceInfo) -> i32 {
        let offset = (BASE_TILE_SIZE / f64::from(info.tile_size)).log2();
        let zoom = transform.zoom() + offset;
        if self.kind.rounds_zoom() {
            zoom.round() as i32
        } else {
            zoom.floor() as i32
        }
    }

    fn has_tile(&self, id: &TileId) -> TileState {
        self.tiles
            .get(id)
            .map(|tile| tile.data.state())
            .unwrap_or(TileState::Invalid)
    }

    fn add_tile_inner(&mut self, id: TileId, info: &SourceInfo) -> TileState {
        if self.tiles.contains_key(&id) {
            return self.has_tile(&id);
        }

        let normalized = id.normalized(info.max_zoom);

        let mut data = self.registry.find(&normalized);
        if let Some(existing) = &data {
            if existing.state() == TileState::Obsolete {
                data = None;
            }
        }
        if data.is_none() {
            data = self
                .cache
                .get(&normalized)
                .filter(|cached| cached.state() != TileState::Obsolete);
            if data.is_some() {
                debug!(tile = %normalized, "resurrected tile from cache");
            }
        }

        let data = match data {
            Some(data) => {
                self.registry.insert(&data);
                data
            }
            None => {
                let data = Arc::new(TileData::new(normalized, self.kind));
                let descriptor = TileDescriptor {
                    id: normalized,
                    kind: self.kind,
                    url: info.url_for(&normalized),
                };
                data.request(self.loader.as_ref(), descriptor, self.events_tx.clone());
                self.registry.insert(&data);
                data
            }
        };

        let state = data.state();
        self.tiles.insert(id, Tile::new(id, data));
        debug!(tile = %id, state = ?state, "added tile");
        state
    }

    fn handle_partial_tile(&self, id: &TileId, info: &SourceInfo) -> bool {
        let normalized = id.normalized(info.max_zoom);
        let Some(data) = self.registry.find(&normalized) else {
            return true;
        };
        let resolved = data.parse_pending();
        if resolved {
            self.observer.on_tile_loaded(normalized, false);
        }
        resolved
    }

    /// Collects already-displayable descendants of `id` into `retain`,
    /// descending at most to `max_covering_zoom`. Returns whether the
    /// collected tiles fully cover the footprint with parsed data.
    fn find_loaded_children(
        &self,
        id: &TileId,
        max_covering_zoom: u8,
        retain: &mut BTreeSet<TileId>,
    ) -> bool {
        let mut complete = true;
        for child in id.children() {
            let state = self.has_tile(&child);
            if state.is_ready() {
                retain.insert(child);
            }
            if state != TileState::Parsed {
                complete = false;
                if child.z < max_covering_zoom {
                    self.find_loaded_children(&child, max_covering_zoom, retain);
                }
            }
        }
        complete
    }

    /// Walks up from `id`, retaining the first displayable ancestor. A
    /// partial ancestor still leaves gaps, so the walk keeps going past it
    /// and only a fully parsed ancestor stops the search.
    fn find_loaded_parent(&self, id: &TileId, min_covering_zoom: u8, retain: &mut BTreeSet<TileId>) {
        let mut z = id.z as i32 - 1;
        while z >= min_covering_zoom as i32 {
            let parent = id.scaled_to(z as u8);
            let state = self.has_tile(&parent);
            if state.is_ready() {
                retain.insert(parent);
            }
            if state == TileState::Parsed {
                return;
            }
            z -= 1;
        }
    }
}
