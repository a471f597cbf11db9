//! Per-source tile wrapper.

use std::sync::Arc;
use std::time::Duration;

use crate::clip::{ClipId, Renderable};
use crate::coord::{TileId, UnwrappedTileId};
use crate::data::TileData;
use crate::transform::{Mat4, TransformState};

/// One source's binding of a (possibly wrapped or overscaled) tile id to
/// shared tile data, plus the per-frame render outputs: the positioning
/// matrix and the stencil clip assigned by the clip generator.
pub struct Tile {
    pub id: TileId,
    pub data: Arc<TileData>,
    pub matrix: Mat4,
    pub clip: ClipId,
}

impl Tile {
    pub(crate) fn new(id: TileId, data: Arc<TileData>) -> Self {
        Self {
            id,
            data,
            matrix: [0.0; 16],
            clip: ClipId::default(),
        }
    }

    pub fn unwrapped(&self) -> UnwrappedTileId {
        self.id.unwrapped()
    }
}

impl Renderable for Tile {
    fn id(&self) -> UnwrappedTileId {
        self.id.unwrapped()
    }

    fn clip_mut(&mut self) -> &mut ClipId {
        &mut self.clip
    }
}

/// Per-frame inputs to [`Source::update`](crate::source::Source::update).
#[derive(Debug, Clone, Copy)]
pub struct UpdateParameters<'a> {
    pub transform: &'a TransformState,
    /// Animation clock for this frame. A pass with a non-advancing
    /// timestamp is a no-op.
    pub timestamp: Duration,
    /// Whether partially parsed tiles should attempt to finish their
    /// deferred work this frame.
    pub reparse_partial: bool,
}
