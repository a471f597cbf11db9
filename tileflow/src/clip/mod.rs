//! Stencil clip-mask assignment.
//!
//! Overlapping quad-tree levels render into one pass: while an ideal tile
//! loads, an ancestor or a set of descendants stands in for it, and their
//! footprints overlap on screen. [`ClipIdGenerator`] assigns every
//! renderable tile a `(mask, reference)` stencil pair so that each screen
//! region is drawn by exactly one tile and ancestors never paint over
//! higher-detail descendants.
//!
//! Per update pass, tiles not seen before are numbered sequentially within a
//! fresh bit range sized to hold the batch; the range starts at the
//! generator's `bit_offset`, which advances after every pass so masks
//! assigned to earlier, unrelated trees stay valid. The generator is scoped
//! to one frame: create it, feed it every source's renderables, read the
//! result, drop it.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use tracing::{debug, warn};

use crate::coord::UnwrappedTileId;

/// Stencil mask/reference pair for one renderable tile.
#[derive(Clone, Copy, PartialEq, Eq, Default)]
pub struct ClipId {
    pub mask: u8,
    pub reference: u8,
}

impl ClipId {
    pub fn new(mask: u8, reference: u8) -> Self {
        Self { mask, reference }
    }

    /// Whether the generator has assigned bits to this clip yet.
    pub fn is_assigned(&self) -> bool {
        self.reference != 0
    }
}

impl fmt::Debug for ClipId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ClipId {{ mask: {:08b}, reference: {:08b} }}",
            self.mask, self.reference
        )
    }
}

/// A tile that wants a clip id this frame.
pub trait Renderable {
    fn id(&self) -> UnwrappedTileId;
    fn clip_mut(&mut self) -> &mut ClipId;
}

struct Leaf {
    clip: ClipId,
    /// Descendants of this tile seen among the submitted renderables, used
    /// to drop fully covered ancestors from the final clip set.
    children: BTreeSet<UnwrappedTileId>,
}

/// Assigns stencil bits across every source's renderable tiles for one
/// frame.
#[derive(Default)]
pub struct ClipIdGenerator {
    pool: BTreeMap<UnwrappedTileId, Leaf>,
    bit_offset: u8,
}

impl ClipIdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds one source's renderables into the pool and stamps each with
    /// its clip id. Tiles already pooled (same tile from another source, or
    /// a duplicate submission) reuse the computed clip; everything else is
    /// numbered within a fresh bit range.
    pub fn update<'a, R, I>(&mut self, renderables: I)
    where
        R: Renderable + 'a,
        I: IntoIterator<Item = &'a mut R>,
    {
        let mut sorted: Vec<&'a mut R> = renderables.into_iter().collect();
        sorted.sort_by_key(|r| r.id());

        let mut fresh: usize = 0;
        let mut fresh_related_to_assigned = false;
        for index in 0..sorted.len() {
            let id = sorted[index].id();

            // Sorted ascending by (wrap, z, x, y): only later entries can be
            // descendants of this tile.
            let mut children = BTreeSet::new();
            for other in sorted[index + 1..].iter() {
                let candidate = other.id();
                if candidate.is_child_of(&id) {
                    children.insert(candidate);
                }
            }

            if let Some(leaf) = self.pool.get_mut(&id) {
                leaf.children.extend(children);
                continue;
            }

            if self.pool.iter().any(|(existing, leaf)| {
                leaf.clip.is_assigned() && (existing.is_child_of(&id) || id.is_child_of(existing))
            }) {
                fresh_related_to_assigned = true;
            }
            self.pool.insert(
                id,
                Leaf {
                    clip: ClipId::default(),
                    children,
                },
            );
            fresh += 1;
        }

        if fresh > 0 {
            let mut bit_count = ceil_log2(fresh as u64 + 1);
            if bit_count > 8 {
                warn!(
                    tiles = fresh,
                    "more renderable tiles than clip bits can distinguish"
                );
                bit_count = 8;
            }

            if self.bit_offset + bit_count > 8 {
                if fresh_related_to_assigned {
                    // Bits are exhausted and the new tiles overlap already
                    // assigned trees; reusing the low range can alias
                    // siblings but never corrupts assigned state.
                    warn!(
                        needed = self.bit_offset + bit_count,
                        "clip id bits exhausted; sibling disambiguation degraded"
                    );
                } else {
                    debug!("restarting clip bit pool for unrelated forest");
                }
                self.bit_offset = 0;
            }

            let mask = (((1u16 << bit_count) - 1) << self.bit_offset) as u8;
            let mut count: u16 = 1;
            for leaf in self.pool.values_mut() {
                if !leaf.clip.is_assigned() {
                    leaf.clip.mask |= mask;
                    leaf.clip.reference = ((count << self.bit_offset) & 0xff) as u8;
                    count = count.wrapping_add(1);
                }
            }
            self.bit_offset += bit_count;
        }

        for renderable in sorted {
            let id = renderable.id();
            if let Some(leaf) = self.pool.get(&id) {
                *renderable.clip_mut() = leaf.clip;
            }
        }
    }

    /// The clip id for every tile that should stamp the stencil buffer.
    /// Tiles whose submitted descendants fully cover them are omitted: their
    /// footprint is drawn entirely by higher-detail tiles. Stable until the
    /// next [`update`](Self::update).
    pub fn get_clip_ids(&self) -> BTreeMap<UnwrappedTileId, ClipId> {
        self.pool
            .iter()
            .filter(|&(id, leaf)| !Self::fully_covered(id, leaf))
            .map(|(id, leaf)| (*id, leaf.clip))
            .collect()
    }

    fn fully_covered(id: &UnwrappedTileId, leaf: &Leaf) -> bool {
        let Some(max_z) = leaf.children.iter().map(|c| c.canonical.z).max() else {
            return false;
        };
        Self::covered(id, &leaf.children, max_z)
    }

    fn covered(id: &UnwrappedTileId, present: &BTreeSet<UnwrappedTileId>, max_z: u8) -> bool {
        id.children().iter().all(|child| {
            present.contains(child)
                || (child.canonical.z < max_z && Self::covered(child, present, max_z))
        })
    }
}

/// Number of bits needed to hold `x` distinct nonzero values.
fn ceil_log2(x: u64) -> u8 {
    debug_assert!(x >= 1);
    (64 - x.saturating_sub(1).leading_zeros()) as u8
}
