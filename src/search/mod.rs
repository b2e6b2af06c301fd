//! Search providers producing offset maps.
//!
//! Both the randomized multi-scale search and the exhaustive oracle
//! implement [`PatchMatchProvider`], so callers (the hole-filling driver,
//! tests) can swap one for the other without change.

pub(crate) mod exhaustive;
pub(crate) mod randomized;

pub use exhaustive::ExhaustivePatchMatch;
pub use randomized::RandomizedPatchMatch;

use crate::offset_map::OffsetMap;
use crate::util::PatchFillResult;
use std::sync::Arc;

/// Produces an offset map matching every target patch to a source patch.
pub trait PatchMatchProvider {
    /// Runs the search and returns the populated offset map.
    ///
    /// The map is reference counted so it can outlive the pass that produced
    /// it; the next finer scale's merge step and the voted reconstruction
    /// both hold on to it.
    fn match_offsets(&mut self) -> PatchFillResult<Arc<OffsetMap>>;
}

/// Tuning knobs for the randomized search.
#[derive(Clone, Copy, Debug)]
pub struct SearchConfig {
    /// Propagation/random-search sweeps per pyramid scale.
    pub iterations_per_scale: usize,
    /// Geometric decay factor of the random-search radius; higher means more
    /// samples per entry.
    pub alpha: f32,
    /// Weight of the gradient term in the patch distance; 0 disables the
    /// gradient pyramids entirely.
    pub lambda: f32,
    /// Whether entries are refined by random search in addition to
    /// propagation.
    pub random_search: bool,
    /// Whether the coarser scale's result is merged into the current scale
    /// halfway through its iterations.
    pub merge_upsampled: bool,
    /// Distribute the merge step over a worker pool (needs the `rayon`
    /// feature to take effect).
    pub parallel: bool,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            iterations_per_scale: 5,
            alpha: 0.5,
            lambda: 0.0,
            random_search: true,
            merge_upsampled: true,
            parallel: true,
        }
    }
}
