//! Exhaustive reference search.
//!
//! For every target grid position the entire source image is scanned and the
//! first strict minimum kept. The cost is O(source pixels x target pixels),
//! so this only serves as a correctness oracle for the randomized search;
//! rows are independent and distributed over a worker pool when the `rayon`
//! feature is enabled.

use crate::distance::PatchDistance;
use crate::geom::Point;
use crate::image::Image;
use crate::offset_map::{OffsetMap, OffsetMapEntry};
use crate::search::PatchMatchProvider;
use crate::trace::trace_span;
use crate::util::{PatchFillError, PatchFillResult};
#[cfg(feature = "rayon")]
use rayon::prelude::*;
use std::sync::Arc;

/// Brute-force patch matcher used as ground truth in tests.
pub struct ExhaustivePatchMatch {
    source: Image,
    target: Image,
    patch_size: usize,
    parallel: bool,
}

impl ExhaustivePatchMatch {
    /// Creates an oracle for the given source/target pair.
    pub fn new(source: &Image, target: &Image, patch_size: usize) -> PatchFillResult<Self> {
        if patch_size == 0 {
            return Err(PatchFillError::InvalidPatchSize);
        }
        if source.width() < patch_size || source.height() < patch_size {
            return Err(PatchFillError::PatchTooLarge {
                patch_size,
                width: source.width(),
                height: source.height(),
            });
        }
        if target.width() < patch_size || target.height() < patch_size {
            return Err(PatchFillError::PatchTooLarge {
                patch_size,
                width: target.width(),
                height: target.height(),
            });
        }
        if source.channels() != target.channels() {
            return Err(PatchFillError::ChannelMismatch {
                expected: source.channels(),
                got: target.channels(),
            });
        }
        Ok(Self {
            source: source.clone(),
            target: target.clone(),
            patch_size,
            parallel: true,
        })
    }

    /// Disables or enables row-parallel scanning.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    fn best_row(&self, y: usize, grid_width: usize, dist: &PatchDistance<'_>) -> Vec<OffsetMapEntry> {
        let max_sx = self.source.width() - self.patch_size;
        let max_sy = self.source.height() - self.patch_size;
        (0..grid_width)
            .map(|x| {
                let target_pos = Point::new(x as i32, y as i32);
                let mut best = OffsetMapEntry::default();
                for sy in 0..=max_sy {
                    for sx in 0..=max_sx {
                        let d = dist.distance(
                            Point::new(sx as i32, sy as i32),
                            target_pos,
                            best.distance,
                        );
                        if d < best.distance {
                            best.offset = Point::new(sx as i32 - x as i32, sy as i32 - y as i32);
                            best.distance = d;
                        }
                    }
                }
                best
            })
            .collect()
    }

    #[cfg(feature = "rayon")]
    fn scan_rows(
        &self,
        grid_width: usize,
        grid_height: usize,
        dist: &PatchDistance<'_>,
    ) -> Vec<Vec<OffsetMapEntry>> {
        if self.parallel {
            (0..grid_height)
                .into_par_iter()
                .map(|y| self.best_row(y, grid_width, dist))
                .collect()
        } else {
            (0..grid_height)
                .map(|y| self.best_row(y, grid_width, dist))
                .collect()
        }
    }

    #[cfg(not(feature = "rayon"))]
    fn scan_rows(
        &self,
        grid_width: usize,
        grid_height: usize,
        dist: &PatchDistance<'_>,
    ) -> Vec<Vec<OffsetMapEntry>> {
        (0..grid_height)
            .map(|y| self.best_row(y, grid_width, dist))
            .collect()
    }
}

impl PatchMatchProvider for ExhaustivePatchMatch {
    fn match_offsets(&mut self) -> PatchFillResult<Arc<OffsetMap>> {
        let grid_width = self.target.width() - self.patch_size + 1;
        let grid_height = self.target.height() - self.patch_size + 1;
        let _span = trace_span!(
            "exhaustive_match",
            grid_width = grid_width,
            grid_height = grid_height
        )
        .entered();
        let dist = PatchDistance::new(&self.source, &self.target, self.patch_size);
        let rows = self.scan_rows(grid_width, grid_height, &dist);
        let mut map = OffsetMap::new(grid_width, grid_height)?;
        for (y, row) in rows.into_iter().enumerate() {
            for (x, entry) in row.into_iter().enumerate() {
                *map.entry_mut(y, x) = entry;
            }
        }
        Ok(Arc::new(map))
    }
}
