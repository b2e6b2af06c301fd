//! Randomized coarse-to-fine PatchMatch search.
//!
//! Every offset-map entry is improved iteratively: propagation reuses the
//! already-updated left and up neighbors' offsets, random search samples
//! perturbations of the current best offset with geometrically shrinking
//! radius, and halfway through each scale's iterations the finished coarser
//! map (and, on the finest scale, the previous run's solution) is merged in.
//! The scan direction alternates every iteration through the offset map's
//! O(1) flip.
//!
//! Coordinate convention: candidate offsets and their bounds checks are
//! always computed in unflipped coordinates; only neighbor lookup happens in
//! flipped index space. The merge step runs in canonical orientation.

use crate::distance::PatchDistance;
use crate::geom::{Point, Rect};
use crate::image::gradient::{gradient_x, gradient_y};
use crate::image::pyramid::ImagePyramid;
use crate::image::Image;
use crate::offset_map::OffsetMap;
use crate::search::{PatchMatchProvider, SearchConfig};
use crate::trace::{trace_event, trace_span};
use crate::util::math::{derive_seed, pyramid_depth};
use crate::util::{PatchFillError, PatchFillResult};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
#[cfg(feature = "rayon")]
use rayon::prelude::*;
use std::sync::Arc;

const INIT_SEED_SALT: u64 = 0x1234_5678;
const SEARCH_SEED_SALT: u64 = 0xffff_ffff;

type MergeCandidate = (usize, usize, Point, f32);

/// Target image pyramid with optional gradient planes.
struct TargetPlanes {
    pyr: ImagePyramid,
    grads: Vec<(Image, Image)>,
}

/// Randomized approximate nearest-neighbor search over an image pyramid.
///
/// Construction fixes the source image and the target dimensions; the target
/// content itself is supplied through [`set_target_area`] and may be updated
/// between runs, which is what the hole-filling EM iterations do. Each
/// update bumps a counter that flows into the random seeds, so repeated runs
/// on the same target stay bit-reproducible while still exploring different
/// candidates per EM round.
///
/// [`set_target_area`]: RandomizedPatchMatch::set_target_area
pub struct RandomizedPatchMatch {
    source_pyr: ImagePyramid,
    source_grads: Vec<(Image, Image)>,
    target: Option<TargetPlanes>,
    target_width: usize,
    target_height: usize,
    patch_size: usize,
    nr_scales: usize,
    max_search_radius: f32,
    cfg: SearchConfig,
    update_count: u64,
    previous_solution: Option<Arc<OffsetMap>>,
}

impl RandomizedPatchMatch {
    /// Creates a searcher for the given source image and target dimensions.
    ///
    /// Fails fast when the patch does not fit inside the source or the
    /// declared target area, which would leave a grid with no valid patch
    /// position.
    pub fn new(
        source: &Image,
        target_width: usize,
        target_height: usize,
        patch_size: usize,
        cfg: SearchConfig,
    ) -> PatchFillResult<Self> {
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
        if target_width < patch_size || target_height < patch_size {
            return Err(PatchFillError::PatchTooLarge {
                patch_size,
                width: target_width,
                height: target_height,
            });
        }
        let min_dim = source
            .width()
            .min(source.height())
            .min(target_width)
            .min(target_height);
        let depth = pyramid_depth(min_dim, patch_size);
        let source_pyr = ImagePyramid::build(source, depth + 1)?;
        let nr_scales = source_pyr.num_levels() - 1;
        let source_grads = if cfg.lambda > 0.0 {
            source_pyr
                .levels()
                .iter()
                .map(|level| (gradient_x(level), gradient_y(level)))
                .collect()
        } else {
            Vec::new()
        };
        Ok(Self {
            source_pyr,
            source_grads,
            target: None,
            target_width,
            target_height,
            patch_size,
            nr_scales,
            max_search_radius: target_width.max(target_height) as f32,
            cfg,
            update_count: 0,
            previous_solution: None,
        })
    }

    /// Supplies (or replaces) the target content to match against.
    pub fn set_target_area(&mut self, target: &Image) -> PatchFillResult<()> {
        if target.width() != self.target_width || target.height() != self.target_height {
            return Err(PatchFillError::TargetSizeMismatch {
                expected_width: self.target_width,
                expected_height: self.target_height,
                got_width: target.width(),
                got_height: target.height(),
            });
        }
        let source_channels = self.source_pyr.levels()[0].channels();
        if target.channels() != source_channels {
            return Err(PatchFillError::ChannelMismatch {
                expected: source_channels,
                got: target.channels(),
            });
        }
        let pyr = ImagePyramid::build(target, self.nr_scales + 1)?;
        let grads = if self.cfg.lambda > 0.0 {
            pyr.levels()
                .iter()
                .map(|level| (gradient_x(level), gradient_y(level)))
                .collect()
        } else {
            Vec::new()
        };
        self.target = Some(TargetPlanes { pyr, grads });
        self.update_count += 1;
        Ok(())
    }

    /// Number of half-resolution reductions below the full-size input.
    pub fn nr_scales(&self) -> usize {
        self.nr_scales
    }

    fn distance_at<'a>(&'a self, target: &'a TargetPlanes, scale: usize) -> PatchDistance<'a> {
        let source = &self.source_pyr.levels()[scale];
        let target_img = &target.pyr.levels()[scale];
        if self.cfg.lambda > 0.0 {
            let (sgx, sgy) = &self.source_grads[scale];
            let (tgx, tgy) = &target.grads[scale];
            PatchDistance::with_gradients(
                source,
                target_img,
                self.patch_size,
                self.cfg.lambda,
                sgx,
                sgy,
                tgx,
                tgy,
            )
        } else {
            PatchDistance::new(source, target_img, self.patch_size)
        }
    }

    fn solve_scale(
        &self,
        scale: usize,
        target: &TargetPlanes,
        coarser: Option<&OffsetMap>,
        rng: &mut StdRng,
    ) -> PatchFillResult<OffsetMap> {
        let source = &self.source_pyr.levels()[scale];
        let target_img = &target.pyr.levels()[scale];
        if target_img.width() < self.patch_size || target_img.height() < self.patch_size {
            return Err(PatchFillError::PatchTooLarge {
                patch_size: self.patch_size,
                width: target_img.width(),
                height: target_img.height(),
            });
        }
        let grid_width = target_img.width() - self.patch_size + 1;
        let grid_height = target_img.height() - self.patch_size + 1;
        let source_rect = source.bounds();
        let dist = self.distance_at(target, scale);
        let mut map = OffsetMap::new(grid_width, grid_height)?;

        let _span = trace_span!(
            "patch_match_scale",
            scale = scale,
            grid_width = grid_width,
            grid_height = grid_height
        )
        .entered();

        self.initialize_randomly(scale, target, &dist, &mut map);

        for iteration in 0..self.cfg.iterations_per_scale {
            if self.cfg.merge_upsampled && iteration == self.cfg.iterations_per_scale / 2 {
                // The merge works in canonical orientation; an odd iteration
                // count can leave the map flipped at this point.
                let was_flipped = map.is_flipped();
                if was_flipped {
                    map.flip();
                }
                if let Some(coarser) = coarser {
                    self.merge_into(&mut map, coarser, 2, &dist, source_rect);
                }
                if scale == 0 {
                    if let Some(previous) = &self.previous_solution {
                        if previous.width() == map.width()
                            && previous.height() == map.height()
                        {
                            self.merge_into(&mut map, previous, 1, &dist, source_rect);
                        }
                    }
                }
                if was_flipped {
                    map.flip();
                }
            }

            self.sweep(&mut map, &dist, source_rect, rng);
            // Flipping reverses the scan direction of the next sweep, letting
            // good matches propagate from the other side.
            map.flip();
            trace_event!(
                "refinement_iteration",
                scale = scale,
                iteration = iteration,
                summed_distance = map.summed_distance()
            );
        }
        if map.is_flipped() {
            map.flip();
        }
        Ok(map)
    }

    /// Seeds every entry with a uniformly random in-bounds offset.
    fn initialize_randomly(
        &self,
        scale: usize,
        target: &TargetPlanes,
        dist: &PatchDistance<'_>,
        map: &mut OffsetMap,
    ) {
        let source = &self.source_pyr.levels()[scale];
        let target_img = &target.pyr.levels()[scale];
        let mut rng = StdRng::seed_from_u64(derive_seed(
            target_img.width(),
            target_img.height(),
            self.update_count,
            INIT_SEED_SALT,
        ));
        let max_sx = (source.width() - self.patch_size) as i32;
        let max_sy = (source.height() - self.patch_size) as i32;
        for x in 0..map.width() {
            for y in 0..map.height() {
                // Draw the source position, not the offset, so the resulting
                // patch is always in bounds.
                let offset = Point::new(
                    rng.random_range(0..=max_sx) - x as i32,
                    rng.random_range(0..=max_sy) - y as i32,
                );
                let target_pos = Point::new(x as i32, y as i32);
                let initial = dist.distance(target_pos + offset, target_pos, f32::INFINITY);
                let entry = map.entry_mut(y, x);
                entry.offset = offset;
                entry.distance = initial;
            }
        }
    }

    /// One propagation + random-search sweep in the map's current scan order.
    ///
    /// The sweep is sequential by construction: each position reuses the
    /// already-updated left and up neighbors, so parallelizing it would
    /// change the algorithm's convergence behavior.
    fn sweep(
        &self,
        map: &mut OffsetMap,
        dist: &PatchDistance<'_>,
        source_rect: Rect,
        rng: &mut StdRng,
    ) {
        let width = map.width();
        let height = map.height();
        let flipped = map.is_flipped();
        let patch = self.patch_size as i32;
        for x in 0..width {
            for y in 0..height {
                let (xu, yu) = if flipped {
                    (width - 1 - x, height - 1 - y)
                } else {
                    (x, y)
                };
                let target_pos = Point::new(xu as i32, yu as i32);

                if x > 0 {
                    let left = map.at(y, x - 1);
                    update_entry_if_better(
                        map,
                        y,
                        x,
                        target_pos,
                        left.offset,
                        patch,
                        source_rect,
                        dist,
                    );
                }
                if y > 0 {
                    let up = map.at(y - 1, x);
                    update_entry_if_better(
                        map,
                        y,
                        x,
                        target_pos,
                        up.offset,
                        patch,
                        source_rect,
                        dist,
                    );
                }

                if self.cfg.random_search {
                    let current = map.at(y, x).offset;
                    let mut radius = self.max_search_radius;
                    while radius > 1.0 {
                        let candidate = Point::new(
                            current.x + (rng.random_range(-1.0f32..1.0) * radius) as i32,
                            current.y + (rng.random_range(-1.0f32..1.0) * radius) as i32,
                        );
                        update_entry_if_better(
                            map,
                            y,
                            x,
                            target_pos,
                            candidate,
                            patch,
                            source_rect,
                            dist,
                        );
                        radius *= self.cfg.alpha;
                    }
                }
            }
        }
    }

    /// Merges `other`, scaled up by `factor`, into `map` where it improves
    /// entries. Each coarse cell touches exactly one fine cell, so candidate
    /// evaluation is distributed over column ranges and results are applied
    /// afterwards.
    fn merge_into(
        &self,
        map: &mut OffsetMap,
        other: &OffsetMap,
        factor: usize,
        dist: &PatchDistance<'_>,
        source_rect: Rect,
    ) {
        let patch = self.patch_size as i32;
        let accepted: Vec<MergeCandidate> = {
            let current: &OffsetMap = map;
            let eval = |x: usize, y: usize| -> Option<MergeCandidate> {
                let fx = x * factor;
                let fy = y * factor;
                if fx >= current.width() || fy >= current.height() {
                    return None;
                }
                let offset = other.at(y, x).offset * factor as i32;
                let target_pos = Point::new(fx as i32, fy as i32);
                let candidate_rect = Rect::new(
                    target_pos.x + offset.x,
                    target_pos.y + offset.y,
                    patch,
                    patch,
                );
                if !source_rect.contains_rect(&candidate_rect) {
                    return None;
                }
                let bound = current.at(fy, fx).distance;
                let d = dist.distance(candidate_rect.top_left(), target_pos, bound);
                if d < bound {
                    Some((fy, fx, offset, d))
                } else {
                    None
                }
            };
            self.collect_merge_candidates(other, eval)
        };
        for (y, x, offset, d) in accepted {
            let entry = map.entry_mut(y, x);
            if d < entry.distance {
                entry.offset = offset;
                entry.distance = d;
            }
        }
    }

    #[cfg(feature = "rayon")]
    fn collect_merge_candidates<F>(&self, other: &OffsetMap, eval: F) -> Vec<MergeCandidate>
    where
        F: Fn(usize, usize) -> Option<MergeCandidate> + Copy + Send + Sync,
    {
        if self.cfg.parallel {
            (0..other.width())
                .into_par_iter()
                .flat_map_iter(|x| (0..other.height()).filter_map(move |y| eval(x, y)))
                .collect()
        } else {
            (0..other.width())
                .flat_map(|x| (0..other.height()).filter_map(move |y| eval(x, y)))
                .collect()
        }
    }

    #[cfg(not(feature = "rayon"))]
    fn collect_merge_candidates<F>(&self, other: &OffsetMap, eval: F) -> Vec<MergeCandidate>
    where
        F: Fn(usize, usize) -> Option<MergeCandidate> + Copy,
    {
        (0..other.width())
            .flat_map(|x| (0..other.height()).filter_map(move |y| eval(x, y)))
            .collect()
    }
}

impl PatchMatchProvider for RandomizedPatchMatch {
    fn match_offsets(&mut self) -> PatchFillResult<Arc<OffsetMap>> {
        let final_map = {
            let target = self.target.as_ref().ok_or(PatchFillError::TargetAreaNotSet)?;
            let mut rng = StdRng::seed_from_u64(derive_seed(
                self.target_width,
                self.target_height,
                self.update_count,
                SEARCH_SEED_SALT,
            ));
            let mut previous: Option<Arc<OffsetMap>> = None;
            for scale in (0..=self.nr_scales).rev() {
                let map = self.solve_scale(scale, target, previous.as_deref(), &mut rng)?;
                previous = Some(Arc::new(map));
            }
            previous.expect("at least one pyramid scale")
        };
        self.previous_solution = Some(Arc::clone(&final_map));
        Ok(final_map)
    }
}

/// Shared candidate acceptance rule for propagation, random search and merge:
/// evaluate only when the candidate rectangle lies fully inside the source,
/// bound the distance computation by the entry's current distance, replace on
/// strict improvement.
#[allow(clippy::too_many_arguments)]
fn update_entry_if_better(
    map: &mut OffsetMap,
    y: usize,
    x: usize,
    target_pos: Point,
    candidate: Point,
    patch_size: i32,
    source_rect: Rect,
    dist: &PatchDistance<'_>,
) -> bool {
    let candidate_rect = Rect::new(
        target_pos.x + candidate.x,
        target_pos.y + candidate.y,
        patch_size,
        patch_size,
    );
    if !source_rect.contains_rect(&candidate_rect) {
        return false;
    }
    let previous = map.at(y, x).distance;
    let d = dist.distance(candidate_rect.top_left(), target_pos, previous);
    if d < previous {
        let entry = map.entry_mut(y, x);
        entry.offset = candidate;
        entry.distance = d;
        true
    } else {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::update_entry_if_better;
    use crate::distance::PatchDistance;
    use crate::geom::{Point, Rect};
    use crate::image::Image;
    use crate::offset_map::OffsetMap;

    fn ramp_image(width: usize, height: usize) -> Image {
        let data: Vec<f32> = (0..height)
            .flat_map(|y| (0..width).map(move |x| (x + y * width) as f32))
            .collect();
        Image::from_vec(data, width, height, 1).unwrap()
    }

    #[test]
    fn acceptance_rule_is_monotone_and_bounds_checked() {
        let source = ramp_image(10, 10);
        let target = source.clone();
        let dist = PatchDistance::new(&source, &target, 7);
        let source_rect = source.bounds();
        let mut map = OffsetMap::new(4, 4).unwrap();

        // Out-of-bounds candidate: rejected without touching the entry.
        let rejected = update_entry_if_better(
            &mut map,
            0,
            0,
            Point::ZERO,
            Point::new(5, 0),
            7,
            source_rect,
            &dist,
        );
        assert!(!rejected);
        assert!(map.at(0, 0).distance.is_infinite());

        // Exact match: accepted.
        assert!(update_entry_if_better(
            &mut map,
            0,
            0,
            Point::ZERO,
            Point::ZERO,
            7,
            source_rect,
            &dist,
        ));
        assert_eq!(map.at(0, 0).distance, 0.0);

        // Any further candidate cannot beat a zero distance.
        let mut last = map.at(0, 0).distance;
        for candidate in [Point::new(1, 0), Point::new(0, 1), Point::new(3, 3)] {
            update_entry_if_better(
                &mut map,
                0,
                0,
                Point::ZERO,
                candidate,
                7,
                source_rect,
                &dist,
            );
            let now = map.at(0, 0).distance;
            assert!(now <= last);
            last = now;
        }
        assert_eq!(map.at(0, 0).offset, Point::ZERO);
    }
}
