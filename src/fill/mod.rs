//! Multi-scale hole filling.
//!
//! Orchestrates the randomized search and the voted reconstruction over an
//! image pyramid, coarsest scale first. Each scale runs a fixed number of
//! EM-style rounds: re-search the hole region's current guess against the
//! sentinel-masked source, re-reconstruct the hole from the resulting offset
//! map, write the result back into the hole pixels only. Between scales the
//! solution is upsampled, preferably by re-running the voted reconstruction
//! against the coarser offset map scaled up by two, which preserves patch
//! consistency better than plain interpolation.

use crate::geom::Rect;
use crate::image::pyramid::{ImagePyramid, MaskPyramid};
use crate::image::{Image, Mask};
use crate::offset_map::OffsetMap;
use crate::reconstruct::{VoteConfig, VotedReconstruction};
use crate::search::{PatchMatchProvider, RandomizedPatchMatch, SearchConfig};
use crate::trace::{trace_event, trace_span};
use crate::util::math::{lerp, pyramid_depth};
use crate::util::{PatchFillError, PatchFillResult};
use std::sync::Arc;

/// Sentinel written over hole pixels of the search source. Any patch
/// overlapping the hole scores a huge distance, so the search cannot fill
/// the hole with its own unfilled content.
const HOLE_SENTINEL: f32 = 1.0e4;

/// Mean-shift bandwidth scale annealing range across the EM steps: early
/// rounds tolerate diverse contributions, late rounds converge to a sharp
/// answer.
const BANDWIDTH_START: f32 = 3.0;
const BANDWIDTH_END: f32 = 0.2;

/// Tuning knobs for the hole-filling driver.
#[derive(Clone, Copy, Debug)]
pub struct FillConfig {
    /// Side length of the square comparison patches.
    pub patch_size: usize,
    /// Search-then-reconstruct rounds per pyramid scale.
    pub em_steps: usize,
    /// Initialize finer scales by reconstructing against the upscaled
    /// coarser offset map instead of bilinear interpolation.
    pub wexler_upsample: bool,
    /// Settings of the randomized search.
    pub search: SearchConfig,
    /// Settings of the voted reconstruction.
    pub vote: VoteConfig,
}

impl Default for FillConfig {
    fn default() -> Self {
        Self {
            patch_size: 7,
            em_steps: 10,
            wexler_upsample: true,
            search: SearchConfig::default(),
            vote: VoteConfig {
                mode_seeking: true,
                ..VoteConfig::default()
            },
        }
    }
}

/// Fills a masked hole region by borrowing patches from the rest of the
/// image across a multi-resolution pyramid.
pub struct HoleFilling {
    img_pyr: ImagePyramid,
    hole_pyr: MaskPyramid,
    target_rect_pyr: Vec<Rect>,
    nr_scales: usize,
    cfg: FillConfig,
    offset_map: Option<Arc<OffsetMap>>,
}

impl HoleFilling {
    /// Validates the geometry and builds the image and mask pyramids.
    pub fn new(img: &Image, hole: &Mask, cfg: FillConfig) -> PatchFillResult<Self> {
        if cfg.patch_size == 0 {
            return Err(PatchFillError::InvalidPatchSize);
        }
        if hole.width() != img.width() || hole.height() != img.height() {
            return Err(PatchFillError::MaskSizeMismatch {
                img_width: img.width(),
                img_height: img.height(),
                mask_width: hole.width(),
                mask_height: hole.height(),
            });
        }
        let hole_pixels = hole.count_set();
        if hole_pixels == 0 {
            return Err(PatchFillError::EmptyHoleMask);
        }
        if hole_pixels == img.width() * img.height() {
            return Err(PatchFillError::HoleCoversImage);
        }
        if img.width() < cfg.patch_size || img.height() < cfg.patch_size {
            return Err(PatchFillError::PatchTooLarge {
                patch_size: cfg.patch_size,
                width: img.width(),
                height: img.height(),
            });
        }

        let depth = pyramid_depth(img.width().min(img.height()), cfg.patch_size);
        let img_pyr = ImagePyramid::build(img, depth + 1)?;
        let hole_pyr = MaskPyramid::build(hole, depth + 1)?;
        let nr_scales = img_pyr.num_levels().min(hole_pyr.num_levels()) - 1;

        let margin = cfg.patch_size as i32 - 1;
        let mut target_rect_pyr = Vec::with_capacity(nr_scales + 1);
        for scale in 0..=nr_scales {
            let level_img = img_pyr.level(scale).expect("pyramid level exists");
            let level_hole = hole_pyr.level(scale).expect("pyramid level exists");
            let bbox = level_hole
                .bounding_box()
                .expect("mask reduction preserves nonempty masks");
            target_rect_pyr.push(bbox.expand(margin).intersect(&level_img.bounds()));
        }

        Ok(Self {
            img_pyr,
            hole_pyr,
            target_rect_pyr,
            nr_scales,
            cfg,
            offset_map: None,
        })
    }

    /// Number of half-resolution reductions below the full-size input.
    pub fn nr_scales(&self) -> usize {
        self.nr_scales
    }

    /// Hole bounding box expanded by `patch_size - 1` and clipped, at the
    /// given pyramid scale.
    pub fn target_rect(&self, scale: usize) -> Option<Rect> {
        self.target_rect_pyr.get(scale).copied()
    }

    /// Finest-scale offset map of the last completed [`run`](Self::run).
    pub fn offset_map(&self) -> Option<&Arc<OffsetMap>> {
        self.offset_map.as_ref()
    }

    /// Fills the hole and returns the composited image: original pixels
    /// outside the hole, reconstructed pixels inside.
    pub fn run(&mut self) -> PatchFillResult<Image> {
        let mut previous_solution: Option<Image> = None;
        let mut previous_map: Option<Arc<OffsetMap>> = None;

        for scale in (0..=self.nr_scales).rev() {
            let img_s = self.img_pyr.level(scale).expect("pyramid level exists");
            let hole_s = self.hole_pyr.level(scale).expect("pyramid level exists");
            let rect = self.target_rect_pyr[scale];
            let _span = trace_span!(
                "fill_scale",
                scale = scale,
                rect_width = rect.width,
                rect_height = rect.height
            )
            .entered();

            let mut source = img_s.clone();
            let sentinel = vec![HOLE_SENTINEL; img_s.channels()];
            source.fill_masked(hole_s, &sentinel)?;

            let mut guess = img_s.clone();
            if scale == self.nr_scales {
                let mean = match guess.mean_color_excluding(hole_s, Some(rect))? {
                    Some(mean) => mean,
                    None => guess
                        .mean_color_excluding(hole_s, None)?
                        .expect("hole does not cover the whole image"),
                };
                guess.fill_masked(hole_s, &mean)?;
            } else {
                let coarse = previous_solution
                    .take()
                    .expect("coarser scale produced a solution");
                let upsampled = coarse
                    .resize_bilinear(img_s.width(), img_s.height())?
                    .crop(rect)?;
                let init = match previous_map.as_deref() {
                    Some(map) if self.cfg.wexler_upsample => {
                        self.upsampled_initialization(map, &source, rect, upsampled)?
                    }
                    _ => upsampled,
                };
                for y in rect.y..rect.bottom() {
                    for x in rect.x..rect.right() {
                        if hole_s.is_set(x as usize, y as usize) {
                            let local_x = (x - rect.x) as usize;
                            let local_y = (y - rect.y) as usize;
                            guess.set_pixel(x as usize, y as usize, init.pixel(local_x, local_y));
                        }
                    }
                }
            }

            let mut searcher = RandomizedPatchMatch::new(
                &source,
                rect.width as usize,
                rect.height as usize,
                self.cfg.patch_size,
                self.cfg.search,
            )?;
            let hole_crop = hole_s.crop(rect)?;
            let mut scale_map: Option<Arc<OffsetMap>> = None;

            for step in 0..self.cfg.em_steps {
                let target_area = guess.crop(rect)?;
                searcher.set_target_area(&target_area)?;
                let map = searcher.match_offsets()?;

                let t = if self.cfg.em_steps > 1 {
                    step as f32 / (self.cfg.em_steps - 1) as f32
                } else {
                    1.0
                };
                let vote_cfg = VoteConfig {
                    bandwidth_scale: lerp(BANDWIDTH_START, BANDWIDTH_END, t),
                    ..self.cfg.vote
                };
                let reconstruction =
                    VotedReconstruction::new(&map, &source, self.cfg.patch_size, vote_cfg)?
                        .reconstruct(Some(&hole_crop))?;

                for y in 0..rect.height as usize {
                    for x in 0..rect.width as usize {
                        if hole_crop.is_set(x, y) {
                            guess.set_pixel(
                                rect.x as usize + x,
                                rect.y as usize + y,
                                reconstruction.pixel(x, y),
                            );
                        }
                    }
                }
                trace_event!(
                    "em_step",
                    scale = scale,
                    step = step,
                    summed_distance = map.summed_distance()
                );
                scale_map = Some(map);
            }

            previous_solution = Some(guess);
            previous_map = scale_map;
        }

        self.offset_map = previous_map;
        Ok(previous_solution.expect("at least one pyramid scale"))
    }

    /// Wexler-style initialization of a finer scale: every fine grid cell
    /// borrows its coarse cell's offset scaled by two, then the hole region
    /// is reconstructed against the fine source. Out-of-bounds scaled
    /// offsets are dropped by the reconstruction's bounds check; pixels left
    /// uncovered that way keep their bilinearly upsampled value.
    fn upsampled_initialization(
        &self,
        coarse_map: &OffsetMap,
        source: &Image,
        rect: Rect,
        background: Image,
    ) -> PatchFillResult<Image> {
        let grid_width = rect.width as usize - self.cfg.patch_size + 1;
        let grid_height = rect.height as usize - self.cfg.patch_size + 1;
        let mut scaled = OffsetMap::new(grid_width, grid_height)?;
        for y in 0..grid_height {
            for x in 0..grid_width {
                let cy = (y / 2).min(coarse_map.height() - 1);
                let cx = (x / 2).min(coarse_map.width() - 1);
                let coarse = coarse_map.at(cy, cx);
                let entry = scaled.entry_mut(y, x);
                entry.offset = coarse.offset * 2;
                entry.distance = coarse.distance;
            }
        }
        let vote_cfg = VoteConfig {
            mode_seeking: false,
            ..self.cfg.vote
        };
        VotedReconstruction::new(&scaled, source, self.cfg.patch_size, vote_cfg)?
            .reconstruct_over(background, None)
    }
}
