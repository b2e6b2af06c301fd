//! Image synthesis from a completed offset map.
//!
//! Every grid position deposits its matched source patch onto the output,
//! weighted by patch similarity; a weight accumulator per output pixel
//! normalizes the result. The optional mode-seeking refinement replaces the
//! weighted average with the dominant color cluster of the contributions,
//! which suppresses ghosting when a minority of bad matches would otherwise
//! blend into the majority answer.

pub(crate) mod meanshift;
pub(crate) mod trivial;

pub use trivial::TrivialReconstruction;

use crate::geom::Rect;
use crate::image::{Image, Mask};
use crate::offset_map::OffsetMap;
use crate::trace::trace_span;
use crate::util::{PatchFillError, PatchFillResult};
#[cfg(feature = "rayon")]
use rayon::prelude::*;

/// Guard against a zero similarity bandwidth when most entries match exactly.
const MIN_SIGMA_SQR: f32 = 1e-6;

/// Tuning knobs for the voted reconstruction.
#[derive(Clone, Copy, Debug)]
pub struct VoteConfig {
    /// Weight contributions by `exp(-sqrt(d) / (2 sigma^2))` with sigma the
    /// map's 75th-percentile distance; every patch weighs 1 when disabled.
    pub weighted_by_similarity: bool,
    /// Resolve each pixel to its dominant contribution cluster instead of
    /// the weighted average.
    pub mode_seeking: bool,
    /// Mean-shift bandwidth as a multiple of the average channel standard
    /// deviation of a pixel's contributions.
    pub bandwidth_scale: f32,
    /// Distribute the per-pixel mode-seeking pass over a worker pool (needs
    /// the `rayon` feature to take effect).
    pub parallel: bool,
}

impl Default for VoteConfig {
    fn default() -> Self {
        Self {
            weighted_by_similarity: true,
            mode_seeking: false,
            bandwidth_scale: 1.0,
            parallel: true,
        }
    }
}

/// Weighted-voting reconstruction over an offset map's footprint.
pub struct VotedReconstruction<'a> {
    offset_map: &'a OffsetMap,
    source: &'a Image,
    patch_size: usize,
    cfg: VoteConfig,
}

impl<'a> VotedReconstruction<'a> {
    pub fn new(
        offset_map: &'a OffsetMap,
        source: &'a Image,
        patch_size: usize,
        cfg: VoteConfig,
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
        Ok(Self {
            offset_map,
            source,
            patch_size,
            cfg,
        })
    }

    /// Synthesizes the image covered by the offset map's grid.
    ///
    /// When `hole` is given (same dimensions as the output), contributions
    /// are deposited onto hole pixels only; pixels that accumulate no weight
    /// are skipped and stay zero. Matched rectangles that fall outside the
    /// source are skipped silently, which only happens for the upscaled maps
    /// used to initialize a finer scale.
    pub fn reconstruct(&self, hole: Option<&Mask>) -> PatchFillResult<Image> {
        let width = self.offset_map.width() + self.patch_size - 1;
        let height = self.offset_map.height() + self.patch_size - 1;
        let background = Image::new(width, height, self.source.channels())?;
        self.reconstruct_over(background, hole)
    }

    /// Like [`reconstruct`](Self::reconstruct), but pixels that accumulate
    /// no weight keep their value from `background` instead of staying zero.
    pub fn reconstruct_over(
        &self,
        background: Image,
        hole: Option<&Mask>,
    ) -> PatchFillResult<Image> {
        let width = self.offset_map.width() + self.patch_size - 1;
        let height = self.offset_map.height() + self.patch_size - 1;
        let channels = self.source.channels();
        if background.width() != width
            || background.height() != height
            || background.channels() != channels
        {
            return Err(PatchFillError::RegionOutOfBounds {
                x: 0,
                y: 0,
                width: background.width() as i32,
                height: background.height() as i32,
                img_width: width,
                img_height: height,
            });
        }
        if let Some(mask) = hole {
            if mask.width() != width || mask.height() != height {
                return Err(PatchFillError::MaskSizeMismatch {
                    img_width: width,
                    img_height: height,
                    mask_width: mask.width(),
                    mask_height: mask.height(),
                });
            }
        }
        let _span = trace_span!(
            "voted_reconstruction",
            width = width,
            height = height,
            mode_seeking = self.cfg.mode_seeking
        )
        .entered();

        let sigma = self.offset_map.percentile75_distance();
        let sigma_sqr = (sigma * sigma).max(MIN_SIGMA_SQR);

        if self.cfg.mode_seeking {
            self.reconstruct_modes(background, sigma_sqr, hole)
        } else {
            self.reconstruct_average(background, sigma_sqr, hole)
        }
    }

    fn weight_of(&self, distance: f32, sigma_sqr: f32) -> f32 {
        if self.cfg.weighted_by_similarity {
            (-distance.sqrt() / (2.0 * sigma_sqr)).exp()
        } else {
            1.0
        }
    }

    /// Calls `deposit(output x, output y, source x, source y, weight)` for
    /// every pixel of every valid matched patch.
    fn for_each_contribution<F>(&self, hole: Option<&Mask>, sigma_sqr: f32, mut deposit: F)
    where
        F: FnMut(usize, usize, usize, usize, f32),
    {
        let patch = self.patch_size;
        let source_bounds = self.source.bounds();
        for gy in 0..self.offset_map.height() {
            for gx in 0..self.offset_map.width() {
                let entry = self.offset_map.at(gy, gx);
                let sx = gx as i32 + entry.offset.x;
                let sy = gy as i32 + entry.offset.y;
                let matched = Rect::new(sx, sy, patch as i32, patch as i32);
                if !source_bounds.contains_rect(&matched) {
                    continue;
                }
                let weight = self.weight_of(entry.distance, sigma_sqr);
                for dy in 0..patch {
                    for dx in 0..patch {
                        let ox = gx + dx;
                        let oy = gy + dy;
                        if let Some(mask) = hole {
                            if !mask.is_set(ox, oy) {
                                continue;
                            }
                        }
                        deposit(ox, oy, sx as usize + dx, sy as usize + dy, weight);
                    }
                }
            }
        }
    }

    fn reconstruct_average(
        &self,
        background: Image,
        sigma_sqr: f32,
        hole: Option<&Mask>,
    ) -> PatchFillResult<Image> {
        let width = background.width();
        let channels = background.channels();
        let mut acc = vec![0.0f32; width * background.height() * channels];
        let mut weights = vec![0.0f32; width * background.height()];
        self.for_each_contribution(hole, sigma_sqr, |ox, oy, sx, sy, weight| {
            let pixel = self.source.pixel(sx, sy);
            let base = (oy * width + ox) * channels;
            for (a, v) in acc[base..base + channels].iter_mut().zip(pixel) {
                *a += v * weight;
            }
            weights[oy * width + ox] += weight;
        });

        let mut out = background;
        let data = out.data_mut();
        for (i, w) in weights.iter().enumerate() {
            if *w > 0.0 {
                let base = i * channels;
                for c in 0..channels {
                    data[base + c] = acc[base + c] / w;
                }
            }
        }
        Ok(out)
    }

    fn reconstruct_modes(
        &self,
        background: Image,
        sigma_sqr: f32,
        hole: Option<&Mask>,
    ) -> PatchFillResult<Image> {
        let width = background.width();
        let channels = background.channels();
        // Packed per-pixel contribution lists: channel values then weight.
        let mut contributions: Vec<Vec<f32>> = vec![Vec::new(); width * background.height()];
        self.for_each_contribution(hole, sigma_sqr, |ox, oy, sx, sy, weight| {
            let list = &mut contributions[oy * width + ox];
            list.extend_from_slice(self.source.pixel(sx, sy));
            list.push(weight);
        });

        let mut out = background;
        self.resolve_modes(out.data_mut(), &contributions, channels);
        Ok(out)
    }

    #[cfg(feature = "rayon")]
    fn resolve_modes(&self, data: &mut [f32], contributions: &[Vec<f32>], channels: usize) {
        let bandwidth_scale = self.cfg.bandwidth_scale;
        if self.cfg.parallel {
            data.par_chunks_mut(channels)
                .zip(contributions.par_iter())
                .for_each(|(pixel, list)| {
                    meanshift::dominant_color(list, channels, bandwidth_scale, pixel);
                });
        } else {
            for (pixel, list) in data.chunks_mut(channels).zip(contributions.iter()) {
                meanshift::dominant_color(list, channels, bandwidth_scale, pixel);
            }
        }
    }

    #[cfg(not(feature = "rayon"))]
    fn resolve_modes(&self, data: &mut [f32], contributions: &[Vec<f32>], channels: usize) {
        for (pixel, list) in data.chunks_mut(channels).zip(contributions.iter()) {
            meanshift::dominant_color(list, channels, self.cfg.bandwidth_scale, pixel);
        }
    }
}
