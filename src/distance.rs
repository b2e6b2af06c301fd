//! Patch distance metric.
//!
//! The base term is a plain sum of squared differences over all pixels and
//! channels of two equally sized patches. An optional gradient term adds the
//! SSDs of the horizontal and vertical first-difference fields, weighted by
//! `lambda`. The running sum is compared against a known upper bound so a
//! candidate that is already worse than the current best can bail out early;
//! a distance that exceeded the bound is never accepted by callers, so the
//! early exit cannot change results.

use crate::geom::Point;
use crate::image::Image;

/// Sum of squared differences between the `size`-sided patches of `a` at
/// `(ax, ay)` and `b` at `(bx, by)`, giving up once the sum exceeds `bound`.
///
/// Both patches must lie fully inside their images.
pub fn ssd_bounded(
    a: &Image,
    ax: usize,
    ay: usize,
    b: &Image,
    bx: usize,
    by: usize,
    size: usize,
    bound: f32,
) -> f32 {
    debug_assert_eq!(a.channels(), b.channels());
    let ch = a.channels();
    let mut sum = 0.0f32;
    for dy in 0..size {
        let row_a = &a.row(ay + dy)[ax * ch..(ax + size) * ch];
        let row_b = &b.row(by + dy)[bx * ch..(bx + size) * ch];
        for (va, vb) in row_a.iter().zip(row_b.iter()) {
            let diff = va - vb;
            sum += diff * diff;
        }
        if sum > bound {
            return sum;
        }
    }
    sum
}

/// Patch distance between a source and a target image, optionally augmented
/// with gradient fields.
pub struct PatchDistance<'a> {
    source: &'a Image,
    target: &'a Image,
    source_grad: Option<(&'a Image, &'a Image)>,
    target_grad: Option<(&'a Image, &'a Image)>,
    patch_size: usize,
    lambda: f32,
}

impl<'a> PatchDistance<'a> {
    /// Color-only distance (`lambda = 0`).
    pub fn new(source: &'a Image, target: &'a Image, patch_size: usize) -> Self {
        Self {
            source,
            target,
            source_grad: None,
            target_grad: None,
            patch_size,
            lambda: 0.0,
        }
    }

    /// Gradient-augmented distance. The gradient images must have the same
    /// dimensions as their color images.
    #[allow(clippy::too_many_arguments)]
    pub fn with_gradients(
        source: &'a Image,
        target: &'a Image,
        patch_size: usize,
        lambda: f32,
        source_grad_x: &'a Image,
        source_grad_y: &'a Image,
        target_grad_x: &'a Image,
        target_grad_y: &'a Image,
    ) -> Self {
        Self {
            source,
            target,
            source_grad: Some((source_grad_x, source_grad_y)),
            target_grad: Some((target_grad_x, target_grad_y)),
            patch_size,
            lambda,
        }
    }

    /// Distance between the source patch at `source_pos` and the target patch
    /// at `target_pos` (both top-left corners, both fully in bounds).
    ///
    /// `previous_best` defaults to infinity when no prior bound exists; the
    /// gradient term is skipped when the base SSD alone already exceeds it.
    pub fn distance(&self, source_pos: Point, target_pos: Point, previous_best: f32) -> f32 {
        let sx = source_pos.x as usize;
        let sy = source_pos.y as usize;
        let tx = target_pos.x as usize;
        let ty = target_pos.y as usize;
        let base = ssd_bounded(
            self.source,
            sx,
            sy,
            self.target,
            tx,
            ty,
            self.patch_size,
            previous_best,
        );
        if self.lambda == 0.0 || base > previous_best {
            return base;
        }
        match (self.source_grad, self.target_grad) {
            (Some((sgx, sgy)), Some((tgx, tgy))) => {
                let gx = ssd_bounded(sgx, sx, sy, tgx, tx, ty, self.patch_size, f32::INFINITY);
                let gy = ssd_bounded(sgy, sx, sy, tgy, tx, ty, self.patch_size, f32::INFINITY);
                base + self.lambda * (gx + gy)
            }
            _ => base,
        }
    }

    pub fn patch_size(&self) -> usize {
        self.patch_size
    }
}
