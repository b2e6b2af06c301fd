//! The offset map: one entry per valid target patch position.
//!
//! Each entry stores the best offset found so far together with its patch
//! distance. The map supports a logical 180-degree flip of its indexing so
//! the search can alternate scan direction between iterations without
//! physically reversing the backing storage. After an odd number of flips
//! the storage order and the logical order diverge: `at(y, x)` reads the
//! entry physically stored at `(height-1-y, width-1-x)`. Every accessor goes
//! through the same remapping, so external observers only ever see the
//! rotated indexing.

use crate::geom::Point;
use crate::image::Image;
use crate::util::{PatchFillError, PatchFillResult};

/// Best-known match for one target patch position.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OffsetMapEntry {
    /// Displacement from the target grid position to the matched source
    /// patch position.
    pub offset: Point,
    /// Patch distance of that match; smaller is better.
    pub distance: f32,
}

impl Default for OffsetMapEntry {
    fn default() -> Self {
        Self {
            offset: Point::ZERO,
            distance: f32::INFINITY,
        }
    }
}

/// 2D grid of [`OffsetMapEntry`] with O(1) logical flipping.
pub struct OffsetMap {
    width: usize,
    height: usize,
    data: Vec<OffsetMapEntry>,
    flipped: bool,
}

impl OffsetMap {
    /// Creates a map with all entries at infinite distance and zero offset.
    pub fn new(width: usize, height: usize) -> PatchFillResult<Self> {
        if width == 0 || height == 0 {
            return Err(PatchFillError::InvalidDimensions { width, height });
        }
        Ok(Self {
            width,
            height,
            data: vec![OffsetMapEntry::default(); width * height],
            flipped: false,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn is_flipped(&self) -> bool {
        self.flipped
    }

    /// Toggles the flip state. O(1): only the index transform changes.
    pub fn flip(&mut self) {
        self.flipped = !self.flipped;
    }

    #[inline]
    fn index(&self, y: usize, x: usize) -> usize {
        debug_assert!(x < self.width && y < self.height);
        if self.flipped {
            let xf = self.width - 1 - x;
            let yf = self.height - 1 - y;
            yf * self.width + xf
        } else {
            y * self.width + x
        }
    }

    /// Copy of the entry at logical position `(y, x)`.
    #[inline]
    pub fn at(&self, y: usize, x: usize) -> OffsetMapEntry {
        self.data[self.index(y, x)]
    }

    /// Mutable reference to the entry at logical position `(y, x)`.
    #[inline]
    pub fn entry_mut(&mut self, y: usize, x: usize) -> &mut OffsetMapEntry {
        let idx = self.index(y, x);
        &mut self.data[idx]
    }

    /// All entries in storage order; flip-independent.
    pub fn entries(&self) -> impl Iterator<Item = &OffsetMapEntry> {
        self.data.iter()
    }

    /// Sum of all entry distances, a convergence diagnostic.
    pub fn summed_distance(&self) -> f64 {
        self.data.iter().map(|e| e.distance as f64).sum()
    }

    /// 75th-percentile entry distance (nearest rank).
    ///
    /// Used as the adaptive bandwidth for similarity-weighted voting: robust
    /// against a minority of badly matched entries while still tracking the
    /// bulk error level.
    pub fn percentile75_distance(&self) -> f32 {
        let mut distances: Vec<f32> = self.data.iter().map(|e| e.distance).collect();
        distances.sort_by(f32::total_cmp);
        let rank = ((distances.len() as f32) * 0.75).ceil() as usize;
        distances[rank.saturating_sub(1)]
    }

    /// Renders offsets as a 3-channel image for visual inspection: angle in
    /// turns, magnitude normalized to the largest offset, constant 1.
    pub fn to_color_coded_image(&self) -> Image {
        let mut out = Image::new(self.width, self.height, 3)
            .expect("offset map dimensions are nonzero");
        let mut max_magnitude = 0.0f32;
        for e in self.data.iter() {
            let m = ((e.offset.x * e.offset.x + e.offset.y * e.offset.y) as f32).sqrt();
            max_magnitude = max_magnitude.max(m);
        }
        let norm = if max_magnitude > 0.0 { max_magnitude } else { 1.0 };
        for y in 0..self.height {
            for x in 0..self.width {
                let e = self.at(y, x);
                let mut angle = (e.offset.x as f32).atan2(e.offset.y as f32);
                if angle < 0.0 {
                    angle += std::f32::consts::TAU;
                }
                let magnitude =
                    ((e.offset.x * e.offset.x + e.offset.y * e.offset.y) as f32).sqrt() / norm;
                out.set_pixel(x, y, &[angle / std::f32::consts::TAU, magnitude, 1.0]);
            }
        }
        out
    }

    /// Renders entry distances normalized to [0, 1] as a single-channel image.
    pub fn to_distance_image(&self) -> Image {
        let mut out = Image::new(self.width, self.height, 1)
            .expect("offset map dimensions are nonzero");
        let mut min = f32::INFINITY;
        let mut max = f32::NEG_INFINITY;
        for e in self.data.iter() {
            min = min.min(e.distance);
            max = max.max(e.distance);
        }
        let range = if max > min { max - min } else { 1.0 };
        for y in 0..self.height {
            for x in 0..self.width {
                out.pixel_mut(x, y)[0] = (self.at(y, x).distance - min) / range;
            }
        }
        out
    }
}
