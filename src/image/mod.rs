//! Owned image and mask buffers.
//!
//! `Image` is a row-major, channel-interleaved grid of `f32` values with a
//! runtime channel count. The search and reconstruction passes operate on
//! whole rows, so rows are contiguous and `row` hands out the full
//! `width * channels` slice. `Mask` is a byte grid where any nonzero value
//! marks a hole pixel.

use crate::geom::Rect;
use crate::util::{PatchFillError, PatchFillResult};

pub mod color;
pub mod gradient;
#[cfg(feature = "image-io")]
pub mod io;
pub mod pyramid;

/// Owned multi-channel floating-point image.
#[derive(Clone, Debug, PartialEq)]
pub struct Image {
    data: Vec<f32>,
    width: usize,
    height: usize,
    channels: usize,
}

impl Image {
    /// Creates a zero-filled image.
    pub fn new(width: usize, height: usize, channels: usize) -> PatchFillResult<Self> {
        Self::filled(width, height, channels, 0.0)
    }

    /// Creates an image with every channel of every pixel set to `value`.
    pub fn filled(
        width: usize,
        height: usize,
        channels: usize,
        value: f32,
    ) -> PatchFillResult<Self> {
        let len = checked_len(width, height, channels)?;
        Ok(Self {
            data: vec![value; len],
            width,
            height,
            channels,
        })
    }

    /// Wraps an existing buffer; the length must match the dimensions exactly.
    pub fn from_vec(
        data: Vec<f32>,
        width: usize,
        height: usize,
        channels: usize,
    ) -> PatchFillResult<Self> {
        let needed = checked_len(width, height, channels)?;
        if data.len() != needed {
            return Err(PatchFillError::BufferSizeMismatch {
                needed,
                got: data.len(),
            });
        }
        Ok(Self {
            data,
            width,
            height,
            channels,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [f32] {
        &mut self.data
    }

    /// Full-image rectangle at the origin.
    pub fn bounds(&self) -> Rect {
        Rect::new(0, 0, self.width as i32, self.height as i32)
    }

    /// Contiguous slice of row `y`, `width * channels` values long.
    #[inline]
    pub fn row(&self, y: usize) -> &[f32] {
        let start = y * self.width * self.channels;
        &self.data[start..start + self.width * self.channels]
    }

    /// Channel values of the pixel at `(x, y)`.
    #[inline]
    pub fn pixel(&self, x: usize, y: usize) -> &[f32] {
        let idx = (y * self.width + x) * self.channels;
        &self.data[idx..idx + self.channels]
    }

    /// Mutable channel values of the pixel at `(x, y)`.
    #[inline]
    pub fn pixel_mut(&mut self, x: usize, y: usize) -> &mut [f32] {
        let idx = (y * self.width + x) * self.channels;
        &mut self.data[idx..idx + self.channels]
    }

    /// Copies `values` into the pixel at `(x, y)`.
    #[inline]
    pub fn set_pixel(&mut self, x: usize, y: usize, values: &[f32]) {
        self.pixel_mut(x, y).copy_from_slice(values);
    }

    /// Copies out the given sub-region.
    pub fn crop(&self, rect: Rect) -> PatchFillResult<Image> {
        if !self.bounds().contains_rect(&rect) {
            return Err(PatchFillError::RegionOutOfBounds {
                x: rect.x,
                y: rect.y,
                width: rect.width,
                height: rect.height,
                img_width: self.width,
                img_height: self.height,
            });
        }
        let w = rect.width as usize;
        let h = rect.height as usize;
        let mut out = Image::new(w, h, self.channels)?;
        for y in 0..h {
            let src_row = self.row(rect.y as usize + y);
            let start = (rect.x as usize) * self.channels;
            let end = start + w * self.channels;
            let dst_start = y * w * self.channels;
            out.data[dst_start..dst_start + w * self.channels]
                .copy_from_slice(&src_row[start..end]);
        }
        Ok(out)
    }

    /// Overwrites every pixel selected by `mask` with `values`.
    pub fn fill_masked(&mut self, mask: &Mask, values: &[f32]) -> PatchFillResult<()> {
        self.check_mask(mask)?;
        if values.len() != self.channels {
            return Err(PatchFillError::ChannelMismatch {
                expected: self.channels,
                got: values.len(),
            });
        }
        for y in 0..self.height {
            for x in 0..self.width {
                if mask.is_set(x, y) {
                    self.set_pixel(x, y, values);
                }
            }
        }
        Ok(())
    }

    /// Mean color over pixels NOT selected by `mask`, restricted to `rect`
    /// when given. Returns `None` when every considered pixel is masked.
    pub fn mean_color_excluding(
        &self,
        mask: &Mask,
        rect: Option<Rect>,
    ) -> PatchFillResult<Option<Vec<f32>>> {
        self.check_mask(mask)?;
        let region = match rect {
            Some(r) => {
                if !self.bounds().contains_rect(&r) {
                    return Err(PatchFillError::RegionOutOfBounds {
                        x: r.x,
                        y: r.y,
                        width: r.width,
                        height: r.height,
                        img_width: self.width,
                        img_height: self.height,
                    });
                }
                r
            }
            None => self.bounds(),
        };
        let mut sum = vec![0.0f64; self.channels];
        let mut count = 0usize;
        for y in region.y..region.bottom() {
            for x in region.x..region.right() {
                if mask.is_set(x as usize, y as usize) {
                    continue;
                }
                for (acc, v) in sum.iter_mut().zip(self.pixel(x as usize, y as usize)) {
                    *acc += *v as f64;
                }
                count += 1;
            }
        }
        if count == 0 {
            return Ok(None);
        }
        Ok(Some(
            sum.into_iter().map(|v| (v / count as f64) as f32).collect(),
        ))
    }

    /// Bilinear resize to the given dimensions.
    pub fn resize_bilinear(&self, width: usize, height: usize) -> PatchFillResult<Image> {
        let mut out = Image::new(width, height, self.channels)?;
        let sx = self.width as f32 / width as f32;
        let sy = self.height as f32 / height as f32;
        for y in 0..height {
            let fy = ((y as f32 + 0.5) * sy - 0.5).max(0.0);
            let y0 = (fy as usize).min(self.height - 1);
            let y1 = (y0 + 1).min(self.height - 1);
            let ty = fy - y0 as f32;
            for x in 0..width {
                let fx = ((x as f32 + 0.5) * sx - 0.5).max(0.0);
                let x0 = (fx as usize).min(self.width - 1);
                let x1 = (x0 + 1).min(self.width - 1);
                let tx = fx - x0 as f32;
                for c in 0..self.channels {
                    let top = self.pixel(x0, y0)[c] * (1.0 - tx) + self.pixel(x1, y0)[c] * tx;
                    let bottom = self.pixel(x0, y1)[c] * (1.0 - tx) + self.pixel(x1, y1)[c] * tx;
                    out.pixel_mut(x, y)[c] = top * (1.0 - ty) + bottom * ty;
                }
            }
        }
        Ok(out)
    }

    fn check_mask(&self, mask: &Mask) -> PatchFillResult<()> {
        if mask.width() != self.width || mask.height() != self.height {
            return Err(PatchFillError::MaskSizeMismatch {
                img_width: self.width,
                img_height: self.height,
                mask_width: mask.width(),
                mask_height: mask.height(),
            });
        }
        Ok(())
    }
}

fn checked_len(width: usize, height: usize, channels: usize) -> PatchFillResult<usize> {
    if width == 0 || height == 0 {
        return Err(PatchFillError::InvalidDimensions { width, height });
    }
    if channels == 0 {
        return Err(PatchFillError::ChannelMismatch {
            expected: 1,
            got: 0,
        });
    }
    width
        .checked_mul(height)
        .and_then(|v| v.checked_mul(channels))
        .ok_or(PatchFillError::InvalidDimensions { width, height })
}

/// Byte mask; nonzero marks a hole pixel.
#[derive(Clone, Debug, PartialEq)]
pub struct Mask {
    data: Vec<u8>,
    width: usize,
    height: usize,
}

impl Mask {
    /// Creates an all-clear mask.
    pub fn new(width: usize, height: usize) -> PatchFillResult<Self> {
        if width == 0 || height == 0 {
            return Err(PatchFillError::InvalidDimensions { width, height });
        }
        Ok(Self {
            data: vec![0; width * height],
            width,
            height,
        })
    }

    /// Wraps an existing byte buffer.
    pub fn from_vec(data: Vec<u8>, width: usize, height: usize) -> PatchFillResult<Self> {
        if width == 0 || height == 0 {
            return Err(PatchFillError::InvalidDimensions { width, height });
        }
        let needed = width * height;
        if data.len() != needed {
            return Err(PatchFillError::BufferSizeMismatch {
                needed,
                got: data.len(),
            });
        }
        Ok(Self {
            data,
            width,
            height,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    #[inline]
    pub fn is_set(&self, x: usize, y: usize) -> bool {
        self.data[y * self.width + x] != 0
    }

    pub fn set(&mut self, x: usize, y: usize, on: bool) {
        self.data[y * self.width + x] = u8::from(on);
    }

    /// Number of hole pixels.
    pub fn count_set(&self) -> usize {
        self.data.iter().filter(|v| **v != 0).count()
    }

    /// Bounding box of all nonzero pixels, or `None` for an all-clear mask.
    pub fn bounding_box(&self) -> Option<Rect> {
        let mut min_x = usize::MAX;
        let mut min_y = usize::MAX;
        let mut max_x = 0usize;
        let mut max_y = 0usize;
        let mut any = false;
        for y in 0..self.height {
            for x in 0..self.width {
                if self.is_set(x, y) {
                    any = true;
                    min_x = min_x.min(x);
                    min_y = min_y.min(y);
                    max_x = max_x.max(x);
                    max_y = max_y.max(y);
                }
            }
        }
        if !any {
            return None;
        }
        Some(Rect::new(
            min_x as i32,
            min_y as i32,
            (max_x - min_x + 1) as i32,
            (max_y - min_y + 1) as i32,
        ))
    }

    /// Copies out the given sub-region.
    pub fn crop(&self, rect: Rect) -> PatchFillResult<Mask> {
        let bounds = Rect::new(0, 0, self.width as i32, self.height as i32);
        if !bounds.contains_rect(&rect) {
            return Err(PatchFillError::RegionOutOfBounds {
                x: rect.x,
                y: rect.y,
                width: rect.width,
                height: rect.height,
                img_width: self.width,
                img_height: self.height,
            });
        }
        let w = rect.width as usize;
        let h = rect.height as usize;
        let mut out = Mask::new(w, h)?;
        for y in 0..h {
            let src_start = (rect.y as usize + y) * self.width + rect.x as usize;
            let dst_start = y * w;
            out.data[dst_start..dst_start + w]
                .copy_from_slice(&self.data[src_start..src_start + w]);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::{Image, Mask};
    use crate::geom::Rect;
    use crate::util::PatchFillError;

    #[test]
    fn image_rejects_invalid_dimensions() {
        let err = Image::new(0, 4, 3).err().unwrap();
        assert_eq!(err, PatchFillError::InvalidDimensions { width: 0, height: 4 });

        let err = Image::from_vec(vec![0.0; 5], 2, 2, 1).err().unwrap();
        assert_eq!(err, PatchFillError::BufferSizeMismatch { needed: 4, got: 5 });
    }

    #[test]
    fn pixel_and_row_access() {
        let data: Vec<f32> = (0..24).map(|v| v as f32).collect();
        let img = Image::from_vec(data, 4, 2, 3).unwrap();
        assert_eq!(img.pixel(0, 0), &[0.0, 1.0, 2.0]);
        assert_eq!(img.pixel(3, 1), &[21.0, 22.0, 23.0]);
        assert_eq!(img.row(1).len(), 12);
    }

    #[test]
    fn crop_copies_expected_region() {
        let data: Vec<f32> = (0..16).map(|v| v as f32).collect();
        let img = Image::from_vec(data, 4, 4, 1).unwrap();
        let sub = img.crop(Rect::new(1, 1, 2, 2)).unwrap();
        assert_eq!(sub.data(), &[5.0, 6.0, 9.0, 10.0]);

        let err = img.crop(Rect::new(3, 3, 2, 2)).err().unwrap();
        assert!(matches!(err, PatchFillError::RegionOutOfBounds { .. }));
    }

    #[test]
    fn mean_color_skips_masked_pixels() {
        let img = Image::from_vec(vec![1.0, 2.0, 3.0, 4.0], 2, 2, 1).unwrap();
        let mut mask = Mask::new(2, 2).unwrap();
        mask.set(1, 1, true);
        let mean = img.mean_color_excluding(&mask, None).unwrap().unwrap();
        assert!((mean[0] - 2.0).abs() < 1e-6);

        let mut all = Mask::new(2, 2).unwrap();
        for y in 0..2 {
            for x in 0..2 {
                all.set(x, y, true);
            }
        }
        assert!(img.mean_color_excluding(&all, None).unwrap().is_none());
    }

    #[test]
    fn mask_bounding_box_covers_extremes() {
        let mut mask = Mask::new(10, 8).unwrap();
        assert_eq!(mask.bounding_box(), None);
        mask.set(2, 3, true);
        mask.set(7, 5, true);
        assert_eq!(mask.bounding_box(), Some(Rect::new(2, 3, 6, 3)));
        assert_eq!(mask.count_set(), 2);
    }

    #[test]
    fn resize_bilinear_preserves_constant_images() {
        let img = Image::filled(5, 4, 2, 3.5).unwrap();
        let up = img.resize_bilinear(10, 8).unwrap();
        assert!(up.data().iter().all(|v| (v - 3.5).abs() < 1e-6));
    }
}
