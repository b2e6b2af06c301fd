//! Trivial reconstruction baseline.
//!
//! Copies a single pixel of the best-matching patch per grid position, with
//! no voting at all. Useful for eyeballing raw offset-map quality; the voted
//! reconstruction is strictly better for actual synthesis.

use crate::image::Image;
use crate::offset_map::OffsetMap;
use crate::util::PatchFillResult;

pub struct TrivialReconstruction<'a> {
    offset_map: &'a OffsetMap,
    source: &'a Image,
}

impl<'a> TrivialReconstruction<'a> {
    pub fn new(offset_map: &'a OffsetMap, source: &'a Image) -> Self {
        Self { offset_map, source }
    }

    /// One output pixel per grid position, taken from the matched patch's
    /// top-left corner. Entries pointing outside the source are left black.
    pub fn reconstruct(&self) -> PatchFillResult<Image> {
        let mut out = Image::new(self.offset_map.width(), self.offset_map.height(), self.source.channels())?;
        for y in 0..self.offset_map.height() {
            for x in 0..self.offset_map.width() {
                let entry = self.offset_map.at(y, x);
                let sx = x as i32 + entry.offset.x;
                let sy = y as i32 + entry.offset.y;
                if sx < 0
                    || sy < 0
                    || sx >= self.source.width() as i32
                    || sy >= self.source.height() as i32
                {
                    continue;
                }
                out.set_pixel(x, y, self.source.pixel(sx as usize, sy as usize));
            }
        }
        Ok(out)
    }
}
