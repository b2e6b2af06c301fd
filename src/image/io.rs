//! Convenience helpers for loading and saving images via the `image` crate.
//!
//! Available when the `image-io` feature is enabled. Pixel values are scaled
//! to [0, 1] on load; callers convert to L*a*b* separately before running
//! the core.

use crate::image::{Image, Mask};
use crate::util::{PatchFillError, PatchFillResult};
use std::path::Path;

/// Loads an image from disk as a 3-channel sRGB image with values in [0, 1].
pub fn load_rgb_image<P: AsRef<Path>>(path: P) -> PatchFillResult<Image> {
    let img = image::open(path)
        .map_err(|err| PatchFillError::ImageIo {
            reason: err.to_string(),
        })?
        .to_rgb8();
    let width = img.width() as usize;
    let height = img.height() as usize;
    let data = img.as_raw().iter().map(|v| *v as f32 / 255.0).collect();
    Image::from_vec(data, width, height, 3)
}

/// Loads an image from disk as a hole mask; any nonzero pixel marks a hole.
pub fn load_mask<P: AsRef<Path>>(path: P) -> PatchFillResult<Mask> {
    let img = image::open(path)
        .map_err(|err| PatchFillError::ImageIo {
            reason: err.to_string(),
        })?
        .to_luma8();
    let width = img.width() as usize;
    let height = img.height() as usize;
    let data = img.as_raw().iter().map(|v| u8::from(*v != 0)).collect();
    Mask::from_vec(data, width, height)
}

/// Saves a 3-channel image with values in [0, 1] to disk; the format is
/// chosen from the file extension.
pub fn save_rgb_image<P: AsRef<Path>>(path: P, img: &Image) -> PatchFillResult<()> {
    if img.channels() != 3 {
        return Err(PatchFillError::ChannelMismatch {
            expected: 3,
            got: img.channels(),
        });
    }
    let data: Vec<u8> = img
        .data()
        .iter()
        .map(|v| (v.clamp(0.0, 1.0) * 255.0).round() as u8)
        .collect();
    let buf: image::RgbImage =
        image::ImageBuffer::from_vec(img.width() as u32, img.height() as u32, data).ok_or(
            PatchFillError::BufferSizeMismatch {
                needed: img.width() * img.height() * 3,
                got: img.data().len(),
            },
        )?;
    buf.save(path).map_err(|err| PatchFillError::ImageIo {
        reason: err.to_string(),
    })
}
