//! Error types for patchfill.

use thiserror::Error;

/// Result alias for patchfill operations.
pub type PatchFillResult<T> = std::result::Result<T, PatchFillError>;

/// Errors that can occur when setting up or running patchfill algorithms.
///
/// All variants are construction-time validation failures. Once a search or
/// reconstruction pass is running there are no recoverable mid-pass errors;
/// out-of-bounds candidate offsets in particular are an expected outcome of
/// the randomized search and are rejected silently, not reported here.
#[derive(Debug, Error, PartialEq)]
pub enum PatchFillError {
    /// An image, mask or offset map was created with a zero dimension.
    #[error("invalid dimensions: {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },
    /// A pixel buffer does not match the dimensions it was paired with.
    #[error("buffer size mismatch: needed {needed} elements, got {got}")]
    BufferSizeMismatch { needed: usize, got: usize },
    /// Two images that must agree on channel count do not.
    #[error("channel mismatch: expected {expected} channels, got {got}")]
    ChannelMismatch { expected: usize, got: usize },
    /// A requested sub-region does not lie inside the image.
    #[error("region {x},{y} {width}x{height} out of bounds for {img_width}x{img_height} image")]
    RegionOutOfBounds {
        x: i32,
        y: i32,
        width: i32,
        height: i32,
        img_width: usize,
        img_height: usize,
    },
    /// The patch side length is zero.
    #[error("patch size must be at least 1")]
    InvalidPatchSize,
    /// The patch does not fit inside an image, leaving no valid patch position.
    #[error("patch size {patch_size} exceeds {width}x{height} image")]
    PatchTooLarge {
        patch_size: usize,
        width: usize,
        height: usize,
    },
    /// A target area with unexpected dimensions was supplied to a searcher.
    #[error("target area is {got_width}x{got_height}, expected {expected_width}x{expected_height}")]
    TargetSizeMismatch {
        expected_width: usize,
        expected_height: usize,
        got_width: usize,
        got_height: usize,
    },
    /// A search was started before any target area was supplied.
    #[error("no target area set before matching")]
    TargetAreaNotSet,
    /// A hole mask does not have the same dimensions as its image.
    #[error("mask is {mask_width}x{mask_height}, image is {img_width}x{img_height}")]
    MaskSizeMismatch {
        img_width: usize,
        img_height: usize,
        mask_width: usize,
        mask_height: usize,
    },
    /// The hole mask has no nonzero pixel, so there is nothing to fill.
    #[error("hole mask is empty")]
    EmptyHoleMask,
    /// The hole mask covers every pixel, leaving no source content to borrow.
    #[error("hole mask covers the entire image")]
    HoleCoversImage,
    /// Decoding or encoding an image file failed.
    #[cfg(feature = "image-io")]
    #[error("image i/o failed: {reason}")]
    ImageIo { reason: String },
}
