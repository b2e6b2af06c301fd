//! PatchFill computes approximate nearest-neighbor patch correspondences
//! between images and uses them to synthesize image content.
//!
//! The crate provides the randomized multi-scale PatchMatch search, an
//! exhaustive oracle for validation, similarity-weighted voted
//! reconstruction with optional mean-shift mode seeking, and a multi-scale
//! hole-filling driver built on top of them. Optional parallelism is
//! available via the `rayon` feature; file I/O via `image-io`.

pub mod distance;
pub mod fill;
pub mod geom;
pub mod image;
pub mod offset_map;
pub mod reconstruct;
pub mod search;
pub mod util;

mod trace;

pub use fill::{FillConfig, HoleFilling};
pub use geom::{Point, Rect};
pub use image::pyramid::{ImagePyramid, MaskPyramid};
pub use image::{Image, Mask};
pub use offset_map::{OffsetMap, OffsetMapEntry};
pub use reconstruct::{TrivialReconstruction, VoteConfig, VotedReconstruction};
pub use search::{
    ExhaustivePatchMatch, PatchMatchProvider, RandomizedPatchMatch, SearchConfig,
};
pub use util::{PatchFillError, PatchFillResult};
