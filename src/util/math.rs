//! Mathematical helpers for the multi-scale search.

/// Number of half-resolution reductions so that the smallest of the given
/// dimensions is still at least twice the patch size at the coarsest level.
pub(crate) fn pyramid_depth(min_dimension: usize, patch_size: usize) -> usize {
    let ratio = min_dimension as f32 / (2.0 * patch_size as f32);
    if ratio <= 1.0 {
        return 0;
    }
    ratio.log2().floor() as usize
}

/// Linear interpolation between `a` and `b` for `t` in [0, 1].
pub(crate) fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// Deterministic seed from target dimensions, an update counter and a salt.
///
/// The counter varies the seed across repeated EM iterations on the same
/// target while keeping each run bit-reproducible.
pub(crate) fn derive_seed(width: usize, height: usize, update_count: u64, salt: u64) -> u64 {
    let dims = ((width as u64) << 32) | height as u64;
    dims.wrapping_mul(0x9e37_79b9_7f4a_7c15)
        ^ update_count.wrapping_mul(0xc2b2_ae3d_27d4_eb4f)
        ^ salt
}
