//! Naive mean-shift clustering of per-pixel patch contributions.
//!
//! Each output pixel receives one contribution per covering patch. When the
//! contributions disagree, the weighted average blends them into a ghosted
//! color; mean-shift instead finds the color modes under a Gaussian kernel
//! and keeps only the most populated one. The per-pixel cost is quadratic in
//! the number of contributions, which is why the caller distributes pixels
//! over a worker pool.

/// A mode iteration stops once the shift falls below this length.
const SHIFT_THRESHOLD: f32 = 0.01;
/// Converged modes closer than this are considered the same cluster.
const MERGE_THRESHOLD: f32 = 0.1;
/// Below this average channel standard deviation the contributions are
/// treated as identical and clustering is skipped.
const STD_THRESHOLD: f32 = 0.05;
const MAX_SHIFT_STEPS: usize = 64;

/// Resolves one pixel's packed contribution list (per entry: `channels`
/// color values followed by a weight) to a single color written into `out`.
///
/// Degenerate inputs fall back without clustering: an empty list leaves
/// `out` untouched, near-identical contributions return the first one.
pub(crate) fn dominant_color(
    contributions: &[f32],
    channels: usize,
    bandwidth_scale: f32,
    out: &mut [f32],
) {
    let stride = channels + 1;
    debug_assert_eq!(contributions.len() % stride, 0);
    let n = contributions.len() / stride;
    if n == 0 {
        return;
    }
    let color = |i: usize| &contributions[i * stride..i * stride + channels];
    let weight = |i: usize| contributions[i * stride + channels];
    if n == 1 {
        out.copy_from_slice(color(0));
        return;
    }

    let mut mean = vec![0.0f32; channels];
    for i in 0..n {
        for (m, v) in mean.iter_mut().zip(color(i)) {
            *m += v;
        }
    }
    for m in &mut mean {
        *m /= n as f32;
    }
    let mut var = vec![0.0f32; channels];
    for i in 0..n {
        for (s, (v, m)) in var.iter_mut().zip(color(i).iter().zip(&mean)) {
            let d = v - m;
            *s += d * d;
        }
    }
    let avg_std = var.iter().map(|v| (v / n as f32).sqrt()).sum::<f32>() / channels as f32;

    if avg_std <= STD_THRESHOLD || bandwidth_scale * avg_std <= f32::EPSILON {
        out.copy_from_slice(color(0));
        return;
    }

    let bandwidth = bandwidth_scale * avg_std;
    let denom = 2.0 * bandwidth * bandwidth;

    let mut modes: Vec<Vec<f32>> = Vec::new();
    let mut members: Vec<Vec<usize>> = Vec::new();
    let mut numerator = vec![0.0f32; channels];
    for i in 0..n {
        let mut mode: Vec<f32> = color(i).to_vec();
        for _ in 0..MAX_SHIFT_STEPS {
            numerator.fill(0.0);
            let mut total = 0.0f32;
            for j in 0..n {
                let d2: f32 = mode
                    .iter()
                    .zip(color(j))
                    .map(|(a, b)| (a - b) * (a - b))
                    .sum();
                let k = (-d2 / denom).exp() * weight(j);
                for (acc, v) in numerator.iter_mut().zip(color(j)) {
                    *acc += v * k;
                }
                total += k;
            }
            if total <= f32::EPSILON {
                break;
            }
            let mut delta = 0.0f32;
            for (m, v) in mode.iter_mut().zip(&numerator) {
                let shifted = v / total;
                delta += (*m - shifted) * (*m - shifted);
                *m = shifted;
            }
            if delta.sqrt() < SHIFT_THRESHOLD {
                break;
            }
        }
        let existing = modes.iter().position(|center| {
            let d: f32 = center
                .iter()
                .zip(&mode)
                .map(|(a, b)| (a - b) * (a - b))
                .sum();
            d.sqrt() < MERGE_THRESHOLD
        });
        match existing {
            Some(k) => members[k].push(i),
            None => {
                modes.push(mode);
                members.push(vec![i]);
            }
        }
    }

    let best = members
        .iter()
        .enumerate()
        .max_by_key(|(_, m)| m.len())
        .map(|(k, _)| k)
        .expect("at least one mode exists");
    out.fill(0.0);
    let mut total = 0.0f32;
    for &i in &members[best] {
        let w = weight(i);
        for (o, v) in out.iter_mut().zip(color(i)) {
            *o += v * w;
        }
        total += w;
    }
    if total > 0.0 {
        for o in out.iter_mut() {
            *o /= total;
        }
    }
}
