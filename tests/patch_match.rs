use patchfill::{
    ExhaustivePatchMatch, Image, PatchFillError, PatchMatchProvider, RandomizedPatchMatch,
    SearchConfig,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn noise_image(width: usize, height: usize, channels: usize, seed: u64) -> Image {
    let mut rng = StdRng::seed_from_u64(seed);
    let data = (0..width * height * channels)
        .map(|_| rng.random_range(0.0f32..1.0))
        .collect();
    Image::from_vec(data, width, height, channels).unwrap()
}

/// Vertical stripes with the given period; every offset that is a multiple
/// of the period in x (and anything in y) is an exact match.
fn stripe_image(width: usize, height: usize, period: usize) -> Image {
    let data = (0..height)
        .flat_map(|_| (0..width).map(|x| if (x / (period / 2)) % 2 == 0 { 0.1 } else { 0.9 }))
        .collect();
    Image::from_vec(data, width, height, 1).unwrap()
}

#[test]
fn identical_trivial_images_converge_to_zero_distance() {
    let img = Image::filled(20, 20, 1, 1.0).unwrap();
    let mut search = RandomizedPatchMatch::new(&img, 20, 20, 7, SearchConfig::default()).unwrap();
    search.set_target_area(&img).unwrap();
    let map = search.match_offsets().unwrap();
    assert!(map.summed_distance() < 1e-3, "{}", map.summed_distance());
}

#[test]
fn very_different_trivial_images_hit_the_worst_case_everywhere() {
    let zeros = Image::new(20, 20, 1).unwrap();
    let ones = Image::filled(20, 20, 1, 1.0).unwrap();
    let patch_size = 7;
    let mut search =
        RandomizedPatchMatch::new(&zeros, 20, 20, patch_size, SearchConfig::default()).unwrap();
    search.set_target_area(&ones).unwrap();
    let map = search.match_offsets().unwrap();

    // Every patch pair differs by 1 in every pixel.
    let per_entry = (patch_size * patch_size) as f64;
    let expected = (20 - patch_size + 1) as f64 * (20 - patch_size + 1) as f64 * per_entry;
    assert!((map.summed_distance() - expected).abs() < 1e-3);
}

#[test]
fn all_offsets_stay_inside_the_source_on_random_images() {
    let source = noise_image(40, 40, 1, 11);
    let target = noise_image(20, 20, 1, 22);
    let mut search = RandomizedPatchMatch::new(&source, 20, 20, 7, SearchConfig::default()).unwrap();
    search.set_target_area(&target).unwrap();
    let map = search.match_offsets().unwrap();

    for y in 0..map.height() {
        for x in 0..map.width() {
            let entry = map.at(y, x);
            let sx = x as i32 + entry.offset.x;
            let sy = y as i32 + entry.offset.y;
            assert!(sx >= 0 && sy >= 0, "offset at ({x},{y}) points before origin");
            assert!(
                sx < source.width() as i32 && sy < source.height() as i32,
                "offset at ({x},{y}) points past the source"
            );
            assert!(entry.distance.is_finite());
        }
    }
}

#[test]
fn repeated_runs_are_deterministic() {
    let source = noise_image(30, 30, 1, 5);
    let target = noise_image(30, 30, 1, 6);

    let run = || {
        let mut search =
            RandomizedPatchMatch::new(&source, 30, 30, 7, SearchConfig::default()).unwrap();
        search.set_target_area(&target).unwrap();
        search.match_offsets().unwrap().summed_distance()
    };
    assert_eq!(run(), run());
}

#[test]
fn exhaustive_worst_case_bound_is_exact() {
    let zeros = Image::new(20, 20, 1).unwrap();
    let ones = Image::filled(20, 20, 1, 1.0).unwrap();
    let patch_size = 7;
    let mut oracle = ExhaustivePatchMatch::new(&zeros, &ones, patch_size).unwrap();
    let map = oracle.match_offsets().unwrap();

    let side = (20 - patch_size + 1) as f64;
    let expected = side * side * (patch_size * patch_size) as f64;
    assert!((map.summed_distance() - expected).abs() < 1e-6);
}

#[test]
fn exhaustive_search_finds_zero_offsets_on_unique_content() {
    // A ramp has globally unique patches, so the only zero-distance match
    // for each target patch is at its own position.
    let data: Vec<f32> = (0..16 * 16).map(|v| v as f32 / 256.0).collect();
    let img = Image::from_vec(data, 16, 16, 1).unwrap();
    let mut oracle = ExhaustivePatchMatch::new(&img, &img, 5).unwrap();
    let map = oracle.match_offsets().unwrap();

    assert!(map.summed_distance() < 1e-9);
    for y in 0..map.height() {
        for x in 0..map.width() {
            assert_eq!(map.at(y, x).offset, patchfill::Point::ZERO);
        }
    }
}

#[test]
fn randomized_search_stays_close_to_the_exhaustive_oracle() {
    let source = stripe_image(24, 24, 4);
    let target = stripe_image(24, 24, 4);
    let patch_size = 5;

    let mut oracle = ExhaustivePatchMatch::new(&source, &target, patch_size).unwrap();
    let oracle_map = oracle.match_offsets().unwrap();

    let mut search =
        RandomizedPatchMatch::new(&source, 24, 24, patch_size, SearchConfig::default()).unwrap();
    search.set_target_area(&target).unwrap();
    let search_map = search.match_offsets().unwrap();

    let entries = (search_map.width() * search_map.height()) as f64;
    let mean_search = search_map.summed_distance() / entries;
    let mean_oracle = oracle_map.summed_distance() / entries;

    // The oracle is optimal per entry, so the randomized result can never
    // beat it; it also must not diverge from it catastrophically.
    assert!(mean_search + 1e-6 >= mean_oracle);
    assert!(
        mean_search <= mean_oracle + 1.0,
        "randomized {mean_search} vs exhaustive {mean_oracle}"
    );
}

#[test]
fn matching_without_a_target_area_fails() {
    let img = Image::filled(20, 20, 1, 1.0).unwrap();
    let mut search = RandomizedPatchMatch::new(&img, 20, 20, 7, SearchConfig::default()).unwrap();
    assert_eq!(
        search.match_offsets().err().unwrap(),
        PatchFillError::TargetAreaNotSet
    );
}

#[test]
fn targets_smaller_than_the_patch_fail_fast() {
    let img = Image::filled(20, 20, 1, 1.0).unwrap();
    let err = RandomizedPatchMatch::new(&img, 5, 5, 7, SearchConfig::default())
        .err()
        .unwrap();
    assert_eq!(
        err,
        PatchFillError::PatchTooLarge {
            patch_size: 7,
            width: 5,
            height: 5,
        }
    );

    let small = Image::filled(5, 5, 1, 1.0).unwrap();
    let err = ExhaustivePatchMatch::new(&small, &img, 7).err().unwrap();
    assert_eq!(
        err,
        PatchFillError::PatchTooLarge {
            patch_size: 7,
            width: 5,
            height: 5,
        }
    );
}

#[test]
fn mismatched_target_area_dimensions_are_rejected() {
    let img = Image::filled(20, 20, 1, 1.0).unwrap();
    let mut search = RandomizedPatchMatch::new(&img, 20, 20, 7, SearchConfig::default()).unwrap();
    let wrong = Image::filled(19, 20, 1, 1.0).unwrap();
    assert_eq!(
        search.set_target_area(&wrong).err().unwrap(),
        PatchFillError::TargetSizeMismatch {
            expected_width: 20,
            expected_height: 20,
            got_width: 19,
            got_height: 20,
        }
    );
}

#[test]
fn gradient_weighted_search_still_respects_bounds() {
    let source = noise_image(24, 24, 1, 7);
    let target = noise_image(24, 24, 1, 8);
    let cfg = SearchConfig {
        lambda: 0.5,
        ..SearchConfig::default()
    };
    let mut search = RandomizedPatchMatch::new(&source, 24, 24, 7, cfg).unwrap();
    search.set_target_area(&target).unwrap();
    let map = search.match_offsets().unwrap();
    for y in 0..map.height() {
        for x in 0..map.width() {
            let entry = map.at(y, x);
            let sx = x as i32 + entry.offset.x;
            let sy = y as i32 + entry.offset.y;
            assert!(sx >= 0 && sy >= 0 && sx <= 24 - 7 && sy <= 24 - 7);
        }
    }
}
