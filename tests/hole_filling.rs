use patchfill::{FillConfig, HoleFilling, Image, Mask, PatchFillError, Rect};

/// Periodic two-color vertical stripes, period 4.
fn stripe_image(width: usize, height: usize) -> Image {
    let c0 = [0.2f32, 0.4, 0.6];
    let c1 = [0.8f32, 0.3, 0.1];
    let mut data = Vec::with_capacity(width * height * 3);
    for _ in 0..height {
        for x in 0..width {
            let color = if (x / 2) % 2 == 0 { c0 } else { c1 };
            data.extend_from_slice(&color);
        }
    }
    Image::from_vec(data, width, height, 3).unwrap()
}

fn rect_mask(width: usize, height: usize, rect: Rect) -> Mask {
    let mut mask = Mask::new(width, height).unwrap();
    for y in rect.y..rect.bottom() {
        for x in rect.x..rect.right() {
            mask.set(x as usize, y as usize, true);
        }
    }
    mask
}

#[test]
fn one_pixel_hole_produces_the_expected_target_rect() {
    let img = Image::filled(100, 100, 1, 0.5).unwrap();
    let mut hole = Mask::new(100, 100).unwrap();
    hole.set(50, 50, true);

    let filler = HoleFilling::new(&img, &hole, FillConfig::default()).unwrap();

    // The single hole pixel expanded by patch_size - 1 = 6 on every side.
    assert_eq!(filler.target_rect(0), Some(Rect::new(44, 44, 13, 13)));
}

#[test]
fn hole_at_the_border_clips_the_target_rect() {
    let img = Image::filled(64, 64, 1, 0.5).unwrap();
    let mut hole = Mask::new(64, 64).unwrap();
    hole.set(0, 0, true);

    let filler = HoleFilling::new(&img, &hole, FillConfig::default()).unwrap();
    assert_eq!(filler.target_rect(0), Some(Rect::new(0, 0, 7, 7)));
}

#[test]
fn construction_rejects_bad_geometry() {
    let img = Image::filled(64, 64, 3, 0.5).unwrap();

    let empty = Mask::new(64, 64).unwrap();
    assert_eq!(
        HoleFilling::new(&img, &empty, FillConfig::default())
            .err()
            .unwrap(),
        PatchFillError::EmptyHoleMask
    );

    let wrong_size = Mask::new(32, 64).unwrap();
    assert!(matches!(
        HoleFilling::new(&img, &wrong_size, FillConfig::default())
            .err()
            .unwrap(),
        PatchFillError::MaskSizeMismatch { .. }
    ));

    let mut everything = Mask::new(64, 64).unwrap();
    for y in 0..64 {
        for x in 0..64 {
            everything.set(x, y, true);
        }
    }
    assert_eq!(
        HoleFilling::new(&img, &everything, FillConfig::default())
            .err()
            .unwrap(),
        PatchFillError::HoleCoversImage
    );

    let tiny = Image::filled(5, 5, 3, 0.5).unwrap();
    let mut tiny_hole = Mask::new(5, 5).unwrap();
    tiny_hole.set(2, 2, true);
    assert_eq!(
        HoleFilling::new(&tiny, &tiny_hole, FillConfig::default())
            .err()
            .unwrap(),
        PatchFillError::PatchTooLarge {
            patch_size: 7,
            width: 5,
            height: 5,
        }
    );
}

#[test]
fn square_hole_on_periodic_texture_is_restored() {
    let original = stripe_image(64, 64);
    let hole_rect = Rect::new(28, 28, 8, 8);
    let hole = rect_mask(64, 64, hole_rect);

    // Cut the hole out so the filler cannot cheat by reading the original.
    let mut damaged = original.clone();
    damaged.fill_masked(&hole, &[0.0, 0.0, 0.0]).unwrap();

    let mut filler = HoleFilling::new(&damaged, &hole, FillConfig::default()).unwrap();
    let filled = filler.run().unwrap();

    assert_eq!(filled.width(), 64);
    assert_eq!(filled.height(), 64);

    // Pixels outside the hole are never touched.
    for y in 0..64 {
        for x in 0..64 {
            if !hole.is_set(x, y) {
                assert_eq!(filled.pixel(x, y), original.pixel(x, y), "at ({x},{y})");
            }
        }
    }

    // On perfectly repetitive content the hole is restored almost exactly.
    let mut sum_sq = 0.0f64;
    let mut count = 0usize;
    for y in hole_rect.y..hole_rect.bottom() {
        for x in hole_rect.x..hole_rect.right() {
            let got = filled.pixel(x as usize, y as usize);
            let want = original.pixel(x as usize, y as usize);
            for (g, w) in got.iter().zip(want) {
                sum_sq += ((g - w) as f64).powi(2);
                count += 1;
            }
        }
    }
    let mse = sum_sq / count as f64;
    assert!(mse < 1e-3, "hole mean squared error too high: {mse}");
}

#[test]
fn hole_filling_is_reproducible() {
    let original = stripe_image(48, 48);
    let hole = rect_mask(48, 48, Rect::new(20, 20, 6, 6));
    let mut damaged = original.clone();
    damaged.fill_masked(&hole, &[0.0, 0.0, 0.0]).unwrap();

    let cfg = FillConfig {
        em_steps: 4,
        ..FillConfig::default()
    };
    let first = HoleFilling::new(&damaged, &hole, cfg).unwrap().run().unwrap();
    let second = HoleFilling::new(&damaged, &hole, cfg).unwrap().run().unwrap();
    assert_eq!(first, second);
}

#[test]
fn run_exposes_the_final_offset_map() {
    let original = stripe_image(48, 48);
    let hole = rect_mask(48, 48, Rect::new(20, 20, 5, 5));
    let mut damaged = original.clone();
    damaged.fill_masked(&hole, &[0.0, 0.0, 0.0]).unwrap();

    let cfg = FillConfig {
        em_steps: 2,
        ..FillConfig::default()
    };
    let mut filler = HoleFilling::new(&damaged, &hole, cfg).unwrap();
    assert!(filler.offset_map().is_none());
    filler.run().unwrap();

    let map = filler.offset_map().expect("run populates the offset map");
    let rect = filler.target_rect(0).unwrap();
    assert_eq!(map.width(), rect.width as usize - cfg.patch_size + 1);
    assert_eq!(map.height(), rect.height as usize - cfg.patch_size + 1);

    // Bounds invariant on the final map: offsets are target-local to
    // source-global displacements within the full image.
    for y in 0..map.height() {
        for x in 0..map.width() {
            let entry = map.at(y, x);
            let sx = x as i32 + entry.offset.x;
            let sy = y as i32 + entry.offset.y;
            assert!(sx >= 0 && sy >= 0);
            assert!(sx <= 48 - cfg.patch_size as i32 && sy <= 48 - cfg.patch_size as i32);
        }
    }
}
