use patchfill::{OffsetMap, PatchFillError, Point};

#[test]
fn flipping_keeps_center_entry_on_odd_square() {
    let mut map = OffsetMap::new(101, 101).unwrap();
    assert!(!map.is_flipped());

    map.entry_mut(50, 50).distance = 100.0;
    assert_eq!(map.at(50, 50).distance, 100.0);

    map.flip();
    assert!(map.is_flipped());
    // The center is its own mirror image.
    assert_eq!(map.at(50, 50).distance, 100.0);
}

#[test]
fn flipping_mirrors_top_left_to_bottom_right() {
    let mut map = OffsetMap::new(100, 100).unwrap();
    map.entry_mut(0, 0).distance = 100.0;
    map.entry_mut(0, 0).offset = Point::new(3, -4);
    assert_eq!(map.at(0, 0).distance, 100.0);

    map.flip();
    assert_eq!(map.width(), 100);
    assert_eq!(map.height(), 100);
    let mirrored = map.at(99, 99);
    assert_eq!(mirrored.distance, 100.0);
    assert_eq!(mirrored.offset, Point::new(3, -4));
}

#[test]
fn even_number_of_flips_restores_indexing() {
    let mut map = OffsetMap::new(5, 3).unwrap();
    map.entry_mut(1, 2).distance = 7.0;
    map.flip();
    map.flip();
    assert!(!map.is_flipped());
    assert_eq!(map.at(1, 2).distance, 7.0);

    map.flip();
    map.flip();
    map.flip();
    assert!(map.is_flipped());
    assert_eq!(map.at(1, 2).distance, 7.0);
}

#[test]
fn writes_through_flipped_view_land_at_mirrored_storage() {
    let mut map = OffsetMap::new(4, 4).unwrap();
    map.flip();
    map.entry_mut(0, 1).distance = 5.0;
    map.flip();
    assert_eq!(map.at(3, 2).distance, 5.0);
}

#[test]
fn percentile_distance_uses_nearest_rank() {
    let mut map = OffsetMap::new(4, 1).unwrap();
    map.entry_mut(0, 0).distance = 10.0;
    map.entry_mut(0, 1).distance = 40.0;
    map.entry_mut(0, 2).distance = 60.0;
    map.entry_mut(0, 3).distance = 1000.0;

    assert_eq!(map.percentile75_distance(), 60.0);
}

#[test]
fn summed_distance_adds_all_entries() {
    let mut map = OffsetMap::new(2, 2).unwrap();
    for (i, value) in [1.0, 2.0, 3.0, 4.0].iter().enumerate() {
        map.entry_mut(i / 2, i % 2).distance = *value;
    }
    assert!((map.summed_distance() - 10.0).abs() < 1e-9);
}

#[test]
fn zero_sized_maps_are_rejected() {
    assert_eq!(
        OffsetMap::new(0, 5).err().unwrap(),
        PatchFillError::InvalidDimensions { width: 0, height: 5 }
    );
}

#[test]
fn diagnostic_images_have_map_dimensions() {
    let mut map = OffsetMap::new(6, 4).unwrap();
    for y in 0..4 {
        for x in 0..6 {
            let entry = map.entry_mut(y, x);
            entry.offset = Point::new(x as i32, y as i32);
            entry.distance = (x + y) as f32;
        }
    }
    let colors = map.to_color_coded_image();
    assert_eq!((colors.width(), colors.height(), colors.channels()), (6, 4, 3));
    let distances = map.to_distance_image();
    assert_eq!((distances.width(), distances.height()), (6, 4));
    // Normalized distances span [0, 1].
    assert!(distances.pixel(0, 0)[0].abs() < 1e-6);
    assert!((distances.pixel(5, 3)[0] - 1.0).abs() < 1e-6);
}
