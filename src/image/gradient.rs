//! First-difference gradient images.
//!
//! The gradient-augmented patch distance compares these alongside the color
//! channels. Forward differences with a clamped border keep the gradient
//! image the same size as its input.

use crate::image::Image;

/// Horizontal forward difference: `g(x, y) = p(x+1, y) - p(x, y)`.
pub fn gradient_x(img: &Image) -> Image {
    let mut out = Image::new(img.width(), img.height(), img.channels())
        .expect("gradient of a valid image is valid");
    let last = img.width() - 1;
    for y in 0..img.height() {
        for x in 0..img.width() {
            let nx = if x < last { x + 1 } else { x };
            let next = img.pixel(nx, y);
            let here = img.pixel(x, y);
            for (o, (n, h)) in out.pixel_mut(x, y).iter_mut().zip(next.iter().zip(here)) {
                *o = n - h;
            }
        }
    }
    out
}

/// Vertical forward difference: `g(x, y) = p(x, y+1) - p(x, y)`.
pub fn gradient_y(img: &Image) -> Image {
    let mut out = Image::new(img.width(), img.height(), img.channels())
        .expect("gradient of a valid image is valid");
    let last = img.height() - 1;
    for y in 0..img.height() {
        let ny = if y < last { y + 1 } else { y };
        for x in 0..img.width() {
            let next = img.pixel(x, ny);
            let here = img.pixel(x, y);
            for (o, (n, h)) in out.pixel_mut(x, y).iter_mut().zip(next.iter().zip(here)) {
                *o = n - h;
            }
        }
    }
    out
}
