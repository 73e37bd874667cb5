//! Shared test utilities for the libris-common test suite.

use image::{ImageFormat, Rgb, RgbImage};
use std::io::Cursor;

/// Encode a solid-colour image of the given size
pub fn encoded(width: u32, height: u32, format: ImageFormat) -> Vec<u8> {
    let img = RgbImage::from_pixel(width, height, Rgb([120, 80, 40]));
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, format).unwrap();
    out.into_inner()
}

/// Dimensions of a PNG on disk
pub fn png_dimensions(path: &std::path::Path) -> (u32, u32) {
    let img = image::open(path).unwrap();
    (img.width(), img.height())
}
