//! Luminance-threshold "near-white" keyer

use image::RgbaImage;

/// Channel value every one of R, G and B must exceed for a pixel to be keyed out
pub const DEFAULT_THRESHOLD: u8 = 244;

/// Return a copy of `frame` with alpha cleared on every near-white pixel.
pub fn key_near_white(frame: &RgbaImage, threshold: u8) -> RgbaImage {
    let mut keyed = frame.clone();
    key_near_white_in_place(&mut keyed, threshold);
    keyed
}

/// Clear alpha on every pixel whose red, green and blue all exceed `threshold`.
///
/// Every other pixel, including its alpha, is left untouched.
fn key_near_white_in_place(frame: &mut RgbaImage, threshold: u8) {
    for px in frame.pixels_mut() {
        let [r, g, b, _] = px.0;
        if r > threshold && g > threshold && b > threshold {
            px.0[3] = 0;
        }
    }
}
