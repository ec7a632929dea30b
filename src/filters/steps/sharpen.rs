use image::{Rgb, RgbImage};
use imageproc::filter::gaussian_blur_f32;

/// Sigma of the low-pass copy used as the unsharp mask
const BLUR_SIGMA: f32 = 3.0;

/// Unsharp masking
///
/// `out = image * (1 + strength) + blurred * (-strength)`, clamped per channel.
/// Positive strength enhances edges, negative strength moves towards the blur.
pub fn apply(image: &RgbImage, strength: f32) -> RgbImage {
    if strength == 0.0 || image.width() == 0 || image.height() == 0 {
        return image.clone();
    }

    let blurred = gaussian_blur_f32(image, BLUR_SIGMA);
    let gain = 1.0 + strength;

    RgbImage::from_fn(image.width(), image.height(), |x, y| {
        let sharp = image.get_pixel(x, y);
        let soft = blurred.get_pixel(x, y);
        let channel = |c: usize| {
            let value = f32::from(sharp[c]) * gain - f32::from(soft[c]) * strength;
            value.round().clamp(0.0, 255.0) as u8
        };
        Rgb([channel(0), channel(1), channel(2)])
    })
}
