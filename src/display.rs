//! Fixed-size preview frames for the two panes

use image::{imageops, imageops::FilterType, Rgb, RgbImage};

/// Resampling filter used when shrinking an image into a frame
pub const RESAMPLE_FILTER: FilterType = FilterType::Lanczos3;

/// Fill colour for the letterbox bars
pub const PAD_COLOR: Rgb<u8> = Rgb([0, 0, 0]);

/// Fit `image` into a `frame_width` x `frame_height` canvas
///
/// The image is only ever scaled down, keeping its aspect ratio, then centred
/// on a canvas of exactly the frame size with [`PAD_COLOR`] around it.
///
/// Offsets are floored, so an odd leftover puts the extra row or column after
/// the image: 1920x1080 in 400x400 gets 87 rows above and 88 below. Pillow's
/// `ImageOps.pad` puts the extra row before the image instead.
pub fn render_display_frame(image: &RgbImage, frame_width: u32, frame_height: u32) -> RgbImage {
    let mut canvas = RgbImage::from_pixel(frame_width, frame_height, PAD_COLOR);
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 || frame_width == 0 || frame_height == 0 {
        return canvas;
    }

    let (fit_width, fit_height) = fit_within(width, height, frame_width, frame_height);
    let x = (frame_width - fit_width) / 2;
    let y = (frame_height - fit_height) / 2;

    if (fit_width, fit_height) == (width, height) {
        imageops::replace(&mut canvas, image, i64::from(x), i64::from(y));
    } else {
        let resized = imageops::resize(image, fit_width, fit_height, RESAMPLE_FILTER);
        imageops::replace(&mut canvas, &resized, i64::from(x), i64::from(y));
    }

    canvas
}

/// Largest size with the same aspect ratio that fits the frame, never larger
/// than the source
fn fit_within(width: u32, height: u32, max_width: u32, max_height: u32) -> (u32, u32) {
    if width <= max_width && height <= max_height {
        return (width, height);
    }

    let scale = f64::min(
        f64::from(max_width) / f64::from(width),
        f64::from(max_height) / f64::from(height),
    );
    let fit_width = ((f64::from(width) * scale).round() as u32).clamp(1, max_width);
    let fit_height = ((f64::from(height) * scale).round() as u32).clamp(1, max_height);
    (fit_width, fit_height)
}
