//! Colourised frames for persistence.
//!
//! Drawing overlays and showing the frame on screen are the
//! job of the display; this only produces the base image:
//! luma, contrast, bicubic upscale, blur, colormap.

use image::{imageops, imageops::FilterType, GrayImage, Luma, Rgb, RgbImage};

use crate::frame::VisualPlane;
use crate::session::SessionState;

/// `saturate(round(alpha * x))`
#[inline]
fn apply_contrast(val: u8, alpha: f64) -> u8 {
    (alpha * f64::from(val)).round().max(0.).min(255.) as u8
}

pub fn render(visual: &VisualPlane, state: &SessionState) -> RgbImage {
    let alpha = state.contrast();
    let gray = GrayImage::from_fn(visual.width() as u32, visual.height() as u32, |x, y| {
        Luma([apply_contrast(visual.luma(y as usize, x as usize), alpha)])
    });

    let (wid, ht) = state.scaled_size();
    let mut gray = imageops::resize(&gray, wid, ht, FilterType::CatmullRom);
    if state.blur_radius() > 0 {
        // gaussian with the spread of a box of that radius
        let sigma = state.blur_radius() as f32 / 12f32.sqrt();
        gray = imageops::blur(&gray, sigma);
    }

    let lut = state.colormap().lut();
    RgbImage::from_fn(wid, ht, |x, y| Rgb(lut[gray.get_pixel(x, y)[0] as usize]))
}
