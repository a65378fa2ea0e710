//! Bilinear Bayer demosaicing

use contracts::{BayerImage, Channel};
use image::RgbImage;

/// Reconstruct an RGB image from a Bayer mosaic.
///
/// Each missing channel is the rounded mean of the same-channel photosites
/// in the 3x3 neighborhood; out-of-range neighbors replicate the nearest
/// edge sample. Images smaller than 2x2 in either dimension still convert,
/// with channels absent from the neighborhood left at zero.
pub fn demosaic(raw: &BayerImage) -> RgbImage {
    let (width, height) = (raw.width, raw.height);
    let mut out = RgbImage::new(width, height);
    if width == 0 || height == 0 {
        return out;
    }

    let max_x = width as i64 - 1;
    let max_y = height as i64 - 1;

    for y in 0..height {
        for x in 0..width {
            let mut sums = [0u32; 3];
            let mut counts = [0u32; 3];

            for dy in -1i64..=1 {
                let ny = (y as i64 + dy).clamp(0, max_y) as u32;
                for dx in -1i64..=1 {
                    let nx = (x as i64 + dx).clamp(0, max_x) as u32;
                    let c = raw.pattern.channel_at(nx, ny) as usize;
                    sums[c] += u32::from(raw.get(nx, ny));
                    counts[c] += 1;
                }
            }

            let own = raw.pattern.channel_at(x, y);
            let mut pixel = [0u8; 3];
            for c in [Channel::Red, Channel::Green, Channel::Blue] {
                let idx = c as usize;
                pixel[idx] = if c == own {
                    raw.get(x, y)
                } else if counts[idx] > 0 {
                    ((sums[idx] + counts[idx] / 2) / counts[idx]) as u8
                } else {
                    0
                };
            }
            out.put_pixel(x, y, image::Rgb(pixel));
        }
    }
    out
}
