//! Side-by-side composition of a converted pair

use contracts::ConvertedFramePair;
use image::{imageops, RgbImage};

/// Primary on the left, secondary on the right.
///
/// An absent secondary yields the primary alone; a shorter image is padded
/// with black below.
pub fn concat_horizontal(pair: &ConvertedFramePair) -> RgbImage {
    let primary = pair.primary_rgb();
    let Some(secondary) = pair.secondary_rgb() else {
        return primary.clone();
    };

    let width = primary.width() + secondary.width();
    let height = primary.height().max(secondary.height());
    let mut canvas = RgbImage::new(width, height);
    imageops::replace(&mut canvas, primary, 0, 0);
    imageops::replace(&mut canvas, secondary, i64::from(primary.width()), 0);
    canvas
}
