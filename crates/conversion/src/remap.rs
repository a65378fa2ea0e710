//! Two-table geometric remap
//!
//! Output pixel `i` samples the source at `(map_x[i], map_y[i])`. Samples
//! falling outside the source take a constant black border.

use contracts::{ContractError, Interpolation};
use image::RgbImage;
use serde::{Deserialize, Serialize};

/// Bicubic kernel parameter (Keys, matching common undistortion tooling)
const CUBIC_A: f32 = -0.75;

/// One coordinate lookup table, row-major
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemapTable {
    pub width: u32,
    pub height: u32,
    pub values: Vec<f32>,
}

impl RemapTable {
    pub fn new(width: u32, height: u32, values: Vec<f32>) -> Result<Self, ContractError> {
        let expected = width as usize * height as usize;
        if values.len() != expected {
            return Err(ContractError::invalid_image(format!(
                "remap table holds {} values, {}x{} needs {}",
                values.len(),
                width,
                height,
                expected
            )));
        }
        Ok(Self {
            width,
            height,
            values,
        })
    }

    /// Table built from a per-pixel function of `(x, y)`
    pub fn from_fn(width: u32, height: u32, f: impl Fn(u32, u32) -> f32) -> Self {
        let mut values = Vec::with_capacity(width as usize * height as usize);
        for y in 0..height {
            for x in 0..width {
                values.push(f(x, y));
            }
        }
        Self {
            width,
            height,
            values,
        }
    }
}

/// The x/y table pair of one sensor
#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationMaps {
    map_x: RemapTable,
    map_y: RemapTable,
}

impl CalibrationMaps {
    /// Pair two tables; both must share one shape.
    pub fn new(map_x: RemapTable, map_y: RemapTable) -> Result<Self, ContractError> {
        for table in [&map_x, &map_y] {
            if table.values.len() != table.width as usize * table.height as usize {
                return Err(ContractError::invalid_image(format!(
                    "remap table {}x{} holds {} values",
                    table.width,
                    table.height,
                    table.values.len()
                )));
            }
        }
        if (map_x.width, map_x.height) != (map_y.width, map_y.height) {
            return Err(ContractError::invalid_image(format!(
                "map_x is {}x{} but map_y is {}x{}",
                map_x.width, map_x.height, map_y.width, map_y.height
            )));
        }
        Ok(Self { map_x, map_y })
    }

    /// Maps that reproduce a `width` x `height` source unchanged
    pub fn identity(width: u32, height: u32) -> Self {
        Self {
            map_x: RemapTable::from_fn(width, height, |x, _| x as f32),
            map_y: RemapTable::from_fn(width, height, |_, y| y as f32),
        }
    }

    /// Output `(width, height)`
    pub fn dimensions(&self) -> (u32, u32) {
        (self.map_x.width, self.map_x.height)
    }

    pub fn map_x(&self) -> &RemapTable {
        &self.map_x
    }

    pub fn map_y(&self) -> &RemapTable {
        &self.map_y
    }
}

/// Resample `src` through `maps`; the output takes the maps' shape.
pub fn remap(src: &RgbImage, maps: &CalibrationMaps, interpolation: Interpolation) -> RgbImage {
    let (width, height) = maps.dimensions();
    let mut out = RgbImage::new(width, height);
    let sampler = Sampler { src };

    for (i, pixel) in out.pixels_mut().enumerate() {
        let sx = maps.map_x.values[i];
        let sy = maps.map_y.values[i];
        if !sx.is_finite() || !sy.is_finite() {
            continue;
        }
        pixel.0 = match interpolation {
            Interpolation::Nearest => sampler.nearest(sx, sy),
            Interpolation::Bilinear => sampler.bilinear(sx, sy),
            Interpolation::Bicubic => sampler.bicubic(sx, sy),
        };
    }
    out
}

struct Sampler<'a> {
    src: &'a RgbImage,
}

impl Sampler<'_> {
    /// Source pixel, or black outside the image
    #[inline]
    fn tap(&self, x: i64, y: i64) -> [f32; 3] {
        let (w, h) = self.src.dimensions();
        if x < 0 || y < 0 || x >= i64::from(w) || y >= i64::from(h) {
            return [0.0; 3];
        }
        let p = self.src.get_pixel(x as u32, y as u32).0;
        [f32::from(p[0]), f32::from(p[1]), f32::from(p[2])]
    }

    fn nearest(&self, sx: f32, sy: f32) -> [u8; 3] {
        let px = self.tap((sx + 0.5).floor() as i64, (sy + 0.5).floor() as i64);
        saturate(px)
    }

    fn bilinear(&self, sx: f32, sy: f32) -> [u8; 3] {
        let (x0, y0) = (sx.floor(), sy.floor());
        let (fx, fy) = (sx - x0, sy - y0);
        let (x0, y0) = (x0 as i64, y0 as i64);

        let mut acc = [0.0f32; 3];
        for (dy, wy) in [(0, 1.0 - fy), (1, fy)] {
            for (dx, wx) in [(0, 1.0 - fx), (1, fx)] {
                let w = wx * wy;
                if w == 0.0 {
                    continue;
                }
                let p = self.tap(x0.saturating_add(dx), y0.saturating_add(dy));
                for c in 0..3 {
                    acc[c] += p[c] * w;
                }
            }
        }
        saturate(acc)
    }

    fn bicubic(&self, sx: f32, sy: f32) -> [u8; 3] {
        let (x0, y0) = (sx.floor(), sy.floor());
        let wx = cubic_weights(sx - x0);
        let wy = cubic_weights(sy - y0);
        // float-to-int casts saturate, so huge map values sit at i64::MAX/MIN
        let (x0, y0) = (x0 as i64, y0 as i64);

        let mut acc = [0.0f32; 3];
        for (j, wyj) in wy.iter().enumerate() {
            if *wyj == 0.0 {
                continue;
            }
            for (i, wxi) in wx.iter().enumerate() {
                let w = wxi * wyj;
                if w == 0.0 {
                    continue;
                }
                let p = self.tap(
                    x0.saturating_add(i as i64 - 1),
                    y0.saturating_add(j as i64 - 1),
                );
                for c in 0..3 {
                    acc[c] += p[c] * w;
                }
            }
        }
        saturate(acc)
    }
}

/// Keys cubic weights for taps at offsets -1, 0, 1, 2 from the floor sample
fn cubic_weights(t: f32) -> [f32; 4] {
    let a = CUBIC_A;
    let near = |d: f32| ((a + 2.0) * d - (a + 3.0)) * d * d + 1.0;
    let far = |d: f32| ((a * d - 5.0 * a) * d + 8.0 * a) * d - 4.0 * a;
    [far(1.0 + t), near(t), near(1.0 - t), far(2.0 - t)]
}

#[inline]
fn saturate(px: [f32; 3]) -> [u8; 3] {
    px.map(|v| v.round().clamp(0.0, 255.0) as u8)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn gradient(w: u32, h: u32) -> RgbImage {
        RgbImage::from_fn(w, h, |x, y| Rgb([(x * 20) as u8, (y * 30) as u8, 77]))
    }

    #[test]
    fn test_identity_is_lossless_for_every_kernel() {
        let src = gradient(8, 5);
        let maps = CalibrationMaps::identity(8, 5);
        for interpolation in [
            Interpolation::Nearest,
            Interpolation::Bilinear,
            Interpolation::Bicubic,
        ] {
            assert_eq!(remap(&src, &maps, interpolation), src, "{interpolation:?}");
        }
    }

    #[test]
    fn test_shift_fills_border_with_black() {
        let src = gradient(4, 2);
        let maps = CalibrationMaps::new(
            RemapTable::from_fn(4, 2, |x, _| x as f32 + 1.0),
            RemapTable::from_fn(4, 2, |_, y| y as f32),
        )
        .unwrap();
        let out = remap(&src, &maps, Interpolation::Nearest);
        assert_eq!(out.get_pixel(0, 1), src.get_pixel(1, 1));
        assert_eq!(out.get_pixel(3, 0).0, [0, 0, 0]);
    }

    #[test]
    fn test_bilinear_midpoint() {
        let src = RgbImage::from_fn(2, 1, |x, _| Rgb([if x == 0 { 100 } else { 200 }, 0, 0]));
        let maps = CalibrationMaps::new(
            RemapTable::new(1, 1, vec![0.5]).unwrap(),
            RemapTable::new(1, 1, vec![0.0]).unwrap(),
        )
        .unwrap();
        let out = remap(&src, &maps, Interpolation::Bilinear);
        assert_eq!(out.get_pixel(0, 0).0, [150, 0, 0]);
    }

    #[test]
    fn test_output_takes_map_shape() {
        let src = gradient(8, 8);
        let maps = CalibrationMaps::identity(3, 2);
        let out = remap(&src, &maps, Interpolation::Bicubic);
        assert_eq!(out.dimensions(), (3, 2));
        assert_eq!(out.get_pixel(2, 1), src.get_pixel(2, 1));
    }

    #[test]
    fn test_non_finite_coordinates_are_black() {
        let src = gradient(2, 2);
        let maps = CalibrationMaps::new(
            RemapTable::new(1, 1, vec![f32::NAN]).unwrap(),
            RemapTable::new(1, 1, vec![0.0]).unwrap(),
        )
        .unwrap();
        let out = remap(&src, &maps, Interpolation::Bicubic);
        assert_eq!(out.get_pixel(0, 0).0, [0, 0, 0]);
    }

    #[test]
    fn test_out_of_range_coordinates_are_black() {
        let src = gradient(4, 4);
        for far in [1e19f32, -1e19, f32::MAX, f32::MIN] {
            let maps = CalibrationMaps::new(
                RemapTable::from_fn(4, 4, |x, _| if x == 0 { far } else { x as f32 }),
                RemapTable::from_fn(4, 4, |_, y| if y == 0 { far } else { y as f32 }),
            )
            .unwrap();
            for interpolation in [
                Interpolation::Nearest,
                Interpolation::Bilinear,
                Interpolation::Bicubic,
            ] {
                let out = remap(&src, &maps, interpolation);
                assert_eq!(out.get_pixel(0, 0), &Rgb([0, 0, 0]), "{far} {interpolation:?}");
                assert_eq!(out.get_pixel(2, 2), src.get_pixel(2, 2), "{far} {interpolation:?}");
            }
        }
    }

    #[test]
    fn test_cubic_weights_sum_to_one() {
        for t in [0.0f32, 0.25, 0.5, 0.9] {
            let sum: f32 = cubic_weights(t).iter().sum();
            assert!((sum - 1.0).abs() < 1e-5, "t={t} sum={sum}");
        }
        assert_eq!(cubic_weights(0.0), [0.0, 1.0, 0.0, 0.0]);
    }

    #[test]
    fn test_mismatched_tables_rejected() {
        let err = CalibrationMaps::new(
            RemapTable::from_fn(2, 2, |_, _| 0.0),
            RemapTable::from_fn(3, 2, |_, _| 0.0),
        );
        assert!(err.is_err());
        assert!(RemapTable::new(2, 2, vec![0.0; 3]).is_err());
    }
}
