//! ConversionStage - raw pair to undistorted pair
//!
//! Consumes a pair and replaces each frame's image in place: raw, then
//! color, then undistorted. Slots are independent and convert in parallel.

use std::sync::Arc;
use std::thread;
use std::time::Instant;

use contracts::{ContractError, ConvertedFramePair, Frame, FrameImage, FramePair};
use tracing::trace;

use crate::calibration::CalibrationSet;
use crate::demosaic::demosaic;
use crate::remap::remap;

/// Stateless converter bound to the startup calibration
#[derive(Debug, Clone)]
pub struct ConversionStage {
    calibration: Arc<CalibrationSet>,
}

impl ConversionStage {
    pub fn new(calibration: Arc<CalibrationSet>) -> Self {
        Self { calibration }
    }

    /// Convert every present frame of `pair` to its undistorted form.
    ///
    /// An absent secondary slot stays absent.
    pub fn convert_pair(&self, pair: FramePair) -> Result<ConvertedFramePair, ContractError> {
        let started = Instant::now();
        let (trigger, primary, secondary) = pair.into_parts();

        let (primary, secondary) = match secondary {
            Some(secondary) => thread::scope(|scope| {
                let worker = scope.spawn(|| self.convert_frame(secondary));
                let primary = self.convert_frame(primary);
                let secondary = worker
                    .join()
                    .map_err(|_| ContractError::Other("secondary conversion panicked".into()))?;
                Ok::<_, ContractError>((primary?, Some(secondary?)))
            })?,
            None => (self.convert_frame(primary)?, None),
        };

        let converted = ConvertedFramePair::try_from(FramePair::new(trigger, primary, secondary)?)?;
        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
        observability::record_conversion_ms(elapsed_ms);
        trace!(sequence = trigger.sequence, elapsed_ms, "pair converted");
        Ok(converted)
    }

    /// Advance one frame to the undistorted stage
    pub fn convert_frame(&self, frame: Frame) -> Result<Frame, ContractError> {
        let Frame { meta, image } = frame;
        let image = self.undistort(to_color(image), &meta)?;
        Ok(Frame::new(meta, image))
    }

    fn undistort(
        &self,
        image: FrameImage,
        meta: &contracts::FrameMeta,
    ) -> Result<FrameImage, ContractError> {
        match image {
            FrameImage::Color(rgb) => {
                let maps = self.calibration.maps(meta.slot).ok_or_else(|| {
                    ContractError::calibration_load(
                        meta.slot.to_string(),
                        format!("no calibration maps for camera {}", meta.serial),
                    )
                })?;
                Ok(FrameImage::Undistorted(remap(
                    &rgb,
                    maps,
                    self.calibration.interpolation(),
                )))
            }
            other => Ok(other),
        }
    }
}

/// Demosaic raw images; later stages pass through
fn to_color(image: FrameImage) -> FrameImage {
    match image {
        FrameImage::Raw(raw) => FrameImage::Color(demosaic(&raw)),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use chrono::Utc;
    use contracts::{
        BayerImage, BayerPattern, FrameMeta, FrameStage, Interpolation, Slot, TriggerEvent,
        WhiteBalance,
    };
    use rand::Rng;

    fn raw_frame(slot: Slot, trigger: &TriggerEvent, data: Vec<u8>, w: u32, h: u32) -> Frame {
        let meta = FrameMeta {
            slot,
            serial: format!("SN{}", slot.index()).into(),
            sequence: trigger.sequence,
            host_time: trigger.fired_at,
            device_time: None,
            exposure_us: 10_000.0,
            gain: 0,
            white_balance: WhiteBalance::default(),
            auto_exposure: false,
            auto_gain: false,
            image_number: None,
        };
        let raw = BayerImage::new(w, h, BayerPattern::Rggb, Bytes::from(data)).unwrap();
        Frame::new(meta, FrameImage::Raw(raw))
    }

    fn random_bytes(n: usize) -> Vec<u8> {
        let mut rng = rand::rng();
        (0..n).map(|_| rng.random()).collect()
    }

    fn stage(slots: usize, w: u32, h: u32) -> ConversionStage {
        ConversionStage::new(Arc::new(CalibrationSet::identity(
            slots,
            w,
            h,
            Interpolation::Bicubic,
        )))
    }

    #[test]
    fn test_pair_becomes_undistorted() {
        let trigger = TriggerEvent::new(5, Utc::now());
        let pair = FramePair::new(
            trigger,
            raw_frame(Slot::Primary, &trigger, vec![128; 48], 8, 6),
            Some(raw_frame(Slot::Secondary, &trigger, vec![64; 48], 8, 6)),
        )
        .unwrap();

        let converted = stage(2, 8, 6).convert_pair(pair).unwrap();
        assert_eq!(converted.stage(), FrameStage::Undistorted);
        assert_eq!(converted.trigger().sequence, 5);
        assert!(converted.primary_rgb().pixels().all(|p| p.0 == [128; 3]));
        assert!(converted.secondary_rgb().unwrap().pixels().all(|p| p.0 == [64; 3]));
    }

    #[test]
    fn test_absent_secondary_stays_absent() {
        let trigger = TriggerEvent::new(0, Utc::now());
        let pair = FramePair::new(
            trigger,
            raw_frame(Slot::Primary, &trigger, vec![1; 16], 4, 4),
            None,
        )
        .unwrap();
        let converted = stage(1, 4, 4).convert_pair(pair).unwrap();
        assert!(converted.secondary_rgb().is_none());
    }

    #[test]
    fn test_conversion_is_deterministic() {
        let trigger = TriggerEvent::new(1, Utc::now());
        let (w, h) = (32, 24);
        let a = random_bytes((w * h) as usize);
        let b = random_bytes((w * h) as usize);

        let maps = crate::remap::CalibrationMaps::new(
            crate::remap::RemapTable::from_fn(w, h, |x, y| x as f32 * 0.97 + y as f32 * 0.01 + 0.3),
            crate::remap::RemapTable::from_fn(w, h, |x, y| y as f32 * 1.02 - x as f32 * 0.02),
        )
        .unwrap();
        let converter = ConversionStage::new(Arc::new(CalibrationSet::from_maps(
            vec![maps.clone(), maps],
            Interpolation::Bicubic,
        )));

        let run = || {
            let pair = FramePair::new(
                trigger,
                raw_frame(Slot::Primary, &trigger, a.clone(), w, h),
                Some(raw_frame(Slot::Secondary, &trigger, b.clone(), w, h)),
            )
            .unwrap();
            converter.convert_pair(pair).unwrap()
        };
        let first = run();
        let second = run();
        assert_eq!(first.primary_rgb(), second.primary_rgb());
        assert_eq!(first.secondary_rgb(), second.secondary_rgb());
    }

    #[test]
    fn test_missing_slot_maps_is_error() {
        let trigger = TriggerEvent::new(0, Utc::now());
        let pair = FramePair::new(
            trigger,
            raw_frame(Slot::Primary, &trigger, vec![0; 16], 4, 4),
            Some(raw_frame(Slot::Secondary, &trigger, vec![0; 16], 4, 4)),
        )
        .unwrap();
        assert!(stage(1, 4, 4).convert_pair(pair).is_err());
    }
}
