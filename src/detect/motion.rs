//! Frame-differencing motion extraction.
//!
//! The extractor assumes a single dominant subject: of all moving components it
//! keeps only the largest one. It is a pure function of its two input frames.

use image::{GrayImage, Luma, RgbImage};

use super::mask::{box_blur, box_blur_rgb, DifferenceMask};
use super::region::Region;
use crate::error::PipelineResult;
use crate::frame::{Channels, Frame};

pub const DEFAULT_MOTION_THRESHOLD: u8 = 40;
pub const DEFAULT_MIN_CONTOUR_AREA: u64 = 500;
pub const DEFAULT_MOTION_BLUR_KERNEL: u32 = 5;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MotionConfig {
    /// Intensity difference above which a pixel counts as changed.
    pub threshold: u8,
    /// The dominant component must cover more pixels than this.
    pub min_contour_area: u64,
    /// Side of the square averaging window applied to the difference image.
    pub blur_kernel: u32,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_MOTION_THRESHOLD,
            min_contour_area: DEFAULT_MIN_CONTOUR_AREA,
            blur_kernel: DEFAULT_MOTION_BLUR_KERNEL,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct MotionExtractor {
    config: MotionConfig,
}

impl MotionExtractor {
    pub fn new(config: MotionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &MotionConfig {
        &self.config
    }

    /// Dominant motion region between `reference` and `current`, if it is large enough.
    pub fn extract(&self, reference: &Frame, current: &Frame) -> PipelineResult<Option<Region>> {
        let mask = self.difference_mask(reference, current)?;
        let dominant = largest_region(mask.regions());
        Ok(dominant.filter(|region| region.area > self.config.min_contour_area))
    }

    /// Thresholded, blurred absolute difference of the two frames.
    pub fn difference_mask(
        &self,
        reference: &Frame,
        current: &Frame,
    ) -> PipelineResult<DifferenceMask> {
        reference.ensure_same_geometry(current)?;
        let blurred = blurred_difference(reference, current, self.config.blur_kernel);
        Ok(DifferenceMask::above(&blurred, self.config.threshold))
    }
}

/// Largest region by area; ties go to the first one found.
fn largest_region(regions: Vec<Region>) -> Option<Region> {
    regions.into_iter().fold(None, |best, region| match best {
        Some(b) if b.area >= region.area => Some(b),
        _ => Some(region),
    })
}

/// Per-pixel |current - reference|, blurred, then collapsed to one intensity channel.
///
/// Colour pairs are blurred per channel before the gray conversion.
fn blurred_difference(reference: &Frame, current: &Frame, kernel: u32) -> GrayImage {
    let (width, height) = (reference.width(), reference.height());
    match (reference.channels(), current.channels()) {
        (Channels::Rgb, Channels::Rgb) => {
            let data = reference
                .pixels()
                .iter()
                .zip(current.pixels())
                .map(|(a, b)| a.abs_diff(*b))
                .collect();
            let diff = RgbImage::from_raw(width, height, data)
                .unwrap_or_else(|| RgbImage::new(width, height));
            image::imageops::grayscale(&box_blur_rgb(&diff, kernel))
        }
        _ => {
            let a = reference.to_luma();
            let b = current.to_luma();
            let diff = GrayImage::from_fn(width, height, |x, y| {
                Luma([a.get_pixel(x, y).0[0].abs_diff(b.get_pixel(x, y).0[0])])
            });
            box_blur(&diff, kernel)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PipelineError;
    use chrono::Local;
    use image::Rgb;

    fn scene(width: u32, height: u32, blobs: &[(u32, u32, u32, u32)]) -> Frame {
        let mut img = RgbImage::from_pixel(width, height, Rgb([30, 30, 30]));
        for &(x0, y0, w, h) in blobs {
            for y in y0..y0 + h {
                for x in x0..x0 + w {
                    img.put_pixel(x, y, Rgb([200, 200, 200]));
                }
            }
        }
        Frame::from_rgb_image(img, Local::now())
    }

    #[test]
    fn identical_frames_have_no_motion() -> PipelineResult<()> {
        let frame = scene(120, 80, &[(10, 10, 30, 30)]);
        let extractor = MotionExtractor::default();
        assert_eq!(extractor.extract(&frame, &frame.clone())?, None);
        Ok(())
    }

    #[test]
    fn returns_largest_of_several_blobs() -> PipelineResult<()> {
        let reference = scene(200, 120, &[]);
        let current = scene(200, 120, &[(120, 60, 25, 25), (20, 20, 40, 40), (170, 5, 8, 8)]);
        let extractor = MotionExtractor::default();

        let region = extractor.extract(&reference, &current)?.expect("motion");
        // blur widens the blob by at most two pixels per side
        assert!((17..=20).contains(&region.x), "x = {}", region.x);
        assert!((17..=20).contains(&region.y), "y = {}", region.y);
        assert!((40..=44).contains(&region.width), "w = {}", region.width);
        assert!((40..=44).contains(&region.height), "h = {}", region.height);
        assert!(region.area >= 40 * 40);
        Ok(())
    }

    #[test]
    fn small_dominant_blob_is_rejected() -> PipelineResult<()> {
        let reference = scene(100, 100, &[]);
        let current = scene(100, 100, &[(40, 40, 10, 10)]);

        let strict = MotionExtractor::default();
        assert_eq!(strict.extract(&reference, &current)?, None);

        let lenient = MotionExtractor::new(MotionConfig {
            min_contour_area: 50,
            ..MotionConfig::default()
        });
        assert!(lenient.extract(&reference, &current)?.is_some());
        Ok(())
    }

    #[test]
    fn faint_changes_stay_below_threshold() -> PipelineResult<()> {
        let reference = Frame::from_rgb_image(RgbImage::from_pixel(64, 64, Rgb([100, 100, 100])), Local::now());
        let current = Frame::from_rgb_image(RgbImage::from_pixel(64, 64, Rgb([130, 130, 130])), Local::now());
        let mask = MotionExtractor::default().difference_mask(&reference, &current)?;
        assert_eq!(mask.foreground_count(), 0);
        Ok(())
    }

    #[test]
    fn equal_areas_keep_first_found() {
        let first = Region {
            x: 5,
            y: 0,
            width: 2,
            height: 2,
            area: 4,
        };
        let second = Region { x: 50, ..first };
        assert_eq!(largest_region(vec![first, second]), Some(first));
        assert_eq!(largest_region(Vec::new()), None);
    }

    #[test]
    fn mismatched_frames_are_rejected() {
        let a = scene(10, 10, &[]);
        let b = scene(12, 10, &[]);
        assert!(matches!(
            MotionExtractor::default().extract(&a, &b),
            Err(PipelineError::FrameMismatch { .. })
        ));
    }

    #[test]
    fn single_channel_change_survives_colour_blur() -> PipelineResult<()> {
        let reference = scene(160, 100, &[]);
        let mut img = RgbImage::from_pixel(160, 100, Rgb([30, 30, 30]));
        for y in 30..70 {
            for x in 60..100 {
                img.put_pixel(x, y, Rgb([250, 30, 30]));
            }
        }
        let current = Frame::from_rgb_image(img, Local::now());

        let region = MotionExtractor::default()
            .extract(&reference, &current)?
            .expect("red block");
        assert!((58..=62).contains(&region.x), "x = {}", region.x);
        assert!((28..=32).contains(&region.y), "y = {}", region.y);
        assert!(region.area >= 36 * 36);
        Ok(())
    }
}
