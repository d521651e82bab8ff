//! Binary difference masks and connected-component extraction.

use image::{GrayImage, Luma, Rgb, RgbImage};
use imageproc::region_labelling::{connected_components, Connectivity};

use super::region::{Region, RegionBounds};

const FOREGROUND: u8 = 255;
const BACKGROUND: u8 = 0;

/// Single-channel foreground/background mask, same geometry as its source frames.
#[derive(Clone, Debug)]
pub struct DifferenceMask {
    image: GrayImage,
}

impl DifferenceMask {
    /// Pixels strictly brighter than `threshold` become foreground.
    pub fn above(intensity: &GrayImage, threshold: u8) -> Self {
        Self::binarize(intensity, |v| v > threshold)
    }

    /// Pixels at or below `threshold` become foreground.
    pub fn at_or_below(intensity: &GrayImage, threshold: u8) -> Self {
        Self::binarize(intensity, |v| v <= threshold)
    }

    fn binarize(intensity: &GrayImage, is_foreground: impl Fn(u8) -> bool) -> Self {
        let (width, height) = intensity.dimensions();
        let image = GrayImage::from_fn(width, height, |x, y| {
            if is_foreground(intensity.get_pixel(x, y).0[0]) {
                Luma([FOREGROUND])
            } else {
                Luma([BACKGROUND])
            }
        });
        Self { image }
    }

    pub fn is_foreground(&self, x: u32, y: u32) -> bool {
        self.image.get_pixel(x, y).0[0] == FOREGROUND
    }

    pub fn foreground_count(&self) -> u64 {
        self.image.pixels().filter(|p| p.0[0] == FOREGROUND).count() as u64
    }

    /// Borrow the mask as an 8-bit image (0 / 255).
    pub fn as_image(&self) -> &GrayImage {
        &self.image
    }

    /// Maximal 8-connected foreground components, in the order their first pixel
    /// is met by a row-major scan.
    pub fn regions(&self) -> Vec<Region> {
        let labels = connected_components(&self.image, Connectivity::Eight, Luma([BACKGROUND]));
        let max_label = labels.pixels().map(|p| p.0[0]).max().unwrap_or(0) as usize;
        if max_label == 0 {
            return Vec::new();
        }

        // label -> index into `bounds`, assigned on first sight
        let mut slot = vec![usize::MAX; max_label + 1];
        let mut bounds: Vec<RegionBounds> = Vec::new();
        for (x, y, label) in labels.enumerate_pixels() {
            let label = label.0[0] as usize;
            if label == 0 {
                continue;
            }
            match slot[label] {
                usize::MAX => {
                    slot[label] = bounds.len();
                    bounds.push(RegionBounds::start(x, y));
                }
                idx => bounds[idx].include(x, y),
            }
        }
        bounds.into_iter().map(RegionBounds::finish).collect()
    }
}

/// Averaging blur with a square `kernel x kernel` window.
///
/// Kernels of size 0 or 1 return an unmodified copy. Even sizes are rounded down
/// to the next odd window.
pub(crate) fn box_blur(image: &GrayImage, kernel: u32) -> GrayImage {
    let radius = kernel / 2;
    if radius == 0 {
        return image.clone();
    }
    imageproc::filter::box_filter(image, radius, radius)
}

/// [`box_blur`] applied to each colour channel on its own.
pub(crate) fn box_blur_rgb(image: &RgbImage, kernel: u32) -> RgbImage {
    if kernel / 2 == 0 {
        return image.clone();
    }
    let (width, height) = image.dimensions();
    let [r, g, b] = [0usize, 1, 2].map(|channel| {
        let plane = GrayImage::from_fn(width, height, |x, y| {
            Luma([image.get_pixel(x, y).0[channel]])
        });
        box_blur(&plane, kernel)
    });
    RgbImage::from_fn(width, height, |x, y| {
        Rgb([
            r.get_pixel(x, y).0[0],
            g.get_pixel(x, y).0[0],
            b.get_pixel(x, y).0[0],
        ])
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paint(image: &mut GrayImage, x0: u32, y0: u32, w: u32, h: u32, value: u8) {
        for y in y0..y0 + h {
            for x in x0..x0 + w {
                image.put_pixel(x, y, Luma([value]));
            }
        }
    }

    #[test]
    fn threshold_directions() {
        let mut img = GrayImage::new(3, 1);
        img.put_pixel(0, 0, Luma([40]));
        img.put_pixel(1, 0, Luma([41]));
        img.put_pixel(2, 0, Luma([100]));

        let above = DifferenceMask::above(&img, 40);
        assert!(!above.is_foreground(0, 0));
        assert!(above.is_foreground(1, 0));

        let below = DifferenceMask::at_or_below(&img, 100);
        assert_eq!(below.foreground_count(), 3);
        let below = DifferenceMask::at_or_below(&img, 40);
        assert_eq!(below.foreground_count(), 1);
    }

    #[test]
    fn regions_are_reported_in_scan_order_with_pixel_areas() {
        let mut img = GrayImage::new(40, 30);
        // second in scan order: starts lower
        paint(&mut img, 2, 10, 5, 5, 255);
        // first in scan order
        paint(&mut img, 20, 1, 3, 4, 255);

        let regions = DifferenceMask::above(&img, 0).regions();
        assert_eq!(regions.len(), 2);
        assert_eq!(
            regions[0],
            Region {
                x: 20,
                y: 1,
                width: 3,
                height: 4,
                area: 12
            }
        );
        assert_eq!(
            regions[1],
            Region {
                x: 2,
                y: 10,
                width: 5,
                height: 5,
                area: 25
            }
        );
    }

    #[test]
    fn diagonal_neighbours_join_one_component() {
        let mut img = GrayImage::new(4, 4);
        img.put_pixel(0, 0, Luma([255]));
        img.put_pixel(1, 1, Luma([255]));
        img.put_pixel(2, 2, Luma([255]));
        let regions = DifferenceMask::above(&img, 0).regions();
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].area, 3);
        assert_eq!((regions[0].width, regions[0].height), (3, 3));
    }

    #[test]
    fn empty_mask_has_no_regions() {
        let img = GrayImage::new(8, 8);
        assert!(DifferenceMask::above(&img, 0).regions().is_empty());
    }

    #[test]
    fn blur_keeps_uniform_images_and_spreads_edges() {
        let flat = GrayImage::from_pixel(9, 9, Luma([77]));
        assert!(box_blur(&flat, 5).pixels().all(|p| p.0[0] == 77));

        let mut spike = GrayImage::new(9, 9);
        spike.put_pixel(4, 4, Luma([225]));
        let blurred = box_blur(&spike, 3);
        assert!(blurred.get_pixel(4, 4).0[0] < 225);
        assert!(blurred.get_pixel(3, 3).0[0] > 0);
        assert_eq!(blurred.get_pixel(0, 0).0[0], 0);
    }

    #[test]
    fn colour_blur_works_per_channel() {
        let mut img = RgbImage::from_pixel(9, 9, Rgb([10, 120, 0]));
        img.put_pixel(4, 4, Rgb([10, 120, 225]));
        let blurred = box_blur_rgb(&img, 3);

        let mut blue = GrayImage::new(9, 9);
        blue.put_pixel(4, 4, Luma([225]));
        let expected_blue = box_blur(&blue, 3);
        for (x, y, px) in blurred.enumerate_pixels() {
            assert_eq!(px.0[0], 10);
            assert_eq!(px.0[1], 120);
            assert_eq!(px.0[2], expected_blue.get_pixel(x, y).0[0]);
        }
        assert_eq!(box_blur_rgb(&img, 1), img);
    }
}
