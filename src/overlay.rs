//! Frame annotations: region boxes and crossing-zone guides.

use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_line_segment_mut};
use imageproc::rect::Rect;

use crate::detect::{CrossingConfig, Region};
use crate::frame::Frame;

const BOX_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
const ZONE_COLOR: Rgb<u8> = Rgb([255, 200, 0]);
const CENTER_COLOR: Rgb<u8> = Rgb([90, 90, 255]);
const BOX_THICKNESS: u32 = 2;

/// RGB copy of `frame` with a box drawn around each region.
pub fn annotate(frame: &Frame, regions: &[Region]) -> Frame {
    let mut canvas = frame.to_rgb();
    draw_regions(&mut canvas, regions);
    Frame::from_rgb_image(canvas, frame.captured_at())
}

pub fn draw_regions(canvas: &mut RgbImage, regions: &[Region]) {
    for region in regions {
        for inset in 0..BOX_THICKNESS {
            let width = region.width.saturating_sub(2 * inset);
            let height = region.height.saturating_sub(2 * inset);
            if width == 0 || height == 0 {
                break;
            }
            let rect = Rect::at((region.x + inset) as i32, (region.y + inset) as i32)
                .of_size(width, height);
            draw_hollow_rect_mut(canvas, rect, BOX_COLOR);
        }
    }
}

/// Vertical guide lines at the two zone thresholds and the center reference.
pub fn draw_zone_guides(canvas: &mut RgbImage, zones: &CrossingConfig) {
    let bottom = canvas.height().saturating_sub(1) as f32;
    let guides = [
        (zones.left_zone, ZONE_COLOR),
        (zones.center_reference, CENTER_COLOR),
        (zones.right_zone, ZONE_COLOR),
    ];
    for (x, color) in guides {
        if x < canvas.width() {
            draw_line_segment_mut(canvas, (x as f32, 0.0), (x as f32, bottom), color);
        }
    }
}
