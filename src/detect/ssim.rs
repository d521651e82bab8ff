//! Structural similarity (SSIM) over 8-bit intensity images.
//!
//! Local statistics use a square uniform window with half-sample symmetric
//! reflection at the borders and sample (N-1) covariance normalisation. The
//! global score is the mean of the per-pixel map with a border of half a window
//! excluded, falling back to the whole map when the image is smaller than that.

use image::GrayImage;

const DATA_RANGE: f64 = 255.0;
const K1: f64 = 0.01;
const K2: f64 = 0.03;

/// Per-pixel SSIM values plus the global mean.
#[derive(Clone, Debug)]
pub struct SsimMap {
    values: Vec<f64>,
    width: u32,
    height: u32,
    score: f64,
}

impl SsimMap {
    /// Global similarity in [-1, 1]; 1 means identical.
    pub fn score(&self) -> f64 {
        self.score
    }

    pub fn value(&self, x: u32, y: u32) -> f64 {
        self.values[(y * self.width + x) as usize]
    }

    /// Map scaled onto 0..=255 (negative similarity clamps to 0).
    pub fn to_intensity(&self) -> GrayImage {
        GrayImage::from_fn(self.width, self.height, |x, y| {
            let scaled = (self.value(x, y) * DATA_RANGE).clamp(0.0, DATA_RANGE);
            image::Luma([scaled as u8])
        })
    }
}

/// Compare two equally sized images with a `window x window` uniform filter.
pub fn structural_similarity(a: &GrayImage, b: &GrayImage, window: u32) -> SsimMap {
    debug_assert_eq!(a.dimensions(), b.dimensions());
    let (width, height) = a.dimensions();
    let window = window.max(2) as usize;
    let w = width as usize;
    let h = height as usize;

    let x: Vec<f64> = a.as_raw().iter().map(|&v| v as f64).collect();
    let y: Vec<f64> = b.as_raw().iter().map(|&v| v as f64).collect();
    let xx: Vec<f64> = x.iter().map(|v| v * v).collect();
    let yy: Vec<f64> = y.iter().map(|v| v * v).collect();
    let xy: Vec<f64> = x.iter().zip(&y).map(|(p, q)| p * q).collect();

    let ux = uniform_filter(&x, w, h, window);
    let uy = uniform_filter(&y, w, h, window);
    let uxx = uniform_filter(&xx, w, h, window);
    let uyy = uniform_filter(&yy, w, h, window);
    let uxy = uniform_filter(&xy, w, h, window);

    let np = (window * window) as f64;
    let cov_norm = np / (np - 1.0);
    let c1 = (K1 * DATA_RANGE).powi(2);
    let c2 = (K2 * DATA_RANGE).powi(2);

    let values: Vec<f64> = (0..w * h)
        .map(|i| {
            let vx = cov_norm * (uxx[i] - ux[i] * ux[i]);
            let vy = cov_norm * (uyy[i] - uy[i] * uy[i]);
            let vxy = cov_norm * (uxy[i] - ux[i] * uy[i]);

            let a1 = 2.0 * ux[i] * uy[i] + c1;
            let a2 = 2.0 * vxy + c2;
            let b1 = ux[i] * ux[i] + uy[i] * uy[i] + c1;
            let b2 = vx + vy + c2;
            (a1 * a2) / (b1 * b2)
        })
        .collect();

    let score = cropped_mean(&values, w, h, (window - 1) / 2);
    SsimMap {
        values,
        width,
        height,
        score,
    }
}

fn cropped_mean(values: &[f64], w: usize, h: usize, pad: usize) -> f64 {
    let (x_range, y_range) = if w > 2 * pad && h > 2 * pad {
        (pad..w - pad, pad..h - pad)
    } else {
        (0..w, 0..h)
    };
    let count = (x_range.len() * y_range.len()).max(1) as f64;
    let mut sum = 0.0;
    for yy in y_range {
        for xx in x_range.clone() {
            sum += values[yy * w + xx];
        }
    }
    sum / count
}

/// Separable mean filter with reflected borders.
fn uniform_filter(data: &[f64], w: usize, h: usize, size: usize) -> Vec<f64> {
    let before = (size / 2) as isize;
    let after = size as isize - before;

    let mut rows = vec![0.0; data.len()];
    for yy in 0..h {
        let row = &data[yy * w..(yy + 1) * w];
        for xx in 0..w {
            let mut sum = 0.0;
            for k in -before..after {
                sum += row[reflect(xx as isize + k, w)];
            }
            rows[yy * w + xx] = sum / size as f64;
        }
    }

    let mut out = vec![0.0; data.len()];
    for xx in 0..w {
        for yy in 0..h {
            let mut sum = 0.0;
            for k in -before..after {
                sum += rows[reflect(yy as isize + k, h) * w + xx];
            }
            out[yy * w + xx] = sum / size as f64;
        }
    }
    out
}

/// Half-sample symmetric index: `d c b a | a b c d | d c b a`.
fn reflect(i: isize, n: usize) -> usize {
    let n = n as isize;
    let period = 2 * n;
    let mut m = i.rem_euclid(period);
    if m >= n {
        m = period - 1 - m;
    }
    m as usize
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    #[test]
    fn reflect_mirrors_past_both_edges() {
        assert_eq!(reflect(-1, 4), 0);
        assert_eq!(reflect(-2, 4), 1);
        assert_eq!(reflect(4, 4), 3);
        assert_eq!(reflect(5, 4), 2);
        assert_eq!(reflect(2, 4), 2);
    }

    #[test]
    fn identical_images_score_one() {
        let img = GrayImage::from_fn(32, 24, |x, y| Luma([((x * 7 + y * 3) % 256) as u8]));
        let map = structural_similarity(&img, &img, 7);
        assert!((map.score() - 1.0).abs() < 1e-9);
        assert!(map.to_intensity().pixels().all(|p| p.0[0] == 255));
    }

    #[test]
    fn inverted_content_scores_low() {
        let a = GrayImage::from_fn(32, 32, |x, _| Luma([if x % 4 < 2 { 10 } else { 240 }]));
        let b = GrayImage::from_fn(32, 32, |x, _| Luma([if x % 4 < 2 { 240 } else { 10 }]));
        let map = structural_similarity(&a, &b, 7);
        assert!(map.score() < 0.0);
        assert_eq!(map.to_intensity().get_pixel(16, 16).0[0], 0);
    }

    #[test]
    fn small_images_use_whole_map() {
        let a = GrayImage::from_pixel(4, 4, Luma([50]));
        let map = structural_similarity(&a, &a, 7);
        assert!((map.score() - 1.0).abs() < 1e-9);
    }
}
