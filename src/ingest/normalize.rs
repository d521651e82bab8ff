use crate::error::{PipelineError, PipelineResult};

/// Capture pixel layouts understood by the device source.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum PixelFormat {
    /// Packed 8-bit RGB (`RGB3`).
    Rgb24,
    /// Packed 4:2:2 `Y0 U Y1 V` (`YUYV`), the common USB webcam default.
    Yuyv,
}

impl PixelFormat {
    pub(crate) fn from_fourcc(fourcc: &[u8; 4]) -> Option<Self> {
        match fourcc {
            b"RGB3" => Some(PixelFormat::Rgb24),
            b"YUYV" => Some(PixelFormat::Yuyv),
            _ => None,
        }
    }
}

pub(crate) fn normalize_to_rgb(
    pixels: &[u8],
    width: u32,
    height: u32,
    format: PixelFormat,
) -> PipelineResult<Vec<u8>> {
    let bytes_per_pixel = match format {
        PixelFormat::Rgb24 => 3,
        PixelFormat::Yuyv => 2,
    };
    let expected = (width as usize)
        .checked_mul(height as usize)
        .and_then(|v| v.checked_mul(bytes_per_pixel))
        .ok_or_else(|| PipelineError::InvalidFrame("capture dimensions overflow".into()))?;
    // Drivers may hand out buffers padded past the image payload.
    if pixels.len() < expected {
        return Err(PipelineError::InvalidFrame(format!(
            "{:?} buffer too short: expected {}, got {}",
            format,
            expected,
            pixels.len()
        )));
    }
    let pixels = &pixels[..expected];

    match format {
        PixelFormat::Rgb24 => Ok(pixels.to_vec()),
        PixelFormat::Yuyv => Ok(yuyv_to_rgb(pixels)),
    }
}

fn yuyv_to_rgb(pixels: &[u8]) -> Vec<u8> {
    let mut rgb = Vec::with_capacity(pixels.len() / 2 * 3);
    for macro_px in pixels.chunks_exact(4) {
        let u = macro_px[1] as f32 - 128.0;
        let v = macro_px[3] as f32 - 128.0;
        for y in [macro_px[0], macro_px[2]] {
            let y = y as f32;
            rgb.push(clamp_to_u8(y + 1.402_f32 * v));
            rgb.push(clamp_to_u8(y - 0.344_136_f32 * u - 0.714_136_f32 * v));
            rgb.push(clamp_to_u8(y + 1.772_f32 * u));
        }
    }
    rgb
}

fn clamp_to_u8(value: f32) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}
