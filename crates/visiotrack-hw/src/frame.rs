//! Frame type and pixel conversion: YUYV/GREY/Y16 to RGB, dark detection, JPEG encoding.

use crate::upload::{data_url, encode_jpeg};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use image::{DynamicImage, RgbImage};
use visiotrack_core::{CapturedImage, ImageMime};

/// A captured RGB8 camera frame.
#[derive(Clone)]
pub struct Frame {
    /// Packed RGB pixel data (width * height * 3 bytes).
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub sequence: u32,
}

impl Frame {
    /// Encode as JPEG and wrap for analysis.
    pub fn to_captured_image(&self) -> Result<CapturedImage, FrameError> {
        let rgb = RgbImage::from_raw(self.width, self.height, self.data.clone()).ok_or(
            FrameError::InvalidLength {
                expected: (self.width * self.height * 3) as usize,
                actual: self.data.len(),
            },
        )?;
        let jpeg = encode_jpeg(&DynamicImage::ImageRgb8(rgb))?;
        Ok(CapturedImage {
            preview: data_url(ImageMime::Jpeg, &jpeg),
            jpeg_base64: STANDARD.encode(&jpeg),
            mime: ImageMime::Jpeg,
        })
    }
}

/// Convert packed YUYV (4:2:2) to RGB using BT.601 limited-range coefficients.
///
/// YUYV packs two pixels per 4 bytes: [Y0, U, Y1, V].
pub fn yuyv_to_rgb(yuyv: &[u8], width: u32, height: u32) -> Result<Vec<u8>, FrameError> {
    let expected = (width * height * 2) as usize;
    if yuyv.len() < expected {
        return Err(FrameError::InvalidLength {
            expected,
            actual: yuyv.len(),
        });
    }

    let mut rgb = Vec::with_capacity((width * height * 3) as usize);
    for chunk in yuyv[..expected].chunks_exact(4) {
        let (y0, u, y1, v) = (chunk[0], chunk[1], chunk[2], chunk[3]);
        rgb.extend_from_slice(&ycbcr_to_rgb(y0, u, v));
        rgb.extend_from_slice(&ycbcr_to_rgb(y1, u, v));
    }
    Ok(rgb)
}

fn ycbcr_to_rgb(y: u8, u: u8, v: u8) -> [u8; 3] {
    let c = y as i32 - 16;
    let d = u as i32 - 128;
    let e = v as i32 - 128;
    let clamp = |x: i32| ((x + 128) >> 8).clamp(0, 255) as u8;
    [
        clamp(298 * c + 409 * e),
        clamp(298 * c - 100 * d - 208 * e),
        clamp(298 * c + 516 * d),
    ]
}

/// Extract the luma channel of a YUYV buffer (every even byte).
pub fn yuyv_luma(yuyv: &[u8]) -> Vec<u8> {
    yuyv.iter().step_by(2).copied().collect()
}

/// Replicate a grayscale buffer into RGB.
pub fn grey_to_rgb(gray: &[u8]) -> Vec<u8> {
    gray.iter().flat_map(|&g| [g, g, g]).collect()
}

/// Check if a frame is dark: more than `threshold_pct` of pixels below 32.
pub fn is_dark_frame(luma: &[u8], threshold_pct: f32) -> bool {
    if luma.is_empty() {
        return true;
    }
    let dark_count = luma.iter().filter(|&&p| p < 32).count();
    (dark_count as f32 / luma.len() as f32) > threshold_pct
}

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("invalid frame length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
    #[error("jpeg encoding failed: {0}")]
    Encode(#[from] image::ImageError),
}
