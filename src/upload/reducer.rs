//! Image size reduction.

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::ColorType;

use crate::backend::ApiError;

/// Parameters of one reduction pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReducePass {
    /// Maximum output width in pixels; `None` keeps the original width
    pub max_width: Option<u32>,
    /// JPEG quality in `(0, 1]`
    pub quality: f32,
}

impl ReducePass {
    pub const fn new(max_width: Option<u32>, quality: f32) -> Self {
        Self { max_width, quality }
    }

    /// Quality mapped onto the encoder's 1..=100 scale.
    pub fn jpeg_quality(&self) -> u8 {
        (self.quality * 100.0).round().clamp(1.0, 100.0) as u8
    }
}

/// Shrinks an encoded image. Implementations must be pure with respect to
/// their input so passes can be chained.
pub trait ImageReducer: Send + Sync {
    fn reduce(&self, bytes: &[u8], pass: ReducePass) -> Result<Vec<u8>, ApiError>;
}

/// Decodes any supported format and re-encodes as JPEG, downscaling to the
/// pass width while keeping the aspect ratio.
#[derive(Debug, Clone, Copy, Default)]
pub struct JpegReducer;

impl ImageReducer for JpegReducer {
    fn reduce(&self, bytes: &[u8], pass: ReducePass) -> Result<Vec<u8>, ApiError> {
        let mut img = image::load_from_memory(bytes).map_err(|e| ApiError::Image(format!("decode failed: {e}")))?;

        if let Some(width) = pass.max_width {
            if img.width() > width {
                img = img.resize(width, u32::MAX, FilterType::Triangle);
            }
        }

        let rgb = img.to_rgb8();
        let mut out = Vec::new();
        JpegEncoder::new_with_quality(&mut out, pass.jpeg_quality())
            .encode(rgb.as_raw(), rgb.width(), rgb.height(), ColorType::Rgb8)
            .map_err(|e| ApiError::Image(format!("encode failed: {e}")))?;
        Ok(out)
    }
}
