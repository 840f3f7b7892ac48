//! WEBP backend
//!
//! Lossy VP8 through libwebp; the session quality maps straight onto the
//! libwebp quality factor.

use log::debug;
use std::io::Write;

use super::{FrameEncoder, Picture, write_err};
use crate::error::{ExportError, Result};

#[derive(Debug, Clone)]
pub struct WebpEncoder {
    quality: u8,
}

impl WebpEncoder {
    pub fn new(quality: u8) -> Self {
        Self {
            quality: quality.clamp(1, 100),
        }
    }
}

impl FrameEncoder for WebpEncoder {
    fn name(&self) -> &'static str {
        "webp"
    }

    fn encode(&self, picture: Picture<'_>, sink: &mut dyn Write) -> Result<()> {
        let rgb = match picture {
            Picture::Rgb(rgb) => rgb,
            other => {
                return Err(ExportError::UnsupportedFormat(format!(
                    "WEBP backend needs packed RGB, got {}",
                    other.describe()
                )));
            }
        };

        // libwebp caps both sides at 16383
        let (w, h) = (rgb.width(), rgb.height());
        if w == 0 || h == 0 || w > 16383 || h > 16383 {
            return Err(ExportError::encoder(
                self.name(),
                format!("{}x{} is outside the WEBP size range", w, h),
            ));
        }

        let encoded = libwebp::Encoder::from_rgb(&rgb.data, w as u32, h as u32)
            .encode_simple(false, self.quality as f32)
            .map_err(|e| ExportError::encoder(self.name(), format!("{:?}", e)))?;
        sink.write_all(&encoded).map_err(write_err(self.name()))?;

        debug!("WEBP {}x{} q{}: {} bytes", w, h, self.quality, encoded.len());
        Ok(())
    }
}
