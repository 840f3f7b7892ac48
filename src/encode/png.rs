//! Dedicated PNG backend (png crate), 8-bit RGB

use log::debug;
use std::io::Write;

use super::{FrameEncoder, Picture};
use crate::error::{ExportError, Result};

#[derive(Debug, Clone, Copy, Default)]
pub struct PngEncoder;

impl FrameEncoder for PngEncoder {
    fn name(&self) -> &'static str {
        "png"
    }

    fn encode(&self, picture: Picture<'_>, sink: &mut dyn Write) -> Result<()> {
        let rgb = match picture {
            Picture::Rgb(rgb) => rgb,
            other => {
                return Err(ExportError::UnsupportedFormat(format!(
                    "PNG backend needs packed RGB, got {}",
                    other.describe()
                )));
            }
        };

        let fail = |e: png::EncodingError| ExportError::encoder(self.name(), e);

        let mut encoder = png::Encoder::new(sink, rgb.width() as u32, rgb.height() as u32);
        encoder.set_color(png::ColorType::Rgb);
        encoder.set_depth(png::BitDepth::Eight);
        encoder.set_compression(png::Compression::Fast);

        let mut writer = encoder.write_header().map_err(fail)?;
        writer.write_image_data(&rgb.data).map_err(fail)?;
        writer.finish().map_err(fail)?;

        debug!("PNG {}x{} written", rgb.width(), rgb.height());
        Ok(())
    }
}
