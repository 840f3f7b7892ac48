//! Generic RGB writer backed by the `image` crate codecs
//!
//! Covers every still format the `image` crate can write from 8-bit RGB:
//! JPG, PNG, BMP and TGA. Used when the dedicated backends are disabled and
//! as the only route for BMP/TGA.

use image::codecs::{bmp::BmpEncoder, jpeg::JpegEncoder, png::PngEncoder, tga::TgaEncoder};
use image::{ExtendedColorType, ImageEncoder, ImageError};
use log::debug;
use std::io::Write;

use super::{FrameEncoder, Picture};
use crate::error::{ExportError, Result};
use crate::format::PictureFormat;

#[derive(Debug, Clone)]
pub struct ImageWriterEncoder {
    format: PictureFormat,
    quality: u8,
}

impl ImageWriterEncoder {
    pub fn new(format: PictureFormat, quality: u8) -> Self {
        Self {
            format,
            quality: quality.clamp(1, 100),
        }
    }
}

impl FrameEncoder for ImageWriterEncoder {
    fn name(&self) -> &'static str {
        "image"
    }

    fn encode(&self, picture: Picture<'_>, mut sink: &mut dyn Write) -> Result<()> {
        let rgb = match picture {
            Picture::Rgb(rgb) => rgb,
            other => {
                return Err(ExportError::UnsupportedFormat(format!(
                    "generic writer needs packed RGB, got {}",
                    other.describe()
                )));
            }
        };

        let (w, h) = (rgb.width() as u32, rgb.height() as u32);
        let fail = |e: ImageError| ExportError::encoder(self.name(), e);

        match self.format {
            PictureFormat::Jpg => JpegEncoder::new_with_quality(sink, self.quality)
                .write_image(&rgb.data, w, h, ExtendedColorType::Rgb8)
                .map_err(fail)?,
            PictureFormat::Png => PngEncoder::new(sink)
                .write_image(&rgb.data, w, h, ExtendedColorType::Rgb8)
                .map_err(fail)?,
            PictureFormat::Bmp => BmpEncoder::new(&mut sink)
                .write_image(&rgb.data, w, h, ExtendedColorType::Rgb8)
                .map_err(fail)?,
            PictureFormat::Tga => TgaEncoder::new(sink)
                .write_image(&rgb.data, w, h, ExtendedColorType::Rgb8)
                .map_err(fail)?,
            other => {
                return Err(ExportError::UnsupportedFormat(format!(
                    "generic writer cannot produce {}",
                    other
                )));
            }
        }

        debug!("{} {}x{} written via image crate", self.format, w, h);
        Ok(())
    }
}
