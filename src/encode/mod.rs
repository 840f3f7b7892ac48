//! Picture encoders, one per negotiated backend
//!
//! Backends consume either planar YCbCr (raw dump, dedicated JPEG) or packed
//! RGB (PNG, BMP, TGA, WEBP, generic JPEG) and stream their output into a sink.
//! Dispatch goes through `enum_dispatch`, selected once from the negotiated
//! [`Backend`](crate::format::Backend).

use enum_dispatch::enum_dispatch;
use std::io::Write;

use crate::error::Result;
use crate::format::Backend;
use crate::planes::PlanarBuffer;
use crate::rgb_cvt::PackedRgbBuffer;

mod image_writer;
mod jpeg;
mod jpeg_tables;
mod png;
mod raw;
mod webp;

pub use image_writer::ImageWriterEncoder;
pub use jpeg::JpegRawEncoder;
pub use png::PngEncoder;
pub use raw::RawPlanarEncoder;
pub use webp::WebpEncoder;

/// Default quality for JPEG when the request carries none
pub const DEFAULT_JPEG_QUALITY: u8 = 85;
/// Default quality for WEBP when the request carries none
pub const DEFAULT_WEBP_QUALITY: u8 = 80;

/// Buffer handed to an encoder
#[derive(Clone, Copy, Debug)]
pub enum Picture<'a> {
    Planar(&'a PlanarBuffer),
    Rgb(&'a PackedRgbBuffer),
}

impl Picture<'_> {
    pub fn dims(&self) -> (usize, usize) {
        match self {
            Picture::Planar(p) => (p.width(), p.height()),
            Picture::Rgb(p) => (p.width(), p.height()),
        }
    }

    /// Human readable buffer shape for error messages
    pub fn describe(&self) -> String {
        let (w, h) = self.dims();
        match self {
            Picture::Planar(p) => format!("planar {} {}x{}", p.subsampling(), w, h),
            Picture::Rgb(_) => format!("packed RGB {}x{}", w, h),
        }
    }
}

/// Common interface of every output backend
#[enum_dispatch]
pub trait FrameEncoder {
    /// Short backend name used in logs and errors
    fn name(&self) -> &'static str;

    /// Encode `picture` and write the result to `sink`.
    /// Errors are terminal for the export that called it.
    fn encode(&self, picture: Picture<'_>, sink: &mut dyn Write) -> Result<()>;
}

#[enum_dispatch(FrameEncoder)]
#[derive(Debug, Clone)]
pub enum Encoder {
    RawPlanarEncoder,
    JpegRawEncoder,
    PngEncoder,
    ImageWriterEncoder,
    WebpEncoder,
}

impl Encoder {
    /// Instantiate the encoder for a negotiated backend.
    /// `quality` is the already-resolved 1..=100 value; lossless backends ignore it.
    pub fn for_backend(backend: Backend, quality: u8) -> Self {
        match backend {
            Backend::RawPlanar(subsampling) => RawPlanarEncoder::new(subsampling).into(),
            Backend::JpegRaw => JpegRawEncoder::new(quality).into(),
            Backend::Png => PngEncoder.into(),
            Backend::Generic(format) => ImageWriterEncoder::new(format, quality).into(),
            Backend::Webp => WebpEncoder::new(quality).into(),
        }
    }
}

/// Shorthand for sink write errors inside a backend
pub(crate) fn write_err(backend: &'static str) -> impl Fn(std::io::Error) -> crate::error::ExportError {
    move |e| crate::error::ExportError::encoder(backend, e)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::PictureFormat;
    use crate::planes::Subsampling;

    #[test]
    fn test_for_backend_names() {
        let cases = [
            (Backend::RawPlanar(Subsampling::Yuv420), "raw"),
            (Backend::JpegRaw, "jpeg"),
            (Backend::Png, "png"),
            (Backend::Generic(PictureFormat::Bmp), "image"),
            (Backend::Webp, "webp"),
        ];
        for (backend, name) in cases {
            assert_eq!(Encoder::for_backend(backend, 90).name(), name);
            assert_eq!(backend.name(), name);
        }
    }
}
