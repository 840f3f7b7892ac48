//! YCbCr 4:4:4 to packed RGB24 conversion
//!
//! RGB image backends (PNG, BMP, TGA, WEBP) take interleaved RGB triples,
//! while decoded pictures are planar YCbCr. The conversion uses fixed-point
//! BT.601 studio-range coefficients with right shifts, so results are
//! bit-exact across platforms:
//!
//! ```text
//! R = clip8((298*Y)>>8 + (408*Cr)>>8 - 222)
//! G = clip8((298*Y)>>8 - (100*Cb)>>8 - (208*Cr)>>8 + 135)
//! B = clip8((298*Y)>>8 + (516*Cb)>>8 - 276)
//! ```

use crate::error::{ExportError, Result};
use crate::planes::{PlanarBuffer, Subsampling};

/// Interleaved R,G,B bytes, one triple per pixel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackedRgbBuffer {
    width: usize,
    height: usize,
    pub data: Vec<u8>,
}

impl PackedRgbBuffer {
    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }
}

#[inline]
fn clip8(v: i32) -> u8 {
    v.clamp(0, 255) as u8
}

/// Convert one YCbCr sample triple to RGB
#[inline]
pub fn ycbcr_to_rgb(y: u8, cb: u8, cr: u8) -> [u8; 3] {
    let y = (298 * y as i32) >> 8;
    let cb = cb as i32;
    let cr = cr as i32;

    let r = y + ((408 * cr) >> 8) - 222;
    let g = y - ((100 * cb) >> 8) - ((208 * cr) >> 8) + 135;
    let b = y + ((516 * cb) >> 8) - 276;

    [clip8(r), clip8(g), clip8(b)]
}

/// Convert a 4:4:4 planar buffer to packed RGB24
///
/// # Errors
/// * `UnsupportedFormat` - the buffer is not 4:4:4 (chroma must be upsampled first)
/// * `AllocationFailure` - the output buffer could not be allocated
pub fn ycbcr444_to_rgb24(planes: &PlanarBuffer) -> Result<PackedRgbBuffer> {
    if planes.subsampling() != Subsampling::Yuv444 {
        return Err(ExportError::UnsupportedFormat(format!(
            "RGB conversion needs 4:4:4 planes, got {}",
            planes.subsampling()
        )));
    }

    let pixels = planes.width() * planes.height();
    let mut data = Vec::new();
    data.try_reserve_exact(pixels * 3)
        .map_err(|_| ExportError::AllocationFailure { bytes: pixels * 3 })?;

    for ((&y, &cb), &cr) in planes.y.iter().zip(&planes.cb).zip(&planes.cr) {
        data.extend_from_slice(&ycbcr_to_rgb(y, cb, cr));
    }

    Ok(PackedRgbBuffer {
        width: planes.width(),
        height: planes.height(),
        data,
    })
}
