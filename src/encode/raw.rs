//! Raw planar dump: Y plane, then Cb, then Cr, no header

use log::debug;
use std::io::Write;

use super::{FrameEncoder, Picture, write_err};
use crate::error::{ExportError, Result};
use crate::planes::Subsampling;

#[derive(Debug, Clone)]
pub struct RawPlanarEncoder {
    subsampling: Subsampling,
}

impl RawPlanarEncoder {
    pub fn new(subsampling: Subsampling) -> Self {
        Self { subsampling }
    }
}

impl FrameEncoder for RawPlanarEncoder {
    fn name(&self) -> &'static str {
        "raw"
    }

    fn encode(&self, picture: Picture<'_>, sink: &mut dyn Write) -> Result<()> {
        let planes = match picture {
            Picture::Planar(p) if p.subsampling() == self.subsampling => p,
            other => {
                return Err(ExportError::UnsupportedFormat(format!(
                    "raw {} dump got {}",
                    self.subsampling,
                    other.describe()
                )));
            }
        };

        debug!(
            "Writing raw {} planes: {} + {} + {} bytes",
            self.subsampling,
            planes.y.len(),
            planes.cb.len(),
            planes.cr.len()
        );

        for plane in [&planes.y, &planes.cb, &planes.cr] {
            sink.write_all(plane).map_err(write_err(self.name()))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::Frame;
    use crate::planes::assemble;

    #[test]
    fn test_plane_order_and_size() {
        let frame = Frame::solid(2, 1, 10, 20, 30);
        let planes = assemble(&frame, Subsampling::Yuv420).unwrap().planes;
        let mut out = Vec::new();
        RawPlanarEncoder::new(Subsampling::Yuv420)
            .encode(Picture::Planar(&planes), &mut out)
            .unwrap();

        let luma = 32 * 16;
        assert_eq!(out.len(), luma + 2 * luma / 4);
        assert!(out[..luma].iter().all(|&s| s == 10));
        assert!(out[luma..luma + luma / 4].iter().all(|&s| s == 20));
        assert!(out[luma + luma / 4..].iter().all(|&s| s == 30));
    }

    #[test]
    fn test_444_size() {
        let frame = Frame::solid(1, 1, 1, 2, 3);
        let planes = assemble(&frame, Subsampling::Yuv444).unwrap().planes;
        let mut out = Vec::new();
        RawPlanarEncoder::new(Subsampling::Yuv444)
            .encode(Picture::Planar(&planes), &mut out)
            .unwrap();
        assert_eq!(out.len(), 3 * 256);
    }

    #[test]
    fn test_subsampling_mismatch() {
        let frame = Frame::solid(1, 1, 1, 2, 3);
        let planes = assemble(&frame, Subsampling::Yuv420).unwrap().planes;
        let mut out = Vec::new();
        let err = RawPlanarEncoder::new(Subsampling::Yuv444)
            .encode(Picture::Planar(&planes), &mut out)
            .unwrap_err();
        assert!(matches!(err, ExportError::UnsupportedFormat(_)));
        assert!(out.is_empty());
    }
}
