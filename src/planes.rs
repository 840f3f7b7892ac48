//! Plane assembly: macroblock grid → contiguous Y/Cb/Cr planes
//!
//! Three independent passes (Y, Cb, Cr) scan the grid row by row. Present
//! macroblocks contribute their samples at the right offset, missing ones leave
//! the zero-initialized span untouched. Only the chroma pass knows about the
//! target subsampling, so 4:2:0 vs 4:4:4 policy lives in one place.
//!
//! 4:4:4 output replicates every native chroma sample into a 2x2 footprint
//! (nearest neighbour, no filtering).

use log::{debug, trace};
use serde::{Deserialize, Serialize};

use crate::error::{ExportError, Result};
use crate::frame::{Frame, MB_CHROMA_SIZE, MB_SIZE};

/// Chroma subsampling of a planar buffer
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Subsampling {
    /// Chroma at half resolution in both directions
    Yuv420,
    /// Chroma at full resolution
    Yuv444,
}

impl Subsampling {
    /// Chroma plane dimensions for a luma plane of `width` x `height`
    pub fn chroma_dims(self, width: usize, height: usize) -> (usize, usize) {
        match self {
            Subsampling::Yuv420 => (width / 2, height / 2),
            Subsampling::Yuv444 => (width, height),
        }
    }
}

impl std::fmt::Display for Subsampling {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Subsampling::Yuv420 => write!(f, "4:2:0"),
            Subsampling::Yuv444 => write!(f, "4:4:4"),
        }
    }
}

/// Owned Y/Cb/Cr planes at a declared subsampling
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanarBuffer {
    width: usize,
    height: usize,
    subsampling: Subsampling,
    pub y: Vec<u8>,
    pub cb: Vec<u8>,
    pub cr: Vec<u8>,
}

impl PlanarBuffer {
    /// Zero-filled planes; sizes follow from dimensions and subsampling
    pub fn zeroed(width: usize, height: usize, subsampling: Subsampling) -> Result<Self> {
        let (cw, ch) = subsampling.chroma_dims(width, height);
        Ok(Self {
            width,
            height,
            subsampling,
            y: alloc_plane(width * height)?,
            cb: alloc_plane(cw * ch)?,
            cr: alloc_plane(cw * ch)?,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn subsampling(&self) -> Subsampling {
        self.subsampling
    }

    pub fn chroma_width(&self) -> usize {
        self.subsampling.chroma_dims(self.width, self.height).0
    }

    pub fn chroma_height(&self) -> usize {
        self.subsampling.chroma_dims(self.width, self.height).1
    }

    /// Total sample count over all three planes
    pub fn byte_len(&self) -> usize {
        self.y.len() + self.cb.len() + self.cr.len()
    }
}

/// Zero-filled plane, reporting allocation failure instead of aborting
fn alloc_plane(len: usize) -> Result<Vec<u8>> {
    let mut plane = Vec::new();
    plane
        .try_reserve_exact(len)
        .map_err(|_| ExportError::AllocationFailure { bytes: len })?;
    plane.resize(len, 0);
    Ok(plane)
}

/// Planes assembled from one frame plus the number of missing macroblocks
#[derive(Debug)]
pub struct Assembled {
    pub planes: PlanarBuffer,
    pub missing_mb_count: usize,
}

/// Walk the macroblock grid and build planar buffers at `target` subsampling.
///
/// Allocation failure is returned before any sample is written; callers treat
/// it as a fully missing frame.
pub fn assemble(frame: &Frame, target: Subsampling) -> Result<Assembled> {
    let mut planes = PlanarBuffer::zeroed(frame.width(), frame.height(), target)?;

    let missing_mb_count = luma_pass(frame, &mut planes.y);
    chroma_pass(frame, target, Chroma::Cb, &mut planes.cb);
    chroma_pass(frame, target, Chroma::Cr, &mut planes.cr);

    debug!(
        "Assembled {}x{} {} planes: {}/{} macroblocks missing",
        planes.width,
        planes.height,
        target,
        missing_mb_count,
        frame.total_mbs()
    );

    Ok(Assembled {
        planes,
        missing_mb_count,
    })
}

/// Copy luma rows; counts each missing macroblock once (on its first sample row)
fn luma_pass(frame: &Frame, y: &mut [u8]) -> usize {
    let stride = frame.width();
    let mut missing = 0;

    for mb_y in 0..frame.height_mb() {
        for row in 0..MB_SIZE {
            let line = (mb_y * MB_SIZE + row) * stride;
            for mb_x in 0..frame.width_mb() {
                let offset = line + mb_x * MB_SIZE;
                match frame.get(mb_x, mb_y) {
                    Some(mb) => y[offset..offset + MB_SIZE].copy_from_slice(mb.luma_row(row)),
                    None => {
                        if row == 0 {
                            trace!("Missing macroblock at ({}, {})", mb_x, mb_y);
                            missing += 1;
                        }
                    }
                }
            }
        }
    }

    missing
}

#[derive(Clone, Copy)]
enum Chroma {
    Cb,
    Cr,
}

fn chroma_pass(frame: &Frame, target: Subsampling, which: Chroma, plane: &mut [u8]) {
    let row_of = |mb: &crate::frame::Macroblock, row: usize| -> [u8; MB_CHROMA_SIZE] {
        let src = match which {
            Chroma::Cb => mb.cb_row(row),
            Chroma::Cr => mb.cr_row(row),
        };
        let mut out = [0u8; MB_CHROMA_SIZE];
        out.copy_from_slice(src);
        out
    };

    match target {
        Subsampling::Yuv420 => {
            let stride = frame.width_mb() * MB_CHROMA_SIZE;
            for mb_y in 0..frame.height_mb() {
                for row in 0..MB_CHROMA_SIZE {
                    let line = (mb_y * MB_CHROMA_SIZE + row) * stride;
                    for mb_x in 0..frame.width_mb() {
                        if let Some(mb) = frame.get(mb_x, mb_y) {
                            let offset = line + mb_x * MB_CHROMA_SIZE;
                            plane[offset..offset + MB_CHROMA_SIZE].copy_from_slice(&row_of(mb, row));
                        }
                    }
                }
            }
        }
        Subsampling::Yuv444 => {
            let stride = frame.width();
            for mb_y in 0..frame.height_mb() {
                for row in 0..MB_SIZE {
                    let line = (mb_y * MB_SIZE + row) * stride;
                    for mb_x in 0..frame.width_mb() {
                        if let Some(mb) = frame.get(mb_x, mb_y) {
                            let src = row_of(mb, row / 2);
                            let offset = line + mb_x * MB_SIZE;
                            let dst = &mut plane[offset..offset + MB_SIZE];
                            for (pair, &sample) in dst.chunks_exact_mut(2).zip(src.iter()) {
                                pair[0] = sample;
                                pair[1] = sample;
                            }
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::Macroblock;

    fn gradient_mb(seed: u8) -> Macroblock {
        let mut mb = Macroblock::filled(0, 0, 0);
        for (i, s) in mb.luma.iter_mut().enumerate() {
            *s = seed.wrapping_add(i as u8);
        }
        for (i, s) in mb.cb.iter_mut().enumerate() {
            *s = seed.wrapping_mul(3).wrapping_add(i as u8 * 2);
        }
        for (i, s) in mb.cr.iter_mut().enumerate() {
            *s = 255 - seed.wrapping_add(i as u8);
        }
        mb
    }

    #[test]
    fn test_plane_sizes_420() {
        let frame = Frame::solid(3, 2, 50, 60, 70);
        let out = assemble(&frame, Subsampling::Yuv420).unwrap();
        assert_eq!(out.planes.y.len(), 48 * 32);
        assert_eq!(out.planes.cb.len(), 24 * 16);
        assert_eq!(out.planes.cr.len(), 24 * 16);
        assert_eq!(out.missing_mb_count, 0);
        assert!(out.planes.y.iter().all(|&s| s == 50));
        assert!(out.planes.cb.iter().all(|&s| s == 60));
        assert!(out.planes.cr.iter().all(|&s| s == 70));
    }

    #[test]
    fn test_plane_sizes_444() {
        let frame = Frame::solid(2, 2, 1, 2, 3);
        let out = assemble(&frame, Subsampling::Yuv444).unwrap();
        assert_eq!(out.planes.cb.len(), 32 * 32);
        assert_eq!(out.planes.chroma_width(), 32);
        assert_eq!(out.planes.byte_len(), 3 * 32 * 32);
    }

    #[test]
    fn test_missing_counted_once_and_zero_filled() {
        let mut frame = Frame::solid(3, 2, 200, 210, 220);
        frame.clear(1, 0);
        frame.clear(2, 1);

        let out = assemble(&frame, Subsampling::Yuv420).unwrap();
        assert_eq!(out.missing_mb_count, 2);

        let p = &out.planes;
        // Luma span of (1,0) stays zero on every row
        for row in 0..16 {
            let line = row * p.width();
            assert!(p.y[line + 16..line + 32].iter().all(|&s| s == 0));
            assert!(p.y[line..line + 16].iter().all(|&s| s == 200));
        }
        // Chroma span of (2,1)
        for row in 8..16 {
            let line = row * p.chroma_width();
            assert!(p.cb[line + 16..line + 24].iter().all(|&s| s == 0));
            assert!(p.cr[line + 16..line + 24].iter().all(|&s| s == 0));
        }
    }

    #[test]
    fn test_all_missing() {
        let frame = Frame::new(4, 4);
        let out = assemble(&frame, Subsampling::Yuv444).unwrap();
        assert_eq!(out.missing_mb_count, 16);
        assert!(out.planes.y.iter().all(|&s| s == 0));
        assert!(out.planes.cb.iter().all(|&s| s == 0));
    }

    #[test]
    fn test_luma_placement() {
        let mut frame = Frame::new(2, 2);
        let mb = gradient_mb(7);
        frame.set(1, 1, mb.clone());
        let out = assemble(&frame, Subsampling::Yuv420).unwrap();
        let p = &out.planes;
        for row in 0..16 {
            let line = (16 + row) * p.width() + 16;
            assert_eq!(&p.y[line..line + 16], mb.luma_row(row));
        }
        assert_eq!(out.missing_mb_count, 3);
    }

    #[test]
    fn test_upsample_is_pure_duplication() {
        let mut frame = Frame::new(2, 2);
        for (i, (x, y)) in [(0, 0), (1, 0), (0, 1), (1, 1)].into_iter().enumerate() {
            frame.set(x, y, gradient_mb(i as u8 * 40 + 3));
        }

        let native = assemble(&frame, Subsampling::Yuv420).unwrap().planes;
        let full = assemble(&frame, Subsampling::Yuv444).unwrap().planes;

        // Averaging every 2x2 block of the upsampled plane gives back the native samples
        let (cw, ch) = (native.chroma_width(), native.chroma_height());
        for (up, orig) in [(&full.cb, &native.cb), (&full.cr, &native.cr)] {
            for cy in 0..ch {
                for cx in 0..cw {
                    let w = full.width();
                    let sum = up[2 * cy * w + 2 * cx] as u32
                        + up[2 * cy * w + 2 * cx + 1] as u32
                        + up[(2 * cy + 1) * w + 2 * cx] as u32
                        + up[(2 * cy + 1) * w + 2 * cx + 1] as u32;
                    assert_eq!((sum / 4) as u8, orig[cy * cw + cx]);
                    assert_eq!(sum % 4, 0);
                }
            }
        }
        assert_eq!(full.y, native.y);
    }

    #[test]
    fn test_alloc_failure_reported() {
        let err = alloc_plane(usize::MAX).unwrap_err();
        assert!(matches!(err, ExportError::AllocationFailure { .. }));
    }
}
