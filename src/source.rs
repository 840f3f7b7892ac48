//! Frame sources: where decoded pictures come from
//!
//! The export pipeline only needs a macroblock grid per picture plus a flag
//! telling whether the picture is an IDR picture. [`RawYuvSource`] provides
//! that for raw planar 4:2:0 files so the tool runs end to end without a
//! bitstream decoder.

use anyhow::{Context, Result, bail};
use log::{debug, trace};
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use crate::frame::{Frame, MB_CHROMA_SIZE, MB_SIZE, Macroblock};

/// Upstream producer of decoded pictures
pub trait FrameSource: Sync {
    /// Media file the pictures come from (default output directory)
    fn path(&self) -> &Path;

    /// Number of pictures in decode order
    fn picture_count(&self) -> usize;

    /// True if picture `index` is an IDR picture
    fn is_idr(&self, index: usize) -> bool;

    /// Decode picture `index` into a macroblock grid
    fn decode(&self, index: usize) -> Result<Frame>;
}

/// Raw 8-bit planar 4:2:0 file: Y, Cb, Cr per picture, pictures concatenated
///
/// Every picture counts as IDR. A truncated trailing picture is still
/// exposed; macroblocks whose samples are not fully present become missing.
#[derive(Debug, Clone)]
pub struct RawYuvSource {
    path: PathBuf,
    width: usize,
    height: usize,
    file_len: u64,
}

impl RawYuvSource {
    pub fn open(path: impl AsRef<Path>, width: usize, height: usize) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if width == 0 || height == 0 || width % MB_SIZE != 0 || height % MB_SIZE != 0 {
            bail!(
                "Picture size {}x{} must be non-zero multiples of {}",
                width,
                height,
                MB_SIZE
            );
        }

        let file_len = std::fs::metadata(&path)
            .with_context(|| format!("Failed to stat input {}", path.display()))?
            .len();

        let source = Self {
            path,
            width,
            height,
            file_len,
        };
        debug!(
            "Opened raw 4:2:0 source {} ({}x{}, {} bytes, {} pictures)",
            source.path.display(),
            width,
            height,
            file_len,
            source.picture_count()
        );
        Ok(source)
    }

    /// Bytes per complete picture
    pub fn picture_size(&self) -> usize {
        self.width * self.height * 3 / 2
    }

    fn read_picture(&self, index: usize) -> Result<Vec<u8>> {
        let size = self.picture_size() as u64;
        let offset = index as u64 * size;
        let mut file = File::open(&self.path)
            .with_context(|| format!("Failed to open input {}", self.path.display()))?;
        file.seek(SeekFrom::Start(offset))
            .with_context(|| format!("Failed to seek to picture {}", index))?;

        let mut buf = Vec::with_capacity(size as usize);
        file.take(size)
            .read_to_end(&mut buf)
            .with_context(|| format!("Failed to read picture {}", index))?;
        Ok(buf)
    }
}

impl FrameSource for RawYuvSource {
    fn path(&self) -> &Path {
        &self.path
    }

    fn picture_count(&self) -> usize {
        self.file_len.div_ceil(self.picture_size() as u64) as usize
    }

    fn is_idr(&self, index: usize) -> bool {
        index < self.picture_count()
    }

    fn decode(&self, index: usize) -> Result<Frame> {
        if index >= self.picture_count() {
            bail!(
                "Picture {} out of range ({} pictures)",
                index,
                self.picture_count()
            );
        }

        let data = self.read_picture(index)?;
        let (w, h) = (self.width, self.height);
        let cw = w / 2;
        let cb_base = w * h;
        let cr_base = cb_base + cw * (h / 2);

        let mut frame = Frame::new(w / MB_SIZE, h / MB_SIZE);
        for mb_y in 0..frame.height_mb() {
            for mb_x in 0..frame.width_mb() {
                // Cr is stored last, so its final sample bounds the whole macroblock
                let last_cr = cr_base
                    + (mb_y * MB_CHROMA_SIZE + MB_CHROMA_SIZE - 1) * cw
                    + mb_x * MB_CHROMA_SIZE
                    + MB_CHROMA_SIZE
                    - 1;
                if last_cr >= data.len() {
                    continue;
                }

                let mut mb = Macroblock::filled(0, 0, 0);
                for row in 0..MB_SIZE {
                    let at = (mb_y * MB_SIZE + row) * w + mb_x * MB_SIZE;
                    mb.luma[row * MB_SIZE..(row + 1) * MB_SIZE]
                        .copy_from_slice(&data[at..at + MB_SIZE]);
                }
                for row in 0..MB_CHROMA_SIZE {
                    let at = (mb_y * MB_CHROMA_SIZE + row) * cw + mb_x * MB_CHROMA_SIZE;
                    let dst = row * MB_CHROMA_SIZE..(row + 1) * MB_CHROMA_SIZE;
                    mb.cb[dst.clone()]
                        .copy_from_slice(&data[cb_base + at..cb_base + at + MB_CHROMA_SIZE]);
                    mb.cr[dst].copy_from_slice(&data[cr_base + at..cr_base + at + MB_CHROMA_SIZE]);
                }
                frame.set(mb_x, mb_y, mb);
            }
        }

        trace!(
            "Decoded picture {}: {}/{} macroblocks present",
            index,
            frame.present_mbs(),
            frame.total_mbs()
        );
        Ok(frame)
    }
}
