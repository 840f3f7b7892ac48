//! Decoded picture as a grid of macroblocks
//!
//! **Why**: The upstream decoder may fail on parts of a picture. Each cell of the
//! grid is either a fully decoded macroblock or missing, so the export pipeline can
//! account for lost data instead of reading garbage.
//!
//! **Used by**: `planes` (plane assembly), `source` (raw YUV reader)
//!
//! # Layout
//!
//! - Luma: 16x16 samples per macroblock
//! - Chroma (Cb, Cr): 8x8 samples per macroblock (native 4:2:0)
//! - Cells are stored row-major; all access goes through bounds-checked getters

/// Macroblock edge in luma samples
pub const MB_SIZE: usize = 16;
/// Macroblock edge in native 4:2:0 chroma samples
pub const MB_CHROMA_SIZE: usize = 8;

/// One fully decoded macroblock (8-bit samples)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Macroblock {
    pub luma: [u8; MB_SIZE * MB_SIZE],
    pub cb: [u8; MB_CHROMA_SIZE * MB_CHROMA_SIZE],
    pub cr: [u8; MB_CHROMA_SIZE * MB_CHROMA_SIZE],
}

impl Macroblock {
    /// Macroblock with every sample of each plane set to one value
    pub fn filled(y: u8, cb: u8, cr: u8) -> Self {
        Self {
            luma: [y; MB_SIZE * MB_SIZE],
            cb: [cb; MB_CHROMA_SIZE * MB_CHROMA_SIZE],
            cr: [cr; MB_CHROMA_SIZE * MB_CHROMA_SIZE],
        }
    }

    /// 16 luma samples of one row
    pub fn luma_row(&self, row: usize) -> &[u8] {
        &self.luma[row * MB_SIZE..(row + 1) * MB_SIZE]
    }

    pub fn cb_row(&self, row: usize) -> &[u8] {
        &self.cb[row * MB_CHROMA_SIZE..(row + 1) * MB_CHROMA_SIZE]
    }

    pub fn cr_row(&self, row: usize) -> &[u8] {
        &self.cr[row * MB_CHROMA_SIZE..(row + 1) * MB_CHROMA_SIZE]
    }
}

/// Rectangular grid of optional macroblocks produced once per exportable picture
#[derive(Debug, Clone)]
pub struct Frame {
    width_mb: usize,
    height_mb: usize,
    bit_depth: u8,
    cells: Vec<Option<Box<Macroblock>>>,
}

impl Frame {
    /// Empty grid: every cell starts out missing
    pub fn new(width_mb: usize, height_mb: usize) -> Self {
        Self {
            width_mb,
            height_mb,
            bit_depth: 8,
            cells: vec![None; width_mb * height_mb],
        }
    }

    /// Grid with every cell present and filled with a flat color
    pub fn solid(width_mb: usize, height_mb: usize, y: u8, cb: u8, cr: u8) -> Self {
        let mut frame = Self::new(width_mb, height_mb);
        for cell in frame.cells.iter_mut() {
            *cell = Some(Box::new(Macroblock::filled(y, cb, cr)));
        }
        frame
    }

    pub fn with_bit_depth(mut self, bit_depth: u8) -> Self {
        self.bit_depth = bit_depth;
        self
    }

    pub fn width_mb(&self) -> usize {
        self.width_mb
    }

    pub fn height_mb(&self) -> usize {
        self.height_mb
    }

    pub fn bit_depth(&self) -> u8 {
        self.bit_depth
    }

    /// Pixel width (`width_mb * 16`)
    pub fn width(&self) -> usize {
        self.width_mb * MB_SIZE
    }

    /// Pixel height (`height_mb * 16`)
    pub fn height(&self) -> usize {
        self.height_mb * MB_SIZE
    }

    pub fn total_mbs(&self) -> usize {
        self.width_mb * self.height_mb
    }

    fn index(&self, mb_x: usize, mb_y: usize) -> Option<usize> {
        (mb_x < self.width_mb && mb_y < self.height_mb).then(|| mb_y * self.width_mb + mb_x)
    }

    /// Macroblock at (mb_x, mb_y); `None` if missing or out of bounds
    pub fn get(&self, mb_x: usize, mb_y: usize) -> Option<&Macroblock> {
        self.index(mb_x, mb_y)
            .and_then(|idx| self.cells[idx].as_deref())
    }

    /// Store a decoded macroblock. Returns false for out-of-bounds coordinates.
    pub fn set(&mut self, mb_x: usize, mb_y: usize, mb: Macroblock) -> bool {
        match self.index(mb_x, mb_y) {
            Some(idx) => {
                self.cells[idx] = Some(Box::new(mb));
                true
            }
            None => false,
        }
    }

    /// Mark a cell as lost. Returns false for out-of-bounds coordinates.
    pub fn clear(&mut self, mb_x: usize, mb_y: usize) -> bool {
        match self.index(mb_x, mb_y) {
            Some(idx) => {
                self.cells[idx] = None;
                true
            }
            None => false,
        }
    }

    pub fn present_mbs(&self) -> usize {
        self.cells.iter().filter(|c| c.is_some()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_frame_is_fully_missing() {
        let frame = Frame::new(4, 3);
        assert_eq!(frame.total_mbs(), 12);
        assert_eq!(frame.present_mbs(), 0);
        assert_eq!((frame.width(), frame.height()), (64, 48));
        assert!(frame.get(0, 0).is_none());
    }

    #[test]
    fn test_get_is_bounds_checked() {
        let frame = Frame::solid(2, 2, 100, 128, 128);
        assert!(frame.get(1, 1).is_some());
        assert!(frame.get(2, 0).is_none());
        assert!(frame.get(0, 2).is_none());
    }

    #[test]
    fn test_set_and_clear() {
        let mut frame = Frame::new(2, 1);
        assert!(frame.set(1, 0, Macroblock::filled(1, 2, 3)));
        assert!(!frame.set(2, 0, Macroblock::filled(1, 2, 3)));
        assert_eq!(frame.get(1, 0).map(|mb| mb.luma[0]), Some(1));
        assert!(frame.clear(1, 0));
        assert_eq!(frame.present_mbs(), 0);
    }

    #[test]
    fn test_macroblock_rows() {
        let mut mb = Macroblock::filled(0, 0, 0);
        mb.luma[MB_SIZE * 3 + 5] = 42;
        mb.cb[MB_CHROMA_SIZE * 7] = 9;
        assert_eq!(mb.luma_row(3)[5], 42);
        assert_eq!(mb.cb_row(7)[0], 9);
        assert_eq!(mb.cr_row(7).len(), MB_CHROMA_SIZE);
    }
}
