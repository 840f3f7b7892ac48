//! Baseline JPEG encoder fed directly with 4:2:0 planes
//!
//! No RGB round trip and no resampling: the luma plane and the native
//! quarter-resolution chroma planes map one to one onto a YCbCr 4:2:0 JFIF
//! stream (Y sampled 2x2, Cb/Cr 1x1). The scan is produced one macroblock row
//! at a time (16 luma rows + 8 chroma rows) and flushed to the sink after each
//! stripe.
//!
//! Quantization tables are the Annex K tables scaled by quality the usual way
//! and clamped to 8-bit precision so the stream stays baseline compatible even
//! at very low quality settings.

use log::debug;
use std::io::Write;

use super::jpeg_tables::{
    AC_CHROMA, AC_LUMA, CHROMA_QUANT, DC_CHROMA, DC_LUMA, HuffmanSpec, LUMA_QUANT, ZIGZAG,
};
use super::{FrameEncoder, Picture, write_err};
use crate::error::{ExportError, Result};
use crate::planes::{PlanarBuffer, Subsampling};

#[derive(Debug, Clone)]
pub struct JpegRawEncoder {
    quality: u8,
}

impl JpegRawEncoder {
    pub fn new(quality: u8) -> Self {
        Self {
            quality: quality.clamp(1, 100),
        }
    }
}

impl FrameEncoder for JpegRawEncoder {
    fn name(&self) -> &'static str {
        "jpeg"
    }

    fn encode(&self, picture: Picture<'_>, sink: &mut dyn Write) -> Result<()> {
        let planes = match picture {
            Picture::Planar(p) if p.subsampling() == Subsampling::Yuv420 => p,
            other => {
                return Err(ExportError::UnsupportedFormat(format!(
                    "JPEG raw path needs planar 4:2:0, got {}",
                    other.describe()
                )));
            }
        };

        let (width, height) = (planes.width(), planes.height());
        if width == 0 || height == 0 || width > u16::MAX as usize || height > u16::MAX as usize {
            return Err(ExportError::encoder(
                self.name(),
                format!("{}x{} is outside the JPEG size range", width, height),
            ));
        }

        let tables = Tables::new(self.quality);
        let io = write_err(self.name());

        let mut header = Vec::with_capacity(1024);
        write_headers(&mut header, &tables, width as u16, height as u16);
        sink.write_all(&header).map_err(&io)?;

        let mut scan = ScanEncoder::new(&tables);
        let stripes = height.div_ceil(16);
        for stripe in 0..stripes {
            scan.encode_stripe(planes, stripe);
            sink.write_all(&scan.bits.take_bytes()).map_err(&io)?;
        }
        scan.bits.pad();
        sink.write_all(&scan.bits.take_bytes()).map_err(&io)?;
        sink.write_all(&[0xFF, 0xD9]).map_err(&io)?;

        debug!(
            "JPEG {}x{} q{} encoded in {} stripes",
            width, height, self.quality, stripes
        );
        Ok(())
    }
}

/// Scale an Annex K table for `quality`, clamped to baseline (8-bit) precision
fn scale_quant(base: &[u8; 64], quality: u8) -> ([u16; 64], bool) {
    let quality = quality.clamp(1, 100) as u32;
    let scale = if quality < 50 {
        5000 / quality
    } else {
        200 - quality * 2
    };

    let mut out = [0u16; 64];
    let mut clamped = false;
    for (dst, &b) in out.iter_mut().zip(base.iter()) {
        let v = (b as u32 * scale + 50) / 100;
        if v > 255 {
            clamped = true;
        }
        *dst = v.clamp(1, 255) as u16;
    }
    (out, clamped)
}

/// Huffman codes indexed by symbol: (code, length)
struct HuffmanCodes {
    codes: [(u16, u8); 256],
}

impl HuffmanCodes {
    fn from_spec(spec: &HuffmanSpec) -> Self {
        let mut codes = [(0u16, 0u8); 256];
        let mut code: u32 = 0;
        let mut k = 0;
        for (len_idx, &count) in spec.counts.iter().enumerate() {
            for _ in 0..count {
                codes[spec.symbols[k] as usize] = (code as u16, len_idx as u8 + 1);
                code += 1;
                k += 1;
            }
            code <<= 1;
        }
        Self { codes }
    }

    #[inline]
    fn get(&self, symbol: u8) -> (u16, u8) {
        self.codes[symbol as usize]
    }
}

/// Everything derived from quality, shared by all stripes
struct Tables {
    luma_q: [u16; 64],
    chroma_q: [u16; 64],
    dc_luma: HuffmanCodes,
    ac_luma: HuffmanCodes,
    dc_chroma: HuffmanCodes,
    ac_chroma: HuffmanCodes,
    /// cos_table[u][x] = C(u)/2 * cos((2x+1)uπ/16)
    cos_table: [[f32; 8]; 8],
}

impl Tables {
    fn new(quality: u8) -> Self {
        let (luma_q, luma_clamped) = scale_quant(&LUMA_QUANT, quality);
        let (chroma_q, chroma_clamped) = scale_quant(&CHROMA_QUANT, quality);
        if luma_clamped || chroma_clamped {
            debug!("JPEG q{}: quantizers clamped to baseline range", quality);
        }

        let mut cos_table = [[0f32; 8]; 8];
        for (u, row) in cos_table.iter_mut().enumerate() {
            let c = if u == 0 { std::f32::consts::FRAC_1_SQRT_2 } else { 1.0 };
            for (x, v) in row.iter_mut().enumerate() {
                let angle = std::f32::consts::PI * (2 * x + 1) as f32 * u as f32 / 16.0;
                *v = 0.5 * c * angle.cos();
            }
        }

        Self {
            luma_q,
            chroma_q,
            dc_luma: HuffmanCodes::from_spec(&DC_LUMA),
            ac_luma: HuffmanCodes::from_spec(&AC_LUMA),
            dc_chroma: HuffmanCodes::from_spec(&DC_CHROMA),
            ac_chroma: HuffmanCodes::from_spec(&AC_CHROMA),
            cos_table,
        }
    }
}

fn put_u16(out: &mut Vec<u8>, v: u16) {
    out.extend_from_slice(&v.to_be_bytes());
}

fn write_headers(out: &mut Vec<u8>, tables: &Tables, width: u16, height: u16) {
    // SOI + JFIF APP0
    out.extend_from_slice(&[0xFF, 0xD8, 0xFF, 0xE0]);
    put_u16(out, 16);
    out.extend_from_slice(b"JFIF\0");
    out.extend_from_slice(&[1, 1, 0]);
    put_u16(out, 1);
    put_u16(out, 1);
    out.extend_from_slice(&[0, 0]);

    // DQT: both tables in one segment, zigzag order
    out.extend_from_slice(&[0xFF, 0xDB]);
    put_u16(out, 2 + 2 * 65);
    for (id, table) in [(0u8, &tables.luma_q), (1u8, &tables.chroma_q)] {
        out.push(id);
        out.extend(ZIGZAG.iter().map(|&i| table[i] as u8));
    }

    // SOF0: Y 2x2, Cb/Cr 1x1
    out.extend_from_slice(&[0xFF, 0xC0]);
    put_u16(out, 17);
    out.push(8);
    put_u16(out, height);
    put_u16(out, width);
    out.push(3);
    out.extend_from_slice(&[1, 0x22, 0, 2, 0x11, 1, 3, 0x11, 1]);

    // DHT
    for (class_id, spec) in [
        (0x00u8, &DC_LUMA),
        (0x10, &AC_LUMA),
        (0x01, &DC_CHROMA),
        (0x11, &AC_CHROMA),
    ] {
        out.extend_from_slice(&[0xFF, 0xC4]);
        put_u16(out, (2 + 1 + 16 + spec.symbols.len()) as u16);
        out.push(class_id);
        out.extend_from_slice(&spec.counts);
        out.extend_from_slice(spec.symbols);
    }

    // SOS
    out.extend_from_slice(&[0xFF, 0xDA]);
    put_u16(out, 12);
    out.extend_from_slice(&[3, 1, 0x00, 2, 0x11, 3, 0x11, 0, 63, 0]);
}

/// Entropy-coded segment writer with 0xFF byte stuffing
struct BitWriter {
    bytes: Vec<u8>,
    acc: u64,
    nbits: u32,
}

impl BitWriter {
    fn new() -> Self {
        Self {
            bytes: Vec::new(),
            acc: 0,
            nbits: 0,
        }
    }

    fn write(&mut self, value: u32, len: u8) {
        if len == 0 {
            return;
        }
        let len = len as u32;
        self.acc = (self.acc << len) | (value as u64 & ((1u64 << len) - 1));
        self.nbits += len;
        while self.nbits >= 8 {
            self.nbits -= 8;
            let byte = (self.acc >> self.nbits) as u8;
            self.bytes.push(byte);
            if byte == 0xFF {
                self.bytes.push(0x00);
            }
        }
        self.acc &= (1u64 << self.nbits) - 1;
    }

    /// Fill the last partial byte with 1-bits
    fn pad(&mut self) {
        if self.nbits > 0 {
            let fill = 8 - self.nbits;
            self.write((1 << fill) - 1, fill as u8);
        }
    }

    /// Completed bytes so far; partial bits stay buffered
    fn take_bytes(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.bytes)
    }
}

/// Size category and raw bits of a coefficient (T.81 F.1.2.1)
#[inline]
fn magnitude(v: i32) -> (u8, u32) {
    let size = (32 - v.unsigned_abs().leading_zeros()) as u8;
    let bits = if v < 0 { (v - 1) as u32 } else { v as u32 };
    (size, bits)
}

struct ScanEncoder<'t> {
    tables: &'t Tables,
    bits: BitWriter,
    pred_y: i32,
    pred_cb: i32,
    pred_cr: i32,
}

impl<'t> ScanEncoder<'t> {
    fn new(tables: &'t Tables) -> Self {
        Self {
            tables,
            bits: BitWriter::new(),
            pred_y: 0,
            pred_cb: 0,
            pred_cr: 0,
        }
    }

    /// Encode one MCU row: 16 luma rows paired with 8 chroma rows
    fn encode_stripe(&mut self, planes: &PlanarBuffer, stripe: usize) {
        let (w, h) = (planes.width(), planes.height());
        let (cw, ch) = (planes.chroma_width(), planes.chroma_height());
        let t = self.tables;

        for mcu_x in 0..w.div_ceil(16) {
            let lx = mcu_x * 16;
            let ly = stripe * 16;
            for (dx, dy) in [(0, 0), (8, 0), (0, 8), (8, 8)] {
                let block = load_block(&planes.y, w, h, lx + dx, ly + dy);
                let coefs = fdct_quant(&block, &t.luma_q, &t.cos_table);
                let pred = self.pred_y;
                self.pred_y = self.encode_block(&coefs, pred, &t.dc_luma, &t.ac_luma);
            }

            let block = load_block(&planes.cb, cw, ch, mcu_x * 8, stripe * 8);
            let coefs = fdct_quant(&block, &t.chroma_q, &t.cos_table);
            let pred = self.pred_cb;
            self.pred_cb = self.encode_block(&coefs, pred, &t.dc_chroma, &t.ac_chroma);

            let block = load_block(&planes.cr, cw, ch, mcu_x * 8, stripe * 8);
            let coefs = fdct_quant(&block, &t.chroma_q, &t.cos_table);
            let pred = self.pred_cr;
            self.pred_cr = self.encode_block(&coefs, pred, &t.dc_chroma, &t.ac_chroma);
        }
    }

    /// Huffman-code one quantized block; returns the new DC predictor
    fn encode_block(
        &mut self,
        coefs: &[i32; 64],
        pred: i32,
        dc: &HuffmanCodes,
        ac: &HuffmanCodes,
    ) -> i32 {
        let (size, bits) = magnitude(coefs[0] - pred);
        let (code, len) = dc.get(size);
        self.bits.write(code as u32, len);
        self.bits.write(bits, size);

        let mut run = 0u8;
        for &idx in &ZIGZAG[1..] {
            let v = coefs[idx];
            if v == 0 {
                run += 1;
                continue;
            }
            while run >= 16 {
                let (code, len) = ac.get(0xF0);
                self.bits.write(code as u32, len);
                run -= 16;
            }
            let (size, bits) = magnitude(v);
            let (code, len) = ac.get((run << 4) | size);
            self.bits.write(code as u32, len);
            self.bits.write(bits, size);
            run = 0;
        }
        if run > 0 {
            let (code, len) = ac.get(0x00);
            self.bits.write(code as u32, len);
        }

        coefs[0]
    }
}

/// 8x8 level-shifted samples; reads past the plane edge repeat the last sample
fn load_block(plane: &[u8], width: usize, height: usize, x0: usize, y0: usize) -> [f32; 64] {
    let mut block = [0f32; 64];
    for row in 0..8 {
        let y = (y0 + row).min(height - 1);
        for col in 0..8 {
            let x = (x0 + col).min(width - 1);
            block[row * 8 + col] = plane[y * width + x] as f32 - 128.0;
        }
    }
    block
}

/// Separable forward DCT followed by quantization (natural order output)
fn fdct_quant(block: &[f32; 64], quant: &[u16; 64], cos: &[[f32; 8]; 8]) -> [i32; 64] {
    let mut tmp = [0f32; 64];
    for y in 0..8 {
        for u in 0..8 {
            tmp[y * 8 + u] = (0..8).map(|x| cos[u][x] * block[y * 8 + x]).sum();
        }
    }

    let mut out = [0i32; 64];
    for v in 0..8 {
        for u in 0..8 {
            let coef: f32 = (0..8).map(|y| cos[v][y] * tmp[y * 8 + u]).sum();
            let i = v * 8 + u;
            out[i] = (coef / quant[i] as f32).round() as i32;
        }
    }
    out
}
