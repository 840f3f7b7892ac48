//! Export sequencer: one macroblock grid in, one output file out
//!
//! **Why**: Ties the pipeline stages together and owns everything that touches
//! the filesystem: output naming, the sink, cleanup on failure and the
//! exported-picture counter.
//!
//! **Used by**: `main` (CLI batches), integration tests
//!
//! # Per-call states
//!
//! ```text
//! Init → FormatResolved → Assembled → [ColorConverted] → Encoded → Written
//!                                                           ↓
//!                                      Success | PartialSuccess | Failure
//! ```
//!
//! The format is resolved before assembly because the chosen backend decides
//! which subsampling gets assembled (native 4:2:0 for raw/JPEG, 4:4:4 for RGB
//! backends). Every call ends in exactly one terminal state; the sink is always
//! closed before the call returns.

use log::{debug, info, warn};
use rayon::prelude::*;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use crate::caps::CapabilitySet;
use crate::encode::{
    DEFAULT_JPEG_QUALITY, DEFAULT_WEBP_QUALITY, Encoder, FrameEncoder, Picture,
};
use crate::error::ExportError;
use crate::format::{InputLayout, PictureFormat, negotiate};
use crate::frame::Frame;
use crate::planes::{Subsampling, assemble};
use crate::rgb_cvt::ycbcr444_to_rgb24;
use crate::source::FrameSource;

/// What to export and where
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportRequest {
    pub format: PictureFormat,
    /// 1..=100; per-format session default when `None`
    pub quality: Option<u8>,
    /// Source directory when `None`
    pub output_dir: Option<PathBuf>,
    pub base_name: String,
    /// 1-based position in the batch; next counter value when `None`
    pub sequence: Option<u32>,
    /// Pictures in the batch; `_{sequence}` suffix only when > 1
    pub sequence_count: u32,
}

impl ExportRequest {
    pub fn new(format: PictureFormat, base_name: impl Into<String>) -> Self {
        Self {
            format,
            quality: None,
            output_dir: None,
            base_name: base_name.into(),
            sequence: None,
            sequence_count: 1,
        }
    }

    pub fn with_quality(mut self, quality: u8) -> Self {
        self.quality = Some(quality);
        self
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(dir.into());
        self
    }

    pub fn with_sequence(mut self, sequence: u32, count: u32) -> Self {
        self.sequence = Some(sequence);
        self.sequence_count = count;
        self
    }
}

/// Terminal state of one export
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ExportStatus {
    Success,
    /// Written, but some macroblocks were missing (zero-filled)
    PartialSuccess,
    Failure,
}

impl std::fmt::Display for ExportStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExportStatus::Success => write!(f, "success"),
            ExportStatus::PartialSuccess => write!(f, "partial"),
            ExportStatus::Failure => write!(f, "failure"),
        }
    }
}

/// Outcome of one export call
#[derive(Debug)]
pub struct ExportResult {
    pub status: ExportStatus,
    pub requested: PictureFormat,
    /// Format actually written (after fallback)
    pub format: PictureFormat,
    /// Backend name, see [`Backend::name`](crate::format::Backend::name)
    pub backend: &'static str,
    pub path: PathBuf,
    pub bytes_written: u64,
    pub missing_mb_count: usize,
    /// Why the export failed, or the missing data note for partial results
    pub error: Option<ExportError>,
}

impl ExportResult {
    /// Success or PartialSuccess
    pub fn is_written(&self) -> bool {
        self.status != ExportStatus::Failure
    }
}

/// Status implied by the missing macroblock count alone
fn status_for(missing: usize, total: usize) -> ExportStatus {
    if total == 0 || missing >= total {
        ExportStatus::Failure
    } else if missing > 0 {
        ExportStatus::PartialSuccess
    } else {
        ExportStatus::Success
    }
}

/// Counts bytes that reach the underlying sink
struct CountingWriter<W: Write> {
    inner: W,
    count: u64,
}

impl<W: Write> Write for CountingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.count += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}

/// Export context: capabilities, defaults and the exported-picture counter
///
/// Shareable across threads; the counter is the only mutable state.
#[derive(Debug)]
pub struct ExportSession {
    caps: CapabilitySet,
    source_dir: Option<PathBuf>,
    jpeg_quality: u8,
    webp_quality: u8,
    exported: Mutex<u32>,
}

impl ExportSession {
    pub fn new(caps: CapabilitySet) -> Self {
        Self {
            caps,
            source_dir: None,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            webp_quality: DEFAULT_WEBP_QUALITY,
            exported: Mutex::new(0),
        }
    }

    /// Default output directory becomes the directory of `source`
    pub fn with_source(mut self, source: &Path) -> Self {
        self.source_dir = source
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf);
        self
    }

    pub fn with_default_qualities(mut self, jpeg: u8, webp: u8) -> Self {
        self.jpeg_quality = jpeg.clamp(1, 100);
        self.webp_quality = webp.clamp(1, 100);
        self
    }

    pub fn caps(&self) -> CapabilitySet {
        self.caps
    }

    /// Successful exports so far
    pub fn exported_count(&self) -> u32 {
        *self.exported.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// `{dir}/{base}[_{sequence}].{ext}`
    pub fn output_path(&self, request: &ExportRequest, extension: &str, sequence: u32) -> PathBuf {
        let dir = request
            .output_dir
            .clone()
            .or_else(|| self.source_dir.clone())
            .unwrap_or_else(|| PathBuf::from("."));

        let name = if request.sequence_count > 1 {
            format!("{}_{}.{}", request.base_name, sequence, extension)
        } else {
            format!("{}.{}", request.base_name, extension)
        };
        dir.join(name)
    }

    /// Export one picture. Never panics on bad input; every failure is
    /// reported through the returned result.
    pub fn export(&self, frame: &Frame, request: &ExportRequest) -> ExportResult {
        match request.sequence {
            Some(sequence) => {
                let result = self.run(frame, request, sequence);
                if result.is_written() {
                    *self.exported.lock().unwrap_or_else(PoisonError::into_inner) += 1;
                }
                result
            }
            None => {
                // Held across the export so concurrent callers get distinct numbers
                let mut exported = self.exported.lock().unwrap_or_else(PoisonError::into_inner);
                let result = self.run(frame, request, *exported + 1);
                if result.is_written() {
                    *exported += 1;
                }
                result
            }
        }
    }

    fn run(&self, frame: &Frame, request: &ExportRequest, sequence: u32) -> ExportResult {
        debug!(
            "Init: {}x{} MB frame, {} requested, sequence {}/{}",
            frame.width_mb(),
            frame.height_mb(),
            request.format,
            sequence,
            request.sequence_count
        );

        let negotiated = negotiate(request.format, &self.caps);
        let encoder = Encoder::for_backend(negotiated.backend, self.quality_for(request, negotiated.format));
        let path = self.output_path(request, negotiated.extension(), sequence);
        debug!(
            "FormatResolved: {} via {} backend → {}",
            negotiated.format,
            encoder.name(),
            path.display()
        );

        let total = frame.total_mbs();
        let mut result = ExportResult {
            status: ExportStatus::Failure,
            requested: request.format,
            format: negotiated.format,
            backend: encoder.name(),
            path,
            bytes_written: 0,
            missing_mb_count: total - frame.present_mbs(),
            error: None,
        };

        if frame.bit_depth() != 8 {
            return finish(result, ExportError::UnsupportedBitDepth(frame.bit_depth()));
        }
        if result.missing_mb_count == total {
            return finish(
                result,
                ExportError::MissingSourceData {
                    missing: total,
                    total,
                },
            );
        }

        let subsampling = match negotiated.backend.input_layout() {
            InputLayout::Planar(subsampling) => subsampling,
            InputLayout::Rgb => Subsampling::Yuv444,
        };
        let assembled = match assemble(frame, subsampling) {
            Ok(assembled) => assembled,
            Err(e) => {
                result.missing_mb_count = total;
                return finish(result, e);
            }
        };
        result.missing_mb_count = assembled.missing_mb_count;
        debug!(
            "Assembled: {} planes, {} bytes",
            subsampling,
            assembled.planes.byte_len()
        );

        let rgb = match negotiated.backend.input_layout() {
            InputLayout::Rgb => match ycbcr444_to_rgb24(&assembled.planes) {
                Ok(rgb) => {
                    debug!("ColorConverted: {} RGB bytes", rgb.data.len());
                    Some(rgb)
                }
                Err(e) => {
                    result.missing_mb_count = total;
                    return finish(result, e);
                }
            },
            InputLayout::Planar(_) => None,
        };
        let picture = match &rgb {
            Some(rgb) => Picture::Rgb(rgb),
            None => Picture::Planar(&assembled.planes),
        };

        let file = match File::create(&result.path) {
            Ok(file) => file,
            Err(source) => {
                let path = result.path.clone();
                return finish(result, ExportError::SinkOpenFailure { path, source });
            }
        };

        let mut sink = CountingWriter {
            inner: BufWriter::new(file),
            count: 0,
        };
        let encoded = encoder.encode(picture, &mut sink).and_then(|()| {
            sink.flush()
                .map_err(|e| ExportError::encoder(encoder.name(), e))
        });
        result.bytes_written = sink.count;
        drop(sink);
        debug!("Encoded: {} bytes", result.bytes_written);

        if let Err(e) = encoded {
            if let Err(rm) = std::fs::remove_file(&result.path) {
                warn!("Failed to remove partial output {}: {}", result.path.display(), rm);
            }
            return finish(result, e);
        }

        result.status = status_for(result.missing_mb_count, total);
        if result.status == ExportStatus::PartialSuccess {
            result.error = Some(ExportError::MissingSourceData {
                missing: result.missing_mb_count,
                total,
            });
        }
        log_result(&result);
        result
    }

    fn quality_for(&self, request: &ExportRequest, format: PictureFormat) -> u8 {
        let quality = match (request.quality, format) {
            (Some(q), _) => q,
            (None, PictureFormat::Webp) => self.webp_quality,
            (None, _) => self.jpeg_quality,
        };
        quality.clamp(1, 100)
    }

    /// Export `indices` of `source`, numbered 1..=len. One failed picture never
    /// stops the rest; results keep the order of `indices`.
    pub fn export_batch(
        &self,
        source: &dyn FrameSource,
        indices: &[usize],
        template: &ExportRequest,
        parallel: bool,
    ) -> BatchSummary {
        let count = indices.len() as u32;
        let one = |(pos, &index): (usize, &usize)| {
            let request = template.clone().with_sequence(pos as u32 + 1, count);
            match source.decode(index) {
                Ok(frame) => self.export(&frame, &request),
                Err(e) => self.decode_failed(&request, index, e),
            }
        };

        let results: Vec<ExportResult> = if parallel {
            indices.par_iter().enumerate().map(one).collect()
        } else {
            indices.iter().enumerate().map(one).collect()
        };
        BatchSummary::from_results(results)
    }

    fn decode_failed(&self, request: &ExportRequest, index: usize, err: anyhow::Error) -> ExportResult {
        let negotiated = negotiate(request.format, &self.caps);
        let result = ExportResult {
            status: ExportStatus::Failure,
            requested: request.format,
            format: negotiated.format,
            backend: negotiated.backend.name(),
            path: self.output_path(request, negotiated.extension(), request.sequence.unwrap_or(1)),
            bytes_written: 0,
            missing_mb_count: 0,
            error: None,
        };
        finish(
            result,
            ExportError::DecodeFailure {
                index,
                message: format!("{:#}", err),
            },
        )
    }
}

fn finish(mut result: ExportResult, err: ExportError) -> ExportResult {
    result.status = ExportStatus::Failure;
    result.error = Some(err);
    log_result(&result);
    result
}

fn log_result(result: &ExportResult) {
    match &result.error {
        Some(e) if result.status == ExportStatus::Failure => warn!(
            "Export {} failed ({} → {}): {}",
            result.path.display(),
            result.requested,
            result.format,
            e
        ),
        _ => info!(
            "Exported {} [{}] {} via {}: {} bytes, {} MB missing",
            result.path.display(),
            result.status,
            result.format,
            result.backend,
            result.bytes_written,
            result.missing_mb_count
        ),
    }
}

/// Per-status tally of a batch
#[derive(Debug, Default)]
pub struct BatchSummary {
    pub results: Vec<ExportResult>,
    pub succeeded: usize,
    pub partial: usize,
    pub failed: usize,
}

impl BatchSummary {
    pub fn from_results(results: Vec<ExportResult>) -> Self {
        let mut summary = Self::default();
        for r in &results {
            match r.status {
                ExportStatus::Success => summary.succeeded += 1,
                ExportStatus::PartialSuccess => summary.partial += 1,
                ExportStatus::Failure => summary.failed += 1,
            }
        }
        summary.results = results;
        summary
    }

    pub fn total(&self) -> usize {
        self.results.len()
    }

    /// No export failed (an empty batch counts as a failure)
    pub fn all_written(&self) -> bool {
        self.failed == 0 && !self.results.is_empty()
    }
}

impl std::fmt::Display for BatchSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} exported: {} ok, {} partial, {} failed",
            self.total(),
            self.succeeded,
            self.partial,
            self.failed
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(dir: &Path) -> ExportSession {
        ExportSession::new(CapabilitySet::all()).with_source(&dir.join("clip.264"))
    }

    #[test]
    fn test_status_for() {
        assert_eq!(status_for(0, 4), ExportStatus::Success);
        assert_eq!(status_for(1, 4), ExportStatus::PartialSuccess);
        assert_eq!(status_for(4, 4), ExportStatus::Failure);
        assert_eq!(status_for(0, 0), ExportStatus::Failure);
    }

    #[test]
    fn test_output_path_naming() {
        let s = ExportSession::new(CapabilitySet::all()).with_source(Path::new("/media/clip.264"));
        let single = ExportRequest::new(PictureFormat::Png, "shot");
        assert_eq!(s.output_path(&single, "png", 1), PathBuf::from("/media/shot.png"));

        let batch = single.clone().with_sequence(2, 3).with_output_dir("/out");
        assert_eq!(s.output_path(&batch, "png", 2), PathBuf::from("/out/shot_2.png"));

        let bare = ExportSession::new(CapabilitySet::all()).with_source(Path::new("clip.264"));
        assert_eq!(bare.output_path(&single, "jpg", 1), PathBuf::from("./shot.jpg"));
    }

    #[test]
    fn test_export_success_counts() {
        let tmp = tempfile::tempdir().unwrap();
        let s = session(tmp.path());
        let frame = Frame::solid(2, 2, 16, 128, 128);

        let r = s.export(&frame, &ExportRequest::new(PictureFormat::Yuv420, "a"));
        assert_eq!(r.status, ExportStatus::Success);
        assert_eq!(r.bytes_written, 32 * 32 * 3 / 2);
        assert_eq!(std::fs::metadata(&r.path).unwrap().len(), r.bytes_written);
        assert!(r.error.is_none());
        assert_eq!(s.exported_count(), 1);
    }

    #[test]
    fn test_partial_frame() {
        let tmp = tempfile::tempdir().unwrap();
        let s = session(tmp.path());
        let mut frame = Frame::solid(2, 2, 16, 128, 128);
        frame.clear(1, 1);

        let r = s.export(&frame, &ExportRequest::new(PictureFormat::Png, "p"));
        assert_eq!(r.status, ExportStatus::PartialSuccess);
        assert_eq!(r.missing_mb_count, 1);
        assert!(matches!(
            r.error,
            Some(ExportError::MissingSourceData { missing: 1, total: 4 })
        ));
        assert!(r.path.exists());
    }

    #[test]
    fn test_fully_missing_never_opens_sink() {
        let tmp = tempfile::tempdir().unwrap();
        let s = session(tmp.path());
        let frame = Frame::new(3, 2);

        for &format in PictureFormat::all() {
            let r = s.export(&frame, &ExportRequest::new(format, "gone"));
            assert_eq!(r.status, ExportStatus::Failure);
            assert_eq!(r.missing_mb_count, 6);
            assert!(!r.path.exists());
        }
        assert_eq!(s.exported_count(), 0);
    }

    #[test]
    fn test_high_bit_depth_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let s = session(tmp.path());
        let frame = Frame::solid(1, 1, 16, 128, 128).with_bit_depth(10);
        let r = s.export(&frame, &ExportRequest::new(PictureFormat::Jpg, "deep"));
        assert_eq!(r.status, ExportStatus::Failure);
        assert!(matches!(r.error, Some(ExportError::UnsupportedBitDepth(10))));
    }

    #[test]
    fn test_sink_open_failure() {
        let tmp = tempfile::tempdir().unwrap();
        let s = session(tmp.path());
        let frame = Frame::solid(1, 1, 16, 128, 128);
        let req = ExportRequest::new(PictureFormat::Yuv444, "x").with_output_dir(tmp.path().join("missing/dir"));

        let r = s.export(&frame, &req);
        assert_eq!(r.status, ExportStatus::Failure);
        assert!(matches!(r.error, Some(ExportError::SinkOpenFailure { .. })));
        assert_eq!(r.bytes_written, 0);
    }

    #[test]
    fn test_counter_drives_implicit_sequence() {
        let tmp = tempfile::tempdir().unwrap();
        let s = session(tmp.path());
        let frame = Frame::solid(1, 1, 16, 128, 128);
        let mut req = ExportRequest::new(PictureFormat::Yuv420, "seq");
        req.sequence_count = 5;

        let first = s.export(&frame, &req);
        let second = s.export(&frame, &req);
        assert_eq!(first.path.file_name().unwrap(), "seq_1.yuv");
        assert_eq!(second.path.file_name().unwrap(), "seq_2.yuv");
        assert_eq!(s.exported_count(), 2);
    }

    #[test]
    fn test_concurrent_implicit_sequence() {
        let tmp = tempfile::tempdir().unwrap();
        let s = session(tmp.path());
        let frame = Frame::solid(1, 1, 16, 128, 128);
        let n = 16u32;
        let mut req = ExportRequest::new(PictureFormat::Yuv420, "par");
        req.sequence_count = n;

        let results: Vec<ExportResult> = (0..n)
            .into_par_iter()
            .map(|_| s.export(&frame, &req))
            .collect();
        assert!(results.iter().all(|r| r.status == ExportStatus::Success));

        let mut names: Vec<String> = results
            .iter()
            .map(|r| r.path.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        names.sort();
        let mut expected: Vec<String> = (1..=n).map(|i| format!("par_{}.yuv", i)).collect();
        expected.sort();
        assert_eq!(names, expected);
        assert_eq!(s.exported_count(), n);
    }

    #[test]
    fn test_encoder_failure_removes_output() {
        let tmp = tempfile::tempdir().unwrap();
        let s = session(tmp.path());
        // 65552 pixels wide, past the JPEG header limit; nothing missing
        let frame = Frame::solid(4097, 1, 16, 128, 128);

        let r = s.export(&frame, &ExportRequest::new(PictureFormat::Jpg, "wide"));
        assert_eq!(r.status, ExportStatus::Failure);
        assert_eq!(r.missing_mb_count, 0);
        assert!(matches!(
            r.error,
            Some(ExportError::EncoderFailure { backend: "jpeg", .. })
        ));
        assert!(!r.path.exists());
        assert_eq!(s.exported_count(), 0);
    }

    #[test]
    fn test_quality_defaults() {
        let s = ExportSession::new(CapabilitySet::all()).with_default_qualities(70, 0);
        let req = ExportRequest::new(PictureFormat::Jpg, "q");
        assert_eq!(s.quality_for(&req, PictureFormat::Jpg), 70);
        assert_eq!(s.quality_for(&req, PictureFormat::Webp), 1);
        assert_eq!(s.quality_for(&req.with_quality(120), PictureFormat::Jpg), 100);
    }

    #[test]
    fn test_downgrade_reported() {
        let tmp = tempfile::tempdir().unwrap();
        let s = ExportSession::new(CapabilitySet::none()).with_source(&tmp.path().join("c.264"));
        let r = s.export(
            &Frame::solid(1, 1, 16, 128, 128),
            &ExportRequest::new(PictureFormat::Webp, "w"),
        );
        assert_eq!(r.requested, PictureFormat::Webp);
        assert_eq!(r.format, PictureFormat::Yuv420);
        assert_eq!(r.backend, "raw");
        assert_eq!(r.path.extension().unwrap(), "yuv");
    }
}
