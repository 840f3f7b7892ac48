//! Export error taxonomy
//!
//! Every export call ends in exactly one terminal state. Missing macroblocks are
//! folded into the result status instead of being raised; the other variants
//! end the single export they occur in but never a whole batch.

use std::path::PathBuf;

/// Errors raised while turning a macroblock grid into an output file
#[derive(Debug)]
pub enum ExportError {
    /// A plane or pixel buffer could not be allocated
    AllocationFailure { bytes: usize },
    /// Some or all macroblocks were absent in the source frame
    MissingSourceData { missing: usize, total: usize },
    /// No usable backend exists for the requested format
    UnsupportedFormat(String),
    /// Source samples are not 8-bit
    UnsupportedBitDepth(u8),
    /// Output file could not be created
    SinkOpenFailure {
        path: PathBuf,
        source: std::io::Error,
    },
    /// The selected backend reported an error while encoding
    EncoderFailure {
        backend: &'static str,
        message: String,
    },
    /// The frame source could not produce picture `index`
    DecodeFailure { index: usize, message: String },
}

impl ExportError {
    pub fn encoder(backend: &'static str, err: impl std::fmt::Display) -> Self {
        ExportError::EncoderFailure {
            backend,
            message: err.to_string(),
        }
    }
}

impl std::fmt::Display for ExportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExportError::AllocationFailure { bytes } => {
                write!(f, "Failed to allocate {} bytes for picture buffers", bytes)
            }
            ExportError::MissingSourceData { missing, total } => {
                write!(f, "{} of {} macroblocks missing in source frame", missing, total)
            }
            ExportError::UnsupportedFormat(msg) => write!(f, "Unsupported format: {}", msg),
            ExportError::UnsupportedBitDepth(depth) => {
                write!(f, "Unsupported source bit depth: {} (only 8-bit is exported)", depth)
            }
            ExportError::SinkOpenFailure { path, source } => {
                write!(f, "Failed to create output file {}: {}", path.display(), source)
            }
            ExportError::EncoderFailure { backend, message } => {
                write!(f, "{} encoder failed: {}", backend, message)
            }
            ExportError::DecodeFailure { index, message } => {
                write!(f, "Failed to decode picture {}: {}", index, message)
            }
        }
    }
}

impl std::error::Error for ExportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ExportError::SinkOpenFailure { source, .. } => Some(source),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ExportError>;
