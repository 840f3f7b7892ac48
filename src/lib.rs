//! IDRSHOT - macroblock grid to still picture export
//!
//! Re-exports all modules for use by the binary target.

// Pipeline stages (leaves first)
pub mod caps;
pub mod error;
pub mod frame;
pub mod planes;
pub mod rgb_cvt;
pub mod format;
pub mod encode;
pub mod export;

// Tool modules
pub mod cli;
pub mod config;
pub mod extract;
pub mod source;
mod paths;

pub use caps::CapabilitySet;
pub use error::ExportError;
pub use export::{BatchSummary, ExportRequest, ExportResult, ExportSession, ExportStatus};
pub use extract::{ExtractionMode, plan};
pub use format::{Backend, PictureFormat, negotiate};
pub use frame::{Frame, Macroblock};
pub use planes::{PlanarBuffer, Subsampling, assemble};
pub use rgb_cvt::{PackedRgbBuffer, ycbcr444_to_rgb24};
pub use source::{FrameSource, RawYuvSource};
