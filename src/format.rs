//! Output format negotiation
//!
//! Resolves a requested picture format to one this build can deliver, using a
//! fixed fallback chain:
//!
//! 1. WEBP without a WEBP backend → JPG
//! 2. JPG without a JPEG backend or generic writer → PNG
//! 3. PNG without a PNG backend or generic writer → YUV420
//! 4. BMP/TGA without a generic writer → YUV420
//!
//! Raw YUV420/YUV444 never downgrade. Resolution is pure: the same request and
//! capability set always produce the same answer. Downgrades are logged, never
//! raised.

use clap::ValueEnum;
use log::warn;
use serde::{Deserialize, Serialize};

use crate::caps::CapabilitySet;
use crate::planes::Subsampling;

/// Picture formats a caller can ask for
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum PictureFormat {
    Webp,
    #[value(alias = "jpeg")]
    Jpg,
    Png,
    Bmp,
    Tga,
    #[value(name = "yuv420")]
    Yuv420,
    #[value(name = "yuv444")]
    Yuv444,
}

impl PictureFormat {
    pub fn all() -> &'static [PictureFormat] {
        &[
            PictureFormat::Webp,
            PictureFormat::Jpg,
            PictureFormat::Png,
            PictureFormat::Bmp,
            PictureFormat::Tga,
            PictureFormat::Yuv420,
            PictureFormat::Yuv444,
        ]
    }

    pub fn extension(&self) -> &'static str {
        match self {
            PictureFormat::Webp => "webp",
            PictureFormat::Jpg => "jpg",
            PictureFormat::Png => "png",
            PictureFormat::Bmp => "bmp",
            PictureFormat::Tga => "tga",
            PictureFormat::Yuv420 | PictureFormat::Yuv444 => "yuv",
        }
    }

    pub fn is_raw(&self) -> bool {
        matches!(self, PictureFormat::Yuv420 | PictureFormat::Yuv444)
    }
}

impl std::fmt::Display for PictureFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PictureFormat::Webp => write!(f, "WEBP"),
            PictureFormat::Jpg => write!(f, "JPG"),
            PictureFormat::Png => write!(f, "PNG"),
            PictureFormat::Bmp => write!(f, "BMP"),
            PictureFormat::Tga => write!(f, "TGA"),
            PictureFormat::Yuv420 => write!(f, "YUV420"),
            PictureFormat::Yuv444 => write!(f, "YUV444"),
        }
    }
}

/// Concrete encoder implementation chosen for a resolved format
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Backend {
    /// Headerless Y/Cb/Cr dump
    RawPlanar(Subsampling),
    /// Dedicated baseline JPEG encoder fed with native 4:2:0 planes
    JpegRaw,
    /// Dedicated PNG encoder
    Png,
    /// Generic RGB writer for the given format (JPG/PNG/BMP/TGA)
    Generic(PictureFormat),
    Webp,
}

/// Buffer shape a backend consumes
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InputLayout {
    Planar(Subsampling),
    Rgb,
}

impl Backend {
    pub fn name(&self) -> &'static str {
        match self {
            Backend::RawPlanar(_) => "raw",
            Backend::JpegRaw => "jpeg",
            Backend::Png => "png",
            Backend::Generic(_) => "image",
            Backend::Webp => "webp",
        }
    }

    pub fn input_layout(&self) -> InputLayout {
        match self {
            Backend::RawPlanar(subsampling) => InputLayout::Planar(*subsampling),
            Backend::JpegRaw => InputLayout::Planar(Subsampling::Yuv420),
            Backend::Png | Backend::Generic(_) | Backend::Webp => InputLayout::Rgb,
        }
    }
}

/// Outcome of format negotiation
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Negotiated {
    pub requested: PictureFormat,
    pub format: PictureFormat,
    pub backend: Backend,
    /// Every (from, to) step taken along the fallback chain
    pub downgrades: Vec<(PictureFormat, PictureFormat)>,
}

impl Negotiated {
    pub fn extension(&self) -> &'static str {
        self.format.extension()
    }

    pub fn is_downgraded(&self) -> bool {
        self.format != self.requested
    }
}

/// Resolve `requested` against `caps`
pub fn negotiate(requested: PictureFormat, caps: &CapabilitySet) -> Negotiated {
    let mut format = requested;
    let mut downgrades = Vec::new();
    let mut step = |from: &mut PictureFormat, to: PictureFormat, why: &str| {
        warn!("{} unavailable ({}), falling back to {}", from, why, to);
        downgrades.push((*from, to));
        *from = to;
    };

    if format == PictureFormat::Webp && !caps.has_webp {
        step(&mut format, PictureFormat::Jpg, "no WEBP backend");
    }
    if format == PictureFormat::Jpg && !caps.has_jpeg && !caps.has_generic_writer {
        step(&mut format, PictureFormat::Png, "no JPEG backend or generic writer");
    }
    if format == PictureFormat::Png && !caps.has_png && !caps.has_generic_writer {
        step(&mut format, PictureFormat::Yuv420, "no PNG backend or generic writer");
    }
    if matches!(format, PictureFormat::Bmp | PictureFormat::Tga) && !caps.has_generic_writer {
        step(&mut format, PictureFormat::Yuv420, "no generic writer");
    }

    let backend = match format {
        PictureFormat::Yuv420 => Backend::RawPlanar(Subsampling::Yuv420),
        PictureFormat::Yuv444 => Backend::RawPlanar(Subsampling::Yuv444),
        PictureFormat::Jpg if caps.has_jpeg => Backend::JpegRaw,
        PictureFormat::Png if caps.has_png => Backend::Png,
        PictureFormat::Webp => Backend::Webp,
        other => Backend::Generic(other),
    };

    Negotiated {
        requested,
        format,
        backend,
        downgrades,
    }
}
