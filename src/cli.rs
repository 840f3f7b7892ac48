use clap::Parser;
use std::path::PathBuf;

use crate::extract::ExtractionMode;
use crate::format::PictureFormat;

// Backends compiled into this build (compile-time)
const WEBP_BACKEND: &str = if cfg!(feature = "webp") { "libwebp (lossy)" } else { "off" };
const JPEG_BACKEND: &str = if cfg!(feature = "jpeg") { "built-in baseline 4:2:0" } else { "off" };
const PNG_BACKEND: &str = if cfg!(feature = "png") { "png 0.17" } else { "off" };
const GENERIC_BACKEND: &str = if cfg!(feature = "generic-writer") { "image 0.25 (jpg/png/bmp/tga)" } else { "off" };

// Build version with backend info
const VERSION_INFO: &str = const_format::concatcp!(
    env!("CARGO_PKG_VERSION"), "\n",
    "WEBP:    ", WEBP_BACKEND, "\n",
    "JPEG:    ", JPEG_BACKEND, "\n",
    "PNG:     ", PNG_BACKEND, "\n",
    "Generic: ", GENERIC_BACKEND, "\n",
    "Target:  ", std::env::consts::ARCH, "-", std::env::consts::OS
);

/// Export IDR pictures of a raw 4:2:0 stream as still images
#[derive(Parser, Debug)]
#[command(author, version = VERSION_INFO, about, long_about = None)]
pub struct Args {
    /// Input file (raw planar 8-bit 4:2:0, pictures concatenated)
    #[arg(value_name = "INPUT", required_unless_present = "backends")]
    pub input: Option<PathBuf>,

    /// Picture size in pixels, both multiples of 16
    #[arg(short = 's', long = "size", value_name = "WxH", value_parser = parse_size)]
    pub size: Option<(usize, usize)>,

    /// Output directory (default: next to the input file)
    #[arg(short = 'o', long = "output", value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Picture format
    #[arg(short = 'f', long = "format", value_enum)]
    pub format: Option<PictureFormat>,

    /// Quality for lossy formats
    #[arg(short = 'q', long = "quality", value_parser = clap::value_parser!(u8).range(1..=99))]
    pub quality: Option<u8>,

    /// Number of pictures to export
    #[arg(short = 'n', long = "count", value_parser = clap::value_parser!(u16).range(1..=999))]
    pub count: Option<u16>,

    /// Picture selection
    #[arg(short = 'm', long = "mode", value_enum)]
    pub mode: Option<ExtractionMode>,

    /// Output base name (default: input file stem)
    #[arg(long = "name", value_name = "BASE")]
    pub name: Option<String>,

    /// Worker threads for batch export (1 = sequential)
    #[arg(long = "workers", value_name = "N")]
    pub workers: Option<usize>,

    /// Print available backends and how every format resolves, then exit
    #[arg(long = "backends")]
    pub backends: bool,

    /// Enable debug logging to file (default: idrshot.log)
    #[arg(short = 'l', long = "log", value_name = "LOG_FILE")]
    pub log_file: Option<Option<PathBuf>>,

    /// Increase logging verbosity (default: warn, -v: info, -vv: debug, -vvv+: trace)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    pub verbosity: u8,

    /// Custom configuration directory (overrides default platform paths)
    #[arg(short = 'c', long = "config-dir", value_name = "DIR")]
    pub config_dir: Option<PathBuf>,

    /// Write the effective settings to idrshot.json
    #[arg(long = "save-settings")]
    pub save_settings: bool,
}

/// Parse `WxH` (e.g. `1920x1088`)
pub fn parse_size(s: &str) -> Result<(usize, usize), String> {
    let (w, h) = s
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WxH, got '{}'", s))?;
    let w: usize = w.trim().parse().map_err(|_| format!("bad width '{}'", w))?;
    let h: usize = h.trim().parse().map_err(|_| format!("bad height '{}'", h))?;
    if w == 0 || h == 0 || w % 16 != 0 || h % 16 != 0 {
        return Err(format!("{}x{}: both sides must be non-zero multiples of 16", w, h));
    }
    Ok((w, h))
}
