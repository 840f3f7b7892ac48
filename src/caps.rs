//! Which image backends this build can use
//!
//! The set is computed once at process start from Cargo features, optionally
//! narrowed by `IDRSHOT_DISABLE_BACKENDS`, and is read-only afterwards.

use log::{info, warn};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

/// Environment variable listing backends to switch off (comma separated)
pub const DISABLE_ENV: &str = "IDRSHOT_DISABLE_BACKENDS";

/// Available encoder backends
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CapabilitySet {
    pub has_webp: bool,
    pub has_jpeg: bool,
    pub has_png: bool,
    /// Generic RGB writer covering JPEG/PNG/BMP/TGA
    pub has_generic_writer: bool,
}

static PROCESS_CAPS: Lazy<CapabilitySet> = Lazy::new(|| {
    let caps = match std::env::var(DISABLE_ENV) {
        Ok(list) => CapabilitySet::compiled().without(&list),
        Err(_) => CapabilitySet::compiled(),
    };
    info!("Image backends: {}", caps);
    caps
});

impl CapabilitySet {
    /// Backends enabled through Cargo features
    pub const fn compiled() -> Self {
        Self {
            has_webp: cfg!(feature = "webp"),
            has_jpeg: cfg!(feature = "jpeg"),
            has_png: cfg!(feature = "png"),
            has_generic_writer: cfg!(feature = "generic-writer"),
        }
    }

    pub const fn all() -> Self {
        Self {
            has_webp: true,
            has_jpeg: true,
            has_png: true,
            has_generic_writer: true,
        }
    }

    /// Only raw planar output remains
    pub const fn none() -> Self {
        Self {
            has_webp: false,
            has_jpeg: false,
            has_png: false,
            has_generic_writer: false,
        }
    }

    /// Process-wide set, initialized on first access
    pub fn global() -> CapabilitySet {
        *PROCESS_CAPS
    }

    /// Copy with the backends named in `list` removed (`webp,jpeg,png,generic`)
    pub fn without(mut self, list: &str) -> Self {
        for name in list.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            match name.to_ascii_lowercase().as_str() {
                "webp" => self.has_webp = false,
                "jpeg" | "jpg" => self.has_jpeg = false,
                "png" => self.has_png = false,
                "generic" | "generic-writer" => self.has_generic_writer = false,
                other => warn!("{}: unknown backend '{}' ignored", DISABLE_ENV, other),
            }
        }
        self
    }
}

impl Default for CapabilitySet {
    fn default() -> Self {
        Self::compiled()
    }
}

impl std::fmt::Display for CapabilitySet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mark = |on: bool| if on { "yes" } else { "no" };
        write!(
            f,
            "webp={} jpeg={} png={} generic={}",
            mark(self.has_webp),
            mark(self.has_jpeg),
            mark(self.has_png),
            mark(self.has_generic_writer)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_without_parses_list() {
        let caps = CapabilitySet::all().without("webp, PNG,generic");
        assert!(!caps.has_webp);
        assert!(caps.has_jpeg);
        assert!(!caps.has_png);
        assert!(!caps.has_generic_writer);
    }

    #[test]
    fn test_without_ignores_unknown() {
        let caps = CapabilitySet::all().without("gif,,");
        assert_eq!(caps, CapabilitySet::all());
    }

    #[test]
    fn test_global_is_stable() {
        assert_eq!(CapabilitySet::global(), CapabilitySet::global());
    }

    #[test]
    fn test_display() {
        assert_eq!(
            CapabilitySet::none().to_string(),
            "webp=no jpeg=no png=no generic=no"
        );
    }
}
