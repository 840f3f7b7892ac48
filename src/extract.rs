//! Which pictures of a source get exported

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::source::FrameSource;

/// Picture selection strategy
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ExtractionMode {
    /// First N pictures in decode order, any type
    Unfiltered,
    /// First N IDR pictures in decode order
    Ordered,
    /// N IDR pictures spread evenly over the whole source
    #[default]
    Distributed,
}

impl std::fmt::Display for ExtractionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExtractionMode::Unfiltered => write!(f, "unfiltered"),
            ExtractionMode::Ordered => write!(f, "ordered"),
            ExtractionMode::Distributed => write!(f, "distributed"),
        }
    }
}

/// Picture indices (decode order) to export, ascending
pub fn plan(source: &dyn FrameSource, mode: ExtractionMode, count: usize) -> Vec<usize> {
    let total = source.picture_count();
    match mode {
        ExtractionMode::Unfiltered => (0..total.min(count)).collect(),
        ExtractionMode::Ordered => (0..total).filter(|&i| source.is_idr(i)).take(count).collect(),
        ExtractionMode::Distributed => {
            let idr: Vec<usize> = (0..total).filter(|&i| source.is_idr(i)).collect();
            if idr.len() <= count {
                return idr;
            }
            (0..count).map(|i| idr[i * idr.len() / count]).collect()
        }
    }
}
