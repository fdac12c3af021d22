//! # Fragmented MP4
//!
//! Box tree serialization and the builders for the initialization segment
//! (`ftyp` + `moov`) and media fragments (`moof` + `mdat`).

/// Box tree with bottom-up size computation
pub mod boxes;

/// Initialization and fragment box builders
pub mod fmp4;

/// Per-sample `trun`/`sdtp` descriptors
pub mod sample;

pub use boxes::Mp4Box;
pub use fmp4::{ftyp, mdat, moof, moov, AudioDescription, Track, UNKNOWN_DURATION};
pub use sample::{Mp4Sample, SampleFlags};
