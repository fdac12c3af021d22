#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(rustdoc::missing_crate_level_docs)]

//! # tsremux - MPEG-TS to fragmented MP4 audio remuxing
//!
//! `tsremux` turns MPEG-2 transport stream segments, as served by HLS, into
//! an ISO BMFF byte stream that can be appended incrementally to a media
//! sink.
//!
//! ## Features
//!
//! - TS packet sync probing, PAT/PMT discovery and PES reassembly
//! - AAC ADTS frame splitting and AudioSpecificConfig derivation, with an
//!   explicit choice between plain and HE-AAC signalling
//! - Continuous output timeline across segments, tolerant of 33-bit PTS
//!   wraparound
//! - `ftyp`/`moov` initialization and `moof`/`mdat` fragment construction
//! - A segment pipeline with an ordered output queue and async sink pumping
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use tsremux::config::RemuxConfig;
//! use tsremux::remux::AudioPipeline;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut pipeline = AudioPipeline::new(RemuxConfig::from_env()).with_duration(30.0);
//!
//!     for path in ["seg000.ts", "seg001.ts", "seg002.ts"] {
//!         let data = std::fs::read(path)?;
//!         if let Some(fragment) = pipeline.push_segment(&data)? {
//!             println!("fragment {} at {}", fragment.sequence_number, fragment.base_media_decode_time);
//!         }
//!     }
//!
//!     let queue = pipeline.queue();
//!     let mut out = Vec::new();
//!     while let Some(buf) = queue.pop() {
//!         out.extend_from_slice(&buf);
//!     }
//!     std::fs::write("audio.mp4", out)?;
//!     Ok(())
//! }
//! ```
//!
//! ## Module Overview
//!
//! - `av`: shared media units (`PesUnit`) and the output `AudioTrack`
//! - `codec`: AAC ADTS parsing and decoder configuration
//! - `format`: transport stream input and fragmented MP4 output
//! - `remux`: timeline re-timing and the segment pipeline
//! - `config`: in-process configuration with environment overrides
//! - `error`: error type and `Result` alias
//! - `utils`: bit reader/writer and MPEG-2 CRC

/// Media units and track state
pub mod av;

/// Audio codec parsing
pub mod codec;

/// Configuration module
pub mod config;

/// Error types and utilities
pub mod error;

/// Container formats (TS input, fMP4 output)
pub mod format;

/// Remuxing and pipeline driver
pub mod remux;

/// Common utilities and helper functions
pub mod utils;

pub use error::{RemuxError, Result};
