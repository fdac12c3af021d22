//! # MPEG Transport Stream (TS)
//!
//! - Packet sync probing and header parsing
//! - PAT/PMT discovery of the audio and video PIDs
//! - PES reassembly and header decoding
//! - A small packetizer producing single-program streams
//!
//! ```rust
//! use tsremux::format::ts::{StreamEntry, TSDemuxer, TSPacketizer, STREAM_ID_AUDIO, STREAM_TYPE_AAC};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut packetizer = TSPacketizer::new();
//! packetizer.write_pat()?;
//! packetizer.write_pmt(&[StreamEntry::new(STREAM_TYPE_AAC, 0x101)])?;
//! packetizer.write_pes(0x101, STREAM_ID_AUDIO, Some(900), None, &[0u8; 300])?;
//! let segment = packetizer.into_bytes();
//!
//! let mut demuxer = TSDemuxer::new();
//! let units = demuxer.demux_all(&segment).expect("sync");
//! assert_eq!(units[0].pts, Some(900));
//! # Ok(())
//! # }
//! ```

/// TS demuxer for extracting elementary streams
pub mod demuxer;

/// Single-program TS writer
pub mod muxer;

/// Packet header and PSI section parsing
pub mod parser;

/// PES header decoding and encoding
pub mod pes;

/// Core TS types and constants
pub mod types;


pub use demuxer::TSDemuxer;
pub use muxer::{StreamEntry, TSPacketizer};
pub use parser::{PmtStreams, TSPacketParser};
pub use pes::{parse_pes, PESHeader, ParsedPes};
pub use types::{
    PidRoute, PidTable, TSHeader, PID_PAT, PID_PMT, PTS_HZ, PTS_MASK, STREAM_ID_AUDIO,
    STREAM_ID_VIDEO, STREAM_TYPE_AAC, STREAM_TYPE_H264, STREAM_TYPE_H265, TS_PACKET_SIZE,
};
