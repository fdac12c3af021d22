use crate::error::Result;
use bytes::{BufMut, BytesMut};
use std::time::Duration;

// Stream IDs
pub const STREAM_ID_VIDEO: u8 = 0xe0;
pub const STREAM_ID_AUDIO: u8 = 0xc0;

// PIDs
pub const PID_PAT: u16 = 0x0000;
pub const PID_PMT: u16 = 0x1000;

// Table IDs
pub const TABLE_ID_PAT: u8 = 0x00;
pub const TABLE_ID_PMT: u8 = 0x02;

// Elementary Stream Types
pub const STREAM_TYPE_H264: u8 = 0x1b;
pub const STREAM_TYPE_H265: u8 = 0x24;
pub const STREAM_TYPE_AAC: u8 = 0x0f;

// Constants
pub const TS_SYNC_BYTE: u8 = 0x47;
pub const TS_PACKET_SIZE: usize = 188;
pub const TS_HEADER_SIZE: usize = 4;
pub const TS_PAYLOAD_SIZE: usize = TS_PACKET_SIZE - TS_HEADER_SIZE;
pub const PTS_HZ: u64 = 90_000;
/// PTS/DTS counters are 33 bits wide.
pub const PTS_MASK: u64 = (1 << 33) - 1;

/// Program association entry as written by the packetizer.
#[derive(Debug, Clone)]
pub struct PATEntry {
    pub program_number: u16,
    pub program_map_pid: u16,
}

#[derive(Debug, Clone, Default)]
pub struct PAT {
    pub entries: Vec<PATEntry>,
}

impl PAT {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len() * 4
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn write_to(&self, buf: &mut BytesMut) -> Result<()> {
        for entry in &self.entries {
            buf.put_u16(entry.program_number);
            buf.put_u16(entry.program_map_pid & 0x1fff | 7 << 13);
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct ElementaryStreamInfo {
    pub stream_type: u8,
    pub elementary_pid: u16,
}

#[derive(Debug, Clone, Default)]
pub struct PMT {
    pub pcr_pid: u16,
    pub elementary_stream_infos: Vec<ElementaryStreamInfo>,
}

impl PMT {
    pub fn new() -> Self {
        Self {
            pcr_pid: 0,
            elementary_stream_infos: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        // PCR PID + program info length, then 5 bytes per stream
        4 + self.elementary_stream_infos.len() * 5
    }

    pub fn is_empty(&self) -> bool {
        self.elementary_stream_infos.is_empty()
    }

    pub fn write_to(&self, buf: &mut BytesMut) -> Result<()> {
        buf.put_u16(self.pcr_pid & 0x1fff | 7 << 13);
        // No program descriptors
        buf.put_u16(0xf << 12);

        for info in &self.elementary_stream_infos {
            buf.put_u8(info.stream_type);
            buf.put_u16(info.elementary_pid & 0x1fff | 7 << 13);
            buf.put_u16(0xf << 12);
        }

        Ok(())
    }
}

/// The four header bytes of a transport packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TSHeader {
    pub payload_unit_start: bool,
    pub pid: u16,
    /// Two-bit adaptation_field_control: 1 payload only, 2 adaptation only, 3 both.
    pub adaptation_field_control: u8,
    pub continuity_counter: u8,
}

impl Default for TSHeader {
    fn default() -> Self {
        Self {
            payload_unit_start: false,
            pid: 0,
            adaptation_field_control: 1,
            continuity_counter: 0,
        }
    }
}

impl TSHeader {
    pub fn has_adaptation_field(&self) -> bool {
        self.adaptation_field_control > 1
    }

    pub fn write_to(&self, buf: &mut BytesMut) -> Result<()> {
        buf.put_u8(TS_SYNC_BYTE);

        let mut b1 = ((self.pid >> 8) & 0x1f) as u8;
        if self.payload_unit_start {
            b1 |= 0x40;
        }
        buf.put_u8(b1);
        buf.put_u8((self.pid & 0xff) as u8);
        buf.put_u8(((self.adaptation_field_control & 0x03) << 4) | (self.continuity_counter & 0x0f));

        Ok(())
    }
}

/// PIDs learned from PAT/PMT while walking one buffer.
///
/// PAT is always PID 0; the other bindings start unknown and are filled in
/// as tables are seen, so routing must consult this table per packet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PidTable {
    pub pmt: Option<u16>,
    pub audio: Option<u16>,
    pub video: Option<u16>,
}

/// Where a packet's payload goes under the current [`PidTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PidRoute {
    Pat,
    Pmt,
    Audio,
    Video,
    Ignore,
}

impl PidTable {
    pub fn route(&self, pid: u16) -> PidRoute {
        if pid == PID_PAT {
            PidRoute::Pat
        } else if self.pmt == Some(pid) {
            PidRoute::Pmt
        } else if self.audio == Some(pid) {
            PidRoute::Audio
        } else if self.video == Some(pid) {
            PidRoute::Video
        } else {
            PidRoute::Ignore
        }
    }
}

pub fn pts_to_time(pts: u64) -> Duration {
    Duration::from_nanos((pts * 1_000_000_000) / PTS_HZ)
}
