use super::types::*;
use crate::error::{RemuxError, Result};

/// Stateless helpers for transport packet headers and PSI sections.
///
/// PSI parsing here only extracts what routing needs: the first program's
/// PMT PID and the first AAC/video elementary PIDs. Section CRCs are not
/// checked.
#[derive(Debug, Default, Clone, Copy)]
pub struct TSPacketParser;

/// Elementary PIDs announced by one PMT section.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PmtStreams {
    pub audio: Option<u16>,
    pub video: Option<u16>,
}

impl TSPacketParser {
    pub fn new() -> Self {
        Self
    }

    /// Finds the first offset at which three consecutive packets start with
    /// the sync byte. Returns `None` when the buffer holds fewer than three
    /// aligned packets.
    pub fn probe(&self, data: &[u8]) -> Option<usize> {
        let span = 3 * TS_PACKET_SIZE;
        if data.len() < span {
            return None;
        }
        (0..=data.len() - span).find(|&offset| {
            data[offset] == TS_SYNC_BYTE
                && data[offset + TS_PACKET_SIZE] == TS_SYNC_BYTE
                && data[offset + 2 * TS_PACKET_SIZE] == TS_SYNC_BYTE
        })
    }

    pub fn parse_header(&self, data: &[u8]) -> Result<TSHeader> {
        if data.len() < TS_HEADER_SIZE {
            return Err(RemuxError::InvalidData("TS packet too short".into()));
        }

        if data[0] != TS_SYNC_BYTE {
            return Err(RemuxError::InvalidData("Invalid sync byte".into()));
        }

        Ok(TSHeader {
            payload_unit_start: (data[1] & 0x40) != 0,
            pid: (((data[1] & 0x1F) as u16) << 8) | data[2] as u16,
            adaptation_field_control: (data[3] >> 4) & 0x03,
            continuity_counter: data[3] & 0x0F,
        })
    }

    /// Offset of the first payload byte within `packet`, or `None` when the
    /// adaptation field leaves no payload.
    pub fn payload_offset(&self, packet: &[u8], header: &TSHeader) -> Option<usize> {
        if !header.has_adaptation_field() {
            return Some(TS_HEADER_SIZE);
        }
        let offset = TS_HEADER_SIZE + 1 + *packet.get(TS_HEADER_SIZE)? as usize;
        (offset < packet.len()).then_some(offset)
    }

    /// Skips the PSI pointer field that precedes a section when the packet
    /// starts a new payload unit.
    pub fn section_offset(&self, packet: &[u8], payload_offset: usize, unit_start: bool) -> Option<usize> {
        if !unit_start {
            return Some(payload_offset);
        }
        let pointer = *packet.get(payload_offset)? as usize;
        let offset = payload_offset + 1 + pointer;
        (offset < packet.len()).then_some(offset)
    }

    /// Returns the PMT PID of the first program listed in a PAT section.
    /// `section` starts at the table_id byte.
    pub fn parse_pat(&self, section: &[u8]) -> Option<u16> {
        if section.len() < 12 {
            return None;
        }
        Some(((section[10] as u16 & 0x1f) << 8) | section[11] as u16)
    }

    /// Walks the elementary stream loop of a PMT section, keeping the first
    /// AAC and the first video PID. `section` starts at the table_id byte.
    pub fn parse_pmt(&self, section: &[u8]) -> Option<PmtStreams> {
        if section.len() < 12 {
            return None;
        }

        let section_length = ((section[1] as usize & 0x0f) << 8) | section[2] as usize;
        // Loop ends before the trailing CRC32.
        let end = (3 + section_length).saturating_sub(4).min(section.len());
        let program_info_length = ((section[10] as usize & 0x0f) << 8) | section[11] as usize;

        let mut streams = PmtStreams::default();
        let mut pos = 12 + program_info_length;

        while pos + 5 <= end {
            let stream_type = section[pos];
            let pid = ((section[pos + 1] as u16 & 0x1f) << 8) | section[pos + 2] as u16;
            let es_info_length = ((section[pos + 3] as usize & 0x0f) << 8) | section[pos + 4] as usize;

            match stream_type {
                STREAM_TYPE_AAC if streams.audio.is_none() => streams.audio = Some(pid),
                STREAM_TYPE_H265 | STREAM_TYPE_H264 if streams.video.is_none() => {
                    streams.video = Some(pid)
                }
                _ => log::trace!("PMT: ignoring stream type {:#04x} on PID {:#06x}", stream_type, pid),
            }

            pos += 5 + es_info_length;
        }

        Some(streams)
    }
}
