use super::pes::PESHeader;
use super::types::*;
use crate::error::{RemuxError, Result};
use crate::utils::crc::Crc32Mpeg2;
use bytes::{BufMut, Bytes, BytesMut};
use std::collections::HashMap;

/// One elementary stream announced in the PMT.
#[derive(Debug, Clone, Copy)]
pub struct StreamEntry {
    pub stream_type: u8,
    pub pid: u16,
}

impl StreamEntry {
    pub fn new(stream_type: u8, pid: u16) -> Self {
        Self { stream_type, pid }
    }
}

/// Writes a single-program transport stream into memory.
///
/// This is the inverse of [`super::TSDemuxer`]: PAT/PMT sections with
/// valid CRCs, and PES packets split across 188-byte packets with the last
/// packet padded through adaptation-field stuffing.
pub struct TSPacketizer {
    buf: BytesMut,
    crc: Crc32Mpeg2,
    continuity_counters: HashMap<u16, u8>,
}

impl Default for TSPacketizer {
    fn default() -> Self {
        Self::new()
    }
}

impl TSPacketizer {
    pub fn new() -> Self {
        Self {
            buf: BytesMut::new(),
            crc: Crc32Mpeg2::new(),
            continuity_counters: HashMap::new(),
        }
    }

    /// Number of bytes written so far.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn into_bytes(self) -> Bytes {
        self.buf.freeze()
    }

    fn next_continuity_counter(&mut self, pid: u16) -> u8 {
        let counter = self.continuity_counters.entry(pid).or_insert(0x0F);
        *counter = (*counter + 1) & 0x0F;
        *counter
    }

    /// Writes a PAT listing program 1 on [`PID_PMT`].
    pub fn write_pat(&mut self) -> Result<()> {
        let mut pat = PAT::new();
        pat.entries.push(PATEntry {
            program_number: 1,
            program_map_pid: PID_PMT,
        });

        let mut body = BytesMut::with_capacity(pat.len());
        pat.write_to(&mut body)?;
        self.write_section(PID_PAT, TABLE_ID_PAT, 1, &body)
    }

    /// Writes a PMT for program 1. The first stream carries the PCR.
    pub fn write_pmt(&mut self, streams: &[StreamEntry]) -> Result<()> {
        let mut pmt = PMT::new();
        pmt.pcr_pid = streams.first().map(|s| s.pid).unwrap_or(0x1FFF);
        pmt.elementary_stream_infos = streams
            .iter()
            .map(|s| ElementaryStreamInfo {
                stream_type: s.stream_type,
                elementary_pid: s.pid,
            })
            .collect();

        let mut body = BytesMut::with_capacity(pmt.len());
        pmt.write_to(&mut body)?;
        self.write_section(PID_PMT, TABLE_ID_PMT, 1, &body)
    }

    fn write_section(&mut self, pid: u16, table_id: u8, table_id_extension: u16, body: &[u8]) -> Result<()> {
        // Header after section_length (5 bytes) + body + CRC32
        let section_length = 5 + body.len() + 4;

        let mut section = BytesMut::with_capacity(3 + section_length);
        section.put_u8(table_id);
        section.put_u16(0xB000 | section_length as u16);
        section.put_u16(table_id_extension);
        section.put_u8(0xC1); // Version 0, current
        section.put_u8(0); // Section number
        section.put_u8(0); // Last section number
        section.extend_from_slice(body);
        let crc = self.crc.calculate(&section);
        section.put_u32(crc);

        // Pointer field precedes the section
        if section.len() + 1 > TS_PAYLOAD_SIZE {
            return Err(RemuxError::InvalidData("PSI section does not fit one packet".into()));
        }

        let header = TSHeader {
            payload_unit_start: true,
            pid,
            adaptation_field_control: 1,
            continuity_counter: self.next_continuity_counter(pid),
        };
        header.write_to(&mut self.buf)?;
        self.buf.put_u8(0);
        self.buf.extend_from_slice(&section);
        for _ in section.len() + 1..TS_PAYLOAD_SIZE {
            self.buf.put_u8(0xFF);
        }

        Ok(())
    }

    /// Writes one PES packet carrying `payload`, spread over as many
    /// transport packets as needed.
    pub fn write_pes(
        &mut self,
        pid: u16,
        stream_id: u8,
        pts: Option<u64>,
        dts: Option<u64>,
        payload: &[u8],
    ) -> Result<()> {
        let mut header = PESHeader::new(stream_id);
        if let Some(pts) = pts {
            header = header.with_pts(pts);
            if let Some(dts) = dts {
                header = header.with_dts(dts);
            }
        }

        let mut pes = BytesMut::with_capacity(header.encoded_len() + payload.len());
        header.write_to(&mut pes, payload.len())?;
        pes.extend_from_slice(payload);

        let mut unit_start = true;
        for chunk in pes.chunks(TS_PAYLOAD_SIZE) {
            self.write_packet(pid, unit_start, chunk)?;
            unit_start = false;
        }
        Ok(())
    }

    /// Writes a continuation packet (no payload-unit-start) with `payload`.
    pub fn write_raw_payload(&mut self, pid: u16, payload: &[u8]) -> Result<()> {
        if payload.len() > TS_PAYLOAD_SIZE {
            return Err(RemuxError::InvalidData("payload exceeds one TS packet".into()));
        }
        self.write_packet(pid, false, payload)
    }

    fn write_packet(&mut self, pid: u16, unit_start: bool, chunk: &[u8]) -> Result<()> {
        let stuffing = TS_PAYLOAD_SIZE - chunk.len();
        let header = TSHeader {
            payload_unit_start: unit_start,
            pid,
            adaptation_field_control: if stuffing > 0 { 3 } else { 1 },
            continuity_counter: self.next_continuity_counter(pid),
        };
        header.write_to(&mut self.buf)?;

        if stuffing > 0 {
            // adaptation_field_length excludes its own byte
            let adaptation_length = stuffing - 1;
            self.buf.put_u8(adaptation_length as u8);
            if adaptation_length > 0 {
                self.buf.put_u8(0x00); // no flags
                for _ in 1..adaptation_length {
                    self.buf.put_u8(0xFF);
                }
            }
        }

        self.buf.extend_from_slice(chunk);
        Ok(())
    }
}
