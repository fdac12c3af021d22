use super::parser::TSPacketParser;
use super::pes::parse_pes;
use super::types::*;
use crate::av::{PesUnit, StreamKind};

/// MPEG Transport Stream demuxer.
///
/// Splits a segment buffer into transport packets, learns the PMT and
/// elementary PIDs from PAT/PMT as they appear, and reassembles PES units
/// for the first AAC stream and the first video stream.
///
/// PID discovery is scoped to one [`TSDemuxer::demux`] call: every segment
/// is expected to carry its own PAT/PMT, as HLS segments do.
#[derive(Debug, Default)]
pub struct TSDemuxer {
    parser: TSPacketParser,
    pids: PidTable,
}

/// Payload fragments of the PES unit currently being collected for one PID.
///
/// Fragments borrow from the segment buffer and are only copied when the
/// unit is complete.
#[derive(Debug)]
struct PESAssembler<'a> {
    kind: StreamKind,
    fragments: Option<Vec<&'a [u8]>>,
}

impl<'a> PESAssembler<'a> {
    fn new(kind: StreamKind) -> Self {
        Self {
            kind,
            fragments: None,
        }
    }

    /// Adds one packet payload. A payload-unit-start closes the previous
    /// unit, which is returned. Payloads seen before the first unit start
    /// are dropped.
    fn push(&mut self, payload: &'a [u8], unit_start: bool) -> Option<PesUnit> {
        let mut completed = None;
        if unit_start {
            completed = self.finish();
            self.fragments = Some(Vec::new());
        }
        if let Some(fragments) = self.fragments.as_mut() {
            fragments.push(payload);
        }
        completed
    }

    fn finish(&mut self) -> Option<PesUnit> {
        let fragments = self.fragments.take()?;
        if fragments.is_empty() {
            return None;
        }
        match parse_pes(&fragments) {
            Some(pes) => Some(PesUnit {
                kind: self.kind,
                pts: pes.pts,
                dts: pes.dts,
                data: pes.payload,
            }),
            None => {
                log::debug!("dropping malformed {} PES unit", self.kind);
                None
            }
        }
    }
}

impl TSDemuxer {
    /// Creates a new TS demuxer.
    pub fn new() -> Self {
        Self::default()
    }

    /// PIDs learned during the most recent `demux` call.
    pub fn pid_table(&self) -> PidTable {
        self.pids
    }

    pub fn reset(&mut self) {
        self.pids = PidTable::default();
    }

    /// Demultiplexes one segment buffer, handing every completed PES unit to
    /// `on_unit` in stream order.
    ///
    /// Returns the number of video units emitted, or `None` when no packet
    /// sync could be found.
    pub fn demux<F>(&mut self, data: &[u8], mut on_unit: F) -> Option<usize>
    where
        F: FnMut(PesUnit),
    {
        let start = match self.parser.probe(data) {
            Some(offset) => offset,
            None => {
                log::debug!("no TS sync found in {} byte buffer", data.len());
                return None;
            }
        };

        self.pids = PidTable::default();
        let mut audio = PESAssembler::new(StreamKind::Audio);
        let mut video = PESAssembler::new(StreamKind::Video);
        let mut video_units = 0;

        let mut pos = start;
        while pos + TS_PACKET_SIZE <= data.len() {
            let packet = &data[pos..pos + TS_PACKET_SIZE];
            pos += TS_PACKET_SIZE;

            let header = match self.parser.parse_header(packet) {
                Ok(header) => header,
                Err(e) => {
                    log::debug!("skipping packet at offset {}: {}", pos - TS_PACKET_SIZE, e);
                    continue;
                }
            };
            let payload_offset = match self.parser.payload_offset(packet, &header) {
                Some(offset) => offset,
                None => continue,
            };

            match self.pids.route(header.pid) {
                PidRoute::Pat => {
                    let section = self
                        .parser
                        .section_offset(packet, payload_offset, header.payload_unit_start)
                        .and_then(|offset| self.parser.parse_pat(&packet[offset..]));
                    if let Some(pmt_pid) = section {
                        self.pids.pmt = Some(pmt_pid);
                    }
                }
                PidRoute::Pmt => {
                    let streams = self
                        .parser
                        .section_offset(packet, payload_offset, header.payload_unit_start)
                        .and_then(|offset| self.parser.parse_pmt(&packet[offset..]));
                    if let Some(streams) = streams {
                        if self.pids.audio.is_none() {
                            self.pids.audio = streams.audio;
                        }
                        if self.pids.video.is_none() {
                            self.pids.video = streams.video;
                        }
                    }
                }
                PidRoute::Audio => {
                    if let Some(unit) = audio.push(&packet[payload_offset..], header.payload_unit_start) {
                        on_unit(unit);
                    }
                }
                PidRoute::Video => {
                    if let Some(unit) = video.push(&packet[payload_offset..], header.payload_unit_start) {
                        video_units += 1;
                        on_unit(unit);
                    }
                }
                PidRoute::Ignore => {}
            }
        }

        if let Some(unit) = audio.finish() {
            on_unit(unit);
        }
        if let Some(unit) = video.finish() {
            video_units += 1;
            on_unit(unit);
        }

        log::trace!("demuxed segment with PIDs {:?}", self.pids);
        Some(video_units)
    }

    /// Convenience wrapper collecting all units of one buffer.
    pub fn demux_all(&mut self, data: &[u8]) -> Option<Vec<PesUnit>> {
        let mut units = Vec::new();
        self.demux(data, |unit| units.push(unit))?;
        Some(units)
    }
}
