use crate::error::Result;
use bytes::{BufMut, Bytes, BytesMut};

/// Fixed part of a PES header up to and including PES_header_data_length.
pub const PES_FIXED_HEADER_SIZE: usize = 9;
const PES_START_CODE: u32 = 0x000001;

/// Result of decoding one reassembled PES packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedPes {
    /// Presentation Time Stamp (33 bits)
    pub pts: Option<u64>,
    /// Decoding Time Stamp (33 bits)
    pub dts: Option<u64>,
    /// Elementary stream bytes following the PES header
    pub payload: Bytes,
}

/// Decodes a PES packet from the transport payload fragments that carried it.
///
/// The first fragment holds the PES header; later fragments are pure
/// payload and are appended in order. Returns `None` for a unit without the
/// `00 00 01` start code or whose header runs past the first fragment.
pub fn parse_pes(fragments: &[&[u8]]) -> Option<ParsedPes> {
    let first = fragments.first()?;
    if first.len() < PES_FIXED_HEADER_SIZE {
        return None;
    }

    let prefix = (first[0] as u32) << 16 | (first[1] as u32) << 8 | first[2] as u32;
    if prefix != PES_START_CODE {
        return None;
    }

    let flags = first[7];
    let pts = if flags & 0x80 != 0 {
        Some(read_timestamp(first.get(9..14)?))
    } else {
        None
    };
    let dts = if flags & 0x40 != 0 {
        Some(read_timestamp(first.get(14..19)?))
    } else {
        None
    };

    let header_data_length = first[8] as usize;
    let head = first.get(PES_FIXED_HEADER_SIZE + header_data_length..)?;

    let total = head.len() + fragments[1..].iter().map(|f| f.len()).sum::<usize>();
    let mut payload = BytesMut::with_capacity(total);
    payload.extend_from_slice(head);
    for fragment in &fragments[1..] {
        payload.extend_from_slice(fragment);
    }

    Some(ParsedPes {
        pts,
        dts,
        payload: payload.freeze(),
    })
}

/// Reads a 33-bit timestamp from its 5-byte marker-bit layout.
fn read_timestamp(data: &[u8]) -> u64 {
    ((data[0] as u64 & 0x0E) << 29)
        | ((data[1] as u64) << 22)
        | ((data[2] as u64 & 0xFE) << 14)
        | ((data[3] as u64) << 7)
        | ((data[4] as u64 & 0xFE) >> 1)
}

/// Packetized Elementary Stream (PES) header as written by the packetizer.
#[derive(Debug, Clone, Default)]
pub struct PESHeader {
    /// Stream identifier indicating content type (video/audio/etc.)
    pub stream_id: u8,
    /// Presentation Time Stamp (33 bits)
    pub pts: Option<u64>,
    /// Decoding Time Stamp (33 bits)
    pub dts: Option<u64>,
}

impl PESHeader {
    pub fn new(stream_id: u8) -> Self {
        Self {
            stream_id,
            ..Default::default()
        }
    }

    pub fn with_pts(mut self, pts: u64) -> Self {
        self.pts = Some(pts);
        self
    }

    /// A DTS is only written alongside a PTS.
    pub fn with_dts(mut self, dts: u64) -> Self {
        self.dts = Some(dts);
        self
    }

    pub fn header_data_length(&self) -> usize {
        match (self.pts, self.dts) {
            (Some(_), Some(_)) => 10,
            (Some(_), None) => 5,
            _ => 0,
        }
    }

    pub fn encoded_len(&self) -> usize {
        PES_FIXED_HEADER_SIZE + self.header_data_length()
    }

    /// Writes the header for a packet carrying `payload_len` bytes.
    ///
    /// PES_packet_length is left at zero when it would not fit 16 bits.
    pub fn write_to(&self, buf: &mut BytesMut, payload_len: usize) -> Result<()> {
        buf.put_u8(0x00);
        buf.put_u8(0x00);
        buf.put_u8(0x01);
        buf.put_u8(self.stream_id);

        let packet_length = 3 + self.header_data_length() + payload_len;
        buf.put_u16(u16::try_from(packet_length).unwrap_or(0));

        // '10' marker, no scrambling, no priority/alignment/copyright
        buf.put_u8(0x80);

        let pts_dts_flags = match (self.pts, self.dts) {
            (Some(_), Some(_)) => 0xC0,
            (Some(_), None) => 0x80,
            _ => 0x00,
        };
        buf.put_u8(pts_dts_flags);
        buf.put_u8(self.header_data_length() as u8);

        if let Some(pts) = self.pts {
            let marker = if self.dts.is_some() { 0x30 } else { 0x20 };
            write_timestamp(buf, marker, pts);
            if let Some(dts) = self.dts {
                write_timestamp(buf, 0x10, dts);
            }
        }

        Ok(())
    }
}

fn write_timestamp(buf: &mut BytesMut, marker: u8, ts: u64) {
    let ts = ts & 0x1FFFFFFFF;

    // Marker bits and 3 MSB
    buf.put_u8(marker | ((ts >> 29) & 0x0E) as u8 | 0x01);
    // Middle 15 bits and marker
    buf.put_u16((((ts >> 14) & 0xFFFE) | 0x01) as u16);
    // Final 15 bits and marker
    buf.put_u16((((ts << 1) & 0xFFFE) | 0x01) as u16);
}
