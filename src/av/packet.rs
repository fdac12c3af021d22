use super::StreamKind;
use bytes::Bytes;

/// One reassembled PES packet with its header stripped.
///
/// Timestamps are raw 33-bit values on the 90 kHz MPEG clock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PesUnit {
    pub kind: StreamKind,
    pub pts: Option<u64>,
    pub dts: Option<u64>,
    pub data: Bytes,
}

impl PesUnit {
    pub fn is_audio(&self) -> bool {
        self.kind == StreamKind::Audio
    }
}
