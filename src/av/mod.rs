//! Media units shared between the demultiplexer, the codec layer and the
//! remuxer.

/// Elementary stream category carried by a PES unit or an output track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamKind {
    Audio,
    Video,
}

impl std::fmt::Display for StreamKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StreamKind::Audio => f.write_str("audio"),
            StreamKind::Video => f.write_str("video"),
        }
    }
}

mod packet;
mod track;
pub use packet::*;
pub use track::{AudioCodec, AudioSample, AudioTrack};
pub(crate) use track::PartialFrame;
