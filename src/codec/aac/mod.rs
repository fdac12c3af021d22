//! AAC in ADTS framing: header model, AudioSpecificConfig derivation and
//! the frame decoder feeding [`crate::av::AudioTrack`].

pub mod parser;
pub mod types;

pub use parser::{full_frame_length, header_length, is_header, ADTSParser};
pub use types::{
    ADTSHeader, AudioConfig, ProfileType, AOT_AAC_LC, AOT_SBR, SAMPLES_PER_FRAME, SAMPLE_RATES,
};
