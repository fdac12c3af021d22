use super::StreamKind;
use crate::codec::aac::AudioConfig;
use crate::config::{RemuxConfig, INPUT_TIMESCALE};
use crate::format::mp4::{AudioDescription, Mp4Sample, Track};
use bytes::{Bytes, BytesMut};

/// Audio coding carried by a track, selecting the `stsd` sample entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AudioCodec {
    #[default]
    Aac,
    Mp3,
}

/// One decoded access unit waiting to be remuxed.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioSample {
    /// Raw frame payload, ADTS header stripped.
    pub unit: Bytes,
    /// Presentation time on the 90 kHz input clock.
    pub pts: f64,
}

/// Leading bytes of an ADTS frame cut off by the end of a PES buffer.
#[derive(Debug, Clone)]
pub(crate) struct PartialFrame {
    /// Bytes from the sync word onwards.
    pub head: BytesMut,
    pub pts: f64,
}

/// Output track state carried across segments.
///
/// Configuration fields are filled in from the first ADTS header seen. The
/// pending sample list is drained by every remux call and replaced by the
/// fragment sample table that the next `moof` describes.
#[derive(Debug, Clone)]
pub struct AudioTrack {
    pub id: u32,
    pub input_timescale: u32,
    pub codec: AudioCodec,
    pub config: Option<AudioConfig>,
    /// Expected presentation length in seconds, 0 when unknown.
    pub duration: f64,
    /// Sequence number of the next fragment.
    pub sequence_number: u32,
    pub samples: Vec<AudioSample>,
    /// Sample table of the last remuxed fragment.
    pub fragment_samples: Vec<Mp4Sample>,
    /// Input-clock time at which the next fragment starts, once a first
    /// fragment has established the output timeline.
    pub next_audio_pts: Option<f64>,
    pub(crate) partial: Option<PartialFrame>,
}

impl AudioTrack {
    pub fn new(id: u32, initial_sequence_number: u32) -> Self {
        Self {
            id,
            input_timescale: INPUT_TIMESCALE,
            codec: AudioCodec::Aac,
            config: None,
            duration: 0.0,
            sequence_number: initial_sequence_number,
            samples: Vec::new(),
            fragment_samples: Vec::new(),
            next_audio_pts: None,
            partial: None,
        }
    }

    pub fn from_config(config: &RemuxConfig) -> Self {
        Self::new(config.track_id, config.initial_sequence_number)
    }

    pub fn with_codec(mut self, codec: AudioCodec) -> Self {
        self.codec = codec;
        self
    }

    pub fn with_duration(mut self, seconds: f64) -> Self {
        self.duration = seconds;
        self
    }

    pub fn is_configured(&self) -> bool {
        self.config.is_some()
    }

    pub fn sample_rate(&self) -> Option<u32> {
        self.config.as_ref().map(|c| c.sample_rate)
    }

    pub fn channel_count(&self) -> Option<u8> {
        self.config.as_ref().map(|c| c.channel_count)
    }

    /// RFC 6381 codec parameter, available once configured.
    pub fn codec_string(&self) -> Option<&str> {
        match self.codec {
            AudioCodec::Mp3 => Some("mp3"),
            AudioCodec::Aac => self.config.as_ref().map(|c| c.codec.as_str()),
        }
    }

    /// Media timescale: the sample rate, or the input clock when unknown.
    pub fn timescale(&self) -> u32 {
        self.sample_rate().unwrap_or(self.input_timescale)
    }

    /// Whether an incomplete ADTS frame is waiting for the next buffer.
    pub fn has_partial_frame(&self) -> bool {
        self.partial.is_some()
    }
}

impl Track for AudioTrack {
    fn id(&self) -> u32 {
        self.id
    }

    fn kind(&self) -> StreamKind {
        StreamKind::Audio
    }

    fn timescale(&self) -> u32 {
        AudioTrack::timescale(self)
    }

    fn duration(&self) -> f64 {
        self.duration
    }

    fn fragment_samples(&self) -> &[Mp4Sample] {
        &self.fragment_samples
    }

    /// MP3 tracks take rate and channel count from `config` as well; its
    /// AudioSpecificConfig bytes are not written.
    fn audio_description(&self) -> Option<AudioDescription<'_>> {
        self.config.as_ref().map(|config| AudioDescription {
            codec: self.codec,
            sample_rate: config.sample_rate,
            channel_count: config.channel_count,
            specific_config: &config.specific_config,
        })
    }
}
