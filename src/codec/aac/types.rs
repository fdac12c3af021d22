use crate::error::{RemuxError, Result};
use crate::utils::BitWriter;

/// Sampling frequencies indexed by the 4-bit sampling_frequency_index.
pub const SAMPLE_RATES: [u32; 13] = [
    96000, 88200, 64000, 48000, 44100, 32000, 24000, 22050, 16000, 12000, 11025, 8000, 7350,
];

/// PCM samples carried by one AAC frame.
pub const SAMPLES_PER_FRAME: u32 = 1024;

pub const AOT_AAC_LC: u8 = 2;
pub const AOT_SBR: u8 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileType {
    Main = 0,
    LC = 1,
    SSR = 2,
    LTP = 3,
}

impl From<u8> for ProfileType {
    fn from(value: u8) -> Self {
        match value & 0x03 {
            0 => ProfileType::Main,
            1 => ProfileType::LC,
            2 => ProfileType::SSR,
            _ => ProfileType::LTP,
        }
    }
}

impl ProfileType {
    /// MPEG-4 audio object type signalled by this ADTS profile.
    pub fn object_type(self) -> u8 {
        self as u8 + 1
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ADTSHeader {
    pub id: u8,                     // 1 bit, 0=MPEG-4, 1=MPEG-2
    pub protection_absent: bool,    // 1 bit
    pub profile: ProfileType,       // 2 bits
    pub sample_rate_index: u8,      // 4 bits
    pub channel_configuration: u8,  // 3 bits
    pub frame_length: u16,          // 13 bits, header included
    pub buffer_fullness: u16,       // 11 bits
    pub number_of_raw_blocks: u8,   // 2 bits
}

impl ADTSHeader {
    pub fn new(profile: ProfileType, sample_rate_index: u8, channel_configuration: u8) -> Self {
        Self {
            id: 0,
            protection_absent: true,
            profile,
            sample_rate_index,
            channel_configuration,
            frame_length: 7,
            buffer_fullness: 0x7FF,
            number_of_raw_blocks: 0,
        }
    }

    pub fn with_payload_len(mut self, payload_len: usize) -> Self {
        // Saturate so `to_bytes` rejects oversized frames
        self.frame_length = u16::try_from(self.header_length() + payload_len).unwrap_or(u16::MAX);
        self
    }

    pub fn header_length(&self) -> usize {
        if self.protection_absent {
            7
        } else {
            9
        }
    }

    pub fn sample_rate(&self) -> Option<u32> {
        SAMPLE_RATES.get(self.sample_rate_index as usize).copied()
    }

    /// Encodes the header. With CRC protection a zero CRC word is written.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        if self.frame_length >= 1 << 13 {
            return Err(RemuxError::Codec("ADTS frame length exceeds 13 bits".into()));
        }

        let mut writer = BitWriter::new();
        writer.write_bits(0xFFF, 12)?;
        writer.write_bits(self.id as u32, 1)?;
        writer.write_bits(0, 2)?; // layer
        writer.write_bit(self.protection_absent);
        writer.write_bits(self.profile as u32, 2)?;
        writer.write_bits(self.sample_rate_index as u32, 4)?;
        writer.write_bit(false); // private bit
        writer.write_bits(self.channel_configuration as u32, 3)?;
        writer.write_bits(0, 4)?; // original/copy, home, copyright bits
        writer.write_bits(self.frame_length as u32, 13)?;
        writer.write_bits(self.buffer_fullness as u32, 11)?;
        writer.write_bits(self.number_of_raw_blocks as u32, 2)?;
        if !self.protection_absent {
            writer.write_bits(0, 16)?;
        }
        Ok(writer.into_bytes())
    }
}

/// Decoder configuration derived from the first ADTS header of a track.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioConfig {
    /// Object type written into the AudioSpecificConfig (2 or 5).
    pub object_type: u8,
    pub sample_rate_index: u8,
    pub sample_rate: u32,
    pub channel_count: u8,
    /// RFC 6381 codec parameter, e.g. `mp4a.40.2`.
    pub codec: String,
    /// AudioSpecificConfig bytes carried in `esds`.
    pub specific_config: Vec<u8>,
}

impl AudioConfig {
    /// Builds the AudioSpecificConfig.
    ///
    /// Object type 5 uses explicit SBR signalling: the extension sampling
    /// index follows the channel configuration, then AAC-LC as the core
    /// object type.
    pub fn new(object_type: u8, sample_rate_index: u8, channel_count: u8, extension_index: u8) -> Result<Self> {
        let sample_rate = *SAMPLE_RATES
            .get(sample_rate_index as usize)
            .ok_or_else(|| RemuxError::Codec(format!("reserved sampling index {}", sample_rate_index)))?;

        let mut writer = BitWriter::new();
        writer.write_bits(object_type as u32, 5)?;
        writer.write_bits(sample_rate_index as u32, 4)?;
        writer.write_bits(channel_count as u32, 4)?;
        if object_type == AOT_SBR {
            writer.write_bits(extension_index as u32, 4)?;
            writer.write_bits(AOT_AAC_LC as u32, 5)?;
            // Pad to four bytes
            writer.write_bits(0, 10)?;
        } else {
            writer.write_bits(0, 3)?;
        }

        Ok(Self {
            object_type,
            sample_rate_index,
            sample_rate,
            channel_count,
            codec: format!("mp4a.40.{}", object_type),
            specific_config: writer.into_bytes(),
        })
    }

    /// Duration of one AAC frame on the 90 kHz clock.
    pub fn frame_duration(&self) -> f64 {
        SAMPLES_PER_FRAME as f64 * 90_000.0 / self.sample_rate as f64
    }
}
