use super::types::{ADTSHeader, AudioConfig, ProfileType, AOT_AAC_LC, AOT_SBR};
use crate::av::{AudioSample, AudioTrack, PartialFrame};
use crate::config::{AacCompatibility, RemuxConfig};
use crate::error::{RemuxError, Result};
use crate::utils::BitReader;
use bytes::{Bytes, BytesMut};

/// Bytes needed before the 13-bit frame length can be read.
const LENGTH_PREFIX: usize = 6;

/// Bytes `parse_header` needs to derive a configuration.
const MIN_HEADER_LENGTH: usize = 7;

/// Whether an ADTS sync word starts at `offset`.
pub fn is_header(data: &[u8], offset: usize) -> bool {
    offset + 1 < data.len() && data[offset] == 0xFF && (data[offset + 1] & 0xF6) == 0xF0
}

/// 7 bytes without CRC, 9 with.
pub fn header_length(data: &[u8], offset: usize) -> usize {
    if data[offset + 1] & 0x01 != 0 {
        7
    } else {
        9
    }
}

/// Frame length including the header. Needs six bytes from `offset`.
pub fn full_frame_length(data: &[u8], offset: usize) -> usize {
    ((data[offset + 3] as usize & 0x03) << 11)
        | ((data[offset + 4] as usize) << 3)
        | ((data[offset + 5] as usize & 0xE0) >> 5)
}

/// Whether a frame may end at `offset`: end of buffer, or the next sync word
/// (possibly cut after its first byte).
fn frame_ends_at(data: &[u8], offset: usize) -> bool {
    offset >= data.len() || (data[offset] == 0xFF && (offset + 1 == data.len() || is_header(data, offset)))
}

/// Splits ADTS elementary stream buffers into raw AAC frames.
#[derive(Debug, Clone, Copy)]
pub struct ADTSParser {
    compat: AacCompatibility,
    carry_partial_frames: bool,
}

impl Default for ADTSParser {
    fn default() -> Self {
        Self::from_config(&RemuxConfig::default())
    }
}

impl ADTSParser {
    pub fn new(compat: AacCompatibility, carry_partial_frames: bool) -> Self {
        Self {
            compat,
            carry_partial_frames,
        }
    }

    pub fn from_config(config: &RemuxConfig) -> Self {
        Self::new(config.aac, config.carry_partial_frames)
    }

    pub fn parse_header(&self, data: &[u8]) -> Result<ADTSHeader> {
        if data.len() < 7 {
            return Err(RemuxError::Parser("ADTS header too short".into()));
        }

        let mut reader = BitReader::new(data);

        let sync_word = reader.read_bits(12)?;
        if sync_word != 0xFFF {
            return Err(RemuxError::Parser("Invalid ADTS sync word".into()));
        }

        let id = reader.read_bits(1)? as u8;
        reader.skip_bits(2)?; // layer
        let protection_absent = reader.read_bit()?;
        let profile = ProfileType::from(reader.read_bits(2)? as u8);
        let sample_rate_index = reader.read_bits(4)? as u8;
        reader.skip_bits(1)?; // private bit
        let channel_configuration = reader.read_bits(3)? as u8;
        reader.skip_bits(4)?; // original/copy, home, copyright bits
        let frame_length = reader.read_bits(13)? as u16;
        let buffer_fullness = reader.read_bits(11)? as u16;
        let number_of_raw_blocks = reader.read_bits(2)? as u8;

        Ok(ADTSHeader {
            id,
            protection_absent,
            profile,
            sample_rate_index,
            channel_configuration,
            frame_length,
            buffer_fullness,
            number_of_raw_blocks,
        })
    }

    /// Derives the track configuration from the header at `offset`.
    ///
    /// Unless plain AAC is preferred, the extended HE-AAC config (object
    /// type 5) is written, signalling an extension rate three indices up
    /// for sampling rates of 24 kHz and below. Mono streams at higher rates
    /// stay on the plain config.
    pub fn derive_config(&self, data: &[u8], offset: usize) -> Option<AudioConfig> {
        let header = match self.parse_header(data.get(offset..)?) {
            Ok(header) => header,
            Err(e) => {
                log::debug!("cannot derive AAC config: {}", e);
                return None;
            }
        };
        let index = header.sample_rate_index;
        let channels = header.channel_configuration;

        let (object_type, extension_index) = if self.compat.prefer_plain_aac {
            (AOT_AAC_LC, index)
        } else if index >= 6 {
            (AOT_SBR, index - 3)
        } else if channels == 1 {
            (AOT_AAC_LC, index)
        } else {
            (AOT_SBR, index)
        };

        match AudioConfig::new(object_type, index, channels, extension_index) {
            Ok(config) => {
                log::debug!(
                    "ADTS profile {:?} (object type {}), {} Hz, {} channel(s) -> {}",
                    header.profile,
                    header.profile.object_type(),
                    config.sample_rate,
                    channels,
                    config.codec
                );
                Some(config)
            }
            Err(e) => {
                log::debug!("cannot derive AAC config: {}", e);
                None
            }
        }
    }

    /// Appends every complete ADTS frame of `data` to the track's pending
    /// samples.
    ///
    /// Frame `i` of the buffer is stamped `pts + i * frame_duration`. A
    /// frame cut by the end of the buffer is held on the track and finished
    /// from the head of the next buffer when carrying is enabled, otherwise
    /// it is dropped.
    pub fn append_sample(&self, track: &mut AudioTrack, data: &Bytes, pts: u64) {
        let mut offset = self.complete_partial(track, data);
        let len = data.len();

        while offset < len && !is_header(data, offset) {
            offset += 1;
        }
        if offset >= len {
            return;
        }

        if track.config.is_none() {
            match self.derive_config(data, offset) {
                Some(config) => track.config = Some(config),
                None => {
                    // Header cut by the end of the buffer: configure once completed
                    if len - offset < MIN_HEADER_LENGTH {
                        self.hold_partial(track, &data[offset..], pts as f64);
                    }
                    return;
                }
            }
        }
        let frame_duration = match track.config.as_ref() {
            Some(config) => config.frame_duration(),
            None => return,
        };

        let mut frame_index = 0u32;
        while offset < len {
            if !is_header(data, offset) {
                offset += 1;
                continue;
            }

            let stamp = pts as f64 + frame_index as f64 * frame_duration;
            if offset + LENGTH_PREFIX > len {
                self.hold_partial(track, &data[offset..], stamp);
                break;
            }

            let header_length = header_length(data, offset);
            let frame_length = full_frame_length(data, offset);
            if frame_length <= header_length {
                break;
            }

            if offset + frame_length > len {
                self.hold_partial(track, &data[offset..], stamp);
                break;
            }

            track.samples.push(AudioSample {
                unit: data.slice(offset + header_length..offset + frame_length),
                pts: stamp,
            });
            offset += frame_length;
            frame_index += 1;
        }

        log::trace!("{} ADTS frame(s) from {} byte buffer", frame_index, len);
    }

    fn hold_partial(&self, track: &mut AudioTrack, head: &[u8], pts: f64) {
        if self.carry_partial_frames {
            track.partial = Some(PartialFrame {
                head: BytesMut::from(head),
                pts,
            });
        } else {
            log::warn!("dropping ADTS frame split at end of buffer ({} bytes)", head.len());
        }
    }

    /// Finishes a frame held from the previous buffer. Returns the number of
    /// bytes of `data` consumed.
    ///
    /// The held frame is discarded, and nothing consumed, when `data` does
    /// not continue it: it opens with a sync word, or the completed frame is
    /// not followed by one.
    fn complete_partial(&self, track: &mut AudioTrack, data: &Bytes) -> usize {
        let mut partial = match track.partial.take() {
            Some(partial) => partial,
            None => return 0,
        };

        if is_header(data, 0) {
            log::warn!(
                "dropping held ADTS frame ({} bytes): next buffer starts a new frame",
                partial.head.len()
            );
            return 0;
        }

        let mut consumed = 0;
        if partial.head.len() < LENGTH_PREFIX {
            consumed = (LENGTH_PREFIX - partial.head.len()).min(data.len());
            partial.head.extend_from_slice(&data[..consumed]);
            if partial.head.len() < LENGTH_PREFIX {
                track.partial = Some(partial);
                return consumed;
            }
        }

        let header_length = header_length(&partial.head, 0);
        let frame_length = full_frame_length(&partial.head, 0);
        if frame_length <= header_length {
            log::debug!("discarding held ADTS frame with length {}", frame_length);
            return consumed;
        }

        let take = frame_length
            .saturating_sub(partial.head.len())
            .min(data.len() - consumed);
        partial.head.extend_from_slice(&data[consumed..consumed + take]);
        consumed += take;

        if partial.head.len() < frame_length {
            track.partial = Some(partial);
            return consumed;
        }

        if !frame_ends_at(data, consumed) {
            log::warn!(
                "dropping held ADTS frame ({} bytes): next buffer does not continue it",
                frame_length
            );
            return 0;
        }

        let frame = partial.head.freeze();
        if track.config.is_none() {
            match self.derive_config(&frame, 0) {
                Some(config) => track.config = Some(config),
                None => return consumed,
            }
        }
        track.samples.push(AudioSample {
            unit: frame.slice(header_length..frame_length),
            pts: partial.pts,
        });
        consumed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use quickcheck_macros::quickcheck;

    fn frame(sample_rate_index: u8, channels: u8, payload: &[u8]) -> Vec<u8> {
        let mut out = ADTSHeader::new(ProfileType::LC, sample_rate_index, channels)
            .with_payload_len(payload.len())
            .to_bytes()
            .unwrap();
        out.extend_from_slice(payload);
        out
    }

    fn stream(frames: usize, payload_len: usize) -> Vec<u8> {
        (0..frames)
            .flat_map(|i| frame(4, 2, &vec![i as u8; payload_len]))
            .collect()
    }

    #[test]
    fn test_parse_adts_header() {
        let data = frame(4, 2, &[0u8; 1024]);
        let header = ADTSParser::default().parse_header(&data).unwrap();

        assert_eq!(header.profile, ProfileType::LC);
        assert_eq!(header.sample_rate_index, 4);
        assert_eq!(header.channel_configuration, 2);
        assert_eq!(header.frame_length, 1031);
        assert!(header.protection_absent);
        assert_eq!(header.profile.object_type(), AOT_AAC_LC);
    }

    #[test]
    fn test_invalid_sync_word() {
        let data = vec![0x00, 0x00, 0x50, 0x80, 0x43, 0x80, 0x00];
        assert!(ADTSParser::default().parse_header(&data).is_err());
        assert!(!is_header(&data, 0));
    }

    #[test]
    fn test_header_detection() {
        assert!(is_header(&[0xFF, 0xF1], 0));
        assert!(is_header(&[0xFF, 0xF9], 0));
        assert!(!is_header(&[0xFF], 0));
        assert!(!is_header(&[0xFF, 0xE1], 0));
        assert_eq!(header_length(&[0xFF, 0xF1], 0), 7);
        assert_eq!(header_length(&[0xFF, 0xF0], 0), 9);
    }

    #[test]
    fn test_config_selection() {
        let extended = ADTSParser::default();
        let plain = ADTSParser::new(AacCompatibility { prefer_plain_aac: true }, true);

        // 22.05 kHz stereo: extended signals 44.1 kHz
        let low_rate = frame(7, 2, &[0; 4]);
        let config = extended.derive_config(&low_rate, 0).unwrap();
        assert_eq!(config.object_type, AOT_SBR);
        assert_eq!(config.specific_config, vec![0x2B, 0x92, 0x08, 0x00]);
        assert_eq!(plain.derive_config(&low_rate, 0).unwrap().codec, "mp4a.40.2");

        // 44.1 kHz mono stays plain
        let mono = frame(4, 1, &[0; 4]);
        let config = extended.derive_config(&mono, 0).unwrap();
        assert_eq!(config.object_type, AOT_AAC_LC);
        assert_eq!(config.specific_config.len(), 2);

        // 44.1 kHz stereo keeps its own index as extension rate
        let stereo = frame(4, 2, &[0; 4]);
        let config = extended.derive_config(&stereo, 0).unwrap();
        assert_eq!(config.codec, "mp4a.40.5");
        assert_eq!(config.sample_rate, 44100);
    }

    #[test]
    fn test_frames_are_stamped_from_pes_pts() {
        let data = Bytes::from(stream(3, 100));
        let mut track = AudioTrack::new(1, 1);
        ADTSParser::default().append_sample(&mut track, &data, 9000);

        assert_eq!(track.samples.len(), 3);
        let step = 1024.0 * 90_000.0 / 44100.0;
        for (i, sample) in track.samples.iter().enumerate() {
            assert_eq!(sample.unit.len(), 100);
            assert_eq!(sample.unit[0], i as u8);
            assert!((sample.pts - (9000.0 + i as f64 * step)).abs() < 1e-6);
        }
    }

    #[test]
    fn test_leading_garbage_is_skipped() {
        let mut data = vec![0x00, 0x12, 0xFF, 0x00];
        data.extend(stream(2, 50));
        let mut track = AudioTrack::new(1, 1);
        ADTSParser::default().append_sample(&mut track, &Bytes::from(data), 0);
        assert_eq!(track.samples.len(), 2);
        assert!(track.is_configured());
    }

    #[test]
    fn test_split_frame_is_carried() {
        let data = stream(3, 100);
        let cut = 107 * 2 + 40;
        let first = Bytes::copy_from_slice(&data[..cut]);
        let mut second = data[cut..].to_vec();
        second.extend(frame(4, 2, &[0xAA; 20]));

        let parser = ADTSParser::default();
        let mut track = AudioTrack::new(1, 1);
        parser.append_sample(&mut track, &first, 0);
        assert_eq!(track.samples.len(), 2);
        assert!(track.has_partial_frame());

        parser.append_sample(&mut track, &Bytes::from(second), 50_000);
        assert!(!track.has_partial_frame());
        assert_eq!(track.samples.len(), 4);

        let step = 1024.0 * 90_000.0 / 44100.0;
        assert_eq!(&track.samples[2].unit[..], &[2u8; 100][..]);
        assert!((track.samples[2].pts - 2.0 * step).abs() < 1e-6);
        assert_eq!(&track.samples[3].unit[..], &[0xAA; 20][..]);
        assert_eq!(track.samples[3].pts, 50_000.0);
    }

    #[test]
    fn test_split_inside_header_is_carried() {
        let data = stream(2, 30);
        let cut = 37 + 3;
        let parser = ADTSParser::default();
        let mut track = AudioTrack::new(1, 1);

        parser.append_sample(&mut track, &Bytes::copy_from_slice(&data[..cut]), 0);
        assert_eq!(track.samples.len(), 1);
        assert!(track.has_partial_frame());

        parser.append_sample(&mut track, &Bytes::copy_from_slice(&data[cut..]), 90_000);
        assert_eq!(track.samples.len(), 2);
        assert_eq!(&track.samples[1].unit[..], &[1u8; 30][..]);
    }

    #[test]
    fn test_held_frame_dropped_before_fresh_buffer() {
        let mut first = frame(4, 2, &[0x11; 100]);
        first.extend_from_slice(&frame(4, 2, &[0x22; 100])[..40]);
        let second: Vec<u8> = [0x33u8, 0x44, 0x55]
            .iter()
            .flat_map(|b| frame(4, 2, &[*b; 100]))
            .collect();

        let parser = ADTSParser::default();
        let mut track = AudioTrack::new(1, 1);
        parser.append_sample(&mut track, &Bytes::from(first), 0);
        assert!(track.has_partial_frame());

        parser.append_sample(&mut track, &Bytes::from(second), 90_000);
        assert!(!track.has_partial_frame());

        let firsts: Vec<u8> = track.samples.iter().map(|s| s.unit[0]).collect();
        assert_eq!(firsts, vec![0x11, 0x33, 0x44, 0x55]);
        assert!(track.samples.iter().all(|s| s.unit.iter().all(|b| *b == s.unit[0])));
        assert_eq!(track.samples[1].pts, 90_000.0);
    }

    #[test]
    fn test_held_frame_dropped_when_not_continued() {
        let mut first = frame(4, 2, &[0x11; 100]);
        first.extend_from_slice(&frame(4, 2, &[0x22; 100])[..40]);
        let mut second = vec![0x01u8; 30];
        second.extend(frame(4, 2, &[0x33; 100]));

        let parser = ADTSParser::default();
        let mut track = AudioTrack::new(1, 1);
        parser.append_sample(&mut track, &Bytes::from(first), 0);
        parser.append_sample(&mut track, &Bytes::from(second), 90_000);

        let firsts: Vec<u8> = track.samples.iter().map(|s| s.unit[0]).collect();
        assert_eq!(firsts, vec![0x11, 0x33]);
        assert_eq!(track.samples[1].pts, 90_000.0);
        assert!(!track.has_partial_frame());
    }

    #[test]
    fn test_first_header_split_configures_on_completion() {
        let mut data = frame(4, 2, &[0x11; 50]);
        data.extend(frame(4, 2, &[0x22; 50]));
        let parser = ADTSParser::default();
        let mut track = AudioTrack::new(1, 1);

        parser.append_sample(&mut track, &Bytes::copy_from_slice(&data[..6]), 0);
        assert!(!track.is_configured());
        assert!(track.has_partial_frame());

        parser.append_sample(&mut track, &Bytes::copy_from_slice(&data[6..]), 9000);
        assert!(track.is_configured());
        assert!(!track.has_partial_frame());
        let stamped: Vec<(u8, f64)> = track.samples.iter().map(|s| (s.unit[0], s.pts)).collect();
        assert_eq!(stamped, vec![(0x11, 0.0), (0x22, 9000.0)]);
    }

    #[test]
    fn test_split_frame_is_dropped_without_carry() {
        let data = stream(3, 100);
        let cut = 107 * 2 + 40;
        let parser = ADTSParser::new(AacCompatibility::default(), false);
        let mut track = AudioTrack::new(1, 1);

        parser.append_sample(&mut track, &Bytes::copy_from_slice(&data[..cut]), 0);
        parser.append_sample(&mut track, &Bytes::copy_from_slice(&data[cut..]), 9000);
        assert_eq!(track.samples.len(), 2);
        assert!(!track.has_partial_frame());
    }

    #[test]
    fn test_zero_payload_frame_stops_scan() {
        let mut data = frame(4, 2, &[]);
        data.extend(stream(1, 10));
        let mut track = AudioTrack::new(1, 1);
        ADTSParser::default().append_sample(&mut track, &Bytes::from(data), 0);
        assert!(track.samples.is_empty());
    }

    #[quickcheck]
    fn prop_frame_count_and_spacing(frames: u8, payload_len: u16) -> bool {
        let frames = (frames % 32) as usize + 1;
        let payload_len = (payload_len % 512) as usize + 1;
        let data = Bytes::from(stream(frames, payload_len));

        let mut track = AudioTrack::new(1, 1);
        ADTSParser::default().append_sample(&mut track, &data, 1234);

        let step = 1024.0 * 90_000.0 / 44100.0;
        track.samples.len() == frames
            && track
                .samples
                .windows(2)
                .all(|w| w[1].pts > w[0].pts && ((w[1].pts - w[0].pts) - step).abs() < 1e-6)
            && track.samples.iter().all(|s| s.unit.len() == payload_len)
    }
}
