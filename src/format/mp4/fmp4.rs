use super::boxes::{Mp4Box, BOX_HEADER_SIZE};
use super::sample::Mp4Sample;
use crate::av::{AudioCodec, StreamKind};
use crate::error::{RemuxError, Result};
use bytes::{BufMut, Bytes, BytesMut};

/// Duration written when the presentation length is not known.
pub const UNKNOWN_DURATION: u64 = 0xFFFF_FFFF;

/// trun flags: data-offset, sample duration, size, flags and composition
/// offset present.
const TRUN_FLAGS: u32 = 0x0000_0F01;

/// Default sample flags declared in `trex` for fragment mode.
const TREX_DEFAULT_SAMPLE_FLAGS: u32 = 0x0001_0001;

const CREATION_TIME: u64 = 2;
const MODIFICATION_TIME: u64 = 3;

/// Sample description data of an audio track.
#[derive(Debug, Clone, Copy)]
pub struct AudioDescription<'a> {
    pub codec: AudioCodec,
    pub sample_rate: u32,
    pub channel_count: u8,
    /// AudioSpecificConfig carried in `esds`.
    pub specific_config: &'a [u8],
}

/// What the box builders need to know about a track.
pub trait Track {
    fn id(&self) -> u32;
    fn kind(&self) -> StreamKind;
    fn timescale(&self) -> u32;
    /// Presentation length in seconds, 0 when unknown.
    fn duration(&self) -> f64;
    /// Sample table of the fragment being written.
    fn fragment_samples(&self) -> &[Mp4Sample];
    /// `None` until the track's decoder configuration is known.
    fn audio_description(&self) -> Option<AudioDescription<'_>>;
}

/// Splits a 64-bit value into its upper and lower 32-bit words.
pub fn split_words(value: u64) -> (u32, u32) {
    ((value >> 32) as u32, value as u32)
}

fn put_u64_words(buf: &mut BytesMut, value: u64) {
    let (upper, lower) = split_words(value);
    buf.put_u32(upper);
    buf.put_u32(lower);
}

/// `seconds * timescale`, or [`UNKNOWN_DURATION`] for a zero duration.
pub fn scaled_duration(seconds: f64, timescale: u32) -> u64 {
    if seconds > 0.0 {
        (seconds * timescale as f64).floor() as u64
    } else {
        UNKNOWN_DURATION
    }
}

fn full_box_header(buf: &mut BytesMut, version: u8, flags: u32) {
    buf.put_u32(((version as u32) << 24) | (flags & 0x00FF_FFFF));
}

fn put_matrix(buf: &mut BytesMut) {
    for value in [0x0001_0000u32, 0, 0, 0, 0x0001_0000, 0, 0, 0, 0x4000_0000] {
        buf.put_u32(value);
    }
}

pub fn ftyp() -> Mp4Box {
    let mut payload = BytesMut::with_capacity(16);
    payload.put_slice(b"isom");
    payload.put_u32(1);
    payload.put_slice(b"isom");
    payload.put_slice(b"avc1");
    Mp4Box::leaf(b"ftyp", payload.freeze())
}

/// Initialization segment body: movie header, one `trak` per track and
/// `mvex` for fragment mode. Movie timescale and duration come from the
/// first track.
pub fn moov(tracks: &[&dyn Track]) -> Result<Mp4Box> {
    let first = tracks
        .first()
        .ok_or_else(|| RemuxError::InvalidData("moov needs at least one track".into()))?;

    let mut moov = Mp4Box::new(b"moov").with_child(mvhd(first.timescale(), first.duration()));
    for track in tracks {
        moov.push(trak(*track)?);
    }
    moov.push(mvex(tracks));
    Ok(moov)
}

fn mvhd(timescale: u32, duration: f64) -> Mp4Box {
    let mut buf = BytesMut::with_capacity(112);
    full_box_header(&mut buf, 1, 0);
    buf.put_u64(CREATION_TIME);
    buf.put_u64(MODIFICATION_TIME);
    buf.put_u32(timescale);
    put_u64_words(&mut buf, scaled_duration(duration, timescale));
    buf.put_u32(0x0001_0000); // rate 1.0
    buf.put_u16(0x0100); // volume 1.0
    buf.put_bytes(0, 10);
    put_matrix(&mut buf);
    buf.put_bytes(0, 24); // pre_defined
    buf.put_u32(0xFFFF_FFFF); // next_track_ID
    Mp4Box::leaf(b"mvhd", buf.freeze())
}

fn trak(track: &dyn Track) -> Result<Mp4Box> {
    Ok(Mp4Box::container(b"trak", vec![tkhd(track), mdia(track)?]))
}

fn tkhd(track: &dyn Track) -> Mp4Box {
    let mut buf = BytesMut::with_capacity(96);
    full_box_header(&mut buf, 1, 0x07); // enabled, in movie, in preview
    buf.put_u64(CREATION_TIME);
    buf.put_u64(MODIFICATION_TIME);
    buf.put_u32(track.id());
    buf.put_u32(0);
    put_u64_words(&mut buf, scaled_duration(track.duration(), track.timescale()));
    buf.put_bytes(0, 8);
    buf.put_u16(0); // layer
    buf.put_u16(0); // alternate_group
    buf.put_u16(0); // volume
    buf.put_u16(0);
    put_matrix(&mut buf);
    buf.put_u32(0); // width
    buf.put_u32(0); // height
    Mp4Box::leaf(b"tkhd", buf.freeze())
}

fn mdia(track: &dyn Track) -> Result<Mp4Box> {
    Ok(Mp4Box::container(
        b"mdia",
        vec![
            mdhd(track.timescale(), track.duration()),
            hdlr(track.kind()),
            minf(track)?,
        ],
    ))
}

fn mdhd(timescale: u32, duration: f64) -> Mp4Box {
    let mut buf = BytesMut::with_capacity(36);
    full_box_header(&mut buf, 1, 0);
    buf.put_u64(CREATION_TIME);
    buf.put_u64(MODIFICATION_TIME);
    buf.put_u32(timescale);
    put_u64_words(&mut buf, scaled_duration(duration, timescale));
    buf.put_u16(0x55C4); // 'und'
    buf.put_u16(0);
    Mp4Box::leaf(b"mdhd", buf.freeze())
}

fn hdlr(kind: StreamKind) -> Mp4Box {
    let (handler, name): (&[u8; 4], &[u8]) = match kind {
        StreamKind::Audio => (b"soun", b"SoundHandler\0"),
        StreamKind::Video => (b"vide", b"VideoHandler\0"),
    };

    let mut buf = BytesMut::with_capacity(24 + name.len());
    full_box_header(&mut buf, 0, 0);
    buf.put_u32(0); // pre_defined
    buf.put_slice(handler);
    buf.put_bytes(0, 12);
    buf.put_slice(name);
    Mp4Box::leaf(b"hdlr", buf.freeze())
}

fn minf(track: &dyn Track) -> Result<Mp4Box> {
    match track.kind() {
        StreamKind::Audio => Ok(Mp4Box::container(b"minf", vec![smhd(), dinf(), stbl(track)?])),
        StreamKind::Video => Err(unsupported(track)),
    }
}

fn unsupported(track: &dyn Track) -> RemuxError {
    RemuxError::UnsupportedTrack(format!("{} track {}", track.kind(), track.id()))
}

fn smhd() -> Mp4Box {
    Mp4Box::leaf(b"smhd", vec![0u8; 8])
}

fn dinf() -> Mp4Box {
    let mut dref = BytesMut::with_capacity(8);
    full_box_header(&mut dref, 0, 0);
    dref.put_u32(1); // entry_count

    // Self-contained media data
    let url = Mp4Box::leaf(b"url ", vec![0u8, 0, 0, 1]);
    Mp4Box::container(b"dinf", vec![Mp4Box::leaf(b"dref", dref.freeze()).with_child(url)])
}

fn stbl(track: &dyn Track) -> Result<Mp4Box> {
    Ok(Mp4Box::container(
        b"stbl",
        vec![
            stsd(track)?,
            Mp4Box::leaf(b"stts", vec![0u8; 8]),
            Mp4Box::leaf(b"stsc", vec![0u8; 8]),
            Mp4Box::leaf(b"stsz", vec![0u8; 12]),
            Mp4Box::leaf(b"stco", vec![0u8; 8]),
        ],
    ))
}

/// Sample description, dispatched on the track kind and codec.
fn stsd(track: &dyn Track) -> Result<Mp4Box> {
    let entry = match track.kind() {
        StreamKind::Audio => {
            let audio = track.audio_description().ok_or_else(|| {
                RemuxError::Codec(format!("audio track {} has no decoder configuration", track.id()))
            })?;
            match audio.codec {
                AudioCodec::Mp3 => Mp4Box::leaf(b".mp3", audio_sample_entry(&audio)),
                AudioCodec::Aac => {
                    Mp4Box::leaf(b"mp4a", audio_sample_entry(&audio)).with_child(esds(audio.specific_config)?)
                }
            }
        }
        StreamKind::Video => return Err(unsupported(track)),
    };

    let mut header = BytesMut::with_capacity(8);
    full_box_header(&mut header, 0, 0);
    header.put_u32(1); // entry_count
    Ok(Mp4Box::leaf(b"stsd", header.freeze()).with_child(entry))
}

fn audio_sample_entry(audio: &AudioDescription<'_>) -> Bytes {
    let mut buf = BytesMut::with_capacity(28);
    buf.put_bytes(0, 6);
    buf.put_u16(1); // data_reference_index
    buf.put_bytes(0, 8);
    buf.put_u16(audio.channel_count as u16);
    buf.put_u16(16); // sample size
    buf.put_u32(0);
    // Rates above 16 bits are only carried in the decoder config
    buf.put_u16(u16::try_from(audio.sample_rate).unwrap_or(0));
    buf.put_u16(0);
    buf.freeze()
}

/// Elementary stream descriptor wrapping the AudioSpecificConfig.
fn esds(config: &[u8]) -> Result<Mp4Box> {
    let len = u8::try_from(config.len())
        .ok()
        .filter(|len| *len <= 0xFF - 0x17)
        .ok_or_else(|| RemuxError::Codec(format!("decoder config too long: {} bytes", config.len())))?;

    let mut buf = BytesMut::with_capacity(32 + config.len());
    full_box_header(&mut buf, 0, 0);

    // ES_Descriptor
    buf.put_u8(0x03);
    buf.put_u8(0x17 + len);
    buf.put_u16(1); // ES_ID
    buf.put_u8(0); // stream priority

    // DecoderConfigDescriptor
    buf.put_u8(0x04);
    buf.put_u8(0x0F + len);
    buf.put_u8(0x40); // MPEG-4 audio
    buf.put_u8(0x15); // audio stream
    buf.put_bytes(0, 3); // buffer size
    buf.put_u32(0); // max bitrate
    buf.put_u32(0); // avg bitrate

    // DecoderSpecificInfo
    buf.put_u8(0x05);
    buf.put_u8(len);
    buf.put_slice(config);

    // SLConfigDescriptor
    buf.put_slice(&[0x06, 0x01, 0x02]);
    Ok(Mp4Box::leaf(b"esds", buf.freeze()))
}

fn mvex(tracks: &[&dyn Track]) -> Mp4Box {
    Mp4Box::container(b"mvex", tracks.iter().map(|t| trex(t.id())).collect())
}

fn trex(track_id: u32) -> Mp4Box {
    let mut buf = BytesMut::with_capacity(24);
    full_box_header(&mut buf, 0, 0);
    buf.put_u32(track_id);
    buf.put_u32(1); // default_sample_description_index
    buf.put_u32(0); // default_sample_duration
    buf.put_u32(0); // default_sample_size
    buf.put_u32(TREX_DEFAULT_SAMPLE_FLAGS);
    Mp4Box::leaf(b"trex", buf.freeze())
}

/// Fragment header for the track's current sample table.
///
/// The `trun` data offset points past the `mdat` header that must directly
/// follow this box.
pub fn moof(sequence_number: u32, base_media_decode_time: u64, track: &dyn Track) -> Result<Mp4Box> {
    if track.kind() != StreamKind::Audio {
        return Err(unsupported(track));
    }

    let provisional = build_moof(sequence_number, base_media_decode_time, track, 0);
    let data_offset = u32::try_from(provisional.size() + BOX_HEADER_SIZE)
        .map_err(|_| RemuxError::InvalidData("moof exceeds 32-bit offsets".into()))?;
    Ok(build_moof(sequence_number, base_media_decode_time, track, data_offset))
}

fn build_moof(sequence_number: u32, base_media_decode_time: u64, track: &dyn Track, data_offset: u32) -> Mp4Box {
    let samples = track.fragment_samples();

    let mut mfhd = BytesMut::with_capacity(8);
    full_box_header(&mut mfhd, 0, 0);
    mfhd.put_u32(sequence_number);

    let traf = Mp4Box::container(
        b"traf",
        vec![
            tfhd(track.id()),
            tfdt(base_media_decode_time),
            trun(samples, data_offset),
            sdtp(samples),
        ],
    );
    Mp4Box::container(b"moof", vec![Mp4Box::leaf(b"mfhd", mfhd.freeze()), traf])
}

fn tfhd(track_id: u32) -> Mp4Box {
    let mut buf = BytesMut::with_capacity(8);
    full_box_header(&mut buf, 0, 0);
    buf.put_u32(track_id);
    Mp4Box::leaf(b"tfhd", buf.freeze())
}

fn tfdt(base_media_decode_time: u64) -> Mp4Box {
    let mut buf = BytesMut::with_capacity(12);
    full_box_header(&mut buf, 1, 0);
    put_u64_words(&mut buf, base_media_decode_time);
    Mp4Box::leaf(b"tfdt", buf.freeze())
}

fn trun(samples: &[Mp4Sample], data_offset: u32) -> Mp4Box {
    let mut buf = BytesMut::with_capacity(12 + 16 * samples.len());
    full_box_header(&mut buf, 0, TRUN_FLAGS);
    buf.put_u32(samples.len() as u32);
    buf.put_u32(data_offset);
    for sample in samples {
        buf.put_u32(sample.duration);
        buf.put_u32(sample.size);
        buf.put_u32(sample.flags.to_u32());
        buf.put_u32(sample.composition_time_offset);
    }
    Mp4Box::leaf(b"trun", buf.freeze())
}

fn sdtp(samples: &[Mp4Sample]) -> Mp4Box {
    let mut buf = BytesMut::with_capacity(4 + samples.len());
    full_box_header(&mut buf, 0, 0);
    for sample in samples {
        buf.put_u8(sample.flags.dependency_byte());
    }
    Mp4Box::leaf(b"sdtp", buf.freeze())
}

pub fn mdat(data: impl Into<Bytes>) -> Mp4Box {
    Mp4Box::leaf(b"mdat", data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    struct TestTrack {
        kind: StreamKind,
        codec: AudioCodec,
        duration: f64,
        config: Option<Vec<u8>>,
        samples: Vec<Mp4Sample>,
    }

    impl TestTrack {
        fn audio() -> Self {
            Self {
                kind: StreamKind::Audio,
                codec: AudioCodec::Aac,
                duration: 0.0,
                config: Some(vec![0x12, 0x10]),
                samples: vec![Mp4Sample::new(true, 1024, 300, 0), Mp4Sample::new(true, 1024, 280, 0)],
            }
        }
    }

    impl Track for TestTrack {
        fn id(&self) -> u32 {
            2
        }

        fn kind(&self) -> StreamKind {
            self.kind
        }

        fn timescale(&self) -> u32 {
            44100
        }

        fn duration(&self) -> f64 {
            self.duration
        }

        fn fragment_samples(&self) -> &[Mp4Sample] {
            &self.samples
        }

        fn audio_description(&self) -> Option<AudioDescription<'_>> {
            self.config.as_deref().map(|config| AudioDescription {
                codec: self.codec,
                sample_rate: 44100,
                channel_count: 2,
                specific_config: config,
            })
        }
    }

    fn u32_at(data: &[u8], offset: usize) -> u32 {
        u32::from_be_bytes([data[offset], data[offset + 1], data[offset + 2], data[offset + 3]])
    }

    #[test]
    fn test_ftyp_bytes() {
        let bytes = ftyp().to_bytes().unwrap();
        assert_eq!(&bytes[..], b"\x00\x00\x00\x18ftypisom\x00\x00\x00\x01isomavc1");
    }

    #[test]
    fn test_split_words() {
        assert_eq!(split_words(0x1_0000_0002), (1, 2));
        assert_eq!(split_words(UNKNOWN_DURATION), (0, 0xFFFF_FFFF));
        assert_eq!(scaled_duration(0.0, 44100), UNKNOWN_DURATION);
        assert_eq!(scaled_duration(10.0, 44100), 441_000);
    }

    #[test]
    fn test_moov_layout() {
        let track = TestTrack {
            duration: 12.5,
            ..TestTrack::audio()
        };
        let moov = moov(&[&track]).unwrap();
        let kinds: Vec<&[u8; 4]> = moov.children().iter().map(|b| b.kind()).collect();
        assert_eq!(kinds, vec![b"mvhd", b"trak", b"mvex"]);

        let mvhd = moov.find(b"mvhd").unwrap().payload();
        assert_eq!(mvhd.len(), 112);
        assert_eq!(mvhd[0], 1);
        assert_eq!(u32_at(mvhd, 20), 44100);
        assert_eq!(u32_at(mvhd, 28), 551_250);
        assert_eq!(u32_at(mvhd, 108), 0xFFFF_FFFF);

        assert_eq!(moov.find(b"tkhd").unwrap().payload().len(), 96);
        assert_eq!(u32_at(moov.find(b"tkhd").unwrap().payload(), 20), 2);

        let mdhd = moov.find(b"mdhd").unwrap().payload();
        assert_eq!(&mdhd[32..34], &[0x55, 0xC4]);

        let hdlr = moov.find(b"hdlr").unwrap().payload();
        assert_eq!(&hdlr[8..12], b"soun");
        assert_eq!(&hdlr[24..], b"SoundHandler\0");

        let dref = moov.find(b"dref").unwrap().to_bytes().unwrap();
        assert_eq!(
            &dref[8..],
            &[0, 0, 0, 0, 0, 0, 0, 1, 0, 0, 0, 0x0C, b'u', b'r', b'l', b' ', 0, 0, 0, 1]
        );

        let trex = moov.find(b"trex").unwrap().payload();
        assert_eq!(u32_at(trex, 4), 2);
        assert_eq!(u32_at(trex, 20), 0x0001_0001);
    }

    #[test]
    fn test_unknown_duration_marker() {
        let moov = moov(&[&TestTrack::audio()]).unwrap();
        let tkhd = moov.find(b"tkhd").unwrap().payload();
        assert_eq!(u32_at(tkhd, 28), 0);
        assert_eq!(u32_at(tkhd, 32), 0xFFFF_FFFF);
    }

    #[test]
    fn test_esds_carries_config() {
        let moov = moov(&[&TestTrack::audio()]).unwrap();
        let mp4a = moov.find(b"mp4a").unwrap().payload();
        assert_eq!(&mp4a[16..18], &[0, 2]);
        assert_eq!(&mp4a[24..26], &44100u16.to_be_bytes());

        let esds = moov.find(b"esds").unwrap().payload();
        assert_eq!(
            &esds[..],
            &[
                0, 0, 0, 0, 0x03, 0x19, 0x00, 0x01, 0x00, 0x04, 0x11, 0x40, 0x15, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
                0, 0x05, 0x02, 0x12, 0x10, 0x06, 0x01, 0x02
            ][..]
        );
    }

    #[test]
    fn test_mp3_sample_entry() {
        let track = TestTrack {
            codec: AudioCodec::Mp3,
            ..TestTrack::audio()
        };
        let moov = moov(&[&track]).unwrap();
        let entry = moov.find(b".mp3").unwrap();
        assert!(entry.children().is_empty());
        assert!(moov.find(b"esds").is_none());
    }

    #[test]
    fn test_unconfigured_audio_is_rejected() {
        let track = TestTrack {
            config: None,
            ..TestTrack::audio()
        };
        assert!(matches!(moov(&[&track]), Err(RemuxError::Codec(_))));
        assert!(moov(&[]).is_err());
    }

    #[test]
    fn test_video_track_is_unsupported() {
        let track = TestTrack {
            kind: StreamKind::Video,
            ..TestTrack::audio()
        };
        assert!(matches!(moov(&[&track]), Err(RemuxError::UnsupportedTrack(_))));
        assert!(matches!(moof(1, 0, &track), Err(RemuxError::UnsupportedTrack(_))));
    }

    #[test]
    fn test_moof_data_offset_points_into_mdat() {
        let track = TestTrack::audio();
        let moof = moof(7, 0x1_0000_0400, &track).unwrap();
        let bytes = moof.to_bytes().unwrap();

        // mfhd 16 + traf(8 + tfhd 16 + tfdt 20 + trun 8+12+32 + sdtp 8+4+2)
        assert_eq!(bytes.len(), 8 + 16 + 8 + 16 + 20 + 52 + 14);
        assert_eq!(u32_at(&bytes, 20), 7);

        let tfdt = moof.find(b"tfdt").unwrap().payload();
        assert_eq!(&tfdt[..], &[1, 0, 0, 0, 0, 0, 0, 1, 0, 0, 0x04, 0]);

        let trun = moof.find(b"trun").unwrap().payload();
        assert_eq!(u32_at(trun, 0), TRUN_FLAGS);
        assert_eq!(u32_at(trun, 4), 2);
        assert_eq!(u32_at(trun, 8) as usize, bytes.len() + 8);
        assert_eq!(u32_at(trun, 12), 1024);
        assert_eq!(u32_at(trun, 16), 300);
        assert_eq!(u32_at(trun, 20), 0x0200_0000);

        let sdtp = moof.find(b"sdtp").unwrap().payload();
        assert_eq!(&sdtp[..], &[0, 0, 0, 0, 0x20, 0x20]);
    }

    #[test]
    fn test_mdat_wraps_payload() {
        let bytes = mdat(vec![0xAAu8; 5]).to_bytes().unwrap();
        assert_eq!(u32_at(&bytes, 0), 13);
        assert_eq!(&bytes[4..8], b"mdat");
    }
}
