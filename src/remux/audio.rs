use crate::av::AudioTrack;
use crate::codec::aac::SAMPLES_PER_FRAME;
use crate::format::mp4::Mp4Sample;
use bytes::{Bytes, BytesMut};

/// Period of the 33-bit PES clock.
const PTS_WRAP: f64 = 8_589_934_592.0;
/// Half period: larger jumps are taken as a wrap.
const PTS_HALF_WRAP: f64 = 4_294_967_296.0;

/// Fragment-level output of one remux call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemuxResult {
    pub sequence_number: u32,
    /// Fragment start in the track timescale.
    pub base_media_decode_time: u64,
    /// Concatenated raw frames for the `mdat` box.
    pub mdat: Bytes,
}

/// Undoes 33-bit wraparound by moving `value` towards `reference` in whole
/// clock periods until the two are less than half a period apart.
pub fn normalize_pts(mut value: f64, reference: f64) -> f64 {
    let offset = if reference < value { -PTS_WRAP } else { PTS_WRAP };
    while (value - reference).abs() > PTS_HALF_WRAP {
        value += offset;
    }
    value
}

/// Re-times pending audio samples onto a continuous output timeline.
///
/// Timestamps are only read at the fragment boundary: every sample after
/// the first is placed one AAC frame after its predecessor.
#[derive(Debug, Default, Clone, Copy)]
pub struct AudioRemuxer;

impl AudioRemuxer {
    pub fn new() -> Self {
        Self
    }

    /// Drains the track's pending samples into one fragment.
    ///
    /// `time_offset` is the fragment position in seconds, used as the
    /// wraparound reference and as the start of the very first fragment.
    /// Returns `None`, leaving the timeline and sequence number untouched,
    /// when nothing playable is pending.
    pub fn remux(&self, track: &mut AudioTrack, time_offset: f64) -> Option<RemuxResult> {
        if track.samples.is_empty() {
            log::debug!("track {}: no pending samples", track.id);
            return None;
        }

        let input_timescale = track.input_timescale as f64;
        let scale_factor = input_timescale / track.timescale() as f64;
        let input_sample_duration = SAMPLES_PER_FRAME as f64 * scale_factor;
        let reference = time_offset * input_timescale;

        let mut samples = std::mem::take(&mut track.samples);
        let init_pts = samples[0].pts;
        for sample in samples.iter_mut() {
            sample.pts = normalize_pts(sample.pts - init_pts, reference);
        }

        let first_pts = match track.next_audio_pts {
            Some(next) => next,
            None => {
                samples.retain(|sample| sample.pts >= 0.0);
                if samples.is_empty() {
                    log::warn!("track {}: all samples precede the timeline start", track.id);
                    return None;
                }
                reference.max(0.0)
            }
        };

        let mdat_size: usize = samples.iter().map(|sample| sample.unit.len()).sum();
        if mdat_size == 0 {
            log::warn!("track {}: mdat would be empty", track.id);
            return None;
        }

        let mut mdat = BytesMut::with_capacity(mdat_size);
        let mut output: Vec<Mp4Sample> = Vec::with_capacity(samples.len());
        let mut last_pts: Option<f64> = None;
        for (i, sample) in samples.iter_mut().enumerate() {
            sample.pts = first_pts + i as f64 * input_sample_duration;
            if let (Some(last), Some(previous)) = (last_pts, output.last_mut()) {
                previous.duration = ((sample.pts - last) / scale_factor).round() as u32;
            }

            mdat.extend_from_slice(&sample.unit);
            output.push(Mp4Sample::new(true, SAMPLES_PER_FRAME, sample.unit.len() as u32, 0));
            last_pts = Some(sample.pts);
        }

        let last_duration = output.last().map(|s| s.duration).unwrap_or(SAMPLES_PER_FRAME);
        let last_pts = last_pts.unwrap_or(first_pts);
        track.next_audio_pts = Some(last_pts + scale_factor * last_duration as f64);
        track.fragment_samples = output;

        let sequence_number = track.sequence_number;
        track.sequence_number = track.sequence_number.wrapping_add(1);
        let base_media_decode_time = (first_pts / scale_factor).round() as u64;

        log::debug!(
            "track {}: fragment {} with {} samples at {}",
            track.id,
            sequence_number,
            track.fragment_samples.len(),
            base_media_decode_time
        );

        Some(RemuxResult {
            sequence_number,
            base_media_decode_time,
            mdat: mdat.freeze(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::av::AudioSample;
    use crate::codec::aac::{AudioConfig, AOT_AAC_LC};
    use pretty_assertions::assert_eq;
    use quickcheck_macros::quickcheck;

    fn track_with(pts: &[f64]) -> AudioTrack {
        let mut track = AudioTrack::new(1, 10);
        track.config = Some(AudioConfig::new(AOT_AAC_LC, 4, 2, 4).unwrap());
        push(&mut track, pts);
        track
    }

    fn push(track: &mut AudioTrack, pts: &[f64]) {
        for (i, pts) in pts.iter().enumerate() {
            track.samples.push(AudioSample {
                unit: Bytes::from(vec![i as u8; 10 + i]),
                pts: *pts,
            });
        }
    }

    #[test]
    fn test_wraparound_example() {
        let init = PTS_WRAP - 10.0;
        let first = normalize_pts(init - init, 0.0);
        let second = normalize_pts(5.0 - init, 0.0);
        assert_eq!(first, 0.0);
        assert_eq!(second, 15.0);
    }

    #[quickcheck]
    fn prop_wrapped_timestamps_stay_monotonic(start: u64, steps: Vec<u16>) -> bool {
        let start = start % (1u64 << 33);
        let mut elapsed = 0u64;
        let mut raw = vec![start];
        let mut expected = vec![0u64];
        for step in steps {
            elapsed += step as u64 * 100;
            raw.push((start + elapsed) % (1u64 << 33));
            expected.push(elapsed);
        }

        raw.iter()
            .zip(expected.iter())
            .all(|(r, e)| normalize_pts(*r as f64 - start as f64, 0.0) == *e as f64)
    }

    #[test]
    fn test_first_fragment() {
        let mut track = track_with(&[9000.0, 11089.0, 13178.0]);
        let result = AudioRemuxer::new().remux(&mut track, 0.0).unwrap();

        assert_eq!(result.sequence_number, 10);
        assert_eq!(result.base_media_decode_time, 0);
        assert_eq!(result.mdat.len(), 10 + 11 + 12);
        assert_eq!(&result.mdat[10..21], &[1u8; 11][..]);

        assert_eq!(track.sequence_number, 11);
        assert!(track.samples.is_empty());
        let sizes: Vec<u32> = track.fragment_samples.iter().map(|s| s.size).collect();
        assert_eq!(sizes, vec![10, 11, 12]);
        assert!(track.fragment_samples.iter().all(|s| s.duration == 1024));

        let next = track.next_audio_pts.unwrap();
        assert!((next - 3.0 * 1024.0 * 90_000.0 / 44100.0).abs() < 1e-6);
    }

    #[test]
    fn test_fragments_continue_timeline() {
        let remuxer = AudioRemuxer::new();
        let mut track = track_with(&[1000.0, 3089.0]);
        remuxer.remux(&mut track, 0.0).unwrap();

        // Jittered source timestamps do not move the timeline
        push(&mut track, &[5500.0, 7000.0, 9999.0]);
        let second = remuxer.remux(&mut track, 0.0).unwrap();
        assert_eq!(second.sequence_number, 11);
        assert_eq!(second.base_media_decode_time, 2048);

        push(&mut track, &[123.0]);
        let third = remuxer.remux(&mut track, 0.0).unwrap();
        assert_eq!(third.base_media_decode_time, 5 * 1024);
    }

    #[test]
    fn test_negative_samples_dropped_before_timeline() {
        let mut track = track_with(&[5000.0, 2000.0, 7089.0]);
        let result = AudioRemuxer::new().remux(&mut track, 0.0).unwrap();
        assert_eq!(track.fragment_samples.len(), 2);
        assert_eq!(result.mdat.len(), 10 + 12);

        // Once established, earlier timestamps are kept
        push(&mut track, &[5000.0, 2000.0]);
        AudioRemuxer::new().remux(&mut track, 0.0).unwrap();
        assert_eq!(track.fragment_samples.len(), 2);
    }

    #[test]
    fn test_time_offset_starts_timeline() {
        let mut track = track_with(&[42.0]);
        let result = AudioRemuxer::new().remux(&mut track, 2.0).unwrap();
        assert_eq!(result.base_media_decode_time, 88200);
    }

    #[test]
    fn test_no_samples_leaves_state() {
        let remuxer = AudioRemuxer::new();
        let mut track = track_with(&[0.0]);
        remuxer.remux(&mut track, 0.0).unwrap();
        let next = track.next_audio_pts;

        assert_eq!(remuxer.remux(&mut track, 0.0), None);
        assert_eq!(track.next_audio_pts, next);
        assert_eq!(track.sequence_number, 11);
    }

    #[test]
    fn test_empty_units_yield_nothing() {
        let mut track = track_with(&[]);
        track.samples.push(AudioSample {
            unit: Bytes::new(),
            pts: 0.0,
        });
        assert_eq!(AudioRemuxer::new().remux(&mut track, 0.0), None);
        assert_eq!(track.next_audio_pts, None);
        assert_eq!(track.sequence_number, 10);
    }
}
