use super::audio::AudioRemuxer;
use crate::av::AudioTrack;
use crate::codec::aac::ADTSParser;
use crate::config::RemuxConfig;
use crate::error::{RemuxError, Result};
use crate::format::mp4::{fmp4, Track};
use crate::format::ts::TSDemuxer;
use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use url::Url;

/// One entry of the segment list, in playback order.
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    pub url: Url,
    /// Expected duration in seconds.
    pub duration: f64,
}

impl Segment {
    pub fn new(url: &str, duration: f64) -> Result<Self> {
        Ok(Self {
            url: Url::parse(url)?,
            duration,
        })
    }

    /// Resolves a playlist-relative `uri` against `base`.
    pub fn resolve(base: &Url, uri: &str, duration: f64) -> Result<Self> {
        Ok(Self {
            url: base.join(uri)?,
            duration,
        })
    }
}

/// Sum of the expected segment durations.
pub fn total_duration(segments: &[Segment]) -> f64 {
    segments.iter().map(|s| s.duration).sum()
}

/// MIME type announcing an fMP4 audio track to a sink.
pub fn mime_type(codec: &str) -> String {
    format!("audio/mp4; codecs=\"{}\"", codec)
}

/// Supplies segment bytes in playback order.
#[async_trait]
pub trait SegmentSource: Send {
    /// `None` once the list is exhausted.
    async fn next_segment(&mut self) -> Option<Result<(Segment, Bytes)>>;
}

#[async_trait]
impl<S> SegmentSource for S
where
    S: Stream<Item = Result<(Segment, Bytes)>> + Unpin + Send,
{
    async fn next_segment(&mut self) -> Option<Result<(Segment, Bytes)>> {
        self.next().await
    }
}

/// Consumer of the produced byte buffers, e.g. a media source buffer.
#[async_trait]
pub trait MediaSink: Send {
    /// Whether the sink can take another buffer now.
    async fn is_ready(&mut self) -> bool;

    async fn append(&mut self, data: Bytes) -> Result<()>;
}

/// FIFO of output buffers shared between the producer and a sink pump.
#[derive(Debug, Clone, Default)]
pub struct FragmentQueue {
    inner: Arc<Mutex<VecDeque<Bytes>>>,
}

impl FragmentQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, data: Bytes) {
        self.inner.lock().push_back(data);
    }

    pub fn pop(&self) -> Option<Bytes> {
        self.inner.lock().pop_front()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    /// Hands queued buffers to `sink` while it reports ready. A buffer is
    /// only removed once the sink accepted it. Returns the number appended.
    pub async fn pump<K>(&self, sink: &mut K) -> Result<usize>
    where
        K: MediaSink + ?Sized,
    {
        let mut appended = 0;
        loop {
            let next = self.inner.lock().front().cloned();
            let data = match next {
                Some(data) => data,
                None => break,
            };
            if !sink.is_ready().await {
                break;
            }

            sink.append(data).await?;
            self.inner.lock().pop_front();
            appended += 1;
        }
        Ok(appended)
    }
}

/// Summary of one emitted `moof`/`mdat` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FragmentInfo {
    pub sequence_number: u32,
    pub base_media_decode_time: u64,
    pub sample_count: usize,
    /// Bytes queued for the fragment, both boxes included.
    pub size: usize,
}

/// Turns TS segments into an fMP4 audio byte stream.
///
/// The initialization segment is queued once, as soon as the first ADTS
/// header has configured the track; each segment with playable audio then
/// queues one fragment.
pub struct AudioPipeline {
    config: RemuxConfig,
    demuxer: TSDemuxer,
    parser: ADTSParser,
    remuxer: AudioRemuxer,
    track: AudioTrack,
    queue: FragmentQueue,
    initialized: bool,
}

impl AudioPipeline {
    pub fn new(config: RemuxConfig) -> Self {
        Self {
            demuxer: TSDemuxer::new(),
            parser: ADTSParser::from_config(&config),
            remuxer: AudioRemuxer::new(),
            track: AudioTrack::from_config(&config),
            queue: FragmentQueue::new(),
            initialized: false,
            config,
        }
    }

    /// Expected presentation length written into the movie headers.
    pub fn with_duration(mut self, seconds: f64) -> Self {
        self.track.duration = seconds;
        self
    }

    pub fn track(&self) -> &AudioTrack {
        &self.track
    }

    pub fn config(&self) -> &RemuxConfig {
        &self.config
    }

    /// Handle to the output queue.
    pub fn queue(&self) -> FragmentQueue {
        self.queue.clone()
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Available once the track is configured.
    pub fn mime_type(&self) -> Option<String> {
        self.track.codec_string().map(mime_type)
    }

    /// Processes one segment buffer.
    ///
    /// Returns `Ok(None)` when the segment yields no fragment: no packet
    /// sync, no audio stream or no playable samples.
    pub fn push_segment(&mut self, data: &[u8]) -> Result<Option<FragmentInfo>> {
        let parser = self.parser;
        let track = &mut self.track;
        let demuxed = self.demuxer.demux(data, |unit| {
            if !unit.is_audio() {
                return;
            }
            match unit.pts {
                Some(pts) => parser.append_sample(track, &unit.data, pts),
                None => log::debug!("skipping audio PES without PTS ({} bytes)", unit.data.len()),
            }
        });
        if demuxed.is_none() {
            log::warn!("no transport stream sync in {} byte segment", data.len());
            return Ok(None);
        }

        if !self.initialized {
            if !self.track.is_configured() {
                log::debug!("track {} not configured yet", self.track.id);
                return Ok(None);
            }
            self.queue.push(fmp4::ftyp().to_bytes()?);
            self.queue.push(fmp4::moov(&[&self.track as &dyn Track])?.to_bytes()?);
            self.initialized = true;
            log::debug!("queued init segment for {:?}", self.track.codec_string());
        }

        let result = match self.remuxer.remux(&mut self.track, self.config.time_offset) {
            Some(result) => result,
            None => return Ok(None),
        };

        let moof = fmp4::moof(result.sequence_number, result.base_media_decode_time, &self.track)?;
        let mdat = fmp4::mdat(result.mdat);
        let size = moof.size() + mdat.size();
        self.queue.push(moof.to_bytes()?);
        self.queue.push(mdat.to_bytes()?);

        Ok(Some(FragmentInfo {
            sequence_number: result.sequence_number,
            base_media_decode_time: result.base_media_decode_time,
            sample_count: self.track.fragment_samples.len(),
            size,
        }))
    }

    /// Processes every segment of `source` in order, pumping output into
    /// `sink` after each, then waits for the queue to drain.
    ///
    /// Returns the number of fragments produced.
    pub async fn run<S, K>(&mut self, source: &mut S, sink: &mut K) -> Result<usize>
    where
        S: SegmentSource + ?Sized,
        K: MediaSink + ?Sized,
    {
        let mut fragments = 0;
        while let Some(next) = source.next_segment().await {
            let (segment, data) = next?;
            log::debug!(
                "segment {} ({:.3}s, {} bytes)",
                segment.url,
                segment.duration,
                data.len()
            );

            if self.push_segment(&data)?.is_some() {
                fragments += 1;
            }
            self.queue.pump(sink).await?;
        }

        while !self.queue.is_empty() {
            tokio::time::sleep(self.config.sink_poll_interval).await;
            self.queue.pump(sink).await?;
        }

        if !self.initialized {
            return Err(RemuxError::InvalidData("no AAC audio found in any segment".into()));
        }
        Ok(fragments)
    }
}
