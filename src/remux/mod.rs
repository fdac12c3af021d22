//! Re-timing of decoded audio samples and the segment-driven pipeline
//! producing the fMP4 byte stream.

/// Timestamp normalization and fragment sample tables
pub mod audio;

/// Segment processing, output queue and sink pumping
pub mod pipeline;

pub use audio::{normalize_pts, AudioRemuxer, RemuxResult};
pub use pipeline::{
    mime_type, total_duration, AudioPipeline, FragmentInfo, FragmentQueue, MediaSink, Segment,
    SegmentSource,
};
