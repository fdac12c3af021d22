/// Fragmented MP4 output
pub mod mp4;

/// MPEG transport stream input
pub mod ts;
