use std::env;
use std::time::Duration;

/// MPEG system clock rate used by PES timestamps.
pub const INPUT_TIMESCALE: u32 = 90_000;

/// Selects which AudioSpecificConfig flavour is written for AAC tracks.
///
/// Some decoders reject the extended (object type 5, explicit SBR) config,
/// others need it to play low sample rate HE-AAC correctly. The caller knows
/// which decoder sits behind the sink; the remuxer does not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AacCompatibility {
    /// Always emit a plain two-byte AAC-LC config (object type 2).
    pub prefer_plain_aac: bool,
}

/// In-process configuration for one output track.
#[derive(Debug, Clone)]
pub struct RemuxConfig {
    pub track_id: u32,
    pub initial_sequence_number: u32,
    pub aac: AacCompatibility,
    /// Keep the tail of an ADTS frame cut by the end of a PES buffer and
    /// complete it from the next buffer instead of dropping it.
    pub carry_partial_frames: bool,
    /// Reference position, in seconds, for PTS wraparound correction.
    pub time_offset: f64,
    /// How often `run` re-checks a busy sink.
    pub sink_poll_interval: Duration,
}

impl Default for RemuxConfig {
    fn default() -> Self {
        Self {
            track_id: 1,
            initial_sequence_number: 1,
            aac: AacCompatibility::default(),
            carry_partial_frames: true,
            time_offset: 0.0,
            sink_poll_interval: Duration::from_millis(100),
        }
    }
}

impl RemuxConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults overlaid with any `TSREMUX_*` environment variables.
    ///
    /// Unparseable values are ignored and the default is kept.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(id) = env_parse::<u32>("TSREMUX_TRACK_ID") {
            config.track_id = id;
        }
        if let Some(seq) = env_parse::<u32>("TSREMUX_SEQUENCE_START") {
            config.initial_sequence_number = seq;
        }
        if let Some(plain) = env_flag("TSREMUX_PREFER_PLAIN_AAC") {
            config.aac.prefer_plain_aac = plain;
        }
        if let Some(carry) = env_flag("TSREMUX_CARRY_PARTIAL_FRAMES") {
            config.carry_partial_frames = carry;
        }
        if let Some(offset) = env_parse::<f64>("TSREMUX_TIME_OFFSET") {
            config.time_offset = offset;
        }

        config
    }

    pub fn input_timescale(&self) -> u32 {
        INPUT_TIMESCALE
    }

    pub fn with_track_id(mut self, track_id: u32) -> Self {
        self.track_id = track_id;
        self
    }

    pub fn with_initial_sequence_number(mut self, sequence_number: u32) -> Self {
        self.initial_sequence_number = sequence_number;
        self
    }

    pub fn with_prefer_plain_aac(mut self, prefer_plain_aac: bool) -> Self {
        self.aac.prefer_plain_aac = prefer_plain_aac;
        self
    }

    pub fn with_carry_partial_frames(mut self, carry: bool) -> Self {
        self.carry_partial_frames = carry;
        self
    }

    pub fn with_time_offset(mut self, seconds: f64) -> Self {
        self.time_offset = seconds;
        self
    }

    pub fn with_sink_poll_interval(mut self, interval: Duration) -> Self {
        self.sink_poll_interval = interval;
        self
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

fn env_flag(key: &str) -> Option<bool> {
    let value = env::var(key).ok()?;
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
