pub mod aac;

pub use aac::{ADTSParser, AudioConfig};
