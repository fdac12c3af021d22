use thiserror::Error;

/// Errors surfaced by the remuxing pipeline.
///
/// Malformed input units are not errors: they are dropped and reported
/// through `Option` returns. The variants here cover configuration faults
/// and the I/O boundary.
#[derive(Error, Debug)]
pub enum RemuxError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("codec error: {0}")]
    Codec(String),

    #[error("parser error: {0}")]
    Parser(String),

    #[error("invalid data: {0}")]
    InvalidData(String),

    #[error("unsupported track: {0}")]
    UnsupportedTrack(String),

    #[error("sink error: {0}")]
    Sink(String),

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),
}

pub type Result<T> = std::result::Result<T, RemuxError>;
