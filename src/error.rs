use thiserror::Error;

/// Errors raised by the decode / analyze / persist pipeline.
#[derive(Error, Debug)]
pub enum Error {
    #[error("frame has {actual} bytes, expected {expected} for a {width}x{height} sensor")]
    FrameFormat {
        expected: usize,
        actual: usize,
        width: usize,
        height: usize,
    },

    #[error("could not open capture device `{device}`")]
    Capture {
        device: String,
        #[source]
        source: std::io::Error,
    },

    #[error(
        "zone `{name}` (rows {row_low}..{row_high}, cols {col_low}..{col_high}) \
         falls outside the {height}x{width} sensor"
    )]
    ZoneBounds {
        name: String,
        row_low: usize,
        row_high: usize,
        col_low: usize,
        col_high: usize,
        height: usize,
        width: usize,
    },

    #[error("failed to persist {what}")]
    Persistence {
        what: &'static str,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl Error {
    pub(crate) fn persistence<E>(what: &'static str, source: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Error::Persistence {
            what,
            source: source.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
