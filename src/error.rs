use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Unrecognized format: {0}")]
    UnrecognizedFormat(String),

    #[error("Unsupported recording: {0}")]
    Unsupported(String),

    #[error("Invalid header: {0}")]
    InvalidHeader(String),

    #[error("Channel not found: {0}")]
    ChannelNotFound(String),

    #[error("Invalid channel selection: {0}")]
    InvalidChannelSelection(String),

    #[error("Channel index {0} out of range")]
    InvalidChannelIndex(usize),

    #[error("Invalid interval: {0}")]
    InvalidInterval(String),

    #[error("Sample span [{begsam}, {endsam}) out of range for recording with {sample_count} samples")]
    SampleSpanOutOfRange {
        begsam: i64,
        endsam: i64,
        sample_count: usize,
    },

    #[error("Failed to read samples: {0}")]
    ReadFailed(String),
}

pub type Result<T> = std::result::Result<T, DatasetError>;
