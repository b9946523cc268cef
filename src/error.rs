//! Error types for the acquisition pipeline.

use thiserror::Error;

/// A non-zero status from the hardware interface. Never retried by the core.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("{op} failed with status {code}")]
    Status { op: &'static str, code: i32 },

    #[error("could not connect to {address}: status {code}")]
    Connect { address: String, code: i32 },

    #[error("invalid device address {0:?}")]
    BadAddress(String),
}

/// Why a buffer of FIFO words did not yield a frame.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum FrameError {
    #[error("no frame sentinel in {buffered} buffered words")]
    NoHeaderFound { buffered: usize },

    #[error("frame at word {offset} needs {required} words, only {available} buffered after it")]
    IncompleteFrame {
        offset: usize,
        available: usize,
        required: usize,
    },
}

/// Invalid frame geometry, rejected before any acquisition starts.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum LayoutError {
    #[error("channel count must be non-zero")]
    NoChannels,

    #[error("channel count {0} is odd, two channels are packed per word")]
    OddChannelCount(usize),

    #[error("samples per waveform must be non-zero")]
    NoSamples,

    #[error("header must hold at least the sentinel word")]
    NoHeader,

    #[error("channel count {0} does not fit the 24-bit config field")]
    TooManyChannels(usize),

    #[error("{0} samples per waveform does not fit the 32-bit length register")]
    TooManySamples(usize),

    #[error("frame of {channels} channels x {samples} samples + {header} header words is too large for one FIFO read")]
    FrameTooLarge {
        channels: usize,
        samples: usize,
        header: usize,
    },
}

/// Errors that end an event (and usually the run).
#[derive(Debug, Error)]
pub enum AcqError {
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("acquisition cancelled")]
    Cancelled,

    #[error("FIFO stayed empty for {empty_reads} consecutive reads")]
    FifoStarved { empty_reads: u32 },

    #[error("event sink closed")]
    SinkClosed,
}

pub type Result<T> = std::result::Result<T, AcqError>;
