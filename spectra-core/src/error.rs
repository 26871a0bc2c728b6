use thiserror::Error;

use crate::source::SourceFailureReason;

/// All errors produced by spectra-core.
#[derive(Debug, Error)]
pub enum SpectraError {
    #[error("invalid analyzer configuration: {0}")]
    InvalidConfig(String),

    #[error("transform length must be a power of two >= 2, got {0}")]
    InvalidLength(usize),

    #[error("capacity must be greater than zero, got {0}")]
    InvalidCapacity(usize),

    #[error("expected {expected} samples but got {actual}")]
    LengthMismatch { expected: usize, actual: usize },

    #[error("expected a spectrum row of width {expected} but got {actual}")]
    WidthMismatch { expected: usize, actual: usize },

    #[error("analyzer is not running")]
    NotRunning,

    #[error("analyzer is already initialized")]
    AlreadyInitialized,

    #[error("analyzer is not waiting for a sample source")]
    NotAwaitingSource,

    #[error("sample source could not be acquired: {0}")]
    SourceAcquisition(SourceFailureReason),

    #[error("sample source closed")]
    SourceClosed,

    #[error("audio stream error: {0}")]
    AudioStream(String),
}

pub type Result<T> = std::result::Result<T, SpectraError>;
