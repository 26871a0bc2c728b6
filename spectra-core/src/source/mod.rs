//! Sample source abstraction.
//!
//! `SampleSource` is the seam between the analyzer and wherever audio comes
//! from: the microphone adapter ([`capture::CaptureSource`]), the synthetic
//! generator ([`tone::ToneSource`]), or a scripted double in tests.

pub mod capture;
pub mod device;
pub mod tone;

pub use capture::CaptureSource;
pub use tone::ToneSource;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Why a source could not be acquired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SourceFailureReason {
    /// The user or the OS refused access to the input device.
    PermissionDenied,
    /// Capture is only allowed from a secure origin (https or localhost).
    InsecureContext,
    /// Anything else: missing device, backend failure, unsupported format.
    Unknown,
}

impl SourceFailureReason {
    /// Human-readable explanation for the boundary (log line, status bar).
    pub fn message(self) -> &'static str {
        match self {
            SourceFailureReason::PermissionDenied => {
                "Microphone access was refused. Allow microphone access for this \
                 application in your system privacy settings, then start again."
            }
            SourceFailureReason::InsecureContext => {
                "Microphone access requires a secure context (https or localhost)."
            }
            SourceFailureReason::Unknown => {
                "Could not open the audio input. Check the log for details."
            }
        }
    }
}

impl fmt::Display for SourceFailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SourceFailureReason::PermissionDenied => "permission denied",
            SourceFailureReason::InsecureContext => "insecure context",
            SourceFailureReason::Unknown => "unknown failure",
        };
        f.write_str(label)
    }
}

/// Contract for anything that produces fixed-size mono frames.
pub trait SampleSource {
    /// One-shot acquisition (open device, request permission, ...).
    ///
    /// Called exactly once by the analyzer while it awaits a source.
    fn initialize(&mut self) -> std::result::Result<(), SourceFailureReason>;

    /// Sample rate in Hz. Meaningful after a successful `initialize`.
    fn sample_rate(&self) -> u32;

    /// Fill `frame` completely with the next `frame.len()` samples.
    ///
    /// # Errors
    /// Implementations return `SpectraError::SourceClosed` once closed, or an
    /// adapter-specific error for stream faults.
    fn next_frame(&mut self, frame: &mut [f64]) -> Result<()>;

    fn is_closed(&self) -> bool;

    /// Release the underlying resource. Must be idempotent.
    fn close(&mut self);
}

impl<S: SampleSource + ?Sized> SampleSource for Box<S> {
    fn initialize(&mut self) -> std::result::Result<(), SourceFailureReason> {
        (**self).initialize()
    }

    fn sample_rate(&self) -> u32 {
        (**self).sample_rate()
    }

    fn next_frame(&mut self, frame: &mut [f64]) -> Result<()> {
        (**self).next_frame(frame)
    }

    fn is_closed(&self) -> bool {
        (**self).is_closed()
    }

    fn close(&mut self) {
        (**self).close()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_reason_serializes_camel_case() {
        let json = serde_json::to_string(&SourceFailureReason::PermissionDenied).unwrap();
        assert_eq!(json, r#""permissionDenied""#);
        let back: SourceFailureReason = serde_json::from_str(r#""insecureContext""#).unwrap();
        assert_eq!(back, SourceFailureReason::InsecureContext);
    }

    #[test]
    fn every_reason_has_a_message() {
        for reason in [
            SourceFailureReason::PermissionDenied,
            SourceFailureReason::InsecureContext,
            SourceFailureReason::Unknown,
        ] {
            assert!(!reason.message().is_empty());
            assert!(!reason.to_string().is_empty());
        }
    }
}
