//! Event types handed across the core boundary.
//!
//! | Event | Consumer |
//! |-------|----------|
//! | `AnalysisFrame` | render target, once per tick |
//! | `StatusEvent` | `Analyzer::subscribe_status` receivers, once per state change |
//!
//! Field names serialize as camelCase so a web front end can consume the JSON as-is.

use serde::{Deserialize, Serialize};

use crate::source::SourceFailureReason;

// ---------------------------------------------------------------------------
// Analysis frames
// ---------------------------------------------------------------------------

/// Read-only snapshot of every view after one tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisFrame {
    /// Number of completed ticks when this frame was taken.
    pub seq: u64,
    /// Short rolling waveform, oldest sample first.
    pub short_waveform: Vec<f64>,
    /// Long waveform history, oldest sample first.
    pub long_waveform: Vec<f64>,
    /// dB magnitude per bin for the latest frame.
    pub spectrum: Vec<f64>,
    /// Hz per bin, same length as `spectrum`.
    pub frequency_axis: Vec<f64>,
    /// `depth × width` dB grid, oldest row first.
    pub spectrogram: Vec<Vec<f64>>,
}

impl AnalysisFrame {
    /// Index and frequency of the loudest bin, if the spectrum is non-empty.
    pub fn peak(&self) -> Option<(usize, f64)> {
        let (bin, _) = self
            .spectrum
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))?;
        self.frequency_axis.get(bin).map(|&hz| (bin, hz))
    }

    /// Root-mean-square of the short waveform.
    pub fn rms(&self) -> f64 {
        if self.short_waveform.is_empty() {
            return 0.0;
        }
        let sum_sq: f64 = self.short_waveform.iter().map(|s| s * s).sum();
        (sum_sq / self.short_waveform.len() as f64).sqrt()
    }
}

// ---------------------------------------------------------------------------
// Status events
// ---------------------------------------------------------------------------

/// Emitted whenever the analyzer changes state.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusEvent {
    /// Monotonically increasing event sequence number.
    pub seq: u64,
    pub status: PipelineStatus,
    /// Set when a source could not be acquired.
    pub failure: Option<SourceFailureReason>,
    /// Optional human-readable detail (e.g. error message).
    pub detail: Option<String>,
}

/// Coarse analyzer state for event consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineStatus {
    Uninitialized,
    /// Buffers built; waiting for the sample source to come up.
    AwaitingSource,
    Running,
    /// Terminal. A new analyzer is needed to run again.
    Stopped,
}
