//! # spectra-core
//!
//! Streaming audio spectrum analyzer.
//!
//! ## Architecture
//!
//! ```text
//! SampleSource ──next_frame──► Analyzer::tick
//!                                  │
//!                    ┌─────────────┼──────────────┐
//!                    ▼             ▼              ▼
//!            short RingBuffer  long RingBuffer  Radix2Fft
//!                                                 │
//!                                         SpectrogramMatrix
//!                                                 │
//!                                   AnalysisFrame ──► RenderTarget
//! ```
//!
//! One external clock drives `tick()`; every buffer is owned by the analyzer
//! and render targets only ever read snapshots.

#![forbid(unsafe_code)]
#![warn(clippy::all)]

pub mod buffering;
pub mod dsp;
pub mod engine;
pub mod error;
pub mod ipc;
pub mod render;
pub mod source;
pub mod spectrogram;

// Convenience re-exports for downstream crates
pub use buffering::RingBuffer;
pub use dsp::{FrequencyAxis, Radix2Fft, DEFAULT_DB_FLOOR};
pub use engine::{Analyzer, AnalyzerConfig, DiagnosticsSnapshot, PipelineState, StopReason};
pub use error::SpectraError;
pub use ipc::events::{AnalysisFrame, PipelineStatus, StatusEvent};
pub use render::{FrameRecorder, RenderTarget};
pub use source::{CaptureSource, SampleSource, SourceFailureReason, ToneSource};
pub use spectrogram::SpectrogramMatrix;
