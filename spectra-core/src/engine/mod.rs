//! `Analyzer`: the pipeline orchestrator.
//!
//! ## Lifecycle
//!
//! ```text
//! Analyzer::new(config)            status = Uninitialized
//!     └─► initialize()             buffers built, status = AwaitingSource
//!         └─► attach_source(src)   src.initialize() ok  → Running
//!             │                    src.initialize() err → Stopped(SourceFailed)
//!             └─► tick(target)*    one frame in, one AnalysisFrame out
//!                 └─► shutdown()   → Stopped(Shutdown)   (idempotent)
//! ```
//!
//! `Stopped` is terminal; build a new `Analyzer` to run again.
//!
//! ## Threading
//!
//! Single-threaded. `tick()` takes `&mut self`, so an external frame clock can
//! never overlap two ticks. The analyzer is the only writer of its buffers;
//! render targets only ever see `AnalysisFrame` copies.

pub mod diagnostics;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, info, trace, warn};

pub use diagnostics::{DiagnosticsSnapshot, PipelineDiagnostics};

use crate::{
    buffering::RingBuffer,
    dsp::{FrequencyAxis, Radix2Fft, DEFAULT_DB_FLOOR},
    error::{Result, SpectraError},
    ipc::events::{AnalysisFrame, PipelineStatus, StatusEvent},
    render::RenderTarget,
    source::{SampleSource, SourceFailureReason},
    spectrogram::SpectrogramMatrix,
};

/// Broadcast channel capacity for status events.
const STATUS_CAP: usize = 16;

/// Configuration for `Analyzer`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(default)]
pub struct AnalyzerConfig {
    /// Samples per frame and FFT length. Must be a power of two >= 2. Default: 2048.
    pub frame_size: usize,
    /// Expected source sample rate (Hz), used for the frequency axis. Default: 44100.
    pub sample_rate: u32,
    /// Short waveform capacity in samples. Default: 2048.
    pub short_capacity: usize,
    /// Long waveform history capacity in samples. Default: 2048 * 200.
    pub long_capacity: usize,
    /// Spectrogram rows kept. Default: 200.
    pub spectrogram_depth: usize,
    /// Lower clamp for dB output; `None` lets silent bins read `-inf`.
    pub db_floor: Option<f64>,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            frame_size: 2048,
            sample_rate: 44_100,
            short_capacity: 2048,
            long_capacity: 2048 * 200,
            spectrogram_depth: 200,
            db_floor: Some(DEFAULT_DB_FLOOR),
        }
    }
}

impl AnalyzerConfig {
    /// # Errors
    /// `SpectraError::InvalidConfig` naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        if self.frame_size < 2 || !self.frame_size.is_power_of_two() {
            return Err(SpectraError::InvalidConfig(format!(
                "frameSize must be a power of two >= 2, got {}",
                self.frame_size
            )));
        }
        if self.sample_rate == 0 {
            return Err(SpectraError::InvalidConfig(
                "sampleRate must be greater than zero".into(),
            ));
        }
        for (name, value) in [
            ("shortCapacity", self.short_capacity),
            ("longCapacity", self.long_capacity),
            ("spectrogramDepth", self.spectrogram_depth),
        ] {
            if value == 0 {
                return Err(SpectraError::InvalidConfig(format!(
                    "{name} must be greater than zero"
                )));
            }
        }
        Ok(())
    }

    /// Number of spectrum bins, `frame_size / 2`.
    pub fn bins(&self) -> usize {
        self.frame_size / 2
    }
}

/// Why the analyzer stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// `shutdown()` was called.
    Shutdown,
    /// The source reported closure.
    SourceClosed,
    /// The source could not be acquired.
    SourceFailed(SourceFailureReason),
    /// A tick failed; the message is the error's display text.
    TickFailed(String),
}

/// Analyzer lifecycle state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineState {
    Uninitialized,
    AwaitingSource,
    Running,
    Stopped(StopReason),
}

impl PipelineState {
    pub fn status(&self) -> PipelineStatus {
        match self {
            PipelineState::Uninitialized => PipelineStatus::Uninitialized,
            PipelineState::AwaitingSource => PipelineStatus::AwaitingSource,
            PipelineState::Running => PipelineStatus::Running,
            PipelineState::Stopped(_) => PipelineStatus::Stopped,
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self, PipelineState::Running)
    }

    pub fn is_stopped(&self) -> bool {
        matches!(self, PipelineState::Stopped(_))
    }
}

/// Everything built by `initialize()`.
struct Buffers {
    fft: Radix2Fft,
    short: RingBuffer<f64>,
    long: RingBuffer<f64>,
    spectrogram: SpectrogramMatrix,
    axis: FrequencyAxis,
    /// Reused input frame, filled by the source each tick.
    frame: Vec<f64>,
    /// Spectrum of the latest frame.
    spectrum: Vec<f64>,
    ticks: u64,
}

impl Buffers {
    fn build(config: &AnalyzerConfig) -> Result<Self> {
        let fft = Radix2Fft::new(config.frame_size)?.with_db_floor(config.db_floor);
        Ok(Self {
            short: RingBuffer::new(config.short_capacity)?,
            long: RingBuffer::new(config.long_capacity)?,
            spectrogram: SpectrogramMatrix::new(config.spectrogram_depth, fft.fft_size())?,
            axis: FrequencyAxis::new(config.frame_size, config.sample_rate)?,
            frame: vec![0.0; config.frame_size],
            spectrum: vec![0.0; fft.fft_size()],
            fft,
            ticks: 0,
        })
    }

    /// One update cycle: pull, append, transform, push.
    fn advance(&mut self, source: &mut dyn SampleSource) -> Result<()> {
        if source.is_closed() {
            return Err(SpectraError::SourceClosed);
        }
        source.next_frame(&mut self.frame)?;

        self.short.append_all(self.frame.iter().copied());
        self.long.append_all(self.frame.iter().copied());
        self.fft.run_into(&self.frame, &mut self.spectrum)?;
        self.spectrogram.push_row(&self.spectrum)?;
        self.ticks += 1;
        Ok(())
    }

    fn snapshot(&self) -> AnalysisFrame {
        AnalysisFrame {
            seq: self.ticks,
            short_waveform: self.short.snapshot(),
            long_waveform: self.long.snapshot(),
            spectrum: self.spectrum.clone(),
            frequency_axis: self.axis.values().to_vec(),
            spectrogram: self.spectrogram.snapshot(),
        }
    }
}

/// The pipeline orchestrator. Owns every buffer and the FFT scratch state.
///
/// The frequency axis is built in `initialize()` from the configured sample
/// rate. `attach_source()` may replace it exactly once, when the source runs at
/// a different rate; from then on it is fixed for the analyzer's lifetime.
pub struct Analyzer {
    config: AnalyzerConfig,
    state: PipelineState,
    buffers: Option<Buffers>,
    source: Option<Box<dyn SampleSource>>,
    status_tx: broadcast::Sender<StatusEvent>,
    status_seq: u64,
    diagnostics: Arc<PipelineDiagnostics>,
}

impl Analyzer {
    /// Create an analyzer in the `Uninitialized` state. Nothing is allocated
    /// or validated until `initialize()`.
    pub fn new(config: AnalyzerConfig) -> Self {
        let (status_tx, _) = broadcast::channel(STATUS_CAP);
        Self {
            config,
            state: PipelineState::Uninitialized,
            buffers: None,
            source: None,
            status_tx,
            status_seq: 0,
            diagnostics: Arc::new(PipelineDiagnostics::default()),
        }
    }

    /// Validate the configuration and build the FFT engine, both ring buffers,
    /// the spectrogram matrix and the frequency axis.
    ///
    /// # Errors
    /// - `SpectraError::AlreadyInitialized` outside `Uninitialized`.
    /// - `SpectraError::InvalidConfig` for a bad configuration; the analyzer
    ///   stays `Uninitialized`.
    pub fn initialize(&mut self) -> Result<()> {
        if self.state != PipelineState::Uninitialized {
            return Err(SpectraError::AlreadyInitialized);
        }
        self.config.validate()?;
        self.buffers = Some(Buffers::build(&self.config)?);

        info!(
            frame_size = self.config.frame_size,
            sample_rate = self.config.sample_rate,
            short_capacity = self.config.short_capacity,
            long_capacity = self.config.long_capacity,
            spectrogram_depth = self.config.spectrogram_depth,
            "analyzer initialized"
        );
        self.set_state(PipelineState::AwaitingSource, None, None);
        Ok(())
    }

    /// Acquire `source` and start running.
    ///
    /// If the source reports a sample rate different from the configured one,
    /// the frequency axis is rebuilt once from the source's rate.
    ///
    /// # Errors
    /// - `SpectraError::NotAwaitingSource` outside `AwaitingSource`; `source` is dropped.
    /// - `SpectraError::SourceAcquisition` if the source fails to initialize;
    ///   the analyzer moves to `Stopped(SourceFailed(reason))`.
    pub fn attach_source<S>(&mut self, source: S) -> Result<()>
    where
        S: SampleSource + 'static,
    {
        if self.state != PipelineState::AwaitingSource {
            return Err(SpectraError::NotAwaitingSource);
        }
        let mut source: Box<dyn SampleSource> = Box::new(source);

        if let Err(reason) = source.initialize() {
            warn!(%reason, "sample source acquisition failed: {}", reason.message());
            source.close();
            self.stop(StopReason::SourceFailed(reason), Some(reason.message().into()));
            return Err(SpectraError::SourceAcquisition(reason));
        }

        let rate = source.sample_rate();
        if rate != self.config.sample_rate {
            warn!(
                configured = self.config.sample_rate,
                reported = rate,
                "source sample rate differs from configuration, rebuilding frequency axis"
            );
            let axis = match FrequencyAxis::new(self.config.frame_size, rate) {
                Ok(axis) => axis,
                Err(e) => {
                    warn!("source reported an unusable sample rate: {e}");
                    source.close();
                    let reason = SourceFailureReason::Unknown;
                    self.stop(StopReason::SourceFailed(reason), Some(e.to_string()));
                    return Err(SpectraError::SourceAcquisition(reason));
                }
            };
            if let Some(buffers) = self.buffers.as_mut() {
                buffers.axis = axis;
            }
        }

        self.source = Some(source);
        self.diagnostics.reset();
        info!(sample_rate = rate, "sample source acquired, analyzer running");
        self.set_state(PipelineState::Running, None, None);
        Ok(())
    }

    /// Run one update cycle and hand the resulting frame to `target`.
    ///
    /// Returns the frame sequence number (ticks completed so far).
    ///
    /// # Errors
    /// - `SpectraError::NotRunning` outside `Running`; nothing is mutated.
    /// - `SpectraError::SourceClosed` if the source has closed; the analyzer
    ///   moves to `Stopped(SourceClosed)`.
    /// - Any source or contract error; the analyzer moves to
    ///   `Stopped(TickFailed(..))`.
    pub fn tick<R>(&mut self, target: &mut R) -> Result<u64>
    where
        R: RenderTarget + ?Sized,
    {
        if !self.state.is_running() {
            PipelineDiagnostics::bump(&self.diagnostics.rejected_ticks, 1);
            trace!(state = ?self.state, "tick ignored, analyzer not running");
            return Err(SpectraError::NotRunning);
        }

        let result = match (self.buffers.as_mut(), self.source.as_mut()) {
            (Some(buffers), Some(source)) => buffers.advance(source.as_mut()),
            _ => Err(SpectraError::NotRunning),
        };

        match result {
            Ok(()) => {}
            Err(SpectraError::SourceClosed) => {
                info!("sample source closed");
                self.stop(StopReason::SourceClosed, None);
                return Err(SpectraError::SourceClosed);
            }
            Err(e) => {
                PipelineDiagnostics::bump(&self.diagnostics.source_errors, 1);
                warn!("tick failed: {e}");
                self.stop(StopReason::TickFailed(e.to_string()), Some(e.to_string()));
                return Err(e);
            }
        }

        let Some(frame) = self.current_frame() else {
            return Err(SpectraError::NotRunning);
        };
        PipelineDiagnostics::bump(&self.diagnostics.ticks, 1);
        PipelineDiagnostics::bump(&self.diagnostics.samples_in, self.config.frame_size as u64);
        trace!(seq = frame.seq, "tick");

        target.render(&frame);
        PipelineDiagnostics::bump(&self.diagnostics.frames_rendered, 1);
        Ok(frame.seq)
    }

    /// Stop the analyzer and release the source. Idempotent: once stopped, the
    /// original stop reason is kept and further calls do nothing.
    pub fn shutdown(&mut self) {
        if self.state.is_stopped() {
            debug!("shutdown requested on a stopped analyzer");
            return;
        }
        info!("analyzer shutdown requested");
        self.stop(StopReason::Shutdown, None);
    }

    /// Snapshot of every view from the live buffers; `None` before `initialize()`.
    pub fn current_frame(&self) -> Option<AnalysisFrame> {
        self.buffers.as_ref().map(Buffers::snapshot)
    }

    pub fn state(&self) -> &PipelineState {
        &self.state
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    /// Frequency per spectrum bin; `None` before `initialize()`.
    pub fn frequency_axis(&self) -> Option<&FrequencyAxis> {
        self.buffers.as_ref().map(|b| &b.axis)
    }

    /// Subscribe to state-change events.
    pub fn subscribe_status(&self) -> broadcast::Receiver<StatusEvent> {
        self.status_tx.subscribe()
    }

    pub fn diagnostics(&self) -> DiagnosticsSnapshot {
        self.diagnostics.snapshot()
    }

    /// Shared counters, readable from other threads.
    pub fn diagnostics_handle(&self) -> Arc<PipelineDiagnostics> {
        Arc::clone(&self.diagnostics)
    }

    // ── Internal helpers ─────────────────────────────────────────────────────

    fn stop(&mut self, reason: StopReason, detail: Option<String>) {
        if let Some(source) = self.source.as_mut() {
            source.close();
        }
        let failure = match &reason {
            StopReason::SourceFailed(r) => Some(*r),
            _ => None,
        };
        info!(?reason, "analyzer stopped");
        self.set_state(PipelineState::Stopped(reason), failure, detail);
    }

    fn set_state(
        &mut self,
        new_state: PipelineState,
        failure: Option<SourceFailureReason>,
        detail: Option<String>,
    ) {
        self.state = new_state;
        self.status_seq += 1;
        let _ = self.status_tx.send(StatusEvent {
            seq: self.status_seq,
            status: self.state.status(),
            failure,
            detail,
        });
    }
}

impl Drop for Analyzer {
    fn drop(&mut self) {
        if let Some(source) = self.source.as_mut() {
            source.close();
        }
    }
}

impl std::fmt::Debug for Analyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Analyzer")
            .field("config", &self.config)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}
