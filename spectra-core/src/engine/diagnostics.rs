use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Counters updated by the analyzer on every tick.
///
/// Atomics so a host can hold an `Arc` and read them from another thread.
#[derive(Debug, Default)]
pub struct PipelineDiagnostics {
    pub ticks: AtomicU64,
    pub samples_in: AtomicU64,
    pub frames_rendered: AtomicU64,
    pub rejected_ticks: AtomicU64,
    pub source_errors: AtomicU64,
}

impl PipelineDiagnostics {
    pub fn reset(&self) {
        self.ticks.store(0, Ordering::Relaxed);
        self.samples_in.store(0, Ordering::Relaxed);
        self.frames_rendered.store(0, Ordering::Relaxed);
        self.rejected_ticks.store(0, Ordering::Relaxed);
        self.source_errors.store(0, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> DiagnosticsSnapshot {
        DiagnosticsSnapshot {
            ticks: self.ticks.load(Ordering::Relaxed),
            samples_in: self.samples_in.load(Ordering::Relaxed),
            frames_rendered: self.frames_rendered.load(Ordering::Relaxed),
            rejected_ticks: self.rejected_ticks.load(Ordering::Relaxed),
            source_errors: self.source_errors.load(Ordering::Relaxed),
        }
    }

    pub(crate) fn bump(counter: &AtomicU64, by: u64) {
        counter.fetch_add(by, Ordering::Relaxed);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticsSnapshot {
    /// Ticks that completed and produced a frame.
    pub ticks: u64,
    pub samples_in: u64,
    pub frames_rendered: u64,
    /// `tick()` calls made outside the `Running` state.
    pub rejected_ticks: u64,
    pub source_errors: u64,
}
