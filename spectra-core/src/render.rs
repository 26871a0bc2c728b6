//! Render target abstraction.
//!
//! The analyzer hands one [`AnalysisFrame`] per tick to a `RenderTarget`; how it
//! is drawn (chart, terminal, JSON stream) is entirely the target's business.

use crate::ipc::events::AnalysisFrame;

/// Consumer of per-tick analysis snapshots.
pub trait RenderTarget {
    fn render(&mut self, frame: &AnalysisFrame);
}

impl<F> RenderTarget for F
where
    F: FnMut(&AnalysisFrame),
{
    fn render(&mut self, frame: &AnalysisFrame) {
        self(frame)
    }
}

/// Keeps the most recent frame and a count of frames seen.
#[derive(Debug, Default)]
pub struct FrameRecorder {
    last: Option<AnalysisFrame>,
    frames: u64,
}

impl FrameRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last(&self) -> Option<&AnalysisFrame> {
        self.last.as_ref()
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }
}

impl RenderTarget for FrameRecorder {
    fn render(&mut self, frame: &AnalysisFrame) {
        self.frames += 1;
        self.last = Some(frame.clone());
    }
}
