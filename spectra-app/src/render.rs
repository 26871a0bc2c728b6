//! Render targets for the command-line host.

use std::io::Write;

use spectra_core::{AnalysisFrame, RenderTarget};
use tracing::{info, warn};

/// Writes each frame as one JSON object per line.
pub struct JsonLinesTarget<W: Write> {
    writer: W,
    write_errors: u64,
}

impl<W: Write> JsonLinesTarget<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            write_errors: 0,
        }
    }

    pub fn write_errors(&self) -> u64 {
        self.write_errors
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    fn write_frame(&mut self, frame: &AnalysisFrame) -> std::io::Result<()> {
        serde_json::to_writer(&mut self.writer, frame)?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()
    }
}

impl<W: Write> RenderTarget for JsonLinesTarget<W> {
    fn render(&mut self, frame: &AnalysisFrame) {
        if let Err(e) = self.write_frame(frame) {
            // Log the first failure only; a closed pipe fails every frame.
            if self.write_errors == 0 {
                warn!("json output failed: {e}");
            }
            self.write_errors += 1;
        }
    }
}

/// Logs the loudest bin and the short-window RMS every `every` frames.
pub struct SummaryTarget {
    every: u64,
    seen: u64,
}

impl SummaryTarget {
    pub fn new(every: u64) -> Self {
        Self {
            every: every.max(1),
            seen: 0,
        }
    }

    pub fn seen(&self) -> u64 {
        self.seen
    }
}

/// One-line description of a frame: `(peak bin, peak Hz, peak dB, rms)`.
pub fn summarize(frame: &AnalysisFrame) -> Option<(usize, f64, f64, f64)> {
    let (bin, hz) = frame.peak()?;
    let db = frame.spectrum.get(bin).copied()?;
    Some((bin, hz, db, frame.rms()))
}

impl RenderTarget for SummaryTarget {
    fn render(&mut self, frame: &AnalysisFrame) {
        self.seen += 1;
        if self.seen % self.every != 0 {
            return;
        }
        match summarize(frame) {
            Some((bin, hz, db, rms)) => info!(
                seq = frame.seq,
                peak_bin = bin,
                peak_hz = hz,
                peak_db = db,
                rms,
                "frame"
            ),
            None => info!(seq = frame.seq, "frame (empty spectrum)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn frame(seq: u64) -> AnalysisFrame {
        AnalysisFrame {
            seq,
            short_waveform: vec![1.0, -1.0, 1.0, -1.0],
            long_waveform: vec![0.0; 8],
            spectrum: vec![-80.0, -12.0, -60.0, -70.0],
            frequency_axis: vec![250.0, 500.0, 750.0, 1000.0],
            spectrogram: vec![vec![-80.0, -12.0, -60.0, -70.0]],
        }
    }

    #[test]
    fn json_lines_one_object_per_frame() {
        let mut target = JsonLinesTarget::new(Vec::new());
        target.render(&frame(1));
        target.render(&frame(2));
        assert_eq!(target.write_errors(), 0);

        let out = String::from_utf8(target.into_inner()).unwrap();
        let lines: Vec<_> = out.lines().collect();
        assert_eq!(lines.len(), 2);
        let second: AnalysisFrame = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second, frame(2));
        assert!(lines[0].contains("\"shortWaveform\""));
    }

    struct BrokenPipe;

    impl Write for BrokenPipe {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Err(std::io::ErrorKind::BrokenPipe.into())
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn json_lines_counts_write_errors() {
        let mut target = JsonLinesTarget::new(BrokenPipe);
        target.render(&frame(1));
        target.render(&frame(2));
        assert_eq!(target.write_errors(), 2);
    }

    #[test]
    fn summary_picks_peak() {
        let (bin, hz, db, rms) = summarize(&frame(1)).unwrap();
        assert_eq!(bin, 1);
        assert_eq!(hz, 500.0);
        assert_eq!(db, -12.0);
        assert_abs_diff_eq!(rms, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn summary_counts_every_frame() {
        let mut target = SummaryTarget::new(0);
        for seq in 1..=3 {
            target.render(&frame(seq));
        }
        assert_eq!(target.seen(), 3);
    }
}
