//! Deterministic synthetic source: a sum of sines plus optional white noise.
//!
//! Useful for demos without a microphone and for reproducible tests. Noise
//! comes from a seeded LCG so two sources built the same way emit identical
//! frames.

use std::f64::consts::PI;

use tracing::debug;

use super::{SampleSource, SourceFailureReason};
use crate::error::{Result, SpectraError};

const LCG_A: u64 = 6_364_136_223_846_793_005;
const LCG_C: u64 = 1_442_695_040_888_963_407;

#[derive(Debug, Clone, Copy, PartialEq)]
struct Partial {
    frequency: f64,
    amplitude: f64,
}

/// Synthetic tone generator.
#[derive(Debug, Clone)]
pub struct ToneSource {
    sample_rate: u32,
    partials: Vec<Partial>,
    noise_amplitude: f64,
    noise_state: u64,
    /// Index of the next sample to generate.
    cursor: u64,
    frames_emitted: u64,
    /// Close automatically after this many frames.
    frame_limit: Option<u64>,
    closed: bool,
}

impl ToneSource {
    /// A silent source at `sample_rate`; add partials with [`ToneSource::with_tone`].
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            partials: Vec::new(),
            noise_amplitude: 0.0,
            noise_state: 0,
            cursor: 0,
            frames_emitted: 0,
            frame_limit: None,
            closed: false,
        }
    }

    pub fn with_tone(mut self, frequency: f64, amplitude: f64) -> Self {
        self.partials.push(Partial {
            frequency,
            amplitude,
        });
        self
    }

    pub fn with_noise(mut self, amplitude: f64, seed: u64) -> Self {
        self.noise_amplitude = amplitude;
        self.noise_state = seed;
        self
    }

    pub fn with_frame_limit(mut self, frames: u64) -> Self {
        self.frame_limit = Some(frames);
        self
    }

    fn next_noise(&mut self) -> f64 {
        self.noise_state = self.noise_state.wrapping_mul(LCG_A).wrapping_add(LCG_C);
        (self.noise_state as f64 / u64::MAX as f64) * 2.0 - 1.0
    }
}

impl SampleSource for ToneSource {
    fn initialize(&mut self) -> std::result::Result<(), SourceFailureReason> {
        if self.sample_rate == 0 {
            return Err(SourceFailureReason::Unknown);
        }
        debug!(
            sample_rate = self.sample_rate,
            partials = self.partials.len(),
            "tone source ready"
        );
        Ok(())
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn next_frame(&mut self, frame: &mut [f64]) -> Result<()> {
        if self.closed {
            return Err(SpectraError::SourceClosed);
        }

        let rate = self.sample_rate as f64;
        for slot in frame.iter_mut() {
            let t = self.cursor as f64 / rate;
            let mut value: f64 = self
                .partials
                .iter()
                .map(|p| p.amplitude * (2.0 * PI * p.frequency * t).sin())
                .sum();
            if self.noise_amplitude > 0.0 {
                value += self.noise_amplitude * self.next_noise();
            }
            *slot = value;
            self.cursor += 1;
        }

        self.frames_emitted += 1;
        if self.frame_limit.is_some_and(|limit| self.frames_emitted >= limit) {
            debug!(frames = self.frames_emitted, "tone source reached frame limit");
            self.closed = true;
        }
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed
    }

    fn close(&mut self) {
        self.closed = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn silent_by_default() {
        let mut src = ToneSource::new(8000);
        src.initialize().unwrap();
        let mut frame = [1.0; 16];
        src.next_frame(&mut frame).unwrap();
        assert!(frame.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn phase_continues_across_frames() {
        let mut split = ToneSource::new(8000).with_tone(440.0, 0.5);
        let mut whole = ToneSource::new(8000).with_tone(440.0, 0.5);

        let mut a = [0.0; 32];
        let mut b = [0.0; 32];
        split.next_frame(&mut a).unwrap();
        split.next_frame(&mut b).unwrap();

        let mut joined = [0.0; 64];
        whole.next_frame(&mut joined).unwrap();

        assert_eq!(&joined[..32], &a);
        assert_eq!(&joined[32..], &b);
    }

    #[test]
    fn same_seed_same_noise() {
        let mut a = ToneSource::new(8000).with_noise(0.1, 42);
        let mut b = ToneSource::new(8000).with_noise(0.1, 42);
        let mut fa = [0.0; 64];
        let mut fb = [0.0; 64];
        a.next_frame(&mut fa).unwrap();
        b.next_frame(&mut fb).unwrap();
        assert_eq!(fa, fb);
        assert!(fa.iter().all(|s| s.abs() <= 0.1));
    }

    #[test]
    fn closes_after_frame_limit() {
        let mut src = ToneSource::new(8000).with_frame_limit(2);
        let mut frame = [0.0; 8];
        src.next_frame(&mut frame).unwrap();
        assert!(!src.is_closed());
        src.next_frame(&mut frame).unwrap();
        assert!(src.is_closed());
        assert!(matches!(
            src.next_frame(&mut frame),
            Err(SpectraError::SourceClosed)
        ));
    }

    #[test]
    fn zero_sample_rate_fails_acquisition() {
        let mut src = ToneSource::new(0);
        assert_eq!(src.initialize(), Err(SourceFailureReason::Unknown));
    }
}
