//! Radix-2 decimation-in-time FFT producing a decibel magnitude spectrum.
//!
//! ## Algorithm
//!
//! 1. Bit-reversal permutation of the real input into the complex scratch array.
//! 2. `log2(N)` in-place butterfly stages.
//! 3. `20·log10(|X[k]| / N)` for the first `N/2` bins; the mirror half is discarded.
//!
//! All working memory (scratch, twiddle table, output row) is allocated once in
//! [`Radix2Fft::new`]; [`Radix2Fft::run`] and [`Radix2Fft::run_into`] never allocate.
//!
//! ## Twiddle table
//!
//! The butterfly at offset `j` of a stage with segment length `L` rotates by
//! `θ = (2π/N)·(N/L)·j`. `N/L` is a power of two, so `(2π/N)·(N/L)` is exact and
//! `θ` equals `(2π/N)·k` for `k = (N/L)·j` bit for bit. The table therefore holds
//! `N/2` entries indexed by `k` and yields the same values as evaluating the
//! trigonometry per butterfly.

use std::f64::consts::PI;

use rustfft::num_complex::Complex;

use crate::error::{Result, SpectraError};

/// Default lower clamp applied to dB output, so `log10(0)` never leaks `-inf`.
///
/// Only `-inf` and finite values are clamped; a NaN bin stays NaN so corrupt
/// input is distinguishable from silence.
///
/// Sits below the ≈ -190 dB rounding floor of `f64` for unit-scale input.
pub const DEFAULT_DB_FLOOR: f64 = -240.0;

/// Fixed-length radix-2 FFT engine.
#[derive(Debug, Clone)]
pub struct Radix2Fft {
    /// Transform length `N`.
    n: usize,
    /// `log2(N)`.
    m: u32,
    /// Complex working array, written in bit-reversed order then transformed in place.
    scratch: Vec<Complex<f64>>,
    /// `e^{-2πik/N}` for `k` in `0..N/2`.
    twiddles: Vec<Complex<f64>>,
    /// Engine-owned output row returned by [`Radix2Fft::run`].
    output: Vec<f64>,
    /// `None` passes `-inf` through for silent bins.
    db_floor: Option<f64>,
}

impl Radix2Fft {
    /// Create an engine for `n` real input samples.
    ///
    /// # Errors
    /// `SpectraError::InvalidLength` unless `n` is a power of two and `n >= 2`.
    pub fn new(n: usize) -> Result<Self> {
        if n < 2 || !n.is_power_of_two() {
            return Err(SpectraError::InvalidLength(n));
        }

        let two_pi_n = PI * 2.0 / n as f64;
        let twiddles = (0..n / 2)
            .map(|k| {
                if k == 0 {
                    Complex::new(1.0, 0.0)
                } else {
                    let theta = two_pi_n * k as f64;
                    Complex::new(theta.cos(), -theta.sin())
                }
            })
            .collect();

        Ok(Self {
            n,
            m: n.trailing_zeros(),
            scratch: vec![Complex::new(0.0, 0.0); n],
            twiddles,
            output: vec![0.0; n / 2],
            db_floor: Some(DEFAULT_DB_FLOOR),
        })
    }

    /// Replace the dB clamp. `None` lets silent bins report `f64::NEG_INFINITY`.
    pub fn with_db_floor(mut self, floor: Option<f64>) -> Self {
        self.db_floor = floor;
        self
    }

    /// Transform length `N`.
    pub fn len(&self) -> usize {
        self.n
    }

    /// Always false; an engine holds at least two samples.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Number of valid output bins, `N/2`.
    pub fn fft_size(&self) -> usize {
        self.n / 2
    }

    /// Transform `samples` and return the engine-owned dB spectrum of length `N/2`.
    ///
    /// # Errors
    /// `SpectraError::LengthMismatch` if `samples.len() != N`.
    pub fn run(&mut self, samples: &[f64]) -> Result<&[f64]> {
        self.transform(samples)?;
        Self::magnitudes_db(&self.scratch, self.n, self.db_floor, &mut self.output);
        Ok(&self.output)
    }

    /// Transform `samples` and write the dB spectrum into `out`.
    ///
    /// # Errors
    /// `SpectraError::LengthMismatch` if `samples.len() != N` or `out.len() != N/2`.
    pub fn run_into(&mut self, samples: &[f64], out: &mut [f64]) -> Result<()> {
        if out.len() != self.fft_size() {
            return Err(SpectraError::LengthMismatch {
                expected: self.fft_size(),
                actual: out.len(),
            });
        }
        self.transform(samples)?;
        Self::magnitudes_db(&self.scratch, self.n, self.db_floor, out);
        Ok(())
    }

    fn transform(&mut self, samples: &[f64]) -> Result<()> {
        if samples.len() != self.n {
            return Err(SpectraError::LengthMismatch {
                expected: self.n,
                actual: samples.len(),
            });
        }

        // ── Bit-reversal permutation ─────────────────────────────────────────
        for (i, &sample) in samples.iter().enumerate() {
            let mut reversed = 0usize;
            let mut addr = i;
            for bit in 0..self.m {
                if addr & 0x01 != 0 {
                    reversed += 1 << (self.m - 1 - bit);
                }
                addr >>= 1;
                if addr == 0 {
                    break;
                }
            }
            self.scratch[reversed] = Complex::new(sample, 0.0);
        }

        // ── Butterfly stages ─────────────────────────────────────────────────
        for stage in 1..=self.m {
            let segment_len = 1usize << stage;
            let half = segment_len / 2;
            let stride = self.n / segment_len;

            for j in 0..half {
                let w = self.twiddles[stride * j];

                let mut hi = j;
                while hi < self.n {
                    let lo = hi + half;
                    let t = if j == 0 {
                        self.scratch[lo]
                    } else {
                        self.scratch[lo] * w
                    };
                    let top = self.scratch[hi];
                    self.scratch[lo] = top - t;
                    self.scratch[hi] = top + t;
                    hi += segment_len;
                }
            }
        }

        Ok(())
    }

    fn magnitudes_db(scratch: &[Complex<f64>], n: usize, floor: Option<f64>, out: &mut [f64]) {
        let scale = n as f64;
        for (dst, c) in out.iter_mut().zip(scratch) {
            let magnitude = (c.re * c.re + c.im * c.im).sqrt();
            let db = 20.0 * (magnitude / scale).log10();
            // NaN from a corrupt sample is passed through, never clamped.
            *dst = match floor {
                Some(f) if !db.is_nan() => db.max(f),
                _ => db,
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use rustfft::FftPlanner;

    fn impulse(n: usize) -> Vec<f64> {
        let mut v = vec![0.0; n];
        v[0] = 1.0;
        v
    }

    fn mixed_signal(n: usize) -> Vec<f64> {
        (0..n)
            .map(|i| {
                let t = i as f64 / n as f64;
                0.3 + (2.0 * PI * 3.3 * t).sin() + 0.5 * (2.0 * PI * 17.7 * t).cos()
            })
            .collect()
    }

    #[test]
    fn rejects_non_power_of_two_lengths() {
        for n in [0, 1, 3, 6, 12, 1000] {
            let err = Radix2Fft::new(n).unwrap_err();
            assert!(matches!(err, SpectraError::InvalidLength(got) if got == n));
        }
    }

    #[test]
    fn reports_half_length_as_fft_size() {
        let fft = Radix2Fft::new(1024).unwrap();
        assert_eq!(fft.len(), 1024);
        assert_eq!(fft.fft_size(), 512);
    }

    #[test]
    fn rejects_input_of_wrong_length() {
        let mut fft = Radix2Fft::new(8).unwrap();
        let err = fft.run(&[0.0; 7]).unwrap_err();
        assert!(matches!(
            err,
            SpectraError::LengthMismatch {
                expected: 8,
                actual: 7
            }
        ));
    }

    #[test]
    fn run_into_checks_output_width() {
        let mut fft = Radix2Fft::new(8).unwrap();
        let mut out = [0.0; 3];
        let err = fft.run_into(&impulse(8), &mut out).unwrap_err();
        assert!(matches!(
            err,
            SpectraError::LengthMismatch {
                expected: 4,
                actual: 3
            }
        ));
    }

    #[test]
    fn zero_input_clamps_to_floor_for_every_size() {
        let mut n = 2;
        while n <= 4096 {
            let mut fft = Radix2Fft::new(n).unwrap();
            let out = fft.run(&vec![0.0; n]).unwrap();
            assert_eq!(out.len(), n / 2);
            assert!(out.iter().all(|&db| db == DEFAULT_DB_FLOOR), "n={n}");
            n *= 2;
        }
    }

    #[test]
    fn zero_input_without_floor_is_negative_infinity() {
        let mut fft = Radix2Fft::new(16).unwrap().with_db_floor(None);
        let out = fft.run(&[0.0; 16]).unwrap();
        assert!(out.iter().all(|&db| db == f64::NEG_INFINITY));
    }

    #[test]
    fn nan_input_is_not_reported_as_silence() {
        let mut fft = Radix2Fft::new(8).unwrap();
        let mut samples = [0.0; 8];
        samples[3] = f64::NAN;
        let out = fft.run(&samples).unwrap();
        assert!(out.iter().all(|db| db.is_nan()));

        // The engine recovers once the input is clean again.
        let out = fft.run(&[0.0; 8]).unwrap();
        assert!(out.iter().all(|&db| db == DEFAULT_DB_FLOOR));
    }

    #[test]
    fn impulse_gives_flat_spectrum() {
        let mut fft = Radix2Fft::new(8).unwrap();
        let out = fft.run(&impulse(8)).unwrap();
        assert_eq!(out.len(), 4);
        for &db in out {
            assert_abs_diff_eq!(db, -18.0618, epsilon = 1e-4);
            assert_abs_diff_eq!(db, 20.0 * (1.0f64 / 8.0).log10(), epsilon = 1e-12);
        }
    }

    #[test]
    fn bin_centred_sine_peaks_at_its_bin() {
        let n = 64;
        let bin = 5;
        let samples: Vec<f64> = (0..n)
            .map(|i| (2.0 * PI * bin as f64 * i as f64 / n as f64).sin())
            .collect();

        let mut fft = Radix2Fft::new(n).unwrap();
        let out = fft.run(&samples).unwrap();

        // |X[k]| = N/2 for a unit sine centred on bin k.
        assert_abs_diff_eq!(out[bin], 20.0 * 0.5f64.log10(), epsilon = 1e-9);
        let peak = out
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i)
            .unwrap();
        assert_eq!(peak, bin);
    }

    #[test]
    fn two_engines_are_deterministic() {
        let samples = mixed_signal(256);
        let mut a = Radix2Fft::new(256).unwrap();
        let mut b = Radix2Fft::new(256).unwrap();
        let first = a.run(&samples).unwrap().to_vec();
        let second = b.run(&samples).unwrap().to_vec();
        assert_eq!(first, second);

        // Scratch reuse must not leak state between calls.
        let again = a.run(&samples).unwrap();
        assert_eq!(again, first.as_slice());
    }

    #[test]
    fn matches_rustfft_reference() {
        let n = 512;
        let samples = mixed_signal(n);

        let mut buffer: Vec<Complex<f64>> =
            samples.iter().map(|&s| Complex::new(s, 0.0)).collect();
        FftPlanner::new().plan_fft_forward(n).process(&mut buffer);

        let mut fft = Radix2Fft::new(n).unwrap();
        let out = fft.run(&samples).unwrap();

        for (k, (&db, reference)) in out.iter().zip(&buffer).enumerate() {
            let expected = 20.0 * (reference.norm() / n as f64).log10();
            assert_abs_diff_eq!(db, expected, epsilon = 1e-6);
            assert!(db.is_finite(), "bin {k} not finite");
        }
    }
}
