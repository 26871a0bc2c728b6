//! Spectral analysis primitives.
//!
//! - [`fft::Radix2Fft`]: fixed-length FFT → dB magnitude spectrum.
//! - [`axis::FrequencyAxis`]: bin index → Hz for that spectrum.

pub mod axis;
pub mod fft;

pub use axis::FrequencyAxis;
pub use fft::{Radix2Fft, DEFAULT_DB_FLOOR};
