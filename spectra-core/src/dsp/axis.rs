//! Bin index → frequency mapping for the spectrum view.

use crate::error::{Result, SpectraError};

/// Immutable frequency (Hz) for every spectrum bin.
///
/// `axis[i] = (i + 1) * sample_rate / frame_size`. The first bin is reported one
/// bin-width above DC so the axis stays positive on a logarithmic chart.
#[derive(Debug, Clone, PartialEq)]
pub struct FrequencyAxis {
    values: Vec<f64>,
    hz_per_bin: f64,
}

impl FrequencyAxis {
    /// Build the axis for a `frame_size`-sample transform at `sample_rate` Hz.
    ///
    /// # Errors
    /// `SpectraError::InvalidConfig` if `frame_size < 2` or `sample_rate == 0`.
    pub fn new(frame_size: usize, sample_rate: u32) -> Result<Self> {
        if frame_size < 2 {
            return Err(SpectraError::InvalidConfig(format!(
                "frame size must be at least 2, got {frame_size}"
            )));
        }
        if sample_rate == 0 {
            return Err(SpectraError::InvalidConfig(
                "sample rate must be greater than zero".into(),
            ));
        }

        let hz_per_bin = sample_rate as f64 / frame_size as f64;
        let values = (0..frame_size / 2)
            .map(|i| (i + 1) as f64 * hz_per_bin)
            .collect();

        Ok(Self { values, hz_per_bin })
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Frequency resolution in Hz.
    pub fn hz_per_bin(&self) -> f64 {
        self.hz_per_bin
    }

    /// Frequency of `bin`, or `None` past the last bin.
    pub fn frequency(&self, bin: usize) -> Option<f64> {
        self.values.get(bin).copied()
    }
}
