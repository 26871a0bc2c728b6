//! Persistent application settings (JSON file in the app data directory).

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use spectra_core::{source::capture::DEFAULT_CAPTURE_RING, AnalyzerConfig};

/// Where samples come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Synthetic sine (+ optional noise).
    Tone,
    /// Default or preferred input device.
    Mic,
}

/// How rendered frames leave the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// One `AnalysisFrame` JSON object per line on stdout.
    Json,
    /// Peak frequency and RMS in the log.
    Summary,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(default)]
pub struct AppSettings {
    pub analyzer: AnalyzerConfig,
    pub source: SourceKind,
    pub preferred_input_device: Option<String>,
    /// Microphone hand-off ring size in samples.
    pub capture_ring_capacity: usize,
    pub tone_hz: f64,
    pub tone_amplitude: f64,
    pub noise_amplitude: f64,
    pub noise_seed: u64,
    /// Frame clock rate.
    pub fps: u32,
    pub output: OutputFormat,
    /// `SummaryTarget` logs one line every this many frames.
    pub summary_every: u64,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            analyzer: AnalyzerConfig::default(),
            source: SourceKind::Tone,
            preferred_input_device: None,
            capture_ring_capacity: DEFAULT_CAPTURE_RING,
            tone_hz: 440.0,
            tone_amplitude: 0.5,
            noise_amplitude: 0.0,
            noise_seed: 1,
            fps: 60,
            output: OutputFormat::Summary,
            summary_every: 30,
        }
    }
}

impl AppSettings {
    pub fn normalize(&mut self) {
        let a = &mut self.analyzer;
        a.frame_size = normalize_frame_size(a.frame_size);
        a.sample_rate = a.sample_rate.clamp(1_000, 384_000);
        a.short_capacity = a.short_capacity.clamp(1, 1 << 20);
        a.long_capacity = a.long_capacity.clamp(1, 1 << 24);
        a.spectrogram_depth = a.spectrogram_depth.clamp(1, 4096);
        a.db_floor = a.db_floor.filter(|f| f.is_finite());

        let nyquist = f64::from(a.sample_rate) / 2.0;
        self.tone_hz = if self.tone_hz.is_finite() {
            self.tone_hz.clamp(1.0, nyquist)
        } else {
            440.0
        };
        self.tone_amplitude = clamp_unit(self.tone_amplitude);
        self.noise_amplitude = clamp_unit(self.noise_amplitude);
        self.fps = self.fps.clamp(1, 240);
        self.capture_ring_capacity = self.capture_ring_capacity.clamp(4096, 1 << 22);
        self.summary_every = self.summary_every.max(1);
        self.preferred_input_device = self
            .preferred_input_device
            .as_ref()
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty());
    }
}

/// Round up to a power of two within `32..=32768`.
pub fn normalize_frame_size(raw: usize) -> usize {
    raw.clamp(32, 32_768).next_power_of_two()
}

fn clamp_unit(v: f64) -> f64 {
    if v.is_finite() {
        v.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

pub fn default_settings_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."))
            .join("Spectra")
            .join("settings.json")
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var_os("XDG_DATA_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|| {
                std::env::var_os("HOME")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from("/tmp"))
                    .join(".local")
                    .join("share")
            })
            .join("spectra")
            .join("settings.json")
    }
}

/// Missing or unreadable files fall back to defaults.
pub fn load_settings(path: &Path) -> AppSettings {
    let mut settings = fs::read_to_string(path)
        .ok()
        .and_then(|raw| serde_json::from_str::<AppSettings>(&raw).ok())
        .unwrap_or_default();
    settings.normalize();
    settings
}

pub fn save_settings(path: &Path, settings: &AppSettings) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(settings).map_err(std::io::Error::other)?;
    fs::write(path, json)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_survive_normalize() {
        let mut s = AppSettings::default();
        s.normalize();
        assert_eq!(s, AppSettings::default());
    }

    #[test]
    fn frame_size_rounds_to_power_of_two() {
        assert_eq!(normalize_frame_size(0), 32);
        assert_eq!(normalize_frame_size(1000), 1024);
        assert_eq!(normalize_frame_size(2048), 2048);
        assert_eq!(normalize_frame_size(1 << 20), 32_768);
    }

    #[test]
    fn normalize_clamps_out_of_range_values() {
        let mut s = AppSettings {
            tone_hz: 90_000.0,
            tone_amplitude: 4.0,
            noise_amplitude: f64::NAN,
            fps: 0,
            summary_every: 0,
            preferred_input_device: Some("   ".into()),
            capture_ring_capacity: 0,
            ..AppSettings::default()
        };
        s.analyzer.spectrogram_depth = 0;
        s.analyzer.db_floor = Some(f64::NEG_INFINITY);
        s.normalize();

        assert_eq!(s.tone_hz, 22_050.0);
        assert_eq!(s.tone_amplitude, 1.0);
        assert_eq!(s.noise_amplitude, 0.0);
        assert_eq!(s.fps, 1);
        assert_eq!(s.summary_every, 1);
        assert_eq!(s.preferred_input_device, None);
        assert_eq!(s.capture_ring_capacity, 4096);
        assert_eq!(s.analyzer.spectrogram_depth, 1);
        assert_eq!(s.analyzer.db_floor, None);
        s.analyzer.validate().unwrap();
    }

    #[test]
    fn partial_json_fills_defaults() {
        let raw = r#"{"source": "mic", "output": "json", "analyzer": {"frameSize": 4096}}"#;
        let s: AppSettings = serde_json::from_str(raw).unwrap();
        assert_eq!(s.source, SourceKind::Mic);
        assert_eq!(s.output, OutputFormat::Json);
        assert_eq!(s.analyzer.frame_size, 4096);
        assert_eq!(s.analyzer.spectrogram_depth, 200);
        assert_eq!(s.fps, 60);
    }

    #[test]
    fn save_then_load() {
        let dir = std::env::temp_dir().join(format!("spectra-settings-{}", std::process::id()));
        let path = dir.join("settings.json");
        let s = AppSettings {
            tone_hz: 1000.0,
            source: SourceKind::Mic,
            ..AppSettings::default()
        };

        save_settings(&path, &s).unwrap();
        assert_eq!(load_settings(&path), s);
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn missing_file_gives_defaults() {
        let s = load_settings(Path::new("/nonexistent/spectra/settings.json"));
        assert_eq!(s, AppSettings::default());
    }
}
