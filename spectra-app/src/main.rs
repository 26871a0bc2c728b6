//! Spectra command-line host.
//!
//! Loads settings, picks a sample source and drives `Analyzer::tick` from a
//! `tokio::time::interval` frame clock on a current-thread runtime. Status
//! events are forwarded to the log by a background task.

mod render;
mod settings;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use settings::{default_settings_path, load_settings, save_settings, OutputFormat, SourceKind};
use spectra_core::{
    source::device::list_input_devices, Analyzer, CaptureSource, PipelineStatus, RenderTarget,
    SampleSource, SpectraError, StatusEvent, ToneSource,
};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use crate::render::{JsonLinesTarget, SummaryTarget};
use crate::settings::AppSettings;

#[derive(Parser, Debug)]
#[command(name = "spectra")]
#[command(about = "Streaming audio spectrum analyzer")]
#[command(version)]
struct Cli {
    /// Settings file (defaults to the app data directory)
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Sample source
    #[arg(long, value_enum)]
    source: Option<SourceKind>,

    /// Stop after this many frames (0 = until the source closes or Ctrl-C)
    #[arg(long, default_value = "0")]
    ticks: u64,

    /// Frame clock rate
    #[arg(long)]
    fps: Option<u32>,

    /// Output format
    #[arg(long, value_enum)]
    output: Option<OutputFormat>,

    /// Samples per frame (rounded up to a power of two)
    #[arg(long)]
    frame_size: Option<usize>,

    /// Tone frequency for `--source tone`
    #[arg(long)]
    tone_hz: Option<f64>,

    /// Input device name for `--source mic`
    #[arg(long)]
    device: Option<String>,

    /// Write the effective settings back to the settings file
    #[arg(long)]
    save_settings: bool,

    /// List audio input devices and exit
    #[arg(long)]
    list_devices: bool,
}

impl Cli {
    fn apply(&self, settings: &mut AppSettings) {
        if let Some(source) = self.source {
            settings.source = source;
        }
        if let Some(fps) = self.fps {
            settings.fps = fps;
        }
        if let Some(output) = self.output {
            settings.output = output;
        }
        if let Some(frame_size) = self.frame_size {
            settings.analyzer.frame_size = frame_size;
        }
        if let Some(hz) = self.tone_hz {
            settings.tone_hz = hz;
        }
        if let Some(device) = self.device.as_ref() {
            settings.preferred_input_device = Some(device.clone());
        }
        settings.normalize();
    }
}

fn main() -> Result<()> {
    // ── Tracing ───────────────────────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("spectra=info")),
        )
        .init();

    let cli = Cli::parse();

    if cli.list_devices {
        for device in list_input_devices() {
            let rate = device
                .sample_rate
                .map(|hz| format!("{hz} Hz"))
                .unwrap_or_else(|| "? Hz".into());
            println!(
                "{}  [{rate}, {} ch]{}{}",
                device.name,
                device.channels.unwrap_or(0),
                if device.is_default { " (default)" } else { "" },
                if device.is_monitor { " (loopback)" } else { "" },
            );
        }
        return Ok(());
    }

    let settings_path = cli.settings.clone().unwrap_or_else(default_settings_path);
    let mut app_settings = load_settings(&settings_path);
    cli.apply(&mut app_settings);
    info!(
        settings_path = ?settings_path,
        source = ?app_settings.source,
        output = ?app_settings.output,
        fps = app_settings.fps,
        frame_size = app_settings.analyzer.frame_size,
        "settings loaded"
    );
    if cli.save_settings {
        save_settings(&settings_path, &app_settings)
            .with_context(|| format!("writing {}", settings_path.display()))?;
        info!("settings saved");
    }

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("building tokio runtime")?;
    runtime.block_on(run(app_settings, cli.ticks))
}

fn build_source(settings: &AppSettings) -> Box<dyn SampleSource> {
    match settings.source {
        SourceKind::Tone => {
            let mut tone = ToneSource::new(settings.analyzer.sample_rate)
                .with_tone(settings.tone_hz, settings.tone_amplitude);
            if settings.noise_amplitude > 0.0 {
                tone = tone.with_noise(settings.noise_amplitude, settings.noise_seed);
            }
            Box::new(tone)
        }
        SourceKind::Mic => {
            let mut capture =
                CaptureSource::new().with_ring_capacity(settings.capture_ring_capacity);
            if let Some(name) = settings.preferred_input_device.as_ref() {
                capture = capture.with_device(name.clone());
            }
            Box::new(capture)
        }
    }
}

fn build_target(settings: &AppSettings) -> Box<dyn RenderTarget> {
    match settings.output {
        OutputFormat::Json => Box::new(JsonLinesTarget::new(std::io::stdout())),
        OutputFormat::Summary => Box::new(SummaryTarget::new(settings.summary_every)),
    }
}

async fn forward_status(mut status_rx: broadcast::Receiver<StatusEvent>) {
    loop {
        match status_rx.recv().await {
            Ok(event) => {
                if let Some(reason) = event.failure {
                    warn!(seq = event.seq, %reason, "{}", reason.message());
                } else if event.status == PipelineStatus::Stopped {
                    info!(seq = event.seq, detail = ?event.detail, "analyzer stopped");
                } else {
                    info!(seq = event.seq, status = ?event.status, "analyzer status");
                }
            }
            Err(RecvError::Lagged(n)) => {
                warn!("status receiver lagged by {n} events");
            }
            Err(RecvError::Closed) => break,
        }
    }
}

async fn run(settings: AppSettings, max_ticks: u64) -> Result<()> {
    let mut analyzer = Analyzer::new(settings.analyzer.clone());
    let status_task = tokio::spawn(forward_status(analyzer.subscribe_status()));

    analyzer.initialize().context("initializing analyzer")?;
    let attached = analyzer.attach_source(build_source(&settings));

    let outcome = match attached {
        Ok(()) => drive(&mut analyzer, &settings, max_ticks).await,
        Err(e) => Err(anyhow::Error::new(e).context("acquiring sample source")),
    };

    analyzer.shutdown();
    let diagnostics = analyzer.diagnostics();
    info!(
        ticks = diagnostics.ticks,
        samples_in = diagnostics.samples_in,
        frames_rendered = diagnostics.frames_rendered,
        rejected_ticks = diagnostics.rejected_ticks,
        source_errors = diagnostics.source_errors,
        "run finished"
    );

    // Dropping the analyzer closes the status channel and ends the forwarder.
    drop(analyzer);
    if let Err(e) = status_task.await {
        warn!("status task failed: {e}");
    }
    outcome
}

async fn drive(analyzer: &mut Analyzer, settings: &AppSettings, max_ticks: u64) -> Result<()> {
    let mut target = build_target(settings);
    let period = Duration::from_secs_f64(1.0 / f64::from(settings.fps));
    let mut clock = tokio::time::interval(period);
    clock.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let mut ticks = 0u64;
    loop {
        tokio::select! {
            _ = clock.tick() => {}
            _ = &mut ctrl_c => {
                info!("interrupted");
                return Ok(());
            }
        }

        match analyzer.tick(target.as_mut()) {
            Ok(_) => {}
            Err(SpectraError::SourceClosed) => return Ok(()),
            Err(e) => return Err(anyhow::Error::new(e).context("analyzer tick")),
        }

        ticks += 1;
        if max_ticks != 0 && ticks >= max_ticks {
            return Ok(());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_overrides_settings() {
        let cli = Cli::parse_from([
            "spectra",
            "--source",
            "mic",
            "--fps",
            "30",
            "--output",
            "json",
            "--frame-size",
            "1000",
            "--device",
            "USB Mic",
        ]);
        let mut settings = AppSettings::default();
        cli.apply(&mut settings);

        assert_eq!(settings.source, SourceKind::Mic);
        assert_eq!(settings.fps, 30);
        assert_eq!(settings.output, OutputFormat::Json);
        assert_eq!(settings.analyzer.frame_size, 1024);
        assert_eq!(settings.preferred_input_device.as_deref(), Some("USB Mic"));
    }

    #[test]
    fn absent_flags_keep_settings() {
        let cli = Cli::parse_from(["spectra"]);
        let mut settings = AppSettings::default();
        cli.apply(&mut settings);
        assert_eq!(settings, AppSettings::default());
        assert_eq!(cli.ticks, 0);
    }

    #[tokio::test]
    async fn bounded_tone_run_finishes() {
        let settings = AppSettings {
            fps: 240,
            ..AppSettings::default()
        };
        run(settings, 3).await.unwrap();
    }
}
