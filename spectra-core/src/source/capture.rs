//! Microphone sample source via the cpal backend.
//!
//! # Design constraints
//!
//! The cpal input callback runs on an OS audio thread at elevated priority. It
//! must not block or perform I/O, so it only down-mixes to mono and pushes into
//! the producer half of an SPSC ring (`push_slice` is lock-free). Samples that
//! do not fit are counted and dropped.
//!
//! `next_frame` runs on the tick thread and never waits: it drains whatever the
//! callback produced into a rolling window of the most recent `frame.len()`
//! samples and copies that window out. Until the device has delivered a full
//! frame the window is zero-padded at the front.
//!
//! # Threading note
//!
//! `cpal::Stream` is `!Send` on most platforms (COM on Windows, CoreAudio on
//! macOS). `CaptureSource` must be created, ticked and dropped on one thread.

use std::sync::{
    atomic::{AtomicBool, AtomicU64, Ordering},
    Arc,
};

#[cfg(feature = "audio-cpal")]
use cpal::{
    traits::{DeviceTrait, HostTrait, StreamTrait},
    FromSample, Sample, SampleFormat, SizedSample, Stream, StreamConfig,
};
use parking_lot::Mutex;
#[cfg(feature = "audio-cpal")]
use tracing::{error, info};
use tracing::warn;

use super::{SampleSource, SourceFailureReason};
use crate::{
    buffering::{create_capture_ring, CaptureConsumer, Consumer, RingBuffer},
    error::{Result, SpectraError},
};

/// Capture ring capacity: 2^17 samples ≈ 2.7 s at 48 kHz.
pub const DEFAULT_CAPTURE_RING: usize = 1 << 17;

/// Samples drained from the capture ring per `pop_slice` call.
const DRAIN_CHUNK: usize = 1024;

/// Map a backend error message to a failure reason.
///
/// Backends surface permission refusals as free-form text (CoreAudio, WASAPI
/// and PipeWire all word it differently), so this matches on keywords.
pub fn classify_failure(message: &str) -> SourceFailureReason {
    let lowered = message.to_ascii_lowercase();
    let permission = ["permission", "denied", "not authorized", "access is denied"];
    if permission.iter().any(|k| lowered.contains(k)) {
        SourceFailureReason::PermissionDenied
    } else if lowered.contains("secure context") {
        SourceFailureReason::InsecureContext
    } else {
        SourceFailureReason::Unknown
    }
}

/// Live microphone input.
pub struct CaptureSource {
    preferred_device: Option<String>,
    ring_capacity: usize,
    /// Kept alive so the stream is not dropped prematurely.
    #[cfg(feature = "audio-cpal")]
    stream: Option<Stream>,
    consumer: Option<CaptureConsumer>,
    /// Shared flag; cleared to make the callback no-op before the stream drops.
    running: Arc<AtomicBool>,
    /// Last error reported by the stream error callback.
    stream_error: Arc<Mutex<Option<String>>>,
    dropped_samples: Arc<AtomicU64>,
    sample_rate: u32,
    drain_buf: Vec<f32>,
    window: Option<RingBuffer<f64>>,
    closed: bool,
}

impl CaptureSource {
    /// Capture from the system default input device.
    pub fn new() -> Self {
        Self {
            preferred_device: None,
            ring_capacity: DEFAULT_CAPTURE_RING,
            #[cfg(feature = "audio-cpal")]
            stream: None,
            consumer: None,
            running: Arc::new(AtomicBool::new(false)),
            stream_error: Arc::new(Mutex::new(None)),
            dropped_samples: Arc::new(AtomicU64::new(0)),
            sample_rate: 0,
            drain_buf: vec![0.0; DRAIN_CHUNK],
            window: None,
            closed: false,
        }
    }

    /// Prefer the input device with this exact name; falls back to the default.
    pub fn with_device(mut self, name: impl Into<String>) -> Self {
        self.preferred_device = Some(name.into());
        self
    }

    /// Samples buffered between the audio callback and `next_frame`.
    /// Zero makes `initialize` fail.
    pub fn with_ring_capacity(mut self, capacity: usize) -> Self {
        self.ring_capacity = capacity;
        self
    }

    /// Samples the callback had to drop because the ring was full.
    pub fn dropped_samples(&self) -> u64 {
        self.dropped_samples.load(Ordering::Relaxed)
    }

    /// Drain the capture ring into the rolling window sized to `frame_len`.
    fn drain(&mut self, frame_len: usize) -> Result<()> {
        if self.window.as_ref().map(|w| w.capacity()) != Some(frame_len) {
            self.window = Some(RingBuffer::new(frame_len)?);
        }
        let (Some(consumer), Some(window)) = (self.consumer.as_mut(), self.window.as_mut()) else {
            return Err(SpectraError::SourceClosed);
        };

        loop {
            let n = consumer.pop_slice(&mut self.drain_buf);
            if n == 0 {
                break;
            }
            window.append_all(self.drain_buf[..n].iter().map(|&s| f64::from(s)));
        }
        Ok(())
    }

    #[cfg(feature = "audio-cpal")]
    fn open(&mut self) -> std::result::Result<(), SourceFailureReason> {
        let host = cpal::default_host();
        let mut selected = None;

        if let Some(preferred) = self.preferred_device.as_deref() {
            match host.input_devices() {
                Ok(mut devices) => {
                    selected = devices.find(|d| d.name().map(|n| n == preferred).unwrap_or(false));
                    if selected.is_none() {
                        warn!("preferred input device '{preferred}' not found, falling back");
                    }
                }
                Err(e) => warn!("failed to list input devices while resolving preference: {e}"),
            }
        }

        let device = match selected.or_else(|| host.default_input_device()) {
            Some(device) => device,
            None => {
                let mut devices = host
                    .input_devices()
                    .map_err(|e| classify_failure(&e.to_string()))?;
                let fallback = devices.next().ok_or_else(|| {
                    warn!("no input device available");
                    SourceFailureReason::Unknown
                })?;
                warn!("no default input device, falling back to first available input");
                fallback
            }
        };

        info!(
            device = device.name().unwrap_or_default().as_str(),
            "opening input device"
        );

        let supported = device.default_input_config().map_err(|e| {
            warn!("default input config unavailable: {e}");
            classify_failure(&e.to_string())
        })?;
        let sample_rate = supported.sample_rate().0;
        let channels = usize::from(supported.channels().max(1));
        info!(sample_rate, channels, "audio config selected");

        let config: StreamConfig = supported.config();
        let (producer, consumer) =
            create_capture_ring(self.ring_capacity).map_err(|_| SourceFailureReason::Unknown)?;

        self.running.store(true, Ordering::Release);
        let callback = CallbackState {
            channels,
            producer,
            running: Arc::clone(&self.running),
            dropped: Arc::clone(&self.dropped_samples),
            mix_buf: Vec::new(),
        };
        let errors = Arc::clone(&self.stream_error);

        let stream = match supported.sample_format() {
            SampleFormat::F32 => build_stream::<f32>(&device, &config, callback, errors),
            SampleFormat::I16 => build_stream::<i16>(&device, &config, callback, errors),
            SampleFormat::U16 => build_stream::<u16>(&device, &config, callback, errors),
            SampleFormat::I32 => build_stream::<i32>(&device, &config, callback, errors),
            SampleFormat::U8 => build_stream::<u8>(&device, &config, callback, errors),
            fmt => {
                warn!("unsupported sample format: {fmt:?}");
                self.running.store(false, Ordering::Release);
                return Err(SourceFailureReason::Unknown);
            }
        }
        .map_err(|e| {
            warn!("failed to build input stream: {e}");
            self.running.store(false, Ordering::Release);
            classify_failure(&e.to_string())
        })?;

        stream.play().map_err(|e| {
            warn!("failed to start input stream: {e}");
            self.running.store(false, Ordering::Release);
            classify_failure(&e.to_string())
        })?;

        self.stream = Some(stream);
        self.consumer = Some(consumer);
        self.sample_rate = sample_rate;
        Ok(())
    }
}

impl Default for CaptureSource {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "audio-cpal")]
struct CallbackState {
    channels: usize,
    producer: crate::buffering::CaptureProducer,
    running: Arc<AtomicBool>,
    dropped: Arc<AtomicU64>,
    mix_buf: Vec<f32>,
}

#[cfg(feature = "audio-cpal")]
fn build_stream<T>(
    device: &cpal::Device,
    config: &StreamConfig,
    mut state: CallbackState,
    errors: Arc<Mutex<Option<String>>>,
) -> std::result::Result<Stream, cpal::BuildStreamError>
where
    T: SizedSample,
    f32: FromSample<T>,
{
    use crate::buffering::Producer;

    device.build_input_stream(
        config,
        move |data: &[T], _info: &cpal::InputCallbackInfo| {
            if !state.running.load(Ordering::Relaxed) {
                return;
            }
            let ch = state.channels;
            let frames = data.len() / ch;
            // Grows once to the device's callback size, then stays put.
            state.mix_buf.resize(frames, 0.0);
            for (dst, frame) in state.mix_buf.iter_mut().zip(data.chunks_exact(ch)) {
                let sum: f32 = frame.iter().map(|s| s.to_sample::<f32>()).sum();
                *dst = sum / ch as f32;
            }
            let written = state.producer.push_slice(&state.mix_buf);
            if written < frames {
                state
                    .dropped
                    .fetch_add((frames - written) as u64, Ordering::Relaxed);
            }
        },
        move |err| {
            error!("audio stream error: {err}");
            *errors.lock() = Some(err.to_string());
        },
        None,
    )
}

impl SampleSource for CaptureSource {
    #[cfg(feature = "audio-cpal")]
    fn initialize(&mut self) -> std::result::Result<(), SourceFailureReason> {
        if self.closed {
            return Err(SourceFailureReason::Unknown);
        }
        self.open()
    }

    /// Stub when the `audio-cpal` feature is disabled.
    #[cfg(not(feature = "audio-cpal"))]
    fn initialize(&mut self) -> std::result::Result<(), SourceFailureReason> {
        warn!("compiled without audio-cpal feature; microphone capture unavailable");
        Err(SourceFailureReason::Unknown)
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn next_frame(&mut self, frame: &mut [f64]) -> Result<()> {
        if self.closed {
            return Err(SpectraError::SourceClosed);
        }
        if let Some(msg) = self.stream_error.lock().take() {
            return Err(SpectraError::AudioStream(msg));
        }

        self.drain(frame.len())?;

        let Some(window) = self.window.as_ref() else {
            return Err(SpectraError::SourceClosed);
        };
        let pad = frame.len() - window.len();
        frame[..pad].fill(0.0);
        for (dst, &s) in frame[pad..].iter_mut().zip(window.iter()) {
            *dst = s;
        }
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.running.store(false, Ordering::Release);
        #[cfg(feature = "audio-cpal")]
        {
            // Dropping the stream releases the device on this thread.
            self.stream = None;
        }
        self.consumer = None;
        self.closed = true;
        let dropped = self.dropped_samples();
        if dropped > 0 {
            warn!(dropped, "capture ring overflowed during the session");
        }
    }
}

impl Drop for CaptureSource {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffering::Producer;

    #[test]
    fn classifies_permission_messages() {
        assert_eq!(
            classify_failure("A backend-specific error has occurred: Permission denied"),
            SourceFailureReason::PermissionDenied
        );
        assert_eq!(
            classify_failure("Access is denied. (0x80070005)"),
            SourceFailureReason::PermissionDenied
        );
        assert_eq!(
            classify_failure("The requested device is no longer available"),
            SourceFailureReason::Unknown
        );
    }

    #[test]
    fn next_frame_pads_then_keeps_latest_samples() {
        let mut src = CaptureSource::new();
        let (mut producer, consumer) = create_capture_ring(64).unwrap();
        src.consumer = Some(consumer);

        producer.push_slice(&[1.0, 2.0]);
        let mut frame = [9.0; 4];
        src.next_frame(&mut frame).unwrap();
        assert_eq!(frame, [0.0, 0.0, 1.0, 2.0]);

        producer.push_slice(&[3.0, 4.0, 5.0]);
        src.next_frame(&mut frame).unwrap();
        assert_eq!(frame, [2.0, 3.0, 4.0, 5.0]);
    }

    #[test]
    fn stream_error_surfaces_on_next_frame() {
        let mut src = CaptureSource::new();
        let (_producer, consumer) = create_capture_ring(8).unwrap();
        src.consumer = Some(consumer);
        *src.stream_error.lock() = Some("device unplugged".into());

        let mut frame = [0.0; 4];
        let err = src.next_frame(&mut frame).unwrap_err();
        assert!(matches!(err, SpectraError::AudioStream(msg) if msg == "device unplugged"));
    }

    #[test]
    fn ring_capacity_is_configurable() {
        let src = CaptureSource::new();
        assert_eq!(src.ring_capacity, DEFAULT_CAPTURE_RING);
        let src = CaptureSource::new().with_device("USB Mic").with_ring_capacity(4096);
        assert_eq!(src.ring_capacity, 4096);
        assert_eq!(src.preferred_device.as_deref(), Some("USB Mic"));
    }

    #[test]
    fn close_is_idempotent() {
        let mut src = CaptureSource::new();
        src.close();
        src.close();
        assert!(src.is_closed());
        let mut frame = [0.0; 4];
        assert!(matches!(
            src.next_frame(&mut frame),
            Err(SpectraError::SourceClosed)
        ));
    }
}
