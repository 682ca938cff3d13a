//! Audio capture via the cpal backend.
//!
//! # Design constraints
//!
//! The cpal input callback runs on an OS audio thread at elevated priority.
//! It **must not** block on a lock or perform I/O. The callback therefore
//! only converts samples to f32, downmixes to mono and `try_send`s finished
//! chunks into the queue; a full queue drops the chunk and bumps a counter.
//!
//! # Threading note
//!
//! `cpal::Stream` is `!Send` on most platforms (COM on Windows, CoreAudio on
//! macOS). `AudioCapture` must be created and dropped on the same thread.
//! The recorder opens it on the thread that runs the session loop, so the
//! stream is a scoped acquisition released on every exit path.

pub mod device;
pub(crate) mod dispatch;
pub mod meter;
pub mod resample;
pub mod wav;

#[cfg(feature = "audio-cpal")]
use cpal::{
    traits::{DeviceTrait, StreamTrait},
    SampleFormat, SampleRate, Stream, StreamConfig,
};

use std::sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Arc,
};
use std::time::Duration;

use crate::buffering::ChunkSender;
use crate::error::{AnlautError, Result};
#[cfg(feature = "audio-cpal")]
use tracing::{error, info, warn};

/// Handle to an active audio capture stream.
///
/// **Not `Send`** — bound to its creation thread on Windows/macOS.
pub struct AudioCapture {
    /// Kept alive so the stream is not dropped prematurely.
    #[cfg(feature = "audio-cpal")]
    _stream: Stream,
    /// Shared flag — set to `false` to make the callback a no-op.
    running: Arc<AtomicBool>,
    /// Chunks discarded because the queue was full.
    dropped: Arc<AtomicUsize>,
    /// Actual capture sample rate reported by the device (Hz).
    pub sample_rate: u32,
}

impl AudioCapture {
    /// Signal the callback to stop feeding the queue.
    pub fn stop(&self) {
        self.running.store(false, Ordering::Release);
    }

    /// Number of chunks dropped on the producer side so far.
    pub fn dropped_chunks(&self) -> usize {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Open an input device and start pushing `chunk_duration`-sized mono
    /// chunks at the device's native rate into `sender`.
    ///
    /// Device selection: `preferred_device` by exact name, otherwise the
    /// system default, otherwise the first available input. `channels` is
    /// requested from the backend as-is; multi-channel input is averaged
    /// down to mono in the callback.
    ///
    /// A stream error after open flips `failed` so the consumer can abort
    /// instead of mistaking a dead device for silence.
    ///
    /// # Errors
    /// `AnlautError::NoDefaultInputDevice` when no microphone exists,
    /// `AnlautError::AudioDevice` / `AnlautError::AudioStream` when the
    /// backend rejects the configuration.
    #[cfg(feature = "audio-cpal")]
    pub fn open(
        sender: ChunkSender,
        running: Arc<AtomicBool>,
        failed: Arc<AtomicBool>,
        preferred_device: Option<&str>,
        channels: u16,
        chunk_duration: Duration,
    ) -> Result<Self> {
        use cpal::traits::HostTrait;

        let host = cpal::default_host();
        let mut selected = None;

        if let Some(name) = preferred_device {
            match host.input_devices() {
                Ok(mut devices) => {
                    selected =
                        devices.find(|d| d.name().map(|n| n == name).unwrap_or(false));
                    if selected.is_none() {
                        warn!("preferred input device '{name}' not found, falling back");
                    }
                }
                Err(e) => {
                    warn!("failed to list input devices while resolving preference: {e}");
                }
            }
        }

        let device = if let Some(device) = selected {
            device
        } else if let Some(default) = host.default_input_device() {
            default
        } else {
            let mut devices = host
                .input_devices()
                .map_err(|e| AnlautError::AudioDevice(e.to_string()))?;
            let fallback = devices.next().ok_or(AnlautError::NoDefaultInputDevice)?;
            warn!("no default input device, falling back to first available input");
            fallback
        };

        info!(
            device = device.name().unwrap_or_default().as_str(),
            "opening input device"
        );

        let supported = device
            .default_input_config()
            .map_err(|e| AnlautError::AudioDevice(e.to_string()))?;

        let sample_rate = supported.sample_rate().0;
        let channels = channels.max(1);
        let chunk_samples = (sample_rate as f64 * chunk_duration.as_secs_f64())
            .round()
            .max(1.0) as usize;

        info!(sample_rate, channels, chunk_samples, "capture config selected");

        let config = StreamConfig {
            channels,
            sample_rate: SampleRate(sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let dropped = Arc::new(AtomicUsize::new(0));
        let ch = channels as usize;

        let stream = match supported.sample_format() {
            SampleFormat::F32 => {
                let running_cb = Arc::clone(&running);
                let mut dispatcher = dispatch::ChunkDispatcher::new(
                    chunk_samples,
                    sample_rate,
                    sender.clone(),
                    Arc::clone(&dropped),
                );
                device.build_input_stream(
                    &config,
                    move |data: &[f32], _info| {
                        if !running_cb.load(Ordering::Relaxed) {
                            return;
                        }
                        dispatcher.push(data, ch, |sample| sample);
                    },
                    stream_error_handler(Arc::clone(&failed)),
                    None,
                )
            }

            SampleFormat::I16 => {
                let running_cb = Arc::clone(&running);
                let mut dispatcher = dispatch::ChunkDispatcher::new(
                    chunk_samples,
                    sample_rate,
                    sender.clone(),
                    Arc::clone(&dropped),
                );
                device.build_input_stream(
                    &config,
                    move |data: &[i16], _info| {
                        if !running_cb.load(Ordering::Relaxed) {
                            return;
                        }
                        dispatcher.push(data, ch, |sample| sample as f32 / 32_768.0);
                    },
                    stream_error_handler(Arc::clone(&failed)),
                    None,
                )
            }

            SampleFormat::U16 => {
                let running_cb = Arc::clone(&running);
                let mut dispatcher = dispatch::ChunkDispatcher::new(
                    chunk_samples,
                    sample_rate,
                    sender.clone(),
                    Arc::clone(&dropped),
                );
                device.build_input_stream(
                    &config,
                    move |data: &[u16], _info| {
                        if !running_cb.load(Ordering::Relaxed) {
                            return;
                        }
                        dispatcher
                            .push(data, ch, |sample| (sample as f32 - 32_768.0) / 32_768.0);
                    },
                    stream_error_handler(Arc::clone(&failed)),
                    None,
                )
            }

            fmt => {
                return Err(AnlautError::AudioStream(format!(
                    "unsupported sample format: {fmt:?}"
                )))
            }
        }
        .map_err(|e| AnlautError::AudioStream(e.to_string()))?;

        stream
            .play()
            .map_err(|e| AnlautError::AudioStream(e.to_string()))?;

        Ok(Self {
            _stream: stream,
            running,
            dropped,
            sample_rate,
        })
    }

    /// Stub when the `audio-cpal` feature is disabled.
    #[cfg(not(feature = "audio-cpal"))]
    pub fn open(
        _sender: ChunkSender,
        _running: Arc<AtomicBool>,
        _failed: Arc<AtomicBool>,
        _preferred_device: Option<&str>,
        _channels: u16,
        _chunk_duration: Duration,
    ) -> Result<Self> {
        Err(AnlautError::AudioStream(
            "compiled without audio-cpal feature".into(),
        ))
    }
}

#[cfg(feature = "audio-cpal")]
fn stream_error_handler(failed: Arc<AtomicBool>) -> impl FnMut(cpal::StreamError) {
    move |err| {
        error!("audio stream error: {err}");
        failed.store(true, Ordering::Release);
    }
}
