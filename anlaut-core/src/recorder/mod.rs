//! One-shot voice-activity-gated utterance capture.
//!
//! ## Lifecycle
//!
//! ```text
//! UtteranceRecorder::new(config)
//!     └─► capture()          → device opened, session loop runs, stream dropped
//!           ├─ Utterance(..)   speech captured, onset pre-roll included
//!           ├─ NoSpeech        nothing crossed the threshold before the cap
//!           └─ TooShort {..}   speech attempted but the clip was discarded
//! ```
//!
//! `capture_or_fixed` layers the fallback policy on top: a rejected clip is
//! discarded (never merged) and one plain timed recording is taken instead.
//!
//! The recorder owns its full configuration — device preference included —
//! so nothing here reads ambient global state.

pub mod session;

use std::sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Arc,
};
use std::time::Duration;

use serde::Serialize;
use tracing::info;

use crate::{
    audio::{meter::LiveMeter, resample::RateConverter, AudioCapture},
    buffering::{chunk_queue, DEFAULT_QUEUE_CAPACITY},
    error::{AnlautError, Result},
    vad::{amplitude::AmplitudeVad, VoiceActivityDetector},
};

/// Configuration for `UtteranceRecorder`. All fields have working defaults.
#[derive(Debug, Clone)]
pub struct RecorderConfig {
    /// Target sample rate of captured clips (Hz). Device audio at another
    /// rate is converted. Default: 16000.
    pub sample_rate: u32,
    /// Channel count requested from the input device. Clips are always
    /// mono; multi-channel input is averaged down. Default: 1.
    pub channels: u16,
    /// Length of one processing slice. Default: 100 ms.
    pub chunk_duration: Duration,
    /// Normalized-amplitude level above which a chunk counts as speech.
    /// Default: 0.001.
    pub vad_threshold: f32,
    /// Audio retained from before speech onset. Default: 500 ms.
    pub pre_buffer_duration: Duration,
    /// Continuous sub-threshold time that ends an utterance. Default: 2 s.
    pub silence_limit: Duration,
    /// Shortest accepted utterance; shorter clips are discarded.
    /// Default: 500 ms.
    pub min_speech_duration: Duration,
    /// Hard cap on capture time regardless of activity. Default: 30 s.
    pub max_duration: Duration,
    /// Length of the fixed-duration fallback recording. Default: 5 s.
    pub fallback_duration: Duration,
    /// Chunk queue depth between the callback and the session loop.
    /// Default: 64.
    pub queue_capacity: usize,
    /// Input device selected by exact name; `None` uses the system default.
    pub preferred_device: Option<String>,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16_000,
            channels: 1,
            chunk_duration: Duration::from_millis(100),
            vad_threshold: 0.001,
            pre_buffer_duration: Duration::from_millis(500),
            silence_limit: Duration::from_secs(2),
            min_speech_duration: Duration::from_millis(500),
            max_duration: Duration::from_secs(30),
            fallback_duration: Duration::from_secs(5),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            preferred_device: None,
        }
    }
}

impl RecorderConfig {
    /// Reject configurations the capture loop cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 {
            return Err(AnlautError::InvalidConfig("sample_rate must be non-zero".into()));
        }
        if self.channels == 0 {
            return Err(AnlautError::InvalidConfig("channels must be non-zero".into()));
        }
        if self.chunk_duration.is_zero() {
            return Err(AnlautError::InvalidConfig("chunk_duration must be non-zero".into()));
        }
        if !self.vad_threshold.is_finite() || self.vad_threshold < 0.0 {
            return Err(AnlautError::InvalidConfig(
                "vad_threshold must be finite and non-negative".into(),
            ));
        }
        if self.silence_limit.is_zero() {
            return Err(AnlautError::InvalidConfig("silence_limit must be non-zero".into()));
        }
        if self.max_duration.is_zero() {
            return Err(AnlautError::InvalidConfig("max_duration must be non-zero".into()));
        }
        if self.fallback_duration.is_zero() {
            return Err(AnlautError::InvalidConfig(
                "fallback_duration must be non-zero".into(),
            ));
        }
        if self.queue_capacity == 0 {
            return Err(AnlautError::InvalidConfig("queue_capacity must be non-zero".into()));
        }
        Ok(())
    }

    /// Pre-roll bound in samples at the target rate.
    pub(crate) fn pre_roll_samples(&self) -> usize {
        ((self.sample_rate as f64 * self.pre_buffer_duration.as_secs_f64()).round() as usize).max(1)
    }

    /// Samples per chunk at the given capture rate.
    pub(crate) fn chunk_samples_at(&self, rate: u32) -> usize {
        (rate as f64 * self.chunk_duration.as_secs_f64()).round().max(1.0) as usize
    }
}

/// A finished clip believed to contain one utterance.
#[derive(Debug, Clone)]
pub struct Utterance {
    /// Mono f32 samples in [-1.0, 1.0].
    pub samples: Vec<f32>,
    /// Sample rate in Hz.
    pub sample_rate: u32,
}

impl Utterance {
    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.samples.len() as f64 / self.sample_rate as f64)
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Result of one voice-activity-gated capture attempt.
///
/// `NoSpeech` and `TooShort` are deliberately distinct: the caller may want
/// a different fallback for "nobody spoke" than for "someone spoke but the
/// clip was unusable".
#[derive(Debug, Clone)]
pub enum CaptureOutcome {
    /// A finished utterance, pre-roll included.
    Utterance(Utterance),
    /// Nothing crossed the speech threshold before the overall cap.
    NoSpeech,
    /// Speech was detected but the clip fell short of the minimum length.
    TooShort {
        /// How much audio the discarded clip held.
        captured: Duration,
    },
}

/// Which strategy produced the clip returned by `capture_or_fixed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureSource {
    VoiceActivated,
    FixedFallback,
}

/// Shared per-capture counters for observability.
#[derive(Debug, Default)]
pub struct SessionDiagnostics {
    pub chunks_in: AtomicUsize,
    pub chunks_converted: AtomicUsize,
    pub vad_windows: AtomicUsize,
    pub speech_windows: AtomicUsize,
    pub chunks_dropped: AtomicUsize,
}

impl SessionDiagnostics {
    pub fn reset(&self) {
        self.chunks_in.store(0, Ordering::Relaxed);
        self.chunks_converted.store(0, Ordering::Relaxed);
        self.vad_windows.store(0, Ordering::Relaxed);
        self.speech_windows.store(0, Ordering::Relaxed);
        self.chunks_dropped.store(0, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> DiagnosticsSnapshot {
        DiagnosticsSnapshot {
            chunks_in: self.chunks_in.load(Ordering::Relaxed),
            chunks_converted: self.chunks_converted.load(Ordering::Relaxed),
            vad_windows: self.vad_windows.load(Ordering::Relaxed),
            speech_windows: self.speech_windows.load(Ordering::Relaxed),
            chunks_dropped: self.chunks_dropped.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of the session counters.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct DiagnosticsSnapshot {
    pub chunks_in: usize,
    pub chunks_converted: usize,
    pub vad_windows: usize,
    pub speech_windows: usize,
    pub chunks_dropped: usize,
}

/// One-shot recorder: "capture one utterance, given this configuration."
pub struct UtteranceRecorder {
    config: RecorderConfig,
    meter: Option<LiveMeter>,
    diagnostics: Arc<SessionDiagnostics>,
}

impl UtteranceRecorder {
    /// Create a recorder after validating the configuration.
    pub fn new(config: RecorderConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            meter: None,
            diagnostics: Arc::new(SessionDiagnostics::default()),
        })
    }

    /// Attach a live level meter updated once per processed chunk.
    pub fn with_meter(mut self, meter: LiveMeter) -> Self {
        self.meter = Some(meter);
        self
    }

    pub fn config(&self) -> &RecorderConfig {
        &self.config
    }

    /// Counters from the most recent capture call.
    pub fn diagnostics_snapshot(&self) -> DiagnosticsSnapshot {
        self.diagnostics.snapshot()
    }

    /// Capture zero-or-one utterances from the configured input device.
    ///
    /// Blocks until the session ends. The input stream is opened at entry
    /// and dropped on every exit path — normal termination, timeout or
    /// error — before this returns.
    ///
    /// # Errors
    /// Device-open failure and mid-capture stream death are hard errors;
    /// they are never reported as an empty-but-successful capture.
    pub fn capture(&self) -> Result<CaptureOutcome> {
        self.diagnostics.reset();
        let (sender, receiver) = chunk_queue(self.config.queue_capacity);
        let running = Arc::new(AtomicBool::new(true));
        let failed = Arc::new(AtomicBool::new(false));

        let capture = AudioCapture::open(
            sender,
            Arc::clone(&running),
            Arc::clone(&failed),
            self.config.preferred_device.as_deref(),
            self.config.channels,
            self.config.chunk_duration,
        )?;

        let converter = RateConverter::new(
            capture.sample_rate,
            self.config.sample_rate,
            self.config.chunk_samples_at(capture.sample_rate),
        )?;
        let vad: Box<dyn VoiceActivityDetector> =
            Box::new(AmplitudeVad::new(self.config.vad_threshold));

        let result = session::run(session::SessionContext {
            config: self.config.clone(),
            vad,
            receiver,
            converter,
            meter: self.meter.clone(),
            failed,
            diagnostics: Arc::clone(&self.diagnostics),
        });

        capture.stop();
        self.diagnostics
            .chunks_dropped
            .store(capture.dropped_chunks(), Ordering::Relaxed);
        // Input stream released here, before control returns to the caller.
        drop(capture);

        result
    }

    /// Plain timed capture of exactly `duration`, no gating.
    pub fn capture_fixed(&self, duration: Duration) -> Result<Utterance> {
        self.diagnostics.reset();
        let (sender, receiver) = chunk_queue(self.config.queue_capacity);
        let running = Arc::new(AtomicBool::new(true));
        let failed = Arc::new(AtomicBool::new(false));

        let capture = AudioCapture::open(
            sender,
            Arc::clone(&running),
            Arc::clone(&failed),
            self.config.preferred_device.as_deref(),
            self.config.channels,
            self.config.chunk_duration,
        )?;

        let converter = RateConverter::new(
            capture.sample_rate,
            self.config.sample_rate,
            self.config.chunk_samples_at(capture.sample_rate),
        )?;

        let result = session::run_fixed(
            receiver,
            converter,
            self.config.sample_rate,
            duration,
            self.meter.clone(),
            failed,
            Arc::clone(&self.diagnostics),
        );

        capture.stop();
        self.diagnostics
            .chunks_dropped
            .store(capture.dropped_chunks(), Ordering::Relaxed);
        drop(capture);

        result
    }

    /// Voice-activated capture with the fixed-duration fallback.
    ///
    /// A `TooShort` clip is discarded, never merged into the fallback
    /// recording; `NoSpeech` likewise falls through to one timed capture of
    /// `fallback_duration`.
    pub fn capture_or_fixed(&self) -> Result<(Utterance, CaptureSource)> {
        match self.capture()? {
            CaptureOutcome::Utterance(utterance) => {
                Ok((utterance, CaptureSource::VoiceActivated))
            }
            CaptureOutcome::NoSpeech => {
                info!("no speech detected — falling back to a fixed-duration recording");
                let utterance = self.capture_fixed(self.config.fallback_duration)?;
                Ok((utterance, CaptureSource::FixedFallback))
            }
            CaptureOutcome::TooShort { captured } => {
                info!(
                    captured_ms = captured.as_millis() as u64,
                    "clip below minimum length — discarding and falling back to a fixed-duration recording"
                );
                let utterance = self.capture_fixed(self.config.fallback_duration)?;
                Ok((utterance, CaptureSource::FixedFallback))
            }
        }
    }
}
