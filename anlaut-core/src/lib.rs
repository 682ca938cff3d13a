//! # anlaut-core
//!
//! Reusable voice-activity-gated utterance recorder SDK.
//!
//! ## Architecture
//!
//! ```text
//! Microphone → AudioCapture → chunk queue (crossbeam) → capture session
//!                                                            │
//!                                                VAD decision + pre-roll
//!                                                            │
//!                                      CaptureOutcome { Utterance | NoSpeech | TooShort }
//!                                                            │
//!                                               Transcriber (trait seam)
//! ```
//!
//! The audio callback only converts and enqueues; all buffering, deadline
//! and classification work happens on the session thread.

#![forbid(unsafe_code)]
#![warn(clippy::all)]

pub mod audio;
pub mod buffering;
pub mod error;
pub mod recorder;
pub mod transcribe;
pub mod vad;

// Convenience re-exports for downstream crates
pub use audio::meter::LiveMeter;
pub use error::AnlautError;
pub use recorder::{
    CaptureOutcome, CaptureSource, RecorderConfig, Utterance, UtteranceRecorder,
};
pub use transcribe::{Transcriber, TranscriberHandle};
pub use vad::{VadDecision, VoiceActivityDetector};
