//! Voice Activity Detection (VAD) abstraction.
//!
//! The `VoiceActivityDetector` trait is the extensibility point: the session
//! loop only sees speech/silence decisions, so the amplitude detector can be
//! swapped for anything smarter without touching the capture machinery.

pub mod amplitude;

use crate::buffering::chunk::AudioChunk;

/// Whether a given audio chunk contains speech or silence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VadDecision {
    /// The chunk's level is above the speech threshold.
    Speech,
    /// The chunk is below threshold.
    Silence,
}

impl VadDecision {
    pub fn is_speech(self) -> bool {
        self == VadDecision::Speech
    }
}

/// Trait for all VAD implementations.
///
/// Implementors may be stateful; the session loop calls `reset` before a new
/// capture begins.
pub trait VoiceActivityDetector: Send + 'static {
    /// Analyse a chunk and return a speech/silence decision.
    ///
    /// The chunk's `sample_rate` should match whatever rate this detector
    /// was configured for. Resampling is the caller's responsibility.
    fn classify(&mut self, chunk: &AudioChunk) -> VadDecision;

    /// Reset any internal state between capture sessions.
    fn reset(&mut self);
}
