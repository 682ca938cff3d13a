//! Amplitude-threshold VAD.
//!
//! Classifies a chunk by its normalized amplitude — the L2 norm of the
//! samples divided by the sample count — against a fixed threshold. The
//! metric deliberately shrinks with chunk length so the threshold can sit
//! very low (default 0.001) and still reject room tone.
//!
//! There is no hangover state here: trailing-silence handling belongs to the
//! session loop's silence deadline, not the classifier.

use super::{VadDecision, VoiceActivityDetector};
use crate::buffering::chunk::AudioChunk;

/// Default speech threshold for the normalized-amplitude metric.
pub const DEFAULT_THRESHOLD: f32 = 0.001;

/// Normalized amplitude of a sample slice: `||s||₂ / len(s)`.
///
/// Returns 0.0 for an empty slice.
pub fn normalized_amplitude(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_sq: f32 = samples.iter().map(|s| s * s).sum();
    sum_sq.sqrt() / samples.len() as f32
}

/// Stateless amplitude-threshold voice activity detector.
#[derive(Debug, Clone)]
pub struct AmplitudeVad {
    /// Normalized-amplitude level above which a chunk counts as speech.
    threshold: f32,
}

impl AmplitudeVad {
    pub fn new(threshold: f32) -> Self {
        Self { threshold }
    }
}

impl Default for AmplitudeVad {
    fn default() -> Self {
        Self::new(DEFAULT_THRESHOLD)
    }
}

impl VoiceActivityDetector for AmplitudeVad {
    fn classify(&mut self, chunk: &AudioChunk) -> VadDecision {
        if normalized_amplitude(&chunk.samples) > self.threshold {
            VadDecision::Speech
        } else {
            VadDecision::Silence
        }
    }

    fn reset(&mut self) {}
}
