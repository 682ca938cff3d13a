//! `StubTranscriber` — placeholder backend that echoes clip metadata.
//!
//! Lets the console front-end and tests exercise the full capture →
//! transcribe flow without a real speech backend.

use tracing::debug;

use super::Transcriber;
use crate::error::{AnlautError, Result};
use crate::recorder::Utterance;

/// Echo-style stub backend.
pub struct StubTranscriber {
    clips_seen: u32,
}

impl StubTranscriber {
    pub fn new() -> Self {
        Self { clips_seen: 0 }
    }
}

impl Default for StubTranscriber {
    fn default() -> Self {
        Self::new()
    }
}

impl Transcriber for StubTranscriber {
    fn transcribe(&mut self, utterance: &Utterance) -> Result<String> {
        if utterance.is_empty() {
            return Err(AnlautError::Transcription("empty utterance".into()));
        }
        self.clips_seen += 1;
        debug!(clips_seen = self.clips_seen, "stub transcription");
        Ok(format!(
            "[clip {}: {} samples @ {} Hz]",
            self.clips_seen,
            utterance.samples.len(),
            utterance.sample_rate
        ))
    }
}
