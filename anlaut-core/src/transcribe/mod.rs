//! Transcription seam.
//!
//! The recorder hands a finished clip to whatever speaks this trait; the
//! capture machinery never learns how text is produced. `&mut self` on
//! `transcribe` allows stateful backends; all mutation is serialised through
//! `TranscriberHandle`'s `parking_lot::Mutex`.

pub mod stub;

use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::Result;
use crate::recorder::Utterance;

/// Contract for transcription backends: PCM in, text out.
///
/// Failures must surface as `Err` — an empty string would be
/// indistinguishable from a legitimately silent clip.
pub trait Transcriber: Send + 'static {
    fn transcribe(&mut self, utterance: &Utterance) -> Result<String>;
}

/// Thread-safe reference-counted handle to any `Transcriber` implementor.
#[derive(Clone)]
pub struct TranscriberHandle(pub Arc<Mutex<dyn Transcriber>>);

impl TranscriberHandle {
    pub fn new<T: Transcriber>(transcriber: T) -> Self {
        Self(Arc::new(Mutex::new(transcriber)))
    }
}

impl std::fmt::Debug for TranscriberHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TranscriberHandle").finish_non_exhaustive()
    }
}
