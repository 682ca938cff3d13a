//! Bounded pre-roll of the chunks heard just before speech onset.
//!
//! Threshold detection fires one chunk *after* the speaker starts talking, so
//! the first phoneme lives in the chunks that arrived while we were still
//! listening. The pre-roll keeps a short rolling window of those chunks; when
//! onset is detected the whole window seeds the recording so the utterance
//! begins slightly before the threshold crossing.

use std::collections::vec_deque::Drain;
use std::collections::VecDeque;

use super::chunk::AudioChunk;

/// Ordered, size-bounded queue of the most recent pre-onset chunks.
///
/// Bounded by total sample count. Pushing past the bound evicts whole chunks
/// from the front until the bound holds again.
#[derive(Debug)]
pub struct PreRollBuffer {
    chunks: VecDeque<AudioChunk>,
    total_samples: usize,
    max_samples: usize,
}

impl PreRollBuffer {
    /// Create a pre-roll holding at most `max_samples` samples.
    pub fn new(max_samples: usize) -> Self {
        Self {
            chunks: VecDeque::new(),
            total_samples: 0,
            max_samples: max_samples.max(1),
        }
    }

    /// Append a chunk, evicting the oldest chunks while over the bound.
    pub fn push(&mut self, chunk: AudioChunk) {
        self.total_samples = self.total_samples.saturating_add(chunk.samples.len());
        self.chunks.push_back(chunk);
        while self.total_samples > self.max_samples {
            match self.chunks.pop_front() {
                Some(evicted) => {
                    self.total_samples = self.total_samples.saturating_sub(evicted.samples.len());
                }
                None => break,
            }
        }
    }

    /// Number of chunks currently held.
    pub fn len_chunks(&self) -> usize {
        self.chunks.len()
    }

    /// Total samples currently held.
    pub fn total_samples(&self) -> usize {
        self.total_samples
    }

    /// Drain all held chunks, oldest first, leaving the buffer empty.
    pub fn drain(&mut self) -> Drain<'_, AudioChunk> {
        self.total_samples = 0;
        self.chunks.drain(..)
    }
}
