//! Chunk handoff between the capture callback and the session loop.
//!
//! The audio callback is the producer, the session loop the consumer — a
//! single-producer/single-consumer pair. A bounded `crossbeam_channel` keeps
//! the callback non-blocking (`try_send`, dropping on overflow) while the
//! consumer blocks with a short timeout so its deadline checks keep running.

pub mod chunk;
pub mod preroll;

use self::chunk::AudioChunk;
use crossbeam_channel::{bounded, Receiver, Sender};

/// Producer half — held by the audio callback.
pub type ChunkSender = Sender<AudioChunk>;

/// Consumer half — held by the session loop.
pub type ChunkReceiver = Receiver<AudioChunk>;

/// Default queue depth in chunks. At the default 100 ms slice this buffers
/// over six seconds of audio before the callback starts dropping.
pub const DEFAULT_QUEUE_CAPACITY: usize = 64;

/// Create a matched sender/receiver pair for audio chunks.
pub fn chunk_queue(capacity: usize) -> (ChunkSender, ChunkReceiver) {
    bounded(capacity.max(1))
}
