//! Mono downmix and fixed-size chunk dispatch for the capture callback.
//!
//! The cpal callback hands us interleaved frames in whatever format the
//! device speaks. Everything funnels through here: convert to f32, average
//! channels down to mono, slice into chunk-sized blocks, and `try_send` them
//! into the queue. The callback must never block, so a full queue drops the
//! chunk and bumps a counter instead.

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use crossbeam_channel::TrySendError;

use crate::buffering::{chunk::AudioChunk, ChunkSender};

/// Append `data` to `out` as mono f32, averaging interleaved channels.
pub(crate) fn extend_mono<T, F>(out: &mut Vec<f32>, data: &[T], channels: usize, mut convert: F)
where
    T: Copy,
    F: FnMut(T) -> f32,
{
    if channels <= 1 {
        out.extend(data.iter().copied().map(&mut convert));
        return;
    }
    for frame in data.chunks(channels) {
        let sum: f32 = frame.iter().copied().map(&mut convert).sum();
        out.push(sum / frame.len() as f32);
    }
}

/// Accumulates mono samples and emits fixed-size `AudioChunk`s.
pub(crate) struct ChunkDispatcher {
    chunk_samples: usize,
    sample_rate: u32,
    pending: Vec<f32>,
    sender: ChunkSender,
    dropped: Arc<AtomicUsize>,
}

impl ChunkDispatcher {
    pub(crate) fn new(
        chunk_samples: usize,
        sample_rate: u32,
        sender: ChunkSender,
        dropped: Arc<AtomicUsize>,
    ) -> Self {
        let chunk_samples = chunk_samples.max(1);
        Self {
            chunk_samples,
            sample_rate,
            pending: Vec::with_capacity(chunk_samples * 2),
            sender,
            dropped,
        }
    }

    /// Feed raw interleaved device samples; emits zero or more chunks.
    pub(crate) fn push<T, F>(&mut self, data: &[T], channels: usize, convert: F)
    where
        T: Copy,
        F: FnMut(T) -> f32,
    {
        extend_mono(&mut self.pending, data, channels, convert);

        while self.pending.len() >= self.chunk_samples {
            let samples: Vec<f32> = self.pending.drain(..self.chunk_samples).collect();
            match self
                .sender
                .try_send(AudioChunk::new(samples, self.sample_rate))
            {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    self.dropped.fetch_add(1, Ordering::Relaxed);
                }
                Err(TrySendError::Disconnected(_)) => break,
            }
        }
    }
}
