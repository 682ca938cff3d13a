//! Sample-rate conversion using a rubato `FastFixedIn` resampler.
//!
//! Input devices deliver audio at their native rate (commonly 44.1 or
//! 48 kHz); the recorder is configured for a fixed target (16 kHz by
//! default). `RateConverter` bridges the gap on the session thread, where
//! allocation is fine. When the rates already match it is a plain copy and
//! no rubato session is created at all.

use rubato::{FastFixedIn, PolynomialDegree, Resampler};
use tracing::{error, info};

use crate::error::{AnlautError, Result};

/// Converts f32 mono audio from one fixed sample rate to another.
pub struct RateConverter {
    /// `None` when capture rate == target rate (passthrough mode).
    resampler: Option<FastFixedIn<f32>>,
    /// Holds partial input between calls until a full rubato block exists.
    input_buf: Vec<f32>,
    /// Input samples rubato consumes per process call.
    block_size: usize,
    /// Pre-allocated rubato output buffer: `[1][output_frames_max]`.
    output_buf: Vec<Vec<f32>>,
}

impl RateConverter {
    /// Create a converter from `capture_rate` to `target_rate` Hz.
    ///
    /// `block_size` is the input frame count handed to rubato per call —
    /// one capture chunk works well.
    ///
    /// # Errors
    /// Returns `AnlautError::AudioStream` if rubato fails to initialise.
    pub fn new(capture_rate: u32, target_rate: u32, block_size: usize) -> Result<Self> {
        if capture_rate == target_rate {
            return Ok(Self {
                resampler: None,
                input_buf: Vec::new(),
                block_size,
                output_buf: Vec::new(),
            });
        }

        let ratio = target_rate as f64 / capture_rate as f64;
        let resampler = FastFixedIn::<f32>::new(
            ratio,
            1.0, // fixed ratio, no dynamic adjustment
            PolynomialDegree::Cubic,
            block_size,
            1, // mono
        )
        .map_err(|e| AnlautError::AudioStream(format!("resampler init: {e}")))?;

        let max_out = resampler.output_frames_max();
        info!(capture_rate, target_rate, block_size, "rate conversion enabled");

        Ok(Self {
            resampler: Some(resampler),
            input_buf: Vec::new(),
            block_size,
            output_buf: vec![vec![0f32; max_out]; 1],
        })
    }

    /// Convert incoming samples; output may be empty while rubato is still
    /// accumulating a full input block. Any remainder carries over to the
    /// next call.
    pub fn convert(&mut self, samples: &[f32]) -> Vec<f32> {
        let Some(ref mut resampler) = self.resampler else {
            return samples.to_vec();
        };

        self.input_buf.extend_from_slice(samples);

        let mut result = Vec::new();
        while self.input_buf.len() >= self.block_size {
            let block = &self.input_buf[..self.block_size];
            match resampler.process_into_buffer(&[block], &mut self.output_buf, None) {
                Ok((_consumed, produced)) => {
                    result.extend_from_slice(&self.output_buf[0][..produced]);
                }
                Err(e) => {
                    error!("resampler process error: {e}");
                }
            }
            self.input_buf.drain(..self.block_size);
        }
        result
    }

    /// Returns `true` when no conversion takes place.
    pub fn is_passthrough(&self) -> bool {
        self.resampler.is_none()
    }
}
