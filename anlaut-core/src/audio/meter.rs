//! Live input-level meter.
//!
//! The session loop publishes each chunk's normalized amplitude into an
//! atomic cell; a UI thread polls it to render a volume bar while the user is
//! speaking. Lock-free on both sides.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

#[derive(Clone, Debug, Default)]
pub struct LiveMeter {
    level_bits: Arc<AtomicU32>,
}

impl LiveMeter {
    pub fn new() -> Self {
        Self {
            level_bits: Arc::new(AtomicU32::new(0f32.to_bits())),
        }
    }

    /// Publish the latest chunk level (normalized amplitude, ≥ 0).
    pub fn set_level(&self, level: f32) {
        self.level_bits.store(level.to_bits(), Ordering::Relaxed);
    }

    /// Most recently published level.
    pub fn level(&self) -> f32 {
        f32::from_bits(self.level_bits.load(Ordering::Relaxed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_at_zero() {
        assert_eq!(LiveMeter::new().level(), 0.0);
    }

    #[test]
    fn clones_share_the_cell() {
        let meter = LiveMeter::new();
        let reader = meter.clone();
        meter.set_level(0.042);
        assert_eq!(reader.level(), 0.042);
    }
}
