//! Persistent console settings (JSON file, camelCase keys).

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use anlaut_core::RecorderConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(default)]
pub struct AppSettings {
    pub preferred_input_device: Option<String>,
    pub sample_rate: u32,
    pub channels: u16,
    pub chunk_ms: u64,
    pub vad_threshold: f32,
    pub pre_buffer_ms: u64,
    pub silence_limit_ms: u64,
    pub min_speech_ms: u64,
    pub max_duration_ms: u64,
    pub fallback_duration_ms: u64,
    pub queue_capacity: usize,
    pub output_dir: Option<String>,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            preferred_input_device: None,
            sample_rate: 16_000,
            channels: 1,
            chunk_ms: 100,
            vad_threshold: 0.001,
            pre_buffer_ms: 500,
            silence_limit_ms: 2_000,
            min_speech_ms: 500,
            max_duration_ms: 30_000,
            fallback_duration_ms: 5_000,
            queue_capacity: 64,
            output_dir: None,
        }
    }
}

impl AppSettings {
    /// Clamp every field into a usable range; hand-edited files should
    /// degrade to something workable rather than a refusal to start.
    pub fn normalize(&mut self) {
        self.sample_rate = self.sample_rate.clamp(8_000, 192_000);
        self.channels = self.channels.clamp(1, 8);
        self.chunk_ms = self.chunk_ms.clamp(10, 1_000);
        self.vad_threshold = self.vad_threshold.clamp(1e-5, 0.5);
        self.pre_buffer_ms = self.pre_buffer_ms.min(10_000);
        self.silence_limit_ms = self.silence_limit_ms.clamp(100, 30_000);
        self.min_speech_ms = self.min_speech_ms.min(10_000);
        self.max_duration_ms = self.max_duration_ms.clamp(1_000, 600_000);
        self.fallback_duration_ms = self.fallback_duration_ms.clamp(500, 60_000);
        self.queue_capacity = self.queue_capacity.clamp(8, 4_096);
        self.preferred_input_device = self
            .preferred_input_device
            .as_ref()
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty());
        self.output_dir = self
            .output_dir
            .as_ref()
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty());
    }

    pub fn recorder_config(&self) -> RecorderConfig {
        RecorderConfig {
            sample_rate: self.sample_rate,
            channels: self.channels,
            chunk_duration: Duration::from_millis(self.chunk_ms),
            vad_threshold: self.vad_threshold,
            pre_buffer_duration: Duration::from_millis(self.pre_buffer_ms),
            silence_limit: Duration::from_millis(self.silence_limit_ms),
            min_speech_duration: Duration::from_millis(self.min_speech_ms),
            max_duration: Duration::from_millis(self.max_duration_ms),
            fallback_duration: Duration::from_millis(self.fallback_duration_ms),
            queue_capacity: self.queue_capacity,
            preferred_device: self.preferred_input_device.clone(),
        }
    }
}

/// Load settings from `path`; a missing file yields defaults, a malformed
/// one is an error (silently ignoring a typo'd file hides real mistakes).
pub fn load_settings(path: &Path) -> Result<AppSettings> {
    if !path.exists() {
        return Ok(AppSettings::default());
    }
    let raw = fs::read_to_string(path)
        .with_context(|| format!("reading settings file {}", path.display()))?;
    let mut settings: AppSettings = serde_json::from_str(&raw)
        .with_context(|| format!("parsing settings file {}", path.display()))?;
    settings.normalize();
    Ok(settings)
}

/// Write settings as pretty-printed JSON.
pub fn save_settings(path: &Path, settings: &AppSettings) -> Result<()> {
    let raw = serde_json::to_string_pretty(settings).context("serializing settings")?;
    fs::write(path, raw)
        .with_context(|| format!("writing settings file {}", path.display()))?;
    Ok(())
}
