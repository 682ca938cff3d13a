//! WAV export for captured utterances.

use std::path::Path;

use crate::error::{AnlautError, Result};
use crate::recorder::Utterance;

/// Write an utterance as a 32-bit float mono WAV file.
pub fn write_wav<P: AsRef<Path>>(path: P, utterance: &Utterance) -> Result<()> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: utterance.sample_rate,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };

    let mut writer =
        hound::WavWriter::create(path, spec).map_err(|e| AnlautError::Wav(e.to_string()))?;
    for &sample in &utterance.samples {
        writer
            .write_sample(sample)
            .map_err(|e| AnlautError::Wav(e.to_string()))?;
    }
    writer
        .finalize()
        .map_err(|e| AnlautError::Wav(e.to_string()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn written_file_reads_back_with_matching_spec() {
        let utterance = Utterance {
            samples: (0..320).map(|i| (i as f32 / 320.0) - 0.5).collect(),
            sample_rate: 16_000,
        };
        let path = std::env::temp_dir().join("anlaut_wav_roundtrip_test.wav");
        write_wav(&path, &utterance).expect("write wav");

        let mut reader = hound::WavReader::open(&path).expect("open wav");
        let spec = reader.spec();
        assert_eq!(spec.channels, 1);
        assert_eq!(spec.sample_rate, 16_000);
        assert_eq!(spec.sample_format, hound::SampleFormat::Float);

        let samples: Vec<f32> = reader.samples::<f32>().map(|s| s.unwrap()).collect();
        assert_eq!(samples, utterance.samples);

        let _ = std::fs::remove_file(&path);
    }
}
