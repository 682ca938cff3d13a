//! The LISTENING → RECORDING capture session loop.
//!
//! ## Per-iteration stages
//!
//! ```text
//! 1. Deadline checks: stream failure, overall cap, trailing silence
//! 2. recv_timeout on the chunk queue (bounded wait, then re-check)
//! 3. Rate-convert the device chunk to the target rate
//! 4. Meter update + VAD classification
//! 5. Listening: push into the pre-roll, or seed the clip on onset
//!    Recording: append; refresh the last-speech stamp on speech
//! ```
//!
//! The loop is a free function over a `ChunkReceiver`, so tests drive it
//! with synthetic producer threads and scripted detectors — no audio device
//! required.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::RecvTimeoutError;
use tracing::{debug, info};

use super::{CaptureOutcome, RecorderConfig, SessionDiagnostics, Utterance};
use crate::{
    audio::{meter::LiveMeter, resample::RateConverter},
    buffering::{chunk::AudioChunk, preroll::PreRollBuffer, ChunkReceiver},
    error::{AnlautError, Result},
    vad::{amplitude::normalized_amplitude, VoiceActivityDetector},
};

/// Upper bound on one blocking wait for the next chunk, so the deadline
/// checks keep running even when the device goes quiet.
pub(crate) const RECV_TIMEOUT: Duration = Duration::from_millis(250);

/// Why the session stopped pulling chunks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopCause {
    /// Trailing silence exceeded the configured limit.
    SilenceTail,
    /// The overall capture cap was reached.
    MaxDuration,
}

/// Everything the session loop needs, passed as one struct.
pub struct SessionContext {
    pub config: RecorderConfig,
    pub vad: Box<dyn VoiceActivityDetector>,
    pub receiver: ChunkReceiver,
    pub converter: RateConverter,
    pub meter: Option<LiveMeter>,
    /// Flipped by the stream error callback; aborts the session.
    pub failed: Arc<AtomicBool>,
    pub diagnostics: Arc<SessionDiagnostics>,
}

/// The capture call is a two-state machine; Listening restarts with every
/// new session.
enum SessionPhase {
    Listening {
        pre_roll: PreRollBuffer,
    },
    Recording {
        clip: Vec<f32>,
        last_speech: Instant,
    },
}

/// Run one voice-activity-gated session to completion.
pub fn run(mut ctx: SessionContext) -> Result<CaptureOutcome> {
    ctx.vad.reset();
    let started = Instant::now();
    let mut phase = SessionPhase::Listening {
        pre_roll: PreRollBuffer::new(ctx.config.pre_roll_samples()),
    };
    let stop_cause;

    loop {
        if ctx.failed.load(Ordering::Acquire) {
            return Err(AnlautError::AudioStream(
                "input stream reported an error mid-capture".into(),
            ));
        }
        if started.elapsed() >= ctx.config.max_duration {
            stop_cause = StopCause::MaxDuration;
            break;
        }
        if let SessionPhase::Recording { last_speech, .. } = &phase {
            if last_speech.elapsed() >= ctx.config.silence_limit {
                stop_cause = StopCause::SilenceTail;
                break;
            }
        }

        let raw = match ctx.receiver.recv_timeout(RECV_TIMEOUT) {
            Ok(chunk) => chunk,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => {
                return Err(AnlautError::ChunkQueueDisconnected)
            }
        };
        ctx.diagnostics.chunks_in.fetch_add(1, Ordering::Relaxed);

        let converted = ctx.converter.convert(&raw.samples);
        if converted.is_empty() {
            // Converter is still accumulating a full block
            continue;
        }
        ctx.diagnostics
            .chunks_converted
            .fetch_add(1, Ordering::Relaxed);

        let chunk = AudioChunk::new(converted, ctx.config.sample_rate);
        let level = normalized_amplitude(&chunk.samples);
        if let Some(ref meter) = ctx.meter {
            meter.set_level(level);
        }

        ctx.diagnostics.vad_windows.fetch_add(1, Ordering::Relaxed);
        let decision = ctx.vad.classify(&chunk);
        if decision.is_speech() {
            ctx.diagnostics
                .speech_windows
                .fetch_add(1, Ordering::Relaxed);
        }
        debug!(
            level = format_args!("{level:.6}"),
            speech = decision.is_speech(),
            "chunk classified"
        );

        phase = match phase {
            SessionPhase::Listening { mut pre_roll } => {
                if decision.is_speech() {
                    // Onset: the utterance starts with everything we were
                    // holding, then the chunk that crossed the threshold.
                    let mut clip =
                        Vec::with_capacity(pre_roll.total_samples() + chunk.samples.len());
                    for held in pre_roll.drain() {
                        clip.extend_from_slice(&held.samples);
                    }
                    clip.extend_from_slice(&chunk.samples);
                    info!(
                        onset_ms = started.elapsed().as_millis() as u64,
                        "speech detected — recording"
                    );
                    SessionPhase::Recording {
                        clip,
                        last_speech: Instant::now(),
                    }
                } else {
                    pre_roll.push(chunk);
                    SessionPhase::Listening { pre_roll }
                }
            }
            SessionPhase::Recording {
                mut clip,
                last_speech,
            } => {
                clip.extend_from_slice(&chunk.samples);
                let last_speech = if decision.is_speech() {
                    Instant::now()
                } else {
                    last_speech
                };
                SessionPhase::Recording { clip, last_speech }
            }
        };
    }

    if let Some(ref meter) = ctx.meter {
        meter.set_level(0.0);
    }

    match phase {
        SessionPhase::Listening { .. } => {
            info!(cause = ?stop_cause, "no speech detected");
            Ok(CaptureOutcome::NoSpeech)
        }
        SessionPhase::Recording { clip, .. } => {
            let captured =
                Duration::from_secs_f64(clip.len() as f64 / ctx.config.sample_rate as f64);
            if captured < ctx.config.min_speech_duration {
                info!(
                    captured_ms = captured.as_millis() as u64,
                    "utterance below minimum length — discarded"
                );
                Ok(CaptureOutcome::TooShort { captured })
            } else {
                info!(
                    captured_ms = captured.as_millis() as u64,
                    cause = ?stop_cause,
                    "utterance captured"
                );
                Ok(CaptureOutcome::Utterance(Utterance {
                    samples: clip,
                    sample_rate: ctx.config.sample_rate,
                }))
            }
        }
    }
}

/// Plain timed capture: collect converted chunks until `duration` elapses.
pub fn run_fixed(
    receiver: ChunkReceiver,
    mut converter: RateConverter,
    sample_rate: u32,
    duration: Duration,
    meter: Option<LiveMeter>,
    failed: Arc<AtomicBool>,
    diagnostics: Arc<SessionDiagnostics>,
) -> Result<Utterance> {
    let started = Instant::now();
    let mut samples = Vec::new();

    while started.elapsed() < duration {
        if failed.load(Ordering::Acquire) {
            return Err(AnlautError::AudioStream(
                "input stream reported an error mid-capture".into(),
            ));
        }
        let raw = match receiver.recv_timeout(RECV_TIMEOUT) {
            Ok(chunk) => chunk,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => {
                return Err(AnlautError::ChunkQueueDisconnected)
            }
        };
        diagnostics.chunks_in.fetch_add(1, Ordering::Relaxed);

        let converted = converter.convert(&raw.samples);
        if converted.is_empty() {
            continue;
        }
        diagnostics.chunks_converted.fetch_add(1, Ordering::Relaxed);

        if let Some(ref meter) = meter {
            meter.set_level(normalized_amplitude(&converted));
        }
        samples.extend_from_slice(&converted);
    }

    if let Some(ref meter) = meter {
        meter.set_level(0.0);
    }

    if samples.is_empty() {
        return Err(AnlautError::AudioStream(
            "no samples captured within the fixed window".into(),
        ));
    }

    info!(
        captured_ms = (samples.len() as f64 / sample_rate as f64 * 1000.0) as u64,
        "fixed-duration capture complete"
    );
    Ok(Utterance {
        samples,
        sample_rate,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffering::{chunk_queue, ChunkSender};
    use crate::vad::{amplitude::AmplitudeVad, VadDecision};
    use std::sync::atomic::AtomicUsize;
    use std::thread::{self, JoinHandle};

    const RATE: u32 = 1_000;
    const CHUNK_MS: u64 = 25;
    const CHUNK_LEN: usize = 25;

    fn test_config() -> RecorderConfig {
        RecorderConfig {
            sample_rate: RATE,
            channels: 1,
            chunk_duration: Duration::from_millis(CHUNK_MS),
            vad_threshold: 0.01,
            pre_buffer_duration: Duration::from_millis(75),
            silence_limit: Duration::from_millis(150),
            min_speech_duration: Duration::from_millis(50),
            max_duration: Duration::from_secs(5),
            fallback_duration: Duration::from_secs(1),
            queue_capacity: 64,
            preferred_device: None,
        }
    }

    fn flat_chunk(value: f32) -> AudioChunk {
        AudioChunk::new(vec![value; CHUNK_LEN], RATE)
    }

    fn ctx_for(config: RecorderConfig, receiver: ChunkReceiver) -> SessionContext {
        let vad: Box<dyn VoiceActivityDetector> =
            Box::new(AmplitudeVad::new(config.vad_threshold));
        SessionContext {
            converter: RateConverter::new(RATE, RATE, CHUNK_LEN).unwrap(),
            config,
            vad,
            receiver,
            meter: None,
            failed: Arc::new(AtomicBool::new(false)),
            diagnostics: Arc::new(SessionDiagnostics::default()),
        }
    }

    /// Send chunks at real-time pace; stops early if the consumer is gone.
    fn spawn_paced_producer(sender: ChunkSender, chunks: Vec<AudioChunk>) -> JoinHandle<()> {
        thread::spawn(move || {
            for chunk in chunks {
                if sender.send(chunk).is_err() {
                    break;
                }
                thread::sleep(Duration::from_millis(CHUNK_MS));
            }
        })
    }

    // Quiet chunks at 0.004 sit at metric 0.0008, well under the 0.01
    // threshold; loud chunks at 0.5 sit at 0.1.
    const QUIET: f32 = 0.004;
    const LOUD: f32 = 0.5;

    #[test]
    fn below_threshold_input_reports_no_speech() {
        let mut config = test_config();
        config.max_duration = Duration::from_millis(150);

        let (tx, rx) = chunk_queue(64);
        let producer = spawn_paced_producer(tx, vec![flat_chunk(QUIET); 20]);

        let outcome = run(ctx_for(config, rx)).expect("session");
        assert!(matches!(outcome, CaptureOutcome::NoSpeech));
        producer.join().unwrap();
    }

    #[test]
    fn onset_seeds_clip_with_preroll() {
        let config = test_config();

        // Four distinct quiet markers, then speech, then a long quiet tail.
        let mut plan = vec![
            flat_chunk(0.001),
            flat_chunk(0.002),
            flat_chunk(0.003),
            flat_chunk(0.004),
        ];
        plan.extend(vec![flat_chunk(LOUD); 4]);
        plan.extend(vec![flat_chunk(0.0); 16]);

        let (tx, rx) = chunk_queue(64);
        let producer = spawn_paced_producer(tx, plan);

        let outcome = run(ctx_for(config, rx)).expect("session");
        let utterance = match outcome {
            CaptureOutcome::Utterance(u) => u,
            other => panic!("expected an utterance, got {other:?}"),
        };

        // Pre-roll bound is 3 chunks: marker 0.001 was evicted, the clip
        // must open with the surviving markers in order, then speech.
        assert_eq!(utterance.samples[0], 0.002);
        assert_eq!(utterance.samples[CHUNK_LEN], 0.003);
        assert_eq!(utterance.samples[2 * CHUNK_LEN], 0.004);
        assert_eq!(utterance.samples[3 * CHUNK_LEN], LOUD);

        // Length ≈ pre-roll (3) + speech (4) + silence tail (~150 ms ≈ 6
        // chunks at 25 ms), with slack for scheduler jitter.
        let chunks = utterance.samples.len() / CHUNK_LEN;
        assert!(
            (10..=16).contains(&chunks),
            "unexpected clip length: {chunks} chunks"
        );
        producer.join().unwrap();
    }

    #[test]
    fn short_speech_reports_too_short() {
        let mut config = test_config();
        config.min_speech_duration = Duration::from_millis(500);

        let mut plan = vec![flat_chunk(QUIET); 2];
        plan.push(flat_chunk(LOUD));
        plan.extend(vec![flat_chunk(0.0); 14]);

        let (tx, rx) = chunk_queue(64);
        let producer = spawn_paced_producer(tx, plan);

        let outcome = run(ctx_for(config, rx)).expect("session");
        match outcome {
            CaptureOutcome::TooShort { captured } => {
                assert!(captured >= Duration::from_millis(75));
                assert!(captured < Duration::from_millis(500));
            }
            other => panic!("expected TooShort, got {other:?}"),
        }
        producer.join().unwrap();
    }

    #[test]
    fn max_duration_caps_continuous_speech() {
        let mut config = test_config();
        config.max_duration = Duration::from_millis(200);
        config.silence_limit = Duration::from_secs(10);

        let (tx, rx) = chunk_queue(64);
        let producer = spawn_paced_producer(tx, vec![flat_chunk(LOUD); 30]);

        let started = Instant::now();
        let outcome = run(ctx_for(config, rx)).expect("session");
        let elapsed = started.elapsed();

        let utterance = match outcome {
            CaptureOutcome::Utterance(u) => u,
            other => panic!("expected an utterance, got {other:?}"),
        };
        // The producer had 750 ms of audio to offer; the cap must win.
        assert!(
            elapsed < Duration::from_millis(500),
            "session overran the cap: {elapsed:?}"
        );
        assert!(utterance.duration() <= Duration::from_millis(400));
        assert!(utterance.duration() >= Duration::from_millis(100));
        producer.join().unwrap();
    }

    #[test]
    fn disconnected_queue_is_a_hard_error() {
        let mut config = test_config();
        config.silence_limit = Duration::from_secs(10);
        config.max_duration = Duration::from_secs(10);

        let (tx, rx) = chunk_queue(64);
        tx.send(flat_chunk(LOUD)).unwrap();
        tx.send(flat_chunk(LOUD)).unwrap();
        drop(tx); // capture stream died

        let err = run(ctx_for(config, rx)).unwrap_err();
        assert!(matches!(err, AnlautError::ChunkQueueDisconnected));
    }

    #[test]
    fn stream_failure_flag_aborts_the_session() {
        let config = test_config();
        let (tx, rx) = chunk_queue(64);
        let mut ctx = ctx_for(config, rx);
        ctx.failed.store(true, Ordering::Release);

        let err = run(ctx).unwrap_err();
        assert!(matches!(err, AnlautError::AudioStream(_)));
        drop(tx);
    }

    struct CountingVad {
        resets: Arc<AtomicUsize>,
    }

    impl VoiceActivityDetector for CountingVad {
        fn classify(&mut self, _chunk: &AudioChunk) -> VadDecision {
            VadDecision::Silence
        }

        fn reset(&mut self) {
            self.resets.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[test]
    fn detector_is_reset_once_per_session() {
        let mut config = test_config();
        config.max_duration = Duration::from_millis(50);

        let (tx, rx) = chunk_queue(64);
        let resets = Arc::new(AtomicUsize::new(0));
        let mut ctx = ctx_for(config, rx);
        ctx.vad = Box::new(CountingVad {
            resets: Arc::clone(&resets),
        });

        let outcome = run(ctx).expect("session");
        assert!(matches!(outcome, CaptureOutcome::NoSpeech));
        assert_eq!(resets.load(Ordering::Relaxed), 1);
        drop(tx);
    }

    #[test]
    fn fixed_capture_collects_until_the_deadline() {
        let (tx, rx) = chunk_queue(64);
        let producer = spawn_paced_producer(tx, vec![flat_chunk(QUIET); 30]);

        let utterance = run_fixed(
            rx,
            RateConverter::new(RATE, RATE, CHUNK_LEN).unwrap(),
            RATE,
            Duration::from_millis(200),
            None,
            Arc::new(AtomicBool::new(false)),
            Arc::new(SessionDiagnostics::default()),
        )
        .expect("fixed capture");

        assert!(utterance.duration() >= Duration::from_millis(100));
        assert!(utterance.duration() <= Duration::from_millis(400));
        producer.join().unwrap();
    }

    #[test]
    fn fixed_capture_with_no_samples_is_an_error() {
        let (tx, rx) = chunk_queue(64);
        let err = run_fixed(
            rx,
            RateConverter::new(RATE, RATE, CHUNK_LEN).unwrap(),
            RATE,
            Duration::from_millis(100),
            None,
            Arc::new(AtomicBool::new(false)),
            Arc::new(SessionDiagnostics::default()),
        )
        .unwrap_err();
        assert!(matches!(err, AnlautError::AudioStream(_)));
        drop(tx);
    }
}
