//! End-to-end session properties driven through the public API, with a
//! real-time paced producer standing in for the audio device.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anlaut_core::audio::resample::RateConverter;
use anlaut_core::buffering::{chunk::AudioChunk, chunk_queue, ChunkSender};
use anlaut_core::recorder::session::{self, SessionContext};
use anlaut_core::recorder::{CaptureOutcome, RecorderConfig, SessionDiagnostics};
use anlaut_core::vad::amplitude::AmplitudeVad;
use anlaut_core::vad::VoiceActivityDetector;

const RATE: u32 = 1_000;
const CHUNK_MS: u64 = 25;
const CHUNK_LEN: usize = 25;

const QUIET: f32 = 0.004; // metric 0.0008 — under threshold
const LOUD: f32 = 0.5; // metric 0.1 — over threshold

fn config() -> RecorderConfig {
    RecorderConfig {
        sample_rate: RATE,
        channels: 1,
        chunk_duration: Duration::from_millis(CHUNK_MS),
        vad_threshold: 0.01,
        pre_buffer_duration: Duration::from_millis(100),
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

fn session_ctx(
    config: RecorderConfig,
    receiver: anlaut_core::buffering::ChunkReceiver,
) -> SessionContext {
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

#[test]
fn utterance_spans_preroll_speech_and_silence_tail() {
    let config = config();
    let pre_chunks = 4; // 100 ms of pre-roll at 25 ms chunks
    let speech_chunks = 8; // 200 ms of speech
    let tail_chunks = 16; // plenty of silence for the 150 ms limit

    let mut plan = Vec::new();
    for i in 0..pre_chunks {
        // Distinct sub-threshold markers so the onset check is exact
        plan.push(flat_chunk(0.001 * (i + 1) as f32));
    }
    plan.extend(vec![flat_chunk(LOUD); speech_chunks]);
    plan.extend(vec![flat_chunk(QUIET); tail_chunks]);

    let (tx, rx) = chunk_queue(64);
    let producer = spawn_paced_producer(tx, plan);

    let diagnostics = Arc::new(SessionDiagnostics::default());
    let mut ctx = session_ctx(config, rx);
    ctx.diagnostics = Arc::clone(&diagnostics);

    let outcome = session::run(ctx).expect("session");
    let utterance = match outcome {
        CaptureOutcome::Utterance(u) => u,
        other => panic!("expected an utterance, got {other:?}"),
    };

    // Onset not clipped: the clip opens with the full pre-roll, in order.
    for i in 0..pre_chunks {
        assert_eq!(
            utterance.samples[i * CHUNK_LEN],
            0.001 * (i + 1) as f32,
            "pre-roll marker {i} out of place"
        );
    }
    assert_eq!(utterance.samples[pre_chunks * CHUNK_LEN], LOUD);

    // Length ≈ pre-roll + speech + silence-limit worth of tail.
    let expected_chunks = pre_chunks + speech_chunks + 6; // 150 ms / 25 ms
    let actual_chunks = utterance.samples.len() / CHUNK_LEN;
    assert!(
        (actual_chunks as isize - expected_chunks as isize).abs() <= 3,
        "clip length {actual_chunks} chunks, expected ≈{expected_chunks}"
    );

    let snap = diagnostics.snapshot();
    assert!(snap.chunks_in >= (pre_chunks + speech_chunks));
    assert_eq!(snap.speech_windows, speech_chunks);
    assert_eq!(snap.chunks_dropped, 0);

    producer.join().unwrap();
}

#[test]
fn quiet_room_times_out_with_no_speech() {
    let mut config = config();
    config.max_duration = Duration::from_millis(200);

    let (tx, rx) = chunk_queue(64);
    let producer = spawn_paced_producer(tx, vec![flat_chunk(QUIET); 24]);

    let outcome = session::run(session_ctx(config, rx)).expect("session");
    assert!(
        matches!(outcome, CaptureOutcome::NoSpeech),
        "expected NoSpeech, got {outcome:?}"
    );
    producer.join().unwrap();
}

#[test]
fn too_short_and_no_speech_are_distinct_outcomes() {
    // Same room noise, one brief blip of speech: the blip must surface as
    // TooShort, not as NoSpeech.
    let mut config = config();
    config.min_speech_duration = Duration::from_millis(400);

    let mut plan = vec![flat_chunk(QUIET); 2];
    plan.push(flat_chunk(LOUD));
    plan.extend(vec![flat_chunk(QUIET); 14]);

    let (tx, rx) = chunk_queue(64);
    let producer = spawn_paced_producer(tx, plan);

    let outcome = session::run(session_ctx(config, rx)).expect("session");
    match outcome {
        CaptureOutcome::TooShort { captured } => {
            assert!(captured > Duration::ZERO);
        }
        other => panic!("expected TooShort, got {other:?}"),
    }
    producer.join().unwrap();
}

#[test]
fn producer_death_surfaces_as_an_error() {
    let mut config = config();
    config.silence_limit = Duration::from_secs(10);
    config.max_duration = Duration::from_secs(10);

    let (tx, rx) = chunk_queue(64);
    tx.send(flat_chunk(LOUD)).unwrap();
    drop(tx);

    let err = session::run(session_ctx(config, rx)).unwrap_err();
    assert!(
        matches!(err, anlaut_core::AnlautError::ChunkQueueDisconnected),
        "unexpected error: {err:?}"
    );
}
