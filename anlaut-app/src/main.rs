//! Console front-end: capture one utterance, save it, print the transcript.
//!
//! A render thread polls the `LiveMeter` and redraws a volume bar while the
//! capture session runs on the main thread. Logging goes to stderr so the
//! meter line on stdout stays intact.

mod settings;

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::thread;
use std::time::Duration;

use anyhow::Result;
use chrono::Local;
use tracing::{debug, info};

use anlaut_core::{
    audio::{device::list_input_devices, wav::write_wav},
    transcribe::stub::StubTranscriber,
    CaptureOutcome, CaptureSource, LiveMeter, Transcriber, TranscriberHandle, Utterance,
    UtteranceRecorder,
};
use settings::load_settings;

#[derive(Debug)]
struct Args {
    settings: PathBuf,
    device: Option<String>,
    output: Option<PathBuf>,
    list_devices: bool,
    fixed_secs: Option<f64>,
    no_fallback: bool,
    init_settings: bool,
}

const USAGE: &str = "Usage: anlaut [--settings <file.json>] [--device <name>] [--output <file.wav>]
              [--fixed <seconds>] [--no-fallback] [--list-devices]

  --settings <file>   settings file (default: anlaut.json; missing file uses defaults)
  --device <name>     input device by exact name (overrides the settings file)
  --output <file>     where to write the captured clip (default: timestamped wav)
  --fixed <seconds>   skip voice activation, record a plain timed clip
  --no-fallback       report no-speech / too-short instead of re-recording
  --list-devices      list input devices and exit
  --init-settings     write the effective settings to the settings file and exit";

fn parse_args() -> std::result::Result<Args, String> {
    let mut args = Args {
        settings: PathBuf::from("anlaut.json"),
        device: None,
        output: None,
        list_devices: false,
        fixed_secs: None,
        no_fallback: false,
        init_settings: false,
    };

    let mut it = std::env::args().skip(1);
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--settings" => {
                let Some(v) = it.next() else {
                    return Err("missing value for --settings".into());
                };
                args.settings = PathBuf::from(v);
            }
            "--device" => {
                let Some(v) = it.next() else {
                    return Err("missing value for --device".into());
                };
                args.device = Some(v);
            }
            "--output" => {
                let Some(v) = it.next() else {
                    return Err("missing value for --output".into());
                };
                args.output = Some(PathBuf::from(v));
            }
            "--fixed" => {
                let Some(v) = it.next() else {
                    return Err("missing value for --fixed".into());
                };
                let secs = v
                    .parse::<f64>()
                    .map_err(|_| "invalid value for --fixed".to_string())?;
                if !secs.is_finite() || secs <= 0.0 {
                    return Err("--fixed must be a positive number of seconds".into());
                }
                args.fixed_secs = Some(secs);
            }
            "--no-fallback" => args.no_fallback = true,
            "--list-devices" => args.list_devices = true,
            "--init-settings" => args.init_settings = true,
            "--help" | "-h" => {
                println!("{USAGE}");
                std::process::exit(0);
            }
            other => {
                return Err(format!("unknown argument: {other}\n{USAGE}"));
            }
        }
    }
    Ok(args)
}

/// Redraw the volume bar until `stop` flips, then clear the line.
fn spawn_meter_display(meter: LiveMeter, stop: Arc<AtomicBool>) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        while !stop.load(Ordering::Relaxed) {
            let level = meter.level();
            let bars = ((level * 10_000.0) as usize).min(40);
            print!("\rlevel: {:<40} [{level:.6}]", "#".repeat(bars));
            let _ = io::stdout().flush();
            thread::sleep(Duration::from_millis(50));
        }
        print!("\r{:<64}\r", "");
        let _ = io::stdout().flush();
    })
}

fn capture_clip(
    recorder: &UtteranceRecorder,
    args: &Args,
) -> Result<Option<(Utterance, &'static str)>> {
    if let Some(secs) = args.fixed_secs {
        let utterance = recorder.capture_fixed(Duration::from_secs_f64(secs))?;
        return Ok(Some((utterance, "fixed")));
    }

    if args.no_fallback {
        return Ok(match recorder.capture()? {
            CaptureOutcome::Utterance(utterance) => Some((utterance, "voice-activated")),
            CaptureOutcome::NoSpeech => {
                info!("no speech detected");
                None
            }
            CaptureOutcome::TooShort { captured } => {
                info!(
                    captured_ms = captured.as_millis() as u64,
                    "speech too short — clip discarded"
                );
                None
            }
        });
    }

    let (utterance, source) = recorder.capture_or_fixed()?;
    let label = match source {
        CaptureSource::VoiceActivated => "voice-activated",
        CaptureSource::FixedFallback => "fixed fallback",
    };
    Ok(Some((utterance, label)))
}

fn run(args: Args) -> Result<()> {
    let mut settings = load_settings(&args.settings)?;
    if let Some(device) = args.device.clone() {
        settings.preferred_input_device = Some(device);
    }
    settings.normalize();

    if args.init_settings {
        settings::save_settings(&args.settings, &settings)?;
        println!("wrote {}", args.settings.display());
        return Ok(());
    }

    if args.list_devices {
        let devices = list_input_devices();
        if devices.is_empty() {
            println!("no input devices found");
        }
        for device in devices {
            let marker = if device.is_default { " (default)" } else { "" };
            println!("{}{marker}", device.name);
        }
        return Ok(());
    }

    let meter = LiveMeter::new();
    let recorder =
        UtteranceRecorder::new(settings.recorder_config())?.with_meter(meter.clone());

    println!("listening — speak when ready");
    let stop = Arc::new(AtomicBool::new(false));
    let display = spawn_meter_display(meter, Arc::clone(&stop));

    let capture_result = capture_clip(&recorder, &args);

    stop.store(true, Ordering::Relaxed);
    let _ = display.join();

    let Some((utterance, how)) = capture_result? else {
        println!("no usable speech captured");
        return Ok(());
    };

    let path = match &args.output {
        Some(path) => path.clone(),
        None => {
            let name = format!("recording_{}.wav", Local::now().format("%Y%m%d_%H%M%S"));
            match &settings.output_dir {
                Some(dir) => Path::new(dir).join(name),
                None => PathBuf::from(name),
            }
        }
    };
    write_wav(&path, &utterance)?;
    println!(
        "captured {:.1}s ({how}) → {}",
        utterance.duration().as_secs_f64(),
        path.display()
    );

    let transcriber = TranscriberHandle::new(StubTranscriber::new());
    let text = transcriber.0.lock().transcribe(&utterance)?;
    println!("transcript: {text}");

    debug!(
        diagnostics = %serde_json::to_string(&recorder.diagnostics_snapshot())?,
        "capture counters"
    );
    Ok(())
}

fn main() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    let args = match parse_args() {
        Ok(args) => args,
        Err(msg) => {
            eprintln!("{msg}");
            std::process::exit(2);
        }
    };

    if let Err(e) = run(args) {
        eprintln!("anlaut: {e:#}");
        std::process::exit(1);
    }
}
