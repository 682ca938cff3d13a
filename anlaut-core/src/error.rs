use thiserror::Error;

/// All errors produced by anlaut-core.
#[derive(Debug, Error)]
pub enum AnlautError {
    #[error("audio device error: {0}")]
    AudioDevice(String),

    #[error("audio stream error: {0}")]
    AudioStream(String),

    #[error("no default input device found")]
    NoDefaultInputDevice,

    #[error("chunk queue disconnected — capture stream died mid-session")]
    ChunkQueueDisconnected,

    #[error("invalid recorder configuration: {0}")]
    InvalidConfig(String),

    #[error("transcription error: {0}")]
    Transcription(String),

    #[error("wav encode error: {0}")]
    Wav(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, AnlautError>;
