use std::path::PathBuf;

/// Errors surfaced by the client and its backends.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[cfg(feature = "kokoro")]
    #[error(transparent)]
    Kokoro(#[from] crate::engines::kokoro::KokoroError),
    #[cfg(feature = "remote")]
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Resampling failed: {0}")]
    Resample(String),
    #[error("Invalid configuration: {0}")]
    Config(String),
    #[error("Invalid sampling parameters: {0}")]
    InvalidParams(String),
    #[error("Voice '{0}' not found. Call list_preset_voices() to see available voices.")]
    VoiceNotFound(String),
    #[error("Invalid voice name {0:?}")]
    InvalidVoiceName(String),
    #[error("Reference audio not found at {}", .0.display())]
    SampleNotFound(PathBuf),
    #[error("Voice cloning is not supported by this backend: {0}")]
    CloningUnsupported(String),
    #[error("Backend '{0}' is not compiled in. Enable the `{0}` feature.")]
    BackendUnavailable(&'static str),
    #[error("Remote server returned {status}: {message}")]
    Remote { status: u16, message: String },
    #[error("Client has been closed")]
    Closed,
}

pub type Result<T> = std::result::Result<T, Error>;
