//! # vieneu-rs
//!
//! A Rust client for VieNeu-style text-to-speech backbones.
//!
//! ## Features
//!
//! - **Preset voices**: list and select the voices bundled with a backbone
//! - **Voice cloning**: derive a voice from a short reference clip and its exact transcript
//! - **Sampling control**: temperature and top-k per request
//! - **Local or remote**: run the backbone's ONNX export in-process, or talk to an inference server
//!
//! ## Quick Start
//!
//! ```toml
//! [dependencies]
//! vieneu-rs = { version = "2026.10", features = ["kokoro"] }
//! ```
//!
//! ```no_run
//! use std::path::Path;
//! use vieneu_rs::{ClientConfig, SamplingParams, Vieneu};
//!
//! let mut tts = Vieneu::new(ClientConfig::default())?;
//! println!("Voices: {:?}", tts.list_preset_voices()?);
//!
//! let voice = tts.get_preset_voice("Binh")?;
//! let audio = tts.infer("Xin chào!", &voice, &SamplingParams::default())?;
//! audio.write_wav(Path::new("output.wav"))?;
//! tts.close();
//! # Ok::<(), vieneu_rs::Error>(())
//! ```

pub mod audio;
pub mod client;
pub mod config;
pub mod demo;
pub mod engines;
pub mod error;
pub mod sampling;
pub mod voice;

use std::path::Path;

pub use audio::{SynthesisResult, SAMPLE_RATE};
pub use client::Vieneu;
pub use config::{Backbone, ClientConfig, ClientConfigBuilder, ExecutionMode};
pub use error::{Error, Result};
pub use sampling::SamplingParams;
pub use voice::{VoiceKind, VoiceProfile, VoiceStore};

/// Common interface for speech backends.
///
/// A backend owns whatever does the neural work (an in-process model, a
/// connection to a server) and releases it in [`SpeechBackend::close`].
pub trait SpeechBackend {
    /// Short identifier used in logs.
    fn name(&self) -> &'static str;

    /// Preset voices plus any saved custom voices, sorted.
    fn list_preset_voices(&self) -> Result<Vec<String>>;

    /// Look up a voice by name. Unknown names are an error, never a default.
    fn preset_voice(&self, name: &str) -> Result<VoiceProfile>;

    /// Derive a voice from a reference clip and its exact transcript.
    ///
    /// With `name`, the voice is persisted and listed from then on.
    fn clone_voice(
        &mut self,
        audio_path: &Path,
        transcript: &str,
        name: Option<&str>,
    ) -> Result<VoiceProfile>;

    /// Synthesize speech for `text`.
    fn infer(
        &mut self,
        text: &str,
        voice: &VoiceProfile,
        params: &SamplingParams,
    ) -> Result<SynthesisResult>;

    /// Release resources. Calling it twice is harmless.
    fn close(&mut self);
}
