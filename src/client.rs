//! The user-facing client.

use std::path::Path;

use crate::audio::SynthesisResult;
use crate::config::{ClientConfig, ExecutionMode};
use crate::error::{Error, Result};
use crate::sampling::SamplingParams;
use crate::voice::VoiceProfile;
use crate::SpeechBackend;

/// Text-to-speech client bound to one backbone and execution mode.
///
/// Resources are released by [`Vieneu::close`], or on drop.
pub struct Vieneu {
    backend: Option<Box<dyn SpeechBackend>>,
}

impl Vieneu {
    /// Validate `config` and start the backend for its execution mode.
    pub fn new(config: ClientConfig) -> Result<Self> {
        config.validate()?;
        let mode = config.mode();
        log::info!(
            "Initializing client: backbone={}, mode={mode:?}",
            config.backbone
        );

        let backend = match mode {
            ExecutionMode::Remote { .. } => remote_backend(&config)?,
            ExecutionMode::LocalQuantized | ExecutionMode::LocalFullPrecision => {
                local_backend(&config)?
            }
        };
        Ok(Self::with_backend(backend))
    }

    /// Wrap an already constructed backend.
    pub fn with_backend(backend: Box<dyn SpeechBackend>) -> Self {
        Self {
            backend: Some(backend),
        }
    }

    fn backend(&self) -> Result<&dyn SpeechBackend> {
        self.backend.as_deref().ok_or(Error::Closed)
    }

    fn backend_mut(&mut self) -> Result<&mut Box<dyn SpeechBackend>> {
        self.backend.as_mut().ok_or(Error::Closed)
    }

    pub fn list_preset_voices(&self) -> Result<Vec<String>> {
        self.backend()?.list_preset_voices()
    }

    /// Select a voice by name. Unknown names are an error.
    pub fn get_preset_voice(&self, name: &str) -> Result<VoiceProfile> {
        let voice = self.backend()?.preset_voice(name)?;
        log::info!("Selected voice '{name}'");
        Ok(voice)
    }

    /// Clone a voice from a reference clip and its exact transcript,
    /// punctuation included. Passing `name` saves the voice.
    pub fn clone_voice(
        &mut self,
        audio_path: impl AsRef<Path>,
        text: &str,
        name: Option<&str>,
    ) -> Result<VoiceProfile> {
        let audio_path = audio_path.as_ref();
        if text.trim().is_empty() {
            return Err(Error::InvalidParams(
                "the reference transcript must not be empty".to_string(),
            ));
        }

        log::info!("Cloning voice from {}", audio_path.display());
        let voice = self.backend_mut()?.clone_voice(audio_path, text, name)?;
        if name.is_some() {
            log::info!("Voice created and saved as '{}'", voice.name);
        }
        Ok(voice)
    }

    /// Synthesize `text` with `voice`.
    pub fn infer(
        &mut self,
        text: &str,
        voice: &VoiceProfile,
        params: &SamplingParams,
    ) -> Result<SynthesisResult> {
        params.validate()?;
        if text.trim().is_empty() {
            return Err(Error::InvalidParams("text must not be empty".to_string()));
        }

        let result = self.backend_mut()?.infer(text, voice, params)?;
        log::info!(
            "Synthesized {:.2}s of audio with voice '{}'",
            result.duration_secs(),
            voice.name
        );
        Ok(result)
    }

    /// Release the backend. Later calls fail with [`Error::Closed`].
    pub fn close(&mut self) {
        if let Some(mut backend) = self.backend.take() {
            log::info!("Closing {} backend", backend.name());
            backend.close();
        }
    }

    pub fn is_closed(&self) -> bool {
        self.backend.is_none()
    }
}

impl Drop for Vieneu {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(feature = "remote")]
fn remote_backend(config: &ClientConfig) -> Result<Box<dyn SpeechBackend>> {
    Ok(Box::new(crate::engines::remote::RemoteEngine::from_config(
        config,
    )?))
}

#[cfg(not(feature = "remote"))]
fn remote_backend(_config: &ClientConfig) -> Result<Box<dyn SpeechBackend>> {
    Err(Error::BackendUnavailable("remote"))
}

#[cfg(feature = "kokoro")]
fn local_backend(config: &ClientConfig) -> Result<Box<dyn SpeechBackend>> {
    Ok(Box::new(crate::engines::kokoro::KokoroEngine::from_config(
        config,
    )?))
}

#[cfg(not(feature = "kokoro"))]
fn local_backend(_config: &ClientConfig) -> Result<Box<dyn SpeechBackend>> {
    Err(Error::BackendUnavailable("kokoro"))
}
