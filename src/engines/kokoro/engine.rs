use std::path::{Path, PathBuf};

use crate::audio::{self, SynthesisResult, SAMPLE_RATE};
use crate::config::{ClientConfig, ExecutionMode};
use crate::error::{Error, Result};
use crate::sampling::SamplingParams;
use crate::voice::{validate_voice_name, VoiceKind, VoiceProfile, VoiceStore};
use crate::SpeechBackend;

use super::model::{KokoroError, KokoroModel, Precision, Style, StyleEncoder, STYLE_DIM};
use super::phonemizer::{voice_lang, EspeakConfig};
use super::voices::PresetVoices;

/// Parameters for loading the local backbone.
#[derive(Debug, Clone, Default)]
pub struct KokoroModelParams {
    pub precision: Precision,
    /// Number of CPU threads to use for inference.
    /// `None` uses the ORT default (typically all available cores).
    pub num_threads: Option<usize>,
    /// Path for caching the Level3-optimized ONNX graph.
    ///
    /// Point this at a writable location; bundled model directories may be
    /// read-only.
    pub optimized_model_cache_path: Option<PathBuf>,
}

/// Local backend running the backbone export on ONNX Runtime.
///
/// ```rust,no_run
/// use std::path::Path;
/// use vieneu_rs::engines::kokoro::{KokoroEngine, KokoroModelParams};
/// use vieneu_rs::{SamplingParams, SpeechBackend};
///
/// let mut engine = KokoroEngine::new(Path::new("voices"), "vi")?;
/// engine.load_model_with_params(Path::new("models/my-backbone"), KokoroModelParams::default())?;
/// let voice = engine.preset_voice("Binh")?;
/// let result = engine.infer("Xin chào", &voice, &SamplingParams::default())?;
/// # Ok::<(), vieneu_rs::Error>(())
/// ```
pub struct KokoroEngine {
    model: Option<KokoroModel>,
    encoder: Option<StyleEncoder>,
    model_path: Option<PathBuf>,
    custom: VoiceStore,
    clone_language: String,
    espeak: EspeakConfig,
}

impl KokoroEngine {
    /// Create an unloaded engine whose cloned voices live in `voices_dir`.
    pub fn new(voices_dir: &Path, clone_language: &str) -> Result<Self> {
        Ok(Self {
            model: None,
            encoder: None,
            model_path: None,
            custom: VoiceStore::open(voices_dir)?,
            clone_language: clone_language.to_string(),
            espeak: EspeakConfig::default(),
        })
    }

    /// Point at a bundled espeak-ng binary and data directory.
    pub fn with_espeak(mut self, bin_path: Option<PathBuf>, data_path: Option<PathBuf>) -> Self {
        self.espeak = EspeakConfig {
            bin_path,
            data_path,
        };
        self
    }

    /// Build and load an engine from client configuration.
    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        let precision = match config.mode() {
            ExecutionMode::LocalQuantized => Precision::Quantized,
            ExecutionMode::LocalFullPrecision => Precision::Full,
            ExecutionMode::Remote { .. } => {
                return Err(Error::Config(
                    "the local engine cannot run in remote mode".to_string(),
                ))
            }
        };

        let mut engine = Self::new(&config.voices_dir, &config.clone_language)?
            .with_espeak(config.espeak_bin.clone(), config.espeak_data.clone());
        engine.load_model_with_params(
            &config.model_dir(),
            KokoroModelParams {
                precision,
                num_threads: config.num_threads,
                optimized_model_cache_path: config.optimized_model_cache_path.clone(),
            },
        )?;
        Ok(engine)
    }

    pub fn load_model_with_params(
        &mut self,
        model_path: &Path,
        params: KokoroModelParams,
    ) -> Result<()> {
        let model = KokoroModel::load(
            model_path,
            params.precision,
            params.num_threads,
            params.optimized_model_cache_path.as_deref(),
        )?;
        self.encoder = StyleEncoder::load_optional(model_path, params.num_threads)?;
        self.model = Some(model);
        self.model_path = Some(model_path.to_path_buf());
        Ok(())
    }

    pub fn unload_model(&mut self) {
        if let Some(path) = self.model_path.take() {
            log::info!("Unloading backbone from {}", path.display());
        }
        self.model = None;
        self.encoder = None;
    }

    pub fn is_loaded(&self) -> bool {
        self.model.is_some()
    }

    fn model(&self) -> Result<&KokoroModel> {
        Ok(self.model.as_ref().ok_or(KokoroError::ModelNotLoaded)?)
    }
}

impl Drop for KokoroEngine {
    fn drop(&mut self) {
        self.unload_model();
    }
}

/// Saved clones must not shadow a preset, since presets are resolved first.
fn check_clone_name(presets: &PresetVoices, name: &str) -> Result<()> {
    validate_voice_name(name)?;
    if presets.contains(name) {
        return Err(Error::InvalidVoiceName(format!("{name} (already a preset voice)")));
    }
    Ok(())
}

impl SpeechBackend for KokoroEngine {
    fn name(&self) -> &'static str {
        "kokoro"
    }

    fn list_preset_voices(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = self
            .model()?
            .presets()
            .names()
            .into_iter()
            .chain(self.custom.names())
            .map(str::to_string)
            .collect();
        names.sort_unstable();
        names.dedup();
        Ok(names)
    }

    fn preset_voice(&self, name: &str) -> Result<VoiceProfile> {
        if self.model()?.presets().contains(name) {
            return Ok(VoiceProfile::preset(name));
        }
        self.custom
            .get(name)
            .cloned()
            .ok_or_else(|| Error::VoiceNotFound(name.to_string()))
    }

    fn clone_voice(
        &mut self,
        audio_path: &Path,
        transcript: &str,
        name: Option<&str>,
    ) -> Result<VoiceProfile> {
        let presets = self.model()?.presets();
        if !audio_path.exists() {
            return Err(Error::SampleNotFound(audio_path.to_path_buf()));
        }
        if let Some(name) = name {
            check_clone_name(presets, name)?;
            if self.custom.contains(name) {
                log::info!("Replacing saved voice '{name}'");
            }
        }
        let encoder = self.encoder.as_mut().ok_or_else(|| {
            Error::CloningUnsupported(format!(
                "the backbone export has no {}",
                super::model::STYLE_ENCODER_FILE
            ))
        })?;

        let voice_name = match name {
            Some(name) => name.to_string(),
            None => audio_path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("custom")
                .to_string(),
        };
        validate_voice_name(&voice_name)?;

        let reference = SynthesisResult::read_wav(audio_path)?;
        log::info!(
            "Encoding {:.2}s reference clip from {}",
            reference.duration_secs(),
            audio_path.display()
        );
        let samples = audio::resample(&reference.samples, reference.sample_rate, SAMPLE_RATE)?;
        if samples.is_empty() {
            return Err(KokoroError::VoiceParse(format!(
                "{} contains no audio",
                audio_path.display()
            ))
            .into());
        }
        let style = encoder.encode(&samples)?;

        let profile = VoiceProfile::custom(
            voice_name,
            transcript,
            self.clone_language.as_str(),
            Some(style.to_vec()),
        );
        if name.is_some() {
            self.custom.save(profile.clone())?;
        }
        Ok(profile)
    }

    fn infer(
        &mut self,
        text: &str,
        voice: &VoiceProfile,
        params: &SamplingParams,
    ) -> Result<SynthesisResult> {
        let model = self.model.as_mut().ok_or(KokoroError::ModelNotLoaded)?;

        let samples = match &voice.kind {
            VoiceKind::Preset => {
                let lang = voice_lang(&voice.name).unwrap_or(self.clone_language.as_str());
                model.synthesize_text(text, Style::Preset(&voice.name), lang, params, &self.espeak)?
            }
            VoiceKind::Custom {
                language, style, ..
            } => {
                let style = style
                    .as_deref()
                    .and_then(|s| <&[f32; STYLE_DIM]>::try_from(s).ok())
                    .ok_or_else(|| {
                        KokoroError::VoiceParse(format!(
                            "voice '{}' has no {}-value style embedding",
                            voice.name, STYLE_DIM
                        ))
                    })?;
                model.synthesize_text(
                    text,
                    Style::Embedding(style),
                    language,
                    params,
                    &self.espeak,
                )?
            }
        };

        Ok(SynthesisResult::new(samples, SAMPLE_RATE))
    }

    fn close(&mut self) {
        self.unload_model();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clone_name_may_not_shadow_a_preset() {
        let presets = PresetVoices::from_styles([("Binh", vec![[0f32; STYLE_DIM]])]);

        assert!(check_clone_name(&presets, "MyCustomVoice").is_ok());
        assert!(matches!(
            check_clone_name(&presets, "Binh"),
            Err(Error::InvalidVoiceName(_))
        ));
        assert!(check_clone_name(&presets, "../Binh").is_err());
    }
}
