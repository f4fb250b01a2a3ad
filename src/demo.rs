//! End-to-end walkthrough: presets, optional cloning, synthesis, cleanup.

use std::path::PathBuf;

use crate::client::Vieneu;
use crate::error::Result;
use crate::sampling::SamplingParams;

/// Inputs of the walkthrough.
#[derive(Debug, Clone)]
pub struct DemoOptions {
    /// Preset used unless cloning succeeds.
    pub preset_voice: String,
    /// Reference clip to clone. Cloning is skipped when the file is missing.
    pub sample_audio: PathBuf,
    /// Exact transcript of `sample_audio`, punctuation included.
    pub sample_text: String,
    /// Name the cloned voice is saved under.
    pub voice_name: String,
    pub text: String,
    pub params: SamplingParams,
    pub output: PathBuf,
}

impl Default for DemoOptions {
    fn default() -> Self {
        Self {
            preset_voice: "Binh".to_string(),
            sample_audio: PathBuf::from("example.wav"),
            sample_text: "ví dụ 2. tính trung bình của dãy số.".to_string(),
            voice_name: "MyCustomVoice".to_string(),
            text: "Xin chào, tôi là VieNeu-TTS. Tôi có thể giúp bạn đọc sách, \
                   làm chatbot thời gian thực, \
                   hoặc thậm chí clone giọng nói của bạn."
                .to_string(),
            params: SamplingParams::default(),
            output: PathBuf::from("output.wav"),
        }
    }
}

/// What the walkthrough did.
#[derive(Debug, Clone, PartialEq)]
pub struct DemoReport {
    pub voices_before: Vec<String>,
    /// Voice list after cloning; `None` when cloning was skipped.
    pub voices_after: Option<Vec<String>>,
    pub voice_used: String,
    pub cloned: bool,
    pub output: PathBuf,
    pub sample_rate: u32,
    pub duration_secs: f64,
}

/// Run the walkthrough and close `client` afterwards.
///
/// The client is closed whether or not a step fails; the first error is
/// returned.
pub fn run(client: &mut Vieneu, options: &DemoOptions) -> Result<DemoReport> {
    let result = run_steps(client, options);
    client.close();
    result
}

fn run_steps(client: &mut Vieneu, options: &DemoOptions) -> Result<DemoReport> {
    let voices_before = client.list_preset_voices()?;
    log::info!("Available preset voices: {voices_before:?}");

    let mut voice = client.get_preset_voice(&options.preset_voice)?;

    let mut voices_after = None;
    if options.sample_audio.exists() {
        voice = client.clone_voice(
            &options.sample_audio,
            &options.sample_text,
            Some(&options.voice_name),
        )?;
        let voices = client.list_preset_voices()?;
        log::info!("Voice list after adding: {voices:?}");
        voices_after = Some(voices);
    } else {
        log::warn!(
            "Sample audio {} not found, keeping preset voice '{}'",
            options.sample_audio.display(),
            voice.name
        );
    }

    let audio = client.infer(&options.text, &voice, &options.params)?;
    audio.write_wav(&options.output)?;
    log::info!("Saved {}", options.output.display());

    Ok(DemoReport {
        voices_before,
        cloned: voices_after.is_some(),
        voices_after,
        voice_used: voice.name,
        output: options.output.clone(),
        sample_rate: audio.sample_rate,
        duration_secs: audio.duration_secs(),
    })
}
