//! Remote backend: synthesis requests go to a separately running inference
//! server over HTTP.
//!
//! Endpoints, relative to the configured API base:
//!
//! | Method | Path            | Body                                   | Response             |
//! |--------|-----------------|----------------------------------------|----------------------|
//! | GET    | `voices`        |                                        | `{"voices": [..]}`   |
//! | POST   | `voices`        | `{name, text, language, audio, save}`  | `{"name": ..}`       |
//! | POST   | `audio/speech`  | `{model, input, voice, temperature, ..}` | WAV bytes          |
//!
//! `audio` is the reference clip's file bytes, base64 encoded. A 404 from
//! `audio/speech` whose error message names the requested voice means the
//! voice is unknown; any other 404 (wrong API base, missing route) is
//! reported as the server sent it.

use std::path::Path;
use std::time::Duration;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use reqwest::blocking::{Client, Response};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use crate::audio::{SynthesisResult, SAMPLE_RATE};
use crate::config::{ClientConfig, ExecutionMode};
use crate::error::{Error, Result};
use crate::sampling::SamplingParams;
use crate::voice::{validate_voice_name, VoiceProfile};
use crate::SpeechBackend;

#[derive(Debug, Deserialize)]
struct VoicesResponse {
    voices: Vec<String>,
}

#[derive(Debug, Serialize)]
struct CloneRequest<'a> {
    name: &'a str,
    text: &'a str,
    language: &'a str,
    audio: String,
    save: bool,
}

#[derive(Debug, Deserialize)]
struct CloneResponse {
    name: String,
}

#[derive(Debug, Serialize)]
struct SpeechRequest<'a> {
    model: &'a str,
    input: &'a str,
    voice: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    transcript: Option<&'a str>,
    temperature: f32,
    top_k: u32,
    response_format: &'static str,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: Option<ErrorDetail>,
    #[serde(default)]
    detail: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
}

/// Client for a remote inference server.
pub struct RemoteEngine {
    client: Option<Client>,
    api_base: String,
    model: String,
    clone_language: String,
}

impl RemoteEngine {
    pub fn new(api_base: &str, model: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(timeout)
            .build()?;

        log::info!("Using remote backend at {api_base} with model {model}");
        Ok(Self {
            client: Some(client),
            api_base: api_base.trim_end_matches('/').to_string(),
            model: model.to_string(),
            clone_language: "vi".to_string(),
        })
    }

    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        let ExecutionMode::Remote { api_base } = config.mode() else {
            return Err(Error::Config(
                "the remote engine requires remote mode".to_string(),
            ));
        };
        let mut engine = Self::new(
            &api_base,
            config.backbone.repo_id(),
            Duration::from_secs(config.timeout_secs),
        )?;
        engine.clone_language = config.clone_language.clone();
        Ok(engine)
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    fn client(&self) -> Result<&Client> {
        self.client.as_ref().ok_or(Error::Closed)
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.api_base, path)
    }

    fn fetch_voices(&self) -> Result<Vec<String>> {
        let response = self.client()?.get(self.url("voices")).send()?;
        let body: VoicesResponse = check(response)?.json()?;
        let mut voices = body.voices;
        voices.sort_unstable();
        voices.dedup();
        Ok(voices)
    }
}

/// Turn a non-2xx response into [`Error::Remote`].
fn check(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let text = response.text().unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&text)
        .ok()
        .and_then(|body| {
            body.error
                .map(|e| e.message)
                .or(body.detail)
                .or(body.message)
        })
        .unwrap_or(text);

    Err(Error::Remote {
        status: status.as_u16(),
        message,
    })
}

impl SpeechBackend for RemoteEngine {
    fn name(&self) -> &'static str {
        "remote"
    }

    fn list_preset_voices(&self) -> Result<Vec<String>> {
        self.fetch_voices()
    }

    fn preset_voice(&self, name: &str) -> Result<VoiceProfile> {
        if self.fetch_voices()?.iter().any(|v| v == name) {
            Ok(VoiceProfile::preset(name))
        } else {
            Err(Error::VoiceNotFound(name.to_string()))
        }
    }

    fn clone_voice(
        &mut self,
        audio_path: &Path,
        transcript: &str,
        name: Option<&str>,
    ) -> Result<VoiceProfile> {
        if !audio_path.exists() {
            return Err(Error::SampleNotFound(audio_path.to_path_buf()));
        }
        if let Some(name) = name {
            validate_voice_name(name)?;
        }

        let audio = BASE64.encode(std::fs::read(audio_path)?);
        let fallback_name = audio_path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("custom");
        let request = CloneRequest {
            name: name.unwrap_or(fallback_name),
            text: transcript,
            language: &self.clone_language,
            audio,
            save: name.is_some(),
        };

        let response = self
            .client()?
            .post(self.url("voices"))
            .json(&request)
            .send()?;
        let body: CloneResponse = check(response)?.json()?;
        log::info!("Server registered voice '{}'", body.name);

        Ok(VoiceProfile::custom(
            body.name,
            transcript,
            self.clone_language.as_str(),
            None,
        ))
    }

    fn infer(
        &mut self,
        text: &str,
        voice: &VoiceProfile,
        params: &SamplingParams,
    ) -> Result<SynthesisResult> {
        let request = SpeechRequest {
            model: &self.model,
            input: text,
            voice: &voice.name,
            transcript: voice.transcript(),
            temperature: params.temperature,
            top_k: params.top_k,
            response_format: "wav",
        };

        let response = self
            .client()?
            .post(self.url("audio/speech"))
            .json(&request)
            .send()?;
        let bytes = match check(response) {
            Ok(response) => response.bytes()?,
            Err(Error::Remote { status, message })
                if status == StatusCode::NOT_FOUND.as_u16() && message.contains(&voice.name) =>
            {
                log::debug!("Server rejected voice '{}': {message}", voice.name);
                return Err(Error::VoiceNotFound(voice.name.clone()));
            }
            Err(e) => return Err(e),
        };

        let result = SynthesisResult::from_wav_bytes(&bytes)?;
        if result.sample_rate != SAMPLE_RATE {
            log::warn!(
                "Server returned {} Hz audio, expected {} Hz",
                result.sample_rate,
                SAMPLE_RATE
            );
        }
        Ok(result)
    }

    fn close(&mut self) {
        if self.client.take().is_some() {
            log::info!("Closed remote backend at {}", self.api_base);
        }
    }
}
