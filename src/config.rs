//! Client configuration: backbone selection, execution mode and paths.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use derive_builder::Builder;

use crate::error::{Error, Result};

/// Pretrained backbone variants, trading quality against speed and size.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Backbone {
    /// 0.3B, 4-bit GGUF. Fastest, CPU friendly.
    #[default]
    Q4Gguf,
    /// 0.3B, 8-bit GGUF. Better quality than q4, a bit slower.
    Q8Gguf,
    /// 0.3B, uncompressed.
    Small,
    /// 0.5B, uncompressed. Best quality, heaviest.
    Standard,
    /// Any other identifier, e.g. a backbone merged with a LoRA adapter.
    Custom(String),
}

impl Backbone {
    pub fn repo_id(&self) -> &str {
        match self {
            Self::Q4Gguf => "pnnbao-ump/VieNeu-TTS-0.3B-q4-gguf",
            Self::Q8Gguf => "pnnbao-ump/VieNeu-TTS-0.3B-q8-gguf",
            Self::Small => "pnnbao-ump/VieNeu-TTS-0.3B",
            Self::Standard => "pnnbao-ump/VieNeu-TTS",
            Self::Custom(id) => id,
        }
    }

    pub fn is_quantized(&self) -> bool {
        match self {
            Self::Q4Gguf | Self::Q8Gguf => true,
            Self::Small | Self::Standard => false,
            Self::Custom(id) => {
                let id = id.to_ascii_lowercase();
                id.contains("gguf") || id.contains("-q4") || id.contains("-q8")
            }
        }
    }

    /// Local mode matching the backbone's precision.
    pub fn default_mode(&self) -> ExecutionMode {
        if self.is_quantized() {
            ExecutionMode::LocalQuantized
        } else {
            ExecutionMode::LocalFullPrecision
        }
    }
}

impl FromStr for Backbone {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(Error::Config("backbone identifier is empty".to_string()));
        }
        let known = [Self::Q4Gguf, Self::Q8Gguf, Self::Small, Self::Standard];
        Ok(known
            .into_iter()
            .find(|b| b.repo_id() == s)
            .unwrap_or_else(|| Self::Custom(s.to_string())))
    }
}

impl fmt::Display for Backbone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.repo_id())
    }
}

/// Where inference runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionMode {
    /// Local CPU inference on the quantized export.
    LocalQuantized,
    /// Local inference on the full-precision export.
    LocalFullPrecision,
    /// Requests go to a separately running inference server.
    Remote { api_base: String },
}

impl ExecutionMode {
    pub fn is_remote(&self) -> bool {
        matches!(self, Self::Remote { .. })
    }

    /// Parse a mode name. `api_base` is only consulted for `remote`.
    ///
    /// `standard` and `local` resolve to the backbone's own local mode.
    pub fn parse(name: &str, api_base: Option<&str>, backbone: &Backbone) -> Result<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "standard" | "local" => Ok(backbone.default_mode()),
            "quantized" => Ok(Self::LocalQuantized),
            "full" | "full-precision" => Ok(Self::LocalFullPrecision),
            "remote" => {
                let api_base = api_base
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .ok_or_else(|| {
                        Error::Config("remote mode requires an API base URL".to_string())
                    })?;
                Ok(Self::Remote {
                    api_base: api_base.to_string(),
                })
            }
            other => Err(Error::Config(format!("unknown execution mode {other:?}"))),
        }
    }
}

/// Everything needed to construct a [`crate::Vieneu`] client.
///
/// ```rust
/// use vieneu_rs::{Backbone, ClientConfigBuilder, ExecutionMode};
///
/// let config = ClientConfigBuilder::default()
///     .backbone(Backbone::Small)
///     .mode(ExecutionMode::Remote { api_base: "http://localhost:23333/v1".into() })
///     .build()?;
/// assert!(config.mode().is_remote());
/// # Ok::<(), vieneu_rs::Error>(())
/// ```
#[derive(Debug, Clone, Builder)]
#[builder(default, build_fn(error = "crate::error::Error"))]
pub struct ClientConfig {
    pub backbone: Backbone,
    /// `None` picks the backbone's own local mode.
    #[builder(setter(strip_option))]
    pub mode: Option<ExecutionMode>,
    /// Root under which each backbone lives at `<root>/<repo_id>`.
    #[builder(setter(into))]
    pub models_root: PathBuf,
    /// Where cloned voices are persisted in local modes.
    #[builder(setter(into))]
    pub voices_dir: PathBuf,
    /// CPU threads for local inference. `None` lets ORT decide.
    #[builder(setter(strip_option))]
    pub num_threads: Option<usize>,
    /// Where the optimized ONNX graph is cached between runs.
    #[builder(setter(into, strip_option))]
    pub optimized_model_cache_path: Option<PathBuf>,
    /// espeak-ng language used for cloned voices.
    #[builder(setter(into))]
    pub clone_language: String,
    pub timeout_secs: u64,
    #[builder(setter(into, strip_option))]
    pub espeak_bin: Option<PathBuf>,
    #[builder(setter(into, strip_option))]
    pub espeak_data: Option<PathBuf>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            backbone: Backbone::default(),
            mode: None,
            models_root: PathBuf::from("models"),
            voices_dir: PathBuf::from("voices"),
            num_threads: None,
            optimized_model_cache_path: None,
            clone_language: "vi".to_string(),
            timeout_secs: 120,
            espeak_bin: None,
            espeak_data: None,
        }
    }
}

impl From<derive_builder::UninitializedFieldError> for Error {
    fn from(e: derive_builder::UninitializedFieldError) -> Self {
        Error::Config(e.to_string())
    }
}

impl ClientConfig {
    /// Effective execution mode.
    pub fn mode(&self) -> ExecutionMode {
        self.mode
            .clone()
            .unwrap_or_else(|| self.backbone.default_mode())
    }

    pub fn model_dir(&self) -> PathBuf {
        self.models_root.join(self.backbone.repo_id())
    }

    pub fn validate(&self) -> Result<()> {
        if self.num_threads == Some(0) {
            return Err(Error::Config("num_threads must be at least 1".to_string()));
        }
        if self.timeout_secs == 0 {
            return Err(Error::Config("timeout_secs must be at least 1".to_string()));
        }
        if let ExecutionMode::Remote { api_base } = self.mode() {
            if !(api_base.starts_with("http://") || api_base.starts_with("https://")) {
                return Err(Error::Config(format!(
                    "remote API base must be an http(s) URL, got {api_base:?}"
                )));
            }
        }
        Ok(())
    }

    /// Build a configuration from `VIENEU_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from an arbitrary key lookup.
    ///
    /// Recognized keys: `VIENEU_BACKBONE`, `VIENEU_MODE`, `VIENEU_API_BASE`,
    /// `VIENEU_MODELS_DIR`, `VIENEU_VOICES_DIR`, `VIENEU_THREADS`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(backbone) = lookup("VIENEU_BACKBONE") {
            config.backbone = backbone.parse()?;
        }

        let api_base = lookup("VIENEU_API_BASE");
        config.mode = match lookup("VIENEU_MODE") {
            Some(mode) => Some(ExecutionMode::parse(
                &mode,
                api_base.as_deref(),
                &config.backbone,
            )?),
            None => api_base.map(|api_base| ExecutionMode::Remote { api_base }),
        };

        if let Some(dir) = lookup("VIENEU_MODELS_DIR") {
            config.models_root = PathBuf::from(dir);
        }
        if let Some(dir) = lookup("VIENEU_VOICES_DIR") {
            config.voices_dir = PathBuf::from(dir);
        }
        if let Some(threads) = lookup("VIENEU_THREADS") {
            let threads = threads
                .trim()
                .parse::<usize>()
                .map_err(|e| Error::Config(format!("VIENEU_THREADS={threads:?}: {e}")))?;
            config.num_threads = Some(threads);
        }

        config.validate()?;
        log::debug!("Resolved client config: {config:?}");
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn known_repo_ids_parse_to_named_variants() {
        let b: Backbone = "pnnbao-ump/VieNeu-TTS-0.3B-q8-gguf".parse().unwrap();
        assert_eq!(b, Backbone::Q8Gguf);
        let b: Backbone = "me/merged-lora-q4-gguf".parse().unwrap();
        assert_eq!(b, Backbone::Custom("me/merged-lora-q4-gguf".to_string()));
        assert!(b.is_quantized());
    }

    #[test]
    fn default_mode_follows_precision() {
        assert_eq!(Backbone::Q4Gguf.default_mode(), ExecutionMode::LocalQuantized);
        assert_eq!(
            Backbone::Standard.default_mode(),
            ExecutionMode::LocalFullPrecision
        );
    }

    #[test]
    fn remote_mode_requires_api_base() {
        let backbone = Backbone::default();
        assert!(ExecutionMode::parse("remote", None, &backbone).is_err());
        assert!(ExecutionMode::parse("remote", Some("  "), &backbone).is_err());
        assert_eq!(
            ExecutionMode::parse("remote", Some("http://localhost:23333/v1"), &backbone).unwrap(),
            ExecutionMode::Remote {
                api_base: "http://localhost:23333/v1".to_string()
            }
        );
    }

    #[test]
    fn empty_environment_gives_quantized_default() {
        let config = ClientConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.backbone, Backbone::Q4Gguf);
        assert_eq!(config.mode(), ExecutionMode::LocalQuantized);
        assert_eq!(
            config.model_dir(),
            PathBuf::from("models/pnnbao-ump/VieNeu-TTS-0.3B-q4-gguf")
        );
    }

    #[test]
    fn standard_mode_follows_backbone_precision() {
        let config = ClientConfig::from_lookup(lookup(&[
            ("VIENEU_BACKBONE", "pnnbao-ump/VieNeu-TTS"),
            ("VIENEU_MODE", "standard"),
        ]))
        .unwrap();
        assert_eq!(config.backbone, Backbone::Standard);
        assert_eq!(config.mode(), ExecutionMode::LocalFullPrecision);

        let config = ClientConfig::from_lookup(lookup(&[("VIENEU_MODE", "standard")])).unwrap();
        assert_eq!(config.mode(), ExecutionMode::LocalQuantized);

        let config = ClientConfig::from_lookup(lookup(&[
            ("VIENEU_BACKBONE", "pnnbao-ump/VieNeu-TTS"),
            ("VIENEU_MODE", "quantized"),
        ]))
        .unwrap();
        assert_eq!(config.mode(), ExecutionMode::LocalQuantized);
    }

    #[test]
    fn api_base_alone_selects_remote() {
        let config = ClientConfig::from_lookup(lookup(&[
            ("VIENEU_BACKBONE", "pnnbao-ump/VieNeu-TTS-0.3B"),
            ("VIENEU_API_BASE", "http://localhost:23333/v1"),
        ]))
        .unwrap();
        assert_eq!(config.backbone, Backbone::Small);
        assert!(config.mode().is_remote());
    }

    #[test]
    fn malformed_values_are_config_errors() {
        let err = ClientConfig::from_lookup(lookup(&[("VIENEU_THREADS", "many")])).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        let err = ClientConfig::from_lookup(lookup(&[("VIENEU_THREADS", "0")])).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        let err = ClientConfig::from_lookup(lookup(&[("VIENEU_MODE", "turbo")])).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn remote_base_must_be_http() {
        let config = ClientConfigBuilder::default()
            .mode(ExecutionMode::Remote {
                api_base: "localhost:23333".to_string(),
            })
            .build()
            .unwrap();
        assert!(config.validate().is_err());
    }
}
