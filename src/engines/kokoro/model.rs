use std::borrow::Cow;
use std::path::{Path, PathBuf};

use ndarray::Array2;
use ort::execution_providers::CPUExecutionProvider;
use ort::inputs;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::{Session, SessionInputValue};
use ort::value::TensorRef;

use crate::sampling::SamplingParams;

use super::phonemizer::{phonemize, EspeakConfig};
use super::vocab::Vocab;
use super::voices::PresetVoices;

/// Maximum number of phoneme tokens per chunk (before padding).
pub const MAX_PHONEME_LEN: usize = 510;

/// Style vector dimension.
pub const STYLE_DIM: usize = 256;

/// Speaking rate fed to the graph.
const SPEED: f32 = 1.0;

/// Crossfade (in samples) used when concatenating chunk audio.
const CHUNK_CROSSFADE_SAMPLES: usize = 240; // 10ms @ 24kHz

/// File name of the optional reference-clip encoder.
pub const STYLE_ENCODER_FILE: &str = "style_encoder.onnx";

/// Preset voice archive shipped next to the backbone graph.
pub const PRESET_VOICES_FILE: &str = "voices-v1.0.bin";

#[derive(thiserror::Error, Debug)]
pub enum KokoroError {
    #[error("ONNX runtime error: {0}")]
    Ort(#[from] ort::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Array shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),
    #[error(
        "espeak-ng not found. Install: Linux: `sudo apt-get install espeak-ng`, \
         macOS: `brew install espeak-ng`, Windows: https://espeak-ng.org/download"
    )]
    EspeakNotFound,
    #[error("Phonemization failed: {0}")]
    PhonemizerFailed(String),
    #[error("Voice '{0}' not found.")]
    VoiceNotFound(String),
    #[error("Model not loaded. Call load_model() first.")]
    ModelNotLoaded,
    #[error("Invalid config.json: {0}")]
    Config(String),
    #[error("Failed to parse voice file: {0}")]
    VoiceParse(String),
    #[error("Style encoder produced {got} values, expected {}", STYLE_DIM)]
    StyleDim { got: usize },
}

/// Which export of the backbone to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Precision {
    #[default]
    Quantized,
    Full,
}

/// Style conditioning for one request.
#[derive(Debug, Clone, Copy)]
pub enum Style<'a> {
    /// Preset voice; the row is picked by phoneme count.
    Preset(&'a str),
    /// Fixed embedding, e.g. from a cloned voice.
    Embedding(&'a [f32; STYLE_DIM]),
}

/// Optional graph inputs, detected at load time.
#[derive(Debug, Clone, Copy, Default)]
struct SamplingInputs {
    temperature: bool,
    top_k: bool,
}

/// Loaded backbone graph plus its voices and vocabulary.
pub struct KokoroModel {
    session: Session,
    presets: PresetVoices,
    vocab: Vocab,
    /// Detected input name: "input_ids" or "tokens"
    tokens_input_name: String,
    /// True if the speed input expects int32, false for float32
    speed_is_int32: bool,
    sampling_inputs: SamplingInputs,
}

impl KokoroModel {
    /// Load the backbone export from a directory.
    ///
    /// The directory must contain:
    /// - an `.onnx` graph (picked according to `precision`)
    /// - a `voices-v1.0.bin` preset voice archive
    /// - optionally a `config.json` for vocabulary (falls back to the built-in table)
    pub fn load(
        model_dir: &Path,
        precision: Precision,
        num_threads: Option<usize>,
        optimized_cache_path: Option<&Path>,
    ) -> Result<Self, KokoroError> {
        let onnx_path = find_onnx_file(model_dir, precision)?;
        log::info!(
            "Loading {precision:?} backbone from {}",
            onnx_path.display()
        );

        let session = init_session(&onnx_path, num_threads, optimized_cache_path)?;

        let tokens_input_name = detect_tokens_input(&session);
        let speed_is_int32 = detect_speed_type(&session);
        let sampling_inputs = detect_sampling_inputs(&session);
        log::info!(
            "Detected: tokens_input='{}', speed_is_int32={}, temperature={}, top_k={}",
            tokens_input_name,
            speed_is_int32,
            sampling_inputs.temperature,
            sampling_inputs.top_k
        );

        let voices_path = model_dir.join(PRESET_VOICES_FILE);
        if !voices_path.exists() {
            return Err(KokoroError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("Preset voice archive not found at {}", voices_path.display()),
            )));
        }
        let presets = PresetVoices::load(&voices_path)?;

        let config_path = model_dir.join("config.json");
        let vocab = if config_path.exists() {
            log::info!("Loading vocab from config.json");
            Vocab::load(&config_path)?
        } else {
            log::warn!("config.json not found, using built-in vocab");
            Vocab::builtin()
        };

        Ok(Self {
            session,
            presets,
            vocab,
            tokens_input_name,
            speed_is_int32,
            sampling_inputs,
        })
    }

    pub fn presets(&self) -> &PresetVoices {
        &self.presets
    }

    /// Synthesize audio for `text`, phonemized in `lang`.
    pub fn synthesize_text(
        &mut self,
        text: &str,
        style: Style<'_>,
        lang: &str,
        params: &SamplingParams,
        espeak: &EspeakConfig,
    ) -> Result<Vec<f32>, KokoroError> {
        let ids = phonemize(text, lang, &self.vocab, espeak)?;
        if ids.is_empty() {
            log::warn!("No phoneme tokens produced for text: {text:?}");
            return Ok(vec![]);
        }

        if !self.sampling_inputs.temperature || !self.sampling_inputs.top_k {
            log::debug!(
                "Graph ignores some sampling params (temperature={}, top_k={})",
                params.temperature,
                params.top_k
            );
        }

        // One style row for the whole utterance, so chunks share prosody.
        let style = match style {
            Style::Preset(name) => self.presets.get_style(name, ids.len())?,
            Style::Embedding(embedding) => *embedding,
        };

        let chunks = if ids.len() > MAX_PHONEME_LEN {
            log::debug!(
                "Phoneme sequence exceeded limit ({} > {}), chunking",
                ids.len(),
                MAX_PHONEME_LEN
            );
            split_chunks(&ids, &self.vocab)
        } else {
            vec![ids]
        };

        let mut combined = Vec::new();
        for chunk_ids in &chunks {
            let audio = self.synthesize_chunk(chunk_ids, &style, params)?;
            if audio.is_empty() {
                continue;
            }
            append_with_crossfade(&mut combined, &audio, CHUNK_CROSSFADE_SAMPLES);
        }

        Ok(combined)
    }

    /// Run the graph on a single chunk of phoneme token ids.
    fn synthesize_chunk(
        &mut self,
        tokens: &[i64],
        style: &[f32; STYLE_DIM],
        params: &SamplingParams,
    ) -> Result<Vec<f32>, KokoroError> {
        let seq_len = tokens.len() + 2; // +2 for padding tokens

        // [[0, t1..tN, 0]]
        let mut padded = vec![0i64; seq_len];
        padded[1..seq_len - 1].copy_from_slice(tokens);
        let tokens_arr = Array2::from_shape_vec((1, seq_len), padded)?;
        let style_view = ndarray::ArrayView2::from_shape((1, STYLE_DIM), style.as_slice())?;

        let speed_i32 = ndarray::arr1(&[SPEED as i32]);
        let speed_f32 = ndarray::arr1(&[SPEED]);
        let temperature = ndarray::arr1(&[params.temperature]);
        let top_k = ndarray::arr1(&[i64::from(params.top_k)]);

        let mut session_inputs = inputs![
            self.tokens_input_name.as_str() => TensorRef::from_array_view(tokens_arr.view())?,
            "style" => TensorRef::from_array_view(style_view)?,
        ];
        let speed = if self.speed_is_int32 {
            SessionInputValue::from(TensorRef::from_array_view(speed_i32.view())?)
        } else {
            SessionInputValue::from(TensorRef::from_array_view(speed_f32.view())?)
        };
        session_inputs.push((Cow::from("speed"), speed));
        if self.sampling_inputs.temperature {
            session_inputs.push((
                Cow::from("temperature"),
                SessionInputValue::from(TensorRef::from_array_view(temperature.view())?),
            ));
        }
        if self.sampling_inputs.top_k {
            session_inputs.push((
                Cow::from("top_k"),
                SessionInputValue::from(TensorRef::from_array_view(top_k.view())?),
            ));
        }

        let output = self.session.run(session_inputs)?;

        let first_output = output
            .iter()
            .next()
            .ok_or_else(|| KokoroError::Ort(ort::Error::new("No output from model")))?;
        let waveform = first_output.1.try_extract_array::<f32>()?;

        Ok(waveform.iter().copied().collect())
    }
}

/// Encoder turning a 24 kHz reference clip into a style embedding.
pub struct StyleEncoder {
    session: Session,
    input_name: String,
}

impl StyleEncoder {
    /// Load `style_encoder.onnx` from the model directory, if present.
    pub fn load_optional(
        model_dir: &Path,
        num_threads: Option<usize>,
    ) -> Result<Option<Self>, KokoroError> {
        let path = model_dir.join(STYLE_ENCODER_FILE);
        if !path.exists() {
            log::info!(
                "No {STYLE_ENCODER_FILE} in {}, voice cloning disabled",
                model_dir.display()
            );
            return Ok(None);
        }

        let session = init_session(&path, num_threads, None)?;
        let input_name = session
            .inputs()
            .first()
            .map(|input| input.name().to_string())
            .unwrap_or_else(|| "audio".to_string());
        log::info!("Loaded style encoder from {}", path.display());
        Ok(Some(Self {
            session,
            input_name,
        }))
    }

    pub fn encode(&mut self, samples: &[f32]) -> Result<[f32; STYLE_DIM], KokoroError> {
        let audio = ndarray::ArrayView2::from_shape((1, samples.len()), samples)?;
        let output = self.session.run(inputs![
            self.input_name.as_str() => TensorRef::from_array_view(audio)?,
        ])?;

        let first_output = output
            .iter()
            .next()
            .ok_or_else(|| KokoroError::Ort(ort::Error::new("No output from style encoder")))?;
        let embedding = first_output.1.try_extract_array::<f32>()?;

        let values: Vec<f32> = embedding.iter().copied().collect();
        <[f32; STYLE_DIM]>::try_from(values.as_slice())
            .map_err(|_| KokoroError::StyleDim { got: values.len() })
    }
}

fn is_quantized_graph(path: &Path) -> bool {
    path.file_stem()
        .and_then(|s| s.to_str())
        .map(|s| {
            let s = s.to_ascii_lowercase();
            s.contains("quant") || s.contains("int8") || s.contains("q4") || s.contains("q8")
        })
        .unwrap_or(false)
}

/// Find the backbone graph in `model_dir`.
///
/// Prefers a graph matching `precision`, then any `.onnx` other than the
/// style encoder.
pub(crate) fn find_onnx_file(
    model_dir: &Path,
    precision: Precision,
) -> Result<PathBuf, KokoroError> {
    let mut candidates: Vec<PathBuf> = std::fs::read_dir(model_dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.extension().and_then(|e| e.to_str()) == Some("onnx"))
        .filter(|path| path.file_name().and_then(|n| n.to_str()) != Some(STYLE_ENCODER_FILE))
        .collect();
    candidates.sort();

    let wants_quantized = precision == Precision::Quantized;
    if let Some(path) = candidates
        .iter()
        .find(|path| is_quantized_graph(path) == wants_quantized)
    {
        return Ok(path.clone());
    }

    match candidates.into_iter().next() {
        Some(path) => {
            log::warn!(
                "No {precision:?} graph in {}, falling back to {}",
                model_dir.display(),
                path.display()
            );
            Ok(path)
        }
        None => Err(KokoroError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("No .onnx file found in {}", model_dir.display()),
        ))),
    }
}

/// Initialize an ONNX session with optional on-disk graph caching.
///
/// With a cache path, the first load runs Level3 optimization and serializes
/// the result there; later loads read it back with optimization disabled.
fn init_session(
    onnx_path: &Path,
    num_threads: Option<usize>,
    optimized_cache_path: Option<&Path>,
) -> Result<Session, KokoroError> {
    let providers = vec![CPUExecutionProvider::default().build()];

    let (load_path, opt_level, write_cache) = match optimized_cache_path {
        Some(cache) if cache.exists() => {
            log::info!(
                "Loading pre-optimized graph from {} and skipping Level3",
                cache.display()
            );
            (cache, GraphOptimizationLevel::Disable, None)
        }
        Some(cache) => {
            log::info!(
                "First load: running Level3 optimization, saving graph to {}",
                cache.display()
            );
            (onnx_path, GraphOptimizationLevel::Level3, Some(cache))
        }
        None => (onnx_path, GraphOptimizationLevel::Level3, None),
    };

    let mut builder = Session::builder()?
        .with_optimization_level(opt_level)?
        .with_execution_providers(providers)?
        .with_parallel_execution(true)?;

    if let Some(cache) = write_cache {
        builder = builder.with_optimized_model_path(cache)?;
    }

    if let Some(threads) = num_threads {
        builder = builder
            .with_intra_threads(threads)?
            .with_inter_threads(threads)?;
    }

    Ok(builder.commit_from_file(load_path)?)
}

/// Detect the token input name ("input_ids" or "tokens") from session inputs.
fn detect_tokens_input(session: &Session) -> String {
    session
        .inputs()
        .iter()
        .map(|input| input.name())
        .find(|name| *name == "input_ids" || *name == "tokens")
        .unwrap_or("input_ids")
        .to_string()
}

/// Detect whether the speed input expects int32 (true) or float32 (false).
fn detect_speed_type(session: &Session) -> bool {
    session
        .inputs()
        .iter()
        .find(|input| input.name() == "speed")
        .map(|input| {
            let type_str = format!("{:?}", input.dtype());
            type_str.contains("Int32") || type_str.contains("int32")
        })
        .unwrap_or(true)
}

fn detect_sampling_inputs(session: &Session) -> SamplingInputs {
    let has = |name: &str| session.inputs().iter().any(|input| input.name() == name);
    SamplingInputs {
        temperature: has("temperature"),
        top_k: has("top_k"),
    }
}

/// Split phoneme ids into chunks of at most `MAX_PHONEME_LEN`, preferring
/// to cut right after clause punctuation.
fn split_chunks(ids: &[i64], vocab: &Vocab) -> Vec<Vec<i64>> {
    let mut chunks = Vec::new();
    let mut start = 0;

    while start < ids.len() {
        let end = (start + MAX_PHONEME_LEN).min(ids.len());
        if end == ids.len() {
            chunks.push(ids[start..end].to_vec());
            break;
        }

        let split = ids[start..end]
            .iter()
            .rposition(|&id| vocab.is_split_point(id))
            .map(|i| start + i + 1)
            .unwrap_or(end);

        chunks.push(ids[start..split].to_vec());
        start = split;
    }

    chunks
}

fn append_with_crossfade(dst: &mut Vec<f32>, src: &[f32], crossfade_samples: usize) {
    let overlap = crossfade_samples.min(dst.len()).min(src.len());
    if overlap == 0 {
        dst.extend_from_slice(src);
        return;
    }

    let dst_start = dst.len() - overlap;
    for i in 0..overlap {
        let t = (i + 1) as f32 / (overlap as f32 + 1.0);
        dst[dst_start + i] = dst[dst_start + i] * (1.0 - t) + src[i] * t;
    }

    dst.extend_from_slice(&src[overlap..]);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunks_break_after_punctuation() {
        let vocab = Vocab::builtin();
        let period = vocab.id('.').unwrap();
        let mut ids = vec![50i64; 300];
        ids.push(period);
        ids.extend(vec![50i64; 300]);

        let chunks = split_chunks(&ids, &vocab);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].len(), 301);
        assert_eq!(*chunks[0].last().unwrap(), period);
        assert_eq!(chunks[1].len(), 300);
    }

    #[test]
    fn chunks_hard_split_without_punctuation() {
        let vocab = Vocab::builtin();
        let ids = vec![50i64; MAX_PHONEME_LEN * 2 + 5];
        let chunks = split_chunks(&ids, &vocab);
        assert_eq!(
            chunks.iter().map(Vec::len).collect::<Vec<_>>(),
            vec![MAX_PHONEME_LEN, MAX_PHONEME_LEN, 5]
        );
    }

    #[test]
    fn crossfade_blends_overlap() {
        let mut dst = vec![1.0f32; 4];
        append_with_crossfade(&mut dst, &[0.0; 4], 2);
        assert_eq!(dst.len(), 6);
        assert!(dst[2] < 1.0 && dst[2] > dst[3]);
        assert_eq!(&dst[4..], &[0.0, 0.0]);

        let mut empty = Vec::new();
        append_with_crossfade(&mut empty, &[0.5, 0.5], 2);
        assert_eq!(empty, vec![0.5, 0.5]);
    }

    #[test]
    fn graph_selection_follows_precision() {
        let dir = tempfile::tempdir().unwrap();
        for name in [
            "kokoro-quant-convinteger.onnx",
            "kokoro-v1.0.onnx",
            STYLE_ENCODER_FILE,
        ] {
            std::fs::write(dir.path().join(name), b"").unwrap();
        }

        let quant = find_onnx_file(dir.path(), Precision::Quantized).unwrap();
        assert!(quant.ends_with("kokoro-quant-convinteger.onnx"));
        let full = find_onnx_file(dir.path(), Precision::Full).unwrap();
        assert!(full.ends_with("kokoro-v1.0.onnx"));
    }

    #[test]
    fn graph_selection_falls_back_but_never_to_encoder() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(STYLE_ENCODER_FILE), b"").unwrap();
        assert!(find_onnx_file(dir.path(), Precision::Full).is_err());

        std::fs::write(dir.path().join("model_int8.onnx"), b"").unwrap();
        let path = find_onnx_file(dir.path(), Precision::Full).unwrap();
        assert!(path.ends_with("model_int8.onnx"));
    }
}
