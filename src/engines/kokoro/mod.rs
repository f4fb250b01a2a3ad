//! Local backend: the backbone's ONNX export run on ONNX Runtime.
//!
//! Text is phonemized with espeak-ng, mapped to token ids, and run through
//! the graph together with a 256-dim style vector that selects the voice.
//!
//! # System Requirements
//!
//! **espeak-ng** must be installed, or bundled and passed through
//! [`KokoroEngine::with_espeak`]:
//! - **Linux**: `sudo apt-get install espeak-ng`
//! - **macOS**: `brew install espeak-ng`
//! - **Windows**: Download installer from <https://espeak-ng.org/download>
//!
//! # Model Directory Layout
//!
//! ```text
//! models/<backbone repo id>/
//! ├── model-quant.onnx        # quantized export, used by LocalQuantized
//! ├── model.onnx              # full-precision export, used by LocalFullPrecision
//! ├── style_encoder.onnx      # optional, enables voice cloning
//! ├── voices-v1.0.bin         # preset voices (.npz of [N, 256] f32 rows)
//! └── config.json             # optional vocabulary
//! ```
//!
//! Only one of the two graphs is required; when the preferred precision is
//! missing the other one is used.
//!
//! # Languages
//!
//! Preset voices named `{prefix}_{name}` pick their espeak-ng language from
//! the prefix (`af_`/`am_` American English, `vf_`/`vm_` Vietnamese, ...).
//! Unprefixed presets and cloned voices use the configured clone language
//! (`vi` by default).
//!
//! # Sampling
//!
//! `temperature` and `top_k` are fed only to graphs that declare inputs with
//! those names. Other graphs are deterministic and ignore them.

pub mod engine;
pub mod model;
pub mod phonemizer;
pub mod vocab;
pub mod voices;

pub use engine::{KokoroEngine, KokoroModelParams};
pub use model::{KokoroError, Precision};
