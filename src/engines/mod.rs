//! Speech synthesis backends.
//!
//! Enable backends via Cargo features:
//! - `kokoro` - local inference on the backbone's ONNX export (espeak-ng required)
//! - `remote` - HTTP client for a separately running inference server (default)

#[cfg(feature = "kokoro")]
pub mod kokoro;
#[cfg(feature = "remote")]
pub mod remote;
