//! Waveform container and WAV file I/O.

use std::io::{Read, Seek};
use std::path::Path;

use crate::error::Result;

/// Output sample rate of every backbone this crate talks to.
pub const SAMPLE_RATE: u32 = 24000;

/// The result of a synthesis (text-to-speech) operation.
///
/// Contains raw f32 audio samples and the sample rate of the output audio.
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesisResult {
    /// Raw mono audio samples as f32 values
    pub samples: Vec<f32>,
    /// Sample rate of the audio (24000 for every supported backbone)
    pub sample_rate: u32,
}

impl SynthesisResult {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    /// Write the audio to a mono 32-bit float WAV file.
    pub fn write_wav(&self, path: &Path) -> Result<()> {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: self.sample_rate,
            bits_per_sample: 32,
            sample_format: hound::SampleFormat::Float,
        };
        let mut writer = hound::WavWriter::create(path, spec)?;
        for &sample in &self.samples {
            writer.write_sample(sample)?;
        }
        writer.finalize()?;
        Ok(())
    }

    /// Read a WAV file, downmixing to mono.
    ///
    /// Integer PCM is normalized to `[-1.0, 1.0]`.
    pub fn read_wav(path: &Path) -> Result<Self> {
        let reader = hound::WavReader::open(path)?;
        read_wav_internal(reader)
    }

    /// Decode an in-memory WAV payload, downmixing to mono.
    pub fn from_wav_bytes(bytes: &[u8]) -> Result<Self> {
        let reader = hound::WavReader::new(std::io::Cursor::new(bytes))?;
        read_wav_internal(reader)
    }

    /// Duration of the audio in seconds.
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

fn read_wav_internal<R: Read + Seek>(mut reader: hound::WavReader<R>) -> Result<SynthesisResult> {
    let spec = reader.spec();
    let channels = spec.channels.max(1) as usize;

    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Int => {
            let max_val = (1i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / max_val))
                .collect::<std::result::Result<Vec<_>, _>>()?
        }
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<std::result::Result<Vec<_>, _>>()?,
    };

    let samples = if channels == 1 {
        interleaved
    } else {
        interleaved
            .chunks(channels)
            .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
            .collect()
    };

    Ok(SynthesisResult {
        samples,
        sample_rate: spec.sample_rate,
    })
}

#[cfg(feature = "kokoro")]
const RESAMPLE_CHUNK: usize = 1024;

/// Resample mono audio with windowed-sinc interpolation.
///
/// The filter delay is trimmed and the tail flushed, so the output is aligned
/// with the input and `len * to_sr / from_sr` samples long.
#[cfg(feature = "kokoro")]
pub fn resample(samples: &[f32], from_sr: u32, to_sr: u32) -> Result<Vec<f32>> {
    use rubato::{
        calculate_cutoff, Resampler, SincFixedIn, SincInterpolationParameters,
        SincInterpolationType, WindowFunction,
    };

    use crate::error::Error;

    if from_sr == to_sr || samples.is_empty() {
        return Ok(samples.to_vec());
    }

    let sinc_len = 256;
    let window = WindowFunction::BlackmanHarris2;
    let params = SincInterpolationParameters {
        sinc_len,
        f_cutoff: calculate_cutoff(sinc_len, window),
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window,
    };

    let ratio = to_sr as f64 / from_sr as f64;
    let mut resampler = SincFixedIn::<f32>::new(ratio, 2.0, params, RESAMPLE_CHUNK, 1)
        .map_err(|e| Error::Resample(e.to_string()))?;

    let expected = (samples.len() as f64 * ratio).round() as usize;
    let delay = resampler.output_delay();
    let mut output = Vec::with_capacity(expected + delay);

    let mut chunks = samples.chunks_exact(RESAMPLE_CHUNK);
    for chunk in chunks.by_ref() {
        let frames = resampler
            .process(&[chunk][..], None)
            .map_err(|e| Error::Resample(e.to_string()))?;
        output.extend(frames.into_iter().next().unwrap_or_default());
    }
    let rest = chunks.remainder();
    if !rest.is_empty() {
        let frames = resampler
            .process_partial(Some(&[rest][..]), None)
            .map_err(|e| Error::Resample(e.to_string()))?;
        output.extend(frames.into_iter().next().unwrap_or_default());
    }
    while output.len() < delay + expected {
        let frames = resampler
            .process_partial(None::<&[&[f32]]>, None)
            .map_err(|e| Error::Resample(e.to_string()))?;
        let flushed = frames.into_iter().next().unwrap_or_default();
        if flushed.is_empty() {
            break;
        }
        output.extend(flushed);
    }

    output.drain(..delay.min(output.len()));
    output.truncate(expected);
    Ok(output)
}
