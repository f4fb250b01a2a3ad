//! In-process backend standing in for a real model.

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::BTreeSet;
use std::f32::consts::PI;
use std::path::Path;
use std::rc::Rc;

use vieneu_rs::{
    Error, Result, SamplingParams, SpeechBackend, SynthesisResult, VoiceProfile, SAMPLE_RATE,
};

#[derive(Debug, Default)]
pub struct FakeState {
    pub custom: BTreeSet<String>,
    pub closed: usize,
    pub last_params: Option<SamplingParams>,
    pub last_voice: Option<String>,
}

pub struct FakeBackend {
    presets: Vec<String>,
    pub state: Rc<RefCell<FakeState>>,
}

impl FakeBackend {
    pub fn new(presets: &[&str]) -> (Self, Rc<RefCell<FakeState>>) {
        let state = Rc::new(RefCell::new(FakeState::default()));
        let backend = Self {
            presets: presets.iter().map(|s| s.to_string()).collect(),
            state: Rc::clone(&state),
        };
        (backend, state)
    }
}

impl SpeechBackend for FakeBackend {
    fn name(&self) -> &'static str {
        "fake"
    }

    fn list_preset_voices(&self) -> Result<Vec<String>> {
        let mut voices: Vec<String> = self
            .presets
            .iter()
            .cloned()
            .chain(self.state.borrow().custom.iter().cloned())
            .collect();
        voices.sort();
        voices.dedup();
        Ok(voices)
    }

    fn preset_voice(&self, name: &str) -> Result<VoiceProfile> {
        if self.list_preset_voices()?.iter().any(|v| v == name) {
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
        let reference = SynthesisResult::read_wav(audio_path)?;
        let name = name.unwrap_or("unnamed");
        self.state.borrow_mut().custom.insert(name.to_string());
        Ok(VoiceProfile::custom(
            name,
            transcript,
            "vi",
            Some(vec![reference.duration_secs() as f32; 4]),
        ))
    }

    fn infer(
        &mut self,
        text: &str,
        voice: &VoiceProfile,
        params: &SamplingParams,
    ) -> Result<SynthesisResult> {
        self.preset_voice(&voice.name)?;
        let mut state = self.state.borrow_mut();
        state.last_params = Some(*params);
        state.last_voice = Some(voice.name.clone());

        let len = text.chars().count() * 240;
        let samples = (0..len)
            .map(|i| 0.3 * (2.0 * PI * 220.0 * i as f32 / SAMPLE_RATE as f32).sin())
            .collect();
        Ok(SynthesisResult::new(samples, SAMPLE_RATE))
    }

    fn close(&mut self) {
        self.state.borrow_mut().closed += 1;
    }
}

/// Write a short 16 kHz reference clip.
pub fn write_reference_clip(path: &Path) {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: 16000,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec).unwrap();
    for i in 0..16000 {
        let v = (2.0 * PI * 180.0 * i as f32 / 16000.0).sin();
        writer.write_sample((v * 8000.0) as i16).unwrap();
    }
    writer.finalize().unwrap();
}
