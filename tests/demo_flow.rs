//! Walkthrough behaviour against an in-process backend.

mod common;

use common::{write_reference_clip, FakeBackend};
use vieneu_rs::demo::{self, DemoOptions};
use vieneu_rs::{Error, SamplingParams, SynthesisResult, Vieneu, SAMPLE_RATE};

fn options_in(dir: &std::path::Path) -> DemoOptions {
    DemoOptions {
        sample_audio: dir.join("example.wav"),
        output: dir.join("output.wav"),
        ..Default::default()
    }
}

#[test]
fn missing_sample_falls_back_to_preset() {
    let dir = tempfile::tempdir().unwrap();
    let (backend, state) = FakeBackend::new(&["Binh", "Ngoc"]);
    let mut client = Vieneu::with_backend(Box::new(backend));

    let report = demo::run(&mut client, &options_in(dir.path())).unwrap();

    assert!(!report.cloned);
    assert_eq!(report.voices_after, None);
    assert_eq!(report.voice_used, "Binh");
    assert!(report.output.exists());
    assert!(report.duration_secs > 0.0);
    assert_eq!(state.borrow().closed, 1);
    assert!(client.is_closed());
}

#[test]
fn cloned_voice_is_listed_and_used() {
    let dir = tempfile::tempdir().unwrap();
    let options = options_in(dir.path());
    write_reference_clip(&options.sample_audio);

    let (backend, state) = FakeBackend::new(&["Binh"]);
    let mut client = Vieneu::with_backend(Box::new(backend));
    let report = demo::run(&mut client, &options).unwrap();

    assert!(report.cloned);
    assert!(!report.voices_before.contains(&"MyCustomVoice".to_string()));
    let after = report.voices_after.unwrap();
    assert!(after.contains(&"MyCustomVoice".to_string()));
    assert_eq!(report.voice_used, "MyCustomVoice");
    assert_eq!(state.borrow().last_voice.as_deref(), Some("MyCustomVoice"));
}

#[test]
fn output_reads_back_at_declared_rate() {
    let dir = tempfile::tempdir().unwrap();
    let (backend, _state) = FakeBackend::new(&["Binh"]);
    let mut client = Vieneu::with_backend(Box::new(backend));
    let options = options_in(dir.path());

    let report = demo::run(&mut client, &options).unwrap();
    let written = SynthesisResult::read_wav(&options.output).unwrap();

    assert_eq!(report.sample_rate, SAMPLE_RATE);
    assert_eq!(written.sample_rate, SAMPLE_RATE);
    assert!(!written.is_empty());
    assert!(written.samples.iter().all(|s| s.is_finite()));
}

#[test]
fn unknown_preset_is_an_error_and_still_closes() {
    let dir = tempfile::tempdir().unwrap();
    let (backend, state) = FakeBackend::new(&["Binh"]);
    let mut client = Vieneu::with_backend(Box::new(backend));
    let options = DemoOptions {
        preset_voice: "Nobody".to_string(),
        ..options_in(dir.path())
    };

    let err = demo::run(&mut client, &options).unwrap_err();
    assert!(matches!(err, Error::VoiceNotFound(name) if name == "Nobody"));
    assert!(!options.output.exists());
    assert_eq!(state.borrow().closed, 1);
}

#[test]
fn synthesis_is_non_empty_for_fixed_input() {
    let (backend, state) = FakeBackend::new(&["Binh"]);
    let mut client = Vieneu::with_backend(Box::new(backend));
    let voice = client.get_preset_voice("Binh").unwrap();
    let params = SamplingParams::new(0.1, 10);

    for _ in 0..3 {
        let audio = client.infer("Xin chào", &voice, &params).unwrap();
        assert!(!audio.is_empty());
        assert_eq!(audio.sample_rate, SAMPLE_RATE);
    }
    assert_eq!(state.borrow().last_params, Some(params));
}

#[test]
fn client_rejects_bad_input_before_backend() {
    let (backend, state) = FakeBackend::new(&["Binh"]);
    let mut client = Vieneu::with_backend(Box::new(backend));
    let voice = client.get_preset_voice("Binh").unwrap();

    let err = client
        .infer("Xin chào", &voice, &SamplingParams::new(0.0, 50))
        .unwrap_err();
    assert!(matches!(err, Error::InvalidParams(_)));
    assert!(matches!(
        client.infer("   ", &voice, &SamplingParams::default()),
        Err(Error::InvalidParams(_))
    ));
    assert!(matches!(
        client.clone_voice("example.wav", "", Some("x")),
        Err(Error::InvalidParams(_))
    ));
    assert!(state.borrow().last_params.is_none());
}

#[test]
fn close_is_idempotent_and_final() {
    let (backend, state) = FakeBackend::new(&["Binh"]);
    let mut client = Vieneu::with_backend(Box::new(backend));

    client.close();
    client.close();
    assert!(matches!(client.list_preset_voices(), Err(Error::Closed)));
    assert!(matches!(client.get_preset_voice("Binh"), Err(Error::Closed)));
    drop(client);
    assert_eq!(state.borrow().closed, 1);
}
