use std::path::PathBuf;
use std::time::Instant;

use vieneu_rs::demo::{self, DemoOptions};
use vieneu_rs::{ClientConfig, Vieneu};

// Reference clip cloned when present; VIENEU_SAMPLE_AUDIO overrides it.
const SAMPLE_AUDIO: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/demos/example.wav");

// Remote mode (VIENEU_MODE=remote VIENEU_API_BASE=http://host:port/v1) needs
// a VieNeu inference server that serves, under the API base:
//   GET  voices        -> {"voices": [..]}
//   POST voices        <- {name, text, language, audio (base64), save}
//   POST audio/speech  <- {model, input, voice, temperature, top_k, ..} -> WAV
fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let config = ClientConfig::from_env()?;
    println!(
        "Initializing client ({}, {:?})...",
        config.backbone,
        config.mode()
    );

    let load_start = Instant::now();
    let mut client = Vieneu::new(config)?;
    println!("Client ready in {:.2?}", load_start.elapsed());

    let mut options = DemoOptions {
        sample_audio: PathBuf::from(SAMPLE_AUDIO),
        ..DemoOptions::default()
    };
    if let Ok(voice) = std::env::var("VIENEU_PRESET") {
        options.preset_voice = voice;
    }
    if let Ok(path) = std::env::var("VIENEU_SAMPLE_AUDIO") {
        options.sample_audio = PathBuf::from(path);
    }

    let synth_start = Instant::now();
    let report = demo::run(&mut client, &options)?;

    println!("Voices: {:?}", report.voices_before);
    match &report.voices_after {
        Some(voices) => println!("Voice list after adding: {voices:?}"),
        None => println!("Sample audio not found. Skipping cloning..."),
    }
    println!("Voice used: {}", report.voice_used);
    println!(
        "Saved {} ({:.2}s at {} Hz) in {:.2?}",
        report.output.display(),
        report.duration_secs,
        report.sample_rate,
        synth_start.elapsed()
    );
    Ok(())
}
