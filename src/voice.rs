//! Voice profiles and on-disk storage for cloned voices.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A voice a backend can speak with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceProfile {
    pub name: String,
    pub kind: VoiceKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum VoiceKind {
    /// Bundled with the backbone (or already known to the server).
    Preset,
    /// Derived from a reference clip and its exact transcript.
    Custom {
        transcript: String,
        language: String,
        /// Style embedding extracted locally. Remote voices leave it to the server.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        style: Option<Vec<f32>>,
    },
}

impl VoiceProfile {
    pub fn preset(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: VoiceKind::Preset,
        }
    }

    pub fn custom(
        name: impl Into<String>,
        transcript: impl Into<String>,
        language: impl Into<String>,
        style: Option<Vec<f32>>,
    ) -> Self {
        Self {
            name: name.into(),
            kind: VoiceKind::Custom {
                transcript: transcript.into(),
                language: language.into(),
                style,
            },
        }
    }

    pub fn is_custom(&self) -> bool {
        matches!(self.kind, VoiceKind::Custom { .. })
    }

    pub fn transcript(&self) -> Option<&str> {
        match &self.kind {
            VoiceKind::Custom { transcript, .. } => Some(transcript),
            VoiceKind::Preset => None,
        }
    }
}

/// Check that a voice name is usable as a file stem.
pub fn validate_voice_name(name: &str) -> Result<()> {
    let bad = name.trim().is_empty()
        || name.trim() != name
        || name == "."
        || name == ".."
        || name.contains(&['/', '\\', '\0'][..]);
    if bad {
        return Err(Error::InvalidVoiceName(name.to_string()));
    }
    Ok(())
}

/// Directory of `<name>.json` custom voice profiles.
#[derive(Debug)]
pub struct VoiceStore {
    dir: PathBuf,
    voices: BTreeMap<String, VoiceProfile>,
}

impl VoiceStore {
    /// Open (creating if needed) a store and load every profile in it.
    ///
    /// Files that fail to parse are skipped with a warning.
    pub fn open(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir)?;

        let mut voices = BTreeMap::new();
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let content = fs::read_to_string(&path)?;
            match serde_json::from_str::<VoiceProfile>(&content) {
                Ok(profile) => {
                    voices.insert(profile.name.clone(), profile);
                }
                Err(e) => log::warn!("Skipping unreadable voice file {}: {e}", path.display()),
            }
        }

        log::info!("Loaded {} custom voices from {}", voices.len(), dir.display());
        Ok(Self {
            dir: dir.to_path_buf(),
            voices,
        })
    }

    /// Persist a profile, replacing any existing one with the same name.
    pub fn save(&mut self, profile: VoiceProfile) -> Result<()> {
        validate_voice_name(&profile.name)?;

        let path = self.path_for(&profile.name);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(&profile)?)?;
        fs::rename(&tmp, &path)?;

        log::info!("Saved voice '{}' to {}", profile.name, path.display());
        self.voices.insert(profile.name.clone(), profile);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&VoiceProfile> {
        self.voices.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.voices.contains_key(name)
    }

    /// Sorted names of every stored voice.
    pub fn names(&self) -> Vec<&str> {
        self.voices.keys().map(String::as_str).collect()
    }

    pub fn remove(&mut self, name: &str) -> Result<Option<VoiceProfile>> {
        let Some(profile) = self.voices.remove(name) else {
            return Ok(None);
        };
        let path = self.path_for(name);
        if path.exists() {
            fs::remove_file(&path)?;
        }
        Ok(Some(profile))
    }

    fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.json"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_profile(name: &str) -> VoiceProfile {
        VoiceProfile::custom(name, "ví dụ 2.", "vi", Some(vec![0.5; 4]))
    }

    #[test]
    fn saved_voices_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut store = VoiceStore::open(dir.path()).unwrap();
            store.save(sample_profile("MyCustomVoice")).unwrap();
            store.save(sample_profile("Another")).unwrap();
        }

        let store = VoiceStore::open(dir.path()).unwrap();
        assert_eq!(store.names(), vec!["Another", "MyCustomVoice"]);
        assert_eq!(store.get("MyCustomVoice"), Some(&sample_profile("MyCustomVoice")));
    }

    #[test]
    fn rejects_names_that_escape_the_directory() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = VoiceStore::open(dir.path()).unwrap();
        for name in ["", "  ", "../evil", "a/b", ".."] {
            let err = store.save(sample_profile(name)).unwrap_err();
            assert!(matches!(err, Error::InvalidVoiceName(_)), "{name:?}");
        }
        assert!(store.names().is_empty());
    }

    #[test]
    fn skips_corrupt_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("broken.json"), "{ not json").unwrap();
        let store = VoiceStore::open(dir.path()).unwrap();
        assert!(store.names().is_empty());
    }

    #[test]
    fn remove_deletes_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = VoiceStore::open(dir.path()).unwrap();
        store.save(sample_profile("Gone")).unwrap();
        assert!(store.contains("Gone"));
        assert!(store.remove("Gone").unwrap().is_some());
        assert!(!store.contains("Gone"));
        assert!(!dir.path().join("Gone.json").exists());
        assert!(store.remove("Gone").unwrap().is_none());
    }

    #[test]
    fn preset_profiles_have_no_transcript() {
        let preset = VoiceProfile::preset("Binh");
        assert!(!preset.is_custom());
        assert_eq!(preset.transcript(), None);
        assert_eq!(sample_profile("x").transcript(), Some("ví dụ 2."));
    }
}
