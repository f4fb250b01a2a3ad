use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use super::model::{KokoroError, STYLE_DIM};

/// Style vectors for the preset voices bundled with the backbone.
///
/// Each voice is a list of `[f32; STYLE_DIM]` rows. The row used for a
/// request is picked by phoneme token count, which keeps prosody consistent
/// across utterances of similar length.
pub struct PresetVoices {
    voices: HashMap<String, Vec<[f32; STYLE_DIM]>>,
}

impl PresetVoices {
    /// Load all voices from a .npz (numpy zip) archive.
    ///
    /// Each entry is a `.npy` file named after the voice (e.g. `Binh.npy`).
    pub fn load(path: &Path) -> Result<Self, KokoroError> {
        let file = File::open(path)?;
        let mut zip = zip::ZipArchive::new(file)
            .map_err(|e| KokoroError::VoiceParse(format!("Failed to open zip archive: {e}")))?;

        let mut voices = HashMap::new();
        for i in 0..zip.len() {
            let mut entry = zip.by_index(i).map_err(|e| {
                KokoroError::VoiceParse(format!("Failed to read zip entry {i}: {e}"))
            })?;

            let raw_name = entry.name().to_string();
            if raw_name.ends_with('/') {
                continue;
            }
            let voice_name = raw_name.trim_end_matches(".npy");
            if voice_name.is_empty() {
                continue;
            }

            let mut data = Vec::new();
            entry
                .read_to_end(&mut data)
                .map_err(|e| KokoroError::VoiceParse(format!("Failed to read {raw_name}: {e}")))?;

            voices.insert(voice_name.to_string(), parse_npy(&data, &raw_name)?);
        }

        log::info!("Loaded {} preset voices", voices.len());
        Ok(Self { voices })
    }

    #[cfg(test)]
    pub(crate) fn from_styles<'a>(
        styles: impl IntoIterator<Item = (&'a str, Vec<[f32; STYLE_DIM]>)>,
    ) -> Self {
        let voices = styles
            .into_iter()
            .map(|(name, rows)| (name.to_string(), rows))
            .collect();
        Self { voices }
    }

    pub fn contains(&self, voice: &str) -> bool {
        self.voices.contains_key(voice)
    }

    /// Style row for a voice. Out-of-range indices clamp to the last row.
    pub fn get_style(&self, voice: &str, idx: usize) -> Result<[f32; STYLE_DIM], KokoroError> {
        let styles = self
            .voices
            .get(voice)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| KokoroError::VoiceNotFound(voice.to_string()))?;

        let clamped = idx.min(styles.len() - 1);
        Ok(styles[clamped])
    }

    /// Voice names in sorted order.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.voices.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

/// Parse a numpy `.npy` payload holding a little-endian f32 `[N, STYLE_DIM]` array.
fn parse_npy(data: &[u8], name: &str) -> Result<Vec<[f32; STYLE_DIM]>, KokoroError> {
    if data.len() < 10 {
        return Err(KokoroError::VoiceParse(format!(
            "{name}: file too short ({} bytes)",
            data.len()
        )));
    }
    if &data[0..6] != b"\x93NUMPY" {
        return Err(KokoroError::VoiceParse(format!(
            "{name}: invalid numpy magic bytes"
        )));
    }

    // v1 headers carry a u16 length at [8..10], v2+ a u32 at [8..12].
    let major = data[6];
    let (header_len, prefix) = if major == 1 {
        (u16::from_le_bytes([data[8], data[9]]) as usize, 10)
    } else {
        if data.len() < 12 {
            return Err(KokoroError::VoiceParse(format!("{name}: header truncated")));
        }
        (
            u32::from_le_bytes([data[8], data[9], data[10], data[11]]) as usize,
            12,
        )
    };
    let data_offset = prefix + header_len;
    if data.len() < data_offset {
        return Err(KokoroError::VoiceParse(format!(
            "{name}: header truncated (need {data_offset} bytes, got {})",
            data.len()
        )));
    }

    let header = String::from_utf8_lossy(&data[prefix..data_offset]);
    if !header.contains("<f4") {
        return Err(KokoroError::VoiceParse(format!(
            "{name}: expected little-endian float32 data, header was {}",
            header.trim()
        )));
    }

    let float_data = &data[data_offset..];
    let row_bytes = STYLE_DIM * 4;
    if float_data.len() % row_bytes != 0 {
        return Err(KokoroError::VoiceParse(format!(
            "{name}: {} data bytes is not a whole number of {STYLE_DIM}-float rows",
            float_data.len()
        )));
    }

    Ok(float_data
        .chunks_exact(row_bytes)
        .map(|row| {
            let mut vec = [0f32; STYLE_DIM];
            for (dst, bytes) in vec.iter_mut().zip(row.chunks_exact(4)) {
                *dst = f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
            }
            vec
        })
        .collect())
}
