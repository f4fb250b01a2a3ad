use std::collections::HashMap;
use std::path::Path;

use super::model::KokoroError;

/// Sentence-level punctuation a long phoneme sequence may be split after.
const SPLIT_PUNCTUATION: &[char] = &[';', ':', ',', '.', '!', '?'];

/// Phoneme character to token id mapping of a backbone export.
#[derive(Debug, Clone)]
pub struct Vocab {
    ids: HashMap<char, i64>,
    split_ids: Vec<i64>,
}

impl Vocab {
    /// Load the `"vocab"` object of a backbone's `config.json`.
    pub fn load(config_path: &Path) -> Result<Self, KokoroError> {
        let content = std::fs::read_to_string(config_path)?;
        Self::from_config_json(&content)
    }

    pub fn from_config_json(content: &str) -> Result<Self, KokoroError> {
        let json: serde_json::Value = serde_json::from_str(content)
            .map_err(|e| KokoroError::Config(format!("Failed to parse JSON: {e}")))?;

        let vocab_obj = json
            .get("vocab")
            .ok_or_else(|| KokoroError::Config("Missing 'vocab' field".to_string()))?
            .as_object()
            .ok_or_else(|| KokoroError::Config("'vocab' must be an object".to_string()))?;

        let mut ids = HashMap::with_capacity(vocab_obj.len());
        for (k, v) in vocab_obj {
            let mut chars = k.chars();
            let (Some(ch), None) = (chars.next(), chars.next()) else {
                return Err(KokoroError::Config(format!(
                    "vocab key {k:?} must be a single character"
                )));
            };
            let id = v.as_i64().ok_or_else(|| {
                KokoroError::Config(format!("Non-integer vocab value for key {k:?}"))
            })?;
            ids.insert(ch, id);
        }

        Ok(Self::from_map(ids))
    }

    /// Built-in table, used when the export ships without `config.json`.
    pub fn builtin() -> Self {
        Self::from_map(BUILTIN_ENTRIES.iter().copied().collect())
    }

    fn from_map(ids: HashMap<char, i64>) -> Self {
        let split_ids = SPLIT_PUNCTUATION
            .iter()
            .filter_map(|ch| ids.get(ch).copied())
            .collect();
        Self { ids, split_ids }
    }

    pub fn id(&self, ch: char) -> Option<i64> {
        self.ids.get(&ch).copied()
    }

    /// Whether a token id is a punctuation mark that ends a clause.
    pub fn is_split_point(&self, id: i64) -> bool {
        self.split_ids.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

const BUILTIN_ENTRIES: &[(char, i64)] = &[
    (';', 1),
    (':', 2),
    (',', 3),
    ('.', 4),
    ('!', 5),
    ('?', 6),
    ('—', 9),
    ('…', 10),
    ('"', 11),
    ('(', 12),
    (')', 13),
    ('\u{201c}', 14),
    ('\u{201d}', 15),
    (' ', 16),
    ('\u{0303}', 17),
    ('ʣ', 18),
    ('ʥ', 19),
    ('ʦ', 20),
    ('ʨ', 21),
    ('ᵝ', 22),
    ('ꭧ', 23),
    ('A', 24),
    ('I', 25),
    ('O', 31),
    ('Q', 33),
    ('S', 35),
    ('T', 36),
    ('W', 39),
    ('Y', 41),
    ('ᵊ', 42),
    ('a', 43),
    ('b', 44),
    ('c', 45),
    ('d', 46),
    ('e', 47),
    ('f', 48),
    ('h', 50),
    ('i', 51),
    ('j', 52),
    ('k', 53),
    ('l', 54),
    ('m', 55),
    ('n', 56),
    ('o', 57),
    ('p', 58),
    ('q', 59),
    ('r', 60),
    ('s', 61),
    ('t', 62),
    ('u', 63),
    ('v', 64),
    ('w', 65),
    ('x', 66),
    ('y', 67),
    ('z', 68),
    ('ɑ', 69),
    ('ɐ', 70),
    ('ɒ', 71),
    ('æ', 72),
    ('β', 75),
    ('ɔ', 76),
    ('ɕ', 77),
    ('ç', 78),
    ('ɖ', 80),
    ('ð', 81),
    ('ʤ', 82),
    ('ə', 83),
    ('ɚ', 85),
    ('ɛ', 86),
    ('ɜ', 87),
    ('ɟ', 90),
    ('ɡ', 92),
    ('ɥ', 99),
    ('ɨ', 101),
    ('ɪ', 102),
    ('ʝ', 103),
    ('ɯ', 110),
    ('ɰ', 111),
    ('ŋ', 112),
    ('ɳ', 113),
    ('ɲ', 114),
    ('ɴ', 115),
    ('ø', 116),
    ('ɸ', 118),
    ('θ', 119),
    ('œ', 120),
    ('ɹ', 123),
    ('ɾ', 125),
    ('ɻ', 126),
    ('ʁ', 128),
    ('ɽ', 129),
    ('ʂ', 130),
    ('ʃ', 131),
    ('ʈ', 132),
    ('ʧ', 133),
    ('ʊ', 135),
    ('ʋ', 136),
    ('ʌ', 138),
    ('ɣ', 139),
    ('ɤ', 140),
    ('χ', 142),
    ('ʎ', 143),
    ('ʒ', 147),
    ('ʔ', 148),
    ('ˈ', 156),
    ('ˌ', 157),
    ('ː', 158),
    ('ʰ', 162),
    ('ʲ', 164),
    ('↓', 169),
    ('→', 171),
    ('↗', 172),
    ('↘', 173),
    ('ᵻ', 177),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_table_knows_punctuation_and_ipa() {
        let vocab = Vocab::builtin();
        assert_eq!(vocab.id('.'), Some(4));
        assert_eq!(vocab.id('ˈ'), Some(156));
        assert!(vocab.is_split_point(4));
        assert!(!vocab.is_split_point(16));
    }

    #[test]
    fn config_json_overrides_ids() {
        let vocab = Vocab::from_config_json(r#"{"vocab": {".": 40, "a": 1}}"#).unwrap();
        assert_eq!(vocab.len(), 2);
        assert_eq!(vocab.id('.'), Some(40));
        assert!(vocab.is_split_point(40));
        assert!(!vocab.is_split_point(4));
    }

    #[test]
    fn rejects_multi_character_keys() {
        let err = Vocab::from_config_json(r#"{"vocab": {"ab": 1}}"#).unwrap_err();
        assert!(matches!(err, KokoroError::Config(_)));
        assert!(Vocab::from_config_json(r#"{"other": {}}"#).is_err());
    }
}
