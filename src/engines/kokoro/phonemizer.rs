use std::borrow::Cow;
use std::ffi::OsString;
use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};

use super::model::KokoroError;
use super::vocab::Vocab;

/// Where to find espeak-ng. `None` fields fall back to the system install.
#[derive(Debug, Clone, Default)]
pub struct EspeakConfig {
    pub bin_path: Option<PathBuf>,
    pub data_path: Option<PathBuf>,
}

impl EspeakConfig {
    fn command(&self) -> Command {
        let bin = self
            .bin_path
            .clone()
            .unwrap_or_else(|| PathBuf::from("espeak-ng"));
        let mut cmd = Command::new(bin);
        if let Some(data) = &self.data_path {
            let mut arg = OsString::from("--path=");
            arg.push(data);
            cmd.arg(arg);
        }
        cmd
    }
}

/// espeak-ng language for a preset voice name, if its prefix encodes one.
///
/// Prefixed names follow `{prefix}_{name}`, e.g. `af_heart`. Unprefixed
/// names (e.g. `Binh`) return `None` and the caller's default applies.
pub fn voice_lang(voice: &str) -> Option<&'static str> {
    let (prefix, rest) = voice.split_once('_')?;
    if rest.is_empty() {
        return None;
    }
    let lang = match prefix {
        "af" | "am" => "en-us",
        "bf" | "bm" => "en-gb",
        "ef" | "em" => "es",
        "ff" => "fr",
        "hf" | "hm" => "hi",
        "if" | "im" => "it",
        "jf" | "jm" => "ja",
        "pf" | "pm" => "pt-br",
        "vf" | "vm" => "vi",
        "zf" | "zm" => "cmn",
        _ => return None,
    };
    Some(lang)
}

/// Convert text to phoneme token ids via espeak-ng.
///
/// Punctuation is kept as its own token; characters missing from the vocab
/// are dropped.
pub fn phonemize(
    text: &str,
    lang: &str,
    vocab: &Vocab,
    espeak: &EspeakConfig,
) -> Result<Vec<i64>, KokoroError> {
    let parts = split_text_parts(text);
    if parts.is_empty() {
        return Ok(Vec::new());
    }

    let text_segments: Vec<&str> = parts
        .iter()
        .filter_map(|part| match part {
            TextPart::Text(segment) => Some(segment.as_str()),
            TextPart::Punct(_) => None,
        })
        .collect();

    let segment_ids = if text_segments.is_empty() {
        Vec::new()
    } else {
        phonemize_segments_batch(&text_segments, lang, vocab, espeak)?
    };
    let mut segment_ids = segment_ids.into_iter();

    let mut ids = Vec::new();
    for part in parts {
        match part {
            TextPart::Text(_) => {
                if let Some(chunk) = segment_ids.next() {
                    ids.extend(chunk);
                }
            }
            TextPart::Punct(ch) => ids.extend(vocab.id(ch)),
        }
    }

    Ok(ids)
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum TextPart {
    Text(String),
    Punct(char),
}

fn split_text_parts(text: &str) -> Vec<TextPart> {
    let mut parts = Vec::new();
    let mut current = String::new();

    for (idx, ch) in text.char_indices() {
        let ch_len = ch.len_utf8();
        if let Some(punct) = map_boundary_punctuation(ch) {
            if !is_numeric_connector_between_digits(text, idx, ch_len, ch) {
                flush_text_part(&mut parts, &mut current);
                parts.push(TextPart::Punct(punct));
                continue;
            }
        }

        if ch.is_whitespace() {
            if !current.is_empty() && !current.ends_with(' ') {
                current.push(' ');
            }
            continue;
        }

        current.push(ch);
    }

    flush_text_part(&mut parts, &mut current);
    parts
}

fn flush_text_part(parts: &mut Vec<TextPart>, current: &mut String) {
    let trimmed = current.trim();
    if trimmed.is_empty() {
        current.clear();
        return;
    }
    parts.push(TextPart::Text(trimmed.to_string()));
    current.clear();
}

fn map_boundary_punctuation(ch: char) -> Option<char> {
    match ch {
        '.' | '!' | '?' | ',' | ';' | ':' | '—' | '…' | '"' | '(' | ')' | '\u{201c}'
        | '\u{201d}' => Some(ch),
        '\n' | '\r' => Some('.'),
        _ => None,
    }
}

fn is_numeric_connector_between_digits(text: &str, idx: usize, ch_len: usize, ch: char) -> bool {
    if !matches!(ch, '.' | ',') {
        return false;
    }

    let prev = text[..idx].chars().next_back();
    let next = text[idx + ch_len..].chars().next();

    matches!(
        (prev, next),
        (Some(left), Some(right)) if left.is_ascii_digit() && right.is_ascii_digit()
    )
}

fn phonemize_segments_batch(
    segments: &[&str],
    lang: &str,
    vocab: &Vocab,
    espeak: &EspeakConfig,
) -> Result<Vec<Vec<i64>>, KokoroError> {
    let output = run_espeak(&segments.join("\n"), lang, espeak)?;
    let lines: Vec<&str> = output.lines().collect();

    // One output line per input line is expected; otherwise go segment by segment.
    if lines.len() != segments.len() {
        log::debug!(
            "espeak-ng returned {} lines for {} segments, retrying one at a time",
            lines.len(),
            segments.len()
        );
        return segments
            .iter()
            .map(|segment| Ok(ipa_to_ids(&run_espeak(segment, lang, espeak)?, vocab)))
            .collect();
    }

    Ok(lines.iter().map(|line| ipa_to_ids(line, vocab)).collect())
}

fn run_espeak(input: &str, lang: &str, espeak: &EspeakConfig) -> Result<String, KokoroError> {
    let mut child = espeak
        .command()
        .args(["--ipa", "--stdin", "-q", "-v", lang])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                KokoroError::EspeakNotFound
            } else {
                KokoroError::Io(e)
            }
        })?;

    if let Some(mut stdin) = child.stdin.take() {
        // The last line is under-processed unless newline terminated.
        stdin.write_all(newline_terminated(input).as_bytes())?;
    }

    let output = child.wait_with_output()?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(KokoroError::PhonemizerFailed(format!(
            "espeak-ng exited with code {:?}: {stderr}",
            output.status.code()
        )));
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

fn newline_terminated(input: &str) -> Cow<'_, str> {
    if input.ends_with('\n') {
        Cow::Borrowed(input)
    } else {
        Cow::Owned(format!("{input}\n"))
    }
}

fn ipa_to_ids(ipa: &str, vocab: &Vocab) -> Vec<i64> {
    ipa.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .flat_map(|line| line.chars().filter(|&ch| ch != '_'))
        .filter_map(|ch| vocab.id(ch))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn espeak_available() -> bool {
        Command::new("espeak-ng").arg("--version").output().is_ok()
    }

    #[test]
    fn splits_text_and_punctuation_parts() {
        let parts = split_text_parts("Xin chào, tôi là VieNeu. Thử nghiệm!");
        assert_eq!(
            parts,
            vec![
                TextPart::Text("Xin chào".to_string()),
                TextPart::Punct(','),
                TextPart::Text("tôi là VieNeu".to_string()),
                TextPart::Punct('.'),
                TextPart::Text("Thử nghiệm".to_string()),
                TextPart::Punct('!'),
            ]
        );
    }

    #[test]
    fn keeps_decimal_separators_inside_text() {
        let parts = split_text_parts("Version 2.0 reached 1,000 users.");
        assert_eq!(
            parts,
            vec![
                TextPart::Text("Version 2.0 reached 1,000 users".to_string()),
                TextPart::Punct('.'),
            ]
        );
    }

    #[test]
    fn newlines_become_sentence_breaks() {
        let parts = split_text_parts("first line\nsecond");
        assert_eq!(
            parts,
            vec![
                TextPart::Text("first line".to_string()),
                TextPart::Punct('.'),
                TextPart::Text("second".to_string()),
            ]
        );
    }

    #[test]
    fn voice_prefixes_map_to_languages() {
        assert_eq!(voice_lang("af_heart"), Some("en-us"));
        assert_eq!(voice_lang("vf_lan"), Some("vi"));
        assert_eq!(voice_lang("Binh"), None);
        assert_eq!(voice_lang("xx_unknown"), None);
        assert_eq!(voice_lang("af_"), None);
    }

    #[test]
    fn stdin_payload_is_newline_terminated_once() {
        assert_eq!(newline_terminated("America"), "America\n");
        assert_eq!(newline_terminated("America\n"), "America\n");
    }

    #[test]
    fn ipa_skips_word_separators_and_unknown_chars() {
        let vocab = Vocab::builtin();
        let ids = ipa_to_ids("_ˈ\n\n_ˌ😀", &vocab);
        assert_eq!(ids, vec![156, 157]);
    }

    #[test]
    fn missing_binary_reports_espeak_not_found() {
        let espeak = EspeakConfig {
            bin_path: Some(PathBuf::from("/nonexistent/espeak-ng")),
            data_path: None,
        };
        let err = run_espeak("hello", "en-us", &espeak).unwrap_err();
        assert!(matches!(err, KokoroError::EspeakNotFound));
    }

    #[test]
    fn phonemize_keeps_terminal_schwa_for_america() {
        if !espeak_available() {
            return;
        }

        let vocab = Vocab::builtin();
        let ids = phonemize("America", "en-us", &vocab, &EspeakConfig::default())
            .expect("phonemize should succeed");
        assert_eq!(ids.last().copied(), vocab.id('ə'));
    }
}
