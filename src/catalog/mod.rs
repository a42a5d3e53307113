//! Voice catalog for the Edge online voices
//!
//! The list ships with the binary as JSON and is parsed once on first use.

use crate::settings::VoiceDescriptor;
use crate::{HarnessError, Result};
use log::error;
use once_cell::sync::Lazy;
use regex::RegexBuilder;

/// Voice selected when the configuration does not name one
pub const DEFAULT_VOICE: &str = "zh-CN-XiaoxiaoNeural";

const VOICES_JSON: &str = include_str!("voices.json");

/// Built-in Edge voices, in display order
pub static EDGE_VOICES: Lazy<Vec<VoiceDescriptor>> = Lazy::new(|| {
    parse_voices(VOICES_JSON).unwrap_or_else(|e| {
        error!("Embedded voice catalog is invalid: {}", e);
        Vec::new()
    })
});

/// Parse a JSON array of `{ "value", "displayName" }` objects
pub fn parse_voices(json: &str) -> Result<Vec<VoiceDescriptor>> {
    Ok(serde_json::from_str(json)?)
}

/// Index of the first voice whose identifier contains `needle`
pub fn find_voice(voices: &[VoiceDescriptor], needle: &str) -> Option<usize> {
    if needle.is_empty() {
        return None;
    }
    voices.iter().position(|v| v.value.contains(needle))
}

/// Voices whose identifier or display name matches `pattern` (case-insensitive)
///
/// Returns `(index, voice)` pairs so callers can select by index afterwards.
pub fn search_voices<'a>(
    voices: &'a [VoiceDescriptor],
    pattern: &str,
) -> Result<Vec<(usize, &'a VoiceDescriptor)>> {
    let re = RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .map_err(|e| HarnessError::InvalidInput(format!("bad voice pattern: {}", e)))?;

    Ok(voices
        .iter()
        .enumerate()
        .filter(|(_, v)| re.is_match(&v.value) || re.is_match(&v.display_name))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedded_catalog_loads() {
        assert!(!EDGE_VOICES.is_empty());
        assert!(find_voice(&EDGE_VOICES, DEFAULT_VOICE).is_some());
    }

    #[test]
    fn test_find_voice() {
        let voices = vec![
            VoiceDescriptor::new("en-US-AriaNeural", "Aria"),
            VoiceDescriptor::new("zh-CN-XiaoxiaoNeural", "Xiaoxiao"),
        ];
        assert_eq!(find_voice(&voices, "Xiaoxiao"), Some(1));
        assert_eq!(find_voice(&voices, "Nanami"), None);
        assert_eq!(find_voice(&voices, ""), None);
    }

    #[test]
    fn test_search_voices() {
        let matches = search_voices(&EDGE_VOICES, "^ja-JP").unwrap();
        assert_eq!(matches.len(), 2);
        assert!(matches.iter().all(|(_, v)| v.value.starts_with("ja-JP")));

        let by_name = search_voices(&EDGE_VOICES, "cantonese").unwrap();
        assert!(!by_name.is_empty());

        assert!(search_voices(&EDGE_VOICES, "(").is_err());
    }

    #[test]
    fn test_parse_voices_rejects_garbage() {
        assert!(parse_voices("{not json").is_err());
    }
}
