//! Voice selection from the host's voice catalogue.

use serde::Serialize;

use crate::config::SpeechConfig;

/// A synthesis voice as reported by the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VoiceDescriptor {
    pub name: String,
    pub lang: String,
}

impl VoiceDescriptor {
    pub fn new(name: impl Into<String>, lang: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            lang: lang.into(),
        }
    }
}

/// Picks the narrator voice: a keyword match on the name first, then any
/// voice in the target language, else none (host default).
#[derive(Debug, Clone)]
pub struct VoiceSelector {
    keywords: Vec<String>,
    language: String,
}

impl VoiceSelector {
    pub fn new<I, S>(keywords: I, language: &str) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            keywords: keywords
                .into_iter()
                .map(|k| k.as_ref().to_lowercase())
                .filter(|k| !k.is_empty())
                .collect(),
            language: language.to_string(),
        }
    }

    pub fn from_config(config: &SpeechConfig) -> Self {
        Self::new(&config.voice_keywords, &config.language)
    }

    pub fn select<'a>(&self, voices: &'a [VoiceDescriptor]) -> Option<&'a VoiceDescriptor> {
        voices
            .iter()
            .find(|v| {
                let name = v.name.to_lowercase();
                self.keywords.iter().any(|k| name.contains(k.as_str()))
            })
            .or_else(|| voices.iter().find(|v| v.lang.starts_with(&self.language)))
    }
}

/// Pitch for the chosen voice. Female voices are pitched lower still.
///
/// "male" is one of the default keywords, so a "Female" voice can win the
/// keyword match; this keeps the narrator register either way.
pub fn pitch_for(voice: Option<&VoiceDescriptor>, config: &SpeechConfig) -> f32 {
    match voice {
        Some(v) if v.name.to_lowercase().contains("female") => config.female_pitch,
        _ => config.pitch,
    }
}
