//! Configuration management for coach-raman.
//!
//! Loads config from YAML files in standard locations. Every section has
//! defaults, so an empty or partial file is valid.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

use crate::chat::Persona;
use crate::lessons::Lesson;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SpeechBackend {
    Console,
    #[serde(alias = "espeak-ng")]
    #[value(alias = "espeak-ng")]
    Espeak,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ConsoleVoiceConfig {
    pub name: String,
    pub lang: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SpeechConfig {
    pub enabled: bool,
    pub backend: SpeechBackend,

    // Utterance parameters (1.0 = host default)
    pub rate: f32,
    pub pitch: f32,
    pub female_pitch: f32,
    pub volume: f32,

    pub phrase_pause_ms: u64,
    pub settle_delay_ms: u64,

    // Voice catalogue polling
    pub voice_poll_interval_ms: u64,
    pub voice_poll_max_interval_ms: u64,
    pub voice_poll_max_attempts: u32,

    pub language: String,
    pub voice_keywords: Vec<String>,

    pub console_words_per_second: f32,
    pub console_voices: Vec<ConsoleVoiceConfig>,
    pub espeak_command: String,
}

impl Default for ConsoleVoiceConfig {
    fn default() -> Self {
        Self {
            name: "Narrator".into(),
            lang: "en-US".into(),
        }
    }
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            backend: SpeechBackend::Console,
            rate: 0.15,
            pitch: 0.6,
            female_pitch: 0.4,
            volume: 0.8,
            phrase_pause_ms: 4000,
            settle_delay_ms: 100,
            voice_poll_interval_ms: 100,
            voice_poll_max_interval_ms: 1000,
            voice_poll_max_attempts: 30,
            language: "en".into(),
            voice_keywords: ["alex", "male", "david", "daniel", "tom", "mark"]
                .into_iter()
                .map(String::from)
                .collect(),
            console_words_per_second: 2.5,
            console_voices: vec![
                ConsoleVoiceConfig {
                    name: "Daniel".into(),
                    lang: "en-GB".into(),
                },
                ConsoleVoiceConfig::default(),
            ],
            espeak_command: "espeak-ng".into(),
        }
    }
}

impl SpeechConfig {
    pub fn phrase_pause(&self) -> Duration {
        Duration::from_millis(self.phrase_pause_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    pub persona: Persona,
    pub endpoint: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub api_key: String,
    pub api_key_env: String,
    pub timeout_secs: u64,
    pub reply_delay_ms: u64,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            persona: Persona::Coach,
            endpoint: "https://api.openai.com/v1/chat/completions".into(),
            model: "gpt-4o-mini".into(),
            max_tokens: 500,
            temperature: 0.7,
            api_key: String::new(),
            api_key_env: "OPENAI_API_KEY".into(),
            timeout_secs: 30,
            reply_delay_ms: 500,
        }
    }
}

impl ChatConfig {
    /// Key from the config file, else from the configured environment variable.
    pub fn resolve_api_key(&self) -> Option<String> {
        if !self.api_key.trim().is_empty() {
            return Some(self.api_key.trim().to_string());
        }
        if self.api_key_env.is_empty() {
            return None;
        }
        std::env::var(&self.api_key_env)
            .ok()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LessonsConfig {
    pub start_delay_ms: u64,
    /// Replaces the built-in lessons when non-empty.
    pub items: Vec<Lesson>,
}

impl Default for LessonsConfig {
    fn default() -> Self {
        Self {
            start_delay_ms: 1000,
            items: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 8768,
        }
    }
}

/// Who the caregiver is learning to talk with. Only feeds the chat prompt.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProfileConfig {
    pub patient_name: String,
    pub relationship: String,
    pub dementia_stage: String,
    pub challenges: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub speech: SpeechConfig,
    pub chat: ChatConfig,
    pub lessons: LessonsConfig,
    pub api: ApiConfig,
    pub profile: ProfileConfig,
}

impl Config {
    /// Load configuration from YAML file.
    ///
    /// Searches standard locations if no path is provided:
    /// 1. ./config.yaml
    /// 2. ~/.config/coach-raman/config.yaml
    /// 3. /etc/coach-raman/config.yaml
    pub fn load(path: Option<&Path>) -> Self {
        let resolved = path.map(PathBuf::from).or_else(|| {
            let candidates = [
                std::env::current_dir().ok().map(|d| d.join("config.yaml")),
                dirs::home_dir().map(|h| h.join(".config/coach-raman/config.yaml")),
                Some(PathBuf::from("/etc/coach-raman/config.yaml")),
            ];
            candidates.into_iter().flatten().find(|p| p.exists())
        });

        let Some(config_path) = resolved else {
            info!("No config file found, using defaults");
            return Self::default();
        };

        match std::fs::read_to_string(&config_path) {
            Ok(contents) => match Self::from_yaml(&contents) {
                Ok(config) => {
                    info!("Loaded config from {}", config_path.display());
                    config
                }
                Err(e) => {
                    tracing::warn!("Failed to parse {}: {e}, using defaults", config_path.display());
                    Self::default()
                }
            },
            Err(e) => {
                tracing::warn!("Failed to read {}: {e}, using defaults", config_path.display());
                Self::default()
            }
        }
    }

    pub fn from_yaml(contents: &str) -> Result<Self, serde_yml::Error> {
        // An empty document deserializes to unit, not a map
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yml::from_str(contents)
    }
}
