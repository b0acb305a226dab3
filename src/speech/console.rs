//! Terminal stand-in for a speech synthesizer.
//!
//! Prints each utterance and holds it for roughly as long as it would take
//! to say at the requested rate, so pauses and timers behave as they would
//! with real audio.

use std::io::Write;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;
use tracing::debug;

use super::host::{SpeechError, SpeechHost, Utterance};
use super::voice::VoiceDescriptor;
use crate::config::SpeechConfig;

pub struct ConsoleSpeechHost {
    voices: Vec<VoiceDescriptor>,
    words_per_second: f32,
    cancel: Notify,
}

impl ConsoleSpeechHost {
    pub fn new(config: &SpeechConfig) -> Self {
        Self {
            voices: config
                .console_voices
                .iter()
                .map(|v| VoiceDescriptor::new(&v.name, &v.lang))
                .collect(),
            words_per_second: config.console_words_per_second.max(0.1),
            cancel: Notify::new(),
        }
    }

    /// How long `utterance` takes at its rate.
    pub fn duration_of(&self, utterance: &Utterance) -> Duration {
        let words = utterance.text.split_whitespace().count().max(1) as f32;
        let rate = utterance.rate.max(0.01);
        Duration::from_secs_f32(words / (self.words_per_second * rate))
    }
}

#[async_trait]
impl SpeechHost for ConsoleSpeechHost {
    fn is_available(&self) -> bool {
        true
    }

    fn voices(&self) -> Vec<VoiceDescriptor> {
        self.voices.clone()
    }

    async fn speak(&self, utterance: Utterance) -> Result<(), SpeechError> {
        let duration = self.duration_of(&utterance);
        let voice = utterance
            .voice
            .as_ref()
            .map(|v| v.name.as_str())
            .unwrap_or("default");
        debug!("Console voice {voice}: {:.1}s for \"{}\"", duration.as_secs_f32(), utterance.text);

        {
            let mut stdout = std::io::stdout().lock();
            writeln!(stdout, "\r\x1b[2K  🗣  {}", utterance.text)?;
            stdout.flush()?;
        }

        tokio::select! {
            _ = tokio::time::sleep(duration) => Ok(()),
            _ = self.cancel.notified() => Err(SpeechError::Cancelled),
        }
    }

    fn cancel(&self) {
        self.cancel.notify_waiters();
    }

    fn name(&self) -> &str {
        "console"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn utterance(text: &str, rate: f32) -> Utterance {
        Utterance {
            text: text.into(),
            voice: None,
            rate,
            pitch: 1.0,
            volume: 1.0,
        }
    }

    #[test]
    fn slower_rate_takes_longer() {
        let host = ConsoleSpeechHost::new(&SpeechConfig::default());
        let natural = host.duration_of(&utterance("I need time", 1.0));
        let slow = host.duration_of(&utterance("I need time", 0.15));
        assert!(slow > natural * 6);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_interrupts_speech() {
        let host = Arc::new(ConsoleSpeechHost::new(&SpeechConfig::default()));
        let speaking = {
            let host = host.clone();
            tokio::spawn(async move { host.speak(utterance("Please wait for me", 0.15)).await })
        };
        tokio::time::sleep(Duration::from_millis(500)).await;
        host.cancel();
        let result = speaking.await.unwrap();
        assert!(matches!(result, Err(SpeechError::Cancelled)));
    }

    #[test]
    fn voices_come_from_config() {
        let host = ConsoleSpeechHost::new(&SpeechConfig::default());
        let names: Vec<String> = host.voices().into_iter().map(|v| v.name).collect();
        assert_eq!(names, vec!["Daniel", "Narrator"]);
    }
}
