#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{broadcast, oneshot};

use coach_raman::config::SpeechConfig;
use coach_raman::speech::{
    PlaybackEvent, PlaybackState, SpeechError, SpeechHost, Utterance, VoiceDescriptor,
};

enum Mode {
    /// Every utterance finishes after a fixed duration.
    Auto(Duration),
    /// Utterances finish only when the test calls `finish_current`.
    Manual,
}

/// In-memory synthesizer that records what it was asked to say.
pub struct ScriptedHost {
    mode: Mode,
    available: bool,
    voices: Vec<VoiceDescriptor>,
    empty_polls: AtomicU32,
    fail_on: Option<String>,
    spoken: Mutex<Vec<Utterance>>,
    pending: Mutex<VecDeque<oneshot::Sender<()>>>,
    cancels: AtomicUsize,
}

impl ScriptedHost {
    fn with_mode(mode: Mode) -> Self {
        Self {
            mode,
            available: true,
            voices: vec![
                VoiceDescriptor::new("Karen", "en-AU"),
                VoiceDescriptor::new("Daniel", "en-GB"),
            ],
            empty_polls: AtomicU32::new(0),
            fail_on: None,
            spoken: Mutex::new(Vec::new()),
            pending: Mutex::new(VecDeque::new()),
            cancels: AtomicUsize::new(0),
        }
    }

    pub fn auto(per_phrase: Duration) -> Self {
        Self::with_mode(Mode::Auto(per_phrase))
    }

    pub fn manual() -> Self {
        Self::with_mode(Mode::Manual)
    }

    pub fn with_voices(mut self, voices: Vec<VoiceDescriptor>) -> Self {
        self.voices = voices;
        self
    }

    /// Report an empty catalogue for the first `n` polls.
    pub fn empty_polls(self, n: u32) -> Self {
        self.empty_polls.store(n, Ordering::SeqCst);
        self
    }

    pub fn failing_on(mut self, phrase: &str) -> Self {
        self.fail_on = Some(phrase.to_string());
        self
    }

    pub fn unavailable(mut self) -> Self {
        self.available = false;
        self
    }

    pub fn spoken(&self) -> Vec<Utterance> {
        self.spoken.lock().unwrap().clone()
    }

    pub fn spoken_texts(&self) -> Vec<String> {
        self.spoken().into_iter().map(|u| u.text).collect()
    }

    pub fn cancels(&self) -> usize {
        self.cancels.load(Ordering::SeqCst)
    }

    /// Fire the host's "utterance finished" callback for the oldest
    /// outstanding utterance. False when nobody was listening any more.
    pub fn finish_current(&self) -> bool {
        let sender = self.pending.lock().unwrap().pop_front();
        sender.map(|tx| tx.send(()).is_ok()).unwrap_or(false)
    }
}

#[async_trait]
impl SpeechHost for ScriptedHost {
    fn is_available(&self) -> bool {
        self.available
    }

    fn voices(&self) -> Vec<VoiceDescriptor> {
        let remaining = self.empty_polls.load(Ordering::SeqCst);
        if remaining > 0 {
            self.empty_polls.store(remaining - 1, Ordering::SeqCst);
            return Vec::new();
        }
        self.voices.clone()
    }

    async fn speak(&self, utterance: Utterance) -> Result<(), SpeechError> {
        let fails = self.fail_on.as_deref() == Some(utterance.text.as_str());
        self.spoken.lock().unwrap().push(utterance);

        if fails {
            tokio::time::sleep(Duration::from_millis(100)).await;
            return Err(SpeechError::Playback("scripted failure".into()));
        }

        match self.mode {
            Mode::Auto(duration) => {
                tokio::time::sleep(duration).await;
                Ok(())
            }
            Mode::Manual => {
                let (tx, rx) = oneshot::channel();
                self.pending.lock().unwrap().push_back(tx);
                rx.await.map_err(|_| SpeechError::Cancelled)
            }
        }
    }

    fn cancel(&self) {
        self.cancels.fetch_add(1, Ordering::SeqCst);
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// Defaults with a pause that never lands on a whole-second tick.
pub fn test_config() -> SpeechConfig {
    SpeechConfig {
        phrase_pause_ms: 3500,
        settle_delay_ms: 100,
        ..SpeechConfig::default()
    }
}

pub fn drain(events: &mut broadcast::Receiver<PlaybackEvent>) -> Vec<PlaybackEvent> {
    let mut out = Vec::new();
    while let Ok(event) = events.try_recv() {
        out.push(event);
    }
    out
}

pub fn states(events: &[PlaybackEvent]) -> Vec<PlaybackState> {
    events
        .iter()
        .filter_map(|e| match e {
            PlaybackEvent::StateChanged(s) => Some(*s),
            _ => None,
        })
        .collect()
}

pub async fn sleep_ms(ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
}
