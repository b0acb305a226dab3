//! Slowed speech playback.
//!
//! Components:
//! - `segmenter`: text cleanup and phrase splitting
//! - `voice`: voice catalogue selection
//! - `timer`: per-phase / total elapsed seconds
//! - `session`: the phrase-by-phrase playback state machine
//! - `host`: the synthesizer seam, with `console` and `espeak` backends

pub mod console;
pub mod emotion;
pub mod espeak;
pub mod host;
pub mod segmenter;
pub mod session;
pub mod timer;
pub mod voice;

use std::sync::Arc;

use tracing::info;

use crate::config::{SpeechBackend, SpeechConfig};

pub use emotion::Emotion;
pub use host::{SpeechError, SpeechHost, Utterance};
pub use session::{Activity, PlaybackEvent, PlaybackSession, PlaybackState};
pub use timer::{ElapsedTimer, TimerPhase, TimerReading};
pub use voice::{VoiceDescriptor, VoiceSelector};

/// Construct the configured synthesizer backend.
pub fn build_host(config: &SpeechConfig) -> Arc<dyn SpeechHost> {
    let host: Arc<dyn SpeechHost> = match config.backend {
        SpeechBackend::Console => Arc::new(console::ConsoleSpeechHost::new(config)),
        SpeechBackend::Espeak => Arc::new(espeak::EspeakSpeechHost::new(config)),
    };
    info!("Speech backend: {}", host.name());
    host
}
