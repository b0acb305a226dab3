//! The host speech-synthesis capability consumed by the playback session.

use async_trait::async_trait;
use thiserror::Error;

use super::voice::VoiceDescriptor;

/// One phrase plus the delivery parameters to speak it with.
#[derive(Debug, Clone, PartialEq)]
pub struct Utterance {
    pub text: String,
    pub voice: Option<VoiceDescriptor>,
    /// Relative to the host's natural rate (1.0).
    pub rate: f32,
    /// Relative pitch, 1.0 = host default.
    pub pitch: f32,
    /// 0.0..=1.0
    pub volume: f32,
}

#[derive(Debug, Error)]
pub enum SpeechError {
    #[error("speech synthesis unavailable: {0}")]
    Unavailable(String),

    #[error("playback failed: {0}")]
    Playback(String),

    #[error("playback cancelled")]
    Cancelled,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[async_trait]
pub trait SpeechHost: Send + Sync {
    /// Feature gate: false means every playback request is a no-op.
    fn is_available(&self) -> bool;

    /// Current voice catalogue. May be empty while the host is still loading.
    fn voices(&self) -> Vec<VoiceDescriptor>;

    /// Speak one utterance, resolving when it finishes or fails.
    async fn speak(&self, utterance: Utterance) -> Result<(), SpeechError>;

    /// Stop whatever is being spoken right now.
    fn cancel(&self);

    fn name(&self) -> &str;
}
