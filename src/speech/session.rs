//! Playback session: speaks a text one phrase at a time with pauses.
//!
//! IDLE → AWAITING_VOICES → SPEAKING(i) ⇄ PAUSED(i) → COMPLETE → IDLE
//!
//! Each `start` gets a fresh session token. The phrase loop runs as one
//! spawned task and re-checks the token (under the state lock) before every
//! state change or event, so continuations of a stopped or superseded
//! playback never leak into the next one.

use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::emotion::Emotion;
use super::host::{SpeechHost, Utterance};
use super::segmenter::{clean_text, segment};
use super::timer::{ElapsedTimer, TimerPhase, TimerReading};
use super::voice::{pitch_for, VoiceDescriptor, VoiceSelector};
use crate::config::SpeechConfig;

const EVENT_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "phrase", rename_all = "snake_case")]
pub enum PlaybackState {
    #[default]
    Idle,
    AwaitingVoices,
    Speaking(usize),
    Paused(usize),
    Complete,
}

impl std::fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "IDLE"),
            Self::AwaitingVoices => write!(f, "AWAITING_VOICES"),
            Self::Speaking(i) => write!(f, "SPEAKING({i})"),
            Self::Paused(i) => write!(f, "PAUSED({i})"),
            Self::Complete => write!(f, "COMPLETE"),
        }
    }
}

/// What the narrator is visibly doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Activity {
    Speaking,
    Thinking,
    Cleared,
}

impl Activity {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Speaking => "Speaking...",
            Self::Thinking => "Thinking...",
            Self::Cleared => "",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackEvent {
    StateChanged(PlaybackState),
    Emotion(Emotion),
    Activity(Activity),
    /// Timed mode: a new timer phase began (phase counter back at 0).
    PhaseStarted(TimerReading),
    Tick(TimerReading),
    /// Last phrase finished. Carries the final timer reading.
    Completed(TimerReading),
    /// Timed mode: emitted a short settle delay after `Completed`.
    TimerComplete(TimerReading),
    /// A lesson was queued; its playback follows after the start delay.
    LessonStarted {
        index: usize,
        title: String,
        thinking: String,
    },
}

struct Shared {
    state: PlaybackState,
    token: u64,
}

struct Inner {
    host: Arc<dyn SpeechHost>,
    config: SpeechConfig,
    selector: VoiceSelector,
    shared: Mutex<Shared>,
    task: Mutex<Option<JoinHandle<()>>>,
    timer: ElapsedTimer,
    events: broadcast::Sender<PlaybackEvent>,
}

/// Cheap to clone; clones drive the same session.
#[derive(Clone)]
pub struct PlaybackSession {
    inner: Arc<Inner>,
}

impl PlaybackSession {
    pub fn new(host: Arc<dyn SpeechHost>, config: SpeechConfig) -> Self {
        Self::with_timer(host, config, ElapsedTimer::new())
    }

    pub fn with_timer(host: Arc<dyn SpeechHost>, config: SpeechConfig, timer: ElapsedTimer) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let selector = VoiceSelector::from_config(&config);
        Self {
            inner: Arc::new(Inner {
                host,
                config,
                selector,
                shared: Mutex::new(Shared {
                    state: PlaybackState::Idle,
                    token: 0,
                }),
                task: Mutex::new(None),
                timer,
                events,
            }),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PlaybackEvent> {
        self.inner.events.subscribe()
    }

    pub fn state(&self) -> PlaybackState {
        self.inner.shared.lock().unwrap().state
    }

    pub fn timer_reading(&self) -> TimerReading {
        self.inner.timer.reading()
    }

    pub fn host_name(&self) -> &str {
        self.inner.host.name()
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.config.enabled && self.inner.host.is_available()
    }

    /// Speak `text` phrase by phrase, cancelling whatever was playing.
    ///
    /// Returns false (and does nothing) when voice output is disabled or the
    /// host cannot synthesize speech. Must be called inside a tokio runtime.
    pub fn start(&self, text: &str, emotion: Emotion, timed: bool) -> bool {
        if !self.is_enabled() {
            debug!("Voice output unavailable, ignoring playback request");
            return false;
        }

        let inner = &self.inner;
        let mut task = inner.task.lock().unwrap();

        if let Some(old) = task.take() {
            old.abort();
        }
        inner.host.cancel();

        let token = {
            let mut shared = inner.shared.lock().unwrap();
            shared.token += 1;
            info!("State: {} → {}", shared.state, PlaybackState::AwaitingVoices);
            shared.state = PlaybackState::AwaitingVoices;
            inner.timer.reset();
            inner.send(PlaybackEvent::StateChanged(PlaybackState::AwaitingVoices));
            inner.send(PlaybackEvent::Emotion(emotion));
            shared.token
        };

        if timed {
            inner.start_timer_phase(token, TimerPhase::Speaking);
        }

        let run_inner = inner.clone();
        let text = text.to_string();
        *task = Some(tokio::spawn(async move {
            run_inner.run(token, text, timed).await;
        }));
        true
    }

    /// Publish an event that is not part of the phrase loop, ordered after
    /// everything already emitted.
    pub fn announce(&self, event: PlaybackEvent) {
        let _shared = self.inner.shared.lock().unwrap();
        self.inner.send(event);
    }

    /// Cancel playback and return to idle. No-op when already idle.
    pub fn stop(&self) {
        let inner = &self.inner;
        let mut task = inner.task.lock().unwrap();

        {
            let mut shared = inner.shared.lock().unwrap();
            if shared.state == PlaybackState::Idle {
                return;
            }
            shared.token += 1;
            info!("State: {} → {}", shared.state, PlaybackState::Idle);
            shared.state = PlaybackState::Idle;
            inner.timer.reset();
            inner.send(PlaybackEvent::StateChanged(PlaybackState::Idle));
            inner.send(PlaybackEvent::Activity(Activity::Cleared));
        }

        if let Some(handle) = task.take() {
            handle.abort();
        }
        inner.host.cancel();
        info!("Playback stopped");
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        if let Ok(mut task) = self.task.lock() {
            if let Some(handle) = task.take() {
                handle.abort();
            }
        }
    }
}

impl Inner {
    fn send(&self, event: PlaybackEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    /// Run `f` only if `token` is still the live session, holding the state
    /// lock for the duration.
    fn guarded<R>(&self, token: u64, f: impl FnOnce(&mut Shared) -> R) -> Option<R> {
        let mut shared = self.shared.lock().unwrap();
        if shared.token != token {
            return None;
        }
        Some(f(&mut shared))
    }

    fn is_current(&self, token: u64) -> bool {
        self.guarded(token, |_| ()).is_some()
    }

    fn transition(&self, token: u64, next: PlaybackState) -> bool {
        self.guarded(token, |shared| {
            info!("State: {} → {next}", shared.state);
            shared.state = next;
            self.send(PlaybackEvent::StateChanged(next));
        })
        .is_some()
    }

    fn emit(&self, token: u64, event: PlaybackEvent) -> bool {
        self.guarded(token, |_| self.send(event)).is_some()
    }

    fn start_timer_phase(self: &Arc<Self>, token: u64, phase: TimerPhase) -> bool {
        let weak: Weak<Inner> = Arc::downgrade(self);
        self.guarded(token, |_| {
            self.timer.start_phase(phase, move |reading| {
                if let Some(inner) = weak.upgrade() {
                    inner.emit_tick(token, reading);
                }
            });
            self.send(PlaybackEvent::PhaseStarted(self.timer.reading()));
        })
        .is_some()
    }

    fn emit_tick(&self, token: u64, reading: TimerReading) {
        self.guarded(token, |_| {
            // A tick computed just before a phase change or stop is stale
            if self.timer.is_active() && self.timer.reading() == reading {
                self.send(PlaybackEvent::Tick(reading));
            }
        });
    }

    fn stop_timer(&self, token: u64) {
        self.guarded(token, |_| self.timer.stop());
    }

    /// Host failure mid-phrase: drop the rest of the sequence.
    fn abort(&self, token: u64) {
        self.guarded(token, |shared| {
            shared.token += 1;
            info!("State: {} → {}", shared.state, PlaybackState::Idle);
            shared.state = PlaybackState::Idle;
            self.timer.reset();
            self.send(PlaybackEvent::StateChanged(PlaybackState::Idle));
            self.send(PlaybackEvent::Activity(Activity::Cleared));
            self.send(PlaybackEvent::Emotion(Emotion::Calm));
        });
    }

    async fn run(self: Arc<Self>, token: u64, text: String, timed: bool) {
        let phrases = segment(&clean_text(&text));
        debug!("Segmented into {} phrases", phrases.len());

        if phrases.is_empty() {
            self.finish(token, timed).await;
            return;
        }

        let voice = self.await_voices(token).await;
        let pitch = pitch_for(voice.as_ref(), &self.config);
        let last = phrases.len() - 1;

        for (i, phrase) in phrases.into_iter().enumerate() {
            if !self.transition(token, PlaybackState::Speaking(i)) {
                return;
            }
            self.emit(token, PlaybackEvent::Activity(Activity::Speaking));
            debug!("Phrase {}/{}: \"{phrase}\"", i + 1, last + 1);

            let utterance = Utterance {
                text: phrase,
                voice: voice.clone(),
                rate: self.config.rate,
                pitch,
                volume: self.config.volume,
            };

            if let Err(e) = self.host.speak(utterance).await {
                if self.is_current(token) {
                    warn!("Speech failed on phrase {}/{}: {e}", i + 1, last + 1);
                    self.abort(token);
                }
                return;
            }

            if timed {
                self.stop_timer(token);
            }
            if !self.emit(token, PlaybackEvent::Activity(Activity::Thinking)) {
                return;
            }
            if i == last {
                break;
            }

            if !self.transition(token, PlaybackState::Paused(i)) {
                return;
            }
            if timed {
                tokio::time::sleep(self.config.settle_delay()).await;
                if !self.start_timer_phase(token, TimerPhase::Pause) {
                    return;
                }
                tokio::time::sleep(self.config.phrase_pause()).await;
                if !self.start_timer_phase(token, TimerPhase::Speaking) {
                    return;
                }
            } else {
                tokio::time::sleep(self.config.phrase_pause()).await;
            }
        }

        self.finish(token, timed).await;
    }

    async fn finish(&self, token: u64, timed: bool) {
        let completed = self.guarded(token, |shared| {
            info!("State: {} → {}", shared.state, PlaybackState::Complete);
            shared.state = PlaybackState::Complete;
            self.timer.stop();
            let reading = self.timer.reading();
            self.send(PlaybackEvent::StateChanged(PlaybackState::Complete));
            self.send(PlaybackEvent::Activity(Activity::Cleared));
            self.send(PlaybackEvent::Emotion(Emotion::Calm));
            self.send(PlaybackEvent::Completed(reading));
            reading
        });

        let Some(reading) = completed else {
            return;
        };
        info!("Playback complete ({}s total)", reading.total_secs);

        if timed {
            tokio::time::sleep(self.config.settle_delay()).await;
            self.emit(token, PlaybackEvent::TimerComplete(self.timer.reading()));
        }
    }

    /// Poll the host catalogue until it has voices, backing off up to a
    /// bounded number of attempts. None means the host default voice.
    async fn await_voices(&self, token: u64) -> Option<VoiceDescriptor> {
        let max_attempts = self.config.voice_poll_max_attempts.max(1);
        let max_delay = Duration::from_millis(self.config.voice_poll_max_interval_ms);
        let mut delay = Duration::from_millis(self.config.voice_poll_interval_ms);

        for attempt in 1..=max_attempts {
            let voices = self.host.voices();
            if !voices.is_empty() {
                let voice = self.selector.select(&voices).cloned();
                match &voice {
                    Some(v) => debug!("Selected voice {} ({})", v.name, v.lang),
                    None => debug!("No preferred voice among {}, using host default", voices.len()),
                }
                return voice;
            }
            if !self.is_current(token) {
                return None;
            }
            if attempt == max_attempts {
                break;
            }
            debug!("Voice catalogue empty (attempt {attempt}/{max_attempts}), retrying in {delay:?}");
            tokio::time::sleep(delay).await;
            delay = (delay * 2).min(max_delay);
        }

        warn!("No voices reported after {max_attempts} attempts, using host default voice");
        None
    }
}
