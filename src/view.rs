//! Screen view-state, folded from playback events.
//!
//! Front ends own a `CoachView`, feed it every `PlaybackEvent`, and render
//! from it. It never reaches into the session.

use std::sync::{Arc, Mutex};

use serde::Serialize;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::speech::{Emotion, PlaybackEvent, PlaybackSession, PlaybackState, TimerPhase, TimerReading};

/// Keep `view` in sync with `session` until the session is dropped.
pub fn follow(session: &PlaybackSession, view: Arc<Mutex<CoachView>>) -> JoinHandle<()> {
    let mut events = session.subscribe();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => view.lock().unwrap().apply(&event),
                Err(RecvError::Lagged(n)) => debug!("View lagged, skipped {n} events"),
                Err(RecvError::Closed) => break,
            }
        }
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LessonView {
    pub index: usize,
    pub title: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CoachView {
    pub state: PlaybackState,
    pub speaking: bool,
    pub thinking: String,
    pub emotion: Emotion,
    pub timer: TimerReading,
    pub timer_visible: bool,
    pub timer_complete: bool,
    pub lesson: Option<LessonView>,
}

impl CoachView {
    pub fn apply(&mut self, event: &PlaybackEvent) {
        match event {
            PlaybackEvent::StateChanged(state) => {
                self.state = *state;
                self.speaking = matches!(
                    state,
                    PlaybackState::AwaitingVoices | PlaybackState::Speaking(_) | PlaybackState::Paused(_)
                );
                match state {
                    PlaybackState::AwaitingVoices => {
                        // Only a timed playback's PhaseStarted shows the timer again
                        self.timer = TimerReading::default();
                        self.timer_visible = false;
                        self.timer_complete = false;
                    }
                    PlaybackState::Idle => {
                        self.timer = TimerReading::default();
                        self.timer_visible = false;
                        self.timer_complete = false;
                    }
                    _ => {}
                }
            }
            PlaybackEvent::Emotion(emotion) => self.emotion = *emotion,
            PlaybackEvent::Activity(activity) => self.thinking = activity.label().to_string(),
            PlaybackEvent::PhaseStarted(reading) | PlaybackEvent::Tick(reading) => {
                self.timer = *reading;
                self.timer_visible = true;
            }
            PlaybackEvent::Completed(reading) => {
                self.timer = *reading;
                self.speaking = false;
            }
            PlaybackEvent::TimerComplete(reading) => {
                self.timer = *reading;
                self.timer_complete = true;
            }
            PlaybackEvent::LessonStarted {
                index,
                title,
                thinking,
            } => {
                self.lesson = Some(LessonView {
                    index: *index,
                    title: title.clone(),
                });
                self.thinking = thinking.clone();
                self.timer = TimerReading::default();
                self.timer_visible = false;
                self.timer_complete = false;
            }
        }
    }

    /// One-line terminal rendering of the brain timer / narrator status.
    pub fn render_line(&self) -> String {
        if self.timer_complete {
            return format!("✅ Complete: {}s total", self.timer.total_secs);
        }
        if self.timer_visible && self.speaking {
            let label = match self.timer.phase {
                TimerPhase::Pause => "Pause...",
                _ => "Speaking...",
            };
            return format!(
                "{} {label} {}s | total {}s",
                self.emotion.label(),
                self.timer.phase_secs,
                self.timer.total_secs
            );
        }
        if self.thinking.is_empty() {
            self.emotion.label().to_string()
        } else {
            format!("{} {}", self.emotion.label(), self.thinking)
        }
    }
}
