//! Scripted education lessons and the player that walks through them.

use std::sync::Mutex;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::info;

use crate::config::LessonsConfig;
use crate::speech::{Emotion, PlaybackEvent, PlaybackSession};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lesson {
    pub title: String,
    pub content: String,
    /// Caption shown while the lesson is about to start.
    #[serde(default)]
    pub thinking: String,
    #[serde(default)]
    pub emotion: Emotion,
}

impl Lesson {
    fn new(title: &str, content: &str, thinking: &str, emotion: Emotion) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
            thinking: thinking.into(),
            emotion,
        }
    }
}

pub fn builtin_lessons() -> Vec<Lesson> {
    vec![
        Lesson::new(
            "Meet Raman",
            "Hello. I'm Raman. I have dementia. I want to help you understand me.",
            "Let me introduce myself slowly...",
            Emotion::Calm,
        ),
        Lesson::new(
            "Why I Need Time",
            "When you talk to me. I need time. My brain works slower now. Please wait for me.",
            "Explaining why I'm slow...",
            Emotion::Thoughtful,
        ),
        Lesson::new(
            "One Thing at a Time",
            "Too many instructions. I get confused. Tell me one thing. Then wait.",
            "Trying to explain overload...",
            Emotion::Overwhelmed,
        ),
        Lesson::new(
            "Don't Interrupt My Thoughts",
            "Sometimes I stop talking. but I'm still thinking. Please don't jump in. Let me finish.",
            "Finding the right words...",
            Emotion::Focused,
        ),
        Lesson::new(
            "How Words Make Me Feel",
            "When you say 'Don't forget your medicine'. I feel bad. Instead say, 'Here's your medicine'. I feel good. Same message. Different feeling.",
            "Sharing my emotions...",
            Emotion::Emotional,
        ),
    ]
}

#[derive(Debug, Error)]
pub enum LessonError {
    #[error("no lesson {index} (have {count})")]
    OutOfRange { index: usize, count: usize },
}

/// Plays lessons through a shared playback session, in timed mode.
pub struct LessonPlayer {
    lessons: Vec<Lesson>,
    session: PlaybackSession,
    start_delay: Duration,
    current: Mutex<Option<usize>>,
    pending: Mutex<Option<JoinHandle<()>>>,
}

impl LessonPlayer {
    pub fn new(config: &LessonsConfig, session: PlaybackSession) -> Self {
        let lessons = if config.items.is_empty() {
            builtin_lessons()
        } else {
            config.items.clone()
        };
        Self {
            lessons,
            session,
            start_delay: Duration::from_millis(config.start_delay_ms),
            current: Mutex::new(None),
            pending: Mutex::new(None),
        }
    }

    pub fn lessons(&self) -> &[Lesson] {
        &self.lessons
    }

    pub fn current(&self) -> Option<usize> {
        *self.current.lock().unwrap()
    }

    pub fn session(&self) -> &PlaybackSession {
        &self.session
    }

    /// Stop whatever is playing, announce lesson `index`, then speak it
    /// after the start delay.
    pub fn start(&self, index: usize) -> Result<Lesson, LessonError> {
        let lesson = self
            .lessons
            .get(index)
            .cloned()
            .ok_or(LessonError::OutOfRange {
                index,
                count: self.lessons.len(),
            })?;

        self.cancel_pending();
        self.session.stop();
        *self.current.lock().unwrap() = Some(index);
        info!("Lesson {}/{}: {}", index + 1, self.lessons.len(), lesson.title);
        self.session.announce(PlaybackEvent::LessonStarted {
            index,
            title: lesson.title.clone(),
            thinking: lesson.thinking.clone(),
        });

        let session = self.session.clone();
        let delay = self.start_delay;
        let to_speak = lesson.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            session.start(&to_speak.content, to_speak.emotion, true);
        });
        *self.pending.lock().unwrap() = Some(handle);

        Ok(lesson)
    }

    /// Advance to the following lesson. None when already on the last one.
    pub fn next(&self) -> Result<Option<Lesson>, LessonError> {
        let next = self.current().map_or(0, |i| i + 1);
        if next >= self.lessons.len() {
            return Ok(None);
        }
        self.start(next).map(Some)
    }

    pub fn stop(&self) {
        self.cancel_pending();
        self.session.stop();
    }

    fn cancel_pending(&self) {
        if let Some(handle) = self.pending.lock().unwrap().take() {
            handle.abort();
        }
    }
}

impl Drop for LessonPlayer {
    fn drop(&mut self) {
        self.cancel_pending();
    }
}
