//! Elapsed-time counter for the "brain timer" display.
//!
//! Counts whole seconds per phase (speaking / pause) and in total. The
//! phase counter restarts with every phase, the total only on `reset`.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerPhase {
    #[default]
    Idle,
    Speaking,
    Pause,
}

impl std::fmt::Display for TimerPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Speaking => write!(f, "speaking"),
            Self::Pause => write!(f, "pause"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TimerReading {
    pub phase: TimerPhase,
    pub phase_secs: u64,
    pub total_secs: u64,
}

#[derive(Default)]
struct TimerState {
    reading: TimerReading,
    active: bool,
    // Bumped on every phase change and stop; a ticker only counts while
    // its epoch is current.
    epoch: u64,
}

pub struct ElapsedTimer {
    tick: Duration,
    state: Arc<Mutex<TimerState>>,
    ticker: Mutex<Option<JoinHandle<()>>>,
}

impl Default for ElapsedTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl ElapsedTimer {
    pub fn new() -> Self {
        Self::with_tick(Duration::from_secs(1))
    }

    pub fn with_tick(tick: Duration) -> Self {
        Self {
            tick,
            state: Arc::new(Mutex::new(TimerState::default())),
            ticker: Mutex::new(None),
        }
    }

    pub fn reading(&self) -> TimerReading {
        self.state.lock().unwrap().reading
    }

    pub fn is_active(&self) -> bool {
        self.state.lock().unwrap().active
    }

    /// Begin a new phase: phase counter back to 0, total keeps counting.
    ///
    /// `on_tick` runs on every tick with the updated reading, after the
    /// timer's lock is released. A tick can race a phase change, so callers
    /// that care compare against `reading()`.
    pub fn start_phase<F>(&self, phase: TimerPhase, on_tick: F)
    where
        F: Fn(TimerReading) + Send + Sync + 'static,
    {
        let epoch = {
            let mut st = self.state.lock().unwrap();
            st.epoch += 1;
            st.active = true;
            st.reading.phase = phase;
            st.reading.phase_secs = 0;
            st.epoch
        };

        let state = self.state.clone();
        let tick = self.tick;
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(Instant::now() + tick, tick);
            loop {
                interval.tick().await;
                let reading = {
                    let mut st = state.lock().unwrap();
                    if st.epoch != epoch || !st.active {
                        break;
                    }
                    st.reading.phase_secs += 1;
                    st.reading.total_secs += 1;
                    st.reading
                };
                on_tick(reading);
            }
        });

        if let Some(old) = self.ticker.lock().unwrap().replace(handle) {
            old.abort();
        }
    }

    /// Halt ticking. The last reading stays visible.
    pub fn stop(&self) {
        {
            let mut st = self.state.lock().unwrap();
            st.active = false;
            st.epoch += 1;
        }
        if let Some(handle) = self.ticker.lock().unwrap().take() {
            handle.abort();
        }
    }

    /// Stop and zero both counters.
    pub fn reset(&self) {
        self.stop();
        self.state.lock().unwrap().reading = TimerReading::default();
    }
}

impl Drop for ElapsedTimer {
    fn drop(&mut self) {
        if let Ok(mut ticker) = self.ticker.lock() {
            if let Some(handle) = ticker.take() {
                handle.abort();
            }
        }
    }
}
