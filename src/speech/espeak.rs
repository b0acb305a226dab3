//! espeak-ng subprocess synthesizer.
//!
//! One `espeak-ng` process per utterance. Rate, pitch, and volume are
//! mapped onto its `-s` (words/min), `-p` (0-99), and `-a` (0-200) flags.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tokio::sync::Notify;
use tracing::{debug, info, warn};

use super::host::{SpeechError, SpeechHost, Utterance};
use super::voice::VoiceDescriptor;
use crate::config::SpeechConfig;

const DEFAULT_WPM: f32 = 175.0;
const MIN_WPM: f32 = 80.0;
const MAX_WPM: f32 = 450.0;

pub struct EspeakSpeechHost {
    command: String,
    resolved: Option<PathBuf>,
    // Read once at construction; an empty list means the host default voice
    voices: Vec<VoiceDescriptor>,
    cancel: Notify,
}

impl EspeakSpeechHost {
    /// Locate the binary and read its voice list. Blocks briefly on the
    /// `--voices` subprocess, so build it before playback starts.
    pub fn new(config: &SpeechConfig) -> Self {
        let command = config.espeak_command.clone();
        let resolved = find_on_path(&command);
        let voices = match &resolved {
            Some(path) => {
                info!("Using {} for speech", path.display());
                match load_voices(path) {
                    Ok(voices) => {
                        debug!("{command} reports {} voices", voices.len());
                        voices
                    }
                    Err(e) => {
                        warn!("Failed to list voices, using the default voice: {e}");
                        Vec::new()
                    }
                }
            }
            None => {
                warn!("{command} not found on PATH, voice output disabled");
                Vec::new()
            }
        };
        Self {
            command,
            resolved,
            voices,
            cancel: Notify::new(),
        }
    }
}

fn load_voices(program: &Path) -> Result<Vec<VoiceDescriptor>, String> {
    let output = std::process::Command::new(program)
        .arg("--voices")
        .stdin(Stdio::null())
        .output()
        .map_err(|e| format!("{} --voices: {e}", program.display()))?;
    if !output.status.success() {
        return Err(format!("{} --voices exited with {}", program.display(), output.status));
    }
    Ok(parse_voice_list(&String::from_utf8_lossy(&output.stdout)))
}

/// Map an utterance onto espeak-ng arguments.
pub fn espeak_args(utterance: &Utterance) -> Vec<String> {
    let wpm = (DEFAULT_WPM * utterance.rate).clamp(MIN_WPM, MAX_WPM).round() as u32;
    let pitch = (utterance.pitch * 50.0).clamp(0.0, 99.0).round() as u32;
    let amplitude = (utterance.volume * 100.0).clamp(0.0, 200.0).round() as u32;

    let mut args = vec![
        "-s".to_string(),
        wpm.to_string(),
        "-p".to_string(),
        pitch.to_string(),
        "-a".to_string(),
        amplitude.to_string(),
    ];
    if let Some(voice) = &utterance.voice {
        args.push("-v".to_string());
        args.push(voice.lang.clone());
    }
    args.push("--".to_string());
    args.push(utterance.text.clone());
    args
}

/// Parse `espeak-ng --voices` output:
///
/// ```text
/// Pty Language       Age/Gender VoiceName          File                 Other Languages
///  5  en-gb           --/M      English_(Great_Britain) gmw/en
/// ```
pub fn parse_voice_list(output: &str) -> Vec<VoiceDescriptor> {
    output
        .lines()
        .skip(1)
        .filter_map(|line| {
            let cols: Vec<&str> = line.split_whitespace().collect();
            if cols.len() < 4 {
                return None;
            }
            let name = cols[3].replace('_', " ");
            Some(VoiceDescriptor::new(name, cols[1]))
        })
        .collect()
}

fn find_on_path(command: &str) -> Option<PathBuf> {
    let candidate = Path::new(command);
    if candidate.components().count() > 1 {
        return candidate.is_file().then(|| candidate.to_path_buf());
    }
    std::env::var_os("PATH").and_then(|paths| {
        std::env::split_paths(&paths)
            .map(|dir| dir.join(command))
            .find(|p| p.is_file())
    })
}

#[async_trait]
impl SpeechHost for EspeakSpeechHost {
    fn is_available(&self) -> bool {
        self.resolved.is_some()
    }

    fn voices(&self) -> Vec<VoiceDescriptor> {
        self.voices.clone()
    }

    async fn speak(&self, utterance: Utterance) -> Result<(), SpeechError> {
        let program = self
            .resolved
            .as_deref()
            .ok_or_else(|| SpeechError::Unavailable(format!("{} not installed", self.command)))?;

        let mut child = Command::new(program)
            .args(espeak_args(&utterance))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()?;

        let finished = tokio::select! {
            status = child.wait() => Some(status),
            _ = self.cancel.notified() => None,
        };

        match finished {
            Some(status) => {
                let status = status?;
                if status.success() {
                    Ok(())
                } else {
                    Err(SpeechError::Playback(format!("{} exited with {status}", self.command)))
                }
            }
            None => {
                if let Err(e) = child.kill().await {
                    warn!("Failed to kill {}: {e}", self.command);
                }
                Err(SpeechError::Cancelled)
            }
        }
    }

    fn cancel(&self) {
        self.cancel.notify_waiters();
    }

    fn name(&self) -> &str {
        "espeak-ng"
    }
}
