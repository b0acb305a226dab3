//! Text → phrases.
//!
//! A phrase is the atomic unit of playback: the session speaks one phrase,
//! pauses, then speaks the next.

use std::sync::OnceLock;

use regex::Regex;

fn is_terminator(c: char) -> bool {
    matches!(c, '.' | '!' | '?')
}

/// Split text on runs of `.`, `!`, `?`, dropping segments that are empty
/// after trimming. Terminators are not part of the returned phrases.
pub fn segment(text: &str) -> Vec<String> {
    text.split(is_terminator)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// Strip script markup that should not be read aloud: `...` ellipses,
/// `**bold**` markers, and the stage direction "pause".
pub fn clean_text(text: &str) -> String {
    static BOLD: OnceLock<Regex> = OnceLock::new();
    static PAUSE: OnceLock<Regex> = OnceLock::new();

    let bold = BOLD.get_or_init(|| Regex::new(r"\*\*(.*?)\*\*").unwrap());
    let pause = PAUSE.get_or_init(|| Regex::new(r"(?i)pause").unwrap());

    let text = text.replace("...", "");
    let text = bold.replace_all(&text, "$1");
    let text = pause.replace_all(&text, "");
    text.trim().to_string()
}
