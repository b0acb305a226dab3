use serde::{Deserialize, Serialize};

/// Presentational affect attached to a lesson. Passed through playback
/// events untouched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Emotion {
    #[default]
    Calm,
    Thoughtful,
    Overwhelmed,
    Focused,
    Emotional,
}

impl Emotion {
    /// Badge text shown next to the narrator.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Calm => "😌 Calm",
            Self::Thoughtful => "🤔 Thoughtful",
            Self::Overwhelmed => "😵 Overwhelmed",
            Self::Focused => "🎯 Focused",
            Self::Emotional => "💙 Sharing feelings",
        }
    }
}

impl std::fmt::Display for Emotion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Calm => write!(f, "calm"),
            Self::Thoughtful => write!(f, "thoughtful"),
            Self::Overwhelmed => write!(f, "overwhelmed"),
            Self::Focused => write!(f, "focused"),
            Self::Emotional => write!(f, "emotional"),
        }
    }
}
