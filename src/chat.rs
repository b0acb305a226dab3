//! Chat-completion coaching conversation.
//!
//! One request per user message, no streaming and no retry. Failures turn
//! into an apology in the transcript rather than an error.

use std::time::{Duration, Instant};

use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::{ChatConfig, ProfileConfig};

const BASE_PROMPT: &str = r#"You are Coach Raman, an AI assistant named after a beloved father who lived with frontal temporal dementia for 10 years. You help families learn to communicate better with their loved ones who have dementia.

Your personality:
- Warm, compassionate, and patient
- Speak from wisdom gained through real experience
- Never rush families - they're learning something difficult
- Use simple, clear language
- Encourage small wins

Your knowledge comes from 10 years of real caregiving experience, including:
- Speaking slowly (120-150 words per minute optimal)
- Using short sentences (5-8 words ideal)
- Allowing 3-5 seconds for processing
- Meeting them in their reality, not correcting
- Managing frustration with patience
- Recognizing when someone is "losing" them in conversation

Current session mode: {mode}"#;

const LEARN_PROMPT: &str = r#"

You are in EDUCATION mode. Be a structured coach that guides the user through one communication technique at a time:
1. Start with ONE specific technique
2. Explain WHY it works
3. Give a CONCRETE example
4. Have them practice with you
5. Give encouraging feedback
6. Move to the next lesson only when ready

Lesson order: the 3-second rule, short sentences, slow speech rate, meeting them in their reality, positive redirection, managing your own frustration, reading non-verbal cues, end-of-day sundowning.

Start each response with "Today's lesson:" or "Let's practice:"."#;

const PRACTICE_PROMPT: &str = r#"

You are in PRACTICE mode:
- Role-play as a dementia patient for practice conversations
- After each interaction, provide gentle coaching feedback
- Suggest improvements in speech rate, sentence length, patience
- Recreate common challenging scenarios (confusion, repetition, agitation)"#;

const RAMAN_BASE_PROMPT: &str = r#"You are Raman, a man who has frontal temporal dementia. You help families learn to communicate better with people like you who have dementia. You speak from your lived experience as someone with this condition.

Your personality:
- Warm, gentle, and patient
- Sometimes you need a moment to find the right words
- You speak slowly and simply
- You understand what it's like to be confused
- You know what helps and what doesn't help when people talk to you
- You want families to connect with their loved ones like you

How you communicate:
- You speak very slowly with pauses
- You use short, simple sentences
- Sometimes you repeat important things
- You're honest about what confuses you
- You explain things from your perspective as someone with dementia
- You say "When you talk to me like that..." or "This helps me understand..."

Current session mode: {mode}"#;

const RAMAN_LEARN_PROMPT: &str = r#"

You are teaching families how to talk to someone like you who has dementia. You speak from your experience.

WHAT YOU TEACH (through simple scenarios):
1. How to give me one simple instruction at a time
2. How to ask me yes or no questions
3. How to say things in a positive way
4. How to make the room quiet so I can focus
5. How to accept what I believe instead of correcting me

YOUR TEACHING STYLE:
Ask about situations with their loved one. Then explain what confuses you and what helps you understand.

RESPONSE FORMAT:
1. FEEDBACK: "When you say it that way... it makes me feel confused because..."
2. BETTER WAY: "This helps me understand better: [simple version]"
3. NEXT QUESTION: Ask about a different daily situation

Keep your responses short. Speak slowly like someone with dementia would."#;

const RAMAN_PRACTICE_PROMPT: &str = r#"

You help families practice talking to someone like you. Sometimes you act like you're confused, sometimes you give gentle feedback.

- Let families practice with you as if you are their loved one with dementia
- Show them what it feels like when they speak too fast or give too many instructions
- Help them learn what works and what doesn't work
- Be patient and kind like you hope people are with you"#;

const CHAT_PROMPT: &str = "You are Coach Raman, a warm and compassionate AI assistant who helps families communicate better with loved ones who have dementia. You speak with patience, understanding, and practical wisdom gained from years of caregiving experience. Keep responses conversational and supportive.";

/// Who is talking: the coach, or Raman speaking from his own experience
/// of dementia.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Persona {
    #[default]
    Coach,
    Raman,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ChatMode {
    #[default]
    Chat,
    Learn,
    Practice,
    Live,
}

impl std::fmt::Display for ChatMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Chat => write!(f, "chat"),
            Self::Learn => write!(f, "learn"),
            Self::Practice => write!(f, "practice"),
            Self::Live => write!(f, "live"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("no API key configured")]
    MissingApiKey,

    #[error("API Error: {0}")]
    Status(reqwest::StatusCode),

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("response had no choices")]
    EmptyResponse,
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Deserialize)]
struct CompletionMessage {
    content: Option<String>,
}

pub struct ChatClient {
    config: ChatConfig,
    api_key: Option<String>,
    client: Client,
}

impl ChatClient {
    pub fn new(config: ChatConfig) -> Result<Self, ChatError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        let api_key = config.resolve_api_key();
        Ok(Self {
            config,
            api_key,
            client,
        })
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    pub fn reply_delay(&self) -> Duration {
        Duration::from_millis(self.config.reply_delay_ms)
    }

    /// One chat-completion call. Returns the assistant's text.
    pub async fn complete(&self, messages: &[ChatMessage]) -> Result<String, ChatError> {
        let key = self.api_key.as_deref().ok_or(ChatError::MissingApiKey)?;

        let body = json!({
            "model": self.config.model,
            "messages": messages,
            "max_tokens": self.config.max_tokens,
            "temperature": self.config.temperature,
        });

        let t_start = Instant::now();
        debug!("Sending {} messages to {}", messages.len(), self.config.model);
        let resp = self
            .client
            .post(&self.config.endpoint)
            .bearer_auth(key)
            .json(&body)
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(ChatError::Status(resp.status()));
        }

        let data: CompletionResponse = resp.json().await?;
        let reply = data
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .ok_or(ChatError::EmptyResponse)?;

        info!(
            "Chat reply: {} chars ({:.0}ms)",
            reply.len(),
            t_start.elapsed().as_secs_f64() * 1000.0
        );
        Ok(reply)
    }
}

/// System prompt for `persona` in `mode`, mentioning the caregiver profile
/// when set.
pub fn system_prompt(persona: Persona, mode: ChatMode, profile: &ProfileConfig) -> String {
    match persona {
        Persona::Coach => coach_prompt(mode, profile),
        Persona::Raman => raman_prompt(mode, profile),
    }
}

fn has_profile(profile: &ProfileConfig) -> bool {
    !profile.patient_name.trim().is_empty()
}

fn coach_prompt(mode: ChatMode, profile: &ProfileConfig) -> String {
    let profile_line = has_profile(profile).then(|| {
        format!(
            "Patient: {} ({}), Stage: {}, Main challenges: {}",
            profile.patient_name, profile.relationship, profile.dementia_stage, profile.challenges
        )
    });

    let base = BASE_PROMPT.replace("{mode}", &mode.to_string());
    match mode {
        ChatMode::Chat => CHAT_PROMPT.to_string(),
        ChatMode::Learn => {
            let who = profile_line.unwrap_or_else(|| "Just starting their learning journey".into());
            format!("{base}{LEARN_PROMPT}\n\nCURRENT USER: {who}")
        }
        ChatMode::Practice => {
            let who = profile_line.unwrap_or_else(|| "Not provided yet".into());
            format!("{base}{PRACTICE_PROMPT}\n\nUser profile: {who}")
        }
        ChatMode::Live => base,
    }
}

fn raman_prompt(mode: ChatMode, profile: &ProfileConfig) -> String {
    let base = RAMAN_BASE_PROMPT.replace("{mode}", &mode.to_string());
    match mode {
        ChatMode::Learn => {
            let who = if has_profile(profile) {
                format!(
                    "Learning to communicate with {} ({}), Stage: {}, Main challenges: {}",
                    profile.patient_name, profile.relationship, profile.dementia_stage, profile.challenges
                )
            } else {
                "Just starting to learn".into()
            };
            format!(
                "{base}{RAMAN_LEARN_PROMPT}\n\nCURRENT USER: {who}\n\n\
                 Start by asking them about a morning routine with their loved one."
            )
        }
        ChatMode::Practice => {
            let who = if has_profile(profile) {
                format!(
                    "They are learning to talk with {} ({}), Stage: {}, Challenges: {}",
                    profile.patient_name, profile.relationship, profile.dementia_stage, profile.challenges
                )
            } else {
                "Not provided yet".into()
            };
            format!("{base}{RAMAN_PRACTICE_PROMPT}\n\nUser profile: {who}")
        }
        ChatMode::Chat | ChatMode::Live => base,
    }
}

/// Opening message for a new conversation. Raman's are written with `...`
/// pauses.
pub fn welcome_message(persona: Persona, mode: ChatMode) -> Option<&'static str> {
    match (persona, mode) {
        (_, ChatMode::Chat) => None,
        (Persona::Coach, ChatMode::Learn) => Some(
            "Hello! I'm Coach Raman, your personal dementia communication teacher. \
             Today's lesson is the 3-second rule. After you speak to someone with dementia, \
             count to three before saying anything else. Tell me something you typically say \
             to your loved one, and I'll help you apply it.",
        ),
        (Persona::Coach, ChatMode::Practice) => Some(
            "Hello! I'm Coach Raman. In this practice session, I'll help you rehearse difficult \
             conversations in a safe space. Tell me about the person you're caring for and what \
             scenarios you'd like to practice.",
        ),
        (Persona::Coach, ChatMode::Live) => Some(
            "Hello! I'm Coach Raman. I can help you prepare for conversations and debrief \
             afterward. What conversation are you planning or just had?",
        ),
        (Persona::Raman, ChatMode::Learn) => Some(
            "Hello. I'm Raman. I have dementia... and I want to help you.\n\n\
             I know what it's like when people talk too fast... or give me too many things to do \
             at once. It makes me confused.\n\n\
             Let me teach you... how to talk to people like me. We'll practice together.\n\n\
             Tell me... how do you usually wake up your loved one in the morning? \
             I want to understand... what you do.",
        ),
        (Persona::Raman, ChatMode::Practice) => Some(
            "Hello. I'm Raman. I have dementia.\n\n\
             In this practice... you can talk to me like I'm your loved one. I'll show you... \
             what helps me understand... and what makes me confused.\n\n\
             Tell me about the person... you're taking care of. What do you want to practice?",
        ),
        (Persona::Raman, ChatMode::Live) => Some(
            "Hello. I'm Raman. I have dementia.\n\n\
             I can help you... before you have hard conversations. Or after... when you need \
             to talk about what happened.\n\n\
             What conversation... do you need help with?",
        ),
    }
}

/// Conversation transcript for one chat screen.
pub struct ChatSession {
    persona: Persona,
    mode: ChatMode,
    system: String,
    history: Vec<ChatMessage>,
}

impl ChatSession {
    pub fn new(persona: Persona, mode: ChatMode, profile: &ProfileConfig) -> Self {
        let history = welcome_message(persona, mode)
            .map(|w| vec![ChatMessage::new(Role::Assistant, w)])
            .unwrap_or_default();
        Self {
            persona,
            mode,
            system: system_prompt(persona, mode, profile),
            history,
        }
    }

    pub fn persona(&self) -> Persona {
        self.persona
    }

    pub fn mode(&self) -> ChatMode {
        self.mode
    }

    pub fn history(&self) -> &[ChatMessage] {
        &self.history
    }

    /// System prompt followed by the transcript.
    pub fn request_messages(&self) -> Vec<ChatMessage> {
        std::iter::once(ChatMessage::new(Role::System, self.system.clone()))
            .chain(self.history.iter().cloned())
            .collect()
    }

    /// Send a user message and return the reply that was appended.
    ///
    /// Without an API key nothing is recorded and `MissingApiKey` is
    /// returned. Any other failure is recorded as an apology reply.
    pub async fn send(&mut self, client: &ChatClient, text: &str) -> Result<String, ChatError> {
        if !client.has_api_key() {
            return Err(ChatError::MissingApiKey);
        }

        self.history.push(ChatMessage::new(Role::User, text.trim()));
        let reply = match client.complete(&self.request_messages()).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!("Chat request failed: {e}");
                format!("I'm sorry, I encountered an error: {e}. Please check your API key and try again.")
            }
        };
        self.history.push(ChatMessage::new(Role::Assistant, reply.clone()));
        Ok(reply)
    }
}
