//! Local HTTP control API.
//!
//! Lets another front end drive the coach: list and start lessons, speak
//! arbitrary text, stop playback, chat, and poll the view-state.

use std::sync::{Arc, Mutex};

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex as AsyncMutex;
use tracing::{info, warn};

use crate::chat::{ChatClient, ChatError, ChatSession};
use crate::lessons::LessonPlayer;
use crate::speech::Emotion;
use crate::view::CoachView;

#[derive(Clone)]
pub struct ApiState {
    pub player: Arc<LessonPlayer>,
    pub view: Arc<Mutex<CoachView>>,
    pub chat_client: Arc<ChatClient>,
    pub chat: Arc<AsyncMutex<ChatSession>>,
}

// --- Request/Response types ---

#[derive(Deserialize)]
struct SpeakRequest {
    text: String,
    #[serde(default)]
    emotion: Emotion,
    #[serde(default)]
    timed: bool,
}

#[derive(Deserialize)]
struct ChatRequest {
    message: String,
}

#[derive(Serialize)]
struct StatusResponse {
    backend: String,
    voice_enabled: bool,
    lesson_count: usize,
    current_lesson: Option<usize>,
    view: CoachView,
}

#[derive(Serialize)]
struct LessonSummary {
    index: usize,
    title: String,
    emotion: Emotion,
}

#[derive(Serialize)]
struct SimpleResponse {
    status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    lesson: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl SimpleResponse {
    fn ok(status: &str) -> Self {
        Self {
            status: status.into(),
            lesson: None,
            reply: None,
            error: None,
        }
    }

    fn err(message: impl Into<String>) -> Self {
        Self {
            status: "error".into(),
            lesson: None,
            reply: None,
            error: Some(message.into()),
        }
    }
}

/// Build the axum router.
pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/status", get(handle_status))
        .route("/lessons", get(handle_lessons))
        .route("/lessons/next", post(handle_next_lesson))
        .route("/lessons/{index}/start", post(handle_start_lesson))
        .route("/speak", post(handle_speak))
        .route("/stop", post(handle_stop))
        .route("/chat", post(handle_chat))
        .with_state(state)
}

/// Serve the API until the process exits.
pub async fn serve(state: ApiState, host: &str, port: u16) -> Result<(), std::io::Error> {
    let app = router(state);
    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Control API listening on {addr}");
    axum::serve(listener, app).await
}

// --- Handlers ---

async fn handle_status(State(state): State<ApiState>) -> Json<StatusResponse> {
    let session = state.player.session();
    Json(StatusResponse {
        backend: session.host_name().to_string(),
        voice_enabled: session.is_enabled(),
        lesson_count: state.player.lessons().len(),
        current_lesson: state.player.current(),
        view: state.view.lock().unwrap().clone(),
    })
}

async fn handle_lessons(State(state): State<ApiState>) -> Json<Vec<LessonSummary>> {
    Json(
        state
            .player
            .lessons()
            .iter()
            .enumerate()
            .map(|(index, l)| LessonSummary {
                index,
                title: l.title.clone(),
                emotion: l.emotion,
            })
            .collect(),
    )
}

async fn handle_start_lesson(
    State(state): State<ApiState>,
    Path(index): Path<usize>,
) -> Json<SimpleResponse> {
    match state.player.start(index) {
        Ok(lesson) => {
            Json(SimpleResponse {
                lesson: Some(lesson.title),
                ..SimpleResponse::ok("starting")
            })
        }
        Err(e) => Json(SimpleResponse::err(e.to_string())),
    }
}

async fn handle_next_lesson(State(state): State<ApiState>) -> Json<SimpleResponse> {
    match state.player.next() {
        Ok(Some(lesson)) => {
            Json(SimpleResponse {
                lesson: Some(lesson.title),
                ..SimpleResponse::ok("starting")
            })
        }
        Ok(None) => Json(SimpleResponse::ok("finished")),
        Err(e) => Json(SimpleResponse::err(e.to_string())),
    }
}

async fn handle_speak(
    State(state): State<ApiState>,
    Json(req): Json<SpeakRequest>,
) -> Json<SimpleResponse> {
    if req.text.trim().is_empty() {
        return Json(SimpleResponse::err("empty text"));
    }

    let preview: String = req.text.chars().take(80).collect();
    info!(
        "HTTP /speak: \"{}{}\" ({} chars, timed={})",
        preview.replace('\n', " "),
        if req.text.chars().count() > 80 { "..." } else { "" },
        req.text.len(),
        req.timed,
    );

    if state.player.session().start(&req.text, req.emotion, req.timed) {
        Json(SimpleResponse::ok("speaking"))
    } else {
        Json(SimpleResponse::ok("muted"))
    }
}

async fn handle_stop(State(state): State<ApiState>) -> Json<SimpleResponse> {
    state.player.stop();
    Json(SimpleResponse::ok("stopped"))
}

async fn handle_chat(
    State(state): State<ApiState>,
    Json(req): Json<ChatRequest>,
) -> Json<SimpleResponse> {
    if req.message.trim().is_empty() {
        return Json(SimpleResponse::err("empty message"));
    }

    let reply = {
        let mut chat = state.chat.lock().await;
        chat.send(&state.chat_client, &req.message).await
    };

    match reply {
        Ok(reply) => {
            let session = state.player.session().clone();
            let delay = state.chat_client.reply_delay();
            let to_speak = reply.clone();
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                session.start(&to_speak, Emotion::Calm, false);
            });
            Json(SimpleResponse {
                reply: Some(reply),
                ..SimpleResponse::ok("ok")
            })
        }
        Err(ChatError::MissingApiKey) => {
            warn!("Chat requested without an API key");
            Json(SimpleResponse::err("Please configure an API key first"))
        }
        Err(e) => Json(SimpleResponse::err(e.to_string())),
    }
}
