//! coach-raman: slowed speech coach for dementia-communication lessons.

use std::future::Future;
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use clap::{Parser, Subcommand};
use tokio::io::AsyncBufReadExt;
use tokio::sync::broadcast;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use coach_raman::api::{self, ApiState};
use coach_raman::chat::{self, ChatClient, ChatError, ChatMode, ChatSession, Persona};
use coach_raman::config::{Config, SpeechBackend};
use coach_raman::lessons::LessonPlayer;
use coach_raman::speech::{self, Emotion, PlaybackEvent, PlaybackSession, PlaybackState, VoiceSelector};
use coach_raman::view::{self, CoachView};

#[derive(Parser, Debug)]
#[command(name = "coach-raman", about = "Slowed speech coach for dementia-communication lessons")]
struct Args {
    /// Path to config.yaml
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Speech backend (overrides config)
    #[arg(short, long, value_enum)]
    backend: Option<SpeechBackend>,

    /// Who the chat speaks as (overrides config)
    #[arg(long, value_enum)]
    persona: Option<Persona>,

    /// Disable voice output
    #[arg(long)]
    mute: bool,

    /// Enable verbose (debug) logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the lessons
    Lessons,
    /// Play a lesson (1-based), or all of them in order
    Lesson {
        index: Option<usize>,
        #[arg(long)]
        all: bool,
    },
    /// Speak arbitrary text
    Say {
        text: Vec<String>,
        #[arg(long, value_enum, default_value_t = Emotion::Calm)]
        emotion: Emotion,
        /// Show the brain timer
        #[arg(long)]
        timed: bool,
    },
    /// Chat with the coach; replies are read aloud
    Chat {
        #[arg(long, value_enum, default_value_t = ChatMode::Chat)]
        mode: ChatMode,
    },
    /// List host voices and the one that would be used
    Voices,
    /// Run the local HTTP control API
    Serve {
        #[arg(long)]
        port: Option<u16>,
        #[arg(long, value_enum, default_value_t = ChatMode::Chat)]
        mode: ChatMode,
    },
}

/// How a watched playback ended.
#[derive(Debug, PartialEq, Eq)]
enum Outcome {
    Completed,
    Stopped,
    Interrupted,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let filter = if args.verbose {
        EnvFilter::new("debug,hyper=info,reqwest=info")
    } else {
        EnvFilter::new("info,hyper=warn,reqwest=warn")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let mut config = Config::load(args.config.as_deref());
    if let Some(backend) = args.backend {
        config.speech.backend = backend;
    }
    if let Some(persona) = args.persona {
        config.chat.persona = persona;
    }
    if args.mute {
        config.speech.enabled = false;
    }

    let host = speech::build_host(&config.speech);
    let session = PlaybackSession::new(host.clone(), config.speech.clone());
    if !session.is_enabled() {
        info!("Voice output disabled");
    }

    match args.command.unwrap_or(Command::Lessons) {
        Command::Lessons => {
            let player = LessonPlayer::new(&config.lessons, session);
            for (i, lesson) in player.lessons().iter().enumerate() {
                println!("{:>2}. {:<30} {}", i + 1, lesson.title, lesson.emotion.label());
            }
        }
        Command::Lesson { index, all } => {
            let player = LessonPlayer::new(&config.lessons, session);
            run_lessons(&player, index, all).await?;
        }
        Command::Say { text, emotion, timed } => {
            let text = text.join(" ");
            if text.trim().is_empty() {
                return Err("nothing to say".into());
            }
            if !session.is_enabled() {
                println!("{text}");
                return Ok(());
            }
            let events = session.subscribe();
            session.start(&text, emotion, timed);
            watch_playback(&session, events, timed, tokio::signal::ctrl_c()).await;
        }
        Command::Chat { mode } => {
            let client = ChatClient::new(config.chat.clone())?;
            let chat = ChatSession::new(config.chat.persona, mode, &config.profile);
            run_chat(&session, &client, chat).await?;
        }
        Command::Voices => {
            let voices = host.voices();
            let selected = VoiceSelector::from_config(&config.speech).select(&voices).cloned();
            if voices.is_empty() {
                println!("{} reports no voices (host default will be used)", host.name());
            }
            for voice in &voices {
                let marker = if Some(voice) == selected.as_ref() { "*" } else { " " };
                println!("{marker} {:<40} {}", voice.name, voice.lang);
            }
        }
        Command::Serve { port, mode } => {
            let view = Arc::new(Mutex::new(CoachView::default()));
            let _follower = view::follow(&session, view.clone());
            let state = ApiState {
                player: Arc::new(LessonPlayer::new(&config.lessons, session)),
                view,
                chat_client: Arc::new(ChatClient::new(config.chat.clone())?),
                chat: Arc::new(AsyncMutex::new(ChatSession::new(
                    config.chat.persona,
                    mode,
                    &config.profile,
                ))),
            };
            api::serve(state, &config.api.host, port.unwrap_or(config.api.port)).await?;
        }
    }

    Ok(())
}

async fn run_lessons(
    player: &LessonPlayer,
    index: Option<usize>,
    all: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let count = player.lessons().len();
    let first = index.unwrap_or(1);
    if first == 0 || first > count {
        return Err(format!("lesson must be between 1 and {count}").into());
    }

    if !player.session().is_enabled() {
        let range = if all { first - 1..count } else { first - 1..first };
        for lesson in &player.lessons()[range] {
            println!("{}\n  {}", lesson.title, lesson.content);
        }
        return Ok(());
    }

    let mut current = first - 1;
    loop {
        let events = player.session().subscribe();
        let lesson = player.start(current)?;
        println!("\n📘 Lesson {}/{count}: {}", current + 1, lesson.title);
        println!("   {} {}", lesson.emotion.label(), lesson.thinking);

        let outcome = watch_playback(player.session(), events, true, tokio::signal::ctrl_c()).await;
        if outcome != Outcome::Completed {
            break;
        }
        if !all || current + 1 == count {
            break;
        }
        current += 1;
    }
    Ok(())
}

/// Render playback on the terminal until it completes, is stopped, or
/// `interrupt` resolves (Ctrl-C).
async fn watch_playback<I>(
    session: &PlaybackSession,
    mut events: broadcast::Receiver<PlaybackEvent>,
    timed: bool,
    interrupt: I,
) -> Outcome
where
    I: Future,
{
    let mut view = CoachView::default();
    let mut started = false;
    tokio::pin!(interrupt);

    loop {
        tokio::select! {
            event = events.recv() => {
                let event = match event {
                    Ok(event) => event,
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => return Outcome::Stopped,
                };
                view.apply(&event);
                render_status(&view);

                match event {
                    PlaybackEvent::StateChanged(PlaybackState::Idle) if started => {
                        println!();
                        return Outcome::Stopped;
                    }
                    PlaybackEvent::StateChanged(_) => started = true,
                    PlaybackEvent::Completed(_) if !timed => {
                        println!();
                        return Outcome::Completed;
                    }
                    PlaybackEvent::TimerComplete(_) => {
                        println!();
                        return Outcome::Completed;
                    }
                    _ => {}
                }
            }
            _ = &mut interrupt => {
                session.stop();
                println!();
                info!("Interrupted");
                return Outcome::Interrupted;
            }
        }
    }
}

fn render_status(view: &CoachView) {
    let mut stdout = std::io::stdout().lock();
    let _ = write!(stdout, "\r\x1b[2K  {}", view.render_line());
    let _ = stdout.flush();
}

async fn run_chat(
    session: &PlaybackSession,
    client: &ChatClient,
    mut chat: ChatSession,
) -> Result<(), Box<dyn std::error::Error>> {
    if !client.has_api_key() {
        warn!("No API key configured (chat.api_key or $OPENAI_API_KEY)");
    }

    if let Some(welcome) = chat::welcome_message(chat.persona(), chat.mode()) {
        println!("Coach Raman: {welcome}\n");
        session.start(welcome, Emotion::Calm, false);
    }
    println!("Type a message (/stop to silence, /quit to leave).");

    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        match line {
            "" => continue,
            "/quit" | "/exit" => break,
            "/stop" => {
                session.stop();
                continue;
            }
            _ => {}
        }

        session.stop();
        println!("Coach Raman is thinking...");
        match chat.send(client, line).await {
            Ok(reply) => {
                println!("Coach Raman: {reply}\n");
                let session = session.clone();
                let delay = client.reply_delay();
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    session.start(&reply, Emotion::Calm, false);
                });
            }
            Err(ChatError::MissingApiKey) => {
                println!("Please configure an API key first (chat.api_key or $OPENAI_API_KEY).");
            }
            Err(e) => println!("Error: {e}"),
        }
    }

    session.stop();
    Ok(())
}
