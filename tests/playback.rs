mod common;

use std::sync::Arc;
use std::time::Duration;

use coach_raman::config::SpeechConfig;
use coach_raman::speech::{
    Activity, Emotion, PlaybackEvent, PlaybackSession, PlaybackState, TimerPhase, VoiceDescriptor,
};

use common::{drain, sleep_ms, states, test_config, ScriptedHost};

fn session_with(host: &Arc<ScriptedHost>, config: SpeechConfig) -> PlaybackSession {
    PlaybackSession::new(host.clone(), config)
}

#[tokio::test(start_paused = true)]
async fn single_phrase_completes_without_pause() {
    let host = Arc::new(ScriptedHost::auto(Duration::from_millis(2500)));
    let session = session_with(&host, test_config());
    let mut events = session.subscribe();
    assert_eq!(session.state(), PlaybackState::Idle);

    assert!(session.start("Hello there.", Emotion::Thoughtful, false));
    sleep_ms(3000).await;

    // Done well before a 3.5s pause could have elapsed
    assert_eq!(session.state(), PlaybackState::Complete);
    let events = drain(&mut events);
    assert_eq!(
        states(&events),
        vec![
            PlaybackState::AwaitingVoices,
            PlaybackState::Speaking(0),
            PlaybackState::Complete
        ]
    );
    assert_eq!(events[1], PlaybackEvent::Emotion(Emotion::Thoughtful));
    assert_eq!(host.spoken_texts(), vec!["Hello there"]);
}

#[tokio::test(start_paused = true)]
async fn three_phrases_pause_twice_and_timer_adds_up() {
    let host = Arc::new(ScriptedHost::auto(Duration::from_millis(2500)));
    let session = session_with(&host, test_config());
    let mut events = session.subscribe();

    session.start("One. Two! Three?", Emotion::Calm, true);
    sleep_ms(30_000).await;

    let events = drain(&mut events);
    assert_eq!(
        states(&events),
        vec![
            PlaybackState::AwaitingVoices,
            PlaybackState::Speaking(0),
            PlaybackState::Paused(0),
            PlaybackState::Speaking(1),
            PlaybackState::Paused(1),
            PlaybackState::Speaking(2),
            PlaybackState::Complete,
        ]
    );
    assert_eq!(host.spoken_texts(), vec!["One", "Two", "Three"]);

    // Sum the last reading of every phase and compare with the total.
    let mut phases: Vec<(TimerPhase, u64)> = Vec::new();
    let mut completed = None;
    for event in &events {
        match event {
            PlaybackEvent::PhaseStarted(r) => phases.push((r.phase, r.phase_secs)),
            PlaybackEvent::Tick(r) => {
                let last = phases.last_mut().expect("tick before any phase");
                assert_eq!(last.0, r.phase);
                last.1 = r.phase_secs;
            }
            PlaybackEvent::Completed(r) => completed = Some(*r),
            _ => {}
        }
    }

    let labels: Vec<TimerPhase> = phases.iter().map(|p| p.0).collect();
    assert_eq!(
        labels,
        vec![
            TimerPhase::Speaking,
            TimerPhase::Pause,
            TimerPhase::Speaking,
            TimerPhase::Pause,
            TimerPhase::Speaking
        ]
    );

    let completed = completed.expect("no Completed event");
    let sum: u64 = phases.iter().map(|p| p.1).sum();
    assert_eq!(completed.total_secs, sum);
    // 2.5s speaking → 2 ticks, 3.5s pause → 3 ticks
    assert_eq!(completed.total_secs, 12);

    let timer_complete = events
        .iter()
        .position(|e| matches!(e, PlaybackEvent::TimerComplete(_)))
        .expect("no TimerComplete event");
    let completed_at = events
        .iter()
        .position(|e| matches!(e, PlaybackEvent::Completed(_)))
        .unwrap();
    assert!(timer_complete > completed_at);
}

#[tokio::test(start_paused = true)]
async fn untimed_playback_never_touches_the_timer() {
    let host = Arc::new(ScriptedHost::auto(Duration::from_millis(1500)));
    let session = session_with(&host, test_config());
    let mut events = session.subscribe();

    session.start("One. Two.", Emotion::Calm, false);
    sleep_ms(20_000).await;

    let events = drain(&mut events);
    assert!(!events.iter().any(|e| matches!(
        e,
        PlaybackEvent::Tick(_) | PlaybackEvent::PhaseStarted(_) | PlaybackEvent::TimerComplete(_)
    )));
    assert_eq!(session.state(), PlaybackState::Complete);
}

#[tokio::test(start_paused = true)]
async fn stop_mid_phrase_ignores_late_completion() {
    let host = Arc::new(ScriptedHost::manual());
    let session = session_with(&host, test_config());
    let mut events = session.subscribe();

    session.start("One. Two. Three.", Emotion::Focused, true);
    sleep_ms(50).await;
    assert_eq!(host.spoken_texts(), vec!["One"]);
    assert!(host.finish_current());

    sleep_ms(5000).await;
    assert_eq!(session.state(), PlaybackState::Speaking(1));
    assert_eq!(host.spoken_texts(), vec!["One", "Two"]);
    drain(&mut events);

    session.stop();
    assert_eq!(session.state(), PlaybackState::Idle);
    assert_eq!(
        drain(&mut events),
        vec![
            PlaybackEvent::StateChanged(PlaybackState::Idle),
            PlaybackEvent::Activity(Activity::Cleared)
        ]
    );
    assert!(host.cancels() >= 1);

    // The host's completion callback for "Two" arrives after the stop
    host.finish_current();
    sleep_ms(30_000).await;

    assert!(drain(&mut events).is_empty());
    assert_eq!(session.state(), PlaybackState::Idle);
    assert_eq!(host.spoken_texts(), vec!["One", "Two"]);
    assert_eq!(session.timer_reading().total_secs, 0);
}

#[tokio::test(start_paused = true)]
async fn stop_during_pause_cancels_the_next_phrase() {
    let host = Arc::new(ScriptedHost::auto(Duration::from_millis(1200)));
    let session = session_with(&host, test_config());
    let mut events = session.subscribe();

    session.start("One. Two.", Emotion::Calm, false);
    sleep_ms(2000).await;
    assert_eq!(session.state(), PlaybackState::Paused(0));

    session.stop();
    drain(&mut events);
    sleep_ms(10_000).await;

    assert!(drain(&mut events).is_empty());
    assert_eq!(host.spoken_texts(), vec!["One"]);
}

#[tokio::test(start_paused = true)]
async fn restart_cancels_previous_sequence() {
    let host = Arc::new(ScriptedHost::auto(Duration::from_millis(2500)));
    let session = session_with(&host, test_config());
    let mut events = session.subscribe();

    session.start("Alpha. Beta. Gamma.", Emotion::Calm, false);
    sleep_ms(1000).await;
    assert_eq!(session.state(), PlaybackState::Speaking(0));
    drain(&mut events);

    session.start("Delta. Echo.", Emotion::Emotional, false);
    sleep_ms(30_000).await;

    assert_eq!(host.spoken_texts(), vec!["Alpha", "Delta", "Echo"]);
    assert_eq!(session.state(), PlaybackState::Complete);
    assert_eq!(
        states(&drain(&mut events)),
        vec![
            PlaybackState::AwaitingVoices,
            PlaybackState::Speaking(0),
            PlaybackState::Paused(0),
            PlaybackState::Speaking(1),
            PlaybackState::Complete,
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn host_error_aborts_remaining_phrases() {
    let host = Arc::new(ScriptedHost::auto(Duration::from_millis(1000)).failing_on("Two"));
    let session = session_with(&host, test_config());
    let mut events = session.subscribe();

    session.start("One. Two. Three.", Emotion::Overwhelmed, false);
    sleep_ms(30_000).await;

    assert_eq!(session.state(), PlaybackState::Idle);
    assert_eq!(host.spoken_texts(), vec!["One", "Two"]);

    let events = drain(&mut events);
    assert_eq!(
        states(&events),
        vec![
            PlaybackState::AwaitingVoices,
            PlaybackState::Speaking(0),
            PlaybackState::Paused(0),
            PlaybackState::Speaking(1),
            PlaybackState::Idle,
        ]
    );
    let tail = &events[events.len() - 2..];
    assert_eq!(
        tail,
        &[
            PlaybackEvent::Activity(Activity::Cleared),
            PlaybackEvent::Emotion(Emotion::Calm)
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn empty_text_completes_immediately() {
    let host = Arc::new(ScriptedHost::auto(Duration::from_millis(1000)));
    let session = session_with(&host, test_config());

    for text in ["", "...", " ?! "] {
        let mut events = session.subscribe();
        session.start(text, Emotion::Calm, true);
        sleep_ms(500).await;

        assert_eq!(session.state(), PlaybackState::Complete, "text: {text:?}");
        assert_eq!(
            states(&drain(&mut events)),
            vec![PlaybackState::AwaitingVoices, PlaybackState::Complete]
        );
    }
    assert!(host.spoken().is_empty());
}

#[tokio::test(start_paused = true)]
async fn disabled_or_unavailable_is_a_no_op() {
    let host = Arc::new(ScriptedHost::auto(Duration::from_millis(1000)));
    let config = SpeechConfig {
        enabled: false,
        ..test_config()
    };
    let session = session_with(&host, config);
    let mut events = session.subscribe();
    assert!(!session.start("Hello.", Emotion::Calm, true));
    sleep_ms(5000).await;
    assert_eq!(session.state(), PlaybackState::Idle);
    assert!(drain(&mut events).is_empty());

    let host = Arc::new(ScriptedHost::auto(Duration::from_millis(1000)).unavailable());
    let session = session_with(&host, test_config());
    assert!(!session.start("Hello.", Emotion::Calm, false));
    sleep_ms(5000).await;
    assert_eq!(session.state(), PlaybackState::Idle);
    assert!(host.spoken().is_empty());
}

#[tokio::test(start_paused = true)]
async fn stop_when_idle_is_silent() {
    let host = Arc::new(ScriptedHost::auto(Duration::from_millis(1000)));
    let session = session_with(&host, test_config());
    let mut events = session.subscribe();

    session.stop();
    session.stop();
    assert!(drain(&mut events).is_empty());
    assert_eq!(host.cancels(), 0);
}

#[tokio::test(start_paused = true)]
async fn waits_for_voice_catalogue() {
    let host = Arc::new(ScriptedHost::auto(Duration::from_millis(1000)).empty_polls(3));
    let session = session_with(&host, test_config());

    session.start("Hello.", Emotion::Calm, false);
    sleep_ms(50).await;
    assert_eq!(session.state(), PlaybackState::AwaitingVoices);

    // 100 + 200 + 400ms of backoff, then one second of speech
    sleep_ms(3000).await;
    assert_eq!(session.state(), PlaybackState::Complete);
    let spoken = host.spoken();
    assert_eq!(spoken[0].voice, Some(VoiceDescriptor::new("Daniel", "en-GB")));
}

#[tokio::test(start_paused = true)]
async fn gives_up_on_voices_and_uses_host_default() {
    let host = Arc::new(ScriptedHost::auto(Duration::from_millis(1000)).empty_polls(u32::MAX));
    let config = SpeechConfig {
        voice_poll_max_attempts: 4,
        ..test_config()
    };
    let session = session_with(&host, config);

    session.start("Hello.", Emotion::Calm, false);
    sleep_ms(10_000).await;

    assert_eq!(session.state(), PlaybackState::Complete);
    assert_eq!(host.spoken()[0].voice, None);
}

#[tokio::test(start_paused = true)]
async fn utterances_use_slow_delivery() {
    let host = Arc::new(
        ScriptedHost::auto(Duration::from_millis(500))
            .with_voices(vec![VoiceDescriptor::new("Google UK English Female", "en-GB")]),
    );
    let session = session_with(&host, test_config());

    session.start("**Slowly** now... pause.", Emotion::Calm, false);
    sleep_ms(2000).await;

    let spoken = host.spoken();
    assert_eq!(spoken.len(), 1);
    let u = &spoken[0];
    assert_eq!(u.text, "Slowly now");
    assert_eq!(u.rate, 0.15);
    assert_eq!(u.volume, 0.8);
    // "female" contains the "male" keyword; pitch drops further for it
    assert_eq!(u.pitch, 0.4);
}
