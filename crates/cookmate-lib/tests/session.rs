//! Narration session integration tests
//!
//! Drives a real session task with mock speech capabilities on paused time.

use cookmate_lib::cookmate_core::narration::{
    COMPLETED, DEFAULT_PROMPT, FIRST_STEP, HELP, LAST_STEP, STOPPING,
};
use cookmate_lib::cookmate_core::navigator::NarrationError;
use cookmate_lib::console::ConsoleRecognizer;
use cookmate_lib::cookmate_core::types::{NavigatorConfig, Recipe};
use cookmate_lib::session::NarrationHandle;
use cookmate_lib::speech::RecognitionError;
use tokio::sync::mpsc;

mod common;
use common::{
    Harness, MockSynth, MockView, fail_window, finish_speaking, last_spoken, pasta, say, settle,
    spoken, window_open, windows_opened,
};

#[tokio::test(start_paused = true)]
async fn test_walkthrough_next_back_repeat_stop() {
    let h = Harness::new();
    h.narrator.start(pasta()).await.unwrap();
    settle(10).await;

    // Introduction first, listening immediately, nothing highlighted yet.
    let intro = last_spoken(&h.synth).unwrap();
    assert!(intro.starts_with("Starting voice mode for Simple Pasta."));
    assert!(window_open(&h.mic));
    assert_eq!(h.active_step(), None);
    assert_eq!(h.view.lock().unwrap().steps.len(), 3);

    // Step 1 after the settle delay.
    settle(4_000).await;
    assert_eq!(last_spoken(&h.synth).as_deref(), Some("Step 1. Boil water."));
    assert_eq!(h.active_step(), Some(0));

    say(&h.mic, "next please");
    settle(10).await;
    assert_eq!(last_spoken(&h.synth).as_deref(), Some("Step 2. Add pasta."));
    assert_eq!(h.active_step(), Some(1));
    assert_eq!(h.narrator.status().status_line, "Heard: next please");

    say(&h.mic, "go back");
    settle(10).await;
    assert_eq!(last_spoken(&h.synth).as_deref(), Some("Step 1. Boil water."));
    assert_eq!(h.active_step(), Some(0));

    say(&h.mic, "back");
    settle(10).await;
    assert_eq!(last_spoken(&h.synth).as_deref(), Some(FIRST_STEP));
    assert_eq!(h.active_step(), Some(0));

    say(&h.mic, "say that again");
    settle(10).await;
    assert_eq!(last_spoken(&h.synth).as_deref(), Some("Step 1. Boil water."));

    say(&h.mic, "next");
    settle(10).await;
    say(&h.mic, "continue");
    settle(10).await;
    assert_eq!(last_spoken(&h.synth).as_deref(), Some("Step 3. Drain and serve."));
    assert_eq!(h.narrator.status().current_step, Some(2));

    say(&h.mic, "next");
    settle(10).await;
    assert_eq!(last_spoken(&h.synth).as_deref(), Some(LAST_STEP));
    assert_eq!(h.narrator.status().current_step, Some(2));

    say(&h.mic, "stop");
    settle(10).await;
    assert_eq!(last_spoken(&h.synth).as_deref(), Some(STOPPING));
    assert!(h.narrator.status().active, "stop waits for the notice to play");

    settle(1_500).await;
    let status = h.narrator.status();
    assert!(!status.active);
    assert!(!status.listening);
    assert_eq!(status.current_step, None);
    assert_eq!(h.active_step(), None);
    assert!(!window_open(&h.mic));
    assert!(!spoken(&h.synth).iter().any(|s| s == COMPLETED));
}

#[tokio::test(start_paused = true)]
async fn test_commands_before_first_step_navigate_from_step_one() {
    let h = Harness::new();
    h.narrator.start(pasta()).await.unwrap();
    settle(10).await;

    say(&h.mic, "next");
    settle(10).await;
    assert_eq!(last_spoken(&h.synth).as_deref(), Some("Step 2. Add pasta."));

    // The settle timer still reads the current step when it fires.
    settle(4_000).await;
    assert_eq!(last_spoken(&h.synth).as_deref(), Some("Step 2. Add pasta."));
    assert_eq!(h.active_step(), Some(1));
}

#[tokio::test(start_paused = true)]
async fn test_help_and_unrecognized_speech() {
    let h = Harness::new();
    h.narrator.start(pasta()).await.unwrap();
    settle(4_010).await;
    let before = spoken(&h.synth).len();

    say(&h.mic, "how long do I boil it");
    settle(10).await;
    assert_eq!(spoken(&h.synth).len(), before, "free text is ignored");
    assert_eq!(h.narrator.status().status_line, DEFAULT_PROMPT);
    assert!(window_open(&h.mic), "listening resumes after any utterance");

    say(&h.mic, "help");
    settle(10).await;
    assert_eq!(last_spoken(&h.synth).as_deref(), Some(HELP));
    assert_eq!(h.active_step(), Some(0));
}

#[tokio::test(start_paused = true)]
async fn test_status_line_reverts() {
    let h = Harness::new();
    h.narrator.start(pasta()).await.unwrap();
    settle(4_010).await;

    say(&h.mic, "repeat");
    settle(10).await;
    assert_eq!(h.narrator.status().status_line, "Heard: repeat");

    settle(2_000).await;
    say(&h.mic, "next");
    settle(10).await;
    assert_eq!(h.narrator.status().status_line, "Heard: next");

    // The first revert is superseded by the second feedback.
    settle(1_500).await;
    assert_eq!(h.narrator.status().status_line, "Heard: next");

    settle(1_600).await;
    assert_eq!(h.narrator.status().status_line, DEFAULT_PROMPT);
}

#[tokio::test(start_paused = true)]
async fn test_start_refused_without_synthesizer() {
    let h = Harness::with_capabilities(false, true);
    let err = h.narrator.start(pasta()).await.unwrap_err();
    assert_eq!(err, NarrationError::SynthesizerUnavailable);
    settle(10).await;

    let status = h.narrator.status();
    assert!(!status.active);
    assert_eq!(status.status_line, "speech synthesis is not available");
    assert!(spoken(&h.synth).is_empty());
    assert_eq!(windows_opened(&h.mic), 0);
}

#[tokio::test(start_paused = true)]
async fn test_start_refused_without_recognizer() {
    let h = Harness::with_capabilities(true, false);
    let err = h.narrator.start(pasta()).await.unwrap_err();
    assert_eq!(err, NarrationError::RecognizerUnavailable);
    assert!(spoken(&h.synth).is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_start_refused_for_empty_recipe() {
    let h = Harness::new();
    let err = h
        .narrator
        .start(Recipe::new("empty", "Nothing", vec![]))
        .await
        .unwrap_err();
    assert_eq!(err, NarrationError::EmptyRecipe);
    assert!(!h.narrator.status().active);
}

#[tokio::test(start_paused = true)]
async fn test_failed_start_keeps_running_session() {
    let h = Harness::new();
    h.narrator.start(pasta()).await.unwrap();
    settle(4_010).await;

    let err = h
        .narrator
        .start(Recipe::new("empty", "Nothing", vec![]))
        .await
        .unwrap_err();
    assert_eq!(err, NarrationError::EmptyRecipe);
    let status = h.narrator.status();
    assert!(status.active);
    assert_eq!(status.recipe_id.as_deref(), Some("pasta-1"));
}

#[tokio::test(start_paused = true)]
async fn test_stop_is_idempotent() {
    let h = Harness::new();
    h.narrator.stop();
    settle(10).await;
    assert!(!h.narrator.status().active);

    h.narrator.start(pasta()).await.unwrap();
    settle(10).await;
    h.narrator.stop();
    h.narrator.stop();
    settle(10).await;

    assert!(!h.narrator.status().active);
    assert!(!window_open(&h.mic));
    let spoken_count = spoken(&h.synth).len();

    // The pending settle timer belongs to the stopped session.
    settle(5_000).await;
    assert_eq!(spoken(&h.synth).len(), spoken_count);
    assert_eq!(h.active_step(), None);
}

#[tokio::test(start_paused = true)]
async fn test_restart_discards_stale_timers() {
    let h = Harness::new();
    h.narrator.start(pasta()).await.unwrap();
    settle(2_000).await;

    let soup = Recipe::new("soup-1", "Soup", vec!["Chop onions.".into(), "Simmer.".into()]);
    h.narrator.start(soup).await.unwrap();
    settle(10).await;
    assert!(last_spoken(&h.synth).unwrap().contains("Soup"));
    assert_eq!(h.narrator.status().recipe_id.as_deref(), Some("soup-1"));

    // The first session's settle timer fires here and is ignored.
    settle(2_100).await;
    assert!(last_spoken(&h.synth).unwrap().contains("Soup"));
    assert_eq!(h.active_step(), None);

    settle(2_000).await;
    assert_eq!(last_spoken(&h.synth).as_deref(), Some("Step 1. Chop onions."));
    assert_eq!(h.active_step(), Some(0));
}

#[tokio::test(start_paused = true)]
async fn test_stop_during_stopping_notice() {
    let h = Harness::new();
    h.narrator.start(pasta()).await.unwrap();
    settle(4_010).await;

    say(&h.mic, "exit");
    settle(10).await;
    h.narrator.stop();
    settle(10).await;
    assert!(!h.narrator.status().active);

    // A new session started before the old stop timer fires survives it.
    h.narrator.start(pasta()).await.unwrap();
    settle(2_000).await;
    assert!(h.narrator.status().active);
}

#[tokio::test(start_paused = true)]
async fn test_relistens_after_each_window() {
    let h = Harness::new();
    h.narrator.start(pasta()).await.unwrap();
    settle(10).await;
    assert_eq!(windows_opened(&h.mic), 1);

    fail_window(&h.mic, RecognitionError::NoSpeech);
    settle(10).await;
    assert_eq!(windows_opened(&h.mic), 2, "silence relistens at once");

    fail_window(&h.mic, RecognitionError::Capture("device busy".into()));
    settle(10).await;
    assert_eq!(windows_opened(&h.mic), 2, "failure backs off");
    assert!(!h.narrator.status().listening);

    settle(500).await;
    assert_eq!(windows_opened(&h.mic), 3);
    assert!(h.narrator.status().listening);
}

#[tokio::test(start_paused = true)]
async fn test_no_relisten_after_stop() {
    let h = Harness::new();
    h.narrator.start(pasta()).await.unwrap();
    settle(10).await;
    fail_window(&h.mic, RecognitionError::Transcription("server down".into()));
    settle(10).await;
    h.narrator.stop();
    settle(1_000).await;
    assert_eq!(windows_opened(&h.mic), 1);
}

#[tokio::test(start_paused = true)]
async fn test_one_utterance_at_a_time() {
    let h = Harness::new();
    h.narrator.start(pasta()).await.unwrap();
    settle(10).await;
    assert!(h.narrator.status().speaking);
    assert_eq!(h.synth.lock().unwrap().cancels, 0);

    // Step 1 supersedes the still-playing introduction.
    settle(4_000).await;
    assert_eq!(h.synth.lock().unwrap().cancels, 1);
    assert!(h.narrator.status().speaking);

    finish_speaking(&h.synth);
    settle(10).await;
    assert!(!h.narrator.status().speaking);

    say(&h.mic, "next");
    settle(10).await;
    assert_eq!(h.synth.lock().unwrap().cancels, 1, "nothing left to cancel");
}

#[tokio::test(start_paused = true)]
async fn test_external_transcripts() {
    let h = Harness::new();
    h.narrator.handle_transcript("next");
    settle(10).await;
    assert!(spoken(&h.synth).is_empty(), "ignored while inactive");

    h.narrator.start(pasta()).await.unwrap();
    settle(4_010).await;
    h.narrator.handle_transcript("NEXT step please");
    settle(10).await;
    assert_eq!(last_spoken(&h.synth).as_deref(), Some("Step 2. Add pasta."));
}

#[tokio::test(start_paused = true)]
async fn test_status_snapshot() {
    let h = Harness::new();
    let mut updates = h.narrator.subscribe_status();
    h.narrator.start(pasta()).await.unwrap();
    updates.changed().await.unwrap();

    settle(4_010).await;
    let status = h.narrator.status();
    assert!(status.active);
    assert_eq!(status.recipe_title.as_deref(), Some("Simple Pasta"));
    assert_eq!(status.step_count, 3);
    assert_eq!(status.current_step, Some(0));
    assert!(status.listening);
}

#[tokio::test(start_paused = true)]
async fn test_closed_typed_input_stops_once() {
    let (synth, synth_log) = MockSynth::new(true);
    let (view, _) = MockView::new();
    let (lines_tx, lines_rx) = mpsc::unbounded_channel::<String>();
    drop(lines_tx);
    let narrator = NarrationHandle::spawn(
        NavigatorConfig::default(),
        Box::new(synth),
        Box::new(ConsoleRecognizer::from_lines(lines_rx)),
        Box::new(view),
    );

    narrator.start(pasta()).await.unwrap();
    settle(10).await;
    assert_eq!(last_spoken(&synth_log).as_deref(), Some(STOPPING));
    assert!(narrator.status().active);

    settle(2_000).await;
    let notices = spoken(&synth_log).iter().filter(|s| *s == STOPPING).count();
    assert_eq!(notices, 1);
    assert_eq!(spoken(&synth_log).len(), 2, "introduction, then one notice");
    assert!(!narrator.status().active);
}

#[tokio::test(start_paused = true)]
async fn test_speech_heard_while_speaking_can_be_ignored() {
    let h = Harness::with_config(NavigatorConfig {
        ignore_while_speaking: true,
        ..Default::default()
    });
    h.narrator.start(pasta()).await.unwrap();
    settle(10).await;
    assert!(h.narrator.status().speaking);

    // The microphone picks up the introduction's "next".
    say(&h.mic, "say next, repeat, back, or stop");
    settle(10).await;
    assert_eq!(spoken(&h.synth).len(), 1);
    assert_eq!(h.narrator.status().current_step, Some(0));
    assert!(window_open(&h.mic), "listening continues");

    finish_speaking(&h.synth);
    settle(10).await;
    say(&h.mic, "next");
    settle(10).await;
    assert_eq!(last_spoken(&h.synth).as_deref(), Some("Step 2. Add pasta."));
}
