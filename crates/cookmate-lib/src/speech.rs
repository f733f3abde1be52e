//! Speech capabilities the narration session drives.
//!
//! The session owns one synthesizer, one recognizer and one step view.
//! Backends report asynchronously over the channels handed to them.

use tokio::sync::mpsc;
use tracing::debug;

use cookmate_core::types::{RecognizerSettings, SpeechParams};

pub type UtteranceId = u64;

/// One request to the synthesizer.
#[derive(Debug, Clone, PartialEq)]
pub struct Utterance {
    pub id: UtteranceId,
    pub text: String,
    pub params: SpeechParams,
}

/// Synthesizer completion report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SynthEvent {
    /// The utterance finished playing, failed, or was cancelled.
    Finished(UtteranceId),
}

pub trait Synthesizer: Send {
    /// Whether speech output works in this environment.
    fn available(&self) -> bool;

    /// Start speaking. Report `Finished(id)` on `done` once playback ends.
    fn speak(&mut self, utterance: Utterance, done: mpsc::UnboundedSender<SynthEvent>);

    /// Stop any in-progress utterance immediately.
    fn cancel_all(&mut self);
}

/// Why a listening window produced no transcript.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecognitionError {
    /// The window closed without detecting speech.
    NoSpeech,
    /// Listening was stopped before an utterance completed.
    Aborted,
    /// Microphone or input failure.
    Capture(String),
    /// The transcription backend failed.
    Transcription(String),
}

impl RecognitionError {
    /// Failures worth backing off for before listening again.
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Capture(_) | Self::Transcription(_))
    }
}

/// Events from one listening window. Every window ends with exactly one
/// `Ended`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecognizerEvent {
    Transcript(String),
    Error(RecognitionError),
    Ended,
}

pub trait Recognizer: Send {
    /// Whether speech input works in this environment.
    fn available(&self) -> bool;

    /// Apply session settings. Called once per session start.
    fn configure(&mut self, _settings: &RecognizerSettings) {}

    /// Open one listening window reporting on `events`.
    fn listen(&mut self, events: mpsc::UnboundedSender<RecognizerEvent>);

    /// Close the open window, if any.
    fn stop(&mut self);
}

/// Host view presenting the recipe's steps.
pub trait StepView: Send {
    fn show_steps(&mut self, title: &str, steps: &[String]);

    /// Mark `index` active and every other step inactive.
    fn set_active_step(&mut self, index: usize);

    fn clear_active(&mut self);

    fn set_status(&mut self, text: &str);
}

/// Recognizer for hosts that run recognition themselves and push
/// transcripts through
/// [`NarrationHandle::handle_transcript`](crate::session::NarrationHandle::handle_transcript).
///
/// Its listening window stays open until stopped.
#[derive(Default)]
pub struct ExternalRecognizer {
    open: Option<mpsc::UnboundedSender<RecognizerEvent>>,
}

impl ExternalRecognizer {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Recognizer for ExternalRecognizer {
    fn available(&self) -> bool {
        true
    }

    fn listen(&mut self, events: mpsc::UnboundedSender<RecognizerEvent>) {
        debug!("external recognizer: window open");
        self.open = Some(events);
    }

    fn stop(&mut self) {
        if let Some(events) = self.open.take() {
            let _ = events.send(RecognizerEvent::Ended);
        }
    }
}

/// View that discards everything, for headless sessions.
#[derive(Debug, Default)]
pub struct NullView;

impl StepView for NullView {
    fn show_steps(&mut self, _title: &str, _steps: &[String]) {}
    fn set_active_step(&mut self, _index: usize) {}
    fn clear_active(&mut self) {}
    fn set_status(&mut self, _text: &str) {}
}
