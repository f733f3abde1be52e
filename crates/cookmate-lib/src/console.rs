//! Terminal stand-ins for the speech capabilities.
//!
//! `ConsoleRecognizer` treats each typed line as one utterance and
//! `ConsoleSynthesizer` prints instead of speaking, so narration works
//! without a microphone, speakers or speech servers.

use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{mpsc, oneshot, Mutex};
use tracing::debug;

use crate::speech::{
    RecognitionError, Recognizer, RecognizerEvent, StepView, SynthEvent, Synthesizer, Utterance,
};

/// Spoken pace the console synthesizer pretends to talk at.
const MS_PER_WORD: u64 = 350;

/// Transcript sent when input ends, so a closed stdin ends the session.
const END_OF_INPUT: &str = "stop";

// ─── Recognizer ────────────────────────────────────────────────────────────

pub struct ConsoleRecognizer {
    lines: Arc<Mutex<mpsc::UnboundedReceiver<String>>>,
    /// Set once the end of input has been reported.
    exhausted: Arc<AtomicBool>,
    cancel: Option<oneshot::Sender<()>>,
}

impl ConsoleRecognizer {
    /// Read utterances from standard input.
    pub fn stdin() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            let mut lines = BufReader::new(tokio::io::stdin()).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        if tx.send(line).is_err() {
                            break;
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        debug!("console: stdin error: {e}");
                        break;
                    }
                }
            }
        });
        Self::from_lines(rx)
    }

    /// Read utterances from a channel. The sender closing counts as end of
    /// input.
    pub fn from_lines(lines: mpsc::UnboundedReceiver<String>) -> Self {
        Self {
            lines: Arc::new(Mutex::new(lines)),
            exhausted: Arc::new(AtomicBool::new(false)),
            cancel: None,
        }
    }
}

impl Recognizer for ConsoleRecognizer {
    fn available(&self) -> bool {
        true
    }

    fn listen(&mut self, events: mpsc::UnboundedSender<RecognizerEvent>) {
        self.stop();
        let (cancel_tx, mut cancel_rx) = oneshot::channel();
        self.cancel = Some(cancel_tx);

        let lines = self.lines.clone();
        let exhausted = self.exhausted.clone();
        tokio::spawn(async move {
            // Input already ended: the window stays silent until stopped.
            if exhausted.load(Ordering::Acquire) {
                let _ = cancel_rx.await;
                let _ = events.send(RecognizerEvent::Error(RecognitionError::Aborted));
                let _ = events.send(RecognizerEvent::Ended);
                return;
            }

            let mut lines = lines.lock().await;
            let event = tokio::select! {
                line = lines.recv() => match line {
                    Some(line) if line.trim().is_empty() => {
                        RecognizerEvent::Error(RecognitionError::NoSpeech)
                    }
                    Some(line) => RecognizerEvent::Transcript(line.trim().to_string()),
                    None if exhausted.swap(true, Ordering::AcqRel) => {
                        drop(lines);
                        let _ = (&mut cancel_rx).await;
                        RecognizerEvent::Error(RecognitionError::Aborted)
                    }
                    None => {
                        debug!("console: end of input");
                        RecognizerEvent::Transcript(END_OF_INPUT.into())
                    }
                },
                _ = &mut cancel_rx => RecognizerEvent::Error(RecognitionError::Aborted),
            };
            let _ = events.send(event);
            let _ = events.send(RecognizerEvent::Ended);
        });
    }

    fn stop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            let _ = cancel.send(());
        }
    }
}

// ─── Synthesizer ───────────────────────────────────────────────────────────

/// Prints utterances and reports them finished after a reading-pace delay.
#[derive(Debug, Default)]
pub struct ConsoleSynthesizer;

impl ConsoleSynthesizer {
    pub fn new() -> Self {
        Self
    }
}

/// How long `text` would take to say at `rate`.
fn speaking_time(text: &str, rate: f32) -> Duration {
    let words = text.split_whitespace().count() as u64;
    let rate = if rate > 0.0 { rate } else { 1.0 };
    Duration::from_millis(((words * MS_PER_WORD) as f32 / rate).round() as u64)
}

impl Synthesizer for ConsoleSynthesizer {
    fn available(&self) -> bool {
        true
    }

    fn speak(&mut self, utterance: Utterance, done: mpsc::UnboundedSender<SynthEvent>) {
        println!("🔊 {}", utterance.text);
        let _ = std::io::stdout().flush();
        let delay = speaking_time(&utterance.text, utterance.params.rate);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = done.send(SynthEvent::Finished(utterance.id));
        });
    }

    fn cancel_all(&mut self) {}
}

// ─── View ──────────────────────────────────────────────────────────────────

/// Step list rendered to the terminal.
#[derive(Debug, Default)]
pub struct TerminalView {
    steps: Vec<String>,
    active: Option<usize>,
}

impl TerminalView {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StepView for TerminalView {
    fn show_steps(&mut self, title: &str, steps: &[String]) {
        self.steps = steps.to_vec();
        self.active = None;
        println!("\n{title}");
        for (i, step) in steps.iter().enumerate() {
            println!("  {:>2}. {step}", i + 1);
        }
        println!();
    }

    fn set_active_step(&mut self, index: usize) {
        if self.active == Some(index) {
            return;
        }
        self.active = Some(index);
        if let Some(step) = self.steps.get(index) {
            println!("▶ Step {} of {}: {step}", index + 1, self.steps.len());
        }
    }

    fn clear_active(&mut self) {
        self.active = None;
    }

    fn set_status(&mut self, text: &str) {
        println!("  [{text}]");
    }
}
