//! Mock speech capabilities shared by the integration tests.

#![allow(dead_code)]

pub mod backend;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use cookmate_lib::cookmate_core::types::{NavigatorConfig, Recipe};
use cookmate_lib::session::NarrationHandle;
use cookmate_lib::speech::{
    RecognitionError, Recognizer, RecognizerEvent, StepView, SynthEvent, Synthesizer, Utterance,
};
use tokio::sync::mpsc;

// ─── Synthesizer ───────────────────────────────────────────────────────────

#[derive(Default)]
pub struct SynthLog {
    pub spoken: Vec<String>,
    pub cancels: usize,
    pending: Option<(u64, mpsc::UnboundedSender<SynthEvent>)>,
}

/// Records utterances. Nothing finishes until the test says so.
pub struct MockSynth {
    available: bool,
    log: Arc<Mutex<SynthLog>>,
}

impl MockSynth {
    pub fn new(available: bool) -> (Self, Arc<Mutex<SynthLog>>) {
        let log = Arc::new(Mutex::new(SynthLog::default()));
        (
            Self {
                available,
                log: log.clone(),
            },
            log,
        )
    }
}

impl Synthesizer for MockSynth {
    fn available(&self) -> bool {
        self.available
    }

    fn speak(&mut self, utterance: Utterance, done: mpsc::UnboundedSender<SynthEvent>) {
        let mut log = self.log.lock().unwrap();
        log.spoken.push(utterance.text);
        log.pending = Some((utterance.id, done));
    }

    fn cancel_all(&mut self) {
        let mut log = self.log.lock().unwrap();
        log.cancels += 1;
        if let Some((id, done)) = log.pending.take() {
            let _ = done.send(SynthEvent::Finished(id));
        }
    }
}

/// Report the pending utterance as finished.
pub fn finish_speaking(log: &Arc<Mutex<SynthLog>>) {
    if let Some((id, done)) = log.lock().unwrap().pending.take() {
        let _ = done.send(SynthEvent::Finished(id));
    }
}

pub fn spoken(log: &Arc<Mutex<SynthLog>>) -> Vec<String> {
    log.lock().unwrap().spoken.clone()
}

pub fn last_spoken(log: &Arc<Mutex<SynthLog>>) -> Option<String> {
    log.lock().unwrap().spoken.last().cloned()
}

// ─── Recognizer ────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct MicLog {
    pub windows_opened: usize,
    pub stops: usize,
    open: Option<mpsc::UnboundedSender<RecognizerEvent>>,
}

/// Holds the open listening window so the test can speak into it.
pub struct MockMic {
    available: bool,
    log: Arc<Mutex<MicLog>>,
}

impl MockMic {
    pub fn new(available: bool) -> (Self, Arc<Mutex<MicLog>>) {
        let log = Arc::new(Mutex::new(MicLog::default()));
        (
            Self {
                available,
                log: log.clone(),
            },
            log,
        )
    }
}

impl Recognizer for MockMic {
    fn available(&self) -> bool {
        self.available
    }

    fn listen(&mut self, events: mpsc::UnboundedSender<RecognizerEvent>) {
        let mut log = self.log.lock().unwrap();
        log.windows_opened += 1;
        log.open = Some(events);
    }

    fn stop(&mut self) {
        let mut log = self.log.lock().unwrap();
        log.stops += 1;
        if let Some(events) = log.open.take() {
            let _ = events.send(RecognizerEvent::Error(RecognitionError::Aborted));
            let _ = events.send(RecognizerEvent::Ended);
        }
    }
}

/// Deliver `text` through the open window and close it.
pub fn say(log: &Arc<Mutex<MicLog>>, text: &str) {
    let events = log.lock().unwrap().open.take().expect("no open listening window");
    events.send(RecognizerEvent::Transcript(text.into())).unwrap();
    events.send(RecognizerEvent::Ended).unwrap();
}

/// Fail the open window.
pub fn fail_window(log: &Arc<Mutex<MicLog>>, error: RecognitionError) {
    let events = log.lock().unwrap().open.take().expect("no open listening window");
    events.send(RecognizerEvent::Error(error)).unwrap();
    events.send(RecognizerEvent::Ended).unwrap();
}

pub fn windows_opened(log: &Arc<Mutex<MicLog>>) -> usize {
    log.lock().unwrap().windows_opened
}

pub fn window_open(log: &Arc<Mutex<MicLog>>) -> bool {
    log.lock().unwrap().open.is_some()
}

// ─── View ──────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct ViewLog {
    pub title: Option<String>,
    pub steps: Vec<String>,
    pub active: Option<usize>,
    pub statuses: Vec<String>,
}

pub struct MockView(Arc<Mutex<ViewLog>>);

impl MockView {
    pub fn new() -> (Self, Arc<Mutex<ViewLog>>) {
        let log = Arc::new(Mutex::new(ViewLog::default()));
        (Self(log.clone()), log)
    }
}

impl StepView for MockView {
    fn show_steps(&mut self, title: &str, steps: &[String]) {
        let mut log = self.0.lock().unwrap();
        log.title = Some(title.to_string());
        log.steps = steps.to_vec();
    }

    fn set_active_step(&mut self, index: usize) {
        self.0.lock().unwrap().active = Some(index);
    }

    fn clear_active(&mut self) {
        self.0.lock().unwrap().active = None;
    }

    fn set_status(&mut self, text: &str) {
        self.0.lock().unwrap().statuses.push(text.to_string());
    }
}

// ─── Harness ───────────────────────────────────────────────────────────────

pub struct Harness {
    pub narrator: NarrationHandle,
    pub synth: Arc<Mutex<SynthLog>>,
    pub mic: Arc<Mutex<MicLog>>,
    pub view: Arc<Mutex<ViewLog>>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_capabilities(true, true)
    }

    pub fn with_capabilities(synth_available: bool, mic_available: bool) -> Self {
        Self::build(NavigatorConfig::default(), synth_available, mic_available)
    }

    pub fn with_config(config: NavigatorConfig) -> Self {
        Self::build(config, true, true)
    }

    fn build(config: NavigatorConfig, synth_available: bool, mic_available: bool) -> Self {
        let (synth, synth_log) = MockSynth::new(synth_available);
        let (mic, mic_log) = MockMic::new(mic_available);
        let (view, view_log) = MockView::new();
        let narrator = NarrationHandle::spawn(
            config,
            Box::new(synth),
            Box::new(mic),
            Box::new(view),
        );
        Self {
            narrator,
            synth: synth_log,
            mic: mic_log,
            view: view_log,
        }
    }

    pub fn active_step(&self) -> Option<usize> {
        self.view.lock().unwrap().active
    }
}

pub fn pasta() -> Recipe {
    Recipe::new(
        "pasta-1",
        "Simple Pasta",
        vec![
            "Boil water.".into(),
            "Add pasta.".into(),
            "Drain and serve.".into(),
        ],
    )
}

/// Let the session task drain its queues. Time is paused in these tests, so
/// this only advances the clock by `ms`.
pub async fn settle(ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
}
