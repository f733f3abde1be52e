//! Narration session: drives a [`StepNavigator`] from one tokio task.
//!
//! ```text
//! NarrationHandle ──[Cmd]──────────┐
//! listening window ──[forwarder]───┤
//! timers ──[Internal]──────────────┼─→ session task: StepNavigator → Actions
//! synthesizer ──[SynthEvent]───────┘        → synthesizer / recognizer / view
//! ```
//!
//! All state lives on the session task, so commands, recognizer results,
//! synthesis completions and timers are handled strictly one at a time.
//!
//! Epoch-based cancellation: every stop bumps the epoch and timers carry
//! the epoch they were scheduled in, so a delayed "read step 1" or "stop"
//! from an earlier session is discarded when it fires. Recognizer events
//! carry their listening window id and are dropped unless that window is
//! still the open one.
//!
//! Dropping every [`NarrationHandle`] stops the session and ends the task.

use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, info, warn};

use cookmate_core::narration::DEFAULT_PROMPT;
use cookmate_core::navigator::{Action, NarrationError, StepNavigator, Timer};
use cookmate_core::types::{NavigatorConfig, NavigatorStatus, Recipe};

use crate::speech::{
    RecognitionError, Recognizer, RecognizerEvent, StepView, SynthEvent, Synthesizer, Utterance,
    UtteranceId,
};

/// Cloneable handle to a narration session. All methods except
/// [`start`](Self::start) are non-blocking.
#[derive(Clone)]
pub struct NarrationHandle {
    cmd_tx: mpsc::UnboundedSender<Cmd>,
    status_rx: watch::Receiver<NavigatorStatus>,
}

// ─── Internal types ────────────────────────────────────────────────────────

enum Cmd {
    Start {
        recipe: Recipe,
        reply: oneshot::Sender<Result<(), NarrationError>>,
    },
    Stop,
    Transcript(String),
}

enum Internal {
    Timer { epoch: u64, timer: Timer },
    StatusRevert { generation: u64 },
    Recognizer { window: u64, event: RecognizerEvent },
}

// ─── Handle ────────────────────────────────────────────────────────────────

impl NarrationHandle {
    /// Spawn the session task. Must be called from within a tokio runtime.
    pub fn spawn(
        config: NavigatorConfig,
        synthesizer: Box<dyn Synthesizer>,
        recognizer: Box<dyn Recognizer>,
        view: Box<dyn StepView>,
    ) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (internal_tx, internal_rx) = mpsc::unbounded_channel();
        let (synth_tx, synth_rx) = mpsc::unbounded_channel();
        let (status_tx, status_rx) = watch::channel(NavigatorStatus {
            status_line: DEFAULT_PROMPT.into(),
            ..Default::default()
        });

        let session = Session {
            config,
            navigator: StepNavigator::new(),
            synthesizer,
            recognizer,
            view,
            status_tx,
            internal_tx,
            synth_tx,
            epoch: 0,
            next_utterance: 0,
            current_utterance: None,
            next_window: 0,
            open_window: None,
            window_failed: false,
            status_line: DEFAULT_PROMPT.into(),
            status_generation: 0,
        };
        tokio::spawn(session.run(cmd_rx, internal_rx, synth_rx));

        Self { cmd_tx, status_rx }
    }

    /// Start narrating `recipe`, replacing any running narration.
    ///
    /// Resolves once the session has accepted or refused the recipe. A
    /// refusal is also shown on the view's status line.
    pub async fn start(&self, recipe: Recipe) -> Result<(), NarrationError> {
        let (reply, reply_rx) = oneshot::channel();
        self.cmd_tx
            .send(Cmd::Start { recipe, reply })
            .map_err(|_| NarrationError::SessionClosed)?;
        reply_rx.await.unwrap_or(Err(NarrationError::SessionClosed))
    }

    /// Stop narration. Safe to call when nothing is running.
    pub fn stop(&self) {
        let _ = self.cmd_tx.send(Cmd::Stop);
    }

    /// Feed one recognized utterance, for hosts that do their own
    /// recognition.
    pub fn handle_transcript(&self, text: &str) {
        let _ = self.cmd_tx.send(Cmd::Transcript(text.to_string()));
    }

    /// Current status snapshot.
    pub fn status(&self) -> NavigatorStatus {
        self.status_rx.borrow().clone()
    }

    /// Subscribe to status changes.
    pub fn subscribe_status(&self) -> watch::Receiver<NavigatorStatus> {
        self.status_rx.clone()
    }
}

// ─── Session task ──────────────────────────────────────────────────────────

struct Session {
    config: NavigatorConfig,
    navigator: StepNavigator,
    synthesizer: Box<dyn Synthesizer>,
    recognizer: Box<dyn Recognizer>,
    view: Box<dyn StepView>,
    status_tx: watch::Sender<NavigatorStatus>,
    internal_tx: mpsc::UnboundedSender<Internal>,
    synth_tx: mpsc::UnboundedSender<SynthEvent>,
    epoch: u64,
    next_utterance: UtteranceId,
    /// Single slot: the utterance the synthesizer is working on.
    current_utterance: Option<UtteranceId>,
    next_window: u64,
    /// At most one listening window is open.
    open_window: Option<u64>,
    window_failed: bool,
    status_line: String,
    status_generation: u64,
}

impl Session {
    async fn run(
        mut self,
        mut cmd_rx: mpsc::UnboundedReceiver<Cmd>,
        mut internal_rx: mpsc::UnboundedReceiver<Internal>,
        mut synth_rx: mpsc::UnboundedReceiver<SynthEvent>,
    ) {
        loop {
            tokio::select! {
                cmd = cmd_rx.recv() => match cmd {
                    Some(cmd) => self.on_command(cmd),
                    None => {
                        debug!("session: all handles dropped");
                        self.stop();
                        break;
                    }
                },
                Some(event) = internal_rx.recv() => self.on_internal(event),
                Some(event) = synth_rx.recv() => self.on_synth(event),
            }
            self.publish();
        }
    }

    fn on_command(&mut self, cmd: Cmd) {
        match cmd {
            Cmd::Start { recipe, reply } => {
                let result = self.start(recipe);
                if let Err(e) = &result {
                    warn!("narration not started: {e}");
                    self.set_status(&e.to_string());
                }
                // Callers see the new status as soon as start() resolves.
                self.publish();
                let _ = reply.send(result);
            }
            Cmd::Stop => self.stop(),
            Cmd::Transcript(text) => self.step(|nav| nav.handle_transcript(&text)),
        }
    }

    fn start(&mut self, recipe: Recipe) -> Result<(), NarrationError> {
        if recipe.steps.is_empty() {
            return Err(NarrationError::EmptyRecipe);
        }
        if !self.synthesizer.available() {
            return Err(NarrationError::SynthesizerUnavailable);
        }
        if !self.recognizer.available() {
            return Err(NarrationError::RecognizerUnavailable);
        }

        self.stop();

        info!(
            "narration start: '{}' ({} steps)",
            recipe.display_name(),
            recipe.step_count()
        );
        self.recognizer.configure(&self.config.recognizer);
        self.view.show_steps(recipe.display_name(), &recipe.steps);
        let actions = self.navigator.start(recipe)?;
        self.apply(actions);
        Ok(())
    }

    fn stop(&mut self) {
        if self.navigator.is_active() {
            info!("narration stop");
        }
        self.step(StepNavigator::stop);
    }

    /// Run a navigator transition and carry out its actions. A transition
    /// that ends the session bumps the epoch first.
    fn step(&mut self, transition: impl FnOnce(&mut StepNavigator) -> Vec<Action>) {
        let was_active = self.navigator.is_active();
        let actions = transition(&mut self.navigator);
        if was_active && !self.navigator.is_active() {
            self.epoch += 1;
            debug!("session: epoch {}", self.epoch);
        }
        self.apply(actions);
    }

    fn apply(&mut self, actions: Vec<Action>) {
        for action in actions {
            match action {
                Action::Speak(text) => self.speak(text),
                Action::CancelSpeech => self.cancel_speech(),
                Action::StartListening => self.open_window(),
                Action::StopListening => self.close_window(),
                Action::Highlight(index) => self.view.set_active_step(index),
                Action::ClearHighlight => self.view.clear_active(),
                Action::Feedback(text) => self.flash_status(text),
                Action::Schedule(timer) => self.schedule(timer),
            }
        }
    }

    fn on_internal(&mut self, event: Internal) {
        match event {
            Internal::Timer { epoch, timer } => {
                if epoch != self.epoch {
                    debug!("session: discarding stale {timer:?} timer");
                    return;
                }
                self.step(|nav| nav.timer_fired(timer));
            }
            Internal::StatusRevert { generation } => {
                if generation == self.status_generation {
                    self.set_status(DEFAULT_PROMPT);
                }
            }
            Internal::Recognizer { window, event } => self.on_recognizer(window, event),
        }
    }

    fn on_recognizer(&mut self, window: u64, event: RecognizerEvent) {
        if self.open_window != Some(window) {
            debug!("session: dropping event from closed window {window}");
            return;
        }
        match event {
            RecognizerEvent::Transcript(text)
                if self.config.ignore_while_speaking && self.current_utterance.is_some() =>
            {
                debug!("ignoring {text:?} heard while speaking");
            }
            RecognizerEvent::Transcript(text) => {
                debug!("heard: {text:?}");
                self.step(|nav| nav.handle_transcript(&text));
            }
            RecognizerEvent::Error(RecognitionError::NoSpeech) => {
                debug!("window {window}: no speech");
            }
            RecognizerEvent::Error(err) => {
                if err.is_failure() {
                    warn!("window {window}: recognition failed: {err:?}");
                    self.window_failed = true;
                } else {
                    debug!("window {window}: {err:?}");
                }
            }
            RecognizerEvent::Ended => {
                self.open_window = None;
                let failed = std::mem::take(&mut self.window_failed);
                self.step(|nav| nav.recognition_ended(failed));
            }
        }
    }

    fn on_synth(&mut self, event: SynthEvent) {
        let SynthEvent::Finished(id) = event;
        if self.current_utterance == Some(id) {
            debug!("utterance {id} finished");
            self.current_utterance = None;
        }
    }

    // ─── Effects ───────────────────────────────────────────────────────────

    fn speak(&mut self, text: String) {
        if self.current_utterance.take().is_some() {
            self.synthesizer.cancel_all();
        }
        self.next_utterance += 1;
        let id = self.next_utterance;
        debug!("speak[{id}]: {text}");
        self.synthesizer.speak(
            Utterance {
                id,
                text,
                params: self.config.speech,
            },
            self.synth_tx.clone(),
        );
        self.current_utterance = Some(id);
    }

    fn cancel_speech(&mut self) {
        self.current_utterance = None;
        self.synthesizer.cancel_all();
    }

    fn open_window(&mut self) {
        if self.open_window.is_some() {
            return;
        }
        self.next_window += 1;
        let window = self.next_window;

        let (events_tx, mut events_rx) = mpsc::unbounded_channel();
        let internal_tx = self.internal_tx.clone();
        tokio::spawn(async move {
            while let Some(event) = events_rx.recv().await {
                if internal_tx
                    .send(Internal::Recognizer { window, event })
                    .is_err()
                {
                    break;
                }
            }
        });

        debug!("listen: window {window}");
        self.open_window = Some(window);
        self.window_failed = false;
        self.recognizer.listen(events_tx);
    }

    fn close_window(&mut self) {
        if self.open_window.take().is_some() {
            self.recognizer.stop();
        }
    }

    fn schedule(&self, timer: Timer) {
        let delay = match timer {
            Timer::ReadFirstStep => self.config.settle_delay,
            Timer::Stop => self.config.stop_delay,
            Timer::Relisten => self.config.relisten_backoff,
        };
        let epoch = self.epoch;
        let internal_tx = self.internal_tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = internal_tx.send(Internal::Timer { epoch, timer });
        });
    }

    fn flash_status(&mut self, text: String) {
        self.set_status(&text);
        self.status_generation += 1;
        let generation = self.status_generation;
        let delay = self.config.status_revert;
        let internal_tx = self.internal_tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = internal_tx.send(Internal::StatusRevert { generation });
        });
    }

    fn set_status(&mut self, text: &str) {
        if self.status_line != text {
            self.status_line = text.to_string();
            self.view.set_status(text);
        }
    }

    fn publish(&self) {
        let recipe = self.navigator.recipe();
        let next = NavigatorStatus {
            active: self.navigator.is_active(),
            recipe_id: recipe.map(|r| r.id.clone()),
            recipe_title: recipe.map(|r| r.display_name().to_string()),
            current_step: self.navigator.current_step(),
            step_count: recipe.map_or(0, Recipe::step_count),
            speaking: self.current_utterance.is_some(),
            listening: self.open_window.is_some(),
            status_line: self.status_line.clone(),
        };
        self.status_tx.send_if_modified(|status| {
            if *status == next {
                return false;
            }
            *status = next;
            true
        });
    }
}
