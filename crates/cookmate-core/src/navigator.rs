//! Voice step navigator: the narration state machine.
//!
//! The navigator never touches a synthesizer, recognizer or view directly.
//! Every operation returns the [`Action`]s the session driver must carry
//! out, in order. That keeps the transitions testable without audio and
//! lets `stop()` be called from inside command handling.

use thiserror::Error;

use crate::command::{VoiceCommand, classify};
use crate::narration;
use crate::types::Recipe;

/// Side effects requested by the navigator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Speak text, superseding whatever is being spoken.
    Speak(String),
    /// Cancel any in-flight synthesis.
    CancelSpeech,
    /// Open a listening window if none is open.
    StartListening,
    /// Close the listening window.
    StopListening,
    /// Mark exactly this step as active in the host view.
    Highlight(usize),
    /// Clear the active step in the host view.
    ClearHighlight,
    /// Show transient feedback on the host status line.
    Feedback(String),
    /// Fire a timer later; see [`Timer`].
    Schedule(Timer),
}

/// Delayed transitions. The driver owns the durations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timer {
    /// Settle delay elapsed after the introduction, read step 1.
    ReadFirstStep,
    /// The "stopping" notice had time to play, stop the session.
    Stop,
    /// Back-off after a failed listening window.
    Relisten,
}

/// Reasons a session refuses to start.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NarrationError {
    #[error("this recipe has no steps to read")]
    EmptyRecipe,
    #[error("speech synthesis is not available")]
    SynthesizerUnavailable,
    #[error("speech recognition is not available")]
    RecognizerUnavailable,
    #[error("narration session has shut down")]
    SessionClosed,
}

/// Session state for one recipe view.
#[derive(Debug, Default)]
pub struct StepNavigator {
    recipe: Option<Recipe>,
    active: bool,
    index: usize,
}

impl StepNavigator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Current 0-based step, only while active.
    pub fn current_step(&self) -> Option<usize> {
        self.active.then_some(self.index)
    }

    pub fn recipe(&self) -> Option<&Recipe> {
        self.recipe.as_ref()
    }

    /// Begin narrating `recipe` from step 1.
    ///
    /// Capability checks belong to the driver; the navigator only rejects
    /// recipes without steps. Starting while active restarts the session,
    /// so the driver is expected to [`stop`](Self::stop) first.
    pub fn start(&mut self, recipe: Recipe) -> Result<Vec<Action>, NarrationError> {
        if recipe.steps.is_empty() {
            return Err(NarrationError::EmptyRecipe);
        }
        let intro = narration::introduction(recipe.display_name());
        self.recipe = Some(recipe);
        self.active = true;
        self.index = 0;
        Ok(vec![
            Action::Speak(intro),
            Action::StartListening,
            Action::Schedule(Timer::ReadFirstStep),
        ])
    }

    /// End the session. A no-op when not active.
    pub fn stop(&mut self) -> Vec<Action> {
        if !self.active {
            return Vec::new();
        }
        self.active = false;
        self.index = 0;
        self.recipe = None;
        vec![
            Action::CancelSpeech,
            Action::StopListening,
            Action::ClearHighlight,
        ]
    }

    /// Handle one recognized utterance.
    pub fn handle_transcript(&mut self, text: &str) -> Vec<Action> {
        if !self.active {
            return Vec::new();
        }
        let Some(command) = classify(text) else {
            return Vec::new();
        };
        let mut actions = vec![Action::Feedback(narration::heard(text))];
        actions.extend(self.apply(command));
        actions
    }

    /// Apply a classified command.
    pub fn apply(&mut self, command: VoiceCommand) -> Vec<Action> {
        if !self.active {
            return Vec::new();
        }
        match command {
            VoiceCommand::Next => {
                if self.index + 1 < self.step_count() {
                    self.index += 1;
                    self.read_current_step()
                } else {
                    vec![Action::Speak(narration::LAST_STEP.into())]
                }
            }
            VoiceCommand::Repeat => self.read_current_step(),
            VoiceCommand::Back => {
                if self.index > 0 {
                    self.index -= 1;
                    self.read_current_step()
                } else {
                    vec![Action::Speak(narration::FIRST_STEP.into())]
                }
            }
            VoiceCommand::Stop => vec![
                Action::Speak(narration::STOPPING.into()),
                Action::Schedule(Timer::Stop),
            ],
            VoiceCommand::Help => vec![Action::Speak(narration::HELP.into())],
        }
    }

    /// Speak the current step and highlight it. Past the end, announce
    /// completion without advancing.
    pub fn read_current_step(&mut self) -> Vec<Action> {
        if !self.active {
            return Vec::new();
        }
        match self
            .recipe
            .as_ref()
            .and_then(|r| r.steps.get(self.index))
        {
            Some(step) => vec![
                Action::Highlight(self.index),
                Action::Speak(narration::step_announcement(self.index, step)),
            ],
            None => vec![Action::Speak(narration::COMPLETED.into())],
        }
    }

    /// A scheduled timer fired.
    pub fn timer_fired(&mut self, timer: Timer) -> Vec<Action> {
        if !self.active {
            return Vec::new();
        }
        match timer {
            Timer::ReadFirstStep => self.read_current_step(),
            Timer::Stop => self.stop(),
            Timer::Relisten => vec![Action::StartListening],
        }
    }

    /// The recognizer closed its listening window. Keep listening while
    /// active; back off first if the window failed.
    pub fn recognition_ended(&mut self, failed: bool) -> Vec<Action> {
        if !self.active {
            return Vec::new();
        }
        if failed {
            vec![Action::Schedule(Timer::Relisten)]
        } else {
            vec![Action::StartListening]
        }
    }

    fn step_count(&self) -> usize {
        self.recipe.as_ref().map_or(0, Recipe::step_count)
    }
}
