//! Spoken phrases and step text preparation.
//!
//! Pure functions, no I/O.

use regex::Regex;
use std::sync::LazyLock;

static RE_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").unwrap());
static RE_BOLD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*([^*]+)\*\*").unwrap());
static RE_ITALIC: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\*([^*]+)\*").unwrap());
/// "1. ", "2) ", "Step 3: " at the start of a step. A number followed
/// directly by more digits ("2.5 cups") is left alone.
static RE_STEP_NUMBER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(?:step\s*)?\d+\s*[.:)\-](?:\s+|$)").unwrap()
});
static RE_MULTI_SPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

pub const COMPLETED: &str = "Recipe steps completed. Enjoy!";
pub const LAST_STEP: &str = "This is the last step. Say stop to exit voice mode.";
pub const FIRST_STEP: &str = "This is the first step.";
pub const STOPPING: &str = "Stopping voice mode.";
pub const HELP: &str = "You can say next, repeat, back, or stop.";
/// Resting text of the host status line.
pub const DEFAULT_PROMPT: &str = "Say next, repeat, back, or stop.";

/// Introduction spoken when a session starts.
pub fn introduction(title: &str) -> String {
    let title = clean_step_text(title);
    if title.is_empty() {
        "Starting voice mode. Say next, repeat, back, or stop. Say help at any time.".into()
    } else {
        format!(
            "Starting voice mode for {title}. Say next, repeat, back, or stop. Say help at any time."
        )
    }
}

/// `"Step {n}. {text}"` for the 0-based `index`.
pub fn step_announcement(index: usize, text: &str) -> String {
    let text = clean_step_text(text);
    if text.is_empty() {
        format!("Step {}.", index + 1)
    } else {
        format!("Step {}. {}", index + 1, text)
    }
}

/// Transient status feedback for a recognized utterance.
pub fn heard(transcript: &str) -> String {
    format!("Heard: {}", transcript.trim())
}

/// Make step text read naturally: markup removed, any leading step number
/// dropped (the announcement adds its own), whitespace collapsed.
pub fn clean_step_text(text: &str) -> String {
    let mut c = RE_TAG.replace_all(text, " ").into_owned();
    c = RE_BOLD.replace_all(&c, "$1").into_owned();
    c = RE_ITALIC.replace_all(&c, "$1").into_owned();
    c = RE_STEP_NUMBER.replace(&c, "").into_owned();
    c = RE_MULTI_SPACE.replace_all(&c, " ").into_owned();
    c.trim().to_string()
}
