//! Voice command vocabulary and transcript classification.
//!
//! Matching is plain substring containment on the lower-cased transcript,
//! checked in a fixed precedence order. "next" therefore also matches inside
//! longer words; recognizers hand us whole utterances without word
//! boundaries we could rely on.

use serde::Serialize;

/// A navigation command recognized in an utterance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VoiceCommand {
    Next,
    Repeat,
    Back,
    Stop,
    Help,
}

/// Keyword families in precedence order. First family with a hit wins.
const VOCABULARY: &[(VoiceCommand, &[&str])] = &[
    (VoiceCommand::Next, &["next", "continue"]),
    (VoiceCommand::Repeat, &["repeat", "again"]),
    (VoiceCommand::Back, &["back", "previous"]),
    (VoiceCommand::Stop, &["stop", "exit", "quit"]),
    (VoiceCommand::Help, &["help"]),
];

/// Lower-case and trim a raw transcript.
pub fn normalize_transcript(text: &str) -> String {
    text.trim().to_lowercase()
}

/// Classify an utterance. Returns `None` for free text that matches no
/// command family.
pub fn classify(text: &str) -> Option<VoiceCommand> {
    let text = normalize_transcript(text);
    if text.is_empty() {
        return None;
    }
    VOCABULARY
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|k| text.contains(k)))
        .map(|(command, _)| *command)
}
