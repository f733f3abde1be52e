//! Shared types for the CookMate voice client.
//!
//! Kept free of tokio and audio crates so hosts can depend on the recipe and
//! status types without pulling in the speech backends.

use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize};

// ─── Recipe ────────────────────────────────────────────────────────────────

/// A recipe as served by the CookMate backend (`/api/recipes`).
///
/// Only `id` and `steps` matter to narration. The rest is carried so the
/// CLI and host views can show it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Recipe {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub steps: Vec<String>,
    #[serde(default)]
    pub ingredients: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub basic_ingredients: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cuisine: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<String>,
    /// Cooking time in minutes. The backend sends it as a string, older
    /// clients as a number.
    #[serde(
        default,
        deserialize_with = "minutes_from_any",
        skip_serializing_if = "Option::is_none"
    )]
    pub time: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub img: Option<String>,
}

impl Recipe {
    /// Build a minimal recipe from a title and its steps.
    pub fn new(id: impl Into<String>, title: impl Into<String>, steps: Vec<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            steps,
            ..Default::default()
        }
    }

    /// Name to announce: `title`, falling back to `name`, then the id.
    pub fn display_name(&self) -> &str {
        if !self.title.trim().is_empty() {
            return self.title.trim();
        }
        match self.name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name,
            _ => &self.id,
        }
    }

    pub fn step_count(&self) -> usize {
        self.steps.len()
    }
}

fn minutes_from_any<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Minutes {
        Int(u64),
        Float(f64),
        Text(String),
    }

    Ok(match Option::<Minutes>::deserialize(deserializer)? {
        Some(Minutes::Int(n)) => u32::try_from(n).ok(),
        Some(Minutes::Float(f)) if f.is_finite() && f >= 0.0 => Some(f.round() as u32),
        Some(Minutes::Float(_)) => None,
        Some(Minutes::Text(s)) => s
            .trim()
            .trim_end_matches("mins")
            .trim_end_matches("min")
            .trim()
            .parse()
            .ok(),
        None => None,
    })
}

// ─── Speech settings ───────────────────────────────────────────────────────

/// Parameters handed to the synthesizer with every utterance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpeechParams {
    pub rate: f32,
    pub pitch: f32,
    pub volume: f32,
}

impl Default for SpeechParams {
    fn default() -> Self {
        Self {
            rate: 0.95,
            pitch: 1.0,
            volume: 1.0,
        }
    }
}

/// Recognizer configuration consumed when a session starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecognizerSettings {
    pub continuous: bool,
    pub interim_results: bool,
    /// BCP-47 language tag, e.g. `en-US`.
    pub language: String,
}

impl Default for RecognizerSettings {
    fn default() -> Self {
        Self {
            continuous: true,
            interim_results: false,
            language: "en-US".into(),
        }
    }
}

impl RecognizerSettings {
    /// Primary language subtag (`en-US` → `en`), as Whisper expects.
    pub fn primary_language(&self) -> &str {
        self.language
            .split(['-', '_'])
            .next()
            .filter(|s| !s.is_empty())
            .unwrap_or("en")
    }
}

// ─── Navigator configuration & status ──────────────────────────────────────

/// Timing and speech configuration for a narration session.
#[derive(Debug, Clone)]
pub struct NavigatorConfig {
    /// Pause after the introduction before step 1 is read.
    pub settle_delay: Duration,
    /// Pause between the "stopping" notice and the actual stop.
    pub stop_delay: Duration,
    /// How long "Heard: …" stays on the status line.
    pub status_revert: Duration,
    /// Pause before relistening after a failed listening window.
    pub relisten_backoff: Duration,
    /// Drop recognized speech while an utterance is playing, so narration
    /// picked up by the microphone cannot trigger commands.
    pub ignore_while_speaking: bool,
    pub speech: SpeechParams,
    pub recognizer: RecognizerSettings,
}

impl Default for NavigatorConfig {
    fn default() -> Self {
        Self {
            settle_delay: Duration::from_millis(4_000),
            stop_delay: Duration::from_millis(1_500),
            status_revert: Duration::from_millis(3_000),
            relisten_backoff: Duration::from_millis(500),
            ignore_while_speaking: false,
            speech: SpeechParams::default(),
            recognizer: RecognizerSettings::default(),
        }
    }
}

/// Observable narration state.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NavigatorStatus {
    pub active: bool,
    pub recipe_id: Option<String>,
    pub recipe_title: Option<String>,
    /// 0-based index of the step being narrated.
    pub current_step: Option<usize>,
    pub step_count: usize,
    pub speaking: bool,
    pub listening: bool,
    pub status_line: String,
}

// ─── Speech backend configuration ──────────────────────────────────────────

/// Kokoro synthesis server configuration.
#[derive(Debug, Clone)]
pub struct KokoroConfig {
    pub url: String,
    pub voice: String,
}

impl Default for KokoroConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:3001".into(),
            voice: "af_heart".into(),
        }
    }
}

/// Whisper transcription server configuration.
#[derive(Debug, Clone)]
pub struct WhisperConfig {
    pub url: String,
    pub model: String,
}

impl Default for WhisperConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:2022".into(),
            model: "base".into(),
        }
    }
}

// ─── Backend records ───────────────────────────────────────────────────────

/// Pantry entry for a user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PantryItem {
    #[serde(rename = "_id", default)]
    pub id: String,
    pub name: String,
    /// Days until expiry.
    #[serde(default)]
    pub expiry: Option<u32>,
}

/// A favorited recipe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Favorite {
    pub recipe_id: String,
}

/// Authenticated user returned by `/api/auth/login`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    pub email: String,
}

/// Reply from the backend's `/api/voice` assistant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceReply {
    pub response: String,
}
