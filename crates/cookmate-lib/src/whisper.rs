//! Whisper recognizer: microphone → energy VAD → local Whisper server.
//!
//! Each listening window captures one utterance. The window ends after
//! trailing silence, at the capture cap, or when nothing was said for
//! [`NO_SPEECH_MS`]. The captured audio goes to
//! `POST {url}/v1/audio/transcriptions` as a WAV upload and the window
//! reports one event followed by `Ended`.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use cookmate_core::types::{RecognizerSettings, WhisperConfig};
use cookmate_core::wav::{duration_ms, encode_wav, rms_level, validate_whisper_model, SAMPLE_RATE};

use crate::capture::{input_device_present, MicCapture, CHUNK_SAMPLES};
use crate::health::server_reachable;
use crate::speech::{RecognitionError, Recognizer, RecognizerEvent};

const SPEECH_THRESHOLD: f32 = 0.004;
const MIN_SPEECH_MS: u64 = 180;
const TRAILING_SILENCE_MS: u64 = 700;
const MAX_CAPTURE_MS: u64 = 12_000;
pub const NO_SPEECH_MS: u64 = 7_000;

const CHUNK_MS: u64 = CHUNK_SAMPLES as u64 * 1000 / SAMPLE_RATE as u64;
const CHUNK_READ_TIMEOUT: Duration = Duration::from_millis(500);

// ─── Voice activity ────────────────────────────────────────────────────────

/// What to do after feeding one chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VadDecision {
    /// Keep listening; `keep` says whether the chunk belongs to the utterance.
    Continue { keep: bool },
    /// The utterance is complete; transcribe what was kept.
    Utterance,
    /// Nothing was said before the no-speech deadline.
    NoSpeech,
}

/// Energy-based end-of-utterance detector, driven one chunk at a time.
#[derive(Debug, Default)]
pub struct VoiceActivity {
    elapsed_ms: u64,
    speech_ms: Option<u64>,
    silence_ms: u64,
}

impl VoiceActivity {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn speech_detected(&self) -> bool {
        self.speech_ms.is_some()
    }

    pub fn feed(&mut self, rms: f32, chunk_ms: u64) -> VadDecision {
        self.elapsed_ms += chunk_ms;
        let loud = rms > SPEECH_THRESHOLD;

        match self.speech_ms {
            None if loud => {
                self.speech_ms = Some(chunk_ms);
                self.silence_ms = 0;
            }
            None => {
                if self.elapsed_ms >= NO_SPEECH_MS {
                    return VadDecision::NoSpeech;
                }
                return VadDecision::Continue { keep: false };
            }
            Some(speech) => {
                let speech = speech + chunk_ms;
                self.speech_ms = Some(speech);
                if loud {
                    self.silence_ms = 0;
                } else if speech >= MIN_SPEECH_MS {
                    self.silence_ms += chunk_ms;
                    if self.silence_ms >= TRAILING_SILENCE_MS {
                        return VadDecision::Utterance;
                    }
                }
            }
        }

        if self.elapsed_ms >= MAX_CAPTURE_MS {
            return VadDecision::Utterance;
        }
        VadDecision::Continue { keep: true }
    }
}

// ─── Recognizer ────────────────────────────────────────────────────────────

pub struct WhisperRecognizer {
    config: WhisperConfig,
    language: String,
    available: bool,
    client: reqwest::Client,
    cancel: Option<Arc<AtomicBool>>,
}

impl WhisperRecognizer {
    /// Probe the Whisper server and the microphone. Never fails; an
    /// unusable setup reports `available() == false`.
    pub async fn connect(config: WhisperConfig) -> Self {
        let mut available = true;
        if let Err(e) = validate_whisper_model(&config.model) {
            warn!("whisper: {e}");
            available = false;
        }
        if !server_reachable(&config.url).await {
            warn!("whisper: no server answering at {}", config.url);
            available = false;
        }
        if !input_device_present() {
            warn!("whisper: no microphone found");
            available = false;
        }
        info!("whisper: model={} available={available}", config.model);

        Self {
            config,
            language: RecognizerSettings::default().primary_language().to_string(),
            available,
            client: reqwest::Client::new(),
            cancel: None,
        }
    }
}

impl Recognizer for WhisperRecognizer {
    fn available(&self) -> bool {
        self.available
    }

    fn configure(&mut self, settings: &RecognizerSettings) {
        self.language = settings.primary_language().to_string();
    }

    fn listen(&mut self, events: mpsc::UnboundedSender<RecognizerEvent>) {
        self.stop();
        let cancel = Arc::new(AtomicBool::new(false));
        self.cancel = Some(cancel.clone());

        let client = self.client.clone();
        let config = self.config.clone();
        let language = self.language.clone();
        tokio::spawn(async move {
            let event = match capture_utterance(&cancel).await {
                Ok(Some(samples)) => {
                    match transcribe(&client, &config, &language, &samples).await {
                        Ok(text) if text.is_empty() => RecognizerEvent::Error(RecognitionError::NoSpeech),
                        Ok(text) => RecognizerEvent::Transcript(text),
                        Err(e) => RecognizerEvent::Error(RecognitionError::Transcription(e)),
                    }
                }
                Ok(None) => RecognizerEvent::Error(RecognitionError::NoSpeech),
                Err(e) => RecognizerEvent::Error(e),
            };
            let event = if cancel.load(Ordering::Relaxed) {
                RecognizerEvent::Error(RecognitionError::Aborted)
            } else {
                event
            };
            let _ = events.send(event);
            let _ = events.send(RecognizerEvent::Ended);
        });
    }

    fn stop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel.store(true, Ordering::Relaxed);
        }
    }
}

/// Capture one utterance. `Ok(None)` when nothing was said.
async fn capture_utterance(cancel: &AtomicBool) -> Result<Option<Vec<i16>>, RecognitionError> {
    let mut mic = MicCapture::open().map_err(RecognitionError::Capture)?;
    let mut vad = VoiceActivity::new();
    let mut kept: Vec<i16> = Vec::new();

    loop {
        if cancel.load(Ordering::Relaxed) {
            return Err(RecognitionError::Aborted);
        }
        let chunk = match tokio::time::timeout(CHUNK_READ_TIMEOUT, mic.next_chunk()).await {
            Ok(Ok(chunk)) => chunk,
            Ok(Err(e)) if kept.is_empty() => return Err(RecognitionError::Capture(e)),
            Ok(Err(_)) => break,
            Err(_) => return Err(RecognitionError::Capture("microphone read timed out".into())),
        };

        match vad.feed(rms_level(&chunk), CHUNK_MS) {
            VadDecision::Continue { keep } => {
                if keep {
                    kept.extend_from_slice(&chunk);
                }
            }
            VadDecision::Utterance => {
                kept.extend_from_slice(&chunk);
                break;
            }
            VadDecision::NoSpeech => return Ok(None),
        }
    }

    debug!("whisper: captured {} ms", duration_ms(kept.len(), SAMPLE_RATE));
    Ok((!kept.is_empty()).then_some(kept))
}

async fn transcribe(
    client: &reqwest::Client,
    config: &WhisperConfig,
    language: &str,
    samples: &[i16],
) -> Result<String, String> {
    let wav = encode_wav(samples, SAMPLE_RATE);
    let part = reqwest::multipart::Part::bytes(wav)
        .file_name("utterance.wav")
        .mime_str("audio/wav")
        .map_err(|e| format!("mime: {e}"))?;
    let form = reqwest::multipart::Form::new()
        .part("file", part)
        .text("model", config.model.clone())
        .text("language", language.to_string())
        .text("response_format", "json");

    let url = format!("{}/v1/audio/transcriptions", config.url.trim_end_matches('/'));
    let resp = client
        .post(&url)
        .multipart(form)
        .send()
        .await
        .map_err(|e| format!("request failed: {e}"))?;
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(format!("Whisper error {status}: {body}"));
    }

    let value: serde_json::Value = resp.json().await.map_err(|e| format!("invalid JSON: {e}"))?;
    Ok(transcript_text(&value))
}

/// Transcript text with Whisper's blank-audio marker removed.
fn transcript_text(value: &serde_json::Value) -> String {
    value
        .get("text")
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .replace("[BLANK_AUDIO]", "")
        .trim()
        .to_string()
}
