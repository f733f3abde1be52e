//! Kokoro synthesizer: narration text → Kokoro PCM stream → rodio playback.
//!
//! ```text
//! speak(utterance) → [job_tx] → fetcher task: POST /v1/audio/speech, stream PCM
//!     → [PlayCmd] → playback thread: rodio sink, reports Finished when drained
//! ```
//!
//! Narration utterances are short, so each one is a single request. Epoch
//! cancellation as in the session: `cancel_all()` bumps an [`AtomicU64`]
//! and the fetcher drops any job or stream tagged with an older epoch.
//! Play requests carry their epoch too, so one already queued when the
//! cancel lands never reaches the fresh sink.
//!
//! Kokoro has no pitch control; `SpeechParams::pitch` is ignored. Rate maps
//! to Kokoro's `speed`, volume to the sink volume.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use futures_util::StreamExt;
use rodio::{OutputStream, Sink};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, warn};

use cookmate_core::types::KokoroConfig;
use cookmate_core::wav::decode_pcm_le;

use crate::health::server_reachable;
use crate::pcm_source::PcmSource;
use crate::speech::{SynthEvent, Synthesizer, Utterance, UtteranceId};

/// Kokoro PCM streaming format: 24 kHz mono 16-bit signed LE.
const PCM_SAMPLE_RATE: u32 = 24_000;
const PCM_CHANNELS: u16 = 1;

/// How often the playback thread checks whether the sink drained.
const DRAIN_POLL: Duration = Duration::from_millis(50);

pub struct KokoroSynthesizer {
    job_tx: mpsc::UnboundedSender<SpeakJob>,
    play_tx: std::sync::mpsc::Sender<PlayCmd>,
    epoch: Arc<AtomicU64>,
    available: bool,
}

struct SpeakJob {
    utterance: Utterance,
    epoch: u64,
    done: mpsc::UnboundedSender<SynthEvent>,
}

enum PlayCmd {
    Play {
        id: UtteranceId,
        epoch: u64,
        source: PcmSource,
        volume: f32,
        done: mpsc::UnboundedSender<SynthEvent>,
    },
    Stop,
}

impl KokoroSynthesizer {
    /// Probe the Kokoro server, open the audio output and spawn the
    /// pipeline. Never fails: an unusable setup reports
    /// `available() == false` and narration refuses to start.
    pub async fn connect(config: KokoroConfig) -> Self {
        let reachable = server_reachable(&config.url).await;
        if !reachable {
            warn!("kokoro: no server answering at {}", config.url);
        }

        let epoch = Arc::new(AtomicU64::new(0));
        let (play_tx, play_rx) = std::sync::mpsc::channel::<PlayCmd>();
        let (ready_tx, ready_rx) = oneshot::channel();
        let playback_epoch = epoch.clone();
        // rodio OutputStream is !Send, so it lives on its own OS thread.
        if let Err(e) = std::thread::Builder::new()
            .name("cookmate-playback".into())
            .spawn(move || playback_thread(play_rx, playback_epoch, ready_tx))
        {
            error!("kokoro: failed to spawn playback thread: {e}");
        }
        let output_ok = ready_rx.await.unwrap_or(false);

        let (job_tx, job_rx) = mpsc::unbounded_channel();
        tokio::spawn(fetcher_task(job_rx, play_tx.clone(), epoch.clone(), config));

        Self {
            job_tx,
            play_tx,
            epoch,
            available: reachable && output_ok,
        }
    }
}

impl Synthesizer for KokoroSynthesizer {
    fn available(&self) -> bool {
        self.available
    }

    fn speak(&mut self, utterance: Utterance, done: mpsc::UnboundedSender<SynthEvent>) {
        let id = utterance.id;
        let job = SpeakJob {
            utterance,
            epoch: self.epoch.load(Ordering::SeqCst),
            done: done.clone(),
        };
        if self.job_tx.send(job).is_err() {
            error!("kokoro: fetcher stopped, dropping utterance {id}");
            let _ = done.send(SynthEvent::Finished(id));
        }
    }

    fn cancel_all(&mut self) {
        self.epoch.fetch_add(1, Ordering::SeqCst);
        let _ = self.play_tx.send(PlayCmd::Stop);
    }
}

// ─── Fetcher task ──────────────────────────────────────────────────────────

async fn fetcher_task(
    mut job_rx: mpsc::UnboundedReceiver<SpeakJob>,
    play_tx: std::sync::mpsc::Sender<PlayCmd>,
    epoch: Arc<AtomicU64>,
    config: KokoroConfig,
) {
    let client = reqwest::Client::new();
    let url = format!("{}/v1/audio/speech", config.url.trim_end_matches('/'));

    while let Some(job) = job_rx.recv().await {
        let id = job.utterance.id;
        if job.epoch != epoch.load(Ordering::SeqCst) {
            debug!("kokoro[{id}]: cancelled before fetch");
            let _ = job.done.send(SynthEvent::Finished(id));
            continue;
        }

        match stream_utterance(&client, &url, &config.voice, &job, &play_tx, &epoch).await {
            // Playback thread reports completion once the sink drains.
            Ok(true) => {}
            Ok(false) => {
                debug!("kokoro[{id}]: nothing to play");
                let _ = job.done.send(SynthEvent::Finished(id));
            }
            Err(e) => {
                error!("kokoro[{id}]: {e}");
                let _ = job.done.send(SynthEvent::Finished(id));
            }
        }
    }
}

/// Stream one utterance into the playback thread. Returns whether any
/// audio was queued.
async fn stream_utterance(
    client: &reqwest::Client,
    url: &str,
    voice: &str,
    job: &SpeakJob,
    play_tx: &std::sync::mpsc::Sender<PlayCmd>,
    epoch: &AtomicU64,
) -> Result<bool, String> {
    let id = job.utterance.id;
    let body = serde_json::json!({
        "input": job.utterance.text,
        "voice": voice,
        "model": "kokoro",
        "response_format": "pcm",
        "stream": true,
        "speed": job.utterance.params.rate,
    });

    debug!("kokoro[{id}]: POST {} chars", job.utterance.text.len());
    let resp = client
        .post(url)
        .json(&body)
        .send()
        .await
        .map_err(|e| format!("request failed: {e}"))?;
    if !resp.status().is_success() {
        let status = resp.status();
        let text = resp.text().await.unwrap_or_default();
        return Err(format!("Kokoro error {status}: {text}"));
    }

    let mut stream = resp.bytes_stream();
    let mut carry: Option<u8> = None;
    let mut pcm_tx: Option<std::sync::mpsc::Sender<Vec<i16>>> = None;

    while let Some(chunk) = stream.next().await {
        if job.epoch != epoch.load(Ordering::SeqCst) {
            debug!("kokoro[{id}]: cancelled mid-stream");
            break;
        }
        let chunk = chunk.map_err(|e| format!("stream error: {e}"))?;
        let (samples, rest) = decode_pcm_le(&chunk, carry.take());
        carry = rest;
        if samples.is_empty() {
            continue;
        }

        match &pcm_tx {
            Some(tx) => {
                if tx.send(samples).is_err() {
                    break;
                }
            }
            None => {
                if job.epoch != epoch.load(Ordering::SeqCst) {
                    debug!("kokoro[{id}]: cancelled before playback");
                    break;
                }
                let (tx, rx) = std::sync::mpsc::channel();
                let _ = tx.send(samples);
                play_tx
                    .send(PlayCmd::Play {
                        id,
                        epoch: job.epoch,
                        source: PcmSource::new(rx, PCM_CHANNELS, PCM_SAMPLE_RATE),
                        volume: job.utterance.params.volume,
                        done: job.done.clone(),
                    })
                    .map_err(|_| "playback thread is gone".to_string())?;
                pcm_tx = Some(tx);
            }
        }
    }

    Ok(pcm_tx.is_some())
}

// ─── Playback OS thread ────────────────────────────────────────────────────

/// Whether a play request tagged `tagged` is still current. A stale one is
/// reported finished so its waiter is released.
fn admit(
    epoch: &AtomicU64,
    tagged: u64,
    id: UtteranceId,
    done: &mpsc::UnboundedSender<SynthEvent>,
) -> bool {
    if tagged == epoch.load(Ordering::SeqCst) {
        return true;
    }
    debug!("playback[{id}]: superseded before start");
    let _ = done.send(SynthEvent::Finished(id));
    false
}

fn playback_thread(
    cmd_rx: std::sync::mpsc::Receiver<PlayCmd>,
    epoch: Arc<AtomicU64>,
    ready: oneshot::Sender<bool>,
) {
    let (_stream, handle) = match OutputStream::try_default() {
        Ok(pair) => pair,
        Err(e) => {
            error!("playback: failed to open audio output: {e}");
            let _ = ready.send(false);
            return;
        }
    };
    let mut sink = match Sink::try_new(&handle) {
        Ok(sink) => sink,
        Err(e) => {
            error!("playback: failed to create sink: {e}");
            let _ = ready.send(false);
            return;
        }
    };
    let _ = ready.send(true);

    let mut playing: Option<(UtteranceId, mpsc::UnboundedSender<SynthEvent>)> = None;

    loop {
        match cmd_rx.recv_timeout(DRAIN_POLL) {
            Ok(PlayCmd::Play {
                id,
                epoch: tagged,
                source,
                volume,
                done,
            }) if admit(&epoch, tagged, id, &done) => {
                if let Some((prev, prev_done)) = playing.take() {
                    let _ = prev_done.send(SynthEvent::Finished(prev));
                }
                debug!("playback[{id}]: start");
                sink.set_volume(volume.clamp(0.0, 1.0));
                sink.append(source);
                sink.play();
                playing = Some((id, done));
            }
            Ok(PlayCmd::Play { .. }) => {}
            Ok(PlayCmd::Stop) => {
                sink.stop();
                sink = match Sink::try_new(&handle) {
                    Ok(sink) => sink,
                    Err(e) => {
                        error!("playback: failed to recreate sink: {e}");
                        break;
                    }
                };
                if let Some((id, done)) = playing.take() {
                    let _ = done.send(SynthEvent::Finished(id));
                }
            }
            Err(std::sync::mpsc::RecvTimeoutError::Timeout) => {}
            Err(std::sync::mpsc::RecvTimeoutError::Disconnected) => {
                sink.stop();
                break;
            }
        }

        if sink.empty() {
            if let Some((id, done)) = playing.take() {
                debug!("playback[{id}]: drained");
                let _ = done.send(SynthEvent::Finished(id));
            }
        }
    }
}
