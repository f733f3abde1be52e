//! Microphone capture for the Whisper recognizer.
//!
//! Opens the default input device through cpal and hands out fixed 100 ms
//! chunks of 16 kHz mono i16, whatever the device's native layout.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Sample, SampleFormat, SizedSample};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use cookmate_core::wav::SAMPLE_RATE;

/// Samples per chunk: 100 ms at 16 kHz mono.
pub const CHUNK_SAMPLES: usize = SAMPLE_RATE as usize / 10;

/// Whether the host has a default input device at all.
pub fn input_device_present() -> bool {
    cpal::default_host().default_input_device().is_some()
}

pub struct MicCapture {
    rx: mpsc::UnboundedReceiver<Vec<i16>>,
    pending: Vec<i16>,
    stop: Arc<AtomicBool>,
    thread: Option<std::thread::JoinHandle<()>>,
}

impl MicCapture {
    /// Start capturing from the default microphone. Fails if no device is
    /// present or the stream cannot be started.
    pub fn open() -> Result<Self, String> {
        let device = cpal::default_host()
            .default_input_device()
            .ok_or("no microphone found")?;
        let supported = device
            .default_input_config()
            .map_err(|e| format!("input config: {e}"))?;

        let format = supported.sample_format();
        let layout = Layout {
            channels: supported.channels(),
            native_rate: supported.sample_rate().0,
        };
        let config: cpal::StreamConfig = supported.into();
        debug!(
            "capture: {} ch @ {} Hz, {format:?}",
            layout.channels, layout.native_rate
        );

        let (tx, rx) = mpsc::unbounded_channel();
        let (ready_tx, ready_rx) = std::sync::mpsc::channel::<Result<(), String>>();
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = stop.clone();

        // cpal streams are !Send on some hosts; the stream stays on this thread.
        let thread = std::thread::Builder::new()
            .name("cookmate-capture".into())
            .spawn(move || {
                let stream = match format {
                    SampleFormat::I16 => {
                        build_stream::<i16>(&device, &config, layout, tx, stop_flag.clone())
                    }
                    SampleFormat::U16 => {
                        build_stream::<u16>(&device, &config, layout, tx, stop_flag.clone())
                    }
                    SampleFormat::F32 => {
                        build_stream::<f32>(&device, &config, layout, tx, stop_flag.clone())
                    }
                    other => Err(format!("unsupported sample format {other:?}")),
                };
                let stream = match stream.and_then(|s| {
                    s.play().map_err(|e| format!("start stream: {e}"))?;
                    Ok(s)
                }) {
                    Ok(s) => s,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                let _ = ready_tx.send(Ok(()));

                while !stop_flag.load(Ordering::Relaxed) {
                    std::thread::park();
                }
                drop(stream);
            })
            .map_err(|e| format!("spawn capture thread: {e}"))?;

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(Self {
                rx,
                pending: Vec::new(),
                stop,
                thread: Some(thread),
            }),
            Ok(Err(e)) => {
                let _ = thread.join();
                Err(e)
            }
            Err(_) => {
                let _ = thread.join();
                Err("capture thread exited".to_string())
            }
        }
    }

    /// Next [`CHUNK_SAMPLES`] samples.
    pub async fn next_chunk(&mut self) -> Result<Vec<i16>, String> {
        while self.pending.len() < CHUNK_SAMPLES {
            match self.rx.recv().await {
                Some(samples) => self.pending.extend(samples),
                None => return Err("capture stream ended".to_string()),
            }
        }
        Ok(self.pending.drain(..CHUNK_SAMPLES).collect())
    }
}

impl Drop for MicCapture {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(thread) = self.thread.take() {
            thread.thread().unpark();
            let _ = thread.join();
        }
    }
}

#[derive(Clone, Copy)]
struct Layout {
    channels: u16,
    native_rate: u32,
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    layout: Layout,
    tx: mpsc::UnboundedSender<Vec<i16>>,
    stop: Arc<AtomicBool>,
) -> Result<cpal::Stream, String>
where
    T: SizedSample,
    i16: cpal::FromSample<T>,
{
    device
        .build_input_stream(
            config,
            move |data: &[T], _: &cpal::InputCallbackInfo| {
                if stop.load(Ordering::Relaxed) {
                    return;
                }
                let samples: Vec<i16> = data.iter().map(|&s| s.to_sample::<i16>()).collect();
                let mono = to_mono(&samples, layout.channels);
                let _ = tx.send(resample(&mono, layout.native_rate, SAMPLE_RATE));
            },
            |err| warn!("capture: stream error: {err}"),
            None,
        )
        .map_err(|e| format!("build stream: {e}"))
}

/// Average interleaved frames down to one channel.
fn to_mono(interleaved: &[i16], channels: u16) -> Vec<i16> {
    match channels {
        0 | 1 => interleaved.to_vec(),
        n => interleaved
            .chunks_exact(n as usize)
            .map(|frame| {
                let sum: i32 = frame.iter().map(|&s| i32::from(s)).sum();
                (sum / i32::from(n)) as i16
            })
            .collect(),
    }
}

/// Linear-interpolation resampler. Adequate for speech recognition input.
fn resample(input: &[i16], from: u32, to: u32) -> Vec<i16> {
    if from == to || input.is_empty() {
        return input.to_vec();
    }
    let step = f64::from(from) / f64::from(to);
    let len = (input.len() as f64 / step) as usize;
    (0..len)
        .map(|i| {
            let pos = i as f64 * step;
            let idx = pos as usize;
            let frac = pos - idx as f64;
            let a = f64::from(input[idx]);
            let b = input.get(idx + 1).map_or(a, |&s| f64::from(s));
            (a + frac * (b - a)) as i16
        })
        .collect()
}
