//! PCM helpers for the recognizer: WAV packaging and energy levels.
//!
//! Pure functions: no I/O, no async runtime.

/// Capture sample rate handed to Whisper (16 kHz mono).
pub const SAMPLE_RATE: u32 = 16_000;

/// Whisper model sizes the transcription server accepts.
const WHISPER_MODELS: &[&str] = &["tiny", "base", "small", "medium", "large"];

/// Check a Whisper model name before opening the microphone.
pub fn validate_whisper_model(model: &str) -> Result<(), String> {
    if WHISPER_MODELS.contains(&model) {
        return Ok(());
    }
    Err(format!(
        "unknown Whisper model '{model}'; expected one of: {}",
        WHISPER_MODELS.join(", ")
    ))
}

/// RMS level of 16-bit samples, normalized to 0.0–1.0.
pub fn rms_level(samples: &[i16]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let energy: f64 = samples
        .iter()
        .map(|&s| {
            let v = f64::from(s) / 32768.0;
            v * v
        })
        .sum();
    (energy / samples.len() as f64).sqrt() as f32
}

/// Capture duration in milliseconds for `sample_count` mono samples.
pub fn duration_ms(sample_count: usize, sample_rate: u32) -> u64 {
    if sample_rate == 0 {
        return 0;
    }
    sample_count as u64 * 1000 / u64::from(sample_rate)
}

/// Package mono 16-bit samples as a WAV file for upload.
pub fn encode_wav(samples: &[i16], sample_rate: u32) -> Vec<u8> {
    const HEADER_LEN: usize = 44;
    let data_len = (samples.len() * 2) as u32;
    let mut out = Vec::with_capacity(HEADER_LEN + data_len as usize);

    out.extend_from_slice(b"RIFF");
    out.extend_from_slice(&(36 + data_len).to_le_bytes());
    out.extend_from_slice(b"WAVE");

    out.extend_from_slice(b"fmt ");
    out.extend_from_slice(&16u32.to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes()); // PCM
    out.extend_from_slice(&1u16.to_le_bytes()); // mono
    out.extend_from_slice(&sample_rate.to_le_bytes());
    out.extend_from_slice(&(sample_rate * 2).to_le_bytes());
    out.extend_from_slice(&2u16.to_le_bytes());
    out.extend_from_slice(&16u16.to_le_bytes());

    out.extend_from_slice(b"data");
    out.extend_from_slice(&data_len.to_le_bytes());
    out.extend(samples.iter().flat_map(|s| s.to_le_bytes()));

    out
}

/// Decode little-endian i16 PCM, carrying an odd trailing byte between
/// network chunks.
pub fn decode_pcm_le(bytes: &[u8], carry: Option<u8>) -> (Vec<i16>, Option<u8>) {
    let joined: Vec<u8>;
    let slice = match carry {
        Some(first) => {
            joined = std::iter::once(first).chain(bytes.iter().copied()).collect();
            &joined[..]
        }
        None => bytes,
    };

    let samples = slice
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect();
    let rest = (slice.len() % 2 == 1).then(|| slice[slice.len() - 1]);
    (samples, rest)
}
