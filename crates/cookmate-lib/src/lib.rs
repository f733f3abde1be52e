//! cookmate-lib: voice engine for hands-free recipe narration.
//!
//! The narration session, speech backends (Kokoro synthesis, Whisper
//! recognition, terminal stand-ins), the backend REST client and the HTTP
//! control API. Depends on cookmate-core for the navigator and pure types.

pub mod api;
pub mod capture;
pub mod console;
pub mod health;
pub mod kokoro;
pub mod pcm_source;
pub mod server;
pub mod session;
pub mod speech;
pub mod whisper;

pub use cookmate_core;
