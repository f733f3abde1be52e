//! cookmate-core: Pure types, command vocabulary and step narration.
//!
//! No async runtime, no I/O, no platform dependencies.

pub mod command;
pub mod narration;
pub mod search;
pub mod navigator;
pub mod substitutions;
pub mod types;
pub mod wav;
