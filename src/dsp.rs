//! Digital Signal Processing
//!
//! Provides the audio-domain algorithms of the parrot:
//! - Dual-tone command decoding (Goertzel energy per keypad frequency)
//! - Sine tone generation for feedback cadences and the test clip

pub mod oscillator;
pub mod tone_decoder;
