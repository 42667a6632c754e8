//! Radio Parrot Firmware Library
//!
//! This library provides the core of a store-and-forward radio parrot:
//! it records what it hears on a channel, watches the recording for a
//! dual-tone keypad command and transmits a reply through a PTT-keyed
//! radio module (SA868 on the reference board).
//!
//! # Architecture
//!
//! The firmware is organized in layers:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    APPLICATION LAYER                         │
//! │  Control Loop (Parrot)  │  Recorder  │  Clip Store           │
//! ├─────────────────────────────────────────────────────────────┤
//! │                  TRANSMIT / FEEDBACK                         │
//! │  PTT Sequencer  │  Signal Quality  │  Speech Sink            │
//! ├─────────────────────────────────────────────────────────────┤
//! │                      DSP LAYER                               │
//! │  Goertzel Tone Decoder  │  Tone / Test Pattern Generator     │
//! ├─────────────────────────────────────────────────────────────┤
//! │                   HAL / PROTOCOL LAYER                       │
//! │  Audio Port  │  Squelch Pin  │  SA868 AT Link  │  PTT Pin    │
//! ├─────────────────────────────────────────────────────────────┤
//! │                    RTOS / SCHEDULER                          │
//! │      embassy-rs on target  │  sim bench on host              │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Design Principles
//!
//! - **No heap**: every sample buffer is carved from one caller-provided
//!   region at startup
//! - **Injected collaborators**: pins, delays, audio and services are
//!   traits, so the same engine runs on the board and on the host bench
//! - **No unsafe in application code**
//! - **Explicit error handling**: fallible operations return `Result`;
//!   runtime faults degrade to logged no-ops instead of panics

#![cfg_attr(feature = "embedded", no_std)]
#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

#[cfg(all(feature = "std", feature = "embedded"))]
extern crate std;

// Re-export dependencies needed by applications (only in embedded mode)
#[cfg(feature = "embedded")]
pub use embassy_executor;
#[cfg(feature = "embedded")]
pub use embassy_stm32;
#[cfg(feature = "embedded")]
pub use embassy_time;

#[macro_use]
mod logging;

/// Sample Storage
///
/// Startup arena and fixed-capacity sample buffers.
pub mod buffer;

/// System configuration and constants
pub mod config;

/// Digital Signal Processing
///
/// Tone decoding and tone generation.
pub mod dsp;

/// Hardware Abstraction Layer
///
/// Audio, squelch, strength and speech interfaces plus portable
/// implementations over `embedded-hal`/`embedded-io`.
pub mod hal;

/// Radio Module Protocol
///
/// SA868 AT command formatting and response parsing.
pub mod protocol;

/// Parrot Logic
///
/// Recorder, clip store, transmit sequencing and the control loop.
pub mod radio;

/// Host Simulation Bench
///
/// Virtual-clock stand-ins for every collaborator.
#[cfg(feature = "std")]
pub mod sim;

/// Shared types used across modules
pub mod types;

/// Prelude module for common imports
#[cfg(feature = "embedded")]
pub mod prelude {
    //! Convenient re-exports for common types and traits.

    pub use crate::buffer::SampleArena;
    pub use crate::config::*;
    pub use crate::hal::squelch::SquelchInput;
    pub use crate::hal::{pcm::PcmStream, AudioPort, Mute, Unavailable};
    pub use crate::protocol::Sa868;
    pub use crate::radio::control::{LoopEvent, Parrot};
    pub use crate::types::*;

    // Common traits
    pub use embedded_hal::digital::OutputPin;

    // Embassy
    pub use embassy_time::{Duration, Instant, Timer};

    // Error handling
    pub use core::result::Result;
}
