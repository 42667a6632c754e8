//! Hardware Abstraction Layer
//!
//! The narrow interfaces the parrot core drives. Pins and delays use the
//! `embedded-hal` traits directly; the audio path, squelch, channel
//! strength and the speech/text services are the traits below.
//! Implementations over `embedded-hal`/`embedded-io` live in the
//! submodules and work on any target.

use core::fmt;

use crate::radio::clips::SlotSummary;
use crate::types::{phrase, Phrase, Sample};

pub mod pcm;
pub mod squelch;

/// Audio port failure
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AudioError {
    /// Write not accepted within the port's bounded wait
    Timeout,
    /// Port failed to initialize
    Unavailable,
    /// Underlying transport error
    Io,
}

impl fmt::Display for AudioError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout => write!(f, "audio write timed out"),
            Self::Unavailable => write!(f, "audio port unavailable"),
            Self::Io => write!(f, "audio transport error"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for AudioError {}

#[cfg(feature = "embedded")]
impl defmt::Format for AudioError {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Self::Timeout => defmt::write!(f, "Timeout"),
            Self::Unavailable => defmt::write!(f, "Unavailable"),
            Self::Io => defmt::write!(f, "Io"),
        }
    }
}

/// Fixed-rate mono sample stream to and from the transceiver
pub trait AudioPort {
    /// Copy whatever samples have arrived into `buf` without blocking
    ///
    /// Returns the number of samples written, possibly 0.
    fn read_available(&mut self, buf: &mut [Sample]) -> usize;

    /// Queue samples for playback, blocking until accepted
    ///
    /// # Errors
    ///
    /// Fails when the port cannot accept the samples within its bounded
    /// wait or the transport reports an error.
    fn write(&mut self, samples: &[Sample]) -> Result<(), AudioError>;
}

/// Debounced channel-busy (squelch open) signal
pub trait ChannelBusy {
    /// Check if the receive channel is carrying a signal
    fn is_busy(&mut self, now_ms: u64) -> bool;
}

/// Received channel strength query
pub trait ChannelStrength {
    /// Latest strength reading; 0 means unavailable
    fn read_strength(&mut self) -> u16;
}

/// Sink the synthesizer pushes sample chunks into
pub type SampleSink<'s> = dyn FnMut(&[Sample]) -> Result<(), AudioError> + 's;

/// Text-to-speech sample generation
pub trait SpeechSynth {
    /// Synthesize `text`, pushing samples into `sink` as they are produced
    ///
    /// # Errors
    ///
    /// Propagates the first error returned by `sink`.
    fn synthesize(&mut self, text: &str, sink: &mut SampleSink<'_>) -> Result<(), AudioError>;
}

/// Speech plus the text services the parrot consults
pub trait Services: SpeechSynth {
    /// Current weather report text
    fn weather_report(&mut self) -> Phrase {
        phrase("weather unavailable")
    }

    /// Expand macro tokens in an operator message
    fn expand(&mut self, template: &str, slots: SlotSummary) -> Phrase {
        let _ = slots;
        phrase(template)
    }
}

/// Services for a board without a speech engine
///
/// Spoken segments produce no audio; everything else uses the defaults.
#[derive(Clone, Copy, Debug, Default)]
pub struct Mute;

impl SpeechSynth for Mute {
    fn synthesize(&mut self, text: &str, _sink: &mut SampleSink<'_>) -> Result<(), AudioError> {
        debug!("speech unavailable, skipping \"{}\"", text);
        Ok(())
    }
}

impl Services for Mute {}

/// Audio port standing in for one that failed to initialize
///
/// Reads return nothing and writes fail, so capture and playback become
/// logged no-ops.
#[derive(Clone, Copy, Debug, Default)]
pub struct Unavailable {
    read_logged: bool,
}

impl Unavailable {
    /// Create the placeholder port
    #[must_use]
    pub const fn new() -> Self {
        Self { read_logged: false }
    }
}

impl AudioPort for Unavailable {
    fn read_available(&mut self, _buf: &mut [Sample]) -> usize {
        if !self.read_logged {
            warn!("audio port unavailable, capture disabled");
            self.read_logged = true;
        }
        0
    }

    fn write(&mut self, samples: &[Sample]) -> Result<(), AudioError> {
        warn!("audio port unavailable, dropping {} samples", samples.len());
        Err(AudioError::Unavailable)
    }
}
