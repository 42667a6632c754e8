//! Main Control Loop
//!
//! [`Parrot`] owns the recorder, the clip store and the transmit
//! controller, and is advanced by one [`Parrot::poll`] per loop
//! iteration. Each poll reads the channel-busy signal, runs the recorder
//! on busy edges, polls channel strength while busy and, once a session
//! is kept, turns its command symbol into an [`Action`] and transmits.

use core::fmt;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;

use crate::buffer::SampleArena;
use crate::config::{ConfigError, ParrotConfig, CAPTURE_CHUNK};
use crate::hal::{AudioPort, ChannelBusy, ChannelStrength, Services};
use crate::radio::clips::ClipStore;
use crate::radio::recorder::{Finalized, Recorder, RecordingReport, StopReason};
use crate::radio::transmit::{Program, TxController, TxReport, Wrap};
use crate::types::{phrase, AllocError, Phrase, Sample, Symbol};

/// Spoken ahead of the weather report
pub const WEATHER_PREFIX: &str = "Weather report, ";

/// What a kept recording asks for
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Action {
    /// `9`: play the built-in test clip
    TestClip,
    /// `1`-`8`: play a stored clip
    PlayClip(usize),
    /// `*`: speak the weather report
    Weather,
    /// `#`: speak the configured message
    HashMessage,
    /// Anything else: store the recording and replay it with feedback
    StoreAndReplay {
        /// Slot the recording is saved to
        slot: usize,
    },
}

impl Action {
    /// Map a decoded symbol to an action
    ///
    /// `next_slot` is the clip slot a store would write.
    #[must_use]
    pub fn for_symbol(symbol: Option<Symbol>, next_slot: usize) -> Self {
        match symbol.map(Symbol::as_char) {
            Some('9') => Self::TestClip,
            Some(ch @ '1'..='8') => Self::PlayClip(usize::from(ch as u8 - b'1')),
            Some('*') => Self::Weather,
            Some('#') => Self::HashMessage,
            _ => Self::StoreAndReplay { slot: next_slot },
        }
    }
}

#[cfg(feature = "embedded")]
impl defmt::Format for Action {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Self::TestClip => defmt::write!(f, "TestClip"),
            Self::PlayClip(slot) => defmt::write!(f, "PlayClip({})", slot),
            Self::Weather => defmt::write!(f, "Weather"),
            Self::HashMessage => defmt::write!(f, "HashMessage"),
            Self::StoreAndReplay { slot } => defmt::write!(f, "StoreAndReplay({})", slot),
        }
    }
}

/// What a poll did
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum LoopEvent {
    /// Nothing recording
    Idle,
    /// A session started on this poll
    Started,
    /// A session is in progress
    Capturing,
    /// The session ended as a squelch artifact
    Discarded(RecordingReport),
    /// The session was kept and acted on
    Dispatched {
        /// Action taken
        action: Action,
        /// Finished session
        report: RecordingReport,
        /// Transmission, `None` if nothing was keyed
        tx: Option<TxReport>,
    },
}

/// Failure to bring up the engine
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StartupError {
    /// Configuration rejected
    Config(ConfigError),
    /// No room for the live capture buffer
    LiveBuffer(AllocError),
}

impl fmt::Display for StartupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(e) => write!(f, "invalid configuration: {e}"),
            Self::LiveBuffer(e) => write!(f, "live buffer allocation failed: {e}"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for StartupError {}

#[cfg(feature = "embedded")]
impl defmt::Format for StartupError {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Self::Config(e) => defmt::write!(f, "Config({})", e),
            Self::LiveBuffer(e) => defmt::write!(f, "LiveBuffer({})", e),
        }
    }
}

impl From<ConfigError> for StartupError {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

impl From<AllocError> for StartupError {
    fn from(e: AllocError) -> Self {
        Self::LiveBuffer(e)
    }
}

/// The parrot engine
pub struct Parrot<'a, Sq, Rs, A, P, D, Sv> {
    config: ParrotConfig,
    recorder: Recorder<'a>,
    clips: ClipStore<'a>,
    squelch: Sq,
    strength: Rs,
    audio: A,
    tx: TxController<P, D>,
    services: Sv,
    was_busy: bool,
    next_strength_ms: u64,
    capture: [Sample; CAPTURE_CHUNK],
}

impl<'a, Sq, Rs, A, P, D, Sv> Parrot<'a, Sq, Rs, A, P, D, Sv>
where
    Sq: ChannelBusy,
    Rs: ChannelStrength,
    A: AudioPort,
    P: OutputPin,
    D: DelayNs,
    Sv: Services,
{
    /// Validate the configuration, carve the buffers and release PTT
    ///
    /// The live buffer is taken from the arena first, then the clip
    /// slots; missing clip slots only degrade the store.
    ///
    /// # Errors
    ///
    /// Returns [`StartupError`] if the configuration is invalid or the
    /// live buffer does not fit the arena.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: ParrotConfig,
        arena: &mut SampleArena<'a>,
        squelch: Sq,
        strength: Rs,
        audio: A,
        ptt: P,
        delay: D,
        services: Sv,
    ) -> Result<Self, StartupError> {
        config.validate()?;
        let recorder = Recorder::new(arena, &config).map_err(|e| {
            error!(
                "live buffer needs {} samples, arena has {}",
                e.requested,
                e.available
            );
            StartupError::LiveBuffer(e)
        })?;
        let clips = ClipStore::allocate(arena, config.clip_slots, config.live_capacity());
        let tx = TxController::new(ptt, delay, &config);
        info!(
            "parrot ready: {} Hz, {} s cap, {} clip slots, test mode {}",
            config.sample_rate,
            config.max_recording_secs,
            clips.len(),
            config.test_mode
        );
        Ok(Self {
            config,
            recorder,
            clips,
            squelch,
            strength,
            audio,
            tx,
            services,
            was_busy: false,
            next_strength_ms: 0,
            capture: [0; CAPTURE_CHUNK],
        })
    }

    /// Run one loop iteration
    pub fn poll(&mut self, now_ms: u64) -> LoopEvent {
        let busy = self.squelch.is_busy(now_ms);
        let mut event = LoopEvent::Idle;

        if busy && !self.was_busy && !self.recorder.is_recording() {
            self.recorder.start(now_ms);
            self.next_strength_ms = now_ms;
            event = LoopEvent::Started;
        }

        if busy && self.recorder.is_recording() && now_ms >= self.next_strength_ms {
            let reading = self.strength.read_strength();
            trace!("strength {}", reading);
            self.recorder.record_strength(reading);
            self.next_strength_ms = now_ms + u64::from(self.config.strength_poll_ms);
        }

        if self.recorder.is_recording() {
            if busy {
                self.capture_tick();
                if event == LoopEvent::Idle {
                    event = LoopEvent::Capturing;
                }
            }
            if !busy {
                event = self.finish(StopReason::Released, now_ms);
            } else if self.recorder.is_timed_out(now_ms) {
                info!("recording cap reached while channel busy");
                event = self.finish(StopReason::TimedOut, now_ms);
            }
        } else {
            self.drain();
        }

        self.was_busy = busy;
        event
    }

    /// Read up to one chunk of input into the recorder
    fn capture_tick(&mut self) {
        let n = self.audio.read_available(&mut self.capture);
        if n > 0 {
            self.recorder.ingest(&self.capture[..n]);
        }
    }

    /// Discard input that arrives while nothing is recording
    fn drain(&mut self) {
        while self.audio.read_available(&mut self.capture) == CAPTURE_CHUNK {}
    }

    fn finish(&mut self, reason: StopReason, now_ms: u64) -> LoopEvent {
        match self.recorder.stop(reason, now_ms) {
            None => LoopEvent::Idle,
            Some(Finalized::Discarded(report)) => LoopEvent::Discarded(report),
            Some(Finalized::Completed(report)) => {
                let action = Action::for_symbol(report.symbol, self.clips.next_index());
                info!("dispatching {:?} for symbol {:?}", action, report.symbol);
                self.tx.pause(self.config.turnaround_ms);
                let tx = self.dispatch(action, &report);
                LoopEvent::Dispatched { action, report, tx }
            }
        }
    }

    fn dispatch(&mut self, action: Action, report: &RecordingReport) -> Option<TxReport> {
        match action {
            Action::TestClip => {
                Some(self.tx.transmit(&mut self.audio, &mut self.services, Program::TestClip))
            }
            Action::PlayClip(slot) => {
                let program = Program::Clip {
                    slot,
                    samples: self.clips.get(slot),
                };
                Some(self.tx.transmit(&mut self.audio, &mut self.services, program))
            }
            Action::Weather => {
                let weather = self.services.weather_report();
                let mut text = phrase(WEATHER_PREFIX);
                append(&mut text, &weather);
                Some(self.speak(&text))
            }
            Action::HashMessage => {
                if self.config.messages.hash.is_empty() {
                    info!("no hash message configured");
                    return None;
                }
                let text = self
                    .services
                    .expand(&self.config.messages.hash, self.clips.summary());
                Some(self.speak(&text))
            }
            Action::StoreAndReplay { .. } => {
                let saved = self.clips.save(self.recorder.samples());
                debug!("session stored in slot {}", saved.slot);
                let (pre, post) = self.wrap_messages();
                let program = Program::LiveReplay {
                    samples: self.recorder.samples(),
                    quality: report.quality,
                    wrap: Wrap {
                        pre: &pre,
                        post: &post,
                    },
                };
                Some(self.tx.transmit(&mut self.audio, &mut self.services, program))
            }
        }
    }

    fn speak(&mut self, text: &str) -> TxReport {
        let (pre, post) = self.wrap_messages();
        let program = Program::Speech {
            text,
            wrap: Wrap {
                pre: &pre,
                post: &post,
            },
        };
        self.tx.transmit(&mut self.audio, &mut self.services, program)
    }

    fn wrap_messages(&mut self) -> (Phrase, Phrase) {
        let summary = self.clips.summary();
        let pre = self.services.expand(&self.config.messages.pre, summary);
        let post = self.services.expand(&self.config.messages.post, summary);
        (pre, post)
    }

    /// Get the configuration
    #[must_use]
    pub const fn config(&self) -> &ParrotConfig {
        &self.config
    }

    /// Get the recorder
    #[must_use]
    pub const fn recorder(&self) -> &Recorder<'a> {
        &self.recorder
    }

    /// Get the clip store
    #[must_use]
    pub const fn clips(&self) -> &ClipStore<'a> {
        &self.clips
    }

    /// Get the clip store for seeding or maintenance
    pub fn clips_mut(&mut self) -> &mut ClipStore<'a> {
        &mut self.clips
    }

    /// Get the transmit controller
    #[must_use]
    pub const fn tx(&self) -> &TxController<P, D> {
        &self.tx
    }

    /// Get the services
    pub fn services_mut(&mut self) -> &mut Sv {
        &mut self.services
    }

    /// Get the audio port
    pub fn audio_mut(&mut self) -> &mut A {
        &mut self.audio
    }
}

/// Append `tail` to `text`, truncating at a character boundary
fn append(text: &mut Phrase, tail: &str) {
    for ch in tail.chars() {
        if text.push(ch).is_err() {
            break;
        }
    }
}
