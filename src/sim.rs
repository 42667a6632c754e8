//! Host Simulation Bench
//!
//! Software stand-ins for every collaborator the parrot drives, sharing
//! one virtual clock. Delays and audio writes advance the clock; audio
//! input is generated from a signal function of the sample index and
//! becomes readable as virtual time passes, the way a DMA ring fills on
//! the board.

use std::cell::{Cell, RefCell};
use std::convert::Infallible;
use std::rc::Rc;
use std::boxed::Box;
use std::string::{String, ToString};
use std::vec::Vec;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{ErrorType, InputPin, OutputPin};

use crate::buffer::SampleArena;
use crate::config::ParrotConfig;
use crate::hal::{AudioError, AudioPort, ChannelBusy, ChannelStrength, SampleSink, Services, SpeechSynth};
use crate::radio::clips::SlotSummary;
use crate::radio::control::{LoopEvent, Parrot, StartupError};
use crate::types::{phrase, Phrase, Sample};

const NS_PER_MS: u64 = 1_000_000;
const NS_PER_S: u64 = 1_000_000_000;

/// Samples the simulated capture ring holds before overrunning
pub const DMA_DEPTH: usize = 2_048;

/// Shared virtual clock
#[derive(Clone, Debug, Default)]
pub struct SimClock {
    ns: Rc<Cell<u64>>,
}

impl SimClock {
    /// Create a clock at zero
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current time in milliseconds
    #[must_use]
    pub fn now_ms(&self) -> u64 {
        self.ns.get() / NS_PER_MS
    }

    /// Current time in nanoseconds
    #[must_use]
    pub fn now_ns(&self) -> u64 {
        self.ns.get()
    }

    /// Move the clock forward
    pub fn advance_ms(&self, ms: u64) {
        self.advance_ns(ms * NS_PER_MS);
    }

    /// Move the clock forward
    pub fn advance_ns(&self, ns: u64) {
        self.ns.set(self.ns.get() + ns);
    }

    /// Delay provider on this clock
    #[must_use]
    pub fn delay(&self) -> SimDelay {
        SimDelay {
            clock: self.clone(),
        }
    }
}

/// Delay that advances the virtual clock instead of sleeping
#[derive(Clone, Debug)]
pub struct SimDelay {
    clock: SimClock,
}

impl DelayNs for SimDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.clock.advance_ns(u64::from(ns));
    }

    fn delay_ms(&mut self, ms: u32) {
        self.clock.advance_ms(u64::from(ms));
    }
}

/// GPIO line recording every level driven onto it
///
/// Clones share the line, so a test can keep one to inspect.
#[derive(Clone, Debug, Default)]
pub struct SimPin {
    levels: Rc<RefCell<Vec<bool>>>,
}

impl SimPin {
    /// Create an undriven line
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every level driven so far, high = true
    #[must_use]
    pub fn history(&self) -> Vec<bool> {
        self.levels.borrow().clone()
    }

    /// Last level driven, `None` if never driven
    #[must_use]
    pub fn level(&self) -> Option<bool> {
        self.levels.borrow().last().copied()
    }
}

impl ErrorType for SimPin {
    type Error = Infallible;
}

impl OutputPin for SimPin {
    fn set_low(&mut self) -> Result<(), Infallible> {
        self.levels.borrow_mut().push(false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Infallible> {
        self.levels.borrow_mut().push(true);
        Ok(())
    }
}

impl InputPin for SimPin {
    fn is_high(&mut self) -> Result<bool, Infallible> {
        Ok(self.level().unwrap_or(false))
    }

    fn is_low(&mut self) -> Result<bool, Infallible> {
        Ok(!self.level().unwrap_or(false))
    }
}

/// Signal generator: sample value at an absolute sample index
pub type Signal = Box<dyn FnMut(u64) -> Sample>;

/// Sine of `amplitude` at `freq_hz`, evaluated at sample `index`
#[must_use]
pub fn sine(freq_hz: f64, amplitude: f64, index: u64, sample_rate: u32) -> f64 {
    let t = index as f64 / f64::from(sample_rate);
    amplitude * (2.0 * std::f64::consts::PI * freq_hz * t).sin()
}

/// Audio port driven by the virtual clock
pub struct SimAudio {
    clock: SimClock,
    sample_rate: u32,
    signal: Signal,
    cursor: u64,
    played: Rc<RefCell<Vec<Sample>>>,
    overruns: u64,
    fail_writes: bool,
}

impl SimAudio {
    /// Create a port whose input follows `signal`
    pub fn new(clock: SimClock, sample_rate: u32, signal: impl FnMut(u64) -> Sample + 'static) -> Self {
        Self {
            clock,
            sample_rate,
            signal: Box::new(signal),
            cursor: 0,
            played: Rc::new(RefCell::new(Vec::new())),
            overruns: 0,
            fail_writes: false,
        }
    }

    /// Make every write fail
    #[must_use]
    pub fn failing(mut self) -> Self {
        self.fail_writes = true;
        self
    }

    /// Handle on everything played so far
    #[must_use]
    pub fn played(&self) -> Rc<RefCell<Vec<Sample>>> {
        Rc::clone(&self.played)
    }

    /// Input samples lost to ring overruns
    #[must_use]
    pub const fn overruns(&self) -> u64 {
        self.overruns
    }

    fn due(&self) -> u64 {
        self.clock.now_ns() * u64::from(self.sample_rate) / NS_PER_S
    }
}

impl AudioPort for SimAudio {
    fn read_available(&mut self, buf: &mut [Sample]) -> usize {
        let due = self.due();
        let depth = DMA_DEPTH as u64;
        if due.saturating_sub(self.cursor) > depth {
            self.overruns += due - self.cursor - depth;
            self.cursor = due - depth;
        }
        let n = (due.saturating_sub(self.cursor) as usize).min(buf.len());
        for slot in &mut buf[..n] {
            *slot = (self.signal)(self.cursor);
            self.cursor += 1;
        }
        n
    }

    fn write(&mut self, samples: &[Sample]) -> Result<(), AudioError> {
        if self.fail_writes {
            return Err(AudioError::Timeout);
        }
        self.played.borrow_mut().extend_from_slice(samples);
        self.clock
            .advance_ns(samples.len() as u64 * NS_PER_S / u64::from(self.sample_rate));
        Ok(())
    }
}

/// Squelch open during fixed windows of virtual time
#[derive(Clone, Debug, Default)]
pub struct SimSquelch {
    windows: Vec<(u64, u64)>,
}

impl SimSquelch {
    /// Busy for `start_ms <= now < end_ms` of each window
    #[must_use]
    pub fn new(windows: &[(u64, u64)]) -> Self {
        Self {
            windows: windows.to_vec(),
        }
    }
}

impl ChannelBusy for SimSquelch {
    fn is_busy(&mut self, now_ms: u64) -> bool {
        self.windows
            .iter()
            .any(|&(start, end)| (start..end).contains(&now_ms))
    }
}

/// Strength meter returning a constant reading
#[derive(Clone, Debug, Default)]
pub struct SimStrength {
    value: u16,
    reads: Rc<Cell<u32>>,
}

impl SimStrength {
    /// Always read `value`
    #[must_use]
    pub fn new(value: u16) -> Self {
        Self {
            value,
            reads: Rc::new(Cell::new(0)),
        }
    }

    /// Handle on the read count
    #[must_use]
    pub fn reads(&self) -> Rc<Cell<u32>> {
        Rc::clone(&self.reads)
    }
}

impl ChannelStrength for SimStrength {
    fn read_strength(&mut self) -> u16 {
        self.reads.set(self.reads.get() + 1);
        self.value
    }
}

/// Services that record what was spoken
///
/// Speech produces a fixed number of samples per character. Message
/// templates expand `{slot}`, `{used}` and `{total}`.
#[derive(Clone, Debug)]
pub struct ScriptedServices {
    spoken: Rc<RefCell<Vec<String>>>,
    weather: String,
    samples_per_char: usize,
}

impl ScriptedServices {
    /// Create services reporting `weather`
    #[must_use]
    pub fn new(weather: &str) -> Self {
        Self {
            spoken: Rc::new(RefCell::new(Vec::new())),
            weather: weather.to_string(),
            samples_per_char: 32,
        }
    }

    /// Handle on every phrase spoken so far
    #[must_use]
    pub fn spoken(&self) -> Rc<RefCell<Vec<String>>> {
        Rc::clone(&self.spoken)
    }
}

impl Default for ScriptedServices {
    fn default() -> Self {
        Self::new("sunny, 20 degrees")
    }
}

impl SpeechSynth for ScriptedServices {
    fn synthesize(&mut self, text: &str, sink: &mut SampleSink<'_>) -> Result<(), AudioError> {
        self.spoken.borrow_mut().push(text.to_string());
        let mut remaining = text.chars().count() * self.samples_per_char;
        let chunk = [4_000 as Sample; 128];
        while remaining > 0 {
            let n = remaining.min(chunk.len());
            sink(&chunk[..n])?;
            remaining -= n;
        }
        Ok(())
    }
}

impl Services for ScriptedServices {
    fn weather_report(&mut self) -> Phrase {
        phrase(&self.weather)
    }

    fn expand(&mut self, template: &str, slots: SlotSummary) -> Phrase {
        let text = template
            .replace("{slot}", &slots.next_slot.to_string())
            .replace("{used}", &slots.used.to_string())
            .replace("{total}", &slots.total.to_string());
        phrase(&text)
    }
}

/// Parrot wired to the bench
pub type SimParrot<'a> = Parrot<'a, SimSquelch, SimStrength, SimAudio, SimPin, SimDelay, ScriptedServices>;

/// Bench handles kept by a test after the parrot takes ownership
pub struct Probes {
    /// Virtual clock
    pub clock: SimClock,
    /// PTT line
    pub ptt: SimPin,
    /// Audio played
    pub played: Rc<RefCell<Vec<Sample>>>,
    /// Phrases spoken
    pub spoken: Rc<RefCell<Vec<String>>>,
    /// Strength reads
    pub strength_reads: Rc<Cell<u32>>,
}

/// Build a parrot on the bench
///
/// # Errors
///
/// Returns [`StartupError`] from [`Parrot::new`].
pub fn build<'a>(
    config: ParrotConfig,
    arena: &mut SampleArena<'a>,
    clock: &SimClock,
    squelch: SimSquelch,
    strength: SimStrength,
    audio: SimAudio,
    services: ScriptedServices,
) -> Result<(SimParrot<'a>, Probes), StartupError> {
    let ptt = SimPin::new();
    let probes = Probes {
        clock: clock.clone(),
        ptt: ptt.clone(),
        played: audio.played(),
        spoken: services.spoken(),
        strength_reads: strength.reads(),
    };
    let parrot = Parrot::new(
        config,
        arena,
        squelch,
        strength,
        audio,
        ptt,
        clock.delay(),
        services,
    )?;
    Ok((parrot, probes))
}

/// Poll every `step_ms` of virtual time until `until_ms`
///
/// Returns the events other than idle and capturing polls.
pub fn run_until(parrot: &mut SimParrot<'_>, clock: &SimClock, until_ms: u64, step_ms: u64) -> Vec<LoopEvent> {
    let mut events = Vec::new();
    while clock.now_ms() < until_ms {
        let event = parrot.poll(clock.now_ms());
        if !matches!(event, LoopEvent::Idle | LoopEvent::Capturing) {
            events.push(event);
        }
        clock.advance_ms(step_ms);
    }
    events
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn audio_input_follows_clock_and_overruns() {
        let clock = SimClock::new();
        let mut audio = SimAudio::new(clock.clone(), 1_000, |i| i as Sample);
        let mut buf = [0 as Sample; 16];
        assert_eq!(audio.read_available(&mut buf), 0);
        clock.advance_ms(10);
        assert_eq!(audio.read_available(&mut buf), 10);
        assert_eq!(&buf[..3], &[0, 1, 2]);
        clock.advance_ms(5_000);
        let mut big = vec![0 as Sample; 4_096];
        assert_eq!(audio.read_available(&mut big), DMA_DEPTH);
        assert!(audio.overruns() > 0);
    }

    #[test]
    fn writes_take_real_time() {
        let clock = SimClock::new();
        let mut audio = SimAudio::new(clock.clone(), 8_000, |_| 0);
        audio.write(&[0; 8_000]).unwrap();
        assert_eq!(clock.now_ms(), 1_000);
        assert_eq!(audio.played().borrow().len(), 8_000);
    }

    #[test]
    fn squelch_windows_are_half_open() {
        let mut sq = SimSquelch::new(&[(100, 200)]);
        assert!(!sq.is_busy(99));
        assert!(sq.is_busy(100));
        assert!(sq.is_busy(199));
        assert!(!sq.is_busy(200));
    }

    #[test]
    fn scripted_expansion() {
        let mut services = ScriptedServices::default();
        let summary = SlotSummary {
            next_slot: 3,
            used: 2,
            total: 8,
        };
        assert_eq!(
            services.expand("slot {slot} of {total}", summary).as_str(),
            "slot 3 of 8"
        );
    }
}
