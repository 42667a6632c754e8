//! Transmit Control
//!
//! Sequences one transmission: key the PTT line, wait for the radio to
//! settle, play the program, wait out the tail, unkey. Release always
//! runs, whatever happened to the audio in between, and always drives
//! the line to its idle level.
//!
//! In test mode the line is never asserted; intent is only logged.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;

use crate::config::{ParrotConfig, PttPolarity, QualityTiers, TxTiming, PLAYBACK_CHUNK};
use crate::dsp::oscillator::{amplitude_for_percent, TestPattern, ToneBurst};
use crate::hal::{AudioError, AudioPort, SpeechSynth};
use crate::radio::quality::{QualitySnapshot, CLIPPING_PHRASE};
use crate::types::Sample;

/// Spoken in place of an empty clip or session
pub const NOTHING_TO_PLAY: &str = "no recording";

/// Transmit state machine
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum TxState {
    /// Radio is receiving
    #[default]
    Rx,
    /// PTT asserted, waiting for the radio to settle
    Keying,
    /// Program audio playing
    Tx,
    /// Tail delay before release
    Unkeying,
}

#[cfg(feature = "embedded")]
impl defmt::Format for TxState {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Self::Rx => defmt::write!(f, "RX"),
            Self::Keying => defmt::write!(f, "RX→TX"),
            Self::Tx => defmt::write!(f, "TX"),
            Self::Unkeying => defmt::write!(f, "TX→RX"),
        }
    }
}

/// Optional phrases around a program
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Wrap<'a> {
    /// Spoken before the program
    pub pre: &'a str,
    /// Spoken after the program
    pub post: &'a str,
}

/// What to transmit
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Program<'a> {
    /// Replay the live session followed by signal feedback
    LiveReplay {
        /// Recorded samples
        samples: &'a [Sample],
        /// Statistics driving the feedback
        quality: QualitySnapshot,
        /// Operator messages
        wrap: Wrap<'a>,
    },
    /// Replay a stored clip
    Clip {
        /// Slot index, for logging
        slot: usize,
        /// Clip contents, `None` if the slot is empty
        samples: Option<&'a [Sample]>,
    },
    /// Play the built-in test pattern
    TestClip,
    /// Speak a line of text
    Speech {
        /// Text to speak
        text: &'a str,
        /// Operator messages
        wrap: Wrap<'a>,
    },
}

impl Program<'_> {
    /// Get the program kind
    #[must_use]
    pub const fn kind(&self) -> ProgramKind {
        match self {
            Self::LiveReplay { .. } => ProgramKind::LiveReplay,
            Self::Clip { .. } => ProgramKind::Clip,
            Self::TestClip => ProgramKind::TestClip,
            Self::Speech { .. } => ProgramKind::Speech,
        }
    }
}

/// Program kind without its data
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProgramKind {
    /// Live session replay
    LiveReplay,
    /// Stored clip
    Clip,
    /// Built-in test pattern
    TestClip,
    /// Speech
    Speech,
}

#[cfg(feature = "embedded")]
impl defmt::Format for ProgramKind {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Self::LiveReplay => defmt::write!(f, "live"),
            Self::Clip => defmt::write!(f, "clip"),
            Self::TestClip => defmt::write!(f, "test"),
            Self::Speech => defmt::write!(f, "speech"),
        }
    }
}

/// What happened during a transmission
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TxReport {
    /// Program transmitted
    pub kind: ProgramKind,
    /// Samples accepted by the audio port
    pub samples_written: usize,
    /// Segments cut short by a write failure
    pub write_failures: u32,
    /// PTT line physically asserted (false in test mode)
    pub keyed: bool,
}

impl TxReport {
    const fn new(kind: ProgramKind) -> Self {
        Self {
            kind,
            samples_written: 0,
            write_failures: 0,
            keyed: false,
        }
    }
}

/// Transmit controller
pub struct TxController<P, D> {
    ptt: P,
    delay: D,
    state: TxState,
    polarity: PttPolarity,
    test_mode: bool,
    line_asserted: bool,
    timing: TxTiming,
    tiers: QualityTiers,
    clip_count_warn: u32,
    tone_amplitude: i16,
    speech_percent: u8,
    sample_rate: u32,
}

impl<P: OutputPin, D: DelayNs> TxController<P, D> {
    /// Create a controller and drive the PTT line to idle
    pub fn new(ptt: P, delay: D, config: &ParrotConfig) -> Self {
        let mut this = Self {
            ptt,
            delay,
            state: TxState::Rx,
            polarity: config.ptt_polarity,
            test_mode: config.test_mode,
            line_asserted: false,
            timing: config.timing,
            tiers: config.tiers,
            clip_count_warn: config.clip_count_warn,
            tone_amplitude: amplitude_for_percent(config.tone_volume_percent),
            speech_percent: config.speech_volume_percent.min(100),
            sample_rate: config.sample_rate,
        };
        this.release();
        this
    }

    /// Get current state
    #[must_use]
    pub const fn state(&self) -> TxState {
        self.state
    }

    /// Check if transmitting
    #[must_use]
    pub const fn is_transmitting(&self) -> bool {
        !matches!(self.state, TxState::Rx)
    }

    /// Check if the PTT line is currently driven to its asserted level
    #[must_use]
    pub const fn is_line_asserted(&self) -> bool {
        self.line_asserted
    }

    /// Get test mode
    #[must_use]
    pub const fn test_mode(&self) -> bool {
        self.test_mode
    }

    /// Block for `ms` milliseconds
    pub fn pause(&mut self, ms: u32) {
        if ms > 0 {
            self.delay.delay_ms(ms);
        }
    }

    /// Assert PTT, unless in test mode
    pub fn key(&mut self) {
        self.state = TxState::Keying;
        if self.test_mode {
            info!("PTT ON (disabled - test mode)");
        } else {
            self.drive(true);
            info!("PTT ON");
        }
    }

    /// Drive PTT to idle; safe to call any number of times
    pub fn release(&mut self) {
        self.drive(false);
        self.state = TxState::Rx;
        info!("PTT OFF");
    }

    fn drive(&mut self, asserted: bool) {
        let high = match self.polarity {
            PttPolarity::ActiveLow => !asserted,
            PttPolarity::ActiveHigh => asserted,
        };
        let result = if high {
            self.ptt.set_high()
        } else {
            self.ptt.set_low()
        };
        if result.is_err() {
            error!("PTT line write failed (asserted={})", asserted);
        }
        self.line_asserted = asserted;
    }

    /// Run one complete keyed transmission
    pub fn transmit<A, S>(&mut self, audio: &mut A, synth: &mut S, program: Program<'_>) -> TxReport
    where
        A: AudioPort,
        S: SpeechSynth + ?Sized,
    {
        let kind = program.kind();
        let mut report = TxReport::new(kind);
        let (settle_ms, tail_ms) = match kind {
            ProgramKind::LiveReplay => (self.timing.live_settle_ms, self.timing.tail_ms),
            ProgramKind::Clip => (self.timing.clip_settle_ms, self.timing.tail_ms),
            ProgramKind::TestClip => (self.timing.test_settle_ms, self.timing.tail_ms),
            ProgramKind::Speech => (self.timing.speech_settle_ms, self.timing.speech_tail_ms),
        };

        info!("transmit {:?}", kind);
        self.key();
        report.keyed = self.line_asserted;
        self.pause(settle_ms);
        self.state = TxState::Tx;

        match program {
            Program::LiveReplay {
                samples,
                quality,
                wrap,
            } => {
                self.speak(audio, synth, wrap.pre, &mut report);
                if samples.is_empty() {
                    self.speak(audio, synth, NOTHING_TO_PLAY, &mut report);
                } else {
                    self.stream(audio, samples, &mut report);
                }
                self.pause(self.timing.feedback_gap_ms);
                self.feedback(audio, synth, &quality, &mut report);
                self.speak(audio, synth, wrap.post, &mut report);
            }
            Program::Clip { slot, samples } => match samples {
                Some(clip) if !clip.is_empty() => {
                    info!("playing slot {} ({} samples)", slot, clip.len());
                    self.stream(audio, clip, &mut report);
                }
                _ => {
                    info!("slot {} is empty", slot);
                    self.speak(audio, synth, NOTHING_TO_PLAY, &mut report);
                }
            },
            Program::TestClip => self.play_test_pattern(audio, &mut report),
            Program::Speech { text, wrap } => {
                self.speak(audio, synth, wrap.pre, &mut report);
                self.speak(audio, synth, text, &mut report);
                self.speak(audio, synth, wrap.post, &mut report);
            }
        }

        self.state = TxState::Unkeying;
        self.pause(tail_ms);
        self.release();
        info!(
            "transmit done: {} samples, {} write failures",
            report.samples_written,
            report.write_failures
        );
        report
    }

    fn stream<A: AudioPort>(&mut self, audio: &mut A, samples: &[Sample], report: &mut TxReport) {
        for chunk in samples.chunks(PLAYBACK_CHUNK) {
            if let Err(e) = audio.write(chunk) {
                error!("audio write failed: {:?}", e);
                report.write_failures += 1;
                return;
            }
            report.samples_written += chunk.len();
        }
    }

    fn play_tone<A: AudioPort>(
        &mut self,
        audio: &mut A,
        freq_hz: u32,
        duration_ms: u32,
        report: &mut TxReport,
    ) {
        let mut burst = ToneBurst::new(freq_hz, duration_ms, self.tone_amplitude, self.sample_rate);
        let mut chunk = [0 as Sample; PLAYBACK_CHUNK];
        loop {
            let n = burst.fill(&mut chunk);
            if n == 0 {
                break;
            }
            if let Err(e) = audio.write(&chunk[..n]) {
                error!("tone write failed: {:?}", e);
                report.write_failures += 1;
                return;
            }
            report.samples_written += n;
        }
    }

    fn play_test_pattern<A: AudioPort>(&mut self, audio: &mut A, report: &mut TxReport) {
        info!("playing built-in test clip");
        let mut pattern = TestPattern::new(self.tone_amplitude, self.sample_rate);
        let mut chunk = [0 as Sample; PLAYBACK_CHUNK];
        loop {
            let n = pattern.fill(&mut chunk);
            if n == 0 {
                break;
            }
            if let Err(e) = audio.write(&chunk[..n]) {
                error!("test clip write failed: {:?}", e);
                report.write_failures += 1;
                return;
            }
            report.samples_written += n;
        }
    }

    fn speak<A, S>(&mut self, audio: &mut A, synth: &mut S, text: &str, report: &mut TxReport)
    where
        A: AudioPort,
        S: SpeechSynth + ?Sized,
    {
        if text.is_empty() {
            return;
        }
        debug!("speaking \"{}\"", text);
        let gain = i32::from(self.speech_percent);
        let mut written = 0;
        let result = synth.synthesize(text, &mut |samples: &[Sample]| -> Result<(), AudioError> {
            let mut scaled = [0 as Sample; PLAYBACK_CHUNK];
            for chunk in samples.chunks(PLAYBACK_CHUNK) {
                for (out, &s) in scaled.iter_mut().zip(chunk) {
                    *out = (i32::from(s) * gain / 100) as Sample;
                }
                audio.write(&scaled[..chunk.len()])?;
                written += chunk.len();
            }
            Ok(())
        });
        report.samples_written += written;
        if let Err(e) = result {
            error!("speech write failed: {:?}", e);
            report.write_failures += 1;
        }
    }

    fn feedback<A, S>(
        &mut self,
        audio: &mut A,
        synth: &mut S,
        quality: &QualitySnapshot,
        report: &mut TxReport,
    ) where
        A: AudioPort,
        S: SpeechSynth + ?Sized,
    {
        let tier = quality.tier(&self.tiers);
        info!(
            "signal feedback {:?}: peak strength {}, clipped {}",
            tier,
            quality.peak_strength,
            quality.clipped_samples
        );
        let cadence = tier.cadence();
        for i in 0..cadence.count {
            if i > 0 {
                self.pause(self.timing.cadence_gap_ms);
            }
            self.play_tone(audio, cadence.freq_hz, cadence.tone_ms, report);
        }
        self.speak(audio, synth, tier.phrase(), report);

        if quality.is_clipping(self.clip_count_warn) {
            self.pause(self.timing.clip_warning_pause_ms);
            self.speak(audio, synth, CLIPPING_PHRASE, report);
        }
    }

    /// Release the PTT pin and delay provider
    pub fn free(self) -> (P, D) {
        (self.ptt, self.delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::SampleSink;
    use core::convert::Infallible;
    use embedded_hal::digital::ErrorType;

    #[derive(Default)]
    struct Line {
        history: Vec<bool>,
    }

    impl ErrorType for Line {
        type Error = Infallible;
    }

    impl OutputPin for Line {
        fn set_low(&mut self) -> Result<(), Infallible> {
            self.history.push(false);
            Ok(())
        }

        fn set_high(&mut self) -> Result<(), Infallible> {
            self.history.push(true);
            Ok(())
        }
    }

    #[derive(Default)]
    struct Clock {
        elapsed_ms: u64,
    }

    impl DelayNs for Clock {
        fn delay_ns(&mut self, ns: u32) {
            self.elapsed_ms += u64::from(ns / 1_000_000);
        }

        fn delay_ms(&mut self, ms: u32) {
            self.elapsed_ms += u64::from(ms);
        }
    }

    #[derive(Default)]
    struct Sink {
        samples: Vec<Sample>,
        fail_after: Option<usize>,
    }

    impl AudioPort for Sink {
        fn read_available(&mut self, _buf: &mut [Sample]) -> usize {
            0
        }

        fn write(&mut self, samples: &[Sample]) -> Result<(), AudioError> {
            if let Some(limit) = self.fail_after {
                if self.samples.len() + samples.len() > limit {
                    return Err(AudioError::Timeout);
                }
            }
            self.samples.extend_from_slice(samples);
            Ok(())
        }
    }

    #[derive(Default)]
    struct Words {
        spoken: Vec<String>,
    }

    impl SpeechSynth for Words {
        fn synthesize(&mut self, text: &str, sink: &mut SampleSink<'_>) -> Result<(), AudioError> {
            self.spoken.push(text.to_string());
            sink(&[4_000; 100])
        }
    }

    fn controller(config: &ParrotConfig) -> TxController<Line, Clock> {
        TxController::new(Line::default(), Clock::default(), config)
    }

    #[test]
    fn new_drives_line_idle() {
        let tx = controller(&ParrotConfig::default());
        let (line, _) = tx.free();
        // active low: idle is high
        assert_eq!(line.history, vec![true]);
    }

    #[test]
    fn release_is_idempotent() {
        let mut tx = controller(&ParrotConfig::default());
        tx.release();
        tx.release();
        assert!(!tx.is_line_asserted());
        assert_eq!(tx.state(), TxState::Rx);
        let (line, _) = tx.free();
        assert_eq!(line.history, vec![true, true, true]);
    }

    #[test]
    fn clip_sequence_keys_settles_and_releases() {
        let mut tx = controller(&ParrotConfig::default());
        let mut audio = Sink::default();
        let mut synth = Words::default();
        let clip = [7i16; 600];
        let report = tx.transmit(
            &mut audio,
            &mut synth,
            Program::Clip {
                slot: 3,
                samples: Some(&clip),
            },
        );
        assert!(report.keyed);
        assert_eq!(report.samples_written, 600);
        assert_eq!(audio.samples, clip.to_vec());
        let (line, clock) = tx.free();
        assert_eq!(line.history, vec![true, false, true]);
        assert_eq!(clock.elapsed_ms, 600 + 300);
    }

    #[test]
    fn empty_clip_speaks_notice() {
        let mut tx = controller(&ParrotConfig::default());
        let mut audio = Sink::default();
        let mut synth = Words::default();
        tx.transmit(&mut audio, &mut synth, Program::Clip { slot: 0, samples: None });
        assert_eq!(synth.spoken, vec![NOTHING_TO_PLAY.to_string()]);
        // speech is scaled to 25%
        assert!(audio.samples.iter().all(|&s| s == 1_000));
    }

    #[test]
    fn test_mode_never_asserts() {
        let config = ParrotConfig {
            test_mode: true,
            ..ParrotConfig::default()
        };
        let mut tx = controller(&config);
        let mut audio = Sink::default();
        let report = tx.transmit(&mut audio, &mut Words::default(), Program::TestClip);
        assert!(!report.keyed);
        assert!(!audio.samples.is_empty());
        let (line, _) = tx.free();
        assert!(line.history.iter().all(|&high| high));
    }

    #[test]
    fn write_failure_still_releases() {
        let mut tx = controller(&ParrotConfig::default());
        let mut audio = Sink {
            fail_after: Some(300),
            ..Sink::default()
        };
        let clip = [1i16; 1_000];
        let report = tx.transmit(
            &mut audio,
            &mut Words::default(),
            Program::Clip {
                slot: 0,
                samples: Some(&clip),
            },
        );
        assert_eq!(report.write_failures, 1);
        assert_eq!(report.samples_written, 256);
        assert_eq!(tx.state(), TxState::Rx);
        assert!(!tx.is_line_asserted());
    }

    #[test]
    fn live_replay_adds_feedback_and_clipping_warning() {
        let mut tx = controller(&ParrotConfig::default());
        let mut audio = Sink::default();
        let mut synth = Words::default();
        let quality = QualitySnapshot {
            peak_strength: 125,
            trough_strength: Some(90),
            peak_level: 1.0,
            clipped_samples: 500,
        };
        tx.transmit(
            &mut audio,
            &mut synth,
            Program::LiveReplay {
                samples: &[5; 512],
                quality,
                wrap: Wrap {
                    pre: "parrot",
                    post: "",
                },
            },
        );
        assert_eq!(
            synth.spoken,
            vec![
                "parrot".to_string(),
                "good signal".to_string(),
                CLIPPING_PHRASE.to_string()
            ]
        );
        let (_, clock) = tx.free();
        // settle + feedback gap + one cadence gap + clipping pause + tail
        assert_eq!(clock.elapsed_ms, 300 + 500 + 100 + 300 + 300);
    }
}
