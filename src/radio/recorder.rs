//! Recording State Machine
//!
//! Owns the live capture buffer. A session starts when the channel goes
//! busy and ends when it goes idle or the recording cap is reached.
//! While recording, incoming samples feed the quality accumulator and,
//! every tone-block's worth of new samples, the tone decoder. The first
//! command symbol decoded in a session is kept.

use crate::buffer::{SampleArena, SampleBuffer};
use crate::config::ParrotConfig;
use crate::dsp::tone_decoder::{ToneDecoder, ToneFrequencyTable};
use crate::radio::quality::{QualityAccumulator, QualitySnapshot};
use crate::types::{AllocError, Sample, Symbol};

/// Recorder state
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum RecorderState {
    /// Waiting for the channel to go busy
    #[default]
    Idle,
    /// Capturing into the live buffer
    Recording,
}

#[cfg(feature = "embedded")]
impl defmt::Format for RecorderState {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Self::Idle => defmt::write!(f, "IDLE"),
            Self::Recording => defmt::write!(f, "REC"),
        }
    }
}

/// Why a session ended
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopReason {
    /// Channel went idle
    Released,
    /// Recording cap reached while still busy
    TimedOut,
}

#[cfg(feature = "embedded")]
impl defmt::Format for StopReason {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Self::Released => defmt::write!(f, "released"),
            Self::TimedOut => defmt::write!(f, "timeout"),
        }
    }
}

/// Summary of a finished session
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RecordingReport {
    /// Samples captured
    pub samples: usize,
    /// First command symbol decoded
    pub symbol: Option<Symbol>,
    /// Signal statistics
    pub quality: QualitySnapshot,
    /// How the session ended
    pub reason: StopReason,
    /// Wall time between start and stop
    pub duration_ms: u64,
}

/// Result of finalizing a session
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Finalized {
    /// Too short or too quiet; nothing to dispatch
    Discarded(RecordingReport),
    /// Kept; the control loop decides what to do with it
    Completed(RecordingReport),
}

impl Finalized {
    /// Get the report regardless of outcome
    #[must_use]
    pub const fn report(&self) -> &RecordingReport {
        match self {
            Self::Discarded(r) | Self::Completed(r) => r,
        }
    }
}

/// Squelch-driven recorder
pub struct Recorder<'a> {
    buffer: SampleBuffer<'a>,
    decoder: ToneDecoder,
    quality: QualityAccumulator,
    state: RecorderState,
    started_at_ms: u64,
    symbol: Option<Symbol>,
    since_decode: usize,
    min_samples: usize,
    min_level: f32,
    timeout_ms: u64,
}

impl<'a> Recorder<'a> {
    /// Reserve the live buffer and build the decoder
    ///
    /// # Errors
    ///
    /// Returns [`AllocError`] if the arena cannot hold the live buffer.
    pub fn new(arena: &mut SampleArena<'a>, config: &ParrotConfig) -> Result<Self, AllocError> {
        let buffer = arena.take(config.live_capacity())?;
        let table =
            ToneFrequencyTable::new(config.sample_rate, config.tone_block_size, config.tone_bins);
        Ok(Self {
            buffer,
            decoder: ToneDecoder::with_table(table, config.tone_threshold),
            quality: QualityAccumulator::new(config.clip_threshold),
            state: RecorderState::Idle,
            started_at_ms: 0,
            symbol: None,
            since_decode: 0,
            min_samples: config.min_recording_samples(),
            min_level: config.min_audio_level,
            timeout_ms: config.session_timeout_ms(),
        })
    }

    /// Get current state
    #[must_use]
    pub const fn state(&self) -> RecorderState {
        self.state
    }

    /// Check if a session is active
    #[must_use]
    pub const fn is_recording(&self) -> bool {
        matches!(self.state, RecorderState::Recording)
    }

    /// Get the symbol latched in the current or last session
    #[must_use]
    pub const fn symbol(&self) -> Option<Symbol> {
        self.symbol
    }

    /// Get the statistics of the current or last session
    #[must_use]
    pub const fn quality(&self) -> QualitySnapshot {
        self.quality.snapshot()
    }

    /// Samples captured in the current or last session
    #[must_use]
    pub fn samples(&self) -> &[Sample] {
        self.buffer.as_slice()
    }

    /// Live buffer capacity
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.buffer.capacity()
    }

    /// Begin a new session, discarding the previous one
    pub fn start(&mut self, now_ms: u64) {
        if self.is_recording() {
            warn!("recording restarted before stop");
        }
        self.buffer.clear();
        self.quality.reset();
        self.symbol = None;
        self.since_decode = 0;
        self.started_at_ms = now_ms;
        self.state = RecorderState::Recording;
        info!("recording started at {} ms", now_ms);
    }

    /// Capture tick: append samples and run the decoder when due
    ///
    /// Returns the number of samples kept; the rest did not fit.
    pub fn ingest(&mut self, samples: &[Sample]) -> usize {
        if !self.is_recording() {
            return 0;
        }
        let kept = self.buffer.extend_clamped(samples);
        self.quality.observe_samples(&samples[..kept]);

        if self.symbol.is_none() {
            self.since_decode += kept;
            let block = self.decoder.block_size();
            if self.since_decode >= block {
                if let Some(recent) = self.buffer.recent(block) {
                    let decoded = self.decoder.decode(recent);
                    self.since_decode = 0;
                    self.latch(decoded);
                }
            }
        }
        kept
    }

    fn latch(&mut self, decoded: Option<Symbol>) {
        match decoded {
            Some(symbol) if symbol.is_command() => {
                info!("tone command {:?} after {} samples", symbol, self.buffer.len());
                self.symbol = Some(symbol);
            }
            Some(symbol) => {
                debug!("ignoring tone {:?}", symbol);
            }
            None => {}
        }
    }

    /// Account for a channel strength reading
    pub fn record_strength(&mut self, reading: u16) {
        if self.is_recording() {
            self.quality.observe_strength(reading);
        }
    }

    /// Check if the session has reached the recording cap
    #[must_use]
    pub fn is_timed_out(&self, now_ms: u64) -> bool {
        self.is_recording() && now_ms.saturating_sub(self.started_at_ms) >= self.timeout_ms
    }

    /// End the session and apply the discard rule
    ///
    /// Returns `None` if no session was active.
    pub fn stop(&mut self, reason: StopReason, now_ms: u64) -> Option<Finalized> {
        if !self.is_recording() {
            return None;
        }
        self.state = RecorderState::Idle;

        let report = RecordingReport {
            samples: self.buffer.len(),
            symbol: self.symbol,
            quality: self.quality.snapshot(),
            reason,
            duration_ms: now_ms.saturating_sub(self.started_at_ms),
        };
        info!(
            "recording stopped ({:?}): {} samples, peak strength {}, trough {:?}",
            reason,
            report.samples,
            report.quality.peak_strength,
            report.quality.trough_strength
        );

        if report.samples < self.min_samples || report.quality.peak_level < self.min_level {
            info!(
                "discarding squelch artifact: {} samples, peak level {}",
                report.samples,
                report.quality.peak_level
            );
            Some(Finalized::Discarded(report))
        } else {
            Some(Finalized::Completed(report))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_config() -> ParrotConfig {
        ParrotConfig {
            sample_rate: 8_000,
            max_recording_secs: 1,
            min_recording_ms: 100,
            ..ParrotConfig::default()
        }
    }

    #[test]
    fn live_buffer_allocation_failure_is_reported() {
        let mut pool = [0i16; 100];
        let mut arena = SampleArena::new(&mut pool);
        let err = Recorder::new(&mut arena, &small_config()).err().unwrap();
        assert_eq!(err.requested, 8_000);
        assert_eq!(err.available, 100);
    }

    #[test]
    fn ingest_ignored_while_idle() {
        let mut pool = vec![0i16; 8_000];
        let mut arena = SampleArena::new(&mut pool);
        let mut rec = Recorder::new(&mut arena, &small_config()).unwrap();
        assert_eq!(rec.ingest(&[1_000; 64]), 0);
        assert!(rec.samples().is_empty());
        assert!(rec.stop(StopReason::Released, 0).is_none());
    }

    #[test]
    fn start_resets_session() {
        let mut pool = vec![0i16; 8_000];
        let mut arena = SampleArena::new(&mut pool);
        let mut rec = Recorder::new(&mut arena, &small_config()).unwrap();
        rec.start(0);
        rec.ingest(&[20_000; 2_000]);
        rec.record_strength(99);
        let done = rec.stop(StopReason::Released, 250).unwrap();
        assert!(matches!(done, Finalized::Completed(_)));
        assert_eq!(done.report().duration_ms, 250);

        rec.start(1_000);
        assert!(rec.samples().is_empty());
        assert_eq!(rec.quality(), QualitySnapshot::default());
        assert_eq!(rec.symbol(), None);
    }

    #[test]
    fn timeout_is_inclusive() {
        let mut pool = vec![0i16; 8_000];
        let mut arena = SampleArena::new(&mut pool);
        let mut rec = Recorder::new(&mut arena, &small_config()).unwrap();
        rec.start(500);
        assert!(!rec.is_timed_out(1_499));
        assert!(rec.is_timed_out(1_500));
    }
}
