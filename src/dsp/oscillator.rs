//! Digital Oscillators
//!
//! Sine tone generation for feedback cadences and the built-in test clip.
//! Output is produced in caller-sized chunks so playback never needs a
//! buffer the length of the whole tone.

use core::f32::consts::PI;
#[cfg(feature = "embedded")]
use micromath::F32Ext;

use crate::types::Sample;

/// Peak amplitude for a volume given in percent of full scale
#[must_use]
pub fn amplitude_for_percent(percent: u8) -> i16 {
    (i32::from(i16::MAX) * i32::from(percent.min(100)) / 100) as i16
}

/// Sine wave oscillator using direct computation
#[derive(Clone, Copy, Debug)]
pub struct SineOscillator {
    /// Current phase (0.0 to 1.0)
    phase: f32,
    /// Phase increment per sample
    phase_inc: f32,
}

impl SineOscillator {
    /// Create a new sine oscillator
    #[must_use]
    pub const fn new() -> Self {
        Self {
            phase: 0.0,
            phase_inc: 0.0,
        }
    }

    /// Set frequency
    pub fn set_frequency(&mut self, freq_hz: f32, sample_rate: f32) {
        self.phase_inc = freq_hz / sample_rate;
    }

    /// Generate next sample
    pub fn next(&mut self) -> f32 {
        let sample = (self.phase * 2.0 * PI).sin();
        self.phase += self.phase_inc;
        if self.phase >= 1.0 {
            self.phase -= 1.0;
        }
        sample
    }

    /// Reset phase
    pub fn reset(&mut self) {
        self.phase = 0.0;
    }

    /// Get current phase
    #[must_use]
    pub fn phase(&self) -> f32 {
        self.phase
    }
}

impl Default for SineOscillator {
    fn default() -> Self {
        Self::new()
    }
}

/// Fixed-length sine burst at a fixed amplitude
#[derive(Clone, Copy, Debug)]
pub struct ToneBurst {
    osc: SineOscillator,
    amplitude: f32,
    remaining: usize,
}

impl ToneBurst {
    /// Create a burst of `duration_ms` at `freq_hz`
    #[must_use]
    pub fn new(freq_hz: u32, duration_ms: u32, amplitude: i16, sample_rate: u32) -> Self {
        let mut osc = SineOscillator::new();
        osc.set_frequency(freq_hz as f32, sample_rate as f32);
        Self {
            osc,
            amplitude: f32::from(amplitude),
            remaining: (u64::from(sample_rate) * u64::from(duration_ms) / 1000) as usize,
        }
    }

    /// Samples left to generate
    #[must_use]
    pub const fn remaining(&self) -> usize {
        self.remaining
    }

    /// Check if the burst is exhausted
    #[must_use]
    pub const fn is_done(&self) -> bool {
        self.remaining == 0
    }

    /// Fill the front of `out`, returning the number of samples written
    pub fn fill(&mut self, out: &mut [Sample]) -> usize {
        let n = out.len().min(self.remaining);
        for slot in &mut out[..n] {
            *slot = (self.osc.next() * self.amplitude) as Sample;
        }
        self.remaining -= n;
        n
    }
}

/// One step of the built-in test pattern
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PatternStep {
    /// Tone frequency in Hz, 0 for silence
    pub freq_hz: u32,
    /// Step duration
    pub duration_ms: u32,
}

/// Built-in test clip: an ascending sweep followed by a long reference tone
pub const TEST_PATTERN: [PatternStep; 7] = [
    PatternStep { freq_hz: 600, duration_ms: 250 },
    PatternStep { freq_hz: 0, duration_ms: 50 },
    PatternStep { freq_hz: 900, duration_ms: 250 },
    PatternStep { freq_hz: 0, duration_ms: 50 },
    PatternStep { freq_hz: 1200, duration_ms: 250 },
    PatternStep { freq_hz: 0, duration_ms: 150 },
    PatternStep { freq_hz: 1000, duration_ms: 1000 },
];

/// Chunked generator for [`TEST_PATTERN`]
#[derive(Clone, Copy, Debug)]
pub struct TestPattern {
    step: usize,
    burst: Option<ToneBurst>,
    amplitude: i16,
    sample_rate: u32,
}

impl TestPattern {
    /// Start the pattern at a given amplitude
    #[must_use]
    pub const fn new(amplitude: i16, sample_rate: u32) -> Self {
        Self {
            step: 0,
            burst: None,
            amplitude,
            sample_rate,
        }
    }

    /// Total length of the pattern in samples
    #[must_use]
    pub fn total_samples(sample_rate: u32) -> usize {
        TEST_PATTERN
            .iter()
            .map(|s| (u64::from(sample_rate) * u64::from(s.duration_ms) / 1000) as usize)
            .sum()
    }

    /// Fill `out` with the next samples; 0 means the pattern is over
    pub fn fill(&mut self, out: &mut [Sample]) -> usize {
        let mut written = 0;
        while written < out.len() {
            if self.burst.map_or(true, |b| b.is_done()) {
                let Some(step) = TEST_PATTERN.get(self.step) else {
                    break;
                };
                self.step += 1;
                let amplitude = if step.freq_hz == 0 { 0 } else { self.amplitude };
                self.burst = Some(ToneBurst::new(
                    step.freq_hz,
                    step.duration_ms,
                    amplitude,
                    self.sample_rate,
                ));
            }
            if let Some(burst) = self.burst.as_mut() {
                written += burst.fill(&mut out[written..]);
            }
        }
        written
    }
}
