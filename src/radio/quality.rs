//! Signal Quality
//!
//! Per-recording statistics (channel strength extremes, audio peak and
//! clipping) and the feedback tier they map to.

use crate::config::QualityTiers;
use crate::types::{sample_level, Sample};

/// Feedback tier chosen from the peak channel strength
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum QualityTier {
    /// Strong, clean signal
    Excellent,
    /// Comfortable margin
    Good,
    /// Usable
    Fair,
    /// Barely received
    Weak,
    /// No strength reading above zero
    NoSignal,
}

impl QualityTier {
    /// Classify a peak strength reading
    #[must_use]
    pub const fn classify(peak_strength: u16, tiers: &QualityTiers) -> Self {
        if peak_strength > tiers.excellent {
            Self::Excellent
        } else if peak_strength > tiers.good {
            Self::Good
        } else if peak_strength > tiers.fair {
            Self::Fair
        } else if peak_strength > 0 {
            Self::Weak
        } else {
            Self::NoSignal
        }
    }

    /// Tone cadence played for this tier
    #[must_use]
    pub const fn cadence(self) -> Cadence {
        match self {
            Self::Excellent => Cadence { freq_hz: 1200, tone_ms: 200, count: 1 },
            Self::Good => Cadence { freq_hz: 1000, tone_ms: 200, count: 2 },
            Self::Fair => Cadence { freq_hz: 800, tone_ms: 200, count: 3 },
            Self::Weak => Cadence { freq_hz: 400, tone_ms: 500, count: 1 },
            Self::NoSignal => Cadence { freq_hz: 300, tone_ms: 300, count: 2 },
        }
    }

    /// Phrase spoken after the cadence
    #[must_use]
    pub const fn phrase(self) -> &'static str {
        match self {
            Self::Excellent => "excellent signal",
            Self::Good => "good signal",
            Self::Fair => "fair signal",
            Self::Weak => "weak signal, check antenna",
            Self::NoSignal => "no signal",
        }
    }
}

#[cfg(feature = "embedded")]
impl defmt::Format for QualityTier {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "{=str}", self.phrase());
    }
}

/// Spoken after feedback when the recording clipped
pub const CLIPPING_PHRASE: &str = "audio clipping, reduce volume";

/// Repeated tone pattern announcing a tier
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Cadence {
    /// Tone frequency
    pub freq_hz: u32,
    /// Length of each tone
    pub tone_ms: u32,
    /// Number of tones
    pub count: u8,
}

/// Statistics for one recording
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub struct QualitySnapshot {
    /// Highest channel strength seen
    pub peak_strength: u16,
    /// Lowest non-zero channel strength seen
    pub trough_strength: Option<u16>,
    /// Highest absolute sample level (0.0 to 1.0)
    pub peak_level: f32,
    /// Samples beyond the clip threshold
    pub clipped_samples: u32,
}

impl QualitySnapshot {
    /// Feedback tier for this recording
    #[must_use]
    pub const fn tier(&self, tiers: &QualityTiers) -> QualityTier {
        QualityTier::classify(self.peak_strength, tiers)
    }

    /// Check if clipping exceeded the warning count
    #[must_use]
    pub const fn is_clipping(&self, warn_count: u32) -> bool {
        self.clipped_samples > warn_count
    }
}

#[cfg(feature = "embedded")]
impl defmt::Format for QualitySnapshot {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(
            f,
            "Quality(peak={}, trough={}, level={}%, clipped={})",
            self.peak_strength,
            self.trough_strength,
            (self.peak_level * 100.0) as u8,
            self.clipped_samples
        );
    }
}

/// Accumulates [`QualitySnapshot`] over a recording
#[derive(Clone, Copy, Debug)]
pub struct QualityAccumulator {
    stats: QualitySnapshot,
    clip_threshold: u16,
}

impl QualityAccumulator {
    /// Create an accumulator with a clip threshold
    #[must_use]
    pub const fn new(clip_threshold: i16) -> Self {
        Self {
            stats: QualitySnapshot {
                peak_strength: 0,
                trough_strength: None,
                peak_level: 0.0,
                clipped_samples: 0,
            },
            clip_threshold: clip_threshold.unsigned_abs(),
        }
    }

    /// Zero all statistics
    pub fn reset(&mut self) {
        self.stats = QualitySnapshot::default();
    }

    /// Account for one captured sample
    pub fn observe_sample(&mut self, sample: Sample) {
        let level = sample_level(sample);
        if level > self.stats.peak_level {
            self.stats.peak_level = level;
        }
        if sample.unsigned_abs() > self.clip_threshold {
            self.stats.clipped_samples = self.stats.clipped_samples.saturating_add(1);
        }
    }

    /// Account for a run of captured samples
    pub fn observe_samples(&mut self, samples: &[Sample]) {
        for &s in samples {
            self.observe_sample(s);
        }
    }

    /// Account for a channel strength reading; 0 is ignored
    pub fn observe_strength(&mut self, reading: u16) {
        if reading == 0 {
            return;
        }
        if reading > self.stats.peak_strength {
            self.stats.peak_strength = reading;
        }
        if self.stats.trough_strength.map_or(true, |t| reading < t) {
            self.stats.trough_strength = Some(reading);
        }
    }

    /// Get the statistics so far
    #[must_use]
    pub const fn snapshot(&self) -> QualitySnapshot {
        self.stats
    }

    /// Get the peak sample level so far
    #[must_use]
    pub const fn peak_level(&self) -> f32 {
        self.stats.peak_level
    }
}
