//! System configuration and hardware constants
//!
//! Compile-time defaults for the parrot live here as constants.
//! [`ParrotConfig`] gathers the runtime values the engine reads; it is
//! built from these defaults, possibly overridden from persisted
//! settings, and validated once at startup.

use core::fmt;

use heapless::String;

use crate::dsp::tone_decoder::BinMode;
use crate::types::{phrase, Phrase};

/// Audio sample rate for capture and playback
pub const SAMPLE_RATE: u32 = 22_050;

/// Longest recording kept in the live buffer
pub const MAX_RECORDING_SECS: u32 = 10;

/// Recordings shorter than this are squelch artifacts
pub const MIN_RECORDING_MS: u32 = 500;

/// Recordings whose peak level stays below this are discarded (2% of full scale)
pub const MIN_AUDIO_LEVEL: f32 = 0.02;

/// Samples above this magnitude count as clipped (~98% of full scale)
pub const CLIP_THRESHOLD: i16 = 32_112;

/// Clipped-sample count above which the clipping warning is spoken
pub const CLIP_COUNT_WARN: u32 = 100;

/// Number of stored clip slots
pub const CLIP_SLOTS: usize = 8;

/// Upper bound on clip slots
pub const MAX_CLIP_SLOTS: usize = 16;

/// Samples per tone-decode block
pub const TONE_BLOCK_SIZE: usize = 205;

/// Energy both row and column winners must exceed
pub const TONE_ENERGY_THRESHOLD: f32 = 2.0e11;

/// Channel strength poll interval while the channel is busy
pub const STRENGTH_POLL_MS: u32 = 100;

/// Pause between end of reception and the reply
pub const TURNAROUND_MS: u32 = 2_000;

/// Samples read from the audio port per capture tick
pub const CAPTURE_CHUNK: usize = 256;

/// Samples written to the audio port per playback write
pub const PLAYBACK_CHUNK: usize = 256;

/// Settle after keying before live replay
pub const LIVE_SETTLE_MS: u32 = 300;

/// Settle after keying before a stored clip
pub const CLIP_SETTLE_MS: u32 = 600;

/// Settle after keying before the built-in test clip
pub const TEST_CLIP_SETTLE_MS: u32 = 900;

/// Settle after keying before speech
pub const SPEECH_SETTLE_MS: u32 = 600;

/// Tail before unkeying after audio
pub const TAIL_MS: u32 = 300;

/// Tail before unkeying after speech
pub const SPEECH_TAIL_MS: u32 = 1_000;

/// Gap between live replay and quality feedback
pub const FEEDBACK_GAP_MS: u32 = 500;

/// Gap between tones of a feedback cadence
pub const CADENCE_GAP_MS: u32 = 100;

/// Pause before the clipping warning
pub const CLIP_WARNING_PAUSE_MS: u32 = 300;

/// Peak strength above which the signal is excellent
pub const TIER_EXCELLENT: u16 = 140;

/// Peak strength above which the signal is good
pub const TIER_GOOD: u16 = 120;

/// Peak strength above which the signal is fair
pub const TIER_FAIR: u16 = 100;

/// Feedback tone amplitude in percent of full scale
pub const TONE_VOLUME_PERCENT: u8 = 12;

/// Synthesized speech gain in percent
pub const SPEECH_VOLUME_PERCENT: u8 = 25;

/// Hold-off after reconnect during which the squelch pin is ignored
pub const SQUELCH_SETTLE_MS: u32 = 5_000;

/// Radio module UART baud rate
pub const MODULE_BAUD: u32 = 9_600;

/// Gap between radio module setup commands
pub const MODULE_COMMAND_GAP_MS: u32 = 500;

/// Default channel frequency in MHz
pub const DEFAULT_CHANNEL_MHZ: &str = "451.0000";

/// Default CTCSS code (none)
pub const DEFAULT_CTCSS: &str = "0000";

/// Default radio module squelch level (0-8)
pub const DEFAULT_SQUELCH_LEVEL: u8 = 4;

/// Default radio module audio volume (1-8)
pub const DEFAULT_MODULE_VOLUME: u8 = 8;

/// Pin assignments for GPIO
pub mod pins {
    //! GPIO pin assignments matching the interface board

    /// Status LED
    pub const LED_STATUS: &str = "PA5";

    /// Transmit enable to the radio module (active low)
    pub const PTT_OUT: &str = "PB0";

    /// Radio module power-down control
    pub const MODULE_PD: &str = "PB1";

    /// Squelch/carrier detect from the radio module (active low)
    pub const SQUELCH_IN: &str = "PA0";

    /// USART1 TX to the radio module
    pub const MODULE_TX: &str = "PA9";

    /// USART1 RX from the radio module
    pub const MODULE_RX: &str = "PA10";

    /// LPUART1 TX carrying PCM to the audio codec bridge
    pub const PCM_TX: &str = "PA2";

    /// LPUART1 RX carrying PCM from the audio codec bridge
    pub const PCM_RX: &str = "PA3";
}

/// Electrical level that keys the transmitter
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum PttPolarity {
    /// Line pulled low to transmit
    #[default]
    ActiveLow,
    /// Line driven high to transmit
    ActiveHigh,
}

#[cfg(feature = "embedded")]
impl defmt::Format for PttPolarity {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Self::ActiveLow => defmt::write!(f, "active-low"),
            Self::ActiveHigh => defmt::write!(f, "active-high"),
        }
    }
}

/// Settle and tail delays for each kind of transmission
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TxTiming {
    /// Settle before live replay
    pub live_settle_ms: u32,
    /// Settle before a stored clip
    pub clip_settle_ms: u32,
    /// Settle before the built-in test clip
    pub test_settle_ms: u32,
    /// Settle before speech
    pub speech_settle_ms: u32,
    /// Tail after audio
    pub tail_ms: u32,
    /// Tail after speech
    pub speech_tail_ms: u32,
    /// Gap between live replay and feedback
    pub feedback_gap_ms: u32,
    /// Gap between cadence tones
    pub cadence_gap_ms: u32,
    /// Pause before the clipping warning
    pub clip_warning_pause_ms: u32,
}

impl Default for TxTiming {
    fn default() -> Self {
        Self {
            live_settle_ms: LIVE_SETTLE_MS,
            clip_settle_ms: CLIP_SETTLE_MS,
            test_settle_ms: TEST_CLIP_SETTLE_MS,
            speech_settle_ms: SPEECH_SETTLE_MS,
            tail_ms: TAIL_MS,
            speech_tail_ms: SPEECH_TAIL_MS,
            feedback_gap_ms: FEEDBACK_GAP_MS,
            cadence_gap_ms: CADENCE_GAP_MS,
            clip_warning_pause_ms: CLIP_WARNING_PAUSE_MS,
        }
    }
}

/// Peak-strength bounds separating the feedback tiers
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct QualityTiers {
    /// Above this: excellent
    pub excellent: u16,
    /// Above this: good
    pub good: u16,
    /// Above this: fair
    pub fair: u16,
}

impl Default for QualityTiers {
    fn default() -> Self {
        Self {
            excellent: TIER_EXCELLENT,
            good: TIER_GOOD,
            fair: TIER_FAIR,
        }
    }
}

/// Operator messages, expanded by the macro service before speaking
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Messages {
    /// Spoken before live replay and speech
    pub pre: Phrase,
    /// Spoken after live replay and speech
    pub post: Phrase,
    /// Spoken for `#`; empty disables it
    pub hash: Phrase,
}

/// Radio module channel setup
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RadioSettings {
    /// Channel frequency in MHz, e.g. `451.0000`
    pub frequency: String<12>,
    /// Transmit CTCSS code, `0000` for none
    pub tx_ctcss: String<4>,
    /// Receive CTCSS code, `0000` for none
    pub rx_ctcss: String<4>,
    /// Squelch level (0-8)
    pub squelch: u8,
    /// Module audio volume (1-8)
    pub volume: u8,
}

impl Default for RadioSettings {
    fn default() -> Self {
        let mut frequency = String::new();
        let _ = frequency.push_str(DEFAULT_CHANNEL_MHZ);
        let mut tx_ctcss = String::new();
        let _ = tx_ctcss.push_str(DEFAULT_CTCSS);
        Self {
            frequency,
            rx_ctcss: tx_ctcss.clone(),
            tx_ctcss,
            squelch: DEFAULT_SQUELCH_LEVEL,
            volume: DEFAULT_MODULE_VOLUME,
        }
    }
}

/// Runtime configuration for the parrot engine
#[derive(Clone, Debug, PartialEq)]
pub struct ParrotConfig {
    /// Audio sample rate in Hz
    pub sample_rate: u32,
    /// Recording cap in seconds
    pub max_recording_secs: u32,
    /// Minimum recording duration kept
    pub min_recording_ms: u32,
    /// Minimum peak level kept (0.0-1.0)
    pub min_audio_level: f32,
    /// Clipped-sample magnitude
    pub clip_threshold: i16,
    /// Clipped-sample count that triggers the warning
    pub clip_count_warn: u32,
    /// Number of clip slots
    pub clip_slots: usize,
    /// Tone decoder block length
    pub tone_block_size: usize,
    /// Tone decoder energy threshold
    pub tone_threshold: f32,
    /// Tone decoder bin placement
    pub tone_bins: BinMode,
    /// Strength poll interval while busy
    pub strength_poll_ms: u32,
    /// Pause between reception and reply
    pub turnaround_ms: u32,
    /// Feedback tone amplitude (percent)
    pub tone_volume_percent: u8,
    /// Speech gain (percent)
    pub speech_volume_percent: u8,
    /// Log transmit intent without keying
    pub test_mode: bool,
    /// PTT line polarity
    pub ptt_polarity: PttPolarity,
    /// Transmit delays
    pub timing: TxTiming,
    /// Feedback tier bounds
    pub tiers: QualityTiers,
    /// Operator messages
    pub messages: Messages,
    /// Radio module channel setup
    pub radio: RadioSettings,
}

impl ParrotConfig {
    /// Live buffer and clip capacity in samples
    #[must_use]
    pub const fn live_capacity(&self) -> usize {
        self.sample_rate as usize * self.max_recording_secs as usize
    }

    /// Shortest recording kept, in samples
    #[must_use]
    pub const fn min_recording_samples(&self) -> usize {
        self.ms_to_samples(self.min_recording_ms)
    }

    /// Convert a duration to a sample count at the configured rate
    #[must_use]
    pub const fn ms_to_samples(&self, ms: u32) -> usize {
        (self.sample_rate as u64 * ms as u64 / 1000) as usize
    }

    /// Recording session cap in milliseconds
    #[must_use]
    pub const fn session_timeout_ms(&self) -> u64 {
        self.max_recording_secs as u64 * 1000
    }

    /// Samples needed from the pool for the live buffer plus all clips
    #[must_use]
    pub const fn pool_samples(&self) -> usize {
        self.live_capacity() * (self.clip_slots + 1)
    }

    /// Replace the operator messages
    #[must_use]
    pub fn with_messages(mut self, pre: &str, post: &str, hash: &str) -> Self {
        self.messages = Messages {
            pre: phrase(pre),
            post: phrase(post),
            hash: phrase(hash),
        };
        self
    }

    /// Check the values are consistent with each other
    ///
    /// # Errors
    ///
    /// Returns the first inconsistency found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sample_rate == 0 {
            return Err(ConfigError::ZeroSampleRate);
        }
        if self.max_recording_secs == 0 {
            return Err(ConfigError::ZeroRecordingCap);
        }
        if self.tone_block_size == 0 || self.tone_block_size > self.live_capacity() {
            return Err(ConfigError::BlockSize {
                block: self.tone_block_size,
                capacity: self.live_capacity(),
            });
        }
        if self.clip_slots == 0 || self.clip_slots > MAX_CLIP_SLOTS {
            return Err(ConfigError::SlotCount(self.clip_slots));
        }
        if !(0.0..=1.0).contains(&self.min_audio_level) {
            return Err(ConfigError::LevelOutOfRange);
        }
        if self.tone_threshold <= 0.0 {
            return Err(ConfigError::ToneThreshold);
        }
        if self.tone_volume_percent > 100 {
            return Err(ConfigError::Volume(self.tone_volume_percent));
        }
        if self.speech_volume_percent > 100 {
            return Err(ConfigError::Volume(self.speech_volume_percent));
        }
        if self.strength_poll_ms == 0 {
            return Err(ConfigError::ZeroPollInterval);
        }
        if self.radio.squelch > 8 || !(1..=8).contains(&self.radio.volume) {
            return Err(ConfigError::RadioSetting);
        }
        Ok(())
    }
}

impl Default for ParrotConfig {
    fn default() -> Self {
        Self {
            sample_rate: SAMPLE_RATE,
            max_recording_secs: MAX_RECORDING_SECS,
            min_recording_ms: MIN_RECORDING_MS,
            min_audio_level: MIN_AUDIO_LEVEL,
            clip_threshold: CLIP_THRESHOLD,
            clip_count_warn: CLIP_COUNT_WARN,
            clip_slots: CLIP_SLOTS,
            tone_block_size: TONE_BLOCK_SIZE,
            tone_threshold: TONE_ENERGY_THRESHOLD,
            tone_bins: BinMode::Exact,
            strength_poll_ms: STRENGTH_POLL_MS,
            turnaround_ms: TURNAROUND_MS,
            tone_volume_percent: TONE_VOLUME_PERCENT,
            speech_volume_percent: SPEECH_VOLUME_PERCENT,
            test_mode: false,
            ptt_polarity: PttPolarity::ActiveLow,
            timing: TxTiming::default(),
            tiers: QualityTiers::default(),
            messages: Messages::default(),
            radio: RadioSettings::default(),
        }
    }
}

/// Inconsistent configuration value
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConfigError {
    /// Sample rate is zero
    ZeroSampleRate,
    /// Recording cap is zero
    ZeroRecordingCap,
    /// Tone block is empty or longer than the live buffer
    BlockSize {
        /// Configured block length
        block: usize,
        /// Live buffer capacity
        capacity: usize,
    },
    /// Slot count is zero or above [`MAX_CLIP_SLOTS`]
    SlotCount(usize),
    /// Level threshold outside 0.0-1.0
    LevelOutOfRange,
    /// Tone threshold not positive
    ToneThreshold,
    /// Volume above 100%
    Volume(u8),
    /// Strength poll interval is zero
    ZeroPollInterval,
    /// Radio module squelch or volume out of range
    RadioSetting,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ZeroSampleRate => write!(f, "sample rate must be non-zero"),
            Self::ZeroRecordingCap => write!(f, "recording cap must be non-zero"),
            Self::BlockSize { block, capacity } => {
                write!(f, "tone block of {block} samples does not fit a {capacity} sample buffer")
            }
            Self::SlotCount(n) => write!(f, "{n} clip slots (1..={MAX_CLIP_SLOTS} supported)"),
            Self::LevelOutOfRange => write!(f, "minimum audio level must be within 0.0..=1.0"),
            Self::ToneThreshold => write!(f, "tone threshold must be positive"),
            Self::Volume(v) => write!(f, "volume {v}% above 100%"),
            Self::ZeroPollInterval => write!(f, "strength poll interval must be non-zero"),
            Self::RadioSetting => write!(f, "radio squelch must be 0-8 and volume 1-8"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for ConfigError {}

#[cfg(feature = "embedded")]
impl defmt::Format for ConfigError {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Self::ZeroSampleRate => defmt::write!(f, "ZeroSampleRate"),
            Self::ZeroRecordingCap => defmt::write!(f, "ZeroRecordingCap"),
            Self::BlockSize { block, capacity } => {
                defmt::write!(f, "BlockSize({}, cap={})", block, capacity);
            }
            Self::SlotCount(n) => defmt::write!(f, "SlotCount({})", n),
            Self::LevelOutOfRange => defmt::write!(f, "LevelOutOfRange"),
            Self::ToneThreshold => defmt::write!(f, "ToneThreshold"),
            Self::Volume(v) => defmt::write!(f, "Volume({})", v),
            Self::ZeroPollInterval => defmt::write!(f, "ZeroPollInterval"),
            Self::RadioSetting => defmt::write!(f, "RadioSetting"),
        }
    }
}
