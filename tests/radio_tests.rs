//! Tests for parrot radio logic
//!
//! Tests the recorder state machine, signal quality tiers and the
//! transmit controller.

use radio_parrot::buffer::SampleArena;
use radio_parrot::config::ParrotConfig;
use radio_parrot::dsp::oscillator::TestPattern;
use radio_parrot::dsp::tone_decoder::frequencies_for;
use radio_parrot::radio::quality::{QualitySnapshot, QualityTier, CLIPPING_PHRASE};
use radio_parrot::radio::recorder::{Finalized, Recorder, RecorderState, StopReason};
use radio_parrot::radio::transmit::{
    Program, ProgramKind, TxController, TxState, Wrap, NOTHING_TO_PLAY,
};
use radio_parrot::sim::{sine, ScriptedServices, SimAudio, SimClock, SimDelay, SimPin};
use radio_parrot::types::{Sample, Symbol};

const RATE: u32 = 8_000;

fn recorder_config() -> ParrotConfig {
    ParrotConfig {
        sample_rate: RATE,
        max_recording_secs: 1,
        min_recording_ms: 100,
        ..ParrotConfig::default()
    }
}

fn key_block(ch: char, n: usize) -> Vec<Sample> {
    let (low, high) = frequencies_for(Symbol::from_char(ch).unwrap());
    (0..n as u64)
        .map(|i| (sine(f64::from(low), 12_000.0, i, RATE) + sine(f64::from(high), 12_000.0, i, RATE)) as Sample)
        .collect()
}

fn tone(freq: f64, amplitude: f64, n: usize) -> Vec<Sample> {
    (0..n as u64).map(|i| sine(freq, amplitude, i, RATE) as Sample).collect()
}

// ============================================================================
// Recorder Tests
// ============================================================================

#[test]
fn recorder_first_decode_wins() {
    let mut pool = vec![0i16; 8_000];
    let mut arena = SampleArena::new(&mut pool);
    let mut rec = Recorder::new(&mut arena, &recorder_config()).unwrap();
    rec.start(0);
    rec.ingest(&key_block('7', 205));
    assert_eq!(rec.symbol(), Symbol::from_char('7'));
    rec.ingest(&key_block('1', 205));
    assert_eq!(rec.symbol(), Symbol::from_char('7'));

    let done = rec.stop(StopReason::Released, 100).unwrap();
    assert_eq!(done.report().symbol, Symbol::from_char('7'));
}

#[test]
fn recorder_ignores_letter_keys() {
    let mut pool = vec![0i16; 8_000];
    let mut arena = SampleArena::new(&mut pool);
    let mut rec = Recorder::new(&mut arena, &recorder_config()).unwrap();
    rec.start(0);
    rec.ingest(&key_block('A', 205));
    assert_eq!(rec.symbol(), None);
    rec.ingest(&key_block('4', 205));
    assert_eq!(rec.symbol(), Symbol::from_char('4'));
}

#[test]
fn recorder_skips_zero_for_later_command() {
    let mut pool = vec![0i16; 8_000];
    let mut arena = SampleArena::new(&mut pool);
    let mut rec = Recorder::new(&mut arena, &recorder_config()).unwrap();
    rec.start(0);
    rec.ingest(&key_block('0', 205));
    assert_eq!(rec.symbol(), None);
    rec.ingest(&key_block('3', 205));
    assert_eq!(rec.symbol(), Symbol::from_char('3'));

    let done = rec.stop(StopReason::Released, 100).unwrap();
    assert_eq!(done.report().symbol, Symbol::from_char('3'));
}

#[test]
fn recorder_decodes_most_recent_block() {
    let mut pool = vec![0i16; 8_000];
    let mut arena = SampleArena::new(&mut pool);
    let mut rec = Recorder::new(&mut arena, &recorder_config()).unwrap();
    rec.start(0);
    rec.ingest(&[0; 100]);
    assert_eq!(rec.symbol(), None);
    // 305 samples since the last attempt; the window is the last 205
    rec.ingest(&key_block('#', 205));
    assert_eq!(rec.symbol(), Symbol::from_char('#'));
}

#[test]
fn recorder_caps_at_capacity() {
    let mut pool = vec![0i16; 8_000];
    let mut arena = SampleArena::new(&mut pool);
    let mut rec = Recorder::new(&mut arena, &recorder_config()).unwrap();
    rec.start(0);
    assert_eq!(rec.ingest(&vec![1_000; 7_000]), 7_000);
    assert_eq!(rec.ingest(&vec![1_000; 7_000]), 1_000);
    assert_eq!(rec.samples().len(), rec.capacity());
}

#[test]
fn recorder_discards_short_recording() {
    let mut pool = vec![0i16; 8_000];
    let mut arena = SampleArena::new(&mut pool);
    let mut rec = Recorder::new(&mut arena, &recorder_config()).unwrap();
    rec.start(0);
    rec.ingest(&tone(440.0, 20_000.0, 500));
    let done = rec.stop(StopReason::Released, 60).unwrap();
    assert!(matches!(done, Finalized::Discarded(_)));
    assert_eq!(rec.state(), RecorderState::Idle);
}

#[test]
fn recorder_discards_quiet_recording() {
    let mut pool = vec![0i16; 8_000];
    let mut arena = SampleArena::new(&mut pool);
    let mut rec = Recorder::new(&mut arena, &recorder_config()).unwrap();
    rec.start(0);
    rec.ingest(&tone(440.0, 100.0, 4_000));
    let done = rec.stop(StopReason::Released, 500).unwrap();
    assert!(matches!(done, Finalized::Discarded(_)));
    assert!(done.report().quality.peak_level < 0.02);
}

#[test]
fn recorder_keeps_long_loud_recording() {
    let mut pool = vec![0i16; 8_000];
    let mut arena = SampleArena::new(&mut pool);
    let mut rec = Recorder::new(&mut arena, &recorder_config()).unwrap();
    rec.start(1_000);
    rec.ingest(&tone(440.0, 16_000.0, 4_000));
    rec.record_strength(0);
    rec.record_strength(110);
    let done = rec.stop(StopReason::TimedOut, 2_000).unwrap();
    let Finalized::Completed(report) = done else {
        panic!("expected completed recording");
    };
    assert_eq!(report.samples, 4_000);
    assert_eq!(report.reason, StopReason::TimedOut);
    assert_eq!(report.duration_ms, 1_000);
    assert_eq!(report.quality.peak_strength, 110);
    assert_eq!(report.quality.trough_strength, Some(110));
    assert_eq!(report.symbol, None);
}

#[test]
fn recorder_ignores_strength_while_idle() {
    let mut pool = vec![0i16; 8_000];
    let mut arena = SampleArena::new(&mut pool);
    let mut rec = Recorder::new(&mut arena, &recorder_config()).unwrap();
    rec.record_strength(150);
    rec.start(0);
    assert_eq!(rec.quality().peak_strength, 0);
}

// ============================================================================
// Quality Tier Tests
// ============================================================================

#[test]
fn quality_cadences() {
    let excellent = QualityTier::Excellent.cadence();
    assert_eq!((excellent.freq_hz, excellent.tone_ms, excellent.count), (1200, 200, 1));
    let fair = QualityTier::Fair.cadence();
    assert_eq!((fair.freq_hz, fair.tone_ms, fair.count), (800, 200, 3));
    let weak = QualityTier::Weak.cadence();
    assert_eq!((weak.freq_hz, weak.tone_ms, weak.count), (400, 500, 1));
    let none = QualityTier::NoSignal.cadence();
    assert_eq!((none.freq_hz, none.tone_ms, none.count), (300, 300, 2));
}

#[test]
fn quality_clipping_is_strictly_above_warn() {
    let snap = QualitySnapshot {
        clipped_samples: 100,
        ..QualitySnapshot::default()
    };
    assert!(!snap.is_clipping(100));
    let snap = QualitySnapshot {
        clipped_samples: 101,
        ..snap
    };
    assert!(snap.is_clipping(100));
}

// ============================================================================
// Transmit Controller Tests
// ============================================================================

struct Bench {
    clock: SimClock,
    ptt: SimPin,
    tx: TxController<SimPin, SimDelay>,
    audio: SimAudio,
    services: ScriptedServices,
}

fn bench(config: &ParrotConfig) -> Bench {
    let clock = SimClock::new();
    let ptt = SimPin::new();
    let tx = TxController::new(ptt.clone(), clock.delay(), config);
    let audio = SimAudio::new(clock.clone(), config.sample_rate, |_| 0);
    Bench {
        clock,
        ptt,
        tx,
        audio,
        services: ScriptedServices::default(),
    }
}

#[test]
fn tx_release_twice_stays_released() {
    let mut b = bench(&recorder_config());
    b.tx.release();
    b.tx.release();
    assert_eq!(b.ptt.history(), vec![true, true, true]);
    assert_eq!(b.tx.state(), TxState::Rx);
}

#[test]
fn tx_active_high_polarity() {
    let config = ParrotConfig {
        ptt_polarity: radio_parrot::config::PttPolarity::ActiveHigh,
        ..recorder_config()
    };
    let mut b = bench(&config);
    b.tx.key();
    assert_eq!(b.ptt.level(), Some(true));
    b.tx.release();
    assert_eq!(b.ptt.history(), vec![false, true, false]);
}

#[test]
fn tx_test_clip_timing() {
    let config = recorder_config();
    let mut b = bench(&config);
    let report = b.tx.transmit(&mut b.audio, &mut b.services, Program::TestClip);
    assert_eq!(report.kind, ProgramKind::TestClip);
    assert_eq!(report.samples_written, TestPattern::total_samples(RATE));
    // 900 settle + 2000 ms pattern + 300 tail
    assert_eq!(b.clock.now_ms(), 900 + 2_000 + 300);
    assert_eq!(b.ptt.history(), vec![true, false, true]);
}

#[test]
fn tx_live_replay_no_signal_feedback() {
    let config = recorder_config();
    let mut b = bench(&config);
    let live = tone(500.0, 8_000.0, 1_000);
    let report = b.tx.transmit(
        &mut b.audio,
        &mut b.services,
        Program::LiveReplay {
            samples: &live,
            quality: QualitySnapshot::default(),
            wrap: Wrap::default(),
        },
    );
    // live + 2 x 300 ms at 300 Hz + "no signal" speech
    let speech = "no signal".len() * 32;
    assert_eq!(report.samples_written, 1_000 + 2 * 2_400 + speech);
    assert_eq!(b.audio.played().borrow().len(), report.samples_written);
    assert_eq!(*b.services.spoken().borrow(), vec!["no signal".to_string()]);
}

#[test]
fn tx_live_replay_clipping_warning() {
    let config = recorder_config();
    let mut b = bench(&config);
    let quality = QualitySnapshot {
        peak_strength: 150,
        trough_strength: Some(140),
        peak_level: 1.0,
        clipped_samples: 101,
    };
    b.tx.transmit(
        &mut b.audio,
        &mut b.services,
        Program::LiveReplay {
            samples: &[100; 64],
            quality,
            wrap: Wrap {
                pre: "parrot",
                post: "over",
            },
        },
    );
    assert_eq!(
        *b.services.spoken().borrow(),
        vec![
            "parrot".to_string(),
            "excellent signal".to_string(),
            CLIPPING_PHRASE.to_string(),
            "over".to_string(),
        ]
    );
}

#[test]
fn tx_empty_live_session_speaks_notice() {
    let mut b = bench(&recorder_config());
    b.tx.transmit(
        &mut b.audio,
        &mut b.services,
        Program::LiveReplay {
            samples: &[],
            quality: QualitySnapshot {
                peak_strength: 130,
                ..QualitySnapshot::default()
            },
            wrap: Wrap::default(),
        },
    );
    assert_eq!(
        *b.services.spoken().borrow(),
        vec![NOTHING_TO_PLAY.to_string(), "good signal".to_string()]
    );
}

#[test]
fn tx_speech_uses_speech_timing() {
    let mut b = bench(&recorder_config());
    let report = b.tx.transmit(
        &mut b.audio,
        &mut b.services,
        Program::Speech {
            text: "hello",
            wrap: Wrap::default(),
        },
    );
    let speech_ms = (5 * 32 * 1_000 / RATE) as u64;
    assert_eq!(report.samples_written, 5 * 32);
    assert_eq!(b.clock.now_ms(), 600 + speech_ms + 1_000);
}

#[test]
fn tx_write_failure_still_releases() {
    let config = recorder_config();
    let clock = SimClock::new();
    let ptt = SimPin::new();
    let mut tx = TxController::new(ptt.clone(), clock.delay(), &config);
    let mut audio = SimAudio::new(clock.clone(), RATE, |_| 0).failing();
    let mut services = ScriptedServices::default();
    let clip = vec![1i16; 1_000];
    let report = tx.transmit(
        &mut audio,
        &mut services,
        Program::Clip {
            slot: 0,
            samples: Some(&clip),
        },
    );
    assert_eq!(report.write_failures, 1);
    assert_eq!(report.samples_written, 0);
    assert_eq!(ptt.history(), vec![true, false, true]);
    assert!(!tx.is_line_asserted());
}

#[test]
fn tx_test_mode_logs_only() {
    let config = ParrotConfig {
        test_mode: true,
        ..recorder_config()
    };
    let mut b = bench(&config);
    assert!(b.tx.test_mode());
    let report = b.tx.transmit(
        &mut b.audio,
        &mut b.services,
        Program::Clip {
            slot: 4,
            samples: None,
        },
    );
    assert!(!report.keyed);
    assert!(b.ptt.history().iter().all(|&high| high));
    assert_eq!(*b.services.spoken().borrow(), vec![NOTHING_TO_PLAY.to_string()]);
}
