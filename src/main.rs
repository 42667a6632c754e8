//! Radio Parrot Main Application
//!
//! Entry point for the STM32G474 interface board: SA868 module on
//! USART1, PCM audio bridge on LPUART1, PTT and squelch on GPIO.
//! Initializes hardware, then polls the parrot engine forever.

#![no_std]
#![no_main]

use defmt::{error, info, warn};
use embassy_executor::Spawner;
use embassy_stm32::gpio::{Input, Level, Output, Pull, Speed};
use embassy_stm32::usart::{self, BufferedUart, BufferedUartRx, BufferedUartTx};
use embassy_stm32::{bind_interrupts, peripherals};
use embassy_time::Delay;
use static_cell::ConstStaticCell;
use {defmt_rtt as _, panic_probe as _};

use radio_parrot::hal::AudioError;
use radio_parrot::prelude::*;

// Bind interrupt handlers
bind_interrupts!(struct Irqs {
    USART1 => usart::BufferedInterruptHandler<peripherals::USART1>;
    LPUART1 => usart::BufferedInterruptHandler<peripherals::LPUART1>;
});

/// Sample rate of the PCM bridge on this board
const BOARD_SAMPLE_RATE: u32 = 8_000;

/// Recording cap sized to fit SRAM
const BOARD_RECORDING_SECS: u32 = 2;

/// Clip slots sized to fit SRAM
const BOARD_CLIP_SLOTS: usize = 1;

/// Live buffer plus clip slots
const BOARD_POOL_SAMPLES: usize =
    BOARD_SAMPLE_RATE as usize * BOARD_RECORDING_SECS as usize * (BOARD_CLIP_SLOTS + 1);

/// LPUART1 rate carrying 16-bit PCM with framing headroom
const PCM_BAUD: u32 = 230_400;

/// Control loop period
const POLL_INTERVAL_MS: u64 = 5;

static SAMPLE_POOL: ConstStaticCell<[Sample; BOARD_POOL_SAMPLES]> =
    ConstStaticCell::new([0; BOARD_POOL_SAMPLES]);
static MODULE_TX_BUF: ConstStaticCell<[u8; 64]> = ConstStaticCell::new([0; 64]);
static MODULE_RX_BUF: ConstStaticCell<[u8; 128]> = ConstStaticCell::new([0; 128]);
static PCM_TX_BUF: ConstStaticCell<[u8; 512]> = ConstStaticCell::new([0; 512]);
static PCM_RX_BUF: ConstStaticCell<[u8; 1024]> = ConstStaticCell::new([0; 1024]);

/// PCM bridge, or the inert port if LPUART1 failed to come up
enum BoardAudio {
    Pcm(PcmStream<BufferedUartRx<'static>, BufferedUartTx<'static>>),
    Unavailable(Unavailable),
}

impl AudioPort for BoardAudio {
    fn read_available(&mut self, buf: &mut [Sample]) -> usize {
        match self {
            Self::Pcm(pcm) => pcm.read_available(buf),
            Self::Unavailable(port) => port.read_available(buf),
        }
    }

    fn write(&mut self, samples: &[Sample]) -> Result<(), AudioError> {
        match self {
            Self::Pcm(pcm) => pcm.write(samples),
            Self::Unavailable(port) => port.write(samples),
        }
    }
}

fn board_config() -> ParrotConfig {
    ParrotConfig {
        sample_rate: BOARD_SAMPLE_RATE,
        max_recording_secs: BOARD_RECORDING_SECS,
        clip_slots: BOARD_CLIP_SLOTS,
        ..ParrotConfig::default()
    }
}

/// Main entry point
#[embassy_executor::main]
async fn main(spawner: Spawner) {
    info!("Radio Parrot Firmware v{}", env!("CARGO_PKG_VERSION"));

    let p = embassy_stm32::init(embassy_stm32::Config::default());
    info!("Peripherals initialized");

    let led = Output::new(p.PA5, Level::Low, Speed::Low);
    // PTT is active low: start released
    let ptt = Output::new(p.PB0, Level::High, Speed::Low);
    // PD high keeps the module powered
    let _module_power = Output::new(p.PB1, Level::High, Speed::Low);
    let mut squelch = SquelchInput::new(Input::new(p.PA0, Pull::Up));

    let mut module_config = usart::Config::default();
    module_config.baudrate = MODULE_BAUD;
    let module_uart = match BufferedUart::new(
        p.USART1,
        Irqs,
        p.PA10, // RX
        p.PA9,  // TX
        MODULE_TX_BUF.take(),
        MODULE_RX_BUF.take(),
        module_config,
    ) {
        Ok(uart) => uart,
        Err(_) => {
            error!("USART1 configuration rejected, halting");
            halt().await
        }
    };

    let config = board_config();
    let mut delay = Delay;
    let mut radio = Sa868::new(module_uart);
    if let Err(e) = radio.initialize(&config.radio, &mut delay) {
        warn!("radio module setup failed: {}", e);
    }
    // carrier detect floats while the module settles
    squelch.hold_off(Instant::now().as_millis(), SQUELCH_SETTLE_MS);

    let mut pcm_config = usart::Config::default();
    pcm_config.baudrate = PCM_BAUD;
    let audio = match BufferedUart::new(
        p.LPUART1,
        Irqs,
        p.PA3, // RX
        p.PA2, // TX
        PCM_TX_BUF.take(),
        PCM_RX_BUF.take(),
        pcm_config,
    ) {
        Ok(uart) => {
            let (tx, rx) = uart.split();
            info!("PCM bridge at {} baud", PCM_BAUD);
            BoardAudio::Pcm(PcmStream::new(rx, tx))
        }
        Err(_) => {
            warn!("LPUART1 configuration rejected, audio disabled");
            BoardAudio::Unavailable(Unavailable::new())
        }
    };

    let mut arena = SampleArena::new(SAMPLE_POOL.take());
    let mut parrot = match Parrot::new(config, &mut arena, squelch, radio, audio, ptt, delay, Mute) {
        Ok(parrot) => parrot,
        Err(e) => {
            error!("parrot startup failed: {}", e);
            halt().await
        }
    };

    if spawner.spawn(heartbeat_task(led)).is_err() {
        warn!("heartbeat task not started");
    }

    info!("Tasks spawned, entering main loop");

    // poll blocks on `Delay` through turnaround and transmission, so the
    // heartbeat stalls while a reply is on the air
    loop {
        match parrot.poll(Instant::now().as_millis()) {
            LoopEvent::Discarded(report) => {
                info!("discarded {} samples", report.samples);
            }
            LoopEvent::Dispatched { action, tx, .. } => {
                info!("handled {}", action);
                if let Some(tx) = tx {
                    info!(
                        "sent {} samples, {} write failures",
                        tx.samples_written,
                        tx.write_failures
                    );
                }
            }
            _ => {}
        }
        Timer::after(Duration::from_millis(POLL_INTERVAL_MS)).await;
    }
}

/// Park forever after an unrecoverable setup error
async fn halt() -> ! {
    loop {
        Timer::after(Duration::from_secs(60)).await;
    }
}

/// Heartbeat task - blinks LED to show system is running
#[embassy_executor::task]
async fn heartbeat_task(mut led: Output<'static>) {
    loop {
        led.set_high();
        Timer::after(Duration::from_millis(100)).await;
        led.set_low();
        Timer::after(Duration::from_millis(900)).await;
    }
}
