//! Radio Module Protocol
//!
//! AT command set of the SA868 VHF/UHF module: command formatting,
//! line-oriented response parsing and a small driver that configures
//! the channel at startup and serves channel-strength queries.

use core::fmt;

use embedded_hal::delay::DelayNs;
use embedded_io::{Read, ReadReady, Write};
use heapless::{String, Vec};

use crate::config::{RadioSettings, MODULE_COMMAND_GAP_MS};
use crate::hal::ChannelStrength;

/// Maximum command or response line length
pub const MAX_LINE_LEN: usize = 64;

/// Line terminator sent after every command
pub const LINE_END: &str = "\r\n";

/// Module protocol failure
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProtocolError {
    /// Formatted command does not fit a line
    Overflow,
    /// Serial transport error
    Io,
    /// Module answered a setup command with a failure code
    Rejected(AckKind),
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Overflow => write!(f, "command longer than {MAX_LINE_LEN} bytes"),
            Self::Io => write!(f, "module serial error"),
            Self::Rejected(kind) => write!(f, "module rejected {kind:?}"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for ProtocolError {}

#[cfg(feature = "embedded")]
impl defmt::Format for ProtocolError {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Self::Overflow => defmt::write!(f, "Overflow"),
            Self::Io => defmt::write!(f, "Io"),
            Self::Rejected(kind) => defmt::write!(f, "Rejected({})", kind),
        }
    }
}

/// Commands sent to the module
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModuleCommand<'a> {
    /// Handshake
    Connect,
    /// Channel frequency, CTCSS codes and squelch level (simplex)
    SetGroup(&'a RadioSettings),
    /// Audio output volume (1-8)
    SetVolume(u8),
    /// Pre-emphasis, high-pass and low-pass filters all enabled
    SetFilter,
    /// Received signal strength query
    Rssi,
}

impl ModuleCommand<'_> {
    /// Format the command line, without terminator
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::Overflow`] if the line does not fit.
    pub fn format(&self) -> Result<String<MAX_LINE_LEN>, ProtocolError> {
        let mut line = String::new();
        let result = match self {
            Self::Connect => fmt::write(&mut line, format_args!("AT+DMOCONNECT")),
            Self::SetGroup(radio) => fmt::write(
                &mut line,
                format_args!(
                    "AT+DMOSETGROUP=0,{freq},{freq},{tx},{sq},{rx}",
                    freq = radio.frequency,
                    tx = radio.tx_ctcss,
                    sq = radio.squelch,
                    rx = radio.rx_ctcss
                ),
            ),
            Self::SetVolume(volume) => {
                fmt::write(&mut line, format_args!("AT+DMOSETVOLUME={volume}"))
            }
            Self::SetFilter => fmt::write(&mut line, format_args!("AT+SETFILTER=0,0,0")),
            // no AT+ prefix on this one
            Self::Rssi => fmt::write(&mut line, format_args!("RSSI?")),
        };
        result.map_err(|_| ProtocolError::Overflow)?;
        Ok(line)
    }
}

/// Setup command a `+NAME:code` line acknowledges
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AckKind {
    /// `+DMOCONNECT`
    Connect,
    /// `+DMOSETGROUP`
    SetGroup,
    /// `+DMOSETVOLUME`
    SetVolume,
    /// `+DMOSETFILTER`
    SetFilter,
}

#[cfg(feature = "embedded")]
impl defmt::Format for AckKind {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Self::Connect => defmt::write!(f, "DMOCONNECT"),
            Self::SetGroup => defmt::write!(f, "DMOSETGROUP"),
            Self::SetVolume => defmt::write!(f, "DMOSETVOLUME"),
            Self::SetFilter => defmt::write!(f, "DMOSETFILTER"),
        }
    }
}

/// Parsed response line
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModuleResponse {
    /// Setup command acknowledgement; `ok` is a zero result code
    Ack {
        /// Command acknowledged
        kind: AckKind,
        /// Module accepted the command
        ok: bool,
    },
    /// Signal strength reading
    Rssi(u16),
    /// Anything else
    Other,
}

#[cfg(feature = "embedded")]
impl defmt::Format for ModuleResponse {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Self::Ack { kind, ok } => defmt::write!(f, "Ack({}, ok={})", kind, ok),
            Self::Rssi(v) => defmt::write!(f, "RSSI={}", v),
            Self::Other => defmt::write!(f, "Other"),
        }
    }
}

/// Line parser for module responses
pub struct ResponseParser {
    buffer: Vec<u8, MAX_LINE_LEN>,
    discarding: bool,
}

impl ResponseParser {
    /// Create a new parser
    #[must_use]
    pub const fn new() -> Self {
        Self {
            buffer: Vec::new(),
            discarding: false,
        }
    }

    /// Feed a byte to the parser
    /// Returns a response once a line is complete
    pub fn feed(&mut self, byte: u8) -> Option<ModuleResponse> {
        match byte {
            b'\n' => {
                let response = if self.discarding {
                    None
                } else {
                    self.parse_buffer()
                };
                self.clear();
                response
            }
            b'\r' => None,
            _ if self.discarding => None,
            _ => {
                // overlong lines are dropped whole
                if self.buffer.push(byte).is_err() {
                    warn!("module line over {} bytes dropped", MAX_LINE_LEN);
                    self.buffer.clear();
                    self.discarding = true;
                }
                None
            }
        }
    }

    /// Discard any partial line
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.discarding = false;
    }

    fn parse_buffer(&self) -> Option<ModuleResponse> {
        if self.buffer.is_empty() {
            return None;
        }
        let line = core::str::from_utf8(&self.buffer).ok()?.trim();
        Some(parse_line(line))
    }
}

impl Default for ResponseParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse one response line
#[must_use]
pub fn parse_line(line: &str) -> ModuleResponse {
    if let Some(value) = line.strip_prefix("RSSI=") {
        return value
            .trim()
            .parse()
            .map_or(ModuleResponse::Other, ModuleResponse::Rssi);
    }
    let Some((name, code)) = line.strip_prefix('+').and_then(|l| l.split_once(':')) else {
        return ModuleResponse::Other;
    };
    let kind = match name {
        "DMOCONNECT" => AckKind::Connect,
        "DMOSETGROUP" => AckKind::SetGroup,
        "DMOSETVOLUME" => AckKind::SetVolume,
        "DMOSETFILTER" => AckKind::SetFilter,
        _ => return ModuleResponse::Other,
    };
    ModuleResponse::Ack {
        kind,
        ok: code.trim() == "0",
    }
}

/// SA868 module on a serial port
///
/// Strength queries are pipelined: each read returns the reply to the
/// previous query and sends the next one, so the control loop never
/// waits on the module.
pub struct Sa868<U> {
    uart: U,
    parser: ResponseParser,
    last_rssi: Option<u16>,
    rejected: Option<AckKind>,
}

impl<U> Sa868<U>
where
    U: Read + Write + ReadReady,
{
    /// Wrap a serial port
    pub const fn new(uart: U) -> Self {
        Self {
            uart,
            parser: ResponseParser::new(),
            last_rssi: None,
            rejected: None,
        }
    }

    /// Send one command line
    ///
    /// # Errors
    ///
    /// Fails on overflow or a serial write error.
    pub fn send(&mut self, command: &ModuleCommand<'_>) -> Result<(), ProtocolError> {
        let line = command.format()?;
        debug!("SA868 <- {}", line.as_str());
        self.uart
            .write_all(line.as_bytes())
            .and_then(|()| self.uart.write_all(LINE_END.as_bytes()))
            .map_err(|_| ProtocolError::Io)
    }

    /// Process every byte the port has ready
    ///
    /// Returns the number of complete responses seen.
    pub fn drain(&mut self) -> usize {
        let mut seen = 0;
        let mut scratch = [0u8; 32];
        loop {
            match self.uart.read_ready() {
                Ok(true) => {}
                Ok(false) | Err(_) => break,
            }
            let n = match self.uart.read(&mut scratch) {
                Ok(n) if n > 0 => n,
                _ => break,
            };
            for &byte in &scratch[..n] {
                if let Some(response) = self.parser.feed(byte) {
                    seen += 1;
                    self.handle(response);
                }
            }
        }
        seen
    }

    fn handle(&mut self, response: ModuleResponse) {
        match response {
            ModuleResponse::Rssi(value) => self.last_rssi = Some(value),
            ModuleResponse::Ack { kind, ok: true } => debug!("SA868 -> {:?} ok", kind),
            ModuleResponse::Ack { kind, ok: false } => {
                warn!("SA868 rejected {:?}", kind);
                self.rejected = Some(kind);
            }
            ModuleResponse::Other => trace!("SA868 -> unrecognized line"),
        }
    }

    /// Handshake and configure the channel
    ///
    /// Each command is followed by the module's processing gap, then
    /// whatever it answered is consumed.
    ///
    /// # Errors
    ///
    /// Fails on a serial write error or a rejected setup command.
    pub fn initialize<D: DelayNs>(
        &mut self,
        radio: &RadioSettings,
        delay: &mut D,
    ) -> Result<(), ProtocolError> {
        info!(
            "configuring SA868: {} MHz, squelch {}, volume {}",
            radio.frequency.as_str(),
            radio.squelch,
            radio.volume
        );
        self.rejected = None;
        let commands = [
            ModuleCommand::Connect,
            ModuleCommand::SetGroup(radio),
            ModuleCommand::SetVolume(radio.volume),
            ModuleCommand::SetFilter,
        ];
        for command in &commands {
            self.send(command)?;
            delay.delay_ms(MODULE_COMMAND_GAP_MS);
            self.drain();
            if let Some(kind) = self.rejected.take() {
                return Err(ProtocolError::Rejected(kind));
            }
        }
        info!("SA868 initialized");
        Ok(())
    }

    /// Release the serial port
    pub fn free(self) -> U {
        self.uart
    }
}

impl<U> ChannelStrength for Sa868<U>
where
    U: Read + Write + ReadReady,
{
    fn read_strength(&mut self) -> u16 {
        self.drain();
        let reading = self.last_rssi.take().unwrap_or(0);
        if let Err(e) = self.send(&ModuleCommand::Rssi) {
            warn!("RSSI query failed: {:?}", e);
        }
        reading
    }
}
