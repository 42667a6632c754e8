//! PCM Stream Audio Port
//!
//! Audio port over a byte stream carrying little-endian 16-bit mono
//! samples, e.g. a UART or USB bridge to the codec. Reads drain only
//! what the receiver reports ready; writes block until the transport
//! accepts the bytes.

use embedded_io::{Read, ReadReady, Write};

use super::{AudioError, AudioPort};
use crate::types::Sample;

/// Bytes moved per transport call
const SCRATCH_BYTES: usize = 128;

/// Audio port over a PCM byte stream
pub struct PcmStream<R, W> {
    rx: R,
    tx: W,
    /// Low byte of a sample split across reads
    carry: Option<u8>,
}

impl<R, W> PcmStream<R, W>
where
    R: Read + ReadReady,
    W: Write,
{
    /// Create a port from the receive and transmit halves
    #[must_use]
    pub const fn new(rx: R, tx: W) -> Self {
        Self { rx, tx, carry: None }
    }

    /// Release the transport halves
    pub fn free(self) -> (R, W) {
        (self.rx, self.tx)
    }
}

impl<R, W> AudioPort for PcmStream<R, W>
where
    R: Read + ReadReady,
    W: Write,
{
    fn read_available(&mut self, buf: &mut [Sample]) -> usize {
        let mut count = 0;
        let mut scratch = [0u8; SCRATCH_BYTES];
        while count < buf.len() {
            match self.rx.read_ready() {
                Ok(true) => {}
                Ok(false) => break,
                Err(_) => {
                    warn!("pcm receiver not ready");
                    break;
                }
            }
            let want = ((buf.len() - count) * 2).min(SCRATCH_BYTES);
            let n = match self.rx.read(&mut scratch[..want]) {
                Ok(n) if n > 0 => n,
                Ok(_) => break,
                Err(_) => {
                    warn!("pcm read failed");
                    break;
                }
            };
            for &byte in &scratch[..n] {
                match self.carry.take() {
                    None => self.carry = Some(byte),
                    Some(lo) => {
                        buf[count] = Sample::from_le_bytes([lo, byte]);
                        count += 1;
                    }
                }
            }
        }
        count
    }

    fn write(&mut self, samples: &[Sample]) -> Result<(), AudioError> {
        let mut scratch = [0u8; SCRATCH_BYTES];
        for chunk in samples.chunks(SCRATCH_BYTES / 2) {
            for (bytes, sample) in scratch.chunks_exact_mut(2).zip(chunk) {
                bytes.copy_from_slice(&sample.to_le_bytes());
            }
            self.tx
                .write_all(&scratch[..chunk.len() * 2])
                .map_err(|_| AudioError::Io)?;
        }
        Ok(())
    }
}
