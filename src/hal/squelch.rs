//! Squelch Input
//!
//! Channel-busy detection from the radio module's carrier/squelch pin.
//! The module pulls the line low while the squelch is open. After a
//! reconnect or module reset the line is ignored for a settle window.

use embedded_hal::digital::InputPin;

use super::ChannelBusy;

/// Squelch pin with polarity and a hold-off window
pub struct SquelchInput<P> {
    pin: P,
    active_low: bool,
    hold_until_ms: u64,
    pin_error_logged: bool,
}

impl<P: InputPin> SquelchInput<P> {
    /// Create a squelch input on an active-low pin
    #[must_use]
    pub const fn new(pin: P) -> Self {
        Self {
            pin,
            active_low: true,
            hold_until_ms: 0,
            pin_error_logged: false,
        }
    }

    /// Create a squelch input on an active-high pin
    #[must_use]
    pub const fn active_high(pin: P) -> Self {
        Self {
            pin,
            active_low: false,
            hold_until_ms: 0,
            pin_error_logged: false,
        }
    }

    /// Report idle until `duration_ms` after `now_ms`
    pub fn hold_off(&mut self, now_ms: u64, duration_ms: u32) {
        self.hold_until_ms = now_ms + u64::from(duration_ms);
        debug!("squelch hold-off until {} ms", self.hold_until_ms);
    }

    /// Check if the hold-off window is still open
    #[must_use]
    pub const fn is_holding(&self, now_ms: u64) -> bool {
        now_ms < self.hold_until_ms
    }

    /// Release the pin
    pub fn free(self) -> P {
        self.pin
    }
}

impl<P: InputPin> ChannelBusy for SquelchInput<P> {
    fn is_busy(&mut self, now_ms: u64) -> bool {
        if self.is_holding(now_ms) {
            return false;
        }
        let level = if self.active_low {
            self.pin.is_low()
        } else {
            self.pin.is_high()
        };
        match level {
            Ok(busy) => busy,
            Err(_) => {
                if !self.pin_error_logged {
                    warn!("squelch pin read failed, treating channel as idle");
                    self.pin_error_logged = true;
                }
                false
            }
        }
    }
}
