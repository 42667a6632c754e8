//! Shared types used across the parrot firmware
//!
//! Domain types that keep invariants in the type system: samples,
//! decoded command symbols, bounded phrases and allocation errors.

use core::fmt;

/// Signed 16-bit PCM sample at the configured fixed rate
pub type Sample = i16;

/// Full-scale magnitude used to normalize sample levels to 0..=1
pub const FULL_SCALE: f32 = 32768.0;

/// Capacity of a [`Phrase`] in bytes
pub const PHRASE_CAPACITY: usize = 256;

/// Bounded text for spoken messages and collaborator output
pub type Phrase = heapless::String<PHRASE_CAPACITY>;

/// Build a [`Phrase`] from text, truncating at a character boundary
#[must_use]
pub fn phrase(text: &str) -> Phrase {
    let mut out = Phrase::new();
    for ch in text.chars() {
        if out.push(ch).is_err() {
            break;
        }
    }
    out
}

/// Normalized absolute level of a sample (0.0 to 1.0)
#[must_use]
pub fn sample_level(sample: Sample) -> f32 {
    f32::from(sample.unsigned_abs()) / FULL_SCALE
}

/// Command symbol decoded from a dual-tone block
///
/// One of the sixteen keypad characters `0`-`9`, `A`-`D`, `*` and `#`.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Symbol(u8);

impl Symbol {
    /// Create a symbol from its keypad character
    #[must_use]
    pub const fn from_char(ch: char) -> Option<Self> {
        match ch {
            '0'..='9' | 'A'..='D' | '*' | '#' => Some(Self(ch as u8)),
            _ => None,
        }
    }

    /// Get the keypad character
    #[must_use]
    pub const fn as_char(self) -> char {
        self.0 as char
    }

    /// Check if the symbol is a command the recorder latches
    ///
    /// `1`-`9`, `*` and `#`. `0` and the letter column are decoded but
    /// ignored, so a later command in the same session can still latch.
    #[must_use]
    pub const fn is_command(self) -> bool {
        matches!(self.0, b'1'..=b'9' | b'*' | b'#')
    }
}

impl fmt::Debug for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Symbol('{}')", self.as_char())
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

#[cfg(feature = "embedded")]
impl defmt::Format for Symbol {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "'{}'", self.as_char());
    }
}

/// Sample storage could not be reserved
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AllocError {
    /// Samples requested
    pub requested: usize,
    /// Samples still free in the arena
    pub available: usize,
}

impl fmt::Display for AllocError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "cannot reserve {} samples ({} available)",
            self.requested, self.available
        )
    }
}

#[cfg(feature = "std")]
impl std::error::Error for AllocError {}

#[cfg(feature = "embedded")]
impl defmt::Format for AllocError {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(
            f,
            "AllocError(requested={}, available={})",
            self.requested,
            self.available
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn symbol_classes() {
        let five = Symbol::from_char('5').unwrap();
        assert!(five.is_command());

        let hash = Symbol::from_char('#').unwrap();
        assert!(hash.is_command());

        let zero = Symbol::from_char('0').unwrap();
        assert!(!zero.is_command());

        let letter = Symbol::from_char('B').unwrap();
        assert!(!letter.is_command());
        assert!(Symbol::from_char('x').is_none());
    }

    #[test]
    fn phrase_truncates_at_capacity() {
        let long = "a".repeat(PHRASE_CAPACITY + 10);
        assert_eq!(phrase(&long).len(), PHRASE_CAPACITY);
        assert_eq!(phrase("no signal").as_str(), "no signal");
    }

    #[test]
    fn sample_level_handles_extremes() {
        assert!((sample_level(i16::MIN) - 1.0).abs() < f32::EPSILON);
        assert!(sample_level(0).abs() < f32::EPSILON);
        assert!((sample_level(16384) - 0.5).abs() < 1e-6);
    }
}
