//! Dual-Tone Command Decoder
//!
//! Scores a block of samples against the four row and four column
//! keypad frequencies with a single-pass Goertzel recursion per
//! frequency, then resolves the strongest row/column pair through the
//! keypad grid.
//!
//! The decision rule is deliberately simple: both winners must exceed a
//! fixed absolute energy threshold. Harmonically related false positives
//! are not rejected.

use core::f32::consts::PI;
#[cfg(feature = "embedded")]
use micromath::F32Ext;

use crate::types::{Sample, Symbol};

/// Row (low group) frequencies in Hz
pub const ROW_FREQUENCIES_HZ: [u32; 4] = [697, 770, 852, 941];

/// Column (high group) frequencies in Hz
pub const COLUMN_FREQUENCIES_HZ: [u32; 4] = [1209, 1336, 1477, 1633];

/// Keypad grid indexed by `[row][column]`
pub const SYMBOL_GRID: [[char; 4]; 4] = [
    ['1', '2', '3', 'A'],
    ['4', '5', '6', 'B'],
    ['7', '8', '9', 'C'],
    ['*', '0', '#', 'D'],
];

/// Goertzel energy of `samples` for one recursion coefficient
#[must_use]
pub fn goertzel_energy(samples: &[Sample], coeff: f32) -> f32 {
    let mut s1 = 0.0f32;
    let mut s2 = 0.0f32;
    for &x in samples {
        let s0 = f32::from(x) + coeff * s1 - s2;
        s2 = s1;
        s1 = s0;
    }
    s1 * s1 + s2 * s2 - coeff * s1 * s2
}

/// Row and column frequency pair for a keypad symbol
#[must_use]
pub fn frequencies_for(symbol: Symbol) -> (u32, u32) {
    let ch = symbol.as_char();
    for (r, row) in SYMBOL_GRID.iter().enumerate() {
        for (c, &key) in row.iter().enumerate() {
            if key == ch {
                return (ROW_FREQUENCIES_HZ[r], COLUMN_FREQUENCIES_HZ[c]);
            }
        }
    }
    // Every Symbol is on the grid
    (ROW_FREQUENCIES_HZ[0], COLUMN_FREQUENCIES_HZ[0])
}

/// How target frequencies are placed on the block's frequency grid
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum BinMode {
    /// `k = B * f / rate`, the recursion is tuned to the exact tone
    #[default]
    Exact,
    /// `k = round(B * f / rate)`, snapped to the nearest DFT bin
    Nearest,
}

#[cfg(feature = "embedded")]
impl defmt::Format for BinMode {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Self::Exact => defmt::write!(f, "exact"),
            Self::Nearest => defmt::write!(f, "nearest"),
        }
    }
}

/// Recursion coefficients for the eight keypad frequencies
///
/// `coeff = 2 cos(2 pi k / B)` with `k` placed per [`BinMode`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ToneFrequencyTable {
    rows: [f32; 4],
    columns: [f32; 4],
    block_size: usize,
}

impl ToneFrequencyTable {
    /// Compute the table for a sample rate and block length
    #[must_use]
    pub fn new(sample_rate: u32, block_size: usize, mode: BinMode) -> Self {
        let coeff = |freq: u32| Self::coefficient(freq, sample_rate, block_size, mode);
        Self {
            rows: ROW_FREQUENCIES_HZ.map(coeff),
            columns: COLUMN_FREQUENCIES_HZ.map(coeff),
            block_size,
        }
    }

    /// Nearest whole bin index for a frequency, `round(B * f / rate)`
    #[must_use]
    pub fn nearest_bin(freq_hz: u32, sample_rate: u32, block_size: usize) -> u64 {
        let rate = u64::from(sample_rate.max(1));
        (block_size as u64 * u64::from(freq_hz) + rate / 2) / rate
    }

    fn coefficient(freq_hz: u32, sample_rate: u32, block_size: usize, mode: BinMode) -> f32 {
        let k = match mode {
            BinMode::Exact => block_size as f32 * freq_hz as f32 / sample_rate.max(1) as f32,
            BinMode::Nearest => Self::nearest_bin(freq_hz, sample_rate, block_size) as f32,
        };
        2.0 * (2.0 * PI * k / block_size.max(1) as f32).cos()
    }

    /// Get row coefficients
    #[must_use]
    pub const fn rows(&self) -> &[f32; 4] {
        &self.rows
    }

    /// Get column coefficients
    #[must_use]
    pub const fn columns(&self) -> &[f32; 4] {
        &self.columns
    }

    /// Get the block length the table was built for
    #[must_use]
    pub const fn block_size(&self) -> usize {
        self.block_size
    }
}

/// Strongest row and column of one analyzed block
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ToneAnalysis {
    /// Index of the strongest row frequency
    pub row: usize,
    /// Its energy
    pub row_energy: f32,
    /// Index of the strongest column frequency
    pub column: usize,
    /// Its energy
    pub column_energy: f32,
}

/// Keypad tone decoder
#[derive(Clone, Copy, Debug)]
pub struct ToneDecoder {
    table: ToneFrequencyTable,
    threshold: f32,
}

impl ToneDecoder {
    /// Create a decoder tuned to the exact keypad frequencies
    #[must_use]
    pub fn new(sample_rate: u32, block_size: usize, threshold: f32) -> Self {
        Self::with_table(ToneFrequencyTable::new(sample_rate, block_size, BinMode::Exact), threshold)
    }

    /// Create a decoder from a precomputed table
    #[must_use]
    pub const fn with_table(table: ToneFrequencyTable, threshold: f32) -> Self {
        Self { table, threshold }
    }

    /// Get the block length
    #[must_use]
    pub const fn block_size(&self) -> usize {
        self.table.block_size()
    }

    /// Get the energy threshold
    #[must_use]
    pub const fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Find the strongest row and column in a block
    #[must_use]
    pub fn analyze(&self, block: &[Sample]) -> ToneAnalysis {
        let (row, row_energy) = strongest(block, self.table.rows());
        let (column, column_energy) = strongest(block, self.table.columns());
        ToneAnalysis {
            row,
            row_energy,
            column,
            column_energy,
        }
    }

    /// Decode a block to a keypad symbol
    ///
    /// Returns `None` unless both the row and the column winner exceed
    /// the threshold.
    #[must_use]
    pub fn decode(&self, block: &[Sample]) -> Option<Symbol> {
        let analysis = self.analyze(block);
        if analysis.row_energy > self.threshold && analysis.column_energy > self.threshold {
            Symbol::from_char(SYMBOL_GRID[analysis.row][analysis.column])
        } else {
            None
        }
    }
}

fn strongest(block: &[Sample], coefficients: &[f32; 4]) -> (usize, f32) {
    let mut best = (0, goertzel_energy(block, coefficients[0]));
    for (i, &coeff) in coefficients.iter().enumerate().skip(1) {
        let energy = goertzel_energy(block, coeff);
        if energy > best.1 {
            best = (i, energy);
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tone_block(row_hz: u32, col_hz: u32, amplitude: f32, len: usize) -> Vec<Sample> {
        (0..len)
            .map(|n| {
                let t = n as f32 / 22_050.0;
                let v = amplitude * (2.0 * PI * row_hz as f32 * t).sin()
                    + amplitude * (2.0 * PI * col_hz as f32 * t).sin();
                v as Sample
            })
            .collect()
    }

    #[test]
    fn bins_round_to_nearest() {
        assert_eq!(ToneFrequencyTable::nearest_bin(697, 22_050, 205), 6);
        assert_eq!(ToneFrequencyTable::nearest_bin(770, 22_050, 205), 7);
        assert_eq!(ToneFrequencyTable::nearest_bin(1336, 22_050, 205), 12);
        assert_eq!(ToneFrequencyTable::nearest_bin(1477, 22_050, 205), 14);
    }

    #[test]
    fn nearest_bins_still_decode_five() {
        let table = ToneFrequencyTable::new(22_050, 205, BinMode::Nearest);
        let decoder = ToneDecoder::with_table(table, 2.0e11);
        let block = tone_block(770, 1336, 12_000.0, 205);
        assert_eq!(decoder.decode(&block), Symbol::from_char('5'));
    }

    #[test]
    fn decodes_every_command_digit() {
        let decoder = ToneDecoder::new(22_050, 205, 2.0e11);
        for ch in ['1', '2', '3', '4', '5', '6', '7', '8', '9', '0', '*', '#'] {
            let symbol = Symbol::from_char(ch).unwrap();
            let (row, col) = frequencies_for(symbol);
            let block = tone_block(row, col, 12_000.0, 205);
            assert_eq!(decoder.decode(&block), Some(symbol), "symbol {ch}");
        }
    }

    #[test]
    fn silence_is_no_detection() {
        let decoder = ToneDecoder::new(22_050, 205, 2.0e11);
        assert_eq!(decoder.decode(&[0; 205]), None);
    }

    #[test]
    fn single_tone_is_no_detection() {
        let decoder = ToneDecoder::new(22_050, 205, 2.0e11);
        let block: Vec<Sample> = (0..205)
            .map(|n| (12_000.0 * (2.0 * PI * 770.0 * n as f32 / 22_050.0).sin()) as Sample)
            .collect();
        let analysis = decoder.analyze(&block);
        assert_eq!(analysis.row, 1);
        assert!(analysis.column_energy < decoder.threshold());
        assert_eq!(decoder.decode(&block), None);
    }
}
