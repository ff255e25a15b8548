//! Band energy aggregation over a magnitude spectrum.
//!
//! Pure functions of their inputs: safe to call several times per tick with
//! overlapping ranges.

use serde::{Deserialize, Serialize};

/// Largest value a spectrum byte can hold
pub const MAX_MAGNITUDE: f32 = 255.0;

/// Mean magnitude over the inclusive bin range `[start, end]`, normalized to 0-1.
///
/// An `end` past the last bin is clamped. Empty ranges (`start > end`) and
/// ranges starting beyond the spectrum yield exactly 0.
pub fn band_energy(spectrum: &[u8], start: usize, end: usize) -> f32 {
    if start > end || start >= spectrum.len() {
        return 0.0;
    }
    let end = end.min(spectrum.len() - 1);
    let bins = &spectrum[start..=end];
    let sum: u32 = bins.iter().map(|&b| b as u32).sum();
    sum as f32 / bins.len() as f32 / MAX_MAGNITUDE
}

/// Inclusive range of spectrum bins.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BandRange {
    pub start: usize,
    pub end: usize,
}

impl BandRange {
    pub const fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Bins covering `low_hz..high_hz` for a given sample rate and transform size
    pub fn from_hz(low_hz: f32, high_hz: f32, sample_rate: f32, fft_size: usize) -> Self {
        let bin_width = sample_rate / fft_size as f32;
        let last_bin = (fft_size / 2).saturating_sub(1);
        let start = ((low_hz / bin_width).floor() as usize).max(1).min(last_bin);
        let end = ((high_hz / bin_width).ceil() as usize).min(last_bin);
        Self {
            start,
            end: end.max(start),
        }
    }

    pub fn energy(&self, spectrum: &[u8]) -> f32 {
        band_energy(spectrum, self.start, self.end)
    }

    pub fn len(&self) -> usize {
        if self.end < self.start {
            0
        } else {
            self.end - self.start + 1
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Bass, mid and treble energies for one tick (each 0-1)
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct BandEnergies {
    pub bass: f32,
    pub mid: f32,
    pub treble: f32,
}

impl BandEnergies {
    /// Loudest of the three bands
    pub fn peak(&self) -> f32 {
        self.bass.max(self.mid).max(self.treble)
    }

    pub fn mean(&self) -> f32 {
        (self.bass + self.mid + self.treble) / 3.0
    }
}

/// Named bin ranges for the three standard bands
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BandLayout {
    pub bass: BandRange,
    pub mid: BandRange,
    pub treble: BandRange,
}

impl BandLayout {
    /// 20-250 Hz bass, 250-2000 Hz mids, 2-8 kHz treble
    pub fn standard(sample_rate: f32, fft_size: usize) -> Self {
        Self {
            bass: BandRange::from_hz(20.0, 250.0, sample_rate, fft_size),
            mid: BandRange::from_hz(250.0, 2000.0, sample_rate, fft_size),
            treble: BandRange::from_hz(2000.0, 8000.0, sample_rate, fft_size),
        }
    }

    pub fn energies(&self, spectrum: &[u8]) -> BandEnergies {
        BandEnergies {
            bass: self.bass.energy(spectrum),
            mid: self.mid.energy(spectrum),
            treble: self.treble.energy(spectrum),
        }
    }
}

impl Default for BandLayout {
    fn default() -> Self {
        Self::standard(44100.0, crate::spectrum::DEFAULT_FFT_SIZE)
    }
}
