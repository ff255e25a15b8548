//! Frequency-domain snapshots and the source contract that produces them.
//!
//! A [`SpectrumSource`] hands out one byte-range magnitude per frequency bin,
//! `fft_size / 2` bins per snapshot, refreshed whenever the caller polls it.
//! [`FrequencyAnalyser`] implements that contract over raw PCM samples.

use num_complex::Complex;
use rustfft::{Fft, FftPlanner};
use std::sync::Arc;
use tracing::debug;

use crate::error::SpectrumError;

pub const MIN_FFT_SIZE: usize = 32;
pub const MAX_FFT_SIZE: usize = 32768;
pub const DEFAULT_FFT_SIZE: usize = 2048;
pub const DEFAULT_SMOOTHING: f32 = 0.8;

/// Decibel window mapped onto the 0-255 byte range
const MIN_DECIBELS: f32 = -100.0;
const MAX_DECIBELS: f32 = -30.0;

/// One frame of magnitudes, one byte per bin.
///
/// Overwritten every tick. Keeping a previous frame around requires an
/// explicit [`SpectrumSnapshot::copy_from`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SpectrumSnapshot {
    bins: Vec<u8>,
}

impl SpectrumSnapshot {
    pub fn new(bin_count: usize) -> Self {
        Self {
            bins: vec![0; bin_count],
        }
    }

    pub fn from_bins(bins: Vec<u8>) -> Self {
        Self { bins }
    }

    pub fn len(&self) -> usize {
        self.bins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bins.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bins
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.bins
    }

    /// Resize to `bin_count` bins, zero-filling any new ones
    pub fn resize(&mut self, bin_count: usize) {
        self.bins.resize(bin_count, 0);
    }

    /// Copy another frame into this one, adopting its length
    pub fn copy_from(&mut self, other: &SpectrumSnapshot) {
        self.bins.clear();
        self.bins.extend_from_slice(&other.bins);
    }

    pub fn fill(&mut self, value: u8) {
        self.bins.iter_mut().for_each(|b| *b = value);
    }
}

/// Contract for anything that can produce per-frame magnitude spectra.
pub trait SpectrumSource {
    /// Configured transform size
    fn fft_size(&self) -> usize;

    /// Bins per snapshot (half the transform size)
    fn bin_count(&self) -> usize {
        self.fft_size() / 2
    }

    fn set_fft_size(&mut self, size: usize) -> Result<(), SpectrumError>;

    /// Temporal smoothing between consecutive frames (0 = none, 1 = frozen)
    fn set_smoothing(&mut self, smoothing: f32);

    /// Fill `out` with the current spectrum, resizing it to `bin_count`
    fn frequency_data(&mut self, out: &mut SpectrumSnapshot);
}

pub fn validate_fft_size(size: usize) -> Result<(), SpectrumError> {
    if size.is_power_of_two() && (MIN_FFT_SIZE..=MAX_FFT_SIZE).contains(&size) {
        Ok(())
    } else {
        Err(SpectrumError::InvalidFftSize(size))
    }
}

/// FFT-backed spectrum source fed with mono PCM samples.
pub struct FrequencyAnalyser {
    fft_size: usize,
    smoothing: f32,

    // FFT resources (pre-allocated)
    planner: FftPlanner<f32>,
    fft: Arc<dyn Fft<f32>>,
    fft_buffer: Vec<Complex<f32>>,
    window: Vec<f32>,

    /// Newest `fft_size` samples, oldest first
    samples: Vec<f32>,
    /// Smoothed linear magnitudes carried between frames
    smoothed: Vec<f32>,
}

impl FrequencyAnalyser {
    pub fn new(fft_size: usize, smoothing: f32) -> Result<Self, SpectrumError> {
        validate_fft_size(fft_size)?;
        Ok(Self::build(fft_size, smoothing))
    }

    fn build(fft_size: usize, smoothing: f32) -> Self {
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(fft_size);

        Self {
            fft_size,
            smoothing: smoothing.clamp(0.0, 1.0),
            planner,
            fft,
            fft_buffer: vec![Complex::new(0.0, 0.0); fft_size],
            window: blackman_window(fft_size),
            samples: vec![0.0; fft_size],
            smoothed: vec![0.0; fft_size / 2],
        }
    }

    pub fn smoothing(&self) -> f32 {
        self.smoothing
    }

    /// Replace the analysis window with the newest samples.
    ///
    /// Short input is left-padded with silence, long input keeps its tail.
    pub fn feed(&mut self, samples: &[f32]) {
        let n = self.fft_size;
        if samples.len() >= n {
            self.samples.copy_from_slice(&samples[samples.len() - n..]);
        } else {
            let pad = n - samples.len();
            self.samples[..pad].iter_mut().for_each(|s| *s = 0.0);
            self.samples[pad..].copy_from_slice(samples);
        }
    }

    fn analyse(&mut self) {
        for (i, slot) in self.fft_buffer.iter_mut().enumerate() {
            let s = self.samples[i];
            let s = if s.is_finite() { s } else { 0.0 };
            *slot = Complex::new(s * self.window[i], 0.0);
        }

        self.fft.process(&mut self.fft_buffer);

        let scale = 1.0 / self.fft_size as f32;
        let tau = self.smoothing;
        for (k, smoothed) in self.smoothed.iter_mut().enumerate() {
            let magnitude = self.fft_buffer[k].norm() * scale;
            *smoothed = tau * *smoothed + (1.0 - tau) * magnitude;
        }
    }
}

impl Default for FrequencyAnalyser {
    fn default() -> Self {
        Self::build(DEFAULT_FFT_SIZE, DEFAULT_SMOOTHING)
    }
}

impl SpectrumSource for FrequencyAnalyser {
    fn fft_size(&self) -> usize {
        self.fft_size
    }

    fn set_fft_size(&mut self, size: usize) -> Result<(), SpectrumError> {
        validate_fft_size(size)?;
        if size == self.fft_size {
            return Ok(());
        }

        debug!("Spectrum fft size {} -> {}", self.fft_size, size);
        self.fft_size = size;
        self.fft = self.planner.plan_fft_forward(size);
        self.fft_buffer = vec![Complex::new(0.0, 0.0); size];
        self.window = blackman_window(size);
        self.samples = vec![0.0; size];
        self.smoothed = vec![0.0; size / 2];
        Ok(())
    }

    fn set_smoothing(&mut self, smoothing: f32) {
        self.smoothing = if smoothing.is_finite() {
            smoothing.clamp(0.0, 1.0)
        } else {
            DEFAULT_SMOOTHING
        };
    }

    fn frequency_data(&mut self, out: &mut SpectrumSnapshot) {
        self.analyse();

        out.resize(self.fft_size / 2);
        let range = MAX_DECIBELS - MIN_DECIBELS;
        for (byte, &magnitude) in out.as_mut_slice().iter_mut().zip(self.smoothed.iter()) {
            let db = if magnitude > 0.0 {
                20.0 * magnitude.log10()
            } else {
                MIN_DECIBELS
            };
            let scaled = 255.0 * (db - MIN_DECIBELS) / range;
            *byte = scaled.clamp(0.0, 255.0) as u8;
        }
    }
}

fn blackman_window(size: usize) -> Vec<f32> {
    const A0: f32 = 0.42;
    const A1: f32 = 0.5;
    const A2: f32 = 0.08;
    let tau = 2.0 * std::f32::consts::PI;
    (0..size)
        .map(|i| {
            let t = i as f32 / size as f32;
            A0 - A1 * (tau * t).cos() + A2 * (2.0 * tau * t).cos()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(bin: usize, size: usize, amplitude: f32) -> Vec<f32> {
        (0..size)
            .map(|n| {
                let phase = 2.0 * std::f32::consts::PI * bin as f32 * n as f32 / size as f32;
                amplitude * phase.sin()
            })
            .collect()
    }

    #[test]
    fn test_rejects_invalid_fft_sizes() {
        assert_eq!(
            FrequencyAnalyser::new(1000, 0.8).err(),
            Some(SpectrumError::InvalidFftSize(1000))
        );
        assert!(FrequencyAnalyser::new(16, 0.8).is_err());
        assert!(FrequencyAnalyser::new(65536, 0.8).is_err());
        assert!(FrequencyAnalyser::new(32, 0.8).is_ok());
    }

    #[test]
    fn test_snapshot_length_is_half_fft_size() {
        let mut analyser = FrequencyAnalyser::new(512, 0.0).unwrap();
        let mut snapshot = SpectrumSnapshot::default();
        analyser.frequency_data(&mut snapshot);
        assert_eq!(snapshot.len(), 256);

        analyser.set_fft_size(2048).unwrap();
        analyser.frequency_data(&mut snapshot);
        assert_eq!(snapshot.len(), 1024);
        assert_eq!(analyser.bin_count(), 1024);
    }

    #[test]
    fn test_silence_is_all_zero() {
        let mut analyser = FrequencyAnalyser::new(1024, 0.0).unwrap();
        analyser.feed(&vec![0.0; 1024]);
        let mut snapshot = SpectrumSnapshot::default();
        analyser.frequency_data(&mut snapshot);
        assert!(snapshot.as_slice().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_sine_peaks_at_its_bin() {
        let mut analyser = FrequencyAnalyser::new(1024, 0.0).unwrap();
        analyser.feed(&sine(64, 1024, 0.01));
        let mut snapshot = SpectrumSnapshot::default();
        analyser.frequency_data(&mut snapshot);

        let bins = snapshot.as_slice();
        assert!(bins[64] > 0);
        assert!(bins[64] > bins[63]);
        assert!(bins[64] > bins[65]);
        assert_eq!(bins[10], 0);
    }

    #[test]
    fn test_smoothing_decays_gradually() {
        let mut analyser = FrequencyAnalyser::new(1024, 0.8).unwrap();
        let mut snapshot = SpectrumSnapshot::default();
        for _ in 0..30 {
            analyser.feed(&sine(64, 1024, 0.01));
            analyser.frequency_data(&mut snapshot);
        }
        let loud = snapshot.as_slice()[64];

        analyser.feed(&[]);
        analyser.frequency_data(&mut snapshot);
        let after = snapshot.as_slice()[64];
        assert!(after > 0, "smoothed bin should not drop to zero in one frame");
        assert!(after < loud);
    }

    #[test]
    fn test_copy_from_adopts_length() {
        let mut previous = SpectrumSnapshot::new(4);
        let current = SpectrumSnapshot::from_bins(vec![1, 2, 3]);
        previous.copy_from(&current);
        assert_eq!(previous.as_slice(), &[1, 2, 3]);
    }
}
