//! Half-wave rectified spectral flux and its rolling statistics.

use std::collections::VecDeque;

use crate::bands::{BandRange, MAX_MAGNITUDE};

/// How bins inside a flux range are weighted
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FluxWeighting {
    #[default]
    Flat,
    /// Weight falls linearly from 1.0 on the first bin to 0.5 on the last
    LowBias,
}

/// Sum of positive frame-to-frame increases over `range`.
///
/// Decreasing bins contribute nothing. The range is clamped to the shorter of
/// the two frames so a spectrum that changed length never indexes out of
/// bounds.
pub fn spectral_flux(
    previous: &[u8],
    current: &[u8],
    range: BandRange,
    weighting: FluxWeighting,
) -> f32 {
    let len = previous.len().min(current.len());
    if range.start > range.end || range.start >= len {
        return 0.0;
    }
    let end = range.end.min(len - 1);
    let span = (end - range.start).max(1) as f32;

    let mut flux = 0.0;
    for i in range.start..=end {
        let rise = current[i] as f32 - previous[i] as f32;
        if rise <= 0.0 {
            continue;
        }
        let weight = match weighting {
            FluxWeighting::Flat => 1.0,
            FluxWeighting::LowBias => 1.0 - 0.5 * (i - range.start) as f32 / span,
        };
        flux += rise / MAX_MAGNITUDE * weight;
    }
    flux
}

/// Bounded FIFO of recent flux values with mean / standard deviation.
#[derive(Clone, Debug)]
pub struct FluxHistory {
    values: VecDeque<f32>,
    capacity: usize,
}

impl FluxHistory {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            values: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a value, evicting the oldest once full
    pub fn push(&mut self, value: f32) {
        if !value.is_finite() {
            return;
        }
        if self.values.len() == self.capacity {
            self.values.pop_front();
        }
        self.values.push_back(value);
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.values.len() == self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn mean(&self) -> f32 {
        if self.values.is_empty() {
            return 0.0;
        }
        self.values.iter().sum::<f32>() / self.values.len() as f32
    }

    /// Population standard deviation
    pub fn std_dev(&self) -> f32 {
        if self.values.is_empty() {
            return 0.0;
        }
        let mean = self.mean();
        let variance = self
            .values
            .iter()
            .map(|v| (v - mean) * (v - mean))
            .sum::<f32>()
            / self.values.len() as f32;
        variance.sqrt()
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }
}
