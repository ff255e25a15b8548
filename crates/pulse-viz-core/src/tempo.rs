//! Tempo estimation from inter-beat intervals.
//!
//! Keeps a bounded history of plausible intervals and eases a running BPM
//! estimate toward `60000 / median(history)`. The estimate starts at a sane
//! default and never jumps.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use tracing::trace;

pub const DEFAULT_BPM: f32 = 120.0;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TempoConfig {
    /// Intervals kept in history
    pub capacity: usize,
    /// Shortest accepted interval (300 BPM)
    pub min_interval_ms: f64,
    /// Longest accepted interval (30 BPM)
    pub max_interval_ms: f64,
    /// Intervals required before the estimate moves
    pub min_samples: usize,
    /// Weight of each new median-derived estimate
    pub smoothing: f32,
    pub default_bpm: f32,
}

impl Default for TempoConfig {
    fn default() -> Self {
        Self {
            capacity: 16,
            min_interval_ms: 200.0,
            max_interval_ms: 2000.0,
            min_samples: 4,
            smoothing: 0.2,
            default_bpm: DEFAULT_BPM,
        }
    }
}

pub struct TempoEstimator {
    config: TempoConfig,
    intervals: VecDeque<f64>,
    last_beat_ms: Option<f64>,
    bpm: f32,
    confidence: f32,
}

impl TempoEstimator {
    pub fn new() -> Self {
        Self::with_config(TempoConfig::default())
    }

    pub fn with_config(config: TempoConfig) -> Self {
        let capacity = config.capacity.max(1);
        Self {
            config: TempoConfig { capacity, ..config },
            intervals: VecDeque::with_capacity(capacity),
            last_beat_ms: None,
            bpm: config.default_bpm,
            confidence: 0.0,
        }
    }

    /// Register a beat at `timestamp_ms`.
    ///
    /// Intervals outside the plausible range are discarded, but the beat still
    /// becomes the reference for the next interval.
    pub fn record_beat(&mut self, timestamp_ms: f64) {
        let previous = self.last_beat_ms.replace(timestamp_ms);
        let Some(previous) = previous else {
            return;
        };

        let interval = timestamp_ms - previous;
        if !(self.config.min_interval_ms..=self.config.max_interval_ms).contains(&interval) {
            trace!("Discarding beat interval {:.1}ms", interval);
            return;
        }

        if self.intervals.len() == self.config.capacity {
            self.intervals.pop_front();
        }
        self.intervals.push_back(interval);
        self.confidence = (self.intervals.len() as f32 / self.config.capacity as f32).min(1.0);

        if self.intervals.len() >= self.config.min_samples {
            let target = (60_000.0 / self.median()) as f32;
            self.bpm += (target - self.bpm) * self.config.smoothing;
        }
    }

    fn median(&self) -> f64 {
        let mut sorted: Vec<f64> = self.intervals.iter().copied().collect();
        sorted.sort_by(|a, b| a.total_cmp(b));
        let mid = sorted.len() / 2;
        if sorted.len() % 2 == 0 {
            (sorted[mid - 1] + sorted[mid]) / 2.0
        } else {
            sorted[mid]
        }
    }

    pub fn bpm(&self) -> f32 {
        self.bpm
    }

    /// History fullness (0-1)
    pub fn confidence(&self) -> f32 {
        self.confidence
    }

    pub fn interval_count(&self) -> usize {
        self.intervals.len()
    }

    /// Milliseconds per beat at the current estimate
    pub fn beat_ms(&self) -> f64 {
        60_000.0 / self.bpm as f64
    }

    pub fn reset(&mut self) {
        self.intervals.clear();
        self.last_beat_ms = None;
        self.bpm = self.config.default_bpm;
        self.confidence = 0.0;
    }
}

impl Default for TempoEstimator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_at_default() {
        let tempo = TempoEstimator::new();
        assert_eq!(tempo.bpm(), DEFAULT_BPM);
        assert_eq!(tempo.confidence(), 0.0);
    }

    #[test]
    fn test_steady_500ms_converges_to_120() {
        let mut tempo = TempoEstimator::with_config(TempoConfig {
            default_bpm: 90.0,
            ..TempoConfig::default()
        });
        assert_eq!(tempo.bpm(), 90.0);

        // Three intervals are not enough to move the estimate
        for i in 0..4 {
            tempo.record_beat(i as f64 * 500.0);
        }
        assert_eq!(tempo.bpm(), 90.0);

        tempo.record_beat(4.0 * 500.0);
        assert!(tempo.bpm() > 90.0 && tempo.bpm() < 120.0);

        for i in 5..30 {
            tempo.record_beat(i as f64 * 500.0);
        }
        assert!((tempo.bpm() - 120.0).abs() < 0.5);
        assert_eq!(tempo.confidence(), 1.0);
    }

    #[test]
    fn test_confidence_rises_until_capacity() {
        let mut tempo = TempoEstimator::new();
        tempo.record_beat(0.0);
        let mut last = 0.0;
        for i in 1..=16 {
            tempo.record_beat(i as f64 * 400.0);
            assert!(tempo.confidence() > last);
            last = tempo.confidence();
        }
        assert_eq!(tempo.confidence(), 1.0);
        tempo.record_beat(17.0 * 400.0);
        assert_eq!(tempo.confidence(), 1.0);
        assert_eq!(tempo.interval_count(), 16);
    }

    #[test]
    fn test_moves_gradually_toward_new_tempo() {
        let mut tempo = TempoEstimator::new();
        let mut previous = tempo.bpm();
        for i in 0..40 {
            tempo.record_beat(i as f64 * 400.0);
            let bpm = tempo.bpm();
            assert!(bpm >= previous, "estimate should rise monotonically");
            assert!(bpm - previous < 10.0, "estimate jumped {previous} -> {bpm}");
            previous = bpm;
        }
        assert!((tempo.bpm() - 150.0).abs() < 1.0);
    }

    #[test]
    fn test_implausible_intervals_are_discarded() {
        let mut tempo = TempoEstimator::new();
        tempo.record_beat(0.0);
        tempo.record_beat(50.0);
        tempo.record_beat(5050.0);
        assert_eq!(tempo.interval_count(), 0);
        assert_eq!(tempo.bpm(), DEFAULT_BPM);
    }

    #[test]
    fn test_needs_four_intervals_before_moving() {
        let mut tempo = TempoEstimator::new();
        for i in 0..4 {
            tempo.record_beat(i as f64 * 300.0);
        }
        assert_eq!(tempo.interval_count(), 3);
        assert_eq!(tempo.bpm(), DEFAULT_BPM);
        tempo.record_beat(1200.0);
        assert!(tempo.bpm() > DEFAULT_BPM);
    }

    #[test]
    fn test_median_ignores_single_outlier() {
        let mut tempo = TempoEstimator::new();
        let times = [0.0, 500.0, 1000.0, 1500.0, 1700.0, 2200.0, 2700.0, 3200.0];
        for t in times {
            tempo.record_beat(t);
        }
        assert_eq!(tempo.interval_count(), 7);
        assert!(tempo.bpm() > 119.0 && tempo.bpm() < 121.0);
    }

    #[test]
    fn test_reset_restores_default() {
        let mut tempo = TempoEstimator::new();
        for i in 0..10 {
            tempo.record_beat(i as f64 * 300.0);
        }
        tempo.reset();
        assert_eq!(tempo.bpm(), DEFAULT_BPM);
        assert_eq!(tempo.interval_count(), 0);
    }
}
