//! Per-scene feature pipeline.
//!
//! Glues band aggregation, the three per-band onset detectors, the intense
//! flux detector and tempo estimation into a single `process` call made once
//! per animation tick.

use tracing::debug;

use crate::bands::{BandEnergies, BandLayout, BandRange};
use crate::flux::{spectral_flux, FluxWeighting};
use crate::onset::{BandKind, BeatEvent, IntenseConfig, IntenseOnsetDetector, OnsetConfig, OnsetDetector};
use crate::spectrum::SpectrumSnapshot;
use crate::tempo::{TempoConfig, TempoEstimator};

/// Thresholds and ranges a scene hands to its [`BeatTracker`]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TrackerConfig {
    pub layout: BandLayout,
    pub bass: OnsetConfig,
    pub mid: OnsetConfig,
    pub high: OnsetConfig,
    pub intense: IntenseConfig,
    /// Bins watched by the intense detector. Defaults to bass plus the lower
    /// quarter of the mid band.
    pub flux_range: Option<BandRange>,
    pub flux_weighting: FluxWeighting,
    pub tempo: TempoConfig,
}

impl TrackerConfig {
    pub fn new(layout: BandLayout) -> Self {
        Self {
            layout,
            bass: OnsetConfig::for_band(BandKind::Bass),
            mid: OnsetConfig::for_band(BandKind::Mid),
            high: OnsetConfig::for_band(BandKind::High),
            intense: IntenseConfig::default(),
            flux_range: None,
            flux_weighting: FluxWeighting::LowBias,
            tempo: TempoConfig::default(),
        }
    }

    fn resolved_flux_range(&self) -> BandRange {
        self.flux_range.unwrap_or_else(|| {
            let mid = self.layout.mid;
            let low_mid_end = mid.start + mid.len() / 4;
            BandRange::new(self.layout.bass.start, low_mid_end.max(self.layout.bass.end))
        })
    }
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self::new(BandLayout::default())
    }
}

/// Everything a scene reads back for one tick
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BeatFrame {
    pub bands: BandEnergies,
    /// Beats fired this tick, at most one per band
    pub beats: Vec<BeatEvent>,
    pub intense: Option<BeatEvent>,
    pub flux: f32,
    pub bpm: f32,
    pub confidence: f32,
    /// Decaying beat envelopes for bass, mid and high
    pub envelopes: BandEnergies,
}

impl BeatFrame {
    pub fn beat(&self, band: BandKind) -> Option<&BeatEvent> {
        self.beats.iter().find(|b| b.band == band)
    }

    pub fn has_beat(&self) -> bool {
        !self.beats.is_empty()
    }
}

pub struct BeatTracker {
    layout: BandLayout,
    flux_range: BandRange,
    flux_weighting: FluxWeighting,
    bass: OnsetDetector,
    mid: OnsetDetector,
    high: OnsetDetector,
    intense: IntenseOnsetDetector,
    tempo: TempoEstimator,
    previous: SpectrumSnapshot,
    has_previous: bool,
}

impl BeatTracker {
    pub fn new(config: TrackerConfig) -> Self {
        Self {
            layout: config.layout,
            flux_range: config.resolved_flux_range(),
            flux_weighting: config.flux_weighting,
            bass: OnsetDetector::with_config(BandKind::Bass, config.bass),
            mid: OnsetDetector::with_config(BandKind::Mid, config.mid),
            high: OnsetDetector::with_config(BandKind::High, config.high),
            intense: IntenseOnsetDetector::new(BandKind::Bass, config.intense),
            tempo: TempoEstimator::with_config(config.tempo),
            previous: SpectrumSnapshot::default(),
            has_previous: false,
        }
    }

    /// Run one tick of the pipeline.
    ///
    /// An empty snapshot yields zero energies and no beats; detectors keep
    /// decaying as if the tick were silent.
    pub fn process(&mut self, snapshot: &SpectrumSnapshot, now_ms: f64) -> BeatFrame {
        let bins = snapshot.as_slice();
        let bands = self.layout.energies(bins);
        let bpm = self.tempo.bpm();

        let mut beats = Vec::new();
        if let Some(beat) = self.bass.update(bands.bass, now_ms, bpm) {
            self.tempo.record_beat(beat.timestamp_ms);
            beats.push(beat);
        }
        if let Some(beat) = self.mid.update(bands.mid, now_ms, bpm) {
            beats.push(beat);
        }
        if let Some(beat) = self.high.update(bands.treble, now_ms, bpm) {
            beats.push(beat);
        }

        let flux = if self.has_previous {
            spectral_flux(
                self.previous.as_slice(),
                bins,
                self.flux_range,
                self.flux_weighting,
            )
        } else {
            0.0
        };
        let intense = self.intense.update(flux, bands.bass, now_ms);
        if let Some(beat) = &intense {
            debug!(
                "Intense beat at {:.0}ms (flux {:.2}, bass {:.2})",
                beat.timestamp_ms, flux, beat.intensity
            );
        }

        self.previous.copy_from(snapshot);
        self.has_previous = true;

        BeatFrame {
            bands,
            beats,
            intense,
            flux,
            bpm: self.tempo.bpm(),
            confidence: self.tempo.confidence(),
            envelopes: BandEnergies {
                bass: self.bass.envelope(),
                mid: self.mid.envelope(),
                treble: self.high.envelope(),
            },
        }
    }

    pub fn tempo(&self) -> &TempoEstimator {
        &self.tempo
    }

    pub fn reset(&mut self) {
        self.bass.reset();
        self.mid.reset();
        self.high.reset();
        self.intense.reset();
        self.tempo.reset();
        self.previous.fill(0);
        self.has_previous = false;
    }
}

impl Default for BeatTracker {
    fn default() -> Self {
        Self::new(TrackerConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FRAME_MS: f64 = 1000.0 / 60.0;

    fn layout() -> BandLayout {
        BandLayout {
            bass: BandRange::new(0, 7),
            mid: BandRange::new(8, 47),
            treble: BandRange::new(48, 127),
        }
    }

    fn frame(bass: u8) -> SpectrumSnapshot {
        let mut bins = vec![0u8; 128];
        bins[..8].iter_mut().for_each(|b| *b = bass);
        SpectrumSnapshot::from_bins(bins)
    }

    #[test]
    fn test_silence_produces_no_beats() {
        let mut tracker = BeatTracker::new(TrackerConfig::new(layout()));
        for i in 0..120 {
            let out = tracker.process(&frame(0), i as f64 * FRAME_MS);
            assert!(!out.has_beat());
            assert!(out.intense.is_none());
            assert_eq!(out.flux, 0.0);
            assert_eq!(out.bpm, crate::tempo::DEFAULT_BPM);
        }
    }

    #[test]
    fn test_empty_snapshot_is_harmless() {
        let mut tracker = BeatTracker::new(TrackerConfig::new(layout()));
        tracker.process(&frame(200), 0.0);
        let out = tracker.process(&SpectrumSnapshot::default(), FRAME_MS);
        assert_eq!(out.bands, BandEnergies::default());
        assert_eq!(out.flux, 0.0);
    }

    #[test]
    fn test_kick_fires_bass_beat() {
        let mut tracker = BeatTracker::new(TrackerConfig::new(layout()));
        for i in 0..30 {
            tracker.process(&frame(0), i as f64 * FRAME_MS);
        }
        let out = tracker.process(&frame(230), 30.0 * FRAME_MS);
        let beat = out.beat(BandKind::Bass).expect("bass beat");
        assert!(beat.intensity > 0.8);
        assert!(out.flux > 0.0);
        assert!(out.envelopes.bass > 0.8);
    }

    #[test]
    fn test_intense_beat_on_spike_after_quiet_window() {
        let mut tracker = BeatTracker::new(TrackerConfig::new(layout()));
        for i in 0..60 {
            tracker.process(&frame(10), i as f64 * FRAME_MS);
        }
        let out = tracker.process(&frame(250), 60.0 * FRAME_MS);
        assert!(out.intense.is_some());
    }

    #[test]
    fn test_steady_kicks_pull_tempo() {
        let mut tracker = BeatTracker::new(TrackerConfig::new(layout()));
        // 150 BPM: kick every 24 frames at 60fps (400ms)
        for i in 0..(24 * 40) {
            let level = if i % 24 == 0 { 230 } else { 0 };
            tracker.process(&frame(level), i as f64 * FRAME_MS);
        }
        let tempo = tracker.tempo();
        assert!(tempo.interval_count() >= 16);
        assert!((tempo.bpm() - 150.0).abs() < 2.0, "bpm {}", tempo.bpm());
    }

    #[test]
    fn test_reset_forgets_previous_frame() {
        let mut tracker = BeatTracker::new(TrackerConfig::new(layout()));
        tracker.process(&frame(0), 0.0);
        tracker.reset();
        let out = tracker.process(&frame(200), FRAME_MS);
        assert_eq!(out.flux, 0.0);
    }

    #[test]
    fn test_default_flux_range_covers_bass() {
        let config = TrackerConfig::new(layout());
        let range = config.resolved_flux_range();
        assert_eq!(range.start, 0);
        assert_eq!(range.end, 18);
    }
}
