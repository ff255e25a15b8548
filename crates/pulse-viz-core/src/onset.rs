//! Onset (beat) detection over band energy streams.
//!
//! Two detectors share the same refractory gating:
//!
//! 1. [`OnsetDetector`] watches one band's normalized energy and fires on any of
//!    three heuristics:
//!    - the value jumps above its own moving average by a fixed delta
//!    - the value rises by a relative factor over the previous tick
//!    - sustained loud passages that keep creeping upward (armed late in a track)
//!
//!    Its cooldown follows the estimated tempo, with a per-band divisor so bass
//!    hits are spaced further apart than mids and highs.
//!
//! 2. [`IntenseOnsetDetector`] is the stricter variant used for highlight
//!    effects: it z-scores spectral flux against a rolling window and only
//!    fires on outliers.

use serde::{Deserialize, Serialize};

use crate::flux::FluxHistory;
use crate::smoothing::SmoothedEnergy;

/// Band a detector is attached to
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BandKind {
    Bass,
    Mid,
    High,
}

/// Which heuristic produced a beat
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OnsetTrigger {
    AboveAverage,
    RelativeJump,
    Sustained,
    FluxSpike,
}

/// A detected transient. Only lives for the tick it fires on.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BeatEvent {
    pub timestamp_ms: f64,
    pub band: BandKind,
    /// Band energy at the moment of firing (0-1)
    pub intensity: f32,
    pub trigger: OnsetTrigger,
}

/// Tunable thresholds for [`OnsetDetector`].
///
/// The defaults are empirical starting points, not derived constants.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OnsetConfig {
    /// EMA coefficient of the moving average
    pub smoothing: f32,
    /// Required excess over the moving average
    pub average_delta: f32,
    /// Absolute energy floor for the first two heuristics
    pub floor: f32,
    /// Required multiplicative rise over the previous tick
    pub jump_ratio: f32,
    /// Required absolute rise over the previous tick
    pub jump_delta: f32,
    /// Absolute energy required by the sustained heuristic
    pub sustain_floor: f32,
    /// Minimum per-tick rise for the sustained heuristic
    pub sustain_rise: f32,
    /// Detector runtime before the sustained heuristic is armed
    pub sustain_after_ms: f64,
    /// Cooldown is one beat at the current tempo divided by this
    pub cooldown_divisor: f32,
    /// Cooldown never drops below this
    pub min_cooldown_ms: f64,
    /// Per-tick multiplier of the beat envelope
    pub envelope_decay: f32,
}

impl OnsetConfig {
    pub fn for_band(band: BandKind) -> Self {
        let base = Self::default();
        match band {
            BandKind::Bass => base,
            BandKind::Mid => Self {
                floor: 0.25,
                cooldown_divisor: 3.0,
                envelope_decay: 0.86,
                ..base
            },
            BandKind::High => Self {
                average_delta: 0.05,
                floor: 0.2,
                cooldown_divisor: 4.0,
                min_cooldown_ms: 80.0,
                envelope_decay: 0.82,
                ..base
            },
        }
    }

    /// Refractory length for a given tempo estimate
    pub fn cooldown_ms(&self, bpm: f32) -> f64 {
        let bpm = if bpm.is_finite() && bpm > 0.0 {
            bpm
        } else {
            crate::tempo::DEFAULT_BPM
        };
        let divisor = self.cooldown_divisor.max(1.0) as f64;
        let beat_ms = 60_000.0 / bpm as f64;
        (beat_ms / divisor).max(self.min_cooldown_ms)
    }
}

impl Default for OnsetConfig {
    fn default() -> Self {
        Self {
            smoothing: 0.1,
            average_delta: 0.04,
            floor: 0.3,
            jump_ratio: 1.15,
            jump_delta: 0.02,
            sustain_floor: 0.7,
            sustain_rise: 0.005,
            sustain_after_ms: 60_000.0,
            cooldown_divisor: 2.0,
            min_cooldown_ms: 120.0,
            envelope_decay: 0.9,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum OnsetState {
    Idle,
    Refractory { until_ms: f64 },
}

/// Per-band adaptive onset detector.
pub struct OnsetDetector {
    band: BandKind,
    config: OnsetConfig,
    state: OnsetState,
    average: SmoothedEnergy,
    previous: f32,
    /// Jumps to the beat intensity on fire, decays every tick
    envelope: f32,
    started_ms: Option<f64>,
}

impl OnsetDetector {
    pub fn new(band: BandKind) -> Self {
        Self::with_config(band, OnsetConfig::for_band(band))
    }

    pub fn with_config(band: BandKind, config: OnsetConfig) -> Self {
        Self {
            band,
            config,
            state: OnsetState::Idle,
            average: SmoothedEnergy::new(config.smoothing),
            previous: 0.0,
            envelope: 0.0,
            started_ms: None,
        }
    }

    /// Feed one tick of band energy.
    ///
    /// `bpm` is the current tempo estimate used to size the cooldown.
    pub fn update(&mut self, value: f32, now_ms: f64, bpm: f32) -> Option<BeatEvent> {
        let value = if value.is_finite() {
            value.clamp(0.0, 1.0)
        } else {
            0.0
        };
        let started = *self.started_ms.get_or_insert(now_ms);

        if let OnsetState::Refractory { until_ms } = self.state {
            if now_ms >= until_ms {
                self.state = OnsetState::Idle;
            }
        }

        let trigger = self.trigger(value, now_ms - started);
        let event = match (self.state, trigger) {
            (OnsetState::Idle, Some(trigger)) => {
                self.state = OnsetState::Refractory {
                    until_ms: now_ms + self.config.cooldown_ms(bpm),
                };
                self.envelope = value;
                Some(BeatEvent {
                    timestamp_ms: now_ms,
                    band: self.band,
                    intensity: value,
                    trigger,
                })
            }
            _ => {
                self.envelope *= self.config.envelope_decay;
                None
            }
        };

        self.average.update(value);
        self.previous = value;
        event
    }

    fn trigger(&self, value: f32, elapsed_ms: f64) -> Option<OnsetTrigger> {
        let c = &self.config;
        let average = self.average.value();
        let previous = self.previous;

        if value - average > c.average_delta && value > c.floor {
            return Some(OnsetTrigger::AboveAverage);
        }
        if value >= previous * c.jump_ratio && value > c.floor && value - previous > c.jump_delta {
            return Some(OnsetTrigger::RelativeJump);
        }
        if elapsed_ms >= c.sustain_after_ms
            && value > c.sustain_floor
            && value - previous > c.sustain_rise
            && value >= average
        {
            return Some(OnsetTrigger::Sustained);
        }
        None
    }

    pub fn band(&self) -> BandKind {
        self.band
    }

    pub fn config(&self) -> &OnsetConfig {
        &self.config
    }

    /// Decaying beat envelope (0-1)
    pub fn envelope(&self) -> f32 {
        self.envelope
    }

    pub fn is_refractory(&self, now_ms: f64) -> bool {
        matches!(self.state, OnsetState::Refractory { until_ms } if now_ms < until_ms)
    }

    pub fn reset(&mut self) {
        self.state = OnsetState::Idle;
        self.average.reset();
        self.previous = 0.0;
        self.envelope = 0.0;
        self.started_ms = None;
    }
}

/// Thresholds for the z-score detector
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntenseConfig {
    /// Flux samples kept for statistics (~0.7s at 60fps)
    pub window: usize,
    /// Standard deviations above the mean required to fire
    pub k: f32,
    /// Band energy required alongside the flux spike
    pub energy_floor: f32,
    pub refractory_ms: f64,
    /// Absolute flux floor, guards near-silent windows with tiny deviation
    pub min_flux: f32,
    /// Samples needed before the detector may fire
    pub warmup: usize,
}

impl Default for IntenseConfig {
    fn default() -> Self {
        Self {
            window: 43,
            k: 4.5,
            energy_floor: 0.35,
            refractory_ms: 400.0,
            min_flux: 0.5,
            warmup: 8,
        }
    }
}

/// Rolling-statistics onset detector for highlight beats.
pub struct IntenseOnsetDetector {
    band: BandKind,
    config: IntenseConfig,
    history: FluxHistory,
    last_fire_ms: Option<f64>,
}

impl IntenseOnsetDetector {
    pub fn new(band: BandKind, config: IntenseConfig) -> Self {
        Self {
            band,
            config,
            history: FluxHistory::new(config.window),
            last_fire_ms: None,
        }
    }

    /// Feed one tick of flux and the band energy it belongs to
    pub fn update(&mut self, flux: f32, band_energy: f32, now_ms: f64) -> Option<BeatEvent> {
        let flux = if flux.is_finite() { flux.max(0.0) } else { 0.0 };
        let c = &self.config;

        let threshold = self.history.mean() + c.k * self.history.std_dev();
        let warmed_up = self.history.len() >= c.warmup;
        let rested = self
            .last_fire_ms
            .map_or(true, |last| now_ms - last >= c.refractory_ms);

        let fired = warmed_up
            && rested
            && flux > threshold
            && flux >= c.min_flux
            && band_energy >= c.energy_floor;

        self.history.push(flux);

        if fired {
            self.last_fire_ms = Some(now_ms);
            Some(BeatEvent {
                timestamp_ms: now_ms,
                band: self.band,
                intensity: band_energy.clamp(0.0, 1.0),
                trigger: OnsetTrigger::FluxSpike,
            })
        } else {
            None
        }
    }

    pub fn history(&self) -> &FluxHistory {
        &self.history
    }

    pub fn reset(&mut self) {
        self.history.clear();
        self.last_fire_ms = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FRAME_MS: f64 = 1000.0 / 60.0;

    #[test]
    fn test_silence_never_fires() {
        let mut detector = OnsetDetector::new(BandKind::Bass);
        for i in 0..600 {
            assert!(detector.update(0.0, i as f64 * FRAME_MS, 120.0).is_none());
        }
    }

    #[test]
    fn test_bass_ramp_fires_once_past_floor_and_respects_refractory() {
        let mut detector = OnsetDetector::new(BandKind::Bass);
        let floor = detector.config().floor;
        let cooldown = detector.config().cooldown_ms(120.0);

        let mut fired = Vec::new();
        for i in 0..50 {
            let value = i as f32 / 49.0;
            let now = i as f64 * FRAME_MS;
            if let Some(event) = detector.update(value, now, 120.0) {
                fired.push(event);
            }
        }

        assert!(!fired.is_empty(), "ramp should produce at least one beat");
        assert!(fired[0].intensity > floor);
        assert_eq!(fired[0].band, BandKind::Bass);
        for pair in fired.windows(2) {
            assert!(
                pair[1].timestamp_ms - pair[0].timestamp_ms >= cooldown - 1e-6,
                "beats {:?} and {:?} are inside one refractory window",
                pair[0],
                pair[1]
            );
        }
    }

    #[test]
    fn test_spike_after_quiet_fires_above_average() {
        let mut detector = OnsetDetector::new(BandKind::Mid);
        for i in 0..60 {
            detector.update(0.1, i as f64 * FRAME_MS, 120.0);
        }
        let event = detector
            .update(0.8, 60.0 * FRAME_MS, 120.0)
            .expect("spike should fire");
        assert_eq!(event.trigger, OnsetTrigger::AboveAverage);
        assert!((event.intensity - 0.8).abs() < 1e-6);
        assert!((detector.envelope() - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_relative_jump_fires_when_average_caught_up() {
        let config = OnsetConfig {
            average_delta: 0.5,
            ..OnsetConfig::default()
        };
        let mut detector = OnsetDetector::with_config(BandKind::Bass, config);
        for i in 0..200 {
            detector.update(0.4, i as f64 * FRAME_MS, 120.0);
        }
        let event = detector
            .update(0.5, 200.0 * FRAME_MS, 120.0)
            .expect("25% jump should fire");
        assert_eq!(event.trigger, OnsetTrigger::RelativeJump);
    }

    #[test]
    fn test_sustained_heuristic_only_late_in_track() {
        let config = OnsetConfig {
            average_delta: 1.0,
            jump_delta: 1.0,
            sustain_rise: 0.001,
            sustain_after_ms: 1000.0,
            ..OnsetConfig::default()
        };
        let mut detector = OnsetDetector::with_config(BandKind::Bass, config);

        let mut early = 0;
        let mut late = 0;
        for i in 0..120 {
            let now = i as f64 * FRAME_MS;
            let value = 0.71 + i as f32 * 0.002;
            if let Some(event) = detector.update(value, now, 120.0) {
                assert_eq!(event.trigger, OnsetTrigger::Sustained);
                if now < 1000.0 {
                    early += 1;
                } else {
                    late += 1;
                }
            }
        }
        assert_eq!(early, 0);
        assert!(late > 0);
    }

    #[test]
    fn test_faster_tempo_shortens_cooldown() {
        let config = OnsetConfig::for_band(BandKind::Bass);
        assert!(config.cooldown_ms(180.0) < config.cooldown_ms(90.0));
        assert_eq!(config.cooldown_ms(120.0), 250.0);
        assert_eq!(config.cooldown_ms(f32::NAN), 250.0);
    }

    #[test]
    fn test_bass_spacing_longer_than_high() {
        let bass = OnsetConfig::for_band(BandKind::Bass).cooldown_ms(120.0);
        let mid = OnsetConfig::for_band(BandKind::Mid).cooldown_ms(120.0);
        let high = OnsetConfig::for_band(BandKind::High).cooldown_ms(120.0);
        assert!(bass > mid);
        assert!(mid > high);
    }

    #[test]
    fn test_envelope_decays_between_beats() {
        let mut detector = OnsetDetector::new(BandKind::Bass);
        detector.update(0.0, 0.0, 120.0);
        detector.update(0.9, FRAME_MS, 120.0).expect("spike");
        let peak = detector.envelope();
        detector.update(0.0, 2.0 * FRAME_MS, 120.0);
        assert!(detector.envelope() < peak);
    }

    #[test]
    fn test_reset_clears_refractory() {
        let mut detector = OnsetDetector::new(BandKind::Bass);
        detector.update(0.0, 0.0, 120.0);
        detector.update(0.9, FRAME_MS, 120.0).expect("spike");
        assert!(detector.is_refractory(2.0 * FRAME_MS));
        detector.reset();
        assert!(!detector.is_refractory(2.0 * FRAME_MS));
    }

    #[test]
    fn test_intense_fires_only_on_outliers() {
        let mut detector = IntenseOnsetDetector::new(BandKind::Bass, IntenseConfig::default());
        let mut fired = 0;
        for i in 0..60 {
            let flux = if i % 2 == 0 { 0.1 } else { 0.2 };
            if detector.update(flux, 0.6, i as f64 * FRAME_MS).is_some() {
                fired += 1;
            }
        }
        assert_eq!(fired, 0);

        let event = detector
            .update(3.0, 0.6, 60.0 * FRAME_MS)
            .expect("outlier should fire");
        assert_eq!(event.trigger, OnsetTrigger::FluxSpike);

        // Refractory blocks an immediate second spike
        assert!(detector.update(6.0, 0.6, 61.0 * FRAME_MS).is_none());
    }

    #[test]
    fn test_intense_requires_energy_floor() {
        let mut detector = IntenseOnsetDetector::new(BandKind::Bass, IntenseConfig::default());
        for i in 0..30 {
            detector.update(0.1, 0.1, i as f64 * FRAME_MS);
        }
        assert!(detector.update(5.0, 0.1, 30.0 * FRAME_MS).is_none());
    }

    #[test]
    fn test_intense_history_is_bounded() {
        let config = IntenseConfig {
            window: 10,
            ..IntenseConfig::default()
        };
        let mut detector = IntenseOnsetDetector::new(BandKind::High, config);
        for i in 0..100 {
            detector.update(0.1, 0.0, i as f64);
            assert!(detector.history().len() <= 10);
        }
    }

    #[test]
    fn test_config_overrides_from_toml() {
        let config: OnsetConfig = toml::from_str("floor = 0.5\ncooldown_divisor = 4.0").unwrap();
        assert_eq!(config.floor, 0.5);
        assert_eq!(config.cooldown_divisor, 4.0);
        assert_eq!(config.jump_ratio, OnsetConfig::default().jump_ratio);
    }
}
