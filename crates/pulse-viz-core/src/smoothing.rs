//! Scalar smoothing accumulators owned by detectors and scenes.

/// Exponential moving average with a fixed coefficient.
#[derive(Clone, Copy, Debug)]
pub struct SmoothedEnergy {
    value: f32,
    coefficient: f32,
}

impl SmoothedEnergy {
    /// `coefficient` is the weight of each new sample (clamped to 0-1)
    pub fn new(coefficient: f32) -> Self {
        Self {
            value: 0.0,
            coefficient: coefficient.clamp(0.0, 1.0),
        }
    }

    pub fn update(&mut self, sample: f32) -> f32 {
        if sample.is_finite() {
            self.value += (sample - self.value) * self.coefficient;
        }
        self.value
    }

    pub fn value(&self) -> f32 {
        self.value
    }

    pub fn reset(&mut self) {
        self.value = 0.0;
    }
}

/// Asymmetric follower: fast attack, slower release.
#[derive(Clone, Copy, Debug)]
pub struct Envelope {
    value: f32,
    attack: f32,
    release: f32,
}

impl Envelope {
    pub fn new(attack: f32, release: f32) -> Self {
        Self {
            value: 0.0,
            attack: attack.clamp(0.0, 1.0),
            release: release.clamp(0.0, 1.0),
        }
    }

    pub fn update(&mut self, sample: f32) -> f32 {
        if !sample.is_finite() {
            return self.value;
        }
        let rate = if sample > self.value {
            self.attack
        } else {
            self.release
        };
        self.value = self.value * (1.0 - rate) + sample * rate;
        self.value
    }

    pub fn value(&self) -> f32 {
        self.value
    }
}

impl Default for Envelope {
    fn default() -> Self {
        Self::new(0.7, 0.15)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ema_converges() {
        let mut s = SmoothedEnergy::new(0.2);
        for _ in 0..100 {
            s.update(0.5);
        }
        assert!((s.value() - 0.5).abs() < 1e-4);
    }

    #[test]
    fn test_ema_ignores_nan() {
        let mut s = SmoothedEnergy::new(0.5);
        s.update(1.0);
        s.update(f32::NAN);
        assert_eq!(s.value(), 0.5);
    }

    #[test]
    fn test_envelope_attacks_faster_than_it_releases() {
        let mut env = Envelope::new(0.8, 0.1);
        let up = env.update(1.0);
        assert!(up >= 0.8);
        let down = env.update(0.0);
        assert!(down > 0.7);
    }
}
