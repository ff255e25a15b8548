//! Fixed-capacity pool of transient ripples.
//!
//! Slots live in an arena with a free-index stack; spawning never allocates
//! and is silently dropped once every slot is busy. Radius and lifetime grow
//! super-linearly with the spawning energy so loud transients dominate.

use rand::rngs::SmallRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::track::{Color, Palette};

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RippleConfig {
    pub capacity: usize,
    /// Radius of a zero-energy ripple (normalized device units)
    pub min_radius: f32,
    /// Radius of a full-energy ripple
    pub max_radius: f32,
    pub min_duration_ms: f64,
    pub max_duration_ms: f64,
    /// Exponent applied to energy before scaling radius and duration
    pub response: f32,
}

impl Default for RippleConfig {
    fn default() -> Self {
        Self {
            capacity: 96,
            min_radius: 0.05,
            max_radius: 0.9,
            min_duration_ms: 400.0,
            max_duration_ms: 2200.0,
            response: 2.2,
        }
    }
}

/// Handle to a pooled ripple. Stale once its slot is recycled.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RippleId {
    pub slot: usize,
    pub generation: u32,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RippleInstance {
    /// Normalized device coordinates (-1..1)
    pub center: [f32; 2],
    pub start_ms: f64,
    pub duration_ms: f64,
    pub max_radius: f32,
    pub energy: f32,
    pub colors: [Color; 3],
}

impl RippleInstance {
    pub fn is_live(&self, now_ms: f64) -> bool {
        now_ms - self.start_ms < self.duration_ms
    }

    /// Lifetime fraction elapsed (0-1)
    pub fn progress(&self, now_ms: f64) -> f32 {
        if self.duration_ms <= 0.0 {
            return 1.0;
        }
        ((now_ms - self.start_ms) / self.duration_ms).clamp(0.0, 1.0) as f32
    }

    /// Ease-out expansion toward `max_radius`
    pub fn radius_at(&self, now_ms: f64) -> f32 {
        let t = self.progress(now_ms);
        let eased = 1.0 - (1.0 - t).powi(3);
        self.max_radius * eased
    }

    /// Fades out over the lifetime
    pub fn alpha_at(&self, now_ms: f64) -> f32 {
        let t = self.progress(now_ms);
        (1.0 - t) * (1.0 - t)
    }
}

#[derive(Clone, Debug)]
struct Slot {
    generation: u32,
    ripple: Option<RippleInstance>,
}

pub struct RipplePool {
    config: RippleConfig,
    palette: Palette,
    slots: Vec<Slot>,
    free: Vec<usize>,
    rng: SmallRng,
}

impl RipplePool {
    pub fn new(config: RippleConfig, palette: Palette) -> Self {
        Self::with_rng(config, palette, SmallRng::from_rng(&mut rand::rng()))
    }

    pub fn seeded(config: RippleConfig, palette: Palette, seed: u64) -> Self {
        Self::with_rng(config, palette, SmallRng::seed_from_u64(seed))
    }

    fn with_rng(config: RippleConfig, palette: Palette, rng: SmallRng) -> Self {
        let slots = vec![
            Slot {
                generation: 0,
                ripple: None,
            };
            config.capacity
        ];
        // Reversed so slot 0 is handed out first
        let free = (0..config.capacity).rev().collect();
        Self {
            config,
            palette,
            slots,
            free,
            rng,
        }
    }

    /// Start a ripple at `center`. Returns `None` when the pool is exhausted.
    pub fn spawn(&mut self, center: [f32; 2], energy: f32, now_ms: f64) -> Option<RippleId> {
        let Some(slot) = self.free.pop() else {
            trace!("Ripple pool exhausted, dropping spawn");
            return None;
        };

        let energy = if energy.is_finite() {
            energy.clamp(0.0, 1.0)
        } else {
            0.0
        };
        let c = &self.config;
        let shaped = energy.powf(c.response);
        let max_radius = c.min_radius + (c.max_radius - c.min_radius) * shaped;
        let duration_ms = c.min_duration_ms + (c.max_duration_ms - c.min_duration_ms) * shaped as f64;

        let colors = [
            self.palette.pick(&mut self.rng),
            self.palette.pick(&mut self.rng),
            self.palette.pick(&mut self.rng),
        ];

        let entry = &mut self.slots[slot];
        entry.ripple = Some(RippleInstance {
            center,
            start_ms: now_ms,
            duration_ms,
            max_radius,
            energy,
            colors,
        });
        Some(RippleId {
            slot,
            generation: entry.generation,
        })
    }

    /// Recycle every ripple whose lifetime has ended
    pub fn tick(&mut self, now_ms: f64) {
        for (index, entry) in self.slots.iter_mut().enumerate() {
            let expired = entry.ripple.is_some_and(|r| !r.is_live(now_ms));
            if expired {
                entry.ripple = None;
                entry.generation = entry.generation.wrapping_add(1);
                self.free.push(index);
            }
        }
    }

    pub fn live_entries(&self) -> impl Iterator<Item = &RippleInstance> {
        self.slots.iter().filter_map(|s| s.ripple.as_ref())
    }

    pub fn get(&self, id: RippleId) -> Option<&RippleInstance> {
        self.slots
            .get(id.slot)
            .filter(|s| s.generation == id.generation)
            .and_then(|s| s.ripple.as_ref())
    }

    pub fn live_count(&self) -> usize {
        self.config.capacity - self.free.len()
    }

    pub fn capacity(&self) -> usize {
        self.config.capacity
    }

    pub fn palette(&self) -> &Palette {
        &self.palette
    }

    /// Drop every live ripple
    pub fn clear(&mut self) {
        self.free.clear();
        for (index, entry) in self.slots.iter_mut().enumerate().rev() {
            if entry.ripple.take().is_some() {
                entry.generation = entry.generation.wrapping_add(1);
            }
            self.free.push(index);
        }
    }
}
