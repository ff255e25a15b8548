//! Toroidal particle field for the ambient scene.
//!
//! Particles random-walk their velocity with treble, move with mids and wrap
//! around the canvas edges. The population follows a target count that the
//! scene derives from overall energy each tick.

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParticleConfig {
    /// Largest initial speed component (px per frame)
    pub initial_speed: f32,
    pub min_size: f32,
    pub max_size: f32,
    /// Velocity kick per frame at full treble
    pub jitter: f32,
    /// Speed multiplier with silent mids
    pub base_speed: f32,
    /// Extra speed multiplier at full mids
    pub mid_gain: f32,
    /// Velocity components are clamped to this
    pub max_velocity: f32,
}

impl Default for ParticleConfig {
    fn default() -> Self {
        Self {
            initial_speed: 0.4,
            min_size: 1.0,
            max_size: 3.5,
            jitter: 0.15,
            base_speed: 0.3,
            mid_gain: 2.5,
            max_velocity: 2.0,
        }
    }
}

/// Audio terms driving one simulation step
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct FieldDrive {
    pub mid: f32,
    pub treble: f32,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Particle {
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
    pub size: f32,
}

pub struct ParticleField {
    config: ParticleConfig,
    particles: Vec<Particle>,
    width: f32,
    height: f32,
    rng: SmallRng,
}

impl ParticleField {
    pub fn new(config: ParticleConfig) -> Self {
        Self::with_rng(config, SmallRng::from_rng(&mut rand::rng()))
    }

    pub fn seeded(config: ParticleConfig, seed: u64) -> Self {
        Self::with_rng(config, SmallRng::seed_from_u64(seed))
    }

    fn with_rng(config: ParticleConfig, rng: SmallRng) -> Self {
        Self {
            config,
            particles: Vec::new(),
            width: 0.0,
            height: 0.0,
            rng,
        }
    }

    /// Grow by appending random particles or shrink from the tail until the
    /// field holds exactly `target` particles.
    pub fn ensure_count(&mut self, target: usize, width: f32, height: f32) {
        self.set_bounds(width, height);
        if self.particles.len() > target {
            self.particles.truncate(target);
            return;
        }
        while self.particles.len() < target {
            let particle = self.random_particle();
            self.particles.push(particle);
        }
    }

    fn random_particle(&mut self) -> Particle {
        let c = &self.config;
        let speed = c.initial_speed.max(f32::EPSILON);
        let (min_size, max_size) = (c.min_size.min(c.max_size), c.max_size.max(c.min_size));
        let rng = &mut self.rng;
        Particle {
            x: random_coord(rng, self.width),
            y: random_coord(rng, self.height),
            vx: rng.random_range(-speed..speed),
            vy: rng.random_range(-speed..speed),
            size: if max_size > min_size {
                rng.random_range(min_size..max_size)
            } else {
                min_size
            },
        }
    }

    /// Canvas bounds used for spawning and wrapping. Existing particles are
    /// left alone and wrap into the new bounds on the next tick.
    pub fn set_bounds(&mut self, width: f32, height: f32) {
        self.width = sanitize_extent(width);
        self.height = sanitize_extent(height);
    }

    /// Advance one step. `dt` is in seconds; 1/60 is one nominal frame.
    pub fn tick(&mut self, dt: f32, drive: FieldDrive) {
        let frames = if dt.is_finite() { (dt * 60.0).clamp(0.0, 4.0) } else { 0.0 };
        let treble = drive.treble.clamp(0.0, 1.0);
        let mid = drive.mid.clamp(0.0, 1.0);

        let c = self.config;
        let kick = c.jitter * treble * frames;
        let speed = (c.base_speed + mid * c.mid_gain) * frames;
        let (width, height) = (self.width, self.height);

        for p in &mut self.particles {
            if kick > 0.0 {
                p.vx += self.rng.random_range(-kick..kick);
                p.vy += self.rng.random_range(-kick..kick);
            }
            p.vx = p.vx.clamp(-c.max_velocity, c.max_velocity);
            p.vy = p.vy.clamp(-c.max_velocity, c.max_velocity);

            p.x = wrap(p.x + p.vx * speed, width);
            p.y = wrap(p.y + p.vy * speed, height);
        }
    }

    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    pub fn len(&self) -> usize {
        self.particles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    pub fn bounds(&self) -> (f32, f32) {
        (self.width, self.height)
    }

    pub fn clear(&mut self) {
        self.particles.clear();
    }
}

fn sanitize_extent(v: f32) -> f32 {
    if v.is_finite() {
        v.max(0.0)
    } else {
        0.0
    }
}

fn random_coord(rng: &mut SmallRng, extent: f32) -> f32 {
    if extent > 0.0 {
        rng.random_range(0.0..extent)
    } else {
        0.0
    }
}

/// Toroidal wrap into `[0, extent)`
fn wrap(v: f32, extent: f32) -> f32 {
    if extent <= 0.0 || !v.is_finite() {
        return 0.0;
    }
    let wrapped = v.rem_euclid(extent);
    // rem_euclid can round up to `extent` for tiny negative inputs
    if wrapped >= extent {
        0.0
    } else {
        wrapped
    }
}
