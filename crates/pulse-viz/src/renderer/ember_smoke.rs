//! Embers and smoke.
//!
//! Bass onsets throw bursts of embers up from the bottom of the screen, sized
//! by intensity squared. Each ember's heat is a damped spring released toward
//! zero, so it flares briefly and then cools. Mids feed a steady column of
//! smoke puffs, treble makes the embers flicker.

use super::{paint, FrameInput, SceneContext, Visualization};
use nannou::prelude::*;
use pulse_viz_core::{BandKind, BeatTracker, Color, Palette, SmoothedEnergy};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

const MAX_EMBERS: usize = if cfg!(debug_assertions) { 240 } else { 600 };
const MAX_SMOKE: usize = if cfg!(debug_assertions) { 60 } else { 140 };
/// Embers in a full-intensity burst
const BURST_SIZE: f32 = 48.0;
const HEAT_STIFFNESS: f32 = 0.08;
const HEAT_DAMPING: f32 = 0.82;
const GRAVITY: f32 = 0.0006;

#[derive(Clone, Copy, Default)]
struct Ember {
    alive: bool,
    /// Normalized coords, x in -1..1, y from -1 (bottom) upward
    pos: Vec2,
    vel: Vec2,
    heat: f32,
    heat_vel: f32,
    size: f32,
    age: u32,
    color: Option<Color>,
}

#[derive(Clone, Copy, Default)]
struct Smoke {
    alive: bool,
    pos: Vec2,
    vel: Vec2,
    radius: f32,
    life: f32,
}

pub struct EmberSmoke {
    palette: Palette,
    tracker: BeatTracker,
    embers: Vec<Ember>,
    smoke: Vec<Smoke>,
    rng: SmallRng,
    mid: SmoothedEnergy,
    treble: SmoothedEnergy,
    /// Fractional smoke spawn accumulator
    smoke_budget: f32,
    frame_count: u32,
}

impl EmberSmoke {
    pub fn new(context: SceneContext) -> Self {
        Self {
            palette: context.palette,
            tracker: BeatTracker::new(context.tracker),
            embers: vec![Ember::default(); MAX_EMBERS],
            smoke: vec![Smoke::default(); MAX_SMOKE],
            rng: SmallRng::from_rng(&mut rand::rng()),
            mid: SmoothedEnergy::new(0.1),
            treble: SmoothedEnergy::new(0.3),
            smoke_budget: 0.0,
            frame_count: 0,
        }
    }

    fn burst(&mut self, intensity: f32) {
        let count = (intensity * intensity * BURST_SIZE).round() as usize;
        let origin_x = self.rng.random_range(-0.6..0.6);
        let mut spawned = 0;
        for ember in self.embers.iter_mut().filter(|e| !e.alive) {
            if spawned >= count {
                break;
            }
            *ember = Ember {
                alive: true,
                pos: vec2(origin_x + self.rng.random_range(-0.1..0.1), -1.0),
                vel: vec2(
                    self.rng.random_range(-0.006..0.006),
                    self.rng.random_range(0.01..0.025) * (0.6 + intensity),
                ),
                heat: 0.0,
                // Kick the spring; heat overshoots upward then settles at zero
                heat_vel: 0.35 + intensity * 0.4,
                size: self.rng.random_range(1.5..4.0),
                age: 0,
                color: Some(self.palette.pick(&mut self.rng)),
            };
            spawned += 1;
        }
    }

    fn spawn_smoke(&mut self) {
        if let Some(puff) = self.smoke.iter_mut().find(|s| !s.alive) {
            *puff = Smoke {
                alive: true,
                pos: vec2(self.rng.random_range(-0.7..0.7), -1.05),
                vel: vec2(self.rng.random_range(-0.001..0.001), self.rng.random_range(0.002..0.005)),
                radius: self.rng.random_range(0.05..0.12),
                life: 1.0,
            };
        }
    }

    fn live_embers(&self) -> usize {
        self.embers.iter().filter(|e| e.alive).count()
    }
}

impl Visualization for EmberSmoke {
    fn tick(&mut self, input: &FrameInput) {
        self.frame_count = self.frame_count.wrapping_add(1);
        let frame = self.tracker.process(input.spectrum, input.now_ms);
        self.mid.update(frame.bands.mid);
        self.treble.update(frame.bands.treble);

        if let Some(beat) = frame.beat(BandKind::Bass) {
            self.burst(beat.intensity);
        }
        if let Some(intense) = frame.intense {
            self.burst(intense.intensity.max(0.8));
        }

        self.smoke_budget += 0.05 + self.mid.value() * 0.6;
        while self.smoke_budget >= 1.0 {
            self.smoke_budget -= 1.0;
            self.spawn_smoke();
        }

        let flicker = self.treble.value();
        for ember in self.embers.iter_mut().filter(|e| e.alive) {
            ember.heat_vel = (ember.heat_vel - ember.heat * HEAT_STIFFNESS) * HEAT_DAMPING;
            ember.heat += ember.heat_vel;
            ember.vel.y -= GRAVITY;
            ember.vel.x += self.rng.random_range(-1.0..1.0) * 0.0008 * flicker;
            ember.pos += ember.vel;
            ember.age += 1;

            let cooled = ember.age > 10 && ember.heat.abs() < 0.02;
            if cooled || ember.pos.y < -1.2 || ember.pos.x.abs() > 1.3 {
                ember.alive = false;
            }
        }

        for puff in self.smoke.iter_mut().filter(|s| s.alive) {
            puff.pos += puff.vel;
            puff.radius += 0.0015;
            puff.life -= 0.006;
            if puff.life <= 0.0 {
                puff.alive = false;
            }
        }
    }

    fn draw(&self, draw: &Draw, bounds: Rect) {
        let background = self.palette.get(self.palette.len() - 1).scaled(0.15);
        draw.background().color(paint(background, 1.0));

        let half_w = bounds.w() / 2.0;
        let half_h = bounds.h() / 2.0;
        let to_screen = |p: Vec2| vec2(bounds.x() + p.x * half_w, bounds.y() + p.y * half_h);
        let smoke_color = self.palette.get(0).lerp(&Color::new(0.5, 0.5, 0.5), 0.6);

        for puff in self.smoke.iter().filter(|s| s.alive) {
            draw.ellipse()
                .xy(to_screen(puff.pos))
                .radius(puff.radius * half_h)
                .color(paint(smoke_color, puff.life * 0.12));
        }

        let flicker = self.treble.value();
        for (i, ember) in self.embers.iter().enumerate().filter(|(_, e)| e.alive) {
            let heat = ember.heat.clamp(0.0, 1.0);
            let wobble = 1.0 + ((self.frame_count as f32 * 0.7 + i as f32).sin() * flicker * 0.4);
            let color = ember.color.unwrap_or(Color::new(1.0, 0.5, 0.1));
            let glow = color.lerp(&Color::new(1.0, 0.95, 0.8), heat * 0.5);
            let p = to_screen(ember.pos);

            draw.ellipse()
                .xy(p)
                .radius(ember.size * (2.5 + heat * 3.0) * wobble)
                .color(paint(glow, heat * 0.15));
            draw.ellipse()
                .xy(p)
                .radius(ember.size * (0.6 + heat) * wobble)
                .color(paint(glow, 0.3 + heat * 0.7));
        }
    }

    fn destroy(&mut self) {
        self.embers.iter_mut().for_each(|e| e.alive = false);
        self.smoke.iter_mut().for_each(|s| s.alive = false);
        self.tracker.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::context;
    use super::*;
    use pulse_viz_core::SpectrumSnapshot;

    #[test]
    fn test_burst_size_grows_with_square_of_intensity() {
        let mut quiet = EmberSmoke::new(context());
        quiet.burst(0.5);
        let mut loud = EmberSmoke::new(context());
        loud.burst(1.0);
        assert_eq!(quiet.live_embers(), 12);
        assert_eq!(loud.live_embers(), 48);
    }

    #[test]
    fn test_embers_cool_and_die() {
        let mut scene = EmberSmoke::new(context());
        scene.burst(1.0);
        let silence = SpectrumSnapshot::new(128);
        let mut peak_heat: f32 = 0.0;
        for i in 0..600 {
            scene.tick(&FrameInput {
                spectrum: &silence,
                now_ms: i as f64 * 16.0,
                dt: 1.0 / 60.0,
            });
            for e in scene.embers.iter().filter(|e| e.alive) {
                peak_heat = peak_heat.max(e.heat);
            }
        }
        assert!(peak_heat > 0.5);
        assert_eq!(scene.live_embers(), 0);
    }

    #[test]
    fn test_pool_never_grows() {
        let mut scene = EmberSmoke::new(context());
        for _ in 0..100 {
            scene.burst(1.0);
        }
        assert_eq!(scene.embers.len(), MAX_EMBERS);
        assert_eq!(scene.live_embers(), MAX_EMBERS);
    }
}
