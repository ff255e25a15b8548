//! Ripple field.
//!
//! Every detected beat drops an expanding ring somewhere on screen, sized by
//! how hard it hit. Intense beats add a centered ripple and a full-screen
//! flash.

use super::{paint, FrameInput, SceneContext, Visualization};
use nannou::prelude::*;
use pulse_viz_core::{BandKind, BeatTracker, Palette, RippleConfig, RipplePool, SmoothedEnergy};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

/// Segments per ring polyline
const RING_SEGMENTS: usize = if cfg!(debug_assertions) { 48 } else { 96 };
/// Per-tick multiplier of the intense-beat flash
const FLASH_DECAY: f32 = 0.88;

pub struct RippleField {
    palette: Palette,
    tracker: BeatTracker,
    pool: RipplePool,
    rng: SmallRng,
    now_ms: f64,
    flash: f32,
    bass: SmoothedEnergy,
}

impl RippleField {
    pub fn new(context: SceneContext) -> Self {
        let pool = RipplePool::new(RippleConfig::default(), context.palette.clone());
        Self {
            palette: context.palette,
            tracker: BeatTracker::new(context.tracker),
            pool,
            rng: SmallRng::from_rng(&mut rand::rng()),
            now_ms: 0.0,
            flash: 0.0,
            bass: SmoothedEnergy::new(0.2),
        }
    }

    fn random_center(&mut self, band: BandKind) -> [f32; 2] {
        // Bass lands low and wide, highs scatter toward the top
        let (y_min, y_max) = match band {
            BandKind::Bass => (-0.8, 0.2),
            BandKind::Mid => (-0.5, 0.5),
            BandKind::High => (-0.2, 0.8),
        };
        [
            self.rng.random_range(-0.85..0.85),
            self.rng.random_range(y_min..y_max),
        ]
    }
}

impl Visualization for RippleField {
    fn tick(&mut self, input: &FrameInput) {
        self.now_ms = input.now_ms;
        self.pool.tick(input.now_ms);

        let frame = self.tracker.process(input.spectrum, input.now_ms);
        self.bass.update(frame.bands.bass);

        for beat in &frame.beats {
            let center = self.random_center(beat.band);
            self.pool.spawn(center, beat.intensity, input.now_ms);
        }

        self.flash *= FLASH_DECAY;
        if let Some(intense) = frame.intense {
            self.pool.spawn([0.0, 0.0], 1.0, input.now_ms);
            self.flash = self.flash.max(intense.intensity);
        }
    }

    fn draw(&self, draw: &Draw, bounds: Rect) {
        let background = self.palette.get(0).scaled(0.08 + self.bass.value() * 0.1);
        draw.background().color(paint(background, 1.0));

        let half_w = bounds.w() / 2.0;
        let half_h = bounds.h() / 2.0;
        let scale = half_w.min(half_h);

        for ripple in self.pool.live_entries() {
            let radius = ripple.radius_at(self.now_ms) * scale;
            let alpha = ripple.alpha_at(self.now_ms);
            if radius <= 0.5 || alpha <= 0.01 {
                continue;
            }
            let cx = bounds.x() + ripple.center[0] * half_w;
            let cy = bounds.y() + ripple.center[1] * half_h;

            // Three concentric rings, outer to inner, one per gradient color
            for (i, color) in ripple.colors.iter().enumerate() {
                let r = radius * (1.0 - i as f32 * 0.14);
                let points = (0..=RING_SEGMENTS).map(|s| {
                    let angle = s as f32 / RING_SEGMENTS as f32 * TAU;
                    pt2(cx + angle.cos() * r, cy + angle.sin() * r)
                });
                draw.polyline()
                    .weight(1.0 + ripple.energy * 4.0 * (1.0 - i as f32 * 0.3))
                    .points(points)
                    .color(paint(*color, alpha * (1.0 - i as f32 * 0.25)));
            }
        }

        if self.flash > 0.01 {
            draw.rect()
                .xy(bounds.xy())
                .wh(bounds.wh())
                .color(paint(self.palette.get(self.palette.len() - 1), self.flash * 0.35));
        }
    }

    fn destroy(&mut self) {
        self.pool.clear();
        self.tracker.reset();
        self.flash = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::context;
    use super::*;
    use pulse_viz_core::SpectrumSnapshot;

    fn kick_frame(level: u8) -> SpectrumSnapshot {
        let mut bins = vec![0u8; 128];
        bins[..4].iter_mut().for_each(|b| *b = level);
        SpectrumSnapshot::from_bins(bins)
    }

    #[test]
    fn test_beats_spawn_ripples() {
        let mut scene = RippleField::new(context());
        for i in 0..30 {
            scene.tick(&FrameInput {
                spectrum: &kick_frame(0),
                now_ms: i as f64 * 16.0,
                dt: 1.0 / 60.0,
            });
        }
        assert_eq!(scene.pool.live_count(), 0);

        scene.tick(&FrameInput {
            spectrum: &kick_frame(240),
            now_ms: 30.0 * 16.0,
            dt: 1.0 / 60.0,
        });
        assert!(scene.pool.live_count() >= 1);
    }

    #[test]
    fn test_ripples_expire_and_destroy_clears() {
        let mut scene = RippleField::new(context());
        scene.pool.spawn([0.0, 0.0], 1.0, 0.0);
        scene.tick(&FrameInput {
            spectrum: &kick_frame(0),
            now_ms: 100_000.0,
            dt: 1.0 / 60.0,
        });
        assert_eq!(scene.pool.live_count(), 0);

        scene.pool.spawn([0.0, 0.0], 1.0, 100_000.0);
        scene.destroy();
        assert_eq!(scene.pool.live_count(), 0);
    }
}
