//! Ambient particle drift.
//!
//! The fallback scene: a toroidal particle field whose population follows
//! overall energy. Mids push the particles along, treble shakes them.

use super::{paint, FrameInput, SceneContext, Viewport, Visualization};
use nannou::prelude::*;
use pulse_viz_core::{BeatTracker, Envelope, FieldDrive, Palette, ParticleConfig, ParticleField, SmoothedEnergy};

/// Particles on screen in silence
const BASE_COUNT: usize = if cfg!(debug_assertions) { 60 } else { 120 };
/// Extra particles at full energy
const ENERGY_COUNT: usize = if cfg!(debug_assertions) { 180 } else { 480 };

pub struct Ambient {
    palette: Palette,
    tracker: BeatTracker,
    field: ParticleField,
    viewport: Viewport,
    energy: SmoothedEnergy,
    mid: SmoothedEnergy,
    treble: SmoothedEnergy,
    /// Brightness kick on bass beats
    glow: Envelope,
}

impl Ambient {
    pub fn new(context: SceneContext) -> Self {
        Self {
            palette: context.palette,
            tracker: BeatTracker::new(context.tracker),
            field: ParticleField::new(ParticleConfig::default()),
            viewport: Viewport::default(),
            energy: SmoothedEnergy::new(0.05),
            mid: SmoothedEnergy::new(0.15),
            treble: SmoothedEnergy::new(0.25),
            glow: Envelope::new(0.8, 0.08),
        }
    }

    fn target_count(&self) -> usize {
        BASE_COUNT + (self.energy.value().clamp(0.0, 1.0) * ENERGY_COUNT as f32) as usize
    }
}

impl Visualization for Ambient {
    fn init(&mut self, surface: &super::SceneSurface) -> Result<(), super::SceneError> {
        self.viewport = surface.viewport;
        self.field
            .ensure_count(BASE_COUNT, self.viewport.width, self.viewport.height);
        Ok(())
    }

    fn tick(&mut self, input: &FrameInput) {
        let frame = self.tracker.process(input.spectrum, input.now_ms);
        let bands = frame.bands;

        self.energy.update(bands.mean());
        self.mid.update(bands.mid);
        self.treble.update(bands.treble);
        let kick = frame
            .beat(pulse_viz_core::BandKind::Bass)
            .map_or(0.0, |b| b.intensity);
        self.glow.update(kick);

        let target = self.target_count();
        self.field
            .ensure_count(target, self.viewport.width, self.viewport.height);
        self.field.tick(
            input.dt,
            FieldDrive {
                mid: self.mid.value(),
                treble: self.treble.value(),
            },
        );
    }

    fn draw(&self, draw: &Draw, bounds: Rect) {
        let background = self.palette.get(0).scaled(0.12);
        draw.background().color(paint(background, 1.0));

        let (width, height) = self.field.bounds();
        if width <= 0.0 || height <= 0.0 {
            return;
        }
        let sx = bounds.w() / width;
        let sy = bounds.h() / height;
        let glow = self.glow.value();

        for p in self.field.particles() {
            let x = bounds.left() + p.x * sx;
            let y = bounds.bottom() + p.y * sy;
            let color = self.palette.lerp(p.x / width);
            let alpha = 0.35 + 0.4 * (p.size / 3.5) + glow * 0.25;
            draw.ellipse()
                .x_y(x, y)
                .radius(p.size * (1.0 + glow * 0.8))
                .color(paint(color, alpha));
        }
    }

    fn resize(&mut self, viewport: Viewport) {
        self.viewport = viewport;
        self.field.set_bounds(viewport.width, viewport.height);
    }

    fn destroy(&mut self) {
        self.field.clear();
        self.tracker.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::{context, cpu_surface};
    use super::*;
    use pulse_viz_core::SpectrumSnapshot;

    fn tick(scene: &mut Ambient, level: u8, now_ms: f64) {
        let spectrum = SpectrumSnapshot::from_bins(vec![level; 128]);
        scene.tick(&FrameInput {
            spectrum: &spectrum,
            now_ms,
            dt: 1.0 / 60.0,
        });
    }

    #[test]
    fn test_population_follows_energy() {
        let mut scene = Ambient::new(context());
        scene.init(&cpu_surface()).unwrap();
        assert_eq!(scene.field.len(), BASE_COUNT);

        for i in 0..200 {
            tick(&mut scene, 230, i as f64 * 16.0);
        }
        let loud = scene.field.len();
        assert!(loud > BASE_COUNT);

        for i in 200..600 {
            tick(&mut scene, 0, i as f64 * 16.0);
        }
        assert!(scene.field.len() < loud);
    }

    #[test]
    fn test_resize_keeps_particles() {
        let mut scene = Ambient::new(context());
        scene.init(&cpu_surface()).unwrap();
        let before = scene.field.len();
        scene.resize(Viewport {
            width: 100.0,
            height: 100.0,
            pixel_density: 1.0,
        });
        assert_eq!(scene.field.len(), before);
        assert_eq!(scene.field.bounds(), (100.0, 100.0));
    }

    #[test]
    fn test_destroy_empties_field() {
        let mut scene = Ambient::new(context());
        scene.init(&cpu_surface()).unwrap();
        scene.destroy();
        assert!(scene.field.is_empty());
    }
}
