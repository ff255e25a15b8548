//! Noise-displaced wire sphere.
//!
//! A latitude/longitude sphere whose vertices are pushed outward by fractal
//! Brownian motion. Bass drives displacement depth, mids spin it, treble
//! tightens the noise frequency and bass onsets flash the wireframe.

use super::{paint, FrameInput, SceneContext, Visualization};
use nannou::prelude::*;
use noise::{Fbm, MultiFractal, NoiseFn, Perlin};
use pulse_viz_core::{BandKind, BeatTracker, Envelope, Palette, SmoothedEnergy};

/// Latitude rings
const RINGS: usize = if cfg!(debug_assertions) { 14 } else { 24 };
/// Longitude segments
const SEGMENTS: usize = if cfg!(debug_assertions) { 24 } else { 40 };
/// Displacement curve, bass^exponent keeps quiet passages calm
const DISPLACEMENT_EXPONENT: f32 = 1.6;
const MAX_DISPLACEMENT: f32 = 0.45;
/// Camera distance for the perspective divide
const CAMERA_Z: f32 = 3.2;

pub struct NoiseMesh {
    palette: Palette,
    tracker: BeatTracker,
    noise: Fbm<Perlin>,
    /// Rotated, displaced vertices (unit-sphere space), `RINGS + 1` rows
    vertices: Vec<Vec3>,
    /// Displacement per vertex (0-1), for coloring
    heights: Vec<f32>,
    rotation: f32,
    time: f32,
    bass: Envelope,
    mid: SmoothedEnergy,
    treble: SmoothedEnergy,
    flash: f32,
}

impl NoiseMesh {
    pub fn new(context: SceneContext) -> Self {
        let noise = Fbm::<Perlin>::new(rand::random::<u32>()).set_octaves(4);
        let mut mesh = Self {
            palette: context.palette,
            tracker: BeatTracker::new(context.tracker),
            noise,
            vertices: Vec::with_capacity((RINGS + 1) * SEGMENTS),
            heights: Vec::with_capacity((RINGS + 1) * SEGMENTS),
            rotation: 0.0,
            time: 0.0,
            bass: Envelope::new(0.6, 0.1),
            mid: SmoothedEnergy::new(0.1),
            treble: SmoothedEnergy::new(0.15),
            flash: 0.0,
        };
        mesh.rebuild();
        mesh
    }

    fn rebuild(&mut self) {
        self.vertices.clear();
        self.heights.clear();

        let displacement = self.bass.value().clamp(0.0, 1.0).powf(DISPLACEMENT_EXPONENT) * MAX_DISPLACEMENT;
        let frequency = 1.2 + self.treble.value() * 2.5;
        let (sin_r, cos_r) = self.rotation.sin_cos();
        let tilt = 0.35f32;
        let (sin_t, cos_t) = tilt.sin_cos();

        for ring in 0..=RINGS {
            let phi = ring as f32 / RINGS as f32 * PI;
            for seg in 0..SEGMENTS {
                let theta = seg as f32 / SEGMENTS as f32 * TAU;
                let dir = vec3(phi.sin() * theta.cos(), phi.cos(), phi.sin() * theta.sin());

                let n = self.noise.get([
                    (dir.x * frequency) as f64,
                    (dir.y * frequency) as f64,
                    (dir.z * frequency) as f64,
                    self.time as f64,
                ]) as f32;
                let height = (n * 0.5 + 0.5).clamp(0.0, 1.0);
                let p = dir * (1.0 + height * displacement);

                // Spin around Y, then tilt toward the camera
                let x = p.x * cos_r - p.z * sin_r;
                let z = p.x * sin_r + p.z * cos_r;
                let y = p.y * cos_t - z * sin_t;
                let z = p.y * sin_t + z * cos_t;

                self.vertices.push(vec3(x, y, z));
                self.heights.push(height);
            }
        }
    }

    fn project(&self, v: Vec3, scale: f32, center: Vec2) -> Vec2 {
        let depth = (CAMERA_Z - v.z).max(0.1);
        center + vec2(v.x, v.y) * (scale * CAMERA_Z / depth)
    }
}

impl Visualization for NoiseMesh {
    fn tick(&mut self, input: &FrameInput) {
        let frame = self.tracker.process(input.spectrum, input.now_ms);
        let frames = (input.dt * 60.0).clamp(0.0, 4.0);

        self.bass.update(frame.bands.bass);
        self.mid.update(frame.bands.mid);
        self.treble.update(frame.bands.treble);

        self.rotation = (self.rotation + (0.004 + self.mid.value() * 0.03) * frames) % TAU;
        self.time += input.dt * (0.3 + self.treble.value());

        self.flash *= 0.85;
        if let Some(beat) = frame.beat(BandKind::Bass) {
            self.flash = self.flash.max(beat.intensity);
        }

        self.rebuild();
    }

    fn draw(&self, draw: &Draw, bounds: Rect) {
        let background = self.palette.get(0).scaled(0.06);
        draw.background().color(paint(background, 1.0));

        if self.vertices.len() < (RINGS + 1) * SEGMENTS {
            return;
        }
        let scale = bounds.w().min(bounds.h()) * 0.28;
        let center = bounds.xy();
        let flash = self.flash.clamp(0.0, 1.0);
        let weight = 1.0 + flash * 1.5;
        let flash_color = self.palette.get(self.palette.len() - 1);

        let color_for = |ring: usize, seg: usize| {
            let i = ring * SEGMENTS + seg;
            let depth = (self.vertices[i].z + 1.5) / 3.0;
            let base = self.palette.lerp(self.heights[i]).lerp(&flash_color, flash * 0.7);
            paint(base, 0.25 + depth.clamp(0.0, 1.0) * 0.6)
        };

        // Latitude rings
        for ring in 1..RINGS {
            let points = (0..=SEGMENTS).map(|seg| {
                let s = seg % SEGMENTS;
                let v = self.vertices[ring * SEGMENTS + s];
                (self.project(v, scale, center), color_for(ring, s))
            });
            draw.polyline().weight(weight).points_colored(points);
        }

        // Longitude meridians
        for seg in 0..SEGMENTS {
            let points = (0..=RINGS).map(|ring| {
                let v = self.vertices[ring * SEGMENTS + seg];
                (self.project(v, scale, center), color_for(ring, seg))
            });
            draw.polyline().weight(weight * 0.8).points_colored(points);
        }
    }

    fn destroy(&mut self) {
        self.vertices.clear();
        self.heights.clear();
        self.tracker.reset();
    }
}
