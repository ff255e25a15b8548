//! Debug overlay.
//!
//! Shows the analysis feeding the scenes in a green terminal style with
//! scanlines and a slight RGB fringe. Values are cached every few frames so
//! the readout stays legible.

use nannou::prelude::*;
use pulse_viz_core::{BandKind, BeatFrame};

/// Font size for the readout
const FONT_SIZE: u32 = 18;
const LINE_HEIGHT: f32 = 24.0;
const MARGIN: f32 = 24.0;
/// Pixel offset for RGB fringing
const RGB_OFFSET: f32 = 1.5;
/// Pixels between scanlines
const SCANLINE_SPACING: f32 = 3.0;
/// Update numbers every N frames (reduces flicker)
const UPDATE_INTERVAL: u32 = 3;

#[derive(Clone, Debug, Default, PartialEq)]
struct Readout {
    fps: f32,
    bass: f32,
    mid: f32,
    treble: f32,
    flux: f32,
    bpm: f32,
    confidence: f32,
    beats: [bool; 3],
    intense: bool,
}

pub struct DebugViz {
    frame_count: u32,
    /// Smoothed FPS
    fps: f32,
    readout: Readout,
    /// Beat markers latch until the next refresh so single-frame onsets show
    latched: [bool; 3],
    latched_intense: bool,
    device: String,
    scene: String,
}

impl DebugViz {
    pub fn new(device: impl Into<String>) -> Self {
        Self {
            frame_count: 0,
            fps: 0.0,
            readout: Readout::default(),
            latched: [false; 3],
            latched_intense: false,
            device: device.into(),
            scene: "gallery".to_string(),
        }
    }

    pub fn set_scene(&mut self, scene: impl Into<String>) {
        self.scene = scene.into();
    }

    pub fn update(&mut self, frame: &BeatFrame, dt: f32) {
        if dt > 0.0 {
            self.fps = self.fps * 0.9 + (1.0 / dt) * 0.1;
        }
        for (i, band) in [BandKind::Bass, BandKind::Mid, BandKind::High].iter().enumerate() {
            self.latched[i] |= frame.beat(*band).is_some();
        }
        self.latched_intense |= frame.intense.is_some();

        self.frame_count = self.frame_count.wrapping_add(1);
        if self.frame_count % UPDATE_INTERVAL != 0 {
            return;
        }
        self.readout = Readout {
            fps: self.fps,
            bass: frame.bands.bass,
            mid: frame.bands.mid,
            treble: frame.bands.treble,
            flux: frame.flux,
            bpm: frame.bpm,
            confidence: frame.confidence,
            beats: self.latched,
            intense: self.latched_intense,
        };
        self.latched = [false; 3];
        self.latched_intense = false;
    }

    fn lines(&self) -> Vec<String> {
        let r = &self.readout;
        let mark = |on: bool| if on { "*" } else { "." };
        vec![
            format!("FPS    {:>6.1}", r.fps),
            format!("Bass   {:>6.3} {}", r.bass, mark(r.beats[0])),
            format!("Mid    {:>6.3} {}", r.mid, mark(r.beats[1])),
            format!("Treble {:>6.3} {}", r.treble, mark(r.beats[2])),
            format!("Flux   {:>6.3} {}", r.flux, mark(r.intense)),
            format!("BPM    {:>6.1} ({:.0}%)", r.bpm, r.confidence * 100.0),
            format!("Device {}", self.device),
            format!("Scene  {}", self.scene),
        ]
    }

    pub fn draw(&self, draw: &Draw, bounds: Rect) {
        let lines = self.lines();
        let width = 320.0;
        let height = lines.len() as f32 * LINE_HEIGHT + MARGIN;
        let left = bounds.left() + MARGIN;
        let top = bounds.top() - MARGIN;

        draw.rect()
            .x_y(left + width / 2.0 - MARGIN / 2.0, top - height / 2.0 + MARGIN / 2.0)
            .w_h(width, height)
            .color(srgba(0u8, 12, 0, 190));

        let mut y = top - height + MARGIN / 2.0;
        while y < top + MARGIN / 2.0 {
            draw.line()
                .start(pt2(left - MARGIN / 2.0, y))
                .end(pt2(left - MARGIN / 2.0 + width, y))
                .weight(1.0)
                .color(srgba(0u8, 0, 0, 40));
            y += SCANLINE_SPACING;
        }

        for (i, line) in lines.iter().enumerate() {
            let y = top - i as f32 * LINE_HEIGHT - LINE_HEIGHT / 2.0;
            let x = left + width / 2.0 - MARGIN / 2.0;
            draw.text(line)
                .x_y(x - RGB_OFFSET, y)
                .w(width - MARGIN)
                .left_justify()
                .color(srgba(255u8, 60, 60, 70))
                .font_size(FONT_SIZE);
            draw.text(line)
                .x_y(x + RGB_OFFSET, y)
                .w(width - MARGIN)
                .left_justify()
                .color(srgba(60u8, 60, 255, 70))
                .font_size(FONT_SIZE);
            draw.text(line)
                .x_y(x, y)
                .w(width - MARGIN)
                .left_justify()
                .color(srgba(80u8, 255, 120, 230))
                .font_size(FONT_SIZE);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pulse_viz_core::{BandEnergies, BeatEvent, OnsetTrigger};

    fn frame(beat: bool) -> BeatFrame {
        BeatFrame {
            bands: BandEnergies {
                bass: 0.5,
                mid: 0.25,
                treble: 0.125,
            },
            beats: if beat {
                vec![BeatEvent {
                    band: BandKind::Bass,
                    intensity: 0.8,
                    timestamp_ms: 0.0,
                    trigger: OnsetTrigger::AboveAverage,
                }]
            } else {
                Vec::new()
            },
            intense: None,
            flux: 0.0,
            bpm: 128.0,
            confidence: 0.5,
            envelopes: BandEnergies::default(),
        }
    }

    #[test]
    fn test_readout_refreshes_on_interval() {
        let mut viz = DebugViz::new("Test Device");
        viz.update(&frame(false), 1.0 / 60.0);
        assert_eq!(viz.readout.bpm, 0.0);
        viz.update(&frame(false), 1.0 / 60.0);
        viz.update(&frame(false), 1.0 / 60.0);
        assert_eq!(viz.readout.bpm, 128.0);
        assert!(viz.lines()[6].contains("Test Device"));
    }

    #[test]
    fn test_single_frame_beat_is_latched() {
        let mut viz = DebugViz::new("dev");
        viz.update(&frame(true), 1.0 / 60.0);
        viz.update(&frame(false), 1.0 / 60.0);
        viz.update(&frame(false), 1.0 / 60.0);
        assert!(viz.readout.beats[0]);
        assert!(viz.lines()[1].ends_with('*'));

        for _ in 0..3 {
            viz.update(&frame(false), 1.0 / 60.0);
        }
        assert!(!viz.readout.beats[0]);
    }
}
