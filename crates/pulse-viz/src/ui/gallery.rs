//! Track gallery.
//!
//! One column of spectrum bars per track, drawn in grey. A spring-driven lens
//! follows the pointer and shows the hovered track's palette inside its
//! circle. Clicking a hovered column opens that track's scene.

use crate::renderer::paint;
use nannou::prelude::*;
use pulse_viz_core::{hit_test, LensPhysics, Palette, Region, SpectrumSnapshot, Track};

/// Bars per column
const BAR_COUNT: usize = 24;
/// Gap between columns (pixels)
const GUTTER: f32 = 16.0;
/// Space kept under the columns for titles
const TITLE_HEIGHT: f32 = 48.0;
/// Vertical step when splitting bars into lens-testable segments
const SEGMENT_HEIGHT: f32 = 6.0;
/// Per-tick fall of a bar when the signal drops
const BAR_DECAY: f32 = 0.92;
const GREY: f32 = 0.35;

struct Column {
    title: String,
    palette: Palette,
}

pub struct Gallery {
    columns: Vec<Column>,
    regions: Vec<Region>,
    lens: LensPhysics,
    /// Bar levels (0-1) shared by every column
    bars: [f32; BAR_COUNT],
}

impl Gallery {
    pub fn new(tracks: &[Track], bounds: Rect) -> Self {
        let columns = tracks
            .iter()
            .map(|t| Column {
                title: t.title.clone(),
                palette: t.palette.clone(),
            })
            .collect();
        let mut gallery = Self {
            columns,
            regions: Vec::new(),
            lens: LensPhysics::default(),
            bars: [0.0; BAR_COUNT],
        };
        gallery.layout(bounds);
        gallery
    }

    /// Recompute the column rectangles for a window rect
    pub fn layout(&mut self, bounds: Rect) {
        let n = self.columns.len();
        self.regions.clear();
        if n == 0 {
            return;
        }
        let width = ((bounds.w() - GUTTER * (n as f32 + 1.0)) / n as f32).max(1.0);
        let height = (bounds.h() - TITLE_HEIGHT - GUTTER * 2.0).max(1.0);
        let bottom = bounds.bottom() + TITLE_HEIGHT + GUTTER;
        for i in 0..n {
            let left = bounds.left() + GUTTER + i as f32 * (width + GUTTER);
            self.regions.push(Region::new(left, bottom, width, height));
        }
    }

    pub fn pointer_move(&mut self, x: f32, y: f32) {
        let hover = hit_test(&self.regions, x, y);
        self.lens.pointer_move(x, y, hover);
    }

    pub fn pointer_leave(&mut self) {
        self.lens.pointer_leave();
    }

    /// Column index to open, if the pointer is over one
    pub fn click(&self) -> Option<usize> {
        self.lens.click_target()
    }

    /// Take the hovered column to open. The hover is cleared so it does not
    /// carry over when the gallery is shown again.
    pub fn open(&mut self) -> Option<usize> {
        let index = self.lens.click_target()?;
        self.lens.pointer_leave();
        Some(index)
    }

    pub fn tick(&mut self, spectrum: &SpectrumSnapshot) {
        self.lens.tick();
        for bar in self.bars.iter_mut() {
            *bar *= BAR_DECAY;
        }
        if spectrum.is_empty() {
            return;
        }

        // The top quarter of the spectrum is mostly empty
        let bins = spectrum.as_slice();
        let usable = (bins.len() * 3 / 4).max(1);
        for (i, bar) in self.bars.iter_mut().enumerate() {
            let start = usable * i / BAR_COUNT;
            let end = (usable * (i + 1) / BAR_COUNT).max(start + 1).min(bins.len());
            if start >= end {
                continue;
            }
            let sum: u32 = bins[start..end].iter().map(|&b| b as u32).sum();
            let level = sum as f32 / ((end - start) as f32 * 255.0);
            *bar = bar.max(level);
        }
    }

    pub fn draw(&self, draw: &Draw) {
        draw.background().color(BLACK);

        for (column, region) in self.columns.iter().zip(&self.regions) {
            let bar_w = region.width / BAR_COUNT as f32;
            for (j, level) in self.bars.iter().enumerate() {
                let h = (level * region.height).max(2.0);
                let x = region.x + bar_w * (j as f32 + 0.5);
                let color = column.palette.lerp(j as f32 / (BAR_COUNT - 1) as f32);

                let mut y = region.y;
                while y < region.y + h {
                    let seg = SEGMENT_HEIGHT.min(region.y + h - y);
                    let cy = y + seg / 2.0;
                    let fill = if self.lens.reveals(x, cy) {
                        paint(color, 0.4 + 0.6 * self.lens.opacity())
                    } else {
                        srgba(GREY, GREY, GREY, 1.0)
                    };
                    draw.rect()
                        .x_y(x, cy)
                        .w_h(bar_w * 0.8, seg - 1.0)
                        .color(fill);
                    y += SEGMENT_HEIGHT;
                }
            }

            draw.text(&column.title)
                .x_y(region.x + region.width / 2.0, region.y - TITLE_HEIGHT / 2.0)
                .w(region.width)
                .color(srgba(0.8, 0.8, 0.8, 1.0))
                .font_size(16);
        }

        let opacity = self.lens.opacity();
        if opacity > 0.01 {
            let (x, y) = self.lens.position();
            draw.ellipse()
                .x_y(x, y)
                .radius(self.lens.radius())
                .no_fill()
                .stroke_weight(2.0)
                .stroke(srgba(1.0, 1.0, 1.0, opacity * 0.6));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracks() -> Vec<Track> {
        ["one", "two", "three"]
            .iter()
            .map(|id| Track {
                id: id.to_string(),
                title: id.to_uppercase(),
                audio: String::new(),
                palette: Palette::from_hex(&["#000000", "#808080", "#ffffff"]).unwrap(),
                mood: String::new(),
            })
            .collect()
    }

    fn bounds() -> Rect {
        Rect::from_w_h(800.0, 600.0)
    }

    #[test]
    fn test_layout_one_region_per_track() {
        let gallery = Gallery::new(&tracks(), bounds());
        assert_eq!(gallery.regions.len(), 3);
        for pair in gallery.regions.windows(2) {
            assert!(pair[0].x + pair[0].width < pair[1].x);
        }
    }

    #[test]
    fn test_hover_then_click_opens_column() {
        let mut gallery = Gallery::new(&tracks(), bounds());
        let r = gallery.regions[1];
        gallery.pointer_move(r.x + r.width / 2.0, r.y + r.height / 2.0);
        assert_eq!(gallery.click(), Some(1));

        gallery.pointer_leave();
        assert_eq!(gallery.click(), None);
    }

    #[test]
    fn test_open_clears_hover() {
        let mut gallery = Gallery::new(&tracks(), bounds());
        let r = gallery.regions[2];
        gallery.pointer_move(r.x + r.width / 2.0, r.y + r.height / 2.0);
        assert_eq!(gallery.open(), Some(2));

        // Back in the gallery with no pointer movement yet
        gallery.tick(&SpectrumSnapshot::default());
        assert_eq!(gallery.click(), None);
        assert_eq!(gallery.open(), None);
    }

    #[test]
    fn test_gutter_is_not_clickable() {
        let mut gallery = Gallery::new(&tracks(), bounds());
        let r = gallery.regions[0];
        gallery.pointer_move(r.x + r.width + GUTTER / 2.0, r.y + 10.0);
        assert_eq!(gallery.click(), None);
    }

    #[test]
    fn test_bars_rise_and_fall() {
        let mut gallery = Gallery::new(&tracks(), bounds());
        gallery.tick(&SpectrumSnapshot::from_bins(vec![255; 128]));
        assert!(gallery.bars.iter().all(|&b| b > 0.99));

        for _ in 0..60 {
            gallery.tick(&SpectrumSnapshot::default());
        }
        assert!(gallery.bars.iter().all(|&b| b < 0.01));
    }

    #[test]
    fn test_empty_gallery() {
        let mut gallery = Gallery::new(&[], bounds());
        gallery.pointer_move(0.0, 0.0);
        assert_eq!(gallery.click(), None);
    }
}
