//! Track metadata, palettes and the track-to-scene mapping.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::TrackError;

/// Linear 0-1 RGB color
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Color {
    pub const fn new(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }

    /// Parse `#rrggbb` (the leading `#` is optional)
    pub fn from_hex(hex: &str) -> Result<Self, TrackError> {
        let digits = hex.trim().trim_start_matches('#');
        if digits.len() != 6 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(TrackError::InvalidColor(hex.to_string()));
        }
        let channel = |i: usize| {
            u8::from_str_radix(&digits[i..i + 2], 16)
                .map(|v| v as f32 / 255.0)
                .map_err(|_| TrackError::InvalidColor(hex.to_string()))
        };
        Ok(Self::new(channel(0)?, channel(2)?, channel(4)?))
    }

    pub fn to_hex(&self) -> String {
        let byte = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
        format!("#{:02x}{:02x}{:02x}", byte(self.r), byte(self.g), byte(self.b))
    }

    pub fn lerp(&self, other: &Color, t: f32) -> Color {
        let t = t.clamp(0.0, 1.0);
        Color::new(
            self.r + (other.r - self.r) * t,
            self.g + (other.g - self.g) * t,
            self.b + (other.b - self.b) * t,
        )
    }

    /// Same color scaled toward black
    pub fn scaled(&self, factor: f32) -> Color {
        Color::new(self.r * factor, self.g * factor, self.b * factor)
    }
}

/// Ordered track palette, always at least three colors.
#[derive(Clone, Debug, PartialEq)]
pub struct Palette {
    colors: Vec<Color>,
}

impl Palette {
    pub const MIN_COLORS: usize = 3;

    pub fn new(colors: Vec<Color>) -> Result<Self, TrackError> {
        if colors.len() < Self::MIN_COLORS {
            return Err(TrackError::PaletteTooSmall(colors.len()));
        }
        Ok(Self { colors })
    }

    pub fn from_hex<S: AsRef<str>>(hexes: &[S]) -> Result<Self, TrackError> {
        let colors = hexes
            .iter()
            .map(|h| Color::from_hex(h.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(colors)
    }

    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    /// Color at `index`, wrapping around the palette
    pub fn get(&self, index: usize) -> Color {
        self.colors[index % self.colors.len()]
    }

    pub fn colors(&self) -> &[Color] {
        &self.colors
    }

    /// Uniform random pick, with replacement
    pub fn pick<R: Rng + ?Sized>(&self, rng: &mut R) -> Color {
        self.colors[rng.random_range(0..self.colors.len())]
    }

    /// Continuous gradient through the palette, `t` in 0-1
    pub fn lerp(&self, t: f32) -> Color {
        let t = if t.is_finite() { t.clamp(0.0, 1.0) } else { 0.0 };
        let scaled = t * (self.colors.len() - 1) as f32;
        let i = (scaled.floor() as usize).min(self.colors.len() - 2);
        self.colors[i].lerp(&self.colors[i + 1], scaled - i as f32)
    }
}

/// Procedural renderer family a track plays with
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SceneKind {
    NoiseMesh,
    EmberSmoke,
    FlowField,
    RippleField,
    Ambient,
}

impl SceneKind {
    pub const ALL: [SceneKind; 5] = [
        SceneKind::NoiseMesh,
        SceneKind::EmberSmoke,
        SceneKind::FlowField,
        SceneKind::RippleField,
        SceneKind::Ambient,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            SceneKind::NoiseMesh => "noise-mesh",
            SceneKind::EmberSmoke => "ember-smoke",
            SceneKind::FlowField => "flow-field",
            SceneKind::RippleField => "ripple-field",
            SceneKind::Ambient => "ambient",
        }
    }
}

impl fmt::Display for SceneKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SceneKind {
    type Err = TrackError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SceneKind::ALL
            .into_iter()
            .find(|kind| kind.name() == s.trim())
            .ok_or_else(|| TrackError::UnknownScene(s.to_string()))
    }
}

/// One playable item
#[derive(Clone, Debug, PartialEq)]
pub struct Track {
    pub id: String,
    pub title: String,
    /// Audio asset reference (path or device name), display-only here
    pub audio: String,
    pub palette: Palette,
    pub mood: String,
}

/// Track id to scene variant. Unknown ids resolve to [`SceneKind::Ambient`].
#[derive(Clone, Debug, Default)]
pub struct SceneTable {
    scenes: HashMap<String, SceneKind>,
}

impl SceneTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, track_id: impl Into<String>, kind: SceneKind) {
        self.scenes.insert(track_id.into(), kind);
    }

    pub fn resolve(&self, track_id: &str) -> SceneKind {
        self.scenes
            .get(track_id)
            .copied()
            .unwrap_or(SceneKind::Ambient)
    }

    pub fn len(&self) -> usize {
        self.scenes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scenes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    fn palette() -> Palette {
        Palette::from_hex(&["#ff0000", "#00ff00", "#0000ff"]).unwrap()
    }

    #[test]
    fn test_parse_hex() {
        let c = Color::from_hex("#ff8000").unwrap();
        assert_eq!(c.r, 1.0);
        assert!((c.g - 128.0 / 255.0).abs() < 1e-6);
        assert_eq!(c.b, 0.0);
        assert_eq!(c.to_hex(), "#ff8000");
        assert!(Color::from_hex("00ff00").is_ok());
    }

    #[test]
    fn test_rejects_bad_hex() {
        assert!(matches!(
            Color::from_hex("#ff00"),
            Err(TrackError::InvalidColor(_))
        ));
        assert!(Color::from_hex("#gg0000").is_err());
        assert!(Color::from_hex("#ff00é").is_err());
    }

    #[test]
    fn test_rejects_signed_channels() {
        assert!(matches!(
            Color::from_hex("#+f+f+f"),
            Err(TrackError::InvalidColor(_))
        ));
        assert!(Palette::from_hex(&["#000000", "#+fffff", "#ff0000"]).is_err());
    }

    #[test]
    fn test_palette_needs_three_colors() {
        assert_eq!(
            Palette::from_hex(&["#000000", "#ffffff"]),
            Err(TrackError::PaletteTooSmall(2))
        );
        assert_eq!(palette().len(), 3);
    }

    #[test]
    fn test_palette_get_wraps() {
        let p = palette();
        assert_eq!(p.get(3), p.get(0));
        assert_eq!(p.get(5), p.get(2));
    }

    #[test]
    fn test_palette_lerp_endpoints() {
        let p = palette();
        assert_eq!(p.lerp(0.0), p.get(0));
        assert_eq!(p.lerp(1.0), p.get(2));
        let mid = p.lerp(0.5);
        assert!((mid.g - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_pick_draws_from_palette() {
        let p = palette();
        let mut rng = SmallRng::seed_from_u64(7);
        let mut seen = [false; 3];
        for _ in 0..100 {
            let c = p.pick(&mut rng);
            let i = p.colors().iter().position(|x| *x == c).unwrap();
            seen[i] = true;
        }
        assert!(seen.iter().all(|s| *s));
    }

    #[test]
    fn test_scene_kind_round_trip_names() {
        for kind in SceneKind::ALL {
            assert_eq!(kind.to_string().parse::<SceneKind>().unwrap(), kind);
        }
        assert!("kaleido".parse::<SceneKind>().is_err());
    }

    #[test]
    fn test_scene_table_falls_back_to_ambient() {
        let mut table = SceneTable::new();
        table.insert("tidal", SceneKind::RippleField);
        assert_eq!(table.resolve("tidal"), SceneKind::RippleField);
        assert_eq!(table.resolve("missing"), SceneKind::Ambient);
    }
}
