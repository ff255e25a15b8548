//! Configuration file management.
//!
//! Handles loading and saving user preferences to `~/.pulse-viz.toml`.

use pulse_viz_core::spectrum::{DEFAULT_FFT_SIZE, DEFAULT_SMOOTHING};
use pulse_viz_core::{
    BandLayout, OnsetConfig, Palette, SceneKind, SceneTable, Track, TrackerConfig,
};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

const DEFAULT_DEVICE_TIMEOUT_SECS: u64 = 3;

const CONFIG_TEMPLATE: &str = r##"# pulse-viz configuration file

# Timeout in seconds when opening an audio device (default: 3)
# device_timeout_secs = 3

# Input device to capture (auto-saved, default input when unset)
# device = "pipewire"

# =============================================================================
# Spectrum
# =============================================================================

# Transform size, power of two between 32 and 32768 (default: 2048)
# fft_size = 2048

# Temporal smoothing between spectrum frames, 0-1 (default: 0.8)
# smoothing = 0.8

# =============================================================================
# Onset Thresholds (applied to every band and scene)
# =============================================================================

# onset_floor = 0.3             # Absolute band energy needed to fire
# onset_average_delta = 0.04    # Required excess over the moving average
# onset_jump_ratio = 1.15       # Required rise over the previous frame
# onset_min_cooldown_ms = 120   # Shortest spacing between beats
# intense_k = 4.5               # Std deviations for intense beats
# intense_refractory_ms = 400   # Spacing between intense beats

# =============================================================================
# Tracks
# =============================================================================
# Each track picks a scene: noise-mesh, ember-smoke, flow-field,
# ripple-field or ambient. Palettes need at least three colors.

# [[tracks]]
# id = "tidal"
# title = "Tidal"
# palette = ["#0b3954", "#087e8b", "#bfd7ea", "#ff5a5f"]
# mood = "cold, rolling"
# scene = "ripple-field"
"##;

/// One `[[tracks]]` entry
#[derive(Deserialize, Clone, Debug, PartialEq)]
pub struct TrackEntry {
    pub id: String,
    pub title: Option<String>,
    pub audio: Option<String>,
    pub palette: Vec<String>,
    pub mood: Option<String>,
    pub scene: Option<SceneKind>,
}

#[derive(Deserialize, Default, Debug)]
pub struct Config {
    pub device: Option<String>,
    pub device_timeout_secs: Option<u64>,

    pub fft_size: Option<usize>,
    pub smoothing: Option<f32>,

    // Onset overrides (flattened for simpler TOML)
    pub onset_floor: Option<f32>,
    pub onset_average_delta: Option<f32>,
    pub onset_jump_ratio: Option<f32>,
    pub onset_min_cooldown_ms: Option<f64>,
    pub intense_k: Option<f32>,
    pub intense_refractory_ms: Option<f64>,

    pub tracks: Option<Vec<TrackEntry>>,
}

impl Config {
    fn path() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(".pulse-viz.toml"))
    }

    pub fn load() -> Self {
        match Self::path() {
            Some(path) => Self::load_or_create(&path),
            None => Self::default(),
        }
    }

    fn load_or_create(path: &Path) -> Self {
        // Create template file if it doesn't exist
        if !path.exists() {
            match fs::write(path, CONFIG_TEMPLATE) {
                Ok(()) => info!("Created config template at {:?}", path),
                Err(e) => warn!("Could not write config template {:?}: {}", path, e),
            }
        }

        Self::load_from(path)
    }

    fn load_from(path: &Path) -> Self {
        let Ok(content) = fs::read_to_string(path) else {
            return Self::default();
        };
        Self::parse(&content).unwrap_or_else(|e| {
            warn!("Ignoring invalid config {:?}: {}", path, e);
            Self::default()
        })
    }

    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Remember the capture device. Only the `device` line of the file is
    /// touched, comments and tracks stay as the user wrote them.
    pub fn set_device(&mut self, name: &str) {
        self.device = Some(name.to_string());
        if let Some(path) = Self::path() {
            save_device(&path, name);
        }
    }

    pub fn device_timeout_secs(&self) -> u64 {
        self.device_timeout_secs
            .unwrap_or(DEFAULT_DEVICE_TIMEOUT_SECS)
    }

    pub fn fft_size(&self) -> usize {
        self.fft_size.unwrap_or(DEFAULT_FFT_SIZE)
    }

    pub fn smoothing(&self) -> f32 {
        self.smoothing.unwrap_or(DEFAULT_SMOOTHING)
    }

    fn apply_onset(&self, mut onset: OnsetConfig) -> OnsetConfig {
        if let Some(v) = self.onset_floor {
            onset.floor = v;
        }
        if let Some(v) = self.onset_average_delta {
            onset.average_delta = v;
        }
        if let Some(v) = self.onset_jump_ratio {
            onset.jump_ratio = v;
        }
        if let Some(v) = self.onset_min_cooldown_ms {
            onset.min_cooldown_ms = v;
        }
        onset
    }

    /// Tracker thresholds for a band layout, with any configured overrides
    pub fn tracker(&self, layout: BandLayout) -> TrackerConfig {
        let mut tracker = TrackerConfig::new(layout);
        tracker.bass = self.apply_onset(tracker.bass);
        tracker.mid = self.apply_onset(tracker.mid);
        tracker.high = self.apply_onset(tracker.high);
        if let Some(k) = self.intense_k {
            tracker.intense.k = k;
        }
        if let Some(ms) = self.intense_refractory_ms {
            tracker.intense.refractory_ms = ms;
        }
        tracker
    }

    /// Configured tracks and their scene table. Falls back to the built-in
    /// set when none are configured or none are valid.
    pub fn tracks(&self) -> (Vec<Track>, SceneTable) {
        let entries = self.tracks.clone().unwrap_or_default();
        let mut tracks = Vec::new();
        let mut table = SceneTable::new();

        for entry in entries {
            match build_track(&entry) {
                Ok(track) => {
                    table.insert(track.id.clone(), entry.scene.unwrap_or(SceneKind::Ambient));
                    tracks.push(track);
                }
                Err(e) => warn!("Skipping track {:?}: {}", entry.id, e),
            }
        }

        if tracks.is_empty() {
            return default_tracks();
        }
        (tracks, table)
    }
}

fn save_device(path: &Path, name: &str) {
    let content = fs::read_to_string(path).unwrap_or_default();
    match fs::write(path, with_device_line(&content, name)) {
        Ok(()) => info!("Saved device {:?} to {:?}", name, path),
        Err(e) => warn!("Could not save config {:?}: {}", path, e),
    }
}

/// `content` with its top-level `device = ...` line set to `name`.
///
/// An existing line is replaced in place. Otherwise the line goes before the
/// first table header so it stays a top-level key.
fn with_device_line(content: &str, name: &str) -> String {
    let line = format!("device = {}", toml::Value::String(name.to_string()));
    let mut lines: Vec<String> = content.lines().map(str::to_string).collect();
    let first_table = lines
        .iter()
        .position(|l| l.trim_start().starts_with('['))
        .unwrap_or(lines.len());

    let existing = lines[..first_table].iter().position(|l| {
        l.trim_start()
            .strip_prefix("device")
            .is_some_and(|rest| rest.trim_start().starts_with('='))
    });
    match existing {
        Some(i) => lines[i] = line,
        None => lines.insert(first_table, line),
    }

    let mut updated = lines.join("\n");
    updated.push('\n');
    updated
}

fn build_track(entry: &TrackEntry) -> Result<Track, pulse_viz_core::TrackError> {
    Ok(Track {
        id: entry.id.clone(),
        title: entry.title.clone().unwrap_or_else(|| entry.id.clone()),
        audio: entry.audio.clone().unwrap_or_default(),
        palette: Palette::from_hex(&entry.palette)?,
        mood: entry.mood.clone().unwrap_or_default(),
    })
}

/// Built-in tracks, one per procedural scene
pub fn default_tracks() -> (Vec<Track>, SceneTable) {
    let builtin: [(&str, &str, [&str; 4], &str, SceneKind); 4] = [
        (
            "tidal",
            "Tidal",
            ["#0b3954", "#087e8b", "#bfd7ea", "#ff5a5f"],
            "cold, rolling",
            SceneKind::RippleField,
        ),
        (
            "ember",
            "Ember",
            ["#ff4d00", "#ffb000", "#7a1c00", "#2b0f0e"],
            "warm, crackling",
            SceneKind::EmberSmoke,
        ),
        (
            "lattice",
            "Lattice",
            ["#e0fbfc", "#98c1d9", "#3d5a80", "#ee6c4d"],
            "restless, geometric",
            SceneKind::NoiseMesh,
        ),
        (
            "aurora",
            "Aurora",
            ["#00f5d4", "#9b5de5", "#f15bb5", "#fee440"],
            "drifting, bright",
            SceneKind::FlowField,
        ),
    ];

    let mut tracks = Vec::new();
    let mut table = SceneTable::new();
    for (id, title, palette, mood, scene) in builtin {
        match Palette::from_hex(&palette) {
            Ok(palette) => {
                tracks.push(Track {
                    id: id.to_string(),
                    title: title.to_string(),
                    audio: String::new(),
                    palette,
                    mood: mood.to_string(),
                });
                table.insert(id, scene);
            }
            Err(e) => warn!("Built-in track {} has a bad palette: {}", id, e),
        }
    }
    (tracks, table)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_template_parses_to_defaults() {
        let config = Config::parse(CONFIG_TEMPLATE).unwrap();
        assert_eq!(config.fft_size(), 2048);
        assert_eq!(config.smoothing(), 0.8);
        assert_eq!(config.device_timeout_secs(), 3);
        assert!(config.tracks.is_none());
    }

    #[test]
    fn test_default_tracks_cover_every_procedural_scene() {
        let (tracks, table) = Config::default().tracks();
        assert_eq!(tracks.len(), 4);
        let scenes: Vec<SceneKind> = tracks.iter().map(|t| table.resolve(&t.id)).collect();
        assert!(scenes.contains(&SceneKind::RippleField));
        assert!(scenes.contains(&SceneKind::EmberSmoke));
        assert!(scenes.contains(&SceneKind::NoiseMesh));
        assert!(scenes.contains(&SceneKind::FlowField));
    }

    #[test]
    fn test_configured_tracks_and_bad_palettes() {
        let config = Config::parse(
            r##"
            [[tracks]]
            id = "one"
            palette = ["#000000", "#ffffff", "#ff0000"]
            scene = "noise-mesh"

            [[tracks]]
            id = "two"
            palette = ["#000000"]
            "##,
        )
        .unwrap();
        let (tracks, table) = config.tracks();
        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].title, "one");
        assert_eq!(table.resolve("one"), SceneKind::NoiseMesh);
        assert_eq!(table.resolve("two"), SceneKind::Ambient);
    }

    #[test]
    fn test_onset_overrides_reach_every_band() {
        let config = Config::parse("onset_floor = 0.55\nintense_k = 3.0").unwrap();
        let tracker = config.tracker(BandLayout::default());
        assert_eq!(tracker.bass.floor, 0.55);
        assert_eq!(tracker.mid.floor, 0.55);
        assert_eq!(tracker.high.floor, 0.55);
        assert_eq!(tracker.intense.k, 3.0);
        // Untouched per-band defaults survive
        assert_eq!(tracker.high.cooldown_divisor, 4.0);
    }

    #[test]
    fn test_unknown_scene_is_a_parse_error() {
        let result = Config::parse(
            r##"
            [[tracks]]
            id = "x"
            palette = ["#000000", "#ffffff", "#ff0000"]
            scene = "kaleidoscope"
            "##,
        );
        assert!(result.is_err());
    }

    fn scratch_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("pulse-viz-{}-{}.toml", name, std::process::id()))
    }

    #[test]
    fn test_saving_device_keeps_template_text() {
        let path = scratch_path("template");
        let _ = fs::remove_file(&path);

        let config = Config::load_or_create(&path);
        assert!(config.device.is_none());
        save_device(&path, "pipewire");

        let content = fs::read_to_string(&path).unwrap();
        let _ = fs::remove_file(&path);
        assert!(content.contains("# Onset Thresholds"));
        assert!(content.contains("# [[tracks]]"));
        assert!(content.contains("# onset_floor = 0.3"));
        let config = Config::parse(&content).unwrap();
        assert_eq!(config.device.as_deref(), Some("pipewire"));
    }

    #[test]
    fn test_device_line_stays_above_tracks() {
        let before = r##"# my tracks
fft_size = 4096

[[tracks]]
id = "one"
palette = ["#000000", "#ffffff", "#ff0000"]
"##;
        let after = with_device_line(before, "USB \"Mic\"");
        assert!(after.starts_with("# my tracks\nfft_size = 4096\n"));

        let config = Config::parse(&after).unwrap();
        assert_eq!(config.device.as_deref(), Some("USB \"Mic\""));
        assert_eq!(config.fft_size(), 4096);
        assert_eq!(config.tracks.as_ref().map(Vec::len), Some(1));
    }

    #[test]
    fn test_existing_device_line_is_replaced() {
        let before = "device_timeout_secs = 5\n# device = \"old\"\ndevice = \"old\"\n";
        let after = with_device_line(before, "new");
        assert_eq!(
            after,
            "device_timeout_secs = 5\n# device = \"old\"\ndevice = \"new\"\n"
        );
    }
}
