//! Spring-animated reveal lens following the pointer.
//!
//! X, Y and radius each run an independent damped spring; opacity eases toward
//! fully shown while something is hovered. The first hover after the pointer
//! (re)enters snaps the springs to the target so the lens never slides in from
//! a stale position.

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LensConfig {
    pub stiffness: f32,
    pub damping: f32,
    /// Per-tick easing rate of the opacity
    pub opacity_ease: f32,
    /// Radius while the pointer is inside the surface but over nothing
    pub base_radius: f32,
    /// Radius while a region is hovered
    pub hover_radius: f32,
}

impl Default for LensConfig {
    fn default() -> Self {
        Self {
            stiffness: 0.12,
            damping: 0.6,
            opacity_ease: 0.15,
            base_radius: 60.0,
            hover_radius: 140.0,
        }
    }
}

/// One damped spring axis
#[derive(Clone, Copy, Debug, Default, PartialEq)]
struct Spring {
    position: f32,
    velocity: f32,
    target: f32,
}

impl Spring {
    fn step(&mut self, stiffness: f32, damping: f32) {
        let force = (self.target - self.position) * stiffness;
        self.velocity = (self.velocity + force) * damping;
        self.position += self.velocity;
    }

    fn snap(&mut self) {
        self.position = self.target;
        self.velocity = 0.0;
    }
}

/// Axis-aligned hover region in surface coordinates
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Region {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Region {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Half-open containment, so adjacent regions never both claim a point
    pub fn contains(&self, x: f32, y: f32) -> bool {
        x >= self.x && x < self.x + self.width && y >= self.y && y < self.y + self.height
    }
}

/// Index of the first region containing the point
pub fn hit_test(regions: &[Region], x: f32, y: f32) -> Option<usize> {
    regions.iter().position(|r| r.contains(x, y))
}

pub struct LensPhysics {
    config: LensConfig,
    x: Spring,
    y: Spring,
    radius: Spring,
    opacity: f32,
    hover: Option<usize>,
    /// Set once the springs have been snapped for the current pointer visit
    engaged: bool,
}

impl LensPhysics {
    pub fn new(config: LensConfig) -> Self {
        let radius = Spring {
            position: config.base_radius,
            velocity: 0.0,
            target: config.base_radius,
        };
        Self {
            config,
            x: Spring::default(),
            y: Spring::default(),
            radius,
            opacity: 0.0,
            hover: None,
            engaged: false,
        }
    }

    /// Pointer moved to `(x, y)` over region `hover` (if any)
    pub fn pointer_move(&mut self, x: f32, y: f32, hover: Option<usize>) {
        if !x.is_finite() || !y.is_finite() {
            return;
        }
        self.x.target = x;
        self.y.target = y;
        self.radius.target = if hover.is_some() {
            self.config.hover_radius
        } else {
            self.config.base_radius
        };
        self.hover = hover;

        if hover.is_some() && !self.engaged {
            self.x.snap();
            self.y.snap();
            self.engaged = true;
        }
    }

    pub fn pointer_leave(&mut self) {
        self.hover = None;
        self.engaged = false;
        self.radius.target = self.config.base_radius;
    }

    /// Integrate one animation frame
    pub fn tick(&mut self) {
        let (k, d) = (self.config.stiffness, self.config.damping);
        self.x.step(k, d);
        self.y.step(k, d);
        self.radius.step(k, d);

        let target = if self.hover.is_some() { 1.0 } else { 0.0 };
        self.opacity += (target - self.opacity) * self.config.opacity_ease;
    }

    /// Region a click should activate, only when one is hovered
    pub fn click_target(&self) -> Option<usize> {
        self.hover
    }

    pub fn position(&self) -> (f32, f32) {
        (self.x.position, self.y.position)
    }

    pub fn target(&self) -> (f32, f32) {
        (self.x.target, self.y.target)
    }

    pub fn radius(&self) -> f32 {
        self.radius.position.max(0.0)
    }

    pub fn opacity(&self) -> f32 {
        self.opacity.clamp(0.0, 1.0)
    }

    pub fn hover(&self) -> Option<usize> {
        self.hover
    }

    /// Whether a point lies inside the visible lens circle
    pub fn reveals(&self, x: f32, y: f32) -> bool {
        if self.opacity() <= 0.001 {
            return false;
        }
        let (cx, cy) = self.position();
        let r = self.radius();
        (x - cx).powi(2) + (y - cy).powi(2) <= r * r
    }
}

impl Default for LensPhysics {
    fn default() -> Self {
        Self::new(LensConfig::default())
    }
}
