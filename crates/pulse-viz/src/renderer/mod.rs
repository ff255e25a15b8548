pub mod ambient;
pub mod debug;
pub mod ember_smoke;
pub mod flow_field;
pub mod noise_mesh;
pub mod ripple_field;

use nannou::prelude::*;
use nannou::wgpu;
use pulse_viz_core::{Color, Palette, SceneKind, Scheduler, SpectrumSnapshot, TickId, TrackerConfig};
use tracing::{debug, info, warn};

pub use ambient::Ambient;
pub use debug::DebugViz;
pub use ember_smoke::EmberSmoke;
pub use flow_field::FlowField;
pub use noise_mesh::NoiseMesh;
pub use ripple_field::RippleField;

/// Errors a scene can raise while attaching to its output
#[derive(Debug, thiserror::Error)]
pub enum SceneError {
    #[error("rendering surface unavailable: {0}")]
    SurfaceUnavailable(String),

    #[error("surface has zero size ({0}x{1})")]
    ZeroSizedSurface(u32, u32),
}

/// Output surface size in logical points plus the display's pixel density
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Viewport {
    pub width: f32,
    pub height: f32,
    pub pixel_density: f32,
}

impl Viewport {
    /// Size in physical pixels
    pub fn physical(&self) -> [u32; 2] {
        let density = if self.pixel_density > 0.0 {
            self.pixel_density
        } else {
            1.0
        };
        [
            (self.width * density).round().max(0.0) as u32,
            (self.height * density).round().max(0.0) as u32,
        ]
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1280.0,
            height: 720.0,
            pixel_density: 1.0,
        }
    }
}

/// What a scene may attach to on `init`
pub struct SceneSurface<'a> {
    /// GPU device, absent when only CPU drawing is possible
    pub device: Option<&'a wgpu::Device>,
    pub format: wgpu::TextureFormat,
    pub sample_count: u32,
    pub viewport: Viewport,
}

/// GPU handles for scenes that encode their own render passes
pub struct GpuTarget<'a> {
    pub device: &'a wgpu::Device,
    pub queue: &'a wgpu::Queue,
    pub view: &'a wgpu::TextureView,
    pub format: wgpu::TextureFormat,
    pub sample_count: u32,
    pub size: [u32; 2],
}

/// Per-tick input handed to the active scene
pub struct FrameInput<'a> {
    pub spectrum: &'a SpectrumSnapshot,
    pub now_ms: f64,
    /// Seconds since the previous tick
    pub dt: f32,
}

/// Everything a scene needs from the track it plays
#[derive(Clone, Debug)]
pub struct SceneContext {
    pub palette: Palette,
    pub tracker: TrackerConfig,
}

/// Lifecycle shared by all scene variants
pub trait Visualization {
    /// Attach to the output. The only fallible step of a scene's life.
    fn init(&mut self, _surface: &SceneSurface) -> Result<(), SceneError> {
        Ok(())
    }

    /// Advance one frame from the current spectrum
    fn tick(&mut self, input: &FrameInput);

    /// Draw with nannou's CPU-side draw API
    fn draw(&self, draw: &Draw, bounds: Rect);

    /// Encode GPU passes straight into the frame, before `draw`
    fn encode(&self, _target: &GpuTarget) {}

    fn resize(&mut self, _viewport: Viewport) {}

    /// Release pooled and GPU resources
    fn destroy(&mut self) {}
}

/// Closed set of scene variants
pub enum Scene {
    NoiseMesh(NoiseMesh),
    EmberSmoke(EmberSmoke),
    FlowField(FlowField),
    RippleField(RippleField),
    Ambient(Ambient),
}

impl Scene {
    pub fn new(kind: SceneKind, context: SceneContext) -> Self {
        match kind {
            SceneKind::NoiseMesh => Scene::NoiseMesh(NoiseMesh::new(context)),
            SceneKind::EmberSmoke => Scene::EmberSmoke(EmberSmoke::new(context)),
            SceneKind::FlowField => Scene::FlowField(FlowField::new(context)),
            SceneKind::RippleField => Scene::RippleField(RippleField::new(context)),
            SceneKind::Ambient => Scene::Ambient(Ambient::new(context)),
        }
    }

    pub fn kind(&self) -> SceneKind {
        match self {
            Scene::NoiseMesh(_) => SceneKind::NoiseMesh,
            Scene::EmberSmoke(_) => SceneKind::EmberSmoke,
            Scene::FlowField(_) => SceneKind::FlowField,
            Scene::RippleField(_) => SceneKind::RippleField,
            Scene::Ambient(_) => SceneKind::Ambient,
        }
    }

    fn as_viz(&self) -> &dyn Visualization {
        match self {
            Scene::NoiseMesh(s) => s,
            Scene::EmberSmoke(s) => s,
            Scene::FlowField(s) => s,
            Scene::RippleField(s) => s,
            Scene::Ambient(s) => s,
        }
    }

    fn as_viz_mut(&mut self) -> &mut dyn Visualization {
        match self {
            Scene::NoiseMesh(s) => s,
            Scene::EmberSmoke(s) => s,
            Scene::FlowField(s) => s,
            Scene::RippleField(s) => s,
            Scene::Ambient(s) => s,
        }
    }
}

impl Visualization for Scene {
    fn init(&mut self, surface: &SceneSurface) -> Result<(), SceneError> {
        self.as_viz_mut().init(surface)
    }

    fn tick(&mut self, input: &FrameInput) {
        self.as_viz_mut().tick(input)
    }

    fn draw(&self, draw: &Draw, bounds: Rect) {
        self.as_viz().draw(draw, bounds)
    }

    fn encode(&self, target: &GpuTarget) {
        self.as_viz().encode(target)
    }

    fn resize(&mut self, viewport: Viewport) {
        self.as_viz_mut().resize(viewport)
    }

    fn destroy(&mut self) {
        self.as_viz_mut().destroy()
    }
}

struct ActiveScene {
    scene: Scene,
    tick: TickId,
}

/// Owns the scene currently on screen and its tick registration.
#[derive(Default)]
pub struct SceneHost {
    active: Option<ActiveScene>,
}

impl SceneHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the active scene with `kind`.
    ///
    /// A variant that cannot attach to the surface is swapped for the ambient
    /// scene. Returns the kind actually running.
    pub fn enter(
        &mut self,
        kind: SceneKind,
        context: SceneContext,
        surface: &SceneSurface,
        scheduler: &mut Scheduler,
    ) -> SceneKind {
        self.leave(scheduler);

        let mut scene = Scene::new(kind, context.clone());
        if let Err(e) = scene.init(surface) {
            warn!("Scene {} failed to start ({}), using ambient", kind, e);
            scene = Scene::new(SceneKind::Ambient, context);
            if let Err(e) = scene.init(surface) {
                warn!("Ambient scene failed to start: {}", e);
            }
        }

        let running = scene.kind();
        let tick = scheduler.register();
        info!("Entered scene {}", running);
        self.active = Some(ActiveScene { scene, tick });
        running
    }

    /// Tick the active scene if it is still registered.
    ///
    /// An empty spectrum leaves the scene on its last state.
    pub fn tick(&mut self, scheduler: &Scheduler, input: &FrameInput) {
        let Some(active) = self.active.as_mut() else {
            return;
        };
        if !scheduler.is_registered(active.tick) {
            return;
        }
        if input.spectrum.is_empty() {
            debug!("Empty spectrum, holding last scene state");
            return;
        }
        active.scene.tick(input);
    }

    pub fn draw(&self, draw: &Draw, bounds: Rect) {
        if let Some(active) = &self.active {
            active.scene.draw(draw, bounds);
        }
    }

    pub fn encode(&self, target: &GpuTarget) {
        if let Some(active) = &self.active {
            active.scene.encode(target);
        }
    }

    pub fn resize(&mut self, viewport: Viewport) {
        if let Some(active) = self.active.as_mut() {
            active.scene.resize(viewport);
        }
    }

    /// Destroy the active scene and stop its ticks
    pub fn leave(&mut self, scheduler: &mut Scheduler) {
        if let Some(mut active) = self.active.take() {
            active.scene.destroy();
            scheduler.deregister(active.tick);
            info!("Left scene {}", active.scene.kind());
        }
    }
}

/// Palette color as a nannou color with alpha
pub fn paint(color: Color, alpha: f32) -> Srgba {
    srgba(color.r, color.g, color.b, alpha.clamp(0.0, 1.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pulse_viz_core::BandLayout;

    pub(crate) fn context() -> SceneContext {
        SceneContext {
            palette: Palette::from_hex(&["#0b3954", "#087e8b", "#bfd7ea", "#ff5a5f"]).unwrap(),
            tracker: TrackerConfig::new(BandLayout::standard(44100.0, 256)),
        }
    }

    pub(crate) fn cpu_surface() -> SceneSurface<'static> {
        SceneSurface {
            device: None,
            format: wgpu::TextureFormat::Rgba16Float,
            sample_count: 1,
            viewport: Viewport {
                width: 640.0,
                height: 480.0,
                pixel_density: 2.0,
            },
        }
    }

    fn running(host: &SceneHost) -> Option<SceneKind> {
        host.active.as_ref().map(|a| a.scene.kind())
    }

    #[test]
    fn test_enter_registers_and_leave_deregisters() {
        let mut scheduler = Scheduler::new();
        let mut host = SceneHost::new();
        let kind = host.enter(SceneKind::RippleField, context(), &cpu_surface(), &mut scheduler);
        assert_eq!(kind, SceneKind::RippleField);
        assert_eq!(scheduler.active_count(), 1);

        host.leave(&mut scheduler);
        assert!(host.active.is_none());
        assert_eq!(scheduler.active_count(), 0);
    }

    #[test]
    fn test_gpu_scene_without_device_falls_back() {
        let mut scheduler = Scheduler::new();
        let mut host = SceneHost::new();
        let kind = host.enter(SceneKind::FlowField, context(), &cpu_surface(), &mut scheduler);
        assert_eq!(kind, SceneKind::Ambient);
        assert_eq!(running(&host), Some(SceneKind::Ambient));
    }

    #[test]
    fn test_reenter_replaces_previous_registration() {
        let mut scheduler = Scheduler::new();
        let mut host = SceneHost::new();
        host.enter(SceneKind::NoiseMesh, context(), &cpu_surface(), &mut scheduler);
        host.enter(SceneKind::EmberSmoke, context(), &cpu_surface(), &mut scheduler);
        assert_eq!(scheduler.active_count(), 1);
        assert_eq!(running(&host), Some(SceneKind::EmberSmoke));
    }

    #[test]
    fn test_every_cpu_scene_survives_degenerate_ticks() {
        let empty = SpectrumSnapshot::default();
        let loud = SpectrumSnapshot::from_bins(vec![255; 128]);
        for kind in SceneKind::ALL {
            let mut scene = Scene::new(kind, context());
            if scene.init(&cpu_surface()).is_err() {
                continue;
            }
            for (i, spectrum) in [&empty, &loud, &empty, &loud].into_iter().enumerate() {
                scene.tick(&FrameInput {
                    spectrum,
                    now_ms: i as f64 * 16.0,
                    dt: 1.0 / 60.0,
                });
            }
            scene.resize(Viewport::default());
            scene.destroy();
        }
    }

    #[test]
    fn test_viewport_physical_size() {
        let viewport = Viewport {
            width: 640.0,
            height: 480.0,
            pixel_density: 2.0,
        };
        assert_eq!(viewport.physical(), [1280, 960]);
    }
}
