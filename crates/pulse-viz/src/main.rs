mod audio;
mod renderer;
mod ui;
mod utils;

use audio::{LiveSpectrum, SourcePipe};
use nannou::prelude::*;
use pulse_viz_core::{
    BandLayout, BeatFrame, BeatTracker, FrequencyAnalyser, SceneTable, Scheduler,
    SpectrumSnapshot, SpectrumSource, Track, TrackerConfig,
};
use renderer::{DebugViz, FrameInput, GpuTarget, SceneContext, SceneHost, SceneSurface, Viewport};
use std::env;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use ui::bindings::{parse_key, Action};
use ui::Gallery;
use utils::Config;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("pulse_viz=info,pulse_viz_core=info")),
        )
        .init();

    let args: Vec<String> = env::args().collect();
    if args.contains(&"--list-devices".to_string()) {
        SourcePipe::list_devices();
        return;
    }

    nannou::app(model).update(update).run();
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum ViewMode {
    Gallery,
    Scene,
}

struct Model {
    spectrum: LiveSpectrum,
    /// Reused every tick
    snapshot: SpectrumSnapshot,
    /// Drives the debug readout, independent of the scene's own tracker
    tracker: BeatTracker,
    last_frame: BeatFrame,
    tracks: Vec<Track>,
    scenes: SceneTable,
    tracker_config: TrackerConfig,
    view: ViewMode,
    gallery: Gallery,
    host: SceneHost,
    scheduler: Scheduler,
    /// Index into `tracks` of the running scene
    current_track: Option<usize>,
    debug: DebugViz,
    debug_enabled: bool,
}

fn model(app: &App) -> Model {
    let args: Vec<String> = env::args().collect();
    let windowed = args.contains(&"--windowed".to_string()) || args.contains(&"-w".to_string());
    let debug_enabled = args.contains(&"--debug".to_string()) || args.contains(&"-d".to_string());
    app.set_exit_on_escape(false);

    let mut win = app
        .new_window()
        .title("pulse-viz")
        .view(view)
        .key_pressed(key_pressed)
        .mouse_moved(mouse_moved)
        .mouse_exited(mouse_exited)
        .mouse_pressed(mouse_pressed)
        .resized(resized)
        .size(1280, 720)
        .min_size(400, 300);

    if !windowed {
        win = win.fullscreen();
    }

    if let Err(e) = win.build() {
        error!("Failed to open window: {:?}", e);
        std::process::exit(1);
    }

    let mut config = Config::load();
    let analyser = match FrequencyAnalyser::new(config.fft_size(), config.smoothing()) {
        Ok(analyser) => analyser,
        Err(e) => {
            warn!("{}, using defaults", e);
            FrequencyAnalyser::default()
        }
    };
    let fft_size = analyser.fft_size();
    let pipe = SourcePipe::new(&config, fft_size);
    if config.device.is_none() {
        if let Some(name) = pipe.device_name().map(str::to_string) {
            config.set_device(&name);
        }
    }
    let spectrum = LiveSpectrum::new(pipe, analyser);

    let layout = BandLayout::standard(spectrum.sample_rate(), fft_size);
    let tracker_config = config.tracker(layout);
    let (tracks, scenes) = config.tracks();
    info!("{} tracks, fft size {}", tracks.len(), fft_size);

    let device = spectrum.device_name().unwrap_or("silent").to_string();
    let gallery = Gallery::new(&tracks, app.window_rect());

    Model {
        spectrum,
        snapshot: SpectrumSnapshot::new(fft_size / 2),
        tracker: BeatTracker::new(tracker_config),
        last_frame: BeatFrame::default(),
        tracks,
        scenes,
        tracker_config,
        view: ViewMode::Gallery,
        gallery,
        host: SceneHost::new(),
        scheduler: Scheduler::new(),
        current_track: None,
        debug: DebugViz::new(device),
        debug_enabled,
    }
}

fn scene_surface(window: &Window) -> SceneSurface<'_> {
    let rect = window.rect();
    SceneSurface {
        device: Some(window.device()),
        format: Frame::TEXTURE_FORMAT,
        sample_count: window.msaa_samples(),
        viewport: Viewport {
            width: rect.w(),
            height: rect.h(),
            pixel_density: window.scale_factor(),
        },
    }
}

fn enter_track(app: &App, model: &mut Model, index: usize) {
    let Some(track) = model.tracks.get(index) else {
        return;
    };
    let kind = model.scenes.resolve(&track.id);
    let context = SceneContext {
        palette: track.palette.clone(),
        tracker: model.tracker_config,
    };

    let window = app.main_window();
    let running = model
        .host
        .enter(kind, context, &scene_surface(&window), &mut model.scheduler);

    model.debug.set_scene(format!("{} ({})", track.title, running));
    model.gallery.pointer_leave();
    model.current_track = Some(index);
    model.view = ViewMode::Scene;
}

fn leave_scene(model: &mut Model) {
    model.host.leave(&mut model.scheduler);
    model.current_track = None;
    model.view = ViewMode::Gallery;
    model.debug.set_scene("gallery");
}

fn update(_app: &App, model: &mut Model, update: Update) {
    let dt = update.since_last.as_secs_f32();
    let now_ms = update.since_start.as_secs_f64() * 1000.0;

    model.spectrum.frequency_data(&mut model.snapshot);
    model.last_frame = model.tracker.process(&model.snapshot, now_ms);
    if model.debug_enabled {
        model.debug.update(&model.last_frame, dt);
    }

    match model.view {
        ViewMode::Gallery => model.gallery.tick(&model.snapshot),
        ViewMode::Scene => model.host.tick(
            &model.scheduler,
            &FrameInput {
                spectrum: &model.snapshot,
                now_ms,
                dt,
            },
        ),
    }
}

fn submit(app: &App, draw: &Draw, frame: &Frame) {
    if let Err(e) = draw.to_frame(app, frame) {
        warn!("Failed to render draw: {:?}", e);
    }
}

fn view(app: &App, model: &Model, frame: Frame) {
    let bounds = app.window_rect();

    match model.view {
        ViewMode::Gallery => {
            let draw = app.draw();
            model.gallery.draw(&draw);
            submit(app, &draw, &frame);
        }
        ViewMode::Scene => {
            // GPU scenes render straight into the frame first
            {
                let window = app.main_window();
                let (width, height) = window.inner_size_pixels();
                model.host.encode(&GpuTarget {
                    device: window.device(),
                    queue: window.queue(),
                    view: frame.texture_view(),
                    format: Frame::TEXTURE_FORMAT,
                    sample_count: window.msaa_samples(),
                    size: [width, height],
                });
            }

            let draw = app.draw();
            model.host.draw(&draw, bounds);
            submit(app, &draw, &frame);
        }
    }

    // Debug readout goes directly on top
    if model.debug_enabled {
        let debug_draw = app.draw();
        model.debug.draw(&debug_draw, bounds);
        submit(app, &debug_draw, &frame);
    }
}

fn resized(app: &App, model: &mut Model, size: Vec2) {
    model.gallery.layout(app.window_rect());

    let window = app.main_window();
    model.host.resize(Viewport {
        width: size.x,
        height: size.y,
        pixel_density: window.scale_factor(),
    });
}

fn key_pressed(app: &App, model: &mut Model, key: Key) {
    match parse_key(key, model.view == ViewMode::Scene) {
        Some(Action::Quit) => {
            leave_scene(model);
            app.quit();
        }
        Some(Action::Back) => leave_scene(model),
        Some(Action::ToggleDebug) => model.debug_enabled = !model.debug_enabled,
        Some(Action::NextTrack) => {
            if model.tracks.is_empty() {
                return;
            }
            let next = model.current_track.map_or(0, |i| (i + 1) % model.tracks.len());
            enter_track(app, model, next);
        }
        Some(Action::Enter) => {
            if let Some(index) = model.gallery.open() {
                enter_track(app, model, index);
            }
        }
        None => {} // Unhandled key
    }
}

fn mouse_moved(_app: &App, model: &mut Model, pos: Point2) {
    if model.view == ViewMode::Gallery {
        model.gallery.pointer_move(pos.x, pos.y);
    }
}

fn mouse_exited(_app: &App, model: &mut Model) {
    model.gallery.pointer_leave();
}

fn mouse_pressed(app: &App, model: &mut Model, button: MouseButton) {
    if model.view != ViewMode::Gallery || button != MouseButton::Left {
        return;
    }
    if let Some(index) = model.gallery.open() {
        enter_track(app, model, index);
    }
}
