// =============================================================================
// WIND RENDERER - Demo application
// =============================================================================
//
// Opens a window, brings up Vulkan and draws a handful of scene objects as
// flat rectangles every frame through the frame orchestrator.
//
// FRAME FLOW (per RedrawRequested):
// 1. Advance frame timer, animate scene
// 2. renderer.begin_frame        (may skip the tick after a recreation)
// 3. renderer.begin_render_pass
// 4. Draw systems record into the frame's command buffer
// 5. renderer.end_render_pass
// 6. renderer.end_frame          (submit, present, recreate if needed)
//
// =============================================================================

use anyhow::{Context, Result};
use glam::{Mat3, Vec3};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use winit::{
    application::ApplicationHandler,
    event::{ElementState, WindowEvent},
    event_loop::{ActiveEventLoop, EventLoop},
    keyboard::PhysicalKey,
    window::{Fullscreen, Window, WindowAttributes, WindowId},
};

use wind_renderer::backend::{VulkanContext, VulkanDevice, WindowSurface};
use wind_renderer::camera::Camera;
use wind_renderer::config::{Config, ConfigWatcher, DEFAULT_CONFIG_PATH};
use wind_renderer::draw::{DrawSystem, FrameInfo, RectDrawSystem};
use wind_renderer::frame::Renderer;
use wind_renderer::scene::ObjectRegistry;

// =============================================================================
// ENTRY POINT
// =============================================================================

fn main() -> Result<()> {
    // Load configuration from config.toml
    let (config, config_error) = Config::load();

    // Initialize logging, then report anything that went wrong before it existed
    init_logging(&config);
    if let Some(e) = config_error {
        log::warn!("Failed to load {}: {:#}. Using defaults.", DEFAULT_CONFIG_PATH, e);
    }
    log::info!("Starting Wind renderer");
    log::info!(
        "Window: {}x{} ({})",
        config.window.width,
        config.window.height,
        if config.window.fullscreen { "fullscreen" } else { "windowed" }
    );

    let event_loop = EventLoop::new()?;
    let mut app = App::new(config);
    event_loop.run_app(&mut app)?;

    // Errors that ended the event loop surface here
    match app.fatal_error.take() {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

/// Initialize logging; RUST_LOG overrides the configured level. With
/// `log_to_file` set, records go to the log file instead of stderr.
fn init_logging(config: &Config) {
    let level = config.log_level();

    let mut builder = env_logger::Builder::new();
    builder
        .filter_level(level.unwrap_or(log::LevelFilter::Info))
        .parse_default_env();

    let mut file_error = None;
    if config.debug.log_to_file {
        match open_log_file(Path::new(&config.debug.log_file)) {
            Ok(file) => {
                builder.target(env_logger::Target::Pipe(Box::new(file)));
            }
            Err(e) => file_error = Some(e),
        }
    }

    builder.init();

    if let Some(e) = file_error {
        log::warn!(
            "Failed to open log file {}: {}. Logging to stderr.",
            config.debug.log_file,
            e
        );
    }
    if level.is_none() {
        log::warn!(
            "Unknown log level '{}', defaulting to info",
            config.debug.log_level
        );
    }
}

/// Create/clear the log file and stamp the session header
fn open_log_file(path: &Path) -> std::io::Result<File> {
    let mut file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(path)?;
    writeln!(file, "=== Wind Renderer Log ===")?;
    writeln!(file, "Started: {:?}", std::time::SystemTime::now())?;
    writeln!(file)?;
    Ok(file)
}

// =============================================================================
// FRAME TIMER
// =============================================================================

/// Frame time and once-per-second FPS averaging
struct FrameTimer {
    last_frame: Instant,
    last_report: Instant,
    frames_since_report: u32,
}

/// Averaged over the last reporting interval
#[derive(Debug, Clone, Copy, PartialEq)]
struct FpsReport {
    fps: f32,
    frame_time: f32,
}

impl FrameTimer {
    const REPORT_INTERVAL: Duration = Duration::from_secs(1);
    /// Long stalls (window drag, breakpoint) must not teleport the animation
    const MAX_FRAME_TIME: f32 = 0.25;

    fn new(now: Instant) -> Self {
        Self {
            last_frame: now,
            last_report: now,
            frames_since_report: 0,
        }
    }

    /// Seconds since the previous tick
    fn tick(&mut self, now: Instant) -> f32 {
        let frame_time = now.duration_since(self.last_frame).as_secs_f32();
        self.last_frame = now;
        frame_time.min(Self::MAX_FRAME_TIME)
    }

    /// Count a presented frame; yields a report once per interval
    fn frame_presented(&mut self, now: Instant) -> Option<FpsReport> {
        self.frames_since_report += 1;
        let elapsed = now.duration_since(self.last_report);
        if elapsed < Self::REPORT_INTERVAL {
            return None;
        }

        let seconds = elapsed.as_secs_f32();
        let report = FpsReport {
            fps: self.frames_since_report as f32 / seconds,
            frame_time: seconds / self.frames_since_report as f32,
        };
        self.frames_since_report = 0;
        self.last_report = now;
        Some(report)
    }
}

// =============================================================================
// APPLICATION STATE
// =============================================================================

/// Main application struct.
///
/// IMPORTANT: Field order matters for Drop! Everything holding Vulkan
/// objects goes before the window whose surface they target.
struct App {
    // ─────────────────────────────────────────────────────────────────────────
    // RENDERING
    // ─────────────────────────────────────────────────────────────────────────
    renderer: Option<Renderer<VulkanContext, WindowSurface>>,
    /// Draw systems run in this order each frame
    draw_systems: Vec<Box<dyn DrawSystem>>,

    // ─────────────────────────────────────────────────────────────────────────
    // SCENE
    // ─────────────────────────────────────────────────────────────────────────
    objects: ObjectRegistry,
    camera: Camera,

    // ─────────────────────────────────────────────────────────────────────────
    // WINDOW
    // ─────────────────────────────────────────────────────────────────────────
    window: Option<Arc<Window>>,
    is_fullscreen: bool,

    // ─────────────────────────────────────────────────────────────────────────
    // CONFIGURATION
    // ─────────────────────────────────────────────────────────────────────────
    config: Config,
    config_watcher: Option<ConfigWatcher>,

    // ─────────────────────────────────────────────────────────────────────────
    // TIMING / STATUS
    // ─────────────────────────────────────────────────────────────────────────
    frame_timer: FrameTimer,
    /// Set when something unrecoverable ended the event loop
    fatal_error: Option<anyhow::Error>,
}

impl App {
    fn new(config: Config) -> Self {
        let is_fullscreen = config.window.fullscreen;

        let config_watcher = if config.debug.hot_reload {
            match ConfigWatcher::new(DEFAULT_CONFIG_PATH) {
                Ok(watcher) => Some(watcher),
                Err(e) => {
                    log::warn!("Config hot reload disabled: {:#}", e);
                    None
                }
            }
        } else {
            None
        };

        let mut objects = ObjectRegistry::new();
        build_scene(&mut objects);

        Self {
            renderer: None,
            draw_systems: Vec::new(),
            objects,
            camera: Camera::new(),
            window: None,
            is_fullscreen,
            config,
            config_watcher,
            frame_timer: FrameTimer::new(Instant::now()),
            fatal_error: None,
        }
    }

    // =========================================================================
    // INITIALIZATION
    // =========================================================================

    /// Bring up the device, the renderer (swapchain + command buffers) and
    /// the draw systems for `window`.
    fn init_vulkan(&mut self, window: Arc<Window>) -> Result<()> {
        log::info!("Initializing Vulkan...");

        // Enable validation layers based on config (and debug build)
        let enable_validation = cfg!(debug_assertions) && self.config.debug.validation_layers;
        let device = VulkanDevice::new(&self.config.window.title, enable_validation, &*window)?;

        let context = VulkanContext::new(device.clone()).context("Failed to create graphics context")?;
        let surface = WindowSurface::new(window);
        let mut renderer = Renderer::new(context, surface).context("Failed to create renderer")?;
        renderer.set_clear_color(self.config.graphics.clear_color);

        self.draw_systems = vec![Box::new(RectDrawSystem::new(device))];
        self.renderer = Some(renderer);

        log::info!("Vulkan initialized successfully!");
        Ok(())
    }

    // =========================================================================
    // RENDERING
    // =========================================================================

    /// Render one frame. Returns false when nothing was presented this tick.
    fn render_frame(&mut self) -> Result<bool> {
        let Some(renderer) = self.renderer.as_mut() else {
            return Ok(false);
        };

        // Nothing to present into; resize events will bring us back
        if renderer.surface().is_minimized() {
            return Ok(false);
        }

        let frame_time = self.frame_timer.tick(Instant::now());
        animate_scene(&mut self.objects, frame_time);

        let Some(command_buffer) = renderer.begin_frame()? else {
            return Ok(false);
        };

        // Extent may have changed with the last recreation
        fit_camera(&mut self.camera, renderer.aspect_ratio());

        let frame = FrameInfo {
            frame_index: renderer.frame_index(),
            frame_time,
            command_buffer,
            extent: renderer.extent(),
            camera: &self.camera,
            objects: &self.objects,
        };

        renderer.begin_render_pass(command_buffer);
        for system in &mut self.draw_systems {
            system.draw(&frame);
        }
        renderer.end_render_pass(command_buffer);

        renderer.end_frame()?;
        Ok(true)
    }

    fn toggle_fullscreen(&mut self) {
        if let Some(ref window) = self.window {
            self.is_fullscreen = !self.is_fullscreen;

            if self.is_fullscreen {
                window.set_fullscreen(Some(Fullscreen::Borderless(None)));
                log::info!("Entered fullscreen mode");
            } else {
                window.set_fullscreen(None);
                log::info!("Exited fullscreen mode");
            }
        }
    }

    fn update_fps(&mut self) {
        let Some(report) = self.frame_timer.frame_presented(Instant::now()) else {
            return;
        };
        if !self.config.debug.show_fps {
            return;
        }

        if let Some(ref window) = self.window {
            let mode = if self.is_fullscreen { "fullscreen" } else { "windowed" };
            window.set_title(&format!(
                "{} - {:.0} FPS ({:.2}ms) [{}]",
                self.config.window.title,
                report.fps,
                report.frame_time * 1000.0,
                mode
            ));
        }
    }

    /// Apply a config edited on disk. Only settings that can change at
    /// runtime are picked up.
    fn apply_reloaded_config(&mut self, config: Config) {
        if let Some(renderer) = self.renderer.as_mut() {
            renderer.set_clear_color(config.graphics.clear_color);
        }
        if config.window.title != self.config.window.title || !config.debug.show_fps {
            if let Some(ref window) = self.window {
                window.set_title(&config.window.title);
            }
        }
        self.config = config;
    }

    /// Tear down GPU resources and leave the event loop
    fn shutdown(&mut self, event_loop: &ActiveEventLoop) {
        log::info!("Cleaning up Vulkan resources...");
        self.draw_systems.clear();
        self.renderer = None;
        event_loop.exit();
        log::info!("Cleanup complete");
    }
}

// =============================================================================
// SCENE
// =============================================================================

fn build_scene(objects: &mut ObjectRegistry) {
    let panel = objects.create();
    panel.color = Vec3::new(0.1, 0.45, 0.8);
    panel.transform.scale = 0.9;

    let badge = objects.create();
    badge.color = Vec3::new(0.9, 0.3, 0.2);
    badge.transform.translation = Vec3::new(0.0, -0.55, 0.0);
    badge.transform.scale = 0.3;

    let light = objects.create_point_light(1.0, Vec3::new(1.0, 0.85, 0.4), 0.12);
    light.transform.translation = Vec3::new(0.6, 0.0, 0.0);
}

/// Orthographic view of the unit-height scene, widened to the window's aspect
fn fit_camera(camera: &mut Camera, aspect: f32) {
    camera.set_orthographic_projection(-aspect, aspect, -1.0, 1.0, -1.0, 1.0);
}

/// Spin solid objects; orbit point lights around the origin
fn animate_scene(objects: &mut ObjectRegistry, frame_time: f32) {
    let orbit = Mat3::from_rotation_z(frame_time * 0.8);
    for object in objects.iter_mut() {
        if object.point_light.is_some() {
            object.transform.translation = orbit * object.transform.translation;
        } else {
            object.transform.rotation.z += frame_time * 0.3;
        }
    }
}

// =============================================================================
// EVENT HANDLING
// =============================================================================

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let mut window_attributes = WindowAttributes::default()
            .with_title(&self.config.window.title)
            .with_inner_size(winit::dpi::PhysicalSize::new(
                self.config.window.width,
                self.config.window.height,
            ));

        if self.config.window.fullscreen {
            window_attributes = window_attributes.with_fullscreen(Some(Fullscreen::Borderless(None)));
        }

        let window = match event_loop.create_window(window_attributes) {
            Ok(w) => Arc::new(w),
            Err(e) => {
                self.fatal_error = Some(anyhow::anyhow!("Failed to create window: {}", e));
                event_loop.exit();
                return;
            }
        };

        self.window = Some(window.clone());

        if let Err(e) = self.init_vulkan(window) {
            log::error!("Failed to initialize Vulkan: {:#}", e);
            self.fatal_error = Some(e);
            self.shutdown(event_loop);
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                log::info!("Close requested, shutting down...");
                self.shutdown(event_loop);
            }

            WindowEvent::Resized(size) => {
                log::debug!("Window resized to {}x{}", size.width, size.height);
                if let Some(renderer) = self.renderer.as_mut() {
                    renderer.surface_mut().notify_resized();
                }
            }

            WindowEvent::RedrawRequested => match self.render_frame() {
                Ok(true) => self.update_fps(),
                Ok(false) => {}
                Err(e) => {
                    log::error!("Render error: {:#}", e);
                    self.fatal_error = Some(e);
                    self.shutdown(event_loop);
                }
            },

            WindowEvent::KeyboardInput { event, .. } => {
                if event.state != ElementState::Pressed || event.repeat {
                    return;
                }
                let PhysicalKey::Code(key) = event.physical_key else {
                    return;
                };

                if key == self.config.controls.quit() {
                    log::info!("Quit key pressed, shutting down...");
                    self.shutdown(event_loop);
                } else if key == self.config.controls.fullscreen() {
                    self.toggle_fullscreen();
                }
            }

            _ => {}
        }
    }

    /// Called when the event loop is about to block waiting for events.
    /// We use this to pick up config edits and request continuous redraws.
    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(config) = self.config_watcher.as_ref().and_then(ConfigWatcher::poll) {
            self.apply_reloaded_config(config);
        }

        if self.renderer.is_some() {
            if let Some(ref window) = self.window {
                window.request_redraw();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_time_is_clamped() {
        let start = Instant::now();
        let mut timer = FrameTimer::new(start);
        let dt = timer.tick(start + Duration::from_millis(16));
        assert!((dt - 0.016).abs() < 1e-4);
        assert_eq!(timer.tick(start + Duration::from_secs(5)), FrameTimer::MAX_FRAME_TIME);
    }

    #[test]
    fn fps_is_reported_once_per_interval() {
        let start = Instant::now();
        let mut timer = FrameTimer::new(start);
        for i in 1..60 {
            assert!(timer
                .frame_presented(start + Duration::from_millis(i * 16))
                .is_none());
        }
        let report = timer
            .frame_presented(start + Duration::from_secs(1))
            .unwrap();
        assert!((report.fps - 60.0).abs() < 1e-3);
        assert!(timer
            .frame_presented(start + Duration::from_millis(1016))
            .is_none());
    }

    #[test]
    fn log_file_is_truncated_and_stamped() {
        let path = std::env::temp_dir().join(format!(
            "wind_renderer_log_{}.log",
            std::process::id()
        ));
        std::fs::write(&path, "stale session\n").unwrap();

        let mut file = open_log_file(&path).unwrap();
        // The handle stays open for the logger; later records append after the header
        writeln!(file, "INFO frame 1 presented").unwrap();
        drop(file);

        let contents = std::fs::read_to_string(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert!(contents.starts_with("=== Wind Renderer Log ===\n"));
        assert!(!contents.contains("stale session"));
        assert!(contents.ends_with("INFO frame 1 presented\n"));
    }

    #[test]
    fn log_file_in_missing_directory_is_an_error() {
        let path = Path::new("definitely/not/here/wind_renderer.log");
        assert!(open_log_file(path).is_err());
    }

    #[test]
    fn lights_orbit_and_panels_spin() {
        let mut objects = ObjectRegistry::new();
        build_scene(&mut objects);
        let before: Vec<_> = objects.iter().cloned().collect();

        animate_scene(&mut objects, 0.1);

        for (old, new) in before.iter().zip(objects.iter()) {
            if old.point_light.is_some() {
                let (r0, r1) = (old.transform.translation.length(), new.transform.translation.length());
                assert!((r0 - r1).abs() < 1e-5);
                assert_ne!(old.transform.translation, new.transform.translation);
            } else {
                assert!(new.transform.rotation.z > old.transform.rotation.z);
                assert_eq!(old.transform.translation, new.transform.translation);
            }
        }
    }
}
