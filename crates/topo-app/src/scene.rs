use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::{Duration, Instant};

use anyhow::Result;
use ratatui::style::Color;
use serde_json::Value;

use topo_assets::Resources;
use topo_config::AppConfig;
use topo_core::logging::LogLine;
use topo_core::sizes::{Sizes, Viewport};
use topo_core::time::Time;
use topo_core::Emitter;
use topo_ui::hud::{HudView, Loading};

/// Target orbit speed in radians per second.
const ORBIT_SPEED: f64 = 0.6;
/// How quickly the orbit speed converges on its target, per second.
const ORBIT_DAMPING: f64 = 4.0;

/// Orbiting camera state driven by `tick.camera` and `resize.camera`.
#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    pub aspect: f64,
    pub angle: f64,
    pub speed: f64,
}

impl Camera {
    fn new(aspect: f64) -> Self {
        Self {
            aspect,
            angle: 0.0,
            speed: 0.0,
        }
    }

    /// Ease the speed toward [`ORBIT_SPEED`] and advance the angle.
    fn update(&mut self, delta_ms: f64) {
        let dt = delta_ms / 1000.0;
        let blend = 1.0 - (-ORBIT_DAMPING * dt).exp();
        self.speed += (ORBIT_SPEED - self.speed) * blend;
        self.angle = (self.angle + self.speed * dt) % std::f64::consts::TAU;
    }
}

/// What the renderer draws into.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderTarget {
    pub viewport: Viewport,
    pub frames: u64,
}

/// The demo scene: the clock, the viewport, the assets and the state their
/// listeners maintain.
pub struct Scene {
    pub time: Time,
    pub sizes: Sizes,
    pub resources: Resources,
    camera: Rc<RefCell<Camera>>,
    target: Rc<RefCell<RenderTarget>>,
    loading: Rc<RefCell<Loading>>,
    redraw: Rc<Cell<bool>>,
    clear_color: Color,
    debug: bool,
    config: AppConfig,
}

impl Scene {
    pub fn new(config: AppConfig, cols: u16, rows: u16, now: Instant) -> Result<Self> {
        let (r, g, b) = config.clear_color_rgb()?;

        let time = Time::new(now).with_delta_cap(Duration::from_millis(config.clock.delta_cap_ms));
        let sizes = Sizes::new(
            u32::from(cols),
            u32::from(rows),
            config.viewport.device_pixel_ratio,
        )
        .with_pixel_ratio_cap(config.viewport.pixel_ratio_cap);
        let viewport = sizes.viewport();

        let scene = Self {
            time,
            sizes,
            resources: Resources::new(),
            camera: Rc::new(RefCell::new(Camera::new(viewport.aspect()))),
            target: Rc::new(RefCell::new(RenderTarget {
                viewport,
                frames: 0,
            })),
            loading: Rc::default(),
            redraw: Rc::new(Cell::new(true)),
            clear_color: Color::Rgb(r, g, b),
            debug: config.debug,
            config,
        };
        scene.wire()?;
        Ok(scene)
    }

    fn wire(&self) -> Result<()> {
        let target = Rc::clone(&self.target);
        self.sizes.on("resize.renderer", move |args| {
            if let Some(viewport) = args.first().and_then(viewport_from) {
                target.borrow_mut().viewport = viewport;
            }
            None
        })?;

        let camera = Rc::clone(&self.camera);
        self.sizes.on("resize.camera", move |args| {
            if let Some(viewport) = args.first().and_then(viewport_from) {
                camera.borrow_mut().aspect = viewport.aspect();
            }
            None
        })?;

        let camera = Rc::clone(&self.camera);
        self.time.on("tick.camera", move |args| {
            let delta_ms = args
                .first()
                .and_then(|frame| frame["delta_ms"].as_f64())
                .unwrap_or_default();
            camera.borrow_mut().update(delta_ms);
            None
        })?;

        let target = Rc::clone(&self.target);
        let redraw = Rc::clone(&self.redraw);
        self.time.on("tick.render", move |_| {
            target.borrow_mut().frames += 1;
            redraw.set(true);
            None
        })?;

        let loading = Rc::clone(&self.loading);
        self.resources.on("progress.status", move |args| {
            if let Some(percent) = args.first().and_then(Value::as_u64) {
                loading.borrow_mut().percent = percent.min(100) as u8;
            }
            None
        })?;

        let loading = Rc::clone(&self.loading);
        self.resources.on("ready.status", move |_| {
            loading.borrow_mut().ready = true;
            tracing::info!("scene resources ready");
            None
        })?;

        let loading = Rc::clone(&self.loading);
        self.resources.loader().on("fileError.status", move |_| {
            loading.borrow_mut().failed += 1;
            None
        })?;

        Ok(())
    }

    /// Load the configured resources. An empty list counts as ready.
    pub fn start(&self) {
        if self.config.resources.is_empty() {
            let mut loading = self.loading.borrow_mut();
            loading.percent = 100;
            loading.ready = true;
            return;
        }
        self.resources.load(&self.config.resources);
    }

    pub fn tick(&mut self, now: Instant) {
        self.time.tick(now);
    }

    pub fn resize(&mut self, cols: u16, rows: u16) {
        self.sizes.resize(u32::from(cols), u32::from(rows));
        self.redraw.set(true);
    }

    /// Whether a frame was requested since the last call.
    pub fn take_redraw(&self) -> bool {
        self.redraw.replace(false)
    }

    pub fn toggle_debug(&mut self) {
        self.debug = !self.debug;
        tracing::debug!(debug = self.debug, "debug HUD toggled");
        self.redraw.set(true);
    }

    pub fn debug(&self) -> bool {
        self.debug
    }

    pub fn camera(&self) -> Camera {
        self.camera.borrow().clone()
    }

    pub fn render_target(&self) -> RenderTarget {
        self.target.borrow().clone()
    }

    pub fn loading(&self) -> Loading {
        self.loading.borrow().clone()
    }

    pub fn view(&self, log_lines: Vec<LogLine>) -> HudView<'static> {
        HudView {
            title: "orbit",
            clear_color: self.clear_color,
            orbit_angle: self.camera.borrow().angle,
            frame: self.time.frame(),
            fps: self.time.fps(),
            elapsed: self.time.elapsed(),
            delta: self.time.delta(),
            viewport: self.target.borrow().viewport,
            loading: self.loading(),
            log_lines,
            listeners: self.listener_counts(),
        }
    }

    /// Listeners currently attached to the scene's own events.
    pub fn listener_counts(&self) -> Vec<(&'static str, usize)> {
        vec![
            ("tick", self.time.events().listener_count("tick")),
            ("resize", self.sizes.events().listener_count("resize")),
            ("progress", self.resources.events().listener_count("progress")),
            ("ready", self.resources.events().listener_count("ready")),
        ]
    }

    /// Drop the clock and viewport listeners and stop the clock.
    pub fn destroy(&mut self) {
        if let Err(err) = self.time.off("tick") {
            tracing::warn!(error = %err, "failed to detach tick listeners");
        }
        if let Err(err) = self.sizes.off("resize") {
            tracing::warn!(error = %err, "failed to detach resize listeners");
        }
        self.time.stop();
        tracing::info!(frames = self.time.frame(), "scene destroyed");
    }
}

fn viewport_from(value: &Value) -> Option<Viewport> {
    Some(Viewport {
        width: u32::try_from(value["width"].as_u64()?).ok()?,
        height: u32::try_from(value["height"].as_u64()?).ok()?,
        pixel_ratio: value["pixel_ratio"].as_f64()?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use topo_config::ResourceSpec;

    fn scene(config: AppConfig) -> (Scene, Instant) {
        let start = Instant::now();
        (Scene::new(config, 80, 20, start).unwrap(), start)
    }

    #[test]
    fn ticks_advance_camera_and_request_redraw() {
        let (mut scene, start) = scene(AppConfig::default());
        assert!(scene.take_redraw());
        assert!(!scene.take_redraw());

        scene.tick(start + Duration::from_millis(16));
        scene.tick(start + Duration::from_millis(32));

        let camera = scene.camera();
        assert!(camera.speed > 0.0 && camera.speed < ORBIT_SPEED);
        assert!(camera.angle > 0.0);
        assert_eq!(scene.render_target().frames, 2);
        assert!(scene.take_redraw());
    }

    #[test]
    fn camera_speed_settles_on_target() {
        let mut camera = Camera::new(1.0);
        for _ in 0..600 {
            camera.update(16.0);
        }
        assert!((camera.speed - ORBIT_SPEED).abs() < 1e-6);
        assert!(camera.angle >= 0.0 && camera.angle < std::f64::consts::TAU);
    }

    #[test]
    fn resize_updates_target_and_aspect() {
        let (mut scene, _) = scene(AppConfig::default());
        assert_eq!(scene.camera().aspect, 4.0);

        scene.resize(120, 40);
        assert_eq!(scene.camera().aspect, 3.0);
        let target = scene.render_target();
        assert_eq!((target.viewport.width, target.viewport.height), (120, 40));
    }

    #[test]
    fn pixel_ratio_follows_config_cap() {
        let mut config = AppConfig::default();
        config.viewport.device_pixel_ratio = 3.0;
        config.viewport.pixel_ratio_cap = 1.5;
        let (scene, _) = scene(config);
        assert_eq!(scene.render_target().viewport.pixel_ratio, 1.5);
    }

    #[test]
    fn empty_resource_list_is_ready_at_start() {
        let (scene, _) = scene(AppConfig::default());
        scene.start();
        let loading = scene.loading();
        assert!(loading.ready);
        assert_eq!(loading.percent, 100);
    }

    #[test]
    fn missing_resource_still_reaches_ready() {
        let mut config = AppConfig::default();
        config.resources = vec![ResourceSpec::new("matcap", "/definitely/not/here/matcap.png")];
        let (scene, _) = scene(config);
        scene.start();

        let loading = scene.loading();
        assert!(loading.ready);
        assert_eq!(loading.failed, 1);
        assert_eq!(loading.percent, 0);
    }

    #[test]
    fn destroy_detaches_clock_and_viewport() {
        let (mut scene, start) = scene(AppConfig::default());
        scene.destroy();

        assert!(scene.time.events().is_empty());
        assert!(scene.sizes.events().is_empty());
        assert!(!scene.time.is_running());

        scene.tick(start + Duration::from_millis(16));
        assert_eq!(scene.render_target().frames, 0);
        assert_eq!(scene.camera().angle, 0.0);
    }

    #[test]
    fn listener_counts_follow_wiring_and_destroy() {
        let (mut scene, _) = scene(AppConfig::default());
        assert_eq!(
            scene.listener_counts(),
            vec![("tick", 2), ("resize", 2), ("progress", 1), ("ready", 1)]
        );

        scene.destroy();
        assert_eq!(
            scene.view(Vec::new()).listeners,
            vec![("tick", 0), ("resize", 0), ("progress", 1), ("ready", 1)]
        );
    }

    #[test]
    fn debug_toggle_starts_from_config() {
        let mut config = AppConfig::default();
        config.debug = true;
        let (mut scene, _) = scene(config);
        assert!(scene.debug());
        scene.toggle_debug();
        assert!(!scene.debug());
    }

    #[test]
    fn view_reflects_scene_state() {
        let (mut scene, start) = scene(AppConfig::default());
        scene.tick(start + Duration::from_millis(16));
        let view = scene.view(Vec::new());
        assert_eq!(view.frame, 1);
        assert_eq!(view.clear_color, Color::Rgb(0x08, 0x00, 0x1f));
        assert_eq!(view.viewport.width, 80);
        assert_eq!(view.orbit_angle, scene.camera().angle);
    }

    #[test]
    fn viewport_from_rejects_partial_payloads() {
        assert!(viewport_from(&serde_json::json!({ "width": 1 })).is_none());
        assert_eq!(
            viewport_from(&serde_json::json!({ "width": 2, "height": 1, "pixel_ratio": 1.0 })),
            Some(Viewport {
                width: 2,
                height: 1,
                pixel_ratio: 1.0
            })
        );
    }
}
