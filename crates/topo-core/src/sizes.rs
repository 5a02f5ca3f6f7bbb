use serde_json::{json, Value};

use crate::bus::EventBus;
use crate::emitter::Emitter;

/// Device pixel ratios above this are clamped; beyond 2x the extra fill cost
/// is not visible.
pub const DEFAULT_PIXEL_RATIO_CAP: f64 = 2.0;

/// Render target dimensions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
    pub pixel_ratio: f64,
}

impl Viewport {
    /// Width over height, or `0.0` for a collapsed viewport.
    pub fn aspect(&self) -> f64 {
        if self.height == 0 {
            0.0
        } else {
            f64::from(self.width) / f64::from(self.height)
        }
    }

    pub fn to_value(&self) -> Value {
        json!({
            "width": self.width,
            "height": self.height,
            "pixel_ratio": self.pixel_ratio,
        })
    }
}

/// Viewport tracker.
///
/// The host forwards window or terminal resizes to [`resize`](Sizes::resize);
/// every call triggers `"resize"` with the new [`Viewport`] as its only
/// argument, even when the size did not change.
#[derive(Debug)]
pub struct Sizes {
    events: EventBus,
    viewport: Viewport,
    device_pixel_ratio: f64,
    pixel_ratio_cap: f64,
}

impl Sizes {
    pub fn new(width: u32, height: u32, device_pixel_ratio: f64) -> Self {
        let mut sizes = Self {
            events: EventBus::new(),
            viewport: Viewport {
                width,
                height,
                pixel_ratio: 1.0,
            },
            device_pixel_ratio,
            pixel_ratio_cap: DEFAULT_PIXEL_RATIO_CAP,
        };
        sizes.viewport.pixel_ratio = sizes.effective_ratio();
        sizes
    }

    pub fn with_pixel_ratio_cap(mut self, cap: f64) -> Self {
        self.pixel_ratio_cap = cap;
        self.viewport.pixel_ratio = self.effective_ratio();
        self
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    /// Update the dimensions and trigger `"resize"`.
    pub fn resize(&mut self, width: u32, height: u32) -> Option<Value> {
        self.viewport.width = width;
        self.viewport.height = height;
        self.viewport.pixel_ratio = self.effective_ratio();
        tracing::debug!(width, height, "viewport resized");
        self.notify()
    }

    /// Update the device pixel ratio (e.g. moving between displays) and
    /// trigger `"resize"`.
    pub fn set_device_pixel_ratio(&mut self, ratio: f64) -> Option<Value> {
        self.device_pixel_ratio = ratio;
        self.viewport.pixel_ratio = self.effective_ratio();
        self.notify()
    }

    fn effective_ratio(&self) -> f64 {
        let ratio = if self.device_pixel_ratio.is_finite() && self.device_pixel_ratio > 0.0 {
            self.device_pixel_ratio
        } else {
            1.0
        };
        ratio.min(self.pixel_ratio_cap)
    }

    fn notify(&self) -> Option<Value> {
        self.events
            .trigger("resize", &[self.viewport.to_value()])
            .ok()
            .flatten()
    }
}

impl Emitter for Sizes {
    fn events(&self) -> &EventBus {
        &self.events
    }
}
