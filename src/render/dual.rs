use crate::visual::{StyleEngine, VisualizerSettings};

use super::surface::Surface;

/// The on-screen container the display surface fills.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DisplayViewport {
    pub css_width: f32,
    pub css_height: f32,
    pub device_pixel_ratio: f32,
}

impl DisplayViewport {
    pub fn new(css_width: f32, css_height: f32, device_pixel_ratio: f32) -> Self {
        Self { css_width, css_height, device_pixel_ratio }
    }

    /// Backing-buffer size in device pixels. A missing or nonsensical ratio
    /// counts as 1.
    pub fn pixel_size(&self) -> (u32, u32) {
        let dpr = if self.device_pixel_ratio.is_finite() && self.device_pixel_ratio > 0.0 {
            self.device_pixel_ratio
        } else {
            1.0
        };
        let scale = |css: f32| {
            if css.is_finite() {
                (css * dpr).floor().max(0.0) as u32
            } else {
                0
            }
        };
        (scale(self.css_width), scale(self.css_height))
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TickReport {
    pub display_resized: bool,
    pub capture_resized: bool,
    /// Live particles after this tick's physics step.
    pub particles: usize,
}

/// Paints every tick twice: once for the on-screen display surface, once for
/// the fixed-resolution capture surface, from one shared engine state.
pub struct DualSurfaceRenderer {
    display: Surface,
    capture: Surface,
    viewport: DisplayViewport,
    engine: StyleEngine,
    ticks: u64,
}

impl DualSurfaceRenderer {
    pub fn new(viewport: DisplayViewport, engine: StyleEngine) -> Self {
        Self {
            display: Surface::new(0, 0),
            capture: Surface::new(0, 0),
            viewport,
            engine,
            ticks: 0,
        }
    }

    pub fn display(&self) -> &Surface {
        &self.display
    }

    pub fn capture(&self) -> &Surface {
        &self.capture
    }

    pub fn engine(&self) -> &StyleEngine {
        &self.engine
    }

    pub fn viewport(&self) -> DisplayViewport {
        self.viewport
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Records a new container size. The display buffer follows on the next
    /// tick; the capture surface is unaffected.
    pub fn set_viewport(&mut self, viewport: DisplayViewport) {
        self.viewport = viewport;
    }

    /// Applies a settings change immediately: a new style clears the shared
    /// particle pool, a new resolution reallocates the capture surface.
    /// Returns whether the capture surface was reallocated.
    pub fn apply_settings(&mut self, settings: &VisualizerSettings) -> bool {
        self.engine.select_style(settings.style);
        let (w, h) = settings.resolution.dimensions();
        self.capture.resize_if_needed(w, h)
    }

    /// Runs one tick: a single physics step, then display paint, then
    /// capture paint, both from the same bins, settings and particle pool.
    pub fn tick(&mut self, bins: &[u8], settings: &VisualizerSettings) -> TickReport {
        self.engine.advance(bins, settings);

        let (dw, dh) = self.viewport.pixel_size();
        let display_resized = self.display.resize_if_needed(dw, dh);
        self.engine.paint(&mut self.display, bins, settings);

        let (cw, ch) = settings.resolution.dimensions();
        let capture_resized = self.capture.resize_if_needed(cw, ch);
        self.engine.paint(&mut self.capture, bins, settings);

        self.ticks += 1;
        TickReport {
            display_resized,
            capture_resized,
            particles: self.engine.particles().len(),
        }
    }
}
