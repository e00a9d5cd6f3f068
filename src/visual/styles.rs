use std::f32::consts::PI;
use std::panic::{self, AssertUnwindSafe};

use crate::render::canvas::{Canvas, DrawCommand, Point};
use crate::render::color::Rgba8;
use crate::render::surface::Surface;

use super::particles::{bass_level, ParticlePool};
use super::{Viewport, VisualStyle, VisualizerSettings};

const GRID_SPACING: f32 = 50.0;
const GRID_H_LINES: usize = 20;
const GRID_V_LINES: usize = 28;

/// State carried between ticks by the stateful styles.
#[derive(Clone, Debug, Default)]
pub struct StyleState {
    pub pool: ParticlePool,
    /// Scroll position of the grid's horizontal lines, in `0..GRID_SPACING`.
    pub grid_offset: f32,
}

impl StyleState {
    pub fn reset(&mut self) {
        self.pool.clear();
        self.grid_offset = 0.0;
    }
}

/// Paints background plus one style's interpretation of `bins` onto
/// `surface`. A panic while composing or rasterizing leaves a
/// background-only frame.
pub fn render(surface: &mut Surface, bins: &[u8], settings: &VisualizerSettings, state: &StyleState) {
    let viewport = Viewport::new(surface.width(), surface.height());
    let mut canvas = Canvas::new(surface);
    canvas.clear(settings.background_color);

    let drawn = guarded(settings.style, "paint", || {
        let commands = compose(bins, settings, viewport, state);
        canvas.execute_all(&commands);
    });
    if drawn.is_none() {
        canvas.clear(settings.background_color);
    }
}

/// Runs one stage of a style, turning a panic into `None` so the refresh
/// loop survives it.
pub(crate) fn guarded<T>(style: VisualStyle, stage: &str, f: impl FnOnce() -> T) -> Option<T> {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(value) => Some(value),
        Err(_) => {
            log::error!("Style '{}' failed during {}; skipping it this tick", style, stage);
            None
        }
    }
}

/// Draw commands for one frame. Pure given `state`.
pub fn compose(
    bins: &[u8],
    settings: &VisualizerSettings,
    viewport: Viewport,
    state: &StyleState,
) -> Vec<DrawCommand> {
    let color = settings.primary_color;
    let mut commands = match settings.style {
        VisualStyle::Particles | VisualStyle::Galaxy => particle_sprites(&state.pool, viewport),
        _ => Vec::new(),
    };
    // Silent frames show only what the particle pool already holds.
    if bins.is_empty() || bins.iter().all(|&b| b == 0) {
        return commands;
    }
    let stroke = settings.line_width.max(0.0) * viewport.unit();
    match settings.style {
        VisualStyle::Bars => commands.extend(bars(bins, color, viewport)),
        VisualStyle::Wave => commands.extend(wave(bins, color, stroke, viewport)),
        VisualStyle::Circle => commands.extend(circle(bins, color, stroke, viewport)),
        VisualStyle::DualBars => commands.extend(dual_bars(bins, color, viewport)),
        VisualStyle::Grid => commands.extend(grid(bins, color, state.grid_offset, viewport)),
        VisualStyle::Particles | VisualStyle::Galaxy => {}
    }
    commands
}

pub fn bars(bins: &[u8], color: Rgba8, vp: Viewport) -> Vec<DrawCommand> {
    let bar_width = vp.width / bins.len() as f32 * 2.5;
    let gutter = vp.unit();
    let mut x = 0.0;
    let mut out = Vec::with_capacity(bins.len());
    for &magnitude in bins {
        let bar_height = magnitude as f32 / 255.0 * vp.height * 0.8;
        if bar_height > 0.0 {
            out.push(DrawCommand::FillRect {
                x,
                y: vp.height - bar_height,
                width: bar_width,
                height: bar_height,
                color,
                alpha: 1.0,
            });
        }
        x += bar_width + gutter;
    }
    out
}

pub fn wave(bins: &[u8], color: Rgba8, stroke: f32, vp: Viewport) -> Vec<DrawCommand> {
    let slice = vp.width / bins.len() as f32;
    let mut points: Vec<Point> = bins
        .iter()
        .enumerate()
        .map(|(i, &m)| {
            let v = m as f32 / 255.0;
            Point::new(i as f32 * slice, v * vp.height / 2.0 + vp.height / 4.0)
        })
        .collect();
    points.push(Point::new(vp.width, vp.height / 2.0));
    vec![DrawCommand::StrokePath { points, closed: false, width: stroke, color, alpha: 1.0, glow: 0.0 }]
}

pub fn circle(bins: &[u8], color: Rgba8, stroke: f32, vp: Viewport) -> Vec<DrawCommand> {
    let cx = vp.width / 2.0;
    let cy = vp.height / 2.0;
    let radius = vp.width.min(vp.height) * 0.2;
    let len = bins.len() as f32;
    let points = bins
        .iter()
        .enumerate()
        .map(|(i, &m)| {
            let amp = m as f32 / 255.0;
            let angle = (i as f32 / len) * PI * 2.0 - PI / 2.0;
            let r = radius + amp * vp.height * 0.2;
            Point::new(cx + r * angle.cos(), cy + r * angle.sin())
        })
        .collect();
    vec![DrawCommand::StrokePath { points, closed: true, width: stroke, color, alpha: 1.0, glow: 0.0 }]
}

pub fn dual_bars(bins: &[u8], color: Rgba8, vp: Viewport) -> Vec<DrawCommand> {
    let bar_width = vp.width / bins.len() as f32;
    let center = vp.height / 2.0;
    let cap = center * 0.9;
    bins.iter()
        .enumerate()
        .filter(|&(_, &m)| m > 0)
        .map(|(i, &m)| {
            let half = (m as f32 / 255.0 * center * 0.9).min(cap);
            DrawCommand::FillRect {
                x: i as f32 * bar_width,
                y: center - half,
                width: bar_width,
                height: half * 2.0,
                color,
                alpha: 1.0,
            }
        })
        .collect()
}

fn particle_sprites(pool: &ParticlePool, vp: Viewport) -> Vec<DrawCommand> {
    let unit = vp.unit();
    pool.iter()
        .map(|p| DrawCommand::FillCircle {
            center: Point::new(p.x * vp.width, p.y * vp.height),
            radius: p.radius * unit,
            color: p.color,
            alpha: p.alpha(),
        })
        .collect()
}

/// Advances the grid's scroll position by the current bass level.
pub fn advance_grid_offset(offset: f32, bins: &[u8]) -> f32 {
    let bass = bass_level(bins) / 255.0;
    (offset + bass * 5.0) % GRID_SPACING
}

pub fn grid(bins: &[u8], color: Rgba8, offset: f32, vp: Viewport) -> Vec<DrawCommand> {
    let unit = vp.unit();
    let n = bins.len();
    let horizon = vp.height * 0.4;
    let vanishing = Point::new(vp.width / 2.0, horizon);
    let bass = bass_level(bins) / 255.0;
    let overall = bins.iter().map(|&b| b as f32).sum::<f32>() / (n as f32 * 255.0);
    let shake = (bass * 10.0 - 5.0) * unit;

    let mut out = Vec::with_capacity(GRID_H_LINES + GRID_V_LINES);
    for i in 0..GRID_H_LINES {
        let progress = (i as f32 * GRID_SPACING + offset) / (GRID_H_LINES as f32 * GRID_SPACING);
        let y = horizon + progress * progress * vp.height * 1.5;
        if y > vp.height {
            continue;
        }
        let idx = ((i as f32 / GRID_H_LINES as f32) * (n as f32 / 2.0)) as usize;
        let amp = bins[idx.min(n - 1)] as f32 / 255.0;
        out.push(DrawCommand::StrokePath {
            points: vec![Point::new(0.0, y + shake), Point::new(vp.width, y + shake)],
            closed: false,
            width: (1.0 + amp * 1.5) * unit,
            color,
            alpha: 0.1 + amp * 0.6,
            glow: (5.0 + amp * 15.0) * unit,
        });
    }

    let half = GRID_V_LINES as f32 / 2.0;
    for i in 0..GRID_V_LINES {
        let offset_from_center = i as f32 - half;
        let x = vanishing.x + offset_from_center * 25.0 * unit * (1.0 + overall * 2.0);
        let idx = ((offset_from_center.abs() / half) * n as f32 * 0.7) as usize;
        let amp = bins[idx.min(n - 1)] as f32 / 255.0;
        out.push(DrawCommand::StrokePath {
            points: vec![
                Point::new(vanishing.x, vanishing.y + shake),
                Point::new(x, vp.height + shake),
            ],
            closed: false,
            width: (0.5 + amp) * unit,
            color,
            alpha: 0.2 + amp * 0.7,
            glow: (5.0 + amp * 10.0) * unit,
        });
    }
    out
}
