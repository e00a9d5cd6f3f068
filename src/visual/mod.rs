pub mod engine;
pub mod particles;
pub mod styles;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::VisualizerError;
use crate::render::color::Rgba8;

pub use engine::StyleEngine;
pub use particles::{Particle, ParticlePool};
pub use styles::{render, StyleState};

/// Size, in pixels, of the canvas the per-pixel constants were tuned on.
/// Lengths the styles express in "units" are scaled by
/// `min(width, height) / REFERENCE_EXTENT`.
pub const REFERENCE_EXTENT: f32 = 600.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VisualStyle {
    Bars,
    Wave,
    Circle,
    DualBars,
    Particles,
    Galaxy,
    Grid,
}

impl VisualStyle {
    pub const fn all() -> [Self; 7] {
        [
            Self::Bars,
            Self::Wave,
            Self::Circle,
            Self::DualBars,
            Self::Particles,
            Self::Galaxy,
            Self::Grid,
        ]
    }

    pub fn key(self) -> &'static str {
        match self {
            Self::Bars => "bars",
            Self::Wave => "wave",
            Self::Circle => "circle",
            Self::DualBars => "dual_bars",
            Self::Particles => "particles",
            Self::Galaxy => "galaxy",
            Self::Grid => "grid",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Bars => "Bars",
            Self::Wave => "Wave",
            Self::Circle => "Circle",
            Self::DualBars => "Dual Bars",
            Self::Particles => "Particles",
            Self::Galaxy => "Galaxy",
            Self::Grid => "Grid",
        }
    }

    /// Styles whose look depends on state carried between ticks.
    pub fn is_stateful(self) -> bool {
        matches!(self, Self::Particles | Self::Galaxy | Self::Grid)
    }
}

impl fmt::Display for VisualStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for VisualStyle {
    type Err = VisualizerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_ascii_lowercase().replace('-', "_");
        Self::all()
            .into_iter()
            .find(|style| style.key() == key)
            .ok_or_else(|| VisualizerError::UnknownStyle(s.to_string()))
    }
}

/// Export resolutions offered for capture.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Resolution {
    #[serde(rename = "720p")]
    Hd720,
    #[default]
    #[serde(rename = "1080p")]
    Hd1080,
    #[serde(rename = "1440p")]
    Qhd1440,
    #[serde(rename = "2160p")]
    Uhd2160,
}

impl Resolution {
    pub const fn all() -> [Self; 4] {
        [Self::Hd720, Self::Hd1080, Self::Qhd1440, Self::Uhd2160]
    }

    pub fn key(self) -> &'static str {
        match self {
            Self::Hd720 => "720p",
            Self::Hd1080 => "1080p",
            Self::Qhd1440 => "1440p",
            Self::Uhd2160 => "2160p",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Hd720 => "HD (720p)",
            Self::Hd1080 => "Full HD (1080p)",
            Self::Qhd1440 => "QHD (1440p)",
            Self::Uhd2160 => "4K (2160p)",
        }
    }

    pub fn dimensions(self) -> (u32, u32) {
        match self {
            Self::Hd720 => (1280, 720),
            Self::Hd1080 => (1920, 1080),
            Self::Qhd1440 => (2560, 1440),
            Self::Uhd2160 => (3840, 2160),
        }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for Resolution {
    type Err = VisualizerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_ascii_lowercase();
        Self::all()
            .into_iter()
            .find(|r| r.key() == key)
            .ok_or_else(|| VisualizerError::UnknownResolution(s.to_string()))
    }
}

/// Snapshot of the user-facing controls, read once per tick.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct VisualizerSettings {
    pub style: VisualStyle,
    pub primary_color: Rgba8,
    pub background_color: Rgba8,
    pub line_width: f32,
    pub particle_speed: f32,
    pub resolution: Resolution,
}

impl Default for VisualizerSettings {
    fn default() -> Self {
        Self {
            style: VisualStyle::Bars,
            primary_color: Rgba8::opaque(0xE0, 0x40, 0xFB),
            background_color: Rgba8::opaque(0x0D, 0x0D, 0x1A),
            line_width: 2.0,
            particle_speed: 1.0,
            resolution: Resolution::default(),
        }
    }
}

/// Pixel extent of the surface a style is drawing onto.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Viewport {
    pub width: f32,
    pub height: f32,
}

impl Viewport {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width: width as f32, height: height as f32 }
    }

    /// Pixels per reference unit on this surface.
    pub fn unit(&self) -> f32 {
        self.width.min(self.height) / REFERENCE_EXTENT
    }

    /// Width and height in reference units. A degenerate surface reports
    /// the reference square.
    pub fn extent(&self) -> (f32, f32) {
        let unit = self.unit();
        if unit <= 0.0 {
            return (REFERENCE_EXTENT, REFERENCE_EXTENT);
        }
        (self.width / unit, self.height / unit)
    }
}

/// Splits a track evenly across a list of styles, in order.
#[derive(Clone, Debug)]
pub struct StylePlan {
    styles: Vec<VisualStyle>,
    segment_secs: f64,
}

impl StylePlan {
    pub fn new(styles: Vec<VisualStyle>, duration_secs: f64) -> Self {
        let count = styles.len().max(1) as f64;
        Self { styles, segment_secs: duration_secs.max(0.0) / count }
    }

    pub fn styles(&self) -> &[VisualStyle] {
        &self.styles
    }

    pub fn style_at(&self, time_secs: f64) -> Option<VisualStyle> {
        let last = self.styles.len().checked_sub(1)?;
        if self.segment_secs <= 0.0 {
            return self.styles.first().copied();
        }
        let idx = ((time_secs.max(0.0) / self.segment_secs) as usize).min(last);
        Some(self.styles[idx])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn style_keys_round_trip() {
        for style in VisualStyle::all() {
            assert_eq!(style.key().parse::<VisualStyle>().unwrap(), style);
        }
        assert_eq!("Dual-Bars".parse::<VisualStyle>().unwrap(), VisualStyle::DualBars);
        assert!("sparkles".parse::<VisualStyle>().is_err());
    }

    #[test]
    fn resolution_table_matches_labels() {
        assert_eq!(Resolution::default(), Resolution::Hd1080);
        assert_eq!("2160p".parse::<Resolution>().unwrap().dimensions(), (3840, 2160));
        assert_eq!("720p".parse::<Resolution>().unwrap().dimensions(), (1280, 720));
        assert_eq!(Resolution::Qhd1440.label(), "QHD (1440p)");
        assert!("480p".parse::<Resolution>().is_err());
    }

    #[test]
    fn settings_defaults() {
        let s = VisualizerSettings::default();
        assert_eq!(s.style, VisualStyle::Bars);
        assert_eq!(s.primary_color.to_string(), "#E040FB");
        assert_eq!(s.background_color.to_string(), "#0D0D1A");
        assert_eq!(s.line_width, 2.0);
        assert_eq!(s.particle_speed, 1.0);
        assert_eq!(s.resolution, Resolution::Hd1080);
    }

    #[test]
    fn settings_deserialize_from_json() {
        let s: VisualizerSettings = serde_json::from_str(
            r##"{"style":"dual_bars","primary_color":"#00FF00","background_color":"#000",
                "line_width":3.0,"particle_speed":2.0,"resolution":"1440p"}"##,
        )
        .unwrap();
        assert_eq!(s.style, VisualStyle::DualBars);
        assert_eq!(s.primary_color, Rgba8::opaque(0, 255, 0));
        assert_eq!(s.resolution, Resolution::Qhd1440);
    }

    #[test]
    fn unit_scales_with_shorter_side() {
        assert_eq!(Viewport::new(1200, 600).unit(), 1.0);
        assert_eq!(Viewport::new(2400, 1200).unit(), 2.0);
    }

    #[test]
    fn extent_keeps_the_shorter_side_at_reference() {
        assert_eq!(Viewport::new(1200, 600).extent(), (1200.0, 600.0));
        assert_eq!(Viewport::new(300, 600).extent(), (600.0, 1200.0));
        assert_eq!(Viewport::new(0, 0).extent(), (REFERENCE_EXTENT, REFERENCE_EXTENT));
    }

    #[test]
    fn style_plan_splits_evenly() {
        let plan = StylePlan::new(vec![VisualStyle::Bars, VisualStyle::Wave, VisualStyle::Grid], 30.0);
        assert_eq!(plan.style_at(0.0), Some(VisualStyle::Bars));
        assert_eq!(plan.style_at(10.5), Some(VisualStyle::Wave));
        assert_eq!(plan.style_at(29.9), Some(VisualStyle::Grid));
        assert_eq!(plan.style_at(99.0), Some(VisualStyle::Grid));
        assert_eq!(StylePlan::new(Vec::new(), 10.0).style_at(1.0), None);
    }
}
