use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::capture::{DEFAULT_CAPTURE_FPS, DEFAULT_OUTPUT};
use crate::encode::ffmpeg::EncoderOptions;
use crate::render::color::Rgba8;
use crate::visual::{Resolution, VisualizerSettings};

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub visual: VisualConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub display: DisplayConfig,
}

#[derive(Debug, Deserialize)]
pub struct VisualConfig {
    /// Style key, or `all`.
    #[serde(default = "default_style")]
    pub style: String,
    #[serde(default = "default_primary")]
    pub primary_color: Rgba8,
    #[serde(default = "default_background")]
    pub background_color: Rgba8,
    #[serde(default = "default_line_width")]
    pub line_width: f32,
    #[serde(default = "default_particle_speed")]
    pub particle_speed: f32,
    #[serde(default)]
    pub palette: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_output")]
    pub path: PathBuf,
    #[serde(default)]
    pub resolution: Resolution,
    #[serde(default = "default_fps")]
    pub fps: u32,
    #[serde(default = "default_codec")]
    pub codec: String,
    #[serde(default = "default_audio_codec")]
    pub audio_codec: String,
    #[serde(default = "default_crf")]
    pub crf: u32,
    #[serde(default = "default_pix_fmt")]
    pub pix_fmt: String,
}

#[derive(Debug, Deserialize)]
pub struct DisplayConfig {
    #[serde(default = "default_display_width")]
    pub width: f32,
    #[serde(default = "default_display_height")]
    pub height: f32,
    #[serde(default = "default_dpr")]
    pub device_pixel_ratio: f32,
    #[serde(default = "default_refresh_hz")]
    pub refresh_hz: u32,
}

impl Default for VisualConfig {
    fn default() -> Self {
        Self {
            style: default_style(),
            primary_color: default_primary(),
            background_color: default_background(),
            line_width: default_line_width(),
            particle_speed: default_particle_speed(),
            palette: None,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            path: default_output(),
            resolution: Resolution::default(),
            fps: default_fps(),
            codec: default_codec(),
            audio_codec: default_audio_codec(),
            crf: default_crf(),
            pix_fmt: default_pix_fmt(),
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            width: default_display_width(),
            height: default_display_height(),
            device_pixel_ratio: default_dpr(),
            refresh_hz: default_refresh_hz(),
        }
    }
}

fn default_style() -> String { "bars".into() }
fn default_primary() -> Rgba8 { VisualizerSettings::default().primary_color }
fn default_background() -> Rgba8 { VisualizerSettings::default().background_color }
fn default_line_width() -> f32 { 2.0 }
fn default_particle_speed() -> f32 { 1.0 }
fn default_output() -> PathBuf { PathBuf::from(DEFAULT_OUTPUT) }
fn default_fps() -> u32 { DEFAULT_CAPTURE_FPS }
fn default_codec() -> String { EncoderOptions::default().codec }
fn default_audio_codec() -> String { EncoderOptions::default().audio_codec }
fn default_crf() -> u32 { EncoderOptions::default().crf }
fn default_pix_fmt() -> String { EncoderOptions::default().pix_fmt }
fn default_display_width() -> f32 { 960.0 }
fn default_display_height() -> f32 { 540.0 }
fn default_dpr() -> f32 { 1.0 }
fn default_refresh_hz() -> u32 { 60 }

/// Reads a TOML config. Unreadable or malformed files are logged and
/// ignored.
pub fn load_config(path: &Path) -> Option<Config> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            log::warn!("Could not read config {}: {}", path.display(), e);
            return None;
        }
    };
    match toml::from_str(&content) {
        Ok(cfg) => Some(cfg),
        Err(e) => {
            log::warn!("Ignoring malformed config {}: {}", path.display(), e);
            None
        }
    }
}

/// Explicit path first, then `./chromaviz.toml`, then the per-user config.
pub fn discover(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    let local = PathBuf::from("chromaviz.toml");
    if local.exists() {
        return Some(local);
    }
    if let Some(home) = dirs::home_dir() {
        let xdg = home.join(".config").join("chromaviz").join("config.toml");
        if xdg.exists() {
            return Some(xdg);
        }
    }
    if let Some(config_dir) = dirs::config_dir() {
        let platform = config_dir.join("chromaviz").join("config.toml");
        if platform.exists() {
            return Some(platform);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let cfg: Config = toml::from_str("").unwrap();
        assert_eq!(cfg.visual.style, "bars");
        assert_eq!(cfg.visual.primary_color.to_string(), "#E040FB");
        assert_eq!(cfg.output.path, PathBuf::from("audio-visualization.webm"));
        assert_eq!(cfg.output.resolution, Resolution::Hd1080);
        assert_eq!(cfg.output.codec, "libvpx-vp9");
        assert_eq!(cfg.display.refresh_hz, 60);
    }

    #[test]
    fn sections_override_individual_fields() {
        let cfg: Config = toml::from_str(
            r##"
            [visual]
            style = "galaxy"
            background_color = "#101010"

            [output]
            resolution = "2160p"
            crf = 20

            [display]
            device_pixel_ratio = 2.0
            "##,
        )
        .unwrap();
        assert_eq!(cfg.visual.style, "galaxy");
        assert_eq!(cfg.visual.background_color, Rgba8::opaque(0x10, 0x10, 0x10));
        assert_eq!(cfg.visual.line_width, 2.0);
        assert_eq!(cfg.output.resolution, Resolution::Uhd2160);
        assert_eq!(cfg.output.crf, 20);
        assert_eq!(cfg.output.fps, 30);
        assert_eq!(cfg.display.device_pixel_ratio, 2.0);
        assert_eq!(cfg.display.width, 960.0);
    }

    #[test]
    fn bad_color_rejects_the_file() {
        assert!(toml::from_str::<Config>("[visual]\nprimary_color = \"purple\"").is_err());
    }

    #[test]
    fn explicit_path_wins_discovery() {
        let path = PathBuf::from("/somewhere/custom.toml");
        assert_eq!(discover(Some(&path)), Some(path));
    }

    #[test]
    fn missing_file_loads_nothing() {
        assert!(load_config(Path::new("/definitely/not/here.toml")).is_none());
    }
}
