//! Two-color palettes produced by a text-to-palette service.
//!
//! Only the service's answer is handled here; the request itself is someone
//! else's job. Answers sometimes arrive wrapped in a markdown code fence.

use serde::Deserialize;
use std::path::Path;

use crate::error::{Result, VisualizerError};
use crate::render::color::Rgba8;
use crate::visual::VisualizerSettings;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Palette {
    pub background: Rgba8,
    pub primary: Rgba8,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPalette {
    background_color: Option<String>,
    primary_color: Option<String>,
}

impl Palette {
    pub fn from_response(text: &str) -> Result<Self> {
        let cleaned = text.replace("```json", "").replace("```", "");
        let cleaned = cleaned.trim();
        if cleaned.is_empty() {
            return Err(VisualizerError::Palette("empty response".into()));
        }
        let raw: RawPalette = serde_json::from_str(cleaned)
            .map_err(|e| VisualizerError::Palette(format!("not valid JSON: {}", e)))?;
        match (raw.background_color, raw.primary_color) {
            (Some(bg), Some(fg)) if !bg.is_empty() && !fg.is_empty() => Ok(Self {
                background: bg.parse()?,
                primary: fg.parse()?,
            }),
            _ => Err(VisualizerError::Palette(
                "expected both backgroundColor and primaryColor".into(),
            )),
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_response(&text)
    }

    /// Overwrites the two colors. Every other setting is left alone.
    pub fn apply(&self, settings: &mut VisualizerSettings) {
        settings.background_color = self.background;
        settings.primary_color = self.primary;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_json() {
        let p = Palette::from_response(r##"{"backgroundColor":"#1A1A2E","primaryColor":"#E040FB"}"##).unwrap();
        assert_eq!(p.background, Rgba8::opaque(0x1A, 0x1A, 0x2E));
        assert_eq!(p.primary, Rgba8::opaque(0xE0, 0x40, 0xFB));
    }

    #[test]
    fn strips_markdown_fences() {
        let text = "```json\n{\"backgroundColor\": \"#000\", \"primaryColor\": \"#0f0\"}\n```";
        let p = Palette::from_response(text).unwrap();
        assert_eq!(p.background, Rgba8::opaque(0, 0, 0));
        assert_eq!(p.primary, Rgba8::opaque(0, 255, 0));
    }

    #[test]
    fn rejects_missing_fields_and_garbage() {
        assert!(matches!(
            Palette::from_response(r##"{"backgroundColor":"#000"}"##),
            Err(VisualizerError::Palette(_))
        ));
        assert!(matches!(Palette::from_response("sunset vibes"), Err(VisualizerError::Palette(_))));
        assert!(matches!(Palette::from_response("  "), Err(VisualizerError::Palette(_))));
        assert!(matches!(
            Palette::from_response(r##"{"backgroundColor":"navy","primaryColor":"#fff"}"##),
            Err(VisualizerError::InvalidColor(_))
        ));
    }

    #[test]
    fn apply_only_touches_colors() {
        let mut settings = VisualizerSettings { line_width: 5.0, ..Default::default() };
        let palette = Palette { background: Rgba8::opaque(1, 2, 3), primary: Rgba8::opaque(4, 5, 6) };
        palette.apply(&mut settings);
        assert_eq!(settings.background_color, Rgba8::opaque(1, 2, 3));
        assert_eq!(settings.primary_color, Rgba8::opaque(4, 5, 6));
        assert_eq!(settings.line_width, 5.0);
    }
}
