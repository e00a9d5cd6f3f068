use crate::render::surface::Surface;

use super::particles::ParticlePool;
use super::styles::{self, StyleState};
use super::{Viewport, VisualStyle, VisualizerSettings};

/// Owns the cross-tick style state and the randomness that feeds it.
///
/// Physics is stepped by [`StyleEngine::advance`], once per tick; painting
/// via [`StyleEngine::paint`] only reads the state, so any number of surfaces
/// can be painted from the same generation of particles.
pub struct StyleEngine {
    active: Option<VisualStyle>,
    state: StyleState,
    rng: fastrand::Rng,
}

impl Default for StyleEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl StyleEngine {
    pub fn new() -> Self {
        Self::with_rng(fastrand::Rng::new())
    }

    /// Deterministic engine, for tests and reproducible exports.
    pub fn with_seed(seed: u64) -> Self {
        Self::with_rng(fastrand::Rng::with_seed(seed))
    }

    fn with_rng(rng: fastrand::Rng) -> Self {
        Self { active: None, state: StyleState::default(), rng }
    }

    pub fn active_style(&self) -> Option<VisualStyle> {
        self.active
    }

    pub fn particles(&self) -> &ParticlePool {
        &self.state.pool
    }

    pub fn state(&self) -> &StyleState {
        &self.state
    }

    /// Switches the active style. Any change empties the particle pool and
    /// rewinds the grid before the next paint. Returns whether it changed.
    pub fn select_style(&mut self, style: VisualStyle) -> bool {
        if self.active == Some(style) {
            return false;
        }
        if let Some(previous) = self.active {
            log::debug!(
                "Style {} -> {}: dropping {} particles",
                previous,
                style,
                self.state.pool.len()
            );
        }
        self.state.reset();
        self.active = Some(style);
        true
    }

    /// Steps the active style's simulation by one tick. Particle motion is
    /// measured against the capture resolution, so bursts stay round on the
    /// recorded video. A panic in the step drops the style's state.
    pub fn advance(&mut self, bins: &[u8], settings: &VisualizerSettings) {
        self.select_style(settings.style);
        let (width, height) = settings.resolution.dimensions();
        let field = Viewport::new(width, height);
        let state = &mut self.state;
        let rng = &mut self.rng;
        let stepped = styles::guarded(settings.style, "physics", || match settings.style {
            VisualStyle::Particles => state.pool.step_fountain(
                bins,
                settings.primary_color,
                settings.particle_speed,
                field,
                rng,
            ),
            VisualStyle::Galaxy => state.pool.step_galaxy(
                bins,
                settings.primary_color,
                settings.particle_speed,
                field,
                rng,
            ),
            VisualStyle::Grid => {
                state.grid_offset = styles::advance_grid_offset(state.grid_offset, bins);
            }
            VisualStyle::Bars | VisualStyle::Wave | VisualStyle::Circle | VisualStyle::DualBars => {}
        });
        if stepped.is_none() {
            self.state.reset();
        }
    }

    pub fn paint(&self, surface: &mut Surface, bins: &[u8], settings: &VisualizerSettings) {
        styles::render(surface, bins, settings, &self.state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(style: VisualStyle) -> VisualizerSettings {
        VisualizerSettings { style, ..Default::default() }
    }

    #[test]
    fn switching_style_empties_the_pool() {
        let mut engine = StyleEngine::with_seed(42);
        let loud = [255u8; 256];
        for _ in 0..200 {
            engine.advance(&loud, &settings(VisualStyle::Particles));
        }
        assert!(!engine.particles().is_empty());

        assert!(engine.select_style(VisualStyle::Galaxy));
        assert!(engine.particles().is_empty());
        assert!(!engine.select_style(VisualStyle::Galaxy));
    }

    #[test]
    fn advance_switches_style_from_settings() {
        let mut engine = StyleEngine::with_seed(1);
        let loud = [255u8; 256];
        for _ in 0..100 {
            engine.advance(&loud, &settings(VisualStyle::Particles));
        }
        engine.advance(&[0; 256], &settings(VisualStyle::Bars));
        assert_eq!(engine.active_style(), Some(VisualStyle::Bars));
        assert!(engine.particles().is_empty());
    }

    #[test]
    fn grid_offset_survives_across_ticks() {
        let mut engine = StyleEngine::with_seed(1);
        let s = settings(VisualStyle::Grid);
        engine.advance(&[255; 256], &s);
        engine.advance(&[255; 256], &s);
        assert!((engine.state().grid_offset - 10.0).abs() < 1e-4);
    }

    #[test]
    fn seeded_engines_agree() {
        let mut a = StyleEngine::with_seed(9);
        let mut b = StyleEngine::with_seed(9);
        let s = settings(VisualStyle::Particles);
        for _ in 0..50 {
            a.advance(&[200; 256], &s);
            b.advance(&[200; 256], &s);
        }
        let pa: Vec<_> = a.particles().iter().cloned().collect();
        let pb: Vec<_> = b.particles().iter().cloned().collect();
        assert_eq!(pa, pb);
    }

    #[test]
    fn paint_does_not_step_physics() {
        let mut engine = StyleEngine::with_seed(4);
        let s = settings(VisualStyle::Particles);
        for _ in 0..100 {
            engine.advance(&[255; 256], &s);
        }
        let before: Vec<_> = engine.particles().iter().cloned().collect();
        let mut surface = Surface::new(64, 36);
        engine.paint(&mut surface, &[255; 256], &s);
        engine.paint(&mut surface, &[255; 256], &s);
        let after: Vec<_> = engine.particles().iter().cloned().collect();
        assert_eq!(before, after);
    }
}
