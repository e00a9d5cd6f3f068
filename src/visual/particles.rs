//! Particle physics for the `particles` and `galaxy` styles.
//!
//! Positions live in normalized surface coordinates (0.0-1.0 on both axes)
//! so one pool can be painted onto surfaces of any size. Radii and
//! velocities are in reference units (see [`super::REFERENCE_EXTENT`]).
//! Each step takes the `field` the motion is measured against: a velocity
//! unit moves the same number of pixels on both axes of any surface with
//! the field's aspect ratio.

use crate::render::color::Rgba8;

use super::Viewport;

/// Live-particle cap for the `particles` style.
pub const FOUNTAIN_CAP: usize = 100;
/// Safety cap for `galaxy`, which otherwise relies on decay alone.
pub const GALAXY_CAP: usize = 600;

const FOUNTAIN_GRAVITY: f32 = 0.05;
const FOUNTAIN_RADIUS_DECAY: f32 = 0.99;
const FOUNTAIN_MIN_RADIUS: f32 = 0.5;

/// Mean of the lowest eighth of the bins must exceed this to trigger a burst.
pub const GALAXY_BASS_THRESHOLD: f32 = 200.0;
const GALAXY_BURST_CHANCE: f32 = 0.35;
const GALAXY_LIFE_DECAY: f32 = 0.01;

#[derive(Clone, Debug, PartialEq)]
pub struct Particle {
    pub x: f32,
    pub y: f32,
    pub radius: f32,
    pub color: Rgba8,
    pub vx: f32,
    pub vy: f32,
    /// Remaining life in 0.0-1.0; `None` for particles that fade by shrinking.
    pub life: Option<f32>,
}

impl Particle {
    /// Paint opacity: remaining life when tracked, otherwise fully opaque.
    pub fn alpha(&self) -> f32 {
        self.life.map_or(1.0, |l| l.clamp(0.0, 1.0))
    }
}

/// Unordered set of live particles. Nothing holds indices into it.
#[derive(Clone, Debug, Default)]
pub struct ParticlePool {
    particles: Vec<Particle>,
}

impl ParticlePool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.particles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Particle> {
        self.particles.iter()
    }

    pub fn clear(&mut self) {
        self.particles.clear();
    }

    pub fn push(&mut self, particle: Particle) {
        self.particles.push(particle);
    }

    /// One tick of the rising-fountain style: maybe spawn one particle at the
    /// bottom edge, then move everything under gravity and cull.
    pub fn step_fountain(
        &mut self,
        bins: &[u8],
        color: Rgba8,
        speed: f32,
        field: Viewport,
        rng: &mut fastrand::Rng,
    ) {
        let intensity = fountain_intensity(bins);
        if self.particles.len() < FOUNTAIN_CAP && rng.f32() < 0.5 * intensity {
            self.particles.push(Particle {
                x: rng.f32(),
                y: 1.0,
                radius: 2.0 + rng.f32() * 3.0,
                color,
                vx: (rng.f32() - 0.5) * 2.0,
                vy: -(rng.f32() * 2.0 + 1.0) * (1.0 + intensity * speed),
                life: None,
            });
        }

        let (span_x, span_y) = field.extent();
        self.particles.retain_mut(|p| {
            p.x += p.vx / span_x;
            p.y += p.vy / span_y;
            p.vy += FOUNTAIN_GRAVITY;
            p.radius *= FOUNTAIN_RADIUS_DECAY;

            let gone = p.y + p.radius / span_y < 0.0
                || p.x < -p.radius / span_x
                || p.x > 1.0 + p.radius / span_x
                || p.radius < FOUNTAIN_MIN_RADIUS;
            !gone
        });
    }

    /// One tick of the galaxy style: a loud bass hit may burst particles out
    /// of the center; everything drifts ballistically and fades.
    pub fn step_galaxy(
        &mut self,
        bins: &[u8],
        color: Rgba8,
        speed: f32,
        field: Viewport,
        rng: &mut fastrand::Rng,
    ) {
        let bass = bass_level(bins);
        if bass > GALAXY_BASS_THRESHOLD && rng.f32() < GALAXY_BURST_CHANCE {
            let excess = (bass - GALAXY_BASS_THRESHOLD) / (255.0 - GALAXY_BASS_THRESHOLD);
            let burst_speed = (1.0 + excess * 4.0) * speed.max(0.0);
            let wanted = rng.usize(20..=40);
            let room = GALAXY_CAP.saturating_sub(self.particles.len());
            for _ in 0..wanted.min(room) {
                let angle = rng.f32() * std::f32::consts::TAU;
                let v = (0.5 + rng.f32() * 1.5) * burst_speed;
                self.particles.push(Particle {
                    x: 0.5,
                    y: 0.5,
                    radius: 1.0 + rng.f32() * 2.0,
                    color,
                    vx: angle.cos() * v,
                    vy: angle.sin() * v,
                    life: Some(1.0),
                });
            }
        }

        let (span_x, span_y) = field.extent();
        self.particles.retain_mut(|p| {
            p.x += p.vx / span_x;
            p.y += p.vy / span_y;
            let life = p.life.unwrap_or(1.0) - GALAXY_LIFE_DECAY;
            p.life = Some(life);
            life > 0.0
        });
    }
}

/// `(mean / 128)^2`: quiet passages stay calm, loud ones spawn freely.
pub fn fountain_intensity(bins: &[u8]) -> f32 {
    if bins.is_empty() {
        return 0.0;
    }
    let mean = bins.iter().map(|&b| b as f32).sum::<f32>() / bins.len() as f32;
    (mean / 128.0).powi(2)
}

/// Mean raw magnitude (0-255) of the lowest eighth of the bins.
pub fn bass_level(bins: &[u8]) -> f32 {
    let n = (bins.len() / 8).max(1).min(bins.len());
    if n == 0 {
        return 0.0;
    }
    bins[..n].iter().map(|&b| b as f32).sum::<f32>() / n as f32
}
