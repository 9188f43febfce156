//! Glowing embers that pulse in place.

use backdrop_common::Color;

use crate::canvas::DrawContext;
use crate::particle::Particle;
use crate::rules::{Fate, ParticleRules, SpawnContext, UpdateContext};
use crate::theme::ThemeKey;

/// Lowest opacity an ember fades to.
pub const MIN_GLOW: f32 = 0.1;

/// Ember rules.
#[derive(Debug, Clone, Copy)]
pub struct Embers {
    /// Ember color before opacity.
    pub color: Color,
}

impl Default for Embers {
    fn default() -> Self {
        Self {
            color: Color::hsl(32.0, 100.0, 50.0),
        }
    }
}

impl ParticleRules for Embers {
    fn spawn(&self, ctx: &mut SpawnContext<'_>) -> Particle {
        let position = ctx.random_position();
        let size = (ctx.random() * 2.0).max(0.1);
        let opacity = ctx.random();
        let speed = ctx.range(0.002, 0.004);
        Particle::at(position)
            .with_size(size)
            .with_opacity(opacity)
            .with_phase(speed)
            .with_color(self.color)
    }

    fn update(&self, ember: &mut Particle, ctx: &mut UpdateContext<'_>) -> Fate {
        let pulse = (ctx.clock.elapsed_ms() * f64::from(ember.phase)).sin() as f32;
        ember.opacity = (ember.opacity + pulse * 0.01).clamp(MIN_GLOW, 1.0);
        Fate::Alive
    }

    fn draw(&self, ember: &Particle, _theme: &ThemeKey, ctx: &mut dyn DrawContext) {
        ctx.fill_circle(ember.position, ember.size, self.color.with_alpha(ember.opacity * 0.3));
    }
}
