//! Drifting leaves.

use std::f32::consts::FRAC_PI_4;

use backdrop_common::Color;
use glam::Vec2;

use crate::canvas::DrawContext;
use crate::particle::{wrap_torus, Particle};
use crate::rules::{Fate, ParticleRules, SpawnContext, UpdateContext};
use crate::theme::ThemeKey;

/// Leaf rules. Every leaf follows the same clock-driven circular drift at
/// its own speed.
#[derive(Debug, Clone, Copy)]
pub struct Leaves {
    /// Leaf color before opacity.
    pub color: Color,
}

impl Default for Leaves {
    fn default() -> Self {
        Self {
            color: Color::hsl(120.0, 40.0, 50.0),
        }
    }
}

impl ParticleRules for Leaves {
    fn spawn(&self, ctx: &mut SpawnContext<'_>) -> Particle {
        let position = ctx.random_position();
        let size = ctx.range(1.0, 4.0);
        let opacity = ctx.random();
        let speed = ctx.range(0.2, 0.7);
        Particle::at(position)
            .with_size(size)
            .with_opacity(opacity)
            .with_phase(speed)
            .with_color(self.color)
    }

    fn update(&self, leaf: &mut Particle, ctx: &mut UpdateContext<'_>) -> Fate {
        let t = ctx.clock.elapsed;
        let speed = leaf.phase;
        leaf.position += Vec2::new(t.cos(), t.sin()) * speed;
        leaf.opacity = t.sin() * 0.5 + 0.5;
        leaf.position = wrap_torus(leaf.position, ctx.size);
        Fate::Alive
    }

    fn draw(&self, leaf: &Particle, _theme: &ThemeKey, ctx: &mut dyn DrawContext) {
        ctx.fill_ellipse(
            leaf.position,
            Vec2::new(leaf.size * 2.0, leaf.size),
            FRAC_PI_4,
            self.color.with_alpha(leaf.opacity * 0.3),
        );
    }
}
