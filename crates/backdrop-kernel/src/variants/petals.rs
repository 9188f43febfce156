//! Falling cherry blossom petals.

use std::f32::consts::TAU;

use backdrop_common::Color;
use glam::Vec2;

use crate::canvas::{DrawContext, PathCommand};
use crate::particle::Particle;
use crate::rules::{Fate, ParticleRules, SpawnContext, SpawnMode, UpdateContext};
use crate::theme::ThemeKey;

/// How quickly a burst petal settles back into its fall.
const SETTLE_RATE: f32 = 0.04;

/// Falling petal rules.
#[derive(Debug, Clone)]
pub struct Petals {
    /// Petal color before opacity.
    pub color: Color,
    /// Horizontal sway amplitude in pixels per frame.
    pub sway: f32,
}

impl Default for Petals {
    fn default() -> Self {
        Self {
            color: Color::hsl(335.0, 80.0, 85.0),
            sway: 0.5,
        }
    }
}

impl Petals {
    /// Petals with default palette.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn fall_velocity(size: f32) -> Vec2 {
        Vec2::new(0.0, 0.4 + size * 0.1)
    }

    fn petal(&self, ctx: &mut SpawnContext<'_>, position: Vec2) -> Particle {
        let size = ctx.range(4.0, 8.0);
        let rotation = ctx.random() * TAU;
        let spin = ctx.range(-0.02, 0.02);
        let phase = ctx.random() * TAU;
        let opacity = ctx.range(0.6, 1.0);
        let drift = ctx.range(-0.25, 0.25);
        Particle::at(position)
            .with_size(size)
            .with_velocity(Self::fall_velocity(size) + Vec2::new(drift, 0.0))
            .with_rotation(rotation, spin)
            .with_phase(phase)
            .with_opacity(opacity)
            .with_color(self.color)
    }

    /// Teardrop outline centred on the origin.
    #[must_use]
    pub fn outline(size: f32) -> [PathCommand; 4] {
        [
            PathCommand::MoveTo(Vec2::new(0.0, -size)),
            PathCommand::QuadTo(Vec2::new(size, -size * 0.5), Vec2::new(0.0, size)),
            PathCommand::QuadTo(Vec2::new(-size, -size * 0.5), Vec2::new(0.0, -size)),
            PathCommand::Close,
        ]
    }
}

impl ParticleRules for Petals {
    fn spawn(&self, ctx: &mut SpawnContext<'_>) -> Particle {
        let position = match ctx.mode {
            SpawnMode::Respawn => Vec2::new(ctx.random() * ctx.size.width, -10.0),
            SpawnMode::Initial | SpawnMode::Burst => ctx.random_position(),
        };
        self.petal(ctx, position)
    }

    fn spawn_burst(&self, ctx: &mut SpawnContext<'_>) -> Particle {
        let center = ctx.size.center();
        let angle = ctx.random() * TAU;
        let speed = ctx.range(2.0, 5.0);
        let mut petal = self.petal(ctx, center);
        petal.velocity = Vec2::from_angle(angle) * speed;
        petal
    }

    fn update(&self, petal: &mut Particle, ctx: &mut UpdateContext<'_>) -> Fate {
        let target = Self::fall_velocity(petal.size);
        petal.velocity = petal.velocity.lerp(Vec2::new(petal.velocity.x * 0.98, target.y), SETTLE_RATE);
        petal.step();
        petal.position.x += (ctx.clock.elapsed * 1.5 + petal.phase).sin() * self.sway;

        let margin = petal.size * 2.0 + 10.0;
        let gone = petal.position.y > ctx.size.height + margin
            || petal.position.y < -ctx.size.height
            || petal.position.x < -margin
            || petal.position.x > ctx.size.width + margin;
        if gone {
            Fate::Respawn
        } else {
            Fate::Alive
        }
    }

    fn draw(&self, petal: &Particle, _theme: &ThemeKey, ctx: &mut dyn DrawContext) {
        ctx.translate(petal.position);
        ctx.rotate(petal.rotation);
        ctx.fill_path(&Self::outline(petal.size), petal.tint());
    }
}
