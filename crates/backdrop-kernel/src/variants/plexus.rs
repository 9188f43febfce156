//! Bouncing particles joined to every close neighbour.

use backdrop_common::Color;
use glam::Vec2;

use crate::canvas::DrawContext;
use crate::particle::{reflect_edges, Particle};
use crate::rules::{Fate, ParticleRules, SpawnContext, UpdateContext};
use crate::theme::ThemeKey;

/// Particles closer than this are joined.
pub const LINK_DISTANCE: f32 = 100.0;

/// Plexus rules.
#[derive(Debug, Clone, Copy)]
pub struct Plexus {
    /// Particle and line color.
    pub color: Color,
    /// Particle opacity.
    pub node_alpha: f32,
}

impl Default for Plexus {
    fn default() -> Self {
        Self {
            color: Color::hsl(221.0, 83.0, 53.0),
            node_alpha: 0.2,
        }
    }
}

impl ParticleRules for Plexus {
    fn spawn(&self, ctx: &mut SpawnContext<'_>) -> Particle {
        let position = ctx.random_position();
        let velocity = Vec2::new(ctx.range(-0.4, 0.4), ctx.range(-0.4, 0.4));
        let radius = ctx.range(1.0, 4.0);
        Particle::at(position)
            .with_velocity(velocity)
            .with_size(radius)
            .with_opacity(self.node_alpha)
            .with_color(self.color)
    }

    fn update(&self, p: &mut Particle, ctx: &mut UpdateContext<'_>) -> Fate {
        p.step();
        reflect_edges(p, ctx.size);
        Fate::Alive
    }

    fn draw(&self, p: &Particle, _theme: &ThemeKey, ctx: &mut dyn DrawContext) {
        ctx.fill_circle(p.position, p.size, p.tint());
    }

    fn draw_overlay(&self, batch: &[Particle], _theme: &ThemeKey, ctx: &mut dyn DrawContext) {
        for (i, a) in batch.iter().enumerate() {
            for b in &batch[i + 1..] {
                let distance = a.position.distance(b.position);
                if distance < LINK_DISTANCE {
                    let alpha = 0.1 - distance / 1000.0;
                    ctx.stroke_line(a.position, b.position, 1.0, self.color.with_alpha(alpha));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::RecordingCanvas;
    use crate::scheduler::FrameClock;
    use backdrop_common::SurfaceSize;
    use fastrand::Rng;

    #[test]
    fn test_reflects_inside() {
        let mut rng = Rng::with_seed(2);
        let theme = ThemeKey::dark();
        let size = SurfaceSize::new(20.0, 20.0);
        let mut p = Particle::at(Vec2::new(19.9, 0.1)).with_velocity(Vec2::new(0.4, -0.4));
        let mut ctx = UpdateContext {
            size,
            clock: FrameClock::default(),
            theme: &theme,
            rng: &mut rng,
        };
        Plexus::default().update(&mut p, &mut ctx);
        assert!(p.velocity.x < 0.0 && p.velocity.y > 0.0);
        assert!(p.position.x <= 20.0 && p.position.y >= 0.0);
    }

    #[test]
    fn test_links_only_close_pairs() {
        let batch = vec![
            Particle::at(Vec2::ZERO),
            Particle::at(Vec2::new(50.0, 0.0)),
            Particle::at(Vec2::new(500.0, 0.0)),
        ];
        let mut canvas = RecordingCanvas::new();
        Plexus::default().draw_overlay(&batch, &ThemeKey::dark(), &mut canvas);
        assert_eq!(canvas.commands().len(), 1);
    }
}
