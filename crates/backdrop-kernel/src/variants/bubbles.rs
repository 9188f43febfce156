//! Rising ocean bubbles.

use backdrop_common::Color;
use glam::Vec2;

use crate::canvas::DrawContext;
use crate::particle::Particle;
use crate::rules::{Fate, ParticleRules, SpawnContext, UpdateContext};
use crate::theme::ThemeKey;

/// Bubbles respawn once they rise this far above the top edge.
pub const EXIT_MARGIN: f32 = 20.0;

/// Bubble rules.
#[derive(Debug, Clone, Copy, Default)]
pub struct Bubbles;

impl ParticleRules for Bubbles {
    fn spawn(&self, ctx: &mut SpawnContext<'_>) -> Particle {
        let x = ctx.random() * ctx.size.width;
        let y = ctx.size.height + ctx.random() * 20.0;
        let size = ctx.range(1.0, 4.0);
        let speed = ctx.range(1.0, 2.5);
        Particle::at(Vec2::new(x, y))
            .with_size(size)
            .with_velocity(Vec2::new(0.0, -speed))
            .with_color(Color::WHITE)
    }

    fn update(&self, bubble: &mut Particle, _ctx: &mut UpdateContext<'_>) -> Fate {
        bubble.position.y += bubble.velocity.y;
        bubble.position.x += (bubble.position.y * 0.03).sin() * 0.5;
        if bubble.position.y < -EXIT_MARGIN {
            Fate::Respawn
        } else {
            Fate::Alive
        }
    }

    fn draw(&self, bubble: &Particle, _theme: &ThemeKey, ctx: &mut dyn DrawContext) {
        let s = bubble.size;
        ctx.fill_circle(bubble.position, s, Color::WHITE.with_alpha(0.3 * bubble.opacity));
        ctx.fill_circle(
            bubble.position - Vec2::splat(s / 3.0),
            s / 4.0,
            Color::WHITE.with_alpha(0.5 * bubble.opacity),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::RecordingCanvas;
    use crate::rules::SpawnMode;
    use crate::scheduler::FrameClock;
    use backdrop_common::SurfaceSize;
    use fastrand::Rng;

    #[test]
    fn test_spawn_below_bottom_edge() {
        let mut rng = Rng::with_seed(8);
        let theme = ThemeKey::dark();
        for _ in 0..50 {
            let mut ctx = SpawnContext {
                size: SurfaceSize::new(100.0, 100.0),
                theme: &theme,
                rng: &mut rng,
                mode: SpawnMode::Initial,
                index: 0,
                count: 1,
            };
            let bubble = Bubbles.spawn(&mut ctx);
            assert!(bubble.position.y >= 100.0 && bubble.position.y < 120.0);
            assert!((1.0..4.0).contains(&bubble.size));
            assert!(bubble.velocity.y <= -1.0 && bubble.velocity.y > -2.5);
        }
    }

    #[test]
    fn test_rises_and_respawns() {
        let mut rng = Rng::with_seed(8);
        let theme = ThemeKey::dark();
        let mut bubble = Particle::at(Vec2::new(50.0, -19.0)).with_velocity(Vec2::new(0.0, -1.5));
        let mut ctx = UpdateContext {
            size: SurfaceSize::new(100.0, 100.0),
            clock: FrameClock::default(),
            theme: &theme,
            rng: &mut rng,
        };
        assert_eq!(Bubbles.update(&mut bubble, &mut ctx), Fate::Respawn);
    }

    #[test]
    fn test_draw_highlight() {
        let bubble = Particle::at(Vec2::new(30.0, 30.0)).with_size(3.0);
        let mut canvas = RecordingCanvas::new();
        Bubbles.draw(&bubble, &ThemeKey::dark(), &mut canvas);
        assert_eq!(canvas.circle_count(), 2);
    }
}
