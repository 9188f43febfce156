//! Twinkling starfield with shooting stars.

use std::f32::consts::TAU;

use backdrop_common::Color;
use glam::Vec2;

use crate::canvas::DrawContext;
use crate::particle::{wrap_torus, Particle, ParticleExtra};
use crate::rules::{Fate, ParticleRules, SpawnContext, UpdateContext};
use crate::theme::ThemeKey;

/// Opacity change per frame while twinkling.
pub const TWINKLE_STEP: f32 = 0.005;

/// Velocity damping applied to stars thrown out by a burst.
pub const BURST_DAMPING: f32 = 0.92;

/// Trail points kept for a shooting star.
const TRAIL_LENGTH: usize = 12;

/// Starfield rules.
#[derive(Debug, Clone)]
pub struct Starfield {
    /// Star color before opacity.
    pub color: Color,
    /// Chance per frame of a shooting star.
    pub shooting_star_chance: f32,
    /// Frames a shooting star lives.
    pub shooting_star_life: f32,
}

impl Default for Starfield {
    fn default() -> Self {
        Self {
            color: Color::hsl(220.0, 100.0, 90.0),
            shooting_star_chance: 0.005,
            shooting_star_life: 60.0,
        }
    }
}

impl Starfield {
    /// Starfield with default palette.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the shooting star chance per frame.
    #[must_use]
    pub fn with_shooting_star_chance(mut self, chance: f32) -> Self {
        self.shooting_star_chance = chance.clamp(0.0, 1.0);
        self
    }

    fn twinkle(ctx: &mut SpawnContext<'_>) -> f32 {
        if ctx.random() > 0.5 {
            TWINKLE_STEP
        } else {
            -TWINKLE_STEP
        }
    }
}

impl ParticleRules for Starfield {
    fn spawn(&self, ctx: &mut SpawnContext<'_>) -> Particle {
        let position = ctx.random_position();
        let size = (ctx.random() * 1.5).max(0.1);
        let opacity = ctx.random();
        let phase = Self::twinkle(ctx);
        Particle::at(position)
            .with_size(size)
            .with_opacity(opacity)
            .with_phase(phase)
            .with_color(self.color)
    }

    fn spawn_burst(&self, ctx: &mut SpawnContext<'_>) -> Particle {
        let angle = ctx.random() * TAU;
        let speed = ctx.range(2.0, 6.0);
        let mut star = self.spawn(ctx);
        star.position = ctx.size.center();
        star.velocity = Vec2::from_angle(angle) * speed;
        star
    }

    fn update(&self, star: &mut Particle, ctx: &mut UpdateContext<'_>) -> Fate {
        star.opacity += star.phase;
        if star.opacity <= 0.0 || star.opacity >= 1.0 {
            star.phase = -star.phase;
        }

        if star.velocity != Vec2::ZERO {
            star.position += star.velocity;
            star.velocity *= BURST_DAMPING;
            if star.velocity.length_squared() < 1e-4 {
                star.velocity = Vec2::ZERO;
            }
        }
        star.position = wrap_torus(star.position, ctx.size);
        Fate::Alive
    }

    fn draw(&self, star: &Particle, _theme: &ThemeKey, ctx: &mut dyn DrawContext) {
        ctx.fill_circle(star.position, star.size, star.tint());
    }

    fn emit_transient(&self, ctx: &mut SpawnContext<'_>) -> Option<Particle> {
        if ctx.random() >= self.shooting_star_chance {
            return None;
        }
        let position = Vec2::new(ctx.random() * ctx.size.width, ctx.random() * ctx.size.height * 0.5);
        let velocity = Vec2::new(ctx.range(6.0, 10.0), ctx.range(2.0, 4.0));
        Some(
            Particle::at(position)
                .with_velocity(velocity)
                .with_size(1.5)
                .with_color(Color::WHITE)
                .with_life(self.shooting_star_life)
                .with_phase(self.shooting_star_life)
                .with_extra(ParticleExtra::Trail(Vec::with_capacity(TRAIL_LENGTH))),
        )
    }

    fn update_transient(&self, star: &mut Particle, ctx: &mut UpdateContext<'_>) -> Fate {
        if let ParticleExtra::Trail(points) = &mut star.extra {
            points.push(star.position);
            if points.len() > TRAIL_LENGTH {
                points.remove(0);
            }
        }
        star.step();
        star.life -= 1.0;
        star.opacity = if star.phase > 0.0 {
            star.life / star.phase
        } else {
            0.0
        };

        let margin = TRAIL_LENGTH as f32 * star.velocity.length();
        let outside = star.position.x > ctx.size.width + margin
            || star.position.y > ctx.size.height + margin;
        if star.life <= 0.0 || outside {
            Fate::Expire
        } else {
            Fate::Alive
        }
    }

    fn draw_transient(&self, star: &Particle, _theme: &ThemeKey, ctx: &mut dyn DrawContext) {
        if let Some(points) = star.trail() {
            let n = points.len();
            for (i, pair) in points.windows(2).enumerate() {
                let fade = (i + 1) as f32 / n as f32;
                ctx.stroke_line(pair[0], pair[1], star.size * fade, star.tint().fade(fade));
            }
            if let Some(last) = points.last() {
                ctx.stroke_line(*last, star.position, star.size, star.tint());
            }
        }
        ctx.fill_circle(star.position, star.size, star.tint());
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

    fn spawn_ctx<'a>(rng: &'a mut Rng, theme: &'a ThemeKey, mode: SpawnMode) -> SpawnContext<'a> {
        SpawnContext {
            size: SurfaceSize::new(800.0, 600.0),
            theme,
            rng,
            mode,
            index: 0,
            count: 1,
        }
    }

    #[test]
    fn test_twinkle_reverses_at_bounds() {
        let rules = Starfield::new();
        let mut rng = Rng::with_seed(5);
        let theme = ThemeKey::dark();
        let mut star = Particle::default().with_opacity(0.998).with_phase(TWINKLE_STEP);
        let mut ctx = UpdateContext {
            size: SurfaceSize::new(10.0, 10.0),
            clock: FrameClock::default(),
            theme: &theme,
            rng: &mut rng,
        };
        rules.update(&mut star, &mut ctx);
        assert!(star.phase < 0.0);
    }

    #[test]
    fn test_burst_radiates_and_settles() {
        let rules = Starfield::new();
        let mut rng = Rng::with_seed(11);
        let theme = ThemeKey::dark();
        let mut star = rules.spawn_for(&mut spawn_ctx(&mut rng, &theme, SpawnMode::Burst));
        assert_eq!(star.position, Vec2::new(400.0, 300.0));
        assert!(star.velocity.length() >= 2.0);

        for _ in 0..200 {
            let mut ctx = UpdateContext {
                size: SurfaceSize::new(800.0, 600.0),
                clock: FrameClock::default(),
                theme: &theme,
                rng: &mut rng,
            };
            rules.update(&mut star, &mut ctx);
        }
        assert_eq!(star.velocity, Vec2::ZERO);
        assert!(SurfaceSize::new(800.0, 600.0).contains(star.position));
    }

    #[test]
    fn test_shooting_star_expires() {
        let rules = Starfield::new().with_shooting_star_chance(1.0);
        let mut rng = Rng::with_seed(2);
        let theme = ThemeKey::dark();
        let mut star = rules
            .emit_transient(&mut spawn_ctx(&mut rng, &theme, SpawnMode::Initial))
            .unwrap();

        let mut frames = 0;
        loop {
            let mut ctx = UpdateContext {
                size: SurfaceSize::new(800.0, 600.0),
                clock: FrameClock::default(),
                theme: &theme,
                rng: &mut rng,
            };
            frames += 1;
            if rules.update_transient(&mut star, &mut ctx) != Fate::Alive {
                break;
            }
            assert!(star.trail().map_or(0, <[Vec2]>::len) <= TRAIL_LENGTH);
        }
        assert!(frames <= 60);
    }

    #[test]
    fn test_shooting_star_draws_trail() {
        let rules = Starfield::new();
        let star = Particle::at(Vec2::new(10.0, 10.0))
            .with_extra(ParticleExtra::Trail(vec![Vec2::ZERO, Vec2::new(5.0, 5.0)]));
        let mut canvas = RecordingCanvas::new();
        rules.draw_transient(&star, &ThemeKey::dark(), &mut canvas);
        assert_eq!(canvas.paint_count(), 3);
        assert_eq!(canvas.circle_count(), 1);
    }
}
