//! Per-variant particle rules.
//!
//! A visual variant is a [`ParticleRules`] implementation: how to spawn a
//! particle, how to advance it one frame, and how to draw it. The engine
//! owns the loop and calls into the rules in a fixed order.

use std::collections::HashMap;

use backdrop_common::SurfaceSize;
use fastrand::Rng;

use crate::canvas::DrawContext;
use crate::particle::{wrap_torus, Particle};
use crate::scheduler::FrameClock;
use crate::theme::ThemeKey;

/// Why a particle is being spawned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SpawnMode {
    /// Uniform placement at startup or after a resize.
    #[default]
    Initial,
    /// Radiating pattern after a theme change.
    Burst,
    /// Replacement for a particle that left its boundary.
    Respawn,
}

/// Inputs to a spawn call.
pub struct SpawnContext<'a> {
    /// Current logical surface size.
    pub size: SurfaceSize,
    /// Current theme.
    pub theme: &'a ThemeKey,
    /// Engine RNG.
    pub rng: &'a mut Rng,
    /// Why the particle is being spawned.
    pub mode: SpawnMode,
    /// Slot index in the batch.
    pub index: usize,
    /// Size of the batch being filled.
    pub count: usize,
}

impl SpawnContext<'_> {
    /// Uniform random value in `[0, 1)`.
    pub fn random(&mut self) -> f32 {
        self.rng.f32()
    }

    /// Uniform random value in `[min, max)`.
    pub fn range(&mut self, min: f32, max: f32) -> f32 {
        min + self.rng.f32() * (max - min)
    }

    /// Uniform random point in `[0, width) x [0, height)`.
    pub fn random_position(&mut self) -> glam::Vec2 {
        let x = self.rng.f32() * self.size.width;
        let y = self.rng.f32() * self.size.height;
        wrap_torus(glam::Vec2::new(x, y), self.size)
    }
}

/// Inputs to an update call.
pub struct UpdateContext<'a> {
    /// Current logical surface size.
    pub size: SurfaceSize,
    /// Frame clock.
    pub clock: FrameClock,
    /// Current theme.
    pub theme: &'a ThemeKey,
    /// Engine RNG.
    pub rng: &'a mut Rng,
}

/// Outcome of a single update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Fate {
    /// Keep the particle.
    #[default]
    Alive,
    /// The particle left its boundary and must be reinitialized.
    Respawn,
    /// One-shot particle finished.
    Expire,
}

/// Spawn, update and draw rules for one visual variant.
///
/// `update` is responsible for its own boundary policy (torus wrap,
/// directional respawn, reflection). `draw` must not mutate anything but
/// the drawing context.
pub trait ParticleRules: Send {
    /// Produces one freshly initialized particle.
    fn spawn(&self, ctx: &mut SpawnContext<'_>) -> Particle;

    /// Produces a particle for a theme-change burst.
    fn spawn_burst(&self, ctx: &mut SpawnContext<'_>) -> Particle {
        self.spawn(ctx)
    }

    /// Advances a particle by one frame.
    fn update(&self, particle: &mut Particle, ctx: &mut UpdateContext<'_>) -> Fate;

    /// Draws one particle.
    fn draw(&self, particle: &Particle, theme: &ThemeKey, ctx: &mut dyn DrawContext);

    /// Draws on top of the whole batch after the particle pass.
    fn draw_overlay(&self, _batch: &[Particle], _theme: &ThemeKey, _ctx: &mut dyn DrawContext) {}

    /// Optionally creates a one-shot transient particle this frame.
    fn emit_transient(&self, _ctx: &mut SpawnContext<'_>) -> Option<Particle> {
        None
    }

    /// Advances a transient. Anything but [`Fate::Alive`] removes it.
    fn update_transient(&self, particle: &mut Particle, ctx: &mut UpdateContext<'_>) -> Fate {
        self.update(particle, ctx)
    }

    /// Draws a transient.
    fn draw_transient(&self, particle: &Particle, theme: &ThemeKey, ctx: &mut dyn DrawContext) {
        self.draw(particle, theme, ctx);
    }

    /// Spawns according to `ctx.mode`.
    fn spawn_for(&self, ctx: &mut SpawnContext<'_>) -> Particle {
        match ctx.mode {
            SpawnMode::Burst => self.spawn_burst(ctx),
            SpawnMode::Initial | SpawnMode::Respawn => self.spawn(ctx),
        }
    }
}

type SpawnFn = Box<dyn Fn(&mut SpawnContext<'_>) -> Particle + Send + Sync>;
type UpdateFn = Box<dyn Fn(&mut Particle, &mut UpdateContext<'_>) -> Fate + Send + Sync>;
type DrawFn = Box<dyn Fn(&Particle, &mut dyn DrawContext) + Send + Sync>;

/// Rules assembled from closures.
pub struct FnRules {
    spawn: SpawnFn,
    burst: Option<SpawnFn>,
    update: UpdateFn,
    draw: DrawFn,
}

impl FnRules {
    /// Creates rules from a spawn, update and draw closure.
    pub fn new<S, U, D>(spawn: S, update: U, draw: D) -> Self
    where
        S: Fn(&mut SpawnContext<'_>) -> Particle + Send + Sync + 'static,
        U: Fn(&mut Particle, &mut UpdateContext<'_>) -> Fate + Send + Sync + 'static,
        D: Fn(&Particle, &mut dyn DrawContext) + Send + Sync + 'static,
    {
        Self {
            spawn: Box::new(spawn),
            burst: None,
            update: Box::new(update),
            draw: Box::new(draw),
        }
    }

    /// Uses a distinct spawn closure for theme bursts.
    #[must_use]
    pub fn with_burst<B>(mut self, burst: B) -> Self
    where
        B: Fn(&mut SpawnContext<'_>) -> Particle + Send + Sync + 'static,
    {
        self.burst = Some(Box::new(burst));
        self
    }
}

impl ParticleRules for FnRules {
    fn spawn(&self, ctx: &mut SpawnContext<'_>) -> Particle {
        (self.spawn)(ctx)
    }

    fn spawn_burst(&self, ctx: &mut SpawnContext<'_>) -> Particle {
        match &self.burst {
            Some(burst) => burst(ctx),
            None => (self.spawn)(ctx),
        }
    }

    fn update(&self, particle: &mut Particle, ctx: &mut UpdateContext<'_>) -> Fate {
        (self.update)(particle, ctx)
    }

    fn draw(&self, particle: &Particle, _theme: &ThemeKey, ctx: &mut dyn DrawContext) {
        (self.draw)(particle, ctx);
    }
}

impl std::fmt::Debug for FnRules {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnRules")
            .field("has_burst", &self.burst.is_some())
            .finish_non_exhaustive()
    }
}

/// Selects a rule set by the current theme key.
pub struct ThemedRules {
    by_theme: HashMap<ThemeKey, Box<dyn ParticleRules>>,
    fallback: Box<dyn ParticleRules>,
}

impl ThemedRules {
    /// Creates themed rules that use `fallback` for unknown keys.
    pub fn new(fallback: impl ParticleRules + 'static) -> Self {
        Self {
            by_theme: HashMap::new(),
            fallback: Box::new(fallback),
        }
    }

    /// Registers the rules used under `theme`.
    #[must_use]
    pub fn with_theme(mut self, theme: ThemeKey, rules: impl ParticleRules + 'static) -> Self {
        self.by_theme.insert(theme, Box::new(rules));
        self
    }

    /// Number of themes with dedicated rules.
    #[must_use]
    pub fn theme_count(&self) -> usize {
        self.by_theme.len()
    }

    fn select(&self, theme: &ThemeKey) -> &dyn ParticleRules {
        self.by_theme
            .get(theme)
            .map_or(&*self.fallback, |rules| &**rules)
    }
}

impl ParticleRules for ThemedRules {
    fn spawn(&self, ctx: &mut SpawnContext<'_>) -> Particle {
        self.select(ctx.theme).spawn(ctx)
    }

    fn spawn_burst(&self, ctx: &mut SpawnContext<'_>) -> Particle {
        self.select(ctx.theme).spawn_burst(ctx)
    }

    fn update(&self, particle: &mut Particle, ctx: &mut UpdateContext<'_>) -> Fate {
        self.select(ctx.theme).update(particle, ctx)
    }

    fn draw(&self, particle: &Particle, theme: &ThemeKey, ctx: &mut dyn DrawContext) {
        self.select(theme).draw(particle, theme, ctx);
    }

    fn draw_overlay(&self, batch: &[Particle], theme: &ThemeKey, ctx: &mut dyn DrawContext) {
        self.select(theme).draw_overlay(batch, theme, ctx);
    }

    fn emit_transient(&self, ctx: &mut SpawnContext<'_>) -> Option<Particle> {
        self.select(ctx.theme).emit_transient(ctx)
    }

    fn update_transient(&self, particle: &mut Particle, ctx: &mut UpdateContext<'_>) -> Fate {
        self.select(ctx.theme).update_transient(particle, ctx)
    }

    fn draw_transient(&self, particle: &Particle, theme: &ThemeKey, ctx: &mut dyn DrawContext) {
        self.select(theme).draw_transient(particle, theme, ctx);
    }
}

impl std::fmt::Debug for ThemedRules {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut themes: Vec<&str> = self.by_theme.keys().map(ThemeKey::as_str).collect();
        themes.sort_unstable();
        f.debug_struct("ThemedRules")
            .field("themes", &themes)
            .finish_non_exhaustive()
    }
}
