//! The particle field engine.
//!
//! A [`ParticleField`] owns one surface, one particle batch and a render
//! loop driven by an injected [`FrameScheduler`]. Each frame:
//!
//! 1. paints the trail fade over the whole backing store,
//! 2. updates then draws every batch particle,
//! 3. updates then draws the transient pool, then the batch overlay,
//! 4. applies any resize or theme change that arrived mid-frame,
//! 5. requests the next frame while the field is live.
//!
//! Resize and theme listeners run synchronously on the thread that emits
//! them. When they fire on the thread that already holds the core (a rule
//! emitting an event during its update), the work is flagged and applied as
//! soon as that thread releases the core. `destroy` follows the same path.
//! A caller on any other thread waits for the core instead, so its teardown
//! or regeneration is complete when the call returns.

use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::thread::{self, ThreadId};

use backdrop_common::{
    BackdropResult, Color, ConfigError, SurfaceError, SurfaceSize, Viewport,
};
use fastrand::Rng;
use glam::Vec2;
use parking_lot::{Mutex, MutexGuard};
use tracing::{debug, info};

use crate::background::StaticBackgroundLayer;
use crate::canvas::{Canvas, DrawContext};
use crate::particle::Particle;
use crate::rules::{Fate, ParticleRules, SpawnContext, SpawnMode, UpdateContext};
use crate::scheduler::{ClockState, FrameClock, FrameScheduler, FrameTime, FrameToken};
use crate::signal::Subscription;
use crate::surface::Surface;
use crate::theme::{ThemeKey, ThemeSource};

/// Default area (in square logical pixels) per particle.
pub const DEFAULT_DENSITY_DIVISOR: f32 = 8000.0;

/// Number of particles for a surface: `floor(width * height / divisor)`.
#[must_use]
pub fn particle_count(size: SurfaceSize, density_divisor: f32) -> usize {
    if !(density_divisor.is_finite() && density_divisor > 0.0) {
        return 0;
    }
    let count = f64::from(size.width) * f64::from(size.height) / f64::from(density_divisor);
    count.floor() as usize
}

/// Full-surface fill applied before each frame's particle pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrailFade {
    /// Fill alpha in [0, 1]. `1` clears, `0` keeps the previous frame.
    pub alpha: f32,
    /// Fill color for partial fades.
    pub color: Color,
}

impl TrailFade {
    /// Hard clear every frame.
    pub const CLEAR: Self = Self {
        alpha: 1.0,
        color: Color::TRANSPARENT,
    };

    /// Creates a trail fade.
    #[must_use]
    pub const fn new(alpha: f32, color: Color) -> Self {
        Self { alpha, color }
    }

    /// Paints nothing; frames accumulate.
    #[must_use]
    pub const fn persistent() -> Self {
        Self {
            alpha: 0.0,
            color: Color::TRANSPARENT,
        }
    }

    fn apply(&self, canvas: &mut dyn DrawContext, backing: (u32, u32)) {
        let extent = Vec2::new(backing.0 as f32, backing.1 as f32);
        if self.alpha >= 1.0 {
            canvas.clear_rect(Vec2::ZERO, extent);
        } else if self.alpha > 0.0 {
            canvas.fill_rect(Vec2::ZERO, extent, self.color.with_alpha(self.alpha));
        }
    }
}

impl Default for TrailFade {
    fn default() -> Self {
        Self::CLEAR
    }
}

/// Configuration for a particle field.
pub struct FieldConfig {
    rules: Box<dyn ParticleRules>,
    density_divisor: f32,
    trail: TrailFade,
    background: Option<Arc<StaticBackgroundLayer>>,
    theme: Option<ThemeSource>,
    burst_on_theme_change: bool,
    seed: Option<u64>,
    composite_opacity: f32,
}

impl FieldConfig {
    /// Creates a configuration with default density, a hard clear each
    /// frame, no background and no theme sensitivity.
    pub fn new(rules: impl ParticleRules + 'static) -> Self {
        Self::from_boxed(Box::new(rules))
    }

    /// Creates a configuration from boxed rules.
    #[must_use]
    pub fn from_boxed(rules: Box<dyn ParticleRules>) -> Self {
        Self {
            rules,
            density_divisor: DEFAULT_DENSITY_DIVISOR,
            trail: TrailFade::CLEAR,
            background: None,
            theme: None,
            burst_on_theme_change: true,
            seed: None,
            composite_opacity: 1.0,
        }
    }

    /// Sets the area per particle.
    #[must_use]
    pub fn with_density_divisor(mut self, divisor: f32) -> Self {
        self.density_divisor = divisor;
        self
    }

    /// Sets the trail fade.
    #[must_use]
    pub fn with_trail(mut self, trail: TrailFade) -> Self {
        self.trail = trail;
        self
    }

    /// Attaches a static background layer.
    #[must_use]
    pub fn with_background(mut self, background: Arc<StaticBackgroundLayer>) -> Self {
        self.background = Some(background);
        self
    }

    /// Makes the field theme-sensitive.
    #[must_use]
    pub fn with_theme(mut self, source: ThemeSource) -> Self {
        self.theme = Some(source);
        self
    }

    /// Whether theme changes regenerate with the burst spawn (default) or
    /// the uniform one.
    #[must_use]
    pub fn with_burst_on_theme_change(mut self, burst: bool) -> Self {
        self.burst_on_theme_change = burst;
        self
    }

    /// Seeds the field's RNG.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Opacity the particle layer is composited at over the background.
    #[must_use]
    pub fn with_composite_opacity(mut self, opacity: f32) -> Self {
        self.composite_opacity = if opacity.is_nan() {
            1.0
        } else {
            opacity.clamp(0.0, 1.0)
        };
        self
    }

    /// Area per particle.
    #[must_use]
    pub fn density_divisor(&self) -> f32 {
        self.density_divisor
    }

    /// Trail fade.
    #[must_use]
    pub fn trail(&self) -> TrailFade {
        self.trail
    }

    /// Static background layer, if any.
    #[must_use]
    pub fn background(&self) -> Option<&Arc<StaticBackgroundLayer>> {
        self.background.as_ref()
    }

    /// Whether a theme source is attached.
    #[must_use]
    pub fn is_theme_sensitive(&self) -> bool {
        self.theme.is_some()
    }

    /// Composite opacity.
    #[must_use]
    pub fn composite_opacity(&self) -> f32 {
        self.composite_opacity
    }

    /// Checks the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the density divisor is not a positive finite
    /// number or the trail alpha is outside [0, 1].
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.density_divisor.is_finite() && self.density_divisor > 0.0) {
            return Err(ConfigError::InvalidDensityDivisor(self.density_divisor));
        }
        if !(0.0..=1.0).contains(&self.trail.alpha) {
            return Err(ConfigError::InvalidTrailFade(self.trail.alpha));
        }
        Ok(())
    }
}

impl fmt::Debug for FieldConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldConfig")
            .field("density_divisor", &self.density_divisor)
            .field("trail", &self.trail)
            .field("background", &self.background)
            .field("theme_sensitive", &self.theme.is_some())
            .field("burst_on_theme_change", &self.burst_on_theme_change)
            .field("seed", &self.seed)
            .field("composite_opacity", &self.composite_opacity)
            .finish_non_exhaustive()
    }
}

/// Lifecycle state of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldState {
    /// Loop scheduled and listeners attached.
    Running,
    /// Never started or destroyed.
    Stopped,
}

/// Point-in-time counters for a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FieldStats {
    /// Particles in the current batch.
    pub particles: usize,
    /// Live transient particles.
    pub transients: usize,
    /// Number of batch generations (initial one included).
    pub generation: u64,
    /// Frames rendered since creation.
    pub frames_rendered: u64,
}

struct FieldCore<C: Canvas> {
    surface: Surface<C>,
    ratio: f32,
    rules: Box<dyn ParticleRules>,
    density_divisor: f32,
    trail: TrailFade,
    burst_on_theme_change: bool,
    theme_source: Option<ThemeSource>,
    theme: ThemeKey,
    rng: Rng,
    batch: Vec<Particle>,
    transients: Vec<Particle>,
    clock: ClockState,
    last_clock: FrameClock,
    generation: u64,
    frames_rendered: u64,
    pending_frame: Option<FrameToken>,
    subscriptions: Vec<Subscription>,
}

impl<C: Canvas> FieldCore<C> {
    fn sync_surface(&mut self) {
        let viewport: Viewport = self.surface.sync();
        self.ratio = viewport.effective_ratio();
    }

    fn regenerate(&mut self, mode: SpawnMode) {
        let size = self.surface.logical_size();
        let count = particle_count(size, self.density_divisor);
        let mut batch = Vec::with_capacity(count);
        for index in 0..count {
            let mut ctx = SpawnContext {
                size,
                theme: &self.theme,
                rng: &mut self.rng,
                mode,
                index,
                count,
            };
            let mut particle = self.rules.spawn_for(&mut ctx);
            particle.clamp_opacity();
            batch.push(particle);
        }
        self.batch = batch;
        self.transients.clear();
        self.generation += 1;
    }

    fn handle_resize(&mut self) {
        self.sync_surface();
        self.regenerate(SpawnMode::Initial);
        debug!(
            "Particle field resized to {}x{}, regenerated {} particles (generation {})",
            self.surface.logical_size().width,
            self.surface.logical_size().height,
            self.batch.len(),
            self.generation
        );
    }

    fn handle_theme(&mut self, theme: ThemeKey) {
        if theme == self.theme {
            return;
        }
        self.theme = theme;
        let mode = if self.burst_on_theme_change {
            SpawnMode::Burst
        } else {
            SpawnMode::Initial
        };
        self.regenerate(mode);
        debug!(
            "Theme changed to '{}', regenerated {} particles ({:?})",
            self.theme,
            self.batch.len(),
            mode
        );
    }

    fn render(&mut self, clock: FrameClock) {
        self.last_clock = clock;
        let size = self.surface.logical_size();
        let backing = self.surface.backing_size();
        let ratio = self.ratio;
        let Some(canvas) = self.surface.canvas_mut() else {
            return;
        };

        canvas.reset_transform();
        self.trail.apply(canvas, backing);
        canvas.scale(Vec2::splat(ratio));

        let rules = self.rules.as_ref();
        let theme = &self.theme;
        let rng = &mut self.rng;
        let count = self.batch.len();

        for (index, particle) in self.batch.iter_mut().enumerate() {
            let mut update = UpdateContext {
                size,
                clock,
                theme,
                rng: &mut *rng,
            };
            match rules.update(particle, &mut update) {
                Fate::Alive => {},
                Fate::Respawn | Fate::Expire => {
                    let mut spawn = SpawnContext {
                        size,
                        theme,
                        rng: &mut *rng,
                        mode: SpawnMode::Respawn,
                        index,
                        count,
                    };
                    *particle = rules.spawn_for(&mut spawn);
                },
            }
            particle.clamp_opacity();

            canvas.save();
            rules.draw(particle, theme, canvas);
            canvas.restore();
        }

        let mut emit = SpawnContext {
            size,
            theme,
            rng: &mut *rng,
            mode: SpawnMode::Initial,
            index: self.transients.len(),
            count,
        };
        if let Some(transient) = rules.emit_transient(&mut emit) {
            self.transients.push(transient);
        }

        self.transients.retain_mut(|particle| {
            let mut update = UpdateContext {
                size,
                clock,
                theme,
                rng: &mut *rng,
            };
            if rules.update_transient(particle, &mut update) != Fate::Alive {
                return false;
            }
            particle.clamp_opacity();
            canvas.save();
            rules.draw_transient(particle, theme, canvas);
            canvas.restore();
            true
        });

        canvas.save();
        rules.draw_overlay(&self.batch, theme, canvas);
        canvas.restore();

        self.frames_rendered += 1;
    }
}

/// Core lock that remembers which thread holds it.
struct CoreGuard<'a, C: Canvas> {
    core: MutexGuard<'a, FieldCore<C>>,
    holder: &'a Mutex<Option<ThreadId>>,
}

impl<'a, C: Canvas> CoreGuard<'a, C> {
    fn new(core: MutexGuard<'a, FieldCore<C>>, holder: &'a Mutex<Option<ThreadId>>) -> Self {
        *holder.lock() = Some(thread::current().id());
        Self { core, holder }
    }
}

impl<C: Canvas> Deref for CoreGuard<'_, C> {
    type Target = FieldCore<C>;

    fn deref(&self) -> &Self::Target {
        &self.core
    }
}

impl<C: Canvas> DerefMut for CoreGuard<'_, C> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.core
    }
}

impl<C: Canvas> Drop for CoreGuard<'_, C> {
    fn drop(&mut self) {
        // cleared before the mutex itself is released
        *self.holder.lock() = None;
    }
}

struct FieldShared<C: Canvas> {
    live: AtomicBool,
    pending_resize: AtomicBool,
    pending_theme: AtomicBool,
    teardown_pending: AtomicBool,
    particles: AtomicUsize,
    transients: AtomicUsize,
    generation: AtomicU64,
    frames_rendered: AtomicU64,
    unavailable: Option<SurfaceError>,
    background: Option<Arc<StaticBackgroundLayer>>,
    composite_opacity: f32,
    scheduler: Arc<dyn FrameScheduler>,
    core: Mutex<FieldCore<C>>,
    holder: Mutex<Option<ThreadId>>,
}

impl<C: Canvas> FieldShared<C> {
    fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }

    fn lock_core(&self) -> CoreGuard<'_, C> {
        CoreGuard::new(self.core.lock(), &self.holder)
    }

    fn try_lock_core(&self) -> Option<CoreGuard<'_, C>> {
        self.core
            .try_lock()
            .map(|core| CoreGuard::new(core, &self.holder))
    }

    fn held_by_current_thread(&self) -> bool {
        *self.holder.lock() == Some(thread::current().id())
    }

    /// Takes the core, waiting for other threads. Returns `None` only when
    /// the calling thread already holds it.
    fn acquire(&self) -> Option<CoreGuard<'_, C>> {
        if let Some(core) = self.try_lock_core() {
            return Some(core);
        }
        if self.held_by_current_thread() {
            None
        } else {
            Some(self.lock_core())
        }
    }

    /// Runs `f` under the core lock, then applies any work deferred while
    /// it was held.
    fn with_core<R>(&self, f: impl FnOnce(&FieldCore<C>) -> R) -> R {
        let result = {
            let core = self.lock_core();
            f(&*core)
        };
        self.settle();
        result
    }

    fn has_deferred_work(&self) -> bool {
        self.teardown_pending.load(Ordering::SeqCst)
            || self.pending_resize.load(Ordering::SeqCst)
            || self.pending_theme.load(Ordering::SeqCst)
    }

    /// Applies deferred teardown, resize and theme work if the core is free.
    fn settle(&self) {
        if !self.has_deferred_work() {
            return;
        }
        if let Some(mut core) = self.try_lock_core() {
            self.apply_deferred(&mut core);
        }
    }

    fn apply_deferred(&self, core: &mut FieldCore<C>) {
        if !self.is_live() {
            if self.teardown_pending.load(Ordering::SeqCst) {
                self.teardown_locked(core);
            }
            return;
        }
        if self.pending_resize.swap(false, Ordering::SeqCst) {
            core.handle_resize();
        }
        if self.pending_theme.swap(false, Ordering::SeqCst) {
            let theme = core.theme_source.as_ref().map(ThemeSource::get);
            if let Some(theme) = theme {
                core.handle_theme(theme);
            }
        }
        self.publish(core);
    }

    fn publish(&self, core: &FieldCore<C>) {
        self.particles.store(core.batch.len(), Ordering::Relaxed);
        self.transients.store(core.transients.len(), Ordering::Relaxed);
        self.generation.store(core.generation, Ordering::Relaxed);
        self.frames_rendered
            .store(core.frames_rendered, Ordering::Relaxed);
    }

    fn schedule_next(self: &Arc<Self>, core: &mut FieldCore<C>) {
        let weak = Arc::downgrade(self);
        let token = self.scheduler.request_frame(Box::new(move |time| {
            if let Some(shared) = weak.upgrade() {
                shared.run_frame(time);
            }
        }));
        core.pending_frame = Some(token);
    }

    fn run_frame(self: &Arc<Self>, time: FrameTime) {
        {
            let mut core = self.lock_core();
            core.pending_frame = None;
            if !self.is_live() {
                self.teardown_locked(&mut core);
                return;
            }

            let clock = core.clock.tick(time);
            core.render(clock);
            self.apply_deferred(&mut core);

            if self.is_live() {
                self.schedule_next(&mut core);
            } else {
                self.teardown_locked(&mut core);
            }
            self.publish(&core);
        }
        self.settle();
    }

    fn on_resize(&self) {
        if !self.is_live() {
            return;
        }
        match self.acquire() {
            Some(mut core) => {
                if self.is_live() {
                    core.handle_resize();
                    self.publish(&core);
                }
            },
            None => self.pending_resize.store(true, Ordering::SeqCst),
        }
    }

    fn on_theme(&self, theme: &ThemeKey) {
        if !self.is_live() {
            return;
        }
        match self.acquire() {
            Some(mut core) => {
                if self.is_live() {
                    core.handle_theme(theme.clone());
                    self.publish(&core);
                }
            },
            None => self.pending_theme.store(true, Ordering::SeqCst),
        }
    }

    fn teardown_locked(&self, core: &mut FieldCore<C>) {
        if let Some(token) = core.pending_frame.take() {
            self.scheduler.cancel_frame(token);
        }
        core.subscriptions.clear();
        core.transients.clear();
        self.pending_resize.store(false, Ordering::SeqCst);
        self.pending_theme.store(false, Ordering::SeqCst);
        self.teardown_pending.store(false, Ordering::SeqCst);
        self.publish(core);
    }
}

impl<C: Canvas> Drop for FieldShared<C> {
    fn drop(&mut self) {
        let core = self.core.get_mut();
        if let Some(token) = core.pending_frame.take() {
            self.scheduler.cancel_frame(token);
        }
    }
}

/// Handle to a running (or disabled) particle field.
///
/// Clones share the same field. Accessors that read the particle batch
/// take the field's lock and must not be called from inside a rule.
pub struct ParticleField<C: Canvas> {
    shared: Arc<FieldShared<C>>,
}

impl<C: Canvas> Clone for ParticleField<C> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<C: Canvas> ParticleField<C> {
    /// Creates a field on `surface` and starts its render loop.
    ///
    /// A surface without a drawing context yields a disabled handle: no
    /// frame is scheduled and no listener is attached.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] (wrapped) if the configuration is invalid.
    pub fn create(
        surface: Surface<C>,
        config: FieldConfig,
        scheduler: Arc<dyn FrameScheduler>,
    ) -> BackdropResult<Self> {
        config.validate()?;

        let FieldConfig {
            rules,
            density_divisor,
            trail,
            background,
            theme,
            burst_on_theme_change,
            seed,
            composite_opacity,
        } = config;

        let available = surface.is_available();
        let initial_theme = theme.as_ref().map(ThemeSource::get).unwrap_or_default();
        let rng = seed.map_or_else(Rng::new, Rng::with_seed);

        let core = FieldCore {
            surface,
            ratio: 1.0,
            rules,
            density_divisor,
            trail,
            burst_on_theme_change,
            theme_source: theme,
            theme: initial_theme,
            rng,
            batch: Vec::new(),
            transients: Vec::new(),
            clock: ClockState::default(),
            last_clock: FrameClock::default(),
            generation: 0,
            frames_rendered: 0,
            pending_frame: None,
            subscriptions: Vec::new(),
        };

        let shared = Arc::new(FieldShared {
            live: AtomicBool::new(available),
            pending_resize: AtomicBool::new(false),
            pending_theme: AtomicBool::new(false),
            teardown_pending: AtomicBool::new(false),
            particles: AtomicUsize::new(0),
            transients: AtomicUsize::new(0),
            generation: AtomicU64::new(0),
            frames_rendered: AtomicU64::new(0),
            unavailable: (!available).then_some(SurfaceError::Unavailable),
            background,
            composite_opacity,
            scheduler,
            core: Mutex::new(core),
            holder: Mutex::new(None),
        });

        if !available {
            debug!("Drawing context unavailable, particle field disabled");
            return Ok(Self { shared });
        }

        {
            let mut core = shared.lock_core();
            core.sync_surface();
            core.regenerate(SpawnMode::Initial);

            let weak = Arc::downgrade(&shared);
            let resize = core.surface.viewport().subscribe(move |_| {
                if let Some(shared) = weak.upgrade() {
                    shared.on_resize();
                }
            });
            core.subscriptions.push(resize);

            if let Some(source) = core.theme_source.clone() {
                let weak = Arc::downgrade(&shared);
                let theme = source.subscribe(move |key| {
                    if let Some(shared) = weak.upgrade() {
                        shared.on_theme(key);
                    }
                });
                core.subscriptions.push(theme);
            }

            shared.schedule_next(&mut core);
            shared.publish(&core);

            info!(
                "Particle field started: {}x{} @{}x, {} particles, theme '{}'",
                core.surface.logical_size().width,
                core.surface.logical_size().height,
                core.ratio,
                core.batch.len(),
                core.theme
            );
        }

        Ok(Self { shared })
    }

    /// Stops the render loop, cancels the pending frame and detaches the
    /// resize and theme listeners. Safe to call any number of times, from
    /// any handle and any thread.
    ///
    /// Called from another thread while the field is busy, this waits for
    /// the field and returns with the teardown done. Called from inside a
    /// listener or accessor on the thread that holds the field, the
    /// teardown runs as soon as that thread releases it.
    pub fn destroy(&self) {
        if !self.shared.live.swap(false, Ordering::SeqCst) {
            return;
        }
        match self.shared.acquire() {
            Some(mut core) => self.shared.teardown_locked(&mut core),
            None => self.shared.teardown_pending.store(true, Ordering::SeqCst),
        }
        debug!("Particle field destroyed");
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> FieldState {
        if self.shared.is_live() {
            FieldState::Running
        } else {
            FieldState::Stopped
        }
    }

    /// Whether the field came up without a drawing context.
    #[must_use]
    pub fn is_disabled(&self) -> bool {
        self.shared.unavailable.is_some()
    }

    /// Why the field is disabled, if it is.
    #[must_use]
    pub fn surface_error(&self) -> Option<&SurfaceError> {
        self.shared.unavailable.as_ref()
    }

    /// Particles in the current batch.
    #[must_use]
    pub fn particle_count(&self) -> usize {
        self.shared.particles.load(Ordering::Relaxed)
    }

    /// Live transient particles.
    #[must_use]
    pub fn transient_count(&self) -> usize {
        self.shared.transients.load(Ordering::Relaxed)
    }

    /// Number of batch generations so far.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.shared.generation.load(Ordering::Relaxed)
    }

    /// Frames rendered so far.
    #[must_use]
    pub fn frames_rendered(&self) -> u64 {
        self.shared.frames_rendered.load(Ordering::Relaxed)
    }

    /// Snapshot of the counters.
    #[must_use]
    pub fn stats(&self) -> FieldStats {
        FieldStats {
            particles: self.particle_count(),
            transients: self.transient_count(),
            generation: self.generation(),
            frames_rendered: self.frames_rendered(),
        }
    }

    /// The static background layer, if configured.
    #[must_use]
    pub fn background(&self) -> Option<Arc<StaticBackgroundLayer>> {
        self.shared.background.clone()
    }

    /// Opacity the particle layer is composited at.
    #[must_use]
    pub fn composite_opacity(&self) -> f32 {
        self.shared.composite_opacity
    }

    /// The theme the current batch was generated for.
    #[must_use]
    pub fn theme(&self) -> ThemeKey {
        self.shared.with_core(|core| core.theme.clone())
    }

    /// Clock of the most recent frame.
    #[must_use]
    pub fn last_clock(&self) -> FrameClock {
        self.shared.with_core(|core| core.last_clock)
    }

    /// Runs `f` over the current batch.
    pub fn with_particles<R>(&self, f: impl FnOnce(&[Particle]) -> R) -> R {
        self.shared.with_core(|core| f(&core.batch))
    }

    /// Runs `f` over the transient pool.
    pub fn with_transients<R>(&self, f: impl FnOnce(&[Particle]) -> R) -> R {
        self.shared.with_core(|core| f(&core.transients))
    }

    /// Runs `f` over the surface.
    pub fn with_surface<R>(&self, f: impl FnOnce(&Surface<C>) -> R) -> R {
        self.shared.with_core(|core| f(&core.surface))
    }

    /// Weak handle that does not keep the field alive.
    #[must_use]
    pub fn downgrade(&self) -> WeakParticleField<C> {
        WeakParticleField {
            shared: Arc::downgrade(&self.shared),
        }
    }
}

impl<C: Canvas> fmt::Debug for ParticleField<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParticleField")
            .field("state", &self.state())
            .field("disabled", &self.is_disabled())
            .field("stats", &self.stats())
            .finish()
    }
}

/// Weak counterpart of [`ParticleField`].
pub struct WeakParticleField<C: Canvas> {
    shared: Weak<FieldShared<C>>,
}

impl<C: Canvas> Clone for WeakParticleField<C> {
    fn clone(&self) -> Self {
        Self {
            shared: Weak::clone(&self.shared),
        }
    }
}

impl<C: Canvas> WeakParticleField<C> {
    /// Upgrades to a strong handle if the field still exists.
    #[must_use]
    pub fn upgrade(&self) -> Option<ParticleField<C>> {
        self.shared.upgrade().map(|shared| ParticleField { shared })
    }
}

impl<C: Canvas> fmt::Debug for WeakParticleField<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakParticleField")
            .field("alive", &(self.shared.strong_count() > 0))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::{DrawCommand, RecordingCanvas};
    use crate::rules::FnRules;
    use crate::scheduler::ManualFrameDriver;
    use crate::signal::Watch;
    use crate::theme::theme_source;

    const DT: f64 = 1.0 / 60.0;

    fn dots() -> FnRules {
        FnRules::new(
            |ctx| {
                let position = ctx.random_position();
                Particle::at(position).with_size(2.0).with_opacity(0.5)
            },
            |p, ctx| {
                p.position = crate::particle::wrap_torus(p.position + Vec2::new(1.0, 0.5), ctx.size);
                Fate::Alive
            },
            |p, ctx| ctx.fill_circle(p.position, p.size, p.tint()),
        )
    }

    fn setup(
        width: f32,
        height: f32,
    ) -> (Watch<Viewport>, ManualFrameDriver, Surface<RecordingCanvas>) {
        let viewport = Watch::new(Viewport::new(width, height, 1.0));
        let driver = ManualFrameDriver::new();
        let surface = Surface::new(viewport.clone(), RecordingCanvas::new());
        (viewport, driver, surface)
    }

    #[test]
    fn test_particle_count_formula() {
        assert_eq!(particle_count(SurfaceSize::new(800.0, 600.0), 8000.0), 60);
        assert_eq!(particle_count(SurfaceSize::new(400.0, 300.0), 8000.0), 15);
        assert_eq!(particle_count(SurfaceSize::new(100.0, 79.0), 8000.0), 0);
        assert_eq!(particle_count(SurfaceSize::new(100.0, 100.0), 0.0), 0);
    }

    #[test]
    fn test_validate_rejects_bad_divisor() {
        let (_viewport, driver, surface) = setup(800.0, 600.0);
        let config = FieldConfig::new(dots()).with_density_divisor(0.0);
        let err = ParticleField::create(surface, config, Arc::new(driver)).unwrap_err();
        assert!(err.to_string().contains("Density divisor"));
    }

    #[test]
    fn test_validate_rejects_bad_trail() {
        let config = FieldConfig::new(dots()).with_trail(TrailFade::new(1.5, Color::BLACK));
        assert_eq!(config.validate(), Err(ConfigError::InvalidTrailFade(1.5)));
        let config = FieldConfig::new(dots()).with_density_divisor(f32::NAN);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_startup_count() {
        let (_viewport, driver, surface) = setup(800.0, 600.0);
        let field =
            ParticleField::create(surface, FieldConfig::new(dots()), Arc::new(driver.clone()))
                .unwrap();
        assert_eq!(field.state(), FieldState::Running);
        driver.advance(DT);
        assert_eq!(field.particle_count(), 60);
        assert_eq!(field.frames_rendered(), 1);
        assert_eq!(field.generation(), 1);
    }

    #[test]
    fn test_resize_regenerates() {
        let (viewport, driver, surface) = setup(800.0, 600.0);
        let field =
            ParticleField::create(surface, FieldConfig::new(dots()), Arc::new(driver.clone()))
                .unwrap();
        driver.advance(DT);
        viewport.set(Viewport::new(400.0, 300.0, 2.0));
        assert_eq!(field.particle_count(), 15);
        assert_eq!(field.generation(), 2);
        field.with_surface(|s| assert_eq!(s.backing_size(), (800, 600)));

        viewport.notify();
        assert_eq!(field.particle_count(), 15);
        assert_eq!(field.generation(), 3);
    }

    #[test]
    fn test_frame_order() {
        let (_viewport, driver, surface) = setup(200.0, 100.0);
        let config = FieldConfig::new(dots())
            .with_trail(TrailFade::new(0.1, Color::BLACK))
            .with_seed(7);
        let field = ParticleField::create(surface, config, Arc::new(driver.clone())).unwrap();
        driver.advance(DT);

        field.with_surface(|s| {
            let canvas = s.canvas().unwrap();
            let commands = canvas.commands();
            assert_eq!(commands[0], DrawCommand::ResetTransform);
            assert!(matches!(commands[1], DrawCommand::FillRect { color, .. } if (color.a - 0.1).abs() < 1e-6));
            assert_eq!(commands[2], DrawCommand::Scale(Vec2::ONE));
            assert_eq!(canvas.circle_count(), 2);
            assert_eq!(canvas.save_depth(), 0);
        });
    }

    #[test]
    fn test_trail_modes() {
        let mut canvas = RecordingCanvas::new();
        TrailFade::CLEAR.apply(&mut canvas, (10, 10));
        TrailFade::persistent().apply(&mut canvas, (10, 10));
        assert_eq!(canvas.commands().len(), 1);
        assert!(matches!(canvas.commands()[0], DrawCommand::ClearRect { .. }));
    }

    #[test]
    fn test_first_frame_reflects_update() {
        let (_viewport, driver, surface) = setup(100.0, 80.0);
        let config = FieldConfig::new(dots()).with_density_divisor(8000.0).with_seed(1);
        let field = ParticleField::create(surface, config, Arc::new(driver.clone())).unwrap();
        let before = field.with_particles(|batch| batch[0].position);
        driver.advance(DT);
        let drawn = field.with_surface(|s| {
            s.canvas().and_then(|c| {
                c.commands().iter().find_map(|cmd| match cmd {
                    DrawCommand::FillCircle { center, .. } => Some(*center),
                    _ => None,
                })
            })
        });
        let expected = crate::particle::wrap_torus(
            before + Vec2::new(1.0, 0.5),
            SurfaceSize::new(100.0, 80.0),
        );
        assert_eq!(drawn, Some(expected));
    }

    #[test]
    fn test_theme_change_regenerates() {
        let (_viewport, driver, surface) = setup(800.0, 600.0);
        let theme = theme_source(ThemeKey::dark());
        let config = FieldConfig::new(dots()).with_theme(theme.clone());
        let field = ParticleField::create(surface, config, Arc::new(driver.clone())).unwrap();
        driver.advance(DT);
        assert_eq!(theme.listener_count(), 1);

        theme.set(ThemeKey::light());
        assert_eq!(field.generation(), 2);
        assert_eq!(field.particle_count(), 60);
        assert_eq!(field.theme(), ThemeKey::light());

        // forced notification without an edge does nothing
        theme.notify();
        assert_eq!(field.generation(), 2);
    }

    #[test]
    fn test_destroy_is_idempotent() {
        let (viewport, driver, surface) = setup(800.0, 600.0);
        let theme = theme_source(ThemeKey::dark());
        let config = FieldConfig::new(dots()).with_theme(theme.clone());
        let field = ParticleField::create(surface, config, Arc::new(driver.clone())).unwrap();
        driver.advance(DT);

        field.destroy();
        let once = (driver.pending_count(), viewport.listener_count(), theme.listener_count());
        field.destroy();
        let twice = (driver.pending_count(), viewport.listener_count(), theme.listener_count());
        assert_eq!(once, (0, 0, 0));
        assert_eq!(once, twice);
        assert_eq!(field.state(), FieldState::Stopped);

        assert_eq!(driver.advance(DT), 0);
        viewport.set(Viewport::new(10.0, 10.0, 1.0));
        assert_eq!(field.generation(), 1);
    }

    #[test]
    fn test_destroy_inside_accessor_applies_on_release() {
        let (viewport, driver, surface) = setup(800.0, 600.0);
        let field =
            ParticleField::create(surface, FieldConfig::new(dots()), Arc::new(driver.clone()))
                .unwrap();
        driver.advance(DT);

        let inner = field.clone();
        let seen = field.with_particles(|batch| {
            inner.destroy();
            batch.len()
        });
        assert_eq!(seen, 60);
        assert_eq!(driver.pending_count(), 0);
        assert_eq!(viewport.listener_count(), 0);
        assert_eq!(field.state(), FieldState::Stopped);
    }

    #[test]
    fn test_last_clock_tracks_frames() {
        let (_viewport, driver, surface) = setup(100.0, 100.0);
        let field =
            ParticleField::create(surface, FieldConfig::new(dots()), Arc::new(driver.clone()))
                .unwrap();
        for _ in 0..3 {
            driver.advance(DT);
        }
        let clock = field.last_clock();
        assert_eq!(clock.frame, 2);
        assert!((f64::from(clock.elapsed) - 2.0 * DT).abs() < 1e-4);
    }

    #[test]
    fn test_unavailable_surface_is_disabled() {
        let viewport = Watch::new(Viewport::new(800.0, 600.0, 1.0));
        let driver = ManualFrameDriver::new();
        let surface: Surface<RecordingCanvas> = Surface::unavailable(viewport.clone());
        let field =
            ParticleField::create(surface, FieldConfig::new(dots()), Arc::new(driver.clone()))
                .unwrap();

        assert!(field.is_disabled());
        assert_eq!(field.surface_error(), Some(&SurfaceError::Unavailable));
        assert_eq!(field.state(), FieldState::Stopped);
        assert_eq!(driver.pending_count(), 0);
        assert_eq!(viewport.listener_count(), 0);
        field.destroy();
        field.destroy();
    }

    #[test]
    fn test_dropping_last_handle_cancels_frame() {
        let (viewport, driver, surface) = setup(100.0, 100.0);
        let field =
            ParticleField::create(surface, FieldConfig::new(dots()), Arc::new(driver.clone()))
                .unwrap();
        assert_eq!(driver.pending_count(), 1);
        drop(field);
        assert_eq!(driver.pending_count(), 0);
        assert_eq!(viewport.listener_count(), 0);
    }

    #[test]
    fn test_respawn_replaces_particle() {
        let (_viewport, driver, surface) = setup(100.0, 80.0);
        let rules = FnRules::new(
            |ctx| {
                let size = if ctx.mode == SpawnMode::Respawn { 9.0 } else { 1.0 };
                Particle::at(Vec2::ZERO).with_size(size)
            },
            |_, _| Fate::Respawn,
            |_, _| {},
        );
        let field =
            ParticleField::create(surface, FieldConfig::new(rules), Arc::new(driver.clone()))
                .unwrap();
        driver.advance(DT);
        assert_eq!(field.particle_count(), 1);
        assert_eq!(field.with_particles(|b| b[0].size), 9.0);
    }

    #[test]
    fn test_weak_handle() {
        let (_viewport, driver, surface) = setup(100.0, 100.0);
        let field =
            ParticleField::create(surface, FieldConfig::new(dots()), Arc::new(driver)).unwrap();
        let weak = field.downgrade();
        assert!(weak.upgrade().is_some());
        drop(field);
        assert!(weak.upgrade().is_none());
    }
}
