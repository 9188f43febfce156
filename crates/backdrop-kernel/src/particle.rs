//! Particle state.
//!
//! Particles have no identity across a respawn: rules rebuild every
//! attribute when a particle leaves its boundary.

use backdrop_common::{Color, SurfaceSize};
use glam::Vec2;

/// Variant-specific particle data.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum ParticleExtra {
    /// No extra data.
    #[default]
    None,
    /// Recent positions, newest last (shooting stars).
    Trail(Vec<Vec2>),
    /// Indices of linked particles in the same batch (network nodes).
    Links(Vec<usize>),
}

/// A single animated particle.
#[derive(Debug, Clone, PartialEq)]
pub struct Particle {
    /// Position in logical pixels.
    pub position: Vec2,
    /// Velocity in logical pixels per frame.
    pub velocity: Vec2,
    /// Radius or half-extent.
    pub size: f32,
    /// Opacity in [0, 1].
    pub opacity: f32,
    /// Rotation in radians.
    pub rotation: f32,
    /// Rotation speed in radians per frame.
    pub spin: f32,
    /// Free phase/speed parameter for sinusoidal rules.
    pub phase: f32,
    /// Remaining life for transients, in frames. Unused by batch particles.
    pub life: f32,
    /// Base color. Rules usually scale its alpha by `opacity`.
    pub color: Color,
    /// Variant-specific data.
    pub extra: ParticleExtra,
}

impl Default for Particle {
    fn default() -> Self {
        Self {
            position: Vec2::ZERO,
            velocity: Vec2::ZERO,
            size: 1.0,
            opacity: 1.0,
            rotation: 0.0,
            spin: 0.0,
            phase: 0.0,
            life: 0.0,
            color: Color::WHITE,
            extra: ParticleExtra::None,
        }
    }
}

impl Particle {
    /// Creates a particle at `position`.
    #[must_use]
    pub fn at(position: Vec2) -> Self {
        Self {
            position,
            ..Self::default()
        }
    }

    /// Sets the velocity.
    #[must_use]
    pub fn with_velocity(mut self, velocity: Vec2) -> Self {
        self.velocity = velocity;
        self
    }

    /// Sets the size.
    #[must_use]
    pub fn with_size(mut self, size: f32) -> Self {
        self.size = size;
        self
    }

    /// Sets the opacity (clamped).
    #[must_use]
    pub fn with_opacity(mut self, opacity: f32) -> Self {
        self.opacity = opacity;
        self.clamp_opacity();
        self
    }

    /// Sets the base color.
    #[must_use]
    pub fn with_color(mut self, color: Color) -> Self {
        self.color = color;
        self
    }

    /// Sets rotation and spin.
    #[must_use]
    pub fn with_rotation(mut self, rotation: f32, spin: f32) -> Self {
        self.rotation = rotation;
        self.spin = spin;
        self
    }

    /// Sets the phase parameter.
    #[must_use]
    pub fn with_phase(mut self, phase: f32) -> Self {
        self.phase = phase;
        self
    }

    /// Sets the remaining life.
    #[must_use]
    pub fn with_life(mut self, life: f32) -> Self {
        self.life = life;
        self
    }

    /// Sets the extra data.
    #[must_use]
    pub fn with_extra(mut self, extra: ParticleExtra) -> Self {
        self.extra = extra;
        self
    }

    /// Moves by the velocity.
    pub fn step(&mut self) {
        self.position += self.velocity;
        self.rotation += self.spin;
    }

    /// Clamps opacity into [0, 1]. NaN becomes 0.
    pub fn clamp_opacity(&mut self) {
        self.opacity = if self.opacity.is_nan() {
            0.0
        } else {
            self.opacity.clamp(0.0, 1.0)
        };
    }

    /// Base color with alpha scaled by the current opacity.
    #[must_use]
    pub fn tint(&self) -> Color {
        self.color.fade(self.opacity)
    }

    /// Trail history, if this particle carries one.
    #[must_use]
    pub fn trail(&self) -> Option<&[Vec2]> {
        match &self.extra {
            ParticleExtra::Trail(points) => Some(points),
            _ => None,
        }
    }

    /// Linked indices, if this particle carries any.
    #[must_use]
    pub fn links(&self) -> &[usize] {
        match &self.extra {
            ParticleExtra::Links(links) => links,
            _ => &[],
        }
    }
}

/// Wraps a coordinate into `[0, extent)`.
#[must_use]
pub fn wrap_coordinate(value: f32, extent: f32) -> f32 {
    if extent <= 0.0 || !value.is_finite() {
        return 0.0;
    }
    let wrapped = value.rem_euclid(extent);
    // rem_euclid can round up to `extent` for tiny negative inputs
    if wrapped >= extent {
        0.0
    } else {
        wrapped
    }
}

/// Wraps a position onto the torus `[0, w) x [0, h)`.
#[must_use]
pub fn wrap_torus(position: Vec2, size: SurfaceSize) -> Vec2 {
    Vec2::new(
        wrap_coordinate(position.x, size.width),
        wrap_coordinate(position.y, size.height),
    )
}

/// Reflects a particle off the surface edges, flipping the velocity
/// component that points outward and clamping the position inside.
pub fn reflect_edges(particle: &mut Particle, size: SurfaceSize) {
    let p = &mut particle.position;
    let v = &mut particle.velocity;
    if (p.x < 0.0 && v.x < 0.0) || (p.x > size.width && v.x > 0.0) {
        v.x = -v.x;
    }
    if (p.y < 0.0 && v.y < 0.0) || (p.y > size.height && v.y > 0.0) {
        v.y = -v.y;
    }
    p.x = p.x.clamp(0.0, size.width);
    p.y = p.y.clamp(0.0, size.height);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step() {
        let mut p = Particle::at(Vec2::new(1.0, 1.0))
            .with_velocity(Vec2::new(0.5, -1.0))
            .with_rotation(0.0, 0.1);
        p.step();
        assert_eq!(p.position, Vec2::new(1.5, 0.0));
        assert!((p.rotation - 0.1).abs() < f32::EPSILON);
    }

    #[test]
    fn test_clamp_opacity() {
        let mut p = Particle::default();
        p.opacity = 1.5;
        p.clamp_opacity();
        assert_eq!(p.opacity, 1.0);
        p.opacity = f32::NAN;
        p.clamp_opacity();
        assert_eq!(p.opacity, 0.0);
        assert_eq!(Particle::default().with_opacity(-0.2).opacity, 0.0);
    }

    #[test]
    fn test_wrap_torus() {
        let size = SurfaceSize::new(100.0, 50.0);
        assert_eq!(wrap_torus(Vec2::new(-1.0, 51.0), size), Vec2::new(99.0, 1.0));
        assert_eq!(wrap_torus(Vec2::new(100.0, 0.0), size), Vec2::new(0.0, 0.0));
        let tiny = wrap_torus(Vec2::new(-1e-9, -1e-9), size);
        assert!(size.contains(tiny));
    }

    #[test]
    fn test_wrap_degenerate() {
        assert_eq!(wrap_coordinate(5.0, 0.0), 0.0);
        assert_eq!(wrap_coordinate(f32::NAN, 10.0), 0.0);
    }

    #[test]
    fn test_reflect_edges() {
        let size = SurfaceSize::new(10.0, 10.0);
        let mut p = Particle::at(Vec2::new(-0.5, 5.0)).with_velocity(Vec2::new(-1.0, 0.0));
        reflect_edges(&mut p, size);
        assert_eq!(p.velocity.x, 1.0);
        assert_eq!(p.position.x, 0.0);
    }

    #[test]
    fn test_extra_accessors() {
        let p = Particle::default().with_extra(ParticleExtra::Links(vec![1, 2]));
        assert_eq!(p.links(), &[1, 2]);
        assert!(p.trail().is_none());
        assert!(Particle::default().links().is_empty());
    }
}
