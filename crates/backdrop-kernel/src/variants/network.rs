//! Drifting neural-network nodes joined by fixed links.

use backdrop_common::Color;
use glam::Vec2;

use crate::canvas::DrawContext;
use crate::particle::{wrap_torus, Particle, ParticleExtra};
use crate::rules::{Fate, ParticleRules, SpawnContext, UpdateContext};
use crate::theme::ThemeKey;

/// Links per node.
pub const LINKS_PER_NODE: usize = 3;

/// Nodes link only to indices below this bound.
pub const LINK_INDEX_BOUND: usize = 20;

/// Links fade out completely at this length.
pub const LINK_RANGE: f32 = 200.0;

/// Network rules.
#[derive(Debug, Clone, Copy)]
pub struct Network {
    /// Node and link color.
    pub color: Color,
    /// Node opacity.
    pub node_alpha: f32,
    /// Link opacity at zero length.
    pub link_alpha: f32,
}

impl Default for Network {
    fn default() -> Self {
        Self {
            color: Color::rgba8(125, 211, 252, 1.0),
            node_alpha: 0.8,
            link_alpha: 0.2,
        }
    }
}

impl ParticleRules for Network {
    fn spawn(&self, ctx: &mut SpawnContext<'_>) -> Particle {
        let position = ctx.random_position();
        let size = ctx.range(2.0, 4.0);
        let index = ctx.index;
        let links: Vec<usize> = (0..LINKS_PER_NODE)
            .map(|_| ctx.rng.usize(0..LINK_INDEX_BOUND))
            .filter(|&link| link != index)
            .collect();
        Particle::at(position)
            .with_size(size)
            .with_opacity(self.node_alpha)
            .with_color(self.color)
            .with_extra(ParticleExtra::Links(links))
    }

    fn update(&self, node: &mut Particle, ctx: &mut UpdateContext<'_>) -> Fate {
        let t = ctx.clock.elapsed;
        node.position += Vec2::new(t.cos(), t.sin()) * 0.5;
        node.position = wrap_torus(node.position, ctx.size);
        Fate::Alive
    }

    fn draw(&self, node: &Particle, _theme: &ThemeKey, ctx: &mut dyn DrawContext) {
        ctx.fill_circle(node.position, node.size, node.tint());
    }

    fn draw_overlay(&self, batch: &[Particle], _theme: &ThemeKey, ctx: &mut dyn DrawContext) {
        for node in batch {
            for &link in node.links() {
                let Some(other) = batch.get(link) else {
                    continue;
                };
                let strength = 1.0 - node.position.distance(other.position) / LINK_RANGE;
                if strength > 0.0 {
                    ctx.stroke_line(
                        node.position,
                        other.position,
                        1.0,
                        self.color.with_alpha(strength * self.link_alpha),
                    );
                }
            }
        }
    }
}
