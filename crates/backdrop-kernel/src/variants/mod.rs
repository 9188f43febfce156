//! Preset variants.
//!
//! Each variant is a [`ParticleRules`](crate::rules::ParticleRules)
//! implementation plus a preset [`FieldConfig`] carrying its density, trail
//! fade, page background and canvas opacity.

pub mod bubbles;
pub mod embers;
pub mod leaves;
pub mod network;
pub mod petals;
pub mod plexus;
pub mod starfield;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use backdrop_common::{Color, ConfigError};

pub use bubbles::Bubbles;
pub use embers::Embers;
pub use leaves::Leaves;
pub use network::Network;
pub use petals::Petals;
pub use plexus::Plexus;
pub use starfield::Starfield;

use crate::background::StaticBackgroundLayer;
use crate::engine::{FieldConfig, TrailFade};
use crate::rules::ThemedRules;
use crate::theme::ThemeKey;

/// Built-in background variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VariantKind {
    /// Twinkling stars with shooting stars.
    Starfield,
    /// Falling blossom petals.
    Petals,
    /// Stars in the dark theme, petals in the light one.
    Twilight,
    /// Rising ocean bubbles.
    Bubbles,
    /// Drifting leaves.
    Leaves,
    /// Pulsing embers.
    Embers,
    /// Linked network nodes.
    Network,
    /// Bouncing particles with proximity links.
    Plexus,
}

impl VariantKind {
    /// Every variant.
    pub const ALL: [Self; 8] = [
        Self::Starfield,
        Self::Petals,
        Self::Twilight,
        Self::Bubbles,
        Self::Leaves,
        Self::Embers,
        Self::Network,
        Self::Plexus,
    ];

    /// Lowercase name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Starfield => "starfield",
            Self::Petals => "petals",
            Self::Twilight => "twilight",
            Self::Bubbles => "bubbles",
            Self::Leaves => "leaves",
            Self::Embers => "embers",
            Self::Network => "network",
            Self::Plexus => "plexus",
        }
    }

    /// Area per particle.
    #[must_use]
    pub const fn density_divisor(&self) -> f32 {
        match self {
            Self::Starfield | Self::Twilight | Self::Bubbles | Self::Embers => 8000.0,
            Self::Petals => 9000.0,
            Self::Leaves => 10000.0,
            Self::Network | Self::Plexus => 20000.0,
        }
    }

    /// Whether the variant reacts to theme changes.
    #[must_use]
    pub const fn is_theme_sensitive(&self) -> bool {
        matches!(self, Self::Starfield | Self::Petals | Self::Twilight)
    }

    /// Whether particles wrap around the surface edges.
    #[must_use]
    pub const fn wraps(&self) -> bool {
        matches!(self, Self::Starfield | Self::Leaves | Self::Network)
    }

    /// Trail fade for this variant.
    #[must_use]
    pub fn trail(&self) -> TrailFade {
        match self {
            Self::Starfield | Self::Petals | Self::Twilight | Self::Plexus => TrailFade::CLEAR,
            Self::Bubbles => TrailFade::new(0.1, Color::rgba8(0, 20, 40, 1.0)),
            Self::Leaves => TrailFade::new(0.1, Color::WHITE),
            Self::Embers | Self::Network => TrailFade::new(0.1, Color::BLACK),
        }
    }

    /// Page background behind the canvas.
    #[must_use]
    pub fn background(&self) -> Option<StaticBackgroundLayer> {
        let layer = match self {
            Self::Starfield => StaticBackgroundLayer::Solid(Color::BLACK.with_alpha(0.2)),
            Self::Petals => {
                StaticBackgroundLayer::to_bottom(&[Color::hex(0xfff1f2, 1.0), Color::hex(0xfce7f3, 1.0)])
            },
            Self::Twilight => {
                StaticBackgroundLayer::to_bottom(&[Color::hex(0x0f172a, 1.0), Color::hex(0x1e3a8a, 1.0)])
            },
            Self::Bubbles => StaticBackgroundLayer::to_bottom(&[
                Color::hex(0x0891b2, 1.0),
                Color::hex(0x1e40af, 1.0),
                Color::hex(0x1e3a8a, 1.0),
            ]),
            Self::Leaves => StaticBackgroundLayer::to_bottom_right(&[
                Color::hex(0xffe4e6, 1.0),
                Color::hex(0xecfdf5, 1.0),
                Color::hex(0xccfbf1, 1.0),
            ]),
            Self::Embers => StaticBackgroundLayer::to_bottom(&[
                Color::hex(0x7f1d1d, 1.0),
                Color::hex(0x9a3412, 1.0),
                Color::hex(0x78350f, 1.0),
            ]),
            Self::Network => StaticBackgroundLayer::to_bottom_right(&[
                Color::hex(0x0f172a, 1.0),
                Color::hex(0x1e3a8a, 1.0),
                Color::hex(0x0f172a, 1.0),
            ])
            .with_grid(64.0, Color::rgba8(59, 130, 246, 0.1)),
            Self::Plexus => return None,
        };
        Some(layer)
    }

    /// Opacity the canvas is composited at.
    #[must_use]
    pub const fn composite_opacity(&self) -> f32 {
        match self {
            Self::Starfield | Self::Petals | Self::Twilight => 1.0,
            Self::Bubbles | Self::Leaves | Self::Embers => 0.3,
            Self::Network => 0.5,
            Self::Plexus => 0.7,
        }
    }

    /// Builds the preset configuration. Theme sources are attached by the
    /// caller.
    #[must_use]
    pub fn preset(&self) -> FieldConfig {
        let config = match self {
            Self::Starfield => FieldConfig::new(Starfield::new()),
            Self::Petals => FieldConfig::new(Petals::new()),
            Self::Twilight => FieldConfig::new(
                ThemedRules::new(Starfield::new()).with_theme(ThemeKey::light(), Petals::new()),
            ),
            Self::Bubbles => FieldConfig::new(Bubbles),
            Self::Leaves => FieldConfig::new(Leaves::default()),
            Self::Embers => FieldConfig::new(Embers::default()),
            Self::Network => FieldConfig::new(Network::default()),
            Self::Plexus => FieldConfig::new(Plexus::default()),
        };

        let config = config
            .with_density_divisor(self.density_divisor())
            .with_trail(self.trail())
            .with_composite_opacity(self.composite_opacity());

        match self.background() {
            Some(layer) => config.with_background(Arc::new(layer)),
            None => config,
        }
    }
}

impl fmt::Display for VariantKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for VariantKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|kind| kind.name() == name)
            .ok_or_else(|| ConfigError::UnknownVariant(s.to_string()))
    }
}
