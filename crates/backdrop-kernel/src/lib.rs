//! # Backdrop Kernel
//!
//! Procedural particle fields for animated page backgrounds.
//!
//! This crate provides:
//! - A render loop driven by an injected frame scheduler
//! - Resize and theme reactions through explicit subscriptions
//! - Trail-fade compositing over a pluggable drawing context
//! - A software raster canvas and a recording canvas for tests
//! - The built-in background variants

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod background;
pub mod canvas;
pub mod engine;
pub mod particle;
pub mod raster;
pub mod rules;
pub mod scheduler;
pub mod signal;
pub mod surface;
pub mod theme;
pub mod variants;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::background::*;
    pub use crate::canvas::*;
    pub use crate::engine::*;
    pub use crate::particle::*;
    pub use crate::raster::*;
    pub use crate::rules::*;
    pub use crate::scheduler::*;
    pub use crate::signal::*;
    pub use crate::surface::*;
    pub use crate::theme::*;
    pub use crate::variants::{
        Bubbles, Embers, Leaves, Network, Petals, Plexus, Starfield, VariantKind,
    };
}

pub use prelude::*;
