//! # Backdrop Common
//!
//! Common types and utilities shared by the Backdrop crates.
//!
//! This crate provides:
//! - Color values with HSL(A) and 8-bit constructors
//! - Surface and viewport geometry
//! - Common error types
//! - Prelude for convenient imports

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod color;
pub mod error;
pub mod geometry;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::color::*;
    pub use crate::error::*;
    pub use crate::geometry::*;
}

pub use prelude::*;
