//! Error types for Backdrop.

use thiserror::Error;

/// Top-level error type for Backdrop operations.
#[derive(Debug, Error)]
pub enum BackdropError {
    /// Invalid field configuration
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Image encoding errors
    #[error("Image error: {0}")]
    Image(String),
}

/// Configuration errors.
///
/// These are programming errors in the calling code and are reported
/// when a field is created, never defaulted away.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    /// Density divisor must be finite and greater than zero
    #[error("Density divisor must be > 0, got {0}")]
    InvalidDensityDivisor(f32),

    /// Trail fade alpha must lie in [0, 1]
    #[error("Trail fade must be within [0, 1], got {0}")]
    InvalidTrailFade(f32),

    /// Device pixel ratio must be finite and greater than zero
    #[error("Device pixel ratio must be > 0, got {0}")]
    InvalidDevicePixelRatio(f32),

    /// No preset is registered under this name
    #[error("Unknown variant: {0}")]
    UnknownVariant(String),
}

/// Drawing surface errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SurfaceError {
    /// The surface could not yield a 2D drawing context
    #[error("2D drawing context unavailable")]
    Unavailable,
}

/// Result type alias for Backdrop operations.
pub type BackdropResult<T> = Result<T, BackdropError>;
