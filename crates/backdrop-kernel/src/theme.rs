//! Theme keys and the theme source.
//!
//! A theme is an arbitrary discrete key. `light` and `dark` are the two
//! the backgrounds ship with, but nothing in the engine assumes there are
//! only two.

use std::fmt;
use std::sync::Arc;

use crate::signal::Watch;

/// Key for the light theme.
pub const LIGHT: &str = "light";

/// Key for the dark theme.
pub const DARK: &str = "dark";

/// Discrete theme identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ThemeKey(Arc<str>);

impl ThemeKey {
    /// Creates a theme key.
    #[must_use]
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(Arc::from(name.as_ref().trim().to_ascii_lowercase()))
    }

    /// The light theme.
    #[must_use]
    pub fn light() -> Self {
        Self::new(LIGHT)
    }

    /// The dark theme.
    #[must_use]
    pub fn dark() -> Self {
        Self::new(DARK)
    }

    /// Theme name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this is the light theme.
    #[must_use]
    pub fn is_light(&self) -> bool {
        self.as_str() == LIGHT
    }

    /// The theme a light/dark toggle moves to. Dark goes to light and
    /// every other key goes to dark.
    #[must_use]
    pub fn toggled(&self) -> Self {
        if self.as_str() == DARK {
            Self::light()
        } else {
            Self::dark()
        }
    }
}

impl Default for ThemeKey {
    fn default() -> Self {
        Self::dark()
    }
}

impl fmt::Display for ThemeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for ThemeKey {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// Process-wide theme flag, delivered to subscribers on edges.
pub type ThemeSource = Watch<ThemeKey>;

/// Creates a theme source holding `initial`.
#[must_use]
pub fn theme_source(initial: ThemeKey) -> ThemeSource {
    Watch::new(initial)
}

/// Flips a theme source between light and dark.
pub fn toggle_theme(source: &ThemeSource) -> ThemeKey {
    let next = source.get().toggled();
    source.set(next.clone());
    next
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_normalize() {
        assert_eq!(ThemeKey::new("  Dark "), ThemeKey::dark());
        assert_eq!(ThemeKey::from("LIGHT"), ThemeKey::light());
    }

    #[test]
    fn test_default_is_dark() {
        assert_eq!(ThemeKey::default(), ThemeKey::dark());
    }

    #[test]
    fn test_toggle() {
        assert_eq!(ThemeKey::dark().toggled(), ThemeKey::light());
        assert_eq!(ThemeKey::light().toggled(), ThemeKey::dark());
        assert_eq!(ThemeKey::new("sepia").toggled(), ThemeKey::dark());
    }

    #[test]
    fn test_toggle_source() {
        let source = theme_source(ThemeKey::dark());
        assert_eq!(toggle_theme(&source), ThemeKey::light());
        assert!(source.get().is_light());
        assert_eq!(toggle_theme(&source), ThemeKey::dark());
    }

    #[test]
    fn test_display() {
        assert_eq!(ThemeKey::new("sepia").to_string(), "sepia");
    }
}
