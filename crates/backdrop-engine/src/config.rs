//! Host configuration.
//!
//! Surface, variant, run length and scripted events for a headless run.
//! Loaded from and saved to a TOML file.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use backdrop_kernel::VariantKind;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Configuration file name.
pub const CONFIG_FILE: &str = "backdrop.toml";

/// A viewport change applied before a given frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScriptedResize {
    /// Frame index the resize fires before
    pub frame: u64,
    /// New logical width
    pub width: f32,
    /// New logical height
    pub height: f32,
}

/// Parameters of one headless run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    // === Surface ===
    /// Logical width in CSS pixels
    pub width: f32,
    /// Logical height in CSS pixels
    pub height: f32,
    /// Device pixel ratio
    pub device_pixel_ratio: f32,

    // === Field ===
    /// Variant name
    pub variant: String,
    /// RNG seed (None = random)
    pub seed: Option<u64>,
    /// Initial theme key
    pub theme: String,

    // === Run ===
    /// Number of frames to render
    pub frames: u64,
    /// Frame rate of the synthetic clock
    pub target_fps: u32,
    /// Sleep out each frame budget instead of running flat out
    pub realtime: bool,
    /// Toggle the theme every N frames (0 = never)
    pub theme_toggle_every: u64,
    /// Viewport changes to replay
    pub resizes: Vec<ScriptedResize>,

    // === Output ===
    /// PNG snapshot of the last frame
    pub snapshot: Option<PathBuf>,
    /// JSON run summary
    pub summary: Option<PathBuf>,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            width: 1280.0,
            height: 720.0,
            device_pixel_ratio: 1.0,

            variant: VariantKind::Starfield.name().to_string(),
            seed: None,
            theme: "dark".to_string(),

            frames: 600,
            target_fps: 60,
            realtime: false,
            theme_toggle_every: 0,
            resizes: Vec::new(),

            snapshot: None,
            summary: None,
        }
    }
}

impl HostConfig {
    /// Reads a host configuration. A missing, unreadable or malformed file
    /// yields the defaults.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();

        if !path.exists() {
            info!("Config file {} not found, using defaults", path.display());
            return Self::default();
        }

        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) => {
                warn!("Failed to read config file: {e}");
                return Self::default();
            },
        };

        match toml::from_str(&contents) {
            Ok(config) => {
                info!("Loaded config from {}", path.display());
                config
            },
            Err(e) => {
                warn!("Failed to parse config file: {e}");
                Self::default()
            },
        }
    }

    /// Writes the configuration as pretty TOML, creating parent directories.
    pub fn save_to<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        fs::write(path, contents)?;

        info!("Saved config to {}", path.display());
        Ok(())
    }

    /// Clamps sizes, ratio and frame rate into usable ranges and orders the
    /// scripted resizes by frame.
    pub fn validate(&mut self) {
        self.width = clamp_or(self.width, 1.0, 7680.0, 1280.0);
        self.height = clamp_or(self.height, 1.0, 4320.0, 720.0);
        self.device_pixel_ratio = clamp_or(self.device_pixel_ratio, 0.5, 4.0, 1.0);
        self.target_fps = self.target_fps.clamp(1, 240);

        for resize in &mut self.resizes {
            resize.width = clamp_or(resize.width, 1.0, 7680.0, self.width);
            resize.height = clamp_or(resize.height, 1.0, 4320.0, self.height);
        }
        self.resizes.sort_by_key(|resize| resize.frame);

        if self.theme.trim().is_empty() {
            warn!("Empty theme key, falling back to 'dark'");
            self.theme = "dark".to_string();
        }
    }

    /// The configured variant, or starfield if the name is unknown.
    #[must_use]
    pub fn variant_kind(&self) -> VariantKind {
        self.variant.parse().unwrap_or_else(|e| {
            warn!("{e}, falling back to starfield");
            VariantKind::Starfield
        })
    }
}

fn clamp_or(value: f32, min: f32, max: f32, fallback: f32) -> f32 {
    if value.is_finite() {
        value.clamp(min, max)
    } else {
        fallback
    }
}
