// ============================================================================
// ENGINE SETTINGS – key=value .cfg file
// ============================================================================

use std::path::{Path, PathBuf};

use crate::log_warn;
use crate::ops::shapes::GradientOptions;

/// Tunables read by the CLI and handed to engine calls.
#[derive(Clone, Debug, PartialEq)]
pub struct EngineSettings {
    /// Default brush footprint in pixels.
    pub brush_size: u32,
    /// Default eraser strength, 0–100 %.
    pub eraser_strength: f32,
    /// Energy multiplier for importance-masked pixels.
    pub importance_weight: f32,
    pub dither_gradients: bool,
    /// Soft limit: larger seam-carve inputs still run but log a warning.
    pub max_carve_pixels: u64,
    /// Undo depth the host should keep.  Not enforced by the engine.
    pub max_undo_steps: usize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            brush_size: 1,
            eraser_strength: 100.0,
            importance_weight: 10.0,
            dither_gradients: true,
            max_carve_pixels: 512 * 512,
            max_undo_steps: 50,
        }
    }
}

impl EngineSettings {
    /// Default location of the settings file.
    ///   Linux:   `$XDG_CONFIG_HOME/pixelfe/pixelfe_settings.cfg`
    ///   Windows: `%APPDATA%\PixelFE\pixelfe_settings.cfg`
    ///   macOS:   `~/Library/Application Support/PixelFE/pixelfe_settings.cfg`
    pub fn settings_path() -> Option<PathBuf> {
        #[cfg(target_os = "windows")]
        {
            let appdata = std::env::var("APPDATA")
                .or_else(|_| std::env::var("USERPROFILE"))
                .ok()?;
            return Some(PathBuf::from(appdata).join("PixelFE").join("pixelfe_settings.cfg"));
        }
        #[cfg(target_os = "macos")]
        {
            let home = std::env::var("HOME").ok()?;
            return Some(
                PathBuf::from(home)
                    .join("Library")
                    .join("Application Support")
                    .join("PixelFE")
                    .join("pixelfe_settings.cfg"),
            );
        }
        #[cfg(not(any(target_os = "windows", target_os = "macos")))]
        {
            let config_dir = std::env::var("XDG_CONFIG_HOME")
                .map(PathBuf::from)
                .or_else(|_| std::env::var("HOME").map(|h| PathBuf::from(h).join(".config")))
                .ok()?;
            Some(config_dir.join("pixelfe").join("pixelfe_settings.cfg"))
        }
    }

    pub fn to_config_string(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("brush_size={}\n", self.brush_size));
        out.push_str(&format!("eraser_strength={}\n", self.eraser_strength));
        out.push_str(&format!("importance_weight={}\n", self.importance_weight));
        out.push_str(&format!("dither_gradients={}\n", self.dither_gradients));
        out.push_str(&format!("max_carve_pixels={}\n", self.max_carve_pixels));
        out.push_str(&format!("max_undo_steps={}\n", self.max_undo_steps));
        out
    }

    /// Parse `key=value` lines.  Unknown keys and `#` comments are skipped;
    /// unparsable values keep their default.
    pub fn from_config_string(content: &str) -> Self {
        let mut s = Self::default();
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, val)) = line.split_once('=') else { continue };
            let key = key.trim();
            let val = val.trim();
            match key {
                "brush_size" => {
                    if let Ok(v) = val.parse::<u32>() {
                        s.brush_size = v.max(1);
                    }
                }
                "eraser_strength" => {
                    if let Ok(v) = val.parse::<f32>()
                        && v.is_finite()
                    {
                        s.eraser_strength = v.clamp(0.0, 100.0);
                    }
                }
                "importance_weight" => {
                    if let Ok(v) = val.parse::<f32>()
                        && v.is_finite()
                        && v > 0.0
                    {
                        s.importance_weight = v;
                    }
                }
                "dither_gradients" => {
                    s.dither_gradients = matches!(val, "true" | "1" | "yes" | "on");
                }
                "max_carve_pixels" => {
                    if let Ok(v) = val.parse() {
                        s.max_carve_pixels = v;
                    }
                }
                "max_undo_steps" => {
                    if let Ok(v) = val.parse() {
                        s.max_undo_steps = v;
                    }
                }
                _ => {}
            }
        }
        s
    }

    /// Read settings from `path`.  A missing or unreadable file yields defaults.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => Self::from_config_string(&content),
            Err(e) => {
                if path.exists() {
                    log_warn!("could not read settings {}: {}", path.display(), e);
                }
                Self::default()
            }
        }
    }

    /// Settings from the default location, or defaults.
    pub fn load_default() -> Self {
        Self::settings_path().map(|p| Self::load(&p)).unwrap_or_default()
    }

    /// Default gradient with the configured dithering.
    pub fn gradient_options(&self) -> GradientOptions {
        GradientOptions { dither: self.dither_gradients, ..GradientOptions::default() }
    }

    /// Brush call arguments `(size, eraser_strength)` for the configured defaults.
    pub fn brush_defaults(&self) -> (u32, Option<f32>) {
        (self.brush_size, Some(self.eraser_strength))
    }

    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_config_string())
    }
}
