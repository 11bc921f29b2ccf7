use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_MIN_TEXT_HEIGHT: f64 = 40.0;
pub const DEFAULT_MAX_TEXT_HEIGHT: f64 = 300.0;
/// Pastes longer than this many characters are spilled to a file.
pub const DEFAULT_TEXT_LENGTH_FOR_LARGE_TEXT_FILE: usize = 2000;

/// Construction-time widget configuration, immutable for the widget's lifetime.
///
/// The `#[serde(default)]` on the struct fills any field missing from a
/// config file with its `Default` value, so partial files are fine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WidgetConfig {
    // ── Presentation ─────────────────────────────────────────────────────
    pub min_text_height: f64,
    pub max_text_height: f64,
    /// Plain text; HTML-escaped before it reaches the markup.
    pub placeholder: String,

    // ── Paste handling ───────────────────────────────────────────────────
    pub text_length_for_large_text_file: usize,
    /// Where pasted artifacts are written. `None` means the system temp dir.
    pub artifact_dir: Option<PathBuf>,
}

impl Default for WidgetConfig {
    fn default() -> Self {
        WidgetConfig {
            min_text_height: DEFAULT_MIN_TEXT_HEIGHT,
            max_text_height: DEFAULT_MAX_TEXT_HEIGHT,
            placeholder: String::new(),
            text_length_for_large_text_file: DEFAULT_TEXT_LENGTH_FOR_LARGE_TEXT_FILE,
            artifact_dir: None,
        }
    }
}

impl WidgetConfig {
    /// Directory that receives spilled text and clipboard artifacts.
    pub fn artifact_dir(&self) -> PathBuf {
        self.artifact_dir
            .clone()
            .unwrap_or_else(std::env::temp_dir)
    }

    /// Clamp a reported content height into the widget's sizing range.
    ///
    /// Editor state keeps the raw height; this is for the presentation layer.
    pub fn clamp_height(&self, height: f64) -> f64 {
        if height.is_nan() {
            return self.min_text_height;
        }
        height.max(self.min_text_height).min(self.max_text_height)
    }

    /// Parse a JSON config document. Unknown keys are ignored.
    pub fn from_json(json: &str) -> Result<Self, String> {
        let config: WidgetConfig =
            serde_json::from_str(json).map_err(|e| format!("Invalid widget config: {}", e))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), String> {
        if !(self.min_text_height.is_finite() && self.max_text_height.is_finite()) {
            return Err("Text heights must be finite".to_string());
        }
        if self.min_text_height > self.max_text_height {
            return Err(format!(
                "min_text_height ({}) exceeds max_text_height ({})",
                self.min_text_height, self.max_text_height
            ));
        }
        Ok(())
    }
}

/// Default config location: `<config_dir>/richinput/widget.json`.
pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("richinput").join("widget.json"))
}

/// Load a config file, reporting read or parse failures.
pub fn load(path: &Path) -> Result<WidgetConfig, String> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| format!("Failed to read {:?}: {}", path, e))?;
    WidgetConfig::from_json(&contents)
}

/// Load the config from the default location, falling back to defaults.
pub fn load_default() -> WidgetConfig {
    let Some(path) = config_path() else {
        return WidgetConfig::default();
    };
    if !path.is_file() {
        return WidgetConfig::default();
    }
    match load(&path) {
        Ok(config) => config,
        Err(e) => {
            log::warn!("{}; using default widget config", e);
            WidgetConfig::default()
        }
    }
}
