//! Persistent tap configuration
//!
//! Stores the burst window and trigger key in a JSON file at
//! `<data_dir>/morsetap/config.json`. Out-of-range windows are clamped
//! silently; a missing or unparsable file falls back to defaults.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::tap::trigger::TriggerKey;
use crate::{DEFAULT_WINDOW_MS, MAX_WINDOW_MS, MIN_WINDOW_MS};

/// Clamp a window length into the accepted [150, 2000] ms range.
pub fn clamp_window_ms(window_ms: u32) -> u32 {
    window_ms.clamp(MIN_WINDOW_MS, MAX_WINDOW_MS)
}

fn default_window_ms() -> u32 {
    DEFAULT_WINDOW_MS
}

fn default_trigger_key() -> String {
    // Blank sentinel = space key
    " ".to_string()
}

/// Persistent tap configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TapConfig {
    /// Burst window in milliseconds, clamped to [150, 2000] on use
    #[serde(default = "default_window_ms")]
    pub window_ms: u32,
    /// Trigger key value; blank means the space key
    #[serde(default = "default_trigger_key")]
    pub trigger_key: String,
}

impl Default for TapConfig {
    fn default() -> Self {
        Self {
            window_ms: default_window_ms(),
            trigger_key: default_trigger_key(),
        }
    }
}

impl TapConfig {
    /// Config file path: `<data_dir>/morsetap/config.json`
    pub fn path() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("morsetap")
            .join("config.json")
    }

    /// Load config from disk, falling back to defaults on any error
    pub fn load() -> Self {
        let path = Self::path();
        match std::fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<TapConfig>(&contents) {
                Ok(config) => {
                    tracing::info!(path = %path.display(), "Loaded config from disk");
                    config.clamped()
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Failed to parse config, using defaults");
                    Self::default()
                }
            },
            Err(_) => {
                tracing::info!(path = %path.display(), "No config file found, using defaults");
                Self::default()
            }
        }
    }

    /// Save config to disk, creating parent directories if needed
    pub fn save(&self, path: &std::path::Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        tracing::info!(path = %path.display(), "Config saved to disk");
        Ok(())
    }

    /// Copy with the window clamped into range
    pub fn clamped(mut self) -> Self {
        self.window_ms = clamp_window_ms(self.window_ms);
        self
    }

    /// Window in effect, clamped into range
    pub fn effective_window_ms(&self) -> u32 {
        clamp_window_ms(self.window_ms)
    }

    /// Trigger built from the configured key value
    pub fn trigger(&self) -> TriggerKey {
        TriggerKey::new(self.trigger_key.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = TapConfig::default();
        assert_eq!(config.window_ms, 700);
        assert_eq!(config.trigger_key, " ");
        assert!(config.trigger().is_space());
    }

    #[test]
    fn test_clamp_window() {
        assert_eq!(clamp_window_ms(50), 150);
        assert_eq!(clamp_window_ms(150), 150);
        assert_eq!(clamp_window_ms(700), 700);
        assert_eq!(clamp_window_ms(2000), 2000);
        assert_eq!(clamp_window_ms(5000), 2000);
    }

    #[test]
    fn test_effective_window_clamps() {
        let config = TapConfig {
            window_ms: 50,
            trigger_key: "j".into(),
        };
        assert_eq!(config.effective_window_ms(), 150);

        let config = TapConfig {
            window_ms: 5000,
            trigger_key: "j".into(),
        };
        assert_eq!(config.effective_window_ms(), 2000);
    }

    #[test]
    fn test_round_trip() {
        let config = TapConfig {
            window_ms: 450,
            trigger_key: "k".into(),
        };
        let json = serde_json::to_string(&config).unwrap();
        let loaded: TapConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let json = r#"{"window_ms": 300}"#;
        let config: TapConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.window_ms, 300);
        assert_eq!(config.trigger_key, " ");
    }

    #[test]
    fn test_empty_json_uses_defaults() {
        let config: TapConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.window_ms, 700);
        assert_eq!(config.trigger_key, " ");
    }

    #[test]
    fn test_save_and_load() {
        let dir = std::env::temp_dir().join("morsetap-config-test");
        let path = dir.join("config.json");
        let _ = std::fs::remove_dir_all(&dir);

        let config = TapConfig {
            window_ms: 900,
            trigger_key: "Enter".into(),
        };
        config.save(&path).unwrap();

        let loaded: TapConfig =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(loaded.window_ms, 900);
        assert_eq!(loaded.trigger_key, "Enter");

        let _ = std::fs::remove_dir_all(&dir);
    }
}
