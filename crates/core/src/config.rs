use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Configuration manager for the show engine.
///
/// Provides a layered configuration system that separates schema, available
/// options, and persisted values. Configuration is stored as pretty-printed
/// JSON under the platform config directory by default.
pub struct ConfigManager {
    config_path: PathBuf,
    settings: Settings,
}

/// Persisted settings. Field names match `Settings` one-to-one with `ConfigSchema`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    pub audio_device: String,
    pub midi_clock_port: String,
    pub midi_control_port: String,
    pub dmx_port: String,
    pub chaser_fade_tick_hz: u32,
    pub lyrics_read_ahead_secs: f64,
    pub log_level: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            audio_device: "default".to_string(),
            midi_clock_port: "None".to_string(),
            midi_control_port: "None".to_string(),
            dmx_port: "/dev/ttyUSB0".to_string(),
            chaser_fade_tick_hz: 100,
            lyrics_read_ahead_secs: 1.0,
            log_level: "info".to_string(),
        }
    }
}

/// Available configuration options with validation, used to drive a settings
/// editor and to validate a loaded file field-by-field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigSchema {
    pub audio_device: ConfigOption<String>,
    pub midi_clock_port: ConfigOption<String>,
    pub midi_control_port: ConfigOption<String>,
    pub dmx_port: ConfigOption<String>,
    pub chaser_fade_tick_hz: ConfigOption<u32>,
    pub lyrics_read_ahead_secs: ConfigOption<f64>,
    pub log_level: ConfigOption<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigOption<T> {
    pub default: T,
    pub valid_range: Option<(T, T)>,
    pub valid_choices: Option<Vec<T>>,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigFile {
    pub version: String,
    pub settings: Settings,
    pub created_at: String,
    pub modified_at: String,
}

impl ConfigManager {
    pub fn new(config_path: Option<PathBuf>) -> Self {
        let config_path = config_path.unwrap_or_else(Self::default_config_path);
        Self {
            config_path,
            settings: Settings::default(),
        }
    }

    fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("lumen")
            .join("config.json")
    }

    /// Load settings from disk, falling back to defaults field-by-field where
    /// validation fails. Returns defaults (and writes them) if no file exists yet.
    pub fn load(&mut self) -> Result<Settings, ConfigError> {
        if !self.config_path.exists() {
            self.save()?;
            return Ok(self.settings.clone());
        }

        let content = fs::read_to_string(&self.config_path)
            .map_err(|e| ConfigError::ReadError(e.to_string()))?;

        let config_file: ConfigFile =
            serde_json::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        let mut settings = config_file.settings;
        for warning in Self::sanitize(&mut settings) {
            log::warn!("{}", warning);
        }

        self.settings = settings;
        Ok(self.settings.clone())
    }

    /// Replace any out-of-range or unrecognized field with its schema default,
    /// returning a human-readable message per field replaced.
    fn sanitize(settings: &mut Settings) -> Vec<String> {
        let schema = Self::schema();
        let mut warnings = Vec::new();

        if let Some((min, max)) = schema.chaser_fade_tick_hz.valid_range {
            if settings.chaser_fade_tick_hz < min || settings.chaser_fade_tick_hz > max {
                warnings.push(format!(
                    "chaser_fade_tick_hz {} out of range {}..={}, using default {}",
                    settings.chaser_fade_tick_hz, min, max, schema.chaser_fade_tick_hz.default
                ));
                settings.chaser_fade_tick_hz = schema.chaser_fade_tick_hz.default;
            }
        }

        if let Some((min, max)) = schema.lyrics_read_ahead_secs.valid_range {
            if settings.lyrics_read_ahead_secs < min || settings.lyrics_read_ahead_secs > max {
                warnings.push(format!(
                    "lyrics_read_ahead_secs {} out of range, using default {}",
                    settings.lyrics_read_ahead_secs, schema.lyrics_read_ahead_secs.default
                ));
                settings.lyrics_read_ahead_secs = schema.lyrics_read_ahead_secs.default;
            }
        }

        if let Some(choices) = &schema.log_level.valid_choices {
            if !choices.contains(&settings.log_level) {
                warnings.push(format!(
                    "log_level '{}' not recognized, using default '{}'",
                    settings.log_level, schema.log_level.default
                ));
                settings.log_level = schema.log_level.default;
            }
        }

        warnings
    }

    pub fn save(&self) -> Result<(), ConfigError> {
        if let Some(parent) = self.config_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| ConfigError::WriteError(e.to_string()))?;
            }
        }

        let now = chrono::Utc::now().to_rfc3339();
        let config_file = ConfigFile {
            version: env!("CARGO_PKG_VERSION").to_string(),
            settings: self.settings.clone(),
            created_at: now.clone(),
            modified_at: now,
        };

        let content = serde_json::to_string_pretty(&config_file)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        fs::write(&self.config_path, content).map_err(|e| ConfigError::WriteError(e.to_string()))
    }

    pub fn update_settings(&mut self, settings: Settings) -> Result<(), ConfigError> {
        self.settings = settings;
        self.save()
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn schema() -> ConfigSchema {
        ConfigSchema {
            audio_device: ConfigOption {
                default: "default".to_string(),
                valid_range: None,
                valid_choices: None,
                description: "Audio output device name for playback".to_string(),
            },
            midi_clock_port: ConfigOption {
                default: "None".to_string(),
                valid_range: None,
                valid_choices: None,
                description: "MIDI output port for the outgoing clock".to_string(),
            },
            midi_control_port: ConfigOption {
                default: "None".to_string(),
                valid_range: None,
                valid_choices: None,
                description: "MIDI input port for the mapping router".to_string(),
            },
            dmx_port: ConfigOption {
                default: "/dev/ttyUSB0".to_string(),
                valid_range: None,
                valid_choices: None,
                description: "Serial port the DMX512 transceiver is attached to".to_string(),
            },
            chaser_fade_tick_hz: ConfigOption {
                default: 100,
                valid_range: Some((50, 250)),
                valid_choices: None,
                description: "Chaser fade tick rate in Hz".to_string(),
            },
            lyrics_read_ahead_secs: ConfigOption {
                default: 1.0,
                valid_range: Some((0.0, 10.0)),
                valid_choices: None,
                description: "Lyric lookup read-ahead in seconds".to_string(),
            },
            log_level: ConfigOption {
                default: "info".to_string(),
                valid_range: None,
                valid_choices: Some(vec![
                    "error".to_string(),
                    "warn".to_string(),
                    "info".to_string(),
                    "debug".to_string(),
                    "trace".to_string(),
                ]),
                description: "Log verbosity".to_string(),
            },
        }
    }

    pub fn reset_to_defaults(&mut self) -> Result<(), ConfigError> {
        self.settings = Settings::default();
        self.save()
    }
}

#[derive(Debug)]
pub enum ConfigError {
    ReadError(String),
    WriteError(String),
    ParseError(String),
    SerializeError(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::ReadError(msg) => write!(f, "failed to read config file: {}", msg),
            ConfigError::WriteError(msg) => write!(f, "failed to write config file: {}", msg),
            ConfigError::ParseError(msg) => write!(f, "failed to parse config file: {}", msg),
            ConfigError::SerializeError(msg) => write!(f, "failed to serialize config: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn new_config_manager_uses_default_settings() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test_config.json");

        let manager = ConfigManager::new(Some(config_path.clone()));
        assert_eq!(manager.config_path(), config_path);
        assert_eq!(manager.settings(), &Settings::default());
    }

    #[test]
    fn save_then_load_round_trips_settings() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test_config.json");

        let mut manager = ConfigManager::new(Some(config_path.clone()));

        let mut settings = Settings::default();
        settings.audio_device = "Test Device".to_string();
        settings.chaser_fade_tick_hz = 120;

        manager.update_settings(settings.clone()).unwrap();

        let mut manager2 = ConfigManager::new(Some(config_path));
        let loaded_settings = manager2.load().unwrap();

        assert_eq!(loaded_settings.audio_device, "Test Device");
        assert_eq!(loaded_settings.chaser_fade_tick_hz, 120);
    }

    #[test]
    fn out_of_range_field_falls_back_to_default_on_load() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test_config.json");

        let mut settings = Settings::default();
        settings.chaser_fade_tick_hz = 5; // below the schema's valid range
        let mut manager = ConfigManager::new(Some(config_path.clone()));
        manager.update_settings(settings).unwrap();

        let mut manager2 = ConfigManager::new(Some(config_path));
        let loaded = manager2.load().unwrap();
        assert_eq!(loaded.chaser_fade_tick_hz, Settings::default().chaser_fade_tick_hz);
    }

    #[test]
    fn schema_has_entries_for_every_setting() {
        let schema = ConfigManager::schema();
        assert!(schema.chaser_fade_tick_hz.valid_range.is_some());
        assert!(schema.lyrics_read_ahead_secs.valid_range.is_some());
        assert!(schema.log_level.valid_choices.is_some());
    }
}
