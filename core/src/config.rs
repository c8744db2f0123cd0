//! TOML Configuration File Support
//!
//! Centralized configuration loading for the device, supporting a TOML
//! configuration file at `~/.config/treadle/treadle.toml`.
//!
//! # Configuration Priority
//!
//! Configuration values are loaded with the following priority (highest
//! first):
//! 1. CLI arguments (applied by the daemon after loading)
//! 2. Environment variables
//! 3. TOML configuration file
//! 4. Default values
//!
//! # Example Configuration
//!
//! ```toml
//! [model]
//! model = "llama3.2:1b"
//! host = "localhost"
//! port = 11434
//! num_predict = 135
//!
//! [dial]
//! ticks_per_rev = 2048
//! rotations_per_unit = 3
//! max_units = 6
//!
//! [input]
//! echo_every = 3
//!
//! [runtime]
//! poll_interval_ms = 100
//!
//! [transcript]
//! path = "/home/pi/treadle/transcript.jsonl"
//! ```

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The persona prompt the device ships with. The machine answers as
/// William Morris, kept terse enough for a slow panel and always closing
/// with a single discussion question.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are William Morris. Speak as he would. Embody his anarchist philosophies, \
     values, and views on craft, labour, culture, and society. \
     Your entire response must always be under 80 words. This is an absolute limit, \
     never exceed it!!! \
     Generate a response relevant to the prompt within the context of AI and craft. \
     Avoid saying anything that is not historically accurate. \
     You must end the response with one single specific question relevant to the user \
     input that will encourage deep discussion on the effect of AI on craft, labor, \
     society, art, sustainability, or creativity. This is an absolute limit of one \
     question per response; do not exceed it!";

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the config file.
    #[error("failed to read config file at {path}: {source}")]
    Read {
        /// The path that was attempted.
        path: PathBuf,
        /// The underlying IO error.
        source: std::io::Error,
    },

    /// Failed to parse TOML.
    #[error("failed to parse TOML config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value was out of range.
    #[error("invalid configuration: {0}")]
    Validation(String),
}

// =============================================================================
// TOML Layer
// =============================================================================

/// Model section of the TOML configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelToml {
    /// Model identifier to request from the backend.
    pub model: Option<String>,
    /// Backend host.
    pub host: Option<String>,
    /// Backend port.
    pub port: Option<u16>,
    /// Reply-length cap passed to the backend (`num_predict`).
    pub num_predict: Option<u32>,
    /// Override for the persona system prompt.
    pub system_prompt: Option<String>,
}

/// Dial section of the TOML configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DialToml {
    /// Quantized ticks per full revolution of the dial.
    pub ticks_per_rev: Option<u32>,
    /// Full rotations per charge unit.
    pub rotations_per_unit: Option<u32>,
    /// Charge units required for a full charge.
    pub max_units: Option<u8>,
}

/// Input section of the TOML configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct InputToml {
    /// Accepted keystrokes between on-screen echo refreshes.
    pub echo_every: Option<u32>,
}

/// Runtime section of the TOML configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeToml {
    /// Queue polling interval in milliseconds.
    pub poll_interval_ms: Option<u64>,
}

/// Transcript section of the TOML configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscriptToml {
    /// Path of the append-only exchange journal.
    pub path: Option<PathBuf>,
}

/// Root of the TOML configuration file.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceToml {
    /// `[model]` section.
    pub model: ModelToml,
    /// `[dial]` section.
    pub dial: DialToml,
    /// `[input]` section.
    pub input: InputToml,
    /// `[runtime]` section.
    pub runtime: RuntimeToml,
    /// `[transcript]` section.
    pub transcript: TranscriptToml,
}

// =============================================================================
// Resolved Settings
// =============================================================================

/// Resolved model/backend settings.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModelSettings {
    /// Model identifier to request from the backend.
    pub model: String,
    /// Backend host.
    pub host: String,
    /// Backend port.
    pub port: u16,
    /// Reply-length cap passed to the backend (0 = backend default).
    pub num_predict: u32,
    /// Persona system prompt.
    pub system_prompt: String,
}

/// Resolved dial settings.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DialSettings {
    /// Quantized ticks per full revolution of the dial.
    pub ticks_per_rev: u32,
    /// Full rotations per charge unit.
    pub rotations_per_unit: u32,
    /// Charge units required for a full charge.
    pub max_units: u8,
}

/// Resolved keyboard-input settings.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InputSettings {
    /// Accepted keystrokes between on-screen echo refreshes (0 = never).
    pub echo_every: u32,
}

/// Resolved runtime settings.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RuntimeSettings {
    /// Queue polling interval; bounds shutdown latency, not throughput.
    pub poll_interval: Duration,
}

/// Resolved transcript settings.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TranscriptSettings {
    /// Path of the append-only exchange journal.
    pub path: PathBuf,
}

/// The fully resolved device configuration.
#[derive(Clone, Debug, PartialEq)]
pub struct DeviceConfig {
    /// Model/backend settings.
    pub model: ModelSettings,
    /// Dial settings.
    pub dial: DialSettings,
    /// Keyboard-input settings.
    pub input: InputSettings,
    /// Runtime settings.
    pub runtime: RuntimeSettings,
    /// Transcript settings.
    pub transcript: TranscriptSettings,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            model: ModelSettings {
                model: "llama3.2:1b".to_string(),
                host: "localhost".to_string(),
                port: 11434,
                num_predict: 135,
                system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            },
            dial: DialSettings {
                ticks_per_rev: 2048,
                rotations_per_unit: 3,
                max_units: 6,
            },
            input: InputSettings { echo_every: 3 },
            runtime: RuntimeSettings {
                poll_interval: Duration::from_millis(100),
            },
            transcript: TranscriptSettings {
                path: default_transcript_path(),
            },
        }
    }
}

impl DeviceConfig {
    /// Overlay a parsed TOML file onto this configuration.
    pub fn apply_file(&mut self, file: DeviceToml) {
        if let Some(model) = file.model.model {
            self.model.model = model;
        }
        if let Some(host) = file.model.host {
            self.model.host = host;
        }
        if let Some(port) = file.model.port {
            self.model.port = port;
        }
        if let Some(num_predict) = file.model.num_predict {
            self.model.num_predict = num_predict;
        }
        if let Some(system_prompt) = file.model.system_prompt {
            self.model.system_prompt = system_prompt;
        }
        if let Some(ticks_per_rev) = file.dial.ticks_per_rev {
            self.dial.ticks_per_rev = ticks_per_rev;
        }
        if let Some(rotations_per_unit) = file.dial.rotations_per_unit {
            self.dial.rotations_per_unit = rotations_per_unit;
        }
        if let Some(max_units) = file.dial.max_units {
            self.dial.max_units = max_units;
        }
        if let Some(echo_every) = file.input.echo_every {
            self.input.echo_every = echo_every;
        }
        if let Some(ms) = file.runtime.poll_interval_ms {
            self.runtime.poll_interval = Duration::from_millis(ms);
        }
        if let Some(path) = file.transcript.path {
            self.transcript.path = path;
        }
    }

    /// Overlay environment variables onto this configuration.
    ///
    /// Recognized: `TREADLE_MODEL`, `TREADLE_OLLAMA_HOST`,
    /// `TREADLE_OLLAMA_PORT`, `TREADLE_SYSTEM_PROMPT`,
    /// `TREADLE_TRANSCRIPT`.
    pub fn apply_env(&mut self) {
        if let Ok(model) = std::env::var("TREADLE_MODEL") {
            self.model.model = model;
        }
        if let Ok(host) = std::env::var("TREADLE_OLLAMA_HOST") {
            self.model.host = host;
        }
        if let Some(port) = std::env::var("TREADLE_OLLAMA_PORT")
            .ok()
            .and_then(|v| v.parse().ok())
        {
            self.model.port = port;
        }
        if let Ok(prompt) = std::env::var("TREADLE_SYSTEM_PROMPT") {
            self.model.system_prompt = prompt;
        }
        if let Ok(path) = std::env::var("TREADLE_TRANSCRIPT") {
            self.transcript.path = PathBuf::from(path);
        }
    }

    /// Reject configurations that cannot drive the device.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.dial.ticks_per_rev == 0 {
            return Err(ConfigError::Validation(
                "dial.ticks_per_rev must be at least 1".to_string(),
            ));
        }
        if self.dial.rotations_per_unit == 0 {
            return Err(ConfigError::Validation(
                "dial.rotations_per_unit must be at least 1".to_string(),
            ));
        }
        if self.dial.max_units == 0 {
            return Err(ConfigError::Validation(
                "dial.max_units must be at least 1".to_string(),
            ));
        }
        if self.runtime.poll_interval.is_zero() {
            return Err(ConfigError::Validation(
                "runtime.poll_interval_ms must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Default location of the config file
/// (`$XDG_CONFIG_HOME/treadle/treadle.toml`).
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("treadle").join("treadle.toml"))
}

/// Default location of the transcript journal.
fn default_transcript_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("treadle")
        .join("transcript.jsonl")
}

/// Load configuration from the default path, environment, and defaults.
///
/// A missing file is not an error; a present-but-broken file is.
pub fn load_config() -> Result<DeviceConfig, ConfigError> {
    let path = default_config_path().filter(|p| p.exists());
    load_config_inner(path.as_deref())
}

/// Load configuration from an explicit file path.
pub fn load_config_from_path(path: &std::path::Path) -> Result<DeviceConfig, ConfigError> {
    load_config_inner(Some(path))
}

fn load_config_inner(path: Option<&std::path::Path>) -> Result<DeviceConfig, ConfigError> {
    let mut config = DeviceConfig::default();

    if let Some(path) = path {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let file: DeviceToml = toml::from_str(&raw)?;
        config.apply_file(file);
        tracing::info!(path = %path.display(), "loaded config file");
    }

    config.apply_env();
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use pretty_assertions::assert_eq;
    use tempfile::NamedTempFile;

    use super::*;

    #[test]
    fn test_defaults() {
        let config = DeviceConfig::default();
        assert_eq!(config.model.model, "llama3.2:1b");
        assert_eq!(config.model.num_predict, 135);
        assert_eq!(config.dial.ticks_per_rev, 2048);
        assert_eq!(config.dial.rotations_per_unit, 3);
        assert_eq!(config.dial.max_units, 6);
        assert_eq!(config.input.echo_every, 3);
        assert_eq!(config.runtime.poll_interval, Duration::from_millis(100));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_file_overlays_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[model]
model = "llama3.2:3b"
port = 11435

[dial]
rotations_per_unit = 5

[runtime]
poll_interval_ms = 50
"#
        )
        .unwrap();

        let config = load_config_from_path(file.path()).unwrap();
        assert_eq!(config.model.model, "llama3.2:3b");
        assert_eq!(config.model.port, 11435);
        // Untouched sections keep their defaults.
        assert_eq!(config.model.host, "localhost");
        assert_eq!(config.dial.rotations_per_unit, 5);
        assert_eq!(config.dial.max_units, 6);
        assert_eq!(config.runtime.poll_interval, Duration::from_millis(50));
    }

    #[test]
    fn test_broken_file_is_an_error() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "not toml [[[").unwrap();
        assert!(matches!(
            load_config_from_path(file.path()),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_env_overrides_file() {
        // TREADLE_TRANSCRIPT is the one override no other test asserts on,
        // so mutating the process environment here cannot race them.
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[transcript]\npath = \"/from/file.jsonl\"").unwrap();

        std::env::set_var("TREADLE_TRANSCRIPT", "/from/env.jsonl");
        let config = load_config_from_path(file.path()).unwrap();
        std::env::remove_var("TREADLE_TRANSCRIPT");

        assert_eq!(config.transcript.path, PathBuf::from("/from/env.jsonl"));
    }

    #[test]
    fn test_validation_rejects_zero_ratio() {
        let mut config = DeviceConfig::default();
        config.dial.rotations_per_unit = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn test_defaults_round_trip_through_toml() {
        let toml_text = toml::to_string(&DeviceToml::default()).unwrap();
        let parsed: DeviceToml = toml::from_str(&toml_text).unwrap();
        let mut config = DeviceConfig::default();
        config.apply_file(parsed);
        assert_eq!(config, DeviceConfig::default());
    }
}
