//! Configuration management for the sync engine.
//!
//! Loads configuration from TOML files and provides runtime defaults.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,

    #[serde(default)]
    pub solver: SolverConfig,

    #[serde(default)]
    pub timing: TimingConfig,

    #[serde(default)]
    pub extraction: ExtractionConfig,

    #[serde(default)]
    pub presentation: PresentationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Whether the host runs at all
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            log_level: default_log_level(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolverConfig {
    /// Base URL of the solving service; `/solve` is appended
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Per-request timeout
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_seconds: default_timeout(),
        }
    }
}

impl SolverConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingConfig {
    /// Quiet period after a DOM mutation before probing
    #[serde(default = "default_mutation_debounce")]
    pub mutation_debounce_ms: u64,

    /// Quiet period after a page navigation before probing
    #[serde(default = "default_navigation_debounce")]
    pub navigation_debounce_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            mutation_debounce_ms: default_mutation_debounce(),
            navigation_debounce_ms: default_navigation_debounce(),
        }
    }
}

impl TimingConfig {
    pub fn mutation_delay(&self) -> Duration {
        Duration::from_millis(self.mutation_debounce_ms)
    }

    pub fn navigation_delay(&self) -> Duration {
        Duration::from_millis(self.navigation_debounce_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionConfig {
    /// CSS selectors tried in order before the generic text scan
    #[serde(default = "default_selectors")]
    pub selectors: Vec<String>,

    /// Shortest accepted scramble text, in characters
    #[serde(default = "default_min_chars")]
    pub min_chars: usize,

    /// Longest accepted scramble text, in characters
    #[serde(default = "default_max_chars")]
    pub max_chars: usize,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            selectors: default_selectors(),
            min_chars: default_min_chars(),
            max_chars: default_max_chars(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresentationConfig {
    /// Maximum number of solutions in a render model
    #[serde(default = "default_max_solutions")]
    pub max_solutions: usize,
}

impl Default for PresentationConfig {
    fn default() -> Self {
        Self {
            max_solutions: default_max_solutions(),
        }
    }
}

// Default value functions for serde
fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_base_url() -> String {
    "http://localhost:5000".to_string()
}

fn default_timeout() -> u64 {
    30
}

fn default_mutation_debounce() -> u64 {
    500
}

fn default_navigation_debounce() -> u64 {
    1000
}

fn default_selectors() -> Vec<String> {
    vec![
        // csTimer renders the scramble in a styled div; the size changed between releases
        r#"div[style*="font-size: 0.95em"]"#.to_string(),
        r#"div[style*="font-size: 1em"]"#.to_string(),
        "#scrambleDiv".to_string(),
        ".scramble".to_string(),
    ]
}

fn default_min_chars() -> usize {
    3
}

fn default_max_chars() -> usize {
    200
}

fn default_max_solutions() -> usize {
    10
}

impl Config {
    /// Load configuration from the default path
    pub fn load() -> Self {
        Self::load_from_path(Self::default_config_path())
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: PathBuf) -> Self {
        match std::fs::read_to_string(&path) {
            Ok(contents) => match toml::from_str(&contents) {
                Ok(config) => {
                    info!("Loaded configuration from {:?}", path);
                    config
                }
                Err(e) => {
                    warn!("Failed to parse config file: {}, using defaults", e);
                    Self::default()
                }
            },
            Err(_) => {
                info!("No config file found at {:?}, using defaults", path);
                Self::default()
            }
        }
    }

    /// Get the default configuration file path
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("scramble-sync")
            .join("config.toml")
    }

    /// Save configuration to a specific path
    pub fn save_to_path(&self, path: PathBuf) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
        })?;

        std::fs::write(&path, contents)?;
        info!("Saved configuration to {:?}", path);
        Ok(())
    }
}
