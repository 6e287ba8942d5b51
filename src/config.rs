//! # Configuration Management
//!
//! This module handles loading and parsing configuration from the
//! counter-config.toml file. It covers where counters are fetched from, how
//! often, how the strip is wired, and which views the display cycles through.

use crate::counter_data::FailurePolicy;
use crate::layout::{DisplayLayout, LayoutError};
use serde::{Deserialize, Serialize};
use smart_leds::RGB8;
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Default configuration file name, looked up in the working directory.
pub const DEFAULT_PATH: &str = "counter-config.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("config IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid config file format: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("could not serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("invalid display layout: {0}")]
    Layout(#[from] LayoutError),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Application configuration loaded from counter-config.toml
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct Config {
    /// Remote stats endpoint and the counters read from it
    pub source: SourceConfig,
    /// Strip geometry and view cycling
    pub display: DisplayConfig,
}

/// Remote stats endpoint configuration
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct SourceConfig {
    /// URL of the JSON stats document
    pub url: String,
    /// Numeric key read inside every counter's section
    pub field: String,
    /// Per-request timeout covering connect, headers and body
    pub timeout_ms: u64,
    /// Seconds between polls
    pub poll_interval_secs: u64,
    /// What a failed poll does to the counters
    #[serde(default)]
    pub on_failure: FailurePolicy,
    /// Counters in display order
    pub counters: Vec<CounterSource>,
}

/// One counter and the document section it is read from
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct CounterSource {
    pub name: String,
    pub section: String,
}

/// Display geometry and view configuration
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct DisplayConfig {
    /// Number of glyph slots
    pub digit_count: usize,
    /// LEDs wired in series for each segment
    pub emitters_per_segment: usize,
    /// LEDs on the strip, at least digit_count * 7 * emitters_per_segment
    pub total_emitters: usize,
    /// Milliseconds between repaints
    pub render_interval_ms: u64,
    /// Seconds each view stays on screen
    pub view_window_secs: u64,
    /// Color of unlit emitters
    pub off_color: [u8; 3],
    /// Views in cycling order
    pub views: Vec<ViewConfig>,
    /// SPI device driving the LED chain (hardware builds only)
    #[serde(default = "default_spi_device")]
    pub spi_device: String,
}

fn default_spi_device() -> String {
    "/dev/spidev0.0".to_string()
}

/// One entry in the view cycle
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ViewConfig {
    /// A single counter as a zero-padded number
    Counter {
        counter: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        color: Option<[u8; 3]>,
    },
    /// The sum of several counters
    Sum {
        counters: Vec<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        color: Option<[u8; 3]>,
    },
    /// A fixed message
    Text {
        text: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        color: Option<[u8; 3]>,
    },
}

/// Lit color used when a view does not name one.
pub const DEFAULT_COLOR: [u8; 3] = [255, 0, 255];

impl Default for Config {
    fn default() -> Self {
        let counter = |name: &str, section: &str| CounterSource {
            name: name.to_string(),
            section: section.to_string(),
        };
        let single = |name: &str, color: [u8; 3]| ViewConfig::Counter {
            counter: name.to_string(),
            color: Some(color),
        };

        Config {
            source: SourceConfig {
                url: "http://127.0.0.1:8080/api/stats".to_string(),
                field: "counter".to_string(),
                timeout_ms: 5_000,
                poll_interval_secs: 60,
                on_failure: FailurePolicy::Retain,
                counters: vec![
                    counter("go_matches", "matches_go"),
                    counter("ffa_matches", "matches_ffa"),
                    counter("arena_games", "games_arena"),
                    counter("generated_characters", "characters_generated"),
                ],
            },
            display: DisplayConfig {
                digit_count: 5,
                emitters_per_segment: 2,
                total_emitters: 70,
                render_interval_ms: 100,
                view_window_secs: 5,
                off_color: [0, 0, 0],
                views: vec![
                    ViewConfig::Sum {
                        counters: vec!["go_matches".to_string(), "ffa_matches".to_string()],
                        color: Some(DEFAULT_COLOR),
                    },
                    single("go_matches", [0, 255, 0]),
                    single("ffa_matches", [0, 255, 255]),
                    single("arena_games", [255, 255, 0]),
                    single("generated_characters", [255, 255, 255]),
                ],
                spi_device: default_spi_device(),
            },
        }
    }
}

impl Config {
    /// Load configuration from counter-config.toml
    /// Falls back to default configuration if file doesn't exist or is invalid
    pub fn load() -> Self {
        Self::load_from_path(DEFAULT_PATH)
    }

    /// Load configuration from specified path
    /// Falls back to default configuration if file doesn't exist or is invalid
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        match Self::try_load_from_path(path) {
            Ok(config) => {
                log::info!(
                    "Loaded configuration from {} ({} counters, {} views)",
                    path.display(),
                    config.source.counters.len(),
                    config.display.views.len()
                );
                config
            }
            Err(ConfigError::Io(_)) => {
                log::info!(
                    "No config file at {}, using default configuration",
                    path.display()
                );
                Self::default()
            }
            Err(e) => {
                log::warn!("{}: {}", path.display(), e);
                log::warn!("Using default configuration");
                Self::default()
            }
        }
    }

    /// Load and validate, reporting why a file was rejected.
    pub fn try_load_from_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Save current configuration to `path`
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let contents = toml::to_string_pretty(self)?;
        fs::write(&path, contents)?;
        log::info!("Configuration saved to {}", path.as_ref().display());
        Ok(())
    }

    /// Check cross-field consistency.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| Err(ConfigError::Invalid(msg));

        self.layout()?;

        if self.source.counters.is_empty() {
            return invalid("at least one counter is required".into());
        }
        let mut names = HashSet::new();
        for counter in &self.source.counters {
            if !names.insert(counter.name.as_str()) {
                return invalid(format!("duplicate counter name {:?}", counter.name));
            }
        }

        if self.source.timeout_ms == 0 {
            return invalid("source.timeout_ms must be positive".into());
        }
        if self.source.poll_interval_secs == 0 {
            return invalid("source.poll_interval_secs must be positive".into());
        }
        if self.display.render_interval_ms == 0 {
            return invalid("display.render_interval_ms must be positive".into());
        }
        if self.display.view_window_secs == 0 {
            return invalid("display.view_window_secs must be positive".into());
        }

        if self.display.views.is_empty() {
            return invalid("at least one view is required".into());
        }
        for view in &self.display.views {
            let referenced: Vec<&String> = match view {
                ViewConfig::Counter { counter, .. } => vec![counter],
                ViewConfig::Sum { counters, .. } => counters.iter().collect(),
                ViewConfig::Text { .. } => Vec::new(),
            };
            if let Some(unknown) = referenced.iter().find(|n| !names.contains(n.as_str())) {
                return invalid(format!("view references unknown counter {unknown:?}"));
            }
        }

        Ok(())
    }

    pub fn layout(&self) -> Result<DisplayLayout, LayoutError> {
        DisplayLayout::new(
            self.display.digit_count,
            self.display.emitters_per_segment,
            self.display.total_emitters,
        )
    }

    pub fn counter_names(&self) -> impl Iterator<Item = &str> {
        self.source.counters.iter().map(|c| c.name.as_str())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.source.poll_interval_secs)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.source.timeout_ms)
    }

    pub fn render_interval(&self) -> Duration {
        Duration::from_millis(self.display.render_interval_ms)
    }

    pub fn view_window(&self) -> Duration {
        Duration::from_secs(self.display.view_window_secs)
    }

    pub fn off_color(&self) -> RGB8 {
        rgb(self.display.off_color)
    }
}

pub fn rgb([r, g, b]: [u8; 3]) -> RGB8 {
    RGB8::new(r, g, b)
}
