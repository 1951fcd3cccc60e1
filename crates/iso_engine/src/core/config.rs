//! # Engine Configuration
//!
//! Settings for every subsystem of the scenegraph core, grouped the same way
//! the subsystems are: streaming, interpolation, render caching and engine
//! behaviour. All structs serialize to TOML/RON through [`Config`].

use serde::{Serialize, Deserialize};

pub use crate::config::{Config, ConfigError};

/// Smallest interval a stream sync interval may be set to, in milliseconds.
/// Anything lower clears the interval instead.
pub const MIN_SYNC_INTERVAL_MS: f64 = 16.0;

/// Default number of decimals written for streamed floats
pub const DEFAULT_FLOAT_PRECISION: u8 = 2;

/// Default character that opens every stream section
pub const DEFAULT_SECTION_DESIGNATOR: char = '¬';

/// Default time-stream buffer capacity
pub const DEFAULT_TIME_STREAM_CAPACITY: usize = 10;

/// # Stream Configuration
///
/// Controls how entity state is serialized into delta strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Decimal places for streamed floats
    pub float_precision: u8,
    /// Character written before each section payload
    pub section_designator: char,
    /// Sections new entities stream by default, in wire order
    pub default_sections: Vec<String>,
}

impl StreamConfig {
    /// Create a new stream configuration
    pub fn new() -> Self {
        Self {
            float_precision: DEFAULT_FLOAT_PRECISION,
            section_designator: DEFAULT_SECTION_DESIGNATOR,
            default_sections: vec!["transform".to_string()],
        }
    }

    /// Set float precision
    pub fn with_float_precision(mut self, precision: u8) -> Self {
        self.float_precision = precision;
        self
    }

    /// Set the section designator
    pub fn with_section_designator(mut self, designator: char) -> Self {
        self.section_designator = designator;
        self
    }

    /// Set the default section list
    pub fn with_default_sections<I, S>(mut self, sections: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.default_sections = sections.into_iter().map(Into::into).collect();
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.float_precision > 8 {
            return Err(format!("Float precision {} exceeds 8 decimals", self.float_precision));
        }
        if self.section_designator == ',' || self.section_designator.is_ascii_digit() {
            return Err(format!(
                "Section designator '{}' collides with value encoding",
                self.section_designator
            ));
        }
        if self.default_sections.iter().any(String::is_empty) {
            return Err("Section names cannot be empty".to_string());
        }
        Ok(())
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// # Interpolation Configuration
///
/// Receiving-side smoothing of streamed transforms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InterpolationConfig {
    /// How far behind the current time entities are rendered, in milliseconds
    pub render_latency_ms: f64,
    /// Maximum buffered snapshots per entity
    pub time_stream_capacity: usize,
}

impl InterpolationConfig {
    /// Create a new interpolation configuration
    pub fn new() -> Self {
        Self {
            render_latency_ms: 100.0,
            time_stream_capacity: DEFAULT_TIME_STREAM_CAPACITY,
        }
    }

    /// Set render latency
    pub fn with_render_latency(mut self, latency_ms: f64) -> Self {
        self.render_latency_ms = latency_ms;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if !self.render_latency_ms.is_finite() || self.render_latency_ms < 0.0 {
            return Err("Render latency must be a non-negative number".to_string());
        }
        if self.time_stream_capacity < 2 {
            return Err("Time stream needs room for at least two samples".to_string());
        }
        Ok(())
    }
}

impl Default for InterpolationConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// # Render Cache Configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderCacheConfig {
    /// Smallest edge, in pixels, an off-screen cache surface is given
    pub min_surface_size: u32,
}

impl Default for RenderCacheConfig {
    fn default() -> Self {
        Self { min_surface_size: 1 }
    }
}

/// # Engine Configuration
///
/// Top-level configuration for the scenegraph core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Log level used by [`crate::foundation::logging::init_from_config`]
    pub log_level: String,
    /// Stream encoding settings
    pub stream: StreamConfig,
    /// Interpolation settings
    pub interpolation: InterpolationConfig,
    /// Render cache settings
    pub render_cache: RenderCacheConfig,
}

impl EngineConfig {
    /// Create a new engine configuration
    pub fn new() -> Self {
        Self {
            log_level: "info".to_string(),
            stream: StreamConfig::default(),
            interpolation: InterpolationConfig::default(),
            render_cache: RenderCacheConfig::default(),
        }
    }

    /// Set log level
    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    /// Set stream configuration
    pub fn with_stream(mut self, stream: StreamConfig) -> Self {
        self.stream = stream;
        self
    }

    /// Set interpolation configuration
    pub fn with_interpolation(mut self, interpolation: InterpolationConfig) -> Self {
        self.interpolation = interpolation;
        self
    }

    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.stream.validate().map_err(ConfigError::Invalid)?;
        self.interpolation.validate().map_err(ConfigError::Invalid)?;
        if self.render_cache.min_surface_size == 0 {
            return Err(ConfigError::Invalid("Cache surfaces need at least 1px".to_string()));
        }
        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl Config for EngineConfig {}
