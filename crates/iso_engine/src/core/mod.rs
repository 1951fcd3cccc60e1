//! # Core Engine Module
//!
//! Shared abstractions every subsystem depends on.
//!
//! ## Organization
//!
//! - **Config**: Unified configuration for streaming, interpolation and caching
//! - **Context**: The per-tick context object (time, camera, client roster)

pub mod config;
pub mod context;

// Re-export commonly used types
pub use config::{
    Config,
    ConfigError,
    EngineConfig,
    InterpolationConfig,
    RenderCacheConfig,
    StreamConfig,
};
pub use context::{Camera, TickContext};
