//! Foundation module - Core utilities and types
//!
//! This module provides fundamental utilities used throughout the engine:
//! - Math types and operations (2D affine, isometric projection)
//! - Tick clock
//! - Logging utilities

pub mod math;
pub mod time;
pub mod logging;
