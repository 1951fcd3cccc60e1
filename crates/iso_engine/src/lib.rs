//! # Iso Engine
//!
//! Scenegraph core for a 2D and isometric entity engine.
//!
//! ## Features
//!
//! - **Transforms**: Parent/child matrix composition with planar and isometric projection
//! - **Bounds**: World-space AABBs and back-to-front isometric depth sorting
//! - **Render Cache**: Per-entity and composite offscreen caching with dirty propagation
//! - **Lifecycle**: Timed birth, death and cascading destruction
//! - **Streaming**: Compact text sync of entity state to remote clients
//! - **Interpolation**: Time-buffered smoothing of streamed transforms
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use iso_engine::prelude::*;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut engine = Engine::new(EngineConfig::default())?;
//!     let ship = engine.spawn(Entity::new().with_translate(10.0, 20.0, 0.0), None)?;
//!     engine.get_mut(ship).ok_or("missing ship")?.rotate_by(0.0, 0.0, 0.5);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

// Core engine modules
pub mod config;
pub mod core;
pub mod foundation;

// Scene and subsystems
pub mod events;
pub mod lifecycle;
pub mod net;
pub mod render;
pub mod scene;

mod engine;

#[cfg(test)]
pub(crate) mod testing;

pub use engine::{Engine, EngineError, ROOT_ID};

/// Common imports for engine users
pub mod prelude {
    pub use crate::{
        core::{Camera, EngineConfig, TickContext},
        events::{EngineEvent, EventHandler, EventType},
        foundation::{
            math::{Mat3, Mat3Ext, Vec2, Vec3},
            time::TickClock,
        },
        lifecycle::{Lifecycle, LifecycleState},
        net::{ClientId, StreamMessage, StreamMode, StreamSection, Transport},
        render::{CacheMode, Rasterizer, Surface},
        scene::{Behaviour, Entity, EntityId, EntityKey, ProjectionMode, Rect, SceneGraph},
        Engine, EngineError,
    };
}
