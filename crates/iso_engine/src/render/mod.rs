//! # Rendering
//!
//! Decides how each entity reaches the screen. Pixels are produced by an
//! external [`Rasterizer`]; this module owns only transform setup and the
//! render cache.
//!
//! ## Architecture
//!
//! - **Surface**: The [`Surface`] and [`Rasterizer`] collaborator traits
//! - **Cache**: Direct rendering, single-entity caches and composite
//!   subtree caches, with dirty propagation through composite chains

pub mod cache;
pub mod surface;

pub use cache::{
    finish_composite, render_entity, set_cache, set_cache_dirty, set_cache_mode, set_composite_cache,
    CacheMode, ChildPass, RenderCache,
};
pub use surface::{Rasterizer, RenderTarget, Surface};
