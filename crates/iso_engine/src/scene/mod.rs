//! Scenegraph
//!
//! Entities, the arena that owns them, and the per-entity transform and
//! bounds computations. Everything here is single-threaded and driven from
//! [`crate::Engine::tick`], parents before children.

pub mod behaviour;
pub mod bounds;
pub mod entity;
pub mod rect;
pub mod scene_graph;
pub mod transform;

#[cfg(test)]
mod tests;

pub use behaviour::{Behaviour, FnBehaviour};
pub use bounds::{composite_aabb, depth_sort_children, is_behind, local_aabb, projection_overlap, world_aabb};
pub use entity::{Entity, EntityFlags, EntityId, EntityKey, Geometry, ProjectionMode};
pub use rect::Rect;
pub use scene_graph::{SceneError, SceneGraph};
pub use transform::{
    local_to_world, mouse_position, recompute_transform, screen_position, world_position, world_rotation_z,
    world_to_local,
};
