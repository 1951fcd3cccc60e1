//! Render cache
//!
//! An entity can render straight to its target every tick, or rasterize
//! once into an off-screen surface and replay that surface until something
//! marks it dirty.
//!
//! - `Single` caches just the entity, sized to its own 2D bounds.
//! - `Composite` caches the entity and its whole subtree, sized to the
//!   composite AABB. While the composite is being rebuilt its surface is
//!   taken out of the entity and handed back to the caller as the target for
//!   the children; [`finish_composite`] puts it back and replays it.

use std::fmt;

use crate::foundation::math::{Mat3, Mat3Ext};
use crate::scene::bounds::composite_aabb;
use crate::scene::rect::Rect;
use crate::scene::{Entity, EntityKey, SceneGraph};

use super::surface::{Rasterizer, RenderTarget, Surface};

/// How an entity's pixels are produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CacheMode {
    /// Rasterize every tick
    #[default]
    None,
    /// Cache the entity alone
    Single,
    /// Cache the entity and its descendants together
    Composite,
}

/// Per-entity render cache state
#[derive(Default)]
pub struct RenderCache {
    mode: CacheMode,
    dirty: bool,
    dirty_requested: bool,
    surface: Option<Box<dyn Surface>>,
    composite_aabb: Option<Rect>,
    has_composite_parent: bool,
}

impl fmt::Debug for RenderCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderCache")
            .field("mode", &self.mode)
            .field("dirty", &self.dirty)
            .field("surface", &self.surface.as_ref().map(|s| s.size()))
            .field("composite_aabb", &self.composite_aabb)
            .field("has_composite_parent", &self.has_composite_parent)
            .finish()
    }
}

impl RenderCache {
    /// Caching mode
    pub fn mode(&self) -> CacheMode {
        self.mode
    }

    /// Whether the cached pixels must be regenerated before use
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Cached surface, if one has been created
    pub fn surface(&self) -> Option<&dyn Surface> {
        self.surface.as_deref()
    }

    /// Composite bounds the surface was last sized to
    pub fn composite_aabb(&self) -> Option<Rect> {
        self.composite_aabb
    }

    /// Whether the owning entity's parent composite-caches its subtree
    pub fn has_composite_parent(&self) -> bool {
        self.has_composite_parent
    }

    pub(crate) fn set_has_composite_parent(&mut self, value: bool) {
        self.has_composite_parent = value;
    }

    /// Record that the entity changed; the engine propagates it next tick
    pub(crate) fn request_dirty(&mut self) {
        self.dirty_requested = true;
    }

    pub(crate) fn take_dirty_request(&mut self) -> bool {
        std::mem::take(&mut self.dirty_requested)
    }

    /// Drop the backing surface
    pub fn release_surface(&mut self) {
        if self.surface.take().is_some() {
            log::debug!("Released cache surface");
        }
        self.composite_aabb = None;
    }
}

/// Switch caching mode, keeping single and composite mutually exclusive
pub fn set_cache_mode(graph: &mut SceneGraph, key: EntityKey, mode: CacheMode) {
    let Some(entity) = graph.get_mut(key) else {
        log::warn!("set_cache_mode on unknown entity {:?}", key);
        return;
    };
    let previous = entity.cache.mode;
    if previous == mode {
        return;
    }

    entity.cache.mode = mode;
    entity.cache.dirty = mode != CacheMode::None;
    if mode == CacheMode::None {
        entity.cache.release_surface();
    }

    if previous == CacheMode::Composite || mode == CacheMode::Composite {
        let marker = mode == CacheMode::Composite;
        for child in graph.children(key).to_vec() {
            if let Some(c) = graph.get_mut(child) {
                c.cache.set_has_composite_parent(marker);
            }
        }
    }
    log::debug!("Entity {:?} cache mode {:?} -> {:?}", key, previous, mode);
}

/// Enable or disable single-entity caching
pub fn set_cache(graph: &mut SceneGraph, key: EntityKey, enabled: bool) {
    match (enabled, graph.get(key).map(|e| e.cache.mode)) {
        (true, Some(_)) => set_cache_mode(graph, key, CacheMode::Single),
        (false, Some(CacheMode::Single)) => set_cache_mode(graph, key, CacheMode::None),
        _ => {}
    }
}

/// Enable or disable composite caching
pub fn set_composite_cache(graph: &mut SceneGraph, key: EntityKey, enabled: bool) {
    match (enabled, graph.get(key).map(|e| e.cache.mode)) {
        (true, Some(_)) => set_cache_mode(graph, key, CacheMode::Composite),
        (false, Some(CacheMode::Composite)) => set_cache_mode(graph, key, CacheMode::None),
        _ => {}
    }
}

/// Set an entity's dirty flag
///
/// Dirtying a child of a composite parent dirties the parent too, up the
/// chain. An entity without caching has nothing to regenerate and stays clean.
pub fn set_cache_dirty(graph: &mut SceneGraph, key: EntityKey, dirty: bool) {
    let mut cursor = Some(key);
    while let Some(current) = cursor {
        let Some(entity) = graph.get_mut(current) else {
            return;
        };
        entity.cache.dirty = dirty && entity.cache.mode != CacheMode::None;
        cursor = if dirty && entity.cache.has_composite_parent {
            entity.parent
        } else {
            None
        };
    }
}

/// What the caller should do with an entity's children after rendering it
pub enum ChildPass {
    /// Render children into the same target
    Direct,
    /// Render children into this composite surface, then call [`finish_composite`]
    Composite {
        /// Surface taken out of the entity for the duration of the pass
        surface: Box<dyn Surface>,
        /// Base transform mapping world space into the surface
        base: Mat3,
    },
    /// Children are already part of a replayed cache, or hidden; tick without drawing
    UpdateOnly,
}

impl fmt::Debug for ChildPass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Direct => f.write_str("Direct"),
            Self::Composite { base, .. } => f.debug_struct("Composite").field("base", base).finish(),
            Self::UpdateOnly => f.write_str("UpdateOnly"),
        }
    }
}

fn surface_extent(length: f32, min: u32) -> u32 {
    if length.is_finite() && length > 0.0 {
        (length.ceil() as u32).max(min)
    } else {
        min
    }
}

fn entity_transform(base: &Mat3, entity: &Entity) -> Mat3 {
    let offset = entity.draw_offset();
    base * entity.world_matrix() * Mat3::translation_2d(offset.x, offset.y)
}

fn replay_single(target: &mut RenderTarget<'_>, entity: &Entity) {
    let Some(surface) = entity.cache.surface.as_deref() else {
        return;
    };
    let (w, h) = surface.size();
    target.surface.set_opacity(entity.opacity());
    target.surface.set_transform(&entity_transform(&target.base, entity));
    target.surface.draw_surface(surface, -(w as f32) / 2.0, -(h as f32) / 2.0);
}

fn replay_composite(target: &mut RenderTarget<'_>, entity: &Entity) {
    let (Some(surface), Some(aabb)) = (entity.cache.surface.as_deref(), entity.cache.composite_aabb) else {
        return;
    };
    target.surface.set_opacity(entity.opacity());
    target.surface.set_transform(&target.base);
    target.surface.draw_surface(surface, aabb.x, aabb.y);
}

/// Render one entity into `target`, directly or through its cache
pub fn render_entity(
    graph: &mut SceneGraph,
    key: EntityKey,
    rasterizer: &mut dyn Rasterizer,
    target: &mut RenderTarget<'_>,
    delta: f64,
    min_surface_size: u32,
) -> ChildPass {
    let Some(entity) = graph.get(key) else {
        return ChildPass::UpdateOnly;
    };
    if entity.is_hidden() {
        return ChildPass::UpdateOnly;
    }

    let mode = entity.cache.mode;
    let stale = entity.cache.dirty || entity.cache.surface.is_none();

    match mode {
        CacheMode::None => {
            target.surface.set_opacity(entity.opacity());
            target.surface.set_transform(&entity_transform(&target.base, entity));
            rasterizer.render(&mut *target.surface, entity, delta);
            ChildPass::Direct
        }
        CacheMode::Single => {
            let Some(entity) = graph.get_mut(key) else {
                return ChildPass::UpdateOnly;
            };
            if stale {
                let mut surface = entity.cache.surface.take().unwrap_or_else(|| rasterizer.create_surface());
                let size = entity.bounds2d();
                let (w, h) = (surface_extent(size.x, min_surface_size), surface_extent(size.y, min_surface_size));
                surface.resize(w, h);
                surface.clear();
                surface.set_opacity(1.0);
                surface.set_transform(&Mat3::translation_2d(w as f32 / 2.0, h as f32 / 2.0));
                rasterizer.render(surface.as_mut(), entity, delta);
                entity.cache.surface = Some(surface);
                entity.cache.dirty = false;
                log::trace!("Rebuilt single cache for {}", entity.id());
            }
            replay_single(target, entity);
            ChildPass::Direct
        }
        CacheMode::Composite if stale => {
            let Some(aabb) = composite_aabb(graph, key) else {
                return ChildPass::UpdateOnly;
            };
            let Some(entity) = graph.get_mut(key) else {
                return ChildPass::UpdateOnly;
            };

            let mut surface = entity.cache.surface.take().unwrap_or_else(|| rasterizer.create_surface());
            surface.resize(
                surface_extent(aabb.width, min_surface_size),
                surface_extent(aabb.height, min_surface_size),
            );
            surface.clear();

            let base = Mat3::translation_2d(-aabb.x, -aabb.y);
            surface.set_opacity(1.0);
            surface.set_transform(&entity_transform(&base, entity));
            rasterizer.render(surface.as_mut(), entity, delta);
            entity.cache.composite_aabb = Some(aabb);
            // Children updating during the pass may dirty this entity again
            entity.cache.dirty = false;
            log::trace!("Rebuilding composite cache for {} at {:?}", entity.id(), aabb);

            ChildPass::Composite { surface, base }
        }
        CacheMode::Composite => {
            replay_composite(target, entity);
            ChildPass::UpdateOnly
        }
    }
}

/// Return a composite surface to its entity and replay it
///
/// The dirty flag is left as the children pass set it: a child that moved
/// while rendering into the surface forces a rebuild next tick.
pub fn finish_composite(
    graph: &mut SceneGraph,
    key: EntityKey,
    surface: Box<dyn Surface>,
    target: Option<&mut RenderTarget<'_>>,
) {
    let Some(entity) = graph.get_mut(key) else {
        return;
    };
    entity.cache.surface = Some(surface);
    if let Some(target) = target {
        replay_composite(target, entity);
    }
}
