//! Scene entities
//!
//! An [`Entity`] is the positionable unit of the scenegraph: local transform
//! inputs, geometry, projection mode, and the per-entity components the
//! engine drives each tick (lifecycle, render cache, stream settings and the
//! interpolation buffer). Derived state (matrices, AABBs) is written only by
//! the transform and bounds engines.

use std::collections::BTreeMap;
use std::fmt;

use crate::foundation::math::utils::{all_finite, clamp};
use crate::foundation::math::{Mat3, Vec2, Vec3};
use crate::lifecycle::Lifecycle;
use crate::net::interpolation::{TimeStream, TransformSnapshot};
use crate::net::stream::StreamSettings;
use crate::render::cache::RenderCache;
use crate::scene::behaviour::Behaviour;
use crate::scene::rect::Rect;

slotmap::new_key_type! {
    /// Arena handle for an entity in a [`crate::scene::SceneGraph`]
    pub struct EntityKey;
}

/// Stable string identifier used on the wire
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, serde::Serialize, serde::Deserialize)]
pub struct EntityId(String);

impl EntityId {
    /// Create an id
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the id as a string
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether no id has been assigned
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntityId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for EntityId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// How an entity's translation maps to the screen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProjectionMode {
    /// Translation used as-is
    #[default]
    Planar,
    /// Translation projected through the 2:1 isometric transform
    Isometric,
}

bitflags::bitflags! {
    /// Boolean entity state
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct EntityFlags: u8 {
        /// Updated but not drawn
        const HIDDEN = 1 << 0;
        /// Streamed updates apply immediately instead of being buffered
        const DISABLE_INTERPOLATION = 1 << 1;
        /// Created from the stream; the next update applies immediately
        const STREAM_JUST_CREATED = 1 << 2;
    }
}

/// 2D and 3D extents of an entity
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Geometry {
    /// Width and height on screen
    pub bounds2d: Vec2,
    /// Width, length and depth in world space
    pub bounds3d: Vec3,
}

impl Default for Geometry {
    fn default() -> Self {
        Self {
            bounds2d: Vec2::new(40.0, 40.0),
            bounds3d: Vec3::new(40.0, 40.0, 0.0),
        }
    }
}

impl Geometry {
    /// Half of `bounds2d`
    pub fn half_2d(&self) -> Vec2 {
        self.bounds2d * 0.5
    }

    /// Half of `bounds3d`
    pub fn half_3d(&self) -> Vec3 {
        self.bounds3d * 0.5
    }

    /// Depth (z extent)
    pub fn depth(&self) -> f32 {
        self.bounds3d.z
    }
}

/// A node in the scenegraph
pub struct Entity {
    id: EntityId,
    type_name: String,
    pub(crate) parent: Option<EntityKey>,
    pub(crate) children: Vec<EntityKey>,

    translate: Vec3,
    rotate: Vec3,
    scale: Vec3,
    origin: Vec3,
    geometry: Geometry,
    anchor: Vec2,
    opacity: f32,
    mode: ProjectionMode,
    flags: EntityFlags,
    custom_sections: BTreeMap<String, String>,

    pub(crate) local_matrix: Mat3,
    pub(crate) world_matrix: Mat3,
    pub(crate) aabb: Option<Rect>,
    pub(crate) local_aabb: Option<Rect>,
    pub(crate) last_tick: Option<u64>,

    pub(crate) lifecycle: Lifecycle,
    pub(crate) cache: RenderCache,
    pub(crate) stream: StreamSettings,
    pub(crate) time_stream: TimeStream,
    behaviours: Vec<Box<dyn Behaviour>>,
}

impl Default for Entity {
    fn default() -> Self {
        Self {
            id: EntityId::default(),
            type_name: "Entity".to_string(),
            parent: None,
            children: Vec::new(),
            translate: Vec3::zeros(),
            rotate: Vec3::zeros(),
            scale: Vec3::new(1.0, 1.0, 1.0),
            origin: Vec3::new(0.5, 0.5, 0.5),
            geometry: Geometry::default(),
            anchor: Vec2::zeros(),
            opacity: 1.0,
            mode: ProjectionMode::Planar,
            flags: EntityFlags::empty(),
            custom_sections: BTreeMap::new(),
            local_matrix: Mat3::identity(),
            world_matrix: Mat3::identity(),
            aabb: None,
            local_aabb: None,
            last_tick: None,
            lifecycle: Lifecycle::new(),
            cache: RenderCache::default(),
            stream: StreamSettings::default(),
            time_stream: TimeStream::default(),
            behaviours: Vec::new(),
        }
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entity")
            .field("id", &self.id)
            .field("type_name", &self.type_name)
            .field("parent", &self.parent)
            .field("children", &self.children)
            .field("translate", &self.translate)
            .field("rotate", &self.rotate)
            .field("scale", &self.scale)
            .field("mode", &self.mode)
            .field("flags", &self.flags)
            .field("lifecycle", &self.lifecycle)
            .field("cache", &self.cache)
            .field("behaviours", &self.behaviours.len())
            .finish_non_exhaustive()
    }
}

impl Entity {
    /// Create an entity with default geometry at the origin
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder pattern: Set the wire id
    pub fn with_id(mut self, id: impl Into<EntityId>) -> Self {
        self.id = id.into();
        self
    }

    /// Builder pattern: Set the type name sent in create messages
    pub fn with_type_name(mut self, type_name: impl Into<String>) -> Self {
        self.type_name = type_name.into();
        self
    }

    /// Builder pattern: Set the projection mode
    pub fn with_mode(mut self, mode: ProjectionMode) -> Self {
        self.mode = mode;
        self
    }

    /// Builder pattern: Set translation
    pub fn with_translate(mut self, x: f32, y: f32, z: f32) -> Self {
        self.translate_to(x, y, z);
        self
    }

    /// Builder pattern: Set 2D bounds
    pub fn with_bounds2d(mut self, width: f32, height: f32) -> Self {
        self.set_bounds2d(width, height);
        self
    }

    /// Builder pattern: Set 3D bounds
    pub fn with_bounds3d(mut self, x: f32, y: f32, z: f32) -> Self {
        self.set_bounds3d(x, y, z);
        self
    }

    /// Builder pattern: Set stream settings
    pub fn with_stream(mut self, stream: StreamSettings) -> Self {
        self.stream = stream;
        self
    }

    /// Wire id
    pub fn id(&self) -> &EntityId {
        &self.id
    }

    pub(crate) fn set_id(&mut self, id: EntityId) {
        self.id = id;
    }

    /// Type name
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Parent handle
    pub fn parent(&self) -> Option<EntityKey> {
        self.parent
    }

    /// Child handles in mount order
    pub fn children(&self) -> &[EntityKey] {
        &self.children
    }

    fn accept(&self, op: &str, values: &[f32]) -> bool {
        if all_finite(values) {
            true
        } else {
            log::warn!("{}: ignoring non-finite input {:?} on entity '{}'", op, values, self.id);
            false
        }
    }

    // ---- transform inputs ----

    /// Local translation
    pub fn translate(&self) -> Vec3 {
        self.translate
    }

    /// Set local translation
    pub fn translate_to(&mut self, x: f32, y: f32, z: f32) {
        if self.accept("translate_to", &[x, y, z]) {
            self.translate = Vec3::new(x, y, z);
            self.cache.request_dirty();
        }
    }

    /// Offset local translation
    pub fn translate_by(&mut self, x: f32, y: f32, z: f32) {
        if self.accept("translate_by", &[x, y, z]) {
            self.translate += Vec3::new(x, y, z);
            self.cache.request_dirty();
        }
    }

    /// Rotation in radians per axis; only z feeds the transform
    pub fn rotate(&self) -> Vec3 {
        self.rotate
    }

    /// Set rotation
    pub fn rotate_to(&mut self, x: f32, y: f32, z: f32) {
        if self.accept("rotate_to", &[x, y, z]) {
            self.rotate = Vec3::new(x, y, z);
            self.cache.request_dirty();
        }
    }

    /// Offset rotation
    pub fn rotate_by(&mut self, x: f32, y: f32, z: f32) {
        if self.accept("rotate_by", &[x, y, z]) {
            self.rotate += Vec3::new(x, y, z);
            self.cache.request_dirty();
        }
    }

    /// Scale per axis
    pub fn scale(&self) -> Vec3 {
        self.scale
    }

    /// Set scale
    pub fn scale_to(&mut self, x: f32, y: f32, z: f32) {
        if self.accept("scale_to", &[x, y, z]) {
            self.scale = Vec3::new(x, y, z);
            self.cache.request_dirty();
        }
    }

    /// Offset scale
    pub fn scale_by(&mut self, x: f32, y: f32, z: f32) {
        if self.accept("scale_by", &[x, y, z]) {
            self.scale += Vec3::new(x, y, z);
            self.cache.request_dirty();
        }
    }

    /// Normalized pivot, 0.5 is the center
    pub fn origin(&self) -> Vec3 {
        self.origin
    }

    /// Set the normalized pivot
    pub fn set_origin(&mut self, x: f32, y: f32, z: f32) {
        if self.accept("set_origin", &[x, y, z]) {
            self.origin = Vec3::new(x, y, z);
            self.cache.request_dirty();
        }
    }

    /// Pixel offset of the pivot from the geometric center
    pub fn origin_offset(&self) -> Vec2 {
        let size = self.geometry.bounds2d;
        Vec2::new(size.x * (0.5 - self.origin.x), size.y * (0.5 - self.origin.y))
    }

    /// Anchor offset
    pub fn anchor(&self) -> Vec2 {
        self.anchor
    }

    /// Set anchor offset
    pub fn set_anchor(&mut self, x: f32, y: f32) {
        if self.accept("set_anchor", &[x, y]) {
            self.anchor = Vec2::new(x, y);
            self.cache.request_dirty();
        }
    }

    /// Anchor plus origin offset, where the entity is drawn relative to its matrix
    pub fn draw_offset(&self) -> Vec2 {
        self.anchor + self.origin_offset()
    }

    // ---- geometry ----

    /// 2D and 3D bounds
    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    /// Width and height
    pub fn bounds2d(&self) -> Vec2 {
        self.geometry.bounds2d
    }

    /// Set width and height
    pub fn set_bounds2d(&mut self, width: f32, height: f32) {
        if self.accept("set_bounds2d", &[width, height]) {
            self.geometry.bounds2d = Vec2::new(width, height);
            self.cache.request_dirty();
        }
    }

    /// Width, length and depth
    pub fn bounds3d(&self) -> Vec3 {
        self.geometry.bounds3d
    }

    /// Set width, length and depth
    pub fn set_bounds3d(&mut self, x: f32, y: f32, z: f32) {
        if self.accept("set_bounds3d", &[x, y, z]) {
            self.geometry.bounds3d = Vec3::new(x, y, z);
            self.cache.request_dirty();
        }
    }

    // ---- appearance ----

    /// Opacity in [0, 1]
    pub fn opacity(&self) -> f32 {
        self.opacity
    }

    /// Set opacity, clamped to [0, 1]
    pub fn set_opacity(&mut self, opacity: f32) {
        if self.accept("set_opacity", &[opacity]) {
            self.opacity = clamp(opacity, 0.0, 1.0);
        }
    }

    /// Projection mode
    pub fn mode(&self) -> ProjectionMode {
        self.mode
    }

    /// Set projection mode
    pub fn set_mode(&mut self, mode: ProjectionMode) {
        self.mode = mode;
        self.cache.request_dirty();
    }

    /// Boolean state flags
    pub fn flags(&self) -> EntityFlags {
        self.flags
    }

    /// Whether the entity is skipped when drawing
    pub fn is_hidden(&self) -> bool {
        self.flags.contains(EntityFlags::HIDDEN)
    }

    /// Hide or show the entity and its children
    pub fn set_hidden(&mut self, hidden: bool) {
        self.flags.set(EntityFlags::HIDDEN, hidden);
    }

    /// Whether streamed updates bypass the time stream
    pub fn interpolation_disabled(&self) -> bool {
        self.flags.contains(EntityFlags::DISABLE_INTERPOLATION)
    }

    /// Apply streamed updates immediately instead of buffering them
    pub fn set_interpolation_disabled(&mut self, disabled: bool) {
        self.flags.set(EntityFlags::DISABLE_INTERPOLATION, disabled);
    }

    pub(crate) fn set_flag(&mut self, flag: EntityFlags, value: bool) {
        self.flags.set(flag, value);
    }

    // ---- stream payloads ----

    /// Translate, scale, rotate as streamed
    pub fn transform_snapshot(&self) -> TransformSnapshot {
        let (t, s, r) = (self.translate, self.scale, self.rotate);
        [t.x, t.y, t.z, s.x, s.y, s.z, r.x, r.y, r.z]
    }

    /// Overwrite translate, scale and rotate from a streamed snapshot
    pub fn apply_snapshot(&mut self, values: &TransformSnapshot) {
        if !self.accept("apply_snapshot", values) {
            return;
        }
        self.translate = Vec3::new(values[0], values[1], values[2]);
        self.scale = Vec3::new(values[3], values[4], values[5]);
        self.rotate = Vec3::new(values[6], values[7], values[8]);
    }

    /// Payload of a game-defined stream section
    pub fn custom_section(&self, name: &str) -> Option<&str> {
        self.custom_sections.get(name).map(String::as_str)
    }

    /// Set the payload of a game-defined stream section
    pub fn set_custom_section(&mut self, name: impl Into<String>, payload: impl Into<String>) {
        self.custom_sections.insert(name.into(), payload.into());
    }

    // ---- derived state ----

    /// Matrix relative to the parent
    pub fn local_matrix(&self) -> &Mat3 {
        &self.local_matrix
    }

    /// Parent world matrix times local matrix
    pub fn world_matrix(&self) -> &Mat3 {
        &self.world_matrix
    }

    /// World AABB from the last bounds pass
    pub fn cached_aabb(&self) -> Option<Rect> {
        self.aabb
    }

    /// Index of the last tick this entity was processed in
    pub fn last_tick(&self) -> Option<u64> {
        self.last_tick
    }

    // ---- components ----

    /// Lifecycle state
    pub fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    /// Mutable lifecycle state
    pub fn lifecycle_mut(&mut self) -> &mut Lifecycle {
        &mut self.lifecycle
    }

    /// Whether the entity has not been destroyed
    pub fn is_alive(&self) -> bool {
        self.lifecycle.is_alive()
    }

    /// Destroy the entity `ms` milliseconds after `now`
    pub fn set_life_span(&mut self, ms: f64, now: f64) {
        self.lifecycle.set_life_span(ms, now);
    }

    /// Render cache
    pub fn cache(&self) -> &RenderCache {
        &self.cache
    }

    /// Stream settings
    pub fn stream(&self) -> &StreamSettings {
        &self.stream
    }

    /// Mutable stream settings
    pub fn stream_mut(&mut self) -> &mut StreamSettings {
        &mut self.stream
    }

    /// Interpolation buffer
    pub fn time_stream(&self) -> &TimeStream {
        &self.time_stream
    }

    /// Mutable interpolation buffer
    pub fn time_stream_mut(&mut self) -> &mut TimeStream {
        &mut self.time_stream
    }

    // ---- behaviours ----

    /// Attach a behaviour
    pub fn add_behaviour(&mut self, behaviour: Box<dyn Behaviour>) {
        self.behaviours.push(behaviour);
    }

    /// Detach every behaviour with the given id; returns whether any was removed
    pub fn remove_behaviour(&mut self, id: &str) -> bool {
        let before = self.behaviours.len();
        self.behaviours.retain(|b| b.id() != id);
        before != self.behaviours.len()
    }

    /// Number of attached behaviours
    pub fn behaviour_count(&self) -> usize {
        self.behaviours.len()
    }

    pub(crate) fn take_behaviours(&mut self) -> Vec<Box<dyn Behaviour>> {
        std::mem::take(&mut self.behaviours)
    }

    /// Put behaviours back after running them; any added meanwhile go last
    pub(crate) fn restore_behaviours(&mut self, mut behaviours: Vec<Box<dyn Behaviour>>) {
        behaviours.append(&mut self.behaviours);
        self.behaviours = behaviours;
    }
}
