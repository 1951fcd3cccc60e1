//! Core engine implementation
//!
//! [`Engine`] owns the scenegraph, the stream synchronizer and the event
//! queue, and runs the per-tick pipeline over every entity, depth first and
//! in mount order:
//!
//! ```text
//! lifecycle -> behaviours -> interpolation -> transform -> AABB
//!           -> render / replay -> stream sync -> children
//! ```

use crate::core::{EngineConfig, TickContext};
use crate::config::ConfigError;
use crate::events::{EngineEvent, EventHandler, EventSystem, EventType};
use crate::net::interpolation::{process_interpolate, TimeStream};
use crate::net::{
    ClientId, Received, StreamError, StreamMessage, StreamMode, StreamReceiver, StreamSettings,
    StreamSynchronizer, Transport,
};
use crate::render::cache::{finish_composite, render_entity, set_cache_dirty, set_cache_mode, CacheMode, ChildPass};
use crate::render::surface::{Rasterizer, RenderTarget, Surface};
use crate::scene::bounds::{depth_sort_children, world_aabb};
use crate::scene::transform::recompute_transform;
use crate::scene::{Entity, EntityId, EntityKey, SceneError, SceneGraph};

/// Id of the implicit root entity
pub const ROOT_ID: &str = "root";

/// Engine-level errors
#[derive(thiserror::Error, Debug)]
pub enum EngineError {
    /// Structural scenegraph error
    #[error("Scene error: {0}")]
    Scene(#[from] SceneError),

    /// Stream decode or apply error
    #[error("Stream error: {0}")]
    Stream(#[from] StreamError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Key is not in the scenegraph
    #[error("Unknown entity key {0:?}")]
    UnknownEntity(EntityKey),

    /// The root entity cannot be destroyed or re-mounted
    #[error("The root entity cannot be modified this way")]
    RootEntity,
}

/// Scenegraph engine core
///
/// All state the tick needs arrives through [`TickContext`]; the engine
/// keeps no clock of its own.
pub struct Engine {
    config: EngineConfig,
    graph: SceneGraph,
    root: EntityKey,
    stream: StreamSynchronizer,
    receiver: StreamReceiver,
    events: EventSystem,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.config)
            .field("entities", &self.graph.len())
            .field("root", &self.root)
            .field("stream", &self.stream)
            .finish_non_exhaustive()
    }
}

impl Engine {
    /// Create an engine with an empty scene
    pub fn new(config: EngineConfig) -> Result<Self, EngineError> {
        config.validate()?;

        let mut graph = SceneGraph::new();
        let root = graph.insert(
            Entity::new()
                .with_id(ROOT_ID)
                .with_type_name("Root")
                .with_bounds2d(0.0, 0.0)
                .with_bounds3d(0.0, 0.0, 0.0),
        )?;

        log::info!(
            "Engine initialized (precision {}, render latency {}ms)",
            config.stream.float_precision,
            config.interpolation.render_latency_ms
        );

        Ok(Self {
            stream: StreamSynchronizer::new(config.stream.clone()),
            receiver: StreamReceiver::new(config.stream.clone())
                .with_time_stream_capacity(config.interpolation.time_stream_capacity),
            events: EventSystem::new(),
            config,
            graph,
            root,
        })
    }

    /// Active configuration
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Key of the root entity
    pub fn root(&self) -> EntityKey {
        self.root
    }

    /// The scenegraph
    pub fn graph(&self) -> &SceneGraph {
        &self.graph
    }

    /// Mutable scenegraph access
    pub fn graph_mut(&mut self) -> &mut SceneGraph {
        &mut self.graph
    }

    /// Borrow an entity
    pub fn get(&self, key: EntityKey) -> Option<&Entity> {
        self.graph.get(key)
    }

    /// Mutably borrow an entity
    pub fn get_mut(&mut self, key: EntityKey) -> Option<&mut Entity> {
        self.graph.get_mut(key)
    }

    /// Entity preconfigured with the engine's stream and interpolation settings
    pub fn create_entity(&self) -> Entity {
        let mut entity = Entity::new().with_stream(StreamSettings::from_config(&self.config.stream));
        *entity.time_stream_mut() = TimeStream::with_capacity(self.config.interpolation.time_stream_capacity);
        entity
    }

    /// Insert `entity` and mount it under `parent`, or the root
    pub fn spawn(&mut self, entity: Entity, parent: Option<EntityKey>) -> Result<EntityKey, EngineError> {
        let parent = parent.unwrap_or(self.root);
        if !self.graph.contains(parent) {
            return Err(EngineError::UnknownEntity(parent));
        }

        let key = self.graph.insert(entity)?;
        if let Err(e) = self.graph.mount(key, parent) {
            self.graph.remove(key);
            return Err(e.into());
        }
        if let Some(entity) = self.graph.get(key) {
            log::debug!("Spawned {} ({})", entity.id(), entity.type_name());
        }
        Ok(key)
    }

    /// Move `child` under `parent`
    pub fn mount(&mut self, child: EntityKey, parent: EntityKey) -> Result<(), EngineError> {
        if child == self.root {
            return Err(EngineError::RootEntity);
        }
        self.graph.mount(child, parent)?;
        Ok(())
    }

    /// Switch an entity's render cache mode
    pub fn set_cache_mode(&mut self, key: EntityKey, mode: CacheMode) -> Result<(), EngineError> {
        if !self.graph.contains(key) {
            return Err(EngineError::UnknownEntity(key));
        }
        set_cache_mode(&mut self.graph, key, mode);
        Ok(())
    }

    /// Reorder `parent`'s children back to front
    pub fn depth_sort(&mut self, parent: EntityKey) -> Result<(), EngineError> {
        if !self.graph.contains(parent) {
            return Err(EngineError::UnknownEntity(parent));
        }
        depth_sort_children(&mut self.graph, parent);
        Ok(())
    }

    /// Destroy an entity and its whole subtree
    ///
    /// Destroying an entity that is already being destroyed is a no-op.
    pub fn destroy(&mut self, key: EntityKey) -> Result<(), EngineError> {
        if key == self.root {
            return Err(EngineError::RootEntity);
        }
        let entity = self.graph.get_mut(key).ok_or(EngineError::UnknownEntity(key))?;
        if !entity.lifecycle_mut().begin_destroy() {
            return Ok(());
        }

        for child in self.graph.children(key).to_vec() {
            if let Err(e) = self.destroy(child) {
                log::error!("Failed to destroy child {:?}: {}", child, e);
            }
        }

        let Some(entity) = self.graph.get_mut(key) else {
            return Err(EngineError::UnknownEntity(key));
        };
        let id = entity.id().clone();
        entity.cache.release_surface();
        // No client was sent a create, so there is nothing to tear down remotely
        if entity.stream().mode() == StreamMode::Disabled || !self.stream.is_streamed(&id) {
            self.stream.forget_entity(&id);
        } else {
            self.stream.stream_destroy(&id, None);
            self.events.send(EngineEvent::StreamDestroyed { id: id.clone() });
        }
        entity.lifecycle_mut().finish_destroy();

        self.graph.remove(key);
        log::info!("Destroyed entity {}", id);
        self.events.send(EngineEvent::Destroyed { id });
        Ok(())
    }

    /// Run one tick over the whole scene
    ///
    /// With no `surface` the scene is updated and streamed but not drawn.
    pub fn tick(&mut self, ctx: &TickContext, rasterizer: &mut dyn Rasterizer, surface: Option<&mut dyn Surface>) {
        self.stream.set_stream_time(ctx.current_time);
        self.receiver.set_latency(ctx.latency);
        for entity in self.graph.entities_mut() {
            entity.stream_mut().clear_cache();
        }

        let mut target = surface.map(|s| RenderTarget::with_base(s, ctx.camera.view_matrix()));
        for child in self.graph.children(self.root).to_vec() {
            self.tick_entity(child, ctx, rasterizer, target.as_mut());
        }
        log::trace!("Tick {} complete ({} entities)", ctx.tick_index, self.graph.len());
    }

    fn tick_entity(
        &mut self,
        key: EntityKey,
        ctx: &TickContext,
        rasterizer: &mut dyn Rasterizer,
        mut target: Option<&mut RenderTarget<'_>>,
    ) {
        let Some(entity) = self.graph.get(key) else {
            return;
        };
        if !entity.is_alive() || !entity.lifecycle().is_born(ctx.current_time) {
            return;
        }
        if entity.lifecycle().is_expired(ctx.current_time) {
            if let Err(e) = self.destroy(key) {
                log::error!("Failed to destroy expired entity {:?}: {}", key, e);
            }
            return;
        }

        let first_visit = entity.last_tick() != Some(ctx.tick_index);
        if first_visit {
            self.update_entity(key, ctx);
        }

        let pass = match target.as_deref_mut() {
            Some(t) => render_entity(
                &mut self.graph,
                key,
                rasterizer,
                t,
                ctx.delta,
                self.config.render_cache.min_surface_size,
            ),
            None => ChildPass::Direct,
        };

        if first_visit {
            self.auto_stream(key, ctx);
        }

        let children = self.graph.children(key).to_vec();
        match pass {
            ChildPass::Direct => {
                for child in children {
                    self.tick_entity(child, ctx, rasterizer, target.as_deref_mut());
                }
            }
            ChildPass::UpdateOnly => {
                for child in children {
                    self.tick_entity(child, ctx, rasterizer, None);
                }
            }
            ChildPass::Composite { mut surface, base } => {
                if let Some(entity) = self.graph.get(key) {
                    self.events.send(EngineEvent::CompositeReady { id: entity.id().clone() });
                }
                {
                    let mut inner = RenderTarget::with_base(surface.as_mut(), base);
                    for child in children {
                        self.tick_entity(child, ctx, rasterizer, Some(&mut inner));
                    }
                }
                finish_composite(&mut self.graph, key, surface, target.as_deref_mut());
            }
        }
    }

    /// Behaviours, interpolation, transform, dirty propagation and bounds
    fn update_entity(&mut self, key: EntityKey, ctx: &TickContext) {
        let Some(entity) = self.graph.get_mut(key) else {
            return;
        };

        let mut behaviours = entity.take_behaviours();
        for behaviour in &mut behaviours {
            behaviour.update(entity, ctx);
        }
        entity.restore_behaviours(behaviours);

        if !entity.time_stream().is_empty() {
            let render_time = ctx.current_time - self.config.interpolation.render_latency_ms;
            if process_interpolate(entity, render_time).is_lag() {
                log::debug!("Interpolation lag on {}", entity.id());
                self.events.send(EngineEvent::InterpolationLag { id: entity.id().clone() });
            }
        }

        let changed = recompute_transform(&mut self.graph, key);
        let Some(entity) = self.graph.get_mut(key) else {
            return;
        };
        let requested = entity.cache.take_dirty_request();
        let composite = entity.cache.has_composite_parent() || entity.cache.mode() == CacheMode::Composite;
        if requested || (changed && composite) {
            set_cache_dirty(&mut self.graph, key, true);
        }

        world_aabb(&mut self.graph, key, true);
        if let Some(entity) = self.graph.get_mut(key) {
            entity.last_tick = Some(ctx.tick_index);
        }
    }

    fn parent_id(&self, key: EntityKey) -> Option<EntityId> {
        self.graph
            .parent(key)
            .and_then(|p| self.graph.get(p))
            .map(|p| p.id().clone())
    }

    fn auto_stream(&mut self, key: EntityKey, ctx: &TickContext) {
        let parent_id = self.parent_id(key);
        let Some(entity) = self.graph.get_mut(key) else {
            return;
        };
        if entity.stream().mode() != StreamMode::Automatic || !entity.stream_mut().sync_due(ctx.delta) {
            return;
        }

        let created = self
            .stream
            .sync_to_clients(entity, parent_id.as_ref(), &ctx.clients, ctx.delta);
        for client in created {
            self.events.send(EngineEvent::StreamCreated {
                id: entity.id().clone(),
                client,
            });
        }
    }

    /// Sync a manually streamed entity to `clients`
    ///
    /// Returns the clients a create was sent to.
    pub fn stream_sync(&mut self, key: EntityKey, clients: &[ClientId], delta: f64) -> Result<Vec<ClientId>, EngineError> {
        let parent_id = self.parent_id(key);
        let entity = self.graph.get_mut(key).ok_or(EngineError::UnknownEntity(key))?;
        if entity.stream().mode() == StreamMode::Disabled {
            log::debug!("Ignoring stream sync for {}: streaming disabled", entity.id());
            return Ok(Vec::new());
        }

        let created = self.stream.sync_to_clients(entity, parent_id.as_ref(), clients, delta);
        for client in &created {
            self.events.send(EngineEvent::StreamCreated {
                id: entity.id().clone(),
                client: client.clone(),
            });
        }
        Ok(created)
    }

    /// Send a create for `key` to one client, or to everyone in `roster`
    pub fn stream_create(
        &mut self,
        key: EntityKey,
        client: Option<&ClientId>,
        roster: &[ClientId],
    ) -> Result<bool, EngineError> {
        let parent_id = self.parent_id(key);
        let entity = self.graph.get(key).ok_or(EngineError::UnknownEntity(key))?;
        Ok(self.stream.stream_create(entity, parent_id.as_ref(), client, roster))
    }

    /// Send a destroy for `key` to one client, or to everyone
    pub fn stream_destroy(&mut self, key: EntityKey, client: Option<&ClientId>) -> Result<bool, EngineError> {
        let id = self.graph.get(key).ok_or(EngineError::UnknownEntity(key))?.id().clone();
        Ok(self.stream.stream_destroy(&id, client))
    }

    /// The stream synchronizer
    pub fn stream(&self) -> &StreamSynchronizer {
        &self.stream
    }

    /// Mutable stream synchronizer access (client pruning, queue draining)
    pub fn stream_mut(&mut self) -> &mut StreamSynchronizer {
        &mut self.stream
    }

    /// Send every queued stream message through `transport`
    pub fn flush(&mut self, transport: &mut dyn Transport) -> usize {
        self.stream.flush(transport)
    }

    /// The client-side stream receiver
    pub fn receiver_mut(&mut self) -> &mut StreamReceiver {
        &mut self.receiver
    }

    /// Apply an incoming stream message to the scene
    pub fn apply_stream_message(&mut self, message: &StreamMessage) -> Result<Received, EngineError> {
        let received = self.receiver.apply(&mut self.graph, message)?;
        if let Received::Destroy(key) = received {
            self.destroy(key)?;
        }
        Ok(received)
    }

    /// Register a handler for one event type
    pub fn register_handler(&mut self, event_type: EventType, handler: Box<dyn EventHandler>) {
        self.events.register_handler(event_type, handler);
    }

    /// Dispatch and return every event raised since the last call
    pub fn drain_events(&mut self) -> Vec<EngineEvent> {
        self.events.dispatch()
    }
}
