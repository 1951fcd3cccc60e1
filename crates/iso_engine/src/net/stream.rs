//! Authoritative-side entity streaming
//!
//! [`StreamSettings`] lives on each entity and says what it streams and how
//! often. [`StreamSynchronizer`] holds the per-client bookkeeping: which
//! clients have been sent a create for an entity, and the last update each
//! one received, so unchanged state is never sent twice in a row.

use std::collections::{HashMap, HashSet};
use std::fmt;

use crate::core::config::{StreamConfig, MIN_SYNC_INTERVAL_MS};
use crate::net::codec::{encode_update, encode_values};
use crate::net::message::{ClientId, Recipients, StreamMessage, Transport};
use crate::scene::{Entity, EntityId};

/// How an entity takes part in streaming
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StreamMode {
    /// Never streamed
    #[default]
    Disabled,
    /// Synced by the engine every tick
    Automatic,
    /// Synced only when the caller asks
    Manual,
}

/// A named slice of entity state
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum StreamSection {
    /// Translate, scale, rotate
    Transform,
    /// 3D bounds
    Bounds3d,
    /// Opacity
    Opacity,
    /// Game-defined payload
    Custom(String),
}

impl StreamSection {
    /// Wire name
    pub fn name(&self) -> &str {
        match self {
            Self::Transform => "transform",
            Self::Bounds3d => "bounds3d",
            Self::Opacity => "opacity",
            Self::Custom(name) => name,
        }
    }

    /// Parse a wire name; unknown names become custom sections
    pub fn from_name(name: &str) -> Self {
        match name {
            "transform" => Self::Transform,
            "bounds3d" => Self::Bounds3d,
            "opacity" => Self::Opacity,
            other => Self::Custom(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct IntervalTimer {
    interval: f64,
    elapsed: f64,
}

impl IntervalTimer {
    fn new(interval: f64) -> Self {
        Self { interval, elapsed: 0.0 }
    }

    /// Advance by `delta` and report whether the interval has elapsed
    fn tick(&mut self, delta: f64) -> bool {
        self.elapsed += delta;
        if self.elapsed >= self.interval {
            self.elapsed -= self.interval;
            true
        } else {
            false
        }
    }
}

/// Stream predicate deciding whether a client receives an entity
pub type StreamControl = Box<dyn Fn(&ClientId) -> bool>;

/// Per-entity streaming settings and caches
pub struct StreamSettings {
    mode: StreamMode,
    sections: Vec<StreamSection>,
    precision: Option<u8>,
    create_data: Option<String>,
    sync_timer: Option<IntervalTimer>,
    section_timers: HashMap<StreamSection, IntervalTimer>,
    data_cache: Option<String>,
    control: Option<StreamControl>,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            mode: StreamMode::Disabled,
            sections: vec![StreamSection::Transform],
            precision: None,
            create_data: None,
            sync_timer: None,
            section_timers: HashMap::new(),
            data_cache: None,
            control: None,
        }
    }
}

impl fmt::Debug for StreamSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamSettings")
            .field("mode", &self.mode)
            .field("sections", &self.sections)
            .field("precision", &self.precision)
            .field("create_data", &self.create_data)
            .field("sync_timer", &self.sync_timer)
            .field("section_timers", &self.section_timers)
            .field("data_cache", &self.data_cache)
            .field("control", &self.control.is_some())
            .finish()
    }
}

impl StreamSettings {
    /// Settings using the configured default sections
    pub fn from_config(config: &StreamConfig) -> Self {
        Self {
            sections: config
                .default_sections
                .iter()
                .map(|name| StreamSection::from_name(name))
                .collect(),
            ..Default::default()
        }
    }

    /// Streaming mode
    pub fn mode(&self) -> StreamMode {
        self.mode
    }

    /// Set streaming mode
    pub fn set_mode(&mut self, mode: StreamMode) {
        self.mode = mode;
    }

    /// Sections in wire order
    pub fn sections(&self) -> &[StreamSection] {
        &self.sections
    }

    /// Replace the section list
    pub fn set_sections(&mut self, sections: Vec<StreamSection>) {
        self.sections = sections;
        self.data_cache = None;
    }

    /// Append a section unless already present
    pub fn add_section(&mut self, section: StreamSection) {
        if !self.sections.contains(&section) {
            self.sections.push(section);
            self.data_cache = None;
        }
    }

    /// Remove a section
    pub fn remove_section(&mut self, section: &StreamSection) {
        self.sections.retain(|s| s != section);
        self.section_timers.remove(section);
        self.data_cache = None;
    }

    /// Per-entity float precision override
    pub fn precision(&self) -> Option<u8> {
        self.precision
    }

    /// Override float precision for this entity
    pub fn set_precision(&mut self, precision: Option<u8>) {
        self.precision = precision;
        self.data_cache = None;
    }

    /// Opaque data sent with create messages
    pub fn create_data(&self) -> Option<&str> {
        self.create_data.as_deref()
    }

    /// Set create data
    pub fn set_create_data(&mut self, data: Option<String>) {
        self.create_data = data;
    }

    /// Entity-level sync interval in milliseconds
    pub fn sync_interval(&self) -> Option<f64> {
        self.sync_timer.map(|t| t.interval)
    }

    /// Sync at most every `ms` milliseconds; below the floor clears the interval
    pub fn set_sync_interval(&mut self, ms: f64) {
        self.sync_timer = if ms < MIN_SYNC_INTERVAL_MS {
            None
        } else {
            Some(IntervalTimer::new(ms))
        };
    }

    /// Interval configured for a section
    pub fn section_interval(&self, section: &StreamSection) -> Option<f64> {
        self.section_timers.get(section).map(|t| t.interval)
    }

    /// Send `section` at most every `ms` milliseconds; below the floor clears it
    pub fn set_section_interval(&mut self, section: StreamSection, ms: f64) {
        if ms < MIN_SYNC_INTERVAL_MS {
            self.section_timers.remove(&section);
        } else {
            self.section_timers.insert(section, IntervalTimer::new(ms));
        }
    }

    /// Install or clear the recipient predicate
    pub fn set_control(&mut self, control: Option<StreamControl>) {
        self.control = control;
    }

    /// Whether `client` passes the recipient predicate
    pub fn allows(&self, client: &ClientId) -> bool {
        self.control.as_ref().map_or(true, |control| control(client))
    }

    /// Cached update string for this tick
    pub fn cached_data(&self) -> Option<&str> {
        self.data_cache.as_deref()
    }

    /// Invalidate the per-tick cache
    pub fn clear_cache(&mut self) {
        self.data_cache = None;
    }

    /// Advance the entity-level timer; true when a sync is due
    pub(crate) fn sync_due(&mut self, delta: f64) -> bool {
        match self.sync_timer.as_mut() {
            Some(timer) => timer.tick(delta),
            None => true,
        }
    }

    fn section_due(&mut self, section: &StreamSection, delta: f64) -> bool {
        match self.section_timers.get_mut(section) {
            Some(timer) => timer.tick(delta),
            None => true,
        }
    }
}

/// Encoded payload for one section of `entity`
pub fn section_payload(entity: &Entity, section: &StreamSection, precision: u8) -> String {
    match section {
        StreamSection::Transform => encode_values(&entity.transform_snapshot(), precision),
        StreamSection::Bounds3d => {
            let b = entity.bounds3d();
            encode_values(&[b.x, b.y, b.z], precision)
        }
        StreamSection::Opacity => encode_values(&[entity.opacity()], precision),
        StreamSection::Custom(name) => entity.custom_section(name).unwrap_or_default().to_string(),
    }
}

/// Full update string for `entity`, computed once per tick
///
/// Sections still inside their interval contribute only their designator.
pub fn stream_data(entity: &mut Entity, config: &StreamConfig, delta: f64) -> String {
    if let Some(cached) = entity.stream().cached_data() {
        return cached.to_string();
    }

    let precision = entity.stream().precision().unwrap_or(config.float_precision);
    let sections = entity.stream().sections().to_vec();
    let payloads: Vec<String> = sections
        .iter()
        .map(|section| section_payload(entity, section, precision))
        .collect();

    let settings = entity.stream_mut();
    let gated: Vec<String> = sections
        .iter()
        .zip(payloads)
        .map(|(section, payload)| {
            if settings.section_due(section, delta) {
                payload
            } else {
                String::new()
            }
        })
        .collect();

    let data = encode_update(entity.id(), &gated, config.section_designator);
    entity.stream_mut().data_cache = Some(data.clone());
    data
}

/// Per-client create and dedupe bookkeeping plus the outgoing queue
#[derive(Debug, Default)]
pub struct StreamSynchronizer {
    config: StreamConfig,
    created: HashMap<EntityId, HashSet<ClientId>>,
    last_sent: HashMap<EntityId, HashMap<ClientId, String>>,
    outbox: Vec<(StreamMessage, Recipients)>,
    stream_time: f64,
}

impl StreamSynchronizer {
    /// Create a synchronizer
    pub fn new(config: StreamConfig) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    /// Encoding configuration
    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    /// Current stream time stamped onto messages
    pub fn stream_time(&self) -> f64 {
        self.stream_time
    }

    /// Set the stream time for the current tick
    pub fn set_stream_time(&mut self, time: f64) {
        self.stream_time = time;
    }

    /// Whether `client` has been sent a create for `id`
    pub fn is_created(&self, id: &EntityId, client: &ClientId) -> bool {
        self.created.get(id).is_some_and(|clients| clients.contains(client))
    }

    /// Whether any client has been sent a create for `id`
    pub fn is_streamed(&self, id: &EntityId) -> bool {
        self.created.get(id).is_some_and(|clients| !clients.is_empty())
    }

    /// Last update sent to `client` for `id`
    pub fn last_sent(&self, id: &EntityId, client: &ClientId) -> Option<&str> {
        self.last_sent
            .get(id)
            .and_then(|clients| clients.get(client))
            .map(String::as_str)
    }

    /// Queue a create for `entity`
    ///
    /// With no `client` the create goes to everyone and every client in
    /// `roster` is marked created. Returns false for a parentless entity.
    pub fn stream_create(
        &mut self,
        entity: &Entity,
        parent_id: Option<&EntityId>,
        client: Option<&ClientId>,
        roster: &[ClientId],
    ) -> bool {
        let Some(parent_id) = parent_id else {
            log::warn!("Cannot stream create for {}: entity has no parent", entity.id());
            return false;
        };

        let precision = entity.stream().precision().unwrap_or(self.config.float_precision);
        let message = StreamMessage::Create {
            type_name: entity.type_name().to_string(),
            id: entity.id().clone(),
            parent_id: parent_id.clone(),
            transform: encode_values(&entity.transform_snapshot(), precision),
            create_data: entity.stream().create_data().map(str::to_string),
        };

        let created = self.created.entry(entity.id().clone()).or_default();
        let recipients = match client {
            Some(client) => {
                created.insert(client.clone());
                Recipients::Client(client.clone())
            }
            None => {
                created.extend(roster.iter().cloned());
                Recipients::All
            }
        };

        log::debug!("Stream create {} -> {:?}", entity.id(), recipients);
        self.outbox.push((message, recipients));
        true
    }

    /// Queue a destroy for `entity` and clear its tracking
    pub fn stream_destroy(&mut self, id: &EntityId, client: Option<&ClientId>) -> bool {
        let message = StreamMessage::Destroy {
            id: id.clone(),
            time: self.stream_time,
        };

        let recipients = match client {
            Some(client) => {
                if let Some(created) = self.created.get_mut(id) {
                    created.remove(client);
                }
                if let Some(sent) = self.last_sent.get_mut(id) {
                    sent.remove(client);
                }
                Recipients::Client(client.clone())
            }
            None => {
                self.forget_entity(id);
                Recipients::All
            }
        };

        log::debug!("Stream destroy {} -> {:?}", id, recipients);
        self.outbox.push((message, recipients));
        true
    }

    /// Create on new clients, then send changed state to created clients
    ///
    /// Returns the clients a create was queued for.
    pub fn sync_to_clients(
        &mut self,
        entity: &mut Entity,
        parent_id: Option<&EntityId>,
        clients: &[ClientId],
        delta: f64,
    ) -> Vec<ClientId> {
        let allowed: Vec<&ClientId> = clients.iter().filter(|c| entity.stream().allows(c)).collect();

        let mut newly_created = Vec::new();
        for client in &allowed {
            if !self.is_created(entity.id(), client)
                && self.stream_create(entity, parent_id, Some(*client), clients)
            {
                newly_created.push((*client).clone());
            }
        }

        let data = stream_data(entity, &self.config, delta);
        let id = entity.id().clone();
        let mut recipients = Vec::new();
        for client in allowed {
            if !self.is_created(&id, client) {
                continue;
            }
            let sent = self.last_sent.entry(id.clone()).or_default();
            if sent.get(client) != Some(&data) {
                sent.insert(client.clone(), data.clone());
                recipients.push(client.clone());
            }
        }

        if !recipients.is_empty() {
            self.outbox.push((
                StreamMessage::Update { id, data, time: self.stream_time },
                Recipients::Clients(recipients),
            ));
        }

        newly_created
    }

    /// Drop all tracking for an entity
    pub fn forget_entity(&mut self, id: &EntityId) {
        self.created.remove(id);
        self.last_sent.remove(id);
    }

    /// Drop all tracking for a disconnected client
    pub fn remove_client(&mut self, client: &ClientId) {
        for created in self.created.values_mut() {
            created.remove(client);
        }
        for sent in self.last_sent.values_mut() {
            sent.remove(client);
        }
        self.created.retain(|_, clients| !clients.is_empty());
        self.last_sent.retain(|_, clients| !clients.is_empty());
    }

    /// Forget what `client` was last sent so the next sync resends full state
    pub fn reset_client(&mut self, client: &ClientId) {
        for sent in self.last_sent.values_mut() {
            sent.remove(client);
        }
    }

    /// Number of queued messages
    pub fn pending(&self) -> usize {
        self.outbox.len()
    }

    /// Take every queued message
    pub fn drain_queue(&mut self) -> Vec<(StreamMessage, Recipients)> {
        std::mem::take(&mut self.outbox)
    }

    /// Send every queued message through `transport`
    pub fn flush(&mut self, transport: &mut dyn Transport) -> usize {
        let queued = self.drain_queue();
        for (message, recipients) in &queued {
            transport.send(message, recipients);
        }
        queued.len()
    }
}
