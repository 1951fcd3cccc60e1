//! Engine event queue
//!
//! Subsystems push [`EngineEvent`]s while a tick runs; the host drains them
//! afterwards. Handlers can be registered per [`EventType`] and are notified
//! in registration order during [`EventSystem::dispatch`]:
//! - A handler returning true consumes the event (later handlers skip it)
//! - Every dispatched event is also returned to the caller

use std::collections::HashMap;

use crate::net::ClientId;
use crate::scene::EntityId;

/// Event type identification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventType {
    /// Entity was destroyed
    Destroyed,
    /// Interpolator ran out of future samples
    InterpolationLag,
    /// Composite cache surface was resized and is about to be filled
    CompositeReady,
    /// Create message queued for a client
    StreamCreated,
    /// Destroy message queued
    StreamDestroyed,
}

/// Something observable that happened during a tick
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// Entity reached the `Destroyed` state
    Destroyed {
        /// Destroyed entity
        id: EntityId,
    },
    /// No sample newer than the render time was buffered
    InterpolationLag {
        /// Lagging entity
        id: EntityId,
    },
    /// Composite surface is ready for the entity and its children
    CompositeReady {
        /// Composite-caching entity
        id: EntityId,
    },
    /// Entity was created on a remote client
    StreamCreated {
        /// Streamed entity
        id: EntityId,
        /// Receiving client
        client: ClientId,
    },
    /// Entity was destroyed on remote clients
    StreamDestroyed {
        /// Streamed entity
        id: EntityId,
    },
}

impl EngineEvent {
    /// Type of this event
    pub fn event_type(&self) -> EventType {
        match self {
            Self::Destroyed { .. } => EventType::Destroyed,
            Self::InterpolationLag { .. } => EventType::InterpolationLag,
            Self::CompositeReady { .. } => EventType::CompositeReady,
            Self::StreamCreated { .. } => EventType::StreamCreated,
            Self::StreamDestroyed { .. } => EventType::StreamDestroyed,
        }
    }

    /// Entity the event concerns
    pub fn entity_id(&self) -> &EntityId {
        match self {
            Self::Destroyed { id }
            | Self::InterpolationLag { id }
            | Self::CompositeReady { id }
            | Self::StreamCreated { id, .. }
            | Self::StreamDestroyed { id } => id,
        }
    }
}

/// Event handler trait
/// Returns true if the event was consumed (stops forwarding)
pub trait EventHandler {
    /// Handle an event, return true if consumed
    fn on_event(&mut self, event: &EngineEvent) -> bool;
}

/// Event queue with per-type handler registration
#[derive(Default)]
pub struct EventSystem {
    queue: Vec<EngineEvent>,
    handlers: HashMap<EventType, Vec<Box<dyn EventHandler>>>,
}

impl EventSystem {
    /// Create a new empty event system
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for a specific event type
    pub fn register_handler(&mut self, event_type: EventType, handler: Box<dyn EventHandler>) {
        self.handlers.entry(event_type).or_default().push(handler);
    }

    /// Queue an event
    pub fn send(&mut self, event: EngineEvent) {
        log::trace!("Queued {:?}", event);
        self.queue.push(event);
    }

    /// Number of queued events
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Notify handlers of every queued event and return the events
    pub fn dispatch(&mut self) -> Vec<EngineEvent> {
        let events = std::mem::take(&mut self.queue);
        for event in &events {
            if let Some(handlers) = self.handlers.get_mut(&event.event_type()) {
                for handler in handlers.iter_mut() {
                    if handler.on_event(event) {
                        break;
                    }
                }
            }
        }
        events
    }

    /// Drop all queued events
    pub fn clear(&mut self) {
        self.queue.clear();
    }
}

impl std::fmt::Debug for EventSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventSystem")
            .field("queue", &self.queue)
            .field("handler_types", &self.handlers.keys().collect::<Vec<_>>())
            .finish()
    }
}
