//! Client-side application of stream messages

use std::collections::HashMap;
use std::fmt;

use crate::core::config::{StreamConfig, DEFAULT_TIME_STREAM_CAPACITY};
use crate::net::codec::{decode_values, split_update, StreamError};
use crate::net::interpolation::TimeStream;
use crate::net::message::StreamMessage;
use crate::net::stream::{StreamSection, StreamSettings};
use crate::scene::{Entity, EntityFlags, EntityId, EntityKey, SceneGraph};

/// Builds an entity for a registered type name from its create data
pub type EntityFactory = Box<dyn Fn(Option<&str>) -> Entity>;

/// What applying a message did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Received {
    /// New entity mounted
    Created(EntityKey),
    /// Existing entity updated
    Updated(EntityKey),
    /// Entity should be destroyed; the caller owns the teardown
    Destroy(EntityKey),
    /// Create for an entity that already exists
    Ignored,
}

/// Decodes stream messages into scenegraph changes
pub struct StreamReceiver {
    config: StreamConfig,
    factories: HashMap<String, EntityFactory>,
    latency: f64,
    time_stream_capacity: usize,
}

impl fmt::Debug for StreamReceiver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamReceiver")
            .field("config", &self.config)
            .field("factories", &self.factories.keys().collect::<Vec<_>>())
            .field("latency", &self.latency)
            .field("time_stream_capacity", &self.time_stream_capacity)
            .finish()
    }
}

impl StreamReceiver {
    /// Create a receiver
    pub fn new(config: StreamConfig) -> Self {
        Self {
            config,
            factories: HashMap::new(),
            latency: 0.0,
            time_stream_capacity: DEFAULT_TIME_STREAM_CAPACITY,
        }
    }

    /// Builder pattern: Set the time-stream capacity of entities built without a factory
    pub fn with_time_stream_capacity(mut self, capacity: usize) -> Self {
        self.time_stream_capacity = capacity;
        self
    }

    /// Latency currently added to update timestamps
    pub fn latency(&self) -> f64 {
        self.latency
    }

    /// Register how to build entities of `type_name`
    pub fn register_type(&mut self, type_name: impl Into<String>, factory: EntityFactory) {
        self.factories.insert(type_name.into(), factory);
    }

    /// Set the latency added to update timestamps
    pub fn set_latency(&mut self, latency: f64) {
        self.latency = latency;
    }

    /// Apply one message to `graph`
    pub fn apply(&self, graph: &mut SceneGraph, message: &StreamMessage) -> Result<Received, StreamError> {
        match message {
            StreamMessage::Create {
                type_name,
                id,
                parent_id,
                transform,
                create_data,
            } => self.create(graph, type_name, id, parent_id, transform, create_data.as_deref()),
            StreamMessage::Update { id, data, time } => self.update(graph, id, data, *time),
            StreamMessage::Destroy { id, .. } => graph
                .find_by_id(id)
                .map(Received::Destroy)
                .ok_or_else(|| StreamError::UnknownEntity(id.clone())),
        }
    }

    fn create(
        &self,
        graph: &mut SceneGraph,
        type_name: &str,
        id: &EntityId,
        parent_id: &EntityId,
        transform: &str,
        create_data: Option<&str>,
    ) -> Result<Received, StreamError> {
        if graph.find_by_id(id).is_some() {
            log::debug!("Ignoring create for existing entity {}", id);
            return Ok(Received::Ignored);
        }
        let parent = graph.find_by_id(parent_id).ok_or_else(|| StreamError::UnknownParent {
            id: id.clone(),
            parent: parent_id.clone(),
        })?;

        let values = decode_values::<9>(transform)?;
        let mut entity = match self.factories.get(type_name) {
            Some(factory) => factory(create_data),
            None => {
                log::debug!("No factory for type '{}', creating a plain entity", type_name);
                let mut entity = Entity::new().with_stream(StreamSettings::from_config(&self.config));
                *entity.time_stream_mut() = TimeStream::with_capacity(self.time_stream_capacity);
                entity
            }
        }
        .with_id(id.clone())
        .with_type_name(type_name);
        entity.apply_snapshot(&values);
        entity.set_flag(EntityFlags::STREAM_JUST_CREATED, true);

        let key = graph
            .insert(entity)
            .map_err(|e| StreamError::MalformedUpdate(e.to_string()))?;
        graph
            .mount(key, parent)
            .map_err(|e| StreamError::MalformedUpdate(e.to_string()))?;
        log::info!("Stream created {} ({}) under {}", id, type_name, parent_id);
        Ok(Received::Created(key))
    }

    fn update(&self, graph: &mut SceneGraph, id: &EntityId, data: &str, time: f64) -> Result<Received, StreamError> {
        let (data_id, payloads) = split_update(data, self.config.section_designator)?;
        if &data_id != id {
            return Err(StreamError::MalformedUpdate(format!("id {} does not match {}", data_id, id)));
        }

        let key = graph.find_by_id(id).ok_or_else(|| StreamError::UnknownEntity(id.clone()))?;
        let Some(entity) = graph.get_mut(key) else {
            return Err(StreamError::UnknownEntity(id.clone()));
        };

        let sections = entity.stream().sections().to_vec();
        for (section, payload) in sections.iter().zip(payloads) {
            if payload.is_empty() {
                continue;
            }
            match section {
                StreamSection::Transform => {
                    let values = decode_values::<9>(payload)?;
                    if entity.flags().contains(EntityFlags::STREAM_JUST_CREATED) || entity.interpolation_disabled() {
                        entity.apply_snapshot(&values);
                        entity.set_flag(EntityFlags::STREAM_JUST_CREATED, false);
                    } else {
                        entity.time_stream_mut().push(time + self.latency, values);
                    }
                }
                StreamSection::Bounds3d => {
                    let [x, y, z] = decode_values::<3>(payload)?;
                    entity.set_bounds3d(x, y, z);
                }
                StreamSection::Opacity => {
                    let [opacity] = decode_values::<1>(payload)?;
                    entity.set_opacity(opacity);
                }
                StreamSection::Custom(name) => entity.set_custom_section(name.clone(), payload),
            }
        }
        Ok(Received::Updated(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn setup() -> (SceneGraph, StreamReceiver) {
        let mut graph = SceneGraph::new();
        graph.insert(Entity::new().with_id("root")).unwrap();
        (graph, StreamReceiver::new(StreamConfig::default()))
    }

    fn create(id: &str) -> StreamMessage {
        StreamMessage::Create {
            type_name: "Ship".to_string(),
            id: EntityId::from(id),
            parent_id: EntityId::from("root"),
            transform: "5,6,0,1,1,1,0,0,0,".to_string(),
            create_data: Some("red".to_string()),
        }
    }

    fn update(id: &str, data: &str, time: f64) -> StreamMessage {
        StreamMessage::Update {
            id: EntityId::from(id),
            data: data.to_string(),
            time,
        }
    }

    #[test]
    fn test_create_uses_factory() {
        let (mut graph, mut receiver) = setup();
        receiver.register_type(
            "Ship",
            Box::new(|data: Option<&str>| {
                let mut ship = Entity::new();
                ship.set_custom_section("colour", data.unwrap_or("none"));
                ship
            }),
        );

        let Received::Created(key) = receiver.apply(&mut graph, &create("s1")).unwrap() else {
            panic!("expected create");
        };
        let ship = graph.get(key).unwrap();
        assert_eq!(ship.type_name(), "Ship");
        assert_eq!(ship.custom_section("colour"), Some("red"));
        assert_relative_eq!(ship.translate().x, 5.0);
        assert_eq!(graph.parent(key), graph.find_by_id(&EntityId::from("root")));

        assert_eq!(receiver.apply(&mut graph, &create("s1")).unwrap(), Received::Ignored);
    }

    #[test]
    fn test_first_update_applies_then_buffers() {
        let (mut graph, mut receiver) = setup();
        receiver.set_latency(50.0);
        receiver.apply(&mut graph, &create("s1")).unwrap();
        let key = graph.find_by_id(&EntityId::from("s1")).unwrap();

        receiver.apply(&mut graph, &update("s1", "s1¬7,6,0,1,1,1,0,0,0,", 1000.0)).unwrap();
        assert_relative_eq!(graph.get(key).unwrap().translate().x, 7.0);
        assert!(graph.get(key).unwrap().time_stream().is_empty());

        receiver.apply(&mut graph, &update("s1", "s1¬9,6,0,1,1,1,0,0,0,", 1100.0)).unwrap();
        let entity = graph.get(key).unwrap();
        assert_relative_eq!(entity.translate().x, 7.0);
        assert_eq!(entity.time_stream().len(), 1);
        assert_relative_eq!(entity.time_stream().samples().next().unwrap().time, 1150.0);
    }

    #[test]
    fn test_update_extra_sections() {
        let (mut graph, receiver) = setup();
        let mut settings = StreamSettings::default();
        settings.set_sections(vec![
            StreamSection::Transform,
            StreamSection::Opacity,
            StreamSection::Custom("hp".to_string()),
        ]);
        let key = graph.insert(Entity::new().with_id("s2").with_stream(settings)).unwrap();
        graph.get_mut(key).unwrap().set_interpolation_disabled(true);

        receiver.apply(&mut graph, &update("s2", "s2¬¬0.25,¬42", 0.0)).unwrap();
        let entity = graph.get(key).unwrap();
        assert_relative_eq!(entity.opacity(), 0.25);
        assert_eq!(entity.custom_section("hp"), Some("42"));
    }

    #[test]
    fn test_plain_entity_uses_configured_sections() {
        let mut graph = SceneGraph::new();
        graph.insert(Entity::new().with_id("root")).unwrap();
        let config = StreamConfig::new().with_default_sections(["transform", "opacity"]);
        let receiver = StreamReceiver::new(config).with_time_stream_capacity(4);

        let Received::Created(key) = receiver.apply(&mut graph, &create("s5")).unwrap() else {
            panic!("expected create");
        };
        assert_eq!(graph.get(key).unwrap().time_stream().capacity(), 4);

        receiver
            .apply(&mut graph, &update("s5", "s5¬5,6,0,1,1,1,0,0,0,¬0.25,", 10.0))
            .unwrap();
        assert_relative_eq!(graph.get(key).unwrap().opacity(), 0.25);
    }

    #[test]
    fn test_errors() {
        let (mut graph, receiver) = setup();
        assert!(matches!(
            receiver.apply(&mut graph, &update("nope", "nope¬1,", 0.0)),
            Err(StreamError::UnknownEntity(_))
        ));

        let mut orphan = create("s3");
        if let StreamMessage::Create { parent_id, .. } = &mut orphan {
            *parent_id = EntityId::from("missing");
        }
        assert!(matches!(
            receiver.apply(&mut graph, &orphan),
            Err(StreamError::UnknownParent { .. })
        ));

        receiver.apply(&mut graph, &create("s4")).unwrap();
        assert!(matches!(
            receiver.apply(&mut graph, &update("s4", "s4¬1,2,", 0.0)),
            Err(StreamError::ValueCount { expected: 9, found: 2 })
        ));
    }
}
