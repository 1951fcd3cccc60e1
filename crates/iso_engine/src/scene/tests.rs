//! Whole-tick tests driving the engine over a small scene

use std::cell::Cell;
use std::rc::Rc;

use approx::assert_relative_eq;

use crate::core::{Camera, EngineConfig, TickContext};
use crate::events::EngineEvent;
use crate::net::{ClientId, Received, Recipients, StreamMessage, StreamMode};
use crate::render::CacheMode;
use crate::scene::{world_position, Entity, EntityId, EntityKey, FnBehaviour, Rect};
use crate::testing::{MemoryTransport, RecordingRasterizer, RecordingSurface};
use crate::Engine;

fn engine() -> Engine {
    Engine::new(EngineConfig::default()).unwrap()
}

fn ctx(time: f64, tick: u64) -> TickContext {
    TickContext::new(time, 16.0, tick).with_camera(Camera::new(800.0, 600.0))
}

fn counter(entity: &mut Entity) -> Rc<Cell<u32>> {
    let count = Rc::new(Cell::new(0));
    let hook = Rc::clone(&count);
    entity.add_behaviour(Box::new(FnBehaviour::new("count", move |_: &mut Entity, _: &TickContext| {
        hook.set(hook.get() + 1);
    })));
    count
}

fn destroyed_ids(events: &[EngineEvent]) -> Vec<&str> {
    events
        .iter()
        .filter_map(|e| match e {
            EngineEvent::Destroyed { id } => Some(id.as_str()),
            _ => None,
        })
        .collect()
}

#[test]
fn test_tick_composes_world_matrices() {
    let mut engine = engine();
    let parent = engine
        .spawn(Entity::new().with_id("parent").with_translate(100.0, 0.0, 0.0), None)
        .unwrap();
    let child = engine
        .spawn(Entity::new().with_id("child").with_translate(10.0, 0.0, 0.0), Some(parent))
        .unwrap();
    engine
        .get_mut(parent)
        .unwrap()
        .rotate_to(0.0, 0.0, std::f32::consts::FRAC_PI_2);

    engine.tick(&ctx(0.0, 1), &mut RecordingRasterizer::default(), None);

    let world = world_position(engine.graph(), child).unwrap();
    assert_relative_eq!(world.x, 100.0, epsilon = 1e-4);
    assert_relative_eq!(world.y, 10.0, epsilon = 1e-4);
    assert!(engine.get(child).unwrap().cached_aabb().is_some());
    assert_eq!(engine.get(child).unwrap().last_tick(), Some(1));
}

#[test]
fn test_destroy_cascades_to_children() {
    let mut engine = engine();
    let parent = engine.spawn(Entity::new().with_id("parent"), None).unwrap();
    let child = engine.spawn(Entity::new().with_id("child"), Some(parent)).unwrap();

    engine.destroy(parent).unwrap();
    assert!(engine.get(parent).is_none());
    assert!(engine.get(child).is_none());
    assert_eq!(engine.graph().len(), 1);
    assert!(engine.graph().children(engine.root()).is_empty());

    let events = engine.drain_events();
    assert_eq!(destroyed_ids(&events), vec!["child", "parent"]);
}

#[test]
fn test_life_span_expires_during_tick() {
    let mut engine = engine();
    let mut bullet = Entity::new().with_id("bullet");
    bullet.set_life_span(50.0, 0.0);
    let bullet = engine.spawn(bullet, None).unwrap();
    let trail = engine.spawn(Entity::new().with_id("trail"), Some(bullet)).unwrap();
    let mut rasterizer = RecordingRasterizer::default();

    engine.tick(&ctx(0.0, 1), &mut rasterizer, None);
    assert!(engine.get(bullet).unwrap().is_alive());

    engine.tick(&ctx(60.0, 2), &mut rasterizer, None);
    assert!(engine.get(bullet).is_none());
    assert!(engine.get(trail).is_none());
    assert_eq!(destroyed_ids(&engine.drain_events()), vec!["trail", "bullet"]);
}

#[test]
fn test_born_time_gates_updates() {
    let mut engine = engine();
    let mut spawn = Entity::new().with_id("late");
    spawn.lifecycle_mut().set_born_time(Some(100.0));
    let count = counter(&mut spawn);
    let key = engine.spawn(spawn, None).unwrap();
    let mut rasterizer = RecordingRasterizer::default();
    let mut surface = RecordingSurface::new(800, 600);

    engine.tick(&ctx(50.0, 1), &mut rasterizer, Some(&mut surface));
    assert_eq!(count.get(), 0);
    assert_eq!(engine.get(key).unwrap().last_tick(), None);
    assert_eq!(rasterizer.count("late"), 0);

    engine.tick(&ctx(150.0, 2), &mut rasterizer, Some(&mut surface));
    assert_eq!(count.get(), 1);
    assert_eq!(rasterizer.count("late"), 1);
}

#[test]
fn test_shared_tick_index_updates_once() {
    let mut engine = engine();
    let mut ship = Entity::new().with_id("ship");
    let count = counter(&mut ship);
    engine.spawn(ship, None).unwrap();
    let mut rasterizer = RecordingRasterizer::default();
    let mut left = RecordingSurface::new(400, 300);
    let mut right = RecordingSurface::new(400, 300);

    engine.tick(&ctx(0.0, 7), &mut rasterizer, Some(&mut left));
    engine.tick(&ctx(0.0, 7), &mut rasterizer, Some(&mut right));

    assert_eq!(count.get(), 1);
    assert_eq!(rasterizer.count("ship"), 2);
}

#[test]
fn test_hidden_entity_updates_without_drawing() {
    let mut engine = engine();
    let mut ghost = Entity::new().with_id("ghost");
    ghost.set_hidden(true);
    let ghost = engine.spawn(ghost, None).unwrap();
    let child = engine.spawn(Entity::new().with_id("wisp"), Some(ghost)).unwrap();
    let mut rasterizer = RecordingRasterizer::default();
    let mut surface = RecordingSurface::new(800, 600);

    engine.tick(&ctx(0.0, 3), &mut rasterizer, Some(&mut surface));

    assert!(rasterizer.renders.is_empty());
    assert_eq!(engine.get(child).unwrap().last_tick(), Some(3));
}

#[test]
fn test_composite_cache_rebuilds_after_child_change() {
    let mut engine = engine();
    let group = engine.spawn(Entity::new().with_id("group"), None).unwrap();
    let a = engine
        .spawn(Entity::new().with_id("a").with_translate(-20.0, 0.0, 0.0), Some(group))
        .unwrap();
    engine
        .spawn(Entity::new().with_id("b").with_translate(20.0, 0.0, 0.0), Some(group))
        .unwrap();
    engine.set_cache_mode(group, CacheMode::Composite).unwrap();

    let mut rasterizer = RecordingRasterizer::default();
    let mut surface = RecordingSurface::new(800, 600);

    // Children move into place during the first pass, so the group rebuilds once more
    engine.tick(&ctx(0.0, 1), &mut rasterizer, Some(&mut surface));
    assert_eq!(rasterizer.renders.len(), 3);
    assert!(engine.get(group).unwrap().cache().is_dirty());
    assert!(engine
        .drain_events()
        .iter()
        .any(|e| matches!(e, EngineEvent::CompositeReady { id } if id.as_str() == "group")));

    engine.tick(&ctx(16.0, 2), &mut rasterizer, Some(&mut surface));
    assert_eq!(rasterizer.renders.len(), 6);
    assert_eq!(rasterizer.surfaces_created, 1);
    assert!(!engine.get(group).unwrap().cache().is_dirty());

    // Clean: replayed without rasterizing
    engine.tick(&ctx(32.0, 3), &mut rasterizer, Some(&mut surface));
    assert_eq!(rasterizer.renders.len(), 6);
    assert_eq!(surface.draws().len(), 3);

    engine.get_mut(a).unwrap().translate_by(5.0, 0.0, 0.0);
    engine.tick(&ctx(48.0, 4), &mut rasterizer, Some(&mut surface));
    assert!(engine.get(group).unwrap().cache().is_dirty());

    engine.tick(&ctx(64.0, 5), &mut rasterizer, Some(&mut surface));
    assert_eq!(rasterizer.renders.len(), 9);
    assert_eq!(rasterizer.surfaces_created, 1);
    assert!(!engine.get(group).unwrap().cache().is_dirty());
}

#[test]
fn test_composite_surface_covers_moved_children() {
    let mut engine = engine();
    let group = engine
        .spawn(Entity::new().with_id("group").with_bounds2d(10.0, 10.0), None)
        .unwrap();
    for (id, x) in [("left", -40.0), ("right", 40.0)] {
        engine
            .spawn(
                Entity::new().with_id(id).with_bounds2d(10.0, 10.0).with_translate(x, 0.0, 0.0),
                Some(group),
            )
            .unwrap();
    }
    engine.set_cache_mode(group, CacheMode::Composite).unwrap();

    let mut rasterizer = RecordingRasterizer::default();
    let mut surface = RecordingSurface::new(800, 600);
    for tick in 1..=3 {
        engine.tick(&ctx((tick * 16) as f64, tick), &mut rasterizer, Some(&mut surface));
    }

    let cache = engine.get(group).unwrap().cache();
    assert_eq!(cache.composite_aabb(), Some(Rect::new(-45.0, -5.0, 90.0, 10.0)));
    assert_eq!(cache.surface().unwrap().size(), (90, 10));
    assert!(!cache.is_dirty());
    // First pass sized from stale bounds, second from the settled children
    assert_eq!(rasterizer.count("group"), 2);
}

#[test]
fn test_single_cache_rerenders_only_when_dirty() {
    let mut engine = engine();
    let tile = engine.spawn(Entity::new().with_id("tile"), None).unwrap();
    engine.set_cache_mode(tile, CacheMode::Single).unwrap();
    let mut rasterizer = RecordingRasterizer::default();
    let mut surface = RecordingSurface::new(800, 600);

    engine.tick(&ctx(0.0, 1), &mut rasterizer, Some(&mut surface));
    engine.tick(&ctx(16.0, 2), &mut rasterizer, Some(&mut surface));
    assert_eq!(rasterizer.count("tile"), 1);
    assert_eq!(rasterizer.renders[0].1, (40, 40));

    engine.get_mut(tile).unwrap().set_bounds2d(64.0, 32.0);
    engine.tick(&ctx(32.0, 3), &mut rasterizer, Some(&mut surface));
    assert_eq!(rasterizer.count("tile"), 2);
    assert_eq!(rasterizer.renders[1].1, (64, 32));
    assert_eq!(surface.draws().len(), 3);
}

fn streamed(engine: &mut Engine, id: &str) -> EntityKey {
    let mut ship = engine.create_entity().with_id(id);
    ship.stream_mut().set_mode(StreamMode::Automatic);
    engine.spawn(ship, None).unwrap()
}

#[test]
fn test_automatic_sync_creates_then_dedupes() {
    let mut engine = engine();
    let ship = streamed(&mut engine, "ship");
    let mut rasterizer = RecordingRasterizer::default();
    let mut transport = MemoryTransport::with_clients(&["a", "b"]);
    let tick = |time, index| ctx(time, index).with_clients(["a", "b"]);

    engine.tick(&tick(0.0, 1), &mut rasterizer, None);
    assert_eq!(engine.flush(&mut transport), 3);
    let creates = transport
        .sent
        .iter()
        .filter(|(m, _)| matches!(m, StreamMessage::Create { .. }))
        .count();
    assert_eq!(creates, 2);
    let (update, recipients) = &transport.sent[2];
    assert!(matches!(update, StreamMessage::Update { data, .. } if data.starts_with("ship¬")));
    assert_eq!(
        recipients,
        &Recipients::Clients(vec![ClientId::from("a"), ClientId::from("b")])
    );
    let created = engine
        .drain_events()
        .into_iter()
        .filter(|e| matches!(e, EngineEvent::StreamCreated { .. }))
        .count();
    assert_eq!(created, 2);

    engine.tick(&tick(16.0, 2), &mut rasterizer, None);
    assert_eq!(engine.stream().pending(), 0);

    engine.get_mut(ship).unwrap().translate_by(1.0, 0.0, 0.0);
    engine.tick(&tick(32.0, 3), &mut rasterizer, None);
    assert_eq!(engine.stream().pending(), 1);
}

#[test]
fn test_stream_control_filters_clients() {
    let mut engine = engine();
    let ship = streamed(&mut engine, "ship");
    engine
        .get_mut(ship)
        .unwrap()
        .stream_mut()
        .set_control(Some(Box::new(|client: &ClientId| client.as_str() != "spectator")));

    engine.tick(
        &ctx(0.0, 1).with_clients(["player", "spectator"]),
        &mut RecordingRasterizer::default(),
        None,
    );

    let ship_id = EntityId::from("ship");
    assert!(engine.stream().is_created(&ship_id, &ClientId::from("player")));
    assert!(!engine.stream().is_created(&ship_id, &ClientId::from("spectator")));
}

#[test]
fn test_destroy_streams_to_everyone() {
    let mut engine = engine();
    let ship = streamed(&mut engine, "ship");
    engine.tick(&ctx(0.0, 1).with_clients(["a"]), &mut RecordingRasterizer::default(), None);
    engine.stream_mut().drain_queue();
    engine.drain_events();

    engine.destroy(ship).unwrap();
    let queued = engine.stream_mut().drain_queue();
    assert_eq!(queued.len(), 1);
    assert!(matches!(&queued[0], (StreamMessage::Destroy { id, .. }, Recipients::All) if id.as_str() == "ship"));
    assert!(engine
        .drain_events()
        .iter()
        .any(|e| matches!(e, EngineEvent::StreamDestroyed { .. })));
    assert!(!engine.stream().is_created(&EntityId::from("ship"), &ClientId::from("a")));
}

#[test]
fn test_destroy_before_first_sync_is_not_streamed() {
    let mut engine = engine();
    let ship = streamed(&mut engine, "ship");

    engine.destroy(ship).unwrap();
    assert_eq!(engine.stream().pending(), 0);
    let events = engine.drain_events();
    assert!(!events
        .iter()
        .any(|e| matches!(e, EngineEvent::StreamDestroyed { .. })));
    assert_eq!(destroyed_ids(&events), vec!["ship"]);
}

#[test]
fn test_tick_latency_offsets_received_samples() {
    let mut server = engine();
    let ship = streamed(&mut server, "ship");
    let mut client = engine();
    let mut rasterizer = RecordingRasterizer::default();
    let mut transport = MemoryTransport::with_clients(&["c1"]);
    transport.latency = 50.0;

    client.tick(&ctx(0.0, 1).with_transport(&transport), &mut rasterizer, None);
    for (x, time, index) in [(0.0, 0.0, 1), (10.0, 100.0, 2), (20.0, 200.0, 3)] {
        server.get_mut(ship).unwrap().translate_to(x, 0.0, 0.0);
        server.tick(&ctx(time, index).with_clients(["c1"]), &mut rasterizer, None);
        for (message, _) in server.stream_mut().drain_queue() {
            client.apply_stream_message(&message).unwrap();
        }
    }

    let remote = client.graph().find_by_id(&EntityId::from("ship")).unwrap();
    let times: Vec<f64> = client
        .get(remote)
        .unwrap()
        .time_stream()
        .samples()
        .map(|sample| sample.time)
        .collect();
    assert_eq!(times, vec![150.0, 250.0]);
}

#[test]
fn test_remote_engine_interpolates_stream() {
    let mut server = engine();
    let ship = streamed(&mut server, "ship");
    let mut client = engine();
    let mut rasterizer = RecordingRasterizer::default();
    let roster = ["c1"];

    let relay = |server: &mut Engine, client: &mut Engine| {
        for (message, _) in server.stream_mut().drain_queue() {
            client.apply_stream_message(&message).unwrap();
        }
    };

    server.tick(&ctx(0.0, 1).with_clients(roster), &mut rasterizer, None);
    relay(&mut server, &mut client);
    let remote = client.graph().find_by_id(&EntityId::from("ship")).unwrap();
    assert_eq!(client.graph().parent(remote), Some(client.root()));

    for (x, time, index) in [(10.0, 100.0, 2), (20.0, 200.0, 3)] {
        server.get_mut(ship).unwrap().translate_to(x, 0.0, 0.0);
        server.tick(&ctx(time, index).with_clients(roster), &mut rasterizer, None);
        relay(&mut server, &mut client);
    }
    assert_eq!(client.get(remote).unwrap().time_stream().len(), 2);

    // Rendered 100ms behind: halfway between the buffered samples
    client.tick(&ctx(250.0, 1), &mut rasterizer, None);
    assert_relative_eq!(client.get(remote).unwrap().translate().x, 15.0, epsilon = 1e-4);

    server.destroy(ship).unwrap();
    for (message, _) in server.stream_mut().drain_queue() {
        assert!(matches!(
            client.apply_stream_message(&message).unwrap(),
            Received::Destroy(_)
        ));
    }
    assert!(client.get(remote).is_none());
}

#[test]
fn test_interpolation_lag_snaps_to_newest() {
    let mut engine = engine();
    let mut ghost = Entity::new().with_id("ghost");
    for (i, time) in [0.0, 10.0, 20.0].into_iter().enumerate() {
        let x = i as f32 * 10.0;
        ghost
            .time_stream_mut()
            .push(time, [x, 0.0, 0.0, 1.0, 1.0, 1.0, 0.0, 0.0, 0.0]);
    }
    let ghost = engine.spawn(ghost, None).unwrap();

    engine.tick(&ctx(500.0, 1), &mut RecordingRasterizer::default(), None);

    assert_relative_eq!(engine.get(ghost).unwrap().translate().x, 20.0);
    assert!(engine
        .drain_events()
        .iter()
        .any(|e| matches!(e, EngineEvent::InterpolationLag { id } if id.as_str() == "ghost")));
}
