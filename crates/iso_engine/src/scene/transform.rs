//! Transform engine
//!
//! Builds each entity's local matrix from its translate/rotate/scale inputs
//! and composes it with the parent's world matrix. Parents must be
//! recomputed before their children; the engine's depth-first tick does
//! this naturally.

use crate::core::Camera;
use crate::foundation::math::constants::ISO_PARENT_DEPTH_DIVISOR;
use crate::foundation::math::{to_iso, Mat3, Mat3Ext, Vec2, Vec3};
use crate::scene::entity::{Entity, EntityKey, ProjectionMode};
use crate::scene::SceneGraph;

/// Local matrix: Translate x Rotate(z) x Scale
///
/// In isometric mode the translation is projected first, measured from the
/// vertical middle of the entity's box, and shifted by the parent's depth so
/// the child origin sits on the parent's visual base.
pub fn local_matrix(entity: &Entity, parent_depth: f32) -> Mat3 {
    let t = entity.translate();
    let position = match entity.mode() {
        ProjectionMode::Planar => Vec2::new(t.x, t.y),
        ProjectionMode::Isometric => {
            let mut projected = to_iso(Vec3::new(t.x, t.y, t.z + entity.geometry().depth() * 0.5));
            if parent_depth != 0.0 {
                projected.y += parent_depth / ISO_PARENT_DEPTH_DIVISOR;
            }
            projected
        }
    };

    let scale = entity.scale();
    Mat3::translation_2d(position.x, position.y)
        * Mat3::rotation_z(entity.rotate().z)
        * Mat3::scaling_2d(scale.x, scale.y)
}

/// Recompute `key`'s local and world matrices
///
/// Returns true when the world matrix changed.
pub fn recompute_transform(graph: &mut SceneGraph, key: EntityKey) -> bool {
    let (parent_world, parent_depth) = match graph.parent(key).and_then(|p| graph.get(p)) {
        Some(parent) => (*parent.world_matrix(), parent.geometry().depth()),
        None => (Mat3::identity(), 0.0),
    };

    let Some(entity) = graph.get_mut(key) else {
        return false;
    };

    let local = local_matrix(entity, parent_depth);
    let world = parent_world * local;
    if !world.is_finite() {
        log::warn!("Non-finite world matrix for entity '{}', keeping previous", entity.id());
        return false;
    }

    let changed = world != entity.world_matrix;
    entity.local_matrix = local;
    entity.world_matrix = world;
    changed
}

/// World-space position of the entity's origin
pub fn world_position(graph: &SceneGraph, key: EntityKey) -> Option<Vec2> {
    graph.get(key).map(|e| e.world_matrix().translation_part())
}

/// Accumulated rotation about z, in radians
pub fn world_rotation_z(graph: &SceneGraph, key: EntityKey) -> Option<f32> {
    graph.get(key).map(|e| e.world_matrix().rotation_radians())
}

/// Pixel position of the entity on screen under `camera`
pub fn screen_position(graph: &SceneGraph, key: EntityKey, camera: &Camera) -> Option<Vec2> {
    let world = world_position(graph, key)?;
    let screen = (world - camera.translate).component_mul(&camera.scale) + camera.half_viewport();
    Some(Vec2::new(screen.x.floor(), screen.y.floor()))
}

/// Map a point in the entity's local space to world space
pub fn local_to_world(graph: &SceneGraph, key: EntityKey, point: Vec2) -> Option<Vec2> {
    graph.get(key).map(|e| e.world_matrix().transform_xy(point))
}

/// Map a world point into the entity's local space
///
/// `None` if the entity is unknown or its world matrix is singular.
pub fn world_to_local(graph: &SceneGraph, key: EntityKey, point: Vec2) -> Option<Vec2> {
    let inverse = graph.get(key)?.world_matrix().try_inverse()?;
    Some(inverse.transform_xy(point))
}

/// Map a viewport pixel (origin at the top left) into the entity's local space
pub fn mouse_position(graph: &SceneGraph, key: EntityKey, viewport_mouse: Vec2, camera: &Camera) -> Option<Vec2> {
    if camera.scale.x == 0.0 || camera.scale.y == 0.0 {
        return None;
    }
    let world = (viewport_mouse - camera.half_viewport()).component_div(&camera.scale) + camera.translate;
    world_to_local(graph, key, world)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::constants::HALF_PI;
    use approx::assert_relative_eq;

    fn graph_with_child() -> (SceneGraph, EntityKey, EntityKey) {
        let mut graph = SceneGraph::new();
        let parent = graph.insert(Entity::new().with_translate(100.0, 50.0, 0.0)).unwrap();
        let child = graph.insert(Entity::new().with_translate(10.0, 0.0, 0.0)).unwrap();
        graph.mount(child, parent).unwrap();
        (graph, parent, child)
    }

    #[test]
    fn test_world_composes_parent() {
        let (mut graph, parent, child) = graph_with_child();
        graph.get_mut(parent).unwrap().rotate_to(0.0, 0.0, HALF_PI);
        graph.get_mut(parent).unwrap().scale_to(2.0, 2.0, 1.0);

        recompute_transform(&mut graph, parent);
        recompute_transform(&mut graph, child);

        let p = graph.get(parent).unwrap();
        let c = graph.get(child).unwrap();
        let expected = p.world_matrix() * c.local_matrix();
        assert_relative_eq!(*c.world_matrix(), expected);

        let pos = world_position(&graph, child).unwrap();
        assert_relative_eq!(pos.x, 100.0, epsilon = 1e-4);
        assert_relative_eq!(pos.y, 70.0, epsilon = 1e-4);
        assert_relative_eq!(world_rotation_z(&graph, child).unwrap(), HALF_PI, epsilon = 1e-5);
    }

    #[test]
    fn test_recompute_reports_change() {
        let (mut graph, parent, _) = graph_with_child();
        assert!(recompute_transform(&mut graph, parent));
        assert!(!recompute_transform(&mut graph, parent));

        graph.get_mut(parent).unwrap().translate_by(1.0, 0.0, 0.0);
        assert!(recompute_transform(&mut graph, parent));
    }

    #[test]
    fn test_isometric_translation() {
        let mut graph = SceneGraph::new();
        let parent = graph
            .insert(
                Entity::new()
                    .with_mode(ProjectionMode::Isometric)
                    .with_bounds3d(40.0, 40.0, 16.0),
            )
            .unwrap();
        let child = graph
            .insert(
                Entity::new()
                    .with_mode(ProjectionMode::Isometric)
                    .with_translate(10.0, 4.0, 0.0)
                    .with_bounds3d(10.0, 10.0, 0.0),
            )
            .unwrap();
        graph.mount(child, parent).unwrap();

        recompute_transform(&mut graph, parent);
        let root_pos = graph.get(parent).unwrap().local_matrix().translation_part();
        assert_relative_eq!(root_pos.x, 0.0);
        assert_relative_eq!(root_pos.y, -8.0 * 1.2247, epsilon = 1e-4);

        recompute_transform(&mut graph, child);
        let local = graph.get(child).unwrap().local_matrix().translation_part();
        assert_relative_eq!(local.x, 6.0);
        assert_relative_eq!(local.y, 7.0 + 10.0, epsilon = 1e-4);
    }

    #[test]
    fn test_screen_and_mouse_position() {
        let (mut graph, parent, child) = graph_with_child();
        recompute_transform(&mut graph, parent);
        recompute_transform(&mut graph, child);

        let camera = Camera::new(800.0, 600.0).with_translate(100.0, 50.0);
        let screen = screen_position(&graph, child, &camera).unwrap();
        assert_relative_eq!(screen.x, 410.0);
        assert_relative_eq!(screen.y, 300.0);

        let local = mouse_position(&graph, child, Vec2::new(415.0, 297.0), &camera).unwrap();
        assert_relative_eq!(local.x, 5.0, epsilon = 1e-4);
        assert_relative_eq!(local.y, -3.0, epsilon = 1e-4);
    }

    #[test]
    fn test_world_to_local_inverts() {
        let (mut graph, parent, child) = graph_with_child();
        graph.get_mut(child).unwrap().rotate_to(0.0, 0.0, 0.7);
        recompute_transform(&mut graph, parent);
        recompute_transform(&mut graph, child);

        let point = Vec2::new(3.0, -2.0);
        let world = local_to_world(&graph, child, point).unwrap();
        let back = world_to_local(&graph, child, world).unwrap();
        assert_relative_eq!(back.x, point.x, epsilon = 1e-4);
        assert_relative_eq!(back.y, point.y, epsilon = 1e-4);

        graph.get_mut(child).unwrap().scale_to(0.0, 1.0, 1.0);
        recompute_transform(&mut graph, child);
        assert_eq!(world_to_local(&graph, child, point), None);
    }
}
