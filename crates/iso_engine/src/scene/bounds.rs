//! Bounds engine
//!
//! World and local AABBs for visibility and picking, composite bounds for
//! composite render caches, and the 3D interval tests used for isometric
//! depth ordering.

use crate::foundation::math::{to_iso, Mat3Ext, Vec2, Vec3};
use crate::scene::entity::{Entity, EntityKey, ProjectionMode};
use crate::scene::rect::Rect;
use crate::scene::SceneGraph;

/// Corners of the entity's footprint in its own local space
fn local_quad(entity: &Entity) -> [Vec2; 4] {
    let (hx, hy) = match entity.mode() {
        ProjectionMode::Planar => {
            let half = entity.geometry().half_2d();
            (half.x, half.y)
        }
        ProjectionMode::Isometric => {
            let half = entity.geometry().half_3d();
            let top = to_iso(Vec3::new(0.0, 0.0, entity.geometry().depth() * 0.5));
            let half_width = half.x + half.y;
            (half_width, half_width * 0.5 + top.y.abs())
        }
    };

    let offset = entity.draw_offset();
    [
        Vec2::new(-hx, -hy) + offset,
        Vec2::new(hx, -hy) + offset,
        Vec2::new(hx, hy) + offset,
        Vec2::new(-hx, hy) + offset,
    ]
}

/// Compute an entity's world AABB from its current world matrix
pub fn compute_world_aabb(entity: &Entity) -> Rect {
    let world = entity.world_matrix();
    let corners = local_quad(entity).map(|corner| world.transform_xy(corner));
    Rect::from_points(&corners)
}

/// World AABB, recomputed when `recalc` is set or nothing is cached
pub fn world_aabb(graph: &mut SceneGraph, key: EntityKey, recalc: bool) -> Option<Rect> {
    let entity = graph.get_mut(key)?;
    if !recalc {
        if let Some(aabb) = entity.aabb {
            return Some(aabb);
        }
    }
    let aabb = compute_world_aabb(entity);
    entity.aabb = Some(aabb);
    Some(aabb)
}

/// Local AABB centered on the origin, sized from the world AABB
pub fn local_aabb(graph: &mut SceneGraph, key: EntityKey, recalc: bool) -> Option<Rect> {
    if !recalc {
        if let Some(local) = graph.get(key)?.local_aabb {
            return Some(local);
        }
    }
    let world = world_aabb(graph, key, recalc)?;
    let local = Rect::new(
        -(world.width / 2.0).floor(),
        -(world.height / 2.0).floor(),
        world.width.floor(),
        world.height.floor(),
    );
    if let Some(entity) = graph.get_mut(key) {
        entity.local_aabb = Some(local);
    }
    Some(local)
}

/// Own AABB unioned with every descendant's, always recomputed
pub fn composite_aabb(graph: &mut SceneGraph, key: EntityKey) -> Option<Rect> {
    let mut rect = world_aabb(graph, key, true)?;
    for child in graph.children(key).to_vec() {
        if let Some(child_rect) = composite_aabb(graph, child) {
            rect = rect.union(&child_rect);
        }
    }
    Some(rect)
}

#[derive(Debug, Clone, Copy)]
struct Box3 {
    min: Vec3,
    max: Vec3,
}

impl Box3 {
    fn of(entity: &Entity) -> Self {
        let t = entity.translate();
        let size = entity.bounds3d();
        let origin = entity.origin();
        let half = size * 0.5;
        let cx = t.x + size.x * (0.5 - origin.x);
        let cy = t.y + size.y * (0.5 - origin.y);
        Self {
            min: Vec3::new(cx - half.x, cy - half.y, t.z),
            max: Vec3::new(cx + half.x, cy + half.y, t.z + size.z),
        }
    }

    /// Ranges on the screen-projected axes `x - y`, `x - z`, `-y - z`
    fn projected(&self) -> [(f32, f32); 3] {
        [
            (self.min.x - self.max.y, self.max.x - self.min.y),
            (self.min.x - self.max.z, self.max.x - self.min.z),
            (-self.max.y - self.max.z, -self.min.y - self.min.z),
        ]
    }
}

/// Whether `a` should be drawn before `b`
///
/// Intervals are compared on x, then y, then z; the first disjoint axis
/// decides. Fully overlapping boxes fall back to the translation sum.
/// This is not a total order.
pub fn is_behind(a: &Entity, b: &Entity) -> bool {
    let (ba, bb) = (Box3::of(a), Box3::of(b));
    for axis in 0..3 {
        if ba.max[axis] <= bb.min[axis] {
            return true;
        }
        if bb.max[axis] <= ba.min[axis] {
            return false;
        }
    }

    let (ta, tb) = (a.translate(), b.translate());
    ta.x + ta.y + ta.z < tb.x + tb.y + tb.z
}

/// Whether the screen projections of two boxes overlap
pub fn projection_overlap(a: &Entity, b: &Entity) -> bool {
    let (pa, pb) = (Box3::of(a).projected(), Box3::of(b).projected());
    pa.iter()
        .zip(pb.iter())
        .all(|(&(a_min, a_max), &(b_min, b_max))| a_min < b_max && b_min < a_max)
}

/// Reorder `parent`'s children back to front
///
/// Only pairs whose projections overlap are ordered against each other;
/// everything else keeps mount order. Cycles resolve in mount order.
pub fn depth_sort_children(graph: &mut SceneGraph, parent: EntityKey) -> Vec<EntityKey> {
    let children: Vec<EntityKey> = graph
        .children(parent)
        .iter()
        .copied()
        .filter(|&k| graph.contains(k))
        .collect();
    let n = children.len();

    // before[i] lists the children that must be drawn before child i
    let mut before: Vec<Vec<usize>> = vec![Vec::new(); n];
    for i in 0..n {
        for j in (i + 1)..n {
            let (Some(a), Some(b)) = (graph.get(children[i]), graph.get(children[j])) else {
                continue;
            };
            if !projection_overlap(a, b) {
                continue;
            }
            if is_behind(a, b) {
                before[j].push(i);
            } else {
                before[i].push(j);
            }
        }
    }

    let order = draw_order(&before);

    let sorted: Vec<EntityKey> = order.into_iter().map(|i| children[i]).collect();
    if let Some(entity) = graph.get_mut(parent) {
        entity.children = sorted.clone();
    }
    sorted
}

/// Depth-first post-order over `before`, so every index follows the ones it depends on
///
/// Uses an explicit stack; chains of overlapping children can be as long as
/// the child list.
fn draw_order(before: &[Vec<usize>]) -> Vec<usize> {
    let n = before.len();
    let mut visited = vec![false; n];
    let mut order = Vec::with_capacity(n);
    let mut stack: Vec<(usize, usize)> = Vec::new();

    for start in 0..n {
        if visited[start] {
            continue;
        }
        visited[start] = true;
        stack.push((start, 0));

        while let Some((node, next)) = stack.last_mut() {
            let node = *node;
            if let Some(&dep) = before[node].get(*next) {
                *next += 1;
                if !visited[dep] {
                    visited[dep] = true;
                    stack.push((dep, 0));
                }
            } else {
                stack.pop();
                order.push(node);
            }
        }
    }
    order
}
