//! Arena-backed scenegraph container
//!
//! Entities live in a [`slotmap::SlotMap`] and refer to each other through
//! [`EntityKey`] handles. The graph owns the parent/child links and the
//! id index; everything else about an entity is the entity's own business.

use std::collections::HashMap;

use slotmap::SlotMap;

use crate::render::cache::{set_cache_dirty, CacheMode};
use crate::scene::entity::{Entity, EntityId, EntityKey};

/// Structural scenegraph errors
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum SceneError {
    /// Key is not (or no longer) in the graph
    #[error("Unknown entity key {0:?}")]
    UnknownEntity(EntityKey),

    /// Another entity already uses this id
    #[error("Duplicate entity id '{0}'")]
    DuplicateId(EntityId),

    /// Mounting would make an entity its own ancestor
    #[error("Mounting {child} under {parent} would create a cycle")]
    MountCycle {
        /// Entity being mounted
        child: EntityId,
        /// Requested parent
        parent: EntityId,
    },
}

/// Hierarchical entity container
#[derive(Debug, Default)]
pub struct SceneGraph {
    nodes: SlotMap<EntityKey, Entity>,
    ids: HashMap<EntityId, EntityKey>,
    next_id: u64,
}

impl SceneGraph {
    /// Create an empty graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entities
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the graph is empty
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Add an unmounted entity, assigning an id if it has none
    pub fn insert(&mut self, mut entity: Entity) -> Result<EntityKey, SceneError> {
        if entity.id().is_empty() {
            entity.set_id(self.generate_id());
        } else if self.ids.contains_key(entity.id()) {
            return Err(SceneError::DuplicateId(entity.id().clone()));
        }

        entity.parent = None;
        entity.children.clear();

        let id = entity.id().clone();
        let key = self.nodes.insert(entity);
        self.ids.insert(id, key);
        Ok(key)
    }

    fn generate_id(&mut self) -> EntityId {
        loop {
            self.next_id += 1;
            let id = EntityId::new(format!("e{}", self.next_id));
            if !self.ids.contains_key(&id) {
                return id;
            }
        }
    }

    /// Whether `key` is in the graph
    pub fn contains(&self, key: EntityKey) -> bool {
        self.nodes.contains_key(key)
    }

    /// Borrow an entity
    pub fn get(&self, key: EntityKey) -> Option<&Entity> {
        self.nodes.get(key)
    }

    /// Mutably borrow an entity
    pub fn get_mut(&mut self, key: EntityKey) -> Option<&mut Entity> {
        self.nodes.get_mut(key)
    }

    /// Look up an entity by wire id
    pub fn find_by_id(&self, id: &EntityId) -> Option<EntityKey> {
        self.ids.get(id).copied()
    }

    /// Parent of `key`
    pub fn parent(&self, key: EntityKey) -> Option<EntityKey> {
        self.nodes.get(key).and_then(|e| e.parent)
    }

    /// Children of `key` in mount order
    pub fn children(&self, key: EntityKey) -> &[EntityKey] {
        self.nodes.get(key).map_or(&[], |e| e.children.as_slice())
    }

    /// Every key in the graph
    pub fn keys(&self) -> impl Iterator<Item = EntityKey> + '_ {
        self.nodes.keys()
    }

    /// Every entity, in arena order
    pub fn entities_mut(&mut self) -> impl Iterator<Item = &mut Entity> + '_ {
        self.nodes.values_mut()
    }

    /// `key` and all of its descendants, depth first, parents before children
    pub fn subtree(&self, key: EntityKey) -> Vec<EntityKey> {
        let mut out = Vec::new();
        let mut stack = vec![key];
        while let Some(next) = stack.pop() {
            if !self.contains(next) {
                continue;
            }
            out.push(next);
            stack.extend(self.children(next).iter().rev().copied());
        }
        out
    }

    fn id_of(&self, key: EntityKey) -> EntityId {
        self.nodes.get(key).map(|e| e.id().clone()).unwrap_or_default()
    }

    /// Mount `child` as the last child of `parent`
    ///
    /// A child already mounted elsewhere is moved. Under a composite-caching
    /// parent the child gets the composite-parent marker and the parent's
    /// cache is dirtied.
    pub fn mount(&mut self, child: EntityKey, parent: EntityKey) -> Result<(), SceneError> {
        if !self.contains(child) {
            return Err(SceneError::UnknownEntity(child));
        }
        if !self.contains(parent) {
            log::warn!("Cannot mount {} under missing parent {:?}", self.id_of(child), parent);
            return Err(SceneError::UnknownEntity(parent));
        }

        let mut cursor = Some(parent);
        while let Some(ancestor) = cursor {
            if ancestor == child {
                return Err(SceneError::MountCycle {
                    child: self.id_of(child),
                    parent: self.id_of(parent),
                });
            }
            cursor = self.parent(ancestor);
        }

        if self.parent(child).is_some() {
            self.unmount(child)?;
        }

        let composite_parent = self
            .nodes
            .get_mut(parent)
            .map(|p| {
                p.children.push(child);
                p.cache.mode() == CacheMode::Composite
            })
            .unwrap_or(false);

        if let Some(entity) = self.nodes.get_mut(child) {
            entity.parent = Some(parent);
            entity.cache.set_has_composite_parent(composite_parent);
        }

        if composite_parent {
            set_cache_dirty(self, parent, true);
        }
        Ok(())
    }

    /// Detach `child` from its parent, returning the old parent
    pub fn unmount(&mut self, child: EntityKey) -> Result<Option<EntityKey>, SceneError> {
        let entity = self.nodes.get_mut(child).ok_or(SceneError::UnknownEntity(child))?;
        let Some(parent) = entity.parent.take() else {
            return Ok(None);
        };
        entity.cache.set_has_composite_parent(false);

        let mut composite_parent = false;
        if let Some(p) = self.nodes.get_mut(parent) {
            p.children.retain(|&k| k != child);
            composite_parent = p.cache.mode() == CacheMode::Composite;
        }
        if composite_parent {
            set_cache_dirty(self, parent, true);
        }
        Ok(Some(parent))
    }

    /// Remove a single entity from the graph
    ///
    /// Its children are left in the graph, unmounted.
    pub fn remove(&mut self, key: EntityKey) -> Option<Entity> {
        if self.unmount(key).is_err() {
            return None;
        }

        let mut entity = self.nodes.remove(key)?;
        for child in entity.children.drain(..) {
            if let Some(c) = self.nodes.get_mut(child) {
                c.parent = None;
                c.cache.set_has_composite_parent(false);
            }
        }
        self.ids.remove(entity.id());
        Some(entity)
    }
}
