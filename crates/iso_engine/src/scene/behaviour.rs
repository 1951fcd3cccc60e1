//! Per-entity behaviour hooks
//!
//! Game-specific logic attaches to entities as [`Behaviour`] objects instead
//! of subclassing. Hooks run once per tick, after the lifecycle check and
//! before interpolation and transform recomputation.

use crate::core::TickContext;
use crate::scene::Entity;

/// Tick hook attached to an entity
pub trait Behaviour {
    /// Identifier used to remove the behaviour later
    fn id(&self) -> &str;

    /// Called once per tick with the owning entity
    fn update(&mut self, entity: &mut Entity, ctx: &TickContext);
}

/// Adapter turning a closure into a [`Behaviour`]
pub struct FnBehaviour<F> {
    id: String,
    hook: F,
}

impl<F> FnBehaviour<F>
where
    F: FnMut(&mut Entity, &TickContext),
{
    /// Wrap a closure under the given id
    pub fn new(id: impl Into<String>, hook: F) -> Self {
        Self { id: id.into(), hook }
    }
}

impl<F> Behaviour for FnBehaviour<F>
where
    F: FnMut(&mut Entity, &TickContext),
{
    fn id(&self) -> &str {
        &self.id
    }

    fn update(&mut self, entity: &mut Entity, ctx: &TickContext) {
        (self.hook)(entity, ctx);
    }
}
