//! Entity lifecycle state
//!
//! Tracks birth and death times for an entity and the one-way
//! `Active -> PendingDestroy -> Destroyed` progression. The engine drives
//! the transitions; this component only records them.

/// Current state of an entity's lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LifecycleState {
    /// Entity is alive and ticking
    #[default]
    Active,
    /// Destruction has begun; the entity is torn down this tick
    PendingDestroy,
    /// Terminal state; the entity is never ticked, rendered or streamed again
    Destroyed,
}

/// Birth/death bookkeeping for a single entity
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Lifecycle {
    state: LifecycleState,
    /// Time in milliseconds at which the entity is destroyed
    death_time: Option<f64>,
    /// Time in milliseconds before which the entity is neither updated nor drawn
    born_time: Option<f64>,
}

impl Lifecycle {
    /// Create an active lifecycle with no birth or death time
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state
    pub fn state(&self) -> LifecycleState {
        self.state
    }

    /// Whether the entity is still active
    pub fn is_alive(&self) -> bool {
        self.state == LifecycleState::Active
    }

    /// Scheduled death time, if any
    pub fn death_time(&self) -> Option<f64> {
        self.death_time
    }

    /// Set or clear the absolute death time
    pub fn set_death_time(&mut self, time: Option<f64>) {
        self.death_time = time;
    }

    /// Destroy the entity `ms` milliseconds after `now`
    pub fn set_life_span(&mut self, ms: f64, now: f64) {
        self.death_time = Some(now + ms);
    }

    /// Milliseconds left before the death time, `None` for immortal entities
    pub fn remaining_life(&self, now: f64) -> Option<f64> {
        self.death_time.map(|death| (death - now).max(0.0))
    }

    /// Whether the death time has been reached
    pub fn is_expired(&self, now: f64) -> bool {
        matches!(self.death_time, Some(death) if death <= now)
    }

    /// Birth time, if any
    pub fn born_time(&self) -> Option<f64> {
        self.born_time
    }

    /// Set or clear the birth time
    pub fn set_born_time(&mut self, time: Option<f64>) {
        self.born_time = time;
    }

    /// Whether the entity has been born by `now`
    pub fn is_born(&self, now: f64) -> bool {
        self.born_time.map_or(true, |born| now >= born)
    }

    /// Move to `PendingDestroy`. Returns false if destruction already began.
    pub fn begin_destroy(&mut self) -> bool {
        if self.state != LifecycleState::Active {
            return false;
        }
        self.state = LifecycleState::PendingDestroy;
        true
    }

    /// Move to the terminal `Destroyed` state
    pub fn finish_destroy(&mut self) {
        self.state = LifecycleState::Destroyed;
    }
}
