//! Per-tick context
//!
//! Everything a subsystem needs to know about "now" is passed in explicitly
//! through [`TickContext`]: the tick clock, the active camera and the network
//! client roster.

use crate::foundation::math::{Mat3, Mat3Ext, Vec2};
use crate::foundation::time::TickClock;
use crate::net::{ClientId, Transport};

/// Camera transform supplied by the viewport layer
#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    /// Camera translation in world units
    pub translate: Vec2,
    /// Camera zoom per axis
    pub scale: Vec2,
    /// Viewport size in pixels
    pub viewport: Vec2,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            translate: Vec2::zeros(),
            scale: Vec2::new(1.0, 1.0),
            viewport: Vec2::zeros(),
        }
    }
}

impl Camera {
    /// Create a camera for a viewport of the given size
    pub fn new(viewport_width: f32, viewport_height: f32) -> Self {
        Self {
            viewport: Vec2::new(viewport_width, viewport_height),
            ..Default::default()
        }
    }

    /// Builder pattern: Set translation
    pub fn with_translate(mut self, x: f32, y: f32) -> Self {
        self.translate = Vec2::new(x, y);
        self
    }

    /// Builder pattern: Set uniform zoom
    pub fn with_zoom(mut self, zoom: f32) -> Self {
        self.scale = Vec2::new(zoom, zoom);
        self
    }

    /// Half the viewport size
    pub fn half_viewport(&self) -> Vec2 {
        self.viewport * 0.5
    }

    /// World-to-viewport matrix: centre the viewport, zoom, then pan
    pub fn view_matrix(&self) -> Mat3 {
        let half = self.half_viewport();
        Mat3::translation_2d(half.x, half.y)
            * Mat3::scaling_2d(self.scale.x, self.scale.y)
            * Mat3::translation_2d(-self.translate.x, -self.translate.y)
    }
}

/// Explicit state for one engine tick
#[derive(Debug, Clone, Default)]
pub struct TickContext {
    /// Tick start time in milliseconds
    pub current_time: f64,
    /// Milliseconds since the previous tick
    pub delta: f64,
    /// Monotonic index of this tick; several viewports may share one
    pub tick_index: u64,
    /// Active camera
    pub camera: Camera,
    /// Connected network clients
    pub clients: Vec<ClientId>,
    /// Estimated network latency in milliseconds
    pub latency: f64,
}

impl TickContext {
    /// Create a context for the given time, delta and tick index
    pub fn new(current_time: f64, delta: f64, tick_index: u64) -> Self {
        Self {
            current_time,
            delta,
            tick_index,
            ..Default::default()
        }
    }

    /// Snapshot a [`TickClock`]
    pub fn from_clock(clock: &TickClock) -> Self {
        Self::new(clock.current_time(), clock.delta(), clock.tick_index())
    }

    /// Builder pattern: Set the camera
    pub fn with_camera(mut self, camera: Camera) -> Self {
        self.camera = camera;
        self
    }

    /// Builder pattern: Set the client roster
    pub fn with_clients<I, C>(mut self, clients: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<ClientId>,
    {
        self.clients = clients.into_iter().map(Into::into).collect();
        self
    }

    /// Builder pattern: Set network latency
    pub fn with_latency(mut self, latency: f64) -> Self {
        self.latency = latency;
        self
    }

    /// Builder pattern: Take the client roster and latency from a transport
    pub fn with_transport(mut self, transport: &dyn Transport) -> Self {
        self.clients = transport.client_ids();
        self.latency = transport.latency();
        self
    }
}
