//! In-memory collaborators for tests

use crate::foundation::math::Mat3;
use crate::net::{ClientId, Recipients, StreamMessage, Transport};
use crate::render::surface::{Rasterizer, Surface};
use crate::scene::{Entity, EntityId};

/// One recorded surface call
#[derive(Debug, Clone, PartialEq)]
pub enum SurfaceOp {
    Resize(u32, u32),
    Clear,
    Transform(Mat3),
    Opacity(f32),
    DrawSurface { x: f32, y: f32, size: (u32, u32) },
}

/// Surface that records every call
#[derive(Debug, Default)]
pub struct RecordingSurface {
    size: (u32, u32),
    ops: Vec<SurfaceOp>,
}

impl RecordingSurface {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            size: (width, height),
            ops: Vec::new(),
        }
    }

    pub fn ops(&self) -> &[SurfaceOp] {
        &self.ops
    }

    /// Positions of every `draw_surface` call
    pub fn draws(&self) -> Vec<(f32, f32)> {
        self.ops
            .iter()
            .filter_map(|op| match op {
                SurfaceOp::DrawSurface { x, y, .. } => Some((*x, *y)),
                _ => None,
            })
            .collect()
    }
}

impl Surface for RecordingSurface {
    fn resize(&mut self, width: u32, height: u32) {
        self.size = (width, height);
        self.ops.push(SurfaceOp::Resize(width, height));
    }

    fn size(&self) -> (u32, u32) {
        self.size
    }

    fn clear(&mut self) {
        self.ops.push(SurfaceOp::Clear);
    }

    fn set_transform(&mut self, transform: &Mat3) {
        self.ops.push(SurfaceOp::Transform(*transform));
    }

    fn set_opacity(&mut self, opacity: f32) {
        self.ops.push(SurfaceOp::Opacity(opacity));
    }

    fn draw_surface(&mut self, source: &dyn Surface, x: f32, y: f32) {
        self.ops.push(SurfaceOp::DrawSurface { x, y, size: source.size() });
    }
}

/// Rasterizer that records which entity was drawn onto a surface of which size
#[derive(Debug, Default)]
pub struct RecordingRasterizer {
    pub renders: Vec<(EntityId, (u32, u32))>,
    pub surfaces_created: usize,
}

impl RecordingRasterizer {
    /// How many times `id` was rasterized
    pub fn count(&self, id: &str) -> usize {
        self.renders.iter().filter(|(e, _)| e.as_str() == id).count()
    }
}

impl Rasterizer for RecordingRasterizer {
    fn render(&mut self, surface: &mut dyn Surface, entity: &Entity, _delta: f64) {
        self.renders.push((entity.id().clone(), surface.size()));
    }

    fn create_surface(&mut self) -> Box<dyn Surface> {
        self.surfaces_created += 1;
        Box::new(RecordingSurface::default())
    }
}

/// Transport that keeps every message it is asked to send
#[derive(Debug, Default)]
pub struct MemoryTransport {
    pub clients: Vec<ClientId>,
    pub sent: Vec<(StreamMessage, Recipients)>,
    pub latency: f64,
}

impl MemoryTransport {
    pub fn with_clients(ids: &[&str]) -> Self {
        Self {
            clients: ids.iter().map(|id| ClientId::from(*id)).collect(),
            ..Default::default()
        }
    }
}

impl Transport for MemoryTransport {
    fn send(&mut self, message: &StreamMessage, recipients: &Recipients) {
        self.sent.push((message.clone(), recipients.clone()));
    }

    fn client_ids(&self) -> Vec<ClientId> {
        self.clients.clone()
    }

    fn latency(&self) -> f64 {
        self.latency
    }
}
