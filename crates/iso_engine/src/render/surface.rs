//! # Drawing Surface Abstraction
//!
//! The engine never draws pixels itself. It positions entities and decides
//! whether they are drawn directly or replayed from a cache; the actual
//! drawing goes through two collaborator traits:
//!
//! - [`Surface`]: anything that can be drawn onto (the screen, or an
//!   off-screen cache surface)
//! - [`Rasterizer`]: the per-entity-type drawing routine, plus a factory for
//!   off-screen surfaces

use crate::foundation::math::Mat3;
use crate::scene::Entity;

/// # Surface Trait
///
/// A 2D drawing target with a current transform and global opacity.
pub trait Surface {
    /// Resize the backing store, discarding its contents
    ///
    /// # Arguments
    /// * `width` - New width in pixels
    /// * `height` - New height in pixels
    fn resize(&mut self, width: u32, height: u32);

    /// Current size as (width, height) in pixels
    fn size(&self) -> (u32, u32);

    /// Clear every pixel
    fn clear(&mut self);

    /// Replace the current transform
    ///
    /// # Arguments
    /// * `transform` - 2D affine matrix applied to subsequent draws
    fn set_transform(&mut self, transform: &Mat3);

    /// Set the global opacity for subsequent draws
    fn set_opacity(&mut self, opacity: f32);

    /// Draw another surface with its top-left corner at (x, y) under the
    /// current transform
    fn draw_surface(&mut self, source: &dyn Surface, x: f32, y: f32);
}

/// # Rasterizer Trait
///
/// Draws entities. Implementations dispatch on the entity's type name (or
/// custom sections) to pick a drawing routine; the engine has already set
/// the surface transform so the entity's origin is at (0, 0).
pub trait Rasterizer {
    /// Draw `entity` onto `surface`
    ///
    /// # Arguments
    /// * `surface` - Target with transform and opacity already applied
    /// * `entity` - Entity to draw
    /// * `delta` - Milliseconds since the previous tick, for animation
    fn render(&mut self, surface: &mut dyn Surface, entity: &Entity, delta: f64);

    /// Create an empty off-screen surface for caching
    fn create_surface(&mut self) -> Box<dyn Surface>;
}

/// A surface plus the matrix every draw onto it is prefixed with
pub struct RenderTarget<'a> {
    /// Destination surface
    pub surface: &'a mut dyn Surface,
    /// Prefix transform (camera, or the composite offset)
    pub base: Mat3,
}

impl<'a> RenderTarget<'a> {
    /// Target with an identity base transform
    pub fn new(surface: &'a mut dyn Surface) -> Self {
        Self {
            surface,
            base: Mat3::identity(),
        }
    }

    /// Target with the given base transform
    pub fn with_base(surface: &'a mut dyn Surface, base: Mat3) -> Self {
        Self { surface, base }
    }
}
